use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{ClassId, ParameterCode, ServiceId};

/// Parameter row as held by the relational entity index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterRecord {
    pub code: ParameterCode,
    pub title: String,
}

/// Class row as held by the relational entity index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassRecord {
    pub id: ClassId,
    pub title: String,
}

/// A parameter together with its outgoing constraint edges.
///
/// Both edge lists may be empty; a bare parameter is still a valid node.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Parameter {
    pub code: ParameterCode,
    #[serde(default)]
    pub title: String,
    /// Classes this parameter declares itself allowed in.
    #[serde(default)]
    pub allowed_classes: Vec<ClassId>,
    /// Parameters this one logically contradicts.
    #[serde(default)]
    pub contradiction_parameters: Vec<ParameterCode>,
}

impl Parameter {
    pub fn new(code: impl Into<ParameterCode>) -> Self {
        Self {
            code: code.into(),
            ..Default::default()
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_allowed_classes(mut self, classes: impl IntoIterator<Item = ClassId>) -> Self {
        self.allowed_classes = classes.into_iter().collect();
        self
    }

    pub fn with_contradictions<I, C>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ParameterCode>,
    {
        self.contradiction_parameters = codes.into_iter().map(Into::into).collect();
        self
    }

    pub fn record(&self) -> ParameterRecord {
        ParameterRecord {
            code: self.code.clone(),
            title: self.title.clone(),
        }
    }
}

/// A class together with the parameters it declares as allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Class {
    pub id: ClassId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub allowed_parameters: Vec<ParameterCode>,
}

impl Class {
    pub fn new(id: u64) -> Self {
        Self {
            id: ClassId(id),
            title: String::new(),
            allowed_parameters: Vec::new(),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = title.into();
        self
    }

    pub fn with_allowed_parameters<I, C>(mut self, codes: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ParameterCode>,
    {
        self.allowed_parameters = codes.into_iter().map(Into::into).collect();
        self
    }

    pub fn record(&self) -> ClassRecord {
        ClassRecord {
            id: self.id,
            title: self.title.clone(),
        }
    }
}

/// Lifecycle state of a service, derived from its class and approval fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceState {
    Unclassified,
    TentativelyClassified,
    Approved,
}

/// Request to register a new service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewService {
    pub title: String,
    pub parameters: Vec<ParameterCode>,
}

impl NewService {
    pub fn new<I, C>(title: impl Into<String>, parameters: I) -> Self
    where
        I: IntoIterator<Item = C>,
        C: Into<ParameterCode>,
    {
        Self {
            title: title.into(),
            parameters: parameters.into_iter().map(Into::into).collect(),
        }
    }
}

/// A billing line-item. Its parameter set is fixed at creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: ServiceId,
    pub title: String,
    pub parameters: Vec<ParameterCode>,
    pub class_id: Option<ClassId>,
    pub created_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
}

impl Service {
    pub fn state(&self) -> ServiceState {
        match (self.class_id, self.approved_at) {
            (_, Some(_)) => ServiceState::Approved,
            (Some(_), None) => ServiceState::TentativelyClassified,
            (None, None) => ServiceState::Unclassified,
        }
    }

    pub fn is_approved(&self) -> bool {
        self.approved_at.is_some()
    }

    pub fn has_parameter(&self, code: &ParameterCode) -> bool {
        self.parameters.contains(code)
    }
}
