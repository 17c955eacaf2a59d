use serde::{Deserialize, Serialize};

use crate::ids::{ClassId, ServiceId};

/// Candidate class for an unclassified service, as pre-aggregated by the
/// constraint graph. Produced fresh per request and never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposedClass {
    pub class_id: ClassId,
    /// Distinct parameters shared between the service and the class.
    pub matching_parameters: usize,
    /// Other approved services filed under this class that share at least
    /// one of the matching parameters. Never contains the service itself.
    pub similar_services: Vec<ServiceId>,
}

/// Final, business-ranked recommendation entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedClass {
    pub class_id: ClassId,
    pub title: String,
    pub similar_parameters: usize,
    pub similar_services: usize,
}
