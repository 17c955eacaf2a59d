//! Decoding of `application/sparql-results+json` bodies

use std::collections::HashMap;

use serde::Deserialize;
use taxon_types::{ClassId, ParameterCode, ServiceId};

use crate::error::{GraphError, Result};
use crate::statement::{NodeKind, unescape_local};

#[derive(Debug, Clone, Deserialize)]
pub struct SparqlResults {
    #[serde(default)]
    pub head: Head,
    pub results: Bindings,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Head {
    #[serde(default)]
    pub vars: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Bindings {
    pub bindings: Vec<Row>,
}

/// One bound value. `kind` is `uri`, `literal` or `bnode` when the store
/// sends it; some stores bind only `value`.
#[derive(Debug, Clone, Deserialize)]
pub struct Term {
    #[serde(rename = "type", default)]
    pub kind: String,
    pub value: String,
}

pub type Row = HashMap<String, Term>;

impl SparqlResults {
    /// Parse a response body; anything but the tabular shape is a decode failure.
    pub fn parse(body: &str) -> Result<Self> {
        serde_json::from_str(body)
            .map_err(|err| GraphError::decode(format!("not a SPARQL results document: {err}"), body))
    }

    pub fn rows(&self) -> &[Row] {
        &self.results.bindings
    }
}

/// Value bound to `var`, if any.
pub fn value<'a>(row: &'a Row, var: &str) -> Option<&'a str> {
    row.get(var).map(|term| term.value.as_str())
}

/// Value bound to `var`; an unbound variable is a decode failure.
pub fn required<'a>(row: &'a Row, var: &str) -> Result<&'a str> {
    value(row, var).ok_or_else(|| GraphError::decode(format!("variable ?{var} is unbound"), ""))
}

/// Decodes node IRIs back into typed identities under a namespace prefix.
#[derive(Debug, Clone)]
pub struct IriDecoder<'a> {
    prefix: &'a str,
}

impl<'a> IriDecoder<'a> {
    pub fn new(prefix: &'a str) -> Self {
        Self { prefix }
    }

    fn local<'v>(&self, kind: NodeKind, iri: &'v str) -> Result<&'v str> {
        iri.strip_prefix(self.prefix)
            .and_then(|rest| rest.strip_prefix(kind.local_prefix()))
            .ok_or_else(|| {
                GraphError::decode(
                    format!("IRI is not a {} node under {}", kind.type_name(), self.prefix),
                    iri,
                )
            })
    }

    pub fn class(&self, iri: &str) -> Result<ClassId> {
        let local = self.local(NodeKind::Class, iri)?;
        local
            .parse::<u64>()
            .map(ClassId)
            .map_err(|err| GraphError::decode(format!("class id {local:?}: {err}"), iri))
    }

    pub fn service(&self, iri: &str) -> Result<ServiceId> {
        let local = self.local(NodeKind::Service, iri)?;
        local
            .parse::<u64>()
            .map(ServiceId)
            .map_err(|err| GraphError::decode(format!("service id {local:?}: {err}"), iri))
    }

    pub fn parameter(&self, iri: &str) -> Result<ParameterCode> {
        let local = self.local(NodeKind::Parameter, iri)?;
        unescape_local(local)
            .map(ParameterCode::from)
            .map_err(|err| GraphError::decode(format!("malformed escape in parameter code: {err}"), iri))
    }
}

/// Parse a numeric literal such as a `COUNT` aggregate.
pub fn count(raw: &str) -> Result<usize> {
    raw.parse::<usize>()
        .map_err(|err| GraphError::decode(format!("count {raw:?}: {err}"), raw))
}
