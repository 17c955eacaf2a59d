//! Constraint graph gateway
//!
//! Translates domain operations on classes, parameters and services into
//! SPARQL statements against an RDF store and decodes the tabular results
//! back into typed values.
//!
//! - `ConstraintGraph`: the single interface the rest of the system consumes
//! - `SparqlGraph`: HTTP implementation over a SPARQL 1.1 endpoint
//! - `MemoryGraph`: in-process fact set with identical semantics (`test-utils`)

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod client;
pub mod error;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod query;
pub mod results;
pub mod sparql;
pub mod statement;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use taxon_types::{Class, ClassId, Parameter, ParameterCode, ProposedClass, Service, ServiceId};

pub use client::{GraphEndpoint, SparqlClient};
pub use error::{GraphError, GraphErrorKind, Result};
#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryGraph;
pub use sparql::SparqlGraph;
pub use statement::{Description, Node, NodeKind, Predicate, Statement};

/// Constraint edges touching one parameter, read from both sides.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterConstraints {
    pub allowed_classes: Vec<ClassId>,
    pub contradiction_parameters: Vec<ParameterCode>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Gateway trait
// ─────────────────────────────────────────────────────────────────────────────

/// Operations on the class/parameter/service constraint graph.
///
/// Every failed round trip is returned as an error; no implementation
/// substitutes an empty or neutral answer.
#[async_trait]
pub trait ConstraintGraph: Send + Sync {
    /// Declare a parameter node and its outgoing edges.
    async fn add_parameter(&self, parameter: &Parameter) -> Result<()>;

    /// Replace every outgoing edge of the parameter in one statement.
    async fn update_parameter(&self, parameter: &Parameter) -> Result<()>;

    /// Remove every triple with the parameter as subject.
    async fn delete_parameter(&self, code: &ParameterCode) -> Result<()>;

    /// Allowed classes and contradictions, each read from both edge directions.
    async fn parameter_constraints(&self, code: &ParameterCode) -> Result<ParameterConstraints>;

    async fn add_class(&self, class: &Class) -> Result<()>;

    async fn update_class(&self, class: &Class) -> Result<()>;

    async fn delete_class(&self, class_id: ClassId) -> Result<()>;

    /// Allowed parameters of the class, both edge directions.
    async fn class_constraints(&self, class_id: ClassId) -> Result<Vec<ParameterCode>>;

    /// Write the service fact set (`hasClass`, `hasParameter*`).
    async fn add_service(&self, service: &Service) -> Result<()>;

    /// Codes of `codes` that contradict another member of `codes`, distinct and sorted.
    async fn contradicting_parameters(&self, codes: &[ParameterCode]) -> Result<Vec<ParameterCode>>;

    /// Distinct members of `codes` the class allows.
    async fn allowed_parameter_count(&self, class_id: ClassId, codes: &[ParameterCode])
    -> Result<usize>;

    /// Classes overlapping `codes`, ordered by overlap descending.
    async fn candidate_classes(
        &self,
        service_id: ServiceId,
        codes: &[ParameterCode],
    ) -> Result<Vec<ProposedClass>>;
}
