//! Shared domain types for the service classification workspace.
//!
//! Services are billing line-items carrying a set of boolean parameters.
//! Classes (also called groups) are the buckets services are filed under.
//! The constraint graph relates classes and parameters; these types are the
//! vocabulary every other crate speaks.

mod entity;
mod ids;
mod proposal;
pub mod vocabulary;

pub use entity::{Class, ClassRecord, NewService, Parameter, ParameterRecord, Service, ServiceState};
pub use ids::{ClassId, ParameterCode, ServiceId};
pub use proposal::{ProposedClass, RankedClass};
