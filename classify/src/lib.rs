//! Service classification
//!
//! Validates telecom service parameter sets against the constraint graph,
//! proposes and predicts classes, and drives a service from creation to an
//! approved class.
//!
//! - `validator`: contradiction and class-coverage checks
//! - `recommender`: ranked candidate classes for a service
//! - `orchestrator`: create/classify/approve lifecycle with background prediction
//! - `catalog`: administration of classes and parameters across row and graph

#![deny(clippy::print_stdout, clippy::print_stderr)]

pub mod catalog;
pub mod config;
pub mod errors;
pub mod features;
pub mod orchestrator;
pub mod predictor;
pub mod recommender;
pub mod repository;
pub mod validator;

pub use catalog::ConstraintCatalog;
pub use config::TaxonConfig;
pub use errors::{ClassifyError, ErrorCategory, Result};
pub use features::{FeatureSchema, FeatureVector};
pub use orchestrator::{
    ClassSuggester, ClassificationEvent, ClassificationOrchestrator, ClassificationOutcome,
    ClassificationTask, CreatedService, Suggestion,
};
pub use predictor::{HttpPredictor, Prediction, Predictor};
pub use recommender::ClassificationRecommender;
pub use repository::{
    ClassRepository, InMemoryRepository, ParameterRepository, Repositories, ServiceRepository,
};
pub use validator::{ConstraintValidator, parameter_set};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
