//! Relational entity index
//!
//! The constraint graph only holds edges; titles, timestamps and the
//! service lifecycle live behind these traits. The production store is
//! external; `InMemoryRepository` backs tests and offline runs.

mod memory;

pub use memory::InMemoryRepository;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use taxon_types::{ClassId, ClassRecord, NewService, ParameterCode, ParameterRecord, Service, ServiceId};

use crate::errors::Result;

#[async_trait]
pub trait ServiceRepository: Send + Sync {
    /// Persist a new, unclassified service and assign its id.
    async fn create(&self, service: NewService) -> Result<Service>;

    async fn get(&self, id: ServiceId) -> Result<Option<Service>>;

    async fn update(&self, service: &Service) -> Result<()>;

    async fn delete(&self, id: ServiceId) -> Result<()>;

    async fn list(&self, offset: usize, limit: usize) -> Result<Vec<Service>>;

    async fn find_by_class_id(&self, class_id: ClassId) -> Result<Vec<Service>>;

    async fn find_by_parameter_id(&self, code: &ParameterCode) -> Result<Vec<Service>>;

    /// Set the class of a service that is not yet approved.
    ///
    /// Returns `false` without writing when the service was approved in the
    /// meantime; an approved class is never overwritten.
    async fn assign_tentative_class(&self, id: ServiceId, class_id: ClassId) -> Result<bool>;

    /// Finalise the class and approval time in one compare-and-set on
    /// `approved_at` being unset. Fails with `AlreadyApproved` otherwise.
    async fn commit_approval(
        &self,
        id: ServiceId,
        class_id: ClassId,
        approved_at: DateTime<Utc>,
    ) -> Result<Service>;

    /// Undo the approval committed at `approved_at`, restoring `class_id`.
    /// Fails with a repository error when the stored approval is a different one.
    async fn revert_approval(
        &self,
        id: ServiceId,
        approved_at: DateTime<Utc>,
        class_id: Option<ClassId>,
    ) -> Result<()>;
}

#[async_trait]
pub trait ClassRepository: Send + Sync {
    async fn create(&self, class: ClassRecord) -> Result<()>;

    async fn get(&self, id: ClassId) -> Result<Option<ClassRecord>>;

    async fn update(&self, class: ClassRecord) -> Result<()>;

    async fn delete(&self, id: ClassId) -> Result<()>;

    async fn list(&self, offset: usize, limit: usize) -> Result<Vec<ClassRecord>>;
}

#[async_trait]
pub trait ParameterRepository: Send + Sync {
    async fn create(&self, parameter: ParameterRecord) -> Result<()>;

    async fn get(&self, code: &ParameterCode) -> Result<Option<ParameterRecord>>;

    async fn update(&self, parameter: ParameterRecord) -> Result<()>;

    async fn delete(&self, code: &ParameterCode) -> Result<()>;

    async fn list(&self, offset: usize, limit: usize) -> Result<Vec<ParameterRecord>>;

    /// Every code the repository knows, sorted.
    async fn list_supported_codes(&self) -> Result<Vec<ParameterCode>>;
}

/// Repository collaborators.
#[derive(Clone)]
pub struct Repositories {
    pub services: Arc<dyn ServiceRepository>,
    pub classes: Arc<dyn ClassRepository>,
    pub parameters: Arc<dyn ParameterRepository>,
}

impl Repositories {
    /// All three roles served by one value.
    pub fn shared<R>(repo: Arc<R>) -> Self
    where
        R: ServiceRepository + ClassRepository + ParameterRepository + 'static,
    {
        Self {
            services: repo.clone(),
            classes: repo.clone(),
            parameters: repo,
        }
    }
}
