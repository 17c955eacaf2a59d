use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use taxon_types::{ClassId, ClassRecord, NewService, ParameterCode, ParameterRecord, Service, ServiceId};
use tokio::sync::RwLock;

use super::{ClassRepository, ParameterRepository, ServiceRepository};
use crate::errors::{ClassifyError, Result};

#[derive(Debug, Default)]
struct Tables {
    services: BTreeMap<ServiceId, Service>,
    classes: BTreeMap<ClassId, ClassRecord>,
    parameters: BTreeMap<ParameterCode, ParameterRecord>,
    next_service_id: u64,
}

/// All three repositories over `RwLock`-guarded maps. Service ids are
/// assigned sequentially from 1.
#[derive(Debug, Default)]
pub struct InMemoryRepository {
    tables: RwLock<Tables>,
}

fn page<T: Clone>(rows: impl Iterator<Item = T>, offset: usize, limit: usize) -> Vec<T> {
    rows.skip(offset).take(limit).collect()
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the parameter table with untitled rows for `codes`.
    pub fn with_parameters<'a>(codes: impl IntoIterator<Item = &'a str>) -> Self {
        let parameters = codes
            .into_iter()
            .map(|code| {
                let code = ParameterCode::from(code);
                let record = ParameterRecord {
                    code: code.clone(),
                    title: String::new(),
                };
                (code, record)
            })
            .collect();
        Self {
            tables: RwLock::new(Tables {
                parameters,
                ..Default::default()
            }),
        }
    }
}

#[async_trait]
impl ServiceRepository for InMemoryRepository {
    async fn create(&self, service: NewService) -> Result<Service> {
        let mut tables = self.tables.write().await;
        tables.next_service_id = tables
            .next_service_id
            .checked_add(1)
            .ok_or_else(|| ClassifyError::repository("service id space exhausted"))?;
        let service = Service {
            id: ServiceId(tables.next_service_id),
            title: service.title,
            parameters: service.parameters,
            class_id: None,
            created_at: Utc::now(),
            approved_at: None,
        };
        tables.services.insert(service.id, service.clone());
        Ok(service)
    }

    async fn get(&self, id: ServiceId) -> Result<Option<Service>> {
        Ok(self.tables.read().await.services.get(&id).cloned())
    }

    async fn update(&self, service: &Service) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.services.get_mut(&service.id) {
            Some(row) => {
                *row = service.clone();
                Ok(())
            }
            None => Err(ClassifyError::ServiceNotFound {
                service_id: service.id,
            }),
        }
    }

    async fn delete(&self, id: ServiceId) -> Result<()> {
        self.tables
            .write()
            .await
            .services
            .remove(&id)
            .map(|_| ())
            .ok_or(ClassifyError::ServiceNotFound { service_id: id })
    }

    async fn list(&self, offset: usize, limit: usize) -> Result<Vec<Service>> {
        let tables = self.tables.read().await;
        Ok(page(tables.services.values().cloned(), offset, limit))
    }

    async fn find_by_class_id(&self, class_id: ClassId) -> Result<Vec<Service>> {
        let tables = self.tables.read().await;
        Ok(tables
            .services
            .values()
            .filter(|s| s.class_id == Some(class_id))
            .cloned()
            .collect())
    }

    async fn find_by_parameter_id(&self, code: &ParameterCode) -> Result<Vec<Service>> {
        let tables = self.tables.read().await;
        Ok(tables
            .services
            .values()
            .filter(|s| s.has_parameter(code))
            .cloned()
            .collect())
    }

    async fn assign_tentative_class(&self, id: ServiceId, class_id: ClassId) -> Result<bool> {
        let mut tables = self.tables.write().await;
        let service = tables
            .services
            .get_mut(&id)
            .ok_or(ClassifyError::ServiceNotFound { service_id: id })?;
        if service.is_approved() {
            return Ok(false);
        }
        service.class_id = Some(class_id);
        Ok(true)
    }

    async fn commit_approval(
        &self,
        id: ServiceId,
        class_id: ClassId,
        approved_at: DateTime<Utc>,
    ) -> Result<Service> {
        let mut tables = self.tables.write().await;
        let service = tables
            .services
            .get_mut(&id)
            .ok_or(ClassifyError::ServiceNotFound { service_id: id })?;
        if service.is_approved() {
            return Err(ClassifyError::AlreadyApproved { service_id: id });
        }
        service.class_id = Some(class_id);
        service.approved_at = Some(approved_at);
        Ok(service.clone())
    }

    async fn revert_approval(
        &self,
        id: ServiceId,
        approved_at: DateTime<Utc>,
        class_id: Option<ClassId>,
    ) -> Result<()> {
        let mut tables = self.tables.write().await;
        let service = tables
            .services
            .get_mut(&id)
            .ok_or(ClassifyError::ServiceNotFound { service_id: id })?;
        if service.approved_at != Some(approved_at) {
            return Err(ClassifyError::repository(format!(
                "service {id} no longer carries the approval being reverted"
            )));
        }
        service.approved_at = None;
        service.class_id = class_id;
        Ok(())
    }
}

#[async_trait]
impl ClassRepository for InMemoryRepository {
    async fn create(&self, class: ClassRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.classes.contains_key(&class.id) {
            return Err(ClassifyError::DuplicateClass { class_id: class.id });
        }
        tables.classes.insert(class.id, class);
        Ok(())
    }

    async fn get(&self, id: ClassId) -> Result<Option<ClassRecord>> {
        Ok(self.tables.read().await.classes.get(&id).cloned())
    }

    async fn update(&self, class: ClassRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.classes.get_mut(&class.id) {
            Some(row) => {
                *row = class;
                Ok(())
            }
            None => Err(ClassifyError::ClassNotFound { class_id: class.id }),
        }
    }

    async fn delete(&self, id: ClassId) -> Result<()> {
        self.tables
            .write()
            .await
            .classes
            .remove(&id)
            .map(|_| ())
            .ok_or(ClassifyError::ClassNotFound { class_id: id })
    }

    async fn list(&self, offset: usize, limit: usize) -> Result<Vec<ClassRecord>> {
        let tables = self.tables.read().await;
        Ok(page(tables.classes.values().cloned(), offset, limit))
    }
}

#[async_trait]
impl ParameterRepository for InMemoryRepository {
    async fn create(&self, parameter: ParameterRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        if tables.parameters.contains_key(&parameter.code) {
            return Err(ClassifyError::DuplicateParameter {
                code: parameter.code,
            });
        }
        tables.parameters.insert(parameter.code.clone(), parameter);
        Ok(())
    }

    async fn get(&self, code: &ParameterCode) -> Result<Option<ParameterRecord>> {
        Ok(self.tables.read().await.parameters.get(code).cloned())
    }

    async fn update(&self, parameter: ParameterRecord) -> Result<()> {
        let mut tables = self.tables.write().await;
        match tables.parameters.get_mut(&parameter.code) {
            Some(row) => {
                *row = parameter;
                Ok(())
            }
            None => Err(ClassifyError::ParameterNotFound {
                code: parameter.code,
            }),
        }
    }

    async fn delete(&self, code: &ParameterCode) -> Result<()> {
        self.tables
            .write()
            .await
            .parameters
            .remove(code)
            .map(|_| ())
            .ok_or_else(|| ClassifyError::ParameterNotFound { code: code.clone() })
    }

    async fn list(&self, offset: usize, limit: usize) -> Result<Vec<ParameterRecord>> {
        let tables = self.tables.read().await;
        Ok(page(tables.parameters.values().cloned(), offset, limit))
    }

    async fn list_supported_codes(&self) -> Result<Vec<ParameterCode>> {
        Ok(self.tables.read().await.parameters.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn service_ids_are_sequential() {
        let repo = InMemoryRepository::new();
        let a = ServiceRepository::create(&repo, NewService::new("a", ["sms"]))
            .await
            .unwrap();
        let b = ServiceRepository::create(&repo, NewService::new("b", ["mms"]))
            .await
            .unwrap();
        assert_eq!((a.id, b.id), (ServiceId(1), ServiceId(2)));
        assert_eq!(
            repo.find_by_parameter_id(&"mms".into()).await.unwrap(),
            vec![b]
        );
    }

    #[tokio::test]
    async fn tentative_class_never_overwrites_approval() {
        let repo = InMemoryRepository::new();
        let service = ServiceRepository::create(&repo, NewService::new("tv", ["fix_ctv"]))
            .await
            .unwrap();

        assert!(repo.assign_tentative_class(service.id, ClassId(1)).await.unwrap());
        let approved = repo
            .commit_approval(service.id, ClassId(2), Utc::now())
            .await
            .unwrap();
        assert_eq!(approved.class_id, Some(ClassId(2)));

        assert!(!repo.assign_tentative_class(service.id, ClassId(1)).await.unwrap());
        let err = repo
            .commit_approval(service.id, ClassId(3), Utc::now())
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifyError::AlreadyApproved { .. }));

        let stored = ServiceRepository::get(&repo, service.id).await.unwrap().unwrap();
        assert_eq!(stored.class_id, Some(ClassId(2)));
    }

    #[tokio::test]
    async fn revert_only_undoes_the_matching_approval() {
        let repo = InMemoryRepository::new();
        let service = ServiceRepository::create(&repo, NewService::new("sms", ["sms"]))
            .await
            .unwrap();
        repo.assign_tentative_class(service.id, ClassId(1)).await.unwrap();

        let first = Utc::now();
        repo.commit_approval(service.id, ClassId(2), first).await.unwrap();
        let stale = first - chrono::TimeDelta::try_seconds(1).unwrap();
        let err = repo
            .revert_approval(service.id, stale, Some(ClassId(1)))
            .await
            .unwrap_err();
        assert_eq!(err.category().as_str(), "REPOSITORY_ERROR");
        assert!(ServiceRepository::get(&repo, service.id).await.unwrap().unwrap().is_approved());

        repo.revert_approval(service.id, first, Some(ClassId(1)))
            .await
            .unwrap();
        let stored = ServiceRepository::get(&repo, service.id).await.unwrap().unwrap();
        assert_eq!((stored.class_id, stored.approved_at), (Some(ClassId(1)), None));
    }

    #[tokio::test]
    async fn exhausted_id_space_is_a_repository_error() {
        let repo = InMemoryRepository::new();
        repo.tables.write().await.next_service_id = u64::MAX;
        let err = ServiceRepository::create(&repo, NewService::new("last", ["sms"]))
            .await
            .unwrap_err();
        assert!(matches!(err, ClassifyError::Repository { .. }), "{err:?}");
        assert!(ServiceRepository::list(&repo, 0, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn duplicates_and_paging() {
        let repo = InMemoryRepository::with_parameters(["sms", "mms", "geo"]);
        let err = ParameterRepository::create(
            &repo,
            ParameterRecord {
                code: "sms".into(),
                title: "SMS".into(),
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ClassifyError::DuplicateParameter { .. }));

        let second_page = ParameterRepository::list(&repo, 1, 1).await.unwrap();
        assert_eq!(second_page[0].code.as_str(), "mms");
        assert_eq!(repo.list_supported_codes().await.unwrap().len(), 3);
    }
}
