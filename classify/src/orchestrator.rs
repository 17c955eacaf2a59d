//! Classification orchestrator
//!
//! Drives a service through `Unclassified -> TentativelyClassified ->
//! Approved`. Creation validates and persists synchronously, then hands the
//! predictor step to a bounded, tracked background task whose outcome can be
//! awaited or observed through a broadcast channel.
//!
//! The background task and a human approval may race on the same row. Both
//! writes go through guarded repository operations: a tentative class is
//! only written while `approved_at` is unset, and approval is a
//! compare-and-set on that same field.

use std::sync::Arc;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use taxon_graph::ConstraintGraph;
use taxon_types::{ClassId, NewService, ParameterCode, RankedClass, Service, ServiceId};
use tokio::sync::{Mutex, Semaphore, broadcast};
use tokio::task::JoinHandle;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::OrchestratorConfig;
use crate::errors::{ClassifyError, Result};
use crate::features::FeatureSchema;
use crate::predictor::{Prediction, Predictor};
use crate::recommender::ClassificationRecommender;
use crate::repository::{ClassRepository, Repositories, ServiceRepository};
use crate::validator::{ConstraintValidator, parameter_set};

/// Terminal result of one background classification attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ClassificationOutcome {
    /// Tentative class written.
    Classified { class_id: ClassId, probability: f64 },
    /// Predictor answered with no candidates.
    NoPrediction,
    /// Top candidate does not cover the service's parameters.
    Incompatible { class_id: ClassId },
    /// Service was approved before the tentative write landed.
    SkippedApproved,
    /// Any failure in the chain; the service is left unchanged.
    Failed { reason: String },
}

/// Outcome broadcast to subscribers.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationEvent {
    pub service_id: ServiceId,
    pub outcome: ClassificationOutcome,
}

/// Handle on one submitted background classification.
#[derive(Debug)]
pub struct ClassificationTask {
    service_id: ServiceId,
    handle: JoinHandle<ClassificationOutcome>,
}

impl ClassificationTask {
    pub fn service_id(&self) -> ServiceId {
        self.service_id
    }

    /// Wait for the attempt to finish.
    pub async fn wait(self) -> ClassificationOutcome {
        match self.handle.await {
            Ok(outcome) => outcome,
            Err(err) => ClassificationOutcome::Failed {
                reason: format!("classification task aborted: {err}"),
            },
        }
    }
}

#[derive(Debug)]
pub struct CreatedService {
    pub service: Service,
    /// Present when background classification was submitted.
    pub task: Option<ClassificationTask>,
}

/// Top prediction for a parameter set, cross-checked against the graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    pub prediction: Prediction,
    pub compatible: bool,
}

/// Predictor call plus graph re-validation, with no persistence.
#[derive(Clone)]
pub struct ClassSuggester {
    predictor: Arc<dyn Predictor>,
    schema: Arc<FeatureSchema>,
    validator: ConstraintValidator,
}

impl ClassSuggester {
    pub fn new(
        predictor: Arc<dyn Predictor>,
        schema: FeatureSchema,
        validator: ConstraintValidator,
    ) -> Self {
        Self {
            predictor,
            schema: Arc::new(schema),
            validator,
        }
    }

    pub fn schema(&self) -> &FeatureSchema {
        &self.schema
    }

    /// Ask the predictor and re-check its first candidate. `None` when the
    /// predictor had nothing to offer.
    pub async fn suggest(&self, codes: &[ParameterCode]) -> Result<Option<Suggestion>> {
        let features = self.schema.encode(codes);
        let predictions = self.predictor.predict(&features).await?;
        let Some(prediction) = predictions.first().copied() else {
            return Ok(None);
        };
        let compatible = self
            .validator
            .validate_class_compatibility(codes, prediction.class_id)
            .await?;
        Ok(Some(Suggestion {
            prediction,
            compatible,
        }))
    }
}

/// State shared with background tasks.
struct Background {
    suggester: ClassSuggester,
    services: Arc<dyn ServiceRepository>,
    classes: Arc<dyn ClassRepository>,
    events: broadcast::Sender<ClassificationEvent>,
}

pub struct ClassificationOrchestrator {
    repos: Repositories,
    graph: Arc<dyn ConstraintGraph>,
    validator: ConstraintValidator,
    recommender: ClassificationRecommender,
    background: Option<Arc<Background>>,
    auto_classify: bool,
    limiter: Arc<Semaphore>,
    tracker: TaskTracker,
    drain_lock: Mutex<()>,
    events: broadcast::Sender<ClassificationEvent>,
}

impl ClassificationOrchestrator {
    /// Orchestrator without a predictor; services stay unclassified until approved.
    pub fn new(
        graph: Arc<dyn ConstraintGraph>,
        repos: Repositories,
        settings: &OrchestratorConfig,
    ) -> Self {
        let (events, _) = broadcast::channel(64);
        let validator = ConstraintValidator::new(graph.clone());
        let recommender = ClassificationRecommender::new(graph.clone(), repos.classes.clone());
        Self {
            repos,
            graph,
            validator,
            recommender,
            background: None,
            auto_classify: settings.auto_classify,
            limiter: Arc::new(Semaphore::new(settings.max_concurrent_classifications.max(1))),
            tracker: TaskTracker::new(),
            drain_lock: Mutex::new(()),
            events,
        }
    }

    /// Enable background classification through `predictor`.
    ///
    /// Fails with a config error when `schema` lists codes the parameter
    /// repository does not know.
    pub async fn with_predictor(
        mut self,
        predictor: Arc<dyn Predictor>,
        schema: FeatureSchema,
    ) -> Result<Self> {
        let known = self.repos.parameters.list_supported_codes().await?;
        schema.validate_against(&known)?;
        let suggester = ClassSuggester::new(predictor, schema, self.validator.clone());
        self.background = Some(Arc::new(Background {
            suggester,
            services: self.repos.services.clone(),
            classes: self.repos.classes.clone(),
            events: self.events.clone(),
        }));
        Ok(self)
    }

    pub fn validator(&self) -> &ConstraintValidator {
        &self.validator
    }

    /// Subscribe to background classification outcomes.
    pub fn subscribe(&self) -> broadcast::Receiver<ClassificationEvent> {
        self.events.subscribe()
    }

    /// Number of background attempts not yet finished.
    pub fn in_flight(&self) -> usize {
        self.tracker.len()
    }

    /// Wait until every submitted background attempt has finished.
    ///
    /// Concurrent callers are serialized so the tracker is never reopened
    /// while another caller is still waiting on it.
    pub async fn drain(&self) {
        let _guard = self.drain_lock.lock().await;
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }

    /// Validate, persist as `Unclassified`, then submit background classification.
    pub async fn create(&self, new: NewService) -> Result<CreatedService> {
        let codes = parameter_set(&new.parameters);
        for code in &codes {
            if self.repos.parameters.get(code).await?.is_none() {
                return Err(ClassifyError::UnknownParameter { code: code.clone() });
            }
        }
        self.validator.ensure_consistent(&codes).await?;

        let service = self
            .repos
            .services
            .create(NewService {
                title: new.title,
                parameters: codes,
            })
            .await?;
        info!(service_id = %service.id, parameters = service.parameters.len(), "service created");

        let task = self.submit(&service);
        Ok(CreatedService { service, task })
    }

    fn submit(&self, service: &Service) -> Option<ClassificationTask> {
        if !self.auto_classify {
            return None;
        }
        let background = self.background.clone()?;
        let limiter = self.limiter.clone();
        let service_id = service.id;
        let codes = service.parameters.clone();

        let handle = self.tracker.spawn(async move {
            let outcome = match limiter.acquire_owned().await {
                Ok(_permit) => background.classify(service_id, &codes).await,
                Err(err) => ClassificationOutcome::Failed {
                    reason: format!("classification limiter closed: {err}"),
                },
            };
            // Ignore error if no subscribers
            let _ = background.events.send(ClassificationEvent {
                service_id,
                outcome: outcome.clone(),
            });
            outcome
        });
        debug!(%service_id, "background classification submitted");
        Some(ClassificationTask { service_id, handle })
    }

    /// Finalise the class of a service and record it in the graph.
    ///
    /// Uses `class_id` when given, otherwise the current (possibly tentative)
    /// class. A second approval is rejected.
    pub async fn approve(&self, service_id: ServiceId, class_id: Option<ClassId>) -> Result<Service> {
        let service = self.service(service_id).await?;
        if service.is_approved() {
            return Err(ClassifyError::AlreadyApproved { service_id });
        }

        let class_id = match class_id {
            Some(explicit) => {
                if self.repos.classes.get(explicit).await?.is_none() {
                    return Err(ClassifyError::ClassNotFound { class_id: explicit });
                }
                explicit
            }
            None => service
                .class_id
                .ok_or(ClassifyError::ClassRequired { service_id })?,
        };

        let approved_at = Utc::now();
        let approved = self
            .repos
            .services
            .commit_approval(service_id, class_id, approved_at)
            .await?;
        if let Err(err) = self.graph.add_service(&approved).await {
            warn!(%service_id, %class_id, error = %err, "graph write failed, reverting approval");
            if let Err(revert) = self
                .repos
                .services
                .revert_approval(service_id, approved_at, service.class_id)
                .await
            {
                warn!(%service_id, error = %revert, "approval revert failed");
            }
            return Err(err.into());
        }
        info!(%service_id, %class_id, "service approved");
        Ok(approved)
    }

    /// Ranked candidate classes for an existing service.
    pub async fn proposed_classes(&self, service_id: ServiceId) -> Result<Vec<RankedClass>> {
        let service = self.service(service_id).await?;
        self.recommender.proposed_classes(&service).await
    }

    pub async fn service(&self, service_id: ServiceId) -> Result<Service> {
        self.repos
            .services
            .get(service_id)
            .await?
            .ok_or(ClassifyError::ServiceNotFound { service_id })
    }

    pub async fn list_services(&self, offset: usize, limit: usize) -> Result<Vec<Service>> {
        self.repos.services.list(offset, limit).await
    }
}

impl Background {
    async fn classify(&self, service_id: ServiceId, codes: &[ParameterCode]) -> ClassificationOutcome {
        match self.try_classify(service_id, codes).await {
            Ok(outcome) => outcome,
            Err(err) => {
                warn!(
                    %service_id,
                    category = err.category().as_str(),
                    error = %err,
                    "background classification abandoned"
                );
                ClassificationOutcome::Failed {
                    reason: err.to_string(),
                }
            }
        }
    }

    async fn try_classify(
        &self,
        service_id: ServiceId,
        codes: &[ParameterCode],
    ) -> Result<ClassificationOutcome> {
        let Some(suggestion) = self.suggester.suggest(codes).await? else {
            info!(%service_id, "predictor returned no candidates");
            return Ok(ClassificationOutcome::NoPrediction);
        };
        let Prediction {
            class_id,
            probability,
        } = suggestion.prediction;

        if !suggestion.compatible {
            warn!(%service_id, %class_id, probability, "predicted class does not cover service parameters");
            return Ok(ClassificationOutcome::Incompatible { class_id });
        }
        if self.classes.get(class_id).await?.is_none() {
            return Err(ClassifyError::ClassNotFound { class_id });
        }

        if self
            .services
            .assign_tentative_class(service_id, class_id)
            .await?
        {
            info!(%service_id, %class_id, probability, "service tentatively classified");
            Ok(ClassificationOutcome::Classified {
                class_id,
                probability,
            })
        } else {
            info!(%service_id, %class_id, "service approved meanwhile, tentative class dropped");
            Ok(ClassificationOutcome::SkippedApproved)
        }
    }
}
