//! External class predictor
//!
//! The predictor is an opaque HTTP service: it receives the one-hot feature
//! vector and answers with candidate classes, most likely first.

use std::time::Instant;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use taxon_types::ClassId;
use tracing::debug;

use crate::config::PredictorConfig;
use crate::errors::{ClassifyError, Result};
use crate::features::FeatureVector;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Prediction {
    pub class_id: ClassId,
    pub probability: f64,
}

/// Anything that can rank classes for a feature vector.
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Candidate classes in the order the predictor ranked them.
    async fn predict(&self, features: &FeatureVector) -> Result<Vec<Prediction>>;
}

#[derive(Debug, Deserialize)]
struct PredictionResponse {
    #[serde(default)]
    predictions: Vec<Value>,
}

/// [`Predictor`] over HTTP with a bearer token.
#[derive(Debug, Clone)]
pub struct HttpPredictor {
    client: Client,
    url: String,
    token: String,
    class_id_field: String,
}

impl HttpPredictor {
    pub fn new(config: &PredictorConfig) -> Result<Self> {
        if config.url.trim().is_empty() {
            return Err(ClassifyError::config("predictor.url is empty"));
        }
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| ClassifyError::config_with_source("failed to build predictor client", e))?;
        Ok(Self {
            client,
            url: config.url.clone(),
            token: config.token.clone(),
            class_id_field: config.class_id_field.clone(),
        })
    }

    fn decode_entry(&self, entry: &Value) -> Result<Prediction> {
        let class_id = entry
            .get(&self.class_id_field)
            .and_then(Value::as_u64)
            .ok_or_else(|| {
                ClassifyError::predictor(format!(
                    "prediction lacks a non-negative integer {:?}: {entry}",
                    self.class_id_field
                ))
            })?;
        let probability = entry
            .get("probability")
            .and_then(Value::as_f64)
            .ok_or_else(|| ClassifyError::predictor(format!("prediction lacks probability: {entry}")))?;
        Ok(Prediction {
            class_id: ClassId(class_id),
            probability,
        })
    }
}

#[async_trait]
impl Predictor for HttpPredictor {
    async fn predict(&self, features: &FeatureVector) -> Result<Vec<Prediction>> {
        let start = Instant::now();
        let response = self
            .client
            .post(&self.url)
            .bearer_auth(&self.token)
            .json(features)
            .send()
            .await
            .map_err(|e| ClassifyError::predictor_with_source(format!("POST {}", self.url), e))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifyError::predictor(format!(
                "predictor returned {}: {body}",
                status.as_u16()
            )));
        }

        let parsed: PredictionResponse = response
            .json()
            .await
            .map_err(|e| ClassifyError::predictor_with_source("malformed predictor response", e))?;
        let predictions = parsed
            .predictions
            .iter()
            .map(|entry| self.decode_entry(entry))
            .collect::<Result<Vec<_>>>()?;

        debug!(
            url = %self.url,
            predictions = predictions.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "predictor round trip complete"
        );
        Ok(predictions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::FeatureSchema;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::Mock;
    use wiremock::MockServer;
    use wiremock::ResponseTemplate;
    use wiremock::matchers::body_json;
    use wiremock::matchers::header;
    use wiremock::matchers::method;

    fn config(url: String, field: &str) -> PredictorConfig {
        PredictorConfig {
            url,
            token: "tkn".to_string(),
            class_id_field: field.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn posts_one_hot_payload_with_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("authorization", "Bearer tkn"))
            .and(body_json(json!({"fix_ctv": 1, "voice_fix": 1, "sms": 0})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "predictions": [
                    {"group_id": 3311, "probability": 0.9},
                    {"group_id": 12, "probability": 0.05}
                ]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let schema = FeatureSchema::new(1, ["fix_ctv", "voice_fix", "sms"]);
        let features = schema.encode(&["fix_ctv".into(), "voice_fix".into()]);
        let predictor = HttpPredictor::new(&config(server.uri(), "group_id")).unwrap();
        let predictions = predictor.predict(&features).await.unwrap();
        assert_eq!(
            predictions,
            vec![
                Prediction {
                    class_id: ClassId(3311),
                    probability: 0.9
                },
                Prediction {
                    class_id: ClassId(12),
                    probability: 0.05
                },
            ]
        );
    }

    #[tokio::test]
    async fn reads_configured_class_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "predictions": [{"class_id": 7, "probability": 0.5}]
            })))
            .mount(&server)
            .await;

        let features = FeatureSchema::new(1, ["sms"]).encode(&[]);
        let predictor = HttpPredictor::new(&config(server.uri(), "class_id")).unwrap();
        assert_eq!(predictor.predict(&features).await.unwrap()[0].class_id, ClassId(7));

        let wrong_field = HttpPredictor::new(&config(server.uri(), "group_id")).unwrap();
        assert!(wrong_field.predict(&features).await.is_err());
    }

    #[tokio::test]
    async fn non_ok_status_carries_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("model warming up"))
            .mount(&server)
            .await;

        let features = FeatureSchema::new(1, ["sms"]).encode(&[]);
        let predictor = HttpPredictor::new(&config(server.uri(), "group_id")).unwrap();
        let err = predictor.predict(&features).await.unwrap_err();
        assert!(err.to_string().contains("model warming up"));
        assert_eq!(err.category(), crate::errors::ErrorCategory::Upstream);
    }

    #[test]
    fn empty_url_is_rejected() {
        assert!(HttpPredictor::new(&PredictorConfig::default()).is_err());
    }
}
