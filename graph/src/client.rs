//! HTTP transport to the SPARQL 1.1 endpoint
//!
//! Updates go to `{base_url}/update` and queries to `{base_url}/query`, both
//! as raw POST bodies with Basic Auth. The client holds no per-call state and
//! is shared freely between tasks.

use std::time::{Duration, Instant};

use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::results::SparqlResults;

pub const SPARQL_UPDATE: &str = "application/sparql-update";
pub const SPARQL_QUERY: &str = "application/sparql-query";
pub const SPARQL_RESULTS_JSON: &str = "application/sparql-results+json";

/// Default round-trip timeout, sized for batch-style updates.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Where and how to reach the graph store.
#[derive(Debug, Clone)]
pub struct GraphEndpoint {
    pub base_url: String,
    /// Namespace IRI every node name is resolved against.
    pub prefix: String,
    pub login: String,
    pub password: String,
    pub timeout: Duration,
}

impl GraphEndpoint {
    pub fn new(base_url: impl Into<String>, prefix: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            prefix: prefix.into(),
            login: String::new(),
            password: String::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_credentials(mut self, login: impl Into<String>, password: impl Into<String>) -> Self {
        self.login = login.into();
        self.password = password.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[derive(Debug, Clone)]
pub struct SparqlClient {
    client: Client,
    endpoint: GraphEndpoint,
}

impl SparqlClient {
    pub fn new(endpoint: GraphEndpoint) -> Result<Self> {
        if endpoint.base_url.trim().is_empty() {
            return Err(GraphError::Config("base_url is empty".to_string()));
        }
        let client = Client::builder()
            .timeout(endpoint.timeout)
            .build()
            .map_err(|err| GraphError::Config(format!("failed to build HTTP client: {err}")))?;
        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &GraphEndpoint {
        &self.endpoint
    }

    pub fn prefix(&self) -> &str {
        &self.endpoint.prefix
    }

    /// Run an update statement. Any 2xx counts as success.
    pub async fn update(&self, statement: String) -> Result<()> {
        self.post("update", SPARQL_UPDATE, statement).await?;
        Ok(())
    }

    /// Run a SELECT query and decode the tabular result.
    pub async fn select(&self, query: String) -> Result<SparqlResults> {
        let body = self.post("query", SPARQL_QUERY, query).await?;
        SparqlResults::parse(&body)
    }

    async fn post(&self, path: &str, content_type: &str, body: String) -> Result<String> {
        let url = format!("{}/{path}", self.endpoint.base_url.trim_end_matches('/'));
        debug!(%url, statement = %body, "graph round trip");

        let start = Instant::now();
        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, content_type)
            .header(ACCEPT, SPARQL_RESULTS_JSON)
            .basic_auth(&self.endpoint.login, Some(&self.endpoint.password))
            .body(body)
            .send()
            .await
            .map_err(|err| GraphError::transport(format!("POST {url}"), err))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|err| GraphError::transport(format!("reading response from {url}"), err))?;
        debug!(
            %url,
            status = status.as_u16(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "graph round trip complete"
        );

        if !status.is_success() {
            return Err(GraphError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(text)
    }
}
