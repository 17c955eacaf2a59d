use async_trait::async_trait;
use taxon_types::{Class, ClassId, Parameter, ParameterCode, ProposedClass, Service, ServiceId};
use tracing::debug;

use crate::client::{GraphEndpoint, SparqlClient};
use crate::error::{GraphError, Result};
use crate::query::{self, vars};
use crate::results::{IriDecoder, count, required, value};
use crate::statement::{Description, Node, Statement};
use crate::{ConstraintGraph, ParameterConstraints};

/// [`ConstraintGraph`] backed by a SPARQL 1.1 endpoint over HTTP.
#[derive(Debug, Clone)]
pub struct SparqlGraph {
    client: SparqlClient,
}

impl SparqlGraph {
    pub fn new(endpoint: GraphEndpoint) -> Result<Self> {
        Ok(Self {
            client: SparqlClient::new(endpoint)?,
        })
    }

    pub fn from_client(client: SparqlClient) -> Self {
        Self { client }
    }

    fn prefix(&self) -> &str {
        self.client.prefix()
    }

    fn decoder(&self) -> IriDecoder<'_> {
        IriDecoder::new(self.prefix())
    }

    async fn execute(&self, statement: Statement) -> Result<()> {
        debug!(subject = %statement.subject(), "applying graph statement");
        self.client.update(statement.render(self.prefix())).await
    }

    async fn parameters_bound_to(&self, query: String, var: &str) -> Result<Vec<ParameterCode>> {
        let results = self.client.select(query).await?;
        let decoder = self.decoder();
        let mut codes = results
            .rows()
            .iter()
            .filter_map(|row| value(row, var))
            .map(|iri| decoder.parameter(iri))
            .collect::<Result<Vec<_>>>()?;
        codes.sort();
        codes.dedup();
        Ok(codes)
    }
}

#[async_trait]
impl ConstraintGraph for SparqlGraph {
    async fn add_parameter(&self, parameter: &Parameter) -> Result<()> {
        self.execute(Statement::InsertData(Description::parameter(parameter)))
            .await
    }

    async fn update_parameter(&self, parameter: &Parameter) -> Result<()> {
        self.execute(Statement::Replace(Description::parameter(parameter)))
            .await
    }

    async fn delete_parameter(&self, code: &ParameterCode) -> Result<()> {
        self.execute(Statement::DeleteSubject(Node::from(code))).await
    }

    async fn parameter_constraints(&self, code: &ParameterCode) -> Result<ParameterConstraints> {
        let contradiction_parameters = self
            .parameters_bound_to(
                query::parameter_contradictions(self.prefix(), code),
                vars::CONTRADICTION,
            )
            .await?;

        let results = self
            .client
            .select(query::parameter_allowed_classes(self.prefix(), code))
            .await?;
        let decoder = self.decoder();
        let mut allowed_classes = results
            .rows()
            .iter()
            .filter_map(|row| value(row, vars::CLASS))
            .map(|iri| decoder.class(iri))
            .collect::<Result<Vec<_>>>()?;
        allowed_classes.sort();
        allowed_classes.dedup();

        Ok(ParameterConstraints {
            allowed_classes,
            contradiction_parameters,
        })
    }

    async fn add_class(&self, class: &Class) -> Result<()> {
        self.execute(Statement::InsertData(Description::class(class)))
            .await
    }

    async fn update_class(&self, class: &Class) -> Result<()> {
        self.execute(Statement::Replace(Description::class(class)))
            .await
    }

    async fn delete_class(&self, class_id: ClassId) -> Result<()> {
        self.execute(Statement::DeleteSubject(Node::from(class_id)))
            .await
    }

    async fn class_constraints(&self, class_id: ClassId) -> Result<Vec<ParameterCode>> {
        self.parameters_bound_to(
            query::class_allowed_parameters(self.prefix(), class_id),
            vars::ALLOWED_PARAM,
        )
        .await
    }

    async fn add_service(&self, service: &Service) -> Result<()> {
        self.execute(Statement::InsertData(Description::service(service)))
            .await
    }

    async fn contradicting_parameters(&self, codes: &[ParameterCode]) -> Result<Vec<ParameterCode>> {
        if codes.len() < 2 {
            return Ok(Vec::new());
        }
        self.parameters_bound_to(
            query::contradicting_parameters(self.prefix(), codes),
            vars::P1,
        )
        .await
    }

    async fn allowed_parameter_count(
        &self,
        class_id: ClassId,
        codes: &[ParameterCode],
    ) -> Result<usize> {
        if codes.is_empty() {
            return Ok(0);
        }
        let results = self
            .client
            .select(query::allowed_parameter_count(self.prefix(), class_id, codes))
            .await?;
        let row = results
            .rows()
            .first()
            .ok_or_else(|| GraphError::decode("aggregate query returned no rows", ""))?;
        count(required(row, vars::MATCHING)?)
    }

    async fn candidate_classes(
        &self,
        service_id: ServiceId,
        codes: &[ParameterCode],
    ) -> Result<Vec<ProposedClass>> {
        if codes.is_empty() {
            return Ok(Vec::new());
        }
        let results = self
            .client
            .select(query::candidate_classes(self.prefix(), service_id, codes))
            .await?;
        let decoder = self.decoder();

        let mut proposed = Vec::with_capacity(results.rows().len());
        for row in results.rows() {
            let class_id = decoder.class(required(row, vars::CLASS)?)?;
            let matching_parameters = count(required(row, vars::MATCHING_PARAMETERS)?)?;
            let similar_services = value(row, vars::SIMILAR_SERVICES)
                .unwrap_or_default()
                .split(',')
                .filter(|iri| !iri.is_empty())
                .map(|iri| decoder.service(iri))
                .collect::<Result<Vec<_>>>()?;
            proposed.push(ProposedClass {
                class_id,
                matching_parameters,
                similar_services,
            });
        }
        debug!(%service_id, candidates = proposed.len(), "candidate classes decoded");
        Ok(proposed)
    }
}
