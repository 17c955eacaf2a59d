//! Administration of classes and parameters
//!
//! Keeps the entity repository and the constraint graph consistent through
//! one code path: rows carry identity and title, the graph carries edges.
//! Entities referenced by any service are frozen.

use std::sync::Arc;

use taxon_graph::ConstraintGraph;
use taxon_types::{Class, ClassId, ClassRecord, Parameter, ParameterCode, ParameterRecord};
use tracing::info;

use crate::errors::{ClassifyError, Result};
use crate::repository::Repositories;

pub struct ConstraintCatalog {
    graph: Arc<dyn ConstraintGraph>,
    repos: Repositories,
}

impl ConstraintCatalog {
    pub fn new(graph: Arc<dyn ConstraintGraph>, repos: Repositories) -> Self {
        Self { graph, repos }
    }

    async fn ensure_known(&self, codes: &[ParameterCode]) -> Result<()> {
        for code in codes {
            if self.repos.parameters.get(code).await?.is_none() {
                return Err(ClassifyError::UnknownParameter { code: code.clone() });
            }
        }
        Ok(())
    }

    async fn ensure_class_unused(&self, class_id: ClassId) -> Result<()> {
        if self.repos.services.find_by_class_id(class_id).await?.is_empty() {
            Ok(())
        } else {
            Err(ClassifyError::ClassInUse { class_id })
        }
    }

    async fn ensure_parameter_unused(&self, code: &ParameterCode) -> Result<()> {
        if self.repos.services.find_by_parameter_id(code).await?.is_empty() {
            Ok(())
        } else {
            Err(ClassifyError::ParameterInUse { code: code.clone() })
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Classes
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn create_class(&self, class: Class) -> Result<Class> {
        self.ensure_known(&class.allowed_parameters).await?;
        self.repos.classes.create(class.record()).await?;
        self.graph.add_class(&class).await?;
        info!(class_id = %class.id, allowed = class.allowed_parameters.len(), "class created");
        Ok(class)
    }

    /// Row merged with the class's allowed parameters from the graph.
    pub async fn class(&self, class_id: ClassId) -> Result<Class> {
        let ClassRecord { id, title } = self
            .repos
            .classes
            .get(class_id)
            .await?
            .ok_or(ClassifyError::ClassNotFound { class_id })?;
        let allowed_parameters = self.graph.class_constraints(id).await?;
        Ok(Class {
            id,
            title,
            allowed_parameters,
        })
    }

    /// Replace a class. A different `class.id` renames it: the old row and
    /// node are removed and the new ones created.
    pub async fn update_class(&self, class_id: ClassId, class: Class) -> Result<Class> {
        self.ensure_class_unused(class_id).await?;
        if self.repos.classes.get(class_id).await?.is_none() {
            return Err(ClassifyError::ClassNotFound { class_id });
        }
        self.ensure_known(&class.allowed_parameters).await?;

        if class.id != class_id {
            if self.repos.classes.get(class.id).await?.is_some() {
                return Err(ClassifyError::DuplicateClass { class_id: class.id });
            }
            self.repos.classes.delete(class_id).await?;
            self.graph.delete_class(class_id).await?;
            self.repos.classes.create(class.record()).await?;
            self.graph.add_class(&class).await?;
            info!(from = %class_id, to = %class.id, "class renamed");
        } else {
            self.repos.classes.update(class.record()).await?;
            self.graph.update_class(&class).await?;
            info!(%class_id, "class updated");
        }
        Ok(class)
    }

    pub async fn delete_class(&self, class_id: ClassId) -> Result<()> {
        self.ensure_class_unused(class_id).await?;
        self.repos.classes.delete(class_id).await?;
        self.graph.delete_class(class_id).await?;
        info!(%class_id, "class deleted");
        Ok(())
    }

    pub async fn list_classes(&self, offset: usize, limit: usize) -> Result<Vec<ClassRecord>> {
        self.repos.classes.list(offset, limit).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Parameters
    // ─────────────────────────────────────────────────────────────────────────

    pub async fn create_parameter(&self, parameter: Parameter) -> Result<Parameter> {
        self.ensure_known(&parameter.contradiction_parameters).await?;
        self.repos.parameters.create(parameter.record()).await?;
        self.graph.add_parameter(&parameter).await?;
        info!(code = %parameter.code, "parameter created");
        Ok(parameter)
    }

    /// Row merged with the parameter's constraints from the graph.
    pub async fn parameter(&self, code: &ParameterCode) -> Result<Parameter> {
        let ParameterRecord { code, title } = self
            .repos
            .parameters
            .get(code)
            .await?
            .ok_or_else(|| ClassifyError::ParameterNotFound { code: code.clone() })?;
        let constraints = self.graph.parameter_constraints(&code).await?;
        Ok(Parameter {
            code,
            title,
            allowed_classes: constraints.allowed_classes,
            contradiction_parameters: constraints.contradiction_parameters,
        })
    }

    /// Replace a parameter. A different `parameter.code` renames it.
    pub async fn update_parameter(&self, code: &ParameterCode, parameter: Parameter) -> Result<Parameter> {
        self.ensure_parameter_unused(code).await?;
        if self.repos.parameters.get(code).await?.is_none() {
            return Err(ClassifyError::ParameterNotFound { code: code.clone() });
        }
        self.ensure_known(&parameter.contradiction_parameters).await?;

        if &parameter.code != code {
            if self.repos.parameters.get(&parameter.code).await?.is_some() {
                return Err(ClassifyError::DuplicateParameter {
                    code: parameter.code,
                });
            }
            self.repos.parameters.delete(code).await?;
            self.graph.delete_parameter(code).await?;
            self.repos.parameters.create(parameter.record()).await?;
            self.graph.add_parameter(&parameter).await?;
            info!(from = %code, to = %parameter.code, "parameter renamed");
        } else {
            self.repos.parameters.update(parameter.record()).await?;
            self.graph.update_parameter(&parameter).await?;
            info!(%code, "parameter updated");
        }
        Ok(parameter)
    }

    pub async fn delete_parameter(&self, code: &ParameterCode) -> Result<()> {
        self.ensure_parameter_unused(code).await?;
        self.repos.parameters.delete(code).await?;
        self.graph.delete_parameter(code).await?;
        info!(%code, "parameter deleted");
        Ok(())
    }

    pub async fn list_parameters(&self, offset: usize, limit: usize) -> Result<Vec<ParameterRecord>> {
        self.repos.parameters.list(offset, limit).await
    }
}
