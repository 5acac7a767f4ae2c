//! Model registry: the closed allowlist behind dynamic dispatch.
//!
//! Every model reachable through the dynamic operation layer is declared
//! here at process start. A request naming anything else fails with
//! `ModelNotFound` before the persistence layer is touched, which is the
//! central security property of this subsystem: the model name is
//! attacker-influenced input.

use crate::errors::CrudError;
use crate::models::OperationKind;
use crate::provider::PersistenceProvider;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

const DEFAULT_PAGE_SIZE: u64 = 20;

/// A relation that `include` can expand on a model's records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationDescriptor {
    /// Relation name as it appears in `include` and on returned records.
    pub name: String,
    /// Registered name of the related model.
    pub target: String,
    /// Field on this model holding the join value.
    pub local_key: String,
    /// Field on the related model compared against `local_key`.
    pub foreign_key: String,
    /// Whether the relation expands to an array rather than a single record.
    pub to_many: bool,
}

/// Static description of one logical data model.
///
/// Created at process start, immutable thereafter, looked up by name on
/// every request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Canonical model name, e.g. `Task`.
    pub name: String,
    /// Backing collection/table name.
    pub table: String,
    /// Primary identifier field.
    pub id_field: String,
    /// Fields declared unique besides the identifier.
    pub unique_fields: Vec<String>,
    /// Field names safe to select when a request carries no `select`.
    pub default_fields: Vec<String>,
    /// Page size applied when a paged call carries no usable `limit`.
    pub default_page_size: u64,
    /// Read-only models reject every mutation kind.
    pub read_only: bool,
    /// Relations available for `include` expansion.
    pub relations: Vec<RelationDescriptor>,
}

impl ModelDescriptor {
    #[must_use]
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            id_field: "id".to_string(),
            unique_fields: Vec::new(),
            default_fields: vec![
                "id".to_string(),
                "created_at".to_string(),
                "updated_at".to_string(),
            ],
            default_page_size: DEFAULT_PAGE_SIZE,
            read_only: false,
            relations: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }

    #[must_use]
    pub fn with_unique_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_default_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.default_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_default_page_size(mut self, size: u64) -> Self {
        self.default_page_size = size;
        self
    }

    #[must_use]
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    #[must_use]
    pub fn with_relation(mut self, relation: RelationDescriptor) -> Self {
        self.relations.push(relation);
        self
    }

    /// Whether this model permits the given operation kind.
    #[must_use]
    pub const fn supports(&self, operation: OperationKind) -> bool {
        !(self.read_only && operation.is_mutation())
    }

    /// Whether a set of equality fields can identify at most one record.
    #[must_use]
    pub fn identifies_unique(&self, fields: &[&str]) -> bool {
        fields.iter().any(|field| {
            *field == self.id_field || self.unique_fields.iter().any(|unique| unique == field)
        })
    }

    /// Look up a relation by its `include` name.
    #[must_use]
    pub fn relation(&self, name: &str) -> Option<&RelationDescriptor> {
        self.relations.iter().find(|relation| relation.name == name)
    }
}

/// A registry entry: descriptor plus the persistence accessor bound to it.
#[derive(Clone)]
pub struct RegisteredModel {
    pub descriptor: ModelDescriptor,
    pub provider: Arc<dyn PersistenceProvider>,
}

/// Builder for [`ModelRegistry`]. Registration happens once at startup;
/// `build` freezes the table.
#[derive(Default)]
pub struct ModelRegistryBuilder {
    models: HashMap<String, RegisteredModel>,
}

impl ModelRegistryBuilder {
    /// Register a model. Every model name must have exactly one entry;
    /// registering a name twice replaces the earlier entry.
    #[must_use]
    pub fn register(
        mut self,
        descriptor: ModelDescriptor,
        provider: Arc<dyn PersistenceProvider>,
    ) -> Self {
        let name = descriptor.name.clone();
        if self
            .models
            .insert(name.clone(), RegisteredModel { descriptor, provider })
            .is_some()
        {
            tracing::warn!(model = %name, "model registered twice; keeping the later entry");
        }
        self
    }

    #[must_use]
    pub fn build(self) -> ModelRegistry {
        ModelRegistry {
            models: self.models,
        }
    }
}

/// Immutable model-name → accessor table. Safe for unsynchronized
/// concurrent reads once built.
pub struct ModelRegistry {
    models: HashMap<String, RegisteredModel>,
}

impl ModelRegistry {
    #[must_use]
    pub fn builder() -> ModelRegistryBuilder {
        ModelRegistryBuilder::default()
    }

    /// Look up a model, failing with `ModelNotFound` for unknown names.
    ///
    /// # Errors
    ///
    /// Returns `CrudError::ModelNotFound` if the name has no entry.
    pub fn resolve(&self, name: &str) -> Result<&RegisteredModel, CrudError> {
        self.models
            .get(name)
            .ok_or_else(|| CrudError::model_not_found(name))
    }

    /// Look up a model without converting the miss into an error.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RegisteredModel> {
        self.models.get(name)
    }

    /// Registered model names, unordered.
    pub fn model_names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.models.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
