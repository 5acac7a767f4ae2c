//! Per-model convenience wrapper over the operation router.

use crate::errors::CrudError;
use crate::filter::Filter;
use crate::models::{OperationKind, OperationOutcome, OperationRequest};
use crate::router::OperationRouter;
use serde_json::Value as JsonValue;
use std::sync::Arc;

/// Bound CRUD callables for one model, constructed once per consumer and
/// reused across calls. Purely an ergonomic wrapper: every call forwards
/// to the router with the model name pre-filled.
#[derive(Clone)]
pub struct CrudHandle {
    router: Arc<OperationRouter>,
    model: String,
}

impl CrudHandle {
    #[must_use]
    pub fn new(router: Arc<OperationRouter>, model: impl Into<String>) -> Self {
        Self {
            router,
            model: model.into(),
        }
    }

    /// The model this handle is bound to.
    #[must_use]
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Fetch all records matching `filter`.
    ///
    /// # Errors
    ///
    /// Propagates dispatch errors from the router.
    pub async fn find_many(&self, filter: Filter) -> Result<Vec<JsonValue>, CrudError> {
        let mut request = self.request(OperationKind::FindMany);
        request.filter = filter;
        match self.router.dispatch(&request).await? {
            OperationOutcome::Records(records) => Ok(records),
            other => Err(unexpected_shape(&other)),
        }
    }

    /// Fetch exactly one record identified by `filter`.
    ///
    /// # Errors
    ///
    /// `RecordNotFound` when the target does not exist; `Validation` when
    /// the filter cannot uniquely identify a record.
    pub async fn find_unique(&self, filter: Filter) -> Result<JsonValue, CrudError> {
        let mut request = self.request(OperationKind::FindUnique);
        request.filter = filter;
        match self.router.dispatch(&request).await? {
            OperationOutcome::Record(record) => Ok(record),
            other => Err(unexpected_shape(&other)),
        }
    }

    /// Create a record from `data`.
    ///
    /// # Errors
    ///
    /// Propagates dispatch errors from the router.
    pub async fn create(&self, data: JsonValue) -> Result<JsonValue, CrudError> {
        let mut request = self.request(OperationKind::Create);
        request.data = Some(data);
        match self.router.dispatch(&request).await? {
            OperationOutcome::Record(record) => Ok(record),
            other => Err(unexpected_shape(&other)),
        }
    }

    /// Update the record matching `filter` with `data`.
    ///
    /// # Errors
    ///
    /// `RecordNotFound` when `filter` matches nothing.
    pub async fn update(&self, filter: Filter, data: JsonValue) -> Result<JsonValue, CrudError> {
        let mut request = self.request(OperationKind::Update);
        request.filter = filter;
        request.data = Some(data);
        match self.router.dispatch(&request).await? {
            OperationOutcome::Record(record) => Ok(record),
            other => Err(unexpected_shape(&other)),
        }
    }

    /// Delete the record matching `filter`, returning it as it existed
    /// before deletion.
    ///
    /// # Errors
    ///
    /// `RecordNotFound` when `filter` matches nothing.
    pub async fn delete(&self, filter: Filter) -> Result<JsonValue, CrudError> {
        let mut request = self.request(OperationKind::Delete);
        request.filter = filter;
        match self.router.dispatch(&request).await? {
            OperationOutcome::Record(record) => Ok(record),
            other => Err(unexpected_shape(&other)),
        }
    }

    fn request(&self, operation: OperationKind) -> OperationRequest {
        OperationRequest::new(self.model.clone(), operation)
    }
}

fn unexpected_shape(outcome: &OperationOutcome) -> CrudError {
    CrudError::persistence(format!(
        "executor returned an unexpected result shape: {}",
        outcome_name(outcome)
    ))
}

const fn outcome_name(outcome: &OperationOutcome) -> &'static str {
    match outcome {
        OperationOutcome::Record(_) => "record",
        OperationOutcome::Records(_) => "records",
        OperationOutcome::Count(_) => "count",
        OperationOutcome::Aggregate(_) => "aggregate",
        OperationOutcome::Page(_) => "page",
        OperationOutcome::Bulk(_) => "bulk",
        OperationOutcome::Upsert(_) => "upsert",
    }
}
