//! Operation router: the gate in front of the generic executor.
//!
//! Every dynamic call passes through [`OperationRouter::dispatch`], which
//! resolves the model against the registry, checks the operation against
//! the descriptor and the injected [`AccessPolicy`], forwards the request
//! to the executor untouched, and emits fire-and-forget notifications to
//! the audit and metrics collaborators. This layer performs no data access
//! itself.

use crate::errors::CrudError;
use crate::executor::{ExecutorConfig, GenericExecutor};
use crate::metrics::{MetricsCollector, OperationSample};
use crate::models::{OperationKind, OperationOutcome, OperationRequest};
use crate::pagination::calculate_content_range;
use crate::registry::ModelRegistry;
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::post,
};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Yes/no permission fact consulted before dispatch. Permission
/// *evaluation* lives with the caller; the router only consumes the
/// answer.
pub trait AccessPolicy: Send + Sync {
    fn is_permitted(&self, model: &str, operation: OperationKind) -> bool;
}

/// Default policy: everything the registry allows is permitted.
pub struct AllowAll;

impl AccessPolicy for AllowAll {
    fn is_permitted(&self, _model: &str, _operation: OperationKind) -> bool {
        true
    }
}

/// One completed dispatch, as reported to the audit collaborator.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    pub model: String,
    pub operation: String,
    pub duration_ms: u128,
    pub success: bool,
}

/// Fire-and-forget audit notification target. The signature is infallible
/// and synchronous: a sink can never block or fail an operation.
pub trait AuditSink: Send + Sync {
    fn record(&self, entry: &AuditEntry);
}

/// Builder for [`OperationRouter`].
pub struct OperationRouterBuilder {
    registry: Arc<ModelRegistry>,
    config: ExecutorConfig,
    policy: Arc<dyn AccessPolicy>,
    audit: Option<Arc<dyn AuditSink>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl OperationRouterBuilder {
    #[must_use]
    pub fn with_executor_config(mut self, config: ExecutorConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn with_policy(mut self, policy: Arc<dyn AccessPolicy>) -> Self {
        self.policy = policy;
        self
    }

    #[must_use]
    pub fn with_audit(mut self, audit: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(audit);
        self
    }

    #[must_use]
    pub fn with_metrics(mut self, metrics: Arc<MetricsCollector>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    #[must_use]
    pub fn build(self) -> OperationRouter {
        OperationRouter {
            executor: GenericExecutor::with_config(Arc::clone(&self.registry), self.config),
            registry: self.registry,
            policy: self.policy,
            audit: self.audit,
            metrics: self.metrics,
        }
    }
}

/// Validates and dispatches dynamic operations.
pub struct OperationRouter {
    registry: Arc<ModelRegistry>,
    executor: GenericExecutor,
    policy: Arc<dyn AccessPolicy>,
    audit: Option<Arc<dyn AuditSink>>,
    metrics: Option<Arc<MetricsCollector>>,
}

impl OperationRouter {
    #[must_use]
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self::builder(registry).build()
    }

    #[must_use]
    pub fn builder(registry: Arc<ModelRegistry>) -> OperationRouterBuilder {
        OperationRouterBuilder {
            registry,
            config: ExecutorConfig::default(),
            policy: Arc::new(AllowAll),
            audit: None,
            metrics: None,
        }
    }

    #[must_use]
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Dispatch one operation.
    ///
    /// # Errors
    ///
    /// `ModelNotFound` for unknown model names (checked before any
    /// persistence access), `OperationNotSupported` for operations the
    /// model or policy rejects, and whatever the executor surfaces.
    pub async fn dispatch(
        &self,
        request: &OperationRequest,
    ) -> Result<OperationOutcome, CrudError> {
        let started = Instant::now();
        let result = self.dispatch_inner(request).await;
        self.notify(request, started.elapsed(), result.is_ok());
        result
    }

    async fn dispatch_inner(
        &self,
        request: &OperationRequest,
    ) -> Result<OperationOutcome, CrudError> {
        let model = self.registry.resolve(&request.model)?;
        if !model.descriptor.supports(request.operation)
            || !self.policy.is_permitted(&request.model, request.operation)
        {
            return Err(CrudError::operation_not_supported(
                &request.model,
                request.operation,
            ));
        }
        tracing::debug!(
            model = %request.model,
            operation = %request.operation,
            "dispatching dynamic operation"
        );
        self.executor.execute(model, request).await
    }

    fn notify(&self, request: &OperationRequest, duration: Duration, success: bool) {
        if let Some(audit) = &self.audit {
            audit.record(&AuditEntry {
                model: request.model.clone(),
                operation: request.operation.to_string(),
                duration_ms: duration.as_millis(),
                success,
            });
        }
        if let Some(metrics) = &self.metrics {
            metrics.record(OperationSample {
                model: request.model.clone(),
                operation: request.operation.to_string(),
                duration,
                success,
            });
        }
    }
}

/// Build the Axum router exposing the dynamic operation endpoint.
#[must_use]
pub fn operations_router(router: Arc<OperationRouter>) -> Router {
    Router::new()
        .route("/operations", post(execute_operation_handler))
        .with_state(router)
}

#[utoipa::path(
    post,
    path = "/operations",
    request_body = OperationRequest,
    responses(
        (status = axum::http::StatusCode::OK, description = "Operation result"),
        (status = axum::http::StatusCode::CREATED, description = "Record created"),
        (status = axum::http::StatusCode::BAD_REQUEST, description = "Operation not supported for this model"),
        (status = axum::http::StatusCode::NOT_FOUND, description = "Unknown model or missing record"),
        (status = axum::http::StatusCode::UNPROCESSABLE_ENTITY, description = "Malformed arguments"),
        (status = axum::http::StatusCode::INTERNAL_SERVER_ERROR, description = "Persistence failure")
    ),
    operation_id = "execute_operation",
    summary = "Execute a dynamic CRUD operation",
    description = "Executes one operation against a registered model and returns a record, a record list, a pagination envelope, or a bulk-result envelope depending on the operation kind."
)]
pub async fn execute_operation_handler(
    State(router): State<Arc<OperationRouter>>,
    Json(request): Json<OperationRequest>,
) -> Result<Response, CrudError> {
    let outcome = router.dispatch(&request).await?;
    Ok(match outcome {
        OperationOutcome::Page(envelope) => {
            let offset = (envelope.meta.page - 1).saturating_mul(envelope.meta.limit);
            let headers = calculate_content_range(
                offset,
                envelope.meta.limit,
                envelope.meta.total,
                &request.model,
            );
            (headers, Json(envelope)).into_response()
        }
        outcome if request.operation == OperationKind::Create => {
            (StatusCode::CREATED, Json(outcome.into_json())).into_response()
        }
        outcome => Json(outcome.into_json()).into_response(),
    })
}
