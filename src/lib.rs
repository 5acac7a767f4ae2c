pub mod errors;
pub mod executor;
pub mod filter;
pub mod handle;
pub mod metrics;
pub mod models;
pub mod pagination;
pub mod provider;
pub mod query_builder;
pub mod registry;
pub mod router;
pub mod sort;

pub use errors::CrudError;
pub use executor::{ExecutorConfig, GenericExecutor};
pub use filter::{CompareOp, Filter};
pub use handle::CrudHandle;
pub use metrics::{MetricsCollector, MetricsSnapshot, OperationSample};
pub use models::{
    AggregateSpec, BulkErrorEntry, BulkResultEnvelope, OperationKind, OperationOutcome,
    OperationRequest, PageMeta, PaginationEnvelope, UpsertResult,
};
pub use provider::{EntityProvider, PersistenceProvider, ProviderError};
pub use registry::{ModelDescriptor, ModelRegistry, RegisteredModel, RelationDescriptor};
pub use router::{AccessPolicy, AllowAll, AuditEntry, AuditSink, OperationRouter, operations_router};
pub use sort::{SortDirection, SortSpec};
