//! Wire types for the dynamic operation layer.
//!
//! Every dynamic call is described by an [`OperationRequest`] and resolves
//! to one of the envelope shapes here: a bare record, a record sequence, a
//! [`PaginationEnvelope`], a [`BulkResultEnvelope`], a count, an aggregate
//! object, or an [`UpsertResult`].

use crate::filter::Filter;
use crate::sort::SortSpec;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use utoipa::ToSchema;

/// The enumerated set of dynamic operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum OperationKind {
    FindMany,
    FindManyPaginated,
    FindUnique,
    Count,
    Aggregate,
    Create,
    Update,
    Delete,
    Upsert,
    CreateMany,
    UpdateMany,
    DeleteMany,
}

impl OperationKind {
    /// Every operation kind, in dispatch order.
    pub const ALL: [Self; 12] = [
        Self::FindMany,
        Self::FindManyPaginated,
        Self::FindUnique,
        Self::Count,
        Self::Aggregate,
        Self::Create,
        Self::Update,
        Self::Delete,
        Self::Upsert,
        Self::CreateMany,
        Self::UpdateMany,
        Self::DeleteMany,
    ];

    /// Whether this operation writes to the persistence layer.
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        matches!(
            self,
            Self::Create
                | Self::Update
                | Self::Delete
                | Self::Upsert
                | Self::CreateMany
                | Self::UpdateMany
                | Self::DeleteMany
        )
    }

    /// Wire name of the operation.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::FindMany => "findMany",
            Self::FindManyPaginated => "findManyPaginated",
            Self::FindUnique => "findUnique",
            Self::Count => "count",
            Self::Aggregate => "aggregate",
            Self::Create => "create",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Upsert => "upsert",
            Self::CreateMany => "createMany",
            Self::UpdateMany => "updateMany",
            Self::DeleteMany => "deleteMany",
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Requested aggregate keys. Only the keys requested here appear in the
/// aggregate result object.
#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct AggregateSpec {
    /// Include the matching-record count as `_count`.
    #[serde(default, rename = "_count")]
    pub count: bool,
    /// Fields to sum, reported under `_sum`.
    #[serde(default, rename = "_sum")]
    pub sum: Vec<String>,
    /// Fields to average, reported under `_avg`.
    #[serde(default, rename = "_avg")]
    pub avg: Vec<String>,
    /// Fields to take the minimum of, reported under `_min`.
    #[serde(default, rename = "_min")]
    pub min: Vec<String>,
    /// Fields to take the maximum of, reported under `_max`.
    #[serde(default, rename = "_max")]
    pub max: Vec<String>,
}

impl AggregateSpec {
    /// Whether any numeric aggregate (beyond `_count`) was requested.
    #[must_use]
    pub fn wants_records(&self) -> bool {
        !(self.sum.is_empty() && self.avg.is_empty() && self.min.is_empty() && self.max.is_empty())
    }
}

/// A single dynamic operation call.
///
/// # Pagination
/// Two styles are supported, and at most one may be used per call:
/// - **Paged:** `page` and `limit` (1-based; limit clamped to the
///   configured ceiling)
/// - **Raw:** `take` and `skip`
///
/// # Filtering
/// The `where` parameter takes the JSON filter form described in
/// [`Filter`], for example:
/// ```json
/// {"completed": false, "priority": {"gte": 3}}
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct OperationRequest {
    /// Registered model name, e.g. `Task`.
    pub model: String,
    /// Operation kind to perform.
    pub operation: OperationKind,
    /// Filter tree; omitted or `{}` matches all records.
    #[serde(default, rename = "where")]
    #[schema(value_type = Object)]
    pub filter: Filter,
    /// Scalar fields to project; defaults to the model's default field set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub select: Option<Vec<String>>,
    /// Relation names to expand on returned records.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include: Option<Vec<String>>,
    /// Ordering terms, applied in sequence.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    #[schema(value_type = Vec<Object>)]
    pub order_by: Vec<SortSpec>,
    /// Record payload for `create` and `update`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub data: Option<JsonValue>,
    /// Create payload for `upsert`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub create: Option<JsonValue>,
    /// Update payload for `upsert`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub update: Option<JsonValue>,
    /// Element list for the bulk operations.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Vec<Object>)]
    pub input: Option<Vec<JsonValue>>,
    /// Aggregate keys for `aggregate`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub aggregate: Option<AggregateSpec>,
    /// 1-based page number (paged style).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u64>,
    /// Page size (paged style).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u64>,
    /// Maximum records to return (raw style).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take: Option<u64>,
    /// Records to skip (raw style).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<u64>,
}

impl OperationRequest {
    /// A minimal request for `model`/`operation` with every argument empty.
    #[must_use]
    pub fn new(model: impl Into<String>, operation: OperationKind) -> Self {
        Self {
            model: model.into(),
            operation,
            filter: Filter::All,
            select: None,
            include: None,
            order_by: Vec::new(),
            data: None,
            create: None,
            update: None,
            input: None,
            aggregate: None,
            page: None,
            limit: None,
            take: None,
            skip: None,
        }
    }

    /// Whether the call uses the paged (`page`/`limit`) style.
    #[must_use]
    pub const fn uses_paged_style(&self) -> bool {
        self.page.is_some() || self.limit.is_some()
    }

    /// Whether the call uses the raw (`take`/`skip`) style.
    #[must_use]
    pub const fn uses_raw_style(&self) -> bool {
        self.take.is_some() || self.skip.is_some()
    }
}

/// Pagination metadata for a paged list result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct PageMeta {
    /// Records matching the filter, ignoring pagination.
    pub total: u64,
    /// Current 1-based page.
    pub page: u64,
    /// Page size in effect after defaulting and clamping.
    pub limit: u64,
    /// `ceil(total / limit)`; zero when no records match.
    pub total_pages: u64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

impl PageMeta {
    /// Compute metadata for a resolved `page`/`limit` pair.
    ///
    /// `limit` must already be normalized to a positive value.
    #[must_use]
    pub const fn compute(total: u64, page: u64, limit: u64) -> Self {
        let total_pages = if total == 0 { 0 } else { total.div_ceil(limit) };
        Self {
            total,
            page,
            limit,
            total_pages,
            has_next_page: page < total_pages,
            has_prev_page: page > 1,
        }
    }
}

/// Standard `{data, meta}` shape for any paginated list operation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaginationEnvelope {
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<JsonValue>,
    pub meta: PageMeta,
}

/// One failed element of a bulk operation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BulkErrorEntry {
    /// Position of the offending element in the original input array.
    pub index: usize,
    /// Failure message for this element.
    pub error: String,
    /// The offending input element, echoed back.
    #[schema(value_type = Object)]
    pub data: JsonValue,
}

/// Standard `{success, count, data, errors}` shape for bulk mutations.
///
/// Partial failure is a first-class outcome: a failing element never aborts
/// the rest of the batch, and the envelope is returned rather than thrown.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BulkResultEnvelope {
    /// True only if zero elements failed.
    pub success: bool,
    /// Number of successfully processed elements; equals `data.len()`.
    pub count: usize,
    /// Successfully processed records, in input order.
    #[schema(value_type = Vec<Object>)]
    pub data: Vec<JsonValue>,
    /// Per-element failures, in input order.
    pub errors: Vec<BulkErrorEntry>,
}

impl BulkResultEnvelope {
    #[must_use]
    pub fn from_parts(data: Vec<JsonValue>, errors: Vec<BulkErrorEntry>) -> Self {
        Self {
            success: errors.is_empty(),
            count: data.len(),
            data,
            errors,
        }
    }
}

/// Result of an upsert, carrying which branch was taken.
///
/// The `created` flag is a deliberate addition over returning the bare
/// record: without it callers cannot tell the branches apart.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpsertResult {
    #[schema(value_type = Object)]
    pub record: JsonValue,
    pub created: bool,
}

/// The result of one dynamic operation, shaped per operation kind.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum OperationOutcome {
    Record(JsonValue),
    Records(Vec<JsonValue>),
    Count(u64),
    Aggregate(JsonValue),
    Page(PaginationEnvelope),
    Bulk(BulkResultEnvelope),
    Upsert(UpsertResult),
}

impl OperationOutcome {
    /// Flatten to the JSON value sent over the wire.
    #[must_use]
    pub fn into_json(self) -> JsonValue {
        serde_json::to_value(self).unwrap_or(JsonValue::Null)
    }
}

/// Resolve the effective `page`/`limit` pair for a paged call.
///
/// Missing or zero `limit` falls back to the model's default page size,
/// missing or zero `page` becomes page 1, and the limit is clamped to the
/// configured ceiling.
#[must_use]
pub(crate) fn resolve_page_params(
    page: Option<u64>,
    limit: Option<u64>,
    default_page_size: u64,
    max_page_size: u64,
) -> (u64, u64) {
    let page = match page {
        None | Some(0) => 1,
        Some(p) => p,
    };
    let limit = match limit {
        None | Some(0) => default_page_size,
        Some(l) => l,
    }
    .min(max_page_size)
    .max(1);
    (page, limit)
}
