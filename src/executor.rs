//! Generic executor: one code path serving every registered model.
//!
//! Translates an [`OperationRequest`] into persistence-provider calls and
//! normalizes the result shape regardless of which model was targeted.
//! Pagination arithmetic, projection/include resolution, and the
//! independent-attempt bulk loops all live here.

use crate::errors::CrudError;
use crate::filter::Filter;
use crate::models::{
    BulkErrorEntry, BulkResultEnvelope, OperationKind, OperationOutcome, OperationRequest,
    PageMeta, PaginationEnvelope, UpsertResult, resolve_page_params,
};
use crate::provider::ProviderError;
use crate::registry::{ModelRegistry, RegisteredModel, RelationDescriptor};
use serde::Deserialize;
use serde_json::{Map, Value as JsonValue};
use std::sync::Arc;

/// Executor-wide limits.
#[derive(Debug, Clone, Copy)]
pub struct ExecutorConfig {
    /// Ceiling applied to any requested page size.
    pub max_page_size: u64,
    /// Ceiling applied to bulk operation input length.
    pub max_batch_size: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_page_size: 100,
            max_batch_size: 100,
        }
    }
}

/// One element of an `updateMany` input array.
#[derive(Deserialize)]
struct BulkUpdateItem {
    #[serde(rename = "where")]
    filter: Filter,
    data: JsonValue,
}

/// Executes dynamic operations against registered models.
pub struct GenericExecutor {
    registry: Arc<ModelRegistry>,
    config: ExecutorConfig,
}

impl GenericExecutor {
    #[must_use]
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self {
            registry,
            config: ExecutorConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(registry: Arc<ModelRegistry>, config: ExecutorConfig) -> Self {
        Self { registry, config }
    }

    /// Execute one operation against an already-resolved model.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for malformed arguments, `RecordNotFound` when
    /// a single-record target does not exist, and `Persistence` for
    /// provider failures. Bulk per-element failures are captured in the
    /// returned envelope, never raised.
    pub async fn execute(
        &self,
        model: &RegisteredModel,
        request: &OperationRequest,
    ) -> Result<OperationOutcome, CrudError> {
        request.filter.validate()?;
        if request.uses_paged_style() && request.uses_raw_style() {
            return Err(CrudError::validation(
                "page",
                "page/limit and take/skip pagination styles cannot be combined",
            ));
        }
        for name in request.include.as_deref().unwrap_or(&[]) {
            if model.descriptor.relation(name).is_none() {
                return Err(CrudError::validation(
                    "include",
                    format!("unknown relation '{name}' on {}", model.descriptor.name),
                ));
            }
        }

        match request.operation {
            OperationKind::FindMany => {
                Ok(OperationOutcome::Records(self.find_many(model, request).await?))
            }
            OperationKind::FindManyPaginated => Ok(OperationOutcome::Page(
                self.find_many_paginated(model, request).await?,
            )),
            OperationKind::FindUnique => {
                Ok(OperationOutcome::Record(self.find_unique(model, request).await?))
            }
            OperationKind::Count => {
                let total = model
                    .provider
                    .count(&request.filter)
                    .await
                    .map_err(|err| persistence_error(model, err))?;
                Ok(OperationOutcome::Count(total))
            }
            OperationKind::Aggregate => {
                Ok(OperationOutcome::Aggregate(self.aggregate(model, request).await?))
            }
            OperationKind::Create => {
                Ok(OperationOutcome::Record(self.create(model, request).await?))
            }
            OperationKind::Update => {
                Ok(OperationOutcome::Record(self.update(model, request).await?))
            }
            OperationKind::Delete => {
                Ok(OperationOutcome::Record(self.delete(model, request).await?))
            }
            OperationKind::Upsert => {
                Ok(OperationOutcome::Upsert(self.upsert(model, request).await?))
            }
            OperationKind::CreateMany => {
                Ok(OperationOutcome::Bulk(self.create_many(model, request).await?))
            }
            OperationKind::UpdateMany => {
                Ok(OperationOutcome::Bulk(self.update_many(model, request).await?))
            }
            OperationKind::DeleteMany => {
                Ok(OperationOutcome::Bulk(self.delete_many(model, request).await?))
            }
        }
    }

    async fn find_many(
        &self,
        model: &RegisteredModel,
        request: &OperationRequest,
    ) -> Result<Vec<JsonValue>, CrudError> {
        if request.uses_paged_style() {
            return Err(CrudError::validation(
                "page",
                "findMany takes take/skip; use findManyPaginated for page/limit",
            ));
        }
        let records = model
            .provider
            .find_many(&request.filter, &request.order_by, request.take, request.skip)
            .await
            .map_err(|err| persistence_error(model, err))?;
        self.shape_records(model, request, records).await
    }

    async fn find_many_paginated(
        &self,
        model: &RegisteredModel,
        request: &OperationRequest,
    ) -> Result<PaginationEnvelope, CrudError> {
        if request.uses_raw_style() {
            return Err(CrudError::validation(
                "take",
                "findManyPaginated takes page/limit; use findMany for take/skip",
            ));
        }
        let (page, limit) = resolve_page_params(
            request.page,
            request.limit,
            model.descriptor.default_page_size,
            self.config.max_page_size,
        );
        // Count and fetch run against the same filter; concurrent writes
        // between the two round-trips are an accepted staleness window.
        let total = model
            .provider
            .count(&request.filter)
            .await
            .map_err(|err| persistence_error(model, err))?;
        let skip = (page - 1).saturating_mul(limit);
        let records = model
            .provider
            .find_many(&request.filter, &request.order_by, Some(limit), Some(skip))
            .await
            .map_err(|err| persistence_error(model, err))?;
        let data = self.shape_records(model, request, records).await?;
        Ok(PaginationEnvelope {
            data,
            meta: PageMeta::compute(total, page, limit),
        })
    }

    async fn find_unique(
        &self,
        model: &RegisteredModel,
        request: &OperationRequest,
    ) -> Result<JsonValue, CrudError> {
        let Some(fields) = request.filter.equality_fields() else {
            return Err(CrudError::validation(
                "where",
                "findUnique requires an equality filter on a unique field",
            ));
        };
        if !model.descriptor.identifies_unique(&fields) {
            return Err(CrudError::validation(
                "where",
                format!(
                    "filter on [{}] cannot uniquely identify a {}",
                    fields.join(", "),
                    model.descriptor.name
                ),
            ));
        }
        let record = model
            .provider
            .find_one(&request.filter)
            .await
            .map_err(|err| persistence_error(model, err))?
            .ok_or_else(|| CrudError::record_not_found(&model.descriptor.name))?;
        self.shape_record(model, request, record).await
    }

    async fn aggregate(
        &self,
        model: &RegisteredModel,
        request: &OperationRequest,
    ) -> Result<JsonValue, CrudError> {
        let spec = request
            .aggregate
            .as_ref()
            .ok_or_else(|| CrudError::validation("aggregate", "aggregate spec is required"))?;
        let mut result = Map::new();
        if spec.count {
            let total = model
                .provider
                .count(&request.filter)
                .await
                .map_err(|err| persistence_error(model, err))?;
            result.insert("_count".to_string(), JsonValue::from(total));
        }
        if spec.wants_records() {
            let records = model
                .provider
                .find_many(&request.filter, &[], None, None)
                .await
                .map_err(|err| persistence_error(model, err))?;
            insert_folded(&mut result, "_sum", &spec.sum, &records, fold_sum);
            insert_folded(&mut result, "_avg", &spec.avg, &records, fold_avg);
            insert_folded(&mut result, "_min", &spec.min, &records, fold_min);
            insert_folded(&mut result, "_max", &spec.max, &records, fold_max);
        }
        Ok(JsonValue::Object(result))
    }

    async fn create(
        &self,
        model: &RegisteredModel,
        request: &OperationRequest,
    ) -> Result<JsonValue, CrudError> {
        let data = request
            .data
            .clone()
            .ok_or_else(|| CrudError::validation("data", "create requires a data payload"))?;
        let record = model
            .provider
            .insert(data)
            .await
            .map_err(|err| persistence_error(model, err))?;
        self.shape_record(model, request, record).await
    }

    async fn update(
        &self,
        model: &RegisteredModel,
        request: &OperationRequest,
    ) -> Result<JsonValue, CrudError> {
        require_targeted_filter(&request.filter, "update")?;
        let data = request
            .data
            .clone()
            .ok_or_else(|| CrudError::validation("data", "update requires a data payload"))?;
        let record = model
            .provider
            .update(&request.filter, data)
            .await
            .map_err(|err| persistence_error(model, err))?;
        self.shape_record(model, request, record).await
    }

    async fn delete(
        &self,
        model: &RegisteredModel,
        request: &OperationRequest,
    ) -> Result<JsonValue, CrudError> {
        require_targeted_filter(&request.filter, "delete")?;
        let record = model
            .provider
            .delete(&request.filter)
            .await
            .map_err(|err| persistence_error(model, err))?;
        self.shape_record(model, request, record).await
    }

    async fn upsert(
        &self,
        model: &RegisteredModel,
        request: &OperationRequest,
    ) -> Result<UpsertResult, CrudError> {
        require_targeted_filter(&request.filter, "upsert")?;
        let create = request
            .create
            .clone()
            .ok_or_else(|| CrudError::validation("create", "upsert requires a create payload"))?;
        let update = request
            .update
            .clone()
            .ok_or_else(|| CrudError::validation("update", "upsert requires an update payload"))?;
        let existing = model
            .provider
            .find_one(&request.filter)
            .await
            .map_err(|err| persistence_error(model, err))?;
        let (record, created) = if existing.is_some() {
            let record = model
                .provider
                .update(&request.filter, update)
                .await
                .map_err(|err| persistence_error(model, err))?;
            (record, false)
        } else {
            let record = model
                .provider
                .insert(create)
                .await
                .map_err(|err| persistence_error(model, err))?;
            (record, true)
        };
        Ok(UpsertResult {
            record: self.shape_record(model, request, record).await?,
            created,
        })
    }

    async fn create_many(
        &self,
        model: &RegisteredModel,
        request: &OperationRequest,
    ) -> Result<BulkResultEnvelope, CrudError> {
        let input = bulk_input(request)?;
        self.check_batch_size(input.len())?;
        let mut data = Vec::with_capacity(input.len());
        let mut errors = Vec::new();
        for (index, item) in input.iter().enumerate() {
            match model.provider.insert(item.clone()).await {
                Ok(record) => data.push(self.shape_record(model, request, record).await?),
                Err(err) => errors.push(bulk_error(index, &err, item)),
            }
        }
        Ok(BulkResultEnvelope::from_parts(data, errors))
    }

    async fn update_many(
        &self,
        model: &RegisteredModel,
        request: &OperationRequest,
    ) -> Result<BulkResultEnvelope, CrudError> {
        let input = bulk_input(request)?;
        self.check_batch_size(input.len())?;
        let mut data = Vec::with_capacity(input.len());
        let mut errors = Vec::new();
        for (index, item) in input.iter().enumerate() {
            let parsed: BulkUpdateItem = match serde_json::from_value(item.clone()) {
                Ok(parsed) => parsed,
                Err(err) => {
                    errors.push(BulkErrorEntry {
                        index,
                        error: format!("element must carry 'where' and 'data': {err}"),
                        data: item.clone(),
                    });
                    continue;
                }
            };
            if let Err(err) = parsed
                .filter
                .validate()
                .and_then(|()| require_targeted_filter(&parsed.filter, "updateMany"))
            {
                errors.push(bulk_error(index, &err, item));
                continue;
            }
            match model.provider.update(&parsed.filter, parsed.data).await {
                Ok(record) => data.push(self.shape_record(model, request, record).await?),
                Err(err) => errors.push(bulk_error(index, &err, item)),
            }
        }
        Ok(BulkResultEnvelope::from_parts(data, errors))
    }

    async fn delete_many(
        &self,
        model: &RegisteredModel,
        request: &OperationRequest,
    ) -> Result<BulkResultEnvelope, CrudError> {
        let input = bulk_input(request)?;
        self.check_batch_size(input.len())?;
        let mut data = Vec::with_capacity(input.len());
        let mut errors = Vec::new();
        for (index, item) in input.iter().enumerate() {
            let filter = match Filter::from_json(item) {
                Ok(filter) => filter,
                Err(err) => {
                    errors.push(bulk_error(index, &err, item));
                    continue;
                }
            };
            if let Err(err) = filter
                .validate()
                .and_then(|()| require_targeted_filter(&filter, "deleteMany"))
            {
                errors.push(bulk_error(index, &err, item));
                continue;
            }
            match model.provider.delete(&filter).await {
                Ok(record) => data.push(self.shape_record(model, request, record).await?),
                Err(err) => errors.push(bulk_error(index, &err, item)),
            }
        }
        Ok(BulkResultEnvelope::from_parts(data, errors))
    }

    fn check_batch_size(&self, len: usize) -> Result<(), CrudError> {
        if len > self.config.max_batch_size {
            return Err(CrudError::validation(
                "input",
                format!(
                    "bulk operations are limited to {} elements, received {len}",
                    self.config.max_batch_size
                ),
            ));
        }
        Ok(())
    }

    async fn shape_records(
        &self,
        model: &RegisteredModel,
        request: &OperationRequest,
        records: Vec<JsonValue>,
    ) -> Result<Vec<JsonValue>, CrudError> {
        let mut shaped = Vec::with_capacity(records.len());
        for record in records {
            shaped.push(self.shape_record(model, request, record).await?);
        }
        Ok(shaped)
    }

    /// Project scalars through the effective `select` and expand `include`
    /// relations. When both name the same relation, the expansion wins and
    /// `select` still filters scalar fields.
    async fn shape_record(
        &self,
        model: &RegisteredModel,
        request: &OperationRequest,
        record: JsonValue,
    ) -> Result<JsonValue, CrudError> {
        let JsonValue::Object(fields) = record else {
            return Ok(record);
        };
        let select = request
            .select
            .as_deref()
            .unwrap_or(&model.descriptor.default_fields);
        let mut shaped = Map::new();
        for field in select {
            if let Some(value) = fields.get(field) {
                shaped.insert(field.clone(), value.clone());
            }
        }
        for name in request.include.as_deref().unwrap_or(&[]) {
            let Some(relation) = model.descriptor.relation(name) else {
                return Err(CrudError::validation(
                    "include",
                    format!("unknown relation '{name}' on {}", model.descriptor.name),
                ));
            };
            let expanded = self.expand_relation(relation, &fields).await?;
            shaped.insert(relation.name.clone(), expanded);
        }
        Ok(JsonValue::Object(shaped))
    }

    async fn expand_relation(
        &self,
        relation: &RelationDescriptor,
        fields: &Map<String, JsonValue>,
    ) -> Result<JsonValue, CrudError> {
        let target = self.registry.resolve(&relation.target)?;
        let join_value = fields
            .get(&relation.local_key)
            .cloned()
            .unwrap_or(JsonValue::Null);
        let filter = Filter::Cmp {
            field: relation.foreign_key.clone(),
            op: crate::filter::CompareOp::Eq,
            value: join_value,
        };
        let related = target
            .provider
            .find_many(&filter, &[], None, None)
            .await
            .map_err(|err| persistence_error(target, err))?;
        let projected: Vec<JsonValue> = related
            .into_iter()
            .map(|record| project_scalars(&target.descriptor.default_fields, record))
            .collect();
        Ok(if relation.to_many {
            JsonValue::Array(projected)
        } else {
            projected.into_iter().next().unwrap_or(JsonValue::Null)
        })
    }
}

fn project_scalars(fields: &[String], record: JsonValue) -> JsonValue {
    let JsonValue::Object(map) = record else {
        return record;
    };
    let mut shaped = Map::new();
    for field in fields {
        if let Some(value) = map.get(field) {
            shaped.insert(field.clone(), value.clone());
        }
    }
    JsonValue::Object(shaped)
}

fn bulk_input(request: &OperationRequest) -> Result<&[JsonValue], CrudError> {
    request
        .input
        .as_deref()
        .ok_or_else(|| CrudError::validation("input", "bulk operations require an input array"))
}

fn bulk_error(index: usize, error: &dyn std::fmt::Display, item: &JsonValue) -> BulkErrorEntry {
    BulkErrorEntry {
        index,
        error: error.to_string(),
        data: item.clone(),
    }
}

fn require_targeted_filter(filter: &Filter, operation: &str) -> Result<(), CrudError> {
    if filter.is_all() {
        return Err(CrudError::validation(
            "where",
            format!("{operation} requires a non-empty where filter"),
        ));
    }
    Ok(())
}

fn persistence_error(model: &RegisteredModel, err: ProviderError) -> CrudError {
    match err {
        ProviderError::NotFound(_) => CrudError::record_not_found(&model.descriptor.name),
        other => CrudError::persistence(other.to_string()),
    }
}

fn insert_folded(
    result: &mut Map<String, JsonValue>,
    key: &str,
    fields: &[String],
    records: &[JsonValue],
    fold: fn(&[JsonValue], &str) -> JsonValue,
) {
    if fields.is_empty() {
        return;
    }
    let mut folded = Map::new();
    for field in fields {
        folded.insert(field.clone(), fold(records, field));
    }
    result.insert(key.to_string(), JsonValue::Object(folded));
}

fn numeric_values(records: &[JsonValue], field: &str) -> Vec<f64> {
    records
        .iter()
        .filter_map(|record| record.get(field).and_then(JsonValue::as_f64))
        .collect()
}

fn fold_sum(records: &[JsonValue], field: &str) -> JsonValue {
    let values = numeric_values(records, field);
    if values.is_empty() {
        JsonValue::Null
    } else {
        JsonValue::from(values.iter().sum::<f64>())
    }
}

fn fold_avg(records: &[JsonValue], field: &str) -> JsonValue {
    let values = numeric_values(records, field);
    if values.is_empty() {
        JsonValue::Null
    } else {
        #[allow(clippy::cast_precision_loss)]
        JsonValue::from(values.iter().sum::<f64>() / values.len() as f64)
    }
}

fn fold_min(records: &[JsonValue], field: &str) -> JsonValue {
    numeric_values(records, field)
        .into_iter()
        .min_by(f64::total_cmp)
        .map_or(JsonValue::Null, JsonValue::from)
}

fn fold_max(records: &[JsonValue], field: &str) -> JsonValue {
    numeric_values(records, field)
        .into_iter()
        .max_by(f64::total_cmp)
        .map_or(JsonValue::Null, JsonValue::from)
}
