//! Persistence provider contract and the Sea-ORM adapter.
//!
//! The executor talks to storage exclusively through the object-safe
//! [`PersistenceProvider`] trait; one provider instance is bound per
//! registered model. [`EntityProvider`] implements the contract for any
//! Sea-ORM entity whose model round-trips through JSON, translating filter
//! trees into `Condition`s with dynamically addressed columns.

use crate::filter::{CompareOp, Filter};
use crate::sort::SortSpec;
use async_trait::async_trait;
use sea_orm::sea_query::{Alias, Expr, SimpleExpr};
use sea_orm::{
    ActiveModelBehavior, ActiveModelTrait, Condition, DatabaseConnection, DbErr, EntityTrait,
    IntoActiveModel, PaginatorTrait, QueryFilter, QueryOrder, QuerySelect,
};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::marker::PhantomData;
use uuid::Uuid;

/// Error surface of a persistence provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// The targeted record does not exist.
    NotFound(String),
    /// A uniqueness constraint rejected the write.
    UniqueViolation(String),
    /// Any other provider failure, with the provider-supplied message.
    Other(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound(msg) => write!(f, "not found: {msg}"),
            Self::UniqueViolation(msg) => write!(f, "unique constraint violation: {msg}"),
            Self::Other(msg) => write!(f, "{msg}"),
        }
    }
}

impl std::error::Error for ProviderError {}

impl From<DbErr> for ProviderError {
    fn from(err: DbErr) -> Self {
        if let DbErr::RecordNotFound(msg) = &err {
            return Self::NotFound(msg.clone());
        }
        if let Some(sea_orm::SqlErr::UniqueConstraintViolation(detail)) = err.sql_err() {
            return Self::UniqueViolation(detail);
        }
        Self::Other(err.to_string())
    }
}

/// Data-access contract consumed by the generic executor.
///
/// Implementations provide per-record atomicity only; bulk operations in
/// the executor call these methods once per element and assume no
/// cross-record transactional guarantees.
#[async_trait]
pub trait PersistenceProvider: Send + Sync {
    /// Fetch records matching `filter`, ordered by `order`, windowed by
    /// `take`/`skip`.
    async fn find_many(
        &self,
        filter: &Filter,
        order: &[SortSpec],
        take: Option<u64>,
        skip: Option<u64>,
    ) -> Result<Vec<JsonValue>, ProviderError>;

    /// Fetch the first record matching `filter`, if any.
    async fn find_one(&self, filter: &Filter) -> Result<Option<JsonValue>, ProviderError>;

    /// Count records matching `filter`.
    async fn count(&self, filter: &Filter) -> Result<u64, ProviderError>;

    /// Insert one record and return it as stored.
    async fn insert(&self, data: JsonValue) -> Result<JsonValue, ProviderError>;

    /// Update the record matching `filter` and return it as stored.
    /// Fails with [`ProviderError::NotFound`] when nothing matches.
    async fn update(&self, filter: &Filter, data: JsonValue) -> Result<JsonValue, ProviderError>;

    /// Delete the record matching `filter` and return it as it existed
    /// immediately before deletion.
    async fn delete(&self, filter: &Filter) -> Result<JsonValue, ProviderError>;
}

/// Translate a filter tree into a Sea-ORM `Condition`.
///
/// Columns are addressed dynamically by name; the filter has already been
/// structurally validated by the executor.
///
/// # Errors
///
/// Returns `ProviderError::Other` for operand shapes that cannot be bound
/// as SQL values.
pub fn condition_for(filter: &Filter) -> Result<Condition, ProviderError> {
    match filter {
        Filter::All => Ok(Condition::all()),
        Filter::And(children) => {
            let mut condition = Condition::all();
            for child in children {
                condition = condition.add(condition_for(child)?);
            }
            Ok(condition)
        }
        Filter::Or(children) => {
            let mut condition = Condition::any();
            for child in children {
                condition = condition.add(condition_for(child)?);
            }
            Ok(condition)
        }
        Filter::Not(inner) => Ok(condition_for(inner)?.not()),
        Filter::Cmp { field, op, value } => {
            Ok(Condition::all().add(comparison_expr(field, *op, value)?))
        }
    }
}

fn comparison_expr(field: &str, op: CompareOp, value: &JsonValue) -> Result<SimpleExpr, ProviderError> {
    let column = || Expr::col(Alias::new(field));
    let expr = match op {
        CompareOp::Eq => {
            if value.is_null() {
                column().is_null()
            } else {
                column().eq(bind_value(field, value)?)
            }
        }
        CompareOp::Ne => {
            if value.is_null() {
                column().is_not_null()
            } else {
                column().ne(bind_value(field, value)?)
            }
        }
        CompareOp::Lt => column().lt(bind_value(field, value)?),
        CompareOp::Lte => column().lte(bind_value(field, value)?),
        CompareOp::Gt => column().gt(bind_value(field, value)?),
        CompareOp::Gte => column().gte(bind_value(field, value)?),
        CompareOp::In => {
            let JsonValue::Array(items) = value else {
                return Err(ProviderError::Other(format!(
                    "'{field}': 'in' operand must be an array"
                )));
            };
            let values = items
                .iter()
                .map(|item| bind_value(field, item))
                .collect::<Result<Vec<_>, _>>()?;
            column().is_in(values)
        }
        CompareOp::Contains => column().like(format!("%{}%", text_operand(field, value)?)),
        CompareOp::StartsWith => column().like(format!("{}%", text_operand(field, value)?)),
        CompareOp::EndsWith => column().like(format!("%{}", text_operand(field, value)?)),
    };
    Ok(expr)
}

fn bind_value(field: &str, value: &JsonValue) -> Result<sea_orm::Value, ProviderError> {
    match value {
        JsonValue::Bool(b) => Ok((*b).into()),
        JsonValue::Number(n) => n
            .as_i64()
            .map(Into::into)
            .or_else(|| n.as_f64().map(Into::into))
            .ok_or_else(|| ProviderError::Other(format!("'{field}': unsupported numeric operand"))),
        JsonValue::String(s) => Ok(s.clone().into()),
        _ => Err(ProviderError::Other(format!(
            "'{field}': operand cannot be bound as a query value"
        ))),
    }
}

fn text_operand<'a>(field: &str, value: &'a JsonValue) -> Result<&'a str, ProviderError> {
    value.as_str().ok_or_else(|| {
        ProviderError::Other(format!("'{field}': substring operand must be a string"))
    })
}

/// Generic Sea-ORM implementation of [`PersistenceProvider`].
///
/// Works for any entity whose model serializes to JSON and whose active
/// model accepts JSON payloads. By default, inserts that omit the `id`
/// field are assigned a fresh v4 UUID; disable with
/// [`EntityProvider::without_generated_ids`] for entities with
/// store-generated keys.
pub struct EntityProvider<E: EntityTrait> {
    db: DatabaseConnection,
    id_field: String,
    generate_ids: bool,
    _entity: PhantomData<E>,
}

impl<E: EntityTrait> EntityProvider<E> {
    #[must_use]
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            db,
            id_field: "id".to_string(),
            generate_ids: true,
            _entity: PhantomData,
        }
    }

    /// Use a different identifier field name.
    #[must_use]
    pub fn with_id_field(mut self, field: impl Into<String>) -> Self {
        self.id_field = field.into();
        self
    }

    /// Leave missing identifiers to the store (autoincrement keys,
    /// database-side defaults).
    #[must_use]
    pub fn without_generated_ids(mut self) -> Self {
        self.generate_ids = false;
        self
    }

    /// Narrow a condition to the identifier of one fetched record, so
    /// writes driven by a broader filter touch exactly that record.
    fn identity_condition(&self, record: &JsonValue, fallback: Condition) -> Condition {
        match record.get(&self.id_field).and_then(|id| bind_value(&self.id_field, id).ok()) {
            Some(id) => Condition::all().add(Expr::col(Alias::new(self.id_field.as_str())).eq(id)),
            None => fallback,
        }
    }
}

#[async_trait]
impl<E> PersistenceProvider for EntityProvider<E>
where
    E: EntityTrait,
    E::Model: Serialize + IntoActiveModel<E::ActiveModel> + Send + Sync,
    for<'de> E::Model: Deserialize<'de>,
    E::ActiveModel: ActiveModelTrait<Entity = E> + ActiveModelBehavior + Send,
{
    async fn find_many(
        &self,
        filter: &Filter,
        order: &[SortSpec],
        take: Option<u64>,
        skip: Option<u64>,
    ) -> Result<Vec<JsonValue>, ProviderError> {
        let mut query = E::find().filter(condition_for(filter)?);
        for spec in order {
            query = query.order_by(
                Expr::col(Alias::new(spec.field.as_str())),
                spec.direction.into_order(),
            );
        }
        query
            .offset(skip)
            .limit(take)
            .into_json()
            .all(&self.db)
            .await
            .map_err(ProviderError::from)
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<JsonValue>, ProviderError> {
        E::find()
            .filter(condition_for(filter)?)
            .into_json()
            .one(&self.db)
            .await
            .map_err(ProviderError::from)
    }

    async fn count(&self, filter: &Filter) -> Result<u64, ProviderError> {
        E::find()
            .filter(condition_for(filter)?)
            .count(&self.db)
            .await
            .map_err(ProviderError::from)
    }

    async fn insert(&self, mut data: JsonValue) -> Result<JsonValue, ProviderError> {
        if self.generate_ids
            && let Some(map) = data.as_object_mut()
        {
            map.entry(self.id_field.clone())
                .or_insert_with(|| JsonValue::String(Uuid::new_v4().to_string()));
        }
        let active =
            <E::ActiveModel as ActiveModelTrait>::from_json(data).map_err(ProviderError::from)?;
        let model = active.insert(&self.db).await.map_err(ProviderError::from)?;
        serde_json::to_value(&model).map_err(|err| ProviderError::Other(err.to_string()))
    }

    async fn update(&self, filter: &Filter, data: JsonValue) -> Result<JsonValue, ProviderError> {
        let model = E::find()
            .filter(condition_for(filter)?)
            .one(&self.db)
            .await
            .map_err(ProviderError::from)?
            .ok_or_else(|| ProviderError::NotFound("record not found".to_string()))?;
        // Merge the partial payload over the stored record so the rebuilt
        // active model always carries a complete attribute set.
        let mut merged =
            serde_json::to_value(&model).map_err(|err| ProviderError::Other(err.to_string()))?;
        if let (Some(target), Some(patch)) = (merged.as_object_mut(), data.as_object()) {
            for (key, value) in patch {
                target.insert(key.clone(), value.clone());
            }
        }
        let active =
            <E::ActiveModel as ActiveModelTrait>::from_json(merged).map_err(ProviderError::from)?;
        let updated = active.update(&self.db).await.map_err(ProviderError::from)?;
        serde_json::to_value(&updated).map_err(|err| ProviderError::Other(err.to_string()))
    }

    async fn delete(&self, filter: &Filter) -> Result<JsonValue, ProviderError> {
        let condition = condition_for(filter)?;
        let model = E::find()
            .filter(condition.clone())
            .one(&self.db)
            .await
            .map_err(ProviderError::from)?
            .ok_or_else(|| ProviderError::NotFound("record not found".to_string()))?;
        let snapshot =
            serde_json::to_value(&model).map_err(|err| ProviderError::Other(err.to_string()))?;
        E::delete_many()
            .filter(self.identity_condition(&snapshot, condition))
            .exec(&self.db)
            .await
            .map_err(ProviderError::from)?;
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_provider_error_display() {
        assert_eq!(
            ProviderError::NotFound("Task".to_string()).to_string(),
            "not found: Task"
        );
        assert_eq!(
            ProviderError::UniqueViolation("tasks.title".to_string()).to_string(),
            "unique constraint violation: tasks.title"
        );
    }

    #[test]
    fn test_dberr_record_not_found_maps_to_not_found() {
        let err: ProviderError = DbErr::RecordNotFound("Task not found".to_string()).into();
        assert_eq!(err, ProviderError::NotFound("Task not found".to_string()));
    }

    #[test]
    fn test_condition_builds_for_nested_filters() {
        let filter = Filter::from_json(&json!({
            "AND": [
                {"completed": false},
                {"OR": [
                    {"priority": {"gte": 3}},
                    {"title": {"contains": "urgent"}}
                ]}
            ]
        }))
        .unwrap();
        assert!(condition_for(&filter).is_ok());
    }

    #[test]
    fn test_condition_rejects_unbindable_operands() {
        let filter = Filter::equals("payload", json!({"nested": true}));
        assert!(condition_for(&filter).is_err());
    }

    #[test]
    fn test_null_equality_becomes_is_null() {
        let filter = Filter::equals("deleted_at", JsonValue::Null);
        assert!(condition_for(&filter).is_ok());
    }
}
