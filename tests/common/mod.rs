#![allow(dead_code)]

use async_trait::async_trait;
use dyncrud::{
    Filter, ModelDescriptor, ModelRegistry, PersistenceProvider, ProviderError, RelationDescriptor,
    SortDirection, SortSpec,
};
use serde_json::{Value as JsonValue, json};
use std::cmp::Ordering;
use std::sync::atomic::{AtomicUsize, Ordering as AtomicOrdering};
use std::sync::{Arc, Mutex, PoisonError};
use uuid::Uuid;

pub mod task_entity;

/// In-memory persistence provider used to exercise the dispatch and
/// execution layers without a database. Records every invocation so tests
/// can assert the provider was (or was not) reached.
pub struct MemoryProvider {
    records: Mutex<Vec<JsonValue>>,
    unique_fields: Vec<String>,
    calls: AtomicUsize,
    last_filter: Mutex<Option<Filter>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::seeded(Vec::new())
    }

    pub fn seeded(records: Vec<JsonValue>) -> Self {
        Self {
            records: Mutex::new(records),
            unique_fields: Vec::new(),
            calls: AtomicUsize::new(0),
            last_filter: Mutex::new(None),
        }
    }

    pub fn with_unique_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.unique_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Number of provider invocations across all methods.
    pub fn call_count(&self) -> usize {
        self.calls.load(AtomicOrdering::SeqCst)
    }

    /// The filter received by the most recent invocation.
    pub fn last_filter(&self) -> Option<Filter> {
        self.last_filter
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn snapshot(&self) -> Vec<JsonValue> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn touch(&self, filter: &Filter) {
        self.calls.fetch_add(1, AtomicOrdering::SeqCst);
        *self
            .last_filter
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(filter.clone());
    }

    fn check_unique(
        &self,
        records: &[JsonValue],
        data: &JsonValue,
        skip_index: Option<usize>,
    ) -> Result<(), ProviderError> {
        for field in &self.unique_fields {
            let Some(candidate) = data.get(field) else {
                continue;
            };
            if candidate.is_null() {
                continue;
            }
            for (index, record) in records.iter().enumerate() {
                if Some(index) == skip_index {
                    continue;
                }
                if record.get(field) == Some(candidate) {
                    return Err(ProviderError::UniqueViolation(field.clone()));
                }
            }
        }
        Ok(())
    }
}

fn compare_json(left: &JsonValue, right: &JsonValue) -> Ordering {
    match (left, right) {
        (JsonValue::Number(l), JsonValue::Number(r)) => l
            .as_f64()
            .partial_cmp(&r.as_f64())
            .unwrap_or(Ordering::Equal),
        (JsonValue::String(l), JsonValue::String(r)) => l.cmp(r),
        (JsonValue::Bool(l), JsonValue::Bool(r)) => l.cmp(r),
        (JsonValue::Null, JsonValue::Null) => Ordering::Equal,
        (JsonValue::Null, _) => Ordering::Less,
        (_, JsonValue::Null) => Ordering::Greater,
        _ => Ordering::Equal,
    }
}

fn sort_records(records: &mut [JsonValue], order: &[SortSpec]) {
    records.sort_by(|left, right| {
        for spec in order {
            let l = left.get(&spec.field).unwrap_or(&JsonValue::Null);
            let r = right.get(&spec.field).unwrap_or(&JsonValue::Null);
            let ordering = match spec.direction {
                SortDirection::Asc => compare_json(l, r),
                SortDirection::Desc => compare_json(r, l),
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        Ordering::Equal
    });
}

#[async_trait]
impl PersistenceProvider for MemoryProvider {
    async fn find_many(
        &self,
        filter: &Filter,
        order: &[SortSpec],
        take: Option<u64>,
        skip: Option<u64>,
    ) -> Result<Vec<JsonValue>, ProviderError> {
        self.touch(filter);
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let mut matching: Vec<JsonValue> = records
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        sort_records(&mut matching, order);
        let skip = usize::try_from(skip.unwrap_or(0)).unwrap_or(usize::MAX);
        let mut windowed: Vec<JsonValue> = matching.into_iter().skip(skip).collect();
        if let Some(take) = take {
            windowed.truncate(usize::try_from(take).unwrap_or(usize::MAX));
        }
        Ok(windowed)
    }

    async fn find_one(&self, filter: &Filter) -> Result<Option<JsonValue>, ProviderError> {
        self.touch(filter);
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records.iter().find(|record| filter.matches(record)).cloned())
    }

    async fn count(&self, filter: &Filter) -> Result<u64, ProviderError> {
        self.touch(filter);
        let records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(records.iter().filter(|record| filter.matches(record)).count() as u64)
    }

    async fn insert(&self, mut data: JsonValue) -> Result<JsonValue, ProviderError> {
        self.touch(&Filter::All);
        let Some(map) = data.as_object_mut() else {
            return Err(ProviderError::Other(
                "insert payload must be an object".to_string(),
            ));
        };
        map.entry("id".to_string())
            .or_insert_with(|| JsonValue::String(Uuid::new_v4().to_string()));
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        self.check_unique(&records, &data, None)?;
        records.push(data.clone());
        Ok(data)
    }

    async fn update(&self, filter: &Filter, data: JsonValue) -> Result<JsonValue, ProviderError> {
        self.touch(filter);
        let Some(patch) = data.as_object() else {
            return Err(ProviderError::Other(
                "update payload must be an object".to_string(),
            ));
        };
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let index = records
            .iter()
            .position(|record| filter.matches(record))
            .ok_or_else(|| ProviderError::NotFound("record not found".to_string()))?;
        let mut updated = records[index].clone();
        if let Some(fields) = updated.as_object_mut() {
            for (key, value) in patch {
                fields.insert(key.clone(), value.clone());
            }
        }
        self.check_unique(&records, &updated, Some(index))?;
        records[index] = updated.clone();
        Ok(updated)
    }

    async fn delete(&self, filter: &Filter) -> Result<JsonValue, ProviderError> {
        self.touch(filter);
        let mut records = self.records.lock().unwrap_or_else(PoisonError::into_inner);
        let index = records
            .iter()
            .position(|record| filter.matches(record))
            .ok_or_else(|| ProviderError::NotFound("record not found".to_string()))?;
        Ok(records.remove(index))
    }
}

/// Task records with stable ids `task-1`..`task-n`, ascending priority,
/// and alternating completion.
pub fn seeded_tasks(count: usize) -> Vec<JsonValue> {
    (1..=count)
        .map(|i| {
            json!({
                "id": format!("task-{i}"),
                "title": format!("Task {i}"),
                "priority": i,
                "completed": i % 2 == 0,
            })
        })
        .collect()
}

pub fn task_descriptor() -> ModelDescriptor {
    ModelDescriptor::new("Task", "tasks")
        .with_unique_fields(["title"])
        .with_default_fields(["id", "title", "priority", "completed"])
}

/// Registry with a writable `Task` model backed by `provider` and a
/// read-only `AuditLog` model.
pub fn registry_with(provider: Arc<MemoryProvider>) -> Arc<ModelRegistry> {
    let audit = Arc::new(MemoryProvider::new());
    Arc::new(
        ModelRegistry::builder()
            .register(task_descriptor(), provider)
            .register(
                ModelDescriptor::new("AuditLog", "audit_logs")
                    .with_default_fields(["id", "action"])
                    .read_only(),
                audit,
            )
            .build(),
    )
}

/// Registry with related `Project` and `Task` models for include tests.
pub fn registry_with_relations(
    projects: Arc<MemoryProvider>,
    tasks: Arc<MemoryProvider>,
) -> Arc<ModelRegistry> {
    let project_descriptor = ModelDescriptor::new("Project", "projects")
        .with_default_fields(["id", "name"])
        .with_relation(RelationDescriptor {
            name: "tasks".to_string(),
            target: "Task".to_string(),
            local_key: "id".to_string(),
            foreign_key: "project_id".to_string(),
            to_many: true,
        });
    let task_descriptor = ModelDescriptor::new("Task", "tasks")
        .with_default_fields(["id", "title", "priority", "completed", "project_id"])
        .with_relation(RelationDescriptor {
            name: "project".to_string(),
            target: "Project".to_string(),
            local_key: "project_id".to_string(),
            foreign_key: "id".to_string(),
            to_many: false,
        });
    Arc::new(
        ModelRegistry::builder()
            .register(project_descriptor, projects)
            .register(task_descriptor, tasks)
            .build(),
    )
}
