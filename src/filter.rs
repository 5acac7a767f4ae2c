//! # Filter Expression Tree
//!
//! Filters arrive from clients as JSON and are parsed into an explicit
//! recursive tree before anything touches the persistence layer. The wire
//! encoding is object-shaped:
//!
//! - `{}` matches every record
//! - `{"title": "example"}` is an equality comparison
//! - `{"priority": {"gte": 3}}` is an operator comparison
//! - `{"id": ["a", "b"]}` is membership (IN)
//! - `{"AND": [...]}`, `{"OR": [...]}`, `{"NOT": {...}}` combine subtrees
//! - multiple keys in one object AND together
//!
//! Parsing into a closed variant set (rather than forwarding raw JSON) is
//! what lets the executor validate structure up front and lets providers
//! translate filters without guessing at shapes.

use crate::errors::CrudError;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value as JsonValue, json};

// Basic safety limits, applied before a filter reaches any provider.
const MAX_FIELD_NAME_LENGTH: usize = 100;
const MAX_FIELD_VALUE_LENGTH: usize = 10_000;

/// Comparison operator for a filter leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    Contains,
    StartsWith,
    EndsWith,
}

impl CompareOp {
    /// Wire key for this operator inside a comparison object.
    #[must_use]
    pub const fn as_key(self) -> &'static str {
        match self {
            Self::Eq => "equals",
            Self::Ne => "not",
            Self::Lt => "lt",
            Self::Lte => "lte",
            Self::Gt => "gt",
            Self::Gte => "gte",
            Self::In => "in",
            Self::Contains => "contains",
            Self::StartsWith => "startsWith",
            Self::EndsWith => "endsWith",
        }
    }

    fn from_key(key: &str) -> Option<Self> {
        match key {
            "equals" => Some(Self::Eq),
            "not" => Some(Self::Ne),
            "lt" => Some(Self::Lt),
            "lte" => Some(Self::Lte),
            "gt" => Some(Self::Gt),
            "gte" => Some(Self::Gte),
            "in" => Some(Self::In),
            "contains" => Some(Self::Contains),
            "startsWith" => Some(Self::StartsWith),
            "endsWith" => Some(Self::EndsWith),
            _ => None,
        }
    }
}

/// A parsed filter expression.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Filter {
    /// Matches every record of the model.
    #[default]
    All,
    And(Vec<Filter>),
    Or(Vec<Filter>),
    Not(Box<Filter>),
    Cmp {
        field: String,
        op: CompareOp,
        value: JsonValue,
    },
}

impl Filter {
    /// Equality comparison on a single field.
    #[must_use]
    pub fn equals(field: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        Self::Cmp {
            field: field.into(),
            op: CompareOp::Eq,
            value: value.into(),
        }
    }

    /// Whether this filter matches every record.
    #[must_use]
    pub const fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }

    /// Parse a filter from its JSON wire form.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error for shapes that do not encode a filter
    /// (non-object roots, unknown operator objects, non-array combinators).
    pub fn from_json(value: &JsonValue) -> Result<Self, CrudError> {
        match value {
            JsonValue::Null => Ok(Self::All),
            JsonValue::Object(map) => Self::from_object(map),
            _ => Err(CrudError::validation("where", "filter must be a JSON object")),
        }
    }

    fn from_object(map: &Map<String, JsonValue>) -> Result<Self, CrudError> {
        let mut nodes = Vec::with_capacity(map.len());
        for (key, value) in map {
            match key.as_str() {
                "AND" => nodes.push(Self::And(Self::from_list(key, value)?)),
                "OR" => nodes.push(Self::Or(Self::from_list(key, value)?)),
                "NOT" => nodes.push(Self::Not(Box::new(Self::from_json(value)?))),
                field => nodes.push(Self::from_field(field, value)?),
            }
        }
        Ok(match nodes.len() {
            0 => Self::All,
            1 => nodes.remove(0),
            _ => Self::And(nodes),
        })
    }

    fn from_list(key: &str, value: &JsonValue) -> Result<Vec<Self>, CrudError> {
        let JsonValue::Array(items) = value else {
            return Err(CrudError::validation(
                key,
                "combinator value must be an array of filters",
            ));
        };
        items.iter().map(Self::from_json).collect()
    }

    fn from_field(field: &str, value: &JsonValue) -> Result<Self, CrudError> {
        let leaf = |op, value: &JsonValue| Self::Cmp {
            field: field.to_string(),
            op,
            value: value.clone(),
        };
        match value {
            JsonValue::Array(_) => Ok(leaf(CompareOp::In, value)),
            JsonValue::Object(ops) => {
                let mut nodes = Vec::with_capacity(ops.len());
                for (key, operand) in ops {
                    let Some(op) = CompareOp::from_key(key) else {
                        return Err(CrudError::validation(
                            field,
                            format!("unknown filter operator '{key}'"),
                        ));
                    };
                    nodes.push(leaf(op, operand));
                }
                Ok(match nodes.len() {
                    0 => Self::All,
                    1 => nodes.remove(0),
                    _ => Self::And(nodes),
                })
            }
            _ => Ok(leaf(CompareOp::Eq, value)),
        }
    }

    /// Serialize back to the JSON wire form.
    #[must_use]
    pub fn to_json(&self) -> JsonValue {
        match self {
            Self::All => json!({}),
            Self::And(children) => {
                json!({ "AND": children.iter().map(Self::to_json).collect::<Vec<_>>() })
            }
            Self::Or(children) => {
                json!({ "OR": children.iter().map(Self::to_json).collect::<Vec<_>>() })
            }
            Self::Not(inner) => json!({ "NOT": inner.to_json() }),
            Self::Cmp { field, op, value } => match op {
                CompareOp::Eq if !value.is_array() => json!({ field: value }),
                CompareOp::In => json!({ field: value }),
                _ => json!({ field: { op.as_key(): value } }),
            },
        }
    }

    /// Validate structure before the filter is forwarded to a provider.
    ///
    /// # Errors
    ///
    /// Returns a `Validation` error naming the offending field for bad
    /// field names, oversized values, or operand types an operator cannot
    /// accept.
    pub fn validate(&self) -> Result<(), CrudError> {
        match self {
            Self::All => Ok(()),
            Self::And(children) | Self::Or(children) => {
                children.iter().try_for_each(Self::validate)
            }
            Self::Not(inner) => inner.validate(),
            Self::Cmp { field, op, value } => {
                if !is_valid_field_name(field) {
                    return Err(CrudError::validation(field, "invalid field name"));
                }
                validate_operand(field, *op, value)
            }
        }
    }

    /// Field names of every equality leaf, provided the tree consists only
    /// of equality leaves joined by AND. Used to check that a `findUnique`
    /// filter can identify at most one record.
    #[must_use]
    pub fn equality_fields(&self) -> Option<Vec<&str>> {
        match self {
            Self::Cmp {
                field,
                op: CompareOp::Eq,
                ..
            } => Some(vec![field.as_str()]),
            Self::And(children) => {
                let mut fields = Vec::with_capacity(children.len());
                for child in children {
                    fields.extend(child.equality_fields()?);
                }
                Some(fields)
            }
            _ => None,
        }
    }

    /// Evaluate the filter against a JSON record. Missing fields compare
    /// as null. This is the evaluation path for providers that are not
    /// backed by a query engine.
    #[must_use]
    pub fn matches(&self, record: &JsonValue) -> bool {
        match self {
            Self::All => true,
            Self::And(children) => children.iter().all(|child| child.matches(record)),
            Self::Or(children) => children.iter().any(|child| child.matches(record)),
            Self::Not(inner) => !inner.matches(record),
            Self::Cmp { field, op, value } => {
                let actual = record.get(field).unwrap_or(&JsonValue::Null);
                compare(actual, *op, value)
            }
        }
    }
}

fn compare(actual: &JsonValue, op: CompareOp, expected: &JsonValue) -> bool {
    match op {
        CompareOp::Eq => json_equal(actual, expected),
        CompareOp::Ne => !json_equal(actual, expected),
        CompareOp::Lt => ordering(actual, expected).is_some_and(std::cmp::Ordering::is_lt),
        CompareOp::Lte => ordering(actual, expected).is_some_and(std::cmp::Ordering::is_le),
        CompareOp::Gt => ordering(actual, expected).is_some_and(std::cmp::Ordering::is_gt),
        CompareOp::Gte => ordering(actual, expected).is_some_and(std::cmp::Ordering::is_ge),
        CompareOp::In => expected
            .as_array()
            .is_some_and(|items| items.iter().any(|item| json_equal(actual, item))),
        CompareOp::Contains => both_strings(actual, expected)
            .is_some_and(|(actual, expected)| actual.contains(expected)),
        CompareOp::StartsWith => both_strings(actual, expected)
            .is_some_and(|(actual, expected)| actual.starts_with(expected)),
        CompareOp::EndsWith => both_strings(actual, expected)
            .is_some_and(|(actual, expected)| actual.ends_with(expected)),
    }
}

fn json_equal(left: &JsonValue, right: &JsonValue) -> bool {
    match (left.as_f64(), right.as_f64()) {
        // Compare numerically so 3 == 3.0 across integer/float encodings
        (Some(left), Some(right)) => (left - right).abs() < f64::EPSILON,
        _ => left == right,
    }
}

fn ordering(left: &JsonValue, right: &JsonValue) -> Option<std::cmp::Ordering> {
    if let (Some(left), Some(right)) = (left.as_f64(), right.as_f64()) {
        return left.partial_cmp(&right);
    }
    if let (Some(left), Some(right)) = (left.as_str(), right.as_str()) {
        return Some(left.cmp(right));
    }
    None
}

fn both_strings<'a>(left: &'a JsonValue, right: &'a JsonValue) -> Option<(&'a str, &'a str)> {
    Some((left.as_str()?, right.as_str()?))
}

fn is_valid_field_name(field: &str) -> bool {
    !field.is_empty()
        && field.len() <= MAX_FIELD_NAME_LENGTH
        && !field.starts_with('_')
        && !field.contains("..")
}

fn validate_operand(field: &str, op: CompareOp, value: &JsonValue) -> Result<(), CrudError> {
    if let Some(text) = value.as_str()
        && text.len() > MAX_FIELD_VALUE_LENGTH
    {
        return Err(CrudError::validation(field, "filter value too long"));
    }
    match op {
        CompareOp::Lt | CompareOp::Lte | CompareOp::Gt | CompareOp::Gte => {
            if value.is_number() || value.is_string() {
                Ok(())
            } else {
                Err(CrudError::validation(
                    field,
                    "ordered comparison requires a number or string operand",
                ))
            }
        }
        CompareOp::In => {
            if value.is_array() {
                Ok(())
            } else {
                Err(CrudError::validation(field, "'in' operand must be an array"))
            }
        }
        CompareOp::Contains | CompareOp::StartsWith | CompareOp::EndsWith => {
            if value.is_string() {
                Ok(())
            } else {
                Err(CrudError::validation(
                    field,
                    "substring operators require a string operand",
                ))
            }
        }
        CompareOp::Eq | CompareOp::Ne => Ok(()),
    }
}

impl Serialize for Filter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Filter {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = JsonValue::deserialize(deserializer)?;
        Self::from_json(&value).map_err(|err| DeError::custom(err.to_string()))
    }
}
