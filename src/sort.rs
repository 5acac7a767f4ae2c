use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value as JsonValue;
use utoipa::ToSchema;

// Shared default values
const DEFAULT_SORT_FIELD: &str = "id";

/// Sort direction for an ordering spec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    /// Parse a direction string; `ASC` in any casing is ascending,
    /// everything else descends.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("ASC") {
            Self::Asc
        } else {
            Self::Desc
        }
    }

    #[must_use]
    pub const fn into_order(self) -> sea_orm::Order {
        match self {
            Self::Asc => sea_orm::Order::Asc,
            Self::Desc => sea_orm::Order::Desc,
        }
    }
}

/// One ordering term: field name plus direction.
///
/// Accepted wire forms:
/// - `{"field": "priority", "direction": "DESC"}`
/// - `"priority:desc"` or plain `"priority"` (ascending)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SortSpec {
    pub field: String,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortSpec {
    #[must_use]
    pub fn new(field: impl Into<String>, direction: SortDirection) -> Self {
        Self {
            field: field.into(),
            direction,
        }
    }

    /// Default ordering applied when a request carries no `orderBy`.
    #[must_use]
    pub fn default_order() -> Self {
        Self::new(DEFAULT_SORT_FIELD, SortDirection::Asc)
    }

    /// Parse a compact `field` / `field:asc` / `field:desc` string.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        match value.split_once(':') {
            Some((field, direction)) => Self::new(field, SortDirection::parse(direction)),
            None => Self::new(value, SortDirection::Asc),
        }
    }
}

impl<'de> Deserialize<'de> for SortSpec {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        struct Spec {
            field: String,
            #[serde(default)]
            direction: SortDirection,
        }

        match JsonValue::deserialize(deserializer)? {
            JsonValue::String(compact) => Ok(Self::parse(&compact)),
            value @ JsonValue::Object(_) => {
                let spec: Spec =
                    serde_json::from_value(value).map_err(DeError::custom)?;
                Ok(Self::new(spec.field, spec.direction))
            }
            _ => Err(DeError::custom(
                "sort spec must be a string or an object with a 'field' key",
            )),
        }
    }
}
