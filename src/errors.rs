//! # Error Handling for Dynamic CRUD
//!
//! This module provides the error taxonomy for the dynamic operation layer:
//! - Returns appropriate HTTP status codes
//! - Sends sanitized, user-friendly error messages
//! - Logs detailed internal errors for debugging
//! - Prevents leaking persistence-layer information to clients
//!
//! ## Philosophy
//!
//! **Never expose internal errors to users**. Provider errors and connection
//! details are logged server-side but never sent to clients. Client errors
//! (unknown model, unsupported operation, missing record, malformed
//! arguments) carry enough context to be actionable.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use dyncrud::CrudError;
//!
//! async fn my_handler() -> Result<Json<MyData>, CrudError> {
//!     let model = registry
//!         .get("Task")
//!         .ok_or_else(|| CrudError::model_not_found("Task"))?;
//!     Ok(Json(data))
//! }
//! ```

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use sea_orm::DbErr;
use serde::Serialize;
use std::fmt;

/// Error type for dynamic CRUD dispatch and execution.
///
/// Variants map to appropriate HTTP status codes. Persistence internals
/// are logged but not exposed to users.
#[derive(Debug)]
pub enum CrudError {
    /// 404 Not Found - the requested model name has no registry entry
    ModelNotFound {
        /// Model name as supplied by the caller
        model: String,
    },

    /// 400 Bad Request - operation kind disallowed for this model
    OperationNotSupported {
        /// Model name
        model: String,
        /// Operation kind that was rejected
        operation: String,
    },

    /// 404 Not Found - a single-record operation matched nothing
    RecordNotFound {
        /// Model name
        model: String,
    },

    /// 422 Unprocessable Entity - malformed arguments
    Validation {
        /// The offending argument or field
        field: String,
        /// User-facing error message
        message: String,
    },

    /// 500 Internal Server Error - the persistence provider rejected the
    /// operation (details logged, not exposed)
    Persistence {
        /// User-facing generic message
        message: String,
        /// Provider-supplied error (logged, not sent to user)
        internal: String,
    },
}

impl CrudError {
    /// Create a 404 error for an unknown model name
    pub fn model_not_found(model: impl Into<String>) -> Self {
        Self::ModelNotFound {
            model: model.into(),
        }
    }

    /// Create a 400 error for an operation a model does not permit
    pub fn operation_not_supported(
        model: impl Into<String>,
        operation: impl fmt::Display,
    ) -> Self {
        Self::OperationNotSupported {
            model: model.into(),
            operation: operation.to_string(),
        }
    }

    /// Create a 404 error for a missing record
    pub fn record_not_found(model: impl Into<String>) -> Self {
        Self::RecordNotFound {
            model: model.into(),
        }
    }

    /// Create a 422 error identifying the offending field
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a 500 error from a provider failure
    ///
    /// The provider error details are logged but NOT sent to the user.
    pub fn persistence(internal: impl Into<String>) -> Self {
        Self::Persistence {
            message: "A persistence error occurred".to_string(),
            internal: internal.into(),
        }
    }

    /// Get the HTTP status code for this error
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::ModelNotFound { .. } | Self::RecordNotFound { .. } => StatusCode::NOT_FOUND,
            Self::OperationNotSupported { .. } => StatusCode::BAD_REQUEST,
            Self::Validation { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the user-facing error message (sanitized)
    fn user_message(&self) -> String {
        match self {
            Self::ModelNotFound { model } => format!("Model '{model}' not found"),
            Self::OperationNotSupported { model, operation } => {
                format!("Operation '{operation}' is not supported for model '{model}'")
            }
            Self::RecordNotFound { model } => format!("{model} not found"),
            Self::Validation { field, message } => format!("{field}: {message}"),
            Self::Persistence { message, .. } => message.clone(),
        }
    }

    /// Log internal error details (not sent to user)
    fn log_internal(&self) {
        match self {
            Self::Persistence { internal, .. } => {
                tracing::error!(error = %internal, "persistence error occurred");
            }
            _ => {
                tracing::debug!(
                    error = %self.user_message(),
                    status = %self.status_code(),
                    "dynamic CRUD error"
                );
            }
        }
    }
}

/// Error response sent to users (sanitized)
#[derive(Serialize)]
struct ErrorResponse {
    /// Error message
    error: String,
    /// Offending field for validation failures
    #[serde(skip_serializing_if = "Option::is_none")]
    field: Option<String>,
}

impl IntoResponse for CrudError {
    fn into_response(self) -> Response {
        self.log_internal();

        let status = self.status_code();
        let response = match &self {
            Self::Validation { field, message } => ErrorResponse {
                error: message.clone(),
                field: Some(field.clone()),
            },
            _ => ErrorResponse {
                error: self.user_message(),
                field: None,
            },
        };

        (status, Json(response)).into_response()
    }
}

impl fmt::Display for CrudError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for CrudError {}

/// Convert a Sea-ORM error to a `CrudError`
///
/// **Conversion Rules:**
/// - `DbErr::RecordNotFound` → 404 Not Found
/// - All other `DbErr` variants → 500 (logged internally, sanitized for users)
impl From<DbErr> for CrudError {
    fn from(err: DbErr) -> Self {
        match &err {
            DbErr::RecordNotFound(msg) => {
                let model = msg.split_whitespace().next().unwrap_or("Record");
                Self::RecordNotFound {
                    model: model.to_string(),
                }
            }
            _ => Self::persistence(err.to_string()),
        }
    }
}
