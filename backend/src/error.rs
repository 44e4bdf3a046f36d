//! Error handling for the POS inventory server
//!
//! Every error is turned into a structured JSON response at the request
//! boundary. Tenant-scope misses surface as `NotFound`, the same as true
//! absence.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use shared::{DomainError, Shortage};
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Authentication errors
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Insufficient permissions: requires {required}")]
    InsufficientPermissions { required: String },

    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Insufficient stock. Available: {available}, Requested: {requested}")]
    InsufficientStock {
        available: Decimal,
        requested: Decimal,
    },

    #[error("Insufficient ingredients")]
    InsufficientIngredients { shortages: Vec<Shortage> },

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.into(),
        }
    }

    /// Unique-key collisions on generated numbers become `Conflict`
    pub fn unique_violation(err: sqlx::Error, what: &str) -> Self {
        match &err {
            sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
                AppError::Conflict(format!("{} already exists, please retry", what))
            }
            _ => AppError::DatabaseError(err),
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::NonPositiveQuantity => {
                AppError::validation("quantity", "Quantity must be greater than 0")
            }
            err @ DomainError::QuantityTooPrecise { .. } => {
                AppError::validation("quantity", err.to_string())
            }
            DomainError::InsufficientStock {
                available,
                requested,
            } => AppError::InsufficientStock {
                available,
                requested,
            },
            DomainError::InsufficientIngredients { shortages } => {
                AppError::InsufficientIngredients { shortages }
            }
            err @ DomainError::InvalidTransition { .. } => AppError::InvalidState(err.to_string()),
            err @ DomainError::SameStore => AppError::validation("to_store_id", err.to_string()),
        }
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let (field, message) = first_validation_error(&errors, None)
            .unwrap_or_else(|| ("request".to_string(), "Invalid request".to_string()));
        AppError::Validation { field, message }
    }
}

/// First failing field, with nested paths such as `items[1].quantity`
fn first_validation_error(
    errors: &validator::ValidationErrors,
    prefix: Option<&str>,
) -> Option<(String, String)> {
    use validator::ValidationErrorsKind;

    let path = |field: &str| match prefix {
        Some(prefix) => format!("{}.{}", prefix, field),
        None => field.to_string(),
    };

    let mut fields: Vec<_> = errors.errors().iter().collect();
    fields.sort_by_key(|(field, _)| **field);

    fields.into_iter().find_map(|(field, kind)| match kind {
        ValidationErrorsKind::Field(errs) => {
            let message = errs
                .first()
                .and_then(|e| e.message.as_ref().map(|m| m.to_string()))
                .unwrap_or_else(|| format!("{} is invalid", field));
            Some((path(field), message))
        }
        ValidationErrorsKind::Struct(nested) => first_validation_error(nested, Some(&path(field))),
        ValidationErrorsKind::List(items) => items.iter().find_map(|(index, nested)| {
            first_validation_error(nested, Some(&format!("{}[{}]", path(field), index)))
        }),
    })
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorDetail {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
            details: None,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::Unauthorized(msg) => (
                StatusCode::UNAUTHORIZED,
                ErrorDetail::new("UNAUTHORIZED", msg.clone()),
            ),
            AppError::InsufficientPermissions { required } => (
                StatusCode::FORBIDDEN,
                ErrorDetail {
                    details: Some(serde_json::json!({ "required": required })),
                    ..ErrorDetail::new(
                        "INSUFFICIENT_PERMISSIONS",
                        "You do not have permission to perform this action",
                    )
                },
            ),
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    field: Some(field.clone()),
                    ..ErrorDetail::new("VALIDATION_ERROR", message.clone())
                },
            ),
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                ErrorDetail::new("CONFLICT", msg.clone()),
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::InvalidState(msg) => (
                StatusCode::CONFLICT,
                ErrorDetail::new("INVALID_STATE", msg.clone()),
            ),
            AppError::InsufficientStock {
                available,
                requested,
            } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    details: Some(serde_json::json!({
                        "available": available,
                        "requested": requested,
                    })),
                    ..ErrorDetail::new("INSUFFICIENT_STOCK", self.to_string())
                },
            ),
            AppError::InsufficientIngredients { shortages } => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    details: serde_json::to_value(shortages).ok(),
                    ..ErrorDetail::new("INSUFFICIENT_INGREDIENTS", "Insufficient ingredients")
                },
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred"),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg.clone()),
            ),
        };

        if status.is_server_error() {
            tracing::error!("Error: {:?}", self);
        } else {
            tracing::warn!(code = %error_detail.code, "Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;
    use shared::TransferStatus;

    #[test]
    fn test_domain_errors_map_to_kinds() {
        let err: AppError = DomainError::InvalidTransition {
            action: "approve",
            current: TransferStatus::Completed,
        }
        .into();
        assert!(matches!(err, AppError::InvalidState(ref m) if m.contains("completed")));

        let err: AppError = DomainError::SameStore.into();
        assert!(matches!(err, AppError::Validation { ref field, .. } if field == "to_store_id"));

        let err: AppError = DomainError::InsufficientStock {
            available: Decimal::from(2),
            requested: Decimal::from(5),
        }
        .into();
        assert!(matches!(err, AppError::InsufficientStock { .. }));
    }

    #[test]
    fn test_status_codes() {
        let resp = AppError::NotFound("Transfer".into()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = AppError::InsufficientIngredients { shortages: vec![] }.into_response();
        assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let resp = AppError::InvalidState("nope".into()).into_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
    }
}
