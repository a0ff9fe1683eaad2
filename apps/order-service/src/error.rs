//! # API Error Type
//!
//! Unified error type for order service operations.
//!
//! ## Error Handling Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Flow in the Order Service                      │
//! │                                                                         │
//! │  ValidationError ──► CoreError ──► DbError::Domain ──┐                  │
//! │                          │                           │                  │
//! │                          └───────────────────────────┼──► ApiError      │
//! │  sqlx::Error ─────────────────► DbError ─────────────┘    {code, msg}   │
//! │                                                                         │
//! │  Client-classified (4xx): VALIDATION_ERROR, NOT_FOUND,                  │
//! │                           INSUFFICIENT_STOCK                            │
//! │  Server-classified (5xx): DATABASE_ERROR, INTERNAL                      │
//! │      └── detail is logged, the message stays generic                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::Serialize;
use tatylu_core::{CoreError, ValidationError};
use tatylu_db::DbError;

/// Error returned from order service operations.
///
/// ## Serialization
/// ```json
/// {
///   "code": "INSUFFICIENT_STOCK",
///   "message": "Insufficient stock for Camiseta: 1 available, 3 requested"
/// }
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Machine-readable error code for programmatic handling
    pub code: ErrorCode,

    /// Human-readable error message for display
    pub message: String,
}

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    /// Input validation failed (400)
    ValidationError,

    /// Resource not found (404)
    NotFound,

    /// Not enough stock for a line (409)
    InsufficientStock,

    /// Database operation failed (500)
    DatabaseError,

    /// Internal server error (500)
    Internal,
}

impl ErrorCode {
    /// True for errors caused by the request rather than the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ErrorCode::ValidationError | ErrorCode::NotFound | ErrorCode::InsufficientStock
        )
    }

    /// HTTP-style status for transport layers.
    pub fn status(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 400,
            ErrorCode::NotFound => 404,
            ErrorCode::InsufficientStock => 409,
            ErrorCode::DatabaseError | ErrorCode::Internal => 500,
        }
    }
}

impl ApiError {
    /// Creates a new API error.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        ApiError {
            code,
            message: message.into(),
        }
    }

    /// Creates a not found error.
    pub fn not_found(resource: &str, id: &str) -> Self {
        ApiError::new(ErrorCode::NotFound, format!("{} not found: {}", resource, id))
    }

    /// Creates a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::ValidationError, message)
    }

    /// Creates an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::new(ErrorCode::Internal, message)
    }

    pub fn is_client_error(&self) -> bool {
        self.code.is_client_error()
    }
}

/// Converts database errors to API errors.
impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::Domain(core) => core.into(),
            DbError::NotFound { entity, id } => ApiError::not_found(&entity, &id),
            DbError::UniqueViolation { field, value } => ApiError::new(
                ErrorCode::ValidationError,
                format!("{} '{}' already exists", field, value),
            ),
            DbError::ForeignKeyViolation { message } => {
                tracing::error!("Foreign key violation: {}", message);
                ApiError::new(ErrorCode::ValidationError, "Invalid reference")
            }
            DbError::CheckViolation { message } => {
                tracing::error!("Check constraint violation: {}", message);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::ConnectionFailed(e) => {
                tracing::error!("Database connection failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database connection failed")
            }
            DbError::MigrationFailed(e) => {
                tracing::error!("Database migration failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database migration failed")
            }
            DbError::QueryFailed(e) => {
                // Log the actual error but return a generic message
                tracing::error!("Database query failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
            DbError::TransactionFailed(e) => {
                tracing::error!("Transaction failed: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database transaction failed")
            }
            DbError::PoolExhausted => {
                tracing::error!("Database pool exhausted");
                ApiError::new(ErrorCode::DatabaseError, "Database pool exhausted")
            }
            DbError::Serialization(e) => {
                tracing::error!("Stored document could not be decoded: {}", e);
                ApiError::internal("Internal error")
            }
            DbError::Internal(e) => {
                tracing::error!("Internal database error: {}", e);
                ApiError::new(ErrorCode::DatabaseError, "Database operation failed")
            }
        }
    }
}

/// Converts core errors to API errors.
impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ProductNotFound(id) => ApiError::not_found("Product", &id),
            CoreError::UserNotFound(id) => ApiError::not_found("User", &id),
            CoreError::OrderNotFound(id) => ApiError::not_found("Order", &id),
            CoreError::InsufficientStock {
                product,
                available,
                requested,
            } => ApiError::new(
                ErrorCode::InsufficientStock,
                format!(
                    "Insufficient stock for {}: {} available, {} requested",
                    product, available, requested
                ),
            ),
            CoreError::EmptyCart => ApiError::validation(err.to_string()),
            CoreError::Validation(e) => ApiError::validation(e.to_string()),
        }
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{:?}] {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

/// Result type for order service operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        let stock: ApiError = CoreError::InsufficientStock {
            product: "Camiseta".into(),
            available: 1,
            requested: 3,
        }
        .into();
        assert_eq!(stock.code, ErrorCode::InsufficientStock);
        assert!(stock.is_client_error());
        assert_eq!(
            stock.message,
            "Insufficient stock for Camiseta: 1 available, 3 requested"
        );

        let missing: ApiError = DbError::Domain(CoreError::ProductNotFound("101".into())).into();
        assert_eq!(missing.code, ErrorCode::NotFound);
        assert_eq!(missing.code.status(), 404);

        let empty: ApiError = CoreError::EmptyCart.into();
        assert_eq!(empty.code, ErrorCode::ValidationError);
        assert_eq!(empty.message, "Cart is empty");
    }

    #[test]
    fn test_server_errors_are_generic() {
        let err: ApiError = DbError::QueryFailed("near \"SELEC\": syntax error".into()).into();
        assert_eq!(err.code, ErrorCode::DatabaseError);
        assert!(!err.is_client_error());
        assert_eq!(err.message, "Database operation failed");
    }

    #[test]
    fn test_serialization() {
        let json = serde_json::to_value(ApiError::not_found("Order", "abc")).unwrap();
        assert_eq!(json["code"], "NOT_FOUND");
        assert_eq!(json["message"], "Order not found: abc");
    }
}
