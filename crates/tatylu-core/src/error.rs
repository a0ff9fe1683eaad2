//! # Error Types
//!
//! Domain-specific error types for tatylu-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  tatylu-core errors (this file)                                         │
//! │  ├── CoreError        - Business rule failures (stock, lookups)         │
//! │  └── ValidationError  - Checkout input failures                         │
//! │                                                                         │
//! │  tatylu-db errors (separate crate)                                      │
//! │  └── DbError          - Database failures + Domain(CoreError) aborts    │
//! │                                                                         │
//! │  order-service errors (in app)                                          │
//! │  └── ApiError         - What callers see (code + message)               │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → DbError → ApiError → Caller        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Classification
//! | Variant                      | Class        |
//! |------------------------------|--------------|
//! | `Validation(_)`, `EmptyCart` | validation   |
//! | `*NotFound`                  | not found    |
//! | `InsufficientStock`          | conflict     |

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// Raised before any mutation (validation) or from inside the checkout
/// transaction (lookups and stock), where they abort and roll back.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CoreError {
    /// Product cannot be found.
    ///
    /// ## When This Occurs
    /// - Canonical id or alternate code does not match any catalog entry
    /// - Product was removed between pricing and commit
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// Buyer referenced by `userId` does not exist.
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Order cannot be found.
    #[error("Order not found: {0}")]
    OrderNotFound(String),

    /// Insufficient stock to complete the order.
    ///
    /// ## User Workflow
    /// ```text
    /// Checkout (qty: 5)
    ///      │
    ///      ▼
    /// Reserve stock inside transaction: available=3
    ///      │
    ///      ▼
    /// InsufficientStock { product: "Camiseta", available: 3, requested: 5 }
    ///      │
    ///      ▼
    /// Transaction rolled back, nothing persisted
    /// ```
    #[error("Insufficient stock for {product}: available {available}, requested {requested}")]
    InsufficientStock {
        product: String,
        available: i64,
        requested: i64,
    },

    /// Checkout request has no items.
    #[error("Cart is empty")]
    EmptyCart,

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl CoreError {
    /// Returns true for lookup failures.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            CoreError::ProductNotFound(_) | CoreError::UserNotFound(_) | CoreError::OrderNotFound(_)
        )
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
///
/// These occur at the request boundary, before pricing or any storage call.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// A cart line is unusable. `index` is zero-based.
    #[error("Item {index}: {reason}")]
    InvalidItem { index: usize, reason: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Invalid format (email address, identifier, ...).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Value is not in allowed set.
    #[error("{field} must be one of: {allowed:?}")]
    NotAllowed { field: String, allowed: Vec<String> },

    /// Neither a registered buyer nor an inline buyer was supplied.
    #[error("Provide userId or user object with nombre and email")]
    MissingBuyer,
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================
