//! # tatylu-core: Pure Business Logic for the Tatylu order pipeline
//!
//! This crate is the **heart** of the order pipeline. It contains pricing,
//! normalization, invoice and report logic as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Tatylu Order Pipeline                               │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                 Storefront checkout (JSON)                      │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │                OrderService (apps/order-service)                │    │
//! │  │    calculate, create_order, generate_invoice, generate_report   │    │
//! │  └─────────────────────────────┬───────────────────────────────────┘    │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │               ★ tatylu-core (THIS CRATE) ★                      │    │
//! │  │                                                                 │    │
//! │  │  ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌─────────┐ ┌────────┐  │    │
//! │  │  │normalize │ │ pricing  │ │ invoice  │ │ report  │ │ money  │  │    │
//! │  │  │ aliases  │ │ totals   │ │ numbers  │ │ windows │ │ cents  │  │    │
//! │  │  └──────────┘ └──────────┘ └──────────┘ └─────────┘ └────────┘  │    │
//! │  │                                                                 │    │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS            │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐    │
//! │  │                 tatylu-db (Database Layer)                      │    │
//! │  │       SQLite queries, migrations, the checkout transaction      │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (Product, Order, User, rates)
//! - [`money`] - Money type with integer arithmetic, numeric coercion
//! - [`ids`] - Product references and object ids
//! - [`normalize`] - Alias table for checkout bodies
//! - [`validation`] - Cart, rate and email rules
//! - [`pricing`] - Line prices, shipping, totals
//! - [`invoice`] - Invoice records and notification text
//! - [`report`] - Sales report aggregation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use tatylu_core::money::Money;
//! use tatylu_core::types::TaxRate;
//!
//! let subtotal = Money::from_cents(2300); // $23.00
//! let tax = subtotal.calculate_tax(TaxRate::from_fraction(0.15));
//! assert_eq!(tax.cents(), 345);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod ids;
pub mod invoice;
pub mod money;
pub mod normalize;
pub mod pricing;
pub mod report;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use error::{CoreError, CoreResult, ValidationError};
pub use ids::{ProductLookup, ProductRef};
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default tax rate in basis points (15%).
pub const DEFAULT_TAX_RATE_BPS: u32 = 1500;

/// Default currency code for invoices.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Order codes never go below this value.
pub const MIN_ORDER_CODE: i64 = 30;

/// Name of the counter row that issues order codes.
pub const ORDER_SEQUENCE: &str = "order-id";

/// Maximum quantity of a single cart line.
pub const MAX_ITEM_QUANTITY: i64 = 1_000_000;

/// Maximum unit price in cents ($100,000,000.00).
///
/// With [`MAX_ITEM_QUANTITY`] a single line stays far below `i64::MAX`.
pub const MAX_PRICE_CENTS: i64 = 10_000_000_000;

/// Number of orders returned by the recent-orders listing.
pub const RECENT_ORDERS_LIMIT: i64 = 200;

/// Upper bound for the top-orders listing.
pub const MAX_TOP_ORDERS: i64 = 100;

/// Number of entries in the report's top-products list.
pub const TOP_PRODUCTS_LIMIT: usize = 10;

/// Category used when neither the catalog nor the order line has one.
pub const DEFAULT_CATEGORY: &str = "otros";

/// Name used when neither the catalog nor the order line has one.
pub const UNKNOWN_PRODUCT_NAME: &str = "Producto desconocido";
