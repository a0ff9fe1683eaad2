//! # tatylu-db: Database Layer for the Tatylu order pipeline
//!
//! This crate provides database access for the order pipeline.
//! It uses SQLite for storage with sqlx for async operations.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Tatylu Data Flow                                 │
//! │                                                                         │
//! │  OrderService (create_order, calculate, generate_report)                │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                     tatylu-db (THIS CRATE)                      │    │
//! │  │                                                                 │    │
//! │  │   ┌───────────────┐    ┌────────────────┐    ┌──────────────┐   │    │
//! │  │   │   Database    │    │  Repositories  │    │  Migrations  │   │    │
//! │  │   │   (pool.rs)   │    │                │    │  (embedded)  │   │    │
//! │  │   │               │    │ ProductRepo    │    │ 001_initial_ │   │    │
//! │  │   │ SqlitePool    │◄───│ OrderRepo      │    │   schema.sql │   │    │
//! │  │   │ busy_timeout  │    │ UserRepo       │    │              │   │    │
//! │  │   │ WAL           │    │ CheckoutRepo   │    │              │   │    │
//! │  │   └───────────────┘    └────────────────┘    └──────────────┘   │    │
//! │  │                                                                 │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐    │
//! │  │                     SQLite Database (DATABASE_PATH)             │    │
//! │  └─────────────────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`pool`] - Connection pool creation and configuration
//! - [`migrations`] - Embedded database migrations
//! - [`error`] - Database error types
//! - [`repository`] - Repository implementations (product, order, checkout, ...)
//!
//! ## Usage
//!
//! ```rust,ignore
//! use tatylu_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("path/to/tatylu.db")).await?;
//!
//! let lookup = db.products().resolve(&refs).await?;
//! let order = db.checkout().commit(draft).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

// Repository re-exports for convenience
pub use repository::checkout::{CheckoutDraft, CheckoutRepository};
pub use repository::order::OrderRepository;
pub use repository::product::{NewProduct, ProductRepository};
pub use repository::report::{ReportRecord, ReportRepository};
pub use repository::user::{NewUser, UserRepository};
