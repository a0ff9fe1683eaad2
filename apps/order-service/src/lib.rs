//! # Tatylu Orders
//!
//! Order pipeline for the Tatylu storefront: cart pricing, checkout,
//! invoicing, post-commit email, and sales reports.
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                          Tatylu Order Service                           │
//! │                                                                         │
//! │  JSON body ──► OrderService ──► tatylu-core (normalize, price, invoice) │
//! │                     │                                                   │
//! │                     ├──► tatylu-db (resolve, checkout tx, queries)      │
//! │                     │                                                   │
//! │                     └──► NotifierHandle ──► PostCommitNotifier task     │
//! │                                                  │                      │
//! │                                                  ▼                      │
//! │                                              MailSender                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//! - [`config`] - Environment-driven settings
//! - [`error`] - `ApiError` with client/server classification
//! - [`notify`] - Background invoice email delivery
//! - [`service`] - The order operations

pub mod config;
pub mod error;
pub mod notify;
pub mod service;

use tracing_subscriber::EnvFilter;

pub use config::{ConfigError, OrderConfig};
pub use error::{ApiError, ApiResult, ErrorCode};
pub use notify::{LogMailer, MailMessage, MailOutcome, MailSender, NotifierHandle, PostCommitNotifier};
pub use service::{InvoiceResult, OrderService};

/// Initializes the tracing subscriber.
///
/// ## Environment Variables
/// - `RUST_LOG=debug` - Show debug messages
/// - `RUST_LOG=tatylu=trace` - Show trace for tatylu crates only
/// - Default: INFO level, DEBUG for tatylu crates
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tatylu_orders=debug,tatylu_db=debug,sqlx=warn"));

    tracing_subscriber::fmt().with_env_filter(filter).init();
}
