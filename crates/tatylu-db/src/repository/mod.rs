//! # Repository Module
//!
//! Database repository implementations for the Tatylu order pipeline.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern                                   │
//! │                                                                         │
//! │  OrderService::create_order                                             │
//! │       │                                                                 │
//! │       │  db.products().resolve(&refs)                                   │
//! │       │  db.checkout().commit(draft)                                    │
//! │       ▼                                                                 │
//! │  ProductRepository          CheckoutRepository                          │
//! │  ├── resolve(refs)          └── commit(draft)  ── one transaction:      │
//! │  ├── get_by_id / get_by_code      products + orders + user_orders       │
//! │  ├── insert                                                             │
//! │  └── adjust_stock           OrderRepository                             │
//! │                             ├── next_order_code()                       │
//! │  UserRepository             ├── save / get_by_id                        │
//! │  ├── get_by_id / insert     ├── list_recent / list_for_user             │
//! │  ├── set_cart               ├── top_by_total                            │
//! │  └── history                └── update_status                           │
//! │                                                                         │
//! │  ReportRepository ── save_snapshot / latest / list                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Catalog lookups and batched resolution
//! - [`order::OrderRepository`] - Orders and the sequential order code
//! - [`user::UserRepository`] - Users, carts and order history
//! - [`report::ReportRepository`] - Report snapshot audit records
//! - [`checkout::CheckoutRepository`] - The order commit transaction

pub mod checkout;
pub mod order;
pub mod product;
pub mod report;
pub mod user;
