//! # Checkout Repository
//!
//! The order commit: stock reservation, order insert and buyer history in a
//! single SQLite transaction.
//!
//! ## Commit Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         commit(draft)                                   │
//! │                                                                         │
//! │  next_order_code()          autocommit, outside the transaction         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  BEGIN                                                                  │
//! │   ├─ for each line:                                                     │
//! │   │    UPDATE products SET stock = stock - qty                          │
//! │   │    WHERE <id|code> = ? AND stock >= qty  RETURNING *                │
//! │   │      ├─ row    → price line from the returned (fresh) product       │
//! │   │      └─ no row → SELECT: missing?  → ProductNotFound   ─┐           │
//! │   │                          too few? → InsufficientStock  ─┤ ROLLBACK  │
//! │   ├─ compute totals                                         │           │
//! │   ├─ INSERT orders + order_items (status confirmado)        │           │
//! │   ├─ user attached? INSERT user_orders, clear cart          │           │
//! │  COMMIT ◄───────────────────────────────────────────────────┘           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Serialization
//! The first statement after `BEGIN` is a write, so the transaction takes
//! SQLite's write lock before it reads any stock. Competing checkouts wait
//! on that lock (`busy_timeout`) and then see the committed stock. Stock can
//! never go below zero: the guarded update is the only decrement, and the
//! schema has `CHECK (stock >= 0)` as a backstop.
//!
//! ## Failure
//! Any error drops the transaction, which rolls back every write: stock,
//! order rows and history are left untouched. Only the counter value is
//! consumed.

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info, warn};

use crate::error::{DbError, DbResult};
use crate::repository::order::OrderRepository;
use crate::repository::product::PRODUCT_COLUMNS;
use crate::repository::user::UserRepository;
use tatylu_core::ids::new_object_id;
use tatylu_core::normalize::PricingOptions;
use tatylu_core::pricing::{compute_totals, order_item_for, sum_line_totals, ShippingPolicy};
use tatylu_core::{
    BuyerSnapshot, CartItem, CoreError, Order, OrderHistoryEntry, OrderStatus, OrderSummary,
    PaymentInfo, Product, ProductRef, ShippingInfo,
};

/// Everything the commit needs, already normalized and validated.
#[derive(Debug, Clone)]
pub struct CheckoutDraft {
    pub items: Vec<CartItem>,
    /// Buyer snapshot. `user_id` set means a registered user whose history
    /// and cart are updated.
    pub buyer: BuyerSnapshot,
    pub options: PricingOptions,
    pub policy: ShippingPolicy,
    pub shipping: ShippingInfo,
    pub payment: PaymentInfo,
    /// Recorded in the order summary when the order is also invoiced.
    pub invoice_number: Option<String>,
}

/// Runs the checkout transaction.
#[derive(Debug, Clone)]
pub struct CheckoutRepository {
    pool: SqlitePool,
}

impl CheckoutRepository {
    /// Creates a new CheckoutRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CheckoutRepository { pool }
    }

    /// Commits an order.
    ///
    /// ## Returns
    /// * `Ok(Order)` - Committed order (status `confirmado`, code assigned)
    /// * `Err(DbError::Domain(ProductNotFound))` - A line no longer resolves
    /// * `Err(DbError::Domain(InsufficientStock))` - Not enough stock
    /// * `Err(DbError::Domain(EmptyCart))` - No lines
    /// * `Err(_)` - Storage failure; nothing was written
    pub async fn commit(&self, draft: CheckoutDraft) -> DbResult<Order> {
        if draft.items.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        let code = OrderRepository::new(self.pool.clone()).next_order_code().await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        let currency = draft.options.currency.clone();
        let mut items = Vec::with_capacity(draft.items.len());
        for item in &draft.items {
            let product = reserve_stock(&mut *tx, &item.reference, item.quantity).await?;
            debug!(
                product = %product.id,
                quantity = item.quantity,
                remaining = product.stock,
                "Stock reserved"
            );
            items.push(order_item_for(&product, item.quantity, &currency).map_err(CoreError::from)?);
        }

        let subtotal = sum_line_totals(items.iter().map(|i| i.line_total())).map_err(CoreError::from)?;
        let units: i64 = items.iter().map(|i| i.quantity).sum();
        let totals = compute_totals(subtotal, units, &draft.options, &draft.policy).map_err(CoreError::from)?;

        let mut shipping = draft.shipping;
        shipping.cost_cents = totals.shipping_cents;

        let user_id = draft.buyer.user_id.clone();
        let created_at = Utc::now();
        let summary = OrderSummary {
            customer: draft.buyer,
            items,
            totals,
            shipping,
            payment: draft.payment,
            invoice_number: draft.invoice_number,
        };
        let mut order = Order::new(
            new_object_id(),
            user_id.clone(),
            OrderStatus::Confirmado,
            summary,
            created_at,
        );
        order.code = Some(code);

        OrderRepository::write_order(&mut *tx, &order).await?;

        if let Some(user_id) = &user_id {
            let entry = history_entry(&order, created_at);
            UserRepository::record_purchase(&mut *tx, user_id, &entry).await?;
        }

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        info!(
            id = %order.id,
            code = code,
            lines = order.items.len(),
            total_cents = order.total_cents,
            user = ?order.user_id,
            "Order committed"
        );
        Ok(order)
    }
}

fn history_entry(order: &Order, placed_at: DateTime<Utc>) -> OrderHistoryEntry {
    OrderHistoryEntry {
        order_id: order.id.clone(),
        order_code: order.code,
        placed_at,
        summary: order.summary.clone(),
    }
}

/// Decrements stock for one line, returning the product as updated.
///
/// On a miss the product is re-read to classify the failure.
async fn reserve_stock(
    conn: &mut SqliteConnection,
    reference: &ProductRef,
    quantity: i64,
) -> DbResult<Product> {
    let column = if reference.is_canonical() { "id" } else { "code" };

    let sql = format!(
        "UPDATE products SET stock = stock - ?1, updated_at = ?2 \
         WHERE {} = ?3 AND stock >= ?1 RETURNING {}",
        column, PRODUCT_COLUMNS
    );
    let reserved = sqlx::query_as::<_, Product>(&sql)
        .bind(quantity)
        .bind(Utc::now())
        .bind(reference.key())
        .fetch_optional(&mut *conn)
        .await?;

    if let Some(product) = reserved {
        return Ok(product);
    }

    let sql = format!("SELECT {} FROM products WHERE {} = ?1", PRODUCT_COLUMNS, column);
    let current = sqlx::query_as::<_, Product>(&sql)
        .bind(reference.key())
        .fetch_optional(&mut *conn)
        .await?;

    let err = match current {
        None => CoreError::ProductNotFound(reference.key().to_string()),
        Some(product) => CoreError::InsufficientStock {
            product: product.name,
            available: product.stock,
            requested: quantity,
        },
    };
    warn!(reference = %reference, error = %err, "Checkout aborted");
    Err(err.into())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::product::NewProduct;
    use crate::repository::user::NewUser;
    use crate::{Database, DbConfig};
    use tatylu_core::{CartLine, Money, TaxRate, ValidationError};

    async fn seed(db: &Database, code: &str, price_cents: i64, discount_pct: f64, stock: i64) -> Product {
        db.products()
            .insert(NewProduct {
                code: Some(code.to_string()),
                name: format!("Producto {code}"),
                price_cents,
                discount_pct,
                stock,
                category: "ropa".into(),
            })
            .await
            .unwrap()
    }

    fn line(reference: ProductRef, quantity: i64) -> CartItem {
        CartItem {
            reference,
            quantity,
            name: None,
            price: None,
        }
    }

    fn draft(items: Vec<CartItem>, buyer: BuyerSnapshot) -> CheckoutDraft {
        CheckoutDraft {
            items,
            buyer,
            options: PricingOptions {
                tax_rate: TaxRate::from_fraction(0.15),
                currency: "USD".into(),
                shipping_override: None,
                discount: Money::zero(),
            },
            policy: ShippingPolicy::default(),
            shipping: ShippingInfo::default(),
            payment: PaymentInfo::default(),
            invoice_number: None,
        }
    }

    fn guest() -> BuyerSnapshot {
        BuyerSnapshot {
            nombre: "Ana".into(),
            email: "ana@example.com".into(),
            ..Default::default()
        }
    }

    async fn stock_of(db: &Database, id: &str) -> i64 {
        db.products().get_by_id(id).await.unwrap().unwrap().stock
    }

    #[tokio::test]
    async fn test_commit_prices_from_catalog_and_reserves() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let a = seed(&db, "101", 1000, 10.0, 5).await;
        let b = seed(&db, "102", 500, 0.0, 5).await;

        let mut items = vec![
            line(ProductRef::Canonical(a.id.clone()), 2),
            line(ProductRef::Alternate("102".into()), 1),
        ];
        // Client prices are ignored by the commit.
        items[0].price = Some(Money::from_cents(1));

        let order = db.checkout().commit(draft(items, guest())).await.unwrap();

        assert_eq!(order.status, OrderStatus::Confirmado);
        assert_eq!(order.code, Some(30));
        assert_eq!(order.subtotal_cents, 2300);
        assert_eq!(order.shipping_cents, 450);
        assert_eq!(order.tax_cents, 345);
        assert_eq!(order.total_cents, 3095);
        assert_eq!(order.summary.shipping.cost_cents, 450);
        assert!(order.summary.totals.reconciles());

        assert_eq!(stock_of(&db, &a.id).await, 3);
        assert_eq!(stock_of(&db, &b.id).await, 4);

        let stored = db.orders().get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(stored.items, order.items);
    }

    #[tokio::test]
    async fn test_failing_line_rolls_back_everything() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let a = seed(&db, "101", 1000, 0.0, 5).await;
        let b = seed(&db, "102", 500, 0.0, 1).await;
        let user = db
            .users()
            .insert(NewUser {
                nombre: "Ana".into(),
                email: "ana@example.com".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        let cart = vec![CartLine {
            product_id: a.id.clone(),
            quantity: 2,
        }];
        db.users().set_cart(&user.id, &cart).await.unwrap();

        let items = vec![
            line(ProductRef::Canonical(a.id.clone()), 2),
            line(ProductRef::Canonical(b.id.clone()), 3),
        ];
        let err = db.checkout().commit(draft(items, user.snapshot())).await.unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::InsufficientStock { available: 1, requested: 3, .. })
        ));
        assert_eq!(stock_of(&db, &a.id).await, 5);
        assert_eq!(stock_of(&db, &b.id).await, 1);
        assert_eq!(db.orders().count().await.unwrap(), 0);
        assert!(db.users().history(&user.id).await.unwrap().is_empty());
        assert_eq!(db.users().get_by_id(&user.id).await.unwrap().unwrap().cart, cart);
    }

    #[tokio::test]
    async fn test_missing_product_is_not_found() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let items = vec![line(ProductRef::Alternate("999".into()), 1)];
        let err = db.checkout().commit(draft(items, guest())).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::ProductNotFound(ref code)) if code == "999"));
    }

    #[tokio::test]
    async fn test_empty_cart_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let err = db.checkout().commit(draft(Vec::new(), guest())).await.unwrap_err();
        assert!(matches!(err, DbError::Domain(CoreError::EmptyCart)));
    }

    #[tokio::test]
    async fn test_overflowing_catalog_price_rolls_back() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let a = seed(&db, "101", 1000, 0.0, 1_000_000).await;
        // Written around the repository, which caps prices on insert.
        sqlx::query("UPDATE products SET price_cents = ?1 WHERE id = ?2")
            .bind(i64::MAX / 1000)
            .bind(&a.id)
            .execute(db.pool())
            .await
            .unwrap();

        let items = vec![line(ProductRef::Canonical(a.id.clone()), 1_000_000)];
        let err = db.checkout().commit(draft(items, guest())).await.unwrap_err();

        assert!(matches!(
            err,
            DbError::Domain(CoreError::Validation(ValidationError::OutOfRange { .. }))
        ));
        assert_eq!(stock_of(&db, &a.id).await, 1_000_000);
        assert_eq!(db.orders().count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_registered_buyer_history_and_cart() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let a = seed(&db, "101", 1000, 0.0, 5).await;
        let user = db
            .users()
            .insert(NewUser {
                nombre: "Ana".into(),
                email: "ana@example.com".into(),
                ..Default::default()
            })
            .await
            .unwrap();
        db.users()
            .set_cart(
                &user.id,
                &[CartLine {
                    product_id: a.id.clone(),
                    quantity: 1,
                }],
            )
            .await
            .unwrap();

        let items = vec![line(ProductRef::Canonical(a.id.clone()), 1)];
        let order = db.checkout().commit(draft(items, user.snapshot())).await.unwrap();

        let history = db.users().history(&user.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].order_id, order.id);
        assert_eq!(history[0].order_code, order.code);
        assert!(db.users().get_by_id(&user.id).await.unwrap().unwrap().cart.is_empty());
        assert_eq!(db.orders().list_for_user(&user.id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_failed_checkout_burns_code() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let a = seed(&db, "101", 1000, 0.0, 1).await;

        let too_many = vec![line(ProductRef::Canonical(a.id.clone()), 2)];
        assert!(db.checkout().commit(draft(too_many, guest())).await.is_err());

        let ok = vec![line(ProductRef::Canonical(a.id.clone()), 1)];
        let order = db.checkout().commit(draft(ok, guest())).await.unwrap();
        assert_eq!(order.code, Some(31));
    }

    fn temp_db_path() -> std::path::PathBuf {
        std::env::temp_dir().join(format!("tatylu-checkout-{}.db", uuid::Uuid::new_v4()))
    }

    fn remove_db_files(path: &std::path::Path) {
        for suffix in ["", "-wal", "-shm"] {
            let _ = std::fs::remove_file(format!("{}{}", path.display(), suffix));
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_for_last_unit() {
        let path = temp_db_path();
        let db = Database::new(DbConfig::new(&path).max_connections(8)).await.unwrap();
        let p = seed(&db, "101", 1000, 0.0, 1).await;

        let mut handles = Vec::new();
        for _ in 0..2 {
            let checkout = db.checkout();
            let items = vec![line(ProductRef::Canonical(p.id.clone()), 1)];
            let draft = draft(items, guest());
            handles.push(tokio::spawn(async move { checkout.commit(draft).await }));
        }

        let mut committed = 0;
        let mut rejected = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => committed += 1,
                Err(DbError::Domain(CoreError::InsufficientStock { .. })) => rejected += 1,
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        assert_eq!((committed, rejected), (1, 1));
        assert_eq!(stock_of(&db, &p.id).await, 0);
        assert_eq!(db.orders().count().await.unwrap(), 1);

        db.close().await;
        remove_db_files(&path);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_checkouts_never_oversell() {
        let path = temp_db_path();
        let db = Database::new(DbConfig::new(&path).max_connections(8)).await.unwrap();
        let p = seed(&db, "101", 1000, 0.0, 5).await;

        let mut handles = Vec::new();
        for _ in 0..12 {
            let checkout = db.checkout();
            let items = vec![line(ProductRef::Alternate("101".into()), 1)];
            let draft = draft(items, guest());
            handles.push(tokio::spawn(async move { checkout.commit(draft).await }));
        }

        let mut reserved = 0;
        for handle in handles {
            if let Ok(order) = handle.await.unwrap() {
                reserved += order.units();
            }
        }

        assert_eq!(reserved, 5);
        assert_eq!(stock_of(&db, &p.id).await, 0);

        let codes: std::collections::HashSet<_> = db
            .orders()
            .list_all()
            .await
            .unwrap()
            .into_iter()
            .filter_map(|o| o.code)
            .collect();
        assert_eq!(codes.len(), 5);
        assert!(codes.iter().all(|c| *c >= 30));

        db.close().await;
        remove_db_files(&path);
    }
}
