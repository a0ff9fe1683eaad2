//! # Order Repository
//!
//! Persistence for committed orders and the sequential order counter.
//!
//! ## Storage Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Order Storage                                   │
//! │                                                                         │
//! │  orders                               order_items                       │
//! │  ┌──────────────────────────────┐     ┌──────────────────────────────┐  │
//! │  │ id, code, user_id, status    │ 1:N │ order_id, position           │  │
//! │  │ summary (JSON OrderSummary)  │────►│ product_id, name_snapshot    │  │
//! │  │ subtotal/tax/shipping/       │     │ quantity, unit_price_cents   │  │
//! │  │ discount/total _cents        │     │ line_total_cents, currency   │  │
//! │  └──────────────────────────────┘     └──────────────────────────────┘  │
//! │                                                                         │
//! │  sequences('order-id') ── next_order_code() ── 30, 31, 32, ...          │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The flat `*_cents` columns mirror `summary.totals` so listings can sort by
//! total without decoding JSON.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use crate::repository::product::placeholders;
use tatylu_core::{Order, OrderItem, OrderStatus, OrderSummary, MAX_TOP_ORDERS, MIN_ORDER_CODE, ORDER_SEQUENCE};

const ORDER_COLUMNS: &str = "id, code, user_id, status, summary, subtotal_cents, tax_cents, \
     shipping_cents, discount_cents, total_cents, created_at";

const ITEM_COLUMNS: &str = "order_id, product_id, name_snapshot, category_snapshot, quantity, \
     unit_price_cents, discount_pct, line_total_cents, currency";

/// Order ids per item query (below SQLite's bind parameter limit).
const ITEM_BATCH: usize = 500;

// =============================================================================
// Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    code: Option<i64>,
    user_id: Option<String>,
    status: OrderStatus,
    summary: String,
    subtotal_cents: i64,
    tax_cents: i64,
    shipping_cents: i64,
    discount_cents: i64,
    total_cents: i64,
    created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRow {
    order_id: String,
    product_id: String,
    name_snapshot: String,
    category_snapshot: String,
    quantity: i64,
    unit_price_cents: i64,
    discount_pct: f64,
    line_total_cents: i64,
    currency: String,
}

impl From<ItemRow> for OrderItem {
    fn from(row: ItemRow) -> Self {
        OrderItem {
            product_id: row.product_id,
            name: row.name_snapshot,
            category: row.category_snapshot,
            quantity: row.quantity,
            unit_price_cents: row.unit_price_cents,
            discount_pct: row.discount_pct,
            line_total_cents: row.line_total_cents,
            currency: row.currency,
        }
    }
}

impl OrderRow {
    fn into_order(self, items: Vec<OrderItem>) -> DbResult<Order> {
        let summary: OrderSummary = serde_json::from_str(&self.summary)?;
        Ok(Order {
            id: self.id,
            code: self.code,
            user_id: self.user_id,
            status: self.status,
            items,
            summary,
            subtotal_cents: self.subtotal_cents,
            tax_cents: self.tax_cents,
            shipping_cents: self.shipping_cents,
            discount_cents: self.discount_cents,
            total_cents: self.total_cents,
            created_at: self.created_at,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Atomically increments the order counter and returns the new value.
    ///
    /// ## Floor
    /// A post-increment value below `MIN_ORDER_CODE` (30) becomes exactly 30;
    /// from there the counter steps by one. A fresh counter therefore
    /// starts at 30.
    ///
    /// ```text
    /// (absent) → 30      5 → 30      29 → 30      30 → 31
    /// ```
    ///
    /// Runs as a single autocommit statement, outside any checkout
    /// transaction. A value handed to a checkout that later fails is
    /// skipped, never reused.
    pub async fn next_order_code(&self) -> DbResult<i64> {
        let code: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO sequences (name, value) VALUES (?1, ?2)
            ON CONFLICT (name) DO UPDATE SET value = MAX(value + 1, ?2)
            RETURNING value
            "#,
        )
        .bind(ORDER_SEQUENCE)
        .bind(MIN_ORDER_CODE)
        .fetch_one(&self.pool)
        .await?;

        debug!(code = code, "Order code assigned");
        Ok(code)
    }

    /// Assigns a code to `order` if it has none. Existing codes are kept.
    pub async fn ensure_code(&self, order: &mut Order) -> DbResult<i64> {
        match order.code {
            Some(code) => Ok(code),
            None => {
                let code = self.next_order_code().await?;
                order.code = Some(code);
                Ok(code)
            }
        }
    }

    /// Saves an order (insert or update) with its lines.
    ///
    /// An order without a code gets one first. On update the stored code
    /// is never changed.
    pub async fn save(&self, order: &mut Order) -> DbResult<()> {
        self.ensure_code(order).await?;

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        Self::write_order(&mut *tx, order).await?;

        tx.commit()
            .await
            .map_err(|e| DbError::TransactionFailed(e.to_string()))?;

        debug!(id = %order.id, code = ?order.code, "Order saved");
        Ok(())
    }

    /// Writes an order row and its lines on an open connection.
    ///
    /// Used by the checkout transaction; the caller owns commit/rollback.
    pub(crate) async fn write_order(conn: &mut SqliteConnection, order: &Order) -> DbResult<()> {
        let summary = serde_json::to_string(&order.summary)?;
        let now = Utc::now();

        sqlx::query(
            r#"
            INSERT INTO orders (
                id, code, user_id, status, summary,
                subtotal_cents, tax_cents, shipping_cents, discount_cents, total_cents,
                created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            ON CONFLICT (id) DO UPDATE SET
                code = COALESCE(orders.code, excluded.code),
                status = excluded.status,
                summary = excluded.summary,
                subtotal_cents = excluded.subtotal_cents,
                tax_cents = excluded.tax_cents,
                shipping_cents = excluded.shipping_cents,
                discount_cents = excluded.discount_cents,
                total_cents = excluded.total_cents,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&order.id)
        .bind(order.code)
        .bind(&order.user_id)
        .bind(order.status)
        .bind(summary)
        .bind(order.subtotal_cents)
        .bind(order.tax_cents)
        .bind(order.shipping_cents)
        .bind(order.discount_cents)
        .bind(order.total_cents)
        .bind(order.created_at)
        .bind(now)
        .execute(&mut *conn)
        .await?;

        sqlx::query("DELETE FROM order_items WHERE order_id = ?1")
            .bind(&order.id)
            .execute(&mut *conn)
            .await?;

        for (position, item) in order.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO order_items (
                    order_id, position, product_id, name_snapshot, category_snapshot,
                    quantity, unit_price_cents, discount_pct, line_total_cents, currency
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
                "#,
            )
            .bind(&order.id)
            .bind(position as i64)
            .bind(&item.product_id)
            .bind(&item.name)
            .bind(&item.category)
            .bind(item.quantity)
            .bind(item.unit_price_cents)
            .bind(item.discount_pct)
            .bind(item.line_total_cents)
            .bind(&item.currency)
            .execute(&mut *conn)
            .await?;
        }

        Ok(())
    }

    /// Gets an order by its identity.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Order>> {
        let sql = format!("SELECT {} FROM orders WHERE id = ?1", ORDER_COLUMNS);
        let row = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match row {
            Some(row) => Ok(self.hydrate(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    /// Most recent orders first.
    pub async fn list_recent(&self, limit: i64) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {} FROM orders ORDER BY created_at DESC, rowid DESC LIMIT ?1",
            ORDER_COLUMNS
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(limit.max(1))
            .fetch_all(&self.pool)
            .await?;

        self.hydrate(rows).await
    }

    /// Orders placed by a user, most recent first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        let sql = format!(
            "SELECT {} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC, rowid DESC",
            ORDER_COLUMNS
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        self.hydrate(rows).await
    }

    /// Every order, oldest first. Used by the report full scan.
    pub async fn list_all(&self) -> DbResult<Vec<Order>> {
        let sql = format!("SELECT {} FROM orders ORDER BY created_at, rowid", ORDER_COLUMNS);
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .fetch_all(&self.pool)
            .await?;

        self.hydrate(rows).await
    }

    /// Largest orders by total. `limit` is clamped to `1..=MAX_TOP_ORDERS`.
    pub async fn top_by_total(&self, limit: i64) -> DbResult<Vec<Order>> {
        let limit = limit.clamp(1, MAX_TOP_ORDERS);
        let sql = format!(
            "SELECT {} FROM orders ORDER BY total_cents DESC, created_at DESC LIMIT ?1",
            ORDER_COLUMNS
        );
        let rows = sqlx::query_as::<_, OrderRow>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;

        self.hydrate(rows).await
    }

    /// Changes an order's status. The code is never touched.
    ///
    /// ## Returns
    /// * `Ok(Order)` - The updated order
    /// * `Err(DbError::NotFound)` - No such order
    pub async fn update_status(&self, id: &str, status: OrderStatus) -> DbResult<Order> {
        let result = sqlx::query("UPDATE orders SET status = ?2, updated_at = ?3 WHERE id = ?1")
            .bind(id)
            .bind(status)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Order", id));
        }

        info!(id = %id, status = %status, "Order status updated");
        self.get_by_id(id)
            .await?
            .ok_or_else(|| DbError::not_found("Order", id))
    }

    /// Counts total orders.
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM orders")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }

    /// Loads the lines for `rows` and assembles orders in row order.
    async fn hydrate(&self, rows: Vec<OrderRow>) -> DbResult<Vec<Order>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }

        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        let mut items: HashMap<String, Vec<OrderItem>> = HashMap::new();

        for chunk in ids.chunks(ITEM_BATCH) {
            let sql = format!(
                "SELECT {} FROM order_items WHERE order_id IN ({}) ORDER BY order_id, position",
                ITEM_COLUMNS,
                placeholders(chunk.len())
            );
            let mut query = sqlx::query_as::<_, ItemRow>(&sql);
            for id in chunk {
                query = query.bind(*id);
            }
            for row in query.fetch_all(&self.pool).await? {
                items.entry(row.order_id.clone()).or_default().push(row.into());
            }
        }

        debug!(orders = rows.len(), "Hydrated orders");

        rows.into_iter()
            .map(|row| {
                let lines = items.remove(&row.id).unwrap_or_default();
                row.into_order(lines)
            })
            .collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use chrono::Duration;
    use tatylu_core::ids::new_object_id;
    use tatylu_core::{BuyerSnapshot, OrderTotals, PaymentInfo, ShippingInfo, TaxRate};

    fn sample_order(total_cents: i64, created_at: DateTime<Utc>) -> Order {
        let item = OrderItem {
            product_id: new_object_id(),
            name: "Camiseta".into(),
            category: "ropa".into(),
            quantity: 2,
            unit_price_cents: total_cents / 2,
            discount_pct: 0.0,
            line_total_cents: total_cents,
            currency: "USD".into(),
        };
        let summary = OrderSummary {
            customer: BuyerSnapshot {
                nombre: "Ana".into(),
                email: "ana@example.com".into(),
                ..Default::default()
            },
            items: vec![item],
            totals: OrderTotals {
                subtotal_cents: total_cents,
                tax_rate: TaxRate::zero(),
                tax_cents: 0,
                shipping_cents: 0,
                discount_cents: 0,
                total_cents,
                currency: "USD".into(),
            },
            shipping: ShippingInfo::default(),
            payment: PaymentInfo::default(),
            invoice_number: None,
        };
        Order::new(new_object_id(), None, OrderStatus::Confirmado, summary, created_at)
    }

    async fn setup() -> OrderRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().orders()
    }

    #[tokio::test]
    async fn test_counter_starts_at_floor_and_steps() {
        let repo = setup().await;
        assert_eq!(repo.next_order_code().await.unwrap(), 30);
        assert_eq!(repo.next_order_code().await.unwrap(), 31);
        assert_eq!(repo.next_order_code().await.unwrap(), 32);
    }

    #[tokio::test]
    async fn test_counter_below_floor_is_corrected() {
        let repo = setup().await;
        sqlx::query("INSERT INTO sequences (name, value) VALUES (?1, 4)")
            .bind(ORDER_SEQUENCE)
            .execute(&repo.pool)
            .await
            .unwrap();

        assert_eq!(repo.next_order_code().await.unwrap(), 30);
        assert_eq!(repo.next_order_code().await.unwrap(), 31);
    }

    #[tokio::test]
    async fn test_save_and_get_round_trip() {
        let repo = setup().await;
        let mut order = sample_order(2000, Utc::now());
        repo.save(&mut order).await.unwrap();

        assert_eq!(order.code, Some(30));
        let loaded = repo.get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(loaded.items, order.items);
        assert_eq!(loaded.summary, order.summary);
        assert_eq!(loaded.total_cents, 2000);
        assert_eq!(loaded.code, Some(30));
    }

    #[tokio::test]
    async fn test_resave_keeps_code() {
        let repo = setup().await;
        let mut order = sample_order(2000, Utc::now());
        repo.save(&mut order).await.unwrap();

        order.summary.invoice_number = Some("INV-1-001".into());
        repo.save(&mut order).await.unwrap();

        let loaded = repo.get_by_id(&order.id).await.unwrap().unwrap();
        assert_eq!(loaded.code, Some(30));
        assert_eq!(loaded.summary.invoice_number.as_deref(), Some("INV-1-001"));
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(repo.next_order_code().await.unwrap(), 31);
    }

    #[tokio::test]
    async fn test_listings_ordering() {
        let repo = setup().await;
        let now = Utc::now();
        let mut old = sample_order(5000, now - Duration::days(2));
        let mut mid = sample_order(1000, now - Duration::days(1));
        let mut new = sample_order(3000, now);
        for order in [&mut old, &mut mid, &mut new] {
            repo.save(order).await.unwrap();
        }

        let recent: Vec<_> = repo.list_recent(200).await.unwrap().into_iter().map(|o| o.id).collect();
        assert_eq!(recent, vec![new.id.clone(), mid.id.clone(), old.id.clone()]);

        let top: Vec<_> = repo.top_by_total(2).await.unwrap().into_iter().map(|o| o.id).collect();
        assert_eq!(top, vec![old.id.clone(), new.id.clone()]);

        assert_eq!(repo.top_by_total(0).await.unwrap().len(), 1);
        assert_eq!(repo.top_by_total(1000).await.unwrap().len(), 3);
        assert_eq!(repo.list_all().await.unwrap()[0].id, old.id);
        assert_eq!(repo.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_update_status() {
        let repo = setup().await;
        let mut order = sample_order(1000, Utc::now());
        repo.save(&mut order).await.unwrap();

        let updated = repo.update_status(&order.id, OrderStatus::Enviado).await.unwrap();
        assert_eq!(updated.status, OrderStatus::Enviado);
        assert_eq!(updated.code, order.code);

        let err = repo.update_status("missing", OrderStatus::Enviado).await.unwrap_err();
        assert!(matches!(err, DbError::NotFound { .. }));
    }
}
