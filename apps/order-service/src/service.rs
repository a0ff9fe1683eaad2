//! # Order Service
//!
//! The operations exposed by the order pipeline.
//!
//! ## Operations
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         OrderService                                    │
//! │                                                                         │
//! │  calculate(body)         normalize → resolve → price_cart   (read only) │
//! │                                                                         │
//! │  create_order(body)      normalize → buyer → checkout commit            │
//! │                                                                         │
//! │  generate_invoice(body)  create_order (+ invoice number)                │
//! │                            → build_invoice → notifier.notify (async)    │
//! │                                                                         │
//! │  generate_report(save)   orders ∥ products → build_report               │
//! │                            → save snapshot (unless save = false)        │
//! │                                                                         │
//! │  queries                 recent_orders, orders_for_user, get_order,     │
//! │                          top_orders, update_status, user_history        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Request bodies are JSON values in the storefront's shape; normalization
//! maps field aliases once, here at the boundary.

use chrono::{DateTime, Local, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::config::OrderConfig;
use crate::error::{ApiError, ApiResult};
use crate::notify::NotifierHandle;
use tatylu_core::invoice::{build_invoice, invoice_notice, Invoice, InvoiceNumber};
use tatylu_core::normalize::{BuyerInput, CalculateRequest, CheckoutRequest, RequestDefaults};
use tatylu_core::pricing::{price_cart, PriceBreakdown};
use tatylu_core::report::{build_report, ReportSnapshot};
use tatylu_core::validation::clamp_limit;
use tatylu_core::{
    BuyerSnapshot, CartItem, CoreError, Order, OrderHistoryEntry, OrderStatus, ProductRef,
    MAX_TOP_ORDERS, RECENT_ORDERS_LIMIT,
};
use tatylu_db::{CheckoutDraft, Database};

/// Top orders returned when no limit is given.
const DEFAULT_TOP_ORDERS: i64 = 10;

/// A committed order and its invoice.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceResult {
    pub order: Order,
    pub invoice: Invoice,
    /// Whether an email notification was queued.
    pub notification_queued: bool,
}

/// Order pipeline operations over a database and a notifier.
#[derive(Clone)]
pub struct OrderService {
    db: Database,
    config: OrderConfig,
    defaults: RequestDefaults,
    notifier: NotifierHandle,
}

impl OrderService {
    pub fn new(db: Database, config: OrderConfig, notifier: NotifierHandle) -> Self {
        let defaults = config.request_defaults();
        OrderService {
            db,
            config,
            defaults,
            notifier,
        }
    }

    pub fn config(&self) -> &OrderConfig {
        &self.config
    }

    // =========================================================================
    // Pricing
    // =========================================================================

    /// Prices a cart without persisting anything.
    ///
    /// Unresolved products are priced from the client-supplied name and
    /// price with no discount.
    pub async fn calculate(&self, body: &Value) -> ApiResult<PriceBreakdown> {
        let request = CalculateRequest::from_json(body, &self.defaults)
            .map_err(|e| self.client_failure("calculate", e.into()))?;

        let lookup = self
            .db
            .products()
            .resolve(&references(&request.items))
            .await
            .map_err(|e| self.failure("calculate", e.into()))?;

        let breakdown = price_cart(&request.items, &lookup, &request.options, &self.config.shipping)
            .map_err(|e| self.failure("calculate", e.into()))?;
        debug!(
            lines = breakdown.lines.len(),
            resolved = lookup.len(),
            total_cents = breakdown.total_cents,
            "Cart priced"
        );
        Ok(breakdown)
    }

    // =========================================================================
    // Checkout
    // =========================================================================

    /// Commits an order: reserves stock, stores the order, and updates the
    /// buyer's history when the buyer is a registered user.
    pub async fn create_order(&self, body: &Value) -> ApiResult<Order> {
        self.checkout("create_order", body, None).await
    }

    /// Commits an order and issues its invoice.
    ///
    /// The invoice email is queued after the commit and never awaited; a
    /// buyer without an email gets no notification.
    pub async fn generate_invoice(&self, body: &Value) -> ApiResult<InvoiceResult> {
        let number = InvoiceNumber::generate(Utc::now());
        let order = self
            .checkout("generate_invoice", body, Some(number.to_string()))
            .await?;

        let invoice = build_invoice(&order, number, Utc::now())
            .map_err(|e| self.failure("generate_invoice", e.into()))?;
        info!(
            order = %order.id,
            invoice = %invoice.invoice_number,
            total_cents = invoice.totals.total_cents,
            "Invoice generated"
        );

        let notification_queued = match invoice_notice(&invoice, &self.config.app_base_url) {
            Some(notice) => self.notifier.notify(notice),
            None => {
                debug!(order = %order.id, "Buyer has no email, skipping notification");
                false
            }
        };

        Ok(InvoiceResult {
            order,
            invoice,
            notification_queued,
        })
    }

    async fn checkout(
        &self,
        operation: &str,
        body: &Value,
        invoice_number: Option<String>,
    ) -> ApiResult<Order> {
        let request = CheckoutRequest::from_json(body, &self.defaults)
            .map_err(|e| self.client_failure(operation, e.into()))?;

        let buyer = self.resolve_buyer(&request.buyer).await.map_err(|e| self.failure(operation, e))?;

        let draft = CheckoutDraft {
            items: request.items,
            buyer,
            options: request.options,
            policy: self.config.shipping,
            shipping: request.shipping,
            payment: request.payment,
            invoice_number,
        };

        self.db
            .checkout()
            .commit(draft)
            .await
            .map_err(|e| self.failure(operation, e.into()))
    }

    async fn resolve_buyer(&self, buyer: &BuyerInput) -> ApiResult<BuyerSnapshot> {
        match buyer {
            BuyerInput::Guest(snapshot) => Ok(snapshot.clone()),
            BuyerInput::Registered(user_id) => {
                let user = self.db.users().get_by_id(user_id).await?;
                user.map(|u| u.snapshot())
                    .ok_or_else(|| CoreError::UserNotFound(user_id.clone()).into())
            }
        }
    }

    // =========================================================================
    // Reports
    // =========================================================================

    /// Computes a sales snapshot over all orders in the server's local time
    /// zone and saves it unless `save` is false.
    pub async fn generate_report(&self, save: bool) -> ApiResult<ReportSnapshot> {
        self.generate_report_at(Local::now(), save).await
    }

    /// Same as [`generate_report`](Self::generate_report) with an explicit
    /// clock and time zone.
    pub async fn generate_report_at<Tz: TimeZone>(
        &self,
        now: DateTime<Tz>,
        save: bool,
    ) -> ApiResult<ReportSnapshot> {
        let orders_repo = self.db.orders();
        let products_repo = self.db.products();
        let (orders, products) = tokio::join!(orders_repo.list_all(), products_repo.list_all());
        let orders = orders.map_err(|e| self.failure("generate_report", e.into()))?;
        let products = products.map_err(|e| self.failure("generate_report", e.into()))?;

        let snapshot = build_report(now, &orders, &products);
        info!(
            orders = snapshot.total_orders,
            total_sales_cents = snapshot.total_sales_cents,
            save = save,
            "Report generated"
        );

        if save {
            self.db
                .reports()
                .save_snapshot(&snapshot)
                .await
                .map_err(|e| self.failure("generate_report", e.into()))?;
        }

        Ok(snapshot)
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// Most recent orders first (at most 200).
    pub async fn recent_orders(&self, limit: Option<i64>) -> ApiResult<Vec<Order>> {
        let limit = clamp_limit(limit, RECENT_ORDERS_LIMIT, RECENT_ORDERS_LIMIT);
        Ok(self.db.orders().list_recent(limit).await?)
    }

    /// Orders placed by one user, most recent first.
    pub async fn orders_for_user(&self, user_id: &str) -> ApiResult<Vec<Order>> {
        Ok(self.db.orders().list_for_user(user_id).await?)
    }

    pub async fn get_order(&self, id: &str) -> ApiResult<Order> {
        self.db
            .orders()
            .get_by_id(id)
            .await?
            .ok_or_else(|| CoreError::OrderNotFound(id.to_string()).into())
    }

    /// Largest orders by total; `limit` is clamped to `1..=100`.
    pub async fn top_orders(&self, limit: Option<i64>) -> ApiResult<Vec<Order>> {
        let limit = clamp_limit(limit, DEFAULT_TOP_ORDERS, MAX_TOP_ORDERS);
        Ok(self.db.orders().top_by_total(limit).await?)
    }

    /// Administrative status change. The order code is never reassigned.
    pub async fn update_status(&self, id: &str, status: &str) -> ApiResult<Order> {
        let status: OrderStatus = status.parse()?;
        self.db
            .orders()
            .update_status(id, status)
            .await
            .map_err(|e| self.failure("update_status", e.into()))
    }

    pub async fn user_history(&self, user_id: &str) -> ApiResult<Vec<OrderHistoryEntry>> {
        if self.db.users().get_by_id(user_id).await?.is_none() {
            return Err(CoreError::UserNotFound(user_id.to_string()).into());
        }
        Ok(self.db.users().history(user_id).await?)
    }

    // =========================================================================
    // Failure logging
    // =========================================================================

    fn client_failure(&self, operation: &str, err: ApiError) -> ApiError {
        warn!(operation = operation, code = ?err.code, message = %err.message, "Request rejected");
        err
    }

    fn failure(&self, operation: &str, err: ApiError) -> ApiError {
        if err.is_client_error() {
            return self.client_failure(operation, err);
        }
        error!(operation = operation, code = ?err.code, "Operation failed");
        err
    }
}

fn references(items: &[CartItem]) -> Vec<ProductRef> {
    items.iter().map(|i| i.reference.clone()).collect()
}

// =============================================================================
// Unit Tests
// =============================================================================
