//! # Domain Types
//!
//! Core domain types used throughout the Tatylu order pipeline.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐        │
//! │  │    Product      │   │      Order      │   │      User       │        │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │        │
//! │  │  id (24-hex)    │   │  id (24-hex)    │   │  id (24-hex)    │        │
//! │  │  code (alt.)    │   │  code (≥ 30)    │   │  cart           │        │
//! │  │  price_cents    │   │  items          │   │  history ───────┼──┐     │
//! │  │  discount_pct   │   │  summary        │   └─────────────────┘  │     │
//! │  │  stock (≥ 0)    │   │  status         │                        │     │
//! │  └─────────────────┘   └─────────────────┘   OrderHistoryEntry ◄──┘     │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐        │
//! │  │    TaxRate      │   │  DiscountRate   │   │  OrderStatus    │        │
//! │  │  bps (u32)      │   │  bps (0..=10000)│   │  pendiente      │        │
//! │  │  1500 = 15%     │   │  1000 = 10%     │   │  confirmado ... │        │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! `OrderItem` and `OrderSummary` freeze product and buyer data at commit
//! time. Later catalog edits never change a committed order.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;

use crate::error::ValidationError;
use crate::ids::ProductRef;
use crate::money::Money;

// =============================================================================
// Tax Rate
// =============================================================================

/// Tax rate represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01% = 1/10000
/// 1500 bps = 15% (the default VAT rate)
///
/// Requests carry the rate as a fraction (`0.15`); it is converted once with
/// [`TaxRate::from_fraction`] and echoed back with [`TaxRate::as_fraction`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct TaxRate(u32);

impl TaxRate {
    /// Creates a tax rate from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        TaxRate(bps)
    }

    /// Creates a tax rate from a fraction (`0.15` → 1500 bps).
    ///
    /// Negative and non-finite inputs collapse to zero.
    pub fn from_fraction(fraction: f64) -> Self {
        if !fraction.is_finite() || fraction <= 0.0 {
            return TaxRate::zero();
        }
        TaxRate((fraction * 10_000.0).round() as u32)
    }

    /// Creates a tax rate from a percentage (for convenience).
    pub fn from_percentage(pct: f64) -> Self {
        TaxRate::from_fraction(pct / 100.0)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a fraction (`1500` → `0.15`).
    #[inline]
    pub fn as_fraction(&self) -> f64 {
        self.0 as f64 / 10_000.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero tax rate.
    #[inline]
    pub const fn zero() -> Self {
        TaxRate(0)
    }
}

impl Default for TaxRate {
    fn default() -> Self {
        TaxRate::from_bps(crate::DEFAULT_TAX_RATE_BPS)
    }
}

// =============================================================================
// Discount Rate
// =============================================================================

/// Per-product percentage discount, in basis points, clamped to 0..=100%.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct DiscountRate(u32);

impl DiscountRate {
    /// Creates a discount from a percentage (`12.5` → 1250 bps).
    ///
    /// Values outside 0..=100 are clamped; non-finite values are zero.
    pub fn from_percentage(pct: f64) -> Self {
        if !pct.is_finite() {
            return DiscountRate::zero();
        }
        DiscountRate((pct.clamp(0.0, 100.0) * 100.0).round() as u32)
    }

    #[inline]
    pub const fn zero() -> Self {
        DiscountRate(0)
    }

    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog entry.
///
/// `stock` is never negative; the checkout transaction only decrements it
/// through a guarded update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Product {
    /// Canonical identity (24 hex characters).
    pub id: String,

    /// Alternate external code (legacy numeric id or a string code).
    pub code: Option<String>,

    /// Display name shown in the storefront and on invoices.
    pub name: String,

    /// List price in cents, before the product discount.
    pub price_cents: i64,

    /// Discount percentage (0-100).
    pub discount_pct: f64,

    /// Units on hand.
    pub stock: i64,

    /// Category used by the sales report.
    pub category: String,

    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,

    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Returns the list price as a Money type.
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_cents(self.price_cents)
    }

    /// Returns the product discount.
    #[inline]
    pub fn discount(&self) -> DiscountRate {
        DiscountRate::from_percentage(self.discount_pct)
    }

    /// Price a customer pays for one unit.
    pub fn price_after_discount(&self) -> Money {
        self.price().apply_discount(self.discount())
    }

    /// Checks whether `quantity` units can be reserved.
    #[inline]
    pub fn has_stock(&self, quantity: i64) -> bool {
        self.stock >= quantity
    }
}

// =============================================================================
// Order Status
// =============================================================================

/// Lifecycle status of an order. Values are the storefront's Spanish names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    /// Created but not yet confirmed.
    #[default]
    Pendiente,
    /// Committed by checkout (stock reserved).
    Confirmado,
    Enviado,
    Entregado,
    Cancelado,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 5] = [
        OrderStatus::Pendiente,
        OrderStatus::Confirmado,
        OrderStatus::Enviado,
        OrderStatus::Entregado,
        OrderStatus::Cancelado,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Pendiente => "pendiente",
            OrderStatus::Confirmado => "confirmado",
            OrderStatus::Enviado => "enviado",
            OrderStatus::Entregado => "entregado",
            OrderStatus::Cancelado => "cancelado",
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        OrderStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == wanted)
            .ok_or_else(|| ValidationError::NotAllowed {
                field: "status".to_string(),
                allowed: OrderStatus::ALL.iter().map(|s| s.as_str().to_string()).collect(),
            })
    }
}

// =============================================================================
// Cart Item (input)
// =============================================================================

/// A normalized checkout line. Quantity is already a positive integer.
#[derive(Debug, Clone, PartialEq)]
pub struct CartItem {
    pub reference: ProductRef,
    pub quantity: i64,
    /// Client-supplied name, used only when the product does not resolve.
    pub name: Option<String>,
    /// Client-supplied unit price, used only when the product does not resolve.
    pub price: Option<Money>,
}

// =============================================================================
// Order Item
// =============================================================================

/// A persisted order line.
///
/// ## Invariant
/// `line_total_cents == unit_price_cents * quantity`, where `unit_price_cents`
/// is the price after the product discount, captured at commit time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderItem {
    /// Resolved canonical product id (or the reference as given for
    /// unresolved preview lines).
    pub product_id: String,
    /// Product name at time of order (frozen).
    pub name: String,
    /// Category at time of order (frozen).
    pub category: String,
    pub quantity: i64,
    /// Unit price after discount, in cents (frozen).
    pub unit_price_cents: i64,
    pub discount_pct: f64,
    pub line_total_cents: i64,
    pub currency: String,
}

impl OrderItem {
    #[inline]
    pub fn unit_price(&self) -> Money {
        Money::from_cents(self.unit_price_cents)
    }

    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_cents(self.line_total_cents)
    }
}

// =============================================================================
// Order Summary (denormalized snapshot)
// =============================================================================

/// Buyer details captured on the order and the invoice.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct BuyerSnapshot {
    /// Registered user id, absent for guest checkouts.
    pub user_id: Option<String>,
    pub nombre: String,
    pub apellido: String,
    pub email: String,
    pub telefono: String,
    pub cedula: String,
}

impl BuyerSnapshot {
    /// Name used to greet the buyer; falls back to the email.
    pub fn greeting_name(&self) -> &str {
        if self.nombre.trim().is_empty() {
            &self.email
        } else {
            &self.nombre
        }
    }

    pub fn has_email(&self) -> bool {
        !self.email.trim().is_empty()
    }
}

/// Delivery details recorded with the order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShippingInfo {
    pub address: String,
    pub references: String,
    pub contact: String,
    pub instructions: String,
    pub estimated_date: Option<String>,
    pub location: Option<String>,
    /// Shipping fee charged, in cents.
    pub cost_cents: i64,
}

/// Payment details. Recorded, never processed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PaymentInfo {
    pub method: String,
    pub method_name: String,
    pub reference: String,
    pub status: String,
}

impl Default for PaymentInfo {
    fn default() -> Self {
        Self {
            method: "no-especificado".to_string(),
            method_name: "no-especificado".to_string(),
            reference: String::new(),
            status: "pagado".to_string(),
        }
    }
}

/// Totals breakdown for an order.
///
/// ## Invariant
/// `total_cents == max(0, subtotal + tax + shipping - discount)`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderTotals {
    pub subtotal_cents: i64,
    pub tax_rate: TaxRate,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    pub currency: String,
}

impl OrderTotals {
    /// Checks the total against its parts.
    pub fn reconciles(&self) -> bool {
        let expected =
            (self.subtotal_cents + self.tax_cents + self.shipping_cents - self.discount_cents).max(0);
        self.total_cents == expected
    }

    #[inline]
    pub fn total(&self) -> Money {
        Money::from_cents(self.total_cents)
    }
}

/// The denormalized order snapshot, also appended to the buyer's history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderSummary {
    pub customer: BuyerSnapshot,
    pub items: Vec<OrderItem>,
    pub totals: OrderTotals,
    pub shipping: ShippingInfo,
    pub payment: PaymentInfo,
    pub invoice_number: Option<String>,
}

// =============================================================================
// Order
// =============================================================================

/// A committed order.
///
/// The flat `*_cents` fields duplicate `summary.totals` for cheap sorting and
/// listing queries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    /// Sequential human-readable number (never below 30). Assigned once.
    pub code: Option<i64>,
    pub user_id: Option<String>,
    pub status: OrderStatus,
    pub items: Vec<OrderItem>,
    pub summary: OrderSummary,
    pub subtotal_cents: i64,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Order {
    /// Builds an order from a summary, copying totals into the flat fields.
    pub fn new(
        id: String,
        user_id: Option<String>,
        status: OrderStatus,
        summary: OrderSummary,
        created_at: DateTime<Utc>,
    ) -> Self {
        let totals = &summary.totals;
        Self {
            id,
            code: None,
            user_id,
            status,
            items: summary.items.clone(),
            subtotal_cents: totals.subtotal_cents,
            tax_cents: totals.tax_cents,
            shipping_cents: totals.shipping_cents,
            discount_cents: totals.discount_cents,
            total_cents: totals.total_cents,
            summary,
            created_at,
        }
    }

    /// Order total, preferring the summary over the flat field.
    pub fn total(&self) -> Money {
        if self.summary.totals.total_cents != 0 {
            self.summary.totals.total()
        } else {
            Money::from_cents(self.total_cents)
        }
    }

    /// Total units across all lines.
    pub fn units(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

// =============================================================================
// User
// =============================================================================

/// A line in a user's saved cart.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartLine {
    pub product_id: String,
    pub quantity: i64,
}

/// A storefront user. History is loaded separately.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct User {
    pub id: String,
    pub nombre: String,
    pub apellido: String,
    pub email: String,
    pub telefono: String,
    pub cedula: String,
    pub cart: Vec<CartLine>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Snapshot of the buyer fields for an order.
    pub fn snapshot(&self) -> BuyerSnapshot {
        BuyerSnapshot {
            user_id: Some(self.id.clone()),
            nombre: self.nombre.clone(),
            apellido: self.apellido.clone(),
            email: self.email.clone(),
            telefono: self.telefono.clone(),
            cedula: self.cedula.clone(),
        }
    }
}

/// An entry appended to the buyer's order history by the checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderHistoryEntry {
    pub order_id: String,
    pub order_code: Option<i64>,
    #[ts(as = "String")]
    pub placed_at: DateTime<Utc>,
    pub summary: OrderSummary,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_product(price_cents: i64, discount_pct: f64, stock: i64) -> Product {
        Product {
            id: "65a1b2c3d4e5f6a7b8c9d0e1".to_string(),
            code: Some("101".to_string()),
            name: "Camiseta".to_string(),
            price_cents,
            discount_pct,
            stock,
            category: "ropa".to_string(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_tax_rate_fraction_round_trip() {
        let rate = TaxRate::from_fraction(0.15);
        assert_eq!(rate.bps(), 1500);
        assert!((rate.as_fraction() - 0.15).abs() < 1e-12);
        assert_eq!(TaxRate::from_fraction(-0.2), TaxRate::zero());
        assert_eq!(TaxRate::from_fraction(f64::NAN), TaxRate::zero());
        assert_eq!(TaxRate::from_percentage(8.25).bps(), 825);
    }

    #[test]
    fn test_default_tax_rate_is_fifteen_percent() {
        assert_eq!(TaxRate::default().bps(), 1500);
    }

    #[test]
    fn test_discount_rate_clamps() {
        assert_eq!(DiscountRate::from_percentage(10.0).bps(), 1000);
        assert_eq!(DiscountRate::from_percentage(150.0).bps(), 10_000);
        assert_eq!(DiscountRate::from_percentage(-5.0).bps(), 0);
        assert_eq!(DiscountRate::from_percentage(f64::NAN).bps(), 0);
    }

    #[test]
    fn test_product_price_after_discount() {
        let product = sample_product(1000, 10.0, 5);
        assert_eq!(product.price_after_discount().cents(), 900);
        assert!(product.has_stock(5));
        assert!(!product.has_stock(6));
    }

    #[test]
    fn test_order_status_parse() {
        assert_eq!("Enviado".parse::<OrderStatus>(), Ok(OrderStatus::Enviado));
        assert_eq!(" cancelado ".parse::<OrderStatus>(), Ok(OrderStatus::Cancelado));
        assert!("shipped".parse::<OrderStatus>().is_err());
        assert_eq!(OrderStatus::Confirmado.to_string(), "confirmado");
    }

    #[test]
    fn test_order_status_serializes_lowercase() {
        let json = serde_json::to_string(&OrderStatus::Entregado).unwrap();
        assert_eq!(json, "\"entregado\"");
    }

    #[test]
    fn test_totals_reconcile() {
        let totals = OrderTotals {
            subtotal_cents: 2300,
            tax_rate: TaxRate::from_bps(1500),
            tax_cents: 345,
            shipping_cents: 450,
            discount_cents: 0,
            total_cents: 3095,
            currency: "USD".to_string(),
        };
        assert!(totals.reconciles());

        let clamped = OrderTotals {
            discount_cents: 10_000,
            total_cents: 0,
            ..totals
        };
        assert!(clamped.reconciles());
    }

    #[test]
    fn test_buyer_greeting_falls_back_to_email() {
        let buyer = BuyerSnapshot {
            email: "ana@example.com".to_string(),
            ..Default::default()
        };
        assert_eq!(buyer.greeting_name(), "ana@example.com");
        assert!(buyer.has_email());
    }
}
