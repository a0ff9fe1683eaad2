//! # Pricing Engine
//!
//! Per-line discounted prices, line totals, subtotal, tax, shipping, order
//! discount and grand total. Pure: the same inputs always give the same
//! breakdown.
//!
//! ## Pipeline
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  CartItem ──► ProductLookup ──► list price + discount%                  │
//! │                                       │                                 │
//! │                                       ▼                                 │
//! │                     unit = round2(list * (1 - pct/100))                 │
//! │                     line = unit * qty                                   │
//! │                                       │                                 │
//! │  Σ line ──► subtotal ──► tax = round2(subtotal * rate)                  │
//! │  Σ qty  ──► shipping = override | min(max, base + (units-1) * per)      │
//! │                                                                         │
//! │  total = max(0, subtotal + tax + shipping - discount)                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The checkout transaction prices lines with [`order_item_for`] from the
//! freshly fetched product and then calls [`compute_totals`], so previews and
//! committed orders share the exact same arithmetic.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreResult, ValidationError};
use crate::ids::ProductLookup;
use crate::money::Money;
use crate::normalize::PricingOptions;
use crate::types::{CartItem, DiscountRate, OrderItem, OrderTotals, Product, TaxRate};
use crate::validation::ValidationResult;
use crate::DEFAULT_CATEGORY;

// =============================================================================
// Shipping Policy
// =============================================================================

/// Computed shipping fee: a base fee for the first unit, an increment for
/// each further unit, capped at a maximum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingPolicy {
    pub base: Money,
    pub per_item: Money,
    pub max: Money,
}

impl Default for ShippingPolicy {
    fn default() -> Self {
        Self {
            base: Money::from_cents(350),
            per_item: Money::from_cents(50),
            max: Money::from_cents(2000),
        }
    }
}

impl ShippingPolicy {
    /// Fee for `total_units` units.
    ///
    /// ## Example
    /// ```rust
    /// use tatylu_core::pricing::ShippingPolicy;
    ///
    /// let policy = ShippingPolicy::default();
    /// assert_eq!(policy.fee(1).cents(), 350);
    /// assert_eq!(policy.fee(3).cents(), 450);
    /// assert_eq!(policy.fee(500).cents(), 2000); // capped
    /// ```
    pub fn fee(&self, total_units: i64) -> Money {
        let extra_units = (total_units - 1).max(0);
        let computed = self.base + self.per_item * extra_units;
        computed.min(self.max)
    }

    /// An explicit non-negative override wins over the computed fee.
    pub fn quote(&self, override_fee: Option<Money>, total_units: i64) -> Money {
        match override_fee {
            Some(fee) if !fee.is_negative() => fee,
            _ => self.fee(total_units),
        }
    }
}

// =============================================================================
// Line Pricing
// =============================================================================

/// A priced preview line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricedLine {
    /// Reference as the client sent it (normalized).
    pub product_ref: String,
    /// Canonical id when the reference resolved.
    pub product_id: Option<String>,
    pub name: String,
    pub category: String,
    pub quantity: i64,
    pub list_price_cents: i64,
    pub discount_pct: f64,
    pub unit_price_cents: i64,
    pub line_total_cents: i64,
    /// `(list - unit) * quantity`
    pub savings_cents: i64,
    /// False when priced from client-supplied values.
    pub resolved: bool,
}

fn too_large(field: &str) -> ValidationError {
    ValidationError::OutOfRange {
        field: field.to_string(),
        min: 0,
        max: i64::MAX,
    }
}

/// Unit price after discount and line total for `quantity` units.
fn price_units(list_price: Money, discount: DiscountRate, quantity: i64) -> ValidationResult<(Money, Money)> {
    let unit = list_price.apply_discount(discount);
    let line = unit
        .checked_multiply_quantity(quantity)
        .ok_or_else(|| too_large("lineTotal"))?;
    Ok((unit, line))
}

/// Sums line totals into a subtotal.
pub fn sum_line_totals<I: IntoIterator<Item = Money>>(lines: I) -> ValidationResult<Money> {
    Money::checked_sum(lines).ok_or_else(|| too_large("subtotal"))
}

/// Prices `quantity` units of a catalog product as a persisted order line.
///
/// Only catalog values are used; client-supplied prices never reach here.
pub fn order_item_for(product: &Product, quantity: i64, currency: &str) -> ValidationResult<OrderItem> {
    let (unit, line) = price_units(product.price(), product.discount(), quantity)?;
    Ok(OrderItem {
        product_id: product.id.clone(),
        name: product.name.clone(),
        category: product.category.clone(),
        quantity,
        unit_price_cents: unit.cents(),
        discount_pct: product.discount().percentage(),
        line_total_cents: line.cents(),
        currency: currency.to_string(),
    })
}

/// Prices a preview line, falling back to client values when unresolved.
pub fn price_line(item: &CartItem, product: Option<&Product>) -> ValidationResult<PricedLine> {
    let product_ref = item.reference.key().to_string();

    let (product_id, name, category, list_price, discount) = match product {
        Some(p) => (
            Some(p.id.clone()),
            p.name.clone(),
            p.category.clone(),
            p.price(),
            p.discount(),
        ),
        None => (
            None,
            item.name.clone().unwrap_or_else(|| product_ref.clone()),
            DEFAULT_CATEGORY.to_string(),
            item.price.unwrap_or_default(),
            DiscountRate::zero(),
        ),
    };

    let (unit, line) = price_units(list_price, discount, item.quantity)?;
    let savings = (list_price - unit)
        .checked_multiply_quantity(item.quantity)
        .ok_or_else(|| too_large("savings"))?;

    Ok(PricedLine {
        product_ref,
        product_id,
        name,
        category,
        quantity: item.quantity,
        list_price_cents: list_price.cents(),
        discount_pct: discount.percentage(),
        unit_price_cents: unit.cents(),
        line_total_cents: line.cents(),
        savings_cents: savings.cents(),
        resolved: product.is_some(),
    })
}

// =============================================================================
// Totals
// =============================================================================

/// Computes the order totals for a subtotal.
///
/// ## Arguments
/// * `subtotal` - Sum of line totals
/// * `total_units` - Sum of quantities (drives the computed shipping fee)
/// * `options` - Tax rate, currency, shipping override, order discount
/// * `policy` - Shipping policy used when there is no override
///
/// ## Errors
/// `OutOfRange` when `subtotal + tax + shipping` does not fit in cents.
pub fn compute_totals(
    subtotal: Money,
    total_units: i64,
    options: &PricingOptions,
    policy: &ShippingPolicy,
) -> ValidationResult<OrderTotals> {
    let tax = subtotal.calculate_tax(options.tax_rate);
    let shipping = policy.quote(options.shipping_override, total_units);
    let discount = options.discount.non_negative();
    let gross = Money::checked_sum([subtotal, tax, shipping]).ok_or_else(|| too_large("total"))?;
    let total = (gross - discount).non_negative();

    Ok(OrderTotals {
        subtotal_cents: subtotal.cents(),
        tax_rate: options.tax_rate,
        tax_cents: tax.cents(),
        shipping_cents: shipping.cents(),
        discount_cents: discount.cents(),
        total_cents: total.cents(),
        currency: options.currency.clone(),
    })
}

// =============================================================================
// Cart Pricing
// =============================================================================

/// A full pricing breakdown. Nothing is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PriceBreakdown {
    pub lines: Vec<PricedLine>,
    pub total_units: i64,
    /// Σ per-line savings from product discounts.
    pub discount_total_cents: i64,
    pub subtotal_cents: i64,
    pub tax_rate: TaxRate,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    /// Order-level discount amount.
    pub discount_cents: i64,
    pub total_cents: i64,
    pub currency: String,
}

/// Prices a normalized cart against resolved products.
///
/// A line whose total does not fit in cents fails as `InvalidItem` naming
/// the line.
///
/// ## Example
/// ```rust
/// use tatylu_core::ids::{ProductLookup, ProductRef};
/// use tatylu_core::money::Money;
/// use tatylu_core::normalize::PricingOptions;
/// use tatylu_core::pricing::{price_cart, ShippingPolicy};
/// use tatylu_core::types::{CartItem, TaxRate};
///
/// let items = vec![CartItem {
///     reference: ProductRef::Alternate("9".into()),
///     quantity: 2,
///     name: Some("Gorra".into()),
///     price: Some(Money::from_cents(500)),
/// }];
/// let options = PricingOptions {
///     tax_rate: TaxRate::from_bps(0),
///     currency: "USD".into(),
///     shipping_override: Some(Money::zero()),
///     discount: Money::zero(),
/// };
///
/// let breakdown = price_cart(&items, &ProductLookup::new(), &options, &ShippingPolicy::default()).unwrap();
/// assert_eq!(breakdown.total_cents, 1000);
/// assert!(!breakdown.lines[0].resolved);
/// ```
pub fn price_cart(
    items: &[CartItem],
    lookup: &ProductLookup,
    options: &PricingOptions,
    policy: &ShippingPolicy,
) -> CoreResult<PriceBreakdown> {
    let lines = items
        .iter()
        .enumerate()
        .map(|(index, item)| {
            price_line(item, lookup.get(&item.reference)).map_err(|e| ValidationError::InvalidItem {
                index,
                reason: e.to_string(),
            })
        })
        .collect::<ValidationResult<Vec<PricedLine>>>()?;

    let subtotal = sum_line_totals(lines.iter().map(|l| Money::from_cents(l.line_total_cents)))?;
    let savings = Money::checked_sum(lines.iter().map(|l| Money::from_cents(l.savings_cents)))
        .ok_or_else(|| too_large("savings"))?;
    let total_units: i64 = lines.iter().map(|l| l.quantity).sum();

    let totals = compute_totals(subtotal, total_units, options, policy)?;

    Ok(PriceBreakdown {
        lines,
        total_units,
        discount_total_cents: savings.cents(),
        subtotal_cents: totals.subtotal_cents,
        tax_rate: totals.tax_rate,
        tax_cents: totals.tax_cents,
        shipping_cents: totals.shipping_cents,
        discount_cents: totals.discount_cents,
        total_cents: totals.total_cents,
        currency: totals.currency,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================
