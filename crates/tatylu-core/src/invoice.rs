//! # Invoice Module
//!
//! Builds the invoice record for a committed order and the notification
//! text that goes with it. Delivery lives in the order service.
//!
//! ## Invoice Number Format
//! ```text
//! INV-1718035200123-042
//! │   │             │
//! │   │             └── 3-digit random suffix (000-999)
//! │   └── issue time, milliseconds since the epoch
//! └── fixed prefix
//! ```
//! Best-effort unique: two invoices in the same millisecond collide with
//! probability 1/1000.

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_rs::TS;

use crate::error::CoreResult;
use crate::money::Money;
use crate::normalize::PricingOptions;
use crate::pricing::{compute_totals, sum_line_totals, ShippingPolicy};
use crate::types::{BuyerSnapshot, Order, OrderTotals, TaxRate};

/// Subject line of the invoice notification.
pub const INVOICE_EMAIL_SUBJECT: &str = "Factura disponible - Tatylu";

// =============================================================================
// Invoice Number
// =============================================================================

/// Invoice number, `INV-<epoch-ms>-<nnn>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceNumber(String);

impl InvoiceNumber {
    /// Generates a fresh number for `now`.
    pub fn generate(now: DateTime<Utc>) -> Self {
        let suffix: u16 = rand::thread_rng().gen_range(0..1000);
        Self::from_parts(now, suffix)
    }

    /// Builds a number from its parts. `suffix` is reduced modulo 1000.
    pub fn from_parts(now: DateTime<Utc>, suffix: u16) -> Self {
        InvoiceNumber(format!("INV-{}-{:03}", now.timestamp_millis(), suffix % 1000))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for InvoiceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<InvoiceNumber> for String {
    fn from(number: InvoiceNumber) -> Self {
        number.0
    }
}

// =============================================================================
// Invoice
// =============================================================================

/// An invoice line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceLine {
    pub product_id: String,
    pub name: String,
    pub quantity: i64,
    pub unit_price_cents: i64,
    pub discount_pct: f64,
    pub line_total_cents: i64,
    pub currency: String,
}

/// Totals breakdown, recording the tax rate actually applied.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InvoiceTotals {
    pub subtotal_cents: i64,
    pub tax_rate: TaxRate,
    pub tax_cents: i64,
    pub shipping_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
}

/// An invoice derived from a committed order. Never stored on its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Invoice {
    pub invoice_number: InvoiceNumber,
    #[ts(as = "String")]
    pub issued_at: DateTime<Utc>,
    pub currency: String,
    pub buyer: BuyerSnapshot,
    pub items: Vec<InvoiceLine>,
    pub totals: InvoiceTotals,
    pub order_id: String,
    pub order_code: Option<i64>,
}

/// Recomputes an order's totals from its persisted lines.
///
/// Tax is recomputed with the rate recorded at commit; the shipping fee and
/// order discount recorded at commit are reused as given.
pub fn recompute_totals(order: &Order) -> CoreResult<OrderTotals> {
    let recorded = &order.summary.totals;
    let options = PricingOptions {
        tax_rate: recorded.tax_rate,
        currency: recorded.currency.clone(),
        shipping_override: Some(Money::from_cents(recorded.shipping_cents)),
        discount: Money::from_cents(recorded.discount_cents),
    };

    let subtotal = sum_line_totals(order.items.iter().map(|i| i.line_total()))?;
    Ok(compute_totals(subtotal, order.units(), &options, &ShippingPolicy::default())?)
}

/// Builds the invoice for `order`.
///
/// ## Arguments
/// * `order` - The committed order (its summary carries buyer and totals)
/// * `number` - Number already recorded in the order summary
/// * `issued_at` - Issue timestamp
///
/// Totals come from [`recompute_totals`]; they match the ones recorded at
/// commit because both use the same pricing arithmetic.
pub fn build_invoice(order: &Order, number: InvoiceNumber, issued_at: DateTime<Utc>) -> CoreResult<Invoice> {
    let totals = recompute_totals(order)?;
    debug_assert_eq!(totals, order.summary.totals, "invoice totals diverge from order {}", order.id);

    Ok(Invoice {
        invoice_number: number,
        issued_at,
        currency: totals.currency.clone(),
        buyer: order.summary.customer.clone(),
        items: order
            .items
            .iter()
            .map(|item| InvoiceLine {
                product_id: item.product_id.clone(),
                name: item.name.clone(),
                quantity: item.quantity,
                unit_price_cents: item.unit_price_cents,
                discount_pct: item.discount_pct,
                line_total_cents: item.line_total_cents,
                currency: item.currency.clone(),
            })
            .collect(),
        totals: InvoiceTotals {
            subtotal_cents: totals.subtotal_cents,
            tax_rate: totals.tax_rate,
            tax_cents: totals.tax_cents,
            shipping_cents: totals.shipping_cents,
            discount_cents: totals.discount_cents,
            total_cents: totals.total_cents,
        },
        order_id: order.id.clone(),
        order_code: order.code,
    })
}

// =============================================================================
// Notification
// =============================================================================

/// The email announcing an invoice.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceNotice {
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Composes the invoice email, or `None` when the buyer has no email.
///
/// The link points at `<base_url>/confirmacion.html?orderId=<order id>`.
pub fn invoice_notice(invoice: &Invoice, base_url: &str) -> Option<InvoiceNotice> {
    if !invoice.buyer.has_email() {
        return None;
    }

    let link = format!(
        "{}/confirmacion.html?orderId={}",
        base_url.trim_end_matches('/'),
        invoice.order_id
    );
    let html = format!(
        "<p>Hola {},</p>\n<p>Tu factura #{} está lista.</p>\n<p>Puedes consultarla aquí: <a href=\"{}\">Ver factura</a></p>",
        escape_html(invoice.buyer.greeting_name()),
        escape_html(invoice.invoice_number.as_str()),
        escape_html(&link),
    );

    Some(InvoiceNotice {
        to: invoice.buyer.email.trim().to_string(),
        subject: INVOICE_EMAIL_SUBJECT.to_string(),
        html,
    })
}

/// Escapes the five HTML-significant characters.
///
/// ## Example
/// ```rust
/// use tatylu_core::invoice::escape_html;
///
/// assert_eq!(escape_html("<b>Tom & 'Jerry'</b>"), "&lt;b&gt;Tom &amp; &#39;Jerry&#39;&lt;/b&gt;");
/// ```
pub fn escape_html(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{OrderItem, OrderStatus, OrderSummary, OrderTotals, PaymentInfo, ShippingInfo};
    use chrono::TimeZone;

    fn sample_order(email: &str, nombre: &str) -> Order {
        let items = vec![OrderItem {
            product_id: "aaaaaaaaaaaaaaaaaaaaaaaa".to_string(),
            name: "Camiseta".to_string(),
            category: "ropa".to_string(),
            quantity: 2,
            unit_price_cents: 900,
            discount_pct: 10.0,
            line_total_cents: 1800,
            currency: "USD".to_string(),
        }];
        let summary = OrderSummary {
            customer: BuyerSnapshot {
                user_id: None,
                nombre: nombre.to_string(),
                email: email.to_string(),
                ..Default::default()
            },
            items,
            totals: OrderTotals {
                subtotal_cents: 1800,
                tax_rate: TaxRate::from_bps(1500),
                tax_cents: 270,
                shipping_cents: 400,
                discount_cents: 0,
                total_cents: 2470,
                currency: "USD".to_string(),
            },
            shipping: ShippingInfo::default(),
            payment: PaymentInfo::default(),
            invoice_number: None,
        };
        let mut order = Order::new(
            "65a1b2c3d4e5f6a7b8c9d0e1".to_string(),
            None,
            OrderStatus::Confirmado,
            summary,
            Utc::now(),
        );
        order.code = Some(31);
        order
    }

    #[test]
    fn test_invoice_number_format() {
        let at = Utc.timestamp_millis_opt(1_718_035_200_123).unwrap();
        assert_eq!(InvoiceNumber::from_parts(at, 42).as_str(), "INV-1718035200123-042");
        assert_eq!(InvoiceNumber::from_parts(at, 1999).as_str(), "INV-1718035200123-999");

        let generated = InvoiceNumber::generate(at);
        let suffix = generated.as_str().rsplit('-').next().unwrap();
        assert_eq!(suffix.len(), 3);
        assert!(generated.as_str().starts_with("INV-1718035200123-"));
    }

    #[test]
    fn test_build_invoice_copies_order() {
        let order = sample_order("ana@example.com", "Ana");
        let number = InvoiceNumber::from_parts(Utc::now(), 7);
        let invoice = build_invoice(&order, number.clone(), Utc::now()).unwrap();

        assert_eq!(invoice.invoice_number, number);
        assert_eq!(invoice.order_code, Some(31));
        assert_eq!(invoice.totals.tax_rate.bps(), 1500);
        assert_eq!(invoice.totals.total_cents, 2470);
        assert_eq!(invoice.items[0].discount_pct, 10.0);
        assert_eq!(invoice.currency, "USD");
    }

    #[test]
    fn test_totals_recomputed_from_lines() {
        let mut order = sample_order("ana@example.com", "Ana");
        assert_eq!(recompute_totals(&order).unwrap(), order.summary.totals);

        // Tax follows the recorded rate and the persisted lines, not the stored tax.
        order.summary.totals.tax_cents = 999;
        order.summary.totals.tax_rate = TaxRate::from_bps(1000);
        let totals = recompute_totals(&order).unwrap();
        assert_eq!(totals.tax_cents, 180);
        assert_eq!(totals.tax_rate.bps(), 1000);
        assert_eq!(totals.shipping_cents, 400);
        assert_eq!(totals.total_cents, 2380);
        assert!(totals.reconciles());
    }

    #[test]
    fn test_notice_escapes_and_links() {
        let order = sample_order("ana@example.com", "<Ana>");
        let invoice = build_invoice(&order, InvoiceNumber::from_parts(Utc::now(), 1), Utc::now()).unwrap();
        let notice = invoice_notice(&invoice, "https://tatylu.ec/").unwrap();

        assert_eq!(notice.subject, INVOICE_EMAIL_SUBJECT);
        assert_eq!(notice.to, "ana@example.com");
        assert!(notice.html.contains("Hola &lt;Ana&gt;,"));
        assert!(notice
            .html
            .contains("https://tatylu.ec/confirmacion.html?orderId=65a1b2c3d4e5f6a7b8c9d0e1"));
    }

    #[test]
    fn test_notice_greets_by_email_without_name() {
        let order = sample_order("ana@example.com", "");
        let invoice = build_invoice(&order, InvoiceNumber::from_parts(Utc::now(), 1), Utc::now()).unwrap();
        let notice = invoice_notice(&invoice, "http://localhost:4000").unwrap();
        assert!(notice.html.starts_with("<p>Hola ana@example.com,</p>"));
    }

    #[test]
    fn test_no_notice_without_email() {
        let order = sample_order("", "Ana");
        let invoice = build_invoice(&order, InvoiceNumber::from_parts(Utc::now(), 1), Utc::now()).unwrap();
        assert!(invoice_notice(&invoice, "http://localhost:4000").is_none());
    }
}
