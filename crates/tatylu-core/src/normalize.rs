//! # Request Normalization
//!
//! Maps the many spellings the storefront sends onto one typed request,
//! once, at the boundary. Nothing past this module looks at raw JSON.
//!
//! ## Alias Table
//! ```text
//! ┌──────────────────────┬───────────────────────────────────────────────┐
//! │ Field                │ Accepted keys (first non-empty wins)          │
//! ├──────────────────────┼───────────────────────────────────────────────┤
//! │ items                │ products, items                               │
//! │ item reference       │ productId, id, _id, codigo                    │
//! │ item quantity        │ quantity, cantidad                            │
//! │ item name / price    │ nombre, name / precio, price, unitPrice       │
//! │ shipping source      │ shipping, entrega                             │
//! │ shipping cost        │ costo, cost, shippingFee                      │
//! │ address / refs       │ direccion, address / referencias, reference   │
//! │ contact              │ contacto, contact                             │
//! │ instructions         │ instrucciones, instructions, body.comentarios │
//! │ estimated date       │ fechaEstimada                                 │
//! │ location             │ location, latLong                             │
//! │ payment source       │ payment, pago                                 │
//! │ payment method       │ metodo, method, body.metodoPago               │
//! │ payment method name  │ metodoPagoNombre, methodName, metodo, method  │
//! │ payment reference    │ referencia, reference                         │
//! │ payment status       │ estado                                        │
//! │ discount             │ discount, totals.discount                     │
//! │ buyer                │ userId | user{nombre, firstName, name, email} │
//! └──────────────────────┴───────────────────────────────────────────────┘
//! ```

use serde_json::{Map, Value};

use crate::error::{CoreResult, ValidationError};
use crate::money::{round_money, to_number, Money};
use crate::types::{BuyerSnapshot, CartItem, PaymentInfo, ShippingInfo, TaxRate};
use crate::validation::{
    validate_cart_not_empty, validate_item_quantity, validate_item_reference, validate_price_cents,
    validate_tax_rate,
};
use crate::DEFAULT_CURRENCY;

// =============================================================================
// Normalized Requests
// =============================================================================

/// Defaults applied when a request omits a field.
#[derive(Debug, Clone)]
pub struct RequestDefaults {
    pub tax_rate: TaxRate,
    pub currency: String,
}

impl Default for RequestDefaults {
    fn default() -> Self {
        Self {
            tax_rate: TaxRate::default(),
            currency: DEFAULT_CURRENCY.to_string(),
        }
    }
}

/// Who is buying.
#[derive(Debug, Clone, PartialEq)]
pub enum BuyerInput {
    /// A registered user; must exist at commit time.
    Registered(String),
    /// An inline buyer with at least a name and an email.
    Guest(BuyerSnapshot),
}

/// Pricing knobs shared by `calculate` and checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct PricingOptions {
    pub tax_rate: TaxRate,
    pub currency: String,
    /// Explicit shipping fee; wins over the computed one.
    pub shipping_override: Option<Money>,
    /// Order-level discount amount, never negative.
    pub discount: Money,
}

/// A preview request: items plus pricing options, no buyer.
#[derive(Debug, Clone, PartialEq)]
pub struct CalculateRequest {
    pub items: Vec<CartItem>,
    pub options: PricingOptions,
}

/// A checkout request ready for the commit transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutRequest {
    pub items: Vec<CartItem>,
    pub buyer: BuyerInput,
    pub options: PricingOptions,
    /// Delivery details; `cost_cents` is filled in by pricing.
    pub shipping: ShippingInfo,
    pub payment: PaymentInfo,
}

impl CalculateRequest {
    /// Normalizes a preview body.
    pub fn from_json(body: &Value, defaults: &RequestDefaults) -> CoreResult<Self> {
        let items = parse_items(body)?;
        let options = parse_options(body, defaults)?;
        Ok(Self { items, options })
    }
}

impl CheckoutRequest {
    /// Normalizes a checkout body.
    ///
    /// ## Errors
    /// - `EmptyCart` when no items are present
    /// - `Validation` naming the first bad line, a bad tax rate, or a
    ///   missing buyer
    pub fn from_json(body: &Value, defaults: &RequestDefaults) -> CoreResult<Self> {
        let items = parse_items(body)?;
        let buyer = parse_buyer(body)?;
        let options = parse_options(body, defaults)?;
        let shipping = parse_shipping(body);
        let payment = parse_payment(body);

        Ok(Self {
            items,
            buyer,
            options,
            shipping,
            payment,
        })
    }

    /// Total units requested, used by the shipping policy.
    pub fn total_units(&self) -> i64 {
        self.items.iter().map(|i| i.quantity).sum()
    }
}

// =============================================================================
// Field Parsers
// =============================================================================

fn parse_items(body: &Value) -> CoreResult<Vec<CartItem>> {
    // First alias holding an array; a non-array value does not shadow the next one.
    let raw = ["products", "items"]
        .iter()
        .find_map(|k| body.get(*k).and_then(Value::as_array))
        .map(Vec::as_slice)
        .unwrap_or(&[]);

    validate_cart_not_empty(raw.len())?;

    let mut items = Vec::with_capacity(raw.len());
    for (index, item) in raw.iter().enumerate() {
        let reference_raw = first_string(item, &["productId", "id", "_id", "codigo"]);
        let reference = validate_item_reference(index, reference_raw.as_deref())?;

        let quantity_raw = first_value(item, &["quantity", "cantidad"])
            .map_or(f64::NAN, |v| to_number(v, f64::NAN));
        let quantity = validate_item_quantity(index, quantity_raw)?;

        let price = first_value(item, &["precio", "price", "unitPrice"])
            .map(|v| to_number(v, f64::NAN))
            .filter(|p| p.is_finite() && *p >= 0.0)
            .map(Money::from_amount);
        if let Some(price) = price {
            validate_price_cents(price.cents()).map_err(|e| ValidationError::InvalidItem {
                index,
                reason: e.to_string(),
            })?;
        }

        items.push(CartItem {
            reference,
            quantity,
            name: first_string(item, &["nombre", "name"]),
            price,
        });
    }

    Ok(items)
}

fn parse_buyer(body: &Value) -> Result<BuyerInput, ValidationError> {
    if let Some(user_id) = first_string(body, &["userId"]) {
        return Ok(BuyerInput::Registered(user_id));
    }

    let user = body.get("user").filter(|u| u.is_object());
    if let Some(user) = user {
        let nombre = first_string(user, &["nombre", "firstName", "name"]);
        let email = first_string(user, &["email"]);
        if let (Some(nombre), Some(email)) = (nombre, email) {
            return Ok(BuyerInput::Guest(BuyerSnapshot {
                user_id: None,
                nombre,
                apellido: first_string(user, &["apellido", "lastName"]).unwrap_or_default(),
                email,
                telefono: first_string(user, &["telefono", "phone"]).unwrap_or_default(),
                cedula: first_string(user, &["cedula", "document"]).unwrap_or_default(),
            }));
        }
    }

    Err(ValidationError::MissingBuyer)
}

fn parse_options(body: &Value, defaults: &RequestDefaults) -> Result<PricingOptions, ValidationError> {
    // Unparsable rates fall back to the default; parsable ones must be in range.
    let tax_rate = match body.get("taxRate").filter(|v| !v.is_null()) {
        Some(v) => {
            let fraction = to_number(v, f64::NAN);
            if fraction.is_finite() {
                validate_tax_rate(fraction)?
            } else {
                defaults.tax_rate
            }
        }
        None => defaults.tax_rate,
    };

    let currency = body
        .get("currency")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|c| !c.is_empty())
        .map(str::to_uppercase)
        .unwrap_or_else(|| defaults.currency.clone());

    let shipping_override = source(body, &["shipping", "entrega"])
        .and_then(|src| first_value_in(src, &["costo", "cost", "shippingFee"]))
        .map(|v| to_number(v, f64::NAN))
        .filter(|c| c.is_finite() && *c >= 0.0)
        .map(Money::from_amount);

    let discount_raw = body
        .get("discount")
        .filter(|v| !v.is_null())
        .or_else(|| body.get("totals").and_then(|t| t.get("discount")))
        .map_or(0.0, |v| to_number(v, 0.0));
    let discount = Money::from_amount(round_money(discount_raw).max(0.0));

    Ok(PricingOptions {
        tax_rate,
        currency,
        shipping_override,
        discount,
    })
}

fn parse_shipping(body: &Value) -> ShippingInfo {
    let empty = Map::new();
    let src = source(body, &["shipping", "entrega"]).unwrap_or(&empty);

    ShippingInfo {
        address: first_string_in(src, &["direccion", "address"]).unwrap_or_default(),
        references: first_string_in(src, &["referencias", "reference"]).unwrap_or_default(),
        contact: first_string_in(src, &["contacto", "contact"]).unwrap_or_default(),
        instructions: first_string_in(src, &["instrucciones", "instructions"])
            .or_else(|| first_string(body, &["comentarios"]))
            .unwrap_or_default(),
        estimated_date: first_string_in(src, &["fechaEstimada"]),
        location: first_value_in(src, &["location", "latLong"]).and_then(|v| match v {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::String(_) => None,
            other => Some(other.to_string()),
        }),
        cost_cents: 0,
    }
}

fn parse_payment(body: &Value) -> PaymentInfo {
    let empty = Map::new();
    let src = source(body, &["payment", "pago"]).unwrap_or(&empty);
    let body_method = first_string(body, &["metodoPago"]);
    let defaults = PaymentInfo::default();

    PaymentInfo {
        method: first_string_in(src, &["metodo", "method"])
            .or_else(|| body_method.clone())
            .unwrap_or(defaults.method),
        method_name: first_string_in(src, &["metodoPagoNombre", "methodName", "metodo", "method"])
            .or(body_method)
            .unwrap_or(defaults.method_name),
        reference: first_string_in(src, &["referencia", "reference"]).unwrap_or_default(),
        status: first_string_in(src, &["estado"]).unwrap_or(defaults.status),
    }
}

// =============================================================================
// JSON Helpers
// =============================================================================

/// First of `keys` that names an object inside `body`.
fn source<'a>(body: &'a Value, keys: &[&str]) -> Option<&'a Map<String, Value>> {
    keys.iter().find_map(|k| body.get(*k).and_then(Value::as_object))
}

/// First present, non-null value.
fn first_value<'a>(value: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    value.as_object().and_then(|obj| first_value_in(obj, keys))
}

fn first_value_in<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().filter_map(|k| obj.get(*k)).find(|v| !v.is_null())
}

/// First value that renders as a non-empty string (numbers are stringified).
fn first_string(value: &Value, keys: &[&str]) -> Option<String> {
    value.as_object().and_then(|obj| first_string_in(obj, keys))
}

fn first_string_in(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|k| obj.get(*k)).find_map(|v| match v {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CoreError;
    use crate::ids::ProductRef;
    use serde_json::json;

    fn defaults() -> RequestDefaults {
        RequestDefaults::default()
    }

    #[test]
    fn test_items_accept_aliases() {
        let body = json!({
            "items": [
                { "productId": "65a1b2c3d4e5f6a7b8c9d0e1", "quantity": 2 },
                { "codigo": 101, "cantidad": "3.7", "nombre": "Gorra", "precio": "4.5" },
                { "_id": "CAM-XL", "cantidad": 1 }
            ],
            "userId": "u1"
        });
        let req = CheckoutRequest::from_json(&body, &defaults()).unwrap();

        assert_eq!(req.items.len(), 3);
        assert!(req.items[0].reference.is_canonical());
        assert_eq!(req.items[1].reference, ProductRef::Alternate("101".into()));
        assert_eq!(req.items[1].quantity, 3);
        assert_eq!(req.items[1].name.as_deref(), Some("Gorra"));
        assert_eq!(req.items[1].price, Some(Money::from_cents(450)));
        assert_eq!(req.items[2].reference, ProductRef::Alternate("CAM-XL".into()));
        assert_eq!(req.total_units(), 6);
    }

    #[test]
    fn test_products_key_wins_over_items() {
        let body = json!({
            "products": [{ "id": "1", "quantity": 1 }],
            "items": [{ "id": "2", "quantity": 1 }, { "id": "3", "quantity": 1 }]
        });
        let req = CalculateRequest::from_json(&body, &defaults()).unwrap();
        assert_eq!(req.items.len(), 1);
    }

    #[test]
    fn test_non_array_products_falls_through_to_items() {
        let body = json!({
            "products": "n/a",
            "items": [{ "productId": "999", "cantidad": 1 }]
        });
        let req = CalculateRequest::from_json(&body, &defaults()).unwrap();
        assert_eq!(req.items.len(), 1);
        assert_eq!(req.items[0].reference, ProductRef::Alternate("999".into()));
    }

    #[test]
    fn test_client_price_above_cap_is_rejected() {
        let body = json!({ "items": [
            { "productId": "1", "cantidad": 1, "precio": 5 },
            { "productId": "999", "cantidad": 1_000_000, "precio": 1e15 }
        ]});
        let err = CalculateRequest::from_json(&body, &defaults()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::InvalidItem { index: 1, .. })
        ));
    }

    #[test]
    fn test_empty_cart_is_rejected() {
        let err = CalculateRequest::from_json(&json!({ "items": [] }), &defaults()).unwrap_err();
        assert_eq!(err, CoreError::EmptyCart);

        let err = CalculateRequest::from_json(&json!({}), &defaults()).unwrap_err();
        assert_eq!(err, CoreError::EmptyCart);
    }

    #[test]
    fn test_bad_line_is_named() {
        let body = json!({ "items": [
            { "productId": "1", "quantity": 1 },
            { "productId": "2", "quantity": 0.4 }
        ]});
        let err = CalculateRequest::from_json(&body, &defaults()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::InvalidItem { index: 1, .. })
        ));

        let body = json!({ "items": [{ "quantity": 1 }] });
        let err = CalculateRequest::from_json(&body, &defaults()).unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::InvalidItem { index: 0, .. })
        ));
    }

    #[test]
    fn test_buyer_resolution() {
        let items = json!([{ "id": "1", "quantity": 1 }]);

        let req = CheckoutRequest::from_json(&json!({ "items": items, "userId": "abc" }), &defaults())
            .unwrap();
        assert_eq!(req.buyer, BuyerInput::Registered("abc".into()));

        let body = json!({ "items": items, "user": {
            "firstName": "Ana", "lastName": "Pérez", "email": "ana@example.com", "phone": "099"
        }});
        let req = CheckoutRequest::from_json(&body, &defaults()).unwrap();
        match req.buyer {
            BuyerInput::Guest(buyer) => {
                assert_eq!(buyer.nombre, "Ana");
                assert_eq!(buyer.apellido, "Pérez");
                assert_eq!(buyer.telefono, "099");
                assert_eq!(buyer.user_id, None);
            }
            other => panic!("expected guest buyer, got {:?}", other),
        }

        let body = json!({ "items": items, "user": { "nombre": "Ana" } });
        let err = CheckoutRequest::from_json(&body, &defaults()).unwrap_err();
        assert_eq!(err, CoreError::Validation(ValidationError::MissingBuyer));
    }

    #[test]
    fn test_pricing_options() {
        let body = json!({
            "items": [{ "id": "1", "quantity": 1 }],
            "taxRate": 0.12,
            "currency": " usd ",
            "entrega": { "costo": "5" },
            "totals": { "discount": 2.456 }
        });
        let req = CalculateRequest::from_json(&body, &defaults()).unwrap();
        assert_eq!(req.options.tax_rate.bps(), 1200);
        assert_eq!(req.options.currency, "USD");
        assert_eq!(req.options.shipping_override, Some(Money::from_cents(500)));
        assert_eq!(req.options.discount.cents(), 246);
    }

    #[test]
    fn test_pricing_defaults() {
        let body = json!({
            "items": [{ "id": "1", "quantity": 1 }],
            "taxRate": "n/a",
            "discount": -4,
            "shipping": { "cost": -1 }
        });
        let req = CalculateRequest::from_json(&body, &defaults()).unwrap();
        assert_eq!(req.options.tax_rate.bps(), 1500);
        assert_eq!(req.options.currency, "USD");
        assert_eq!(req.options.shipping_override, None);
        assert_eq!(req.options.discount, Money::zero());

        let body = json!({ "items": [{ "id": "1", "quantity": 1 }], "taxRate": 3 });
        assert!(CalculateRequest::from_json(&body, &defaults()).is_err());
    }

    #[test]
    fn test_shipping_and_payment_info() {
        let body = json!({
            "items": [{ "id": "1", "quantity": 1 }],
            "userId": "u1",
            "comentarios": "Tocar el timbre",
            "shipping": {
                "address": "Av. Amazonas 123",
                "referencias": "Junto al parque",
                "contacto": "0991234567",
                "latLong": { "lat": -0.18, "lng": -78.48 }
            },
            "metodoPago": "transferencia",
            "pago": { "referencia": "TX-9" }
        });
        let req = CheckoutRequest::from_json(&body, &defaults()).unwrap();

        assert_eq!(req.shipping.address, "Av. Amazonas 123");
        assert_eq!(req.shipping.references, "Junto al parque");
        assert_eq!(req.shipping.instructions, "Tocar el timbre");
        assert!(req.shipping.location.as_deref().unwrap_or("").contains("lat"));
        assert_eq!(req.shipping.estimated_date, None);

        assert_eq!(req.payment.method, "transferencia");
        assert_eq!(req.payment.method_name, "transferencia");
        assert_eq!(req.payment.reference, "TX-9");
        assert_eq!(req.payment.status, "pagado");
    }

    #[test]
    fn test_payment_defaults() {
        let body = json!({ "items": [{ "id": "1", "quantity": 1 }], "userId": "u1" });
        let req = CheckoutRequest::from_json(&body, &defaults()).unwrap();
        assert_eq!(req.payment, PaymentInfo::default());
        assert_eq!(req.payment.method, "no-especificado");
    }
}
