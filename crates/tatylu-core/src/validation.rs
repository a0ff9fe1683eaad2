//! # Validation Module
//!
//! Input validation for checkout requests and catalog writes.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: normalize (alias table)                                       │
//! │  ├── Accepts every spelling the storefront sends                        │
//! │  └── Calls THIS MODULE per field                                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                   │
//! │  ├── Cart lines (reference present, positive integer quantity)          │
//! │  ├── Tax rate range                                                     │
//! │  └── Email recipients                                                   │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                             │
//! │  ├── CHECK (stock >= 0)                                                 │
//! │  ├── UNIQUE product codes and order codes                               │
//! │  └── Foreign key constraints                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here runs before pricing or any storage call.

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::ids::ProductRef;
use crate::types::TaxRate;
use crate::{MAX_ITEM_QUANTITY, MAX_PRICE_CENTS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// Cart Validators
// =============================================================================

/// Rejects an empty checkout.
pub fn validate_cart_not_empty(items: usize) -> CoreResult<()> {
    if items == 0 {
        return Err(CoreError::EmptyCart);
    }
    Ok(())
}

/// Validates the product reference of cart line `index`.
///
/// ## Example
/// ```rust
/// use tatylu_core::validation::validate_item_reference;
///
/// assert!(validate_item_reference(0, Some("101")).is_ok());
/// assert!(validate_item_reference(1, Some("  ")).is_err());
/// assert!(validate_item_reference(2, None).is_err());
/// ```
pub fn validate_item_reference(index: usize, raw: Option<&str>) -> ValidationResult<ProductRef> {
    raw.and_then(ProductRef::parse)
        .ok_or_else(|| ValidationError::InvalidItem {
            index,
            reason: "productId is required".to_string(),
        })
}

/// Validates the quantity of cart line `index`, truncating fractions.
///
/// ## Rules
/// - Must be a finite number
/// - After truncation must be ≥ 1
/// - Must not exceed MAX_ITEM_QUANTITY
///
/// ## User Workflow
/// ```text
/// "cantidad": 2.7  ──► floor ──► 2   ✅
/// "cantidad": 0.5  ──► floor ──► 0   ❌ "Item 3: invalid quantity 0.5"
/// "cantidad": "x"  ──► NaN           ❌
/// ```
pub fn validate_item_quantity(index: usize, raw: f64) -> ValidationResult<i64> {
    let invalid = || ValidationError::InvalidItem {
        index,
        reason: format!("invalid quantity {}", raw),
    };

    if !raw.is_finite() {
        return Err(invalid());
    }

    let quantity = raw.floor();
    if quantity < 1.0 {
        return Err(invalid());
    }
    if quantity > MAX_ITEM_QUANTITY as f64 {
        return Err(ValidationError::InvalidItem {
            index,
            reason: format!("quantity must not exceed {}", MAX_ITEM_QUANTITY),
        });
    }

    Ok(quantity as i64)
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a tax rate given as a fraction (`0.15`).
///
/// ## Rules
/// - Must be between 0 and 1 (0% to 100%)
pub fn validate_tax_rate(fraction: f64) -> ValidationResult<TaxRate> {
    if !fraction.is_finite() || !(0.0..=1.0).contains(&fraction) {
        return Err(ValidationError::OutOfRange {
            field: "taxRate".to_string(),
            min: 0,
            max: 1,
        });
    }
    Ok(TaxRate::from_fraction(fraction))
}

/// Validates a price in cents.
///
/// ## Example
/// ```rust
/// use tatylu_core::validation::validate_price_cents;
///
/// assert!(validate_price_cents(1099).is_ok());  // $10.99
/// assert!(validate_price_cents(0).is_ok());     // Free item
/// assert!(validate_price_cents(-100).is_err()); // Invalid
/// assert!(validate_price_cents(i64::MAX).is_err()); // Above MAX_PRICE_CENTS
/// ```
pub fn validate_price_cents(cents: i64) -> ValidationResult<()> {
    if !(0..=MAX_PRICE_CENTS).contains(&cents) {
        return Err(ValidationError::OutOfRange {
            field: "price".to_string(),
            min: 0,
            max: MAX_PRICE_CENTS,
        });
    }

    Ok(())
}

/// Validates a discount percentage (0-100).
pub fn validate_discount_pct(pct: f64) -> ValidationResult<()> {
    if !pct.is_finite() || !(0.0..=100.0).contains(&pct) {
        return Err(ValidationError::OutOfRange {
            field: "discount".to_string(),
            min: 0,
            max: 100,
        });
    }
    Ok(())
}

/// Clamps a requested listing limit into `1..=max`, using `default` when
/// absent.
pub fn clamp_limit(requested: Option<i64>, default: i64, max: i64) -> i64 {
    requested.unwrap_or(default).clamp(1, max)
}

// =============================================================================
// String Validators
// =============================================================================

/// Validates a product name.
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 200 characters
pub fn validate_product_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "name".to_string(),
        });
    }

    if name.chars().count() > 200 {
        return Err(ValidationError::OutOfRange {
            field: "name length".to_string(),
            min: 1,
            max: 200,
        });
    }

    Ok(())
}

/// Validates an email recipient.
///
/// ## Rules
/// - Must not be empty
/// - Must be a single line (no CR/LF, which would allow header injection)
/// - Must look like `local@domain.tld`, no whitespace
///
/// ## Example
/// ```rust
/// use tatylu_core::validation::validate_email;
///
/// assert!(validate_email("ana@example.com").is_ok());
/// assert!(validate_email("ana@example").is_err());
/// assert!(validate_email("ana@example.com\r\nBcc: x@y.z").is_err());
/// ```
pub fn validate_email(email: &str) -> ValidationResult<()> {
    let email = email.trim();
    let invalid = |reason: &str| ValidationError::InvalidFormat {
        field: "email".to_string(),
        reason: reason.to_string(),
    };

    if email.is_empty() {
        return Err(ValidationError::Required {
            field: "email".to_string(),
        });
    }

    if email.contains(['\r', '\n']) {
        return Err(invalid("must be a single line"));
    }

    if email.chars().any(char::is_whitespace) {
        return Err(invalid("must not contain spaces"));
    }

    let (local, domain) = email
        .split_once('@')
        .ok_or_else(|| invalid("missing @"))?;

    if local.is_empty() || domain.contains('@') {
        return Err(invalid("expected exactly one @"));
    }

    // domain needs a dot with something on both sides of some dot
    let has_dotted_domain = domain
        .char_indices()
        .any(|(i, c)| c == '.' && i > 0 && i + 1 < domain.len());
    if !has_dotted_domain {
        return Err(invalid("domain must contain a dot"));
    }

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_item_quantity() {
        assert_eq!(validate_item_quantity(0, 1.0), Ok(1));
        assert_eq!(validate_item_quantity(0, 2.9), Ok(2));

        assert!(validate_item_quantity(0, 0.0).is_err());
        assert!(validate_item_quantity(0, 0.99).is_err());
        assert!(validate_item_quantity(0, -3.0).is_err());
        assert!(validate_item_quantity(0, f64::NAN).is_err());
        assert!(validate_item_quantity(0, (MAX_ITEM_QUANTITY + 1) as f64).is_err());
    }

    #[test]
    fn test_item_errors_name_the_line() {
        let err = validate_item_quantity(4, 0.0).unwrap_err();
        assert!(err.to_string().starts_with("Item 4:"));

        let err = validate_item_reference(7, Some("")).unwrap_err();
        assert_eq!(err.to_string(), "Item 7: productId is required");
    }

    #[test]
    fn test_validate_cart_not_empty() {
        assert_eq!(validate_cart_not_empty(0), Err(CoreError::EmptyCart));
        assert!(validate_cart_not_empty(1).is_ok());
    }

    #[test]
    fn test_validate_tax_rate() {
        assert_eq!(validate_tax_rate(0.15).map(|r| r.bps()), Ok(1500));
        assert_eq!(validate_tax_rate(0.0).map(|r| r.bps()), Ok(0));
        assert!(validate_tax_rate(1.5).is_err());
        assert!(validate_tax_rate(-0.01).is_err());
    }

    #[test]
    fn test_validate_price_and_discount() {
        assert!(validate_price_cents(0).is_ok());
        assert!(validate_price_cents(-1).is_err());
        assert!(validate_price_cents(MAX_PRICE_CENTS).is_ok());
        assert!(validate_price_cents(MAX_PRICE_CENTS + 1).is_err());
        assert!(validate_discount_pct(100.0).is_ok());
        assert!(validate_discount_pct(100.5).is_err());
    }

    #[test]
    fn test_clamp_limit() {
        assert_eq!(clamp_limit(None, 10, 100), 10);
        assert_eq!(clamp_limit(Some(0), 10, 100), 1);
        assert_eq!(clamp_limit(Some(500), 10, 100), 100);
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("a@b.co").is_ok());
        assert!(validate_email("").is_err());
        assert!(validate_email("a b@c.de").is_err());
        assert!(validate_email("@c.de").is_err());
        assert!(validate_email("a@.de").is_err());
        assert!(validate_email("a@de.").is_err());
        assert!(validate_email("a@@c.de").is_err());
        assert!(validate_email("a@b.c\nx").is_err());
    }

    #[test]
    fn test_validate_product_name() {
        assert!(validate_product_name("Camiseta básica").is_ok());
        assert!(validate_product_name("  ").is_err());
        assert!(validate_product_name(&"A".repeat(201)).is_err());
    }
}
