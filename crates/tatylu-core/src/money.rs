//! # Money Module
//!
//! Provides the `Money` type for handling monetary values safely, plus the
//! numeric coercion helpers used at the request boundary.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  Checkout payloads arrive as JSON numbers:                              │
//! │    "precio": 10.1, "cantidad": 3                                        │
//! │    10.1 * 3 = 30.299999999999997  ❌ WRONG!                             │
//! │                                                                         │
//! │  OUR SOLUTION: Integer Cents                                            │
//! │    Decimal amounts are rounded ONCE at the boundary (round_money)       │
//! │    and every computation after that runs on i64 cents.                  │
//! │    1010 cents * 3 = 3030 cents                                          │
//! │                                                                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use tatylu_core::money::Money;
//!
//! // Create from cents (preferred)
//! let price = Money::from_cents(1099); // $10.99
//!
//! // Arithmetic operations
//! let doubled = price * 2;            // $21.98
//! let total = price + Money::from_cents(500); // $15.99
//!
//! // Boundary conversion from a decimal amount (half-up to the cent)
//! assert_eq!(Money::from_amount(10.005).cents(), 1001);
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub, SubAssign};
use ts_rs::TS;

use crate::types::{DiscountRate, TaxRate};

// =============================================================================
// Numeric Coercion
// =============================================================================

/// Coerces a loosely-typed JSON value into a finite number.
///
/// ## Rules
/// - JSON numbers are used as-is
/// - Strings are trimmed and parsed (`" 12.5 "` → 12.5, `""` → 0)
/// - Booleans map to 1 / 0, null maps to 0
/// - Anything that does not yield a finite number returns `fallback`
///
/// Never fails: this is the only place raw client numbers enter the system.
///
/// ## Example
/// ```rust
/// use serde_json::json;
/// use tatylu_core::money::to_number;
///
/// assert_eq!(to_number(&json!("3"), 0.0), 3.0);
/// assert_eq!(to_number(&json!("abc"), 7.0), 7.0);
/// assert_eq!(to_number(&json!({"a": 1}), 1.5), 1.5);
/// ```
pub fn to_number(value: &Value, fallback: f64) -> f64 {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() {
                Some(0.0)
            } else {
                s.parse::<f64>().ok()
            }
        }
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        Value::Array(_) | Value::Object(_) => None,
    };

    match n {
        Some(n) if n.is_finite() => n,
        _ => fallback,
    }
}

/// Coerces an optional JSON value; a missing value yields `fallback`.
pub fn to_number_opt(value: Option<&Value>, fallback: f64) -> f64 {
    value.map_or(fallback, |v| to_number(v, fallback))
}

/// Rounds a decimal amount to 2 places, half-up on `value * 100`.
///
/// ## Example
/// ```rust
/// use tatylu_core::money::round_money;
///
/// assert_eq!(round_money(1.234), 1.23);
/// assert_eq!(round_money(0.125), 0.13);
/// assert_eq!(round_money(3.449), 3.45);
/// ```
pub fn round_money(value: f64) -> f64 {
    half_up(value * 100.0) / 100.0
}

/// Half-up rounding to the nearest integer (0.5 goes towards +infinity).
fn half_up(x: f64) -> f64 {
    (x + 0.5).floor()
}

/// Integer half-up division for non-negative numerators: `round(n / d)`.
#[inline]
pub(crate) fn div_half_up(numerator: i128, denominator: i128) -> i128 {
    if numerator >= 0 {
        (numerator + denominator / 2) / denominator
    } else {
        -((-numerator + denominator / 2 - 1) / denominator)
    }
}

// =============================================================================
// Money Type
// =============================================================================

/// Represents a monetary value in the smallest currency unit (cents for USD).
///
/// ## Design Decisions
/// - **i64 (signed)**: Allows negative intermediate values (discount larger
///   than subtotal) before the final clamp to zero
/// - **Single field tuple struct**: Zero-cost abstraction over i64
/// - **Serialized as cents**: every `*_cents` field in the API is a `Money`
///
/// ## Where Money is Used
/// ```text
/// ┌─────────────────────────────────────────────────────────────────────────┐
/// │  Product.price ──► apply_discount ──► OrderItem.unit_price              │
/// │                                          │                              │
/// │                                          ▼                              │
/// │                              OrderItem.line_total ──► subtotal          │
/// │                                                          │              │
/// │  subtotal ──► calculate_tax ──► taxes ──┐                │              │
/// │  shipping ──────────────────────────────┼──► total ◄─────┘              │
/// │  discount ──────────────────────────────┘                               │
/// └─────────────────────────────────────────────────────────────────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from cents (the smallest currency unit).
    ///
    /// ## Example
    /// ```rust
    /// use tatylu_core::money::Money;
    ///
    /// let price = Money::from_cents(1099); // Represents $10.99
    /// assert_eq!(price.cents(), 1099);
    /// ```
    #[inline]
    pub const fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    /// Creates a Money value from a decimal amount, rounding half-up to the
    /// cent (`round_money` semantics).
    ///
    /// Only used at the boundary: catalog prices, client fallback prices,
    /// shipping overrides and discount amounts arrive as decimals.
    ///
    /// ## Example
    /// ```rust
    /// use tatylu_core::money::Money;
    ///
    /// assert_eq!(Money::from_amount(10.0).cents(), 1000);
    /// assert_eq!(Money::from_amount(3.5).cents(), 350);
    /// assert_eq!(Money::from_amount(f64::NAN).cents(), 0);
    /// ```
    pub fn from_amount(amount: f64) -> Self {
        if !amount.is_finite() {
            return Money::zero();
        }
        Money(half_up(amount * 100.0) as i64)
    }

    /// Returns the value as a decimal amount (for display and JSON exports).
    #[inline]
    pub fn amount(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Returns the value in cents (smallest currency unit).
    #[inline]
    pub const fn cents(&self) -> i64 {
        self.0
    }

    /// Returns the major unit (dollars) portion.
    #[inline]
    pub const fn dollars(&self) -> i64 {
        self.0 / 100
    }

    /// Returns the minor unit (cents) portion (always 0-99).
    #[inline]
    pub const fn cents_part(&self) -> i64 {
        (self.0 % 100).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    /// Checks if the value is zero.
    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    /// Checks if the value is positive (greater than zero).
    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    /// Checks if the value is negative (less than zero).
    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Clamps negative values to zero.
    ///
    /// ## Example
    /// ```rust
    /// use tatylu_core::money::Money;
    ///
    /// assert_eq!(Money::from_cents(-250).non_negative(), Money::zero());
    /// assert_eq!(Money::from_cents(250).non_negative().cents(), 250);
    /// ```
    #[inline]
    pub fn non_negative(self) -> Self {
        Money(self.0.max(0))
    }

    /// Calculates tax, rounding half-up to the cent.
    ///
    /// ## Implementation
    /// Integer math: `(amount * bps + 5000) / 10000`
    ///
    /// ## Example
    /// ```rust
    /// use tatylu_core::money::Money;
    /// use tatylu_core::types::TaxRate;
    ///
    /// let subtotal = Money::from_cents(2300); // $23.00
    /// let rate = TaxRate::from_bps(1500);     // 15%
    /// assert_eq!(subtotal.calculate_tax(rate).cents(), 345);
    /// ```
    pub fn calculate_tax(&self, rate: TaxRate) -> Money {
        let tax_cents = div_half_up(self.0 as i128 * rate.bps() as i128, 10_000);
        Money::from_cents(tax_cents as i64)
    }

    /// Multiplies money by a quantity, `None` on overflow.
    ///
    /// ## Example
    /// ```rust
    /// use tatylu_core::money::Money;
    ///
    /// let unit_price = Money::from_cents(900);
    /// assert_eq!(unit_price.checked_multiply_quantity(2), Some(Money::from_cents(1800)));
    /// assert_eq!(Money::from_cents(i64::MAX).checked_multiply_quantity(2), None);
    /// ```
    #[inline]
    pub const fn checked_multiply_quantity(&self, qty: i64) -> Option<Self> {
        match self.0.checked_mul(qty) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Adds two amounts, `None` on overflow.
    #[inline]
    pub const fn checked_add(&self, other: Money) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(cents) => Some(Money(cents)),
            None => None,
        }
    }

    /// Sums amounts, `None` on overflow.
    pub fn checked_sum<I: IntoIterator<Item = Money>>(amounts: I) -> Option<Self> {
        amounts
            .into_iter()
            .try_fold(Money::zero(), |acc, m| acc.checked_add(m))
    }

    /// Returns the price left after a percentage discount, rounded half-up.
    ///
    /// `round2(price * (1 - pct / 100))` computed in integer basis points.
    ///
    /// ## Example
    /// ```rust
    /// use tatylu_core::money::Money;
    /// use tatylu_core::types::DiscountRate;
    ///
    /// let price = Money::from_cents(1000); // $10.00
    /// let after = price.apply_discount(DiscountRate::from_percentage(10.0));
    /// assert_eq!(after.cents(), 900);
    ///
    /// // $0.99 at 50% = $0.495 → $0.50 (half-up)
    /// let after = Money::from_cents(99).apply_discount(DiscountRate::from_percentage(50.0));
    /// assert_eq!(after.cents(), 50);
    /// ```
    pub fn apply_discount(&self, discount: DiscountRate) -> Money {
        let kept_bps = 10_000 - discount.bps() as i128;
        Money::from_cents(div_half_up(self.0 as i128 * kept_bps, 10_000) as i64)
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display implementation shows money in a human-readable format.
///
/// ## Note
/// This is for logs and email bodies. The frontend formats for display.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        write!(
            f,
            "{}${}.{:02}",
            sign,
            self.dollars().abs(),
            self.cents_part()
        )
    }
}

impl Default for Money {
    fn default() -> Self {
        Money::zero()
    }
}

impl Add for Money {
    type Output = Self;

    #[inline]
    fn add(self, other: Self) -> Self {
        Money(self.0.saturating_add(other.0))
    }
}

impl AddAssign for Money {
    #[inline]
    fn add_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_add(other.0);
    }
}

impl Sub for Money {
    type Output = Self;

    #[inline]
    fn sub(self, other: Self) -> Self {
        Money(self.0.saturating_sub(other.0))
    }
}

impl SubAssign for Money {
    #[inline]
    fn sub_assign(&mut self, other: Self) {
        self.0 = self.0.saturating_sub(other.0);
    }
}

/// Multiplication by i64 (for quantity calculations).
///
/// Operators saturate; pricing uses the `checked_*` methods and rejects
/// overflowing carts instead.
impl Mul<i64> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: i64) -> Self {
        Money(self.0.saturating_mul(qty))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), |acc, m| acc + m)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_from_cents() {
        let money = Money::from_cents(1099);
        assert_eq!(money.cents(), 1099);
        assert_eq!(money.dollars(), 10);
        assert_eq!(money.cents_part(), 99);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Money::from_cents(1099)), "$10.99");
        assert_eq!(format!("{}", Money::from_cents(500)), "$5.00");
        assert_eq!(format!("{}", Money::from_cents(-550)), "-$5.50");
        assert_eq!(format!("{}", Money::from_cents(0)), "$0.00");
    }

    #[test]
    fn test_arithmetic() {
        let a = Money::from_cents(1000);
        let b = Money::from_cents(500);

        assert_eq!((a + b).cents(), 1500);
        assert_eq!((a - b).cents(), 500);
        assert_eq!((a * 3).cents(), 3000);
        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total.cents(), 2000);
    }

    #[test]
    fn test_overflow_is_detected_not_wrapped() {
        let huge = Money::from_cents(i64::MAX / 2 + 1);

        assert_eq!(huge.checked_multiply_quantity(2), None);
        assert_eq!(huge.checked_add(huge), None);
        assert_eq!(Money::checked_sum(vec![huge, huge]), None);
        assert_eq!(
            Money::checked_sum(vec![Money::from_cents(1), Money::from_cents(2)]),
            Some(Money::from_cents(3))
        );

        // Operators saturate instead of panicking.
        assert_eq!((huge * 1_000_000).cents(), i64::MAX);
        assert_eq!((huge + huge).cents(), i64::MAX);
    }

    #[test]
    fn test_to_number_coercion() {
        assert_eq!(to_number(&json!(12.5), 0.0), 12.5);
        assert_eq!(to_number(&json!(" 4 "), 0.0), 4.0);
        assert_eq!(to_number(&json!(""), 9.0), 0.0);
        assert_eq!(to_number(&json!(null), 9.0), 0.0);
        assert_eq!(to_number(&json!(true), 9.0), 1.0);
        assert_eq!(to_number(&json!("1e400"), 2.0), 2.0);
        assert_eq!(to_number(&json!("NaN"), 2.0), 2.0);
        assert_eq!(to_number(&json!([1]), 3.0), 3.0);
        assert_eq!(to_number_opt(None, 5.0), 5.0);
    }

    #[test]
    fn test_round_money_half_up() {
        assert_eq!(round_money(1.234), 1.23);
        assert_eq!(round_money(1.235), 1.24);
        // 2.675 is stored as 2.67499999...
        assert_eq!(round_money(2.675), 2.67);
        assert_eq!(round_money(0.125), 0.13);
        assert_eq!(round_money(23.0 * 0.15), 3.45);
    }

    #[test]
    fn test_from_amount() {
        assert_eq!(Money::from_amount(3.5).cents(), 350);
        assert_eq!(Money::from_amount(0.1 + 0.2).cents(), 30);
        assert_eq!(Money::from_amount(19.999).cents(), 2000);
        assert_eq!(Money::from_amount(f64::INFINITY).cents(), 0);
        assert!((Money::from_cents(3095).amount() - 30.95).abs() < 1e-9);
    }

    #[test]
    fn test_tax_calculation_half_up() {
        // $10.00 at 8.25% = $0.825 → $0.83
        let tax = Money::from_cents(1000).calculate_tax(TaxRate::from_bps(825));
        assert_eq!(tax.cents(), 83);

        // $23.00 at 15% = $3.45
        let tax = Money::from_cents(2300).calculate_tax(TaxRate::from_bps(1500));
        assert_eq!(tax.cents(), 345);
    }

    #[test]
    fn test_apply_discount() {
        let price = Money::from_cents(1000);
        assert_eq!(price.apply_discount(DiscountRate::zero()).cents(), 1000);
        assert_eq!(price.apply_discount(DiscountRate::from_percentage(100.0)).cents(), 0);
        assert_eq!(price.apply_discount(DiscountRate::from_percentage(12.5)).cents(), 875);
        // $3.33 at 33% = 2.2311 → $2.23
        let odd = Money::from_cents(333).apply_discount(DiscountRate::from_percentage(33.0));
        assert_eq!(odd.cents(), 223);
    }

    #[test]
    fn test_non_negative_and_checks() {
        assert!(Money::zero().is_zero());
        assert!(Money::from_cents(-1).is_negative());
        assert!(Money::from_cents(1).is_positive());
        assert_eq!(Money::from_cents(-100).non_negative(), Money::zero());
    }

    #[test]
    fn test_div_half_up() {
        assert_eq!(div_half_up(5, 10), 1);
        assert_eq!(div_half_up(4, 10), 0);
        assert_eq!(div_half_up(15, 10), 2);
        assert_eq!(div_half_up(-15, 10), -1);
        assert_eq!(div_half_up(-16, 10), -2);
    }
}
