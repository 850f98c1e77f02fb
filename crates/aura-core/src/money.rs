//! # Money Module
//!
//! Provides the `Money` type for handling Naira amounts safely.
//!
//! ## Why Integer Money?
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  THE FLOATING POINT PROBLEM                                             │
//! │                                                                         │
//! │  In JavaScript/floating point:                                          │
//! │    0.1 + 0.2 = 0.30000000000000004  ❌ WRONG!                           │
//! │                                                                         │
//! │  OUR SOLUTION: Integer minor units (kobo)                               │
//! │    ₦4,500.50 is stored as 450050                                        │
//! │    The payment widget also takes minor units, so no conversion is      │
//! │    needed at the gateway boundary                                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Tolerant Input
//! Prices arrive from the API and from old cart snapshots either as JSON
//! numbers in major units (`4500`, `4500.5`) or as formatted strings
//! (`"₦4,500.00"`, `"NGN 4,500"`). Both decode to the same `Money`.
//!
//! ```rust
//! use aura_core::money::Money;
//!
//! assert_eq!(Money::parse("₦4,500.00").unwrap(), Money::from_major(4_500));
//! assert_eq!(Money::parse("NGN 4,500").unwrap(), Money::from_major(4_500));
//!
//! let from_number: Money = serde_json::from_str("4500").unwrap();
//! let from_text: Money = serde_json::from_str("\"₦4,500\"").unwrap();
//! assert_eq!(from_number, from_text);
//! ```

use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Mul, Sub};

use crate::error::{CoreError, CoreResult};

/// Currency symbol used for display.
pub const CURRENCY_SYMBOL: &str = "₦";

/// Minor units per major unit (kobo per naira).
const MINOR_PER_MAJOR: i64 = 100;

// =============================================================================
// Money Type
// =============================================================================

/// A monetary value in the smallest currency unit (kobo).
///
/// ## Serialization
/// Serialized as a plain decimal string in major units (`"4500.00"`), which
/// deserializes back losslessly and is accepted by the tolerant parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money(i64);

impl Money {
    /// Creates a Money value from minor units (kobo).
    ///
    /// ```rust
    /// use aura_core::money::Money;
    ///
    /// let price = Money::from_minor(450_050); // ₦4,500.50
    /// assert_eq!(price.minor(), 450_050);
    /// ```
    #[inline]
    pub const fn from_minor(minor: i64) -> Self {
        Money(minor)
    }

    /// Creates a Money value from whole naira.
    #[inline]
    pub const fn from_major(major: i64) -> Self {
        Money(major.saturating_mul(MINOR_PER_MAJOR))
    }

    /// Returns the value in minor units.
    #[inline]
    pub const fn minor(&self) -> i64 {
        self.0
    }

    /// Returns the whole-naira portion.
    #[inline]
    pub const fn major(&self) -> i64 {
        self.0 / MINOR_PER_MAJOR
    }

    /// Returns the kobo portion (always 0-99).
    #[inline]
    pub const fn minor_part(&self) -> i64 {
        (self.0 % MINOR_PER_MAJOR).abs()
    }

    /// Returns zero money value.
    #[inline]
    pub const fn zero() -> Self {
        Money(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub const fn is_positive(&self) -> bool {
        self.0 > 0
    }

    #[inline]
    pub const fn is_negative(&self) -> bool {
        self.0 < 0
    }

    /// Multiplies money by a line quantity, saturating at the `i64` bounds.
    ///
    /// ```rust
    /// use aura_core::money::Money;
    ///
    /// let unit_price = Money::from_major(4_500);
    /// assert_eq!(unit_price.multiply_quantity(3), Money::from_major(13_500));
    /// ```
    #[inline]
    pub const fn multiply_quantity(&self, qty: u32) -> Self {
        Money(self.0.saturating_mul(qty as i64))
    }

    /// Plain decimal rendering in major units (`"4500.50"`), used on the wire.
    pub fn to_decimal_string(&self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}{}.{:02}", sign, self.major().abs(), self.minor_part())
    }

    /// Parses a price given as a formatted string.
    ///
    /// ## Accepted Shapes
    /// ```text
    /// "4500"          → ₦4,500.00
    /// "4500.5"        → ₦4,500.50
    /// "₦4,500.00"     → ₦4,500.00
    /// "NGN 4,500"     → ₦4,500.00
    /// "4,500 NGN"     → ₦4,500.00
    /// "-₦1,500"       → -₦1,500.00
    /// "12abc34"       → error (not a single number)
    /// ```
    ///
    /// More than two decimals are rounded half-up to the nearest kobo.
    pub fn parse(input: &str) -> CoreResult<Money> {
        let invalid = |reason: &str| CoreError::InvalidPrice {
            input: input.to_string(),
            reason: reason.to_string(),
        };

        // Thousands separators and spacing carry no value.
        let compact: String = input
            .chars()
            .filter(|c| !c.is_whitespace() && *c != ',')
            .collect();

        let (negative, rest) = match compact.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, compact.as_str()),
        };

        // Currency prefix/suffix ("₦", "NGN", "N") wraps the number.
        let rest = rest.trim_start_matches(|c: char| !c.is_ascii_digit() && c != '.' && c != '-');
        let (negative, rest) = match rest.strip_prefix('-') {
            Some(inner) if !negative => (true, inner),
            Some(_) => return Err(invalid("duplicate sign")),
            None => (negative, rest),
        };
        let number = rest.trim_end_matches(|c: char| !c.is_ascii_digit());

        if number.is_empty() {
            return Err(invalid("no digits found"));
        }

        let (whole, fraction) = match number.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (number, ""),
        };

        if !whole.chars().all(|c| c.is_ascii_digit())
            || !fraction.chars().all(|c| c.is_ascii_digit())
        {
            return Err(invalid("not a single decimal number"));
        }
        if whole.is_empty() && fraction.is_empty() {
            return Err(invalid("no digits found"));
        }

        let overflow = || invalid("amount too large");

        let whole_value: i64 = if whole.is_empty() {
            0
        } else {
            whole.parse().map_err(|_| overflow())?
        };

        let digits: Vec<i64> = fraction
            .chars()
            .take(3)
            .map(|c| i64::from(c as u8 - b'0'))
            .collect();
        let tenths = digits.first().copied().unwrap_or(0);
        let hundredths = digits.get(1).copied().unwrap_or(0);
        let round_up = digits.get(2).is_some_and(|d| *d >= 5);

        let minor = whole_value
            .checked_mul(MINOR_PER_MAJOR)
            .and_then(|m| m.checked_add(tenths * 10 + hundredths + i64::from(round_up)))
            .ok_or_else(overflow)?;

        Ok(Money(if negative { -minor } else { minor }))
    }
}

// =============================================================================
// Trait Implementations
// =============================================================================

/// Display shows money the way the storefront renders it: `₦4,500.00`.
impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let digits = self.major().abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, c) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push(',');
            }
            grouped.push(c);
        }
        write!(
            f,
            "{}{}{}.{:02}",
            sign,
            CURRENCY_SYMBOL,
            grouped,
            self.minor_part()
        )
    }
}

impl std::str::FromStr for Money {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Money::parse(s)
    }
}

// Arithmetic saturates at the i64 bounds. Prices come off the network, so a
// total must never wrap negative.
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

impl Mul<u32> for Money {
    type Output = Self;

    #[inline]
    fn mul(self, qty: u32) -> Self {
        self.multiply_quantity(qty)
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Self {
        iter.fold(Money::zero(), Add::add)
    }
}

// =============================================================================
// Serde
// =============================================================================

impl Serialize for Money {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_decimal_string())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        deserializer.deserialize_any(MoneyVisitor)
    }
}

/// Accepts a JSON number in major units or a formatted price string.
struct MoneyVisitor;

impl<'de> Visitor<'de> for MoneyVisitor {
    type Value = Money;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a price as a number or a currency-formatted string")
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<Money, E> {
        v.checked_mul(MINOR_PER_MAJOR)
            .map(Money)
            .ok_or_else(|| E::custom("price too large"))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<Money, E> {
        let v = i64::try_from(v).map_err(|_| E::custom("price too large"))?;
        self.visit_i64(v)
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<Money, E> {
        if !v.is_finite() {
            return Err(E::custom("price must be finite"));
        }
        // Route through the decimal parser so 0.1 + 0.2 style noise never
        // leaks into kobo arithmetic.
        Money::parse(&v.to_string()).map_err(E::custom)
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<Money, E> {
        Money::parse(v).map_err(E::custom)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_minor_and_major() {
        let money = Money::from_minor(450_050);
        assert_eq!(money.major(), 4_500);
        assert_eq!(money.minor_part(), 50);
        assert_eq!(Money::from_major(15).minor(), 1_500);
    }

    #[test]
    fn test_display_groups_thousands() {
        assert_eq!(Money::from_major(4_500).to_string(), "₦4,500.00");
        assert_eq!(Money::from_minor(123_456_789).to_string(), "₦1,234,567.89");
        assert_eq!(Money::from_minor(99).to_string(), "₦0.99");
        assert_eq!(Money::from_major(-1_500).to_string(), "-₦1,500.00");
        assert_eq!(Money::zero().to_string(), "₦0.00");
    }

    #[test]
    fn test_parse_formatted_strings() {
        assert_eq!(Money::parse("4500").unwrap(), Money::from_major(4_500));
        assert_eq!(Money::parse("4500.5").unwrap(), Money::from_minor(450_050));
        assert_eq!(Money::parse("₦4,500.00").unwrap(), Money::from_major(4_500));
        assert_eq!(Money::parse(" NGN 4,500 ").unwrap(), Money::from_major(4_500));
        assert_eq!(Money::parse("4,500 NGN").unwrap(), Money::from_major(4_500));
        assert_eq!(Money::parse("-₦1,500").unwrap(), Money::from_major(-1_500));
        assert_eq!(Money::parse("₦-1,500").unwrap(), Money::from_major(-1_500));
        assert_eq!(Money::parse(".75").unwrap(), Money::from_minor(75));
    }

    #[test]
    fn test_parse_rounds_third_decimal() {
        assert_eq!(Money::parse("10.005").unwrap(), Money::from_minor(1_001));
        assert_eq!(Money::parse("10.004").unwrap(), Money::from_minor(1_000));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Money::parse("").is_err());
        assert!(Money::parse("₦").is_err());
        assert!(Money::parse("12abc34").is_err());
        assert!(Money::parse("1.2.3").is_err());
        assert!(Money::parse("--5").is_err());
        assert!(Money::parse("99999999999999999999").is_err());
    }

    #[test]
    fn test_deserialize_number_or_string() {
        let values: Vec<Money> =
            serde_json::from_str(r#"[4500, 4500.5, "₦4,500.50", "4500.50"]"#).unwrap();
        assert_eq!(values[0], Money::from_major(4_500));
        assert_eq!(values[1], Money::from_minor(450_050));
        assert_eq!(values[2], values[1]);
        assert_eq!(values[3], values[1]);
    }

    #[test]
    fn test_serialized_form_reads_back() {
        let price = Money::from_minor(450_050);
        let json = serde_json::to_string(&price).unwrap();
        assert_eq!(json, "\"4500.50\"");
        let back: Money = serde_json::from_str(&json).unwrap();
        assert_eq!(back, price);
    }

    #[test]
    fn test_arithmetic_and_sum() {
        let a = Money::from_major(1_000);
        let b = Money::from_major(500);
        assert_eq!(a + b, Money::from_major(1_500));
        assert_eq!(a - b, Money::from_major(500));
        assert_eq!(b * 3, Money::from_major(1_500));

        let total: Money = vec![a, b, b].into_iter().sum();
        assert_eq!(total, Money::from_major(2_000));
    }

    #[test]
    fn test_huge_prices_saturate() {
        let huge = Money::parse("92233720368547758").unwrap();
        assert_eq!(huge.multiply_quantity(2), Money::from_minor(i64::MAX));
        assert_eq!(huge + huge, Money::from_minor(i64::MAX));

        let total: Money = vec![huge, huge, Money::from_major(1)].into_iter().sum();
        assert_eq!(total, Money::from_minor(i64::MAX));
        assert_eq!(Money::from_minor(i64::MIN) - Money::from_minor(1), Money::from_minor(i64::MIN));
    }
}
