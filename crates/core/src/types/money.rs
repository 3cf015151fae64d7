//! Fixed-point money amounts.
//!
//! All storefront arithmetic happens in [`Money`]: a `Decimal` that is
//! always held at two decimal places, rounded half-up. Rounding happens on
//! construction and after multiplication, so every call site agrees on the
//! same total.

use core::fmt;
use core::iter::Sum;
use core::ops::{Add, AddAssign, Mul, Sub};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Number of decimal places kept for every amount.
pub const MONEY_SCALE: u32 = 2;

/// Errors that can occur when building a [`Money`] from untrusted input.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The amount is below zero.
    #[error("amount cannot be negative")]
    Negative,
    /// The input is not a decimal number.
    #[error("invalid amount: {0}")]
    Invalid(String),
}

/// A currency amount (rupiah in practice).
///
/// ## Examples
///
/// ```
/// use loka_core::Money;
/// use rust_decimal::Decimal;
///
/// let price = Money::from_major(100_000);
/// assert_eq!(price * 2, Money::from_major(200_000));
/// assert_eq!(Money::new(Decimal::new(1005, 3)).amount(), Decimal::new(101, 2));
/// ```
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create an amount, rounding half-up to two decimal places.
    #[must_use]
    pub fn new(amount: Decimal) -> Self {
        Self(round(amount))
    }

    /// Create an amount from whole currency units.
    #[must_use]
    pub fn from_major(units: i64) -> Self {
        Self::new(Decimal::from(units))
    }

    /// Parse a non-negative amount from user or config input.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a number or is negative.
    pub fn parse_non_negative(s: &str) -> Result<Self, MoneyError> {
        let amount: Decimal = s
            .trim()
            .parse()
            .map_err(|_| MoneyError::Invalid(s.to_owned()))?;
        if amount.is_sign_negative() && !amount.is_zero() {
            return Err(MoneyError::Negative);
        }
        Ok(Self::new(amount))
    }

    /// The underlying decimal.
    #[must_use]
    pub const fn amount(&self) -> Decimal {
        self.0
    }

    /// Whether the amount is strictly greater than zero.
    #[must_use]
    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }

    /// Multiply by a rate (e.g. a tax rate) and round the result.
    #[must_use]
    pub fn apply_rate(self, rate: Decimal) -> Self {
        Self::new(self.0 * rate)
    }

    /// Amount in whole units, rounded half-up.
    ///
    /// Payment gateways for IDR reject fractional amounts.
    #[must_use]
    pub fn whole_units(&self) -> i64 {
        use rust_decimal::prelude::ToPrimitive;

        self.0
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .unwrap_or(i64::MAX)
    }

    /// Format as rupiah with thousands separators, e.g. `Rp 290.000`.
    #[must_use]
    pub fn display_idr(&self) -> String {
        let units = self.whole_units();
        let digits = units.unsigned_abs().to_string();
        let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
        for (i, ch) in digits.chars().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push('.');
            }
            grouped.push(ch);
        }
        if units < 0 {
            format!("-Rp {grouped}")
        } else {
            format!("Rp {grouped}")
        }
    }
}

fn round(amount: Decimal) -> Decimal {
    let mut rounded =
        amount.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(MONEY_SCALE);
    rounded
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Decimal> for Money {
    fn from(amount: Decimal) -> Self {
        Self::new(amount)
    }
}

impl From<Money> for Decimal {
    fn from(money: Money) -> Self {
        money.0
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self::new(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl Sub for Money {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self::new(self.0 - rhs.0)
    }
}

impl Mul<u32> for Money {
    type Output = Self;

    fn mul(self, quantity: u32) -> Self {
        Self::new(self.0 * Decimal::from(quantity))
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, Add::add)
    }
}

// Stored as NUMERIC(12, 2)
#[cfg(feature = "postgres")]
impl sqlx::Type<sqlx::Postgres> for Money {
    fn type_info() -> sqlx::postgres::PgTypeInfo {
        <Decimal as sqlx::Type<sqlx::Postgres>>::type_info()
    }

    fn compatible(ty: &sqlx::postgres::PgTypeInfo) -> bool {
        <Decimal as sqlx::Type<sqlx::Postgres>>::compatible(ty)
    }
}

#[cfg(feature = "postgres")]
impl<'r> sqlx::Decode<'r, sqlx::Postgres> for Money {
    fn decode(value: sqlx::postgres::PgValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<sqlx::Postgres>>::decode(value)?;
        Ok(Self::new(amount))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_rounds_half_up() {
        assert_eq!(Money::new(Decimal::new(12_345, 3)).amount(), Decimal::new(1235, 2));
        assert_eq!(Money::new(Decimal::new(12_344, 3)).amount(), Decimal::new(1234, 2));
    }

    #[test]
    fn test_apply_rate_rounds_result() {
        let rate = Decimal::new(10, 2);
        assert_eq!(Money::new(Decimal::new(1005, 2)).apply_rate(rate), Money::new(Decimal::new(101, 2)));
        assert_eq!(Money::from_major(250_000).apply_rate(rate), Money::from_major(25_000));
    }

    #[test]
    fn test_sum_and_mul() {
        let total: Money = [Money::from_major(100_000) * 2, Money::from_major(50_000)]
            .into_iter()
            .sum();
        assert_eq!(total, Money::from_major(250_000));
    }

    #[test]
    fn test_parse_non_negative() {
        assert_eq!(Money::parse_non_negative(" 15000 ").unwrap(), Money::from_major(15_000));
        assert_eq!(Money::parse_non_negative("-1"), Err(MoneyError::Negative));
        assert!(matches!(Money::parse_non_negative("abc"), Err(MoneyError::Invalid(_))));
    }

    #[test]
    fn test_display_idr() {
        assert_eq!(Money::from_major(290_000).display_idr(), "Rp 290.000");
        assert_eq!(Money::from_major(999).display_idr(), "Rp 999");
        assert_eq!(Money::from_major(1_250_000).display_idr(), "Rp 1.250.000");
        assert_eq!(Money::ZERO.display_idr(), "Rp 0");
    }

    #[test]
    fn test_serializes_as_string() {
        let json = serde_json::to_string(&Money::from_major(15_000)).unwrap();
        assert_eq!(json, "\"15000.00\"");
    }
}
