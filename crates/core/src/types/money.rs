//! Fixed-point monetary amounts.
//!
//! Balances, prices and charge amounts are all BRL and all fixed-point:
//! floating point would accumulate rounding drift across credits and
//! refunds. [`Money`] wraps [`rust_decimal::Decimal`] normalised to two
//! fractional digits.

use core::fmt;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Errors that can occur when parsing or combining [`Money`] values.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MoneyError {
    /// The input string is not a decimal number.
    #[error("not a valid amount: {0:?}")]
    Invalid(String),
    /// The amount is negative where a non-negative amount is required.
    #[error("amount must not be negative")]
    Negative,
    /// Arithmetic overflowed the decimal range.
    #[error("amount out of range")]
    Overflow,
}

/// A non-negative BRL amount with two fractional digits.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    /// Zero amount.
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Create an amount from a decimal value.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] if the value is below zero.
    pub fn new(amount: Decimal) -> Result<Self, MoneyError> {
        if amount.is_sign_negative() {
            return Err(MoneyError::Negative);
        }
        Ok(Self(amount.round_dp(2)))
    }

    /// Create an amount from a whole number of centavos.
    #[must_use]
    pub fn from_cents(cents: u64) -> Self {
        #[allow(clippy::cast_possible_wrap)] // u64 centavos fit i64 for any real balance
        Self(Decimal::new(cents as i64, 2))
    }

    /// Parse user-typed input, accepting either `.` or `,` as the decimal
    /// separator (`"3,50"` and `"3.50"` are the same amount).
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Invalid`] for non-numeric input and
    /// [`MoneyError::Negative`] for negative amounts.
    pub fn parse_user_input(input: &str) -> Result<Self, MoneyError> {
        let normalised = input.trim().replace(',', ".");
        let amount = normalised
            .parse::<Decimal>()
            .map_err(|_| MoneyError::Invalid(input.to_owned()))?;
        Self::new(amount)
    }

    /// Get the underlying decimal value.
    #[must_use]
    pub const fn as_decimal(&self) -> Decimal {
        self.0
    }

    /// Multiply a unit price by a purchase quantity.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the product leaves the decimal range.
    pub fn times(&self, quantity: u32) -> Result<Self, MoneyError> {
        self.0
            .checked_mul(Decimal::from(quantity))
            .map(|total| Self(total.round_dp(2)))
            .ok_or(MoneyError::Overflow)
    }

    /// Checked addition.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Overflow`] if the sum leaves the decimal range.
    pub fn checked_add(&self, other: Self) -> Result<Self, MoneyError> {
        self.0
            .checked_add(other.0)
            .map(Self)
            .ok_or(MoneyError::Overflow)
    }

    /// Checked subtraction; fails rather than going negative.
    ///
    /// # Errors
    ///
    /// Returns [`MoneyError::Negative`] if `other` exceeds `self`.
    pub fn checked_sub(&self, other: Self) -> Result<Self, MoneyError> {
        if other.0 > self.0 {
            return Err(MoneyError::Negative);
        }
        Ok(Self(self.0 - other.0))
    }

    /// Whether this amount is exactly zero.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R${:.2}", self.0)
    }
}

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
    fn decode(
        value: sqlx::postgres::PgValueRef<'r>,
    ) -> Result<Self, sqlx::error::BoxDynError> {
        let amount = <Decimal as sqlx::Decode<'r, sqlx::Postgres>>::decode(value)?;
        Ok(Self(amount.round_dp(2)))
    }
}

#[cfg(feature = "postgres")]
impl sqlx::Encode<'_, sqlx::Postgres> for Money {
    fn encode_by_ref(
        &self,
        buf: &mut sqlx::postgres::PgArgumentBuffer,
    ) -> Result<sqlx::encode::IsNull, sqlx::error::BoxDynError> {
        <Decimal as sqlx::Encode<'_, sqlx::Postgres>>::encode_by_ref(&self.0, buf)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_from_cents() {
        assert_eq!(Money::from_cents(70).to_string(), "R$0.70");
        assert_eq!(Money::from_cents(1400).to_string(), "R$14.00");
    }

    #[test]
    fn test_parse_comma_decimal() {
        let a = Money::parse_user_input("3,50").unwrap();
        let b = Money::parse_user_input("3.50").unwrap();
        assert_eq!(a, b);
        assert_eq!(a, Money::from_cents(350));
    }

    #[test]
    fn test_parse_rejects_garbage_and_negatives() {
        assert!(matches!(
            Money::parse_user_input("abc"),
            Err(MoneyError::Invalid(_))
        ));
        assert_eq!(Money::parse_user_input("-1"), Err(MoneyError::Negative));
    }

    #[test]
    fn test_times_quantity() {
        let price = Money::from_cents(70);
        assert_eq!(price.times(20).unwrap(), Money::from_cents(1400));
        assert_eq!(price.times(5).unwrap(), Money::from_cents(350));
    }

    #[test]
    fn test_checked_sub_refuses_underflow() {
        let ten = Money::from_cents(1000);
        let fourteen = Money::from_cents(1400);
        assert_eq!(ten.checked_sub(fourteen), Err(MoneyError::Negative));
        assert_eq!(fourteen.checked_sub(ten).unwrap(), Money::from_cents(400));
    }

    #[test]
    fn test_debit_refund_round_trip_is_exact() {
        let balance = Money::from_cents(1000);
        let total = Money::from_cents(350);
        let after = balance.checked_sub(total).unwrap().checked_add(total).unwrap();
        assert_eq!(after, balance);
    }
}
