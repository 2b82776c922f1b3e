//! Value Objects for the storefront

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use thiserror::Error;

/// Amount in the store currency.
///
/// The store trades in a single currency (configured once at startup), so
/// the value object only carries the decimal amount.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Money = Money(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self { Self(amount) }
    pub fn from_major(units: i64) -> Self { Self(Decimal::from(units)) }
    pub fn amount(&self) -> Decimal { self.0 }
    pub fn is_zero(&self) -> bool { self.0.is_zero() }
    pub fn is_positive(&self) -> bool { self.0 > Decimal::ZERO }

    pub fn multiply(&self, qty: u32) -> Money { Money(self.0 * Decimal::from(qty)) }

    /// `pct` percent of this amount, rounded to cents.
    pub fn percent(&self, pct: Decimal) -> Money {
        Money(self.0 * pct / Decimal::ONE_HUNDRED).round_cents()
    }

    /// This amount reduced by `pct` percent, rounded to cents.
    pub fn less_percent(&self, pct: Decimal) -> Money {
        Money(self.0 * (Decimal::ONE_HUNDRED - pct) / Decimal::ONE_HUNDRED).round_cents()
    }

    pub fn round_cents(&self) -> Money {
        Money(self.0.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero))
    }

    /// Whole currency units, halves rounded away from zero.
    pub fn round_whole(&self) -> Money {
        Money(self.0.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero))
    }

    pub fn floor_zero(&self) -> Money { Money(self.0.max(Decimal::ZERO)) }

    /// Amount in minor units (cents/paise), as payment gateways expect it.
    pub fn minor_units(&self) -> Option<i64> {
        (self.0 * Decimal::ONE_HUNDRED).round().to_i64()
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{:.2}", self.0) }
}

impl Add for Money { type Output = Money; fn add(self, rhs: Money) -> Money { Money(self.0 + rhs.0) } }
impl Sub for Money { type Output = Money; fn sub(self, rhs: Money) -> Money { Money(self.0 - rhs.0) } }
impl AddAssign for Money { fn add_assign(&mut self, rhs: Money) { self.0 += rhs.0; } }
impl SubAssign for Money { fn sub_assign(&mut self, rhs: Money) { self.0 -= rhs.0; } }

impl Sum for Money {
    fn sum<I: Iterator<Item = Money>>(iter: I) -> Money { iter.fold(Money::ZERO, |acc, m| acc + m) }
}

impl<'a> Sum<&'a Money> for Money {
    fn sum<I: Iterator<Item = &'a Money>>(iter: I) -> Money { iter.fold(Money::ZERO, |acc, m| acc + *m) }
}

/// Coupon code value object
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct CouponCode(String);

impl CouponCode {
    pub fn new(value: impl Into<String>) -> Result<Self, CouponCodeError> {
        let value = value.into().trim().to_uppercase();
        if value.len() < 4 { return Err(CouponCodeError::TooShort); }
        if value.len() > 20 { return Err(CouponCodeError::TooLong); }
        if !value.chars().all(|c| c.is_ascii_alphanumeric()) { return Err(CouponCodeError::InvalidCharacter); }
        Ok(Self(value))
    }
    pub fn as_str(&self) -> &str { &self.0 }
}

impl fmt::Display for CouponCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "{}", self.0) }
}

impl TryFrom<String> for CouponCode {
    type Error = CouponCodeError;
    fn try_from(value: String) -> Result<Self, Self::Error> { Self::new(value) }
}

impl From<CouponCode> for String {
    fn from(code: CouponCode) -> Self { code.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponCodeError {
    #[error("coupon code must be at least 4 characters")]
    TooShort,
    #[error("coupon code must be at most 20 characters")]
    TooLong,
    #[error("coupon code may only contain letters and digits")]
    InvalidCharacter,
}

/// Quantity of a single product in a cart line
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Quantity(u32);

impl Quantity {
    /// A quantity of at least one and at most `max`.
    pub fn bounded(value: u32, max: u32) -> Result<Self, QuantityError> {
        if value == 0 { return Err(QuantityError::Zero); }
        if value > max { return Err(QuantityError::AboveLimit(max)); }
        Ok(Self(value))
    }
    pub fn value(&self) -> u32 { self.0 }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QuantityError {
    #[error("quantity must be at least 1")]
    Zero,
    #[error("quantity may not exceed {0} per product")]
    AboveLimit(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coupon_code_normalised() {
        let code = CouponCode::new(" save10 ").unwrap();
        assert_eq!(code.as_str(), "SAVE10");
        assert_eq!(CouponCode::new("AB"), Err(CouponCodeError::TooShort));
        assert_eq!(CouponCode::new("SAVE-10"), Err(CouponCodeError::InvalidCharacter));
    }

    #[test]
    fn test_money_rounding() {
        assert_eq!(Money::new(Decimal::new(2550, 2)).round_whole(), Money::from_major(26));
        assert_eq!(Money::new(Decimal::new(2549, 2)).round_whole(), Money::from_major(25));
        assert_eq!(Money::new(Decimal::new(-500, 2)).floor_zero(), Money::ZERO);
        assert_eq!(Money::from_major(999).less_percent(Decimal::from(10)), Money::new(Decimal::new(89910, 2)));
    }

    #[test]
    fn test_money_sum_and_minor_units() {
        let total: Money = [Money::from_major(10), Money::new(Decimal::new(505, 2))].iter().sum();
        assert_eq!(total, Money::new(Decimal::new(1505, 2)));
        assert_eq!(total.minor_units(), Some(1505));
        assert_eq!(total.to_string(), "15.05");
    }

    #[test]
    fn test_quantity_bounds() {
        assert_eq!(Quantity::bounded(0, 5), Err(QuantityError::Zero));
        assert_eq!(Quantity::bounded(6, 5), Err(QuantityError::AboveLimit(5)));
        assert_eq!(Quantity::bounded(5, 5).unwrap().value(), 5);
    }
}
