//! Coupon Aggregate

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use crate::domain::value_objects::{CouponCode, Money};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CouponDiscount {
    Percent { percent: Decimal, max_discount: Option<Money> },
    Fixed { amount: Money },
}

impl CouponDiscount {
    pub fn kind(&self) -> &'static str {
        match self { Self::Percent { .. } => "percent", Self::Fixed { .. } => "fixed" }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Coupon {
    pub id: Uuid,
    pub code: CouponCode,
    pub description: Option<String>,
    pub discount: CouponDiscount,
    pub min_purchase: Money,
    /// Total redemptions allowed across all customers; `None` is unlimited.
    pub usage_limit: Option<u32>,
    pub per_user_limit: u32,
    pub times_used: u32,
    pub expires_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct CouponTerms {
    pub code: CouponCode,
    pub description: Option<String>,
    pub discount: CouponDiscount,
    pub min_purchase: Money,
    pub usage_limit: Option<u32>,
    pub per_user_limit: u32,
    pub expires_at: DateTime<Utc>,
}

impl CouponTerms {
    fn validated(self) -> Result<Self, CouponError> {
        match self.discount {
            CouponDiscount::Percent { percent, max_discount } => {
                if percent <= Decimal::ZERO || percent > Decimal::ONE_HUNDRED { return Err(CouponError::InvalidDiscount); }
                if max_discount.is_some_and(|m| !m.is_positive()) { return Err(CouponError::InvalidDiscount); }
            }
            CouponDiscount::Fixed { amount } => {
                if !amount.is_positive() { return Err(CouponError::InvalidDiscount); }
            }
        }
        if self.min_purchase < Money::ZERO { return Err(CouponError::InvalidDiscount); }
        if self.per_user_limit == 0 { return Err(CouponError::InvalidLimit); }
        if self.usage_limit == Some(0) { return Err(CouponError::InvalidLimit); }
        Ok(self)
    }
}

impl Coupon {
    pub fn create(terms: CouponTerms) -> Result<Self, CouponError> {
        let t = terms.validated()?;
        Ok(Self {
            id: Uuid::now_v7(), code: t.code, description: t.description, discount: t.discount,
            min_purchase: t.min_purchase, usage_limit: t.usage_limit, per_user_limit: t.per_user_limit,
            times_used: 0, expires_at: t.expires_at, is_active: true, created_at: Utc::now(),
        })
    }

    pub fn amend(&mut self, terms: CouponTerms) -> Result<(), CouponError> {
        let t = terms.validated()?;
        self.code = t.code;
        self.description = t.description;
        self.discount = t.discount;
        self.min_purchase = t.min_purchase;
        self.usage_limit = t.usage_limit;
        self.per_user_limit = t.per_user_limit;
        self.expires_at = t.expires_at;
        Ok(())
    }

    /// Checks every redemption rule and returns the discount `cart_total` earns.
    pub fn evaluate(&self, cart_total: Money, uses_by_user: u32, now: DateTime<Utc>) -> Result<Money, CouponError> {
        if !self.is_active { return Err(CouponError::Inactive); }
        if now >= self.expires_at { return Err(CouponError::Expired); }
        if cart_total < self.min_purchase { return Err(CouponError::BelowMinimum(self.min_purchase)); }
        if self.usage_limit.is_some_and(|limit| self.times_used >= limit) { return Err(CouponError::Exhausted); }
        if uses_by_user >= self.per_user_limit { return Err(CouponError::AlreadyUsed); }
        Ok(self.discount_for(cart_total))
    }

    pub fn discount_for(&self, cart_total: Money) -> Money {
        let raw = match self.discount {
            CouponDiscount::Percent { percent, max_discount } => {
                let d = cart_total.percent(percent);
                max_discount.map_or(d, |cap| d.min(cap))
            }
            CouponDiscount::Fixed { amount } => amount,
        };
        raw.min(cart_total).floor_zero().round_cents()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CouponError {
    #[error("coupon not found")]
    NotFound,
    #[error("coupon is not active")]
    Inactive,
    #[error("coupon has expired")]
    Expired,
    #[error("a minimum purchase of {0} is required for this coupon")]
    BelowMinimum(Money),
    #[error("coupon usage limit has been reached")]
    Exhausted,
    #[error("you have already used this coupon")]
    AlreadyUsed,
    #[error("invalid coupon discount")]
    InvalidDiscount,
    #[error("usage limits must be at least 1")]
    InvalidLimit,
    #[error("coupon code {0} already exists")]
    DuplicateCode(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn coupon(discount: CouponDiscount) -> Coupon {
        Coupon::create(CouponTerms {
            code: CouponCode::new("WELCOME").unwrap(), description: None, discount,
            min_purchase: Money::from_major(500), usage_limit: Some(2), per_user_limit: 1,
            expires_at: Utc::now() + Duration::days(10),
        }).unwrap()
    }

    #[test]
    fn test_percent_discount_is_capped() {
        let c = coupon(CouponDiscount::Percent { percent: Decimal::from(10), max_discount: Some(Money::from_major(150)) });
        let now = Utc::now();
        assert_eq!(c.evaluate(Money::from_major(1000), 0, now), Ok(Money::from_major(100)));
        assert_eq!(c.evaluate(Money::from_major(5000), 0, now), Ok(Money::from_major(150)));
    }

    #[test]
    fn test_fixed_discount_never_exceeds_total() {
        let mut c = coupon(CouponDiscount::Fixed { amount: Money::from_major(800) });
        c.min_purchase = Money::ZERO;
        assert_eq!(c.discount_for(Money::from_major(600)), Money::from_major(600));
    }

    #[test]
    fn test_redemption_rules() {
        let now = Utc::now();
        let mut c = coupon(CouponDiscount::Fixed { amount: Money::from_major(50) });
        assert_eq!(c.evaluate(Money::from_major(499), 0, now), Err(CouponError::BelowMinimum(Money::from_major(500))));
        assert_eq!(c.evaluate(Money::from_major(600), 1, now), Err(CouponError::AlreadyUsed));
        assert_eq!(c.evaluate(Money::from_major(600), 0, now + Duration::days(11)), Err(CouponError::Expired));
        c.times_used = 2;
        assert_eq!(c.evaluate(Money::from_major(600), 0, now), Err(CouponError::Exhausted));
        c.times_used = 0;
        c.is_active = false;
        assert_eq!(c.evaluate(Money::from_major(600), 0, now), Err(CouponError::Inactive));
    }

    #[test]
    fn test_terms_validation() {
        let terms = CouponTerms {
            code: CouponCode::new("BROKEN").unwrap(), description: None,
            discount: CouponDiscount::Percent { percent: Decimal::from(120), max_discount: None },
            min_purchase: Money::ZERO, usage_limit: None, per_user_limit: 1, expires_at: Utc::now(),
        };
        assert_eq!(Coupon::create(terms.clone()).unwrap_err(), CouponError::InvalidDiscount);
        let terms = CouponTerms { discount: CouponDiscount::Fixed { amount: Money::from_major(5) }, per_user_limit: 0, ..terms };
        assert_eq!(Coupon::create(terms).unwrap_err(), CouponError::InvalidLimit);
    }
}
