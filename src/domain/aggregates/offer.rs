//! Offer Aggregate
//!
//! Offers are time-bounded percentage discounts on a product or on every
//! product of a category. When several offers apply, the customer gets the
//! largest one; offers never stack.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;
use crate::domain::value_objects::Money;

/// Largest percentage an offer may take off a price.
pub const MAX_OFFER_PERCENT: u32 = 90;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum OfferTarget {
    Product(Uuid),
    Category(Uuid),
}

impl OfferTarget {
    pub fn kind(&self) -> &'static str {
        match self { Self::Product(_) => "product", Self::Category(_) => "category" }
    }
    pub fn id(&self) -> Uuid {
        match self { Self::Product(id) | Self::Category(id) => *id }
    }
    pub fn from_parts(kind: &str, id: Uuid) -> Option<Self> {
        match kind { "product" => Some(Self::Product(id)), "category" => Some(Self::Category(id)), _ => None }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct Offer {
    pub id: Uuid,
    pub name: String,
    pub target: OfferTarget,
    pub discount_percent: Decimal,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Clone, Debug)]
pub struct OfferTerms {
    pub name: String,
    pub target: OfferTarget,
    pub discount_percent: Decimal,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl OfferTerms {
    fn validated(mut self) -> Result<Self, OfferError> {
        self.name = self.name.trim().to_string();
        if self.name.is_empty() { return Err(OfferError::MissingName); }
        if self.discount_percent <= Decimal::ZERO || self.discount_percent > Decimal::from(MAX_OFFER_PERCENT) {
            return Err(OfferError::InvalidPercent);
        }
        if self.ends_at <= self.starts_at { return Err(OfferError::InvalidWindow); }
        Ok(self)
    }
}

impl Offer {
    pub fn create(terms: OfferTerms) -> Result<Self, OfferError> {
        let t = terms.validated()?;
        Ok(Self {
            id: Uuid::now_v7(), name: t.name, target: t.target, discount_percent: t.discount_percent,
            starts_at: t.starts_at, ends_at: t.ends_at, is_active: true, created_at: Utc::now(),
        })
    }

    pub fn amend(&mut self, terms: OfferTerms) -> Result<(), OfferError> {
        let t = terms.validated()?;
        self.name = t.name;
        self.target = t.target;
        self.discount_percent = t.discount_percent;
        self.starts_at = t.starts_at;
        self.ends_at = t.ends_at;
        Ok(())
    }

    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.is_active && self.starts_at <= now && now < self.ends_at
    }

    pub fn applies_to(&self, product_id: Uuid, category_id: Uuid) -> bool {
        match self.target {
            OfferTarget::Product(id) => id == product_id,
            OfferTarget::Category(id) => id == category_id,
        }
    }
}

/// Best live discount percentage for a product, zero when no offer applies.
pub fn best_discount(offers: &[Offer], product_id: Uuid, category_id: Uuid, now: DateTime<Utc>) -> Decimal {
    offers
        .iter()
        .filter(|o| o.is_live(now) && o.applies_to(product_id, category_id))
        .map(|o| o.discount_percent)
        .max()
        .unwrap_or(Decimal::ZERO)
}

pub fn offer_price(price: Money, discount_percent: Decimal) -> Money {
    if discount_percent.is_zero() { price } else { price.less_percent(discount_percent) }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OfferError {
    #[error("offer name is required")]
    MissingName,
    #[error("discount must be between 0 and 90 percent")]
    InvalidPercent,
    #[error("offer must end after it starts")]
    InvalidWindow,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn offer(target: OfferTarget, pct: i64, now: DateTime<Utc>) -> Offer {
        Offer::create(OfferTerms {
            name: "Festive".into(), target, discount_percent: Decimal::from(pct),
            starts_at: now - Duration::days(1), ends_at: now + Duration::days(1),
        }).unwrap()
    }

    #[test]
    fn test_best_discount_takes_largest_live_offer() {
        let now = Utc::now();
        let (product, category) = (Uuid::new_v4(), Uuid::new_v4());
        let mut expired = offer(OfferTarget::Product(product), 50, now);
        expired.ends_at = now - Duration::hours(1);
        let offers = vec![
            offer(OfferTarget::Product(product), 10, now),
            offer(OfferTarget::Category(category), 25, now),
            offer(OfferTarget::Product(Uuid::new_v4()), 60, now),
            expired,
        ];
        assert_eq!(best_discount(&offers, product, category, now), Decimal::from(25));
        assert_eq!(best_discount(&offers, product, Uuid::new_v4(), now), Decimal::from(10));
        assert_eq!(best_discount(&[], product, category, now), Decimal::ZERO);
    }

    #[test]
    fn test_inactive_offer_is_ignored() {
        let now = Utc::now();
        let product = Uuid::new_v4();
        let mut o = offer(OfferTarget::Product(product), 30, now);
        o.is_active = false;
        assert_eq!(best_discount(&[o], product, Uuid::nil(), now), Decimal::ZERO);
    }

    #[test]
    fn test_offer_validation() {
        let now = Utc::now();
        let terms = OfferTerms { name: "x".into(), target: OfferTarget::Category(Uuid::nil()), discount_percent: Decimal::from(95), starts_at: now, ends_at: now + Duration::days(1) };
        assert_eq!(Offer::create(terms.clone()).unwrap_err(), OfferError::InvalidPercent);
        let terms = OfferTerms { discount_percent: Decimal::from(20), ends_at: now, ..terms };
        assert_eq!(Offer::create(terms).unwrap_err(), OfferError::InvalidWindow);
    }

    #[test]
    fn test_offer_price() {
        assert_eq!(offer_price(Money::from_major(250), Decimal::from(20)), Money::from_major(200));
        assert_eq!(offer_price(Money::from_major(250), Decimal::ZERO), Money::from_major(250));
    }
}
