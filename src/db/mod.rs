//! Postgres persistence. Each submodule maps table rows to domain types.
//!
//! Functions take `&mut PgConnection` so callers decide whether a call runs
//! on a pooled connection or inside a transaction.

pub mod carts;
pub mod categories;
pub mod coupons;
pub mod offers;
pub mod orders;
pub mod products;
pub mod wallet;

use sqlx::PgConnection;
use uuid::Uuid;

/// Page window after clamping: `page >= 1`, `per_page` in `1..=100`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page { pub page: u32, pub per_page: u32 }

impl Page {
    pub const MAX_PER_PAGE: u32 = 100;

    pub fn new(page: Option<u32>, per_page: Option<u32>) -> Self {
        Self { page: page.unwrap_or(1).max(1), per_page: per_page.unwrap_or(20).clamp(1, Self::MAX_PER_PAGE) }
    }

    pub fn limit(&self) -> i64 { i64::from(self.per_page) }
    pub fn offset(&self) -> i64 { i64::from(self.page - 1) * i64::from(self.per_page) }
}

/// Advisory lock key for one customer's money and coupon ledger.
pub(crate) fn customer_lock_key(user_id: Uuid) -> i64 {
    let bits = user_id.as_u128();
    ((bits >> 64) as u64 ^ bits as u64) as i64
}

/// Serializes wallet and coupon bookkeeping for `user_id` until the transaction ends.
pub async fn lock_customer(conn: &mut PgConnection, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT pg_advisory_xact_lock($1)").bind(customer_lock_key(user_id)).execute(&mut *conn).await?;
    Ok(())
}

pub(crate) fn decode_error(message: impl Into<String>) -> sqlx::Error {
    sqlx::Error::Decode(message.into().into())
}

pub(crate) fn to_u32(value: i32, column: &str) -> Result<u32, sqlx::Error> {
    u32::try_from(value).map_err(|_| decode_error(format!("negative value in {column}")))
}

pub(crate) fn to_i32(value: u32) -> i32 { i32::try_from(value).unwrap_or(i32::MAX) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_clamps() {
        assert_eq!(Page::new(None, None), Page { page: 1, per_page: 20 });
        assert_eq!(Page::new(Some(0), Some(0)), Page { page: 1, per_page: 1 });
        assert_eq!(Page::new(Some(3), Some(500)).per_page, 100);
        assert_eq!(Page::new(Some(3), Some(25)).offset(), 50);
    }

    #[test]
    fn test_integer_conversions() {
        assert_eq!(to_u32(7, "stock").unwrap(), 7);
        assert!(to_u32(-1, "stock").is_err());
        assert_eq!(to_i32(u32::MAX), i32::MAX);
    }

    #[test]
    fn test_customer_lock_key() {
        let a = Uuid::parse_str("0190a7f0-0000-7000-8000-000000000001").unwrap();
        let b = Uuid::parse_str("0190a7f0-0000-7000-8000-000000000002").unwrap();
        assert_eq!(customer_lock_key(a), customer_lock_key(a));
        assert_ne!(customer_lock_key(a), customer_lock_key(b));
        assert_eq!(customer_lock_key(Uuid::nil()), 0);
    }
}
