use std::collections::HashMap;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;
use crate::db::{decode_error, to_i32, to_u32};
use crate::domain::aggregates::{Coupon, CouponDiscount};
use crate::domain::value_objects::{CouponCode, Money};

#[derive(sqlx::FromRow)]
struct CouponRow {
    id: Uuid, code: String, description: Option<String>, discount_kind: String, discount_value: Decimal,
    max_discount: Option<Decimal>, min_purchase: Decimal, usage_limit: Option<i32>, per_user_limit: i32,
    times_used: i32, expires_at: DateTime<Utc>, is_active: bool, created_at: DateTime<Utc>,
}

impl TryFrom<CouponRow> for Coupon {
    type Error = sqlx::Error;
    fn try_from(r: CouponRow) -> Result<Self, Self::Error> {
        let discount = match r.discount_kind.as_str() {
            "percent" => CouponDiscount::Percent { percent: r.discount_value, max_discount: r.max_discount.map(Money::new) },
            "fixed" => CouponDiscount::Fixed { amount: Money::new(r.discount_value) },
            other => return Err(decode_error(format!("unknown coupon kind {other}"))),
        };
        Ok(Coupon {
            id: r.id,
            code: CouponCode::new(r.code).map_err(|e| decode_error(e.to_string()))?,
            description: r.description,
            discount,
            min_purchase: Money::new(r.min_purchase),
            usage_limit: r.usage_limit.map(|l| to_u32(l, "coupons.usage_limit")).transpose()?,
            per_user_limit: to_u32(r.per_user_limit, "coupons.per_user_limit")?,
            times_used: to_u32(r.times_used, "coupons.times_used")?,
            expires_at: r.expires_at,
            is_active: r.is_active,
            created_at: r.created_at,
        })
    }
}

/// Column values for the discount: (kind, value, cap).
fn discount_columns(d: &CouponDiscount) -> (&'static str, Decimal, Option<Decimal>) {
    match *d {
        CouponDiscount::Percent { percent, max_discount } => ("percent", percent, max_discount.map(|m| m.amount())),
        CouponDiscount::Fixed { amount } => ("fixed", amount.amount(), None),
    }
}

const SELECT: &str = "SELECT id, code, description, discount_kind, discount_value, max_discount, min_purchase, usage_limit, per_user_limit, times_used, expires_at, is_active, created_at FROM coupons";

fn collect(rows: Vec<CouponRow>) -> Result<Vec<Coupon>, sqlx::Error> { rows.into_iter().map(Coupon::try_from).collect() }

pub async fn list(conn: &mut PgConnection) -> Result<Vec<Coupon>, sqlx::Error> {
    collect(sqlx::query_as::<_, CouponRow>(&format!("{SELECT} ORDER BY created_at DESC")).fetch_all(&mut *conn).await?)
}

/// Active, unexpired coupons with redemptions left.
pub async fn list_redeemable(conn: &mut PgConnection, now: DateTime<Utc>) -> Result<Vec<Coupon>, sqlx::Error> {
    collect(sqlx::query_as::<_, CouponRow>(&format!("{SELECT} WHERE is_active AND expires_at > $1 AND (usage_limit IS NULL OR times_used < usage_limit) ORDER BY expires_at"))
        .bind(now).fetch_all(&mut *conn).await?)
}

pub async fn find(conn: &mut PgConnection, id: Uuid) -> Result<Option<Coupon>, sqlx::Error> {
    sqlx::query_as::<_, CouponRow>(&format!("{SELECT} WHERE id = $1"))
        .bind(id).fetch_optional(&mut *conn).await?
        .map(Coupon::try_from).transpose()
}

pub async fn find_by_code(conn: &mut PgConnection, code: &CouponCode) -> Result<Option<Coupon>, sqlx::Error> {
    sqlx::query_as::<_, CouponRow>(&format!("{SELECT} WHERE code = $1"))
        .bind(code.as_str()).fetch_optional(&mut *conn).await?
        .map(Coupon::try_from).transpose()
}

pub async fn code_taken(conn: &mut PgConnection, code: &CouponCode, except: Option<Uuid>) -> Result<bool, sqlx::Error> {
    let (taken,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM coupons WHERE code = $1 AND ($2::uuid IS NULL OR id <> $2))")
        .bind(code.as_str()).bind(except).fetch_one(&mut *conn).await?;
    Ok(taken)
}

pub async fn insert(conn: &mut PgConnection, c: &Coupon) -> Result<(), sqlx::Error> {
    let (kind, value, cap) = discount_columns(&c.discount);
    sqlx::query("INSERT INTO coupons (id, code, description, discount_kind, discount_value, max_discount, min_purchase, usage_limit, per_user_limit, times_used, expires_at, is_active, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)")
        .bind(c.id).bind(c.code.as_str()).bind(&c.description).bind(kind).bind(value).bind(cap)
        .bind(c.min_purchase.amount()).bind(c.usage_limit.map(to_i32)).bind(to_i32(c.per_user_limit))
        .bind(to_i32(c.times_used)).bind(c.expires_at).bind(c.is_active).bind(c.created_at)
        .execute(&mut *conn).await?;
    Ok(())
}

pub async fn update(conn: &mut PgConnection, c: &Coupon) -> Result<(), sqlx::Error> {
    let (kind, value, cap) = discount_columns(&c.discount);
    sqlx::query("UPDATE coupons SET code = $2, description = $3, discount_kind = $4, discount_value = $5, max_discount = $6, min_purchase = $7, usage_limit = $8, per_user_limit = $9, expires_at = $10, is_active = $11 WHERE id = $1")
        .bind(c.id).bind(c.code.as_str()).bind(&c.description).bind(kind).bind(value).bind(cap)
        .bind(c.min_purchase.amount()).bind(c.usage_limit.map(to_i32)).bind(to_i32(c.per_user_limit))
        .bind(c.expires_at).bind(c.is_active)
        .execute(&mut *conn).await?;
    Ok(())
}

pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM coupons WHERE id = $1").bind(id).execute(&mut *conn).await?;
    Ok(())
}

pub async fn uses_by_user(conn: &mut PgConnection, coupon_id: Uuid, user_id: Uuid) -> Result<u32, sqlx::Error> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM coupon_usages WHERE coupon_id = $1 AND user_id = $2")
        .bind(coupon_id).bind(user_id).fetch_one(&mut *conn).await?;
    Ok(u32::try_from(count).unwrap_or(u32::MAX))
}

/// Redemption counts per coupon for one customer.
pub async fn usage_by_user(conn: &mut PgConnection, user_id: Uuid) -> Result<HashMap<Uuid, u32>, sqlx::Error> {
    let rows: Vec<(Uuid, i64)> = sqlx::query_as("SELECT coupon_id, COUNT(*) FROM coupon_usages WHERE user_id = $1 GROUP BY coupon_id")
        .bind(user_id).fetch_all(&mut *conn).await?;
    Ok(rows.into_iter().map(|(id, n)| (id, u32::try_from(n).unwrap_or(u32::MAX))).collect())
}

/// Bumps the redemption counter and appends to the usage ledger.
/// Returns false, recording nothing, once the global usage limit is spent.
pub async fn record_usage(conn: &mut PgConnection, coupon_id: Uuid, user_id: Uuid, order_id: Uuid) -> Result<bool, sqlx::Error> {
    let bumped = sqlx::query("UPDATE coupons SET times_used = times_used + 1 WHERE id = $1 AND (usage_limit IS NULL OR times_used < usage_limit)")
        .bind(coupon_id).execute(&mut *conn).await?.rows_affected();
    if bumped == 0 { return Ok(false); }
    sqlx::query("INSERT INTO coupon_usages (id, coupon_id, user_id, order_id, used_at) VALUES ($1, $2, $3, $4, NOW())")
        .bind(Uuid::now_v7()).bind(coupon_id).bind(user_id).bind(order_id)
        .execute(&mut *conn).await?;
    Ok(true)
}
