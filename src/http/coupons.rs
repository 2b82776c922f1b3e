//! Coupons: storefront discovery and preview, back-office management.

use axum::{extract::{Path, State}, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;
use crate::db;
use crate::domain::aggregates::{AppliedCoupon, CartError, Coupon, CouponDiscount, CouponError, CouponTerms};
use crate::domain::checkout::Quote;
use crate::domain::value_objects::{CouponCode, Money};
use crate::error::{AppError, Result};
use crate::http::{cart::priced_cart, extract::{Admin, Customer, ValidJson}};
use crate::state::AppState;

/// Looks up `code` and checks it against the caller's cart total.
pub(crate) async fn redeem(conn: &mut PgConnection, code: &str, user_id: Uuid, cart_total: Money, now: DateTime<Utc>) -> Result<(Coupon, AppliedCoupon)> {
    let code = CouponCode::new(code)?;
    let coupon = db::coupons::find_by_code(conn, &code).await?.ok_or(CouponError::NotFound)?;
    let uses = db::coupons::uses_by_user(conn, coupon.id, user_id).await?;
    let discount = coupon.evaluate(cart_total, uses, now)?;
    let applied = AppliedCoupon { code: coupon.code.to_string(), discount };
    Ok((coupon, applied))
}

#[derive(Debug, Serialize)]
pub struct AvailableCoupon {
    pub code: CouponCode,
    pub description: Option<String>,
    pub discount: CouponDiscount,
    pub min_purchase: Money,
    pub expires_at: DateTime<Utc>,
    /// Discount on the current cart, absent when the cart does not qualify.
    pub cart_discount: Option<Money>,
}

pub async fn available_coupons(Customer(user_id): Customer, State(s): State<AppState>) -> Result<Json<Vec<AvailableCoupon>>> {
    let now = Utc::now();
    let mut conn = s.db.acquire().await?;
    let (_, summary) = priced_cart(&mut conn, user_id, now).await?;
    let used = db::coupons::usage_by_user(&mut conn, user_id).await?;
    let coupons = db::coupons::list_redeemable(&mut conn, now).await?
        .into_iter()
        .filter(|c| used.get(&c.id).copied().unwrap_or(0) < c.per_user_limit)
        .map(|c| AvailableCoupon {
            cart_discount: c.evaluate(summary.total, used.get(&c.id).copied().unwrap_or(0), now).ok(),
            code: c.code, description: c.description, discount: c.discount, min_purchase: c.min_purchase, expires_at: c.expires_at,
        })
        .collect();
    Ok(Json(coupons))
}

#[derive(Debug, Deserialize, Validate)]
pub struct PreviewRequest {
    #[validate(length(min = 1, max = 40))]
    pub code: String,
}

pub async fn preview_coupon(Customer(user_id): Customer, State(s): State<AppState>, ValidJson(r): ValidJson<PreviewRequest>) -> Result<Json<Quote>> {
    let now = Utc::now();
    let mut conn = s.db.acquire().await?;
    let (cart, summary) = priced_cart(&mut conn, user_id, now).await?;
    if cart.is_empty() { return Err(CartError::Empty.into()); }
    let (_, applied) = redeem(&mut conn, &r.code, user_id, summary.total, now).await?;
    Ok(Json(Quote::build(&summary, Some(&applied), &s.config.pricing)))
}

#[derive(Debug, Deserialize, Validate)]
pub struct CouponRequest {
    pub code: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
    pub discount: CouponDiscount,
    pub min_purchase: Option<Decimal>,
    pub usage_limit: Option<u32>,
    pub per_user_limit: Option<u32>,
    pub expires_at: DateTime<Utc>,
    pub is_active: Option<bool>,
}

impl CouponRequest {
    fn terms(&self) -> Result<CouponTerms> {
        Ok(CouponTerms {
            code: CouponCode::new(self.code.as_str())?,
            description: self.description.clone(),
            discount: self.discount,
            min_purchase: Money::new(self.min_purchase.unwrap_or_default()),
            usage_limit: self.usage_limit,
            per_user_limit: self.per_user_limit.unwrap_or(1),
            expires_at: self.expires_at,
        })
    }
}

pub async fn list_coupons(_: Admin, State(s): State<AppState>) -> Result<Json<Vec<Coupon>>> {
    let mut conn = s.db.acquire().await?;
    Ok(Json(db::coupons::list(&mut conn).await?))
}

#[instrument(skip_all)]
pub async fn create_coupon(_: Admin, State(s): State<AppState>, ValidJson(r): ValidJson<CouponRequest>) -> Result<(StatusCode, Json<Coupon>)> {
    let mut coupon = Coupon::create(r.terms()?)?;
    coupon.is_active = r.is_active.unwrap_or(true);
    let mut conn = s.db.acquire().await?;
    if db::coupons::code_taken(&mut conn, &coupon.code, None).await? {
        return Err(CouponError::DuplicateCode(coupon.code.to_string()).into());
    }
    db::coupons::insert(&mut conn, &coupon).await?;
    tracing::info!(coupon_id = %coupon.id, code = %coupon.code, "coupon created");
    Ok((StatusCode::CREATED, Json(coupon)))
}

#[instrument(skip_all, fields(coupon_id = %id))]
pub async fn update_coupon(_: Admin, State(s): State<AppState>, Path(id): Path<Uuid>, ValidJson(r): ValidJson<CouponRequest>) -> Result<Json<Coupon>> {
    let mut conn = s.db.acquire().await?;
    let mut coupon = db::coupons::find(&mut conn, id).await?.ok_or(CouponError::NotFound)?;
    coupon.amend(r.terms()?)?;
    if let Some(active) = r.is_active { coupon.is_active = active; }
    if db::coupons::code_taken(&mut conn, &coupon.code, Some(id)).await? {
        return Err(CouponError::DuplicateCode(coupon.code.to_string()).into());
    }
    db::coupons::update(&mut conn, &coupon).await?;
    Ok(Json(coupon))
}

/// Deletes an unused coupon; one already redeemed is deactivated so its usage ledger survives.
#[instrument(skip_all, fields(coupon_id = %id))]
pub async fn delete_coupon(_: Admin, State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    let mut conn = s.db.acquire().await?;
    let mut coupon = db::coupons::find(&mut conn, id).await?.ok_or(AppError::NotFound("coupon not found"))?;
    if coupon.times_used == 0 {
        db::coupons::delete(&mut conn, id).await?;
        tracing::info!("coupon deleted");
    } else {
        coupon.is_active = false;
        db::coupons::update(&mut conn, &coupon).await?;
        tracing::info!(times_used = coupon.times_used, "coupon deactivated");
    }
    Ok(StatusCode::NO_CONTENT)
}
