use axum::{extract::{Path, State}, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;
use crate::db;
use crate::domain::aggregates::{Offer, OfferTarget, OfferTerms};
use crate::error::{AppError, Result};
use crate::http::extract::Admin;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OfferRequest {
    pub name: String,
    pub target: OfferTarget,
    pub discount_percent: Decimal,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
    pub is_active: Option<bool>,
}

impl OfferRequest {
    fn terms(&self) -> OfferTerms {
        OfferTerms {
            name: self.name.clone(), target: self.target, discount_percent: self.discount_percent,
            starts_at: self.starts_at, ends_at: self.ends_at,
        }
    }
}

async fn ensure_target_exists(conn: &mut PgConnection, target: OfferTarget) -> Result<()> {
    let exists = match target {
        OfferTarget::Product(id) => db::products::find(conn, id).await?.is_some(),
        OfferTarget::Category(id) => db::categories::find(conn, id).await?.is_some(),
    };
    if exists { Ok(()) } else { Err(AppError::BadRequest(format!("offer target {} does not exist", target.kind()))) }
}

pub async fn list_offers(_: Admin, State(s): State<AppState>) -> Result<Json<Vec<Offer>>> {
    let mut conn = s.db.acquire().await?;
    Ok(Json(db::offers::list(&mut conn).await?))
}

#[instrument(skip_all)]
pub async fn create_offer(_: Admin, State(s): State<AppState>, Json(r): Json<OfferRequest>) -> Result<(StatusCode, Json<Offer>)> {
    let mut offer = Offer::create(r.terms())?;
    offer.is_active = r.is_active.unwrap_or(true);
    let mut conn = s.db.acquire().await?;
    ensure_target_exists(&mut conn, offer.target).await?;
    db::offers::insert(&mut conn, &offer).await?;
    tracing::info!(offer_id = %offer.id, percent = %offer.discount_percent, target = offer.target.kind(), "offer created");
    Ok((StatusCode::CREATED, Json(offer)))
}

#[instrument(skip_all, fields(offer_id = %id))]
pub async fn update_offer(_: Admin, State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<OfferRequest>) -> Result<Json<Offer>> {
    let mut conn = s.db.acquire().await?;
    let mut offer = db::offers::find(&mut conn, id).await?.ok_or(AppError::NotFound("offer not found"))?;
    offer.amend(r.terms())?;
    if let Some(active) = r.is_active { offer.is_active = active; }
    ensure_target_exists(&mut conn, offer.target).await?;
    db::offers::update(&mut conn, &offer).await?;
    Ok(Json(offer))
}

#[instrument(skip_all, fields(offer_id = %id))]
pub async fn delete_offer(_: Admin, State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<StatusCode> {
    let mut conn = s.db.acquire().await?;
    if !db::offers::delete(&mut conn, id).await? { return Err(AppError::NotFound("offer not found")); }
    tracing::info!("offer deleted");
    Ok(StatusCode::NO_CONTENT)
}
