//! Customer cart. Every response re-prices the cart against current stock and offers.

use std::collections::HashMap;
use axum::{extract::{Path, State}, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;
use crate::db;
use crate::domain::aggregates::{best_discount, offer_price, Cart, CartError, CartSummary, Product};
use crate::domain::value_objects::Money;
use crate::error::{AppError, Result};
use crate::http::extract::{Customer, ValidJson};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct AddItemRequest {
    pub product_id: Uuid,
    #[validate(range(min = 1))]
    pub quantity: u32,
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest { pub quantity: u32 }

/// Loads the customer's cart and prices it.
pub(crate) async fn priced_cart(conn: &mut PgConnection, user_id: Uuid, now: DateTime<Utc>) -> Result<(Cart, CartSummary)> {
    let cart = db::carts::load(conn, user_id).await?;
    let ids: Vec<Uuid> = cart.items().iter().map(|i| i.product_id).collect();
    let products: HashMap<Uuid, Product> = db::products::find_many(conn, &ids).await?.into_iter().map(|p| (p.id, p)).collect();
    let offers = db::offers::list_live(conn, now).await?;
    let summary = cart.summarize(&products, &offers, now);
    Ok((cart, summary))
}

async fn current_price(conn: &mut PgConnection, product: &Product, now: DateTime<Utc>) -> Result<Money> {
    let offers = db::offers::list_live(conn, now).await?;
    Ok(offer_price(product.price, best_discount(&offers, product.id, product.category_id, now)))
}

async fn summary_for(conn: &mut PgConnection, user_id: Uuid) -> Result<Json<CartSummary>> {
    let (_, summary) = priced_cart(conn, user_id, Utc::now()).await?;
    Ok(Json(summary))
}

pub async fn get_cart(Customer(user_id): Customer, State(s): State<AppState>) -> Result<Json<CartSummary>> {
    let mut conn = s.db.acquire().await?;
    summary_for(&mut conn, user_id).await
}

#[instrument(skip_all, fields(%user_id, product_id = %r.product_id))]
pub async fn add_item(Customer(user_id): Customer, State(s): State<AppState>, ValidJson(r): ValidJson<AddItemRequest>) -> Result<Json<CartSummary>> {
    let now = Utc::now();
    let mut conn = s.db.acquire().await?;
    let product = db::products::find(&mut conn, r.product_id).await?.ok_or(AppError::NotFound("product not found"))?;
    let price = current_price(&mut conn, &product, now).await?;
    let mut cart = db::carts::load(&mut conn, user_id).await?;
    let item = cart.add_item(&product, r.quantity, price, s.config.pricing.max_quantity_per_item)?.clone();
    db::carts::upsert_item(&mut conn, user_id, &item).await?;
    tracing::info!(quantity = item.quantity, "cart item added");
    summary_for(&mut conn, user_id).await
}

#[instrument(skip_all, fields(%user_id, %product_id))]
pub async fn update_item(Customer(user_id): Customer, State(s): State<AppState>, Path(product_id): Path<Uuid>, Json(r): Json<UpdateItemRequest>) -> Result<Json<CartSummary>> {
    let now = Utc::now();
    let mut conn = s.db.acquire().await?;
    let mut cart = db::carts::load(&mut conn, user_id).await?;
    match db::products::find(&mut conn, product_id).await? {
        Some(product) => {
            let price = current_price(&mut conn, &product, now).await?;
            match cart.update_quantity(&product, r.quantity, price, s.config.pricing.max_quantity_per_item)? {
                Some(item) => {
                    let item = item.clone();
                    db::carts::upsert_item(&mut conn, user_id, &item).await?;
                }
                None => db::carts::remove_item(&mut conn, user_id, product_id).await?,
            }
        }
        // the product is gone; the line can only be dropped
        None if r.quantity == 0 => {
            cart.remove_item(product_id)?;
            db::carts::remove_item(&mut conn, user_id, product_id).await?;
        }
        None => return Err(CartError::Unavailable.into()),
    }
    summary_for(&mut conn, user_id).await
}

#[instrument(skip_all, fields(%user_id, %product_id))]
pub async fn remove_item(Customer(user_id): Customer, State(s): State<AppState>, Path(product_id): Path<Uuid>) -> Result<Json<CartSummary>> {
    let mut conn = s.db.acquire().await?;
    let mut cart = db::carts::load(&mut conn, user_id).await?;
    cart.remove_item(product_id)?;
    db::carts::remove_item(&mut conn, user_id, product_id).await?;
    summary_for(&mut conn, user_id).await
}

pub async fn clear_cart(Customer(user_id): Customer, State(s): State<AppState>) -> Result<StatusCode> {
    let mut conn = s.db.acquire().await?;
    db::carts::clear(&mut conn, user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
