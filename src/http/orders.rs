//! Customer order history, cancellations and return requests.

use axum::{extract::{Path, Query, State}, Json};
use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;
use crate::db::{self, Page};
use crate::domain::aggregates::{Order, OrderError};
use crate::domain::refund::Refund;
use crate::error::Result;
use crate::http::{extract::{Customer, ValidJson}, ListParams, PaginatedResponse};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct OrderOutcome {
    pub order: Order,
    pub refund: Refund,
}

#[derive(Debug, Default, Deserialize)]
pub struct CancelRequest { pub reason: Option<String> }

#[derive(Debug, Deserialize, Validate)]
pub struct ReturnRequest {
    #[validate(length(min = 1, max = 500))]
    pub reason: String,
}

/// Restocks the refunded lines and credits any money owed to the customer's wallet.
pub(crate) async fn settle_refund(conn: &mut PgConnection, order: &Order, refund: &Refund, description: &str) -> Result<()> {
    // before any product row, matching the lock order of placement
    db::lock_customer(conn, order.user_id()).await?;
    for line in &refund.items {
        db::products::restock(conn, line.product_id, line.quantity).await?;
    }
    if refund.is_payable() {
        let mut wallet = db::wallet::load(conn, order.user_id()).await?;
        let entry = wallet.credit(refund.total, format!("{description} ({})", order.order_number()), Some(order.id()))?;
        db::wallet::insert(conn, &entry).await?;
        tracing::info!(order_id = %order.id(), amount = %refund.total, balance = %wallet.balance(), "refund credited to wallet");
    }
    Ok(())
}

/// Locks the caller's order. Someone else's order reads as missing.
pub(crate) async fn lock_owned(conn: &mut PgConnection, order_id: Uuid, user_id: Uuid) -> Result<Order> {
    let order = db::orders::find_for_update(conn, order_id).await?
        .filter(|o| o.is_owned_by(user_id))
        .ok_or(OrderError::NotFound)?;
    Ok(order)
}

pub async fn list_orders(Customer(user_id): Customer, State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<PaginatedResponse<Order>>> {
    let page = Page::new(p.page, p.per_page);
    let mut conn = s.db.acquire().await?;
    let (orders, total) = db::orders::list_for_user(&mut conn, user_id, page).await?;
    Ok(Json(PaginatedResponse::new(orders, total, page)))
}

pub async fn get_order(Customer(user_id): Customer, State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Order>> {
    let mut conn = s.db.acquire().await?;
    let order = db::orders::find(&mut conn, id).await?.filter(|o| o.is_owned_by(user_id)).ok_or(OrderError::NotFound)?;
    Ok(Json(order))
}

#[instrument(skip_all, fields(%user_id, order_id = %id))]
pub async fn cancel_order(Customer(user_id): Customer, State(s): State<AppState>, Path(id): Path<Uuid>, body: Option<Json<CancelRequest>>) -> Result<Json<OrderOutcome>> {
    let reason = body.and_then(|Json(b)| b.reason).unwrap_or_default();
    let mut tx = s.db.begin().await?;
    let mut order = lock_owned(&mut tx, id, user_id).await?;
    let refund = order.cancel(&reason)?;
    settle_refund(&mut tx, &order, &refund, "Refund for cancelled order").await?;
    db::orders::save(&mut tx, &order).await?;
    tx.commit().await?;
    tracing::info!(refund = %refund.total, status = %order.status(), "order cancelled");
    s.events.publish_all(order.take_events()).await;
    Ok(Json(OrderOutcome { order, refund }))
}

#[instrument(skip_all, fields(%user_id, order_id = %id, %item_id))]
pub async fn cancel_item(Customer(user_id): Customer, State(s): State<AppState>, Path((id, item_id)): Path<(Uuid, Uuid)>, body: Option<Json<CancelRequest>>) -> Result<Json<OrderOutcome>> {
    let reason = body.and_then(|Json(b)| b.reason).unwrap_or_default();
    let mut tx = s.db.begin().await?;
    let mut order = lock_owned(&mut tx, id, user_id).await?;
    let refund = order.cancel_item(item_id, &reason)?;
    settle_refund(&mut tx, &order, &refund, "Refund for cancelled item").await?;
    db::orders::save(&mut tx, &order).await?;
    tx.commit().await?;
    tracing::info!(refund = %refund.total, status = %order.status(), "order item cancelled");
    s.events.publish_all(order.take_events()).await;
    Ok(Json(OrderOutcome { order, refund }))
}

#[instrument(skip_all, fields(%user_id, order_id = %id, %item_id))]
pub async fn request_return(Customer(user_id): Customer, State(s): State<AppState>, Path((id, item_id)): Path<(Uuid, Uuid)>, ValidJson(r): ValidJson<ReturnRequest>) -> Result<Json<Order>> {
    let window = Duration::days(s.config.pricing.return_window_days);
    let mut tx = s.db.begin().await?;
    let mut order = lock_owned(&mut tx, id, user_id).await?;
    order.request_return(item_id, &r.reason, Utc::now(), window)?;
    db::orders::save(&mut tx, &order).await?;
    tx.commit().await?;
    tracing::info!("return requested");
    s.events.publish_all(order.take_events()).await;
    Ok(Json(order))
}
