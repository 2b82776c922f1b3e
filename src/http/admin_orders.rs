//! Back-office order fulfilment and return handling.

use axum::{extract::{Path, Query, State}, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;
use crate::db::{self, Page};
use crate::domain::aggregates::{Order, OrderError, OrderItem};
use crate::domain::refund::Refund;
use crate::domain::status::{ItemStatus, OrderStatus};
use crate::error::Result;
use crate::http::{extract::{Admin, ValidJson}, orders::{settle_refund, OrderOutcome}, PaginatedResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct OrderListQuery {
    pub status: Option<String>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct ItemStatusRequest {
    pub status: ItemStatus,
    /// Recorded when the new status is `cancelled`.
    pub reason: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct RejectReturnRequest {
    #[validate(length(min = 1, max = 500))]
    pub note: String,
}

#[derive(Debug, Serialize)]
pub struct PendingReturn {
    pub order_id: Uuid,
    pub order_number: String,
    pub user_id: Uuid,
    pub item: OrderItem,
    pub requested_at: DateTime<Utc>,
}

async fn lock(conn: &mut PgConnection, id: Uuid) -> Result<Order> {
    Ok(db::orders::find_for_update(conn, id).await?.ok_or(OrderError::NotFound)?)
}

pub async fn list_orders(_: Admin, State(s): State<AppState>, Query(q): Query<OrderListQuery>) -> Result<Json<PaginatedResponse<Order>>> {
    let status = q.status.as_deref().filter(|v| !v.is_empty()).map(str::parse::<OrderStatus>).transpose()?;
    let page = Page::new(q.page, q.per_page);
    let mut conn = s.db.acquire().await?;
    let (orders, total) = db::orders::list(&mut conn, status, page).await?;
    Ok(Json(PaginatedResponse::new(orders, total, page)))
}

pub async fn get_order(_: Admin, State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<Order>> {
    let mut conn = s.db.acquire().await?;
    Ok(Json(db::orders::find(&mut conn, id).await?.ok_or(OrderError::NotFound)?))
}

/// Moves an item along the fulfilment chain. `cancelled` goes through the cancellation rules instead.
#[instrument(skip_all, fields(order_id = %id, %item_id, to = r.status.as_str()))]
pub async fn update_item_status(_: Admin, State(s): State<AppState>, Path((id, item_id)): Path<(Uuid, Uuid)>, Json(r): Json<ItemStatusRequest>) -> Result<Json<OrderOutcome>> {
    let mut tx = s.db.begin().await?;
    let mut order = lock(&mut tx, id).await?;
    let refund = if r.status == ItemStatus::Cancelled {
        let refund = order.cancel_item(item_id, r.reason.as_deref().unwrap_or("cancelled by store"))?;
        settle_refund(&mut tx, &order, &refund, "Refund for item cancelled by store").await?;
        refund
    } else {
        let from = order.advance_item(item_id, r.status, Utc::now())?;
        tracing::info!(from = from.as_str(), "item status updated");
        Refund::default()
    };
    db::orders::save(&mut tx, &order).await?;
    tx.commit().await?;
    s.events.publish_all(order.take_events()).await;
    Ok(Json(OrderOutcome { order, refund }))
}

pub async fn list_returns(_: Admin, State(s): State<AppState>) -> Result<Json<Vec<PendingReturn>>> {
    let mut conn = s.db.acquire().await?;
    let orders = db::orders::list_pending_returns(&mut conn).await?;
    let pending = orders.iter().flat_map(|order| {
        order.items().iter().filter(|i| i.status == ItemStatus::ReturnRequested).map(move |item| PendingReturn {
            order_id: order.id(), order_number: order.order_number().to_string(), user_id: order.user_id(),
            requested_at: item.updated_at, item: item.clone(),
        })
    }).collect();
    Ok(Json(pending))
}

#[instrument(skip_all, fields(order_id = %id, %item_id))]
pub async fn approve_return(_: Admin, State(s): State<AppState>, Path((id, item_id)): Path<(Uuid, Uuid)>) -> Result<Json<OrderOutcome>> {
    let mut tx = s.db.begin().await?;
    let mut order = lock(&mut tx, id).await?;
    let refund = order.approve_return(item_id)?;
    settle_refund(&mut tx, &order, &refund, "Refund for returned item").await?;
    db::orders::save(&mut tx, &order).await?;
    tx.commit().await?;
    tracing::info!(refund = %refund.total, status = %order.status(), "return approved");
    s.events.publish_all(order.take_events()).await;
    Ok(Json(OrderOutcome { order, refund }))
}

#[instrument(skip_all, fields(order_id = %id, %item_id))]
pub async fn reject_return(_: Admin, State(s): State<AppState>, Path((id, item_id)): Path<(Uuid, Uuid)>, ValidJson(r): ValidJson<RejectReturnRequest>) -> Result<Json<Order>> {
    let mut tx = s.db.begin().await?;
    let mut order = lock(&mut tx, id).await?;
    order.reject_return(item_id, &r.note)?;
    db::orders::save(&mut tx, &order).await?;
    tx.commit().await?;
    tracing::info!("return rejected");
    s.events.publish_all(order.take_events()).await;
    Ok(Json(order))
}
