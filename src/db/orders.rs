//! Orders and their items. Items are stored in placement order (`position`)
//! and always loaded together with their order.

use std::collections::HashMap;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{types::Json, PgConnection};
use uuid::Uuid;
use crate::db::{decode_error, to_i32, to_u32, Page};
use crate::domain::aggregates::{Order, OrderItem, OrderSnapshot, PaymentMethod, PaymentStatus, ShippingAddress};
use crate::domain::status::{ItemStatus, OrderStatus, UnknownStatus};
use crate::domain::value_objects::Money;

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid, order_number: String, user_id: Uuid, payment_method: String, payment_status: String, status: String,
    subtotal: Decimal, coupon_code: Option<String>, coupon_discount: Decimal, shipping_fee: Decimal, tax: Decimal,
    final_amount: Decimal, refunded_amount: Decimal, gateway_order_id: Option<String>, gateway_amount: Option<Decimal>,
    gateway_payment_id: Option<String>,
    shipping_address: Json<ShippingAddress>, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderItemRow {
    id: Uuid, order_id: Uuid, product_id: Uuid, product_name: String, original_price: Decimal, unit_price: Decimal,
    quantity: i32, coupon_share: Decimal, status: String, cancel_reason: Option<String>, return_reason: Option<String>,
    admin_note: Option<String>, refund_amount: Option<Decimal>, delivered_at: Option<DateTime<Utc>>, updated_at: DateTime<Utc>,
}

impl TryFrom<OrderItemRow> for OrderItem {
    type Error = sqlx::Error;
    fn try_from(r: OrderItemRow) -> Result<Self, Self::Error> {
        Ok(OrderItem {
            id: r.id, product_id: r.product_id, product_name: r.product_name,
            original_price: Money::new(r.original_price), unit_price: Money::new(r.unit_price),
            quantity: to_u32(r.quantity, "order_items.quantity")?, coupon_share: Money::new(r.coupon_share),
            status: r.status.parse().map_err(|e: UnknownStatus| decode_error(e.to_string()))?,
            cancel_reason: r.cancel_reason, return_reason: r.return_reason, admin_note: r.admin_note,
            refund_amount: r.refund_amount.map(Money::new), delivered_at: r.delivered_at, updated_at: r.updated_at,
        })
    }
}

fn assemble(r: OrderRow, items: Vec<OrderItem>) -> Result<Order, sqlx::Error> {
    let status: OrderStatus = r.status.parse().map_err(|e: UnknownStatus| decode_error(e.to_string()))?;
    Ok(Order::restore(OrderSnapshot {
        id: r.id,
        order_number: r.order_number,
        user_id: r.user_id,
        payment_method: PaymentMethod::parse(&r.payment_method).ok_or_else(|| decode_error(format!("unknown payment method {}", r.payment_method)))?,
        payment_status: PaymentStatus::parse(&r.payment_status).ok_or_else(|| decode_error(format!("unknown payment status {}", r.payment_status)))?,
        status,
        items,
        subtotal: Money::new(r.subtotal),
        coupon_code: r.coupon_code,
        coupon_discount: Money::new(r.coupon_discount),
        shipping_fee: Money::new(r.shipping_fee),
        tax: Money::new(r.tax),
        final_amount: Money::new(r.final_amount),
        refunded_amount: Money::new(r.refunded_amount),
        gateway_order_id: r.gateway_order_id,
        gateway_amount: r.gateway_amount.map(Money::new),
        gateway_payment_id: r.gateway_payment_id,
        shipping_address: r.shipping_address.0,
        created_at: r.created_at,
        updated_at: r.updated_at,
    }))
}

const SELECT: &str = "SELECT id, order_number, user_id, payment_method, payment_status, status, subtotal, coupon_code, coupon_discount, shipping_fee, tax, final_amount, refunded_amount, gateway_order_id, gateway_amount, gateway_payment_id, shipping_address, created_at, updated_at FROM orders";
const SELECT_ITEMS: &str = "SELECT id, order_id, product_id, product_name, original_price, unit_price, quantity, coupon_share, status, cancel_reason, return_reason, admin_note, refund_amount, delivered_at, updated_at FROM order_items";

/// Loads the items of every order in `rows` with one query.
async fn with_items(conn: &mut PgConnection, rows: Vec<OrderRow>) -> Result<Vec<Order>, sqlx::Error> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    if ids.is_empty() { return Ok(vec![]); }
    let item_rows = sqlx::query_as::<_, OrderItemRow>(&format!("{SELECT_ITEMS} WHERE order_id = ANY($1) ORDER BY order_id, position"))
        .bind(&ids).fetch_all(&mut *conn).await?;
    let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for row in item_rows {
        let order_id = row.order_id;
        by_order.entry(order_id).or_default().push(OrderItem::try_from(row)?);
    }
    rows.into_iter().map(|r| {
        let items = by_order.remove(&r.id).unwrap_or_default();
        assemble(r, items)
    }).collect()
}

async fn one(conn: &mut PgConnection, row: Option<OrderRow>) -> Result<Option<Order>, sqlx::Error> {
    match row {
        Some(row) => Ok(with_items(conn, vec![row]).await?.pop()),
        None => Ok(None),
    }
}

pub async fn find(conn: &mut PgConnection, id: Uuid) -> Result<Option<Order>, sqlx::Error> {
    let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT} WHERE id = $1")).bind(id).fetch_optional(&mut *conn).await?;
    one(conn, row).await
}

/// Loads and row-locks an order; only meaningful inside a transaction.
pub async fn find_for_update(conn: &mut PgConnection, id: Uuid) -> Result<Option<Order>, sqlx::Error> {
    let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT} WHERE id = $1 FOR UPDATE")).bind(id).fetch_optional(&mut *conn).await?;
    one(conn, row).await
}

pub async fn find_by_gateway_order_for_update(conn: &mut PgConnection, gateway_order_id: &str) -> Result<Option<Order>, sqlx::Error> {
    let row = sqlx::query_as::<_, OrderRow>(&format!("{SELECT} WHERE gateway_order_id = $1 FOR UPDATE"))
        .bind(gateway_order_id).fetch_optional(&mut *conn).await?;
    one(conn, row).await
}

pub async fn list_for_user(conn: &mut PgConnection, user_id: Uuid, page: Page) -> Result<(Vec<Order>, i64), sqlx::Error> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!("{SELECT} WHERE user_id = $1 ORDER BY created_at DESC LIMIT $2 OFFSET $3"))
        .bind(user_id).bind(page.limit()).bind(page.offset()).fetch_all(&mut *conn).await?;
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE user_id = $1").bind(user_id).fetch_one(&mut *conn).await?;
    Ok((with_items(conn, rows).await?, total))
}

pub async fn list(conn: &mut PgConnection, status: Option<OrderStatus>, page: Page) -> Result<(Vec<Order>, i64), sqlx::Error> {
    let status = status.map(|s| s.as_str());
    let rows = sqlx::query_as::<_, OrderRow>(&format!("{SELECT} WHERE ($1::text IS NULL OR status = $1) ORDER BY created_at DESC LIMIT $2 OFFSET $3"))
        .bind(status).bind(page.limit()).bind(page.offset()).fetch_all(&mut *conn).await?;
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM orders WHERE ($1::text IS NULL OR status = $1)").bind(status).fetch_one(&mut *conn).await?;
    Ok((with_items(conn, rows).await?, total))
}

/// Orders with at least one return awaiting a decision, oldest request first.
pub async fn list_pending_returns(conn: &mut PgConnection) -> Result<Vec<Order>, sqlx::Error> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!(
        "{SELECT} WHERE id IN (SELECT order_id FROM order_items WHERE status = $1) ORDER BY updated_at"
    )).bind(ItemStatus::ReturnRequested.as_str()).fetch_all(&mut *conn).await?;
    with_items(conn, rows).await
}

pub async fn list_created_between(conn: &mut PgConnection, from: DateTime<Utc>, until: DateTime<Utc>) -> Result<Vec<Order>, sqlx::Error> {
    let rows = sqlx::query_as::<_, OrderRow>(&format!("{SELECT} WHERE created_at >= $1 AND created_at < $2 ORDER BY created_at"))
        .bind(from).bind(until).fetch_all(&mut *conn).await?;
    with_items(conn, rows).await
}

pub async fn insert(conn: &mut PgConnection, o: &Order) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO orders (id, order_number, user_id, payment_method, payment_status, status, subtotal, coupon_code, coupon_discount, shipping_fee, tax, final_amount, refunded_amount, gateway_order_id, gateway_amount, gateway_payment_id, shipping_address, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19)")
        .bind(o.id()).bind(o.order_number()).bind(o.user_id()).bind(o.payment_method().as_str())
        .bind(o.payment_status().as_str()).bind(o.status().as_str()).bind(o.subtotal().amount())
        .bind(o.coupon_code()).bind(o.coupon_discount().amount()).bind(o.shipping_fee().amount())
        .bind(o.tax().amount()).bind(o.final_amount().amount()).bind(o.refunded_amount().amount())
        .bind(o.gateway_order_id()).bind(o.gateway_amount().map(|m| m.amount())).bind(o.gateway_payment_id()).bind(Json(o.shipping_address()))
        .bind(o.created_at()).bind(o.updated_at())
        .execute(&mut *conn).await?;
    for (position, item) in o.items().iter().enumerate() {
        sqlx::query("INSERT INTO order_items (id, order_id, position, product_id, product_name, original_price, unit_price, quantity, coupon_share, status, cancel_reason, return_reason, admin_note, refund_amount, delivered_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)")
            .bind(item.id).bind(o.id()).bind(i32::try_from(position).unwrap_or(i32::MAX)).bind(item.product_id)
            .bind(&item.product_name).bind(item.original_price.amount()).bind(item.unit_price.amount())
            .bind(to_i32(item.quantity)).bind(item.coupon_share.amount()).bind(item.status.as_str())
            .bind(&item.cancel_reason).bind(&item.return_reason).bind(&item.admin_note)
            .bind(item.refund_amount.map(|m| m.amount())).bind(item.delivered_at).bind(item.updated_at)
            .execute(&mut *conn).await?;
    }
    Ok(())
}

/// Writes back the mutable header fields and every item.
pub async fn save(conn: &mut PgConnection, o: &Order) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE orders SET payment_status = $2, status = $3, refunded_amount = $4, gateway_order_id = $5, gateway_amount = $6, gateway_payment_id = $7, updated_at = $8 WHERE id = $1")
        .bind(o.id()).bind(o.payment_status().as_str()).bind(o.status().as_str()).bind(o.refunded_amount().amount())
        .bind(o.gateway_order_id()).bind(o.gateway_amount().map(|m| m.amount())).bind(o.gateway_payment_id()).bind(o.updated_at())
        .execute(&mut *conn).await?;
    for item in o.items() {
        sqlx::query("UPDATE order_items SET status = $2, cancel_reason = $3, return_reason = $4, admin_note = $5, refund_amount = $6, delivered_at = $7, updated_at = $8 WHERE id = $1")
            .bind(item.id).bind(item.status.as_str()).bind(&item.cancel_reason).bind(&item.return_reason)
            .bind(&item.admin_note).bind(item.refund_amount.map(|m| m.amount())).bind(item.delivered_at).bind(item.updated_at)
            .execute(&mut *conn).await?;
    }
    Ok(())
}
