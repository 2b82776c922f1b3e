use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;
use crate::db::{to_i32, to_u32};
use crate::domain::aggregates::{Cart, CartItem};
use crate::domain::value_objects::Money;

#[derive(sqlx::FromRow)]
struct CartItemRow { product_id: Uuid, quantity: i32, price: Decimal, added_at: DateTime<Utc> }

pub async fn load(conn: &mut PgConnection, user_id: Uuid) -> Result<Cart, sqlx::Error> {
    let rows = sqlx::query_as::<_, CartItemRow>("SELECT product_id, quantity, price, added_at FROM cart_items WHERE user_id = $1 ORDER BY added_at, product_id")
        .bind(user_id).fetch_all(&mut *conn).await?;
    let items = rows.into_iter()
        .map(|r| Ok(CartItem { product_id: r.product_id, quantity: to_u32(r.quantity, "cart_items.quantity")?, price: Money::new(r.price), added_at: r.added_at }))
        .collect::<Result<Vec<_>, sqlx::Error>>()?;
    Ok(Cart::restore(user_id, items))
}

pub async fn upsert_item(conn: &mut PgConnection, user_id: Uuid, item: &CartItem) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO cart_items (user_id, product_id, quantity, price, added_at) VALUES ($1, $2, $3, $4, $5) ON CONFLICT (user_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity, price = EXCLUDED.price")
        .bind(user_id).bind(item.product_id).bind(to_i32(item.quantity)).bind(item.price.amount()).bind(item.added_at)
        .execute(&mut *conn).await?;
    Ok(())
}

pub async fn remove_item(conn: &mut PgConnection, user_id: Uuid, product_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2").bind(user_id).bind(product_id).execute(&mut *conn).await?;
    Ok(())
}

pub async fn clear(conn: &mut PgConnection, user_id: Uuid) -> Result<(), sqlx::Error> {
    sqlx::query("DELETE FROM cart_items WHERE user_id = $1").bind(user_id).execute(&mut *conn).await?;
    Ok(())
}
