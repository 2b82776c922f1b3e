use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;
use crate::db::decode_error;
use crate::domain::aggregates::{Offer, OfferTarget};

#[derive(sqlx::FromRow)]
struct OfferRow {
    id: Uuid, name: String, target_kind: String, target_id: Uuid, discount_percent: Decimal,
    starts_at: DateTime<Utc>, ends_at: DateTime<Utc>, is_active: bool, created_at: DateTime<Utc>,
}

impl TryFrom<OfferRow> for Offer {
    type Error = sqlx::Error;
    fn try_from(r: OfferRow) -> Result<Self, Self::Error> {
        let target = OfferTarget::from_parts(&r.target_kind, r.target_id)
            .ok_or_else(|| decode_error(format!("unknown offer target {}", r.target_kind)))?;
        Ok(Offer {
            id: r.id, name: r.name, target, discount_percent: r.discount_percent, starts_at: r.starts_at,
            ends_at: r.ends_at, is_active: r.is_active, created_at: r.created_at,
        })
    }
}

const SELECT: &str = "SELECT id, name, target_kind, target_id, discount_percent, starts_at, ends_at, is_active, created_at FROM offers";

fn collect(rows: Vec<OfferRow>) -> Result<Vec<Offer>, sqlx::Error> { rows.into_iter().map(Offer::try_from).collect() }

pub async fn list(conn: &mut PgConnection) -> Result<Vec<Offer>, sqlx::Error> {
    collect(sqlx::query_as::<_, OfferRow>(&format!("{SELECT} ORDER BY created_at DESC")).fetch_all(&mut *conn).await?)
}

/// Offers running at `now`.
pub async fn list_live(conn: &mut PgConnection, now: DateTime<Utc>) -> Result<Vec<Offer>, sqlx::Error> {
    collect(sqlx::query_as::<_, OfferRow>(&format!("{SELECT} WHERE is_active AND starts_at <= $1 AND ends_at > $1"))
        .bind(now).fetch_all(&mut *conn).await?)
}

pub async fn find(conn: &mut PgConnection, id: Uuid) -> Result<Option<Offer>, sqlx::Error> {
    sqlx::query_as::<_, OfferRow>(&format!("{SELECT} WHERE id = $1"))
        .bind(id).fetch_optional(&mut *conn).await?
        .map(Offer::try_from).transpose()
}

pub async fn insert(conn: &mut PgConnection, o: &Offer) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO offers (id, name, target_kind, target_id, discount_percent, starts_at, ends_at, is_active, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)")
        .bind(o.id).bind(&o.name).bind(o.target.kind()).bind(o.target.id()).bind(o.discount_percent)
        .bind(o.starts_at).bind(o.ends_at).bind(o.is_active).bind(o.created_at)
        .execute(&mut *conn).await?;
    Ok(())
}

pub async fn update(conn: &mut PgConnection, o: &Offer) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE offers SET name = $2, target_kind = $3, target_id = $4, discount_percent = $5, starts_at = $6, ends_at = $7, is_active = $8 WHERE id = $1")
        .bind(o.id).bind(&o.name).bind(o.target.kind()).bind(o.target.id()).bind(o.discount_percent)
        .bind(o.starts_at).bind(o.ends_at).bind(o.is_active)
        .execute(&mut *conn).await?;
    Ok(())
}

pub async fn delete(conn: &mut PgConnection, id: Uuid) -> Result<bool, sqlx::Error> {
    Ok(sqlx::query("DELETE FROM offers WHERE id = $1").bind(id).execute(&mut *conn).await?.rows_affected() == 1)
}
