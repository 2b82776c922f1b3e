use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgConnection;
use uuid::Uuid;
use crate::db::{decode_error, Page};
use crate::domain::aggregates::{EntryKind, Wallet, WalletEntry};
use crate::domain::value_objects::Money;

#[derive(sqlx::FromRow)]
struct EntryRow {
    id: Uuid, user_id: Uuid, kind: String, amount: Decimal, description: String,
    order_id: Option<Uuid>, created_at: DateTime<Utc>,
}

impl TryFrom<EntryRow> for WalletEntry {
    type Error = sqlx::Error;
    fn try_from(r: EntryRow) -> Result<Self, Self::Error> {
        let kind = EntryKind::parse(&r.kind).ok_or_else(|| decode_error(format!("unknown wallet entry kind {}", r.kind)))?;
        Ok(WalletEntry { id: r.id, user_id: r.user_id, kind, amount: Money::new(r.amount), description: r.description, order_id: r.order_id, created_at: r.created_at })
    }
}

pub async fn load(conn: &mut PgConnection, user_id: Uuid) -> Result<Wallet, sqlx::Error> {
    let (balance,): (Decimal,) = sqlx::query_as("SELECT COALESCE(SUM(CASE WHEN kind = 'credit' THEN amount ELSE -amount END), 0) FROM wallet_entries WHERE user_id = $1")
        .bind(user_id).fetch_one(&mut *conn).await?;
    Ok(Wallet::new(user_id, Money::new(balance)))
}

/// Ledger entries, newest first.
pub async fn entries(conn: &mut PgConnection, user_id: Uuid, page: Page) -> Result<(Vec<WalletEntry>, i64), sqlx::Error> {
    let rows = sqlx::query_as::<_, EntryRow>("SELECT id, user_id, kind, amount, description, order_id, created_at FROM wallet_entries WHERE user_id = $1 ORDER BY created_at DESC, id DESC LIMIT $2 OFFSET $3")
        .bind(user_id).bind(page.limit()).bind(page.offset()).fetch_all(&mut *conn).await?;
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM wallet_entries WHERE user_id = $1").bind(user_id).fetch_one(&mut *conn).await?;
    let entries = rows.into_iter().map(WalletEntry::try_from).collect::<Result<_, _>>()?;
    Ok((entries, total))
}

pub async fn insert(conn: &mut PgConnection, e: &WalletEntry) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO wallet_entries (id, user_id, kind, amount, description, order_id, created_at) VALUES ($1, $2, $3, $4, $5, $6, $7)")
        .bind(e.id).bind(e.user_id).bind(e.kind.as_str()).bind(e.amount.amount()).bind(&e.description).bind(e.order_id).bind(e.created_at)
        .execute(&mut *conn).await?;
    Ok(())
}
