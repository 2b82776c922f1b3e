use axum::{extract::{Query, State}, Json};
use serde::Serialize;
use crate::db::{self, Page};
use crate::domain::aggregates::WalletEntry;
use crate::domain::value_objects::Money;
use crate::error::Result;
use crate::http::{extract::Customer, ListParams, PaginatedResponse};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct WalletView {
    pub balance: Money,
    pub entries: PaginatedResponse<WalletEntry>,
}

/// Balance plus the ledger, newest entries first.
pub async fn get_wallet(Customer(user_id): Customer, State(s): State<AppState>, Query(p): Query<ListParams>) -> Result<Json<WalletView>> {
    let page = Page::new(p.page, p.per_page);
    let mut conn = s.db.acquire().await?;
    let wallet = db::wallet::load(&mut conn, user_id).await?;
    let (entries, total) = db::wallet::entries(&mut conn, user_id, page).await?;
    Ok(Json(WalletView { balance: wallet.balance(), entries: PaginatedResponse::new(entries, total, page) }))
}
