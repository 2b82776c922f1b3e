//! Sales reports for the back office.

use axum::{extract::{Query, State}, http::header, response::IntoResponse, Json};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::instrument;
use crate::db;
use crate::domain::report::{ReportPeriod, SalesReport};
use crate::error::{AppError, Result};
use crate::http::extract::Admin;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ReportQuery {
    #[serde(default = "daily")]
    pub period: String,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

fn daily() -> String { "daily".into() }

async fn build(s: &AppState, q: &ReportQuery) -> Result<SalesReport> {
    let range = ReportPeriod::parse(&q.period, q.from, q.to)?.range(Utc::now().date_naive())?;
    let mut conn = s.db.acquire().await?;
    let orders = db::orders::list_created_between(&mut conn, range.starts_at(), range.ends_before()).await?;
    Ok(SalesReport::build(range, &orders))
}

#[instrument(skip_all, fields(period = %q.period))]
pub async fn sales_report(_: Admin, State(s): State<AppState>, Query(q): Query<ReportQuery>) -> Result<Json<SalesReport>> {
    Ok(Json(build(&s, &q).await?))
}

#[instrument(skip_all, fields(period = %q.period))]
pub async fn sales_report_csv(_: Admin, State(s): State<AppState>, Query(q): Query<ReportQuery>) -> Result<impl IntoResponse> {
    let report = build(&s, &q).await?;
    let body = report.to_csv().map_err(|e| AppError::Internal(e.into()))?;
    let disposition = format!("attachment; filename=\"sales-{}-{}.csv\"", report.range.from, report.range.to);
    Ok(([(header::CONTENT_TYPE, "text/csv; charset=utf-8".to_string()), (header::CONTENT_DISPOSITION, disposition)], body))
}
