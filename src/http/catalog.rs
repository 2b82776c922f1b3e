//! Storefront catalog: listed products with their live offer price.

use axum::{extract::{Path, Query, State}, Json};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::db::{self, products::{ProductFilter, ProductSort}, Page};
use crate::domain::aggregates::{best_discount, offer_price, Category, Offer, Product};
use crate::domain::value_objects::Money;
use crate::error::{AppError, Result};
use crate::http::PaginatedResponse;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct ProductView {
    #[serde(flatten)]
    pub product: Product,
    pub discount_percent: Decimal,
    pub offer_price: Money,
    pub in_stock: bool,
}

impl ProductView {
    pub fn priced(product: Product, offers: &[Offer], now: DateTime<Utc>) -> Self {
        let discount_percent = best_discount(offers, product.id, product.category_id, now);
        Self { offer_price: offer_price(product.price, discount_percent), discount_percent, in_stock: product.stock > 0, product }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProductQuery {
    pub search: Option<String>,
    pub category: Option<Uuid>,
    pub sort: Option<ProductSort>,
    pub page: Option<u32>,
    pub per_page: Option<u32>,
}

impl ProductQuery {
    pub fn filter(&self, listed_only: bool) -> ProductFilter {
        ProductFilter { search: self.search.clone(), category_id: self.category, sort: self.sort.unwrap_or_default(), listed_only }
    }
}

pub async fn list_products(State(s): State<AppState>, Query(q): Query<ProductQuery>) -> Result<Json<PaginatedResponse<ProductView>>> {
    let page = Page::new(q.page, q.per_page);
    let now = Utc::now();
    let mut conn = s.db.acquire().await?;
    let (products, total) = db::products::list(&mut conn, &q.filter(true), page).await?;
    let offers = db::offers::list_live(&mut conn, now).await?;
    let data = products.into_iter().map(|p| ProductView::priced(p, &offers, now)).collect();
    Ok(Json(PaginatedResponse::new(data, total, page)))
}

pub async fn get_product(State(s): State<AppState>, Path(id): Path<Uuid>) -> Result<Json<ProductView>> {
    let now = Utc::now();
    let mut conn = s.db.acquire().await?;
    let product = db::products::find(&mut conn, id).await?
        .filter(Product::is_listed)
        .ok_or(AppError::NotFound("product not found"))?;
    let offers = db::offers::list_live(&mut conn, now).await?;
    Ok(Json(ProductView::priced(product, &offers, now)))
}

pub async fn list_categories(State(s): State<AppState>) -> Result<Json<Vec<Category>>> {
    let mut conn = s.db.acquire().await?;
    Ok(Json(db::categories::list(&mut conn, true).await?))
}
