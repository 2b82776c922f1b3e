//! Back-office product and category management.

use axum::{extract::{Path, Query, State}, http::StatusCode, Json};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;
use crate::db::{self, Page};
use crate::domain::aggregates::{Category, CategoryError, Product, ProductDetails};
use crate::domain::value_objects::Money;
use crate::error::{AppError, Result};
use crate::http::{catalog::ProductQuery, extract::{Admin, ValidJson}, PaginatedResponse};
use crate::state::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct ProductRequest {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
    #[serde(default)]
    #[validate(length(max = 5000))]
    pub description: String,
    pub category_id: Uuid,
    pub price: Decimal,
    #[serde(default)]
    pub stock: u32,
    #[serde(default)]
    #[validate(length(max = 10))]
    pub images: Vec<String>,
}

impl ProductRequest {
    fn details(self) -> ProductDetails {
        ProductDetails {
            name: self.name, description: self.description, category_id: self.category_id,
            price: Money::new(self.price), stock: self.stock, images: self.images,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ActiveToggle { pub active: bool }

#[derive(Debug, Deserialize)]
pub struct ListedToggle { pub listed: bool }

#[derive(Debug, Deserialize, Validate)]
pub struct CategoryRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 1000))]
    pub description: Option<String>,
}

async fn existing_category(conn: &mut PgConnection, id: Uuid) -> Result<Category> {
    db::categories::find(conn, id).await?.ok_or_else(|| AppError::BadRequest("category does not exist".into()))
}

pub async fn list_products(_: Admin, State(s): State<AppState>, Query(q): Query<ProductQuery>) -> Result<Json<PaginatedResponse<Product>>> {
    let page = Page::new(q.page, q.per_page);
    let mut conn = s.db.acquire().await?;
    let (products, total) = db::products::list(&mut conn, &q.filter(false), page).await?;
    Ok(Json(PaginatedResponse::new(products, total, page)))
}

#[instrument(skip_all)]
pub async fn create_product(_: Admin, State(s): State<AppState>, ValidJson(r): ValidJson<ProductRequest>) -> Result<(StatusCode, Json<Product>)> {
    let mut conn = s.db.acquire().await?;
    let category = existing_category(&mut conn, r.category_id).await?;
    let product = Product::create(r.details(), category.is_listed)?;
    db::products::insert(&mut conn, &product).await?;
    tracing::info!(product_id = %product.id, name = %product.name, "product created");
    Ok((StatusCode::CREATED, Json(product)))
}

#[instrument(skip_all, fields(product_id = %id))]
pub async fn update_product(_: Admin, State(s): State<AppState>, Path(id): Path<Uuid>, ValidJson(r): ValidJson<ProductRequest>) -> Result<Json<Product>> {
    let mut conn = s.db.acquire().await?;
    let mut product = db::products::find(&mut conn, id).await?.ok_or(AppError::NotFound("product not found"))?;
    let category = existing_category(&mut conn, r.category_id).await?;
    product.update(r.details(), category.is_listed)?;
    db::products::update(&mut conn, &product).await?;
    Ok(Json(product))
}

#[instrument(skip_all, fields(product_id = %id))]
pub async fn set_product_status(_: Admin, State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<ActiveToggle>) -> Result<Json<Product>> {
    let mut conn = s.db.acquire().await?;
    let mut product = db::products::find(&mut conn, id).await?.ok_or(AppError::NotFound("product not found"))?;
    product.set_active(r.active);
    db::products::update(&mut conn, &product).await?;
    tracing::info!(active = r.active, "product status changed");
    Ok(Json(product))
}

pub async fn list_categories(_: Admin, State(s): State<AppState>) -> Result<Json<Vec<Category>>> {
    let mut conn = s.db.acquire().await?;
    Ok(Json(db::categories::list(&mut conn, false).await?))
}

#[instrument(skip_all)]
pub async fn create_category(_: Admin, State(s): State<AppState>, ValidJson(r): ValidJson<CategoryRequest>) -> Result<(StatusCode, Json<Category>)> {
    let mut conn = s.db.acquire().await?;
    let category = Category::create(&r.name, r.description)?;
    if db::categories::name_taken(&mut conn, &category.name, None).await? {
        return Err(CategoryError::DuplicateName(category.name).into());
    }
    db::categories::insert(&mut conn, &category).await?;
    tracing::info!(category_id = %category.id, name = %category.name, "category created");
    Ok((StatusCode::CREATED, Json(category)))
}

#[instrument(skip_all, fields(category_id = %id))]
pub async fn update_category(_: Admin, State(s): State<AppState>, Path(id): Path<Uuid>, ValidJson(r): ValidJson<CategoryRequest>) -> Result<Json<Category>> {
    let mut conn = s.db.acquire().await?;
    let mut category = db::categories::find(&mut conn, id).await?.ok_or(AppError::NotFound("category not found"))?;
    category.rename(&r.name, r.description)?;
    if db::categories::name_taken(&mut conn, &category.name, Some(id)).await? {
        return Err(CategoryError::DuplicateName(category.name).into());
    }
    db::categories::update(&mut conn, &category).await?;
    Ok(Json(category))
}

#[instrument(skip_all, fields(category_id = %id))]
pub async fn set_category_listing(_: Admin, State(s): State<AppState>, Path(id): Path<Uuid>, Json(r): Json<ListedToggle>) -> Result<Json<Category>> {
    let mut conn = s.db.acquire().await?;
    let mut category = db::categories::find(&mut conn, id).await?.ok_or(AppError::NotFound("category not found"))?;
    category.is_listed = r.listed;
    db::categories::update(&mut conn, &category).await?;
    tracing::info!(listed = r.listed, "category listing changed");
    Ok(Json(category))
}
