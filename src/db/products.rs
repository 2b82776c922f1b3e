use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;
use sqlx::PgConnection;
use uuid::Uuid;
use crate::db::{to_i32, to_u32, Page};
use crate::domain::aggregates::Product;
use crate::domain::value_objects::Money;

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: Uuid, name: String, description: String, category_id: Uuid, category_listed: bool,
    price: Decimal, stock: i32, images: Vec<String>, is_active: bool,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl TryFrom<ProductRow> for Product {
    type Error = sqlx::Error;
    fn try_from(r: ProductRow) -> Result<Self, Self::Error> {
        Ok(Product {
            id: r.id, name: r.name, description: r.description, category_id: r.category_id,
            category_listed: r.category_listed, price: Money::new(r.price), stock: to_u32(r.stock, "products.stock")?,
            images: r.images, is_active: r.is_active, created_at: r.created_at, updated_at: r.updated_at,
        })
    }
}

const SELECT: &str = "SELECT p.id, p.name, p.description, p.category_id, c.is_listed AS category_listed, p.price, p.stock, p.images, p.is_active, p.created_at, p.updated_at FROM products p JOIN categories c ON c.id = p.category_id";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    #[default]
    Newest,
    PriceAsc,
    PriceDesc,
    NameAsc,
    NameDesc,
}

impl ProductSort {
    fn order_by(&self) -> &'static str {
        match self {
            Self::Newest => "p.created_at DESC",
            Self::PriceAsc => "p.price ASC, p.created_at DESC",
            Self::PriceDesc => "p.price DESC, p.created_at DESC",
            Self::NameAsc => "LOWER(p.name) ASC",
            Self::NameDesc => "LOWER(p.name) DESC",
        }
    }
}

#[derive(Clone, Debug, Default)]
pub struct ProductFilter {
    pub search: Option<String>,
    pub category_id: Option<Uuid>,
    pub sort: ProductSort,
    /// Storefront view: active products in listed categories.
    pub listed_only: bool,
}

const FILTER: &str = "WHERE ($1::text IS NULL OR STRPOS(LOWER(p.name), LOWER($1)) > 0) AND ($2::uuid IS NULL OR p.category_id = $2) AND ($3 = FALSE OR (p.is_active AND c.is_listed))";

pub async fn list(conn: &mut PgConnection, filter: &ProductFilter, page: Page) -> Result<(Vec<Product>, i64), sqlx::Error> {
    let search = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
    let rows = sqlx::query_as::<_, ProductRow>(&format!("{SELECT} {FILTER} ORDER BY {} LIMIT $4 OFFSET $5", filter.sort.order_by()))
        .bind(search).bind(filter.category_id).bind(filter.listed_only).bind(page.limit()).bind(page.offset())
        .fetch_all(&mut *conn).await?;
    let (total,): (i64,) = sqlx::query_as(&format!("SELECT COUNT(*) FROM products p JOIN categories c ON c.id = p.category_id {FILTER}"))
        .bind(search).bind(filter.category_id).bind(filter.listed_only)
        .fetch_one(&mut *conn).await?;
    let products = rows.into_iter().map(Product::try_from).collect::<Result<_, _>>()?;
    Ok((products, total))
}

pub async fn find(conn: &mut PgConnection, id: Uuid) -> Result<Option<Product>, sqlx::Error> {
    sqlx::query_as::<_, ProductRow>(&format!("{SELECT} WHERE p.id = $1"))
        .bind(id).fetch_optional(&mut *conn).await?
        .map(Product::try_from).transpose()
}

pub async fn find_many(conn: &mut PgConnection, ids: &[Uuid]) -> Result<Vec<Product>, sqlx::Error> {
    if ids.is_empty() { return Ok(vec![]); }
    let rows = sqlx::query_as::<_, ProductRow>(&format!("{SELECT} WHERE p.id = ANY($1)"))
        .bind(ids).fetch_all(&mut *conn).await?;
    rows.into_iter().map(Product::try_from).collect()
}

pub async fn insert(conn: &mut PgConnection, p: &Product) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO products (id, name, description, category_id, price, stock, images, is_active, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)")
        .bind(p.id).bind(&p.name).bind(&p.description).bind(p.category_id).bind(p.price.amount())
        .bind(to_i32(p.stock)).bind(&p.images).bind(p.is_active).bind(p.created_at).bind(p.updated_at)
        .execute(&mut *conn).await?;
    Ok(())
}

pub async fn update(conn: &mut PgConnection, p: &Product) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE products SET name = $2, description = $3, category_id = $4, price = $5, stock = $6, images = $7, is_active = $8, updated_at = $9 WHERE id = $1")
        .bind(p.id).bind(&p.name).bind(&p.description).bind(p.category_id).bind(p.price.amount())
        .bind(to_i32(p.stock)).bind(&p.images).bind(p.is_active).bind(p.updated_at)
        .execute(&mut *conn).await?;
    Ok(())
}

/// Takes `qty` units off the shelf. False when stock is short; the row is left untouched.
pub async fn reserve_stock(conn: &mut PgConnection, id: Uuid, qty: u32) -> Result<bool, sqlx::Error> {
    let done = sqlx::query("UPDATE products SET stock = stock - $2, updated_at = NOW() WHERE id = $1 AND stock >= $2")
        .bind(id).bind(to_i32(qty)).execute(&mut *conn).await?;
    Ok(done.rows_affected() == 1)
}

pub async fn restock(conn: &mut PgConnection, id: Uuid, qty: u32) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE products SET stock = stock + $2, updated_at = NOW() WHERE id = $1")
        .bind(id).bind(to_i32(qty)).execute(&mut *conn).await?;
    Ok(())
}
