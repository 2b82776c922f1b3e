use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;
use crate::domain::aggregates::Category;

#[derive(sqlx::FromRow)]
struct CategoryRow { id: Uuid, name: String, description: Option<String>, is_listed: bool, created_at: DateTime<Utc> }

impl From<CategoryRow> for Category {
    fn from(r: CategoryRow) -> Self {
        Category { id: r.id, name: r.name, description: r.description, is_listed: r.is_listed, created_at: r.created_at }
    }
}

const SELECT: &str = "SELECT id, name, description, is_listed, created_at FROM categories";

pub async fn list(conn: &mut PgConnection, listed_only: bool) -> Result<Vec<Category>, sqlx::Error> {
    let rows = sqlx::query_as::<_, CategoryRow>(&format!("{SELECT} WHERE ($1 = FALSE OR is_listed) ORDER BY name"))
        .bind(listed_only).fetch_all(&mut *conn).await?;
    Ok(rows.into_iter().map(Category::from).collect())
}

pub async fn find(conn: &mut PgConnection, id: Uuid) -> Result<Option<Category>, sqlx::Error> {
    let row = sqlx::query_as::<_, CategoryRow>(&format!("{SELECT} WHERE id = $1")).bind(id).fetch_optional(&mut *conn).await?;
    Ok(row.map(Category::from))
}

/// True when another category already uses `name`, ignoring case.
pub async fn name_taken(conn: &mut PgConnection, name: &str, except: Option<Uuid>) -> Result<bool, sqlx::Error> {
    let (taken,): (bool,) = sqlx::query_as("SELECT EXISTS (SELECT 1 FROM categories WHERE LOWER(name) = $1 AND ($2::uuid IS NULL OR id <> $2))")
        .bind(Category::name_key(name)).bind(except).fetch_one(&mut *conn).await?;
    Ok(taken)
}

pub async fn insert(conn: &mut PgConnection, c: &Category) -> Result<(), sqlx::Error> {
    sqlx::query("INSERT INTO categories (id, name, description, is_listed, created_at) VALUES ($1, $2, $3, $4, $5)")
        .bind(c.id).bind(&c.name).bind(&c.description).bind(c.is_listed).bind(c.created_at)
        .execute(&mut *conn).await?;
    Ok(())
}

pub async fn update(conn: &mut PgConnection, c: &Category) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE categories SET name = $2, description = $3, is_listed = $4 WHERE id = $1")
        .bind(c.id).bind(&c.name).bind(&c.description).bind(c.is_listed)
        .execute(&mut *conn).await?;
    Ok(())
}
