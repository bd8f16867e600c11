//! Product Repository

use super::RepoResult;
use shared::models::Product;
use shared::models::product::{ProductCreate, ProductUpdate};
use shared::util::{new_id, now_millis};
use sqlx::SqlitePool;

#[derive(sqlx::FromRow)]
struct ProductRow {
    id: String,
    name: String,
    description: Option<String>,
    price_minor: i64,
    currency: String,
    category: Option<String>,
    is_active: bool,
    created_at: i64,
    updated_at: i64,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            name: row.name,
            description: row.description,
            price_minor: row.price_minor,
            currency: row.currency,
            category: row.category,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

const SELECT_COLUMNS: &str =
    "id, name, description, price_minor, currency, category, is_active, created_at, updated_at";

/// Insert a new product
pub async fn insert(pool: &SqlitePool, create: ProductCreate) -> RepoResult<Product> {
    let now = now_millis();
    let product = Product {
        id: new_id(),
        name: create.name,
        description: create.description,
        price_minor: create.price_minor,
        currency: create.currency,
        category: create.category,
        is_active: true,
        created_at: now,
        updated_at: now,
    };

    sqlx::query(
        "INSERT INTO products (id, name, description, price_minor, currency, category, is_active, created_at, updated_at) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
    )
    .bind(&product.id)
    .bind(&product.name)
    .bind(&product.description)
    .bind(product.price_minor)
    .bind(&product.currency)
    .bind(&product.category)
    .bind(product.is_active)
    .bind(product.created_at)
    .bind(product.updated_at)
    .execute(pool)
    .await?;

    Ok(product)
}

/// Get a product by id
pub async fn get(pool: &SqlitePool, id: &str) -> RepoResult<Option<Product>> {
    let sql = format!("SELECT {SELECT_COLUMNS} FROM products WHERE id = ?");
    let row: Option<ProductRow> = sqlx::query_as(&sql).bind(id).fetch_optional(pool).await?;
    Ok(row.map(Into::into))
}

/// Partial update; returns the fresh row or None when absent
pub async fn update(
    pool: &SqlitePool,
    id: &str,
    update: ProductUpdate,
) -> RepoResult<Option<Product>> {
    let result = sqlx::query(
        "UPDATE products SET \
             name = COALESCE(?, name), \
             description = COALESCE(?, description), \
             price_minor = COALESCE(?, price_minor), \
             category = COALESCE(?, category), \
             is_active = COALESCE(?, is_active), \
             updated_at = ? \
         WHERE id = ?",
    )
    .bind(&update.name)
    .bind(&update.description)
    .bind(update.price_minor)
    .bind(&update.category)
    .bind(update.is_active)
    .bind(now_millis())
    .bind(id)
    .execute(pool)
    .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get(pool, id).await
}

/// List active products, filtered and keyset-paginated by id
pub async fn list(
    pool: &SqlitePool,
    limit: i64,
    after_id: Option<&str>,
    category: Option<&str>,
    search: Option<&str>,
) -> RepoResult<Vec<Product>> {
    let mut sql = format!("SELECT {SELECT_COLUMNS} FROM products WHERE is_active = 1");
    if category.is_some() {
        sql.push_str(" AND category = ?");
    }
    if search.is_some() {
        sql.push_str(" AND name LIKE ?");
    }
    if after_id.is_some() {
        sql.push_str(" AND id > ?");
    }
    sql.push_str(" ORDER BY id ASC LIMIT ?");

    let mut query = sqlx::query_as::<_, ProductRow>(&sql);
    if let Some(category) = category {
        query = query.bind(category);
    }
    if let Some(search) = search {
        query = query.bind(format!("%{}%", search.replace('%', "\\%")));
    }
    if let Some(after_id) = after_id {
        query = query.bind(after_id);
    }
    let rows = query.bind(limit).fetch_all(pool).await?;
    Ok(rows.into_iter().map(Into::into).collect())
}
