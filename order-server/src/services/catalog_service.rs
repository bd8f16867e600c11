//! Catalog Service — product reads behind a read-through cache
//!
//! Per-product entries live under `product:<id>` for five minutes; list
//! pages live under a canonical-JSON key for two minutes. Writes invalidate
//! the touched product key and scan-and-delete the whole list prefix. Cache
//! failures only ever degrade to a direct database read.
//!
//! Freshness here is best-effort by contract: anything that needs exact
//! counters (availability checks during reservation) goes to the inventory
//! service, never through this cache.

use crate::cache::Cache;
use crate::db::repository::product as product_repo;
use serde::{Deserialize, Serialize};
use shared::error::{AppError, AppResult, ErrorCode};
use shared::models::Product;
use shared::models::product::{ProductCreate, ProductUpdate};
use sqlx::SqlitePool;
use std::sync::Arc;
use std::time::Duration;

const PRODUCT_KEY_PREFIX: &str = "product:";
const LIST_KEY_PREFIX: &str = "products:list:";

const MAX_LIST_LIMIT: i64 = 100;
const DEFAULT_LIST_LIMIT: i64 = 20;

/// List query. Field order matters: the cache key is the canonical JSON of
/// this struct, so identical queries always hash to the same key.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListProductsParams {
    pub limit: Option<i64>,
    pub cursor: Option<String>,
    pub category: Option<String>,
    pub search: Option<String>,
}

/// One page of products
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub next_cursor: Option<String>,
}

/// Product catalog with read-through caching
pub struct CatalogService {
    pool: SqlitePool,
    cache: Arc<dyn Cache>,
    product_ttl: Duration,
    list_ttl: Duration,
}

impl CatalogService {
    pub fn new(
        pool: SqlitePool,
        cache: Arc<dyn Cache>,
        product_ttl: Duration,
        list_ttl: Duration,
    ) -> Self {
        Self {
            pool,
            cache,
            product_ttl,
            list_ttl,
        }
    }

    fn product_key(id: &str) -> String {
        format!("{PRODUCT_KEY_PREFIX}{id}")
    }

    fn list_key(params: &ListProductsParams) -> String {
        let canonical = serde_json::json!({
            "limit": params.limit.unwrap_or(DEFAULT_LIST_LIMIT),
            "cursor": params.cursor,
            "category": params.category,
            "search": params.search,
        });
        format!("{LIST_KEY_PREFIX}{canonical}")
    }

    /// Read-through single product lookup
    pub async fn get_product(&self, id: &str) -> AppResult<Product> {
        let key = Self::product_key(id);
        if let Ok(Some(bytes)) = self.cache.get(&key).await {
            if let Ok(product) = serde_json::from_slice::<Product>(&bytes) {
                return Ok(product);
            }
        }

        let product = product_repo::get(&self.pool, id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::new(ErrorCode::ProductNotFound).with_detail("id", id))?;

        if let Ok(bytes) = serde_json::to_vec(&product) {
            if let Err(e) = self.cache.set(&key, bytes, self.product_ttl).await {
                tracing::warn!(error = %e, "Product cache write failed");
            }
        }
        Ok(product)
    }

    /// Read-through product listing
    pub async fn list_products(&self, params: ListProductsParams) -> AppResult<ProductPage> {
        let key = Self::list_key(&params);
        if let Ok(Some(bytes)) = self.cache.get(&key).await {
            if let Ok(page) = serde_json::from_slice::<ProductPage>(&bytes) {
                return Ok(page);
            }
        }

        let limit = params
            .limit
            .unwrap_or(DEFAULT_LIST_LIMIT)
            .clamp(1, MAX_LIST_LIMIT);
        let products = product_repo::list(
            &self.pool,
            limit,
            params.cursor.as_deref(),
            params.category.as_deref(),
            params.search.as_deref(),
        )
        .await
        .map_err(AppError::from)?;

        let next_cursor = if products.len() as i64 == limit {
            products.last().map(|p| p.id.clone())
        } else {
            None
        };
        let page = ProductPage {
            products,
            next_cursor,
        };

        if let Ok(bytes) = serde_json::to_vec(&page) {
            if let Err(e) = self.cache.set(&key, bytes, self.list_ttl).await {
                tracing::warn!(error = %e, "Product list cache write failed");
            }
        }
        Ok(page)
    }

    /// Create a product and invalidate the list caches
    pub async fn create_product(&self, create: ProductCreate) -> AppResult<Product> {
        if create.name.trim().is_empty() {
            return Err(AppError::with_message(
                ErrorCode::RequiredField,
                "name is required",
            ));
        }
        if create.price_minor < 0 {
            return Err(AppError::new(ErrorCode::ProductInvalidPrice));
        }

        let product = product_repo::insert(&self.pool, create)
            .await
            .map_err(AppError::from)?;
        self.invalidate_product(&product.id).await;
        tracing::info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    /// Update a product and invalidate its cache entries
    pub async fn update_product(&self, id: &str, update: ProductUpdate) -> AppResult<Product> {
        if let Some(price) = update.price_minor {
            if price < 0 {
                return Err(AppError::new(ErrorCode::ProductInvalidPrice));
            }
        }

        let product = product_repo::update(&self.pool, id, update)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::new(ErrorCode::ProductNotFound).with_detail("id", id))?;
        self.invalidate_product(id).await;
        tracing::info!(product_id = %id, "Product updated");
        Ok(product)
    }

    /// Drop the product key and every cached list page. Mutations that touch
    /// stock call this too, so catalog reads converge within one TTL.
    pub async fn invalidate_product(&self, id: &str) {
        if let Err(e) = self.cache.delete(&Self::product_key(id)).await {
            tracing::warn!(error = %e, "Product cache invalidation failed");
        }
        match self.cache.delete_prefix(LIST_KEY_PREFIX).await {
            Ok(removed) if removed > 0 => {
                tracing::debug!(removed, "List cache invalidated");
            }
            Ok(_) => {}
            Err(e) => tracing::warn!(error = %e, "List cache invalidation failed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_key_is_canonical() {
        let a = CatalogService::list_key(&ListProductsParams {
            limit: Some(20),
            cursor: None,
            category: Some("tools".into()),
            search: None,
        });
        let b = CatalogService::list_key(&ListProductsParams {
            limit: Some(20),
            cursor: None,
            category: Some("tools".into()),
            search: None,
        });
        assert_eq!(a, b);
        assert!(a.starts_with(LIST_KEY_PREFIX));
    }

    #[test]
    fn test_list_key_defaults_limit() {
        let explicit = CatalogService::list_key(&ListProductsParams {
            limit: Some(DEFAULT_LIST_LIMIT),
            ..Default::default()
        });
        let implicit = CatalogService::list_key(&ListProductsParams::default());
        assert_eq!(explicit, implicit);
    }

    #[test]
    fn test_distinct_queries_get_distinct_keys() {
        let a = CatalogService::list_key(&ListProductsParams {
            category: Some("tools".into()),
            ..Default::default()
        });
        let b = CatalogService::list_key(&ListProductsParams {
            category: Some("toys".into()),
            ..Default::default()
        });
        assert_ne!(a, b);
    }
}
