//! Catalog cache: read-through population, write invalidation, and the
//! staleness window the contract allows.

mod common;

use common::test_state;
use order_server::ErrorCode;
use order_server::services::catalog_service::ListProductsParams;
use shared::models::product::{ProductCreate, ProductUpdate};

fn widget(price_minor: i64) -> ProductCreate {
    ProductCreate {
        name: "Widget".into(),
        description: Some("A fine widget".into()),
        price_minor,
        currency: "USD".into(),
        category: Some("tools".into()),
    }
}

#[tokio::test]
async fn read_through_populates_and_serves_from_cache() {
    let (state, _dir) = test_state().await;
    let product = state
        .catalog_service
        .create_product(widget(500))
        .await
        .unwrap();

    // First read fills the cache
    let first = state.catalog_service.get_product(&product.id).await.unwrap();
    assert_eq!(first.price_minor, 500);

    // Mutate the row behind the cache's back; the stale snapshot is allowed
    sqlx::query("UPDATE products SET price_minor = 999 WHERE id = ?")
        .bind(&product.id)
        .execute(&state.pool)
        .await
        .unwrap();
    let cached = state.catalog_service.get_product(&product.id).await.unwrap();
    assert_eq!(cached.price_minor, 500, "within TTL the cache may serve stale");
}

#[tokio::test]
async fn update_invalidates_product_and_list_caches() {
    let (state, _dir) = test_state().await;
    let product = state
        .catalog_service
        .create_product(widget(500))
        .await
        .unwrap();

    // Warm both caches
    state.catalog_service.get_product(&product.id).await.unwrap();
    let page = state
        .catalog_service
        .list_products(ListProductsParams::default())
        .await
        .unwrap();
    assert_eq!(page.products.len(), 1);

    // A write invalidates; the next read sees the new price immediately
    state
        .catalog_service
        .update_product(
            &product.id,
            ProductUpdate {
                price_minor: Some(750),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let fresh = state.catalog_service.get_product(&product.id).await.unwrap();
    assert_eq!(fresh.price_minor, 750);
    let page = state
        .catalog_service
        .list_products(ListProductsParams::default())
        .await
        .unwrap();
    assert_eq!(page.products[0].price_minor, 750);
}

#[tokio::test]
async fn stock_adjustment_bypasses_catalog_staleness() {
    let (state, _dir) = test_state().await;
    let product = state
        .catalog_service
        .create_product(widget(500))
        .await
        .unwrap();

    state
        .inventory_service
        .adjust(&product.id, 7, "restock")
        .await
        .unwrap();

    // Availability checks read the source of truth, never the catalog cache
    let level = state
        .inventory_service
        .get_inventory(&product.id)
        .await
        .unwrap();
    assert_eq!(level.available, 7);
    assert_eq!(level.total, 7);
}

#[tokio::test]
async fn missing_product_is_not_found() {
    let (state, _dir) = test_state().await;
    let err = state
        .catalog_service
        .get_product("ghost")
        .await
        .unwrap_err();
    assert_eq!(err.code, ErrorCode::ProductNotFound);
}

#[tokio::test]
async fn list_filters_by_category_and_search() {
    let (state, _dir) = test_state().await;
    state.catalog_service.create_product(widget(500)).await.unwrap();
    state
        .catalog_service
        .create_product(ProductCreate {
            name: "Gadget".into(),
            description: None,
            price_minor: 300,
            currency: "USD".into(),
            category: Some("toys".into()),
        })
        .await
        .unwrap();

    let tools = state
        .catalog_service
        .list_products(ListProductsParams {
            category: Some("tools".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(tools.products.len(), 1);
    assert_eq!(tools.products[0].name, "Widget");

    let search = state
        .catalog_service
        .list_products(ListProductsParams {
            search: Some("Gad".into()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(search.products.len(), 1);
    assert_eq!(search.products[0].name, "Gadget");
}
