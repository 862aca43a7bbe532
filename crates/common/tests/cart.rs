//! Cart upsert semantics

mod support;

use support::{memory_cache, seller, Harness};
use uuid::Uuid;
use vendly_common::auth::TenantContext;
use vendly_common::cart::CartService;
use vendly_common::catalog::{CatalogService, NewProduct};
use vendly_common::db::models::{Product, ProductStatus};
use vendly_common::AppError;

async fn stocked_store(h: &Harness) -> (TenantContext, Product) {
    let (_, ctx) = h.seller_with_store("jane@example.com", "Jane Shop").await;
    let catalog = CatalogService::new(h.repo.clone(), memory_cache(), 300);
    let mug = catalog
        .create_product(
            &ctx,
            NewProduct {
                name: "Mug".to_string(),
                description: None,
                price_cents: 1500,
                currency: None,
                stock_quantity: 10,
                images: vec![],
                status: None,
            },
        )
        .await
        .unwrap();
    (ctx, mug)
}

#[tokio::test]
async fn test_insert_then_set_quantity() {
    let h = Harness::new();
    let (ctx, mug) = stocked_store(&h).await;
    let cart = CartService::new(h.repo.clone());
    let shopper = seller("shopper@example.com").user_id;

    let first = cart
        .upsert_item(shopper, mug.id, ctx.store.id, 2)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(first.quantity, 2);

    let second = cart
        .upsert_item(shopper, mug.id, ctx.store.id, 5)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.id, first.id);
    assert_eq!(second.quantity, 5);

    let items = cart.list(shopper).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].quantity, 5);
}

#[tokio::test]
async fn test_zero_quantity_removes_and_never_inserts() {
    let h = Harness::new();
    let (ctx, mug) = stocked_store(&h).await;
    let cart = CartService::new(h.repo.clone());
    let shopper = Uuid::new_v4();

    // nothing to remove
    assert!(cart
        .upsert_item(shopper, mug.id, ctx.store.id, 0)
        .await
        .unwrap()
        .is_none());
    assert!(cart.list(shopper).await.unwrap().is_empty());

    cart.upsert_item(shopper, mug.id, ctx.store.id, 3).await.unwrap();
    assert!(cart
        .upsert_item(shopper, mug.id, ctx.store.id, 0)
        .await
        .unwrap()
        .is_none());
    assert!(cart.list(shopper).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_zero_quantity_for_unknown_product_is_not_an_error() {
    let h = Harness::new();
    let cart = CartService::new(h.repo.clone());

    let result = cart
        .upsert_item(Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4(), 0)
        .await
        .unwrap();
    assert!(result.is_none());
}

#[tokio::test]
async fn test_quantity_bounds() {
    let h = Harness::new();
    let (ctx, mug) = stocked_store(&h).await;
    let cart = CartService::new(h.repo.clone());
    let shopper = Uuid::new_v4();

    let err = cart
        .upsert_item(shopper, mug.id, ctx.store.id, 1000)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let err = cart.upsert_item(shopper, mug.id, ctx.store.id, -1).await.unwrap_err();
    assert_eq!(err.status_code().as_u16(), 400);

    assert!(cart
        .upsert_item(shopper, mug.id, ctx.store.id, 999)
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_product_must_be_available_in_store() {
    let h = Harness::new();
    let (ctx, mug) = stocked_store(&h).await;
    let catalog = CatalogService::new(h.repo.clone(), memory_cache(), 300);
    let cart = CartService::new(h.repo.clone());
    let shopper = Uuid::new_v4();

    // wrong store
    let err = cart
        .upsert_item(shopper, mug.id, Uuid::new_v4(), 1)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::ProductNotFound { .. }));

    // draft
    catalog
        .update_product(
            &ctx,
            mug.id,
            vendly_common::catalog::ProductPatch {
                status: Some(ProductStatus::Draft),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    let err = cart.upsert_item(shopper, mug.id, ctx.store.id, 1).await.unwrap_err();
    assert_eq!(err.status_code().as_u16(), 404);

    // deleted
    catalog.delete_product(&ctx, mug.id).await.unwrap();
    let err = cart.upsert_item(shopper, mug.id, ctx.store.id, 1).await.unwrap_err();
    assert_eq!(err.status_code().as_u16(), 404);
    assert!(cart.list(shopper).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_remove_and_clear() {
    let h = Harness::new();
    let (ctx, mug) = stocked_store(&h).await;
    let cart = CartService::new(h.repo.clone());
    let shopper = Uuid::new_v4();
    let other = Uuid::new_v4();

    cart.upsert_item(shopper, mug.id, ctx.store.id, 1).await.unwrap();
    cart.upsert_item(other, mug.id, ctx.store.id, 1).await.unwrap();

    assert!(cart.remove(shopper, mug.id).await.unwrap());
    assert!(!cart.remove(shopper, mug.id).await.unwrap());

    cart.upsert_item(shopper, mug.id, ctx.store.id, 4).await.unwrap();
    assert_eq!(cart.clear(shopper).await.unwrap(), 1);
    assert!(cart.list(shopper).await.unwrap().is_empty());

    // other carts are untouched
    assert_eq!(cart.list(other).await.unwrap().len(), 1);
}
