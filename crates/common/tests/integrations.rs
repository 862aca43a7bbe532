//! Social profile sync

mod support;

use std::sync::Arc;
use support::{memory_cache, Harness};
use vendly_common::catalog::CatalogService;
use vendly_common::integrations::{IntegrationService, Platform, SocialProfile};
use vendly_common::testing::FakeSocialClient;
use vendly_common::AppError;

fn instagram_profile() -> SocialProfile {
    SocialProfile {
        external_id: "17841400000000000".to_string(),
        username: "janeshop".to_string(),
        display_name: Some("Jane Shop".to_string()),
        avatar_url: Some("https://cdn.instagram.test/jane.jpg".to_string()),
        follower_count: Some(1200),
        media_count: Some(87),
    }
}

#[tokio::test]
async fn test_sync_upserts_account_and_sets_logo() {
    let h = Harness::new();
    let (user, ctx) = h.seller_with_store("jane@example.com", "Jane Shop").await;
    h.repo.link_account(user.user_id, "instagram", "ig-token").await;

    let cache = memory_cache();
    let catalog = CatalogService::new(h.repo.clone(), cache.clone(), 300);
    let client = FakeSocialClient::new()
        .with_profile(Platform::Instagram, instagram_profile())
        .await;
    let service = IntegrationService::new(h.repo.clone(), cache, Arc::new(client.clone()));

    // warm the storefront cache
    assert!(catalog.storefront("jane-shop").await.unwrap().store.logo_url.is_none());
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    let result = service
        .sync(user.user_id, &ctx, Platform::Instagram, true)
        .await
        .unwrap();

    assert!(result.success);
    assert!(result.logo_updated);
    assert_eq!(result.account.username, "janeshop");
    assert_eq!(result.account.platform, "instagram");
    assert_eq!(result.account.follower_count, Some(1200));
    assert_eq!(client.tokens().await, vec!["ig-token".to_string()]);

    let view = catalog.storefront("jane-shop").await.unwrap();
    assert_eq!(
        view.store.logo_url.as_deref(),
        Some("https://cdn.instagram.test/jane.jpg")
    );
}

#[tokio::test]
async fn test_resync_keeps_one_row_per_platform() {
    let h = Harness::new();
    let (user, ctx) = h.seller_with_store("jane@example.com", "Jane Shop").await;
    h.repo.link_account(user.user_id, "instagram", "ig-token").await;

    let client = FakeSocialClient::new()
        .with_profile(Platform::Instagram, instagram_profile())
        .await;
    let service = IntegrationService::new(h.repo.clone(), memory_cache(), Arc::new(client));

    let first = service
        .sync(user.user_id, &ctx, Platform::Instagram, false)
        .await
        .unwrap();
    let second = service
        .sync(user.user_id, &ctx, Platform::Instagram, false)
        .await
        .unwrap();

    assert!(!second.logo_updated);
    assert_eq!(first.account.id, second.account.id);
    assert_eq!(h.repo.social_accounts(ctx.tenant.id).await.len(), 1);
}

#[tokio::test]
async fn test_logo_untouched_without_flag() {
    let h = Harness::new();
    let (user, ctx) = h.seller_with_store("jane@example.com", "Jane Shop").await;
    h.repo.link_account(user.user_id, "instagram", "ig-token").await;

    let client = FakeSocialClient::new()
        .with_profile(Platform::Instagram, instagram_profile())
        .await;
    let service = IntegrationService::new(h.repo.clone(), memory_cache(), Arc::new(client));

    service
        .sync(user.user_id, &ctx, Platform::Instagram, false)
        .await
        .unwrap();

    use vendly_common::db::TenantRepository;
    let store = h.repo.find_store_by_slug("jane-shop").await.unwrap().unwrap();
    assert!(store.logo_url.is_none());
}

#[tokio::test]
async fn test_missing_link_is_not_found() {
    let h = Harness::new();
    let (user, ctx) = h.seller_with_store("jane@example.com", "Jane Shop").await;
    let service = IntegrationService::new(
        h.repo.clone(),
        memory_cache(),
        Arc::new(FakeSocialClient::new()),
    );

    let err = service
        .sync(user.user_id, &ctx, Platform::Tiktok, false)
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::NotFound { .. }));
    assert_eq!(err.status_code().as_u16(), 404);
}

#[tokio::test]
async fn test_upstream_failure_is_bad_gateway() {
    let h = Harness::new();
    let (user, ctx) = h.seller_with_store("jane@example.com", "Jane Shop").await;
    h.repo.link_account(user.user_id, "tiktok", "tt-token").await;

    // no TikTok profile configured, so the fake fails like the API would
    let service = IntegrationService::new(
        h.repo.clone(),
        memory_cache(),
        Arc::new(FakeSocialClient::new()),
    );

    let err = service
        .sync(user.user_id, &ctx, Platform::Tiktok, true)
        .await
        .unwrap_err();
    assert_eq!(err.status_code().as_u16(), 502);
    assert!(h.repo.social_accounts(ctx.tenant.id).await.is_empty());
}
