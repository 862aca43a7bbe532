//! Background site generation jobs

mod support;

use std::sync::Arc;
use std::time::Duration;
use support::{memory_cache, Harness};
use uuid::Uuid;
use vendly_common::auth::TenantContext;
use vendly_common::db::TenantRepository;
use vendly_common::site_builder::{JobStatus, SiteBuilder, SiteJob};
use vendly_common::testing::FakeSiteGenerator;
use vendly_common::AppError;

const DESIGN: &str = r##"Here you go:
{"theme":"bold","primaryColor":"#1a2b3c","secondaryColor":"#fafafa","headline":"Made by hand","tagline":"Since 2020"}"##;

async fn wait_for(builder: &SiteBuilder, ctx: &TenantContext, id: Uuid) -> SiteJob {
    for _ in 0..200 {
        let job = builder.get(ctx, id).unwrap();
        if job.status.is_finished() {
            return job;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("job {} did not finish", id);
}

#[tokio::test]
async fn test_job_completes_and_applies_branding() {
    let h = Harness::new();
    let (_, ctx) = h.seller_with_store("jane@example.com", "Jane Shop").await;
    let builder = SiteBuilder::new(
        h.repo.clone(),
        memory_cache(),
        Arc::new(FakeSiteGenerator::replying(DESIGN)),
    );

    let job = builder
        .start(&ctx, "Warm, earthy, handmade feel".to_string())
        .unwrap();
    assert_eq!(job.status, JobStatus::Pending);
    assert_eq!(job.tenant_id, ctx.tenant.id);

    let done = wait_for(&builder, &ctx, job.id).await;
    assert_eq!(done.status, JobStatus::Completed);
    assert!(done.error.is_none());
    let design = done.design.unwrap();
    assert_eq!(design.theme, "bold");
    assert_eq!(design.headline.as_deref(), Some("Made by hand"));

    let store = h.repo.find_store_by_slug("jane-shop").await.unwrap().unwrap();
    assert_eq!(store.theme.as_deref(), Some("bold"));
    assert_eq!(store.primary_color.as_deref(), Some("#1a2b3c"));
    assert_eq!(store.secondary_color.as_deref(), Some("#fafafa"));
}

#[tokio::test]
async fn test_generator_error_fails_job() {
    let h = Harness::new();
    let (_, ctx) = h.seller_with_store("jane@example.com", "Jane Shop").await;
    let builder = SiteBuilder::new(
        h.repo.clone(),
        memory_cache(),
        Arc::new(FakeSiteGenerator::failing("model overloaded")),
    );

    let job = builder.start(&ctx, "Anything".to_string()).unwrap();
    let done = wait_for(&builder, &ctx, job.id).await;

    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.error.unwrap().contains("model overloaded"));
    assert!(done.design.is_none());

    let store = h.repo.find_store_by_slug("jane-shop").await.unwrap().unwrap();
    assert!(store.theme.is_none());
}

#[tokio::test]
async fn test_unparseable_reply_fails_job() {
    let h = Harness::new();
    let (_, ctx) = h.seller_with_store("jane@example.com", "Jane Shop").await;
    let builder = SiteBuilder::new(
        h.repo.clone(),
        memory_cache(),
        Arc::new(FakeSiteGenerator::replying("I cannot help with that.")),
    );

    let job = builder.start(&ctx, "Anything".to_string()).unwrap();
    let done = wait_for(&builder, &ctx, job.id).await;
    assert_eq!(done.status, JobStatus::Failed);
    assert!(done.error.is_some());
}

#[tokio::test]
async fn test_prompt_length() {
    let h = Harness::new();
    let (_, ctx) = h.seller_with_store("jane@example.com", "Jane Shop").await;
    let builder = SiteBuilder::new(
        h.repo.clone(),
        memory_cache(),
        Arc::new(FakeSiteGenerator::replying(DESIGN)),
    );

    let err = builder.start(&ctx, "   ".to_string()).unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));

    let err = builder.start(&ctx, "x".repeat(2001)).unwrap_err();
    assert_eq!(err.status_code().as_u16(), 400);

    assert!(builder.start(&ctx, "x".repeat(2000)).is_ok());
}

#[tokio::test]
async fn test_jobs_are_tenant_scoped() {
    let h = Harness::new();
    let (_, jane) = h.seller_with_store("jane@example.com", "Jane Shop").await;
    let (_, john) = h.seller_with_store("john@example.com", "John Shop").await;
    let builder = SiteBuilder::new(
        h.repo.clone(),
        memory_cache(),
        Arc::new(FakeSiteGenerator::replying(DESIGN)),
    );

    let job = builder.start(&jane, "Anything".to_string()).unwrap();

    let err = builder.get(&john, job.id).unwrap_err();
    assert!(matches!(err, AppError::JobNotFound { .. }));
    assert_eq!(err.status_code().as_u16(), 404);

    assert!(builder.get(&jane, Uuid::new_v4()).is_err());
}

#[tokio::test]
async fn test_finished_jobs_expire_after_retention() {
    let h = Harness::new();
    let (_, ctx) = h.seller_with_store("jane@example.com", "Jane Shop").await;
    let builder = SiteBuilder::new(
        h.repo.clone(),
        memory_cache(),
        Arc::new(FakeSiteGenerator::replying(DESIGN)),
    )
    .with_retention(Duration::from_millis(250));

    let job = builder.start(&ctx, "Anything".to_string()).unwrap();
    let done = wait_for(&builder, &ctx, job.id).await;
    assert_eq!(done.status, JobStatus::Completed);

    tokio::time::sleep(Duration::from_millis(600)).await;

    let err = builder.get(&ctx, job.id).unwrap_err();
    assert!(matches!(err, AppError::JobNotFound { .. }));
}
