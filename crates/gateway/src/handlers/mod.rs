//! API handlers module

pub mod cart;
pub mod health;
pub mod integrations;
pub mod onboarding;
pub mod products;
pub mod signup;
pub mod site_builder;
pub mod stores;
pub mod tenants;

use crate::AppState;
use axum::extract::{FromRequest, FromRequestParts};
use vendly_common::auth::{self, SessionUser, TenantContext};
use vendly_common::errors::{AppError, Result};

/// JSON body whose rejections use the API error shape
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Path parameters whose rejections use the API error shape
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

/// Query string whose rejections use the API error shape
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Query), rejection(AppError))]
pub struct ApiQuery<T>(pub T);

/// Tenant, store and membership of the session user
pub async fn tenant_of(state: &AppState, user: &SessionUser) -> Result<TenantContext> {
    auth::tenant_context(state.repo.as_ref(), user).await
}
