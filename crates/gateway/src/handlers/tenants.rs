//! Tenant provisioning by platform admins

use super::ApiJson;
use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use vendly_common::auth::SessionUser;
use vendly_common::errors::Result;
use vendly_common::onboarding::{AdminProvisionResult, AdminTenantRequest};

/// `POST /api/tenants`, super admins only
pub async fn create_tenant(
    State(state): State<AppState>,
    user: SessionUser,
    ApiJson(request): ApiJson<AdminTenantRequest>,
) -> Result<(StatusCode, Json<AdminProvisionResult>)> {
    let result = state.onboarding.provision_for_admin(&user, request).await?;
    Ok((StatusCode::CREATED, Json(result)))
}
