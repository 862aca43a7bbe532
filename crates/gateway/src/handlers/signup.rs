//! Admin account sign-up

use super::ApiJson;
use crate::AppState;
use axum::{extract::State, Json};
use vendly_common::errors::Result;
use vendly_common::onboarding::{AdminSignupRequest, AdminSignupResult};

/// `POST /api/admin-signup`
pub async fn admin_signup(
    State(state): State<AppState>,
    ApiJson(request): ApiJson<AdminSignupRequest>,
) -> Result<Json<AdminSignupResult>> {
    let result = state.onboarding.admin_signup(request).await?;
    Ok(Json(result))
}
