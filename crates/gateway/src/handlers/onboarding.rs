//! Seller self-service onboarding

use super::ApiJson;
use crate::AppState;
use axum::{extract::State, Json};
use vendly_common::auth::SessionUser;
use vendly_common::errors::Result;
use vendly_common::onboarding::{OnboardingEnvelope, OnboardingResult};

/// `POST /api/onboarding`
pub async fn complete_onboarding(
    State(state): State<AppState>,
    user: SessionUser,
    ApiJson(envelope): ApiJson<OnboardingEnvelope>,
) -> Result<Json<OnboardingResult>> {
    let result = state
        .onboarding
        .complete_onboarding(user.user_id, &user.email, envelope.data)
        .await?;
    Ok(Json(result))
}
