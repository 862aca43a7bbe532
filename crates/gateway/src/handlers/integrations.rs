//! Instagram / TikTok profile sync

use super::{tenant_of, ApiJson, ApiPath};
use crate::AppState;
use axum::{extract::State, Json};
use serde::Deserialize;
use vendly_common::auth::SessionUser;
use vendly_common::errors::Result;
use vendly_common::integrations::{Platform, SyncResult};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncRequest {
    #[serde(default)]
    pub update_logo: bool,
}

/// `POST /api/integrations/{platform}/sync`
pub async fn sync_profile(
    State(state): State<AppState>,
    user: SessionUser,
    ApiPath(platform): ApiPath<String>,
    ApiJson(body): ApiJson<SyncRequest>,
) -> Result<Json<SyncResult>> {
    let platform: Platform = platform.parse()?;
    let ctx = tenant_of(&state, &user).await?;

    let result = state
        .integrations
        .sync(user.user_id, &ctx, platform, body.update_logo)
        .await?;
    Ok(Json(result))
}
