//! AI site builder jobs

use super::{tenant_of, ApiJson, ApiPath};
use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Deserialize;
use uuid::Uuid;
use vendly_common::auth::SessionUser;
use vendly_common::errors::Result;
use vendly_common::site_builder::SiteJob;

#[derive(Debug, Deserialize)]
pub struct StartJob {
    pub prompt: String,
}

/// `POST /api/site-builder/jobs`; the job runs after the response
pub async fn start_job(
    State(state): State<AppState>,
    user: SessionUser,
    ApiJson(body): ApiJson<StartJob>,
) -> Result<(StatusCode, Json<SiteJob>)> {
    let ctx = tenant_of(&state, &user).await?;
    let job = state.site_builder.start(&ctx, body.prompt)?;
    Ok((StatusCode::ACCEPTED, Json(job)))
}

/// `GET /api/site-builder/jobs/{id}`
pub async fn get_job(
    State(state): State<AppState>,
    user: SessionUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<SiteJob>> {
    let ctx = tenant_of(&state, &user).await?;
    let job = state.site_builder.get(&ctx, id)?;
    Ok(Json(job))
}
