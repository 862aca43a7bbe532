//! Public storefront

use super::ApiPath;
use crate::AppState;
use axum::{extract::State, Json};
use vendly_common::catalog::StorefrontView;
use vendly_common::errors::Result;

/// `GET /api/stores/{slug}`, no session required
pub async fn storefront(
    State(state): State<AppState>,
    ApiPath(slug): ApiPath<String>,
) -> Result<Json<StorefrontView>> {
    let view = state.catalog.storefront(&slug.to_lowercase()).await?;
    Ok(Json(view))
}
