//! Tenant-scoped product management

use super::{tenant_of, ApiJson, ApiPath};
use crate::AppState;
use axum::{extract::State, http::StatusCode, Json};
use serde::Serialize;
use uuid::Uuid;
use vendly_common::auth::SessionUser;
use vendly_common::catalog::{NewProduct, ProductPatch};
use vendly_common::db::models::Product;
use vendly_common::errors::Result;

#[derive(Serialize)]
pub struct ProductList {
    pub products: Vec<Product>,
}

#[derive(Serialize)]
pub struct Deleted {
    pub success: bool,
}

/// `GET /api/products`
pub async fn list_products(
    State(state): State<AppState>,
    user: SessionUser,
) -> Result<Json<ProductList>> {
    let ctx = tenant_of(&state, &user).await?;
    let products = state.catalog.list_products(&ctx).await?;
    Ok(Json(ProductList { products }))
}

/// `POST /api/products`
pub async fn create_product(
    State(state): State<AppState>,
    user: SessionUser,
    ApiJson(input): ApiJson<NewProduct>,
) -> Result<(StatusCode, Json<Product>)> {
    let ctx = tenant_of(&state, &user).await?;
    let product = state.catalog.create_product(&ctx, input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

/// `PATCH /api/products/{id}`
pub async fn update_product(
    State(state): State<AppState>,
    user: SessionUser,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(patch): ApiJson<ProductPatch>,
) -> Result<Json<Product>> {
    let ctx = tenant_of(&state, &user).await?;
    let product = state.catalog.update_product(&ctx, id, patch).await?;
    Ok(Json(product))
}

/// `DELETE /api/products/{id}`
pub async fn delete_product(
    State(state): State<AppState>,
    user: SessionUser,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<Json<Deleted>> {
    let ctx = tenant_of(&state, &user).await?;
    state.catalog.delete_product(&ctx, id).await?;
    Ok(Json(Deleted { success: true }))
}
