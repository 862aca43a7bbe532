//! Session cart

use super::{ApiJson, ApiQuery};
use crate::AppState;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use vendly_common::auth::SessionUser;
use vendly_common::cart::UpsertCartItem;
use vendly_common::db::models::CartItem;
use vendly_common::errors::Result;

#[derive(Serialize)]
pub struct CartList {
    pub items: Vec<CartItem>,
}

/// `null` when the line was removed by a zero quantity
#[derive(Serialize)]
pub struct CartLine {
    pub item: Option<CartItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveQuery {
    pub product_id: Option<Uuid>,
}

#[derive(Serialize)]
pub struct Removed {
    pub success: bool,
    pub removed: u64,
}

/// `GET /api/cart`
pub async fn list_cart(State(state): State<AppState>, user: SessionUser) -> Result<Json<CartList>> {
    let items = state.cart.list(user.user_id).await?;
    Ok(Json(CartList { items }))
}

/// `POST /api/cart`
pub async fn upsert_item(
    State(state): State<AppState>,
    user: SessionUser,
    ApiJson(body): ApiJson<UpsertCartItem>,
) -> Result<Json<CartLine>> {
    let item = state
        .cart
        .upsert_item(user.user_id, body.product_id, body.store_id, body.quantity)
        .await?;
    Ok(Json(CartLine { item }))
}

/// `DELETE /api/cart?productId=...` removes one line; without it the cart is cleared
pub async fn remove_items(
    State(state): State<AppState>,
    user: SessionUser,
    ApiQuery(query): ApiQuery<RemoveQuery>,
) -> Result<Json<Removed>> {
    let removed = match query.product_id {
        Some(product_id) => u64::from(state.cart.remove(user.user_id, product_id).await?),
        None => state.cart.clear(user.user_id).await?,
    };
    Ok(Json(Removed {
        success: true,
        removed,
    }))
}
