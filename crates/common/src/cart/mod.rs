//! Session-scoped shopping cart

use crate::db::models::CartItem;
use crate::db::Repository;
use crate::errors::{AppError, Result};
use chrono::Utc;
use serde::Deserialize;
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

/// Highest quantity a single cart line may hold
pub const MAX_QUANTITY: i32 = 999;

/// `POST /api/cart` body
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpsertCartItem {
    pub product_id: Uuid,
    pub store_id: Uuid,
    pub quantity: i32,
}

#[derive(Clone)]
pub struct CartService {
    repo: Arc<dyn Repository>,
}

impl CartService {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    pub async fn list(&self, user_id: Uuid) -> Result<Vec<CartItem>> {
        self.repo.list_cart_items(user_id).await
    }

    /// Set the quantity of a product in the cart.
    ///
    /// Zero removes the line (or does nothing) and yields `None`; it never
    /// inserts. Any other quantity requires a purchasable product of
    /// `store_id`.
    pub async fn upsert_item(
        &self,
        user_id: Uuid,
        product_id: Uuid,
        store_id: Uuid,
        quantity: i32,
    ) -> Result<Option<CartItem>> {
        let existing = self.repo.find_cart_item(user_id, product_id).await?;

        if quantity == 0 {
            if let Some(item) = existing {
                self.repo.delete_cart_item(item.id).await?;
                debug!(user_id = %user_id, product_id = %product_id, "Cart line removed");
            }
            return Ok(None);
        }

        if !(1..=MAX_QUANTITY).contains(&quantity) {
            return Err(AppError::Validation {
                message: format!("quantity must be between 0 and {}", MAX_QUANTITY),
                field: Some("quantity".to_string()),
            });
        }

        self.repo
            .find_product(product_id)
            .await?
            .filter(|p| p.is_available() && p.store_id == store_id)
            .ok_or_else(|| AppError::ProductNotFound {
                id: product_id.to_string(),
            })?;

        let item = match existing {
            Some(item) => self.repo.update_cart_quantity(item.id, quantity).await?,
            None => {
                let now = Utc::now().into();
                self.repo
                    .insert_cart_item(CartItem {
                        id: Uuid::new_v4(),
                        user_id,
                        product_id,
                        store_id,
                        quantity,
                        created_at: now,
                        updated_at: now,
                    })
                    .await?
            }
        };

        debug!(user_id = %user_id, product_id = %product_id, quantity, "Cart line set");
        Ok(Some(item))
    }

    /// Remove one product; true when a line was deleted
    pub async fn remove(&self, user_id: Uuid, product_id: Uuid) -> Result<bool> {
        match self.repo.find_cart_item(user_id, product_id).await? {
            Some(item) => self.repo.delete_cart_item(item.id).await,
            None => Ok(false),
        }
    }

    pub async fn clear(&self, user_id: Uuid) -> Result<u64> {
        self.repo.clear_cart(user_id).await
    }
}
