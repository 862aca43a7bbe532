//! Tenant-scoped product management and the public storefront view
//!
//! Every write invalidates the store's product list and storefront entries
//! before returning, so the dashboard reads its own writes.

use crate::auth::TenantContext;
use crate::cache::{keys, CacheLayer};
use crate::db::models::{Product, ProductStatus, Store};
use crate::db::Repository;
use crate::errors::{AppError, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;
use validator::Validate;

/// `POST /api/products` body
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    #[validate(length(min = 1, max = 200, message = "name must be 1 to 200 characters"))]
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    #[validate(range(min = 0, message = "priceCents must not be negative"))]
    pub price_cents: i64,

    /// Defaults to the store currency
    #[serde(default)]
    pub currency: Option<String>,

    #[serde(default)]
    #[validate(range(min = 0, message = "stockQuantity must not be negative"))]
    pub stock_quantity: i32,

    #[serde(default)]
    pub images: Vec<String>,

    #[serde(default)]
    pub status: Option<ProductStatus>,
}

/// `PATCH /api/products/{id}` body; absent fields are left alone
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    #[validate(length(min = 1, max = 200, message = "name must be 1 to 200 characters"))]
    pub name: Option<String>,

    pub description: Option<String>,

    #[validate(range(min = 0, message = "priceCents must not be negative"))]
    pub price_cents: Option<i64>,

    pub currency: Option<String>,

    #[validate(range(min = 0, message = "stockQuantity must not be negative"))]
    pub stock_quantity: Option<i32>,

    pub images: Option<Vec<String>>,

    pub status: Option<ProductStatus>,
}

/// Public storefront: the store and its live products
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StorefrontView {
    pub store: Store,
    pub products: Vec<Product>,
}

#[derive(Clone)]
pub struct CatalogService {
    repo: Arc<dyn Repository>,
    cache: CacheLayer,
    ttl_secs: u64,
}

impl CatalogService {
    pub fn new(repo: Arc<dyn Repository>, cache: CacheLayer, ttl_secs: u64) -> Self {
        Self { repo, cache, ttl_secs }
    }

    /// All non-deleted products of the caller's store, drafts included
    pub async fn list_products(&self, ctx: &TenantContext) -> Result<Vec<Product>> {
        let store_id = ctx.store.id;
        self.cache
            .with_cache(&keys::products(store_id), self.ttl_secs, || async move {
                self.repo.list_products(store_id, true).await
            })
            .await
    }

    pub async fn create_product(&self, ctx: &TenantContext, input: NewProduct) -> Result<Product> {
        let input = NewProduct {
            name: input.name.trim().to_string(),
            ..input
        };
        input.validate()?;

        let now = Utc::now().into();
        let product = Product {
            id: Uuid::new_v4(),
            tenant_id: ctx.tenant.id,
            store_id: ctx.store.id,
            name: input.name,
            description: input.description,
            price_cents: input.price_cents,
            currency: input
                .currency
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| ctx.store.currency.clone()),
            stock_quantity: input.stock_quantity,
            images: serde_json::json!(input.images),
            status: input
                .status
                .unwrap_or(ProductStatus::Active)
                .as_str()
                .to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let product = self.repo.insert_product(product).await?;
        self.invalidate_store(&ctx.store).await;

        info!(product_id = %product.id, store_id = %ctx.store.id, "Product created");
        Ok(product)
    }

    pub async fn update_product(&self, ctx: &TenantContext, id: Uuid, patch: ProductPatch) -> Result<Product> {
        let patch = ProductPatch {
            name: patch.name.map(|n| n.trim().to_string()),
            ..patch
        };
        patch.validate()?;

        let mut product = self.owned_product(ctx, id).await?;

        if let Some(name) = patch.name {
            product.name = name;
        }
        if let Some(description) = patch.description {
            product.description = Some(description);
        }
        if let Some(price) = patch.price_cents {
            product.price_cents = price;
        }
        if let Some(currency) = patch.currency {
            product.currency = currency;
        }
        if let Some(stock) = patch.stock_quantity {
            product.stock_quantity = stock;
        }
        if let Some(images) = patch.images {
            product.images = serde_json::json!(images);
        }
        if let Some(status) = patch.status {
            product.status = status.as_str().to_string();
        }
        product.updated_at = Utc::now().into();

        let product = self.repo.update_product(product).await?;
        self.invalidate_store(&ctx.store).await;

        info!(product_id = %product.id, "Product updated");
        Ok(product)
    }

    /// Soft delete; a second delete of the same product is a 404
    pub async fn delete_product(&self, ctx: &TenantContext, id: Uuid) -> Result<()> {
        self.owned_product(ctx, id).await?;

        if !self.repo.soft_delete_product(id).await? {
            return Err(AppError::ProductNotFound { id: id.to_string() });
        }
        self.invalidate_store(&ctx.store).await;

        info!(product_id = %id, "Product deleted");
        Ok(())
    }

    /// Store and active products for a public slug
    pub async fn storefront(&self, slug: &str) -> Result<StorefrontView> {
        self.cache
            .with_cache(&keys::store(slug), self.ttl_secs, || async move {
                let store = self
                    .repo
                    .find_store_by_slug(slug)
                    .await?
                    .filter(Store::is_active)
                    .ok_or_else(|| AppError::StoreNotFound { id: slug.to_string() })?;

                let products = self.repo.list_products(store.id, false).await?;
                Ok(StorefrontView { store, products })
            })
            .await
    }

    /// Product in the caller's tenant; other tenants' products look missing
    async fn owned_product(&self, ctx: &TenantContext, id: Uuid) -> Result<Product> {
        self.repo
            .find_product(id)
            .await?
            .filter(|p| p.tenant_id == ctx.tenant.id)
            .ok_or_else(|| AppError::ProductNotFound { id: id.to_string() })
    }

    async fn invalidate_store(&self, store: &Store) {
        self.cache.invalidate_pattern(&keys::products_pattern(store.id)).await;
        self.cache.invalidate_pattern(&keys::store_pattern(&store.slug)).await;
    }
}
