//! Repository traits for database operations
//!
//! Services hold an `Arc<dyn Repository>`; the Postgres implementation lives
//! in [`super::postgres`] and the in-process one in [`super::memory`].

use crate::db::models::*;
use crate::errors::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::prelude::DateTimeWithTimeZone;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Tenant row to create during provisioning
#[derive(Debug, Clone)]
pub struct NewTenant {
    pub name: String,
    /// Text the tenant slug is derived from (display name or email local part)
    pub slug_source: String,
    pub billing_email: String,
    pub phone: Option<String>,
    pub status: TenantStatus,
    pub snapshot: serde_json::Value,
}

/// Store row to create during provisioning
#[derive(Debug, Clone)]
pub struct NewStore {
    pub name: String,
    pub description: Option<String>,
    pub currency: String,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub location: Option<String>,
    pub categories: Vec<String>,
}

/// Everything `provision` writes, in one transaction
#[derive(Debug, Clone)]
pub struct ProvisionRequest {
    pub user_id: Uuid,
    pub tenant: NewTenant,
    pub store: NewStore,
    /// Return the caller's existing tenant instead of creating another one
    pub return_existing: bool,
}

/// Rows produced (or found) by provisioning
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Provisioned {
    pub tenant: Tenant,
    pub membership: TenantMembership,
    pub store: Store,
}

#[derive(Debug, Clone)]
pub enum ProvisionOutcome {
    Created(Provisioned),
    Existing(Provisioned),
}

impl ProvisionOutcome {
    pub fn into_provisioned(self) -> Provisioned {
        match self {
            ProvisionOutcome::Created(p) | ProvisionOutcome::Existing(p) => p,
        }
    }

    pub fn was_created(&self) -> bool {
        matches!(self, ProvisionOutcome::Created(_))
    }
}

impl ProvisionRequest {
    /// Build the three rows once both slugs are resolved
    pub fn into_rows(self, tenant_slug: String, store_slug: String) -> Provisioned {
        let now: DateTimeWithTimeZone = Utc::now().into();
        let tenant_id = Uuid::new_v4();

        let tenant = Tenant {
            id: tenant_id,
            name: self.tenant.name,
            slug: tenant_slug,
            billing_email: self.tenant.billing_email,
            phone: self.tenant.phone,
            plan: "free".to_string(),
            status: String::from(self.tenant.status),
            onboarding_data: self.tenant.snapshot,
            created_at: now,
            updated_at: now,
        };

        let membership = TenantMembership {
            id: Uuid::new_v4(),
            tenant_id,
            user_id: self.user_id,
            role: MembershipRole::Owner.as_str().to_string(),
            created_at: now,
        };

        let store = Store {
            id: Uuid::new_v4(),
            tenant_id,
            name: self.store.name,
            slug: store_slug,
            description: self.store.description,
            currency: self.store.currency,
            contact_email: self.store.contact_email,
            contact_phone: self.store.contact_phone,
            location: self.store.location,
            status: "active".to_string(),
            categories: serde_json::json!(self.store.categories),
            theme: None,
            logo_url: None,
            primary_color: None,
            secondary_color: None,
            created_at: now,
            updated_at: now,
        };

        Provisioned { tenant, membership, store }
    }
}

// ============================================================================
// Tenant, store and user operations
// ============================================================================

#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>>;

    async fn create_user(&self, email: &str, name: &str, role: UserRole) -> Result<User>;

    async fn find_membership_by_user(&self, user_id: Uuid) -> Result<Option<TenantMembership>>;

    async fn find_tenant(&self, id: Uuid) -> Result<Option<Tenant>>;

    async fn find_store_by_tenant(&self, tenant_id: Uuid) -> Result<Option<Store>>;

    async fn find_store_by_slug(&self, slug: &str) -> Result<Option<Store>>;

    /// Resolve slugs and insert tenant, owner membership and store atomically.
    /// Concurrent calls are serialized so slug resolution never races.
    async fn provision(&self, request: ProvisionRequest) -> Result<ProvisionOutcome>;

    /// Move a tenant to `active` and replace its onboarding snapshot
    async fn activate_tenant(&self, tenant_id: Uuid, snapshot: serde_json::Value) -> Result<Tenant>;

    async fn update_store_branding(&self, store_id: Uuid, branding: &StoreBranding) -> Result<Store>;

    async fn create_verification_token(
        &self,
        identifier: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()>;
}

// ============================================================================
// Product operations
// ============================================================================

#[async_trait]
pub trait CatalogRepository: Send + Sync {
    /// Non-deleted products of a store, newest first
    async fn list_products(&self, store_id: Uuid, include_drafts: bool) -> Result<Vec<Product>>;

    /// Non-deleted product by id
    async fn find_product(&self, id: Uuid) -> Result<Option<Product>>;

    async fn insert_product(&self, product: Product) -> Result<Product>;

    async fn update_product(&self, product: Product) -> Result<Product>;

    /// Set `deleted_at`; false when the product was missing or already deleted
    async fn soft_delete_product(&self, id: Uuid) -> Result<bool>;
}

// ============================================================================
// Cart operations
// ============================================================================

#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn list_cart_items(&self, user_id: Uuid) -> Result<Vec<CartItem>>;

    async fn find_cart_item(&self, user_id: Uuid, product_id: Uuid) -> Result<Option<CartItem>>;

    async fn insert_cart_item(&self, item: CartItem) -> Result<CartItem>;

    async fn update_cart_quantity(&self, id: Uuid, quantity: i32) -> Result<CartItem>;

    async fn delete_cart_item(&self, id: Uuid) -> Result<bool>;

    async fn clear_cart(&self, user_id: Uuid) -> Result<u64>;
}

// ============================================================================
// Social integration operations
// ============================================================================

#[async_trait]
pub trait IntegrationRepository: Send + Sync {
    /// OAuth access token the auth provider stored for `provider`
    async fn find_access_token(&self, user_id: Uuid, provider: &str) -> Result<Option<String>>;

    /// Insert or replace the account for (tenant, platform)
    async fn upsert_social_account(&self, account: SocialAccount) -> Result<SocialAccount>;
}

/// All data access the services need
#[async_trait]
pub trait Repository:
    TenantRepository + CatalogRepository + CartRepository + IntegrationRepository
{
    /// Check connectivity
    async fn ping(&self) -> Result<()>;
}
