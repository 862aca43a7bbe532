//! In-process repository
//!
//! Backs `memory://` deployments and the test suites. All tables sit behind
//! one async mutex; `provision` mutates a working copy and swaps it in only
//! when every insert succeeded, which gives it the same all-or-nothing
//! behaviour as the Postgres transaction.

use crate::db::models::*;
use crate::db::repository::*;
use crate::errors::{AppError, Result};
use crate::slug::{resolve_unique, SlugKind, SlugLookup, SlugPolicy};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

#[derive(Debug, Clone, Default)]
struct Tables {
    users: Vec<User>,
    tenants: Vec<Tenant>,
    memberships: Vec<TenantMembership>,
    stores: Vec<Store>,
    products: Vec<Product>,
    cart_items: Vec<CartItem>,
    verification_tokens: Vec<VerificationToken>,
    linked_accounts: Vec<LinkedAccount>,
    social_accounts: Vec<SocialAccount>,
}

impl Tables {
    fn membership_of(&self, user_id: Uuid) -> Option<&TenantMembership> {
        self.memberships.iter().find(|m| m.user_id == user_id)
    }

    fn existing(&self, membership: &TenantMembership) -> Result<Provisioned> {
        let tenant = self
            .tenants
            .iter()
            .find(|t| t.id == membership.tenant_id)
            .cloned()
            .ok_or_else(|| AppError::TenantNotFound {
                id: membership.tenant_id.to_string(),
            })?;

        let store = self
            .stores
            .iter()
            .find(|s| s.tenant_id == tenant.id)
            .cloned()
            .ok_or_else(|| AppError::StoreNotFound {
                id: tenant.id.to_string(),
            })?;

        Ok(Provisioned {
            tenant,
            membership: membership.clone(),
            store,
        })
    }
}

#[async_trait]
impl SlugLookup for Tables {
    async fn slug_taken(&self, kind: SlugKind, slug: &str) -> Result<bool> {
        Ok(match kind {
            SlugKind::Tenant => self.tenants.iter().any(|t| t.slug == slug),
            SlugKind::Store => self.stores.iter().any(|s| s.slug == slug),
        })
    }
}

/// Repository holding every table in memory
#[derive(Clone, Default)]
pub struct MemoryRepository {
    tables: Arc<Mutex<Tables>>,
    fail_store_insert: Arc<AtomicBool>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an OAuth link, as the auth provider would after a social login
    pub async fn link_account(&self, user_id: Uuid, provider: &str, access_token: &str) {
        let mut tables = self.tables.lock().await;
        tables.linked_accounts.push(LinkedAccount {
            id: Uuid::new_v4(),
            user_id,
            provider: provider.to_string(),
            access_token: access_token.to_string(),
            created_at: Utc::now().into(),
        });
    }

    pub async fn tenant_count(&self) -> usize {
        self.tables.lock().await.tenants.len()
    }

    pub async fn store_count(&self) -> usize {
        self.tables.lock().await.stores.len()
    }

    pub async fn membership_count(&self) -> usize {
        self.tables.lock().await.memberships.len()
    }

    pub async fn verification_tokens(&self) -> Vec<VerificationToken> {
        self.tables.lock().await.verification_tokens.clone()
    }

    pub async fn social_accounts(&self, tenant_id: Uuid) -> Vec<SocialAccount> {
        self.tables
            .lock()
            .await
            .social_accounts
            .iter()
            .filter(|a| a.tenant_id == tenant_id)
            .cloned()
            .collect()
    }

    /// Make the next provisioning fail at the store insert
    #[cfg(any(test, feature = "testing"))]
    pub fn fail_next_store_insert(&self) {
        self.fail_store_insert.store(true, Ordering::SeqCst);
    }
}

// ============================================================================
// Tenant Operations
// ============================================================================

#[async_trait]
impl TenantRepository for MemoryRepository {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().find(|u| u.email == email).cloned())
    }

    async fn create_user(&self, email: &str, name: &str, role: UserRole) -> Result<User> {
        let mut tables = self.tables.lock().await;
        if tables.users.iter().any(|u| u.email == email) {
            return Err(AppError::Duplicate {
                message: format!("User already exists ({})", email),
            });
        }

        let user = User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.to_string(),
            role: role.as_str().to_string(),
            email_verified: false,
            created_at: Utc::now().into(),
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn find_membership_by_user(&self, user_id: Uuid) -> Result<Option<TenantMembership>> {
        let tables = self.tables.lock().await;
        Ok(tables.membership_of(user_id).cloned())
    }

    async fn find_tenant(&self, id: Uuid) -> Result<Option<Tenant>> {
        let tables = self.tables.lock().await;
        Ok(tables.tenants.iter().find(|t| t.id == id).cloned())
    }

    async fn find_store_by_tenant(&self, tenant_id: Uuid) -> Result<Option<Store>> {
        let tables = self.tables.lock().await;
        Ok(tables.stores.iter().find(|s| s.tenant_id == tenant_id).cloned())
    }

    async fn find_store_by_slug(&self, slug: &str) -> Result<Option<Store>> {
        let tables = self.tables.lock().await;
        Ok(tables.stores.iter().find(|s| s.slug == slug).cloned())
    }

    async fn provision(&self, request: ProvisionRequest) -> Result<ProvisionOutcome> {
        let mut tables = self.tables.lock().await;

        if let Some(membership) = tables.membership_of(request.user_id) {
            if !request.return_existing {
                return Err(AppError::Duplicate {
                    message: "User already belongs to a tenant".to_string(),
                });
            }
            return tables.existing(membership).map(ProvisionOutcome::Existing);
        }

        let store_slug =
            resolve_unique(&*tables, SlugKind::Store, &request.store.name, SlugPolicy::Probed)
                .await?;
        let tenant_slug = resolve_unique(
            &*tables,
            SlugKind::Tenant,
            &request.tenant.slug_source,
            SlugPolicy::RandomSuffix,
        )
        .await?;

        let rows = request.into_rows(tenant_slug, store_slug);

        let mut working = tables.clone();
        working.tenants.push(rows.tenant.clone());
        working.memberships.push(rows.membership.clone());

        if self.fail_store_insert.swap(false, Ordering::SeqCst) {
            return Err(AppError::Internal {
                message: "store insert failed".to_string(),
            });
        }
        working.stores.push(rows.store.clone());

        *tables = working;
        Ok(ProvisionOutcome::Created(rows))
    }

    async fn activate_tenant(&self, tenant_id: Uuid, snapshot: serde_json::Value) -> Result<Tenant> {
        let mut tables = self.tables.lock().await;
        let tenant = tables
            .tenants
            .iter_mut()
            .find(|t| t.id == tenant_id)
            .ok_or_else(|| AppError::TenantNotFound {
                id: tenant_id.to_string(),
            })?;

        tenant.status = TenantStatus::Active.into();
        tenant.onboarding_data = snapshot;
        tenant.updated_at = Utc::now().into();
        Ok(tenant.clone())
    }

    async fn update_store_branding(&self, store_id: Uuid, branding: &StoreBranding) -> Result<Store> {
        let mut tables = self.tables.lock().await;
        let store = tables
            .stores
            .iter_mut()
            .find(|s| s.id == store_id)
            .ok_or_else(|| AppError::StoreNotFound {
                id: store_id.to_string(),
            })?;

        branding.apply_to(store);
        store.updated_at = Utc::now().into();
        Ok(store.clone())
    }

    async fn create_verification_token(
        &self,
        identifier: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let mut tables = self.tables.lock().await;
        tables.verification_tokens.push(VerificationToken {
            identifier: identifier.to_string(),
            token_hash: token_hash.to_string(),
            expires_at: expires_at.into(),
        });
        Ok(())
    }
}

// ============================================================================
// Product Operations
// ============================================================================

#[async_trait]
impl CatalogRepository for MemoryRepository {
    async fn list_products(&self, store_id: Uuid, include_drafts: bool) -> Result<Vec<Product>> {
        let tables = self.tables.lock().await;
        let mut products: Vec<Product> = tables
            .products
            .iter()
            .rev()
            .filter(|p| p.store_id == store_id && !p.is_deleted())
            .filter(|p| include_drafts || p.status == ProductStatus::Active.as_str())
            .cloned()
            .collect();

        products.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(products)
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .products
            .iter()
            .find(|p| p.id == id && !p.is_deleted())
            .cloned())
    }

    async fn insert_product(&self, product: Product) -> Result<Product> {
        let mut tables = self.tables.lock().await;
        tables.products.push(product.clone());
        Ok(product)
    }

    async fn update_product(&self, product: Product) -> Result<Product> {
        let mut tables = self.tables.lock().await;
        let row = tables
            .products
            .iter_mut()
            .find(|p| p.id == product.id)
            .ok_or_else(|| AppError::ProductNotFound {
                id: product.id.to_string(),
            })?;

        *row = product.clone();
        Ok(product)
    }

    async fn soft_delete_product(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        match tables
            .products
            .iter_mut()
            .find(|p| p.id == id && !p.is_deleted())
        {
            Some(product) => {
                let now = Utc::now().into();
                product.deleted_at = Some(now);
                product.updated_at = now;
                Ok(true)
            }
            None => Ok(false),
        }
    }
}

// ============================================================================
// Cart Operations
// ============================================================================

#[async_trait]
impl CartRepository for MemoryRepository {
    async fn list_cart_items(&self, user_id: Uuid) -> Result<Vec<CartItem>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .cart_items
            .iter()
            .filter(|i| i.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_cart_item(&self, user_id: Uuid, product_id: Uuid) -> Result<Option<CartItem>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .cart_items
            .iter()
            .find(|i| i.user_id == user_id && i.product_id == product_id)
            .cloned())
    }

    async fn insert_cart_item(&self, item: CartItem) -> Result<CartItem> {
        let mut tables = self.tables.lock().await;
        if tables
            .cart_items
            .iter()
            .any(|i| i.user_id == item.user_id && i.product_id == item.product_id)
        {
            return Err(AppError::Duplicate {
                message: "Cart item already exists".to_string(),
            });
        }
        tables.cart_items.push(item.clone());
        Ok(item)
    }

    async fn update_cart_quantity(&self, id: Uuid, quantity: i32) -> Result<CartItem> {
        let mut tables = self.tables.lock().await;
        let item = tables
            .cart_items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or_else(|| AppError::NotFound {
                resource_type: "CartItem".to_string(),
                id: id.to_string(),
            })?;

        item.quantity = quantity;
        item.updated_at = Utc::now().into();
        Ok(item.clone())
    }

    async fn delete_cart_item(&self, id: Uuid) -> Result<bool> {
        let mut tables = self.tables.lock().await;
        let before = tables.cart_items.len();
        tables.cart_items.retain(|i| i.id != id);
        Ok(tables.cart_items.len() < before)
    }

    async fn clear_cart(&self, user_id: Uuid) -> Result<u64> {
        let mut tables = self.tables.lock().await;
        let before = tables.cart_items.len();
        tables.cart_items.retain(|i| i.user_id != user_id);
        Ok((before - tables.cart_items.len()) as u64)
    }
}

// ============================================================================
// Integration Operations
// ============================================================================

#[async_trait]
impl IntegrationRepository for MemoryRepository {
    async fn find_access_token(&self, user_id: Uuid, provider: &str) -> Result<Option<String>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .linked_accounts
            .iter()
            .rev()
            .find(|a| a.user_id == user_id && a.provider == provider)
            .map(|a| a.access_token.clone()))
    }

    async fn upsert_social_account(&self, mut account: SocialAccount) -> Result<SocialAccount> {
        let mut tables = self.tables.lock().await;
        match tables
            .social_accounts
            .iter_mut()
            .find(|a| a.tenant_id == account.tenant_id && a.platform == account.platform)
        {
            Some(row) => {
                account.id = row.id;
                *row = account.clone();
            }
            None => tables.social_accounts.push(account.clone()),
        }
        Ok(account)
    }
}

#[async_trait]
impl Repository for MemoryRepository {
    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(user_id: Uuid, store_name: &str) -> ProvisionRequest {
        ProvisionRequest {
            user_id,
            tenant: NewTenant {
                name: "Jane Doe".to_string(),
                slug_source: "jane".to_string(),
                billing_email: "jane@example.com".to_string(),
                phone: None,
                status: TenantStatus::Active,
                snapshot: serde_json::json!({}),
            },
            store: NewStore {
                name: store_name.to_string(),
                description: None,
                currency: "UGX".to_string(),
                contact_email: None,
                contact_phone: None,
                location: None,
                categories: vec!["Fashion".to_string()],
            },
            return_existing: true,
        }
    }

    #[tokio::test]
    async fn test_provision_probes_store_slugs() {
        let repo = MemoryRepository::new();

        let first = repo.provision(request(Uuid::new_v4(), "Acme")).await.unwrap().into_provisioned();
        let second = repo.provision(request(Uuid::new_v4(), "Acme")).await.unwrap().into_provisioned();

        assert_eq!(first.store.slug, "acme");
        assert_eq!(second.store.slug, "acme-2");
        assert_ne!(first.tenant.slug, second.tenant.slug);
    }

    #[tokio::test]
    async fn test_provision_returns_existing_membership() {
        let repo = MemoryRepository::new();
        let user_id = Uuid::new_v4();

        let created = repo.provision(request(user_id, "Acme")).await.unwrap();
        let again = repo.provision(request(user_id, "Other")).await.unwrap();

        assert!(created.was_created());
        assert!(!again.was_created());
        assert_eq!(created.into_provisioned().tenant.id, again.into_provisioned().tenant.id);
        assert_eq!(repo.tenant_count().await, 1);
    }

    #[tokio::test]
    async fn test_provision_rejects_existing_when_asked() {
        let repo = MemoryRepository::new();
        let user_id = Uuid::new_v4();
        repo.provision(request(user_id, "Acme")).await.unwrap();

        let mut second = request(user_id, "Acme");
        second.return_existing = false;
        let err = repo.provision(second).await.unwrap_err();
        assert!(matches!(err, AppError::Duplicate { .. }));
    }

    #[tokio::test]
    async fn test_failed_store_insert_leaves_no_rows() {
        let repo = MemoryRepository::new();
        repo.fail_next_store_insert();

        assert!(repo.provision(request(Uuid::new_v4(), "Acme")).await.is_err());
        assert_eq!(repo.tenant_count().await, 0);
        assert_eq!(repo.membership_count().await, 0);
        assert_eq!(repo.store_count().await, 0);
    }

    #[tokio::test]
    async fn test_soft_deleted_products_are_hidden() {
        let repo = MemoryRepository::new();
        let store_id = Uuid::new_v4();
        let now = Utc::now().into();
        let product = Product {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            store_id,
            name: "Mug".to_string(),
            description: None,
            price_cents: 1500,
            currency: "UGX".to_string(),
            stock_quantity: 3,
            images: serde_json::json!([]),
            status: ProductStatus::Active.as_str().to_string(),
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };
        repo.insert_product(product.clone()).await.unwrap();

        assert!(repo.soft_delete_product(product.id).await.unwrap());
        assert!(!repo.soft_delete_product(product.id).await.unwrap());
        assert!(repo.find_product(product.id).await.unwrap().is_none());
        assert!(repo.list_products(store_id, true).await.unwrap().is_empty());
    }
}
