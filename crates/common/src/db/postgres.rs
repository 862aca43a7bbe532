//! Postgres repository on SeaORM
//!
//! Reads go to the replica when one is configured; every write and every
//! transaction runs on the primary.

use crate::db::models::*;
use crate::db::repository::*;
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use crate::slug::{resolve_unique, SlugKind, SlugLookup, SlugPolicy};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbBackend, DbErr, EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, SqlErr,
    Statement, TransactionTrait,
};
use tracing::{debug, info};
use uuid::Uuid;

/// Transaction-scoped lock serializing tenant provisioning
const PROVISION_LOCK: &str = "SELECT pg_advisory_xact_lock(hashtext('vendly:provision'))";

/// Repository backed by the Postgres pool
#[derive(Clone)]
pub struct PgRepository {
    pool: DbPool,
}

impl PgRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }
}

/// Unique violations become 409s, everything else stays a database error
fn map_write_err(err: DbErr, what: &str) -> AppError {
    match err.sql_err() {
        Some(SqlErr::UniqueConstraintViolation(detail)) => AppError::Duplicate {
            message: format!("{} already exists ({})", what, detail),
        },
        _ => AppError::Database(err),
    }
}

/// Slug existence checks inside an open transaction
struct TxnSlugs<'a>(&'a DatabaseTransaction);

#[async_trait]
impl SlugLookup for TxnSlugs<'_> {
    async fn slug_taken(&self, kind: SlugKind, slug: &str) -> Result<bool> {
        let count = match kind {
            SlugKind::Tenant => {
                TenantEntity::find()
                    .filter(TenantColumn::Slug.eq(slug))
                    .count(self.0)
                    .await?
            }
            SlugKind::Store => {
                StoreEntity::find()
                    .filter(StoreColumn::Slug.eq(slug))
                    .count(self.0)
                    .await?
            }
        };
        Ok(count > 0)
    }
}

async fn load_existing<C: ConnectionTrait>(
    conn: &C,
    membership: TenantMembership,
) -> Result<Provisioned> {
    let tenant = TenantEntity::find_by_id(membership.tenant_id)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::TenantNotFound {
            id: membership.tenant_id.to_string(),
        })?;

    let store = StoreEntity::find()
        .filter(StoreColumn::TenantId.eq(tenant.id))
        .order_by_asc(StoreColumn::CreatedAt)
        .one(conn)
        .await?
        .ok_or_else(|| AppError::StoreNotFound {
            id: tenant.id.to_string(),
        })?;

    Ok(Provisioned { tenant, membership, store })
}

// ============================================================================
// Tenant Operations
// ============================================================================

#[async_trait]
impl TenantRepository for PgRepository {
    async fn find_user_by_email(&self, email: &str) -> Result<Option<User>> {
        UserEntity::find()
            .filter(UserColumn::Email.eq(email))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn create_user(&self, email: &str, name: &str, role: UserRole) -> Result<User> {
        let user = UserActiveModel {
            id: Set(Uuid::new_v4()),
            email: Set(email.to_string()),
            name: Set(name.to_string()),
            role: Set(role.as_str().to_string()),
            email_verified: Set(false),
            created_at: Set(Utc::now().into()),
        };

        user.insert(self.write_conn())
            .await
            .map_err(|e| map_write_err(e, "User"))
    }

    async fn find_membership_by_user(&self, user_id: Uuid) -> Result<Option<TenantMembership>> {
        MembershipEntity::find()
            .filter(MembershipColumn::UserId.eq(user_id))
            .order_by_asc(MembershipColumn::CreatedAt)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_tenant(&self, id: Uuid) -> Result<Option<Tenant>> {
        TenantEntity::find_by_id(id)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_store_by_tenant(&self, tenant_id: Uuid) -> Result<Option<Store>> {
        StoreEntity::find()
            .filter(StoreColumn::TenantId.eq(tenant_id))
            .order_by_asc(StoreColumn::CreatedAt)
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_store_by_slug(&self, slug: &str) -> Result<Option<Store>> {
        StoreEntity::find()
            .filter(StoreColumn::Slug.eq(slug))
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn provision(&self, request: ProvisionRequest) -> Result<ProvisionOutcome> {
        let txn = self.write_conn().begin().await?;

        txn.execute(Statement::from_string(DbBackend::Postgres, PROVISION_LOCK))
            .await?;

        // Re-checked under the lock so a concurrent request cannot slip in
        let existing = MembershipEntity::find()
            .filter(MembershipColumn::UserId.eq(request.user_id))
            .order_by_asc(MembershipColumn::CreatedAt)
            .one(&txn)
            .await?;

        if let Some(membership) = existing {
            if !request.return_existing {
                return Err(AppError::Duplicate {
                    message: "User already belongs to a tenant".to_string(),
                });
            }
            let found = load_existing(&txn, membership).await?;
            txn.commit().await?;
            debug!(tenant_id = %found.tenant.id, "Provisioning found existing tenant");
            return Ok(ProvisionOutcome::Existing(found));
        }

        let slugs = TxnSlugs(&txn);
        let store_slug =
            resolve_unique(&slugs, SlugKind::Store, &request.store.name, SlugPolicy::Probed)
                .await?;
        let tenant_slug = resolve_unique(
            &slugs,
            SlugKind::Tenant,
            &request.tenant.slug_source,
            SlugPolicy::RandomSuffix,
        )
        .await?;

        let rows = request.into_rows(tenant_slug, store_slug);

        let tenant = TenantActiveModel::from(rows.tenant)
            .reset_all()
            .insert(&txn)
            .await
            .map_err(|e| map_write_err(e, "Tenant"))?;

        let membership = MembershipActiveModel::from(rows.membership)
            .reset_all()
            .insert(&txn)
            .await
            .map_err(|e| map_write_err(e, "Membership"))?;

        let store = StoreActiveModel::from(rows.store)
            .reset_all()
            .insert(&txn)
            .await
            .map_err(|e| map_write_err(e, "Store"))?;

        txn.commit().await?;

        info!(
            tenant_id = %tenant.id,
            tenant_slug = %tenant.slug,
            store_slug = %store.slug,
            "Tenant provisioned"
        );

        Ok(ProvisionOutcome::Created(Provisioned { tenant, membership, store }))
    }

    async fn activate_tenant(&self, tenant_id: Uuid, snapshot: serde_json::Value) -> Result<Tenant> {
        let tenant = TenantEntity::find_by_id(tenant_id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::TenantNotFound {
                id: tenant_id.to_string(),
            })?;

        let mut active: TenantActiveModel = tenant.into();
        active.status = Set(TenantStatus::Active.into());
        active.onboarding_data = Set(snapshot);
        active.updated_at = Set(Utc::now().into());

        active.update(self.write_conn()).await.map_err(Into::into)
    }

    async fn update_store_branding(&self, store_id: Uuid, branding: &StoreBranding) -> Result<Store> {
        let mut store = StoreEntity::find_by_id(store_id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::StoreNotFound {
                id: store_id.to_string(),
            })?;

        branding.apply_to(&mut store);
        store.updated_at = Utc::now().into();

        StoreActiveModel::from(store)
            .reset_all()
            .update(self.write_conn())
            .await
            .map_err(Into::into)
    }

    async fn create_verification_token(
        &self,
        identifier: &str,
        token_hash: &str,
        expires_at: DateTime<Utc>,
    ) -> Result<()> {
        let token = VerificationTokenActiveModel {
            identifier: Set(identifier.to_string()),
            token_hash: Set(token_hash.to_string()),
            expires_at: Set(expires_at.into()),
        };

        token
            .insert(self.write_conn())
            .await
            .map_err(|e| map_write_err(e, "Verification token"))?;
        Ok(())
    }
}

// ============================================================================
// Product Operations
// ============================================================================

#[async_trait]
impl CatalogRepository for PgRepository {
    async fn list_products(&self, store_id: Uuid, include_drafts: bool) -> Result<Vec<Product>> {
        let mut query = ProductEntity::find()
            .filter(ProductColumn::StoreId.eq(store_id))
            .filter(ProductColumn::DeletedAt.is_null());

        if !include_drafts {
            query = query.filter(ProductColumn::Status.eq(ProductStatus::Active.as_str()));
        }

        query
            .order_by_desc(ProductColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_product(&self, id: Uuid) -> Result<Option<Product>> {
        ProductEntity::find_by_id(id)
            .filter(ProductColumn::DeletedAt.is_null())
            .one(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn insert_product(&self, product: Product) -> Result<Product> {
        ProductActiveModel::from(product)
            .reset_all()
            .insert(self.write_conn())
            .await
            .map_err(|e| map_write_err(e, "Product"))
    }

    async fn update_product(&self, product: Product) -> Result<Product> {
        ProductActiveModel::from(product)
            .reset_all()
            .update(self.write_conn())
            .await
            .map_err(Into::into)
    }

    async fn soft_delete_product(&self, id: Uuid) -> Result<bool> {
        let now: sea_orm::prelude::DateTimeWithTimeZone = Utc::now().into();

        let result = ProductEntity::update_many()
            .col_expr(ProductColumn::DeletedAt, Expr::value(now))
            .col_expr(ProductColumn::UpdatedAt, Expr::value(now))
            .filter(ProductColumn::Id.eq(id))
            .filter(ProductColumn::DeletedAt.is_null())
            .exec(self.write_conn())
            .await?;

        Ok(result.rows_affected > 0)
    }
}

// ============================================================================
// Cart Operations
// ============================================================================

#[async_trait]
impl CartRepository for PgRepository {
    async fn list_cart_items(&self, user_id: Uuid) -> Result<Vec<CartItem>> {
        CartItemEntity::find()
            .filter(CartItemColumn::UserId.eq(user_id))
            .order_by_asc(CartItemColumn::CreatedAt)
            .all(self.read_conn())
            .await
            .map_err(Into::into)
    }

    async fn find_cart_item(&self, user_id: Uuid, product_id: Uuid) -> Result<Option<CartItem>> {
        CartItemEntity::find()
            .filter(CartItemColumn::UserId.eq(user_id))
            .filter(CartItemColumn::ProductId.eq(product_id))
            .one(self.write_conn())
            .await
            .map_err(Into::into)
    }

    async fn insert_cart_item(&self, item: CartItem) -> Result<CartItem> {
        CartItemActiveModel::from(item)
            .reset_all()
            .insert(self.write_conn())
            .await
            .map_err(|e| map_write_err(e, "Cart item"))
    }

    async fn update_cart_quantity(&self, id: Uuid, quantity: i32) -> Result<CartItem> {
        let item = CartItemEntity::find_by_id(id)
            .one(self.write_conn())
            .await?
            .ok_or_else(|| AppError::NotFound {
                resource_type: "CartItem".to_string(),
                id: id.to_string(),
            })?;

        let mut active: CartItemActiveModel = item.into();
        active.quantity = Set(quantity);
        active.updated_at = Set(Utc::now().into());

        active.update(self.write_conn()).await.map_err(Into::into)
    }

    async fn delete_cart_item(&self, id: Uuid) -> Result<bool> {
        let result = CartItemEntity::delete_by_id(id)
            .exec(self.write_conn())
            .await?;
        Ok(result.rows_affected > 0)
    }

    async fn clear_cart(&self, user_id: Uuid) -> Result<u64> {
        let result = CartItemEntity::delete_many()
            .filter(CartItemColumn::UserId.eq(user_id))
            .exec(self.write_conn())
            .await?;
        Ok(result.rows_affected)
    }
}

// ============================================================================
// Integration Operations
// ============================================================================

#[async_trait]
impl IntegrationRepository for PgRepository {
    async fn find_access_token(&self, user_id: Uuid, provider: &str) -> Result<Option<String>> {
        let account = LinkedAccountEntity::find()
            .filter(LinkedAccountColumn::UserId.eq(user_id))
            .filter(LinkedAccountColumn::Provider.eq(provider))
            .order_by_desc(LinkedAccountColumn::CreatedAt)
            .one(self.read_conn())
            .await?;

        Ok(account.map(|a| a.access_token))
    }

    async fn upsert_social_account(&self, mut account: SocialAccount) -> Result<SocialAccount> {
        let existing = SocialAccountEntity::find()
            .filter(SocialAccountColumn::TenantId.eq(account.tenant_id))
            .filter(SocialAccountColumn::Platform.eq(account.platform.as_str()))
            .one(self.write_conn())
            .await?;

        match existing {
            Some(row) => {
                account.id = row.id;
                SocialAccountActiveModel::from(account)
                    .reset_all()
                    .update(self.write_conn())
                    .await
                    .map_err(Into::into)
            }
            None => SocialAccountActiveModel::from(account)
                .reset_all()
                .insert(self.write_conn())
                .await
                .map_err(|e| map_write_err(e, "Social account")),
        }
    }
}

#[async_trait]
impl Repository for PgRepository {
    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}
