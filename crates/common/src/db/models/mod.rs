//! SeaORM entity models
//!
//! Database entities for Vendly

mod cart_item;
mod linked_account;
mod product;
mod social_account;
mod store;
mod tenant;
mod tenant_membership;
mod user;
mod verification_token;

pub use user::{
    Entity as UserEntity,
    Model as User,
    ActiveModel as UserActiveModel,
    Column as UserColumn,
    UserRole,
};

pub use tenant::{
    Entity as TenantEntity,
    Model as Tenant,
    ActiveModel as TenantActiveModel,
    Column as TenantColumn,
    TenantStatus,
};

pub use tenant_membership::{
    Entity as MembershipEntity,
    Model as TenantMembership,
    ActiveModel as MembershipActiveModel,
    Column as MembershipColumn,
    MembershipRole,
};

pub use store::{
    Entity as StoreEntity,
    Model as Store,
    ActiveModel as StoreActiveModel,
    Column as StoreColumn,
    StoreBranding,
};

pub use product::{
    Entity as ProductEntity,
    Model as Product,
    ActiveModel as ProductActiveModel,
    Column as ProductColumn,
    ProductStatus,
};

pub use cart_item::{
    Entity as CartItemEntity,
    Model as CartItem,
    ActiveModel as CartItemActiveModel,
    Column as CartItemColumn,
};

pub use verification_token::{
    Entity as VerificationTokenEntity,
    Model as VerificationToken,
    ActiveModel as VerificationTokenActiveModel,
};

pub use linked_account::{
    Entity as LinkedAccountEntity,
    Model as LinkedAccount,
    Column as LinkedAccountColumn,
};

pub use social_account::{
    Entity as SocialAccountEntity,
    Model as SocialAccount,
    ActiveModel as SocialAccountActiveModel,
    Column as SocialAccountColumn,
};
