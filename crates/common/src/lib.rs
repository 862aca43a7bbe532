//! Vendly Common Library
//!
//! Domain services and shared infrastructure for the Vendly gateway:
//! - Database models and repository traits (Postgres and in-memory)
//! - Tenant onboarding and admin provisioning
//! - Catalog, cart, social integrations and the AI site builder
//! - Error types, configuration, auth, caching and metrics

pub mod auth;
pub mod cache;
pub mod cart;
pub mod catalog;
pub mod config;
pub mod db;
pub mod errors;
pub mod integrations;
pub mod metrics;
pub mod notify;
pub mod onboarding;
pub mod site_builder;
pub mod slug;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use cache::CacheLayer;
pub use config::AppConfig;
pub use db::{MemoryRepository, PgRepository, Repository};
pub use errors::{AppError, Result};

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
