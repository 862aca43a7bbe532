//! URL-safe slug generation and uniqueness resolution
//!
//! Two strategies coexist and are kept apart on purpose:
//! - tenants get a random four character suffix (`acme-corp-k3z9`)
//! - stores probe `base`, `base-2`, `base-3`, ... until a free slug is found
//!
//! Both are checked against the table through [`SlugLookup`], which the
//! repositories implement on top of their open transaction.

use crate::errors::{AppError, Result};
use async_trait::async_trait;
use rand::Rng;
use regex_lite::Regex;
use std::sync::OnceLock;

/// Maximum slug length, suffix included
pub const MAX_SLUG_LEN: usize = 48;

/// Length of the random tenant suffix
pub const SUFFIX_LEN: usize = 4;

/// Upper bound for `-N` probing
const MAX_PROBES: u32 = 1000;

/// Upper bound for random suffix regeneration
const MAX_RANDOM_ATTEMPTS: u32 = 10;

const SUFFIX_ALPHABET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";

/// Table a slug must be unique in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugKind {
    Tenant,
    Store,
}

impl SlugKind {
    fn fallback(&self) -> &'static str {
        match self {
            SlugKind::Tenant => "tenant",
            SlugKind::Store => "store",
        }
    }
}

/// How a free slug is found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugPolicy {
    /// `base-xxxx`, regenerating the suffix on collision
    RandomSuffix,
    /// `base`, then `base-2`, `base-3`, ...
    Probed,
}

/// Existence check against the backing table
#[async_trait]
pub trait SlugLookup: Send + Sync {
    async fn slug_taken(&self, kind: SlugKind, slug: &str) -> Result<bool>;
}

fn separators() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9]+").expect("static slug regex"))
}

/// Lowercase, hyphenate runs of non-alphanumerics, trim edges, truncate
pub fn slugify(input: &str, max_len: usize) -> String {
    let lowered = input.trim().to_lowercase();
    let hyphenated = separators().replace_all(&lowered, "-");
    let trimmed = hyphenated.trim_matches('-');

    let mut slug: String = trimmed.chars().take(max_len).collect();
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}

/// Four random characters from `[a-z0-9]`
pub fn random_suffix() -> String {
    let mut rng = rand::thread_rng();
    (0..SUFFIX_LEN)
        .map(|_| SUFFIX_ALPHABET[rng.gen_range(0..SUFFIX_ALPHABET.len())] as char)
        .collect()
}

/// Slug base for `kind`, falling back when the input has no usable characters
pub fn base_slug(kind: SlugKind, input: &str) -> String {
    // leave room for "-xxxx" or "-NNN"
    let slug = slugify(input, MAX_SLUG_LEN - SUFFIX_LEN - 1);
    if slug.is_empty() {
        kind.fallback().to_string()
    } else {
        slug
    }
}

fn with_random_suffix(base: &str) -> String {
    format!("{}-{}", base, random_suffix())
}

/// Tenant slug base from the local part of an email (`jane.doe@x` -> `jane-doe`)
pub fn tenant_base_from_email(email: &str) -> String {
    let local = email.split('@').next().unwrap_or_default();
    base_slug(SlugKind::Tenant, local)
}

/// Find a free slug for `base` in the `kind` table using `policy`
pub async fn resolve_unique<L>(
    lookup: &L,
    kind: SlugKind,
    base: &str,
    policy: SlugPolicy,
) -> Result<String>
where
    L: SlugLookup + ?Sized,
{
    let base = base_slug(kind, base);

    match policy {
        SlugPolicy::RandomSuffix => {
            for _ in 0..MAX_RANDOM_ATTEMPTS {
                let candidate = with_random_suffix(&base);
                if !lookup.slug_taken(kind, &candidate).await? {
                    return Ok(candidate);
                }
                tracing::debug!(slug = %candidate, "Random slug collided, regenerating");
            }
        }
        SlugPolicy::Probed => {
            if !lookup.slug_taken(kind, &base).await? {
                return Ok(base);
            }
            for n in 2..=MAX_PROBES {
                let candidate = format!("{}-{}", base, n);
                if !lookup.slug_taken(kind, &candidate).await? {
                    return Ok(candidate);
                }
            }
        }
    }

    Err(AppError::SlugExhausted { base })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    struct Taken(HashSet<String>);

    #[async_trait]
    impl SlugLookup for Taken {
        async fn slug_taken(&self, _kind: SlugKind, slug: &str) -> Result<bool> {
            Ok(self.0.contains(slug))
        }
    }

    fn taken(slugs: &[&str]) -> Taken {
        Taken(slugs.iter().map(|s| s.to_string()).collect())
    }

    fn is_suffixed(slug: &str, base: &str) -> bool {
        let Some(suffix) = slug.strip_prefix(&format!("{}-", base)) else {
            return false;
        };
        suffix.len() == SUFFIX_LEN
            && suffix.chars().all(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
    }

    #[test]
    fn test_slugify_basic() {
        assert_eq!(slugify("Acme Store", MAX_SLUG_LEN), "acme-store");
        assert_eq!(slugify("  --Hello,   World!!  ", MAX_SLUG_LEN), "hello-world");
        assert_eq!(slugify("Café & Co.", MAX_SLUG_LEN), "caf-co");
        assert_eq!(slugify("!!!", MAX_SLUG_LEN), "");
    }

    #[test]
    fn test_slugify_truncation_drops_trailing_hyphen() {
        assert_eq!(slugify("abcde fgh", 6), "abcde");
        assert_eq!(slugify(&"x".repeat(100), 10).len(), 10);
    }

    #[test]
    fn test_tenant_base_from_email() {
        assert_eq!(tenant_base_from_email("jane.doe@acme.com"), "jane-doe");
        assert_eq!(tenant_base_from_email("@nowhere"), "tenant");
        assert_eq!(tenant_base_from_email("no-at-sign"), "no-at-sign");
    }

    #[tokio::test]
    async fn test_email_base_gets_random_suffix() {
        let base = tenant_base_from_email("jane.doe@acme.com");
        let slug = resolve_unique(&taken(&[]), SlugKind::Tenant, &base, SlugPolicy::RandomSuffix)
            .await
            .unwrap();
        assert!(is_suffixed(&slug, "jane-doe"));
    }

    #[tokio::test]
    async fn test_probed_returns_base_when_free() {
        let slug = resolve_unique(&taken(&[]), SlugKind::Store, "Acme", SlugPolicy::Probed)
            .await
            .unwrap();
        assert_eq!(slug, "acme");
    }

    #[tokio::test]
    async fn test_probed_increments_on_collision() {
        let lookup = taken(&["acme", "acme-2"]);
        let slug = resolve_unique(&lookup, SlugKind::Store, "Acme", SlugPolicy::Probed)
            .await
            .unwrap();
        assert_eq!(slug, "acme-3");
    }

    #[tokio::test]
    async fn test_probed_uses_fallback_for_empty_names() {
        let lookup = taken(&["store"]);
        let slug = resolve_unique(&lookup, SlugKind::Store, "???", SlugPolicy::Probed)
            .await
            .unwrap();
        assert_eq!(slug, "store-2");
    }

    #[tokio::test]
    async fn test_random_suffix_policy() {
        let slug = resolve_unique(&taken(&[]), SlugKind::Tenant, "Acme Corp", SlugPolicy::RandomSuffix)
            .await
            .unwrap();
        assert!(is_suffixed(&slug, "acme-corp"));
    }

    struct AlwaysTaken;

    #[async_trait]
    impl SlugLookup for AlwaysTaken {
        async fn slug_taken(&self, _kind: SlugKind, _slug: &str) -> Result<bool> {
            Ok(true)
        }
    }

    #[tokio::test]
    async fn test_exhaustion_is_a_conflict() {
        let err = resolve_unique(&AlwaysTaken, SlugKind::Tenant, "busy", SlugPolicy::RandomSuffix)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SlugExhausted { .. }));
    }
}
