//! Storage configuration.
//!
//! The backend and the per-namespace TTLs come from the environment at
//! process start: `REDIS_URL` selects the remote backend when present, and
//! `REDIS_TTL_TASK` / `REDIS_TTL_PREVIEW` / `REDIS_TTL_IMAGE` /
//! `REDIS_TTL_ZIP` / `REDIS_TTL_STATUS` override the expiry defaults
//! (seconds). Invalid values fall back to the defaults rather than failing
//! startup.

use tracing::warn;

use crate::keys::Namespace;

/// Time-to-live in seconds for each object namespace.
///
/// Defaults keep browser-facing artifacts (previews, images) alive past a
/// typical user session while ZIP downloads expire sooner.
///
/// | Namespace | Default |
/// |-----------|---------|
/// | task      | 86400   |
/// | preview   | 86400   |
/// | image     | 86400   |
/// | zip       | 43200   |
/// | status    | 86400   |
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TtlConfig {
    /// Expiry for `task:` records, refreshed on every task mutation.
    pub task: u64,
    /// Expiry for `preview:` pages.
    pub preview: u64,
    /// Expiry for `image:` blobs.
    pub image: u64,
    /// Expiry for `zip:` archives.
    pub zip: u64,
    /// Expiry for `status:` pages.
    pub status: u64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            task: 86_400,
            preview: 86_400,
            image: 86_400,
            zip: 43_200,
            status: 86_400,
        }
    }
}

impl TtlConfig {
    /// Reads TTL overrides from `REDIS_TTL_*` environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            task: env_ttl("REDIS_TTL_TASK", defaults.task),
            preview: env_ttl("REDIS_TTL_PREVIEW", defaults.preview),
            image: env_ttl("REDIS_TTL_IMAGE", defaults.image),
            zip: env_ttl("REDIS_TTL_ZIP", defaults.zip),
            status: env_ttl("REDIS_TTL_STATUS", defaults.status),
        }
    }

    /// Resolves the TTL for a namespace.
    pub fn for_namespace(&self, namespace: Namespace) -> u64 {
        match namespace {
            Namespace::Task => self.task,
            Namespace::Preview => self.preview,
            Namespace::Image => self.image,
            Namespace::Zip => self.zip,
            Namespace::Status => self.status,
        }
    }
}

fn env_ttl(var: &str, default: u64) -> u64 {
    match std::env::var(var) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!(var, raw, "ignoring unparseable TTL override");
            default
        }),
        Err(_) => default,
    }
}

/// Top-level storage configuration, resolved once at process start.
///
/// The presence of `redis_url` is the single backend selector: set, the
/// process talks to Redis; unset, it falls back to the in-process store.
/// There is no per-call switching and no dual-write.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageConfig {
    /// Remote store endpoint, e.g. `redis://:password@host:6379`.
    pub redis_url: Option<String>,
    /// Per-namespace expiry settings.
    pub ttl: TtlConfig,
}

impl StorageConfig {
    /// Reads `REDIS_URL` and the TTL overrides from the environment.
    ///
    /// An empty `REDIS_URL` counts as unset.
    pub fn from_env() -> Self {
        Self {
            redis_url: std::env::var("REDIS_URL").ok().filter(|url| !url.is_empty()),
            ttl: TtlConfig::from_env(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_table() {
        let ttl = TtlConfig::default();
        assert_eq!(ttl.task, 86_400);
        assert_eq!(ttl.preview, 86_400);
        assert_eq!(ttl.image, 86_400);
        assert_eq!(ttl.zip, 43_200);
        assert_eq!(ttl.status, 86_400);
    }

    #[test]
    fn for_namespace_covers_every_namespace() {
        let ttl = TtlConfig::default();
        for ns in Namespace::ALL {
            assert!(ttl.for_namespace(ns) > 0);
        }
        assert_eq!(ttl.for_namespace(Namespace::Zip), 43_200);
    }

    #[test]
    fn storage_config_defaults_to_in_memory() {
        let config = StorageConfig::default();
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn env_ttl_rejects_garbage() {
        // Env mutation is confined to this one test to keep the suite
        // parallel-safe.
        std::env::set_var("REDIS_TTL_GARBAGE_CHECK", "not-a-number");
        assert_eq!(env_ttl("REDIS_TTL_GARBAGE_CHECK", 1234), 1234);
        std::env::remove_var("REDIS_TTL_GARBAGE_CHECK");
        assert_eq!(env_ttl("REDIS_TTL_GARBAGE_CHECK", 99), 99);
    }
}
