//! Cache sizing configuration.
//!
//! Per-query staleness tolerance is supplied by the caller on every fetch
//! (§4.3); this config only bounds how much the cache itself is allowed to
//! hold in memory.

use serde::{Deserialize, Serialize};

/// Memory bound for the freshness cache.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Enable caching. When `false`, every lookup misses and every fetch
    /// bypasses write-back, matching the `max_staleness_ms = 0` contract
    /// but for every query regardless of requested staleness.
    ///
    /// Default: `true`
    pub enabled: bool,

    /// Maximum number of entries held per tenant. Each tenant gets its own
    /// LRU shard bounded by this cap, so one tenant filling its shard never
    /// evicts another tenant's entries (§4.3, §1 isolation). When a
    /// tenant's shard is full, that tenant's least-recently-used entry is
    /// evicted to make room.
    ///
    /// Default: 10,000
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self { enabled: true, max_entries: 10_000 }
    }
}

impl CacheConfig {
    /// Configuration with caching disabled, for deterministic tests.
    #[must_use]
    pub const fn disabled() -> Self {
        Self { enabled: false, max_entries: 10_000 }
    }

    /// Configuration with a custom entry cap, caching enabled.
    #[must_use]
    pub const fn with_max_entries(max_entries: usize) -> Self {
        Self { enabled: true, max_entries }
    }
}
