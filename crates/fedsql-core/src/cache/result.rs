//! Freshness Cache (§4.3): a mapping from canonical key to cache entry,
//! with per-query staleness tolerance rather than a single fixed TTL.
//!
//! # Staleness contract
//!
//! Every lookup carries `max_staleness_ms` (`M`), chosen by the caller:
//!
//! - `M == 0`: bypass the cache read entirely, always fetch live, and
//!   always write the result back (so a later `M > 0` query benefits).
//! - `M > 0`, entry present and `age_ms <= M`: serve the cached rows, unless
//!   the entry is already older than the source's `hard_staleness_cap_ms` —
//!   that ceiling binds regardless of what the caller asked for.
//! - `M > 0`, entry present but stale: attempt a live refetch. On success,
//!   write back and serve fresh. On a transient failure
//!   (`FedSqlError::is_transient`), serve the stale entry if its age is
//!   still within the source's `hard_staleness_cap_ms`; otherwise propagate
//!   the error.
//! - `M > 0`, no entry: fetch live; a failure here has no stale entry to
//!   fall back to, so it always propagates.
//!
//! # Per-tenant isolation
//!
//! Entries live in one `LruCache` shard per tenant, stored behind a
//! `DashMap<String, Arc<Mutex<TenantShard>>>` keyed by `tenant_id` — the
//! same per-key sharded-lock pattern `rate::RateGovernor` uses for its
//! token buckets. `max_entries` (§4.3's "soft cap on total entries") is
//! therefore a per-tenant bound: one tenant fetching enough distinct tables
//! to fill its own shard never evicts another tenant's entries. Each shard
//! also tracks the largest `hard_staleness_cap_ms` it has observed and
//! sweeps entries older than that ceiling on every access, so memory is
//! reclaimed from rows no query could ever read as stale, not just on a
//! lookup that happens to land on them.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use lru::LruCache;
use std::num::NonZeroUsize;
use tokio::sync::Mutex as AsyncMutex;

use crate::cache::config::CacheConfig;
use crate::cache::key::CacheKey;
use crate::cache::single_flight::SingleFlight;
use crate::error::{FedSqlError, Result};
use crate::model::Rowset;

struct Entry {
    rowset: Arc<Rowset>,
    cached_at: Instant,
}

/// One tenant's slice of the cache: its own bounded LRU plus the largest
/// hard-staleness ceiling any query has supplied for it so far.
struct TenantShard {
    entries: LruCache<CacheKey, Entry>,
    max_hard_staleness_ms: u64,
}

impl TenantShard {
    fn new(max_entries: NonZeroUsize) -> Self {
        Self { entries: LruCache::new(max_entries), max_hard_staleness_ms: 0 }
    }

    fn note_hard_cap(&mut self, hard_staleness_cap_ms: u64) {
        self.max_hard_staleness_ms = self.max_hard_staleness_ms.max(hard_staleness_cap_ms);
    }

    /// TTL sweep (§4.3): drop every entry older than the largest
    /// `hard_staleness_cap_ms` seen for this tenant. Run opportunistically
    /// on every access rather than on a timer, since the cache has no
    /// background task of its own.
    fn sweep_expired(&mut self) {
        if self.max_hard_staleness_ms == 0 {
            return;
        }
        let ceiling = Duration::from_millis(self.max_hard_staleness_ms);
        let expired: Vec<CacheKey> =
            self.entries.iter().filter(|(_, entry)| entry.cached_at.elapsed() > ceiling).map(|(key, _)| key.clone()).collect();
        for key in expired {
            self.entries.pop(&key);
        }
    }
}

/// Outcome of a `get_or_fetch` call, distinguishing a fresh result from a
/// stale one served under the transient-failure fallback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Freshness {
    /// Served from a live fetch.
    Fresh,
    /// Served from cache after a transient refetch failure.
    Stale,
}

/// A resolved cache lookup: the rows plus whether they came from a live
/// fetch or a stale fallback.
#[derive(Debug)]
pub struct Resolved {
    /// The rows.
    pub rowset: Arc<Rowset>,
    /// Whether these rows are fresh or served stale.
    pub freshness: Freshness,
    /// Whether this call avoided a connector round trip entirely (served
    /// from a fresh cache entry or a stale fallback), as opposed to having
    /// just performed a live fetch. Response shaping's `from_cache` field
    /// (§6) is true only when every fetch node in the query set this.
    pub served_from_cache: bool,
}

/// Thread-safe freshness cache shared by all in-flight queries.
pub struct FreshnessCache {
    shards: DashMap<String, Arc<AsyncMutex<TenantShard>>>,
    config: CacheConfig,
    single_flight: SingleFlight,
}

impl FreshnessCache {
    /// Create a cache bounded by `config`.
    #[must_use]
    pub fn new(config: CacheConfig) -> Self {
        Self { shards: DashMap::new(), config, single_flight: SingleFlight::new() }
    }

    /// Resolve `key` under the staleness contract above, calling `fetch`
    /// (a connector call, pre-security-filter) on a cache miss, expiry, or
    /// bypass. `tenant_id` selects which tenant's shard this call reads
    /// and writes — it must match the tenant baked into `key`.
    ///
    /// # Errors
    ///
    /// Propagates whatever `fetch` returns when there is no stale entry
    /// eligible to serve instead.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        tenant_id: &str,
        key: CacheKey,
        max_staleness_ms: u64,
        hard_staleness_cap_ms: u64,
        fetch: F,
    ) -> Result<Resolved>
    where
        F: FnOnce() -> Fut,
        Fut: std::future::Future<Output = Result<Rowset>>,
    {
        let shard = self.shard_for(tenant_id);

        if !self.config.enabled || max_staleness_ms == 0 {
            let rowset = Arc::new(fetch().await?);
            Self::write_back(&shard, key, rowset.clone(), hard_staleness_cap_ms).await;
            return Ok(Resolved { rowset, freshness: Freshness::Fresh, served_from_cache: false });
        }

        if let Some(hit) = Self::fresh_hit(&shard, &key, max_staleness_ms, hard_staleness_cap_ms).await {
            return Ok(Resolved { rowset: hit, freshness: Freshness::Fresh, served_from_cache: true });
        }

        let gate = self.single_flight.gate_for(&key);
        let _permit = gate.lock().await;

        // Re-check under the gate: another caller may have just refreshed
        // this key while we were waiting.
        if let Some(hit) = Self::fresh_hit(&shard, &key, max_staleness_ms, hard_staleness_cap_ms).await {
            return Ok(Resolved { rowset: hit, freshness: Freshness::Fresh, served_from_cache: true });
        }

        match fetch().await {
            Ok(rowset) => {
                let rowset = Arc::new(rowset);
                Self::write_back(&shard, key, rowset.clone(), hard_staleness_cap_ms).await;
                Ok(Resolved { rowset, freshness: Freshness::Fresh, served_from_cache: false })
            }
            Err(err) if err.is_transient() => {
                if let Some((rowset, age)) = Self::stale_entry(&shard, &key).await {
                    if age <= Duration::from_millis(hard_staleness_cap_ms) {
                        tracing::debug!(age_ms = age.as_millis() as u64, "serving stale entry after transient fetch failure");
                        return Ok(Resolved { rowset, freshness: Freshness::Stale, served_from_cache: true });
                    }
                }
                Err(err)
            }
            Err(err) => Err(err),
        }
    }

    fn shard_for(&self, tenant_id: &str) -> Arc<AsyncMutex<TenantShard>> {
        let max = NonZeroUsize::new(self.config.max_entries.max(1)).expect("max_entries must be > 0");
        self.shards.entry(tenant_id.to_string()).or_insert_with(|| Arc::new(AsyncMutex::new(TenantShard::new(max)))).clone()
    }

    /// A fresh cache hit, or `None` on a miss. Also enforces the hard
    /// staleness ceiling: an entry older than `hard_staleness_cap_ms` is
    /// evicted and treated as a miss even if the caller's `max_staleness_ms`
    /// would otherwise have accepted it.
    async fn fresh_hit(
        shard: &AsyncMutex<TenantShard>,
        key: &CacheKey,
        max_staleness_ms: u64,
        hard_staleness_cap_ms: u64,
    ) -> Option<Arc<Rowset>> {
        let mut guard = shard.lock().await;
        guard.note_hard_cap(hard_staleness_cap_ms);
        guard.sweep_expired();

        let age = guard.entries.get(key)?.cached_at.elapsed();
        if age > Duration::from_millis(hard_staleness_cap_ms) {
            guard.entries.pop(key);
            return None;
        }
        if age > Duration::from_millis(max_staleness_ms) {
            return None;
        }

        let entry = guard.entries.get(key)?;
        Some(Arc::new(Rowset { age_ms: age.as_millis() as u64, ..(*entry.rowset).clone() }))
    }

    async fn stale_entry(shard: &AsyncMutex<TenantShard>, key: &CacheKey) -> Option<(Arc<Rowset>, Duration)> {
        let mut guard = shard.lock().await;
        let entry = guard.entries.get(key)?;
        let age = entry.cached_at.elapsed();
        let rowset = Arc::new(Rowset { age_ms: age.as_millis() as u64, ..(*entry.rowset).clone() });
        Some((rowset, age))
    }

    async fn write_back(shard: &AsyncMutex<TenantShard>, key: CacheKey, rowset: Arc<Rowset>, hard_staleness_cap_ms: u64) {
        let mut guard = shard.lock().await;
        guard.note_hard_cap(hard_staleness_cap_ms);
        guard.entries.put(key, Entry { rowset, cached_at: Instant::now() });
        guard.sweep_expired();
    }

    /// Current number of entries held across every tenant shard, for
    /// metrics/tests.
    pub async fn len(&self) -> usize {
        let shards: Vec<Arc<AsyncMutex<TenantShard>>> = self.shards.iter().map(|e| e.value().clone()).collect();
        let mut total = 0;
        for shard in shards {
            total += shard.lock().await.entries.len();
        }
        total
    }

    /// Remove every entry from every tenant shard. Used by tests and by a
    /// manual cache-flush operator action.
    pub async fn clear(&self) {
        let shards: Vec<Arc<AsyncMutex<TenantShard>>> = self.shards.iter().map(|e| e.value().clone()).collect();
        for shard in shards {
            shard.lock().await.entries.clear();
        }
    }
}
