//! Freshness Cache (§4.3): per-query staleness tolerance over fetched
//! rowsets, keyed by `(tenant, source, table, canonical filter)`.
//!
//! Unlike a conventional TTL cache, there is no single expiry for an entry —
//! each caller states how stale a result it will accept (`max_staleness_ms`)
//! and the cache decides per-call whether to serve, refetch, or fall back to
//! a stale entry on a transient connector failure. See `result` for the
//! full contract.
//!
//! # Module organization
//!
//! - `config`: memory bound (`max_entries`), caching on/off
//! - `key`: canonical, order-independent cache key construction
//! - `single_flight`: per-key fetch coalescing
//! - `result`: `FreshnessCache` itself and the staleness-contract logic

mod config;
mod key;
mod result;
mod single_flight;

pub use config::CacheConfig;
pub use key::CacheKey;
pub use result::{Freshness, FreshnessCache, Resolved};
