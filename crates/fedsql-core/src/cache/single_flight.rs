//! Single-flight coalescing: only one in-flight fetch per cache key (§4.3).
//!
//! Concurrent callers for the same key share one fetch instead of stampeding
//! the connector. This is deliberately a thin per-key mutex rather than a
//! broadcast-based design: the cache entry itself is the shared result, so
//! the second caller through the gate simply re-checks the cache rather than
//! awaiting the first caller's return value directly.

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::cache::key::CacheKey;

/// Per-key async mutex registry used to serialize fetches.
#[derive(Debug, Default)]
pub struct SingleFlight {
    gates: DashMap<CacheKey, Arc<Mutex<()>>>,
}

impl SingleFlight {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self { gates: DashMap::new() }
    }

    /// Get (creating if absent) the gate for `key`.
    pub fn gate_for(&self, key: &CacheKey) -> Arc<Mutex<()>> {
        self.gates.entry(key.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[tokio::test]
    async fn second_waiter_blocks_until_first_releases() {
        let flight = SingleFlight::new();
        let key = CacheKey::new("t1", "github", "pull_requests", &HashMap::new());

        let gate = flight.gate_for(&key);
        let guard = gate.lock().await;

        let gate2 = flight.gate_for(&key);
        let attempt = gate2.try_lock();
        assert!(attempt.is_err(), "second caller must not acquire the gate while the first holds it");

        drop(guard);
        assert!(gate2.try_lock().is_ok());
    }

    #[tokio::test]
    async fn distinct_keys_do_not_share_a_gate() {
        let flight = SingleFlight::new();
        let key_a = CacheKey::new("t1", "github", "pull_requests", &HashMap::new());
        let key_b = CacheKey::new("t1", "jira", "issues", &HashMap::new());

        let gate_a = flight.gate_for(&key_a);
        let _guard = gate_a.lock().await;
        assert!(flight.gate_for(&key_b).try_lock().is_ok());
    }
}
