//! Rate Governor (§4.4): a token bucket per `(source, tenant)` pair.
//!
//! Buckets are created lazily on first reference (§9: "no global registry of
//! tenants is required") and live for the lifetime of the process (§3
//! lifecycles). Each bucket is guarded by its own `parking_lot::Mutex` so
//! admission for one `(source, tenant)` pair never contends with another —
//! the governor itself is a `DashMap` keyed by the pair, mirroring the
//! sharded-lock pattern the teacher crate uses for its own per-key state.

use std::sync::Arc;
use std::time::Instant;

use dashmap::DashMap;
use parking_lot::Mutex;

use crate::error::{FedSqlError, Result};

#[derive(Debug)]
struct Bucket {
    tokens: f64,
    capacity: f64,
    refill_per_second: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(capacity: f64, refill_per_second: f64) -> Self {
        Self { tokens: capacity, capacity, refill_per_second, last_refill: Instant::now() }
    }

    /// Refill based on elapsed time, then try to consume one token.
    /// Returns `Ok(())` on success, `Err(retry_after_ms)` on exhaustion.
    fn try_admit(&mut self, now: Instant) -> std::result::Result<(), u64> {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_second).min(self.capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            Ok(())
        } else {
            let deficit = 1.0 - self.tokens;
            let retry_after_ms = if self.refill_per_second > 0.0 {
                ((deficit / self.refill_per_second) * 1000.0).ceil() as u64
            } else {
                u64::MAX
            };
            Err(retry_after_ms)
        }
    }

    fn remaining(&self) -> (u32, u32) {
        (self.tokens.floor().max(0.0) as u32, self.capacity.floor() as u32)
    }
}

/// Per `(source, tenant_id)` token-bucket admission gate.
///
/// Token state is shared across all in-flight requests of the same tenant
/// against the same source (§4.4). A per-bucket mutex protects refill and
/// test-and-consume; the mutex is never held across IO (the caller drops
/// the guard before making any network call).
#[derive(Debug, Default)]
pub struct RateGovernor {
    buckets: DashMap<(String, String), Arc<Mutex<Bucket>>>,
}

impl RateGovernor {
    /// Create an empty governor. Buckets are created lazily on first
    /// admission request for a given `(source, tenant)` pair.
    #[must_use]
    pub fn new() -> Self {
        Self { buckets: DashMap::new() }
    }

    /// Attempt to admit one operation against `source` for `tenant_id`.
    ///
    /// # Errors
    ///
    /// Returns `FedSqlError::RateLimitExhausted` with `retry_after_ms` set
    /// when the bucket has no tokens available.
    pub fn admit(&self, source: &str, tenant_id: &str, capacity: f64, refill_per_second: f64) -> Result<()> {
        let bucket = self.bucket_for(source, tenant_id, capacity, refill_per_second);
        let mut guard = bucket.lock();
        guard.try_admit(Instant::now()).map_err(|retry_after_ms| {
            tracing::debug!(source, tenant_id, retry_after_ms, "rate bucket exhausted");
            FedSqlError::RateLimitExhausted { source_id: source.to_string(), retry_after_ms }
        })
    }

    /// Current `(remaining, capacity)` tokens for a bucket, for response
    /// metadata (§6 `rate_limit_status`). Does not consume a token; it
    /// reports the state as of the last admission check, which is close
    /// enough for status reporting and avoids extra refill churn.
    #[must_use]
    pub fn status(&self, source: &str, tenant_id: &str) -> Option<(u32, u32)> {
        self.buckets.get(&(source.to_string(), tenant_id.to_string())).map(|b| b.lock().remaining())
    }

    fn bucket_for(&self, source: &str, tenant_id: &str, capacity: f64, refill_per_second: f64) -> Arc<Mutex<Bucket>> {
        let key = (source.to_string(), tenant_id.to_string());
        self.buckets
            .entry(key)
            .or_insert_with(|| Arc::new(Mutex::new(Bucket::new(capacity, refill_per_second))))
            .clone()
    }
}
