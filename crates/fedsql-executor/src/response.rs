//! Wire request/response shapes (§6). Transport-agnostic `serde` structs;
//! no HTTP framing is included here, matching §1's explicit out-of-scope
//! line for HTTP surface framing.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map as JsonMap, Value as JsonValue};

use fedsql_core::error::FedSqlError;

fn default_deadline_ms() -> u64 {
    30_000
}

/// Per-query caller-supplied metadata (§6 request shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryMetadata {
    /// `0` bypasses the cache read entirely; otherwise the maximum
    /// acceptable age for a served rowset.
    pub max_staleness_ms: u64,
    /// Overall query deadline. Defaults to 30s when the caller omits it.
    #[serde(default = "default_deadline_ms")]
    pub deadline_ms: u64,
    /// Caller-supplied trace id, echoed back verbatim.
    #[serde(default)]
    pub trace_id: String,
}

/// A complete query request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    /// The SQL statement, naming tables as `source.table`.
    pub sql: String,
    /// Per-query metadata.
    pub metadata: QueryMetadata,
}

/// Per-source token-bucket status for response metadata (§6
/// `rate_limit_status`).
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RateLimitStatus {
    /// Tokens currently available.
    pub remaining: u32,
    /// Bucket capacity.
    pub capacity: u32,
}

/// The five millisecond counters accumulated across orchestrator stages
/// (§6 `timing` object).
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Timing {
    /// Wall-clock time for the whole query.
    pub total_ms: u64,
    /// Analyzer + planner time.
    pub planning_ms: u64,
    /// Fan-out time: cache, rate governor, connector, security filter.
    pub fetch_ms: u64,
    /// Time spent in the security filter specifically, already included
    /// in `fetch_ms` but broken out for diagnostics.
    pub security_ms: u64,
    /// Time spent in the analytical runtime.
    pub analytical_ms: u64,
}

/// A successful query result (§6 response shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResponse {
    /// Result rows.
    pub rows: Vec<JsonMap<String, JsonValue>>,
    /// Final schema, after CLS `BLOCK` and the analytical runtime's
    /// projection.
    pub columns: Vec<String>,
    /// Max age, in milliseconds, across every source contributing to this
    /// result.
    pub freshness_ms: u64,
    /// True iff every source used was served from cache rather than a
    /// live fetch.
    pub from_cache: bool,
    /// Per-source rate-bucket status at the time of this query.
    pub rate_limit_status: HashMap<String, RateLimitStatus>,
    /// Stage timings.
    pub timing: Timing,
    /// Echoed trace id.
    pub trace_id: String,
    /// Sources whose rowset exceeded the requested `max_staleness_ms` but
    /// were served anyway under the transient-failure fallback. `STALE_DATA`
    /// is non-fatal (§7) and carried here rather than as an error variant.
    #[serde(default)]
    pub stale_sources: Vec<String>,
}

/// A wire error body (§7).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    /// One of the wire codes in §7 (`PLAN_FAILED`, `RATE_LIMIT_EXHAUSTED`, …).
    pub code: String,
    /// Human-readable message.
    pub message: String,
    /// Present only on `RATE_LIMIT_EXHAUSTED`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub retry_after_ms: Option<u64>,
}

/// An error envelope (§6 error response shape).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// The error body.
    pub error: ErrorBody,
    /// Echoed trace id.
    pub trace_id: String,
}

impl ErrorResponse {
    /// Build an error envelope from a pipeline error and the request's
    /// trace id.
    #[must_use]
    pub fn from_error(err: &FedSqlError, trace_id: String) -> Self {
        Self {
            error: ErrorBody { code: err.code().to_string(), message: err.to_string(), retry_after_ms: err.retry_after_ms() },
            trace_id,
        }
    }
}
