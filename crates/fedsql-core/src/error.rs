//! Error kinds for the federated query pipeline.
//!
//! Every stage of the pipeline — analyzer, planner, cache, rate governor,
//! connector, security filter, analytical runtime — returns one of these
//! kinds on failure. The orchestrator inspects the kind to decide fail-fast
//! vs. cache-fallback; it never pattern-matches on message text.
//!
//! `StaleData` has no variant here: it is a non-fatal condition recorded in
//! response metadata, not an error (see `fedsql_executor::response`).

use thiserror::Error;

/// Result alias used throughout the pipeline.
pub type Result<T> = std::result::Result<T, FedSqlError>;

/// Wire error kinds, one per row of the error-handling table.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FedSqlError {
    /// SQL unsupported or ambiguous; unresolved qualifier; DDL/DML attempted.
    #[error("query could not be planned: {reason}")]
    PlanFailed {
        /// Human-readable reason, safe to surface to the caller.
        reason: String,
    },

    /// Token bucket empty for `source`. Carries a retry hint in milliseconds.
    #[error("rate limit exhausted for source '{source_id}', retry after {retry_after_ms}ms")]
    RateLimitExhausted {
        /// Source whose bucket is empty.
        source_id: String,
        /// Milliseconds the caller should wait before retrying.
        retry_after_ms: u64,
    },

    /// Connector exceeded its deadline.
    #[error("source '{source_id}' timed out")]
    SourceTimeout {
        /// Source that timed out.
        source_id: String,
    },

    /// All rows for a required source were filtered out by row rules and the
    /// query requires non-empty input, or a required projected column is
    /// `BLOCK`'d.
    #[error("access denied: {reason}")]
    EntitlementDenied {
        /// Reason, safe to surface (never echoes the blocked value).
        reason: String,
    },

    /// Connector returned a structured error other than throttling/timeout.
    #[error("source '{source_id}' error: {message}")]
    SourceError {
        /// Source that reported the error.
        source_id: String,
        /// Connector-supplied message.
        message: String,
    },

    /// Bug, analytical runtime failure, or serialization failure.
    #[error("internal error: {message}")]
    Internal {
        /// Diagnostic message. Never includes row data.
        message: String,
    },
}

impl FedSqlError {
    /// The wire code for this error kind, as named in the error-handling table.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::PlanFailed { .. } => "PLAN_FAILED",
            Self::RateLimitExhausted { .. } => "RATE_LIMIT_EXHAUSTED",
            Self::SourceTimeout { .. } => "SOURCE_TIMEOUT",
            Self::EntitlementDenied { .. } => "ENTITLEMENT_DENIED",
            Self::SourceError { .. } => "SOURCE_ERROR",
            Self::Internal { .. } => "INTERNAL",
        }
    }

    /// `retry_after_ms`, if this error kind carries one.
    #[must_use]
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            Self::RateLimitExhausted { retry_after_ms, .. } => Some(*retry_after_ms),
            _ => None,
        }
    }

    /// The source this error is attributed to, if any.
    #[must_use]
    pub fn source_name(&self) -> Option<&str> {
        match self {
            Self::RateLimitExhausted { source_id, .. }
            | Self::SourceTimeout { source_id }
            | Self::SourceError { source_id, .. } => Some(source_id),
            _ => None,
        }
    }

    /// Whether this kind is transient and therefore eligible for
    /// serve-stale-on-failure (§4.3).
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::RateLimitExhausted { .. } | Self::SourceTimeout { .. })
    }
}
