//! The caller identity a query executes under.
//!
//! A `Principal` is supplied by an already-authenticated caller (§1:
//! authentication is an external collaborator) and is immutable for the
//! life of one query — crossing tenant boundaries mid-query is forbidden
//! (§3 invariants).

use serde::{Deserialize, Serialize};

/// Stable identity and tenant scoping for one query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    /// Stable user identifier.
    pub user_id: String,

    /// Tenant the query is scoped to. Never changes for the life of a query.
    pub tenant_id: String,

    /// Caller's role, used by row/column rule resolution upstream.
    pub role: String,

    /// Team the caller belongs to; row rules commonly compare against this.
    pub team_id: String,

    /// Optional capability tags, e.g. `"pii_access"`.
    pub capabilities: Vec<String>,
}

impl Principal {
    /// Create a principal with no capability tags.
    #[must_use]
    pub fn new(user_id: impl Into<String>, tenant_id: impl Into<String>, role: impl Into<String>, team_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            tenant_id: tenant_id.into(),
            role: role.into(),
            team_id: team_id.into(),
            capabilities: Vec::new(),
        }
    }

    /// Attach capability tags (builder style, matching the rest of the crate).
    #[must_use]
    pub fn with_capabilities(mut self, capabilities: Vec<String>) -> Self {
        self.capabilities = capabilities;
        self
    }

    /// Whether the principal carries a given capability tag.
    #[must_use]
    pub fn has_capability(&self, tag: &str) -> bool {
        self.capabilities.iter().any(|c| c == tag)
    }
}
