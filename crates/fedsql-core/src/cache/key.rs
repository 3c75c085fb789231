//! Canonical cache key generation (§3 Cache Entry, §4.3).
//!
//! # Security-relevant
//!
//! The key MUST include the tenant so one tenant's cache entries can never
//! be returned to another. It must also be order-independent over
//! `pushed_filters`: `{status=merged, repo=x}` and `{repo=x, status=merged}`
//! must collide, since they are the same logical fetch.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::model::Operator;

/// A cache key: `tenant|source|table|canonical_filter_hash`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey(String);

impl CacheKey {
    /// Build a cache key from the components in §3.
    ///
    /// `pushed_filters` is sorted by column name before hashing so that
    /// insertion order never affects the resulting key.
    #[must_use]
    pub fn new(
        tenant_id: &str,
        source: &str,
        table: &str,
        pushed_filters: &HashMap<String, (Operator, serde_json::Value)>,
    ) -> Self {
        Self(format!("{tenant_id}|{source}|{table}|{}", canonical_filter_hash(pushed_filters)))
    }

    /// The underlying string, for use as a log field.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

fn canonical_filter_hash(pushed_filters: &HashMap<String, (Operator, serde_json::Value)>) -> String {
    let mut entries: Vec<(&String, &(Operator, serde_json::Value))> = pushed_filters.iter().collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    let mut encoded = String::new();
    for (column, (op, literal)) in entries {
        encoded.push_str(column);
        encoded.push(':');
        encoded.push_str(op_token(*op));
        encoded.push('=');
        encoded.push_str(&literal.to_string());
        encoded.push(';');
    }

    let mut hasher = Sha256::new();
    hasher.update(encoded.as_bytes());
    hex::encode(hasher.finalize())
}

fn op_token(op: Operator) -> &'static str {
    match op {
        Operator::Eq => "eq",
        Operator::Ne => "ne",
        Operator::Gt => "gt",
        Operator::Lt => "lt",
        Operator::Ge => "ge",
        Operator::Le => "le",
        Operator::In => "in",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn filter_order_does_not_affect_key() {
        let mut a = HashMap::new();
        a.insert("status".to_string(), (Operator::Eq, json!("merged")));
        a.insert("repo".to_string(), (Operator::Eq, json!("x")));

        let mut b = HashMap::new();
        b.insert("repo".to_string(), (Operator::Eq, json!("x")));
        b.insert("status".to_string(), (Operator::Eq, json!("merged")));

        assert_eq!(
            CacheKey::new("t1", "github", "pull_requests", &a),
            CacheKey::new("t1", "github", "pull_requests", &b)
        );
    }

    #[test]
    fn different_tenants_never_collide() {
        let filters = HashMap::new();
        let key_a = CacheKey::new("tenant_a", "github", "pull_requests", &filters);
        let key_b = CacheKey::new("tenant_b", "github", "pull_requests", &filters);
        assert_ne!(key_a, key_b);
    }

    #[test]
    fn different_literal_values_differ() {
        let mut a = HashMap::new();
        a.insert("status".to_string(), (Operator::Eq, json!("merged")));
        let mut b = HashMap::new();
        b.insert("status".to_string(), (Operator::Eq, json!("open")));

        assert_ne!(
            CacheKey::new("t1", "github", "pull_requests", &a),
            CacheKey::new("t1", "github", "pull_requests", &b)
        );
    }

    #[test]
    fn different_tables_never_collide() {
        let filters = HashMap::new();
        assert_ne!(
            CacheKey::new("t1", "github", "pull_requests", &filters),
            CacheKey::new("t1", "github", "issues", &filters)
        );
    }
}
