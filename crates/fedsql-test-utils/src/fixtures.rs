//! Canned `SourceDescriptor`s and `Principal`s used across test suites so
//! individual tests don't each hand-roll a GitHub/Jira capability contract.

use std::collections::HashSet;

use fedsql_core::model::{ColumnDescriptor, Operator, Principal, SemanticType, SourceDescriptor, TableDescriptor};

/// A `github` source exposing `pull_requests` with `status` and `repo`
/// pushable by equality, plus `updated_at` pushable by range comparisons.
#[must_use]
pub fn github_pull_requests_source() -> SourceDescriptor {
    SourceDescriptor {
        name: "github".into(),
        tables: vec![TableDescriptor {
            name: "pull_requests".into(),
            columns: vec![
                ColumnDescriptor { name: "id".into(), semantic_type: SemanticType::Text },
                ColumnDescriptor { name: "repo".into(), semantic_type: SemanticType::Text },
                ColumnDescriptor { name: "status".into(), semantic_type: SemanticType::Text },
                ColumnDescriptor { name: "author_email".into(), semantic_type: SemanticType::Text },
                ColumnDescriptor { name: "updated_at".into(), semantic_type: SemanticType::Timestamp },
            ],
            pushable_filters: ["repo", "status", "updated_at"].into_iter().map(String::from).collect(),
            pushable_operators: [Operator::Gt, Operator::Ge, Operator::Lt, Operator::Le].into_iter().collect(),
            supports_conditional_fetch: true,
            rate_capacity: 30.0,
            rate_refill_per_second: 5.0,
            hard_staleness_cap_ms: 3_600_000,
        }],
    }
}

/// A `jira` source exposing `issues` with `project` and `status` pushable
/// by equality.
#[must_use]
pub fn jira_issues_source() -> SourceDescriptor {
    SourceDescriptor {
        name: "jira".into(),
        tables: vec![TableDescriptor {
            name: "issues".into(),
            columns: vec![
                ColumnDescriptor { name: "id".into(), semantic_type: SemanticType::Text },
                ColumnDescriptor { name: "project".into(), semantic_type: SemanticType::Text },
                ColumnDescriptor { name: "status".into(), semantic_type: SemanticType::Text },
                ColumnDescriptor { name: "reporter_email".into(), semantic_type: SemanticType::Text },
            ],
            pushable_filters: ["project", "status"].into_iter().map(String::from).collect(),
            pushable_operators: HashSet::new(),
            supports_conditional_fetch: false,
            rate_capacity: 10.0,
            rate_refill_per_second: 1.0,
            hard_staleness_cap_ms: 1_800_000,
        }],
    }
}

/// A member-role principal in `tenant_a`, no extra capabilities.
#[must_use]
pub fn member_principal() -> Principal {
    Principal::new("user-1", "tenant_a", "member", "team_eng")
}

/// An analyst-role principal in `tenant_a` with `pii_access`.
#[must_use]
pub fn pii_analyst_principal() -> Principal {
    Principal::new("user-2", "tenant_a", "analyst", "team_data").with_capabilities(vec!["pii_access".to_string()])
}
