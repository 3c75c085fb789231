//! End-to-end scenarios and boundary behaviors driven against
//! `fedsql_test_utils::MockConnector`, exercising fetch + cache + rate +
//! security + analytical-runtime wiring together through `Orchestrator`.

use std::sync::Arc;

use fedsql_core::analyzer::StaticSourceRegistry;
use fedsql_core::config::FedSqlConfig;
use fedsql_core::connector::Connector;
use fedsql_core::model::{Operator, Principal, Record, Rowset, Schema, SchemaColumn, SemanticType};
use fedsql_core::security::{ColumnAction, ColumnRule, RowRule, RuleValue, SecurityPolicy};
use fedsql_executor::{ConnectorRegistry, Orchestrator, QueryMetadata};
use fedsql_test_utils::fixtures::{github_pull_requests_source, jira_issues_source, member_principal, pii_analyst_principal};
use fedsql_test_utils::mock_connector::ScriptedResponse;
use fedsql_test_utils::MockConnector;
use serde_json::json;

fn pull_request_rows() -> Rowset {
    let schema = Schema::new(vec![
        SchemaColumn { name: "id".into(), semantic_type: SemanticType::Text },
        SchemaColumn { name: "repo".into(), semantic_type: SemanticType::Text },
        SchemaColumn { name: "status".into(), semantic_type: SemanticType::Text },
        SchemaColumn { name: "author_email".into(), semantic_type: SemanticType::Text },
        SchemaColumn { name: "updated_at".into(), semantic_type: SemanticType::Timestamp },
    ]);
    let mut merged = Record::new();
    merged.insert("id".into(), json!("1"));
    merged.insert("repo".into(), json!("fedsql"));
    merged.insert("status".into(), json!("merged"));
    merged.insert("author_email".into(), json!("alice@example.com"));
    merged.insert("updated_at".into(), json!("2026-07-01T00:00:00Z"));
    let mut open = Record::new();
    open.insert("id".into(), json!("2"));
    open.insert("repo".into(), json!("fedsql"));
    open.insert("status".into(), json!("open"));
    open.insert("author_email".into(), json!("bob@example.com"));
    open.insert("updated_at".into(), json!("2026-07-15T00:00:00Z"));
    Rowset { schema, records: vec![merged, open], age_ms: 0 }
}

fn github_connector(script: Vec<ScriptedResponse>) -> Arc<dyn Connector> {
    Arc::new(MockConnector::scripted(github_pull_requests_source(), script))
}

fn orchestrator_with(connectors: ConnectorRegistry) -> Orchestrator<StaticSourceRegistry> {
    let registry = StaticSourceRegistry::new(vec![github_pull_requests_source(), jira_issues_source()]);
    Orchestrator::new(registry, connectors, FedSqlConfig::default())
}

fn metadata(trace_id: &str, max_staleness_ms: u64) -> QueryMetadata {
    QueryMetadata { max_staleness_ms, deadline_ms: 5_000, trace_id: trace_id.to_string() }
}

/// Scenario 1: a pushable predicate is classified so the connector receives
/// it as a server-side filter rather than a residual WHERE clause.
#[tokio::test]
async fn scenario_pushdown_routes_predicate_to_the_connector() {
    let mut connectors = ConnectorRegistry::new();
    connectors.insert("github".into(), github_connector(vec![ScriptedResponse::Rows(pull_request_rows())]));
    let orchestrator = orchestrator_with(connectors);

    let response = orchestrator
        .execute(
            "SELECT id, status FROM github.pull_requests WHERE repo = 'fedsql'",
            &member_principal(),
            &metadata("pushdown", 0),
            &SecurityPolicy::default(),
        )
        .await
        .unwrap();

    assert_eq!(response.rows.len(), 2, "repo is pushable, so both rows the mock serves for it come back");
}

/// Scenario 2: a non-pushable predicate is evaluated as a residual filter
/// by the analytical runtime after the full rowset is fetched.
#[tokio::test]
async fn scenario_residual_filter_is_evaluated_after_fetch() {
    let mut connectors = ConnectorRegistry::new();
    connectors.insert("github".into(), github_connector(vec![ScriptedResponse::Rows(pull_request_rows())]));
    let orchestrator = orchestrator_with(connectors);

    let response = orchestrator
        .execute(
            "SELECT id FROM github.pull_requests WHERE status = 'merged'",
            &member_principal(),
            &metadata("residual", 0),
            &SecurityPolicy::default(),
        )
        .await
        .unwrap();

    assert_eq!(response.rows.len(), 1);
    assert_eq!(response.rows[0]["id"], json!("1"));
}

/// Scenario 3: a second query within the staleness window is served from
/// cache without a second connector call.
#[tokio::test]
async fn scenario_repeat_query_is_served_from_cache() {
    let connector = Arc::new(MockConnector::scripted(github_pull_requests_source(), vec![ScriptedResponse::Rows(pull_request_rows())]));
    let mut connectors = ConnectorRegistry::new();
    connectors.insert("github".into(), connector.clone());
    let orchestrator = orchestrator_with(connectors);
    let meta = metadata("cache-hit", 60_000);

    let first = orchestrator
        .execute("SELECT id FROM github.pull_requests", &member_principal(), &meta, &SecurityPolicy::default())
        .await
        .unwrap();
    let second = orchestrator
        .execute("SELECT id FROM github.pull_requests", &member_principal(), &meta, &SecurityPolicy::default())
        .await
        .unwrap();

    assert!(!first.from_cache);
    assert!(second.from_cache);
    assert_eq!(connector.call_count(), 1, "second query must not reach the connector");
}

/// Scenario 4: exhausting a source's token bucket surfaces
/// `RATE_LIMIT_EXHAUSTED` with a retry hint, without ever reaching the
/// connector for the rejected call.
#[tokio::test]
async fn scenario_exhausted_rate_bucket_rejects_without_a_fetch() {
    // jira's fixture bucket is capacity 10, refill 1/s; each distinct
    // max_staleness_ms=0 query consumes a token since the cache is bypassed.
    let jira_connector = Arc::new(MockConnector::scripted(
        jira_issues_source(),
        vec![ScriptedResponse::Rows(Rowset::empty(Schema::new(vec![SchemaColumn {
            name: "id".into(),
            semantic_type: SemanticType::Text,
        }])))],
    ));
    let mut connectors = ConnectorRegistry::new();
    connectors.insert("jira".into(), jira_connector.clone());
    let orchestrator = orchestrator_with(connectors);

    for i in 0..10 {
        orchestrator
            .execute("SELECT id FROM jira.issues", &member_principal(), &metadata(&format!("warm-{i}"), 0), &SecurityPolicy::default())
            .await
            .unwrap();
    }

    let err = orchestrator
        .execute("SELECT id FROM jira.issues", &member_principal(), &metadata("exhausted", 0), &SecurityPolicy::default())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "RATE_LIMIT_EXHAUSTED");
    assert!(err.retry_after_ms().is_some());
    assert_eq!(jira_connector.call_count(), 10, "the 11th call must be rejected before reaching the connector");
}

/// Scenario 5: row-level security drops rows outside the principal's
/// tenant before they ever reach the analytical runtime.
#[tokio::test]
async fn scenario_row_level_security_drops_rows_outside_tenant() {
    let schema = Schema::new(vec![
        SchemaColumn { name: "id".into(), semantic_type: SemanticType::Text },
        SchemaColumn { name: "tenant_id".into(), semantic_type: SemanticType::Text },
    ]);
    let mut own = Record::new();
    own.insert("id".into(), json!("1"));
    own.insert("tenant_id".into(), json!("tenant_a"));
    let mut other = Record::new();
    other.insert("id".into(), json!("2"));
    other.insert("tenant_id".into(), json!("tenant_b"));
    let rows = Rowset { schema, records: vec![own, other], age_ms: 0 };

    let mut connectors = ConnectorRegistry::new();
    connectors.insert("github".into(), Arc::new(MockConnector::always_returning(github_pull_requests_source(), rows)));
    let orchestrator = orchestrator_with(connectors);

    let policy = SecurityPolicy {
        row_rules: vec![RowRule {
            view_name: "github_pull_requests".into(),
            column: "tenant_id".into(),
            op: Operator::Eq,
            value: RuleValue::PrincipalAttribute("tenant_id".into()),
        }],
        column_rules: Vec::new(),
    };

    let response = orchestrator
        .execute("SELECT id FROM github.pull_requests", &member_principal(), &metadata("rls", 0), &policy)
        .await
        .unwrap();

    assert_eq!(response.rows.len(), 1);
    assert_eq!(response.rows[0]["id"], json!("1"));
}

/// Scenario 6: column-level `HASH` masks a PII column for a principal
/// without the `pii_access` capability, while leaving it untouched for one
/// who has it.
#[tokio::test]
async fn scenario_column_level_hash_masks_pii_for_non_privileged_principal() {
    let policy = SecurityPolicy {
        row_rules: Vec::new(),
        column_rules: vec![ColumnRule {
            view_name: "github_pull_requests".into(),
            column: "author_email".into(),
            action: ColumnAction::Hash { prefix_len: 2, suffix_literal: "***".into() },
        }],
    };

    let mut connectors = ConnectorRegistry::new();
    connectors.insert("github".into(), github_connector(vec![ScriptedResponse::Rows(pull_request_rows())]));
    let orchestrator = orchestrator_with(connectors);

    let response = orchestrator
        .execute(
            "SELECT author_email FROM github.pull_requests WHERE status = 'merged'",
            &member_principal(),
            &metadata("cls-hash", 0),
            &policy,
        )
        .await
        .unwrap();

    assert_eq!(response.rows[0]["author_email"], json!("al***"));
}

/// Boundary: an unresolved FROM qualifier never reaches the connector or
/// the analytical runtime — it fails during planning.
#[tokio::test]
async fn boundary_unresolved_qualifier_is_plan_failed_before_any_fetch() {
    let connector = Arc::new(MockConnector::scripted(github_pull_requests_source(), vec![ScriptedResponse::Rows(pull_request_rows())]));
    let mut connectors = ConnectorRegistry::new();
    connectors.insert("github".into(), connector.clone());
    let orchestrator = orchestrator_with(connectors);

    let err = orchestrator
        .execute(
            "SELECT gh.id FROM github.pull_requests gh WHERE nope.status = 'merged'",
            &member_principal(),
            &metadata("unresolved", 0),
            &SecurityPolicy::default(),
        )
        .await
        .unwrap_err();

    assert_eq!(err.code(), "PLAN_FAILED");
    assert_eq!(connector.call_count(), 0, "planning must fail before any fetch is attempted");
}

/// Boundary: `max_staleness_ms = 0` always bypasses the cache, even on the
/// very next call for the same key.
#[tokio::test]
async fn boundary_zero_staleness_always_performs_a_live_fetch() {
    let connector = Arc::new(MockConnector::scripted(github_pull_requests_source(), vec![ScriptedResponse::Rows(pull_request_rows())]));
    let mut connectors = ConnectorRegistry::new();
    connectors.insert("github".into(), connector.clone());
    let orchestrator = orchestrator_with(connectors);

    for i in 0..3 {
        let response = orchestrator
            .execute("SELECT id FROM github.pull_requests", &member_principal(), &metadata(&format!("bypass-{i}"), 0), &SecurityPolicy::default())
            .await
            .unwrap();
        assert!(!response.from_cache);
    }

    assert_eq!(connector.call_count(), 3);
}

/// Boundary: `HASH` on a `NULL` PII value is a no-op, not a `"HASH of
/// null"` string.
#[tokio::test]
async fn boundary_hash_on_null_column_value_is_a_no_op() {
    let schema = Schema::new(vec![
        SchemaColumn { name: "id".into(), semantic_type: SemanticType::Text },
        SchemaColumn { name: "author_email".into(), semantic_type: SemanticType::Text },
    ]);
    let mut anonymous = Record::new();
    anonymous.insert("id".into(), json!("1"));
    anonymous.insert("author_email".into(), serde_json::Value::Null);
    let rows = Rowset { schema, records: vec![anonymous], age_ms: 0 };

    let mut connectors = ConnectorRegistry::new();
    connectors.insert("github".into(), Arc::new(MockConnector::always_returning(github_pull_requests_source(), rows)));
    let orchestrator = orchestrator_with(connectors);

    let policy = SecurityPolicy {
        row_rules: Vec::new(),
        column_rules: vec![ColumnRule {
            view_name: "github_pull_requests".into(),
            column: "author_email".into(),
            action: ColumnAction::Hash { prefix_len: 2, suffix_literal: "***".into() },
        }],
    };

    let response = orchestrator
        .execute("SELECT author_email FROM github.pull_requests", &member_principal(), &metadata("hash-null", 0), &policy)
        .await
        .unwrap();

    assert_eq!(response.rows[0]["author_email"], serde_json::Value::Null);
}

/// A principal with the `pii_access` capability is still subject to
/// whatever row/column rules the caller attaches to the policy; the
/// capability itself is a signal for policy authoring, not an automatic
/// bypass enforced by the pipeline.
#[tokio::test]
async fn pii_capable_principal_without_a_matching_rule_sees_unmasked_data() {
    let mut connectors = ConnectorRegistry::new();
    connectors.insert("github".into(), github_connector(vec![ScriptedResponse::Rows(pull_request_rows())]));
    let orchestrator = orchestrator_with(connectors);

    let response = orchestrator
        .execute(
            "SELECT author_email FROM github.pull_requests WHERE status = 'merged'",
            &pii_analyst_principal(),
            &metadata("pii-unmasked", 0),
            &SecurityPolicy::default(),
        )
        .await
        .unwrap();

    assert_eq!(response.rows[0]["author_email"], json!("alice@example.com"));
}

/// Two required sources in one query both surface their rate status in the
/// response, keyed by source name.
#[tokio::test]
async fn rate_limit_status_is_reported_per_source() {
    let mut connectors = ConnectorRegistry::new();
    connectors.insert("github".into(), github_connector(vec![ScriptedResponse::Rows(pull_request_rows())]));
    connectors.insert(
        "jira".into(),
        Arc::new(MockConnector::always_returning(
            jira_issues_source(),
            Rowset::empty(Schema::new(vec![SchemaColumn { name: "id".into(), semantic_type: SemanticType::Text }])),
        )),
    );
    let orchestrator = orchestrator_with(connectors);

    let response = orchestrator
        .execute(
            "SELECT gh.id FROM github.pull_requests gh LEFT JOIN jira.issues ji ON gh.id = ji.id",
            &member_principal(),
            &metadata("rate-status", 0),
            &SecurityPolicy::default(),
        )
        .await
        .unwrap();

    assert!(response.rate_limit_status.contains_key("github"));
    assert!(response.rate_limit_status.contains_key("jira"));
}
