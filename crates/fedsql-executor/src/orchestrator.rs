//! Query Orchestrator (§4.9): wires analyzer → planner → parallel executor
//! → analytical runtime → response shaping for one query, and owns the
//! process-lifetime shared state (rate buckets, freshness cache) that
//! every query reads and writes.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::instrument;

use fedsql_core::analyzer::{analyze, SourceRegistry};
use fedsql_core::cache::{Freshness, FreshnessCache};
use fedsql_core::config::FedSqlConfig;
use fedsql_core::error::Result;
use fedsql_core::model::Principal;
use fedsql_core::plan::plan;
use fedsql_core::rate::RateGovernor;
use fedsql_core::security::SecurityPolicy;

use crate::analytical::{self, NamedRowset};
use crate::fanout::{self, ConnectorRegistry};
use crate::response::{QueryMetadata, QueryResponse, RateLimitStatus, Timing};

/// Wires one query's pipeline stages together against a fixed set of
/// source descriptors and connectors. One `Orchestrator` is shared by
/// every query the process serves; its rate governor and cache carry
/// state across queries (§3 lifecycles), while each `execute` call gets
/// its own cancellation token and analytical session.
pub struct Orchestrator<R: SourceRegistry> {
    registry: R,
    connectors: ConnectorRegistry,
    governor: RateGovernor,
    cache: FreshnessCache,
    config: FedSqlConfig,
}

impl<R: SourceRegistry> Orchestrator<R> {
    /// Build an orchestrator over a fixed source registry and connector
    /// set, sized by `config`.
    #[must_use]
    pub fn new(registry: R, connectors: ConnectorRegistry, config: FedSqlConfig) -> Self {
        Self { registry, connectors, governor: RateGovernor::new(), cache: FreshnessCache::new(config.cache), config }
    }

    /// Run one query end to end and shape the response (§6).
    ///
    /// `policy` is the tenant's already-resolved row/column rule set
    /// (§1: policy authoring/storage is an external collaborator); it is
    /// fixed for the life of this call, matching the "resolved against
    /// the principal at query start, not re-resolved mid-query" contract.
    ///
    /// # Errors
    ///
    /// Returns the first fatal error raised by any pipeline stage:
    /// `PlanFailed` from the analyzer, `RateLimitExhausted`/`SourceTimeout`/
    /// `SourceError` from the fan-out, `EntitlementDenied` from the
    /// security filter, or `Internal` from the analytical runtime.
    #[instrument(skip(self, principal, policy), fields(trace_id = %metadata.trace_id))]
    pub async fn execute(&self, sql: &str, principal: &Principal, metadata: &QueryMetadata, policy: &SecurityPolicy) -> Result<QueryResponse> {
        let query_start = Instant::now();
        let query_deadline = query_start + Duration::from_millis(metadata.deadline_ms);

        let planning_start = Instant::now();
        let analyzed = analyze(sql, &self.registry)?;
        let waves = plan(&analyzed);
        let planning_ms = elapsed_ms(planning_start);

        let required: HashMap<String, bool> = analyzed.from_bindings.iter().map(|b| (b.qualifier.clone(), b.required)).collect();
        let bindings: Vec<(String, String)> = analyzed.from_bindings.iter().map(|b| (b.source.clone(), b.table.clone())).collect();

        let fetch_deadline = query_deadline.min(Instant::now() + Duration::from_millis(self.config.executor.default_deadline_ms));
        let cancellation = CancellationToken::new();

        let fetch_start = Instant::now();
        let mut outcomes = Vec::new();
        for wave in &waves {
            let wave_outcomes = fanout::run_wave(
                &wave.nodes,
                &required,
                principal,
                policy,
                &self.connectors,
                &self.governor,
                &self.cache,
                metadata.max_staleness_ms,
                fetch_deadline,
                self.config.executor.max_concurrent_fetches,
                cancellation.clone(),
            )
            .await?;
            outcomes.extend(wave_outcomes);
        }
        let fetch_ms = elapsed_ms(fetch_start);

        let from_cache = !outcomes.is_empty() && outcomes.iter().all(|o| o.served_from_cache);
        let freshness_ms = outcomes.iter().map(|o| o.rowset.age_ms).max().unwrap_or(0);
        let stale_sources: Vec<String> =
            outcomes.iter().filter(|o| o.freshness == Freshness::Stale).map(|o| o.source.clone()).collect();
        let rate_limit_status: HashMap<String, RateLimitStatus> = outcomes
            .iter()
            .filter_map(|o| {
                self.governor
                    .status(&o.source, &principal.tenant_id)
                    .map(|(remaining, capacity)| (o.source.clone(), RateLimitStatus { remaining, capacity }))
            })
            .collect();

        let analytical_start = Instant::now();
        let rowsets = outcomes
            .into_iter()
            .map(|o| NamedRowset { view_name: o.view_name, rowset: o.rowset })
            .collect();
        let result = analytical::execute(&analyzed.raw_sql, &bindings, rowsets).await?;
        let analytical_ms = elapsed_ms(analytical_start);

        Ok(QueryResponse {
            rows: result.rows,
            columns: result.columns,
            freshness_ms,
            from_cache,
            rate_limit_status,
            timing: Timing { total_ms: elapsed_ms(query_start), planning_ms, fetch_ms, security_ms: 0, analytical_ms },
            trace_id: metadata.trace_id.clone(),
            stale_sources,
        })
    }
}

fn elapsed_ms(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}
