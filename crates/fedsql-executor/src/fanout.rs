//! Parallel Executor (§4.7): runs one wave's fetch nodes concurrently,
//! bounded by a per-query semaphore, with a single cancellation signal and
//! query deadline shared across every node.
//!
//! Each node runs the cache → rate-governor → connector → security
//! pipeline described in §2's data-flow line. Outer-join partial success
//! is not implemented (§9 open question 2): the first node failure,
//! whether from a required or optional source, cancels every other
//! outstanding node and fails the wave. `required` is still threaded
//! through to `NodeOutcome` so a future partial-success policy has
//! somewhere to read it from.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use fedsql_core::cache::{CacheKey, Freshness, FreshnessCache};
use fedsql_core::connector::Connector;
use fedsql_core::error::{FedSqlError, Result};
use fedsql_core::model::{FetchNode, Principal, Rowset};
use fedsql_core::rate::RateGovernor;
use fedsql_core::security::{self, SecurityPolicy};
use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

/// Connectors available to the executor, keyed by source name.
pub type ConnectorRegistry = HashMap<String, Arc<dyn Connector>>;

/// Everything one fetch node produced, ready to register as an analytical
/// runtime view (§4.8 step 2).
#[derive(Debug, Clone)]
pub struct NodeOutcome {
    /// View name the analytical runtime will register this under.
    pub view_name: String,
    /// FROM-clause qualifier this outcome satisfies.
    pub qualifier: String,
    /// Source this outcome was fetched from, for rate-limit status
    /// reporting.
    pub source: String,
    /// Secured rowset (row rules then column rules already applied).
    pub rowset: Rowset,
    /// Whether this node's rows came straight from a live fetch or were
    /// served from cache (fresh hit or stale fallback).
    pub freshness: Freshness,
    /// Whether this node avoided a connector call entirely.
    pub served_from_cache: bool,
    /// §4.7: required iff the node appears in a non-outer join or the
    /// SELECT list.
    pub required: bool,
}

/// Run every node in `nodes` concurrently, bounded by `max_concurrent`,
/// cancelling all outstanding fetches the moment any one node fails or
/// `deadline` elapses.
///
/// # Errors
///
/// Returns the first error observed from any node, or `SourceTimeout` for
/// the synthetic `"query"` source if the deadline elapses before every
/// node finishes.
#[allow(clippy::too_many_arguments)]
pub async fn run_wave(
    nodes: &[FetchNode],
    required: &HashMap<String, bool>,
    principal: &Principal,
    policy: &SecurityPolicy,
    connectors: &ConnectorRegistry,
    governor: &RateGovernor,
    cache: &FreshnessCache,
    max_staleness_ms: u64,
    deadline: Instant,
    max_concurrent: usize,
    cancellation: CancellationToken,
) -> Result<Vec<NodeOutcome>> {
    if nodes.is_empty() {
        return Ok(Vec::new());
    }

    let permits = max_concurrent.min(nodes.len()).max(1);
    let semaphore = Semaphore::new(permits);

    let mut futs = FuturesUnordered::new();
    for node in nodes {
        let node_required = *required.get(&node.qualifier).unwrap_or(&true);
        futs.push(run_node(
            node,
            node_required,
            principal,
            policy,
            connectors,
            governor,
            cache,
            max_staleness_ms,
            deadline,
            &semaphore,
            &cancellation,
        ));
    }

    let deadline_guard = tokio::time::sleep_until(tokio::time::Instant::from_std(deadline));
    tokio::pin!(deadline_guard);

    let mut outcomes = Vec::with_capacity(nodes.len());
    let mut first_error: Option<FedSqlError> = None;

    loop {
        tokio::select! {
            () = &mut deadline_guard, if first_error.is_none() => {
                first_error = Some(FedSqlError::SourceTimeout { source_id: "query".to_string() });
                cancellation.cancel();
            }
            next = futs.next() => {
                match next {
                    Some(Ok(outcome)) => outcomes.push(outcome),
                    Some(Err(err)) => {
                        if first_error.is_none() {
                            first_error = Some(err);
                        }
                        cancellation.cancel();
                    }
                    None => break,
                }
            }
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => Ok(outcomes),
    }
}

#[allow(clippy::too_many_arguments)]
async fn run_node(
    node: &FetchNode,
    node_required: bool,
    principal: &Principal,
    policy: &SecurityPolicy,
    connectors: &ConnectorRegistry,
    governor: &RateGovernor,
    cache: &FreshnessCache,
    max_staleness_ms: u64,
    deadline: Instant,
    semaphore: &Semaphore,
    cancellation: &CancellationToken,
) -> Result<NodeOutcome> {
    let connector = connectors
        .get(&node.source)
        .ok_or_else(|| FedSqlError::PlanFailed { reason: format!("no connector registered for source '{}'", node.source) })?;

    let table = connector.describe().table(&node.table).ok_or_else(|| FedSqlError::PlanFailed {
        reason: format!("connector '{}' does not describe table '{}'", node.source, node.table),
    })?;
    let capacity = table.rate_capacity;
    let refill = table.rate_refill_per_second;
    let hard_staleness_cap_ms = table.hard_staleness_cap_ms;

    let _permit = semaphore
        .acquire()
        .await
        .map_err(|_| FedSqlError::Internal { message: "fan-out semaphore closed".into() })?;

    let key = CacheKey::new(&principal.tenant_id, &node.source, &node.table, &node.pushed_filters);

    let fetch = || async {
        governor.admit(&node.source, &principal.tenant_id, capacity, refill)?;
        tokio::select! {
            () = cancellation.cancelled() => Err(FedSqlError::SourceTimeout { source_id: node.source.clone() }),
            result = connector.fetch(&node.table, &node.pushed_filters, &node.projected_columns, deadline) => result,
        }
    };

    let resolved = cache.get_or_fetch(&principal.tenant_id, key, max_staleness_ms, hard_staleness_cap_ms, fetch).await?;
    let secured =
        security::enforce(policy, &node.view_name(), principal, (*resolved.rowset).clone(), node_required, &node.projected_columns)?;

    Ok(NodeOutcome {
        view_name: node.view_name(),
        qualifier: node.qualifier.clone(),
        source: node.source.clone(),
        rowset: secured,
        freshness: resolved.freshness,
        served_from_cache: resolved.served_from_cache,
        required: node_required,
    })
}
