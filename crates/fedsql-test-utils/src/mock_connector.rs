//! A `Connector` double that serves pre-seeded rowsets and can simulate
//! throttling, timeouts, and latency for exercising the cache's
//! serve-stale-on-transient-failure path (§4.3) and the executor's
//! deadline handling (§4.7) without a real network call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use fedsql_core::connector::Connector;
use fedsql_core::error::{FedSqlError, Result};
use fedsql_core::model::{Operator, Rowset, SourceDescriptor};
use parking_lot::Mutex;
use serde_json::Value as JsonValue;

/// What the mock should do on the next `fetch` call for a table.
#[derive(Debug, Clone)]
pub enum ScriptedResponse {
    /// Return these rows.
    Rows(Rowset),
    /// Fail as if the source timed out.
    Timeout,
    /// Fail as if a non-transient source error occurred.
    SourceError(String),
    /// Sleep for the given duration, then return these rows (for deadline
    /// tests).
    Delay(Duration, Rowset),
}

/// A connector double driven by a fixed script of responses, one per call,
/// consumed in order; the last entry repeats once exhausted.
pub struct MockConnector {
    descriptor: SourceDescriptor,
    script: Mutex<Vec<ScriptedResponse>>,
    call_count: AtomicUsize,
}

impl MockConnector {
    /// Build a mock that always returns `rows` for every call.
    #[must_use]
    pub fn always_returning(descriptor: SourceDescriptor, rows: Rowset) -> Self {
        Self { descriptor, script: Mutex::new(vec![ScriptedResponse::Rows(rows)]), call_count: AtomicUsize::new(0) }
    }

    /// Build a mock that replays `script` in order, one entry per call.
    #[must_use]
    pub fn scripted(descriptor: SourceDescriptor, script: Vec<ScriptedResponse>) -> Self {
        Self { descriptor, script: Mutex::new(script), call_count: AtomicUsize::new(0) }
    }

    /// How many times `fetch` has been called.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> ScriptedResponse {
        let mut script = self.script.lock();
        if script.len() > 1 {
            script.remove(0)
        } else {
            script.last().cloned().expect("script must not be empty")
        }
    }
}

#[async_trait]
impl Connector for MockConnector {
    fn name(&self) -> &str {
        &self.descriptor.name
    }

    fn describe(&self) -> &SourceDescriptor {
        &self.descriptor
    }

    async fn fetch(
        &self,
        _table: &str,
        _pushed_filters: &HashMap<String, (Operator, JsonValue)>,
        _projected_columns: &[String],
        deadline: Instant,
    ) -> Result<Rowset> {
        self.call_count.fetch_add(1, Ordering::SeqCst);

        match self.next_response() {
            ScriptedResponse::Rows(rows) => Ok(rows),
            ScriptedResponse::Timeout => Err(FedSqlError::SourceTimeout { source_id: self.descriptor.name.clone() }),
            ScriptedResponse::SourceError(message) => Err(FedSqlError::SourceError { source_id: self.descriptor.name.clone(), message }),
            ScriptedResponse::Delay(delay, rows) => {
                tokio::time::sleep(delay).await;
                if Instant::now() >= deadline {
                    return Err(FedSqlError::SourceTimeout { source_id: self.descriptor.name.clone() });
                }
                Ok(rows)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::github_pull_requests_source;
    use fedsql_core::model::{Schema, SchemaColumn, SemanticType};

    fn empty_rows() -> Rowset {
        Rowset::empty(Schema::new(vec![SchemaColumn { name: "id".into(), semantic_type: SemanticType::Text }]))
    }

    #[tokio::test]
    async fn always_returning_serves_same_rows_every_call() {
        let mock = MockConnector::always_returning(github_pull_requests_source(), empty_rows());
        for _ in 0..3 {
            mock.fetch("pull_requests", &HashMap::new(), &[], Instant::now() + Duration::from_secs(1)).await.unwrap();
        }
        assert_eq!(mock.call_count(), 3);
    }

    #[tokio::test]
    async fn scripted_timeout_then_rows_replays_in_order() {
        let mock = MockConnector::scripted(
            github_pull_requests_source(),
            vec![ScriptedResponse::Timeout, ScriptedResponse::Rows(empty_rows())],
        );

        let first = mock.fetch("pull_requests", &HashMap::new(), &[], Instant::now() + Duration::from_secs(1)).await;
        assert!(matches!(first, Err(FedSqlError::SourceTimeout { .. })));

        let second = mock.fetch("pull_requests", &HashMap::new(), &[], Instant::now() + Duration::from_secs(1)).await;
        assert!(second.is_ok());
    }

    #[tokio::test]
    async fn delay_past_deadline_surfaces_timeout() {
        let mock = MockConnector::always_returning(github_pull_requests_source(), empty_rows());
        let script = ScriptedResponse::Delay(Duration::from_millis(20), empty_rows());
        let mock = MockConnector::scripted(mock.describe().clone(), vec![script]);

        let err = mock.fetch("pull_requests", &HashMap::new(), &[], Instant::now()).await.unwrap_err();
        assert!(matches!(err, FedSqlError::SourceTimeout { .. }));
    }
}
