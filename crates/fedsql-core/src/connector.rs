//! Connector Interface (§4.5): the trait every SaaS source adapter
//! implements. The executor and cache never talk to a source's native API
//! directly — every fetch flows through this trait so pushdown, rate
//! limiting, and caching apply uniformly regardless of source.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::error::Result;
use crate::model::{Operator, Rowset, SourceDescriptor};

/// One connector per external source (GitHub, Jira, a CRM, ...).
///
/// Implementations own their own HTTP client, auth, and pagination; they
/// report only the capability contract (`describe`) and the fetch result
/// (`fetch`) to the rest of the pipeline.
#[async_trait]
pub trait Connector: Send + Sync {
    /// This connector's source name, matching `SourceDescriptor::name`.
    fn name(&self) -> &str;

    /// The capability contract: tables, columns, and which filters/operators
    /// can be pushed down (§4.1c, §4.5).
    fn describe(&self) -> &SourceDescriptor;

    /// Fetch rows for `table`, applying `pushed_filters` server-side and
    /// requesting only `projected_columns` when the source supports partial
    /// selection. Must return within `deadline` or surface
    /// `FedSqlError::SourceTimeout`.
    ///
    /// # Errors
    ///
    /// Returns `FedSqlError::SourceTimeout` on deadline exceeded,
    /// `FedSqlError::SourceError` for any other source-reported failure.
    async fn fetch(
        &self,
        table: &str,
        pushed_filters: &HashMap<String, (Operator, JsonValue)>,
        projected_columns: &[String],
        deadline: Instant,
    ) -> Result<Rowset>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnDescriptor, SemanticType, TableDescriptor};
    use std::collections::HashSet;
    use std::time::Duration;

    struct EchoConnector {
        descriptor: SourceDescriptor,
    }

    #[async_trait]
    impl Connector for EchoConnector {
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
            _deadline: Instant,
        ) -> Result<Rowset> {
            Ok(Rowset::empty(crate::model::Schema::new(vec![])))
        }
    }

    #[tokio::test]
    async fn trait_object_can_be_invoked_through_dyn_dispatch() {
        let connector: Box<dyn Connector> = Box::new(EchoConnector {
            descriptor: SourceDescriptor {
                name: "github".into(),
                tables: vec![TableDescriptor {
                    name: "pull_requests".into(),
                    columns: vec![ColumnDescriptor { name: "id".into(), semantic_type: SemanticType::Text }],
                    pushable_filters: HashSet::new(),
                    pushable_operators: HashSet::new(),
                    supports_conditional_fetch: false,
                    rate_capacity: 10.0,
                    rate_refill_per_second: 1.0,
                    hard_staleness_cap_ms: 3_600_000,
                }],
            },
        });

        let result = connector
            .fetch("pull_requests", &HashMap::new(), &[], Instant::now() + Duration::from_secs(1))
            .await
            .unwrap();
        assert!(result.is_empty());
    }
}
