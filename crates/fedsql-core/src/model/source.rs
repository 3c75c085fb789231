//! Source and table descriptors: the capability contract a connector
//! advertises about what it can do (§3, §4.5).

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::model::predicate::{Operator, SemanticType};

/// One column in a table descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnDescriptor {
    /// Column name as it appears in SQL.
    pub name: String,
    /// Semantic type used for predicate/literal type matching (§4.1c).
    pub semantic_type: SemanticType,
}

/// Everything the planner and analyzer need to know about one remote table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableDescriptor {
    /// Table name, e.g. `"pull_requests"`.
    pub name: String,
    /// All columns, in source-declared order.
    pub columns: Vec<ColumnDescriptor>,
    /// Subset of column names the source API can filter by.
    pub pushable_filters: HashSet<String>,
    /// Operators the source accepts beyond the baseline `{=, IN}` (§4.1b).
    pub pushable_operators: HashSet<Operator>,
    /// Whether the source supports conditional (etag-like) fetch.
    pub supports_conditional_fetch: bool,
    /// Nominal token-bucket capacity for this table's source (see `RateState`).
    pub rate_capacity: f64,
    /// Token refill rate, tokens per second.
    pub rate_refill_per_second: f64,
    /// Maximum age, in milliseconds, at which a cache entry for this table
    /// may ever be served, regardless of caller preference (§3 invariant).
    pub hard_staleness_cap_ms: u64,
}

impl TableDescriptor {
    /// Look up a column's semantic type by name.
    #[must_use]
    pub fn column_type(&self, name: &str) -> Option<SemanticType> {
        self.columns.iter().find(|c| c.name == name).map(|c| c.semantic_type)
    }

    /// Whether `column` can be pushed down with `op`, per §4.1b.
    #[must_use]
    pub fn is_pushable(&self, column: &str, op: Operator) -> bool {
        if !self.pushable_filters.contains(column) {
            return false;
        }
        matches!(op, Operator::Eq | Operator::In) || self.pushable_operators.contains(&op)
    }
}

/// A named source (`github`, `jira`, …) and the tables it exposes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceDescriptor {
    /// Source name, used to qualify tables in SQL (`github.pull_requests`).
    pub name: String,
    /// Tables this source exposes, keyed by table name for lookup.
    pub tables: Vec<TableDescriptor>,
}

impl SourceDescriptor {
    /// Find a table descriptor by name.
    #[must_use]
    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.iter().find(|t| t.name == name)
    }
}
