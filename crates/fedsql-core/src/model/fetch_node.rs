//! Fetch nodes and wave grouping (§3, §4.2).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::model::predicate::Operator;

/// One node in the fetch plan: everything needed to call a connector once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FetchNode {
    /// FROM-clause alias (or bare table name) this node satisfies.
    pub qualifier: String,
    /// Source name, e.g. `"github"`.
    pub source: String,
    /// Table name, e.g. `"pull_requests"`.
    pub table: String,
    /// Predicates pushed down to the connector, column to (op, literal).
    pub pushed_filters: HashMap<String, (Operator, JsonValue)>,
    /// Columns the analytical runtime actually needs from this node.
    pub projected_columns: Vec<String>,
    /// Other fetch nodes this one depends on. Always empty today; reserved
    /// for future semi-join pushdown (§3).
    pub depends_on: Vec<String>,
}

impl FetchNode {
    /// The view name this node's rowset will be registered under in the
    /// analytical runtime (§4.8 step 2): `<source>_<table>`.
    #[must_use]
    pub fn view_name(&self) -> String {
        format!("{}_{}", self.source, self.table)
    }

    /// Whether this node has no unmet dependencies and can run in the
    /// current wave.
    #[must_use]
    pub fn is_ready(&self, completed: &[String]) -> bool {
        self.depends_on.iter().all(|d| completed.contains(d))
    }
}

/// A set of fetch nodes with no mutual dependencies, eligible for
/// concurrent execution (§4.2, GLOSSARY).
#[derive(Debug, Clone, Default)]
pub struct Wave {
    /// Nodes in this wave.
    pub nodes: Vec<FetchNode>,
}

/// Topologically group fetch nodes into waves. In the base design every
/// node has an empty `depends_on`, so this always yields exactly one wave;
/// the loop structure is kept so a future semi-join extension that
/// populates `depends_on` does not require rearchitecting the planner.
#[must_use]
pub fn group_into_waves(nodes: Vec<FetchNode>) -> Vec<Wave> {
    let mut remaining = nodes;
    let mut completed: Vec<String> = Vec::new();
    let mut waves = Vec::new();

    while !remaining.is_empty() {
        let (ready, not_ready): (Vec<_>, Vec<_>) =
            remaining.into_iter().partition(|n| n.is_ready(&completed));
        if ready.is_empty() {
            // Dependency cycle; should be unreachable given the base design
            // never populates depends_on. Surface whatever remains as one
            // final wave rather than looping forever.
            waves.push(Wave { nodes: not_ready });
            break;
        }
        completed.extend(ready.iter().map(|n| n.qualifier.clone()));
        waves.push(Wave { nodes: ready });
        remaining = not_ready;
    }

    waves
}
