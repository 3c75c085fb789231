//! Fetch Planner (§4.2): turns an analyzed query into one fetch node per
//! `FROM` binding, grouped into waves.

use std::collections::HashMap;

use crate::analyzer::AnalyzedQuery;
use crate::model::{group_into_waves, FetchNode, Wave};

/// Build one `FetchNode` per `FROM` binding and group them into waves.
///
/// `pushed_filters` comes straight from the analyzer's pushdown
/// classification (§4.1); `projected_columns` is the union of columns
/// referenced by projections, residual predicates, `ORDER BY`, and join
/// conditions that the analyzer already collected, narrowed to this
/// binding's qualifier. An empty projection set means a wildcard was used
/// somewhere and no pruning is possible for this node — projected_columns
/// is left empty and callers should request the full row.
#[must_use]
pub fn plan(analyzed: &AnalyzedQuery) -> Vec<Wave> {
    let mut nodes = Vec::with_capacity(analyzed.from_bindings.len());

    for binding in &analyzed.from_bindings {
        let mut pushed_filters = HashMap::new();
        for classified in &analyzed.predicates {
            if classified.pushable && classified.predicate.qualifier == binding.qualifier {
                pushed_filters
                    .insert(classified.predicate.column.clone(), (classified.predicate.op, classified.predicate.literal.clone()));
            }
        }

        let projected_columns = analyzed
            .projected_columns
            .get(&binding.qualifier)
            .map(|set| {
                let mut cols: Vec<String> = set.iter().cloned().collect();
                cols.sort();
                cols
            })
            .unwrap_or_default();

        nodes.push(FetchNode {
            qualifier: binding.qualifier.clone(),
            source: binding.source.clone(),
            table: binding.table.clone(),
            pushed_filters,
            projected_columns,
            depends_on: Vec::new(),
        });
    }

    group_into_waves(nodes)
}
