//! Analytical Runtime (§4.8): an ephemeral, per-query DataFusion session.
//!
//! Each query gets a fresh `SessionContext` with no state shared with any
//! other query. Every secured rowset is converted to an Arrow
//! `RecordBatch` and registered as a `MemTable` view named
//! `<source>_<table>` (`FetchNode::view_name`); the original SQL is
//! rewritten so `source.table` references become those view names, then
//! executed as-is — join ordering, residual predicate evaluation, `ORDER
//! BY`, `GROUP BY`, and `LIMIT` are all DataFusion's job, not this crate's.
//! The session and every registered batch are dropped when `execute`
//! returns; nothing outlives one query.
//!
//! Grounded in `examples/other_examples/manifests/alexchoi-personal-yachtSQL`
//! (the only embedded-analytical-engine precedent in the retrieval pack),
//! not in the teacher crate, whose own embedded engine compiles GraphQL to
//! SQL against PostgreSQL rather than running an in-process columnar
//! executor.

use std::collections::HashSet;
use std::sync::Arc;

use arrow::array::{ArrayRef, BooleanArray, Float64Array, Int32Array, Int64Array, StringArray};
use arrow::datatypes::{DataType, Field, Schema as ArrowSchema};
use arrow::record_batch::RecordBatch;
use datafusion::datasource::MemTable;
use datafusion::prelude::SessionContext;
use serde_json::{Map as JsonMap, Value as JsonValue};

use fedsql_core::error::{FedSqlError, Result};
use fedsql_core::model::{Rowset, SemanticType};

/// One fetch node's secured rowset, ready to be registered as a view.
pub struct NamedRowset {
    /// View name the rowset is registered under (`FetchNode::view_name`).
    pub view_name: String,
    /// Secured rows (row rules and column rules already applied).
    pub rowset: Rowset,
}

/// Final result of running the rewritten SQL: rows in schema order, plus
/// the final column list (post-`BLOCK`, post-projection).
#[derive(Debug)]
pub struct AnalyticalResult {
    /// Rows, each keyed by column name.
    pub rows: Vec<JsonMap<String, JsonValue>>,
    /// Final column list, in result order.
    pub columns: Vec<String>,
}

/// Execute `raw_sql`, with every `source.table` reference in `bindings`
/// mechanically rewritten to its view name (§4.8 step 3), against the
/// given rowsets.
///
/// # Errors
///
/// Returns `FedSqlError::Internal` if a rowset cannot be converted to a
/// columnar batch, or if DataFusion cannot plan or execute the rewritten
/// SQL (join/aggregate/residual-predicate failures surface here, since the
/// analyzer never validates residual SQL shape beyond parsing it once).
pub async fn execute(
    raw_sql: &str,
    bindings: &[(String, String)],
    rowsets: Vec<NamedRowset>,
) -> Result<AnalyticalResult> {
    let ctx = SessionContext::new();

    for named in &rowsets {
        let batch = rowset_to_batch(&named.rowset)?;
        let schema = batch.schema();
        let table = MemTable::try_new(schema, vec![vec![batch]])
            .map_err(|e| FedSqlError::Internal { message: format!("failed to build view '{}': {e}", named.view_name) })?;
        ctx.register_table(named.view_name.as_str(), Arc::new(table))
            .map_err(|e| FedSqlError::Internal { message: format!("failed to register view '{}': {e}", named.view_name) })?;
    }

    let rewritten = rewrite_table_references(raw_sql, bindings);

    let df = ctx
        .sql(&rewritten)
        .await
        .map_err(|e| FedSqlError::Internal { message: format!("analytical planning failed: {e}") })?;
    let batches = df.collect().await.map_err(|e| FedSqlError::Internal { message: format!("analytical execution failed: {e}") })?;

    let columns = batches
        .first()
        .map(|b| b.schema().fields().iter().map(|f| f.name().clone()).collect())
        .unwrap_or_default();
    let rows = batches_to_rows(&batches)?;

    Ok(AnalyticalResult { rows, columns })
}

/// Mechanical substitution of `source.table` with `<source>_<table>` in
/// the original SQL text. Exact literal replacement, scoped to the
/// `(source, table)` pairs the analyzer already resolved to a FROM
/// binding — safe because anything it could not resolve was already
/// rejected as `PLAN_FAILED` upstream.
fn rewrite_table_references(sql: &str, bindings: &[(String, String)]) -> String {
    let mut seen = HashSet::new();
    let mut rewritten = sql.to_string();
    for (source, table) in bindings {
        if !seen.insert((source.clone(), table.clone())) {
            continue;
        }
        let from = format!("{source}.{table}");
        let to = format!("{source}_{table}");
        rewritten = rewritten.replace(&from, &to);
    }
    rewritten
}

fn rowset_to_batch(rowset: &Rowset) -> Result<RecordBatch> {
    let columns = rowset.schema.columns();
    let fields: Vec<Field> = columns.iter().map(|c| Field::new(&c.name, arrow_type(c.semantic_type), true)).collect();
    let arrow_schema = Arc::new(ArrowSchema::new(fields));

    let mut arrays: Vec<ArrayRef> = Vec::with_capacity(columns.len());
    for column in columns {
        let values: Vec<Option<JsonValue>> = rowset.records.iter().map(|r| r.get(&column.name).cloned()).collect();
        arrays.push(build_array(column.semantic_type, &values));
    }

    RecordBatch::try_new(arrow_schema, arrays).map_err(|e| FedSqlError::Internal { message: format!("failed to build record batch: {e}") })
}

/// Timestamps are carried as their RFC 3339 string form rather than a
/// typed Arrow timestamp column: the pipeline's `SemanticType::Timestamp`
/// (§3 supplemental types) only needs to validate predicate literals, and
/// DataFusion's string comparison/ordering over RFC 3339 text is
/// lexicographically correct, so the extra parsing step buys nothing.
fn arrow_type(semantic_type: SemanticType) -> DataType {
    match semantic_type {
        SemanticType::Text | SemanticType::Timestamp => DataType::Utf8,
        SemanticType::Integer => DataType::Int64,
        SemanticType::Float => DataType::Float64,
        SemanticType::Boolean => DataType::Boolean,
    }
}

fn build_array(semantic_type: SemanticType, values: &[Option<JsonValue>]) -> ArrayRef {
    match semantic_type {
        SemanticType::Text | SemanticType::Timestamp => {
            Arc::new(StringArray::from(values.iter().map(|v| v.as_ref().and_then(JsonValue::as_str).map(str::to_string)).collect::<Vec<_>>()))
        }
        SemanticType::Integer => Arc::new(Int64Array::from(values.iter().map(|v| v.as_ref().and_then(JsonValue::as_i64)).collect::<Vec<_>>())),
        SemanticType::Float => Arc::new(Float64Array::from(values.iter().map(|v| v.as_ref().and_then(JsonValue::as_f64)).collect::<Vec<_>>())),
        SemanticType::Boolean => Arc::new(BooleanArray::from(values.iter().map(|v| v.as_ref().and_then(JsonValue::as_bool)).collect::<Vec<_>>())),
    }
}

fn batches_to_rows(batches: &[RecordBatch]) -> Result<Vec<JsonMap<String, JsonValue>>> {
    let mut rows = Vec::new();
    for batch in batches {
        let schema = batch.schema();
        for row_idx in 0..batch.num_rows() {
            let mut row = JsonMap::new();
            for (col_idx, field) in schema.fields().iter().enumerate() {
                row.insert(field.name().clone(), cell_to_json(batch.column(col_idx), row_idx)?);
            }
            rows.push(row);
        }
    }
    Ok(rows)
}

fn cell_to_json(array: &ArrayRef, idx: usize) -> Result<JsonValue> {
    if array.is_null(idx) {
        return Ok(JsonValue::Null);
    }
    let value = match array.data_type() {
        DataType::Utf8 => JsonValue::String(array.as_any().downcast_ref::<StringArray>().unwrap().value(idx).to_string()),
        DataType::Int64 => JsonValue::from(array.as_any().downcast_ref::<Int64Array>().unwrap().value(idx)),
        DataType::Int32 => JsonValue::from(array.as_any().downcast_ref::<Int32Array>().unwrap().value(idx)),
        DataType::Float64 => {
            serde_json::Number::from_f64(array.as_any().downcast_ref::<Float64Array>().unwrap().value(idx)).map_or(JsonValue::Null, JsonValue::Number)
        }
        DataType::Boolean => JsonValue::Bool(array.as_any().downcast_ref::<BooleanArray>().unwrap().value(idx)),
        other => {
            return Err(FedSqlError::Internal { message: format!("unsupported analytical result column type: {other:?}") });
        }
    };
    Ok(value)
}
