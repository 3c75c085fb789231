//! Column-Level Security (CLS): per-column transforms applied after row
//! rules (§4.6).
//!
//! Three rule kinds, in order of severity:
//!
//! - `Hash`: keep a literal prefix, replace the remainder with a fixed
//!   suffix literal (e.g. `"4111"` + `"****"` for a card number). `NULL`
//!   values pass through unchanged — hashing a NULL is a no-op, not a
//!   "HASH of null" string.
//! - `Redact`: replace the value with `null`, keeping the column present.
//! - `Block`: remove the column from the schema and every record entirely.
//!   If a query's projection names only blocked columns for a required
//!   source, the caller gets `FedSqlError::EntitlementDenied`, never a
//!   silently empty row — even if the table has other, unselected columns
//!   that survive blocking.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{FedSqlError, Result};
use crate::model::Rowset;

/// A single column-level rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnRule {
    /// Table this rule applies to, matching a `FetchNode::view_name()`.
    pub view_name: String,
    /// Column the rule transforms.
    pub column: String,
    /// The transform to apply.
    pub action: ColumnAction,
}

/// The transform a `ColumnRule` applies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ColumnAction {
    /// Keep `prefix_len` characters, replace the rest with `suffix_literal`.
    Hash { prefix_len: usize, suffix_literal: String },
    /// Replace the value with `null`.
    Redact,
    /// Remove the column entirely.
    Block,
}

/// Apply every rule scoped to `view_name`, in the order given.
///
/// `projected_columns` is the query's actual SELECT-list (plus residual
/// predicate/ORDER BY/join) columns for this view — the set pruning decided
/// the connector needed to fetch. An empty slice means "no pruning was
/// possible" (`SELECT *`), in which case denial falls back to checking
/// whether blocking emptied the whole schema.
///
/// # Errors
///
/// Returns `FedSqlError::EntitlementDenied` when a `Block` rule removes
/// every column the query actually projected for a required source, even if
/// other, unselected columns on the same view survive — leaving nothing to
/// return is still nothing to return.
pub fn apply_column_rules(
    rules: &[ColumnRule],
    view_name: &str,
    mut rowset: Rowset,
    required: bool,
    projected_columns: &[String],
) -> Result<Rowset> {
    let scoped: Vec<&ColumnRule> = rules.iter().filter(|r| r.view_name == view_name).collect();
    if scoped.is_empty() {
        return Ok(rowset);
    }

    let had_columns = !rowset.schema.columns().is_empty();

    for rule in &scoped {
        match &rule.action {
            ColumnAction::Hash { prefix_len, suffix_literal } => {
                for record in &mut rowset.records {
                    if let Some(value) = record.get_mut(&rule.column) {
                        *value = hash_value(value, *prefix_len, suffix_literal);
                    }
                }
            }
            ColumnAction::Redact => {
                for record in &mut rowset.records {
                    if let Some(value) = record.get_mut(&rule.column) {
                        *value = JsonValue::Null;
                    }
                }
            }
            ColumnAction::Block => {
                rowset.schema.remove_column(&rule.column);
                for record in &mut rowset.records {
                    record.remove(&rule.column);
                }
            }
        }
    }

    let denied = if projected_columns.is_empty() {
        rowset.schema.columns().is_empty()
    } else {
        projected_columns.iter().all(|c| !rowset.schema.has_column(c))
    };

    if required && had_columns && denied {
        return Err(FedSqlError::EntitlementDenied {
            reason: format!("every projected column of '{view_name}' is blocked for this principal"),
        });
    }

    Ok(rowset)
}

fn hash_value(value: &JsonValue, prefix_len: usize, suffix_literal: &str) -> JsonValue {
    match value {
        JsonValue::Null => JsonValue::Null,
        JsonValue::String(s) => {
            let prefix: String = s.chars().take(prefix_len).collect();
            JsonValue::String(format!("{prefix}{suffix_literal}"))
        }
        other => {
            let rendered = other.to_string();
            let prefix: String = rendered.chars().take(prefix_len).collect();
            JsonValue::String(format!("{prefix}{suffix_literal}"))
        }
    }
}
