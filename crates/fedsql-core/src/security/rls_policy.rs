//! Row-Level Security (RLS): fail-closed row filtering (§4.6).
//!
//! A row rule is a boolean predicate over one column, compared against
//! either a literal or an attribute of the requesting `Principal`. A row is
//! kept only if every rule for its source/table evaluates to `true` —
//! evaluation failure (missing column, type mismatch) counts as `false`,
//! never as "keep": RLS is fail-closed.

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::error::{FedSqlError, Result};
use crate::model::{Operator, Principal, Record, Rowset};

/// The right-hand side of a row rule: either a fixed literal or a
/// principal attribute resolved at evaluation time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum RuleValue {
    /// A fixed literal.
    Literal(JsonValue),
    /// `principal.tenant_id`, `principal.user_id`, `principal.team_id`, or
    /// `principal.role`.
    PrincipalAttribute(String),
}

/// A single row-level rule: `column OP value`, evaluated per record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RowRule {
    /// Table this rule applies to, matching a `FetchNode::view_name()`.
    pub view_name: String,
    /// Column the rule inspects.
    pub column: String,
    /// Comparison operator.
    pub op: Operator,
    /// Comparand.
    pub value: RuleValue,
}

impl RowRule {
    fn resolve(&self, principal: &Principal) -> JsonValue {
        match &self.value {
            RuleValue::Literal(v) => v.clone(),
            RuleValue::PrincipalAttribute(attr) => match attr.as_str() {
                "tenant_id" => JsonValue::String(principal.tenant_id.clone()),
                "user_id" => JsonValue::String(principal.user_id.clone()),
                "role" => JsonValue::String(principal.role.clone()),
                "team_id" => JsonValue::String(principal.team_id.clone()),
                _ => JsonValue::Null,
            },
        }
    }

    /// Evaluate this rule against one record. Any failure to compare
    /// (missing column, incomparable types) evaluates to `false`.
    fn matches(&self, record: &Record, principal: &Principal) -> bool {
        let Some(actual) = record.get(&self.column) else { return false };
        let expected = self.resolve(principal);
        compare(actual, self.op, &expected)
    }
}

fn compare(actual: &JsonValue, op: Operator, expected: &JsonValue) -> bool {
    match op {
        Operator::Eq => actual == expected,
        Operator::Ne => actual != expected,
        Operator::In => expected.as_array().is_some_and(|arr| arr.contains(actual)),
        Operator::Gt | Operator::Lt | Operator::Ge | Operator::Le => {
            match (actual.as_f64(), expected.as_f64()) {
                (Some(a), Some(b)) => match op {
                    Operator::Gt => a > b,
                    Operator::Lt => a < b,
                    Operator::Ge => a >= b,
                    Operator::Le => a <= b,
                    _ => unreachable!(),
                },
                _ => false,
            }
        }
    }
}

/// Apply every rule scoped to `view_name` to `rowset`, keeping only records
/// for which all matching rules pass.
///
/// # Errors
///
/// Returns `FedSqlError::EntitlementDenied` when `required` is `true` and
/// every record was filtered out, signalling the caller's query cannot be
/// satisfied rather than silently returning zero rows for a required join
/// side.
pub fn apply_row_rules(
    rules: &[RowRule],
    view_name: &str,
    principal: &Principal,
    mut rowset: Rowset,
    required: bool,
) -> Result<Rowset> {
    let scoped: Vec<&RowRule> = rules.iter().filter(|r| r.view_name == view_name).collect();
    if scoped.is_empty() {
        return Ok(rowset);
    }

    let had_records = !rowset.records.is_empty();
    rowset.records.retain(|record| scoped.iter().all(|rule| rule.matches(record, principal)));

    if required && had_records && rowset.records.is_empty() {
        return Err(FedSqlError::EntitlementDenied {
            reason: format!("no rows in '{view_name}' are visible to this principal"),
        });
    }

    Ok(rowset)
}
