//! SQL Analyzer (§4.1): parses the submitted SQL, resolves FROM bindings,
//! assigns WHERE predicates to bindings, and classifies each assigned
//! predicate as pushable or residual.
//!
//! Residual constructs (functions, `OR`, subqueries, `ORDER BY`/`GROUP BY`/
//! `LIMIT`) are never reconstructed here — the analytical runtime (§4.8)
//! re-executes the original SQL text (with table references rewritten to
//! view names) against the fetched rowsets, so residual predicates are
//! simply left in place rather than modeled structurally.

use std::collections::{HashMap, HashSet};

use sqlparser::ast::{
    BinaryOperator, Expr, GroupByExpr, Join, JoinOperator, ObjectName, Select, SelectItem,
    SetExpr, Statement, TableFactor, TableWithJoins, Value,
};
use sqlparser::dialect::GenericDialect;
use sqlparser::parser::Parser;

use crate::error::{FedSqlError, Result};
use crate::model::{Operator, Predicate, SemanticType, SourceDescriptor, TableDescriptor};

/// Read-only lookup of source/table capability descriptors, used to decide
/// whether a predicate can be pushed down.
pub trait SourceRegistry: Send + Sync {
    /// Look up the descriptor for `source.table`, if known.
    fn table(&self, source: &str, table: &str) -> Option<&TableDescriptor>;
}

/// An in-memory registry built from a fixed set of source descriptors.
/// Sufficient for this crate: sources are configured, not discovered.
#[derive(Debug, Clone, Default)]
pub struct StaticSourceRegistry {
    sources: Vec<SourceDescriptor>,
}

impl StaticSourceRegistry {
    /// Build a registry from a list of source descriptors.
    #[must_use]
    pub fn new(sources: Vec<SourceDescriptor>) -> Self {
        Self { sources }
    }
}

impl SourceRegistry for StaticSourceRegistry {
    fn table(&self, source: &str, table: &str) -> Option<&TableDescriptor> {
        self.sources.iter().find(|s| s.name == source)?.table(table)
    }
}

/// One `FROM`-clause binding: an alias (or bare table name) mapped to
/// `source.table`.
#[derive(Debug, Clone, PartialEq)]
pub struct FromBinding {
    /// Alias, or the table name itself when unaliased.
    pub qualifier: String,
    /// Source name (the part before the dot).
    pub source: String,
    /// Table name (the part after the dot).
    pub table: String,
    /// False only for the right-hand side of a LEFT/FULL OUTER JOIN (§4.7:
    /// "a source is required iff it appears in a non-outer join or in the
    /// SELECT list").
    pub required: bool,
}

/// A predicate assigned to a binding, with its pushdown classification.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedPredicate {
    /// The predicate atom.
    pub predicate: Predicate,
    /// Whether §4.1's pushdown rule admits this predicate.
    pub pushable: bool,
}

/// Output of analyzing one SQL statement.
#[derive(Debug, Clone)]
pub struct AnalyzedQuery {
    /// `FROM`-clause bindings, in declaration order.
    pub from_bindings: Vec<FromBinding>,
    /// Top-level `WHERE` atoms assigned to a binding, classified.
    pub predicates: Vec<ClassifiedPredicate>,
    /// Columns referenced anywhere that should survive projection pruning,
    /// per qualifier (§4.2: projections + residual predicates + ORDER BY +
    /// join conditions).
    pub projected_columns: HashMap<String, HashSet<String>>,
    /// The original SQL text, unmodified, for the analytical runtime to
    /// rewrite and re-execute (§4.8).
    pub raw_sql: String,
}

impl AnalyzedQuery {
    /// Find a binding by qualifier.
    #[must_use]
    pub fn binding(&self, qualifier: &str) -> Option<&FromBinding> {
        self.from_bindings.iter().find(|b| b.qualifier == qualifier)
    }
}

/// Parse and analyze one SQL statement against a source registry.
///
/// # Errors
///
/// Returns `PlanFailed` for unsupported constructs (write DML/DDL, set
/// operations, unresolved qualifiers) per §4.1.
pub fn analyze(sql: &str, registry: &dyn SourceRegistry) -> Result<AnalyzedQuery> {
    let statements = Parser::parse_sql(&GenericDialect {}, sql).map_err(|e| FedSqlError::PlanFailed {
        reason: format!("SQL parse error: {e}"),
    })?;

    let statement = statements.into_iter().next().ok_or_else(|| FedSqlError::PlanFailed {
        reason: "empty statement".to_string(),
    })?;

    let query = match statement {
        Statement::Query(q) => q,
        other => {
            return Err(FedSqlError::PlanFailed {
                reason: format!("only SELECT is supported, got {other}"),
            })
        }
    };

    let select = match *query.body {
        SetExpr::Select(s) => s,
        SetExpr::SetOperation { .. } => {
            return Err(FedSqlError::PlanFailed {
                reason: "UNION/INTERSECT/EXCEPT across sources is not supported".to_string(),
            })
        }
        _ => {
            return Err(FedSqlError::PlanFailed {
                reason: "unsupported query body".to_string(),
            })
        }
    };

    let from_bindings = resolve_from_bindings(&select)?;

    let mut projected_columns: HashMap<String, HashSet<String>> = HashMap::new();
    for binding in &from_bindings {
        projected_columns.entry(binding.qualifier.clone()).or_default();
    }

    collect_projection_columns(&select.projection, &mut projected_columns);
    for twj in &select.from {
        collect_join_condition_columns(twj, &mut projected_columns);
    }
    if let Some(order_by) = &query.order_by {
        for item in &order_by.exprs {
            collect_expr_columns(&item.expr, &mut projected_columns);
        }
    }
    match &select.group_by {
        GroupByExpr::Expressions(exprs, _) => {
            for e in exprs {
                collect_expr_columns(e, &mut projected_columns);
            }
        }
        GroupByExpr::All(_) => {}
    }

    let mut predicates = Vec::new();
    if let Some(selection) = &select.selection {
        let mut atoms = Vec::new();
        flatten_where(selection, false, &mut atoms, &mut projected_columns);
        for atom in atoms {
            let binding = from_bindings
                .iter()
                .find(|b| b.qualifier == atom.qualifier)
                .ok_or_else(|| FedSqlError::PlanFailed {
                    reason: format!(
                        "predicate qualifier '{}' does not resolve to any FROM binding",
                        atom.qualifier
                    ),
                })?;

            let pushable = !atom.forced_residual
                && matches!(atom.op, Operator::Eq | Operator::In)
                && registry
                    .table(&binding.source, &binding.table)
                    .is_some_and(|t| {
                        t.is_pushable(&atom.column, atom.op)
                            && t.column_type(&atom.column).is_some_and(|ty| ty.matches(&atom.literal))
                    });

            predicates.push(ClassifiedPredicate {
                predicate: Predicate::new(atom.qualifier, atom.column, atom.op, atom.literal),
                pushable,
            });
        }
    }

    Ok(AnalyzedQuery {
        from_bindings,
        predicates,
        projected_columns,
        raw_sql: sql.to_string(),
    })
}

fn resolve_from_bindings(select: &Select) -> Result<Vec<FromBinding>> {
    let mut bindings = Vec::new();
    for twj in &select.from {
        bindings.push(table_factor_binding(&twj.relation, true)?);
        for join in &twj.joins {
            let required = !matches!(
                join.join_operator,
                JoinOperator::LeftOuter(_) | JoinOperator::FullOuter(_)
            );
            bindings.push(table_factor_binding(&join.relation, required)?);
        }
    }
    if bindings.is_empty() {
        return Err(FedSqlError::PlanFailed { reason: "query has no FROM clause".to_string() });
    }
    Ok(bindings)
}

fn table_factor_binding(factor: &TableFactor, required: bool) -> Result<FromBinding> {
    match factor {
        TableFactor::Table { name, alias, .. } => {
            let (source, table) = split_qualified_name(name)?;
            let qualifier = alias.as_ref().map(|a| a.name.value.clone()).unwrap_or_else(|| table.clone());
            Ok(FromBinding { qualifier, source, table, required })
        }
        _ => Err(FedSqlError::PlanFailed {
            reason: "FROM clause must name a source.table, not a subquery or function".to_string(),
        }),
    }
}

fn split_qualified_name(name: &ObjectName) -> Result<(String, String)> {
    match name.0.as_slice() {
        [source, table] => Ok((source.value.clone(), table.value.clone())),
        _ => Err(FedSqlError::PlanFailed {
            reason: format!("table '{name}' must be qualified as source.table"),
        }),
    }
}

fn collect_projection_columns(items: &[SelectItem], out: &mut HashMap<String, HashSet<String>>) {
    for item in items {
        match item {
            SelectItem::UnnamedExpr(e) | SelectItem::ExprWithAlias { expr: e, .. } => {
                collect_expr_columns(e, out);
            }
            SelectItem::Wildcard(_) | SelectItem::QualifiedWildcard(..) => {
                // Wildcard needs every column; leave the qualifier's set
                // empty so the planner treats it as "no pruning possible"
                // for that binding.
            }
        }
    }
}

fn collect_join_condition_columns(twj: &TableWithJoins, out: &mut HashMap<String, HashSet<String>>) {
    for join in &twj.joins {
        if let Some(expr) = join_constraint_expr(&join.join_operator) {
            collect_expr_columns(expr, out);
        }
        let _ = join; // silence unused warning when no constraint
    }
}

fn join_constraint_expr(op: &JoinOperator) -> Option<&Expr> {
    use sqlparser::ast::JoinConstraint;
    let constraint = match op {
        JoinOperator::Inner(c)
        | JoinOperator::LeftOuter(c)
        | JoinOperator::RightOuter(c)
        | JoinOperator::FullOuter(c) => c,
        _ => return None,
    };
    match constraint {
        JoinConstraint::On(e) => Some(e),
        _ => None,
    }
}

fn collect_expr_columns(expr: &Expr, out: &mut HashMap<String, HashSet<String>>) {
    match expr {
        Expr::CompoundIdentifier(parts) if parts.len() == 2 => {
            out.entry(parts[0].value.clone()).or_default().insert(parts[1].value.clone());
        }
        Expr::BinaryOp { left, right, .. } => {
            collect_expr_columns(left, out);
            collect_expr_columns(right, out);
        }
        Expr::UnaryOp { expr, .. } | Expr::Nested(expr) | Expr::Cast { expr, .. } => {
            collect_expr_columns(expr, out);
        }
        Expr::InList { expr, list, .. } => {
            collect_expr_columns(expr, out);
            for e in list {
                collect_expr_columns(e, out);
            }
        }
        Expr::Function(f) => {
            if let sqlparser::ast::FunctionArguments::List(list) = &f.args {
                for arg in &list.args {
                    if let sqlparser::ast::FunctionArg::Unnamed(
                        sqlparser::ast::FunctionArgExpr::Expr(e),
                    ) = arg
                    {
                        collect_expr_columns(e, out);
                    }
                }
            }
        }
        Expr::Like { expr, pattern, .. } | Expr::ILike { expr, pattern, .. } => {
            collect_expr_columns(expr, out);
            collect_expr_columns(pattern, out);
        }
        _ => {}
    }
}

struct RawAtom {
    qualifier: String,
    column: String,
    op: Operator,
    literal: serde_json::Value,
    forced_residual: bool,
}

/// Flatten the top-level `AND` tree into atoms, accumulating every
/// referenced column into `out` along the way. Anything under an `OR` is
/// still extracted (so projection pruning sees its columns) but marked
/// `forced_residual`. Shapes that are not a simple `qualifier.column OP
/// literal` comparison or non-negated `IN` (`LIKE`, `IS NULL`, `BETWEEN`,
/// negated `IN`, ...) never become a `RawAtom` — they are residual by
/// construction, since they are never added to `pushed_filters` — but still
/// descend through `collect_expr_columns` so their columns are requested
/// from the connector for the analytical runtime's re-execution (§4.8).
fn flatten_where(expr: &Expr, forced_residual: bool, atoms: &mut Vec<RawAtom>, out: &mut HashMap<String, HashSet<String>>) {
    match expr {
        Expr::BinaryOp { left, op: BinaryOperator::And, right } => {
            flatten_where(left, forced_residual, atoms, out);
            flatten_where(right, forced_residual, atoms, out);
        }
        Expr::BinaryOp { left, op: BinaryOperator::Or, right } => {
            flatten_where(left, true, atoms, out);
            flatten_where(right, true, atoms, out);
        }
        Expr::Nested(inner) => flatten_where(inner, forced_residual, atoms, out),
        Expr::BinaryOp { left, op, right } => {
            collect_expr_columns(expr, out);
            if let Some(atom) = try_atom(left, op_to_operator(op), right, forced_residual) {
                atoms.push(atom);
            }
        }
        Expr::InList { expr: target, list, negated: false } => {
            collect_expr_columns(expr, out);
            if let Expr::CompoundIdentifier(parts) = target.as_ref() {
                if parts.len() == 2 {
                    let literal = serde_json::Value::Array(list.iter().filter_map(expr_to_json).collect());
                    atoms.push(RawAtom {
                        qualifier: parts[0].value.clone(),
                        column: parts[1].value.clone(),
                        op: Operator::In,
                        literal,
                        forced_residual,
                    });
                }
            }
        }
        other => collect_expr_columns(other, out),
    }
}

fn op_to_operator(op: &BinaryOperator) -> Option<Operator> {
    match op {
        BinaryOperator::Eq => Some(Operator::Eq),
        BinaryOperator::NotEq => Some(Operator::Ne),
        BinaryOperator::Gt => Some(Operator::Gt),
        BinaryOperator::Lt => Some(Operator::Lt),
        BinaryOperator::GtEq => Some(Operator::Ge),
        BinaryOperator::LtEq => Some(Operator::Le),
        _ => None,
    }
}

fn try_atom(left: &Expr, op: Option<Operator>, right: &Expr, forced_residual: bool) -> Option<RawAtom> {
    let op = op?;
    let (qualifier, column, literal_expr) = match (left, right) {
        (Expr::CompoundIdentifier(parts), lit) if parts.len() == 2 => {
            (parts[0].value.clone(), parts[1].value.clone(), lit)
        }
        (lit, Expr::CompoundIdentifier(parts)) if parts.len() == 2 => {
            (parts[0].value.clone(), parts[1].value.clone(), lit)
        }
        _ => return None,
    };
    let literal = expr_to_json(literal_expr)?;
    Some(RawAtom { qualifier, column, op, literal, forced_residual })
}

fn expr_to_json(expr: &Expr) -> Option<serde_json::Value> {
    match expr {
        Expr::Value(Value::SingleQuotedString(s)) | Expr::Value(Value::DoubleQuotedString(s)) => {
            Some(serde_json::Value::String(s.clone()))
        }
        Expr::Value(Value::Number(n, _)) => {
            if let Ok(i) = n.parse::<i64>() {
                Some(serde_json::Value::from(i))
            } else {
                n.parse::<f64>().ok().and_then(serde_json::Number::from_f64).map(serde_json::Value::Number)
            }
        }
        Expr::Value(Value::Boolean(b)) => Some(serde_json::Value::Bool(*b)),
        Expr::Value(Value::Null) => Some(serde_json::Value::Null),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ColumnDescriptor, SourceDescriptor};

    fn registry() -> StaticSourceRegistry {
        StaticSourceRegistry::new(vec![
            SourceDescriptor {
                name: "github".into(),
                tables: vec![TableDescriptor {
                    name: "pull_requests".into(),
                    columns: vec![
                        ColumnDescriptor { name: "id".into(), semantic_type: SemanticType::Text },
                        ColumnDescriptor { name: "status".into(), semantic_type: SemanticType::Text },
                        ColumnDescriptor { name: "branch".into(), semantic_type: SemanticType::Text },
                    ],
                    pushable_filters: ["status".to_string()].into_iter().collect(),
                    pushable_operators: HashSet::new(),
                    supports_conditional_fetch: false,
                    rate_capacity: 10.0,
                    rate_refill_per_second: 1.0,
                    hard_staleness_cap_ms: 3_600_000,
                }],
            },
            SourceDescriptor {
                name: "jira".into(),
                tables: vec![TableDescriptor {
                    name: "issues".into(),
                    columns: vec![
                        ColumnDescriptor { name: "id".into(), semantic_type: SemanticType::Text },
                        ColumnDescriptor { name: "branch_name".into(), semantic_type: SemanticType::Text },
                    ],
                    pushable_filters: HashSet::new(),
                    pushable_operators: HashSet::new(),
                    supports_conditional_fetch: false,
                    rate_capacity: 10.0,
                    rate_refill_per_second: 1.0,
                    hard_staleness_cap_ms: 3_600_000,
                }],
            },
        ])
    }

    #[test]
    fn pushdown_routing_does_not_misroute() {
        let sql = "SELECT gh.id FROM github.pull_requests gh JOIN jira.issues ji ON gh.branch = ji.branch_name WHERE gh.status = 'merged'";
        let analyzed = analyze(sql, &registry()).unwrap();
        assert_eq!(analyzed.from_bindings.len(), 2);
        let gh_pred = analyzed.predicates.iter().find(|p| p.predicate.qualifier == "gh").unwrap();
        assert!(gh_pred.pushable);
        assert!(!analyzed.predicates.iter().any(|p| p.predicate.qualifier == "ji"));
    }

    #[test]
    fn unresolved_qualifier_is_plan_failed() {
        let sql = "SELECT gh.id FROM github.pull_requests gh WHERE nope.status = 'merged'";
        let err = analyze(sql, &registry()).unwrap_err();
        assert_eq!(err.code(), "PLAN_FAILED");
    }

    #[test]
    fn function_call_predicate_is_never_pushable() {
        let sql = "SELECT * FROM github.pull_requests WHERE LOWER(title) LIKE '%fix%'";
        let analyzed = analyze(sql, &registry()).unwrap();
        assert!(analyzed.predicates.is_empty());
    }

    #[test]
    fn like_predicate_is_residual_but_its_column_is_still_requested() {
        let sql = "SELECT gh.id FROM github.pull_requests gh WHERE gh.status LIKE '%open%'";
        let analyzed = analyze(sql, &registry()).unwrap();
        assert!(analyzed.predicates.is_empty(), "LIKE never becomes a pushable atom");
        assert!(
            analyzed.projected_columns.get("gh").unwrap().contains("status"),
            "the analytical runtime needs 'status' fetched to re-evaluate the LIKE residually"
        );
    }

    #[test]
    fn is_null_predicate_column_is_still_requested() {
        let sql = "SELECT gh.id FROM github.pull_requests gh WHERE gh.branch IS NULL";
        let analyzed = analyze(sql, &registry()).unwrap();
        assert!(analyzed.predicates.is_empty());
        assert!(analyzed.projected_columns.get("gh").unwrap().contains("branch"));
    }

    #[test]
    fn in_predicate_is_pushable_when_every_element_matches_the_column_type() {
        let sql = "SELECT gh.id FROM github.pull_requests gh WHERE gh.status IN ('merged', 'open')";
        let analyzed = analyze(sql, &registry()).unwrap();
        let gh_pred = analyzed.predicates.iter().find(|p| p.predicate.qualifier == "gh").unwrap();
        assert!(gh_pred.pushable, "IN over a pushable text column with text elements should push down");
    }

    #[test]
    fn in_predicate_is_residual_when_an_element_mismatches_the_column_type() {
        let sql = "SELECT gh.id FROM github.pull_requests gh WHERE gh.status IN ('merged', 42)";
        let analyzed = analyze(sql, &registry()).unwrap();
        let gh_pred = analyzed.predicates.iter().find(|p| p.predicate.qualifier == "gh").unwrap();
        assert!(!gh_pred.pushable);
    }

    #[test]
    fn or_forces_residual() {
        let sql = "SELECT gh.id FROM github.pull_requests gh WHERE gh.status = 'merged' OR gh.status = 'open'";
        let analyzed = analyze(sql, &registry()).unwrap();
        assert!(analyzed.predicates.iter().all(|p| !p.pushable));
    }

    #[test]
    fn left_outer_join_right_side_is_not_required() {
        let sql = "SELECT gh.id FROM github.pull_requests gh LEFT JOIN jira.issues ji ON gh.branch = ji.branch_name";
        let analyzed = analyze(sql, &registry()).unwrap();
        let ji = analyzed.binding("ji").unwrap();
        assert!(!ji.required);
        let gh = analyzed.binding("gh").unwrap();
        assert!(gh.required);
    }

    #[test]
    fn write_dml_is_plan_failed() {
        let err = analyze("DELETE FROM github.pull_requests", &registry()).unwrap_err();
        assert_eq!(err.code(), "PLAN_FAILED");
    }

    #[test]
    fn bare_table_name_without_source_fails() {
        let err = analyze("SELECT * FROM pull_requests", &registry()).unwrap_err();
        assert_eq!(err.code(), "PLAN_FAILED");
    }
}
