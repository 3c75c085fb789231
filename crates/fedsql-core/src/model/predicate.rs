//! Predicate atoms and the small sum types that replace stringly-typed
//! operator dispatch (§9: "use sum types for predicate operators").

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// Comparison operators a WHERE atom may use (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    /// `=`
    Eq,
    /// `!=`
    Ne,
    /// `>`
    Gt,
    /// `<`
    Lt,
    /// `>=`
    Ge,
    /// `<=`
    Le,
    /// `IN (...)`
    In,
}

impl Operator {
    /// Parse a SQL comparison token. `IN` is handled separately by the caller.
    #[must_use]
    pub fn from_sql(token: &str) -> Option<Self> {
        match token {
            "=" => Some(Self::Eq),
            "!=" | "<>" => Some(Self::Ne),
            ">" => Some(Self::Gt),
            "<" => Some(Self::Lt),
            ">=" => Some(Self::Ge),
            "<=" => Some(Self::Le),
            _ => None,
        }
    }
}

/// Coarse semantic type used to validate that a literal matches a column
/// (§4.1c). Deliberately small: the pipeline does not need a full type
/// system, only enough to reject obviously-wrong pushdowns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SemanticType {
    /// Strings, identifiers, enum-like values.
    Text,
    /// Whole numbers.
    Integer,
    /// Floating point numbers.
    Float,
    /// `true`/`false`.
    Boolean,
    /// RFC 3339 timestamps.
    Timestamp,
}

impl SemanticType {
    /// Whether a JSON literal's runtime shape is compatible with this type.
    /// An `IN (...)` literal arrives as a JSON array (§4.1); it matches iff
    /// every element does.
    #[must_use]
    pub fn matches(self, value: &JsonValue) -> bool {
        if let Some(items) = value.as_array() {
            return items.iter().all(|item| self.matches(item));
        }
        match self {
            Self::Text | Self::Timestamp => value.is_string(),
            Self::Integer => value.is_i64() || value.is_u64(),
            Self::Float => value.is_number(),
            Self::Boolean => value.is_boolean(),
        }
    }
}

/// A single WHERE atom: `qualifier.column OP literal`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Predicate {
    /// FROM-clause alias (or bare table name) this predicate names.
    pub qualifier: String,
    /// Column name.
    pub column: String,
    /// Comparison operator.
    pub op: Operator,
    /// Literal operand. For `IN`, a JSON array.
    pub literal: JsonValue,
}

impl Predicate {
    /// Construct a new predicate atom.
    #[must_use]
    pub fn new(qualifier: impl Into<String>, column: impl Into<String>, op: Operator, literal: JsonValue) -> Self {
        Self { qualifier: qualifier.into(), column: column.into(), op, literal }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operator_parsing() {
        assert_eq!(Operator::from_sql("="), Some(Operator::Eq));
        assert_eq!(Operator::from_sql("<>"), Some(Operator::Ne));
        assert_eq!(Operator::from_sql("LIKE"), None);
    }

    #[test]
    fn semantic_type_matching() {
        assert!(SemanticType::Text.matches(&JsonValue::String("merged".into())));
        assert!(!SemanticType::Integer.matches(&JsonValue::String("merged".into())));
        assert!(SemanticType::Integer.matches(&JsonValue::from(42)));
        assert!(SemanticType::Boolean.matches(&JsonValue::Bool(true)));
    }

    #[test]
    fn in_list_array_matches_when_every_element_matches() {
        let list = JsonValue::Array(vec![JsonValue::String("merged".into()), JsonValue::String("open".into())]);
        assert!(SemanticType::Text.matches(&list));
        assert!(!SemanticType::Integer.matches(&list));
    }

    #[test]
    fn in_list_array_rejects_when_any_element_mismatches() {
        let list = JsonValue::Array(vec![JsonValue::String("merged".into()), JsonValue::from(42)]);
        assert!(!SemanticType::Text.matches(&list));
    }
}
