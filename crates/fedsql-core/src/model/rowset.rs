//! Rowset: the uniform shape every connector fetch and every cache entry
//! produces, and the schema descriptor that replaces ad-hoc dicts (§9).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::model::predicate::SemanticType;

/// One column's name and semantic type, shared by every record in a rowset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchemaColumn {
    /// Column name.
    pub name: String,
    /// Semantic type.
    pub semantic_type: SemanticType,
}

/// Column order and types shared by every record in a `Rowset`. The schema
/// is the single source of truth for column order — records are maps, but
/// iteration order for projection and response shaping always follows the
/// schema, never map iteration order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<SchemaColumn>,
}

impl Schema {
    /// Build a schema from an ordered column list.
    #[must_use]
    pub fn new(columns: Vec<SchemaColumn>) -> Self {
        Self { columns }
    }

    /// Column names in schema order.
    #[must_use]
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    /// All columns.
    #[must_use]
    pub fn columns(&self) -> &[SchemaColumn] {
        &self.columns
    }

    /// Whether the schema contains a column.
    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    /// Remove a column from the schema (used by CLS `BLOCK`).
    pub fn remove_column(&mut self, name: &str) {
        self.columns.retain(|c| c.name != name);
    }

    /// Keep only the named columns, in schema order (used by projection
    /// pruning, §4.2).
    #[must_use]
    pub fn project(&self, keep: &[String]) -> Self {
        Self {
            columns: self.columns.iter().filter(|c| keep.contains(&c.name)).cloned().collect(),
        }
    }
}

/// A single record: column name to value. Column order for serialization
/// always comes from the owning rowset's `Schema`, never from this map.
pub type Record = BTreeMap<String, JsonValue>;

/// An ordered list of records fetched for one fetch node (or served from
/// cache), plus the age of the data at the time it was materialized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rowset {
    /// Schema shared by every record below.
    pub schema: Schema,
    /// Records, in source-returned order (§4.7 ordering guarantee).
    pub records: Vec<Record>,
    /// Milliseconds since this data was materialized at the source adapter
    /// (0 for a live fetch) or cached (age at read time).
    pub age_ms: u64,
}

impl Rowset {
    /// An empty rowset with the given schema.
    #[must_use]
    pub fn empty(schema: Schema) -> Self {
        Self { schema, records: Vec::new(), age_ms: 0 }
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the rowset has no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schema() -> Schema {
        Schema::new(vec![
            SchemaColumn { name: "id".into(), semantic_type: SemanticType::Text },
            SchemaColumn { name: "email".into(), semantic_type: SemanticType::Text },
        ])
    }

    #[test]
    fn projection_drops_unselected_columns() {
        let s = schema();
        let projected = s.project(&["id".to_string()]);
        assert_eq!(projected.column_names(), vec!["id".to_string()]);
    }

    #[test]
    fn remove_column_mutates_in_place() {
        let mut s = schema();
        s.remove_column("email");
        assert!(!s.has_column("email"));
        assert!(s.has_column("id"));
    }

    #[test]
    fn empty_rowset_has_no_records() {
        let rs = Rowset::empty(schema());
        assert!(rs.is_empty());
        assert_eq!(rs.len(), 0);
    }
}
