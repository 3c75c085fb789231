//! Security Filter (§4.6): applies row rules then column rules to every
//! fetched rowset before it reaches the analytical runtime.
//!
//! Row rules always run first — a column transform never needs to see a
//! row the caller was never entitled to in the first place.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::model::{Principal, Rowset};
use crate::security::field_masking::{apply_column_rules, ColumnRule};
use crate::security::rls_policy::{apply_row_rules, RowRule};

/// The full set of row and column rules governing one tenant's queries.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityPolicy {
    /// Row-level rules, scoped by `view_name`.
    pub row_rules: Vec<RowRule>,
    /// Column-level rules, scoped by `view_name`.
    pub column_rules: Vec<ColumnRule>,
}

/// Apply a tenant's security policy to one fetch node's rowset.
///
/// `projected_columns` is the node's actual fetch projection, used to decide
/// whether a `Block` column rule has denied the query entirely rather than
/// just emptied the whole schema (§4.6).
///
/// # Errors
///
/// Propagates `FedSqlError::EntitlementDenied` from either stage.
pub fn enforce(
    policy: &SecurityPolicy,
    view_name: &str,
    principal: &Principal,
    rowset: Rowset,
    required: bool,
    projected_columns: &[String],
) -> Result<Rowset> {
    let row_filtered = apply_row_rules(&policy.row_rules, view_name, principal, rowset, required)?;
    apply_column_rules(&policy.column_rules, view_name, row_filtered, required, projected_columns)
}
