//! Security Filter (§4.6): row-level and column-level rule enforcement
//! applied to fetched rowsets before they enter the analytical runtime.
//!
//! - `rls_policy`: row rules, fail-closed boolean predicates
//! - `field_masking`: column rules — `HASH`, `REDACT`, `BLOCK`
//! - `tenant_enforcer`: `SecurityPolicy` aggregate and the `enforce` entry
//!   point that runs both stages in order

pub mod field_masking;
pub mod rls_policy;
pub mod tenant_enforcer;

pub use field_masking::{apply_column_rules, ColumnAction, ColumnRule};
pub use rls_policy::{apply_row_rules, RowRule, RuleValue};
pub use tenant_enforcer::{enforce, SecurityPolicy};
