//! Domain types shared across the pipeline.
//!
//! # Modules
//!
//! - `principal`: the caller identity a query executes under
//! - `source`: source/table descriptors (capability contract)
//! - `predicate`: WHERE-atom representation and operator/type sum types
//! - `fetch_node`: fetch nodes and wave grouping
//! - `rowset`: fetched records plus their shared schema

pub mod fetch_node;
pub mod predicate;
pub mod principal;
pub mod rowset;
pub mod source;

pub use fetch_node::{group_into_waves, FetchNode, Wave};
pub use predicate::{Operator, Predicate, SemanticType};
pub use principal::Principal;
pub use rowset::{Record, Rowset, Schema, SchemaColumn};
pub use source::{ColumnDescriptor, SourceDescriptor, TableDescriptor};
