//! # fedsql-core
//!
//! Shared domain types and single-source pipeline stages for the federated
//! query engine: the SQL analyzer, fetch planner, rate governor, freshness
//! cache, connector interface, and security filter.
//!
//! `fedsql-executor` builds on these to run a full query: fan out fetch
//! nodes across sources, then answer the original SQL against the fetched
//! rowsets with an embedded analytical engine.
//!
//! ## Pipeline
//!
//! ```text
//! SQL text
//!     ↓ analyzer::analyze
//! AnalyzedQuery (FROM bindings, classified predicates)
//!     ↓ plan::plan
//! Vec<Wave> (fetch nodes grouped for concurrent execution)
//!     ↓ rate::RateGovernor::admit  (per source/tenant)
//!     ↓ cache::FreshnessCache::get_or_fetch  (per fetch node)
//!     ↓ connector::Connector::fetch  (on cache miss/stale)
//!     ↓ security::enforce  (row rules, then column rules)
//! Rowset per fetch node, ready for the analytical runtime
//! ```

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod analyzer;
pub mod cache;
pub mod config;
pub mod connector;
pub mod error;
pub mod model;
pub mod plan;
pub mod rate;
pub mod security;

pub use config::FedSqlConfig;
pub use connector::Connector;
pub use error::{FedSqlError, Result};

/// Version of the federated query pipeline core library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
