//! # fedsql-executor
//!
//! Async orchestration on top of `fedsql-core`'s pure pipeline stages:
//! bounded parallel fan-out across fetch nodes, an ephemeral in-process
//! analytical engine, and the query orchestrator that wires the two
//! together and shapes the wire response.
//!
//! `fedsql-core` never performs IO or spawns tasks; everything here does.

#![forbid(unsafe_code)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::missing_errors_doc)]

pub mod analytical;
pub mod fanout;
pub mod orchestrator;
pub mod response;

pub use fanout::ConnectorRegistry;
pub use orchestrator::Orchestrator;
pub use response::{ErrorResponse, QueryMetadata, QueryRequest, QueryResponse};
