//! Per-`(source, tenant)` token-bucket admission gate (§4.4).

pub mod governor;

pub use governor::RateGovernor;
