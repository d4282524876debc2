//! Work Item Filter Library
//!
//! Compiles JSON filter expressions into predicates over work items, runs
//! them against a store and optionally adds the ancestors of every match.
//! Used by the `witrack` CLI and the `witrack-server` REST surface.

pub mod cli;
pub mod config;
pub mod domain;
pub mod errors;
pub mod field_types;
pub mod filter;
pub mod hierarchy;
pub mod output;
pub mod storage;

// Re-export commonly used types
pub use config::WitrackConfig;
pub use domain::WorkItem;
pub use errors::{QueryError, QueryResult};
pub use filter::{SearchRequest, SearchResult, WorkItemFilter};
pub use output::{ErrorDocument, ExitCode, SearchResponse};
pub use storage::{InMemoryStorage, Store};
