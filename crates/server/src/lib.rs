//! Work Item Search REST API Library
//!
//! Exposes the work item filter over HTTP: a search endpoint returning the
//! result envelope or a single error document, plus health and schema
//! endpoints.

pub mod routes;

// Re-export for convenience
pub use routes::{build_app, create_routes, AppContext, AppState};
