//! API route definitions

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, error, warn};

use witrack::filter::{SearchRequest, WorkItemFilter};
use witrack::output::{response_schema, ErrorDocument, LinkTarget, SearchResponse};
use witrack::storage::Store;
use witrack::QueryError;

/// Everything a request handler needs
pub struct AppContext<S> {
    pub filter: WorkItemFilter<S>,
    /// Prefix the routes are mounted under, used in paging links
    pub base_url: String,
}

/// Shared application state
pub type AppState<S> = Arc<AppContext<S>>;

/// Create API routes
pub fn create_routes<S: Store + 'static>(state: AppState<S>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/search", get(search_work_items::<S>))
        .route("/schema/search", get(search_schema))
        .with_state(state)
}

/// Mount the routes under `base_url` with CORS and request tracing
pub fn build_app<S: Store + 'static>(filter: WorkItemFilter<S>, base_url: &str) -> Router {
    let base_url = format!("/{}", base_url.trim_matches('/'));
    let state = Arc::new(AppContext {
        filter,
        base_url: base_url.clone(),
    });

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let routes = create_routes(state);
    let app = if base_url == "/" {
        routes
    } else {
        Router::new().nest(&base_url, routes)
    };
    app.layer(cors).layer(TraceLayer::new_for_http())
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "witrack-api",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

/// JSON schema of the search response
async fn search_schema() -> impl IntoResponse {
    Json(response_schema())
}

/// Search query parameters
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(rename = "filter[expression]")]
    pub expression: Option<String>,
    #[serde(rename = "spaceID")]
    pub space_id: Option<String>,
    /// Kept as text so a bad number becomes a syntax error document
    #[serde(rename = "page[offset]")]
    pub offset: Option<String>,
    #[serde(rename = "page[limit]")]
    pub limit: Option<String>,
}

impl SearchParams {
    fn to_request(&self) -> Result<SearchRequest, QueryError> {
        let expression = self
            .expression
            .clone()
            .filter(|e| !e.trim().is_empty())
            .ok_or_else(|| QueryError::syntax("filter[expression] is required"))?;

        Ok(SearchRequest {
            expression,
            space_id: self.space_id.clone().filter(|s| !s.is_empty()),
            offset: parse_page_param("page[offset]", self.offset.as_deref())?,
            limit: parse_page_param("page[limit]", self.limit.as_deref())?,
        })
    }
}

fn parse_page_param(name: &str, raw: Option<&str>) -> Result<Option<usize>, QueryError> {
    raw.map(|value| {
        value.trim().parse::<usize>().map_err(|_| {
            QueryError::syntax(format!("{} must be a non-negative integer, got '{}'", name, value))
        })
    })
    .transpose()
}

/// Search work items with a filter expression
async fn search_work_items<S: Store + 'static>(
    Query(params): Query<SearchParams>,
    State(state): State<AppState<S>>,
) -> Response {
    let start = std::time::Instant::now();

    let outcome = params.to_request().and_then(|request| {
        let result = state.filter.search(&request)?;
        let target = LinkTarget {
            base_url: &state.base_url,
            expression: &request.expression,
            space_id: request.space_id.as_deref(),
        };
        Ok(SearchResponse::new(result, &target))
    });

    match outcome {
        Ok(response) => {
            debug!(
                total = response.meta.total_count,
                elapsed_ms = start.elapsed().as_millis() as u64,
                "search served"
            );
            (StatusCode::OK, Json(response)).into_response()
        }
        Err(err) => error_response(&err),
    }
}

/// Render a failed request as its error document
fn error_response(err: &QueryError) -> Response {
    let document = ErrorDocument::from_error(err);
    if err.is_client_error() {
        warn!(error_id = %document.id(), code = err.code(), "search rejected: {}", err);
    } else {
        error!(error_id = %document.id(), "search failed: {:?}", err);
    }

    let status = StatusCode::from_u16(err.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(document)).into_response()
}
