//! Response envelopes for search results and errors.
//!
//! Successful searches are reported as a [`SearchResponse`] with the matched
//! page, tree-view ancestors, the total count and paging links. Every failure
//! is reported as an [`ErrorDocument`] holding exactly one error object.

use crate::config::QuerySettings;
use crate::domain::WorkItem;
use crate::errors::QueryError;
use crate::filter::SearchResult;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============================================================================
// Paging
// ============================================================================

/// Effective offset and limit of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

impl PageRequest {
    /// Apply defaults and clamp the limit to `1..=max_limit`
    pub fn new(offset: Option<usize>, limit: Option<usize>, settings: &QuerySettings) -> Self {
        let max_limit = settings.max_limit.max(1);
        Self {
            offset: offset.unwrap_or(0),
            limit: limit
                .unwrap_or(settings.default_limit)
                .clamp(1, max_limit),
        }
    }

    /// Offset just past this page, saturating at `usize::MAX`
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.limit)
    }
}

// ============================================================================
// Search Response
// ============================================================================

/// Response body of a successful search
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SearchResponse {
    /// Matched work items, in result order
    pub data: Vec<WorkItem>,
    /// Ancestors of `data` items (tree-view only)
    pub included: Vec<WorkItem>,
    pub meta: Meta,
    pub links: Links,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Meta {
    /// Number of matches ignoring paging
    #[serde(rename = "totalCount")]
    pub total_count: usize,
}

/// Paging links
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Links {
    pub first: String,
    pub last: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prev: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<String>,
}

/// The request parameters repeated in every paging link
#[derive(Debug, Clone, Copy)]
pub struct LinkTarget<'a> {
    /// Prefix of the search endpoint, e.g. `/api`
    pub base_url: &'a str,
    pub expression: &'a str,
    pub space_id: Option<&'a str>,
}

impl<'a> LinkTarget<'a> {
    fn href(&self, offset: usize, limit: usize) -> String {
        let mut href = format!(
            "{}/search?filter[expression]={}",
            self.base_url.trim_end_matches('/'),
            percent_encode(self.expression)
        );
        if let Some(space_id) = self.space_id {
            href.push_str(&format!("&spaceID={}", percent_encode(space_id)));
        }
        href.push_str(&format!("&page[offset]={}&page[limit]={}", offset, limit));
        href
    }
}

impl Links {
    /// Compute paging links for a page over `total` matches
    pub fn for_page(target: &LinkTarget<'_>, page: PageRequest, total: usize) -> Self {
        let offset = page.offset;
        let limit = page.limit.max(1);
        let last = if total == 0 {
            0
        } else {
            ((total - 1) / limit) * limit
        };
        let end = PageRequest { offset, limit }.end();

        Self {
            first: target.href(0, limit),
            last: target.href(last, limit),
            // A page past the end steps back to the last page
            prev: (offset > 0).then(|| target.href(offset.saturating_sub(limit).min(last), limit)),
            next: (end < total).then(|| target.href(end, limit)),
        }
    }
}

impl SearchResponse {
    pub fn new(result: SearchResult, target: &LinkTarget<'_>) -> Self {
        Self {
            links: Links::for_page(target, result.page, result.total_count),
            meta: Meta {
                total_count: result.total_count,
            },
            data: result.items,
            included: result.included,
        }
    }

    /// Serialize to JSON string with pretty formatting
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// JSON Schema of [`SearchResponse`]
pub fn response_schema() -> serde_json::Value {
    let schema = schemars::schema_for!(SearchResponse);
    serde_json::to_value(schema).unwrap_or(serde_json::Value::Null)
}

/// Percent-encode a query parameter value (RFC 3986 unreserved set kept)
fn percent_encode(value: &str) -> String {
    let mut encoded = String::with_capacity(value.len());
    for byte in value.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                encoded.push(byte as char)
            }
            _ => encoded.push_str(&format!("%{:02X}", byte)),
        }
    }
    encoded
}

// ============================================================================
// Error Document
// ============================================================================

/// Response body of a failed request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorDocument {
    pub errors: Vec<ErrorObject>,
}

/// One reported error
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorObject {
    /// Unique per report, for correlating with server logs
    pub id: String,
    pub code: String,
    /// HTTP status as a string
    pub status: String,
    pub title: String,
    pub detail: String,
}

impl ErrorDocument {
    /// Build the single-entry document for a failed request
    pub fn from_error(error: &QueryError) -> Self {
        Self {
            errors: vec![ErrorObject {
                id: Uuid::new_v4().to_string(),
                code: error.code().to_string(),
                status: error.status().to_string(),
                title: error.title().to_string(),
                detail: error.client_detail(),
            }],
        }
    }

    /// ID of the reported error
    pub fn id(&self) -> &str {
        self.errors.first().map(|e| e.id.as_str()).unwrap_or_default()
    }

    /// Serialize to JSON string with pretty formatting
    pub fn to_json_string(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

// ============================================================================
// Exit Codes
// ============================================================================

/// Exit codes of the `witrack` binary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    /// Command succeeded (0)
    Success = 0,

    /// Query failed inside the engine or store (1)
    InternalError = 1,

    /// The filter or its arguments were rejected (2)
    InvalidFilter = 2,

    /// Dataset or config could not be read (10)
    ExternalError = 10,
}

impl ExitCode {
    /// Convert exit code to i32 for `std::process::exit`
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn for_error(error: &QueryError) -> Self {
        if error.is_client_error() {
            ExitCode::InvalidFilter
        } else {
            ExitCode::InternalError
        }
    }
}
