//! Typed query failures and actionable error formatting.
//!
//! Every failed request ends in exactly one [`QueryError`]. Parsing yields
//! `Syntax`, key resolution yields `UnknownKey` or `InvalidCombination`, and
//! execution yields `Internal`. Client errors carry their message through to
//! the caller; internal errors are logged in full and reported opaquely.

use crate::filter::SYSTEM_KEYS;
use std::fmt;
use thiserror::Error;

/// Result alias for filter operations
pub type QueryResult<T> = std::result::Result<T, QueryError>;

/// The single error a failed filter request produces
#[derive(Debug, Error)]
pub enum QueryError {
    /// Malformed JSON or a document outside the filter grammar
    #[error("Invalid filter expression: {0}")]
    Syntax(String),

    /// A comparison key that is neither a system attribute nor a type group
    #[error("Unknown filter key '{key}'")]
    UnknownKey { key: String },

    /// A structurally valid but meaningless comparison (e.g. negated null)
    #[error("Invalid filter combination: {0}")]
    InvalidCombination(String),

    /// Storage failure, topology corruption or any unexpected failure
    #[error("Internal error: {0:#}")]
    Internal(#[from] anyhow::Error),
}

impl QueryError {
    pub fn syntax(message: impl Into<String>) -> Self {
        QueryError::Syntax(message.into())
    }

    pub fn unknown_key(key: impl Into<String>) -> Self {
        QueryError::UnknownKey { key: key.into() }
    }

    pub fn invalid_combination(message: impl Into<String>) -> Self {
        QueryError::InvalidCombination(message.into())
    }

    /// Stable machine-readable code
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::Syntax(_) => ErrorCode::SYNTAX_ERROR,
            QueryError::UnknownKey { .. } => ErrorCode::UNKNOWN_KEY,
            QueryError::InvalidCombination(_) => ErrorCode::INVALID_COMBINATION,
            QueryError::Internal(_) => ErrorCode::INTERNAL_ERROR,
        }
    }

    /// HTTP status the error maps to
    pub fn status(&self) -> u16 {
        if self.is_client_error() {
            400
        } else {
            500
        }
    }

    /// Short human-readable category
    pub fn title(&self) -> &'static str {
        match self {
            QueryError::Syntax(_) => "Bad filter syntax",
            QueryError::UnknownKey { .. } => "Unknown filter key",
            QueryError::InvalidCombination(_) => "Invalid filter combination",
            QueryError::Internal(_) => "Internal server error",
        }
    }

    /// True for errors caused by the request itself
    pub fn is_client_error(&self) -> bool {
        !matches!(self, QueryError::Internal(_))
    }

    /// Detail safe to show to the caller. Internal causes are not leaked.
    pub fn client_detail(&self) -> String {
        match self {
            QueryError::Internal(_) => "An internal error occurred while running the query".to_string(),
            other => other.to_string(),
        }
    }

    /// Diagnostic hints and remedies for terminal output
    pub fn to_actionable(&self) -> ActionableError {
        let error = ActionableError::new(self.to_string());
        match self {
            QueryError::Syntax(_) => error
                .with_cause("The filter is not a JSON object or is not terminated")
                .with_cause("An operator or option is misspelled")
                .with_remedy(r#"Use the form {"$AND": [{"space": "<id>"}, {"state": {"$IN": ["open"]}}]}"#),
            QueryError::UnknownKey { key } => error
                .with_cause(format!("'{}' is not a filterable attribute", key))
                .with_cause("No type group with that name exists in the filtered space")
                .with_remedy(format!("Use one of: {}", SYSTEM_KEYS.join(", ")))
                .with_remedy("Set [query] strict_keys = false to treat unknown keys as empty type groups"),
            QueryError::InvalidCombination(_) => error
                .with_cause("negate cannot be combined with a null value")
                .with_remedy(r#"Use {"key": {"$NE": null}} to match items where the value is set"#),
            QueryError::Internal(_) => error
                .with_cause("The work item store failed or holds inconsistent links")
                .with_remedy("Check the server log for the full error chain"),
        }
    }
}

/// Standard error codes for query responses
pub struct ErrorCode;

impl ErrorCode {
    pub const SYNTAX_ERROR: &'static str = "syntax_error";
    pub const UNKNOWN_KEY: &'static str = "unknown_key";
    pub const INVALID_COMBINATION: &'static str = "invalid_combination";
    pub const INTERNAL_ERROR: &'static str = "internal_error";
}

/// A rejected filter rendered for the terminal.
///
/// `witrack` prints the error document on stdout for tools and this on
/// stderr for people: the failure, what usually causes it, and how to
/// rewrite the filter.
///
/// # Example
///
/// ```
/// use witrack::QueryError;
///
/// let text = QueryError::unknown_key("stat").to_actionable().to_string();
/// assert!(text.starts_with("Error: Unknown filter key 'stat'"));
/// assert!(text.contains("To fix:"));
/// ```
#[derive(Debug, Clone)]
pub struct ActionableError {
    summary: String,
    causes: Vec<String>,
    remedies: Vec<String>,
}

impl ActionableError {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            causes: Vec::new(),
            remedies: Vec::new(),
        }
    }

    /// Something in the filter that typically leads to this failure
    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.causes.push(cause.into());
        self
    }

    /// A rewrite of the filter (or config) that avoids the failure
    pub fn with_remedy(mut self, remedy: impl Into<String>) -> Self {
        self.remedies.push(remedy.into());
        self
    }
}

fn write_section(f: &mut fmt::Formatter<'_>, heading: &str, lines: &[String]) -> fmt::Result {
    if lines.is_empty() {
        return Ok(());
    }
    writeln!(f, "\n{}:", heading)?;
    lines.iter().try_for_each(|line| writeln!(f, "  • {}", line))
}

impl fmt::Display for ActionableError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Error: {}", self.summary)?;
        write_section(f, "Possible causes", &self.causes)?;
        write_section(f, "To fix", &self.remedies)
    }
}

impl std::error::Error for ActionableError {}
