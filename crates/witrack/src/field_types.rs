//! Conversion of raw filter values into their stored representation.
//!
//! Field typing lives outside the filter compiler. The compiler only asks a
//! [`FieldConverter`] to turn the string a caller wrote into the string the
//! store holds, so that comparisons happen on like representations.

use crate::errors::{QueryError, QueryResult};
use uuid::Uuid;

/// Storage kind of a filterable attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Opaque identifier; UUID-shaped values are normalized
    Identifier,
    /// Free text, compared verbatim
    Text,
    /// Unsigned number stored as its decimal form
    Number,
    /// Closed vocabulary, matched case-insensitively
    Enumeration(Vec<String>),
}

/// Converts a caller-supplied value to its stored representation
pub trait FieldConverter: Send + Sync {
    fn convert_for_comparison(&self, field: &str, kind: &FieldKind, raw: &str) -> QueryResult<String>;
}

/// Default conversion rules
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardConverter;

impl FieldConverter for StandardConverter {
    fn convert_for_comparison(&self, field: &str, kind: &FieldKind, raw: &str) -> QueryResult<String> {
        match kind {
            FieldKind::Identifier => Ok(match Uuid::parse_str(raw.trim()) {
                Ok(uuid) => uuid.hyphenated().to_string(),
                Err(_) => raw.to_string(),
            }),
            FieldKind::Text => Ok(raw.to_string()),
            FieldKind::Number => raw
                .trim()
                .parse::<u64>()
                .map(|n| n.to_string())
                .map_err(|_| {
                    QueryError::invalid_combination(format!(
                        "value '{}' is not a valid number for '{}'",
                        raw, field
                    ))
                }),
            FieldKind::Enumeration(values) => values
                .iter()
                .find(|v| v.eq_ignore_ascii_case(raw.trim()))
                .cloned()
                .ok_or_else(|| {
                    QueryError::invalid_combination(format!(
                        "value '{}' is not valid for '{}' (expected one of: {})",
                        raw,
                        field,
                        values.join(", ")
                    ))
                }),
        }
    }
}
