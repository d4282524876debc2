//! Reference checks for filter documents against a dataset catalog.
//!
//! A filter that names an undeclared space or work item type still compiles
//! and simply matches nothing. `witrack check --data` reports such values as
//! warnings so a typo does not pass silently.

use crate::domain::WorkItemType;
use crate::errors::QueryResult;
use crate::filter::{FilterDocument, Operator, Value};
use crate::storage::CatalogRepository;
use std::collections::BTreeSet;

/// Warns about filter values that reference undeclared spaces or types.
pub struct ReferenceValidator {
    spaces: BTreeSet<String>,
    types: Vec<WorkItemType>,
}

impl ReferenceValidator {
    pub fn from_catalog<C: CatalogRepository>(catalog: &C) -> QueryResult<Self> {
        Ok(Self {
            spaces: catalog.list_spaces()?.into_iter().map(|s| s.id).collect(),
            types: catalog.list_work_item_types()?,
        })
    }

    /// Collect one warning per unknown reference.
    ///
    /// A catalog with no spaces (or no types) declared skips that check.
    /// Type values are looked up within `space_id` when one is given.
    pub fn validate(&self, document: &FilterDocument, space_id: Option<&str>) -> Vec<String> {
        let mut warnings = Vec::new();

        if let Some(space_id) = space_id {
            self.check_space(space_id, &mut warnings);
        }

        document.root.for_each_comparison(&mut |c| {
            if c.operator == Operator::Substr {
                return;
            }
            for value in referenced(&c.value) {
                match c.field.as_str() {
                    "space" => self.check_space(value, &mut warnings),
                    "type" | "workitemtype" => self.check_type(value, space_id, &mut warnings),
                    _ => {}
                }
            }
        });

        warnings
    }

    fn check_space(&self, space_id: &str, warnings: &mut Vec<String>) {
        if self.spaces.is_empty() || self.spaces.contains(space_id) {
            return;
        }
        push_once(warnings, format!("Space '{}' is not declared in the dataset", space_id));
    }

    fn check_type(&self, type_id: &str, space_id: Option<&str>, warnings: &mut Vec<String>) {
        if self.types.is_empty() {
            return;
        }
        let known = self
            .types
            .iter()
            .any(|t| t.id == type_id && space_id.map_or(true, |s| t.space_id == s));
        if known {
            return;
        }
        let message = match space_id {
            Some(space_id) => format!(
                "Work item type '{}' is not declared in space '{}'",
                type_id, space_id
            ),
            None => format!("Work item type '{}' is not declared in the dataset", type_id),
        };
        push_once(warnings, message);
    }
}

fn referenced(value: &Value) -> Vec<&str> {
    match value {
        Value::String(s) => vec![s.as_str()],
        Value::List(values) => values.iter().map(String::as_str).collect(),
        Value::Null => Vec::new(),
    }
}

fn push_once(warnings: &mut Vec<String>, message: String) {
    if !warnings.contains(&message) {
        warnings.push(message);
    }
}
