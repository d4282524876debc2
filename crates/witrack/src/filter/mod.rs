//! Work item filter compiler
//!
//! Turns a JSON filter expression into a predicate over work items:
//! - Field comparisons: `{"state": "open"}`, `{"title": {"$SUBSTR": "crash"}}`
//! - Boolean combinators: `$AND`, `$OR`, with `"negate": true` on any node
//! - Joins by name: `iteration.name`, `label.name`
//! - Type group membership: `typegroup.name` or a bare group key
//! - Options: `{"$OPTS": {"tree_view": true}}` at the root
//!
//! # Architecture
//!
//! Compilation runs in three stages:
//! 1. **Parser**: JSON bytes to a [`FilterDocument`]
//! 2. **Resolver**: each key to a stored attribute, join or type group
//! 3. **Compiler**: the document to a single [`Predicate`]
//!
//! [`WorkItemFilter`] runs all three, executes the predicate against a
//! [`Store`] and, for tree-view requests, adds the ancestors of the page.
//!
//! # Examples
//!
//! ```
//! use witrack::filter::{parse_filter, FilterNode, Operator};
//!
//! let document = parse_filter(br#"{"state": {"$NE": "closed"}}"#).unwrap();
//! let FilterNode::Comparison(c) = &document.root else { panic!() };
//! assert_eq!(c.operator, Operator::Ne);
//! ```

mod compiler;
mod parser;
pub mod predicate;
mod resolver;
mod validate;

pub use compiler::{CompiledFilter, PredicateCompiler};
pub use parser::{
    parse_filter, Combinator, Comparison, FilterDocument, FilterNode, LogicalOp, Operator, Options,
    Value,
};
pub use predicate::Predicate;
pub use resolver::{AttributeResolver, Resolution, SpaceScope, SYSTEM_KEYS};
pub use validate::ReferenceValidator;

use crate::config::{QuerySettings, WitrackConfig};
use crate::domain::WorkItem;
use crate::errors::QueryResult;
use crate::field_types::{FieldConverter, StandardConverter};
use crate::hierarchy::{clear_parents, HierarchyResolver};
use crate::output::PageRequest;
use crate::storage::Store;
use std::sync::Arc;
use tracing::debug;

/// One search request as received from a caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchRequest {
    /// Raw filter expression (JSON)
    pub expression: String,
    /// Restrict the search to this space
    pub space_id: Option<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

impl SearchRequest {
    pub fn new(expression: impl Into<String>) -> Self {
        Self {
            expression: expression.into(),
            ..Default::default()
        }
    }

    pub fn in_space(mut self, space_id: impl Into<String>) -> Self {
        self.space_id = Some(space_id.into());
        self
    }

    pub fn with_page(mut self, offset: usize, limit: usize) -> Self {
        self.offset = Some(offset);
        self.limit = Some(limit);
        self
    }
}

/// Matched page plus tree-view ancestors
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub items: Vec<WorkItem>,
    pub included: Vec<WorkItem>,
    pub total_count: usize,
    pub page: PageRequest,
}

/// Compiles and runs work item filters against a store.
///
/// Cheap to clone; clones share the store and converter.
#[derive(Clone)]
pub struct WorkItemFilter<S> {
    store: S,
    converter: Arc<dyn FieldConverter>,
    settings: QuerySettings,
    states: Vec<String>,
}

impl<S: Store> WorkItemFilter<S> {
    pub fn new(store: S, config: &WitrackConfig) -> Self {
        Self {
            store,
            converter: Arc::new(StandardConverter),
            settings: config.query_settings(),
            states: config.states(),
        }
    }

    /// Replace the value converter
    pub fn with_converter(mut self, converter: Arc<dyn FieldConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &QuerySettings {
        &self.settings
    }

    /// Compile a parsed document, optionally confined to one space.
    ///
    /// Resolution caches live only for this call.
    pub fn compile(&self, document: &FilterDocument, space_id: Option<&str>) -> QueryResult<CompiledFilter> {
        let resolver = AttributeResolver::new(
            &self.store,
            self.converter.as_ref(),
            &self.states,
            self.settings.strict_keys,
        );
        PredicateCompiler::new(resolver).compile(document, space_id)
    }

    /// Compile a document and report references the catalog does not declare.
    ///
    /// Compile failures are errors; unknown spaces and types are warnings.
    pub fn check(&self, document: &FilterDocument, space_id: Option<&str>) -> QueryResult<Vec<String>> {
        self.compile(document, space_id)?;
        let warnings = ReferenceValidator::from_catalog(&self.store)?.validate(document, space_id);
        if !warnings.is_empty() {
            debug!(count = warnings.len(), "filter references undeclared entities");
        }
        Ok(warnings)
    }

    /// Parse, compile and execute a request.
    ///
    /// With tree-view on, `included` holds the ancestors of the page items
    /// and every returned item carries its fresh `parent`. With tree-view
    /// off, `included` is empty and no `parent` is reported.
    pub fn search(&self, request: &SearchRequest) -> QueryResult<SearchResult> {
        let document = parse_filter(request.expression.as_bytes())?;
        let compiled = self.compile(&document, request.space_id.as_deref())?;
        let page = PageRequest::new(request.offset, request.limit, &self.settings);

        let (mut items, total_count) =
            self.store
                .find_by_predicate(&compiled.predicate, page.offset, page.limit)?;

        let included = if compiled.tree_view() {
            HierarchyResolver::new(&self.store, self.settings.max_tree_depth).resolve(&mut items)?
        } else {
            clear_parents(&mut items);
            Vec::new()
        };

        debug!(
            total = total_count,
            returned = items.len(),
            included = included.len(),
            offset = page.offset,
            limit = page.limit,
            "work item search finished"
        );

        Ok(SearchResult {
            items,
            included,
            total_count,
            page,
        })
    }
}
