//! Tree-view ancestor inclusion.
//!
//! For a page of matched work items, walks each item's chain of tree parents
//! and collects the ancestors that are not themselves on the page. Each
//! ancestor is emitted once, root first, in the order the page items that
//! reach it appear.

use crate::domain::WorkItem;
use crate::errors::{QueryError, QueryResult};
use crate::storage::{LinkStore, WorkItemStore};
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

/// Topology problems found while walking parent links
#[derive(Debug, Error, PartialEq)]
pub enum HierarchyError {
    /// A parent chain leads back to an item already visited
    #[error("Cycle detected in parent links at work item {id}")]
    CycleDetected { id: String },
    /// A parent chain is longer than the configured bound
    #[error("Parent chain of work item {id} exceeds {max_depth} levels")]
    DepthExceeded { id: String, max_depth: usize },
}

impl From<HierarchyError> for QueryError {
    fn from(err: HierarchyError) -> Self {
        QueryError::Internal(err.into())
    }
}

/// Collects ancestors of matched work items
pub struct HierarchyResolver<'a, S> {
    store: &'a S,
    max_depth: usize,
}

impl<'a, S> HierarchyResolver<'a, S>
where
    S: WorkItemStore + LinkStore,
{
    pub fn new(store: &'a S, max_depth: usize) -> Self {
        Self { store, max_depth }
    }

    /// Fill in `parent` on every page item and return the ancestors to include.
    ///
    /// Ancestors already on the page are not repeated, and an ancestor shared
    /// by several items appears once.
    pub fn resolve(&self, items: &mut [WorkItem]) -> QueryResult<Vec<WorkItem>> {
        let primary: HashSet<String> = items.iter().map(|item| item.id.clone()).collect();
        let mut seen = HashSet::new();
        let mut included = Vec::new();

        for item in items.iter_mut() {
            let chain = self.ancestors_of(&item.id)?;
            item.parent = chain.first().cloned();

            for (index, ancestor_id) in chain.iter().enumerate().rev() {
                if primary.contains(ancestor_id) || !seen.insert(ancestor_id.clone()) {
                    continue;
                }
                let mut ancestor = self.store.load_work_item(ancestor_id)?;
                ancestor.parent = chain.get(index + 1).cloned();
                included.push(ancestor);
            }
        }

        debug!(
            page = items.len(),
            included = included.len(),
            "resolved tree-view ancestors"
        );
        Ok(included)
    }

    /// Parent chain of a work item, nearest parent first
    pub fn ancestors_of(&self, work_item_id: &str) -> QueryResult<Vec<String>> {
        let mut visited = HashSet::from([work_item_id.to_string()]);
        let mut chain = Vec::new();
        let mut current = work_item_id.to_string();

        while let Some(parent) = self.store.parent_of(&current)? {
            if !visited.insert(parent.clone()) {
                return Err(HierarchyError::CycleDetected { id: parent }.into());
            }
            if chain.len() >= self.max_depth {
                return Err(HierarchyError::DepthExceeded {
                    id: work_item_id.to_string(),
                    max_depth: self.max_depth,
                }
                .into());
            }
            chain.push(parent.clone());
            current = parent;
        }

        Ok(chain)
    }
}

/// Drop any `parent` values carried in from storage
pub fn clear_parents(items: &mut [WorkItem]) {
    for item in items {
        item.parent = None;
    }
}
