//! Storage abstraction layer for work items and the entities filters join.
//!
//! The filter compiler talks to storage only through the traits defined
//! here, one per collaborator: the work item store that executes compiled
//! predicates, the link store that answers tree-parent lookups, and the
//! repositories for type groups, iterations, labels and the space and type
//! catalog. Backends implement all of them; [`Store`] bundles them for
//! callers that need everything.

use crate::domain::{
    Iteration, Label, Space, WorkItem, WorkItemLink, WorkItemLinkType, WorkItemType,
    WorkItemTypeGroup, WorkItemUpdate,
};
use crate::filter::Predicate;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod memory;

pub use memory::InMemoryStorage;

/// Executes compiled predicates against stored work items.
pub trait WorkItemStore {
    /// Find work items matching `predicate`.
    ///
    /// Returns one page of matches, ordered by creation time with ties
    /// broken by ID, and the total number of matches ignoring paging.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read.
    fn find_by_predicate(
        &self,
        predicate: &Predicate,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<WorkItem>, usize)>;

    /// Load a work item by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the work item does not exist.
    fn load_work_item(&self, id: &str) -> Result<WorkItem>;

    /// Save a work item (create or replace).
    fn save_work_item(&self, item: WorkItem) -> Result<()>;

    /// Apply a partial update and return the stored result.
    ///
    /// # Errors
    ///
    /// Returns an error if the work item does not exist.
    fn update_work_item(&self, id: &str, update: &WorkItemUpdate) -> Result<WorkItem>;
}

/// Answers questions about the link topology.
pub trait LinkStore {
    /// The tree parent of a work item, if any.
    ///
    /// Only links whose type has tree topology and a "parent of" forward
    /// direction count.
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be read or the item has more
    /// than one tree parent.
    fn parent_of(&self, work_item_id: &str) -> Result<Option<String>>;
}

/// Looks up type groups.
pub trait TypeGroupRepository {
    /// The group with the given name in the given space.
    fn group_by_name(&self, space_id: &str, name: &str) -> Result<Option<WorkItemTypeGroup>>;

    /// Every group with the given name, across all spaces.
    fn groups_named(&self, name: &str) -> Result<Vec<WorkItemTypeGroup>>;
}

/// Lists iterations for name joins.
pub trait IterationRepository {
    fn list_iterations(&self) -> Result<Vec<Iteration>>;
}

/// Lists labels for name joins.
pub trait LabelRepository {
    fn list_labels(&self) -> Result<Vec<Label>>;
}

/// Lists the spaces and work item types a dataset declares.
pub trait CatalogRepository {
    fn list_spaces(&self) -> Result<Vec<Space>>;

    fn list_work_item_types(&self) -> Result<Vec<WorkItemType>>;
}

/// Every collaborator a filter request needs.
pub trait Store:
    WorkItemStore
    + LinkStore
    + TypeGroupRepository
    + IterationRepository
    + LabelRepository
    + CatalogRepository
    + Clone
    + Send
    + Sync
{
}

impl<T> Store for T where
    T: WorkItemStore
        + LinkStore
        + TypeGroupRepository
        + IterationRepository
        + LabelRepository
        + CatalogRepository
        + Clone
        + Send
        + Sync
{
}

/// Serialized form of a whole store, used for seeding and fixtures.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Dataset {
    pub spaces: Vec<Space>,
    pub work_item_types: Vec<WorkItemType>,
    pub type_groups: Vec<WorkItemTypeGroup>,
    pub iterations: Vec<Iteration>,
    pub labels: Vec<Label>,
    pub link_types: Vec<WorkItemLinkType>,
    pub links: Vec<WorkItemLink>,
    pub work_items: Vec<WorkItem>,
}

impl Dataset {
    /// Read a dataset from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read dataset {}", path.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse dataset {}", path.display()))
    }

    /// Write a dataset as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write dataset {}", path.display()))
    }
}
