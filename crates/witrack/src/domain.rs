//! Core domain types for the work item tracker.
//!
//! This module defines the entities the filter compiler reads: work items,
//! spaces, work item types and type groups, iterations, labels, and the
//! links that connect work items to each other.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Forward name of the link type that forms the parent/child hierarchy.
pub const PARENT_OF: &str = "parent of";

/// A unit of tracked work
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct WorkItem {
    /// Unique identifier (UUID)
    pub id: String,
    /// Human-friendly sequence number within the space
    pub number: u64,
    /// Space this work item belongs to
    pub space_id: String,
    /// Work item type identifier
    pub type_id: String,
    /// Short summary
    pub title: String,
    /// Longer free-text description
    #[serde(default)]
    pub description: Option<String>,
    /// Workflow state (e.g., "new", "open", "resolved")
    pub state: String,
    /// Iteration the item is planned into
    #[serde(default)]
    pub iteration_id: Option<String>,
    /// Identity that created the item
    #[serde(default)]
    pub creator: Option<String>,
    /// Assigned identities. `None` means never set.
    #[serde(default)]
    pub assignees: Option<Vec<String>>,
    /// Attached label IDs. `None` means never set.
    #[serde(default)]
    pub labels: Option<Vec<String>>,
    /// Creation timestamp, the primary result ordering key
    pub created_at: DateTime<Utc>,
    /// Last modification timestamp
    pub updated_at: DateTime<Utc>,
    /// Tree parent, filled in only by tree-view queries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,
}

impl WorkItem {
    /// Create a new work item in the "new" state
    pub fn new(space_id: impl Into<String>, type_id: impl Into<String>, title: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            number: 0,
            space_id: space_id.into(),
            type_id: type_id.into(),
            title: title.into(),
            description: None,
            state: "new".to_string(),
            iteration_id: None,
            creator: None,
            assignees: None,
            labels: None,
            created_at: now,
            updated_at: now,
            parent: None,
        }
    }

    /// Builder method to set the state
    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = state.into();
        self
    }

    /// Builder method to set the label IDs
    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = Some(labels.into_iter().map(Into::into).collect());
        self
    }

    /// Builder method to set the assignees
    pub fn with_assignees<I, S>(mut self, assignees: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assignees = Some(assignees.into_iter().map(Into::into).collect());
        self
    }

    /// Builder method to set the iteration
    pub fn with_iteration(mut self, iteration_id: impl Into<String>) -> Self {
        self.iteration_id = Some(iteration_id.into());
        self
    }

    /// Builder method to set the creator
    pub fn with_creator(mut self, creator: impl Into<String>) -> Self {
        self.creator = Some(creator.into());
        self
    }

    /// Builder method to set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Partial update of a work item.
///
/// Only fields set to `Some` are written. Leaving `assignees` or `labels` as
/// `None` keeps them exactly as stored, including "never set".
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WorkItemUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub state: Option<String>,
    pub iteration_id: Option<String>,
    pub assignees: Option<Vec<String>>,
    pub labels: Option<Vec<String>>,
}

impl WorkItemUpdate {
    /// Apply this update to a work item and bump `updated_at`
    pub fn apply_to(&self, item: &mut WorkItem) {
        if let Some(title) = &self.title {
            item.title = title.clone();
        }
        if let Some(description) = &self.description {
            item.description = Some(description.clone());
        }
        if let Some(state) = &self.state {
            item.state = state.clone();
        }
        if let Some(iteration_id) = &self.iteration_id {
            item.iteration_id = Some(iteration_id.clone());
        }
        if let Some(assignees) = &self.assignees {
            item.assignees = Some(assignees.clone());
        }
        if let Some(labels) = &self.labels {
            item.labels = Some(labels.clone());
        }
        item.updated_at = Utc::now();
    }
}

/// A space groups work items, iterations, labels and type groups
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Space {
    pub id: String,
    pub name: String,
}

/// A work item type
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemType {
    pub id: String,
    pub space_id: String,
    pub name: String,
}

/// Planning bucket a type group belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeGroupBucket {
    Portfolio,
    Requirement,
    Iteration,
}

/// A named, space-scoped set of work item types used as filter shorthand
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemTypeGroup {
    pub name: String,
    pub space_id: String,
    pub bucket: TypeGroupBucket,
    /// Member types in display order
    pub type_ids: Vec<String>,
}

/// A planning iteration (sprint)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Iteration {
    pub id: String,
    pub space_id: String,
    pub name: String,
}

/// A label that can be attached to work items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Label {
    pub id: String,
    pub space_id: String,
    pub name: String,
}

/// Relationship discipline enforced by a link type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Topology {
    /// Each item has at most one parent
    Tree,
    Network,
    DirectedNetwork,
    Dependency,
}

/// A link type (e.g., "parent of" / "child of")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemLinkType {
    pub id: String,
    pub name: String,
    pub topology: Topology,
    pub forward_name: String,
    pub reverse_name: String,
}

impl WorkItemLinkType {
    /// The standard parent/child link type
    pub fn parenting(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: "Parenting".to_string(),
            topology: Topology::Tree,
            forward_name: PARENT_OF.to_string(),
            reverse_name: "child of".to_string(),
        }
    }

    /// Whether links of this type point from a parent to its child
    pub fn is_parent_child(&self) -> bool {
        self.topology == Topology::Tree && self.forward_name == PARENT_OF
    }
}

/// A directed link between two work items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItemLink {
    pub id: String,
    pub source_id: String,
    pub target_id: String,
    pub link_type_id: String,
}

impl WorkItemLink {
    /// Create a link with a fresh ID
    pub fn new(
        source_id: impl Into<String>,
        target_id: impl Into<String>,
        link_type_id: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            source_id: source_id.into(),
            target_id: target_id.into(),
            link_type_id: link_type_id.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_work_item_has_unset_collections() {
        let item = WorkItem::new("space-1", "type-1", "Fix login");
        assert_eq!(item.state, "new");
        assert!(item.assignees.is_none());
        assert!(item.labels.is_none());
        assert!(item.parent.is_none());
    }

    #[test]
    fn test_update_without_assignees_keeps_them_unset() {
        let mut item = WorkItem::new("space-1", "type-1", "Fix login");
        let update = WorkItemUpdate {
            title: Some("Fix login page".to_string()),
            ..Default::default()
        };
        update.apply_to(&mut item);

        assert_eq!(item.title, "Fix login page");
        assert!(item.assignees.is_none());
    }

    #[test]
    fn test_update_can_clear_labels_explicitly() {
        let mut item = WorkItem::new("space-1", "type-1", "Fix login").with_labels(["l1"]);
        let update = WorkItemUpdate {
            labels: Some(vec![]),
            ..Default::default()
        };
        update.apply_to(&mut item);

        assert_eq!(item.labels, Some(vec![]));
    }

    #[test]
    fn test_parenting_link_type_is_parent_child() {
        let lt = WorkItemLinkType::parenting("lt-1");
        assert!(lt.is_parent_child());

        let mut related = lt.clone();
        related.topology = Topology::Network;
        assert!(!related.is_parent_child());

        let mut reversed = lt;
        reversed.forward_name = "child of".to_string();
        assert!(!reversed.is_parent_child());
    }

    #[test]
    fn test_work_item_serialization_omits_parent_when_unset() {
        let item = WorkItem::new("space-1", "type-1", "Fix login");
        let json = serde_json::to_value(&item).unwrap();
        assert!(json.get("parent").is_none());
        assert!(json.get("assignees").unwrap().is_null());
    }
}
