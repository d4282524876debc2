//! In-memory storage implementation.
//!
//! Stores everything in maps behind a shared `RwLock`, so clones see the same
//! data and the store can be handed to concurrent request handlers. Used by
//! the test suites and by the server, which seeds it from a dataset file.

use crate::domain::{
    Iteration, Label, Space, WorkItem, WorkItemLink, WorkItemLinkType, WorkItemType,
    WorkItemTypeGroup, WorkItemUpdate,
};
use crate::filter::Predicate;
use crate::storage::{
    CatalogRepository, Dataset, IterationRepository, LabelRepository, LinkStore,
    TypeGroupRepository, WorkItemStore,
};
use anyhow::{anyhow, bail, Result};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Default)]
struct Inner {
    spaces: BTreeMap<String, Space>,
    work_item_types: BTreeMap<String, WorkItemType>,
    type_groups: Vec<WorkItemTypeGroup>,
    iterations: BTreeMap<String, Iteration>,
    labels: BTreeMap<String, Label>,
    link_types: HashMap<String, WorkItemLinkType>,
    links: Vec<WorkItemLink>,
    work_items: HashMap<String, WorkItem>,
}

/// In-memory storage backend.
///
/// # Examples
///
/// ```
/// use witrack::domain::WorkItem;
/// use witrack::storage::{InMemoryStorage, WorkItemStore};
///
/// let storage = InMemoryStorage::new();
/// let item = WorkItem::new("space-1", "bug", "Crash on start");
/// storage.save_work_item(item.clone()).unwrap();
///
/// let loaded = storage.load_work_item(&item.id).unwrap();
/// assert_eq!(loaded.title, "Crash on start");
/// ```
#[derive(Clone, Default)]
pub struct InMemoryStorage {
    inner: Arc<RwLock<Inner>>,
}

impl InMemoryStorage {
    /// Create an empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store holding everything in `dataset`.
    pub fn from_dataset(dataset: Dataset) -> Result<Self> {
        let storage = Self::new();
        {
            let mut inner = storage.write()?;
            for space in dataset.spaces {
                inner.spaces.insert(space.id.clone(), space);
            }
            for wit in dataset.work_item_types {
                inner.work_item_types.insert(wit.id.clone(), wit);
            }
            inner.type_groups = dataset.type_groups;
            for iteration in dataset.iterations {
                inner.iterations.insert(iteration.id.clone(), iteration);
            }
            for label in dataset.labels {
                inner.labels.insert(label.id.clone(), label);
            }
            for link_type in dataset.link_types {
                inner.link_types.insert(link_type.id.clone(), link_type);
            }
            inner.links = dataset.links;
            for item in dataset.work_items {
                inner.work_items.insert(item.id.clone(), item);
            }
        }
        Ok(storage)
    }

    /// Load a store from a JSON dataset file.
    pub fn load(path: &Path) -> Result<Self> {
        Self::from_dataset(Dataset::load(path)?)
    }

    /// Export the current contents.
    pub fn to_dataset(&self) -> Result<Dataset> {
        let inner = self.read()?;
        let mut work_items: Vec<WorkItem> = inner.work_items.values().cloned().collect();
        sort_by_creation(&mut work_items);

        let mut link_types: Vec<WorkItemLinkType> = inner.link_types.values().cloned().collect();
        link_types.sort_by(|a, b| a.id.cmp(&b.id));

        Ok(Dataset {
            spaces: inner.spaces.values().cloned().collect(),
            work_item_types: inner.work_item_types.values().cloned().collect(),
            type_groups: inner.type_groups.clone(),
            iterations: inner.iterations.values().cloned().collect(),
            labels: inner.labels.values().cloned().collect(),
            link_types,
            links: inner.links.clone(),
            work_items,
        })
    }

    pub fn save_space(&self, space: Space) -> Result<()> {
        self.write()?.spaces.insert(space.id.clone(), space);
        Ok(())
    }

    pub fn save_work_item_type(&self, work_item_type: WorkItemType) -> Result<()> {
        self.write()?
            .work_item_types
            .insert(work_item_type.id.clone(), work_item_type);
        Ok(())
    }

    /// Save a type group, replacing any group with the same space and name.
    pub fn save_type_group(&self, group: WorkItemTypeGroup) -> Result<()> {
        let mut inner = self.write()?;
        inner
            .type_groups
            .retain(|g| !(g.space_id == group.space_id && g.name == group.name));
        inner.type_groups.push(group);
        Ok(())
    }

    pub fn save_iteration(&self, iteration: Iteration) -> Result<()> {
        self.write()?
            .iterations
            .insert(iteration.id.clone(), iteration);
        Ok(())
    }

    pub fn save_label(&self, label: Label) -> Result<()> {
        self.write()?.labels.insert(label.id.clone(), label);
        Ok(())
    }

    pub fn save_link_type(&self, link_type: WorkItemLinkType) -> Result<()> {
        self.write()?
            .link_types
            .insert(link_type.id.clone(), link_type);
        Ok(())
    }

    /// Save a link. Both ends and the link type must already exist.
    pub fn save_link(&self, link: WorkItemLink) -> Result<()> {
        let mut inner = self.write()?;
        for end in [&link.source_id, &link.target_id] {
            if !inner.work_items.contains_key(end) {
                bail!("Work item not found: {}", end);
            }
        }
        if !inner.link_types.contains_key(&link.link_type_id) {
            bail!("Link type not found: {}", link.link_type_id);
        }
        inner.links.push(link);
        Ok(())
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| anyhow!("In-memory storage lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Inner>> {
        self.inner
            .write()
            .map_err(|_| anyhow!("In-memory storage lock poisoned"))
    }
}

fn sort_by_creation(items: &mut [WorkItem]) {
    items.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}

impl WorkItemStore for InMemoryStorage {
    fn find_by_predicate(
        &self,
        predicate: &Predicate,
        offset: usize,
        limit: usize,
    ) -> Result<(Vec<WorkItem>, usize)> {
        let inner = self.read()?;
        let mut matches: Vec<&WorkItem> = inner
            .work_items
            .values()
            .filter(|item| predicate.matches(item))
            .collect();
        matches.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));

        let total = matches.len();
        let page = matches
            .into_iter()
            .skip(offset)
            .take(limit)
            .cloned()
            .collect();
        Ok((page, total))
    }

    fn load_work_item(&self, id: &str) -> Result<WorkItem> {
        self.read()?
            .work_items
            .get(id)
            .cloned()
            .ok_or_else(|| anyhow!("Work item not found: {}", id))
    }

    fn save_work_item(&self, mut item: WorkItem) -> Result<()> {
        let mut inner = self.write()?;
        if item.number == 0 {
            item.number = inner
                .work_items
                .values()
                .filter(|other| other.space_id == item.space_id && other.id != item.id)
                .map(|other| other.number)
                .max()
                .unwrap_or(0)
                + 1;
        }
        inner.work_items.insert(item.id.clone(), item);
        Ok(())
    }

    fn update_work_item(&self, id: &str, update: &WorkItemUpdate) -> Result<WorkItem> {
        let mut inner = self.write()?;
        let item = inner
            .work_items
            .get_mut(id)
            .ok_or_else(|| anyhow!("Work item not found: {}", id))?;
        update.apply_to(item);
        Ok(item.clone())
    }
}

impl LinkStore for InMemoryStorage {
    fn parent_of(&self, work_item_id: &str) -> Result<Option<String>> {
        let inner = self.read()?;
        let mut parents = BTreeSet::new();
        for link in inner.links.iter().filter(|l| l.target_id == work_item_id) {
            let link_type = inner.link_types.get(&link.link_type_id).ok_or_else(|| {
                anyhow!(
                    "Link {} references unknown link type {}",
                    link.id,
                    link.link_type_id
                )
            })?;
            if link_type.is_parent_child() {
                parents.insert(link.source_id.clone());
            }
        }

        if parents.len() > 1 {
            bail!(
                "Work item {} has {} tree parents: {}",
                work_item_id,
                parents.len(),
                parents.into_iter().collect::<Vec<_>>().join(", ")
            );
        }
        Ok(parents.into_iter().next())
    }
}

impl TypeGroupRepository for InMemoryStorage {
    fn group_by_name(&self, space_id: &str, name: &str) -> Result<Option<WorkItemTypeGroup>> {
        Ok(self
            .read()?
            .type_groups
            .iter()
            .find(|g| g.space_id == space_id && g.name == name)
            .cloned())
    }

    fn groups_named(&self, name: &str) -> Result<Vec<WorkItemTypeGroup>> {
        Ok(self
            .read()?
            .type_groups
            .iter()
            .filter(|g| g.name == name)
            .cloned()
            .collect())
    }
}

impl IterationRepository for InMemoryStorage {
    fn list_iterations(&self) -> Result<Vec<Iteration>> {
        Ok(self.read()?.iterations.values().cloned().collect())
    }
}

impl LabelRepository for InMemoryStorage {
    fn list_labels(&self) -> Result<Vec<Label>> {
        Ok(self.read()?.labels.values().cloned().collect())
    }
}

impl CatalogRepository for InMemoryStorage {
    fn list_spaces(&self) -> Result<Vec<Space>> {
        Ok(self.read()?.spaces.values().cloned().collect())
    }

    fn list_work_item_types(&self) -> Result<Vec<WorkItemType>> {
        Ok(self.read()?.work_item_types.values().cloned().collect())
    }
}
