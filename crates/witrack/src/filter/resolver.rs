//! Attribute resolution for filter keys.
//!
//! Maps the key of a comparison to the way it is looked up: a stored
//! attribute, a name join through iterations or labels, or a type group
//! expanded to its member types. Lookups that hit a repository are cached
//! for the lifetime of the resolver, which is one request.

use crate::domain::{Iteration, Label};
use crate::errors::{QueryError, QueryResult};
use crate::field_types::{FieldConverter, FieldKind};
use crate::filter::predicate::Attribute;
use crate::storage::{IterationRepository, LabelRepository, TypeGroupRepository};
use std::cell::RefCell;
use std::collections::{BTreeSet, HashMap};

/// Keys the resolver understands without consulting type groups
pub const SYSTEM_KEYS: &[&str] = &[
    "id",
    "number",
    "space",
    "state",
    "type",
    "workitemtype",
    "title",
    "description",
    "iteration",
    "creator",
    "assignee",
    "label",
    "iteration.name",
    "label.name",
    "typegroup.name",
];

/// The set of spaces joined lookups are confined to.
///
/// An empty set means no space was named, so lookups span every space.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpaceScope {
    spaces: BTreeSet<String>,
}

impl SpaceScope {
    /// A scope covering every space
    pub fn unrestricted() -> Self {
        Self::default()
    }

    pub fn of<I, S>(spaces: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            spaces: spaces.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_unrestricted(&self) -> bool {
        self.spaces.is_empty()
    }

    /// Whether an entity of the given space is visible to joins
    pub fn contains(&self, space_id: &str) -> bool {
        self.is_unrestricted() || self.spaces.contains(space_id)
    }

    pub fn spaces(&self) -> &BTreeSet<String> {
        &self.spaces
    }

    pub(crate) fn insert(&mut self, space_id: String) {
        self.spaces.insert(space_id);
    }
}

/// How a filter key is looked up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Compare a stored scalar attribute
    Direct { attribute: Attribute, kind: FieldKind },
    /// Membership in a stored collection of identifiers
    Collection { attribute: Attribute },
    /// `label`: a label ID, or a label name inside the scope
    LabelRef,
    /// `iteration.name`: iteration IDs whose name matches
    IterationName,
    /// `label.name`: label IDs whose name matches
    LabelName,
    /// `typegroup.name`: the value names the group
    TypeGroupName,
    /// A bare key naming a type group; `None` when no such group exists
    TypeGroup {
        name: String,
        type_ids: Option<BTreeSet<String>>,
    },
}

/// Resolves filter keys and join values for one request
pub struct AttributeResolver<'a, S> {
    store: &'a S,
    converter: &'a dyn FieldConverter,
    states: &'a [String],
    strict: bool,
    groups: RefCell<HashMap<String, Option<BTreeSet<String>>>>,
    iterations: RefCell<Option<Vec<Iteration>>>,
    labels: RefCell<Option<Vec<Label>>>,
}

impl<'a, S> AttributeResolver<'a, S>
where
    S: TypeGroupRepository + IterationRepository + LabelRepository,
{
    pub fn new(
        store: &'a S,
        converter: &'a dyn FieldConverter,
        states: &'a [String],
        strict: bool,
    ) -> Self {
        Self {
            store,
            converter,
            states,
            strict,
            groups: RefCell::new(HashMap::new()),
            iterations: RefCell::new(None),
            labels: RefCell::new(None),
        }
    }

    /// Resolve a key to its lookup strategy.
    ///
    /// Keys outside [`SYSTEM_KEYS`] are tried as type group names in the
    /// scope. An unknown name is an `UnknownKey` error in strict mode and an
    /// always-false group otherwise.
    pub fn resolve_key(&self, key: &str, scope: &SpaceScope) -> QueryResult<Resolution> {
        let direct = |attribute: Attribute, kind: FieldKind| -> QueryResult<Resolution> {
            Ok(Resolution::Direct { attribute, kind })
        };
        match key {
            "id" => direct(Attribute::Id, FieldKind::Identifier),
            "number" => direct(Attribute::Number, FieldKind::Number),
            "space" => direct(Attribute::Space, FieldKind::Identifier),
            "state" => direct(
                Attribute::State,
                FieldKind::Enumeration(self.states.to_vec()),
            ),
            "type" | "workitemtype" => direct(Attribute::Type, FieldKind::Identifier),
            "title" => direct(Attribute::Title, FieldKind::Text),
            "description" => direct(Attribute::Description, FieldKind::Text),
            "iteration" => direct(Attribute::Iteration, FieldKind::Identifier),
            "creator" => direct(Attribute::Creator, FieldKind::Identifier),
            "assignee" => Ok(Resolution::Collection {
                attribute: Attribute::Assignees,
            }),
            "label" => Ok(Resolution::LabelRef),
            "iteration.name" => Ok(Resolution::IterationName),
            "label.name" => Ok(Resolution::LabelName),
            "typegroup.name" => Ok(Resolution::TypeGroupName),
            other => {
                let type_ids = self.group_type_ids(other, scope)?;
                if type_ids.is_none() && self.strict {
                    return Err(QueryError::unknown_key(other));
                }
                Ok(Resolution::TypeGroup {
                    name: other.to_string(),
                    type_ids,
                })
            }
        }
    }

    /// Convert a raw value for a stored attribute
    pub fn convert(&self, field: &str, kind: &FieldKind, raw: &str) -> QueryResult<String> {
        self.converter.convert_for_comparison(field, kind, raw)
    }

    /// Member types of every group with this name in the scope.
    ///
    /// `None` when no group matches.
    pub fn group_type_ids(&self, name: &str, scope: &SpaceScope) -> QueryResult<Option<BTreeSet<String>>> {
        if let Some(cached) = self.groups.borrow().get(name) {
            return Ok(cached.clone());
        }

        let groups = if scope.is_unrestricted() {
            self.store.groups_named(name)?
        } else {
            let mut found = Vec::new();
            for space_id in scope.spaces() {
                if let Some(group) = self.store.group_by_name(space_id, name)? {
                    found.push(group);
                }
            }
            found
        };

        let type_ids = if groups.is_empty() {
            None
        } else {
            Some(groups.into_iter().flat_map(|g| g.type_ids).collect())
        };
        self.groups
            .borrow_mut()
            .insert(name.to_string(), type_ids.clone());
        Ok(type_ids)
    }

    /// IDs of iterations in the scope whose name satisfies `accept`
    pub fn iteration_ids_where(
        &self,
        scope: &SpaceScope,
        accept: impl Fn(&str) -> bool,
    ) -> QueryResult<BTreeSet<String>> {
        if self.iterations.borrow().is_none() {
            let loaded = self.store.list_iterations()?;
            *self.iterations.borrow_mut() = Some(loaded);
        }
        let iterations = self.iterations.borrow();
        Ok(iterations
            .iter()
            .flatten()
            .filter(|it| scope.contains(&it.space_id) && accept(&it.name))
            .map(|it| it.id.clone())
            .collect())
    }

    /// IDs of labels in the scope whose name satisfies `accept`
    pub fn label_ids_where(
        &self,
        scope: &SpaceScope,
        accept: impl Fn(&str) -> bool,
    ) -> QueryResult<BTreeSet<String>> {
        if self.labels.borrow().is_none() {
            let loaded = self.store.list_labels()?;
            *self.labels.borrow_mut() = Some(loaded);
        }
        let labels = self.labels.borrow();
        Ok(labels
            .iter()
            .flatten()
            .filter(|l| scope.contains(&l.space_id) && accept(&l.name))
            .map(|l| l.id.clone())
            .collect())
    }
}
