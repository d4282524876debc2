//! Compiled predicates and their row-level evaluation.
//!
//! A [`Predicate`] is what the compiler hands to the work item store. All
//! key names, joins and type groups have already been resolved into plain
//! attribute tests, so evaluation needs nothing but the row itself.
//!
//! Evaluation uses three-valued logic: a test against an unset scalar is
//! [`Truth::Unknown`], which never matches but also does not turn into a match
//! under `NE`. Negation is the plain complement of "matched": it first
//! collapses Unknown to False, so a negated leaf selects exactly the rows the
//! un-negated leaf does not.

use crate::domain::WorkItem;
use std::borrow::Cow;
use std::collections::BTreeSet;

/// Kleene truth value
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Truth {
    True,
    False,
    Unknown,
}

impl Truth {
    pub fn is_true(self) -> bool {
        self == Truth::True
    }
}

impl From<bool> for Truth {
    fn from(value: bool) -> Self {
        if value {
            Truth::True
        } else {
            Truth::False
        }
    }
}

/// A stored work item attribute a predicate can test
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Attribute {
    Id,
    Number,
    Space,
    State,
    Type,
    Title,
    Description,
    Iteration,
    Creator,
    Assignees,
    Labels,
}

impl Attribute {
    /// Collection attributes treat "never set" and "empty" alike
    pub fn is_collection(self) -> bool {
        matches!(self, Attribute::Assignees | Attribute::Labels)
    }

    fn scalar<'a>(self, item: &'a WorkItem) -> Option<Cow<'a, str>> {
        match self {
            Attribute::Id => Some(Cow::Borrowed(item.id.as_str())),
            Attribute::Number => Some(Cow::Owned(item.number.to_string())),
            Attribute::Space => Some(Cow::Borrowed(item.space_id.as_str())),
            Attribute::State => Some(Cow::Borrowed(item.state.as_str())),
            Attribute::Type => Some(Cow::Borrowed(item.type_id.as_str())),
            Attribute::Title => Some(Cow::Borrowed(item.title.as_str())),
            Attribute::Description => item.description.as_deref().map(Cow::Borrowed),
            Attribute::Iteration => item.iteration_id.as_deref().map(Cow::Borrowed),
            Attribute::Creator => item.creator.as_deref().map(Cow::Borrowed),
            Attribute::Assignees | Attribute::Labels => None,
        }
    }

    fn collection(self, item: &WorkItem) -> &[String] {
        let values = match self {
            Attribute::Assignees => item.assignees.as_deref(),
            Attribute::Labels => item.labels.as_deref(),
            _ => None,
        };
        values.unwrap_or(&[])
    }
}

/// Value test applied to an attribute
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Test {
    Eq(String),
    Ne(String),
    In(BTreeSet<String>),
    NotIn(BTreeSet<String>),
    Substr(String),
    IsNull,
    IsNotNull,
}

/// One attribute test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    pub attribute: Attribute,
    pub test: Test,
}

impl Condition {
    pub fn new(attribute: Attribute, test: Test) -> Self {
        Self { attribute, test }
    }

    /// Evaluate this condition against one row
    pub fn evaluate(&self, item: &WorkItem) -> Truth {
        if self.attribute.is_collection() {
            return self.evaluate_collection(self.attribute.collection(item));
        }

        let Some(value) = self.attribute.scalar(item) else {
            return match self.test {
                Test::IsNull => Truth::True,
                Test::IsNotNull => Truth::False,
                _ => Truth::Unknown,
            };
        };

        let value = value.as_ref();
        Truth::from(match &self.test {
            Test::Eq(expected) => value == expected,
            Test::Ne(expected) => value != expected,
            Test::In(set) => set.contains(value),
            Test::NotIn(set) => !set.contains(value),
            Test::Substr(needle) => value.contains(needle.as_str()),
            Test::IsNull => false,
            Test::IsNotNull => true,
        })
    }

    fn evaluate_collection(&self, values: &[String]) -> Truth {
        Truth::from(match &self.test {
            Test::Eq(expected) => values.iter().any(|v| v == expected),
            Test::Ne(expected) => !values.iter().any(|v| v == expected),
            Test::In(set) => values.iter().any(|v| set.contains(v)),
            Test::NotIn(set) => !values.iter().any(|v| set.contains(v)),
            Test::Substr(needle) => values.iter().any(|v| v.contains(needle.as_str())),
            Test::IsNull => values.is_empty(),
            Test::IsNotNull => !values.is_empty(),
        })
    }
}

/// Executable filter predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    /// Constant result, e.g. an unknown type group
    Const(bool),
    Leaf(Condition),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
    Not(Box<Predicate>),
}

impl Predicate {
    /// Evaluate with three-valued logic
    pub fn evaluate(&self, item: &WorkItem) -> Truth {
        match self {
            Predicate::Const(value) => Truth::from(*value),
            Predicate::Leaf(condition) => condition.evaluate(item),
            Predicate::And(children) => {
                let mut result = Truth::True;
                for child in children {
                    match child.evaluate(item) {
                        Truth::False => return Truth::False,
                        Truth::Unknown => result = Truth::Unknown,
                        Truth::True => {}
                    }
                }
                result
            }
            Predicate::Or(children) => {
                let mut result = Truth::False;
                for child in children {
                    match child.evaluate(item) {
                        Truth::True => return Truth::True,
                        Truth::Unknown => result = Truth::Unknown,
                        Truth::False => {}
                    }
                }
                result
            }
            Predicate::Not(inner) => Truth::from(!inner.evaluate(item).is_true()),
        }
    }

    /// Whether a row belongs to the result set
    pub fn matches(&self, item: &WorkItem) -> bool {
        self.evaluate(item).is_true()
    }
}
