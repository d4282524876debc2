//! Predicate compiler
//!
//! Folds a parsed [`FilterDocument`] into a single [`Predicate`]. Every leaf
//! goes through the [`AttributeResolver`]; joins and type groups are expanded
//! into plain ID sets here, so the store only ever sees attribute tests.
//! The AST is read, never rewritten.

use super::parser::{Combinator, Comparison, FilterDocument, FilterNode, LogicalOp, Operator, Options, Value};
use super::predicate::{Attribute, Condition, Predicate, Test};
use super::resolver::{AttributeResolver, Resolution, SpaceScope};
use crate::errors::{QueryError, QueryResult};
use crate::field_types::FieldKind;
use crate::storage::{IterationRepository, LabelRepository, TypeGroupRepository};
use std::collections::BTreeSet;
use tracing::debug;

/// Output of compilation, ready to run against a work item store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledFilter {
    pub predicate: Predicate,
    pub scope: SpaceScope,
    pub options: Options,
}

impl CompiledFilter {
    /// Spaces that confined joined lookups
    pub fn scope(&self) -> &SpaceScope {
        &self.scope
    }

    pub fn tree_view(&self) -> bool {
        self.options.tree_view
    }
}

/// Compiles filter documents for one request
pub struct PredicateCompiler<'a, S> {
    resolver: AttributeResolver<'a, S>,
}

impl<'a, S> PredicateCompiler<'a, S>
where
    S: TypeGroupRepository + IterationRepository + LabelRepository,
{
    pub fn new(resolver: AttributeResolver<'a, S>) -> Self {
        Self { resolver }
    }

    /// Compile a document, optionally confined to one space by the caller.
    pub fn compile(&self, document: &FilterDocument, space_id: Option<&str>) -> QueryResult<CompiledFilter> {
        let request_space = space_id
            .map(|raw| self.resolver.convert("space", &FieldKind::Identifier, raw))
            .transpose()?;

        let mut scope = self.collect_scope(&document.root)?;
        if let Some(space) = &request_space {
            scope.insert(space.clone());
        }

        let mut predicate = self.compile_node(&document.root, &scope)?;
        if let Some(space) = request_space {
            predicate = Predicate::And(vec![
                Predicate::Leaf(Condition::new(Attribute::Space, Test::Eq(space))),
                predicate,
            ]);
        }

        debug!(
            scope = ?scope.spaces(),
            tree_view = document.options.tree_view,
            "compiled work item filter"
        );

        Ok(CompiledFilter {
            predicate,
            scope,
            options: document.options,
        })
    }

    /// Every space a positive `space` comparison selects, anywhere in the tree
    fn collect_scope(&self, root: &FilterNode) -> QueryResult<SpaceScope> {
        let mut raw = Vec::new();
        root.for_each_comparison(&mut |c| {
            if c.field != "space" || c.negate {
                return;
            }
            match (&c.operator, &c.value) {
                (Operator::Eq, Value::String(v)) => raw.push(v.as_str()),
                (Operator::In, Value::List(vs)) => raw.extend(vs.iter().map(String::as_str)),
                _ => {}
            }
        });

        let mut scope = SpaceScope::unrestricted();
        for value in raw {
            scope.insert(
                self.resolver
                    .convert("space", &FieldKind::Identifier, value)?,
            );
        }
        Ok(scope)
    }

    fn compile_node(&self, node: &FilterNode, scope: &SpaceScope) -> QueryResult<Predicate> {
        match node {
            FilterNode::Comparison(c) => self.compile_comparison(c, scope),
            FilterNode::Combinator(c) => self.compile_combinator(c, scope),
        }
    }

    fn compile_combinator(&self, combinator: &Combinator, scope: &SpaceScope) -> QueryResult<Predicate> {
        let children = combinator
            .children
            .iter()
            .map(|child| self.compile_node(child, scope))
            .collect::<QueryResult<Vec<_>>>()?;

        let predicate = match combinator.op {
            LogicalOp::And => Predicate::And(children),
            LogicalOp::Or => Predicate::Or(children),
        };
        Ok(negate_if(predicate, combinator.negate))
    }

    fn compile_comparison(&self, c: &Comparison, scope: &SpaceScope) -> QueryResult<Predicate> {
        if c.negate && c.value == Value::Null {
            return Err(QueryError::invalid_combination(format!(
                "negate cannot be combined with a null value on '{}'",
                c.field
            )));
        }

        let resolver = &self.resolver;
        let predicate = match resolver.resolve_key(&c.field, scope)? {
            Resolution::Direct { attribute, kind } => self.compile_direct(c, attribute, &kind)?,
            Resolution::Collection { attribute } => {
                self.compile_direct(c, attribute, &FieldKind::Identifier)?
            }
            Resolution::LabelRef => compile_join(
                c,
                Attribute::Labels,
                |v| {
                    let mut ids = resolver.label_ids_where(scope, |name| name == v)?;
                    ids.insert(resolver.convert(&c.field, &FieldKind::Identifier, v)?);
                    Ok(ids)
                },
                |s| resolver.label_ids_where(scope, |name| name.contains(s)),
            )?,
            Resolution::IterationName => compile_join(
                c,
                Attribute::Iteration,
                |v| resolver.iteration_ids_where(scope, |name| name == v),
                |s| resolver.iteration_ids_where(scope, |name| name.contains(s)),
            )?,
            Resolution::LabelName => compile_join(
                c,
                Attribute::Labels,
                |v| resolver.label_ids_where(scope, |name| name == v),
                |s| resolver.label_ids_where(scope, |name| name.contains(s)),
            )?,
            Resolution::TypeGroupName => self.compile_group_name(c, scope)?,
            Resolution::TypeGroup { name, type_ids } => compile_group_key(c, &name, type_ids)?,
        };

        Ok(negate_if(predicate, c.negate))
    }

    fn compile_direct(&self, c: &Comparison, attribute: Attribute, kind: &FieldKind) -> QueryResult<Predicate> {
        let convert = |raw: &str| self.resolver.convert(&c.field, kind, raw);
        let test = match (c.operator, &c.value) {
            (_, Value::Null) => null_test(c)?,
            (Operator::Eq, Value::String(v)) => Test::Eq(convert(v.as_str())?),
            (Operator::Ne, Value::String(v)) => Test::Ne(convert(v.as_str())?),
            (Operator::In, Value::List(vs)) => Test::In(
                vs.iter()
                    .map(|v| convert(v.as_str()))
                    .collect::<QueryResult<BTreeSet<_>>>()?,
            ),
            (Operator::Substr, Value::String(_)) if *kind == FieldKind::Number => {
                return Err(QueryError::invalid_combination(format!(
                    "$SUBSTR is not supported on '{}'",
                    c.field
                )));
            }
            (Operator::Substr, Value::String(s)) => Test::Substr(s.clone()),
            _ => return Err(mismatch(c)),
        };
        Ok(Predicate::Leaf(Condition::new(attribute, test)))
    }

    /// `typegroup.name`: the values name groups; unknown names match nothing
    fn compile_group_name(&self, c: &Comparison, scope: &SpaceScope) -> QueryResult<Predicate> {
        let names: Vec<&str> = match (c.operator, &c.value) {
            (_, Value::Null) => {
                return Err(QueryError::invalid_combination(format!(
                    "'{}' cannot be compared with null",
                    c.field
                )));
            }
            (Operator::Substr, _) => {
                return Err(QueryError::invalid_combination(format!(
                    "$SUBSTR is not supported on '{}'",
                    c.field
                )));
            }
            (Operator::Eq | Operator::Ne, Value::String(v)) => vec![v.as_str()],
            (Operator::In, Value::List(vs)) => vs.iter().map(String::as_str).collect(),
            _ => return Err(mismatch(c)),
        };

        let mut known = false;
        let mut type_ids = BTreeSet::new();
        for name in names {
            if let Some(ids) = self.resolver.group_type_ids(name, scope)? {
                known = true;
                type_ids.extend(ids);
            }
        }

        if c.operator == Operator::Ne {
            return Ok(Predicate::Leaf(Condition::new(Attribute::Type, Test::NotIn(type_ids))));
        }
        if !known {
            debug!(field = %c.field, value = ?c.value, "no matching type group; filter matches nothing");
            return Ok(Predicate::Const(false));
        }
        Ok(Predicate::Leaf(Condition::new(Attribute::Type, Test::In(type_ids))))
    }
}

/// A bare key naming a type group. The comparison value is not inspected;
/// `$EQ` selects members and `$NE` selects non-members.
fn compile_group_key(c: &Comparison, name: &str, type_ids: Option<BTreeSet<String>>) -> QueryResult<Predicate> {
    if c.value == Value::Null {
        return Err(QueryError::invalid_combination(format!(
            "type group '{}' cannot be compared with null",
            name
        )));
    }

    match (c.operator, type_ids) {
        (Operator::Eq, Some(ids)) => Ok(Predicate::Leaf(Condition::new(Attribute::Type, Test::In(ids)))),
        (Operator::Ne, Some(ids)) => Ok(Predicate::Leaf(Condition::new(Attribute::Type, Test::NotIn(ids)))),
        (Operator::Eq, None) => {
            debug!(group = %name, "unknown type group; filter matches nothing");
            Ok(Predicate::Const(false))
        }
        (Operator::Ne, None) => Ok(Predicate::Const(true)),
        _ => Err(QueryError::invalid_combination(format!(
            "type group '{}' supports only $EQ and $NE",
            name
        ))),
    }
}

/// Compile a comparison whose values map to sets of stored IDs
fn compile_join(
    c: &Comparison,
    attribute: Attribute,
    by_value: impl Fn(&str) -> QueryResult<BTreeSet<String>>,
    by_substring: impl Fn(&str) -> QueryResult<BTreeSet<String>>,
) -> QueryResult<Predicate> {
    let test = match (c.operator, &c.value) {
        (_, Value::Null) => null_test(c)?,
        (Operator::Eq, Value::String(v)) => Test::In(by_value(v.as_str())?),
        (Operator::Ne, Value::String(v)) => Test::NotIn(by_value(v.as_str())?),
        (Operator::In, Value::List(vs)) => {
            let mut ids = BTreeSet::new();
            for v in vs {
                ids.extend(by_value(v.as_str())?);
            }
            Test::In(ids)
        }
        (Operator::Substr, Value::String(s)) => Test::In(by_substring(s.as_str())?),
        _ => return Err(mismatch(c)),
    };
    Ok(Predicate::Leaf(Condition::new(attribute, test)))
}

fn null_test(c: &Comparison) -> QueryResult<Test> {
    match c.operator {
        Operator::Eq => Ok(Test::IsNull),
        Operator::Ne => Ok(Test::IsNotNull),
        _ => Err(mismatch(c)),
    }
}

fn mismatch(c: &Comparison) -> QueryError {
    QueryError::syntax(format!(
        "operator {:?} cannot take value {:?} on '{}'",
        c.operator, c.value, c.field
    ))
}

fn negate_if(predicate: Predicate, negate: bool) -> Predicate {
    if negate {
        Predicate::Not(Box::new(predicate))
    } else {
        predicate
    }
}
