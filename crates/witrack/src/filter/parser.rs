//! Parser for JSON filter expressions
//!
//! Builds a typed abstract syntax tree (AST) from a raw JSON document. Raw
//! JSON never leaves this module: values become [`Value`], operator keys
//! become [`Operator`], and anything outside the grammar is a syntax error.

use crate::errors::{QueryError, QueryResult};
use serde_json::{Map, Value as JsonValue};

const AND: &str = "$AND";
const OR: &str = "$OR";
const OPTS: &str = "$OPTS";
const NEGATE: &str = "negate";
const TREE_VIEW: &str = "tree_view";

/// Comparison operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    /// Exact match (also the meaning of a bare value)
    Eq,
    /// Exact mismatch
    Ne,
    /// Membership in a list of values
    In,
    /// Case-sensitive substring containment
    Substr,
}

impl Operator {
    fn from_key(key: &str) -> Option<Self> {
        match key {
            "$EQ" => Some(Operator::Eq),
            "$NE" => Some(Operator::Ne),
            "$IN" => Some(Operator::In),
            "$SUBSTR" => Some(Operator::Substr),
            _ => None,
        }
    }
}

/// Comparison value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
    String(String),
    Null,
    List(Vec<String>),
}

/// Boolean connective of a combinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogicalOp {
    And,
    Or,
}

/// A single `field <operator> value` test
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Comparison {
    pub field: String,
    pub operator: Operator,
    pub value: Value,
    pub negate: bool,
}

/// AND/OR over one or more child nodes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Combinator {
    pub op: LogicalOp,
    pub children: Vec<FilterNode>,
    pub negate: bool,
}

/// Abstract syntax tree node for filter expressions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterNode {
    Comparison(Comparison),
    Combinator(Combinator),
}

impl FilterNode {
    /// Visit every comparison in the tree, depth first
    pub fn for_each_comparison<'a>(&'a self, visit: &mut impl FnMut(&'a Comparison)) {
        match self {
            FilterNode::Comparison(c) => visit(c),
            FilterNode::Combinator(c) => {
                for child in &c.children {
                    child.for_each_comparison(visit);
                }
            }
        }
    }

    fn negated(self) -> Self {
        match self {
            FilterNode::Comparison(mut c) => {
                c.negate = true;
                FilterNode::Comparison(c)
            }
            FilterNode::Combinator(mut c) => {
                c.negate = true;
                FilterNode::Combinator(c)
            }
        }
    }
}

/// Query options carried beside the root node
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    /// Include the ancestor chain of every match
    pub tree_view: bool,
}

/// A parsed filter document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterDocument {
    pub root: FilterNode,
    pub options: Options,
}

/// Parse raw bytes into a filter document.
///
/// # Examples
///
/// ```
/// use witrack::filter::{parse_filter, FilterNode, Operator};
///
/// let doc = parse_filter(br#"{"state": {"$IN": ["resolved", "closed"]}}"#).unwrap();
/// match doc.root {
///     FilterNode::Comparison(c) => assert_eq!(c.operator, Operator::In),
///     _ => panic!("expected a comparison"),
/// }
/// assert!(!doc.options.tree_view);
/// ```
pub fn parse_filter(input: &[u8]) -> QueryResult<FilterDocument> {
    let json: JsonValue = serde_json::from_slice(input)
        .map_err(|e| QueryError::syntax(format!("malformed JSON: {}", e)))?;

    let JsonValue::Object(mut body) = json else {
        return Err(QueryError::syntax("filter must be a JSON object"));
    };

    let options = match body.remove(OPTS) {
        Some(opts) => parse_options(opts)?,
        None => Options::default(),
    };

    if body.is_empty() {
        return Err(QueryError::syntax("filter has no condition"));
    }

    let root = parse_object(body)?;
    Ok(FilterDocument { root, options })
}

fn parse_options(value: JsonValue) -> QueryResult<Options> {
    let JsonValue::Object(map) = value else {
        return Err(QueryError::syntax("$OPTS must be an object"));
    };

    let mut options = Options::default();
    for (key, value) in map {
        match (key.as_str(), value) {
            (TREE_VIEW, JsonValue::Bool(flag)) => options.tree_view = flag,
            (TREE_VIEW, _) => return Err(QueryError::syntax("tree_view must be true or false")),
            (other, _) => {
                return Err(QueryError::syntax(format!("unknown option '{}'", other)));
            }
        }
    }
    Ok(options)
}

/// Parse one JSON object into a node.
///
/// A single condition becomes that node; several field keys at one level
/// become an implicit AND.
fn parse_object(mut map: Map<String, JsonValue>) -> QueryResult<FilterNode> {
    let negate = match map.remove(NEGATE) {
        None => false,
        Some(JsonValue::Bool(flag)) => flag,
        Some(_) => return Err(QueryError::syntax("negate must be true or false")),
    };

    let mut nodes = Vec::with_capacity(map.len());
    for (key, value) in map {
        let node = match key.as_str() {
            AND => parse_combinator(LogicalOp::And, value)?,
            OR => parse_combinator(LogicalOp::Or, value)?,
            OPTS => return Err(QueryError::syntax("$OPTS is only allowed at the top level")),
            k if k.starts_with('$') => {
                return Err(QueryError::syntax(format!("unknown operator '{}'", k)));
            }
            "" => return Err(QueryError::syntax("empty filter key")),
            _ => parse_comparison(key, value)?,
        };
        nodes.push(node);
    }

    match nodes.len() {
        0 => Err(QueryError::syntax("empty condition object")),
        1 => {
            let node = nodes.remove(0);
            Ok(if negate { node.negated() } else { node })
        }
        _ if negate => Err(QueryError::syntax(
            "negate is ambiguous next to several conditions; wrap them in $AND",
        )),
        _ => Ok(FilterNode::Combinator(Combinator {
            op: LogicalOp::And,
            children: nodes,
            negate: false,
        })),
    }
}

fn parse_combinator(op: LogicalOp, value: JsonValue) -> QueryResult<FilterNode> {
    let name = match op {
        LogicalOp::And => AND,
        LogicalOp::Or => OR,
    };
    let JsonValue::Array(items) = value else {
        return Err(QueryError::syntax(format!("{} expects an array", name)));
    };
    if items.is_empty() {
        return Err(QueryError::syntax(format!("{} needs at least one condition", name)));
    }

    let children = items
        .into_iter()
        .map(|item| match item {
            JsonValue::Object(map) => parse_object(map),
            _ => Err(QueryError::syntax(format!("{} items must be objects", name))),
        })
        .collect::<QueryResult<Vec<_>>>()?;

    Ok(FilterNode::Combinator(Combinator {
        op,
        children,
        negate: false,
    }))
}

fn parse_comparison(field: String, value: JsonValue) -> QueryResult<FilterNode> {
    let (operator, value) = match value {
        JsonValue::Object(map) => parse_operator_object(&field, map)?,
        JsonValue::Array(_) => {
            return Err(QueryError::syntax(format!(
                "'{}' has a list value; use {{\"$IN\": [...]}}",
                field
            )));
        }
        scalar => (Operator::Eq, scalar_value(&field, scalar)?),
    };

    Ok(FilterNode::Comparison(Comparison {
        field,
        operator,
        value,
        negate: false,
    }))
}

fn parse_operator_object(field: &str, map: Map<String, JsonValue>) -> QueryResult<(Operator, Value)> {
    if map.len() != 1 {
        return Err(QueryError::syntax(format!(
            "'{}' needs exactly one operator",
            field
        )));
    }
    let Some((key, value)) = map.into_iter().next() else {
        return Err(QueryError::syntax(format!("'{}' needs an operator", field)));
    };
    let operator = Operator::from_key(&key)
        .ok_or_else(|| QueryError::syntax(format!("unknown operator '{}' on '{}'", key, field)))?;

    let value = match operator {
        Operator::In => match value {
            JsonValue::Array(items) => Value::List(
                items
                    .into_iter()
                    .map(|item| match item {
                        JsonValue::String(s) => Ok(s),
                        _ => Err(QueryError::syntax(format!(
                            "$IN values for '{}' must be strings",
                            field
                        ))),
                    })
                    .collect::<QueryResult<Vec<_>>>()?,
            ),
            _ => return Err(QueryError::syntax(format!("$IN on '{}' expects an array", field))),
        },
        Operator::Substr => match value {
            JsonValue::String(s) => Value::String(s),
            _ => {
                return Err(QueryError::syntax(format!(
                    "$SUBSTR on '{}' expects a string",
                    field
                )));
            }
        },
        Operator::Eq | Operator::Ne => scalar_value(field, value)?,
    };

    Ok((operator, value))
}

fn scalar_value(field: &str, value: JsonValue) -> QueryResult<Value> {
    match value {
        JsonValue::String(s) => Ok(Value::String(s)),
        JsonValue::Null => Ok(Value::Null),
        other => Err(QueryError::syntax(format!(
            "unsupported value {} for '{}'; expected a string or null",
            other, field
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(input: &str) -> QueryResult<FilterDocument> {
        parse_filter(input.as_bytes())
    }

    fn comparison(field: &str, operator: Operator, value: Value, negate: bool) -> FilterNode {
        FilterNode::Comparison(Comparison {
            field: field.to_string(),
            operator,
            value,
            negate,
        })
    }

    #[test]
    fn test_parse_bare_value_is_eq() {
        let doc = parse(r#"{"state": "open"}"#).unwrap();
        assert_eq!(
            doc.root,
            comparison("state", Operator::Eq, Value::String("open".into()), false)
        );
    }

    #[test]
    fn test_parse_null_value() {
        let doc = parse(r#"{"assignee": null}"#).unwrap();
        assert_eq!(doc.root, comparison("assignee", Operator::Eq, Value::Null, false));
    }

    #[test]
    fn test_parse_explicit_operators() {
        let doc = parse(r#"{"title": {"$SUBSTR": "login"}}"#).unwrap();
        assert_eq!(
            doc.root,
            comparison("title", Operator::Substr, Value::String("login".into()), false)
        );

        let doc = parse(r#"{"state": {"$NE": null}}"#).unwrap();
        assert_eq!(doc.root, comparison("state", Operator::Ne, Value::Null, false));

        let doc = parse(r#"{"state": {"$IN": ["resolved", "closed"]}}"#).unwrap();
        assert_eq!(
            doc.root,
            comparison(
                "state",
                Operator::In,
                Value::List(vec!["resolved".into(), "closed".into()]),
                false
            )
        );
    }

    #[test]
    fn test_parse_negate_sets_flag_on_comparison() {
        let doc = parse(r#"{"label": "backend", "negate": true}"#).unwrap();
        assert_eq!(
            doc.root,
            comparison("label", Operator::Eq, Value::String("backend".into()), true)
        );
    }

    #[test]
    fn test_parse_nested_combinators() {
        let doc = parse(
            r#"{"$AND": [{"space": "s1"}, {"$OR": [{"title": "A"}, {"title": "B"}]}]}"#,
        )
        .unwrap();

        let FilterNode::Combinator(and) = doc.root else {
            panic!("Expected AND combinator");
        };
        assert_eq!(and.op, LogicalOp::And);
        assert_eq!(and.children.len(), 2);
        let FilterNode::Combinator(or) = &and.children[1] else {
            panic!("Expected nested OR");
        };
        assert_eq!(or.op, LogicalOp::Or);
        assert_eq!(or.children.len(), 2);
    }

    #[test]
    fn test_parse_negated_combinator() {
        let doc = parse(r#"{"$OR": [{"state": "open"}], "negate": true}"#).unwrap();
        let FilterNode::Combinator(or) = doc.root else {
            panic!("Expected OR combinator");
        };
        assert!(or.negate);
    }

    #[test]
    fn test_parse_options_tree_view() {
        let doc = parse(r#"{"$AND": [{"space": "s1"}], "$OPTS": {"tree_view": true}}"#).unwrap();
        assert!(doc.options.tree_view);

        let doc = parse(r#"{"space": "s1"}"#).unwrap();
        assert!(!doc.options.tree_view);
    }

    #[test]
    fn test_parse_several_keys_is_implicit_and() {
        let doc = parse(r#"{"state": "open", "space": "s1"}"#).unwrap();
        let FilterNode::Combinator(and) = doc.root else {
            panic!("Expected implicit AND");
        };
        assert_eq!(and.op, LogicalOp::And);
        assert_eq!(and.children.len(), 2);
    }

    #[test]
    fn test_parse_error_unterminated_object() {
        let err = parse(r#"{"$AND": [{"space": "s1"}]"#).unwrap_err();
        assert!(matches!(err, QueryError::Syntax(_)));
    }

    #[test]
    fn test_parse_error_empty_combinator() {
        let err = parse(r#"{"$AND": []}"#).unwrap_err();
        assert!(err.to_string().contains("at least one condition"));
        assert!(matches!(parse(r#"{"$OR": []}"#), Err(QueryError::Syntax(_))));
    }

    #[test]
    fn test_parse_error_nested_opts() {
        let err = parse(r#"{"$AND": [{"$OPTS": {"tree_view": true}, "space": "s1"}]}"#).unwrap_err();
        assert!(err.to_string().contains("top level"));
    }

    #[test]
    fn test_parse_error_bad_values() {
        assert!(parse(r#"{"state": 3}"#).is_err());
        assert!(parse(r#"{"state": true}"#).is_err());
        assert!(parse(r#"{"state": ["a"]}"#).is_err());
        assert!(parse(r#"{"state": {"$IN": "a"}}"#).is_err());
        assert!(parse(r#"{"state": {"$IN": ["a", 1]}}"#).is_err());
        assert!(parse(r#"{"state": {"$SUBSTR": null}}"#).is_err());
        assert!(parse(r#"{"state": {"$LIKE": "a"}}"#).is_err());
        assert!(parse(r#"{"state": {"$EQ": "a", "$NE": "b"}}"#).is_err());
    }

    #[test]
    fn test_parse_error_structure() {
        assert!(parse(r#"[]"#).is_err());
        assert!(parse(r#"{}"#).is_err());
        assert!(parse(r#"{"$OPTS": {"tree_view": true}}"#).is_err());
        assert!(parse(r#"{"$OPTS": {"tree_view": "yes"}, "state": "a"}"#).is_err());
        assert!(parse(r#"{"$OPTS": {"depth": 3}, "state": "a"}"#).is_err());
        assert!(parse(r#"{"$NOT": [{"state": "a"}]}"#).is_err());
        assert!(parse(r#"{"state": "a", "negate": "yes"}"#).is_err());
        assert!(parse(r#"{"negate": true}"#).is_err());
        assert!(parse(r#"{"state": "a", "title": "b", "negate": true}"#).is_err());
        assert!(parse(r#"{"$AND": ["state"]}"#).is_err());
    }

    #[test]
    fn test_for_each_comparison_visits_all_leaves() {
        let doc = parse(
            r#"{"$AND": [{"space": "s1"}, {"$OR": [{"title": "A"}, {"space": "s2"}]}]}"#,
        )
        .unwrap();

        let mut fields = Vec::new();
        doc.root.for_each_comparison(&mut |c| fields.push(c.field.clone()));
        assert_eq!(fields, vec!["space", "title", "space"]);
    }
}
