use crate::{ForeignKey, KeyPath, Value};
use std::{fmt, marker::PhantomData};

/// Comparison operator of a criterion leaf.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operator {
    Eq,
    NotEq,
    Gt,
    Ge,
    Lt,
    Le,
    EqIgnoreCase,
    StartsWith,
    StartsWithIgnoreCase,
    EndsWith,
    EndsWithIgnoreCase,
    Contains,
    ContainsIgnoreCase,
    In,
    NotIn,
    Regexp,
    NotRegexp,
    /// Always true or always false, the right operand is a `Constant`.
    Constant,
    /// Raw SQL condition, the right operand is a `Sql`.
    Sql,
}

impl Operator {
    pub fn is_case_insensitive(&self) -> bool {
        matches!(
            self,
            Operator::EqIgnoreCase
                | Operator::StartsWithIgnoreCase
                | Operator::EndsWithIgnoreCase
                | Operator::ContainsIgnoreCase
        )
    }

    /// True for operators rendered with LIKE.
    pub fn is_like(&self) -> bool {
        matches!(
            self,
            Operator::StartsWith
                | Operator::StartsWithIgnoreCase
                | Operator::EndsWith
                | Operator::EndsWithIgnoreCase
                | Operator::Contains
                | Operator::ContainsIgnoreCase
        )
    }

    /// Adjust a literal before binding it: case folding and LIKE wildcards.
    pub fn bind_value(&self, value: &Value) -> Value {
        let value = if self.is_case_insensitive() {
            value.to_uppercase()
        } else {
            value.clone()
        };
        let Value::Varchar(Some(text)) = &value else {
            return value;
        };
        let text = match self {
            Operator::StartsWith | Operator::StartsWithIgnoreCase => format!("{}%", text),
            Operator::EndsWith | Operator::EndsWithIgnoreCase => format!("%{}", text),
            Operator::Contains | Operator::ContainsIgnoreCase => format!("%{}%", text),
            _ => return value,
        };
        Value::Varchar(Some(text))
    }
}

/// Right side of a criterion leaf.
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Null,
    Value(Value),
    /// List of an IN predicate.
    Values(Vec<Value>),
    /// Primary key of a related entity.
    Key(ForeignKey),
    /// Another column.
    Property(KeyPath),
    Constant(bool),
    Sql(String),
}

impl Operand {
    pub fn from_value(value: Value) -> Self {
        if value.is_null() {
            Operand::Null
        } else {
            Operand::Value(value)
        }
    }
}

/// One comparison.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    /// Absent only for constant and raw SQL conditions.
    pub left: Option<KeyPath>,
    pub operator: Operator,
    pub right: Operand,
}

/// Untyped predicate tree.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Leaf(Leaf),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
}

impl Node {
    pub fn has_or(&self) -> bool {
        match self {
            Node::Leaf(..) => false,
            Node::And(l, r) => l.has_or() || r.has_or(),
            Node::Or(..) => true,
        }
    }

    /// Leaves from left to right.
    pub fn leaves(&self) -> Vec<&Leaf> {
        let mut result = Vec::new();
        self.collect_leaves(&mut result);
        result
    }

    fn collect_leaves<'a>(&'a self, out: &mut Vec<&'a Leaf>) {
        match self {
            Node::Leaf(v) => out.push(v),
            Node::And(l, r) | Node::Or(l, r) => {
                l.collect_leaves(out);
                r.collect_leaves(out);
            }
        }
    }
}

/// Immutable predicate over the entity `E`.
///
/// Built from the field keys, e.g. `Employee::name.eq("Alice").and(Employee::id.gt(10))`.
pub struct Criterion<E> {
    node: Node,
    _p: PhantomData<fn() -> E>,
}

impl<E> Criterion<E> {
    pub fn leaf(left: Option<KeyPath>, operator: Operator, right: Operand) -> Self {
        Self::from_node(Node::Leaf(Leaf {
            left,
            operator,
            right,
        }))
    }

    pub fn from_node(node: Node) -> Self {
        Self {
            node,
            _p: PhantomData,
        }
    }

    /// Criterion that is always `value`.
    pub fn constant(value: bool) -> Self {
        Self::leaf(None, Operator::Constant, Operand::Constant(value))
    }

    /// Raw SQL condition, rendered inside parentheses.
    pub fn sql(condition: impl Into<String>) -> Self {
        Self::leaf(None, Operator::Sql, Operand::Sql(condition.into()))
    }

    pub fn and(self, other: Criterion<E>) -> Self {
        Self::from_node(Node::And(Box::new(self.node), Box::new(other.node)))
    }

    pub fn or(self, other: Criterion<E>) -> Self {
        Self::from_node(Node::Or(Box::new(self.node), Box::new(other.node)))
    }

    pub fn node(&self) -> &Node {
        &self.node
    }

    pub fn into_node(self) -> Node {
        self.node
    }
}

impl<E> Clone for Criterion<E> {
    fn clone(&self) -> Self {
        Self::from_node(self.node.clone())
    }
}

impl<E> PartialEq for Criterion<E> {
    fn eq(&self, other: &Self) -> bool {
        self.node == other.node
    }
}

impl<E> fmt::Debug for Criterion<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.node)
    }
}
