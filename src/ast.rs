//! Core syntax tree and value types.
//!
//! [`Node`] is what the reader produces and what the evaluator walks: atoms,
//! string literals and lists of nodes. Every node carries a [`NodeId`], and
//! parameter substitution works on that identity rather than on the node's
//! text. Cloning a node keeps its identity; [`Node::deep_copy`] mints new ones.
//!
//! [`Value`] is the result of evaluation: nil, integers, strings, lists of
//! values, or a quoted node that was deliberately left unevaluated.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::Error;

/// Type alias for number values in the interpreter
pub(crate) type NumberType = i64;

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a syntax node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    pub(crate) fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Clone)]
pub enum NodeKind {
    /// Unquoted token, classified at evaluation time as integer or symbol
    Atom(String),
    /// Text that was delimited by `"` in the source
    Str(String),
    /// Ordered children; consumed from the front or the back during evaluation
    List(VecDeque<Node>),
}

/// A syntax node with identity.
///
/// Equality is structural and ignores identity, so two separately parsed
/// copies of the same text compare equal. Use [`Node::same_node`] to ask
/// whether two nodes are the same object.
#[derive(Clone)]
pub struct Node {
    id: NodeId,
    kind: NodeKind,
}

impl Node {
    pub fn new(kind: NodeKind) -> Self {
        Node {
            id: NodeId::fresh(),
            kind,
        }
    }

    pub fn atom(text: impl Into<String>) -> Self {
        Node::new(NodeKind::Atom(text.into()))
    }

    pub fn string(text: impl Into<String>) -> Self {
        Node::new(NodeKind::Str(text.into()))
    }

    pub fn list(children: impl IntoIterator<Item = Node>) -> Self {
        Node::new(NodeKind::List(children.into_iter().collect()))
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn kind(&self) -> &NodeKind {
        &self.kind
    }

    pub(crate) fn kind_mut(&mut self) -> &mut NodeKind {
        &mut self.kind
    }

    pub(crate) fn into_kind(self) -> NodeKind {
        self.kind
    }

    /// Build a node that takes an existing identity.
    pub(crate) fn from_parts(id: NodeId, kind: NodeKind) -> Self {
        Node { id, kind }
    }

    pub(crate) fn set_id(&mut self, id: NodeId) {
        self.id = id;
    }

    pub fn same_node(&self, other: &Node) -> bool {
        self.id == other.id
    }

    pub fn as_atom(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::Atom(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&VecDeque<Node>> {
        match &self.kind {
            NodeKind::List(children) => Some(children),
            _ => None,
        }
    }

    /// Structural clone in which no node is identity-equal to any node of `self`.
    ///
    /// Nodes sharing an identity in the source share one fresh identity in the
    /// copy, so occurrences tagged with a parameter's id stay linked to each other.
    pub fn deep_copy(&self) -> Node {
        crate::substitute::deep_copy(self)
    }
}

impl PartialEq for Node {
    fn eq(&self, other: &Self) -> bool {
        match (&self.kind, &other.kind) {
            (NodeKind::Atom(a), NodeKind::Atom(b)) => a == b,
            (NodeKind::Str(a), NodeKind::Str(b)) => a == b,
            (NodeKind::List(a), NodeKind::List(b)) => a == b,
            _ => false,
        }
    }
}

impl std::fmt::Debug for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            NodeKind::Atom(text) => write!(f, "Atom({text})"),
            NodeKind::Str(text) => write!(f, "Str(\"{text}\")"),
            NodeKind::List(children) => {
                write!(f, "List(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{child:?}")?;
                }
                write!(f, ")")
            }
        }
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.kind {
            NodeKind::Atom(text) => write!(f, "{text}"),
            NodeKind::Str(text) => write!(f, "\"{text}\""),
            NodeKind::List(children) => {
                write!(f, "(")?;
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{child}")?;
                }
                write!(f, ")")
            }
        }
    }
}

/// Result of evaluating a node.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Absence of a value; also what `defun` and `defmacro` return
    Nil,
    /// Numbers (integers only)
    Number(NumberType),
    /// String values
    String(String),
    /// Lists built by the `list` form
    List(Vec<Value>),
    /// Unevaluated syntax produced by `quote`
    Quote(Node),
}

impl Value {
    /// `0`, the empty string and nil are false; everything else is true.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Value::Nil | Value::Number(0))
            && !matches!(self, Value::String(s) if s.is_empty())
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// Short name of the variant, used in type error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Nil => "nil",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::List(_) => "list",
            Value::Quote(_) => "quote",
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Number(NumberType::from(b))
    }
}

impl From<()> for Value {
    fn from(_: ()) -> Self {
        Value::Nil
    }
}

impl From<Node> for Value {
    fn from(node: Node) -> Self {
        Value::Quote(node)
    }
}

macro_rules! impl_from_integer {
    ($int_type:ty) => {
        impl From<$int_type> for Value {
            fn from(n: $int_type) -> Self {
                Value::Number(NumberType::from(n))
            }
        }
    };
}

impl_from_integer!(i8);
impl_from_integer!(i16);
impl_from_integer!(i32);
impl_from_integer!(NumberType);
impl_from_integer!(u8);
impl_from_integer!(u16);
impl_from_integer!(u32);

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Nil, Into::into)
    }
}

impl TryFrom<Value> for NumberType {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Error> {
        match value {
            Value::Number(n) => Ok(n),
            other => Err(Error::TypeError(format!(
                "expected number, got {}",
                other.type_name()
            ))),
        }
    }
}

impl TryFrom<Value> for bool {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Error> {
        Ok(value.is_truthy())
    }
}

impl TryFrom<Value> for String {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Error> {
        match value {
            Value::String(s) => Ok(s),
            other => Err(Error::TypeError(format!(
                "expected string, got {}",
                other.type_name()
            ))),
        }
    }
}

impl std::fmt::Display for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Nil => write!(f, "nil"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "\"{s}\""),
            Value::List(elements) => {
                write!(f, "(")?;
                for (i, elem) in elements.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{elem}")?;
                }
                write!(f, ")")
            }
            Value::Quote(node) => write!(f, "'{node}"),
        }
    }
}
