use crate::ast::{BinaryOperator, UnaryOperator};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Value types known to the formula language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DataType {
    Number,
    String,
    Boolean,
    Date,
    Any,
}

impl DataType {
    /// `true` when a value of type `self` may be used where `expected` is required.
    pub fn is_compatible_with(self, expected: DataType) -> bool {
        self == expected
            || self == DataType::Any
            || expected == DataType::Any
            || (self == DataType::String && expected == DataType::Date)
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Number => "NUMBER",
            DataType::String => "STRING",
            DataType::Boolean => "BOOLEAN",
            DataType::Date => "DATE",
            DataType::Any => "ANY",
        };
        f.write_str(name)
    }
}

/// Literal value carried by [`NodeKind::Literal`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum LiteralValue {
    Number(f64),
    String(String),
    Boolean(bool),
}

impl LiteralValue {
    pub fn data_type(&self) -> DataType {
        match self {
            LiteralValue::Number(_) => DataType::Number,
            LiteralValue::String(_) => DataType::String,
            LiteralValue::Boolean(_) => DataType::Boolean,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            LiteralValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            LiteralValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// A node of the formula syntax tree.
///
/// Every node records the character span of the source text it was parsed
/// from, so diagnostics can underline exactly the offending construct. Nodes
/// are never mutated after parsing; caches hand out shared references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    #[serde(flatten)]
    pub kind: NodeKind,
    pub position: usize,
    pub length: usize,
}

/// The syntactic construct a [`Node`] represents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum NodeKind {
    /// Function call with positional and named arguments
    ///
    /// # Examples
    /// ```text
    /// sum(bytes)
    /// count(kql='status: 500', shift='1d')
    /// ```
    FunctionCall {
        name: String,
        positional_args: Vec<Node>,
        named_args: BTreeMap<String, Node>,
    },

    /// Binary operation (arithmetic, comparison, logical)
    BinaryOp {
        operator: BinaryOperator,
        left: Box<Node>,
        right: Box<Node>,
    },

    /// Prefix operation (`-x`, `not x`)
    UnaryOp {
        operator: UnaryOperator,
        operand: Box<Node>,
    },

    /// Reference to a document field
    FieldRef { field: String },

    /// Number, string or boolean literal
    Literal { value: LiteralValue },
}

impl Node {
    pub fn new(kind: NodeKind, position: usize, length: usize) -> Self {
        Node {
            kind,
            position,
            length,
        }
    }

    /// Offset one past the last character covered by this node.
    pub fn end(&self) -> usize {
        self.position + self.length
    }

    /// Direct children in evaluation order: positional arguments first, then
    /// named arguments sorted by name.
    pub fn children(&self) -> Vec<&Node> {
        match &self.kind {
            NodeKind::FunctionCall {
                positional_args,
                named_args,
                ..
            } => positional_args.iter().chain(named_args.values()).collect(),
            NodeKind::BinaryOp { left, right, .. } => vec![left.as_ref(), right.as_ref()],
            NodeKind::UnaryOp { operand, .. } => vec![operand.as_ref()],
            NodeKind::FieldRef { .. } | NodeKind::Literal { .. } => Vec::new(),
        }
    }

    /// Nesting levels below this node: a leaf has depth 0, `abs(x)` depth 1.
    pub fn depth(&self) -> usize {
        self.children()
            .into_iter()
            .map(|child| child.depth() + 1)
            .max()
            .unwrap_or(0)
    }

    /// Pre-order traversal over this node and all of its descendants.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Node)) {
        visit(self);
        for child in self.children() {
            child.walk(visit);
        }
    }

    pub fn function_name(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::FunctionCall { name, .. } => Some(name),
            _ => None,
        }
    }

    pub fn as_literal(&self) -> Option<&LiteralValue> {
        match &self.kind {
            NodeKind::Literal { value } => Some(value),
            _ => None,
        }
    }

    pub fn as_field(&self) -> Option<&str> {
        match &self.kind {
            NodeKind::FieldRef { field } => Some(field),
            _ => None,
        }
    }

    fn binding_power(&self) -> u8 {
        match &self.kind {
            NodeKind::BinaryOp { operator, .. } => operator.precedence(),
            NodeKind::UnaryOp { operator, .. } => operator.precedence(),
            _ => u8::MAX,
        }
    }
}

/// Renders the node back to canonical formula text.
///
/// Parentheses are only emitted where the tree shape differs from what the
/// parser would produce without them.
impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            NodeKind::Literal { value } => write_literal(f, value),
            NodeKind::FieldRef { field } => f.write_str(field),
            NodeKind::FunctionCall {
                name,
                positional_args,
                named_args,
            } => {
                write!(f, "{}(", name)?;
                let mut first = true;
                for arg in positional_args {
                    if !first {
                        f.write_str(", ")?;
                    }
                    first = false;
                    write!(f, "{}", arg)?;
                }
                for (key, arg) in named_args {
                    if !first {
                        f.write_str(", ")?;
                    }
                    first = false;
                    write!(f, "{}={}", key, arg)?;
                }
                f.write_str(")")
            }
            NodeKind::UnaryOp { operator, operand } => {
                f.write_str(operator.symbol())?;
                if operand.binding_power() <= operator.precedence() {
                    write!(f, "({})", operand)
                } else {
                    write!(f, "{}", operand)
                }
            }
            NodeKind::BinaryOp {
                operator,
                left,
                right,
            } => {
                let prec = operator.precedence();
                if left.binding_power() < prec {
                    write!(f, "({})", left)?;
                } else {
                    write!(f, "{}", left)?;
                }
                write!(f, " {} ", operator)?;
                // Chains are left-associative, so an equal-precedence right child needs parens.
                if right.binding_power() <= prec {
                    write!(f, "({})", right)
                } else {
                    write!(f, "{}", right)
                }
            }
        }
    }
}

fn write_literal(f: &mut fmt::Formatter<'_>, value: &LiteralValue) -> fmt::Result {
    match value {
        LiteralValue::Number(n) => {
            if n.fract() == 0.0 && n.abs() < 1e15 {
                write!(f, "{}", *n as i64)
            } else {
                write!(f, "{}", n)
            }
        }
        LiteralValue::Boolean(b) => write!(f, "{}", b),
        LiteralValue::String(s) => {
            f.write_str("'")?;
            for ch in s.chars() {
                match ch {
                    '\'' => f.write_str("\\'")?,
                    '\\' => f.write_str("\\\\")?,
                    '\n' => f.write_str("\\n")?,
                    '\t' => f.write_str("\\t")?,
                    '\r' => f.write_str("\\r")?,
                    c => write!(f, "{}", c)?,
                }
            }
            f.write_str("'")
        }
    }
}
