//! # Formula Language - Abstract Syntax Tree
//!
//! This module defines the tokens and syntax tree of the formula language, a
//! small expression language for composing aggregation metrics.
//!
//! ## Architecture Overview
//!
//! - **[tokens]** - Lexical tokens produced by the lexer
//! - **[operators]** - Binary and unary operators with their binding powers
//! - **[expressions]** - Syntax tree nodes, literal values and value types
//!
//! ## Quick Start
//!
//! ```text
//! sum(bytes) / count(kql='status: 200', shift='1d')
//! ```
//!
//! This formula divides the byte total by the number of successful requests
//! one day earlier.
//!
//! ## Core Concepts
//!
//! ### Functions and Fields
//!
//! An identifier followed by `(` is a function call; any other identifier is a
//! field reference. Function calls take positional and named arguments in any
//! order:
//!
//! ```text
//! percentile(latency, percentile=99, kql='service: api')
//! ```
//!
//! ### Operator Precedence
//!
//! From loosest to tightest: `or`, `and`, `== !=`, `> < >= <=`, `+ -`,
//! `* / %`, `^`, prefix `not`, prefix `-`. Binary operators of equal
//! precedence associate to the left, `^` included.
//!
//! ### Spans
//!
//! Every token and node carries a character `position` and `length`, which is
//! what diagnostics use to point at source text.
pub mod expressions;
pub mod operators;
pub mod tokens;

pub use expressions::{DataType, LiteralValue, Node, NodeKind};
pub use operators::{BinaryOperator, UnaryOperator};
pub use tokens::{Token, TokenKind};
