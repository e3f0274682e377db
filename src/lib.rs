//! Formula language for metric visualizations.
//!
//! A formula such as `sum(bytes) / count(kql='status: 500')` goes through
//! four stages:
//!
//! 1. [`lexer`] turns text into tokens
//! 2. [`parser`] builds an [`ast::Node`] tree
//! 3. [`validator`] reports security, syntax, type, performance and schema issues
//! 4. [`compiler`] emits an aggregation query document
//!
//! [`engine::FormulaEngine`] bundles the stages behind one configuration.

pub mod ast;
pub mod cache;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compiler;
pub mod config;
pub mod debounce;
pub mod engine;
pub mod lexer;
pub mod parser;
pub mod registry;
pub mod validator;

pub use ast::{BinaryOperator, DataType, LiteralValue, Node, NodeKind, Token, TokenKind, UnaryOperator};
pub use cache::{BoundedCache, ExecutionCache, ExecutionCacheKey, ParseCache};
pub use compiler::{BuildOptions, CompileError, QueryCompiler, QueryDocument, TimeRange};
pub use config::{ConfigError, FormulaConfig};
pub use debounce::{DebouncedValidation, ValidationDebouncer};
pub use engine::{FormulaCheck, FormulaEngine};
pub use lexer::{LexError, Lexer, tokenize};
pub use parser::{ParseError, ParseOutcome, Parser, parse};
pub use registry::{FunctionKind, FunctionRegistry, FunctionSignature};
pub use validator::{
    FieldSpec, IssueKind, Severity, ValidationContext, ValidationIssue, ValidationResult, Validator,
};
