//! The formula pipeline behind one configuration.
//!
//! [`FormulaEngine`] wires one function registry, one validator, one query
//! compiler and one parse cache together. It is `Send + Sync`; share it
//! behind an `Arc`.

use crate::{
    ast::Node,
    cache::ParseCache,
    compiler::{BuildOptions, CompileError, QueryCompiler, QueryDocument},
    config::{ConfigError, FormulaConfig},
    parser::{self, ParseOutcome},
    registry::FunctionRegistry,
    validator::{ValidationContext, ValidationResult, Validator},
};
use serde::Serialize;
use std::sync::Arc;

/// Parse and validation results for one formula text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormulaCheck {
    pub valid: bool,
    pub parse: ParseOutcome,
    /// Absent when the formula did not parse
    pub validation: Option<ValidationResult>,
}

pub struct FormulaEngine {
    config: FormulaConfig,
    registry: Arc<FunctionRegistry>,
    validator: Validator,
    compiler: QueryCompiler,
    parse_cache: ParseCache,
}

impl FormulaEngine {
    /// Creates an engine over the built-in function catalog.
    pub fn new(config: FormulaConfig) -> Result<Self, ConfigError> {
        Self::with_registry(config, FunctionRegistry::builtin())
    }

    pub fn with_registry(config: FormulaConfig, registry: FunctionRegistry) -> Result<Self, ConfigError> {
        let registry = Arc::new(registry);
        let validator = Validator::new(Arc::clone(&registry), &config)?;
        let compiler = QueryCompiler::new(Arc::clone(&registry), &config.query);
        let parse_cache = ParseCache::from_config(&config.cache);

        Ok(FormulaEngine {
            config,
            registry,
            validator,
            compiler,
            parse_cache,
        })
    }

    pub fn config(&self) -> &FormulaConfig {
        &self.config
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    pub fn parse_cache(&self) -> &ParseCache {
        &self.parse_cache
    }

    /// Parses `text`, reusing the result of an earlier parse of the same text.
    pub fn parse(&self, text: &str) -> ParseOutcome {
        let key = text.to_string();
        if let Some(outcome) = self.parse_cache.get(&key) {
            tracing::trace!(len = text.len(), "parse cache hit");
            return outcome;
        }

        tracing::trace!(len = text.len(), "parse cache miss");
        let outcome = parser::parse(text);
        self.parse_cache.insert(key, outcome.clone());
        outcome
    }

    pub fn validate(&self, ast: &Node, context: Option<&ValidationContext>) -> ValidationResult {
        self.validator.validate(ast, context)
    }

    /// Parses and validates `text`. Never fails; problems are reported in
    /// the returned check.
    pub fn validate_formula(&self, text: &str, context: Option<&ValidationContext>) -> FormulaCheck {
        let parse = self.parse(text);
        let validation = parse.ast.as_deref().map(|ast| self.validate(ast, context));
        let valid = parse.success && validation.as_ref().is_some_and(|v| v.valid);

        FormulaCheck {
            valid,
            parse,
            validation,
        }
    }

    pub fn build_query(&self, ast: &Node, options: &BuildOptions) -> Result<QueryDocument, CompileError> {
        self.compiler.build_query(ast, options)
    }
}
