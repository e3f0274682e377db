//! Semantic validation of formula syntax trees.
//!
//! Validation runs five passes in order, each contributing issues to one
//! [`ValidationResult`]:
//!
//! 1. **security** - size, nesting and call-count caps, forbidden patterns
//! 2. **syntax** - function existence, arity, argument names, shift format
//! 3. **types** - type inference and operator/argument compatibility
//! 4. **performance** - complexity score and repeated subexpressions
//! 5. **schema** - field existence, only when fields are supplied
//!
//! When the security pass reports an error the remaining passes are skipped.
//! [`Validator::validate`] never panics and never fails: internal faults are
//! reported as a single `internal` error.

mod performance;
mod schema;
mod security;
mod suggest;
mod syntax;
mod types;

pub use suggest::suggest;
pub use syntax::is_valid_shift;

use crate::{
    ast::{DataType, Node},
    config::{FormulaConfig, PerformanceConfig, SecurityConfig},
    registry::FunctionRegistry,
};
use regex::RegexSet;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// Which check produced an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IssueKind {
    Security,
    Syntax,
    Type,
    Performance,
    Schema,
    Internal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationIssue {
    pub severity: Severity,
    pub kind: IssueKind,
    pub message: String,
    pub position: usize,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
}

impl ValidationIssue {
    pub fn error(kind: IssueKind, message: impl Into<String>, position: usize) -> Self {
        Self::new(Severity::Error, kind, message, position)
    }

    pub fn warning(kind: IssueKind, message: impl Into<String>, position: usize) -> Self {
        Self::new(Severity::Warning, kind, message, position)
    }

    pub fn info(kind: IssueKind, message: impl Into<String>, position: usize) -> Self {
        Self::new(Severity::Info, kind, message, position)
    }

    fn new(severity: Severity, kind: IssueKind, message: impl Into<String>, position: usize) -> Self {
        ValidationIssue {
            severity,
            kind,
            message: message.into(),
            position,
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestions(mut self, suggestions: Vec<String>) -> Self {
        self.suggestions = suggestions;
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationResult {
    pub valid: bool,
    pub results: Vec<ValidationIssue>,
    pub complexity: u32,
    #[serde(rename = "validation_time_ms", serialize_with = "serialize_millis")]
    pub validation_time: Duration,
}

impl ValidationResult {
    pub fn errors(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.results.iter().filter(|r| r.severity == Severity::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.results.iter().filter(|r| r.severity == Severity::Warning)
    }

    pub fn infos(&self) -> impl Iterator<Item = &ValidationIssue> {
        self.results.iter().filter(|r| r.severity == Severity::Info)
    }

    pub fn first_error(&self) -> Option<&ValidationIssue> {
        self.errors().next()
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_f64(duration.as_secs_f64() * 1000.0)
}

/// A field of the data view the formula runs against.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default = "default_aggregatable")]
    pub aggregatable: bool,
}

fn default_aggregatable() -> bool {
    true
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, field_type: impl Into<String>) -> Self {
        FieldSpec {
            name: name.into(),
            field_type: field_type.into(),
            aggregatable: true,
        }
    }

    pub fn not_aggregatable(mut self) -> Self {
        self.aggregatable = false;
        self
    }

    /// Formula type of values stored in this field.
    pub fn data_type(&self) -> DataType {
        match self.field_type.to_ascii_lowercase().as_str() {
            "number" | "long" | "integer" | "short" | "byte" | "double" | "float"
            | "half_float" | "scaled_float" => DataType::Number,
            "date" | "date_nanos" => DataType::Date,
            "boolean" => DataType::Boolean,
            "string" | "keyword" | "text" | "ip" => DataType::String,
            _ => DataType::Any,
        }
    }
}

/// Optional schema information for validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValidationContext {
    #[serde(default)]
    pub fields: Option<Vec<FieldSpec>>,
}

impl ValidationContext {
    pub fn with_fields(fields: Vec<FieldSpec>) -> Self {
        ValidationContext {
            fields: Some(fields),
        }
    }
}

/// Faults inside a pass, as opposed to problems with the formula.
#[derive(Debug, Error)]
pub(crate) enum ValidatorFault {
    #[error("failed to measure formula size: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// Shared inputs handed to every pass.
pub(crate) struct PassContext<'a> {
    pub registry: &'a FunctionRegistry,
    pub security: &'a SecurityConfig,
    pub performance: &'a PerformanceConfig,
    pub forbidden: &'a RegexSet,
    pub fields: Option<HashMap<&'a str, &'a FieldSpec>>,
}

pub struct Validator {
    registry: Arc<FunctionRegistry>,
    security: SecurityConfig,
    performance: PerformanceConfig,
    forbidden: RegexSet,
}

impl Validator {
    pub fn new(registry: Arc<FunctionRegistry>, config: &FormulaConfig) -> Result<Self, regex::Error> {
        Ok(Validator {
            forbidden: config.security.compile_patterns()?,
            registry,
            security: config.security.clone(),
            performance: config.performance.clone(),
        })
    }

    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Runs every pass over `ast`. Always returns a well-formed result.
    pub fn validate(&self, ast: &Node, context: Option<&ValidationContext>) -> ValidationResult {
        let started = Instant::now();

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| self.run_passes(ast, context)));
        let (results, complexity) = match outcome {
            Ok(Ok(passed)) => passed,
            Ok(Err(fault)) => (vec![internal_issue(fault.to_string())], 0),
            Err(payload) => {
                let reason = payload
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| payload.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "unknown panic".to_string());
                tracing::warn!("validator panicked: {}", reason);
                (vec![internal_issue(reason)], 0)
            }
        };

        let valid = !results.iter().any(ValidationIssue::is_error);
        let validation_time = started.elapsed();

        tracing::debug!(
            valid,
            issues = results.len(),
            complexity,
            elapsed_us = validation_time.as_micros() as u64,
            "formula validated"
        );

        ValidationResult {
            valid,
            results,
            complexity,
            validation_time,
        }
    }

    fn run_passes(
        &self,
        ast: &Node,
        context: Option<&ValidationContext>,
    ) -> Result<(Vec<ValidationIssue>, u32), ValidatorFault> {
        let fields = context
            .and_then(|c| c.fields.as_ref())
            .map(|fields| fields.iter().map(|f| (f.name.as_str(), f)).collect());

        let ctx = PassContext {
            registry: &self.registry,
            security: &self.security,
            performance: &self.performance,
            forbidden: &self.forbidden,
            fields,
        };

        let mut results = security::check(ast, &ctx)?;
        if results.iter().any(ValidationIssue::is_error) {
            return Ok((results, 0));
        }

        results.extend(syntax::check(ast, &ctx));
        results.extend(types::check(ast, &ctx));

        let (issues, complexity) = performance::check(ast, &ctx);
        results.extend(issues);

        if ctx.fields.is_some() {
            results.extend(schema::check(ast, &ctx));
        }

        Ok((results, complexity))
    }
}

fn internal_issue(reason: String) -> ValidationIssue {
    ValidationIssue::error(
        IssueKind::Internal,
        format!("Internal validation error: {}", reason),
        0,
    )
}
