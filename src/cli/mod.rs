//! CLI support for formula-lang
//!
//! Provides programmatic access to the `formula` commands so other tools can
//! embed them.

mod check;
mod compile;
mod docs;

pub use check::{CheckOptions, execute_check};
pub use compile::{CompileOptions, execute_compile};
pub use docs::{DocCategory, function_reference, functions_overview, get_doc_category, get_docs_overview};

use crate::{FormulaConfig, FormulaEngine, ValidationContext, validator::FieldSpec};
use std::io;
use std::path::Path;
use thiserror::Error;

/// Errors that can occur during CLI operations
#[derive(Debug, Error)]
pub enum CliError {
    #[error("Configuration error: {0}")]
    Config(#[from] crate::ConfigError),

    #[error("Parse error: {0}")]
    Parse(crate::ParseError),

    #[error("Compile error: {0}")]
    Compile(#[from] crate::CompileError),

    #[error("Invalid formula: {0}")]
    Invalid(String),

    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("No formula provided. Pass it as an argument or pipe it to stdin.")]
    NoInput,

    #[error("Unknown function: '{0}'\nRun 'formula functions' to see available functions.")]
    UnknownFunction(String),

    #[error("Unknown category: '{0}'\nRun 'formula docs' to see available categories.")]
    UnknownCategory(String),
}

/// Builds an engine from an optional TOML config file.
pub fn load_engine(config: Option<&Path>) -> Result<FormulaEngine, CliError> {
    let config = match config {
        Some(path) => FormulaConfig::load(path)?,
        None => FormulaConfig::default(),
    };
    Ok(FormulaEngine::new(config)?)
}

/// Reads a JSON array of `{name, type, aggregatable}` field descriptions.
pub fn load_fields(path: &Path) -> Result<ValidationContext, CliError> {
    let text = std::fs::read_to_string(path)?;
    let fields: Vec<FieldSpec> = serde_json::from_str(&text)?;
    Ok(ValidationContext::with_fields(fields))
}

/// Serializes command output as JSON.
pub fn to_json<T: serde::Serialize>(value: &T, pretty: bool) -> Result<String, CliError> {
    let json = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    Ok(json)
}
