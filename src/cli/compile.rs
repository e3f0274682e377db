//! Compile formulas into aggregation queries

use super::CliError;
use crate::{BuildOptions, FormulaEngine, QueryDocument, ValidationContext};

/// Options for the compile command
#[derive(Debug, Clone, Default)]
pub struct CompileOptions {
    pub formula: String,
    pub build: BuildOptions,
    pub context: Option<ValidationContext>,
}

/// Parses, validates and compiles a formula. Fails on the first parse or
/// validation error; warnings do not block compilation.
pub fn execute_compile(engine: &FormulaEngine, options: &CompileOptions) -> Result<QueryDocument, CliError> {
    let formula = options.formula.trim();
    if formula.is_empty() {
        return Err(CliError::NoInput);
    }

    let check = engine.validate_formula(formula, options.context.as_ref());
    if let Some(error) = check.parse.first_error() {
        return Err(CliError::Parse(error.clone()));
    }
    if let Some(error) = check.validation.as_ref().and_then(|v| v.first_error()) {
        return Err(CliError::Invalid(format!(
            "{} (position {})",
            error.message, error.position
        )));
    }

    let ast = check.parse.ast.ok_or(CliError::NoInput)?;
    Ok(engine.build_query(&ast, &options.build)?)
}
