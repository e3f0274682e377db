//! Parse and validate formulas

use super::CliError;
use crate::{FormulaCheck, FormulaEngine, ValidationContext};

/// Options for the check command
#[derive(Debug, Clone, Default)]
pub struct CheckOptions {
    /// The formula to check
    pub formula: String,
    /// Fields of the target data view; enables the schema checks
    pub context: Option<ValidationContext>,
}

/// Execute a formula check
pub fn execute_check(engine: &FormulaEngine, options: &CheckOptions) -> Result<FormulaCheck, CliError> {
    let formula = options.formula.trim();
    if formula.is_empty() {
        return Err(CliError::NoInput);
    }
    Ok(engine.validate_formula(formula, options.context.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::FormulaConfig;

    #[test]
    fn empty_formula_is_rejected() {
        let engine = FormulaEngine::new(FormulaConfig::default()).unwrap();
        let options = CheckOptions {
            formula: "   ".to_string(),
            context: None,
        };
        assert!(matches!(execute_check(&engine, &options), Err(CliError::NoInput)));
    }

    #[test]
    fn reports_validation_errors() {
        let engine = FormulaEngine::new(FormulaConfig::default()).unwrap();
        let options = CheckOptions {
            formula: "summ(bytes)".to_string(),
            context: None,
        };
        let check = execute_check(&engine, &options).unwrap();
        assert!(!check.valid);
        assert!(check.parse.success);
    }
}
