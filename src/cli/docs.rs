//! Documentation content for the formula CLI

use super::CliError;
use crate::registry::{FunctionKind, FunctionRegistry};

/// Available documentation categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocCategory {
    Syntax,
    Operators,
    Arguments,
    Functions,
}

impl DocCategory {
    /// Parse category name from string
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "syntax" => Some(Self::Syntax),
            "operators" | "ops" => Some(Self::Operators),
            "arguments" | "args" | "named_arguments" => Some(Self::Arguments),
            "functions" | "function" | "fns" => Some(Self::Functions),
            _ => None,
        }
    }
}

/// Get the docs overview (category listing)
pub fn get_docs_overview() -> &'static str {
    r#"FORMULA DOCUMENTATION

Formulas combine aggregations over document fields with arithmetic to
describe one metric, for example the share of failed requests:

  count(kql='status >= 500') / count()

DOCUMENTATION CATEGORIES

  syntax            Fields, literals, function calls and parentheses
  operators         Arithmetic, comparison and logical operators
  arguments         Named arguments, kql filters and time shifts
  functions         The function catalog

QUICK REFERENCE

  sum(bytes)                Aggregate a field
  average(bytes, shift='1d')  Same metric one day earlier
  count(kql='status: 500')  Aggregate a filtered subset
  moving_average(sum(bytes), window=5)  Column function over a metric

Run 'formula docs <category>' for detailed documentation.
Run 'formula functions <name>' for one function.
"#
}

/// Get documentation for a specific category
pub fn get_doc_category(name: &str, registry: &FunctionRegistry) -> Result<String, CliError> {
    match DocCategory::from_name(name) {
        Some(DocCategory::Syntax) => Ok(SYNTAX_DOC.to_string()),
        Some(DocCategory::Operators) => Ok(OPERATORS_DOC.to_string()),
        Some(DocCategory::Arguments) => Ok(ARGUMENTS_DOC.to_string()),
        Some(DocCategory::Functions) => Ok(functions_overview(registry)),
        None => Err(CliError::UnknownCategory(name.to_string())),
    }
}

/// One line per function, grouped by kind.
pub fn functions_overview(registry: &FunctionRegistry) -> String {
    let mut out = String::from("FUNCTIONS\n");
    for (kind, title) in [
        (FunctionKind::Aggregation, "AGGREGATIONS"),
        (FunctionKind::Column, "COLUMN FUNCTIONS"),
        (FunctionKind::Math, "MATH"),
    ] {
        out.push_str(&format!("\n{}\n", title));
        for (name, signature) in registry.iter().filter(|(_, s)| s.kind == kind) {
            out.push_str(&format!("  {:<44}{}\n", signature.usage(name), signature.description));
        }
    }
    out
}

/// Usage, argument types and return type of one function.
pub fn function_reference(registry: &FunctionRegistry, name: &str) -> Result<String, CliError> {
    let signature = registry
        .get(name)
        .ok_or_else(|| CliError::UnknownFunction(name.to_string()))?;

    let kind = match signature.kind {
        FunctionKind::Aggregation => "aggregation",
        FunctionKind::Column => "column function",
        FunctionKind::Math => "math function",
    };

    let mut out = format!("{} ({})\n\n", signature.usage(name), kind);
    if !signature.description.is_empty() {
        out.push_str(&format!("  {}\n\n", signature.description));
    }
    if !signature.args.is_empty() {
        out.push_str("  Arguments:\n");
        for arg in &signature.args {
            let optional = if arg.optional { ", optional" } else { "" };
            out.push_str(&format!("    {:<12}{}{}\n", arg.name, arg.data_type, optional));
        }
    }
    out.push_str(&format!("\n  Returns: {}\n", signature.returns));
    Ok(out)
}

const SYNTAX_DOC: &str = r#"SYNTAX - Building Blocks

FIELDS
  bytes   host.name   @timestamp
    Bare identifiers name document fields. Dots and @ are part of the name.

    Constraints:
      - An identifier directly followed by ( is a function call
      - Field names containing spaces are not supported

LITERALS
  42   3.5   'text'   "text"   true   false

    Strings take single or double quotes. Escapes: \n \t \r \\ \' \"

FUNCTION CALLS
  name(arg, arg, key=value)
    Positional arguments bind to parameters in declaration order. Named
    arguments use = or : and may appear anywhere in the list.

    Example:
      percentile(bytes, percentile=99)
      percentile(bytes, 99)

PARENTHESES
  (sum(a) + sum(b)) / count()
    Parentheses group without adding anything to the formula.
"#;

const OPERATORS_DOC: &str = r#"OPERATORS - Arithmetic, Comparison, and Logical

PRECEDENCE (tightest first)
  -x                Negation
  not x   !x        Logical NOT
  ^                 Power
  *  /  %           Multiplication, division, modulo
  +  -              Addition, subtraction
  >  <  >=  <=      Ordering
  ==  !=            Equality
  and               Logical AND
  or                Logical OR

  Operators of equal precedence associate to the left:
    a - b - c   is   (a - b) - c
    2 ^ 3 ^ 2   is   (2 ^ 3) ^ 2

  Constraints:
    - Arithmetic and ordering operators take numbers
    - and / or / not take booleans
    - == and != take two values of the same type
"#;

const ARGUMENTS_DOC: &str = r#"ARGUMENTS - Filters and Time Shifts

KQL FILTER
  count(kql='status: 500')
    Restricts one aggregation to matching documents. Supported shapes:

      field: value                        Match
      field >= "X" and < "Y"              Range
      anything else                       Free-text query

    Constraints:
      - Must be a string literal
      - Fields named in the filter are checked against the data view

TIME SHIFT
  average(bytes, shift='1w')
    Computes the aggregation over the time range moved back by the offset.

    Units: s m h d w M y, e.g. 30m, 1d, 1M. 'previous' shifts by the length
    of the current range.

    Constraints:
      - Must be a string literal
      - Only aggregations accept kql and shift
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn category_aliases() {
        assert_eq!(DocCategory::from_name("OPS"), Some(DocCategory::Operators));
        assert_eq!(DocCategory::from_name("named-arguments"), Some(DocCategory::Arguments));
        assert_eq!(DocCategory::from_name("tutorial"), None);
    }

    #[test]
    fn reference_lists_arguments() {
        let registry = FunctionRegistry::builtin();
        let text = function_reference(&registry, "percentile").unwrap();
        assert!(text.starts_with("percentile(field, [percentile], [kql], [shift]) (aggregation)"));
        assert!(text.contains("Returns: NUMBER"));
    }

    #[test]
    fn overview_groups_by_kind() {
        let text = functions_overview(&FunctionRegistry::builtin());
        let aggregations = text.find("AGGREGATIONS").unwrap();
        let columns = text.find("COLUMN FUNCTIONS").unwrap();
        let math = text.find("MATH").unwrap();
        assert!(aggregations < columns && columns < math);
        assert!(text[aggregations..columns].contains("\n  sum(field, [kql], [shift])"));
        assert!(text[columns..math].contains("\n  cumulative_sum(metric)"));
    }

    #[test]
    fn unknown_function() {
        let registry = FunctionRegistry::builtin();
        assert!(matches!(
            function_reference(&registry, "summ"),
            Err(CliError::UnknownFunction(_))
        ));
    }
}
