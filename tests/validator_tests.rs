// tests/validator_tests.rs

use formula_lang::ast::{Node, NodeKind};
use formula_lang::validator::{
    FieldSpec, IssueKind, Severity, ValidationContext, ValidationResult, Validator,
};
use formula_lang::{FormulaConfig, FunctionRegistry, parse};
use pretty_assertions::assert_eq;
use std::collections::BTreeMap;
use std::sync::Arc;

fn validator_with(config: &FormulaConfig) -> Validator {
    Validator::new(Arc::new(FunctionRegistry::builtin()), config).unwrap()
}

fn validate_with(config: &FormulaConfig, input: &str, context: Option<&ValidationContext>) -> ValidationResult {
    let outcome = parse(input);
    let ast = outcome
        .ast
        .unwrap_or_else(|| panic!("Failed to parse {}: {:?}", input, outcome.errors));
    validator_with(config).validate(&ast, context)
}

fn validate(input: &str) -> ValidationResult {
    validate_with(&FormulaConfig::default(), input, None)
}

fn validate_in(input: &str, context: &ValidationContext) -> ValidationResult {
    validate_with(&FormulaConfig::default(), input, Some(context))
}

fn messages(result: &ValidationResult, severity: Severity) -> Vec<String> {
    result
        .results
        .iter()
        .filter(|r| r.severity == severity)
        .map(|r| r.message.clone())
        .collect()
}

fn data_view() -> ValidationContext {
    ValidationContext::with_fields(vec![
        FieldSpec::new("bytes", "long"),
        FieldSpec::new("@timestamp", "date"),
        FieldSpec::new("host.name", "keyword").not_aggregatable(),
        FieldSpec::new("response.status", "integer"),
    ])
}

fn nested_calls(depth: usize) -> String {
    format!("{}1{}", "abs(".repeat(depth), ")".repeat(depth))
}

// ============================================================================
// Valid formulas
// ============================================================================

#[test]
fn test_simple_aggregation_is_valid() {
    let result = validate("sum(bytes)");
    assert!(result.valid, "{:?}", result.results);
    assert!(result.results.is_empty());
    assert_eq!(result.complexity, 6);
}

#[test]
fn test_shifted_ratio_is_valid() {
    let result = validate("count() / count(shift='1d')");
    assert!(result.valid, "{:?}", result.results);
    assert_eq!(result.complexity, 13);
}

#[test]
fn test_valid_formulas() {
    let formulas = vec![
        "1 + 2 * 3",
        "percentile(bytes, 99) - median(bytes)",
        "percentile(bytes, percentile=99, kql='status: 500')",
        "percentile_rank(bytes, value=1024)",
        "ifelse(sum(bytes) > 1000, 1, 0)",
        "moving_average(average(bytes), window=5)",
        "clamp(average(bytes), 0, 100)",
        "round(last_value(bytes), 2)",
        "defaults(unique_count(host.name), 0)",
        "count(shift='previous')",
        "not (count() > 5 and count() < 10)",
        "-sum(bytes) % 7",
    ];
    for formula in formulas {
        let result = validate(formula);
        assert!(result.valid, "Expected {} to be valid: {:?}", formula, result.results);
    }
}

// ============================================================================
// Security pass
// ============================================================================

#[test]
fn test_deep_nesting_is_rejected() {
    let result = validate(&nested_calls(25));
    assert!(!result.valid);
    assert_eq!(result.results.len(), 1);

    let issue = &result.results[0];
    assert_eq!(issue.severity, Severity::Error);
    assert_eq!(issue.kind, IssueKind::Security);
    assert!(issue.message.contains("too deeply nested"), "{}", issue.message);
    assert_eq!(result.complexity, 0);
}

#[test]
fn test_depth_at_limit_is_accepted() {
    // 20 calls around a literal: exactly the maximum.
    assert!(validate(&nested_calls(20)).valid);

    let result = validate(&nested_calls(21));
    assert!(!result.valid);
    assert_eq!(
        result.results[0].message,
        "Formula is too deeply nested (depth 21, maximum 20)"
    );
}

#[test]
fn test_deep_operator_nesting_is_rejected() {
    let formula = format!("{}1{}", "(1 + ".repeat(25), ")".repeat(25));
    let result = validate(&formula);
    assert_eq!(result.results[0].kind, IssueKind::Security);
    assert!(result.results[0].message.contains("too deeply nested"));
}

#[test]
fn test_forbidden_patterns() {
    let result = validate("count(kql='<SCRIPT>alert(1)</script>')");
    assert!(!result.valid);
    assert_eq!(
        messages(&result, Severity::Error),
        vec!["String contains a forbidden pattern"]
    );
    assert_eq!(result.results[0].position, 10);
}

#[test]
fn test_security_errors_skip_later_passes() {
    // `summ` would be reported by the syntax pass.
    let result = validate("summ(kql='${env}')");
    assert_eq!(result.results.len(), 1);
    assert_eq!(result.results[0].kind, IssueKind::Security);
}

#[test]
fn test_function_call_cap() {
    let config = FormulaConfig::from_toml_str("[security]\nmax_function_calls = 3").unwrap();
    let result = validate_with(&config, "sum(a) + sum(b) + sum(c) + sum(d)", None);
    assert!(!result.valid);
    assert_eq!(
        messages(&result, Severity::Error),
        vec!["Formula contains too many function calls (4, maximum 3)"]
    );
}

#[test]
fn test_serialized_size_cap() {
    let config = FormulaConfig::from_toml_str("[security]\nmax_serialized_length = 50").unwrap();
    let result = validate_with(&config, "sum(bytes) + sum(bytes)", None);
    assert!(!result.valid);
    assert!(result.results[0].message.starts_with("Formula is too large"));
}

// ============================================================================
// Syntax pass
// ============================================================================

#[test]
fn test_unknown_function() {
    let result = validate("totalSum(x)");
    assert!(!result.valid);
    let issue = result.first_error().unwrap();
    assert_eq!(issue.message, "Unknown function 'totalSum'");
    assert_eq!(issue.position, 0);
}

#[test]
fn test_unknown_function_suggestions() {
    let result = validate("summ(bytes)");
    let issue = result.first_error().unwrap();
    assert_eq!(issue.message, "Unknown function 'summ'");
    assert_eq!(issue.suggestions.first().map(String::as_str), Some("sum"));
    assert!(issue.suggestions.len() <= 3);

    let result = validate("avrage(bytes)");
    assert!(result.first_error().unwrap().suggestions.contains(&"average".to_string()));
}

#[test]
fn test_missing_required_argument() {
    let result = validate("sum()");
    assert_eq!(
        messages(&result, Severity::Error),
        vec!["Missing required argument 'field' for function 'sum'; usage: sum(field, [kql], [shift])"]
    );
}

#[test]
fn test_required_argument_by_name() {
    assert!(validate("percentile_rank(bytes, value=10)").valid);
    assert!(!validate("percentile_rank(bytes)").valid);
}

#[test]
fn test_too_many_positional_arguments() {
    let result = validate("abs(1, 2)");
    let issue = result.first_error().unwrap();
    assert_eq!(issue.kind, IssueKind::Syntax);
    assert_eq!(
        issue.message,
        "Function 'abs' accepts at most 1 positional argument(s), got 2"
    );
    assert_eq!(issue.position, 7);
}

#[test]
fn test_unknown_named_argument() {
    let result = validate("moving_average(sum(bytes), windw=3)");
    let issue = result.first_error().unwrap();
    assert_eq!(issue.message, "Unknown argument 'windw' for function 'moving_average'");
    assert_eq!(issue.suggestions, vec!["window"]);
}

#[test]
fn test_argument_bound_twice() {
    let result = validate("percentile(bytes, 90, percentile=95)");
    assert_eq!(
        messages(&result, Severity::Error),
        vec!["Argument 'percentile' of 'percentile' is given both by position and by name"]
    );
}

#[test]
fn test_kql_must_be_string_literal() {
    let result = validate("count(kql=status)");
    assert!(messages(&result, Severity::Error).contains(&"Argument 'kql' must be a string literal".to_string()));
}

#[test]
fn test_invalid_shift() {
    let result = validate("average(bytes, shift='yesterday')");
    assert!(!result.valid);
    let issue = result.first_error().unwrap();
    assert_eq!(issue.kind, IssueKind::Syntax);
    assert!(issue.message.starts_with("Invalid time shift 'yesterday'"));
}

#[test]
fn test_field_with_spaces_warns() {
    // The lexer never produces such a field; trees built elsewhere can.
    let ast = Node::new(
        NodeKind::FunctionCall {
            name: "sum".into(),
            positional_args: vec![Node::new(
                NodeKind::FieldRef {
                    field: "total bytes".into(),
                },
                4,
                11,
            )],
            named_args: BTreeMap::new(),
        },
        0,
        16,
    );
    let result = validator_with(&FormulaConfig::default()).validate(&ast, None);
    assert!(result.valid);
    assert_eq!(
        messages(&result, Severity::Warning),
        vec!["Field name 'total bytes' contains spaces"]
    );
}

// ============================================================================
// Type pass
// ============================================================================

#[test]
fn test_arithmetic_requires_numbers() {
    let result = validate("sum(bytes) + 'a'");
    assert_eq!(
        messages(&result, Severity::Error),
        vec!["Operator '+' cannot be applied to NUMBER and STRING"]
    );
    assert_eq!(result.first_error().unwrap().kind, IssueKind::Type);
}

#[test]
fn test_logical_requires_booleans() {
    let result = validate("count() and true");
    assert_eq!(
        messages(&result, Severity::Error),
        vec!["Operator 'and' cannot be applied to NUMBER and BOOLEAN"]
    );
}

#[test]
fn test_equality_accepts_matching_types() {
    assert!(validate("count() == 1").valid);
    assert!(validate("'a' != 'b'").valid);
    assert!(!validate("count() == 'a'").valid);
}

#[test]
fn test_unary_operand_types() {
    assert_eq!(
        messages(&validate("not count()"), Severity::Error),
        vec!["Operator 'not' expects BOOLEAN, got NUMBER"]
    );
    assert_eq!(
        messages(&validate("-true"), Severity::Error),
        vec!["Operator '-' expects NUMBER, got BOOLEAN"]
    );
}

#[test]
fn test_argument_types() {
    let result = validate("abs('x')");
    let issue = result.first_error().unwrap();
    assert_eq!(issue.message, "Argument 'value' of 'abs' expects NUMBER, got STRING");
    assert_eq!(issue.position, 4);

    let result = validate("ifelse(1, 2, 3)");
    assert_eq!(
        messages(&result, Severity::Error),
        vec!["Argument 'condition' of 'ifelse' expects BOOLEAN, got NUMBER"]
    );
}

#[test]
fn test_field_without_schema_is_a_name() {
    // Without a data view a bare field is only good as a field name.
    assert!(validate("sum(bytes)").valid);
    assert!(!validate("bytes + 1").valid);
}

#[test]
fn test_schema_types_fields() {
    let view = data_view();
    assert!(validate_in("bytes + 1", &view).valid);
    assert_eq!(
        messages(&validate_in("average(bytes) > @timestamp", &view), Severity::Error),
        vec!["Operator '>' cannot be applied to NUMBER and DATE"]
    );
}

// ============================================================================
// Performance pass
// ============================================================================

#[test]
fn test_repeated_subexpression() {
    let result = validate("average(bytes) + average(bytes) + average(bytes)");
    assert!(result.valid);
    assert_eq!(result.complexity, 20);

    let infos: Vec<_> = result.infos().collect();
    assert_eq!(infos.len(), 1);
    assert_eq!(infos[0].kind, IssueKind::Performance);
    assert_eq!(
        infos[0].message,
        "Expression 'average(bytes)' appears 3 times; consider computing it once"
    );
    assert_eq!(infos[0].suggestions, vec!["average(bytes)"]);
}

#[test]
fn test_two_repeats_are_fine() {
    let result = validate("average(bytes) + average(bytes)");
    assert_eq!(result.infos().count(), 0);
}

#[test]
fn test_cheap_repeats_are_fine() {
    let result = validate("abs(1) + abs(1) + abs(1)");
    assert_eq!(result.infos().count(), 0);
}

#[test]
fn test_column_function_cost() {
    assert_eq!(validate("moving_average(sum(bytes))").complexity, 17);
}

#[test]
fn test_complexity_ceiling_warns() {
    let config = FormulaConfig::from_toml_str("[performance]\nmax_complexity = 10").unwrap();
    let result = validate_with(&config, "sum(a) + sum(b)", None);
    assert!(result.valid);
    assert_eq!(
        messages(&result, Severity::Warning),
        vec!["Formula complexity 13 exceeds the recommended maximum of 10"]
    );
}

#[test]
fn test_aggregation_count_warns() {
    let formula = vec!["count()"; 11].join(" + ");
    let result = validate(&formula);
    assert!(result.valid);
    assert_eq!(
        messages(&result, Severity::Warning),
        vec!["Formula uses 11 aggregations; more than 10 may be slow"]
    );
}

// ============================================================================
// Schema pass
// ============================================================================

#[test]
fn test_unknown_field() {
    let result = validate_in("sum(byte)", &data_view());
    assert!(!result.valid);
    let issue = result.first_error().unwrap();
    assert_eq!(issue.kind, IssueKind::Schema);
    assert_eq!(issue.message, "Unknown field 'byte'");
    assert_eq!(issue.suggestions, vec!["bytes"]);
}

#[test]
fn test_known_fields() {
    let result = validate_in("sum(bytes) / count(kql='response.status: 500')", &data_view());
    assert!(result.valid, "{:?}", result.results);
    assert!(result.results.is_empty());
}

#[test]
fn test_non_aggregatable_field_warns() {
    let result = validate_in("unique_count(host.name)", &data_view());
    assert!(result.valid);
    assert_eq!(
        messages(&result, Severity::Warning),
        vec!["Field 'host.name' is not aggregatable"]
    );
}

#[test]
fn test_kql_fields_are_checked() {
    let result = validate_in("count(kql='status: 500 and host.name: web')", &data_view());
    assert_eq!(
        messages(&result, Severity::Error),
        vec!["Unknown field 'status' in kql filter"]
    );
}

#[test]
fn test_kql_timestamp_values_are_not_fields() {
    let result = validate_in(
        "count(kql='@timestamp >= 2024-01-01T10:00:00 and host.name: web')",
        &data_view(),
    );
    assert!(result.valid, "{:?}", result.results);
    assert!(messages(&result, Severity::Error).is_empty());
}

#[test]
fn test_no_schema_no_field_checks() {
    assert!(validate("sum(anything_at_all)").valid);
}

// ============================================================================
// Result shape
// ============================================================================

#[test]
fn test_result_serialization() {
    let result = validate("summ(bytes)");
    let json = serde_json::to_value(&result).unwrap();
    assert_eq!(json["valid"], false);
    assert_eq!(json["results"][0]["severity"], "error");
    assert_eq!(json["results"][0]["kind"], "schema");
    assert_eq!(json["results"][0]["suggestions"][0], "sum");
    assert!(json["validation_time_ms"].is_number());
}

#[test]
fn test_fields_deserialize_with_default_aggregatable() {
    let context: ValidationContext =
        serde_json::from_str(r#"{"fields": [{"name": "bytes", "type": "long"}]}"#).unwrap();
    let fields = context.fields.unwrap();
    assert!(fields[0].aggregatable);
}
