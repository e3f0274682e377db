// tests/integration_tests.rs
//
// End-to-end: text in, validation result and query document out.

use formula_lang::ast::{BinaryOperator, LiteralValue, NodeKind};
use formula_lang::validator::{FieldSpec, IssueKind, Severity, ValidationContext};
use formula_lang::{BuildOptions, FormulaConfig, FormulaEngine, FunctionRegistry};
use pretty_assertions::assert_eq;
use serde_json::json;

fn engine() -> FormulaEngine {
    FormulaEngine::new(FormulaConfig::default()).unwrap()
}

// ============================================================================
// Scenarios
// ============================================================================

#[test]
fn test_sum_of_field() {
    let engine = engine();
    let outcome = engine.parse("sum(bytes)");
    assert!(outcome.success);
    let ast = outcome.ast.unwrap();

    match &ast.kind {
        NodeKind::FunctionCall {
            name,
            positional_args,
            named_args,
        } => {
            assert_eq!(name, "sum");
            assert_eq!(
                positional_args[0].kind,
                NodeKind::FieldRef {
                    field: "bytes".into()
                }
            );
            assert!(named_args.is_empty());
        }
        other => panic!("Expected function call, got {:?}", other),
    }

    assert!(engine.validate(&ast, None).valid);
}

#[test]
fn test_count_ratio_with_shift() {
    let engine = engine();
    let outcome = engine.parse("count() / count(shift='1d')");
    let ast = outcome.ast.unwrap();

    let NodeKind::BinaryOp {
        operator: BinaryOperator::Divide,
        left,
        right,
    } = &ast.kind
    else {
        panic!("Expected division, got {:?}", ast.kind);
    };
    assert_eq!(left.function_name(), Some("count"));
    let NodeKind::FunctionCall { named_args, .. } = &right.kind else {
        panic!("Expected function call");
    };
    assert_eq!(
        named_args["shift"].as_literal(),
        Some(&LiteralValue::String("1d".into()))
    );

    assert!(engine.validate(&ast, None).valid);

    let document = engine
        .build_query(&ast, &BuildOptions::new("logs-*").time_range("now-15m", "now"))
        .unwrap();
    assert_eq!(document.body.aggs.len(), 2);
    assert_eq!(
        document.body.aggs["0-bucket"],
        json!({ "value_count": { "field": "_index" } })
    );
    assert_eq!(
        document.body.aggs["1-bucket"]["aggs"]["value"],
        json!({ "value_count": { "field": "_index" } })
    );
}

#[test]
fn test_unclosed_call() {
    let outcome = engine().parse("sum(");
    assert!(!outcome.success);
    assert!(outcome.ast.is_none());
    let error = outcome.first_error().unwrap();
    assert!(error.message.contains("')'"), "{}", error.message);
    assert_eq!(error.position, 4);
}

#[test]
fn test_unknown_function() {
    let check = engine().validate_formula("totalSum(x)", None);
    assert!(check.parse.success);
    assert!(!check.valid);

    let validation = check.validation.unwrap();
    let error = validation.first_error().unwrap();
    assert_eq!(error.severity, Severity::Error);
    assert_eq!(error.message, "Unknown function 'totalSum'");
    // Every suggestion is within the edit-distance threshold.
    assert!(error.suggestions.len() <= 3);
    assert!(!error.suggestions.contains(&"sum".to_string()));
}

#[test]
fn test_deep_nesting() {
    let formula = format!("{}bytes{}", "abs(".repeat(25), ")".repeat(25));
    let check = engine().validate_formula(&formula, None);
    assert!(check.parse.success);
    assert!(!check.valid);

    let validation = check.validation.unwrap();
    let error = validation.first_error().unwrap();
    assert_eq!(error.kind, IssueKind::Security);
    assert!(error.message.contains("too deeply nested"));
}

#[test]
fn test_repeated_subexpression() {
    let check = engine().validate_formula(
        "average(bytes) + average(bytes) + average(bytes)",
        None,
    );
    assert!(check.valid);
    let validation = check.validation.unwrap();
    let info = validation.infos().next().unwrap();
    assert_eq!(info.kind, IssueKind::Performance);
    assert!(info.message.contains("average(bytes)"));
}

// ============================================================================
// Pipeline
// ============================================================================

#[test]
fn test_validate_then_compile_with_schema() {
    let engine = engine();
    let context = ValidationContext::with_fields(vec![
        FieldSpec::new("bytes", "long"),
        FieldSpec::new("response.status", "integer"),
    ]);
    let formula = "sum(bytes, kql='response.status >= 500') / sum(bytes)";

    let check = engine.validate_formula(formula, Some(&context));
    assert!(check.valid, "{:?}", check.validation);

    let ast = check.parse.ast.unwrap();
    let document = engine.build_query(&ast, &BuildOptions::new("logs-*")).unwrap();
    assert_eq!(
        document.body.aggs["0-bucket"],
        json!({
            "filter": { "range": { "response.status": { "gte": "500" } } },
            "aggs": { "value": { "sum": { "field": "bytes" } } }
        })
    );
    assert_eq!(document.body.aggs["1-bucket"], json!({ "sum": { "field": "bytes" } }));
}

#[test]
fn test_check_serializes() {
    let check = engine().validate_formula("sum(bytes) +", None);
    let json = serde_json::to_value(&check).unwrap();
    assert_eq!(json["valid"], false);
    assert_eq!(json["parse"]["success"], false);
    assert_eq!(json["parse"]["errors"][0]["position"], 12);
    assert!(json["validation"].is_null());
}

#[test]
fn test_ast_serializes_with_type_tags() {
    let ast = engine().parse("sum(bytes) * 2").ast.unwrap();
    let json = serde_json::to_value(ast.as_ref()).unwrap();
    assert_eq!(json["type"], "BinaryOp");
    assert_eq!(json["operator"], "multiply");
    assert_eq!(json["left"]["type"], "FunctionCall");
    assert_eq!(json["left"]["positional_args"][0]["field"], "bytes");
    assert_eq!(json["right"]["value"], 2.0);
}

#[test]
fn test_custom_registry() {
    let registry = FunctionRegistry::from_json(
        r#"{
            "p99": {
                "kind": "aggregation",
                "args": [{ "name": "field", "type": "STRING" }],
                "returns": "NUMBER"
            }
        }"#,
    )
    .unwrap();
    let engine = FormulaEngine::with_registry(FormulaConfig::default(), registry).unwrap();

    assert!(engine.validate_formula("p99(latency)", None).valid);

    let check = engine.validate_formula("sum(latency)", None);
    assert_eq!(
        check.validation.unwrap().first_error().unwrap().message,
        "Unknown function 'sum'"
    );
}

#[test]
fn test_invalid_config_pattern() {
    let result = FormulaConfig::from_toml_str("[security]\nforbidden_patterns = ['(unclosed']");
    assert!(result.is_err());
}

#[test]
fn test_engine_validation_never_panics_on_garbage() {
    let engine = engine();
    for input in ["", ")))", "'", "1 +* 2", "sum(((", "\u{0}", "@@@", "a.b.c(", "not not not"] {
        let check = engine.validate_formula(input, None);
        let validated = check.validation.as_ref().is_some_and(|v| v.valid);
        assert_eq!(check.valid, check.parse.success && validated, "Failed for input: {:?}", input);
    }
}
