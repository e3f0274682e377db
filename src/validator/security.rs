use super::{IssueKind, PassContext, ValidationIssue, ValidatorFault};
use crate::ast::{LiteralValue, Node, NodeKind};

pub(crate) fn check(ast: &Node, ctx: &PassContext) -> Result<Vec<ValidationIssue>, ValidatorFault> {
    let limits = ctx.security;
    let mut issues = Vec::new();

    let depth = ast.depth();
    if depth > limits.max_depth {
        issues.push(ValidationIssue::error(
            IssueKind::Security,
            format!(
                "Formula is too deeply nested (depth {}, maximum {})",
                depth, limits.max_depth
            ),
            ast.position,
        ));
        // Anything deeper is not worth serializing or scanning.
        return Ok(issues);
    }

    let mut calls = 0;
    let mut strings = Vec::new();
    ast.walk(&mut |node| match &node.kind {
        NodeKind::FunctionCall { .. } => calls += 1,
        NodeKind::Literal {
            value: LiteralValue::String(s),
        } => strings.push((s.as_str(), node.position)),
        _ => {}
    });

    if calls > limits.max_function_calls {
        issues.push(ValidationIssue::error(
            IssueKind::Security,
            format!(
                "Formula contains too many function calls ({}, maximum {})",
                calls, limits.max_function_calls
            ),
            ast.position,
        ));
    }

    let size = serde_json::to_string(ast)?.len();
    if size > limits.max_serialized_length {
        issues.push(ValidationIssue::error(
            IssueKind::Security,
            format!(
                "Formula is too large ({} characters serialized, maximum {})",
                size, limits.max_serialized_length
            ),
            ast.position,
        ));
    }

    for (text, position) in strings {
        if ctx.forbidden.is_match(text) {
            issues.push(ValidationIssue::error(
                IssueKind::Security,
                "String contains a forbidden pattern",
                position,
            ));
        }
    }

    Ok(issues)
}
