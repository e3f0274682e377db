use super::{IssueKind, PassContext, ValidationIssue, suggest};
use crate::ast::{Node, NodeKind};
use regex::Regex;
use std::sync::LazyLock;

static SHIFT_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+[smhdwMy]$").expect("shift pattern compiles"));

/// `true` for offsets such as `30m`, `1d`, `2w` and for `previous`.
pub fn is_valid_shift(shift: &str) -> bool {
    shift == "previous" || SHIFT_PATTERN.is_match(shift)
}

pub(crate) fn check(ast: &Node, ctx: &PassContext) -> Vec<ValidationIssue> {
    let mut issues = Vec::new();
    ast.walk(&mut |node| match &node.kind {
        NodeKind::FunctionCall {
            name,
            positional_args,
            named_args,
        } => check_call(node, name, positional_args, named_args, ctx, &mut issues),
        NodeKind::FieldRef { field } if field.contains(' ') => {
            issues.push(ValidationIssue::warning(
                IssueKind::Syntax,
                format!("Field name '{}' contains spaces", field),
                node.position,
            ));
        }
        // Operators are a closed enum, so every operator node is well formed.
        _ => {}
    });
    issues
}

fn check_call(
    node: &Node,
    name: &str,
    positional_args: &[Node],
    named_args: &std::collections::BTreeMap<String, Node>,
    ctx: &PassContext,
    issues: &mut Vec<ValidationIssue>,
) {
    let Some(signature) = ctx.registry.get(name) else {
        issues.push(
            ValidationIssue::error(
                IssueKind::Schema,
                format!("Unknown function '{}'", name),
                node.position,
            )
            .with_suggestions(suggest(name, ctx.registry.names())),
        );
        return;
    };

    let params: Vec<_> = signature.positional_params().collect();
    if positional_args.len() > params.len() {
        issues.push(ValidationIssue::error(
            IssueKind::Syntax,
            format!(
                "Function '{}' accepts at most {} positional argument(s), got {}",
                name,
                params.len(),
                positional_args.len()
            ),
            positional_args[params.len()].position,
        ));
    }

    for (key, value) in named_args {
        match signature.arg(key) {
            None => {
                let known = signature.args.iter().map(|a| a.name.as_str());
                issues.push(
                    ValidationIssue::error(
                        IssueKind::Syntax,
                        format!("Unknown argument '{}' for function '{}'", key, name),
                        value.position,
                    )
                    .with_suggestions(suggest(key, known)),
                );
            }
            Some(_) => {
                let bound_by_position = params
                    .iter()
                    .take(positional_args.len())
                    .any(|p| p.name == *key);
                if bound_by_position {
                    issues.push(ValidationIssue::error(
                        IssueKind::Syntax,
                        format!(
                            "Argument '{}' of '{}' is given both by position and by name",
                            key, name
                        ),
                        value.position,
                    ));
                }
            }
        }
    }

    for arg in signature.args.iter().filter(|a| !a.optional) {
        let by_position = params
            .iter()
            .take(positional_args.len())
            .any(|p| p.name == arg.name);
        if !by_position && !named_args.contains_key(&arg.name) {
            issues.push(ValidationIssue::error(
                IssueKind::Syntax,
                format!(
                    "Missing required argument '{}' for function '{}'; usage: {}",
                    arg.name,
                    name,
                    signature.usage(name)
                ),
                node.position,
            ));
        }
    }

    for key in ["kql", "shift"] {
        let Some(value) = named_args.get(key) else {
            continue;
        };
        match value.as_literal().and_then(|l| l.as_str()) {
            None => issues.push(ValidationIssue::error(
                IssueKind::Syntax,
                format!("Argument '{}' must be a string literal", key),
                value.position,
            )),
            Some(shift) if key == "shift" && !is_valid_shift(shift) => {
                issues.push(ValidationIssue::error(
                    IssueKind::Syntax,
                    format!(
                        "Invalid time shift '{}'; expected a duration such as '1h', '1d' or 'previous'",
                        shift
                    ),
                    value.position,
                ));
            }
            Some(_) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shift_formats() {
        assert!(is_valid_shift("1d"));
        assert!(is_valid_shift("30m"));
        assert!(is_valid_shift("2M"));
        assert!(is_valid_shift("previous"));
        assert!(!is_valid_shift("1x"));
        assert!(!is_valid_shift("d"));
        assert!(!is_valid_shift("-1d"));
    }
}
