use super::{IssueKind, PassContext, ValidationIssue, suggest};
use crate::ast::{Node, NodeKind};
use regex::Regex;
use std::sync::LazyLock;

static QUOTED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'"#).expect("quote pattern compiles"));

static FIELD_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[\s(])([A-Za-z_@][\w.@]*)\s*:").expect("field pattern compiles"));

/// Field names referenced as `field:` in a KQL snippet. A name must start a
/// token, and quoted text is ignored, so `message: "http://host"` yields
/// only `message`.
pub fn kql_field_references(kql: &str) -> Vec<String> {
    let unquoted = QUOTED.replace_all(kql, "\"\"");
    FIELD_PREFIX
        .captures_iter(&unquoted)
        .map(|c| c[1].to_string())
        .collect()
}

pub(crate) fn check(ast: &Node, ctx: &PassContext) -> Vec<ValidationIssue> {
    let Some(fields) = &ctx.fields else {
        return Vec::new();
    };
    let known = || fields.keys().copied();

    let mut issues = Vec::new();
    ast.walk(&mut |node| match &node.kind {
        NodeKind::FieldRef { field } if !fields.contains_key(field.as_str()) => {
            issues.push(
                ValidationIssue::error(
                    IssueKind::Schema,
                    format!("Unknown field '{}'", field),
                    node.position,
                )
                .with_suggestions(suggest(field, known())),
            );
        }
        NodeKind::FunctionCall {
            name,
            positional_args,
            named_args,
        } => {
            if ctx.registry.is_aggregatable(name)
                && let Some(field) = positional_args.first().and_then(Node::as_field)
                && let Some(spec) = fields.get(field)
                && !spec.aggregatable
            {
                issues.push(ValidationIssue::warning(
                    IssueKind::Schema,
                    format!("Field '{}' is not aggregatable", field),
                    positional_args[0].position,
                ));
            }

            if let Some(kql) = named_args.get("kql")
                && let Some(text) = kql.as_literal().and_then(|l| l.as_str())
            {
                for field in kql_field_references(text) {
                    if !fields.contains_key(field.as_str()) {
                        issues.push(
                            ValidationIssue::error(
                                IssueKind::Schema,
                                format!("Unknown field '{}' in kql filter", field),
                                kql.position,
                            )
                            .with_suggestions(suggest(&field, known())),
                        );
                    }
                }
            }
        }
        _ => {}
    });
    issues
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_field_prefixes() {
        assert_eq!(
            kql_field_references("status: 500 and host.name:web-1"),
            vec!["status", "host.name"]
        );
    }

    #[test]
    fn ignores_quoted_text() {
        assert_eq!(
            kql_field_references(r#"message: "see http://example.com""#),
            vec!["message"]
        );
    }

    #[test]
    fn ignores_colons_inside_values() {
        assert_eq!(
            kql_field_references("@timestamp >= 2024-01-01T10:00:00 and (not status:500)"),
            vec!["status"]
        );
    }
}
