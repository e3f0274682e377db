use super::{IssueKind, PassContext, ValidationIssue};
use crate::ast::{LiteralValue, Node, NodeKind};
use crate::registry::FunctionKind;
use std::collections::HashMap;
use std::hash::{DefaultHasher, Hash, Hasher};

const CALL_COST: u32 = 1;
const AGGREGATION_COST: u32 = 5;
const COLUMN_COST: u32 = 10;
const OPERATOR_COST: u32 = 1;

/// Every distinct subtree seen during the walk, in first-seen order.
#[derive(Default)]
struct Occurrences<'a> {
    order: Vec<u64>,
    seen: HashMap<u64, Occurrence<'a>>,
}

struct Occurrence<'a> {
    node: &'a Node,
    count: usize,
    complexity: u32,
}

pub(crate) fn check(ast: &Node, ctx: &PassContext) -> (Vec<ValidationIssue>, u32) {
    let limits = ctx.performance;
    let mut occurrences = Occurrences::default();
    let mut aggregations = 0;
    let (_, complexity) = score(ast, ctx, &mut occurrences, &mut aggregations);

    let mut issues = Vec::new();

    if complexity > limits.max_complexity {
        issues.push(ValidationIssue::warning(
            IssueKind::Performance,
            format!(
                "Formula complexity {} exceeds the recommended maximum of {}",
                complexity, limits.max_complexity
            ),
            ast.position,
        ));
    }

    if aggregations > limits.max_aggregations {
        issues.push(ValidationIssue::warning(
            IssueKind::Performance,
            format!(
                "Formula uses {} aggregations; more than {} may be slow",
                aggregations, limits.max_aggregations
            ),
            ast.position,
        ));
    }

    for hash in &occurrences.order {
        let occurrence = &occurrences.seen[hash];
        if occurrence.count > limits.repeat_threshold
            && occurrence.complexity > limits.repeat_min_complexity
        {
            let text = occurrence.node.to_string();
            issues.push(
                ValidationIssue::info(
                    IssueKind::Performance,
                    format!(
                        "Expression '{}' appears {} times; consider computing it once",
                        text, occurrence.count
                    ),
                    occurrence.node.position,
                )
                .with_suggestions(vec![text]),
            );
        }
    }

    (issues, complexity)
}

/// Returns the content hash and complexity of `node`, recording every
/// subtree in `occurrences`.
fn score<'a>(
    node: &'a Node,
    ctx: &PassContext,
    occurrences: &mut Occurrences<'a>,
    aggregations: &mut usize,
) -> (u64, u32) {
    let mut hasher = DefaultHasher::new();
    let mut complexity = 0;

    match &node.kind {
        NodeKind::FunctionCall {
            name, named_args, ..
        } => {
            "call".hash(&mut hasher);
            name.hash(&mut hasher);
            named_args.keys().for_each(|key| key.hash(&mut hasher));
            complexity += CALL_COST;
            match ctx.registry.kind(name) {
                Some(FunctionKind::Aggregation) => {
                    complexity += AGGREGATION_COST;
                    *aggregations += 1;
                }
                Some(FunctionKind::Column) => complexity += COLUMN_COST,
                Some(FunctionKind::Math) | None => {}
            }
        }
        NodeKind::BinaryOp { operator, .. } => {
            "binary".hash(&mut hasher);
            operator.hash(&mut hasher);
            complexity += OPERATOR_COST;
        }
        NodeKind::UnaryOp { operator, .. } => {
            "unary".hash(&mut hasher);
            operator.hash(&mut hasher);
        }
        NodeKind::FieldRef { field } => {
            "field".hash(&mut hasher);
            field.hash(&mut hasher);
        }
        NodeKind::Literal { value } => {
            "literal".hash(&mut hasher);
            match value {
                LiteralValue::Number(n) => n.to_bits().hash(&mut hasher),
                LiteralValue::String(s) => s.hash(&mut hasher),
                LiteralValue::Boolean(b) => b.hash(&mut hasher),
            }
        }
    }

    for child in node.children() {
        let (child_hash, child_complexity) = score(child, ctx, occurrences, aggregations);
        child_hash.hash(&mut hasher);
        complexity += child_complexity;
    }

    let hash = hasher.finish();
    let Occurrences { order, seen } = occurrences;
    let entry = seen.entry(hash).or_insert_with(|| {
        order.push(hash);
        Occurrence {
            node,
            count: 0,
            complexity,
        }
    });
    entry.count += 1;

    (hash, complexity)
}
