use super::{IssueKind, PassContext, ValidationIssue};
use crate::ast::{BinaryOperator, DataType, Node, NodeKind, UnaryOperator};
use std::collections::HashMap;

/// Inferred type per node, keyed by node address. Valid only while the tree
/// it was built from is borrowed.
struct TypeTable(HashMap<usize, DataType>);

impl TypeTable {
    fn get(&self, node: &Node) -> DataType {
        self.0
            .get(&address(node))
            .copied()
            .unwrap_or(DataType::Any)
    }
}

fn address(node: &Node) -> usize {
    std::ptr::from_ref(node) as usize
}

pub(crate) fn check(ast: &Node, ctx: &PassContext) -> Vec<ValidationIssue> {
    let mut table = TypeTable(HashMap::new());
    infer(ast, ctx, &mut table);

    let mut issues = Vec::new();
    ast.walk(&mut |node| check_node(node, ctx, &table, &mut issues));
    issues
}

/// Post-order type assignment.
fn infer(node: &Node, ctx: &PassContext, table: &mut TypeTable) -> DataType {
    for child in node.children() {
        infer(child, ctx, table);
    }

    let data_type = match &node.kind {
        NodeKind::Literal { value } => value.data_type(),
        NodeKind::FieldRef { field } => match &ctx.fields {
            // Unknown fields are reported by the schema pass; don't cascade.
            Some(fields) => fields.get(field.as_str()).map_or(DataType::Any, |f| f.data_type()),
            None => DataType::String,
        },
        NodeKind::FunctionCall { name, .. } => ctx
            .registry
            .get(name)
            .map_or(DataType::Any, |signature| signature.returns),
        NodeKind::BinaryOp { operator, .. } => {
            if operator.is_arithmetic() {
                DataType::Number
            } else {
                DataType::Boolean
            }
        }
        NodeKind::UnaryOp { operator, operand } => match operator {
            UnaryOperator::Not => DataType::Boolean,
            UnaryOperator::Minus => table.get(operand),
        },
    };

    table.0.insert(address(node), data_type);
    data_type
}

fn check_node(node: &Node, ctx: &PassContext, table: &TypeTable, issues: &mut Vec<ValidationIssue>) {
    match &node.kind {
        NodeKind::BinaryOp {
            operator,
            left,
            right,
        } => {
            let (lt, rt) = (table.get(left), table.get(right));
            if !operands_compatible(*operator, lt, rt) {
                issues.push(ValidationIssue::error(
                    IssueKind::Type,
                    format!(
                        "Operator '{}' cannot be applied to {} and {}",
                        operator, lt, rt
                    ),
                    node.position,
                ));
            }
        }
        NodeKind::UnaryOp { operator, operand } => {
            let actual = table.get(operand);
            let expected = match operator {
                UnaryOperator::Not => DataType::Boolean,
                UnaryOperator::Minus => DataType::Number,
            };
            if !actual.is_compatible_with(expected) {
                issues.push(ValidationIssue::error(
                    IssueKind::Type,
                    format!("Operator '{}' expects {}, got {}", operator, expected, actual),
                    node.position,
                ));
            }
        }
        NodeKind::FunctionCall {
            name,
            positional_args,
            named_args,
        } => {
            let Some(signature) = ctx.registry.get(name) else {
                return;
            };
            let bound = signature
                .positional_params()
                .zip(positional_args.iter())
                .chain(
                    named_args
                        .iter()
                        .filter_map(|(key, arg)| signature.arg(key).map(|spec| (spec, arg))),
                );

            for (spec, arg) in bound {
                let actual = table.get(arg);
                // A bare field stands in for its name wherever a string is expected.
                let field_as_name = spec.data_type == DataType::String && arg.as_field().is_some();
                if !field_as_name && !actual.is_compatible_with(spec.data_type) {
                    issues.push(ValidationIssue::error(
                        IssueKind::Type,
                        format!(
                            "Argument '{}' of '{}' expects {}, got {}",
                            spec.name, name, spec.data_type, actual
                        ),
                        arg.position,
                    ));
                }
            }
        }
        NodeKind::FieldRef { .. } | NodeKind::Literal { .. } => {}
    }
}

fn operands_compatible(operator: BinaryOperator, left: DataType, right: DataType) -> bool {
    if operator.is_arithmetic() || operator.is_ordering() {
        left.is_compatible_with(DataType::Number) && right.is_compatible_with(DataType::Number)
    } else if operator.is_equality() {
        left.is_compatible_with(right) || right.is_compatible_with(left)
    } else {
        left.is_compatible_with(DataType::Boolean) && right.is_compatible_with(DataType::Boolean)
    }
}
