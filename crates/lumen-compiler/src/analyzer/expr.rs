//! Expression analysis and constant folding.

use lumen_core::{CompileError, ValueType};
use lumen_syntax::{BinaryOp, Literal, Node, NodeKind, UnaryOp, VarId};

use super::Analyzer;
use crate::scope::UsageType;

impl Analyzer {
    /// Analyze a compound expression. Operands are analyzed first; the node
    /// may be replaced by a folded literal.
    pub(super) fn expression(&mut self, node: &mut Node) -> Result<(), CompileError> {
        let mut folded = None;
        let ty = match &mut node.kind {
            NodeKind::Call { target, args } => {
                self.analyze(target)?;
                let mut arg_types = Vec::with_capacity(args.len());
                for arg in args.iter_mut() {
                    self.analyze(arg)?;
                    arg_types.push(arg.ty);
                }
                if let Some(var) = self.non_global(target) {
                    self.table.add_usage(var, UsageType::Function(arg_types));
                }
                ValueType::Any
            }
            NodeKind::MemberAccess { target, .. } => {
                self.analyze(target)?;
                ValueType::Any
            }
            NodeKind::Binary { op, lhs, rhs } => {
                self.analyze(lhs)?;
                self.analyze(rhs)?;
                if op.is_arithmetic() {
                    self.numeric_usage(lhs);
                    self.numeric_usage(rhs);
                }
                folded = fold_binary(*op, lhs, rhs);
                binary_type(*op, lhs.ty, rhs.ty)
            }
            NodeKind::Unary { op, operand } => {
                self.analyze(operand)?;
                match op {
                    UnaryOp::Neg | UnaryOp::Plus => {
                        self.numeric_usage(operand);
                        let negate = *op == UnaryOp::Neg;
                        folded = operand.as_number().map(|n| if negate { -n } else { n });
                        ValueType::Number
                    }
                    UnaryOp::Not => ValueType::Boolean,
                    UnaryOp::Typeof => ValueType::String,
                    UnaryOp::Void => ValueType::Undefined,
                }
            }
            NodeKind::Assign { target, value } => {
                match &target.kind {
                    NodeKind::Identifier(_)
                    | NodeKind::DynamicIdentifier(_)
                    | NodeKind::MemberAccess { .. } => {}
                    _ => {
                        return Err(CompileError::InvalidAssignmentTarget { span: target.span });
                    }
                }
                self.analyze(target)?;
                self.analyze(value)?;
                if let Some(var) = target.as_identifier().and_then(|ident| ident.var) {
                    self.table.add_assigned_type(var, value.ty);
                }
                value.ty
            }
            NodeKind::Object(properties) => {
                for property in properties.iter_mut() {
                    self.analyze(&mut property.value)?;
                }
                ValueType::Object
            }
            NodeKind::Delete(operand) => {
                self.analyze(operand)?;
                ValueType::Boolean
            }
            _ => return self.analyze(node),
        };

        if let Some(n) = folded {
            node.kind = NodeKind::Literal(Literal::Number(n));
        }
        node.ty = ty;
        Ok(())
    }

    /// The record of a resolved, non-global identifier.
    fn non_global(&self, node: &Node) -> Option<VarId> {
        let var = node.as_identifier()?.var?;
        (!self.table.var(var).is_global()).then_some(var)
    }

    fn numeric_usage(&mut self, operand: &Node) {
        if let Some(var) = self.non_global(operand) {
            self.table.add_usage(var, UsageType::Numeric);
        }
    }
}

fn fold_binary(op: BinaryOp, lhs: &Node, rhs: &Node) -> Option<f64> {
    let (a, b) = (lhs.as_number()?, rhs.as_number()?);
    match op {
        BinaryOp::Add => Some(a + b),
        BinaryOp::Sub => Some(a - b),
        BinaryOp::Mul => Some(a * b),
        BinaryOp::Div => Some(a / b),
        BinaryOp::Mod => Some(a % b),
        _ => None,
    }
}

fn binary_type(op: BinaryOp, lhs: ValueType, rhs: ValueType) -> ValueType {
    match op {
        BinaryOp::Add => match (lhs, rhs) {
            (ValueType::Number, ValueType::Number) => ValueType::Number,
            (ValueType::String, _) | (_, ValueType::String) => ValueType::String,
            _ => ValueType::Any,
        },
        BinaryOp::Sub | BinaryOp::Mul | BinaryOp::Div | BinaryOp::Mod => ValueType::Number,
        BinaryOp::LogicalAnd | BinaryOp::LogicalOr => {
            if lhs == rhs {
                lhs
            } else {
                ValueType::Any
            }
        }
        _ => ValueType::Boolean,
    }
}
