//! Binary and unary operators.

use lumen_syntax::{BinaryOp, Node, UnaryOp};

use crate::bytecode::OpCode;

use super::{FunctionGen, Result};

impl FunctionGen<'_, '_> {
    pub(super) fn binary(&mut self, op: BinaryOp, lhs: &Node, rhs: &Node) -> Result<()> {
        let opcode = match op {
            BinaryOp::LogicalAnd => return self.short_circuit(OpCode::JumpIfFalseOrPop, lhs, rhs),
            BinaryOp::LogicalOr => return self.short_circuit(OpCode::JumpIfTrueOrPop, lhs, rhs),
            BinaryOp::Add => OpCode::Add,
            BinaryOp::Sub => OpCode::Sub,
            BinaryOp::Mul => OpCode::Mul,
            BinaryOp::Div => OpCode::Div,
            BinaryOp::Mod => OpCode::Mod,
            BinaryOp::Less => OpCode::Less,
            BinaryOp::LessEqual => OpCode::LessEqual,
            BinaryOp::Greater => OpCode::Greater,
            BinaryOp::GreaterEqual => OpCode::GreaterEqual,
            BinaryOp::Equal => OpCode::Equal,
            BinaryOp::NotEqual => OpCode::NotEqual,
            BinaryOp::StrictEqual => OpCode::StrictEqual,
            BinaryOp::StrictNotEqual => OpCode::StrictNotEqual,
        };
        self.expression(lhs)?;
        self.expression(rhs)?;
        self.emitter.emit(opcode);
        Ok(())
    }

    /// `lhs && rhs` / `lhs || rhs`: the deciding operand is the result.
    fn short_circuit(&mut self, jump: OpCode, lhs: &Node, rhs: &Node) -> Result<()> {
        self.expression(lhs)?;
        let end = self.emitter.emit_jump(jump);
        self.expression(rhs)?;
        self.emitter.patch_jump(end)
    }

    pub(super) fn unary(&mut self, op: UnaryOp, operand: &Node) -> Result<()> {
        self.expression(operand)?;
        match op {
            UnaryOp::Neg => self.emitter.emit(OpCode::Neg),
            UnaryOp::Plus => self.emitter.emit(OpCode::Plus),
            UnaryOp::Not => self.emitter.emit(OpCode::Not),
            UnaryOp::Typeof => self.emitter.emit(OpCode::Typeof),
            UnaryOp::Void => {
                self.emitter.emit_pop();
                self.emitter.emit(OpCode::PushUndefined);
            }
        }
        Ok(())
    }
}
