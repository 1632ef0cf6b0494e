//! Statement generation.
//!
//! Statements leave the stack as they found it. Expression statements pop
//! their value, or in program code first store it as the completion value.

use lumen_core::Span;
use lumen_syntax::{Identifier, Node, NodeKind};

use crate::bytecode::OpCode;

use super::{FunctionGen, Result};

impl FunctionGen<'_, '_> {
    pub(super) fn statement(&mut self, node: &Node) -> Result<()> {
        self.emitter.set_span(node.span);
        match &node.kind {
            // Already instantiated at body entry.
            NodeKind::Function(func) if func.is_declaration => Ok(()),
            kind if kind.is_expression() => self.expression_statement(node),
            NodeKind::Var { binding, init } => match init {
                Some(init) => {
                    self.expression(init)?;
                    self.store_identifier(binding, node.span)?;
                    self.emitter.emit_pop();
                    Ok(())
                }
                None => Ok(()),
            },
            NodeKind::Return(value) => {
                match value {
                    Some(value) => {
                        self.expression(value)?;
                        self.emitter.emit(OpCode::Return);
                    }
                    None => self.emitter.emit(OpCode::ReturnUndefined),
                }
                Ok(())
            }
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => self.if_statement(condition, then_branch, else_branch.as_deref()),
            NodeKind::While { condition, body } => self.while_statement(condition, body),
            NodeKind::Block(statements) => {
                for stmt in statements {
                    self.statement(stmt)?;
                }
                Ok(())
            }
            NodeKind::With { object, body } => {
                self.expression(object)?;
                self.emitter.emit(OpCode::EnterWith);
                self.statement(body)?;
                self.emitter.emit(OpCode::ExitWith);
                Ok(())
            }
            NodeKind::Throw(value) => {
                self.expression(value)?;
                self.emitter.set_span(node.span);
                self.emitter.emit(OpCode::Throw);
                Ok(())
            }
            NodeKind::Try {
                block,
                catch_param,
                handler,
            } => self.try_statement(block, catch_param.as_ref(), handler, node.span),
            _ => self.expression_statement(node),
        }
    }

    fn expression_statement(&mut self, node: &Node) -> Result<()> {
        self.expression(node)?;
        if let Some(slot) = self.completion {
            self.emitter.emit_set_local(slot)?;
        }
        self.emitter.emit_pop();
        Ok(())
    }

    /// ```text
    /// [condition]
    /// JumpIfFalse -> else
    /// [then]
    /// Jump -> end
    /// else:
    /// [else]
    /// end:
    /// ```
    fn if_statement(
        &mut self,
        condition: &Node,
        then_branch: &Node,
        else_branch: Option<&Node>,
    ) -> Result<()> {
        self.expression(condition)?;
        let else_jump = self.emitter.emit_jump(OpCode::JumpIfFalse);
        self.statement(then_branch)?;
        match else_branch {
            Some(else_branch) => {
                let end_jump = self.emitter.emit_jump(OpCode::Jump);
                self.emitter.patch_jump(else_jump)?;
                self.statement(else_branch)?;
                self.emitter.patch_jump(end_jump)
            }
            None => self.emitter.patch_jump(else_jump),
        }
    }

    fn while_statement(&mut self, condition: &Node, body: &Node) -> Result<()> {
        let loop_start = self.emitter.current_offset();
        self.expression(condition)?;
        let exit_jump = self.emitter.emit_jump(OpCode::JumpIfFalse);
        self.statement(body)?;
        self.emitter.emit_loop(loop_start)?;
        self.emitter.patch_jump(exit_jump)
    }

    /// ```text
    /// TryBegin -> handler
    /// [block]
    /// TryEnd
    /// Jump -> end
    /// handler:          (thrown value on the stack)
    /// store param / Pop
    /// [handler]
    /// end:
    /// ```
    fn try_statement(
        &mut self,
        block: &Node,
        catch_param: Option<&Identifier>,
        handler: &Node,
        span: Span,
    ) -> Result<()> {
        let handler_jump = self.emitter.emit_jump(OpCode::TryBegin);
        self.statement(block)?;
        self.emitter.emit(OpCode::TryEnd);
        let end_jump = self.emitter.emit_jump(OpCode::Jump);

        self.emitter.patch_jump(handler_jump)?;
        if let Some(param) = catch_param {
            self.store_identifier(param, span)?;
        }
        self.emitter.emit_pop();
        self.statement(handler)?;
        self.emitter.patch_jump(end_jump)
    }
}
