//! Bytecode emitter.
//!
//! The [`BytecodeEmitter`] provides a typed API over [`BytecodeChunk`]:
//! constants and names go through the shared pool, operand widths are
//! checked, and forward jumps are patched through [`JumpLabel`]s.
//!
//! # Example
//!
//! ```
//! use lumen_compiler::bytecode::{ConstantPool, OpCode};
//! use lumen_compiler::emit::BytecodeEmitter;
//!
//! let mut constants = ConstantPool::new();
//! let mut emitter = BytecodeEmitter::new(&mut constants);
//! emitter.emit_number(40.0).unwrap();
//! emitter.emit_number(2.0).unwrap();
//! emitter.emit(OpCode::Add);
//! emitter.emit(OpCode::Return);
//!
//! let chunk = emitter.finish();
//! chunk.assert_opcodes(&[OpCode::Constant, OpCode::Constant, OpCode::Add, OpCode::Return]);
//! ```

use std::rc::Rc;

use lumen_core::{CompileError, Span};

use crate::bytecode::{BytecodeChunk, Constant, ConstantPool, OpCode};

/// Emits the bytecode of one function.
///
/// The constant pool is shared by every function of the unit.
pub struct BytecodeEmitter<'pool> {
    chunk: BytecodeChunk,
    constants: &'pool mut ConstantPool,
    /// Position attached to subsequent instructions.
    current_span: Span,
}

impl<'pool> BytecodeEmitter<'pool> {
    pub fn new(constants: &'pool mut ConstantPool) -> Self {
        Self {
            chunk: BytecodeChunk::new(),
            constants,
            current_span: Span::default(),
        }
    }

    /// Set the source position for subsequent instructions.
    pub fn set_span(&mut self, span: Span) {
        if !span.is_unknown() {
            self.current_span = span;
        }
    }

    pub fn current_span(&self) -> Span {
        self.current_span
    }

    /// The shared pool, for emitters of nested functions.
    pub fn constants(&mut self) -> &mut ConstantPool {
        &mut *self.constants
    }

    fn line(&self) -> u32 {
        self.current_span.line
    }

    fn limit(&self, what: &'static str, limit: usize) -> CompileError {
        CompileError::LimitExceeded {
            what,
            limit,
            span: self.current_span,
        }
    }

    fn narrow_u16(&self, value: usize, what: &'static str) -> Result<u16, CompileError> {
        u16::try_from(value).map_err(|_| self.limit(what, u16::MAX as usize))
    }

    fn narrow_u8(&self, value: usize, what: &'static str) -> Result<u8, CompileError> {
        u8::try_from(value).map_err(|_| self.limit(what, u8::MAX as usize))
    }

    // ==========================================================================
    // Basic Emission
    // ==========================================================================

    /// Emit a single opcode with no operands.
    pub fn emit(&mut self, op: OpCode) {
        self.chunk.write_op(op, self.line());
    }

    pub fn emit_byte(&mut self, op: OpCode, byte: u8) {
        let line = self.line();
        self.chunk.write_op(op, line);
        self.chunk.write_byte(byte, line);
    }

    pub fn emit_u16(&mut self, op: OpCode, value: u16) {
        let line = self.line();
        self.chunk.write_op(op, line);
        self.chunk.write_u16(value, line);
    }

    // ==========================================================================
    // Constants
    // ==========================================================================

    pub fn emit_constant(&mut self, constant: Constant) -> Result<(), CompileError> {
        let index = self.constants.add(constant);
        let index = self.narrow_u16(index as usize, "constant pool")?;
        self.emit_u16(OpCode::Constant, index);
        Ok(())
    }

    pub fn emit_number(&mut self, value: f64) -> Result<(), CompileError> {
        self.emit_constant(Constant::Number(value))
    }

    pub fn emit_string(&mut self, value: &Rc<str>) -> Result<(), CompileError> {
        self.emit_constant(Constant::String(Rc::clone(value)))
    }

    pub fn emit_bool(&mut self, value: bool) {
        self.emit(if value {
            OpCode::PushTrue
        } else {
            OpCode::PushFalse
        });
    }

    /// Pool index of a name operand.
    pub fn name_operand(&mut self, name: &Rc<str>) -> Result<u16, CompileError> {
        let index = self.constants.add_string(name);
        self.narrow_u16(index as usize, "constant pool")
    }

    /// Emit an opcode whose operand is a name constant.
    pub fn emit_named(&mut self, op: OpCode, name: &Rc<str>) -> Result<(), CompileError> {
        let index = self.name_operand(name)?;
        self.emit_u16(op, index);
        Ok(())
    }

    // ==========================================================================
    // Variables
    // ==========================================================================

    pub fn emit_get_local(&mut self, slot: u32) -> Result<(), CompileError> {
        let slot = self.narrow_u16(slot as usize, "local slots")?;
        self.emit_u16(OpCode::GetLocal, slot);
        Ok(())
    }

    pub fn emit_set_local(&mut self, slot: u32) -> Result<(), CompileError> {
        let slot = self.narrow_u16(slot as usize, "local slots")?;
        self.emit_u16(OpCode::SetLocal, slot);
        Ok(())
    }

    fn emit_env(&mut self, op: OpCode, depth: usize, slot: u32) -> Result<(), CompileError> {
        let depth = self.narrow_u8(depth, "environment depth")?;
        let slot = self.narrow_u16(slot as usize, "environment slots")?;
        self.emit_byte(op, depth);
        self.chunk.write_u16(slot, self.line());
        Ok(())
    }

    pub fn emit_get_env(&mut self, depth: usize, slot: u32) -> Result<(), CompileError> {
        self.emit_env(OpCode::GetEnv, depth, slot)
    }

    pub fn emit_set_env(&mut self, depth: usize, slot: u32) -> Result<(), CompileError> {
        self.emit_env(OpCode::SetEnv, depth, slot)
    }

    // ==========================================================================
    // Calls
    // ==========================================================================

    /// Emit an operation routed through call site `site`.
    pub fn emit_site(&mut self, op: OpCode, site: usize) -> Result<(), CompileError> {
        let site = self.narrow_u16(site, "call sites")?;
        self.emit_u16(op, site);
        Ok(())
    }

    /// Generic call with the global object as receiver.
    pub fn emit_call(&mut self, arg_count: usize) -> Result<(), CompileError> {
        let argc = self.narrow_u8(arg_count, "call arguments")?;
        self.emit_byte(OpCode::Call, argc);
        Ok(())
    }

    /// Scope-chain call of a bare name.
    pub fn emit_call_name(&mut self, name: &Rc<str>, arg_count: usize) -> Result<(), CompileError> {
        let argc = self.narrow_u8(arg_count, "call arguments")?;
        self.emit_named(OpCode::CallName, name)?;
        self.chunk.write_byte(argc, self.line());
        Ok(())
    }

    pub fn emit_closure(&mut self, function: usize) -> Result<(), CompileError> {
        let index = self.narrow_u16(function, "functions")?;
        self.emit_u16(OpCode::Closure, index);
        Ok(())
    }

    // ==========================================================================
    // Jumps
    // ==========================================================================

    /// Emit a forward jump with a placeholder offset.
    pub fn emit_jump(&mut self, op: OpCode) -> JumpLabel {
        JumpLabel(self.chunk.emit_jump(op, self.line()))
    }

    /// Patch a forward jump to the current position.
    pub fn patch_jump(&mut self, label: JumpLabel) -> Result<(), CompileError> {
        self.chunk
            .patch_jump(label.0)
            .map_err(|_| self.limit("jump distance", u16::MAX as usize))
    }

    /// Emit a backward jump to `target`.
    pub fn emit_loop(&mut self, target: usize) -> Result<(), CompileError> {
        let line = self.line();
        self.chunk
            .emit_loop(target, line)
            .map_err(|_| self.limit("loop body", u16::MAX as usize))
    }

    pub fn current_offset(&self) -> usize {
        self.chunk.current_offset()
    }

    // ==========================================================================
    // Stack
    // ==========================================================================

    pub fn emit_pop(&mut self) {
        self.emit(OpCode::Pop);
    }

    pub fn emit_dup(&mut self) {
        self.emit(OpCode::Dup);
    }

    /// Consume the emitter and return the chunk.
    pub fn finish(self) -> BytecodeChunk {
        self.chunk
    }

    pub fn code_size(&self) -> usize {
        self.chunk.len()
    }
}

/// A forward jump awaiting its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JumpLabel(pub(crate) usize);

impl JumpLabel {
    /// Offset of the jump operand.
    pub fn offset(&self) -> usize {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constants_are_shared_across_emitters() {
        let mut pool = ConstantPool::new();
        {
            let mut a = BytecodeEmitter::new(&mut pool);
            a.emit_number(7.0).unwrap();
        }
        let mut b = BytecodeEmitter::new(&mut pool);
        b.emit_number(7.0).unwrap();
        let chunk = b.finish();
        assert_eq!(chunk.read_u16(1), Some(0));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn env_operands() {
        let mut pool = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut pool);
        emitter.emit_get_env(2, 300).unwrap();
        let chunk = emitter.finish();
        assert_eq!(chunk.read_op(0), Some(OpCode::GetEnv));
        assert_eq!(chunk.read_byte(1), Some(2));
        assert_eq!(chunk.read_u16(2), Some(300));
    }

    #[test]
    fn call_name_operands() {
        let mut pool = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut pool);
        emitter.emit_call_name(&Rc::from("foo"), 2).unwrap();
        let chunk = emitter.finish();
        chunk.assert_opcodes(&[OpCode::CallName]);
        assert_eq!(chunk.read_byte(3), Some(2));
        assert_eq!(pool.name(0).map(|s| &**s), Some("foo"));
    }

    #[test]
    fn too_many_arguments() {
        let mut pool = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut pool);
        emitter.set_span(Span::new(3, 1, 4));
        let err = emitter.emit_call(300).unwrap_err();
        assert!(matches!(
            err,
            CompileError::LimitExceeded { what: "call arguments", limit: 255, .. }
        ));
        assert_eq!(err.span(), Span::new(3, 1, 4));
    }

    #[test]
    fn jump_patching() {
        let mut pool = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut pool);
        let label = emitter.emit_jump(OpCode::JumpIfFalse);
        emitter.emit_pop();
        emitter.patch_jump(label).unwrap();
        let chunk = emitter.finish();
        assert_eq!(chunk.read_u16(label.offset()), Some(1));
    }

    #[test]
    fn unknown_span_keeps_previous_line() {
        let mut pool = ConstantPool::new();
        let mut emitter = BytecodeEmitter::new(&mut pool);
        emitter.set_span(Span::new(9, 1, 1));
        emitter.set_span(Span::default());
        emitter.emit_pop();
        assert_eq!(emitter.current_span().line, 9);
        assert_eq!(emitter.finish().line_at(0), Some(9));
    }
}
