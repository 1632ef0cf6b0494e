//! Per-call execution state.

use std::rc::Rc;

use lumen_compiler::bytecode::{BytecodeChunk, OpCode};
use lumen_compiler::{CompiledFunction, VarSlot};
use lumen_core::{Environment, RuntimeError, Value};

use super::Result;

/// An active `try` block.
#[derive(Debug)]
struct Handler {
    target: usize,
    stack_len: usize,
    env: Option<Rc<Environment>>,
}

/// One activation of a compiled function.
#[derive(Debug)]
pub(super) struct Frame {
    pub ip: usize,
    pub stack: Vec<Value>,
    pub locals: Vec<Value>,
    /// Innermost environment: the call's own, a `with` pushed on top of it,
    /// or the closure's when the function allocates none.
    pub env: Option<Rc<Environment>>,
    pub this: Value,
    /// The function object being run; `undefined` for program code.
    pub callee: Value,
    handlers: Vec<Handler>,
}

impl Frame {
    /// Allocate the frame and bind the arguments. Missing arguments are
    /// `undefined`; with repeated parameter names the last one wins.
    pub fn new(
        function: &CompiledFunction,
        closure_env: Option<Rc<Environment>>,
        this: Value,
        args: &[Value],
    ) -> Self {
        let env = if function.needs_env() {
            Some(Environment::declarative(
                Rc::clone(&function.env_names),
                closure_env,
            ))
        } else {
            closure_env
        };
        let mut frame = Self {
            ip: 0,
            stack: Vec::with_capacity(16),
            locals: vec![Value::Undefined; function.local_count as usize],
            env,
            this,
            callee: Value::Undefined,
            handlers: Vec::new(),
        };
        for (index, slot) in function.params.iter().enumerate() {
            let value = args.get(index).cloned().unwrap_or_default();
            match slot {
                VarSlot::Local(slot) => {
                    if let Some(local) = frame.locals.get_mut(*slot as usize) {
                        *local = value;
                    }
                }
                VarSlot::Env(slot) => {
                    if let Some(env) = &frame.env {
                        env.set(*slot as usize, value);
                    }
                }
                VarSlot::Global => {}
            }
        }
        frame
    }

    // ==========================================================================
    // Instruction stream
    // ==========================================================================

    pub fn read_op(&mut self, chunk: &BytecodeChunk) -> Result<Option<OpCode>> {
        if self.ip >= chunk.len() {
            return Ok(None);
        }
        let op = chunk.read_op(self.ip).ok_or_else(|| {
            RuntimeError::internal(format!("invalid opcode at offset {}", self.ip))
        })?;
        self.ip += 1;
        Ok(Some(op))
    }

    pub fn read_u8(&mut self, chunk: &BytecodeChunk) -> Result<u8> {
        let byte = chunk
            .read_byte(self.ip)
            .ok_or_else(|| truncated(self.ip))?;
        self.ip += 1;
        Ok(byte)
    }

    pub fn read_u16(&mut self, chunk: &BytecodeChunk) -> Result<u16> {
        let value = chunk.read_u16(self.ip).ok_or_else(|| truncated(self.ip))?;
        self.ip += 2;
        Ok(value)
    }

    // ==========================================================================
    // Operand stack
    // ==========================================================================

    #[inline]
    pub fn push(&mut self, value: Value) {
        self.stack.push(value);
    }

    pub fn pop(&mut self) -> Result<Value> {
        self.stack
            .pop()
            .ok_or_else(|| RuntimeError::internal("operand stack underflow"))
    }

    pub fn peek(&self) -> Result<&Value> {
        self.stack
            .last()
            .ok_or_else(|| RuntimeError::internal("operand stack underflow"))
    }

    /// The top `argc` values, first argument first.
    pub fn pop_args(&mut self, argc: usize) -> Result<Vec<Value>> {
        let len = self.stack.len();
        if len < argc {
            return Err(RuntimeError::internal("operand stack underflow"));
        }
        Ok(self.stack.split_off(len - argc))
    }

    // ==========================================================================
    // Variables
    // ==========================================================================

    pub fn local(&self, slot: u16) -> Result<Value> {
        self.locals
            .get(slot as usize)
            .cloned()
            .ok_or_else(|| RuntimeError::internal(format!("local slot {slot} out of range")))
    }

    pub fn set_local(&mut self, slot: u16, value: Value) -> Result<()> {
        let local = self
            .locals
            .get_mut(slot as usize)
            .ok_or_else(|| RuntimeError::internal(format!("local slot {slot} out of range")))?;
        *local = value;
        Ok(())
    }

    /// The environment `depth` links up from the innermost one.
    pub fn env_at(&self, depth: u8) -> Result<Rc<Environment>> {
        self.env
            .as_ref()
            .and_then(|env| env.ancestor(depth as usize))
            .ok_or_else(|| RuntimeError::internal(format!("no environment at depth {depth}")))
    }

    // ==========================================================================
    // Exception handlers
    // ==========================================================================

    pub fn push_handler(&mut self, target: usize) {
        self.handlers.push(Handler {
            target,
            stack_len: self.stack.len(),
            env: self.env.clone(),
        });
    }

    pub fn pop_handler(&mut self) -> Result<()> {
        self.handlers
            .pop()
            .map(drop)
            .ok_or_else(|| RuntimeError::internal("TryEnd without TryBegin"))
    }

    pub fn has_handler(&self) -> bool {
        !self.handlers.is_empty()
    }

    /// Restore the state saved by the innermost handler and jump to it.
    /// Returns false when no handler is active.
    pub fn unwind(&mut self, exception: Value) -> bool {
        let Some(handler) = self.handlers.pop() else {
            return false;
        };
        self.stack.truncate(handler.stack_len);
        self.env = handler.env;
        self.stack.push(exception);
        self.ip = handler.target;
        true
    }
}

fn truncated(offset: usize) -> RuntimeError {
    RuntimeError::internal(format!("truncated operand at offset {offset}"))
}
