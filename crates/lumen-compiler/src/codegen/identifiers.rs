//! Identifier loads, stores and deletes.
//!
//! Storage decides the instruction:
//! - Local: `GetLocal`/`SetLocal` on a frame slot
//! - Closure: `GetEnv`/`SetEnv` with the static environment depth
//! - Global: `GetGlobal`/`SetGlobal` on the global object

use lumen_core::{CompileError, Span};
use lumen_syntax::{Identifier, VarId};

use crate::bytecode::OpCode;
use crate::scope::VarSlot;

use super::{FunctionGen, Result};

impl FunctionGen<'_, '_> {
    fn var_of(&self, ident: &Identifier, span: Span) -> Result<VarId> {
        ident.var.ok_or_else(|| CompileError::Unresolved {
            name: ident.name.to_string(),
            span,
        })
    }

    /// Environment hops from the running function to `var`'s declaring
    /// function.
    fn env_depth(&self, var: VarId, ident: &Identifier, span: Span) -> Result<usize> {
        let declaring = self.table.var(var).scope;
        self.table
            .env_depth(self.scope, declaring)
            .ok_or_else(|| CompileError::Unresolved {
                name: ident.name.to_string(),
                span,
            })
    }

    pub(super) fn is_global(&self, ident: &Identifier) -> bool {
        ident
            .var
            .is_some_and(|var| self.table.var(var).is_global())
    }

    pub(super) fn load_identifier(&mut self, ident: &Identifier, span: Span) -> Result<()> {
        let var = self.var_of(ident, span)?;
        match self.table.slot_of(var) {
            VarSlot::Local(slot) => self.emitter.emit_get_local(slot),
            VarSlot::Env(slot) => {
                let depth = self.env_depth(var, ident, span)?;
                self.emitter.emit_get_env(depth, slot)
            }
            VarSlot::Global => self.emitter.emit_named(OpCode::GetGlobal, &ident.name),
        }
    }

    /// Store the top of stack into `ident`, leaving the value in place.
    pub(super) fn store_identifier(&mut self, ident: &Identifier, span: Span) -> Result<()> {
        let var = self.var_of(ident, span)?;
        match self.table.slot_of(var) {
            VarSlot::Local(slot) => self.emitter.emit_set_local(slot),
            VarSlot::Env(slot) => {
                let depth = self.env_depth(var, ident, span)?;
                self.emitter.emit_set_env(depth, slot)
            }
            VarSlot::Global => self.emitter.emit_named(OpCode::SetGlobal, &ident.name),
        }
    }

    /// `delete name`: globals go through the global object; declared
    /// function variables cannot be deleted.
    pub(super) fn delete_identifier(&mut self, ident: &Identifier, span: Span) -> Result<()> {
        let var = self.var_of(ident, span)?;
        match self.table.slot_of(var) {
            VarSlot::Global => self.emitter.emit_named(OpCode::DeleteGlobal, &ident.name),
            VarSlot::Local(_) | VarSlot::Env(_) => {
                self.emitter.emit(OpCode::PushFalse);
                Ok(())
            }
        }
    }

    /// Storage of a parameter.
    pub(super) fn param_slot(&self, param: &Identifier, span: Span) -> Result<VarSlot> {
        let var = self.var_of(param, span)?;
        Ok(self.table.slot_of(var))
    }
}
