//! Member access, object literals and `delete`.

use std::rc::Rc;

use lumen_core::Span;
use lumen_syntax::{Node, NodeKind, ObjectProperty};

use crate::bytecode::OpCode;
use crate::call_site::SiteKind;

use super::{FunctionGen, Result};

impl FunctionGen<'_, '_> {
    pub(super) fn get_member(&mut self, object: &Node, name: &Rc<str>, span: Span) -> Result<()> {
        self.expression(object)?;
        let site = self.add_site(SiteKind::GetMember, name, 0, span)?;
        self.emitter.set_span(span);
        self.emitter.emit_site(OpCode::GetMember, site)
    }

    pub(super) fn set_member(
        &mut self,
        object: &Node,
        name: &Rc<str>,
        value: &Node,
        span: Span,
    ) -> Result<()> {
        self.expression(object)?;
        self.expression(value)?;
        let site = self.add_site(SiteKind::SetMember, name, 0, span)?;
        self.emitter.set_span(span);
        self.emitter.emit_site(OpCode::SetMember, site)
    }

    pub(super) fn object(&mut self, properties: &[ObjectProperty]) -> Result<()> {
        self.emitter.emit(OpCode::NewObject);
        for property in properties {
            self.expression(&property.value)?;
            self.emitter.emit_named(OpCode::InitProperty, &property.name)?;
        }
        Ok(())
    }

    pub(super) fn delete(&mut self, target: &Node) -> Result<()> {
        match &target.kind {
            NodeKind::MemberAccess { target: object, name } => {
                self.expression(object)?;
                self.emitter.emit_named(OpCode::DeleteMember, name)
            }
            NodeKind::Identifier(ident) => self.delete_identifier(ident, target.span),
            NodeKind::DynamicIdentifier(name) => self.emitter.emit_named(OpCode::DeleteName, name),
            // Deleting a non-reference evaluates it and yields true.
            _ => {
                self.expression(target)?;
                self.emitter.emit_pop();
                self.emitter.emit(OpCode::PushTrue);
                Ok(())
            }
        }
    }
}
