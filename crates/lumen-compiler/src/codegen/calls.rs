//! Call dispatch.
//!
//! The shape of the call target picks the instruction:
//! 1. global identifier: `GetGlobal name`, arguments, `CallGlobal site`
//! 2. dynamic identifier: arguments, `CallName name argc`
//! 3. member access: receiver, arguments, `InvokeMember site`
//! 4. anything else: target, arguments, `Call argc` with the global object
//!    as receiver

use lumen_core::Span;
use lumen_syntax::{Node, NodeKind};

use crate::bytecode::OpCode;
use crate::call_site::SiteKind;

use super::{FunctionGen, Result};

impl FunctionGen<'_, '_> {
    pub(super) fn call(&mut self, target: &Node, args: &[Node], span: Span) -> Result<()> {
        match &target.kind {
            NodeKind::Identifier(ident) if self.is_global(ident) => {
                self.emitter.emit_named(OpCode::GetGlobal, &ident.name)?;
                self.arguments(args)?;
                let site = self.add_site(SiteKind::GlobalCall, &ident.name, args.len(), span)?;
                self.emitter.set_span(span);
                self.emitter.emit_site(OpCode::CallGlobal, site)
            }
            NodeKind::DynamicIdentifier(name) => {
                self.arguments(args)?;
                self.emitter.set_span(span);
                self.emitter.emit_call_name(name, args.len())
            }
            NodeKind::MemberAccess {
                target: receiver,
                name,
            } => {
                self.expression(receiver)?;
                self.arguments(args)?;
                let site = self.add_site(SiteKind::InvokeMember, name, args.len(), span)?;
                self.emitter.set_span(span);
                self.emitter.emit_site(OpCode::InvokeMember, site)
            }
            _ => {
                self.expression(target)?;
                self.arguments(args)?;
                self.emitter.set_span(span);
                self.emitter.emit_call(args.len())
            }
        }
    }
}
