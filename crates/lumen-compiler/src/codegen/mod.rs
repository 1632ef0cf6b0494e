//! Code generation.
//!
//! Walks an analyzed [`Program`] and emits one [`CompiledFunction`] per
//! function plus an entry function for the program body. Evaluation order
//! is left-to-right, depth-first.
//!
//! Every global call, method invocation and member read/write gets its own
//! [`CallSite`]; the VM fills the site's inline cache on first execution.
//!
//! # Example
//!
//! ```
//! use lumen_compiler::{Analyzer, Generator};
//! use lumen_syntax::build::*;
//!
//! let mut program = program(vec![call(ident("print"), vec![num(1.0)])]);
//! let mut analyzer = Analyzer::new();
//! analyzer.analyze_program(&mut program).unwrap();
//! let table = analyzer.finish();
//!
//! let unit = Generator::new(&table).generate_program(&program).unwrap();
//! assert_eq!(unit.entry().call_sites.len(), 1);
//! ```

mod calls;
mod functions;
mod identifiers;
mod member;
mod operators;
mod stmt;

use std::rc::Rc;

use lumen_core::{CompileError, Span};
use lumen_syntax::{Literal, Node, NodeKind, Program, ScopeId};
use tracing::debug;

use crate::bytecode::{ConstantPool, OpCode};
use crate::call_site::{CallSite, CallSiteInfo, SiteKind};
use crate::emit::BytecodeEmitter;
use crate::scope::{ScopeTable, VarSlot};
use crate::{CompiledFunction, CompiledUnit};

type Result<T> = std::result::Result<T, CompileError>;

/// Generates a [`CompiledUnit`] from an analyzed program and its frozen
/// scope table.
pub struct Generator<'t> {
    table: &'t ScopeTable,
}

impl<'t> Generator<'t> {
    pub fn new(table: &'t ScopeTable) -> Self {
        Self { table }
    }

    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn generate_program(&self, program: &Program) -> Result<CompiledUnit> {
        let scope = match program.scope {
            Some(scope) if program.analyzed && self.table.is_finished() => scope,
            _ => {
                return Err(CompileError::unsupported(
                    "program that has not been analyzed",
                    Span::default(),
                ));
            }
        };

        let mut constants = ConstantPool::new();
        let mut functions = Vec::new();
        let layout = self.table.layout(scope);
        // One extra frame slot holds the completion value.
        let completion = layout.local_count;

        let mut generator = FunctionGen::new(self.table, scope, &mut constants, &mut functions);
        generator.completion = Some(completion);
        generator.body(&program.body)?;
        generator.emitter.emit_get_local(completion)?;
        generator.emitter.emit(OpCode::Return);
        let entry = generator.finish(FunctionShape {
            name: Rc::from("<program>"),
            params: Vec::new(),
            local_count: completion + 1,
            env_names: layout.env_names,
            span: Span::default(),
        });
        functions.push(entry);

        let global_declarations = self
            .table
            .scope(scope)
            .variables()
            .iter()
            .map(|&var| self.table.var(var))
            .filter(|record| record.is_global() && !record.is_deletable())
            .map(|record| Rc::clone(&record.name))
            .collect();

        let unit = CompiledUnit {
            entry: functions.len() - 1,
            functions,
            constants,
            global_declarations,
        };
        debug!(
            functions = unit.functions.len(),
            constants = unit.constants.len(),
            call_sites = unit.call_site_count(),
            "generated unit"
        );
        Ok(unit)
    }
}

/// Everything about a function except its code.
struct FunctionShape {
    name: Rc<str>,
    params: Vec<VarSlot>,
    local_count: u32,
    env_names: Rc<[Rc<str>]>,
    span: Span,
}

/// Generation state of one function body.
pub(crate) struct FunctionGen<'a, 'pool> {
    table: &'a ScopeTable,
    scope: ScopeId,
    emitter: BytecodeEmitter<'pool>,
    /// Finished functions of the unit; nested functions are appended here.
    functions: &'a mut Vec<CompiledFunction>,
    call_sites: Vec<CallSite>,
    /// Frame slot receiving expression statement values (program body only).
    completion: Option<u32>,
}

impl<'a, 'pool> FunctionGen<'a, 'pool> {
    fn new(
        table: &'a ScopeTable,
        scope: ScopeId,
        constants: &'pool mut ConstantPool,
        functions: &'a mut Vec<CompiledFunction>,
    ) -> Self {
        Self {
            table,
            scope,
            emitter: BytecodeEmitter::new(constants),
            functions,
            call_sites: Vec::new(),
            completion: None,
        }
    }

    fn finish(self, shape: FunctionShape) -> CompiledFunction {
        CompiledFunction {
            name: shape.name,
            params: shape.params,
            local_count: shape.local_count,
            env_names: shape.env_names,
            chunk: self.emitter.finish(),
            call_sites: self.call_sites,
            span: shape.span,
        }
    }

    /// Register a call site and return its index.
    fn add_site(&mut self, kind: SiteKind, name: &Rc<str>, argc: usize, span: Span) -> Result<usize> {
        let argc = u8::try_from(argc).map_err(|_| CompileError::LimitExceeded {
            what: "call arguments",
            limit: u8::MAX as usize,
            span,
        })?;
        self.call_sites.push(CallSite::new(CallSiteInfo {
            kind,
            name: Rc::clone(name),
            argc,
            span,
        }));
        Ok(self.call_sites.len() - 1)
    }

    // ==========================================================================
    // Expressions
    // ==========================================================================

    /// Emit `node`, leaving exactly one value on the stack.
    fn expression(&mut self, node: &Node) -> Result<()> {
        self.emitter.set_span(node.span);
        match &node.kind {
            NodeKind::Literal(lit) => self.literal(lit),
            NodeKind::Identifier(ident) => self.load_identifier(ident, node.span),
            NodeKind::DynamicIdentifier(name) => self.emitter.emit_named(OpCode::GetName, name),
            NodeKind::This => {
                self.emitter.emit(OpCode::GetThis);
                Ok(())
            }
            NodeKind::Call { target, args } => self.call(target, args, node.span),
            NodeKind::MemberAccess { target, name } => self.get_member(target, name, node.span),
            NodeKind::Binary { op, lhs, rhs } => self.binary(*op, lhs, rhs),
            NodeKind::Unary { op, operand } => self.unary(*op, operand),
            NodeKind::Assign { target, value } => self.assign(target, value, node.span),
            NodeKind::Function(func) => {
                let index = self.function(func, node.span)?;
                self.emitter.emit_closure(index)
            }
            NodeKind::Object(properties) => self.object(properties),
            NodeKind::Delete(target) => self.delete(target),
            _ => Err(CompileError::ExpectedExpression {
                found: node.kind_name(),
                span: node.span,
            }),
        }
    }

    fn literal(&mut self, lit: &Literal) -> Result<()> {
        match lit {
            Literal::Undefined => self.emitter.emit(OpCode::PushUndefined),
            Literal::Null => self.emitter.emit(OpCode::PushNull),
            Literal::Bool(b) => self.emitter.emit_bool(*b),
            Literal::Number(n) => return self.emitter.emit_number(*n),
            Literal::String(s) => return self.emitter.emit_string(s),
        }
        Ok(())
    }

    fn arguments(&mut self, args: &[Node]) -> Result<()> {
        for arg in args {
            self.expression(arg)?;
        }
        Ok(())
    }

    fn assign(&mut self, target: &Node, value: &Node, span: Span) -> Result<()> {
        match &target.kind {
            NodeKind::Identifier(ident) => {
                self.expression(value)?;
                self.store_identifier(ident, span)
            }
            NodeKind::DynamicIdentifier(name) => {
                self.expression(value)?;
                self.emitter.emit_named(OpCode::SetName, name)
            }
            NodeKind::MemberAccess { target: object, name } => {
                self.set_member(object, name, value, span)
            }
            _ => Err(CompileError::InvalidAssignmentTarget { span: target.span }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Analyzer;
    use lumen_syntax::build::*;

    pub(super) fn generate(mut program: Program) -> CompiledUnit {
        let mut analyzer = Analyzer::new();
        analyzer.analyze_program(&mut program).unwrap();
        let table = analyzer.finish();
        Generator::new(&table).generate_program(&program).unwrap()
    }

    #[test]
    fn unanalyzed_program_is_rejected() {
        let program = program(vec![num(1.0)]);
        let table = ScopeTable::new();
        assert!(Generator::new(&table).generate_program(&program).is_err());
    }

    #[test]
    fn completion_value_is_stored() {
        let unit = generate(program(vec![num(1.0), num(2.0)]));
        let entry = unit.entry();
        assert_eq!(entry.local_count, 1);
        entry.chunk.assert_opcodes(&[
            OpCode::Constant,
            OpCode::SetLocal,
            OpCode::Pop,
            OpCode::Constant,
            OpCode::SetLocal,
            OpCode::Pop,
            OpCode::GetLocal,
            OpCode::Return,
        ]);
    }

    #[test]
    fn global_declarations_exclude_implicit_globals() {
        let unit = generate(program(vec![
            var("declared", None),
            assign(ident("implicit"), num(1.0)),
            function_decl("f", &[], vec![]),
        ]));
        let names: Vec<&str> = unit.global_declarations.iter().map(|n| &**n).collect();
        assert_eq!(names, vec!["declared", "f"]);
    }

    #[test]
    fn nested_functions_precede_entry() {
        let unit = generate(program(vec![function_decl(
            "outer",
            &[],
            vec![function_decl("inner", &[], vec![])],
        )]));
        let names: Vec<&str> = unit.functions.iter().map(|f| &*f.name).collect();
        assert_eq!(names, vec!["inner", "outer", "<program>"]);
        assert_eq!(unit.entry, 2);
    }

    #[test]
    fn statement_node_is_not_an_expression() {
        let mut constants = ConstantPool::new();
        let mut functions = Vec::new();
        let table = ScopeTable::new();
        let mut generator =
            FunctionGen::new(&table, ScopeId::GLOBAL, &mut constants, &mut functions);
        let err = generator.expression(&block(vec![])).unwrap_err();
        assert!(matches!(err, CompileError::ExpectedExpression { found: "block", .. }));
    }
}
