//! Semantic analysis.
//!
//! A single top-down pass over the tree that:
//! - declares definitions and resolves references through the
//!   [`ScopeTable`], marking closure captures on the way
//! - lowers names inside `with` bodies to runtime scope-chain lookups
//! - records usage hints (called as a function, used in arithmetic) and
//!   assigned value types
//! - folds arithmetic between number literals
//!
//! Children are always analyzed before their parent inspects them. The tree
//! is rewritten in place; the resulting [`ScopeTable`] is frozen by
//! [`Analyzer::finish`].

mod expr;
mod hoist;

use lumen_core::{CompileError, Span, ValueType};
use lumen_syntax::{FunctionNode, Identifier, Node, NodeKind, Program, ScopeId, VarId};
use tracing::debug;

use crate::scope::ScopeTable;

pub(crate) use hoist::{hoisted_functions, hoisted_names};

/// Analyzer state for one compilation unit.
pub struct Analyzer {
    table: ScopeTable,
    /// The function scope being analyzed.
    scope: ScopeId,
    /// `with` bodies entered within the current function.
    with_depth: u32,
    /// `with` bodies entered anywhere up the function nesting.
    lowered_depth: u32,
}

impl Analyzer {
    pub fn new() -> Self {
        Self {
            table: ScopeTable::new(),
            scope: ScopeId::GLOBAL,
            with_depth: 0,
            lowered_depth: 0,
        }
    }

    pub fn table(&self) -> &ScopeTable {
        &self.table
    }

    /// Analyze a whole program in its global scope.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn analyze_program(&mut self, program: &mut Program) -> Result<(), CompileError> {
        let global = self.table.global();
        program.scope = Some(global);
        self.scope = global;
        self.hoist(&program.body);
        for stmt in &mut program.body {
            self.analyze(stmt)?;
        }
        program.analyzed = true;
        debug!(
            scopes = self.table.scope_count(),
            variables = self.table.var_count(),
            "analyzed program"
        );
        Ok(())
    }

    /// Freeze storage classes and hand out the table.
    pub fn finish(mut self) -> ScopeTable {
        self.table.finish();
        self.table
    }

    fn hoist(&mut self, body: &[Node]) {
        for name in hoisted_names(body) {
            self.table.declare(self.scope, &name);
        }
    }

    // ==========================================================================
    // Nodes
    // ==========================================================================

    /// Analyze `node` and set its expression type.
    pub fn analyze(&mut self, node: &mut Node) -> Result<(), CompileError> {
        let span = node.span;
        let ty = match &mut node.kind {
            NodeKind::Literal(lit) => lit.value_type(),
            NodeKind::Identifier(ident) => self.identifier(ident, span)?,
            NodeKind::DynamicIdentifier(_) | NodeKind::This => ValueType::Any,
            NodeKind::Call { .. }
            | NodeKind::MemberAccess { .. }
            | NodeKind::Binary { .. }
            | NodeKind::Unary { .. }
            | NodeKind::Assign { .. }
            | NodeKind::Object(_)
            | NodeKind::Delete(_) => return self.expression(node),
            NodeKind::Function(func) => {
                self.function(func, span)?;
                ValueType::Function
            }
            NodeKind::Var { binding, init } => {
                let var = self.define(binding, span)?;
                if let Some(init) = init {
                    self.analyze(init)?;
                    self.table.add_assigned_type(var, init.ty);
                }
                ValueType::Any
            }
            NodeKind::Return(value) => {
                if let Some(value) = value {
                    self.analyze(value)?;
                }
                ValueType::Any
            }
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.analyze(condition)?;
                self.analyze(then_branch)?;
                if let Some(else_branch) = else_branch {
                    self.analyze(else_branch)?;
                }
                ValueType::Any
            }
            NodeKind::While { condition, body } => {
                self.analyze(condition)?;
                self.analyze(body)?;
                ValueType::Any
            }
            NodeKind::Block(statements) => {
                for stmt in statements {
                    self.analyze(stmt)?;
                }
                ValueType::Any
            }
            NodeKind::With { object, body } => {
                self.analyze(object)?;
                hoist::lower_dynamic(body);
                self.table.mark_dynamic(self.scope);
                self.with_depth += 1;
                self.lowered_depth += 1;
                let result = self.analyze(body);
                self.with_depth -= 1;
                self.lowered_depth -= 1;
                result?;
                ValueType::Any
            }
            NodeKind::Throw(value) => {
                self.analyze(value)?;
                ValueType::Any
            }
            NodeKind::Try {
                block,
                catch_param,
                handler,
            } => {
                self.analyze(block)?;
                match catch_param {
                    // The parameter is visible in the handler only.
                    Some(param) => {
                        self.unsupported_in_with(&param.name, span)?;
                        let (var, shadowed) =
                            self.table.begin_block_binding(self.scope, &param.name);
                        param.var = Some(var);
                        let result = self.analyze(handler);
                        self.table
                            .end_block_binding(self.scope, &param.name, shadowed);
                        result?;
                    }
                    None => self.analyze(handler)?,
                }
                ValueType::Any
            }
        };
        node.ty = ty;
        Ok(())
    }

    fn unsupported_in_with(&self, name: &str, span: Span) -> Result<(), CompileError> {
        if self.with_depth > 0 {
            return Err(CompileError::unsupported(
                format!("identifier '{name}' inside with"),
                span,
            ));
        }
        Ok(())
    }

    /// Identifier in definition or reference position.
    fn identifier(
        &mut self,
        ident: &mut Identifier,
        span: Span,
    ) -> Result<ValueType, CompileError> {
        self.unsupported_in_with(&ident.name, span)?;
        let var = if ident.is_definition {
            self.table.declare(self.scope, &ident.name)
        } else {
            self.table.resolve(self.scope, &ident.name)
        };
        ident.var = Some(var);
        Ok(self.table.var(var).inferred_type())
    }

    /// Declare a definition-position identifier in the current scope.
    fn define(&mut self, ident: &mut Identifier, span: Span) -> Result<VarId, CompileError> {
        self.unsupported_in_with(&ident.name, span)?;
        let var = self.table.declare(self.scope, &ident.name);
        ident.var = Some(var);
        Ok(var)
    }

    fn function(&mut self, func: &mut FunctionNode, span: Span) -> Result<(), CompileError> {
        if func.is_declaration
            && let Some(name) = &mut func.name
        {
            let var = self.define(name, span)?;
            self.table.add_assigned_type(var, ValueType::Function);
        }

        let scope = self
            .table
            .push_function_scope(self.scope, func.display_name());
        func.scope = Some(scope);
        if self.lowered_depth > 0 {
            self.table.mark_dynamic(scope);
        }

        let saved_scope = std::mem::replace(&mut self.scope, scope);
        let saved_with = std::mem::replace(&mut self.with_depth, 0);
        let result = self.function_body(func);
        self.scope = saved_scope;
        self.with_depth = saved_with;
        result
    }

    fn function_body(&mut self, func: &mut FunctionNode) -> Result<(), CompileError> {
        for param in &mut func.params {
            param.var = Some(self.table.declare_parameter(self.scope, &param.name));
        }
        self.hoist(&func.body);
        // A function expression sees its own name unless a parameter or
        // variable of the same name shadows it.
        if !func.is_declaration
            && let Some(name) = &mut func.name
            && self.table.scope(self.scope).lookup_own(&name.name).is_none()
        {
            let var = self.table.declare(self.scope, &name.name);
            self.table.add_assigned_type(var, ValueType::Function);
            name.var = Some(var);
        }
        for stmt in &mut func.body {
            self.analyze(stmt)?;
        }
        Ok(())
    }
}

impl Default for Analyzer {
    fn default() -> Self {
        Self::new()
    }
}
