//! Function bodies and closures.
//!
//! Nested functions are generated depth-first into the unit's function list
//! before the enclosing code refers to them by index with `Closure`.
//! Function declarations are instantiated at body entry, ahead of any other
//! statement, so they can be called before their position in the source.
//! A named function expression binds its own name to the running function
//! object first of all.

use lumen_core::{CompileError, Span};
use lumen_syntax::{FunctionNode, Node};

use crate::analyzer::hoisted_functions;
use crate::bytecode::OpCode;

use super::{FunctionGen, FunctionShape, Result};

impl FunctionGen<'_, '_> {
    /// Generate `func` and return its index in the unit.
    pub(super) fn function(&mut self, func: &FunctionNode, span: Span) -> Result<usize> {
        let scope = func.scope.ok_or_else(|| CompileError::Unresolved {
            name: func.display_name().to_string(),
            span,
        })?;
        let params = func
            .params
            .iter()
            .map(|param| self.param_slot(param, span))
            .collect::<Result<Vec<_>>>()?;
        let layout = self.table.layout(scope);

        let mut nested = FunctionGen::new(
            self.table,
            scope,
            self.emitter.constants(),
            &mut *self.functions,
        );
        nested.emitter.set_span(span);
        if !func.is_declaration
            && let Some(name) = func.name.as_ref().filter(|name| name.var.is_some())
        {
            nested.emitter.emit(OpCode::GetCallee);
            nested.store_identifier(name, span)?;
            nested.emitter.emit_pop();
        }
        nested.body(&func.body)?;
        nested.emitter.emit(OpCode::ReturnUndefined);
        let compiled = nested.finish(FunctionShape {
            name: func.display_name().into(),
            params,
            local_count: layout.local_count,
            env_names: layout.env_names,
            span,
        });

        self.functions.push(compiled);
        Ok(self.functions.len() - 1)
    }

    /// Hoisted declarations, then the statements.
    pub(super) fn body(&mut self, body: &[Node]) -> Result<()> {
        for func in hoisted_functions(body) {
            self.declare_function(func)?;
        }
        for stmt in body {
            self.statement(stmt)?;
        }
        Ok(())
    }

    fn declare_function(&mut self, func: &FunctionNode) -> Result<()> {
        let span = self.emitter.current_span();
        let Some(name) = &func.name else {
            return Ok(());
        };
        let index = self.function(func, span)?;
        self.emitter.emit_closure(index)?;
        self.store_identifier(name, span)?;
        self.emitter.emit_pop();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::bytecode::OpCode;
    use crate::codegen::tests::generate;
    use crate::scope::VarSlot;
    use lumen_syntax::build::*;

    #[test]
    fn declarations_are_hoisted_to_entry() {
        let unit = generate(program(vec![
            call(ident("f"), vec![]),
            block(vec![function_decl("f", &[], vec![])]),
        ]));
        unit.entry().chunk.assert_opcodes(&[
            OpCode::Closure,
            OpCode::SetGlobal,
            OpCode::Pop,
            OpCode::GetGlobal,
            OpCode::CallGlobal,
            OpCode::SetLocal,
            OpCode::Pop,
            OpCode::GetLocal,
            OpCode::Return,
        ]);
    }

    #[test]
    fn parameter_storage() {
        let unit = generate(program(vec![function_decl(
            "f",
            &["a", "b"],
            vec![
                function_decl("g", &[], vec![ret(Some(ident("b")))]),
                ret(Some(ident("a"))),
            ],
        )]));
        let f = unit.functions.iter().find(|f| &*f.name == "f").unwrap();
        assert_eq!(f.params, vec![VarSlot::Local(0), VarSlot::Env(0)]);
        assert!(f.needs_env());
    }

    #[test]
    fn function_expression_emits_closure() {
        let unit = generate(program(vec![assign(
            ident("h"),
            function_expr(None, &[], vec![ret(Some(num(1.0)))]),
        )]));
        assert_eq!(&*unit.functions[0].name, "<anonymous>");
        unit.entry()
            .chunk
            .assert_contains_opcodes(&[OpCode::Closure, OpCode::SetGlobal]);
    }

    #[test]
    fn named_function_expression_binds_callee() {
        let unit = generate(program(vec![var(
            "f",
            Some(function_expr(Some("g"), &[], vec![ret(Some(ident("g")))])),
        )]));
        let g = unit.functions.iter().find(|f| &*f.name == "g").unwrap();
        g.chunk.assert_opcodes(&[
            OpCode::GetCallee,
            OpCode::SetLocal,
            OpCode::Pop,
            OpCode::GetLocal,
            OpCode::Return,
            OpCode::ReturnUndefined,
        ]);
        assert!(!unit.global_declarations.iter().any(|name| &**name == "g"));
    }
}
