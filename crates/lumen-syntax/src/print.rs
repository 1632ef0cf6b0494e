//! Debug projection of a syntax tree.
//!
//! One node per line, children indented by two spaces. Identifiers encode
//! their resolution:
//!
//! ```text
//! (>$name!^ type)
//!  │││   ││
//!  │││   │└─ closed over
//!  │││   └── deletable
//!  ││└────── name
//!  │└─────── global
//!  └──────── definition
//! ```
//!
//! Resolution flags come from a [`BindingInfo`] implementation (the
//! compiler's scope table); without one only the definition marker shows.

use std::fmt::Write;

use lumen_core::format_number;

use crate::ids::VarId;
use crate::node::{Identifier, Literal, Node, NodeKind, Program};

/// Resolution facts about one variable record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VarSummary {
    pub is_global: bool,
    pub is_deletable: bool,
    pub is_closed_over: bool,
}

/// Source of variable facts for printing.
pub trait BindingInfo {
    fn summary(&self, var: VarId) -> Option<VarSummary>;
}

/// Prints unresolved trees.
pub struct NoBindings;

impl BindingInfo for NoBindings {
    fn summary(&self, _var: VarId) -> Option<VarSummary> {
        None
    }
}

pub fn print_program(program: &Program, bindings: &dyn BindingInfo) -> String {
    let mut printer = Printer::new(bindings);
    for node in &program.body {
        printer.node(node, 0);
    }
    printer.out
}

pub fn print_node(node: &Node, bindings: &dyn BindingInfo) -> String {
    let mut printer = Printer::new(bindings);
    printer.node(node, 0);
    printer.out
}

struct Printer<'a> {
    bindings: &'a dyn BindingInfo,
    out: String,
}

impl<'a> Printer<'a> {
    fn new(bindings: &'a dyn BindingInfo) -> Self {
        Self {
            bindings,
            out: String::new(),
        }
    }

    fn line(&mut self, depth: usize, text: &str) {
        for _ in 0..depth {
            self.out.push_str("  ");
        }
        self.out.push_str(text);
        self.out.push('\n');
    }

    fn identifier(&mut self, ident: &Identifier, ty: &str, depth: usize) {
        let summary = ident
            .var
            .and_then(|var| self.bindings.summary(var))
            .unwrap_or_default();
        let mut text = String::from("(");
        if ident.is_definition {
            text.push('>');
        }
        if summary.is_global {
            text.push('$');
        }
        text.push_str(&ident.name);
        if summary.is_deletable {
            text.push('!');
        }
        if summary.is_closed_over {
            text.push('^');
        }
        let _ = write!(text, " {ty})");
        self.line(depth, &text);
    }

    fn node(&mut self, node: &Node, depth: usize) {
        let ty = node.ty.short_name();
        let child = depth + 1;
        match &node.kind {
            NodeKind::Literal(lit) => {
                let text = match lit {
                    Literal::Undefined => "undefined".to_string(),
                    Literal::Null => "null".to_string(),
                    Literal::Bool(b) => b.to_string(),
                    Literal::Number(n) => format_number(*n),
                    Literal::String(s) => format!("{s:?}"),
                };
                self.line(depth, &format!("(literal {text} {ty})"));
            }
            NodeKind::Identifier(ident) => self.identifier(ident, ty, depth),
            NodeKind::DynamicIdentifier(name) => {
                self.line(depth, &format!("(dynamic {name} {ty})"));
            }
            NodeKind::This => self.line(depth, &format!("(this {ty})")),
            NodeKind::Call { target, args } => {
                self.line(depth, &format!("(call {ty})"));
                self.node(target, child);
                for arg in args {
                    self.node(arg, child);
                }
            }
            NodeKind::MemberAccess { target, name } => {
                self.line(depth, &format!("(member .{name} {ty})"));
                self.node(target, child);
            }
            NodeKind::Binary { op, lhs, rhs } => {
                self.line(depth, &format!("(binary {op} {ty})"));
                self.node(lhs, child);
                self.node(rhs, child);
            }
            NodeKind::Unary { op, operand } => {
                self.line(depth, &format!("(unary {op} {ty})"));
                self.node(operand, child);
            }
            NodeKind::Assign { target, value } => {
                self.line(depth, &format!("(assign {ty})"));
                self.node(target, child);
                self.node(value, child);
            }
            NodeKind::Function(func) => {
                self.line(depth, &format!("(function {})", func.display_name()));
                if func.is_declaration
                    && let Some(name) = &func.name
                {
                    self.identifier(name, "fn", child);
                }
                for param in &func.params {
                    self.identifier(param, "any", child);
                }
                for stmt in &func.body {
                    self.node(stmt, child);
                }
            }
            NodeKind::Object(properties) => {
                self.line(depth, &format!("(object {ty})"));
                for property in properties {
                    self.line(child, &format!("(property {})", property.name));
                    self.node(&property.value, child + 1);
                }
            }
            NodeKind::Delete(target) => {
                self.line(depth, &format!("(delete {ty})"));
                self.node(target, child);
            }
            NodeKind::Var { binding, init } => {
                self.line(depth, "(var)");
                let init_ty = init.as_ref().map_or("undef", |n| n.ty.short_name());
                self.identifier(binding, init_ty, child);
                if let Some(init) = init {
                    self.node(init, child);
                }
            }
            NodeKind::Return(value) => {
                self.line(depth, "(return)");
                if let Some(value) = value {
                    self.node(value, child);
                }
            }
            NodeKind::If {
                condition,
                then_branch,
                else_branch,
            } => {
                self.line(depth, "(if)");
                self.node(condition, child);
                self.node(then_branch, child);
                if let Some(else_branch) = else_branch {
                    self.node(else_branch, child);
                }
            }
            NodeKind::While { condition, body } => {
                self.line(depth, "(while)");
                self.node(condition, child);
                self.node(body, child);
            }
            NodeKind::Block(statements) => {
                self.line(depth, "(block)");
                for stmt in statements {
                    self.node(stmt, child);
                }
            }
            NodeKind::With { object, body } => {
                self.line(depth, "(with)");
                self.node(object, child);
                self.node(body, child);
            }
            NodeKind::Throw(value) => {
                self.line(depth, "(throw)");
                self.node(value, child);
            }
            NodeKind::Try {
                block,
                catch_param,
                handler,
            } => {
                self.line(depth, "(try)");
                self.node(block, child);
                if let Some(param) = catch_param {
                    self.identifier(param, "any", child);
                }
                self.node(handler, child);
            }
        }
    }
}
