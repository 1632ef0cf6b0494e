//! Tree walks that run ahead of the main analysis pass.
//!
//! - Hoisting: `var` names and function declarations of a function body are
//!   visible throughout the body, so they are declared before it is analyzed.
//! - Dynamic lowering: bare name references inside a `with` body are
//!   rewritten to [`NodeKind::DynamicIdentifier`], which code generation
//!   routes through the runtime scope chain.

use std::rc::Rc;

use lumen_syntax::{FunctionNode, Node, NodeKind};

/// Names declared by `var` statements and function declarations of a body.
///
/// Descends into nested statements but not into nested functions or `with`
/// bodies.
pub(crate) fn hoisted_names(body: &[Node]) -> Vec<Rc<str>> {
    let mut names = Vec::new();
    for stmt in body {
        visit_declarations(stmt, &mut |node| match &node.kind {
            NodeKind::Var { binding, .. } => names.push(Rc::clone(&binding.name)),
            NodeKind::Function(func) => {
                if let Some(name) = &func.name {
                    names.push(Rc::clone(&name.name));
                }
            }
            _ => {}
        });
    }
    names
}

/// Function declarations of a body, in source order, with the same reach
/// as [`hoisted_names`].
pub(crate) fn hoisted_functions(body: &[Node]) -> Vec<&FunctionNode> {
    let mut functions = Vec::new();
    for stmt in body {
        visit_declarations(stmt, &mut |node| {
            if let NodeKind::Function(func) = &node.kind {
                functions.push(&**func);
            }
        });
    }
    functions
}

/// Call `f` on every `var` statement and function declaration reachable
/// without entering a function or `with` body.
fn visit_declarations<'n>(node: &'n Node, f: &mut impl FnMut(&'n Node)) {
    match &node.kind {
        NodeKind::Var { .. } => f(node),
        NodeKind::Function(func) if func.is_declaration => f(node),
        NodeKind::Block(statements) => {
            for stmt in statements {
                visit_declarations(stmt, f);
            }
        }
        NodeKind::If {
            then_branch,
            else_branch,
            ..
        } => {
            visit_declarations(then_branch, f);
            if let Some(else_branch) = else_branch {
                visit_declarations(else_branch, f);
            }
        }
        NodeKind::While { body, .. } => visit_declarations(body, f),
        NodeKind::Try { block, handler, .. } => {
            visit_declarations(block, f);
            visit_declarations(handler, f);
        }
        // Definitions inside `with` are rejected by analysis.
        _ => {}
    }
}

/// Rewrite every bare name reference under `node` to a dynamic lookup,
/// including references inside nested functions.
pub(crate) fn lower_dynamic(node: &mut Node) {
    if let NodeKind::Identifier(ident) = &node.kind
        && !ident.is_definition
    {
        node.kind = NodeKind::DynamicIdentifier(Rc::clone(&ident.name));
        return;
    }
    for_each_child(node, lower_dynamic);
}

/// Apply `f` to every direct child node.
fn for_each_child(node: &mut Node, mut f: impl FnMut(&mut Node)) {
    match &mut node.kind {
        NodeKind::Literal(_)
        | NodeKind::Identifier(_)
        | NodeKind::DynamicIdentifier(_)
        | NodeKind::This => {}
        NodeKind::Call { target, args } => {
            f(target);
            args.iter_mut().for_each(f);
        }
        NodeKind::MemberAccess { target, .. } => f(target),
        NodeKind::Binary { lhs, rhs, .. } => {
            f(lhs);
            f(rhs);
        }
        NodeKind::Unary { operand, .. } => f(operand),
        NodeKind::Assign { target, value } => {
            f(target);
            f(value);
        }
        NodeKind::Function(func) => func.body.iter_mut().for_each(f),
        NodeKind::Object(properties) => {
            for property in properties {
                f(&mut property.value);
            }
        }
        NodeKind::Delete(target) => f(target),
        NodeKind::Var { init, .. } => {
            if let Some(init) = init {
                f(init);
            }
        }
        NodeKind::Return(value) => {
            if let Some(value) = value {
                f(value);
            }
        }
        NodeKind::If {
            condition,
            then_branch,
            else_branch,
        } => {
            f(condition);
            f(then_branch);
            if let Some(else_branch) = else_branch {
                f(else_branch);
            }
        }
        NodeKind::While { condition, body } => {
            f(condition);
            f(body);
        }
        NodeKind::Block(statements) => statements.iter_mut().for_each(f),
        NodeKind::With { object, body } => {
            f(object);
            f(body);
        }
        NodeKind::Throw(value) => f(value),
        NodeKind::Try { block, handler, .. } => {
            f(block);
            f(handler);
        }
    }
}
