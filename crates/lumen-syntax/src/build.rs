//! Tree construction helpers.
//!
//! Stands in for a parser: each helper builds one node with an unknown span.
//! Use [`Node::at`] to attach positions.
//!
//! ```
//! use lumen_syntax::build::*;
//!
//! // function outer() { var x = 1; function inner() { return x; } return inner; }
//! let program = program(vec![function_decl(
//!     "outer",
//!     &[],
//!     vec![
//!         var("x", Some(num(1.0))),
//!         function_decl("inner", &[], vec![ret(Some(ident("x")))]),
//!         ret(Some(ident("inner"))),
//!     ],
//! )]);
//! assert_eq!(program.body.len(), 1);
//! ```

use std::rc::Rc;

use crate::node::{FunctionNode, Identifier, Literal, Node, NodeKind, ObjectProperty, Program};
use crate::ops::{BinaryOp, UnaryOp};

pub fn program(body: Vec<Node>) -> Program {
    Program::new(body)
}

// ==========================================================================
// Literals
// ==========================================================================

pub fn num(n: f64) -> Node {
    Node::new(NodeKind::Literal(Literal::Number(n)))
}

pub fn string(s: &str) -> Node {
    Node::new(NodeKind::Literal(Literal::String(Rc::from(s))))
}

pub fn boolean(b: bool) -> Node {
    Node::new(NodeKind::Literal(Literal::Bool(b)))
}

pub fn null() -> Node {
    Node::new(NodeKind::Literal(Literal::Null))
}

pub fn undefined() -> Node {
    Node::new(NodeKind::Literal(Literal::Undefined))
}

// ==========================================================================
// Expressions
// ==========================================================================

/// A name in reference position.
pub fn ident(name: &str) -> Node {
    Node::new(NodeKind::Identifier(Identifier::reference(name)))
}

pub fn this() -> Node {
    Node::new(NodeKind::This)
}

pub fn call(target: Node, args: Vec<Node>) -> Node {
    Node::new(NodeKind::Call {
        target: Box::new(target),
        args,
    })
}

pub fn member(target: Node, name: &str) -> Node {
    Node::new(NodeKind::MemberAccess {
        target: Box::new(target),
        name: Rc::from(name),
    })
}

/// `target.name(args...)`
pub fn method_call(target: Node, name: &str, args: Vec<Node>) -> Node {
    call(member(target, name), args)
}

pub fn binary(op: BinaryOp, lhs: Node, rhs: Node) -> Node {
    Node::new(NodeKind::Binary {
        op,
        lhs: Box::new(lhs),
        rhs: Box::new(rhs),
    })
}

pub fn add(lhs: Node, rhs: Node) -> Node {
    binary(BinaryOp::Add, lhs, rhs)
}

pub fn unary(op: UnaryOp, operand: Node) -> Node {
    Node::new(NodeKind::Unary {
        op,
        operand: Box::new(operand),
    })
}

pub fn assign(target: Node, value: Node) -> Node {
    Node::new(NodeKind::Assign {
        target: Box::new(target),
        value: Box::new(value),
    })
}

fn function(name: Option<&str>, params: &[&str], body: Vec<Node>, is_declaration: bool) -> Node {
    Node::new(NodeKind::Function(Box::new(FunctionNode {
        name: name.map(Identifier::definition),
        params: params.iter().map(|p| Identifier::definition(*p)).collect(),
        body,
        is_declaration,
        scope: None,
    })))
}

/// `function name(params) { body }` in statement position.
pub fn function_decl(name: &str, params: &[&str], body: Vec<Node>) -> Node {
    function(Some(name), params, body, true)
}

/// A function expression, optionally named.
pub fn function_expr(name: Option<&str>, params: &[&str], body: Vec<Node>) -> Node {
    function(name, params, body, false)
}

/// `{ name: value, ... }`
pub fn object(properties: Vec<(&str, Node)>) -> Node {
    Node::new(NodeKind::Object(
        properties
            .into_iter()
            .map(|(name, value)| ObjectProperty {
                name: Rc::from(name),
                value,
            })
            .collect(),
    ))
}

pub fn delete(target: Node) -> Node {
    Node::new(NodeKind::Delete(Box::new(target)))
}

// ==========================================================================
// Statements
// ==========================================================================

pub fn var(name: &str, init: Option<Node>) -> Node {
    Node::new(NodeKind::Var {
        binding: Identifier::definition(name),
        init: init.map(Box::new),
    })
}

pub fn ret(value: Option<Node>) -> Node {
    Node::new(NodeKind::Return(value.map(Box::new)))
}

pub fn if_else(condition: Node, then_branch: Node, else_branch: Option<Node>) -> Node {
    Node::new(NodeKind::If {
        condition: Box::new(condition),
        then_branch: Box::new(then_branch),
        else_branch: else_branch.map(Box::new),
    })
}

pub fn while_loop(condition: Node, body: Node) -> Node {
    Node::new(NodeKind::While {
        condition: Box::new(condition),
        body: Box::new(body),
    })
}

pub fn block(statements: Vec<Node>) -> Node {
    Node::new(NodeKind::Block(statements))
}

pub fn with(object: Node, body: Node) -> Node {
    Node::new(NodeKind::With {
        object: Box::new(object),
        body: Box::new(body),
    })
}

pub fn throw(value: Node) -> Node {
    Node::new(NodeKind::Throw(Box::new(value)))
}

/// `try { block } catch (param) { handler }`
pub fn try_catch(block: Node, param: Option<&str>, handler: Node) -> Node {
    Node::new(NodeKind::Try {
        block: Box::new(block),
        catch_param: param.map(Identifier::definition),
        handler: Box::new(handler),
    })
}
