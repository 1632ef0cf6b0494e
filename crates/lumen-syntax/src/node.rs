//! Syntax node definitions.
//!
//! The tree is a closed set of node kinds. Every pass (analysis, code
//! generation, printing) matches on [`NodeKind`] exhaustively, so adding a
//! kind is a compile error until every pass handles it.
//!
//! A tree is built once, rewritten in place once by the analyzer (which fills
//! in variable and scope ids, expression types, and may replace nodes), and
//! is read-only afterwards.

use std::rc::Rc;

use lumen_core::{Span, Value, ValueType};

use crate::ids::{ScopeId, VarId};
use crate::ops::{BinaryOp, UnaryOp};

/// A complete compilation unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Program {
    pub body: Vec<Node>,
    /// The global scope, set by analysis.
    pub scope: Option<ScopeId>,
    /// Set once the analyzer has rewritten the tree.
    pub analyzed: bool,
}

impl Program {
    pub fn new(body: Vec<Node>) -> Self {
        Self {
            body,
            scope: None,
            analyzed: false,
        }
    }
}

/// One node of the syntax tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    pub kind: NodeKind,
    pub span: Span,
    /// Expression type, narrowed by analysis.
    pub ty: ValueType,
}

impl Node {
    /// Literals carry their type from construction; everything else starts
    /// as `Any`.
    pub fn new(kind: NodeKind) -> Self {
        let ty = match &kind {
            NodeKind::Literal(lit) => lit.value_type(),
            _ => ValueType::Any,
        };
        Self {
            kind,
            span: Span::default(),
            ty,
        }
    }

    /// Attach a source position.
    pub fn at(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn kind_name(&self) -> &'static str {
        self.kind.name()
    }

    /// Whether this node produces a value when used as an expression.
    pub fn is_expression(&self) -> bool {
        self.kind.is_expression()
    }

    pub fn as_identifier(&self) -> Option<&Identifier> {
        match &self.kind {
            NodeKind::Identifier(ident) => Some(ident),
            _ => None,
        }
    }

    pub fn as_identifier_mut(&mut self) -> Option<&mut Identifier> {
        match &mut self.kind {
            NodeKind::Identifier(ident) => Some(ident),
            _ => None,
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match &self.kind {
            NodeKind::Literal(Literal::Number(n)) => Some(*n),
            _ => None,
        }
    }
}

/// The closed set of node kinds.
#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    // Expressions
    Literal(Literal),
    Identifier(Identifier),
    /// A bare name resolved at runtime by walking the scope chain.
    ///
    /// Produced by the analyzer for names inside a `with` body.
    DynamicIdentifier(Rc<str>),
    This,
    Call {
        target: Box<Node>,
        args: Vec<Node>,
    },
    MemberAccess {
        target: Box<Node>,
        name: Rc<str>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Node>,
        rhs: Box<Node>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Node>,
    },
    Assign {
        target: Box<Node>,
        value: Box<Node>,
    },
    Function(Box<FunctionNode>),
    Object(Vec<ObjectProperty>),
    Delete(Box<Node>),

    // Statements
    Var {
        binding: Identifier,
        init: Option<Box<Node>>,
    },
    Return(Option<Box<Node>>),
    If {
        condition: Box<Node>,
        then_branch: Box<Node>,
        else_branch: Option<Box<Node>>,
    },
    While {
        condition: Box<Node>,
        body: Box<Node>,
    },
    Block(Vec<Node>),
    /// `with (object) body`
    With {
        object: Box<Node>,
        body: Box<Node>,
    },
    Throw(Box<Node>),
    Try {
        block: Box<Node>,
        catch_param: Option<Identifier>,
        handler: Box<Node>,
    },
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::Literal(_) => "literal",
            NodeKind::Identifier(_) => "identifier",
            NodeKind::DynamicIdentifier(_) => "dynamic",
            NodeKind::This => "this",
            NodeKind::Call { .. } => "call",
            NodeKind::MemberAccess { .. } => "member",
            NodeKind::Binary { .. } => "binary",
            NodeKind::Unary { .. } => "unary",
            NodeKind::Assign { .. } => "assign",
            NodeKind::Function(_) => "function",
            NodeKind::Object(_) => "object",
            NodeKind::Delete(_) => "delete",
            NodeKind::Var { .. } => "var",
            NodeKind::Return(_) => "return",
            NodeKind::If { .. } => "if",
            NodeKind::While { .. } => "while",
            NodeKind::Block(_) => "block",
            NodeKind::With { .. } => "with",
            NodeKind::Throw(_) => "throw",
            NodeKind::Try { .. } => "try",
        }
    }

    pub fn is_expression(&self) -> bool {
        match self {
            NodeKind::Literal(_)
            | NodeKind::Identifier(_)
            | NodeKind::DynamicIdentifier(_)
            | NodeKind::This
            | NodeKind::Call { .. }
            | NodeKind::MemberAccess { .. }
            | NodeKind::Binary { .. }
            | NodeKind::Unary { .. }
            | NodeKind::Assign { .. }
            | NodeKind::Object(_)
            | NodeKind::Delete(_) => true,
            NodeKind::Function(func) => !func.is_declaration,
            NodeKind::Var { .. }
            | NodeKind::Return(_)
            | NodeKind::If { .. }
            | NodeKind::While { .. }
            | NodeKind::Block(_)
            | NodeKind::With { .. }
            | NodeKind::Throw(_)
            | NodeKind::Try { .. } => false,
        }
    }
}

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Literal {
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(Rc<str>),
}

impl Literal {
    pub fn value_type(&self) -> ValueType {
        match self {
            Literal::Undefined => ValueType::Undefined,
            Literal::Null => ValueType::Null,
            Literal::Bool(_) => ValueType::Boolean,
            Literal::Number(_) => ValueType::Number,
            Literal::String(_) => ValueType::String,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Literal::Undefined => Value::Undefined,
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Number(n) => Value::Number(*n),
            Literal::String(s) => Value::String(Rc::clone(s)),
        }
    }
}

/// A bare name in definition or reference position.
#[derive(Debug, Clone, PartialEq)]
pub struct Identifier {
    pub name: Rc<str>,
    /// Parameter, `var` binding, function declaration or catch parameter.
    pub is_definition: bool,
    /// The record this name resolved to, set by analysis.
    pub var: Option<VarId>,
}

impl Identifier {
    pub fn reference(name: impl Into<Rc<str>>) -> Self {
        Self {
            name: name.into(),
            is_definition: false,
            var: None,
        }
    }

    pub fn definition(name: impl Into<Rc<str>>) -> Self {
        Self {
            name: name.into(),
            is_definition: true,
            var: None,
        }
    }
}

/// A function declaration or expression.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionNode {
    /// Declarations bind this name in the enclosing scope; expressions only
    /// use it for diagnostics.
    pub name: Option<Identifier>,
    pub params: Vec<Identifier>,
    pub body: Vec<Node>,
    pub is_declaration: bool,
    /// The function's own scope, set by analysis.
    pub scope: Option<ScopeId>,
}

impl FunctionNode {
    pub fn display_name(&self) -> &str {
        self.name.as_ref().map_or("<anonymous>", |n| &n.name)
    }
}

/// One `name: value` entry of an object literal.
#[derive(Debug, Clone, PartialEq)]
pub struct ObjectProperty {
    pub name: Rc<str>,
    pub value: Node,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_declaration_is_not_an_expression() {
        let decl = Node::new(NodeKind::Function(Box::new(FunctionNode {
            name: Some(Identifier::definition("f")),
            params: vec![],
            body: vec![],
            is_declaration: true,
            scope: None,
        })));
        assert!(!decl.is_expression());

        let mut expr = decl.clone();
        if let NodeKind::Function(func) = &mut expr.kind {
            func.is_declaration = false;
        }
        assert!(expr.is_expression());
    }

    #[test]
    fn literal_types() {
        assert_eq!(Literal::Number(1.0).value_type(), ValueType::Number);
        assert_eq!(Literal::String("a".into()).to_value(), Value::string("a"));
        assert_eq!(Literal::Undefined.to_value(), Value::Undefined);
    }

    #[test]
    fn anonymous_display_name() {
        let func = FunctionNode {
            name: None,
            params: vec![],
            body: vec![],
            is_declaration: false,
            scope: None,
        };
        assert_eq!(func.display_name(), "<anonymous>");
    }
}
