//! Lumen Syntax
//!
//! The syntax node model consumed by the Lumen compiler.
//!
//! ## Modules
//!
//! - [`node`]: The closed [`NodeKind`] set and its payload types
//! - [`ops`]: Binary and unary operators
//! - [`ids`]: [`ScopeId`] and [`VarId`] handles filled in by analysis
//! - [`build`]: Helpers for constructing trees without a parser
//! - [`print`]: S-expression debug projection

pub mod build;
pub mod ids;
pub mod node;
pub mod ops;
pub mod print;

pub use ids::{ScopeId, VarId};
pub use node::{FunctionNode, Identifier, Literal, Node, NodeKind, ObjectProperty, Program};
pub use ops::{BinaryOp, UnaryOp};
pub use print::{BindingInfo, NoBindings, VarSummary, print_node, print_program};
