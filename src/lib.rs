//! Lumen
//!
//! A small dynamically typed script engine. Programs arrive as
//! [`lumen_syntax`] trees, are compiled by [`lumen_compiler`] into bytecode
//! whose dynamic operations go through per-site inline caches, and run on
//! the interpreter in this crate.
//!
//! ## Modules
//!
//! - [`builtins`]: Intrinsic objects and builtin natives
//! - [`config`]: Engine settings
//! - [`engine`]: The [`Engine`] facade
//!
//! ## Quick start
//!
//! ```
//! use lumen::{Engine, Value};
//! use lumen_syntax::build::*;
//!
//! let mut engine = Engine::new();
//! let value = engine
//!     .eval(program(vec![
//!         function_decl("sq", &["x"], vec![ret(Some(binary(
//!             lumen_syntax::BinaryOp::Mul,
//!             ident("x"),
//!             ident("x"),
//!         )))]),
//!         call(ident("sq"), vec![num(7.0)]),
//!     ]))
//!     .unwrap();
//! assert_eq!(value, Value::Number(49.0));
//! ```

pub mod builtins;
pub mod config;
pub mod engine;
mod vm;

pub use builtins::Realm;
pub use config::{CacheMode, EngineConfig};
pub use engine::{Engine, UnitId};

pub use lumen_compiler::{CacheStats, CompiledUnit, Compiler};
pub use lumen_core::{
    CompileError, LumenError, NativeCall, NativeFn, ObjectHandle, RuntimeError, Value,
};
