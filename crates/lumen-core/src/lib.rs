//! Lumen Core
//!
//! Shared types for the Lumen script engine: source spans, the error
//! hierarchy, dynamic values and the runtime object model.
//!
//! ## Modules
//!
//! - [`span`]: Source positions carried by syntax nodes
//! - [`error`]: Compile and runtime errors
//! - [`value`]: The dynamic [`Value`] and its coarse [`ValueType`]
//! - [`runtime`]: Objects, properties, callables, environments

pub mod error;
pub mod runtime;
pub mod span;
pub mod value;

pub use error::{CompileError, LumenError, RuntimeError};
pub use runtime::{
    Callable, Closure, EnvKind, Environment, FunctionRef, JsObject, NameRef, NativeCall,
    NativeCallable, NativeFn, ObjectHandle, ObjectHeap, PropertyDescriptor, PropertyFlags,
    PropertyRead, PropertyWrite,
};
pub use span::Span;
pub use value::{Value, ValueType, format_number};
