//! Error types for every phase of the engine.
//!
//! ```text
//! LumenError (top-level wrapper)
//! ├── CompileError  - analysis and code generation failures (abort the unit)
//! └── RuntimeError  - execution failures (catchable by script `try`)
//! ```
//!
//! Inline-cache misses and property lookup misses are not errors and never
//! appear here: the former rebind silently, the latter yield `undefined`.

use thiserror::Error;

use crate::Span;
use crate::value::Value;

// ============================================================================
// Compile Errors
// ============================================================================

/// Errors raised while analyzing or generating a compilation unit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompileError {
    /// A construct the static analyzer cannot resolve.
    ///
    /// Raised for identifier definitions inside a `with` body; such code has
    /// to go through the runtime scope-chain lookup instead.
    #[error("at {span}: unsupported construct: {construct}")]
    Unsupported {
        /// Description of the construct.
        construct: String,
        /// Where it appeared.
        span: Span,
    },

    /// The left side of an assignment is not assignable.
    #[error("at {span}: invalid assignment target")]
    InvalidAssignmentTarget { span: Span },

    /// A node was used where the code generator needs an expression.
    #[error("at {span}: expected an expression, found {found}")]
    ExpectedExpression { found: &'static str, span: Span },

    /// A fixed-width operand overflowed (too many constants, slots or sites).
    #[error("at {span}: {what} limit exceeded ({limit})")]
    LimitExceeded {
        what: &'static str,
        limit: usize,
        span: Span,
    },

    /// Code generation was asked to emit a node the analyzer never saw.
    #[error("at {span}: identifier '{name}' was not analyzed")]
    Unresolved { name: String, span: Span },
}

impl CompileError {
    pub fn unsupported(construct: impl Into<String>, span: Span) -> Self {
        CompileError::Unsupported {
            construct: construct.into(),
            span,
        }
    }

    /// Get the span where this error occurred.
    pub fn span(&self) -> Span {
        match self {
            CompileError::Unsupported { span, .. }
            | CompileError::InvalidAssignmentTarget { span }
            | CompileError::ExpectedExpression { span, .. }
            | CompileError::LimitExceeded { span, .. }
            | CompileError::Unresolved { span, .. } => *span,
        }
    }
}

// ============================================================================
// Runtime Errors
// ============================================================================

/// Errors raised while executing generated code or native callables.
///
/// All variants unwind through script frames like a `throw`; a script
/// `catch` receives [`RuntimeError::Thrown`] payloads unchanged and engine
/// errors converted to error objects.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    /// A value thrown by script code or by a native callable.
    #[error("uncaught exception: {0}")]
    Thrown(Value),

    /// A call target did not hold a callable object.
    #[error("TypeError: {what} is not a function")]
    NotCallable { what: String },

    /// A type error raised by the engine or a native callable.
    #[error("TypeError: {message}")]
    TypeError { message: String },

    /// The configured call depth was exceeded.
    #[error("RangeError: maximum call depth {depth} exceeded")]
    StackOverflow { depth: usize },

    /// Generated code was malformed. Indicates a code generator bug.
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl RuntimeError {
    pub fn type_error(message: impl Into<String>) -> Self {
        RuntimeError::TypeError {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        RuntimeError::Internal {
            message: message.into(),
        }
    }

    /// Script-visible error name (`catch (e) { e.name }`).
    pub fn name(&self) -> &'static str {
        match self {
            RuntimeError::Thrown(_) => "Error",
            RuntimeError::NotCallable { .. } | RuntimeError::TypeError { .. } => "TypeError",
            RuntimeError::StackOverflow { .. } => "RangeError",
            RuntimeError::Internal { .. } => "InternalError",
        }
    }

    /// Script-visible message, without the name prefix.
    pub fn message(&self) -> String {
        match self {
            RuntimeError::Thrown(value) => value.to_string(),
            RuntimeError::NotCallable { what } => format!("{what} is not a function"),
            RuntimeError::TypeError { message } => message.clone(),
            RuntimeError::StackOverflow { depth } => {
                format!("maximum call depth {depth} exceeded")
            }
            RuntimeError::Internal { message } => message.clone(),
        }
    }

    /// Internal errors are bugs and are never handed to script handlers.
    pub fn is_catchable(&self) -> bool {
        !matches!(self, RuntimeError::Internal { .. })
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Error type for operations spanning compilation and execution.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum LumenError {
    #[error(transparent)]
    Compile(#[from] CompileError),

    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl LumenError {
    pub fn is_compile(&self) -> bool {
        matches!(self, LumenError::Compile(_))
    }

    pub fn is_runtime(&self) -> bool {
        matches!(self, LumenError::Runtime(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsupported_display() {
        let err = CompileError::unsupported("identifier 'x' inside with", Span::new(2, 7, 1));
        assert_eq!(
            err.to_string(),
            "at 2:7: unsupported construct: identifier 'x' inside with"
        );
        assert_eq!(err.span(), Span::new(2, 7, 1));
    }

    #[test]
    fn not_callable_display() {
        let err = RuntimeError::NotCallable {
            what: "foo".into(),
        };
        assert_eq!(err.to_string(), "TypeError: foo is not a function");
        assert_eq!(err.name(), "TypeError");
        assert_eq!(err.message(), "foo is not a function");
    }

    #[test]
    fn internal_errors_are_not_catchable() {
        assert!(!RuntimeError::internal("bad operand").is_catchable());
        assert!(RuntimeError::Thrown(Value::Number(1.0)).is_catchable());
        assert!(RuntimeError::StackOverflow { depth: 3 }.is_catchable());
    }

    #[test]
    fn conversion_into_unified_error() {
        let err: LumenError = RuntimeError::type_error("boom").into();
        assert!(err.is_runtime());
        let err: LumenError = CompileError::InvalidAssignmentTarget {
            span: Span::default(),
        }
        .into();
        assert!(err.is_compile());
    }
}
