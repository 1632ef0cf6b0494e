//! Host functions callable from scripts.
//!
//! A native callable receives the receiver, the positional arguments and the
//! heap, and returns a value or raises a [`RuntimeError`]. Script code calls
//! natives exactly like script functions.

use std::fmt;
use std::rc::Rc;

use super::ObjectHeap;
use crate::error::RuntimeError;
use crate::value::Value;

/// Type-erased native function.
///
/// The inner callable is reference counted so function objects can be cloned
/// into inline caches without duplicating host state.
#[derive(Clone)]
pub struct NativeFn {
    name: Rc<str>,
    length: u32,
    inner: Rc<dyn NativeCallable>,
}

impl NativeFn {
    /// Wrap a callable under a script-visible name and declared arity.
    pub fn new<F>(name: impl Into<Rc<str>>, length: u32, f: F) -> Self
    where
        F: Fn(&mut NativeCall<'_>) -> Result<Value, RuntimeError> + 'static,
    {
        Self::from_callable(name, length, f)
    }

    /// Wrap any [`NativeCallable`], including stateful host types.
    pub fn from_callable<C>(name: impl Into<Rc<str>>, length: u32, callable: C) -> Self
    where
        C: NativeCallable + 'static,
    {
        Self {
            name: name.into(),
            length,
            inner: Rc::new(callable),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared arity, exposed to scripts as the read-only `length` property.
    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn call(&self, ctx: &mut NativeCall<'_>) -> Result<Value, RuntimeError> {
        self.inner.call(ctx)
    }

    /// Whether two handles share the same underlying callable.
    pub fn ptr_eq(&self, other: &NativeFn) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeFn")
            .field("name", &self.name)
            .field("length", &self.length)
            .finish_non_exhaustive()
    }
}

/// Trait for callable native functions.
pub trait NativeCallable {
    fn call(&self, ctx: &mut NativeCall<'_>) -> Result<Value, RuntimeError>;
}

impl<F> NativeCallable for F
where
    F: Fn(&mut NativeCall<'_>) -> Result<Value, RuntimeError>,
{
    fn call(&self, ctx: &mut NativeCall<'_>) -> Result<Value, RuntimeError> {
        (self)(ctx)
    }
}

/// Arguments and heap access for one native invocation.
pub struct NativeCall<'a> {
    this: Value,
    args: &'a [Value],
    heap: &'a mut ObjectHeap,
}

impl<'a> NativeCall<'a> {
    pub fn new(this: Value, args: &'a [Value], heap: &'a mut ObjectHeap) -> Self {
        Self { this, args, heap }
    }

    /// The receiver. The global object for plain calls.
    pub fn this(&self) -> &Value {
        &self.this
    }

    /// Argument `index`, or `undefined` when fewer were passed.
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).cloned().unwrap_or_default()
    }

    pub fn arg_count(&self) -> usize {
        self.args.len()
    }

    pub fn args(&self) -> &[Value] {
        self.args
    }

    pub fn heap(&self) -> &ObjectHeap {
        self.heap
    }

    pub fn heap_mut(&mut self) -> &mut ObjectHeap {
        self.heap
    }
}

impl fmt::Debug for NativeCall<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeCall")
            .field("this", &self.this)
            .field("args", &self.args)
            .finish_non_exhaustive()
    }
}
