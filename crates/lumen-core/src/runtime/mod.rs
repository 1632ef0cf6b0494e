//! Runtime object model.
//!
//! ## Key Types
//!
//! - [`ObjectHeap`]: Generational arena owning every [`JsObject`]
//! - [`PropertyDescriptor`]: Data or accessor property with [`PropertyFlags`]
//! - [`Callable`]: Native or script invocation entry point of a function object
//! - [`NativeFn`]: Type-erased host function, invoked through [`NativeCall`]
//! - [`Environment`]: Scope-chain link for captured variables and `with`

mod environment;
mod native_fn;
mod object;
mod object_heap;

pub use environment::{EnvKind, Environment, NameRef};
pub use native_fn::{NativeCall, NativeCallable, NativeFn};
pub use object::{Callable, Closure, FunctionRef, JsObject, PropertyDescriptor, PropertyFlags};
pub use object_heap::{ObjectHandle, ObjectHeap, PropertyRead, PropertyWrite, Prototypes};

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Value;

    #[test]
    fn function_object_exposes_callable() {
        let mut heap = ObjectHeap::new();
        let native = NativeFn::new("noop", 0, |_: &mut NativeCall<'_>| Ok(Value::Undefined));
        let handle = heap.allocate(JsObject::function(None, Callable::Native(native)));

        let object = heap.get(handle).unwrap();
        assert!(object.is_callable());
        assert!(matches!(object.callable(), Some(Callable::Native(n)) if n.name() == "noop"));
    }

    #[test]
    fn enumerable_keys_skip_hidden_properties() {
        let mut heap = ObjectHeap::new();
        let handle = heap.allocate(JsObject::with_prototype(None));
        heap.set_property(handle, "b", Value::Null);
        heap.set_property(handle, "a", Value::Null);
        heap.define_property(
            handle,
            "length",
            PropertyDescriptor::data(Value::Number(0.0), PropertyFlags::HIDDEN),
        );

        let object = heap.get(handle).unwrap();
        let keys = object.enumerable_keys();
        assert_eq!(object.len(), 3);
        assert_eq!(&*keys[0], "a");
        assert_eq!(&*keys[1], "b");
        assert_eq!(keys.len(), 2);
    }
}
