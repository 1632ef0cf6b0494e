//! The objects every engine starts with.
//!
//! - `Object.prototype`, the root of every object literal's chain, with
//!   `valueOf` and `hasOwnProperty`
//! - the prototype of function objects
//! - the global object with `Object.create`, `Object.getPrototypeOf` and an
//!   `eval` that always throws

use std::rc::Rc;

use lumen_core::{
    Callable, JsObject, NativeCall, NativeFn, ObjectHandle, ObjectHeap, PropertyDescriptor,
    PropertyFlags, RuntimeError, Value,
};

/// Flags of engine-installed methods: not enumerable.
const METHOD_FLAGS: PropertyFlags = PropertyFlags::WRITABLE.union(PropertyFlags::DELETABLE);

/// Handles of the intrinsic objects of one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Realm {
    pub global: ObjectHandle,
    pub object_prototype: ObjectHandle,
    pub function_prototype: ObjectHandle,
}

impl Realm {
    /// Allocate the intrinsics in `heap` and install the builtins.
    pub fn new(heap: &mut ObjectHeap) -> Self {
        let object_prototype = heap.allocate(JsObject::with_prototype(None));
        let function_prototype = heap.allocate(JsObject::with_prototype(Some(object_prototype)));
        let global = heap.allocate(JsObject::with_prototype(Some(object_prototype)));
        let realm = Self {
            global,
            object_prototype,
            function_prototype,
        };

        realm.define_native(
            heap,
            object_prototype,
            NativeFn::new("valueOf", 0, |call| Ok(call.this().clone())),
        );
        realm.define_native(
            heap,
            object_prototype,
            NativeFn::new("hasOwnProperty", 1, has_own_property),
        );

        let object = heap.allocate(JsObject::with_prototype(Some(object_prototype)));
        realm.define_native(heap, object, NativeFn::new("create", 1, object_create));
        realm.define_native(
            heap,
            object,
            NativeFn::new("getPrototypeOf", 1, get_prototype_of),
        );
        heap.define_property(
            global,
            "Object",
            PropertyDescriptor::data(Value::Object(object), METHOD_FLAGS),
        );

        realm.define_native(
            heap,
            global,
            NativeFn::new("eval", 1, |_| {
                Err(RuntimeError::type_error("eval is not supported"))
            }),
        );
        realm
    }

    /// Wrap `native` in a function object with read-only `name` and `length`.
    pub fn native_function(&self, heap: &mut ObjectHeap, native: NativeFn) -> ObjectHandle {
        let name: Rc<str> = Rc::from(native.name());
        let length = native.length();
        let function = heap.allocate(JsObject::function(
            Some(self.function_prototype),
            Callable::Native(native),
        ));
        heap.define_property(
            function,
            "name",
            PropertyDescriptor::data(Value::String(name), PropertyFlags::HIDDEN),
        );
        heap.define_property(
            function,
            "length",
            PropertyDescriptor::data(Value::Number(f64::from(length)), PropertyFlags::HIDDEN),
        );
        function
    }

    /// Install `native` as a non-enumerable method of `target` under its own
    /// name.
    pub fn define_native(
        &self,
        heap: &mut ObjectHeap,
        target: ObjectHandle,
        native: NativeFn,
    ) -> ObjectHandle {
        let name: Rc<str> = Rc::from(native.name());
        let function = self.native_function(heap, native);
        heap.define_property(
            target,
            name,
            PropertyDescriptor::data(Value::Object(function), METHOD_FLAGS),
        );
        function
    }
}

fn has_own_property(call: &mut NativeCall<'_>) -> Result<Value, RuntimeError> {
    let name = call.arg(0).to_display_string();
    let own = match call.this() {
        Value::Object(handle) => call
            .heap()
            .get(*handle)
            .is_some_and(|object| object.has_own(&name)),
        _ => false,
    };
    Ok(Value::Bool(own))
}

fn object_create(call: &mut NativeCall<'_>) -> Result<Value, RuntimeError> {
    let prototype = match call.arg(0) {
        Value::Object(handle) => Some(handle),
        Value::Null => None,
        other => {
            return Err(RuntimeError::type_error(format!(
                "object prototype may only be an object or null: {other}"
            )));
        }
    };
    let object = call.heap_mut().allocate(JsObject::with_prototype(prototype));
    Ok(Value::Object(object))
}

fn get_prototype_of(call: &mut NativeCall<'_>) -> Result<Value, RuntimeError> {
    let Value::Object(handle) = call.arg(0) else {
        return Err(RuntimeError::type_error(
            "Object.getPrototypeOf called on non-object",
        ));
    };
    Ok(call
        .heap()
        .get(handle)
        .and_then(JsObject::prototype)
        .map_or(Value::Null, Value::Object))
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumen_core::PropertyRead;

    fn read(heap: &ObjectHeap, handle: ObjectHandle, name: &str) -> Value {
        match heap.get_property(handle, name) {
            PropertyRead::Value(value) => value,
            PropertyRead::Getter(_) => panic!("unexpected accessor"),
        }
    }

    #[test]
    fn intrinsic_chains() {
        let mut heap = ObjectHeap::new();
        let realm = Realm::new(&mut heap);
        let global = heap.get(realm.global).unwrap();
        assert_eq!(global.prototype(), Some(realm.object_prototype));
        assert_eq!(
            heap.get(realm.function_prototype).unwrap().prototype(),
            Some(realm.object_prototype)
        );
        assert_eq!(heap.get(realm.object_prototype).unwrap().prototype(), None);
    }

    #[test]
    fn builtins_are_not_enumerable() {
        let mut heap = ObjectHeap::new();
        let realm = Realm::new(&mut heap);
        assert!(heap.get(realm.global).unwrap().enumerable_keys().is_empty());
        assert!(
            heap.get(realm.object_prototype)
                .unwrap()
                .enumerable_keys()
                .is_empty()
        );
    }

    #[test]
    fn native_functions_expose_length() {
        let mut heap = ObjectHeap::new();
        let realm = Realm::new(&mut heap);
        let Value::Object(eval) = read(&heap, realm.global, "eval") else {
            panic!("eval is not an object");
        };
        assert!(heap.get(eval).unwrap().is_callable());
        assert_eq!(read(&heap, eval, "length"), Value::Number(1.0));
        assert_eq!(read(&heap, eval, "name"), Value::string("eval"));
        // Read-only.
        heap.set_property(eval, "length", Value::Number(5.0));
        assert_eq!(read(&heap, eval, "length"), Value::Number(1.0));
    }

    #[test]
    fn object_create_links_prototype() {
        let mut heap = ObjectHeap::new();
        let proto = heap.allocate(JsObject::with_prototype(None));
        let args = [Value::Object(proto)];
        let mut call = NativeCall::new(Value::Undefined, &args, &mut heap);
        let Value::Object(created) = object_create(&mut call).unwrap() else {
            panic!("expected an object");
        };
        assert_eq!(heap.get(created).unwrap().prototype(), Some(proto));

        let args = [Value::Number(1.0)];
        let mut call = NativeCall::new(Value::Undefined, &args, &mut heap);
        assert!(matches!(
            object_create(&mut call),
            Err(RuntimeError::TypeError { .. })
        ));
    }
}
