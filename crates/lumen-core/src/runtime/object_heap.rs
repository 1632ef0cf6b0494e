//! Generational arena holding every runtime object.
//!
//! Prototype links and property values refer to objects by [`ObjectHandle`],
//! so object graphs never own each other. Nothing is reclaimed while code
//! runs: objects live until a [`collect`](ObjectHeap::collect) finds them
//! unreachable or the heap is dropped.

use std::fmt;
use std::rc::Rc;

use rustc_hash::FxHashSet;

use super::environment::{EnvKind, Environment};
use super::object::{Callable, Closure, JsObject, PropertyDescriptor, PropertyFlags};
use crate::value::Value;

/// Handle to an object in the [`ObjectHeap`].
///
/// The generation detects handles that outlived the object they named.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ObjectHandle {
    pub index: u32,
    pub generation: u32,
}

/// Outcome of a property read.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyRead {
    /// A plain value, `undefined` when the name was not found.
    Value(Value),
    /// An accessor; the caller invokes the getter with the receiver as `this`.
    Getter(ObjectHandle),
}

/// Outcome of a property write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyWrite {
    /// The value was stored.
    Stored,
    /// The target was read-only (or an accessor without setter); nothing changed.
    Ignored,
    /// An accessor; the caller invokes the setter with the receiver as `this`.
    Setter(ObjectHandle),
}

struct HeapSlot {
    generation: u32,
    object: Option<JsObject>,
}

impl HeapSlot {
    fn release(&mut self) {
        self.object = None;
        self.generation = self.generation.wrapping_add(1);
    }
}

/// Storage for all objects of one engine.
///
/// Allocation never collects. Hosts reclaim memory with
/// [`collect`](Self::collect) between runs, when no frame holds handles the
/// heap cannot see.
pub struct ObjectHeap {
    slots: Vec<HeapSlot>,
    free_list: Vec<u32>,
    /// Advances whenever a property is added or removed anywhere.
    shape_epoch: u64,
}

impl ObjectHeap {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free_list: Vec::new(),
            shape_epoch: 0,
        }
    }

    pub fn allocate(&mut self, object: JsObject) -> ObjectHandle {
        if let Some(index) = self.free_list.pop() {
            let slot = &mut self.slots[index as usize];
            slot.object = Some(object);
            ObjectHandle {
                index,
                generation: slot.generation,
            }
        } else {
            let index = self.slots.len() as u32;
            self.slots.push(HeapSlot {
                generation: 0,
                object: Some(object),
            });
            ObjectHandle {
                index,
                generation: 0,
            }
        }
    }

    /// Returns None if the handle is stale.
    pub fn get(&self, handle: ObjectHandle) -> Option<&JsObject> {
        let slot = self.slots.get(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.object.as_ref()
    }

    pub fn get_mut(&mut self, handle: ObjectHandle) -> Option<&mut JsObject> {
        let slot = self.slots.get_mut(handle.index as usize)?;
        if slot.generation != handle.generation {
            return None;
        }
        slot.object.as_mut()
    }

    /// Free every object not reachable from `roots` and return how many
    /// were freed. Handles to freed objects become stale.
    ///
    /// Reachability follows prototypes, property values, accessors and the
    /// environments of script closures. Objects known only to native
    /// functions or to the host must be passed as roots.
    pub fn collect(&mut self, roots: impl IntoIterator<Item = ObjectHandle>) -> usize {
        let mut marker = Marker {
            marked: vec![false; self.slots.len()],
            pending: roots.into_iter().collect(),
            environments: FxHashSet::default(),
        };
        while let Some(handle) = marker.pending.pop() {
            let Some(object) = self.get(handle) else {
                continue;
            };
            let seen = &mut marker.marked[handle.index as usize];
            if *seen {
                continue;
            }
            *seen = true;
            marker.trace(object);
        }

        let mut freed = 0;
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.object.is_some() && !marker.marked[index] {
                slot.release();
                self.free_list.push(index as u32);
                freed += 1;
            }
        }
        if freed > 0 {
            self.shape_epoch += 1;
        }
        freed
    }

    /// Number of live objects.
    pub fn live_count(&self) -> usize {
        self.slots.len() - self.free_list.len()
    }

    /// Current shape epoch, used as an inline-cache guard.
    pub fn shape_epoch(&self) -> u64 {
        self.shape_epoch
    }

    // ==========================================================================
    // Property access
    // ==========================================================================

    /// The object on the prototype chain of `handle` (itself included) that
    /// owns `name`.
    pub fn find_holder(&self, handle: ObjectHandle, name: &str) -> Option<ObjectHandle> {
        let mut current = Some(handle);
        while let Some(h) = current {
            let object = self.get(h)?;
            if object.has_own(name) {
                return Some(h);
            }
            current = object.prototype();
        }
        None
    }

    pub fn has_property(&self, handle: ObjectHandle, name: &str) -> bool {
        self.find_holder(handle, name).is_some()
    }

    /// Read `name` as an own property of `holder`, without walking the chain.
    pub fn read_own(&self, holder: ObjectHandle, name: &str) -> PropertyRead {
        match self.get(holder).and_then(|object| object.own(name)) {
            Some(PropertyDescriptor::Data { value, .. }) => PropertyRead::Value(value.clone()),
            Some(PropertyDescriptor::Accessor {
                getter: Some(getter),
                ..
            }) => PropertyRead::Getter(*getter),
            Some(PropertyDescriptor::Accessor { getter: None, .. }) | None => {
                PropertyRead::Value(Value::Undefined)
            }
        }
    }

    /// Own properties first, then the prototype chain; `undefined` on a miss.
    pub fn get_property(&self, handle: ObjectHandle, name: &str) -> PropertyRead {
        match self.find_holder(handle, name) {
            Some(holder) => self.read_own(holder, name),
            None => PropertyRead::Value(Value::Undefined),
        }
    }

    /// Write an own property. The prototype chain is never consulted.
    pub fn set_property(
        &mut self,
        handle: ObjectHandle,
        name: &str,
        value: Value,
    ) -> PropertyWrite {
        let Some(object) = self.get_mut(handle) else {
            return PropertyWrite::Ignored;
        };
        match object.own_mut(name) {
            Some(PropertyDescriptor::Data {
                value: slot,
                flags,
            }) => {
                if !flags.contains(PropertyFlags::WRITABLE) {
                    return PropertyWrite::Ignored;
                }
                *slot = value;
                PropertyWrite::Stored
            }
            Some(PropertyDescriptor::Accessor { setter, .. }) => match setter {
                Some(setter) => PropertyWrite::Setter(*setter),
                None => PropertyWrite::Ignored,
            },
            None => {
                object.insert(
                    Rc::from(name),
                    PropertyDescriptor::data(value, PropertyFlags::DEFAULT),
                );
                self.shape_epoch += 1;
                PropertyWrite::Stored
            }
        }
    }

    /// Store a value into an existing own writable data property.
    ///
    /// Returns false when the fast path does not apply.
    pub fn overwrite_own(&mut self, handle: ObjectHandle, name: &str, value: Value) -> bool {
        let slot = self
            .get_mut(handle)
            .and_then(|object| object.own_mut(name));
        match slot {
            Some(PropertyDescriptor::Data { value: slot, flags })
                if flags.contains(PropertyFlags::WRITABLE) =>
            {
                *slot = value;
                true
            }
            _ => false,
        }
    }

    /// Create or replace an own property with explicit attributes.
    pub fn define_property(
        &mut self,
        handle: ObjectHandle,
        name: impl Into<Rc<str>>,
        descriptor: PropertyDescriptor,
    ) -> bool {
        let Some(object) = self.get_mut(handle) else {
            return false;
        };
        object.insert(name.into(), descriptor);
        // Replacing a data property by an accessor changes how reads resolve.
        self.shape_epoch += 1;
        true
    }

    /// Remove an own property.
    ///
    /// Returns false only when the property exists and is not deletable.
    pub fn delete_property(&mut self, handle: ObjectHandle, name: &str) -> bool {
        let Some(object) = self.get_mut(handle) else {
            return true;
        };
        match object.own(name) {
            Some(descriptor) if !descriptor.is_deletable() => false,
            Some(_) => {
                object.remove(name);
                self.shape_epoch += 1;
                true
            }
            None => true,
        }
    }

    /// The prototype chain of `handle`, starting with its prototype.
    pub fn prototypes(&self, handle: ObjectHandle) -> Prototypes<'_> {
        Prototypes {
            heap: self,
            next: self.get(handle).and_then(JsObject::prototype),
        }
    }
}

/// Mark state of one [`ObjectHeap::collect`].
struct Marker {
    marked: Vec<bool>,
    pending: Vec<ObjectHandle>,
    environments: FxHashSet<*const Environment>,
}

impl Marker {
    fn trace(&mut self, object: &JsObject) {
        self.pending.extend(object.prototype());
        for descriptor in object.descriptors() {
            match descriptor {
                PropertyDescriptor::Data { value, .. } => self.value(value),
                PropertyDescriptor::Accessor { getter, setter, .. } => {
                    self.pending.extend(getter.iter().chain(setter.iter()));
                }
            }
        }
        if let Some(Callable::Script(Closure { env: Some(env), .. })) = object.callable() {
            self.environment(env);
        }
    }

    fn value(&mut self, value: &Value) {
        if let Value::Object(handle) = value {
            self.pending.push(*handle);
        }
    }

    /// The chain from `env` up; shared parents are walked once.
    fn environment(&mut self, env: &Rc<Environment>) {
        let mut current = Some(env);
        while let Some(env) = current {
            if !self.environments.insert(Rc::as_ptr(env)) {
                break;
            }
            if let EnvKind::With(object) = env.kind() {
                self.pending.push(*object);
            }
            env.for_each_value(|value| self.value(value));
            current = env.parent();
        }
    }
}

impl Default for ObjectHeap {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ObjectHeap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectHeap")
            .field("live", &self.live_count())
            .field("shape_epoch", &self.shape_epoch)
            .finish()
    }
}

/// Iterator over a prototype chain.
pub struct Prototypes<'heap> {
    heap: &'heap ObjectHeap,
    next: Option<ObjectHandle>,
}

impl Iterator for Prototypes<'_> {
    type Item = ObjectHandle;

    fn next(&mut self) -> Option<ObjectHandle> {
        let current = self.next?;
        self.next = self.heap.get(current).and_then(JsObject::prototype);
        Some(current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(heap: &mut ObjectHeap, prototype: Option<ObjectHandle>) -> ObjectHandle {
        heap.allocate(JsObject::with_prototype(prototype))
    }

    #[test]
    fn own_property_shadows_prototype() {
        let mut heap = ObjectHeap::new();
        let proto = object(&mut heap, None);
        let obj = object(&mut heap, Some(proto));

        heap.set_property(proto, "x", Value::Number(1.0));
        assert_eq!(
            heap.get_property(obj, "x"),
            PropertyRead::Value(Value::Number(1.0))
        );

        heap.set_property(obj, "x", Value::Number(2.0));
        assert_eq!(
            heap.get_property(obj, "x"),
            PropertyRead::Value(Value::Number(2.0))
        );
        assert_eq!(
            heap.get_property(proto, "x"),
            PropertyRead::Value(Value::Number(1.0))
        );
    }

    #[test]
    fn delete_exposes_prototype_value() {
        let mut heap = ObjectHeap::new();
        let proto = object(&mut heap, None);
        let obj = object(&mut heap, Some(proto));
        heap.set_property(proto, "x", Value::string("proto"));
        heap.set_property(obj, "x", Value::string("own"));

        assert!(heap.delete_property(obj, "x"));
        assert_eq!(
            heap.get_property(obj, "x"),
            PropertyRead::Value(Value::string("proto"))
        );
    }

    #[test]
    fn miss_is_undefined() {
        let mut heap = ObjectHeap::new();
        let obj = object(&mut heap, None);
        assert_eq!(
            heap.get_property(obj, "nope"),
            PropertyRead::Value(Value::Undefined)
        );
    }

    #[test]
    fn read_only_write_is_ignored() {
        let mut heap = ObjectHeap::new();
        let obj = object(&mut heap, None);
        heap.define_property(
            obj,
            "length",
            PropertyDescriptor::data(Value::Number(1.0), PropertyFlags::HIDDEN),
        );

        assert_eq!(
            heap.set_property(obj, "length", Value::Number(5.0)),
            PropertyWrite::Ignored
        );
        assert_eq!(
            heap.get_property(obj, "length"),
            PropertyRead::Value(Value::Number(1.0))
        );
        assert!(!heap.delete_property(obj, "length"));
    }

    #[test]
    fn writes_never_reach_the_prototype() {
        let mut heap = ObjectHeap::new();
        let proto = object(&mut heap, None);
        let obj = object(&mut heap, Some(proto));
        heap.define_property(
            proto,
            "fixed",
            PropertyDescriptor::data(Value::Number(1.0), PropertyFlags::HIDDEN),
        );

        // The read-only prototype property does not block an own write.
        assert_eq!(
            heap.set_property(obj, "fixed", Value::Number(2.0)),
            PropertyWrite::Stored
        );
        assert!(heap.get(obj).unwrap().has_own("fixed"));
    }

    #[test]
    fn accessors_report_getter_and_setter() {
        let mut heap = ObjectHeap::new();
        let getter = object(&mut heap, None);
        let obj = object(&mut heap, None);
        heap.define_property(
            obj,
            "x",
            PropertyDescriptor::Accessor {
                getter: Some(getter),
                setter: None,
                flags: PropertyFlags::DEFAULT,
            },
        );

        assert_eq!(heap.get_property(obj, "x"), PropertyRead::Getter(getter));
        assert_eq!(
            heap.set_property(obj, "x", Value::Null),
            PropertyWrite::Ignored
        );
    }

    #[test]
    fn shape_epoch_tracks_additions_and_removals() {
        let mut heap = ObjectHeap::new();
        let obj = object(&mut heap, None);
        let start = heap.shape_epoch();

        heap.set_property(obj, "a", Value::Number(1.0));
        let after_add = heap.shape_epoch();
        assert!(after_add > start);

        heap.set_property(obj, "a", Value::Number(2.0));
        assert_eq!(heap.shape_epoch(), after_add);

        heap.delete_property(obj, "a");
        assert!(heap.shape_epoch() > after_add);
    }

    #[test]
    fn stale_handles_resolve_to_nothing() {
        let mut heap = ObjectHeap::new();
        let first = object(&mut heap, None);
        assert_eq!(heap.collect([]), 1);
        let second = object(&mut heap, None);

        assert_eq!(first.index, second.index);
        assert!(heap.get(first).is_none());
        assert!(heap.get(second).is_some());
        assert_eq!(heap.live_count(), 1);
    }

    #[test]
    fn collect_keeps_everything_reachable_from_roots() {
        let mut heap = ObjectHeap::new();
        let proto = object(&mut heap, None);
        let root = object(&mut heap, Some(proto));
        let child = object(&mut heap, None);
        let getter = object(&mut heap, None);
        let garbage = object(&mut heap, None);
        let cycle = object(&mut heap, None);
        heap.set_property(root, "child", Value::Object(child));
        heap.define_property(
            child,
            "x",
            PropertyDescriptor::Accessor {
                getter: Some(getter),
                setter: None,
                flags: PropertyFlags::DEFAULT,
            },
        );
        heap.set_property(garbage, "next", Value::Object(cycle));
        heap.set_property(cycle, "next", Value::Object(garbage));
        let epoch = heap.shape_epoch();

        assert_eq!(heap.collect([root]), 2);
        assert!(heap.get(garbage).is_none());
        assert!(heap.get(cycle).is_none());
        for live in [proto, root, child, getter] {
            assert!(heap.get(live).is_some());
        }
        assert_eq!(heap.live_count(), 4);
        assert!(heap.shape_epoch() > epoch);
        // Nothing left to free.
        assert_eq!(heap.collect([root]), 0);
    }

    #[test]
    fn collect_follows_closure_environments() {
        let mut heap = ObjectHeap::new();
        let captured = object(&mut heap, None);
        let scope_object = object(&mut heap, None);
        let outer = Environment::declarative(Rc::from(vec![Rc::from("x")]), None);
        outer.set(0, Value::Object(captured));
        let env = Environment::with_object(scope_object, Some(outer));
        let closure = Callable::Script(Closure {
            function: crate::runtime::FunctionRef { unit: 0, index: 0 },
            env: Some(env),
        });
        let function = heap.allocate(JsObject::function(None, closure));

        assert_eq!(heap.collect([function]), 0);
        assert!(heap.get(captured).is_some());
        assert!(heap.get(scope_object).is_some());

        assert_eq!(heap.collect([]), 3);
        assert_eq!(heap.live_count(), 0);
    }

    #[test]
    fn prototype_iteration() {
        let mut heap = ObjectHeap::new();
        let root = object(&mut heap, None);
        let middle = object(&mut heap, Some(root));
        let leaf = object(&mut heap, Some(middle));

        let chain: Vec<_> = heap.prototypes(leaf).collect();
        assert_eq!(chain, vec![middle, root]);
    }
}
