//! Heap-allocated variable environments.
//!
//! Variables captured by closures, and every variable of a function that
//! contains a `with` statement, live in an [`Environment`] rather than in the
//! frame's local slots. Environments form a parent chain mirroring lexical
//! nesting. `with` pushes an object environment onto the chain for the
//! duration of its body.
//!
//! Statically resolved code addresses slots by `(depth, index)`. Dynamically
//! resolved code (anything inside a `with` body) walks the chain by name.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use super::ObjectHeap;
use super::ObjectHandle;
use crate::value::Value;

/// What an environment record binds.
#[derive(Debug, Clone)]
pub enum EnvKind {
    /// Named slots for the variables of one scope.
    Declarative { names: Rc<[Rc<str>]> },
    /// The properties of an object, pushed by `with`.
    With(ObjectHandle),
}

/// One link of the scope chain.
pub struct Environment {
    kind: EnvKind,
    slots: RefCell<Vec<Value>>,
    parent: Option<Rc<Environment>>,
}

/// Where a name resolved on the scope chain.
#[derive(Debug, Clone)]
pub enum NameRef {
    /// A slot of a declarative environment.
    Slot { env: Rc<Environment>, index: usize },
    /// A property (own or inherited) of a `with` object.
    Property(ObjectHandle),
    /// Not bound by any environment; the global object applies.
    Unbound,
}

impl Environment {
    /// A declarative environment with every slot `undefined`.
    pub fn declarative(names: Rc<[Rc<str>]>, parent: Option<Rc<Environment>>) -> Rc<Self> {
        let slots = vec![Value::Undefined; names.len()];
        Rc::new(Self {
            kind: EnvKind::Declarative { names },
            slots: RefCell::new(slots),
            parent,
        })
    }

    /// An object environment for a `with` body.
    pub fn with_object(object: ObjectHandle, parent: Option<Rc<Environment>>) -> Rc<Self> {
        Rc::new(Self {
            kind: EnvKind::With(object),
            slots: RefCell::new(Vec::new()),
            parent,
        })
    }

    pub fn kind(&self) -> &EnvKind {
        &self.kind
    }

    pub fn parent(&self) -> Option<&Rc<Environment>> {
        self.parent.as_ref()
    }

    pub fn slot_count(&self) -> usize {
        self.slots.borrow().len()
    }

    /// Read slot `index`. Out-of-range reads yield `undefined`.
    pub fn get(&self, index: usize) -> Value {
        self.slots.borrow().get(index).cloned().unwrap_or_default()
    }

    /// Write slot `index`. Returns false when out of range.
    pub fn set(&self, index: usize, value: Value) -> bool {
        match self.slots.borrow_mut().get_mut(index) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub(crate) fn for_each_value(&self, mut f: impl FnMut(&Value)) {
        for value in self.slots.borrow().iter() {
            f(value);
        }
    }

    /// The environment `depth` links up the chain (0 is `self`).
    pub fn ancestor(self: &Rc<Self>, depth: usize) -> Option<Rc<Environment>> {
        let mut current = Rc::clone(self);
        for _ in 0..depth {
            let parent = Rc::clone(current.parent.as_ref()?);
            current = parent;
        }
        Some(current)
    }

    /// Walk the chain from `self` outwards looking for `name`.
    ///
    /// A `with` object binds a name when the property exists anywhere on its
    /// prototype chain.
    pub fn resolve(self: &Rc<Self>, name: &str, heap: &ObjectHeap) -> NameRef {
        let mut current = Some(Rc::clone(self));
        while let Some(env) = current {
            match &env.kind {
                EnvKind::With(object) => {
                    if heap.has_property(*object, name) {
                        return NameRef::Property(*object);
                    }
                }
                EnvKind::Declarative { names } => {
                    if let Some(index) = names.iter().position(|n| &**n == name) {
                        return NameRef::Slot {
                            env: Rc::clone(&env),
                            index,
                        };
                    }
                }
            }
            current = env.parent.clone();
        }
        NameRef::Unbound
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("Environment");
        match &self.kind {
            EnvKind::Declarative { names } => s.field("names", names),
            EnvKind::With(object) => s.field("with", object),
        };
        s.field("has_parent", &self.parent.is_some()).finish()
    }
}
