//! Objects, property descriptors and callables.

use std::fmt;
use std::rc::Rc;

use bitflags::bitflags;
use rustc_hash::FxHashMap;

use super::{Environment, NativeFn, ObjectHandle};
use crate::value::Value;

bitflags! {
    /// Attribute flags shared by data and accessor properties.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct PropertyFlags: u8 {
        /// Visible to enumeration.
        const ENUMERABLE = 1 << 0;
        /// Data properties only: the value may be replaced by `set`.
        const WRITABLE = 1 << 1;
        /// The property may be removed by `delete`.
        const DELETABLE = 1 << 2;
    }
}

impl PropertyFlags {
    /// Flags of a property created by plain assignment.
    pub const DEFAULT: PropertyFlags = PropertyFlags::all();

    /// Flags used for engine-provided properties such as `length`.
    pub const HIDDEN: PropertyFlags = PropertyFlags::empty();
}

/// Storage and metadata of one property.
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyDescriptor {
    Data {
        value: Value,
        flags: PropertyFlags,
    },
    Accessor {
        getter: Option<ObjectHandle>,
        setter: Option<ObjectHandle>,
        flags: PropertyFlags,
    },
}

impl PropertyDescriptor {
    pub fn data(value: Value, flags: PropertyFlags) -> Self {
        PropertyDescriptor::Data { value, flags }
    }

    pub fn flags(&self) -> PropertyFlags {
        match self {
            PropertyDescriptor::Data { flags, .. } | PropertyDescriptor::Accessor { flags, .. } => {
                *flags
            }
        }
    }

    pub fn is_enumerable(&self) -> bool {
        self.flags().contains(PropertyFlags::ENUMERABLE)
    }

    pub fn is_deletable(&self) -> bool {
        self.flags().contains(PropertyFlags::DELETABLE)
    }
}

/// Identifies a compiled script function: which unit, which function in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FunctionRef {
    pub unit: u32,
    pub index: u32,
}

/// A script function value: code plus the environment it closed over.
#[derive(Debug, Clone)]
pub struct Closure {
    pub function: FunctionRef,
    pub env: Option<Rc<Environment>>,
}

/// The invocation entry point of a callable object.
#[derive(Clone)]
pub enum Callable {
    Native(NativeFn),
    Script(Closure),
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Callable::Native(native) => write!(f, "Native({})", native.name()),
            Callable::Script(closure) => write!(
                f,
                "Script({}:{})",
                closure.function.unit, closure.function.index
            ),
        }
    }
}

/// A runtime object: own properties, a prototype link and, for functions,
/// an invocation entry point.
#[derive(Debug, Default)]
pub struct JsObject {
    properties: FxHashMap<Rc<str>, PropertyDescriptor>,
    prototype: Option<ObjectHandle>,
    callable: Option<Callable>,
}

impl JsObject {
    /// An ordinary object. The prototype is fixed for the object's lifetime.
    pub fn with_prototype(prototype: Option<ObjectHandle>) -> Self {
        Self {
            properties: FxHashMap::default(),
            prototype,
            callable: None,
        }
    }

    /// A function object.
    pub fn function(prototype: Option<ObjectHandle>, callable: Callable) -> Self {
        Self {
            properties: FxHashMap::default(),
            prototype,
            callable: Some(callable),
        }
    }

    pub fn prototype(&self) -> Option<ObjectHandle> {
        self.prototype
    }

    /// Every own property, in no particular order.
    pub(crate) fn descriptors(&self) -> impl Iterator<Item = &PropertyDescriptor> {
        self.properties.values()
    }

    pub fn callable(&self) -> Option<&Callable> {
        self.callable.as_ref()
    }

    pub fn is_callable(&self) -> bool {
        self.callable.is_some()
    }

    pub fn own(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.get(name)
    }

    pub(crate) fn own_mut(&mut self, name: &str) -> Option<&mut PropertyDescriptor> {
        self.properties.get_mut(name)
    }

    pub fn has_own(&self, name: &str) -> bool {
        self.properties.contains_key(name)
    }

    /// Insert or replace a property. Returns true if the name is new.
    pub(crate) fn insert(&mut self, name: Rc<str>, descriptor: PropertyDescriptor) -> bool {
        self.properties.insert(name, descriptor).is_none()
    }

    pub(crate) fn remove(&mut self, name: &str) -> Option<PropertyDescriptor> {
        self.properties.remove(name)
    }

    /// Names of enumerable own properties, sorted for stable output.
    pub fn enumerable_keys(&self) -> Vec<Rc<str>> {
        let mut keys: Vec<Rc<str>> = self
            .properties
            .iter()
            .filter(|(_, desc)| desc.is_enumerable())
            .map(|(name, _)| Rc::clone(name))
            .collect();
        keys.sort();
        keys
    }

    pub fn len(&self) -> usize {
        self.properties.len()
    }

    pub fn is_empty(&self) -> bool {
        self.properties.is_empty()
    }
}
