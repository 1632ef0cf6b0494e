//! Constant pool for compiled units.
//!
//! Holds number and string literals plus every name used by global,
//! member and scope-chain operations.

use std::rc::Rc;

use lumen_core::Value;
use ordered_float::OrderedFloat;
use rustc_hash::FxHashMap;

/// Values stored in the constant pool.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    Number(f64),
    /// A string literal or a property/global name.
    String(Rc<str>),
}

impl Constant {
    pub fn to_value(&self) -> Value {
        match self {
            Constant::Number(n) => Value::Number(*n),
            Constant::String(s) => Value::String(Rc::clone(s)),
        }
    }

    pub fn as_name(&self) -> Option<&Rc<str>> {
        match self {
            Constant::String(s) => Some(s),
            Constant::Number(_) => None,
        }
    }
}

/// Unit-level constant pool with deduplication.
#[derive(Debug, Clone, Default)]
pub struct ConstantPool {
    constants: Vec<Constant>,
    index: FxHashMap<ConstantKey, u32>,
}

/// Hashable form of a [`Constant`].
///
/// `OrderedFloat` equates `0.0` and `-0.0`, so the sign is kept alongside to
/// keep them distinct.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum ConstantKey {
    Number(OrderedFloat<f64>, bool),
    String(Rc<str>),
}

impl ConstantPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or get an existing constant, returns its index.
    pub fn add(&mut self, constant: Constant) -> u32 {
        let key = Self::to_key(&constant);
        if let Some(&idx) = self.index.get(&key) {
            return idx;
        }
        let idx = self.constants.len() as u32;
        self.constants.push(constant);
        self.index.insert(key, idx);
        idx
    }

    pub fn add_number(&mut self, value: f64) -> u32 {
        self.add(Constant::Number(value))
    }

    pub fn add_string(&mut self, value: &Rc<str>) -> u32 {
        self.add(Constant::String(Rc::clone(value)))
    }

    pub fn get(&self, index: u32) -> Option<&Constant> {
        self.constants.get(index as usize)
    }

    /// The string constant at `index`, for name operands.
    pub fn name(&self, index: u32) -> Option<&Rc<str>> {
        self.get(index).and_then(Constant::as_name)
    }

    pub fn constants(&self) -> &[Constant] {
        &self.constants
    }

    pub fn len(&self) -> usize {
        self.constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.constants.is_empty()
    }

    fn to_key(constant: &Constant) -> ConstantKey {
        match constant {
            Constant::Number(n) => ConstantKey::Number(OrderedFloat(*n), n.is_sign_negative()),
            Constant::String(s) => ConstantKey::String(Rc::clone(s)),
        }
    }
}
