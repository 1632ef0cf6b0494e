//! The engine facade: owns the heap, the intrinsics and every loaded unit.

use std::rc::Rc;

use lumen_compiler::{CacheStats, CompiledUnit, Compiler};
use lumen_core::{
    CompileError, LumenError, NativeCall, NativeFn, ObjectHandle, ObjectHeap, PropertyDescriptor,
    PropertyFlags, PropertyRead, RuntimeError, Value,
};
use lumen_syntax::Program;
use tracing::debug;

use crate::builtins::Realm;
use crate::config::EngineConfig;
use crate::vm::Vm;

/// Handle of a unit loaded into an [`Engine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UnitId(u32);

impl UnitId {
    pub fn index(self) -> u32 {
        self.0
    }
}

/// A script engine instance.
///
/// Units stay loaded for the engine's lifetime: closures created by one run
/// refer back to their unit and may be called by later runs.
///
/// # Example
///
/// ```
/// use lumen::{Engine, Value};
/// use lumen_syntax::build::*;
///
/// let mut engine = Engine::new();
/// engine.register_native_fn("twice", 1, |call| {
///     Ok(Value::Number(call.arg(0).to_number() * 2.0))
/// });
/// let value = engine
///     .eval(program(vec![call(ident("twice"), vec![num(21.0)])]))
///     .unwrap();
/// assert_eq!(value, Value::Number(42.0));
/// ```
#[derive(Debug)]
pub struct Engine {
    heap: ObjectHeap,
    realm: Realm,
    units: Vec<Rc<CompiledUnit>>,
    config: EngineConfig,
}

impl Engine {
    pub fn new() -> Self {
        Self::with_config(EngineConfig::default())
    }

    pub fn with_config(config: EngineConfig) -> Self {
        let mut heap = ObjectHeap::new();
        let realm = Realm::new(&mut heap);
        Self {
            heap,
            realm,
            units: Vec::new(),
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn heap(&self) -> &ObjectHeap {
        &self.heap
    }

    pub fn heap_mut(&mut self) -> &mut ObjectHeap {
        &mut self.heap
    }

    pub fn realm(&self) -> Realm {
        self.realm
    }

    pub fn global_object(&self) -> ObjectHandle {
        self.realm.global
    }

    // ==========================================================================
    // Host bindings
    // ==========================================================================

    /// Define `native` as a global function under its own name.
    pub fn register_native(&mut self, native: NativeFn) -> ObjectHandle {
        debug!(name = native.name(), length = native.length(), "registering native");
        self.realm
            .define_native(&mut self.heap, self.realm.global, native)
    }

    pub fn register_native_fn<F>(&mut self, name: &str, length: u32, f: F) -> ObjectHandle
    where
        F: Fn(&mut NativeCall<'_>) -> Result<Value, RuntimeError> + 'static,
    {
        self.register_native(NativeFn::new(name, length, f))
    }

    /// Create or overwrite a plain global property.
    pub fn set_global(&mut self, name: &str, value: Value) {
        self.heap.define_property(
            self.realm.global,
            name,
            PropertyDescriptor::data(value, PropertyFlags::DEFAULT),
        );
    }

    /// Read a global, running its getter if it has one.
    pub fn global(&mut self, name: &str) -> Result<Value, RuntimeError> {
        let global = Value::Object(self.realm.global);
        let callee = match self.heap.get_property(self.realm.global, name) {
            PropertyRead::Value(value) => return Ok(value),
            PropertyRead::Getter(getter) => Value::Object(getter),
        };
        self.call(&callee, global, &[])
    }

    // ==========================================================================
    // Compilation and execution
    // ==========================================================================

    /// Analyze and generate `program`, then load the unit.
    pub fn compile(&mut self, program: &mut Program) -> Result<UnitId, CompileError> {
        let compilation = Compiler::compile(program)?;
        Ok(self.load(compilation.unit))
    }

    /// Load an already generated unit.
    pub fn load(&mut self, unit: CompiledUnit) -> UnitId {
        let id = UnitId(self.units.len() as u32);
        debug!(
            unit = id.0,
            functions = unit.functions.len(),
            call_sites = unit.call_site_count(),
            "loaded unit"
        );
        self.units.push(Rc::new(unit));
        id
    }

    pub fn unit(&self, id: UnitId) -> Option<&CompiledUnit> {
        self.units.get(id.0 as usize).map(|unit| &**unit)
    }

    /// Run a loaded unit and return its completion value.
    ///
    /// Top-level declarations are defined on the global object first, as
    /// non-deletable `undefined` unless the name already exists.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run(&mut self, id: UnitId) -> Result<Value, RuntimeError> {
        let unit = self
            .units
            .get(id.0 as usize)
            .cloned()
            .ok_or_else(|| RuntimeError::internal(format!("unknown unit {}", id.0)))?;
        let global = self.realm.global;
        for name in &unit.global_declarations {
            let exists = self
                .heap
                .get(global)
                .is_some_and(|object| object.has_own(name));
            if !exists {
                self.heap.define_property(
                    global,
                    Rc::clone(name),
                    PropertyDescriptor::data(
                        Value::Undefined,
                        PropertyFlags::ENUMERABLE | PropertyFlags::WRITABLE,
                    ),
                );
            }
        }
        Vm::new(&mut self.heap, self.realm, &self.units, &self.config).run_unit(id.0)
    }

    /// Compile and run `program`.
    pub fn eval(&mut self, mut program: Program) -> Result<Value, LumenError> {
        let id = self.compile(&mut program)?;
        Ok(self.run(id)?)
    }

    /// Call a function value from the host.
    pub fn call(&mut self, callee: &Value, this: Value, args: &[Value]) -> Result<Value, RuntimeError> {
        Vm::new(&mut self.heap, self.realm, &self.units, &self.config).call_value(
            callee.clone(),
            this,
            args.to_vec(),
            "value",
        )
    }

    /// Reclaim objects that nothing can reach any more and return how many
    /// were freed.
    ///
    /// The intrinsics, the global object and everything reachable from them
    /// survive. Values the host still holds must be listed in `keep`; any
    /// other handle the host kept goes stale and behaves as a missing object.
    pub fn collect_garbage(&mut self, keep: &[Value]) -> usize {
        let realm = self.realm;
        let roots = [realm.global, realm.object_prototype, realm.function_prototype]
            .into_iter()
            .chain(keep.iter().filter_map(Value::as_object));
        let freed = self.heap.collect(roots);
        debug!(freed, live = self.heap.live_count(), "collected garbage");
        freed
    }

    // ==========================================================================
    // Inline caches
    // ==========================================================================

    /// Hit and miss counters over every loaded unit.
    pub fn cache_stats(&self) -> CacheStats {
        self.units
            .iter()
            .map(|unit| unit.cache_stats())
            .fold(CacheStats::default(), |acc, stats| acc + stats)
    }

    pub fn reset_caches(&self) {
        for unit in &self.units {
            unit.reset_caches();
        }
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}
