//! Bytecode interpreter.
//!
//! Script calls recurse on the host stack: every call of a compiled function
//! runs its own dispatch loop over a fresh [`Frame`]. A thrown value or an
//! engine error unwinds to the innermost `try` of the current frame, or
//! propagates to the caller when there is none.

mod dispatch;
mod frame;
mod operators;

use std::rc::Rc;

use lumen_compiler::bytecode::{BytecodeChunk, OpCode};
use lumen_compiler::{CallSite, CompiledFunction, CompiledUnit};
use lumen_core::{
    Callable, Closure, EnvKind, Environment, FunctionRef, JsObject, NameRef, NativeCall, ObjectHandle,
    ObjectHeap, PropertyDescriptor, PropertyFlags, PropertyRead, PropertyWrite, RuntimeError,
    Value,
};

use crate::builtins::Realm;
use crate::config::EngineConfig;
use frame::Frame;

pub(crate) type Result<T> = std::result::Result<T, RuntimeError>;

/// Borrowed engine state for the duration of one run.
pub(crate) struct Vm<'e> {
    heap: &'e mut ObjectHeap,
    realm: Realm,
    units: &'e [Rc<CompiledUnit>],
    config: &'e EngineConfig,
    depth: usize,
}

impl<'e> Vm<'e> {
    pub fn new(
        heap: &'e mut ObjectHeap,
        realm: Realm,
        units: &'e [Rc<CompiledUnit>],
        config: &'e EngineConfig,
    ) -> Self {
        Self {
            heap,
            realm,
            units,
            config,
            depth: 0,
        }
    }

    /// Run the entry function of unit `unit_id` with the global object as
    /// `this`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn run_unit(&mut self, unit_id: u32) -> Result<Value> {
        let entry = self.unit(unit_id)?.entry;
        let this = Value::Object(self.realm.global);
        self.enter(unit_id, entry, None, Value::Undefined, this, &[])
    }

    /// Call any value. Non-callables raise `NotCallable` naming `what`.
    pub fn call_value(
        &mut self,
        callee: Value,
        this: Value,
        args: Vec<Value>,
        what: &str,
    ) -> Result<Value> {
        let target = callee
            .as_object()
            .and_then(|handle| Some((handle, self.callable_of(handle)?)));
        match target {
            Some((handle, callable)) => self.call_callable(handle, callable, this, args),
            None => Err(RuntimeError::NotCallable {
                what: what.to_string(),
            }),
        }
    }

    fn call_object(&mut self, handle: ObjectHandle, this: Value, args: Vec<Value>) -> Result<Value> {
        self.call_value(Value::Object(handle), this, args, "accessor")
    }

    /// Run `callable`, the behavior of the function object `callee`.
    fn call_callable(
        &mut self,
        callee: ObjectHandle,
        callable: Callable,
        this: Value,
        args: Vec<Value>,
    ) -> Result<Value> {
        match callable {
            Callable::Native(native) => {
                native.call(&mut NativeCall::new(this, &args, &mut *self.heap))
            }
            Callable::Script(Closure { function, env }) => {
                let callee = Value::Object(callee);
                self.enter(function.unit, function.index as usize, env, callee, this, &args)
            }
        }
    }

    fn callable_of(&self, handle: ObjectHandle) -> Option<Callable> {
        self.heap.get(handle)?.callable().cloned()
    }

    fn unit(&self, unit_id: u32) -> Result<Rc<CompiledUnit>> {
        self.units
            .get(unit_id as usize)
            .cloned()
            .ok_or_else(|| RuntimeError::internal(format!("unknown unit {unit_id}")))
    }

    /// Depth-checked activation of one compiled function.
    fn enter(
        &mut self,
        unit_id: u32,
        index: usize,
        closure_env: Option<Rc<Environment>>,
        callee: Value,
        this: Value,
        args: &[Value],
    ) -> Result<Value> {
        if self.depth >= self.config.max_call_depth {
            return Err(RuntimeError::StackOverflow {
                depth: self.config.max_call_depth,
            });
        }
        self.depth += 1;
        let result = self.execute(unit_id, index, closure_env, callee, this, args);
        self.depth -= 1;
        result
    }

    fn execute(
        &mut self,
        unit_id: u32,
        index: usize,
        closure_env: Option<Rc<Environment>>,
        callee: Value,
        this: Value,
        args: &[Value],
    ) -> Result<Value> {
        let unit = self.unit(unit_id)?;
        let function = unit.function(index).ok_or_else(|| {
            RuntimeError::internal(format!("unknown function {index} in unit {unit_id}"))
        })?;
        let mut frame = Frame::new(function, closure_env, this, args);
        frame.callee = callee;

        loop {
            match self.step(unit_id, &unit, function, &mut frame) {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => {}
                Err(error) if error.is_catchable() && frame.has_handler() => {
                    let exception = self.exception_value(error);
                    frame.unwind(exception);
                }
                Err(error) => return Err(error),
            }
        }
    }

    /// Execute one instruction. `Some` carries the function's return value.
    fn step(
        &mut self,
        unit_id: u32,
        unit: &CompiledUnit,
        function: &CompiledFunction,
        frame: &mut Frame,
    ) -> Result<Option<Value>> {
        let chunk = &function.chunk;
        let Some(op) = frame.read_op(chunk)? else {
            return Ok(Some(Value::Undefined));
        };

        match op {
            // Constants
            OpCode::Constant => {
                let index = frame.read_u16(chunk)?;
                let constant = unit.constants.get(u32::from(index)).ok_or_else(|| {
                    RuntimeError::internal(format!("constant {index} out of range"))
                })?;
                frame.push(constant.to_value());
            }
            OpCode::PushUndefined => frame.push(Value::Undefined),
            OpCode::PushNull => frame.push(Value::Null),
            OpCode::PushTrue => frame.push(Value::Bool(true)),
            OpCode::PushFalse => frame.push(Value::Bool(false)),

            // Stack
            OpCode::Pop => {
                frame.pop()?;
            }
            OpCode::Dup => {
                let top = frame.peek()?.clone();
                frame.push(top);
            }

            // Statically resolved variables
            OpCode::GetLocal => {
                let slot = frame.read_u16(chunk)?;
                let value = frame.local(slot)?;
                frame.push(value);
            }
            OpCode::SetLocal => {
                let slot = frame.read_u16(chunk)?;
                let value = frame.peek()?.clone();
                frame.set_local(slot, value)?;
            }
            OpCode::GetEnv => {
                let depth = frame.read_u8(chunk)?;
                let slot = frame.read_u16(chunk)?;
                let value = frame.env_at(depth)?.get(slot as usize);
                frame.push(value);
            }
            OpCode::SetEnv => {
                let depth = frame.read_u8(chunk)?;
                let slot = frame.read_u16(chunk)?;
                let value = frame.peek()?.clone();
                if !frame.env_at(depth)?.set(slot as usize, value) {
                    return Err(RuntimeError::internal(format!(
                        "environment slot {slot} out of range"
                    )));
                }
            }
            OpCode::GetGlobal => {
                let name = name_operand(unit, frame, chunk)?;
                let value = self.get_global(&name)?;
                frame.push(value);
            }
            OpCode::SetGlobal => {
                let name = name_operand(unit, frame, chunk)?;
                let value = frame.peek()?.clone();
                let global = self.realm.global;
                self.put(global, &name, value)?;
            }
            OpCode::DeleteGlobal => {
                let name = name_operand(unit, frame, chunk)?;
                let global = self.realm.global;
                let deleted = self.heap.delete_property(global, &name);
                frame.push(Value::Bool(deleted));
            }

            // Runtime scope-chain walk
            OpCode::GetName => {
                let name = name_operand(unit, frame, chunk)?;
                let value = match self.resolve(frame, &name) {
                    NameRef::Slot { env, index } => env.get(index),
                    NameRef::Property(object) => {
                        let read = self.heap.get_property(object, &name);
                        self.resolve_read(read, Value::Object(object))?
                    }
                    NameRef::Unbound => self.get_global(&name)?,
                };
                frame.push(value);
            }
            OpCode::SetName => {
                let name = name_operand(unit, frame, chunk)?;
                let value = frame.peek()?.clone();
                let global = self.realm.global;
                match self.resolve(frame, &name) {
                    NameRef::Slot { env, index } => {
                        env.set(index, value);
                    }
                    NameRef::Property(object) => self.put(object, &name, value)?,
                    NameRef::Unbound => self.put(global, &name, value)?,
                }
            }
            OpCode::CallName => {
                let name = name_operand(unit, frame, chunk)?;
                let argc = frame.read_u8(chunk)?;
                let args = frame.pop_args(argc as usize)?;
                let global = self.realm.global;
                let (callee, this) = match self.resolve(frame, &name) {
                    NameRef::Slot { env, index } => (env.get(index), Value::Object(global)),
                    NameRef::Property(object) => {
                        let read = self.heap.get_property(object, &name);
                        let this = Value::Object(object);
                        (self.resolve_read(read, this.clone())?, this)
                    }
                    NameRef::Unbound => (self.get_global(&name)?, Value::Object(global)),
                };
                let value = self.call_value(callee, this, args, &name)?;
                frame.push(value);
            }
            OpCode::DeleteName => {
                let name = name_operand(unit, frame, chunk)?;
                let global = self.realm.global;
                let deleted = match self.resolve(frame, &name) {
                    NameRef::Slot { .. } => false,
                    NameRef::Property(object) => self.heap.delete_property(object, &name),
                    NameRef::Unbound => self.heap.delete_property(global, &name),
                };
                frame.push(Value::Bool(deleted));
            }

            // Members and calls through call sites
            OpCode::GetMember => {
                let site = site_operand(function, frame, chunk)?;
                let receiver = frame.pop()?;
                let value = self.get_member(site, receiver)?;
                frame.push(value);
            }
            OpCode::SetMember => {
                let site = site_operand(function, frame, chunk)?;
                let value = frame.pop()?;
                let receiver = frame.pop()?;
                self.set_member(site, receiver, value.clone())?;
                frame.push(value);
            }
            OpCode::DeleteMember => {
                let name = name_operand(unit, frame, chunk)?;
                let deleted = match frame.pop()? {
                    Value::Object(object) => self.heap.delete_property(object, &name),
                    other if other.is_nullish() => {
                        return Err(RuntimeError::type_error(format!(
                            "cannot delete property '{name}' of {other}"
                        )));
                    }
                    _ => true,
                };
                frame.push(Value::Bool(deleted));
            }
            OpCode::CallGlobal => {
                let site = site_operand(function, frame, chunk)?;
                let args = frame.pop_args(site.info().argc as usize)?;
                let callee = frame.pop()?;
                let value = self.call_global(site, callee, args)?;
                frame.push(value);
            }
            OpCode::InvokeMember => {
                let site = site_operand(function, frame, chunk)?;
                let args = frame.pop_args(site.info().argc as usize)?;
                let receiver = frame.pop()?;
                let value = self.invoke_member(site, receiver, args)?;
                frame.push(value);
            }
            OpCode::Call => {
                let argc = frame.read_u8(chunk)?;
                let args = frame.pop_args(argc as usize)?;
                let callee = frame.pop()?;
                let this = Value::Object(self.realm.global);
                let value = self.call_value(callee, this, args, "expression")?;
                frame.push(value);
            }

            // Objects and functions
            OpCode::Closure => {
                let target = frame.read_u16(chunk)?;
                let handle = self.closure(unit_id, unit, u32::from(target), frame)?;
                frame.push(Value::Object(handle));
            }
            OpCode::NewObject => {
                let object = JsObject::with_prototype(Some(self.realm.object_prototype));
                frame.push(Value::Object(self.heap.allocate(object)));
            }
            OpCode::InitProperty => {
                let name = name_operand(unit, frame, chunk)?;
                let value = frame.pop()?;
                let Value::Object(object) = *frame.peek()? else {
                    return Err(RuntimeError::internal("InitProperty on a non-object"));
                };
                self.heap.define_property(
                    object,
                    name,
                    PropertyDescriptor::data(value, PropertyFlags::DEFAULT),
                );
            }
            OpCode::GetThis => {
                let this = frame.this.clone();
                frame.push(this);
            }
            OpCode::GetCallee => {
                let callee = frame.callee.clone();
                frame.push(callee);
            }

            // Operators
            OpCode::Add
            | OpCode::Sub
            | OpCode::Mul
            | OpCode::Div
            | OpCode::Mod
            | OpCode::Less
            | OpCode::LessEqual
            | OpCode::Greater
            | OpCode::GreaterEqual
            | OpCode::Equal
            | OpCode::NotEqual
            | OpCode::StrictEqual
            | OpCode::StrictNotEqual => {
                let rhs = frame.pop()?;
                let lhs = frame.pop()?;
                frame.push(operators::binary(op, &lhs, &rhs)?);
            }
            OpCode::Neg | OpCode::Plus | OpCode::Not => {
                let operand = frame.pop()?;
                frame.push(operators::unary(op, &operand)?);
            }
            OpCode::Typeof => {
                let operand = frame.pop()?;
                let name = self.type_of(&operand);
                frame.push(Value::string(name));
            }

            // Control flow
            OpCode::Jump => {
                let offset = frame.read_u16(chunk)?;
                frame.ip += offset as usize;
            }
            OpCode::JumpIfFalse => {
                let offset = frame.read_u16(chunk)?;
                if !frame.pop()?.to_boolean() {
                    frame.ip += offset as usize;
                }
            }
            OpCode::JumpIfFalseOrPop => {
                let offset = frame.read_u16(chunk)?;
                if frame.peek()?.to_boolean() {
                    frame.pop()?;
                } else {
                    frame.ip += offset as usize;
                }
            }
            OpCode::JumpIfTrueOrPop => {
                let offset = frame.read_u16(chunk)?;
                if frame.peek()?.to_boolean() {
                    frame.ip += offset as usize;
                } else {
                    frame.pop()?;
                }
            }
            OpCode::Loop => {
                let offset = frame.read_u16(chunk)?;
                frame.ip = frame
                    .ip
                    .checked_sub(offset as usize)
                    .ok_or_else(|| RuntimeError::internal("loop target before chunk start"))?;
            }

            // Dynamic scope
            OpCode::EnterWith => {
                let object = match frame.pop()? {
                    Value::Object(object) => object,
                    other => {
                        return Err(RuntimeError::type_error(format!(
                            "with target is not an object: {other}"
                        )));
                    }
                };
                let parent = frame.env.take();
                frame.env = Some(Environment::with_object(object, parent));
            }
            OpCode::ExitWith => {
                let env = frame
                    .env
                    .take()
                    .ok_or_else(|| RuntimeError::internal("ExitWith without an environment"))?;
                if !matches!(env.kind(), EnvKind::With(_)) {
                    return Err(RuntimeError::internal("ExitWith outside a with body"));
                }
                frame.env = env.parent().cloned();
            }

            // Exceptions
            OpCode::TryBegin => {
                let offset = frame.read_u16(chunk)?;
                frame.push_handler(frame.ip + offset as usize);
            }
            OpCode::TryEnd => frame.pop_handler()?,
            OpCode::Throw => return Err(RuntimeError::Thrown(frame.pop()?)),

            OpCode::Return => return Ok(Some(frame.pop()?)),
            OpCode::ReturnUndefined => return Ok(Some(Value::Undefined)),
        }
        Ok(None)
    }

    // ==========================================================================
    // Helpers
    // ==========================================================================

    /// Instantiate function `target` of the unit over the frame's current
    /// environment.
    fn closure(
        &mut self,
        unit_id: u32,
        unit: &CompiledUnit,
        target: u32,
        frame: &Frame,
    ) -> Result<ObjectHandle> {
        let function = unit.function(target as usize).ok_or_else(|| {
            RuntimeError::internal(format!("unknown function {target} in unit {unit_id}"))
        })?;
        let callable = Callable::Script(Closure {
            function: FunctionRef {
                unit: unit_id,
                index: target,
            },
            env: frame.env.clone(),
        });
        let handle = self.heap.allocate(JsObject::function(
            Some(self.realm.function_prototype),
            callable,
        ));
        self.heap.define_property(
            handle,
            "name",
            PropertyDescriptor::data(
                Value::String(Rc::clone(&function.name)),
                PropertyFlags::HIDDEN,
            ),
        );
        self.heap.define_property(
            handle,
            "length",
            PropertyDescriptor::data(
                Value::Number(function.param_count() as f64),
                PropertyFlags::HIDDEN,
            ),
        );
        Ok(handle)
    }

    fn resolve(&self, frame: &Frame, name: &str) -> NameRef {
        match &frame.env {
            Some(env) => env.resolve(name, &*self.heap),
            None => NameRef::Unbound,
        }
    }

    /// A global read; absent names read as `undefined`.
    fn get_global(&mut self, name: &str) -> Result<Value> {
        let global = self.realm.global;
        let read = self.heap.get_property(global, name);
        self.resolve_read(read, Value::Object(global))
    }

    /// Property write that runs setters.
    fn put(&mut self, object: ObjectHandle, name: &str, value: Value) -> Result<()> {
        match self.heap.set_property(object, name, value.clone()) {
            PropertyWrite::Setter(setter) => self
                .call_object(setter, Value::Object(object), vec![value])
                .map(drop),
            PropertyWrite::Stored | PropertyWrite::Ignored => Ok(()),
        }
    }

    /// Runs the getter of an accessor read with `this` as receiver.
    fn resolve_read(&mut self, read: PropertyRead, this: Value) -> Result<Value> {
        match read {
            PropertyRead::Value(value) => Ok(value),
            PropertyRead::Getter(getter) => self.call_object(getter, this, Vec::new()),
        }
    }

    fn type_of(&self, value: &Value) -> &'static str {
        match value {
            Value::Undefined => "undefined",
            Value::Null => "object",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Object(handle) => {
                if self.heap.get(*handle).is_some_and(JsObject::is_callable) {
                    "function"
                } else {
                    "object"
                }
            }
        }
    }

    /// The value a `catch` parameter receives. Engine errors become objects
    /// with `name` and `message`.
    fn exception_value(&mut self, error: RuntimeError) -> Value {
        if let RuntimeError::Thrown(value) = error {
            return value;
        }
        let object = self
            .heap
            .allocate(JsObject::with_prototype(Some(self.realm.object_prototype)));
        self.heap.define_property(
            object,
            "name",
            PropertyDescriptor::data(Value::string(error.name()), PropertyFlags::DEFAULT),
        );
        self.heap.define_property(
            object,
            "message",
            PropertyDescriptor::data(Value::string(error.message()), PropertyFlags::DEFAULT),
        );
        Value::Object(object)
    }
}

fn name_operand(unit: &CompiledUnit, frame: &mut Frame, chunk: &BytecodeChunk) -> Result<Rc<str>> {
    let index = frame.read_u16(chunk)?;
    unit.constants
        .name(u32::from(index))
        .cloned()
        .ok_or_else(|| RuntimeError::internal(format!("constant {index} is not a name")))
}

fn site_operand<'f>(
    function: &'f CompiledFunction,
    frame: &mut Frame,
    chunk: &BytecodeChunk,
) -> Result<&'f CallSite> {
    let index = frame.read_u16(chunk)?;
    function
        .call_sites
        .get(index as usize)
        .ok_or_else(|| RuntimeError::internal(format!("call site {index} out of range")))
}
