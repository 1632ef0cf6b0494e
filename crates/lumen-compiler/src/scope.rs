//! Scope and variable table.
//!
//! One [`Scope`] per function plus the distinguished global scope, stored in
//! an arena and linked by [`ScopeId`]. Every binding is a
//! [`VariableRecord`] owned by exactly one scope and referenced by
//! [`VarId`] from identifier nodes.
//!
//! Storage classes:
//! - `Local`: a frame slot of the declaring function
//! - `Closure`: a slot of the declaring function's heap environment
//! - `Global`: a property of the global object
//!
//! A record moves from `Local` to `Closure` the first time a nested function
//! references it and never moves back. Storage is frozen and slots are
//! numbered by [`ScopeTable::finish`].

use std::rc::Rc;

use bitflags::bitflags;
use lumen_core::ValueType;
use lumen_syntax::{BindingInfo, ScopeId, VarId, VarSummary};
use rustc_hash::{FxHashMap, FxHashSet};

// ============================================================================
// Types
// ============================================================================

/// Where a variable lives at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Storage {
    Local,
    Closure,
    Global,
}

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct VarFlags: u8 {
        /// Removable with `delete`; set on implicitly created globals.
        const DELETABLE = 1 << 0;
        /// Referenced from a nested function.
        const CLOSED_OVER = 1 << 1;
        const PARAMETER = 1 << 2;
    }
}

/// How a variable was observed being used.
///
/// Hints only: nothing in code generation depends on them.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum UsageType {
    /// Called with arguments of these types.
    Function(Vec<ValueType>),
    /// Operand of arithmetic.
    Numeric,
}

/// One binding.
#[derive(Debug, Clone)]
pub struct VariableRecord {
    pub name: Rc<str>,
    /// The scope whose table owns this record.
    pub scope: ScopeId,
    pub storage: Storage,
    pub flags: VarFlags,
    /// Frame slot (`Local`) or environment slot (`Closure`); assigned by
    /// [`ScopeTable::finish`].
    pub slot: u32,
    usages: Vec<UsageType>,
    assigned: Vec<ValueType>,
}

impl VariableRecord {
    pub fn is_global(&self) -> bool {
        self.storage == Storage::Global
    }

    pub fn is_closed_over(&self) -> bool {
        self.flags.contains(VarFlags::CLOSED_OVER)
    }

    pub fn is_deletable(&self) -> bool {
        self.flags.contains(VarFlags::DELETABLE)
    }

    pub fn is_parameter(&self) -> bool {
        self.flags.contains(VarFlags::PARAMETER)
    }

    pub fn usages(&self) -> &[UsageType] {
        &self.usages
    }

    /// Value types assigned to this variable, in first-seen order.
    pub fn assigned_types(&self) -> &[ValueType] {
        &self.assigned
    }

    /// The single assigned type, or `Any` when there were several or none.
    pub fn inferred_type(&self) -> ValueType {
        match self.assigned.as_slice() {
            [single] => *single,
            _ => ValueType::Any,
        }
    }
}

/// One function (or the global) scope.
#[derive(Debug, Clone)]
pub struct Scope {
    pub parent: Option<ScopeId>,
    /// Function name, for diagnostics.
    pub name: Rc<str>,
    names: FxHashMap<Rc<str>, VarId>,
    /// Declaration order; determines slot numbering.
    order: Vec<VarId>,
    captures: FxHashSet<VarId>,
    pub is_dynamic_lookup: bool,
    local_count: u32,
    env_names: Vec<Rc<str>>,
}

impl Scope {
    fn new(parent: Option<ScopeId>, name: Rc<str>) -> Self {
        Self {
            parent,
            name,
            names: FxHashMap::default(),
            order: Vec::new(),
            captures: FxHashSet::default(),
            is_dynamic_lookup: false,
            local_count: 0,
            env_names: Vec::new(),
        }
    }

    pub fn lookup_own(&self, name: &str) -> Option<VarId> {
        self.names.get(name).copied()
    }

    /// Records declared in this scope, in declaration order.
    pub fn variables(&self) -> &[VarId] {
        &self.order
    }

    /// Records of enclosing functions this scope (or a nested one) references.
    pub fn captures(&self) -> Vec<VarId> {
        let mut captures: Vec<VarId> = self.captures.iter().copied().collect();
        captures.sort();
        captures
    }

    pub fn captures_var(&self, var: VarId) -> bool {
        self.captures.contains(&var)
    }

    /// Number of frame slots.
    pub fn local_count(&self) -> u32 {
        self.local_count
    }

    /// Slot names of this scope's heap environment.
    pub fn env_names(&self) -> &[Rc<str>] {
        &self.env_names
    }

    /// Whether a call of this function allocates an environment.
    pub fn needs_env(&self) -> bool {
        !self.env_names.is_empty()
    }
}

// ============================================================================
// ScopeTable
// ============================================================================

/// Arena of every scope and record of one compilation unit.
#[derive(Debug, Clone)]
pub struct ScopeTable {
    scopes: Vec<Scope>,
    vars: Vec<VariableRecord>,
    finished: bool,
}

impl ScopeTable {
    /// A table holding only the global scope.
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope::new(None, Rc::from("<global>"))],
            vars: Vec::new(),
            finished: false,
        }
    }

    pub fn global(&self) -> ScopeId {
        ScopeId::GLOBAL
    }

    /// Create the scope of a function nested in `parent`.
    pub fn push_function_scope(&mut self, parent: ScopeId, name: impl Into<Rc<str>>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope::new(Some(parent), name.into()));
        id
    }

    pub fn scope(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.index()]
    }

    pub fn var(&self, id: VarId) -> &VariableRecord {
        &self.vars[id.index()]
    }

    pub fn scope_count(&self) -> usize {
        self.scopes.len()
    }

    pub fn var_count(&self) -> usize {
        self.vars.len()
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    // ==========================================================================
    // Declaration and resolution
    // ==========================================================================

    /// Create-or-return `name` in `scope`'s own table.
    ///
    /// Global-scope declarations are Global records and are not deletable.
    pub fn declare(&mut self, scope: ScopeId, name: &str) -> VarId {
        if let Some(existing) = self.scope(scope).lookup_own(name) {
            return existing;
        }
        let storage = if scope.is_global() {
            Storage::Global
        } else {
            Storage::Local
        };
        self.insert(scope, name, storage, VarFlags::empty())
    }

    pub fn declare_parameter(&mut self, scope: ScopeId, name: &str) -> VarId {
        let var = self.declare(scope, name);
        self.vars[var.index()].flags |= VarFlags::PARAMETER;
        var
    }

    /// Open a binding of `name` that lives until the matching
    /// [`end_block_binding`](Self::end_block_binding), such as a catch
    /// parameter. The record is always fresh and never global, shadowing any
    /// existing entry of the scope. Returns the record and the entry it
    /// shadows.
    pub fn begin_block_binding(&mut self, scope: ScopeId, name: &str) -> (VarId, Option<VarId>) {
        let shadowed = self.scope(scope).lookup_own(name);
        let var = self.insert(scope, name, Storage::Local, VarFlags::empty());
        (var, shadowed)
    }

    /// Close a binding opened by [`begin_block_binding`](Self::begin_block_binding).
    /// The record keeps its slot; only name resolution forgets it.
    pub fn end_block_binding(&mut self, scope: ScopeId, name: &str, shadowed: Option<VarId>) {
        let names = &mut self.scopes[scope.index()].names;
        match shadowed {
            Some(var) => {
                names.insert(Rc::from(name), var);
            }
            None => {
                names.remove(name);
            }
        }
    }

    fn insert(&mut self, scope: ScopeId, name: &str, storage: Storage, flags: VarFlags) -> VarId {
        let id = VarId(self.vars.len() as u32);
        let name: Rc<str> = Rc::from(name);
        self.vars.push(VariableRecord {
            name: Rc::clone(&name),
            scope,
            storage,
            flags,
            slot: 0,
            usages: Vec::new(),
            assigned: Vec::new(),
        });
        let table = &mut self.scopes[scope.index()];
        table.names.insert(name, id);
        table.order.push(id);
        id
    }

    /// Non-creating lookup along the parent chain.
    pub fn lookup(&self, scope: ScopeId, name: &str) -> Option<VarId> {
        let mut current = Some(scope);
        while let Some(id) = current {
            let table = self.scope(id);
            if let Some(var) = table.lookup_own(name) {
                return Some(var);
            }
            current = table.parent;
        }
        None
    }

    /// Resolve a reference to `name` made from `scope`.
    ///
    /// A hit in an enclosing function scope marks the record closed over and
    /// registers it in the captures of every scope from `scope` up to, not
    /// including, the declaring scope. A miss creates an implicit deletable
    /// Global record.
    pub fn resolve(&mut self, scope: ScopeId, name: &str) -> VarId {
        let Some(var) = self.lookup(scope, name) else {
            return self.insert(ScopeId::GLOBAL, name, Storage::Global, VarFlags::DELETABLE);
        };

        let declaring = self.vars[var.index()].scope;
        if declaring == scope || self.vars[var.index()].storage == Storage::Global {
            return var;
        }

        let mut current = Some(scope);
        while let Some(id) = current {
            if id == declaring {
                break;
            }
            let table = &mut self.scopes[id.index()];
            table.captures.insert(var);
            current = table.parent;
        }

        let record = &mut self.vars[var.index()];
        record.flags |= VarFlags::CLOSED_OVER;
        record.storage = Storage::Closure;
        var
    }

    /// Flag `scope` and all its ancestors for runtime name lookup.
    pub fn mark_dynamic(&mut self, scope: ScopeId) {
        let mut current = Some(scope);
        while let Some(id) = current {
            let table = &mut self.scopes[id.index()];
            if table.is_dynamic_lookup {
                break;
            }
            table.is_dynamic_lookup = true;
            current = table.parent;
        }
    }

    // ==========================================================================
    // Usage hints
    // ==========================================================================

    pub fn add_usage(&mut self, var: VarId, usage: UsageType) {
        let record = &mut self.vars[var.index()];
        if !record.usages.contains(&usage) {
            record.usages.push(usage);
        }
    }

    pub fn add_assigned_type(&mut self, var: VarId, ty: ValueType) {
        let record = &mut self.vars[var.index()];
        if !record.assigned.contains(&ty) {
            record.assigned.push(ty);
        }
    }

    // ==========================================================================
    // Layout
    // ==========================================================================

    /// Freeze storage classes and number slots.
    ///
    /// Non-global records of a dynamic scope are moved to the environment so
    /// runtime name lookup can find them.
    pub fn finish(&mut self) {
        if self.finished {
            return;
        }
        for scope in &mut self.scopes {
            let mut local_count = 0;
            let mut env_names = Vec::new();
            for var in &scope.order {
                let record = &mut self.vars[var.index()];
                if scope.is_dynamic_lookup && record.storage == Storage::Local {
                    record.storage = Storage::Closure;
                }
                match record.storage {
                    Storage::Local => {
                        record.slot = local_count;
                        local_count += 1;
                    }
                    Storage::Closure => {
                        record.slot = env_names.len() as u32;
                        env_names.push(Rc::clone(&record.name));
                    }
                    Storage::Global => {}
                }
            }
            scope.local_count = local_count;
            scope.env_names = env_names;
        }
        self.finished = true;
    }

    /// Number of environment links between the running code of `from` and
    /// the environment of `declaring`.
    ///
    /// Counts environment-bearing scopes from `from` (inclusive) to
    /// `declaring` (exclusive). `None` when `declaring` is not an ancestor.
    pub fn env_depth(&self, from: ScopeId, declaring: ScopeId) -> Option<usize> {
        let mut depth = 0;
        let mut current = Some(from);
        while let Some(id) = current {
            if id == declaring {
                return Some(depth);
            }
            let table = self.scope(id);
            if table.needs_env() {
                depth += 1;
            }
            current = table.parent;
        }
        None
    }

    /// Where `var` is read and written at runtime.
    pub fn slot_of(&self, var: VarId) -> VarSlot {
        let record = self.var(var);
        match record.storage {
            Storage::Local => VarSlot::Local(record.slot),
            Storage::Closure => VarSlot::Env(record.slot),
            Storage::Global => VarSlot::Global,
        }
    }

    /// Frame and environment shape of a function scope.
    pub fn layout(&self, scope: ScopeId) -> FunctionLayout {
        let table = self.scope(scope);
        FunctionLayout {
            local_count: table.local_count,
            env_names: table.env_names.iter().cloned().collect(),
        }
    }
}

/// Runtime location of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VarSlot {
    Local(u32),
    /// Slot of the declaring function's environment.
    Env(u32),
    Global,
}

/// Frame and environment shape of one function.
#[derive(Debug, Clone, PartialEq)]
pub struct FunctionLayout {
    pub local_count: u32,
    pub env_names: Rc<[Rc<str>]>,
}

impl FunctionLayout {
    pub fn needs_env(&self) -> bool {
        !self.env_names.is_empty()
    }
}

impl Default for ScopeTable {
    fn default() -> Self {
        Self::new()
    }
}

impl BindingInfo for ScopeTable {
    fn summary(&self, var: VarId) -> Option<VarSummary> {
        let record = self.vars.get(var.index())?;
        Some(VarSummary {
            is_global: record.is_global(),
            is_deletable: record.is_deletable(),
            is_closed_over: record.is_closed_over(),
        })
    }
}
