//! Lumen Compiler
//!
//! Turns a [`lumen_syntax::Program`] into executable bytecode.
//!
//! ## Pipeline
//!
//! - **Analysis** ([`Analyzer`]): resolve every identifier through the
//!   [`ScopeTable`], mark closure captures, lower `with` bodies to runtime
//!   name lookups, record usage hints and fold constants
//! - **Generation** ([`Generator`]): emit one [`CompiledFunction`] per
//!   function, routing dynamic calls and member accesses through
//!   [`CallSite`]s
//!
//! ## Modules
//!
//! - [`analyzer`]: Semantic analysis
//! - [`bytecode`]: Bytecode types (OpCode, BytecodeChunk, ConstantPool)
//! - [`call_site`]: Call sites and inline caches
//! - [`codegen`]: Code generation
//! - [`emit`]: High-level bytecode emitter
//! - [`scope`]: Scope and variable table

pub mod analyzer;
pub mod bytecode;
pub mod call_site;
pub mod codegen;
pub mod emit;
pub mod scope;

use std::rc::Rc;

pub use analyzer::Analyzer;
pub use call_site::{CacheStats, CacheStrategy, CallSite, CallSiteInfo, InlineCache, SiteKind};
pub use codegen::Generator;
pub use emit::{BytecodeEmitter, JumpLabel};
pub use scope::{
    FunctionLayout, Scope, ScopeTable, Storage, UsageType, VarFlags, VarSlot, VariableRecord,
};

pub use lumen_core::CompileError;

use lumen_core::Span;
use lumen_syntax::Program;

/// Result type for compilation.
pub type Result<T> = std::result::Result<T, CompileError>;

/// A compiled unit: every function of one program plus its entry point.
#[derive(Debug)]
pub struct CompiledUnit {
    /// Compiled functions, nested ones before their enclosing function.
    pub functions: Vec<CompiledFunction>,
    /// Unit-level constant pool.
    pub constants: bytecode::ConstantPool,
    /// Index of the program body in `functions`.
    pub entry: usize,
    /// Names declared by top-level `var` statements and function
    /// declarations; defined on the global object before the body runs.
    pub global_declarations: Vec<Rc<str>>,
}

impl CompiledUnit {
    pub fn entry(&self) -> &CompiledFunction {
        &self.functions[self.entry]
    }

    pub fn function(&self, index: usize) -> Option<&CompiledFunction> {
        self.functions.get(index)
    }

    pub fn call_sites(&self) -> impl Iterator<Item = &CallSite> {
        self.functions.iter().flat_map(|f| f.call_sites.iter())
    }

    pub fn call_site_count(&self) -> usize {
        self.functions.iter().map(|f| f.call_sites.len()).sum()
    }

    /// Hit and miss counters summed over every site.
    pub fn cache_stats(&self) -> CacheStats {
        self.call_sites()
            .map(CallSite::stats)
            .fold(CacheStats::default(), |acc, stats| acc + stats)
    }

    /// Return every site to its cold state.
    pub fn reset_caches(&self) {
        for site in self.call_sites() {
            site.reset();
        }
    }
}

/// A compiled function.
#[derive(Debug)]
pub struct CompiledFunction {
    pub name: Rc<str>,
    /// Storage of each positional parameter.
    pub params: Vec<VarSlot>,
    /// Frame slots.
    pub local_count: u32,
    /// Slot names of the environment a call allocates; empty when the
    /// function runs in its closure's environment.
    pub env_names: Rc<[Rc<str>]>,
    pub chunk: bytecode::BytecodeChunk,
    /// Sites referenced by index from `CallGlobal`, `InvokeMember`,
    /// `GetMember` and `SetMember`.
    pub call_sites: Vec<CallSite>,
    pub span: Span,
}

impl CompiledFunction {
    pub fn needs_env(&self) -> bool {
        !self.env_names.is_empty()
    }

    /// Declared arity.
    pub fn param_count(&self) -> usize {
        self.params.len()
    }
}

/// Output of [`Compiler::compile`].
#[derive(Debug)]
pub struct Compilation {
    pub unit: CompiledUnit,
    pub scopes: ScopeTable,
}

/// Analysis followed by generation.
pub struct Compiler;

impl Compiler {
    /// Analyze `program` in place and generate its unit.
    pub fn compile(program: &mut Program) -> Result<Compilation> {
        #[cfg(feature = "profiling")]
        profiling::scope!("compile");

        let mut analyzer = Analyzer::new();
        analyzer.analyze_program(program)?;
        let scopes = analyzer.finish();
        let unit = Generator::new(&scopes).generate_program(program)?;
        Ok(Compilation { unit, scopes })
    }
}
