//! Per-contract compile state.
//!
//! One [`CompileContext`] lives for a whole contract compile: it owns the
//! storage slot table, function naming, the inlining cache and the call
//! graph. All mutation goes through `&mut self`, so concurrent function
//! compilation has to serialize on the context, which is exactly the
//! constraint the call-graph analysis needs.

use crate::buffer::CodeBuffer;
use crate::consts::{c4, globals};
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::Arc;
use stele_sema::{ContractDef, DeclId, FuncId, FunctionDef, FunctionKind, Visibility};
use tracing::debug;

/// Backend configuration consumed (not owned) by this crate.
#[derive(Clone, Copy, Debug)]
pub struct Config {
    /// Skip runtime integer range checks on narrowing conversions.
    pub ignore_integer_overflow: bool,
    /// ABI header layout version.
    pub abi_version: u8,
    /// Whether the contract declares the `time` header field (ABI v2).
    pub has_time_header: bool,
    /// Whether the contract defines a custom signature-check hook, which
    /// takes over replay protection from the default timestamp scheme.
    pub has_after_signature_check: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ignore_integer_overflow: false,
            abi_version: 2,
            has_time_header: false,
            has_after_signature_check: false,
        }
    }
}

impl Config {
    /// Whether message headers carry a timestamp field.
    #[must_use]
    pub fn has_time_in_abi_header(&self) -> bool {
        match self.abi_version {
            1 => true,
            2 => self.has_time_header || !self.has_after_signature_check,
            v => panic!("unsupported ABI version {v}"),
        }
    }

    /// Whether the persisted data cell stores the replay timestamp.
    #[must_use]
    pub fn store_timestamp_in_c4(&self) -> bool {
        self.has_time_in_abi_header() && !self.has_after_signature_check
    }
}

/// Node state of the cycle search.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// Per-contract compile state.
#[derive(Debug)]
pub struct CompileContext {
    contract: Arc<ContractDef>,
    config: Config,
    /// Stable global slot per non-constant state variable.
    state_var_index: FxHashMap<DeclId, u32>,
    /// Finished inlinable function bodies, by macro name.
    inlined: FxHashMap<String, CodeBuffer>,
    /// Public entry points: (function id, name).
    public_functions: Vec<(u32, String)>,
    /// Direct-call graph discovered so far.
    graph: FxHashMap<FuncId, FxHashSet<FuncId>>,
    current_function: Option<FuncId>,
}

impl CompileContext {
    /// Creates the context and assigns storage slots: each non-constant state
    /// variable gets the next global index after the reserved slots, in
    /// declaration order across the linearized inheritance chain.
    #[must_use]
    pub fn new(contract: Arc<ContractDef>, config: Config) -> Self {
        let mut state_var_index = FxHashMap::default();
        for (decl, _) in contract.non_constant_state_variables() {
            let index = globals::FIRST_STATE_VAR + state_var_index.len() as u32;
            state_var_index.insert(decl, index);
        }
        Self {
            contract,
            config,
            state_var_index,
            inlined: FxHashMap::default(),
            public_functions: Vec::new(),
            graph: FxHashMap::default(),
            current_function: None,
        }
    }

    #[must_use]
    pub fn contract(&self) -> &ContractDef {
        &self.contract
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    #[must_use]
    pub fn ignore_integer_overflow(&self) -> bool {
        self.config.ignore_integer_overflow
    }

    /// Global slot of a state variable.
    ///
    /// # Panics
    /// Panics for constants and unknown declarations.
    #[must_use]
    pub fn state_var_index(&self, decl: DeclId) -> u32 {
        *self
            .state_var_index
            .get(&decl)
            .unwrap_or_else(|| panic!("no storage slot for {decl:?}"))
    }

    /// Bit offset of encoded state variables inside the persisted data cell:
    /// the public key, the optional replay timestamp, and the
    /// constructor flag come first.
    #[must_use]
    pub fn c4_offset_bits(&self) -> u32 {
        256 + if self.config.store_timestamp_in_c4() { 64 } else { 0 } + 1
    }

    #[must_use]
    pub fn function(&self, func: FuncId) -> &FunctionDef {
        &self.contract.functions[func]
    }

    /// The internal (assembler-level) name of a function. Entry points get
    /// reserved names; base functions called by point are qualified with
    /// their defining contract; everything else gets the `_internal` suffix.
    #[must_use]
    pub fn function_internal_name(&self, func: FuncId, called_by_point: bool) -> String {
        let def = self.function(func);
        if self.contract.is_stdlib() {
            return def.name.clone();
        }
        match def.kind {
            FunctionKind::OnCodeUpgrade => return ":onCodeUpgrade".into(),
            FunctionKind::Fallback => return "fallback".into(),
            FunctionKind::Receive => return "receive".into(),
            FunctionKind::Constructor | FunctionKind::Regular => {}
        }
        if called_by_point && def.is_overridden_base {
            format!("{}_{}", def.contract_name, def.name)
        } else {
            format!("{}_internal", def.name)
        }
    }

    /// The name of a library function, qualified by its library and by
    /// whether it receives a bound object.
    #[must_use]
    pub fn lib_function_name(&self, func: FuncId, with_object: bool) -> String {
        let def = self.function(func);
        let infix = if with_object { "_with_obj_" } else { "_no_obj_" };
        format!("{}{infix}{}", def.contract_name, def.name)
    }

    /// The external (ABI-level) name of a public function.
    ///
    /// # Panics
    /// Panics if the function is not public.
    #[must_use]
    pub fn function_external_name(&self, func: FuncId) -> String {
        let def = self.function(func);
        assert!(
            def.visibility == Visibility::Public,
            "expected public function: {}",
            def.name
        );
        match def.kind {
            FunctionKind::Constructor => "constructor".into(),
            FunctionKind::Fallback => "fallback".into(),
            FunctionKind::Receive => "receive".into(),
            FunctionKind::Regular | FunctionKind::OnCodeUpgrade => def.name.clone(),
        }
    }

    /// Caches a finished inlinable body under its macro name.
    ///
    /// # Panics
    /// Panics if the name is already cached.
    pub fn add_inline_function(&mut self, name: String, code: CodeBuffer) {
        let prev = self.inlined.insert(name.clone(), code);
        assert!(prev.is_none(), "inline function {name} cached twice");
    }

    /// A previously cached inlinable body.
    ///
    /// # Panics
    /// Panics if absent.
    #[must_use]
    pub fn inlined_function(&self, name: &str) -> &CodeBuffer {
        self.inlined
            .get(name)
            .unwrap_or_else(|| panic!("inline function {name} was never cached"))
    }

    pub fn add_public_function(&mut self, id: u32, name: String) {
        self.public_functions.push((id, name));
    }

    /// Public entry points ordered by function id.
    pub fn public_functions(&mut self) -> &[(u32, String)] {
        self.public_functions.sort();
        &self.public_functions
    }

    /// Static variables with their persisted-cell indices, in declaration
    /// order; these are filled in by deploy data rather than the
    /// constructor.
    #[must_use]
    pub fn static_variables(&self) -> Vec<(DeclId, u32)> {
        self.contract
            .non_constant_state_variables()
            .filter(|(_, var)| var.is_static)
            .enumerate()
            .map(|(shift, (decl, _))| (decl, c4::FIRST_STATIC_VAR + shift as u32))
            .collect()
    }

    pub fn set_current_function(&mut self, func: Option<FuncId>) {
        self.current_function = func;
    }

    #[must_use]
    pub fn current_function(&self) -> Option<FuncId> {
        self.current_function
    }

    /// Tentatively adds the call edge `from → to` and reports whether it
    /// closes a cycle. A cyclic edge is removed again: recursive calls must
    /// stay true calls, while acyclic callees may be expanded inline.
    ///
    /// The search restarts from scratch on every edge; call graphs are small
    /// and a stale incremental state here would be a correctness bug.
    pub fn add_edge_and_check_cycle(&mut self, from: FuncId, to: FuncId) -> bool {
        self.graph.entry(from).or_default().insert(to);
        self.graph.entry(to).or_default();

        let mut colors: FxHashMap<FuncId, Color> =
            self.graph.keys().map(|&k| (k, Color::White)).collect();
        let has_cycle = self.graph.keys().any(|&node| self.dfs(node, &mut colors));
        if has_cycle {
            debug!(?from, ?to, "call edge closes a cycle; keeping out-of-line call");
            self.graph.get_mut(&from).unwrap().remove(&to);
        }
        has_cycle
    }

    fn dfs(&self, node: FuncId, colors: &mut FxHashMap<FuncId, Color>) -> bool {
        match colors[&node] {
            Color::Black => return false,
            Color::Gray => return true,
            Color::White => {}
        }
        colors.insert(node, Color::Gray);
        for &next in &self.graph[&node] {
            if self.dfs(next, colors) {
                return true;
            }
        }
        colors.insert(node, Color::Black);
        false
    }
}
