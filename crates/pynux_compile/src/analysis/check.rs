//! Name resolution and type checking.
//!
//! The checker walks the parsed [`Module`] once per function and produces a
//! [`CheckedModule`]: the same AST plus dense side tables giving every
//! expression its resolved [`Ty`] and every name use its [`Binding`]. The
//! code generator consumes only those tables — it never resolves a name or
//! infers a type itself.
//!
//! # Architecture
//!
//! ```text
//! Module
//!  │
//!  ├── pass A: struct / union / class layouts  → TypeRegistry
//!  ├── pass B: function & extern signatures    → fn_sigs (forward refs work)
//!  ├── pass C: global variables                → globals
//!  └── pass D: function bodies                 → types, bindings, frames
//! ```
//!
//! # Frame layout
//!
//! Every local and parameter gets a fixed byte offset from the post-prologue
//! stack pointer. Slots are discovered in source order during pass D and
//! aligned to at least four bytes (eight for 64-bit values); the generator
//! pads the final frame so `sp` stays 8-byte aligned at call sites.
//!
//! # Errors
//!
//! Every diagnostic carries stage `type` and the span of the offending
//! expression or statement. The first error aborts the pass.

use std::collections::{HashMap, HashSet};

use pynux_base::{Diagnostic, Interner, Result, Span, Symbol};
use pynux_language::ast::{
    BinOp, Expr, ExprId, ExprKind, ExprRef, FStringPart, FunctionDef, Item, Module, Pattern,
    Stmt, TypeExpr, UnaryOp,
};

use super::types::{align_up, FnSig, Ty, TypeRegistry};
use crate::optimize::fold;
use crate::target::Target;

// ============================================================================
// Side-table records
// ============================================================================

/// What a checked name use refers to.
#[derive(Debug, Clone, PartialEq)]
pub enum Binding {
    /// A frame slot; index into the enclosing function's [`FrameInfo`].
    Local { slot: u32 },
    /// A module-scope variable, addressed by its symbol label.
    Global { name: Symbol },
    /// A directly callable symbol: user function, extern, runtime helper,
    /// or imported name.
    Func { name: Symbol },
    /// A checker-expanded builtin.
    Intrinsic(Intrinsic),
    /// Struct or union field access; byte offset from the base.
    Field { offset: u32 },
    /// A class method reached through `obj.name`; the mangled free-function
    /// symbol.
    Method { symbol: Symbol },
    /// A string method reached through `s.name`.
    StrMethod(StrMethod),
    /// A class name in call position: heap-allocate and run `__init__`.
    Ctor { class: Symbol },
    /// An imported module alias; only legal as the base of an attribute.
    Module,
}

/// Builtin names lowered to instructions or fixed ABI calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Intrinsic {
    Len,
    Ord,
    Chr,
    Abs,
    Min,
    Max,
    Dmb,
    Dsb,
    Isb,
    Wfi,
    Wfe,
    Sev,
    Clz,
    Rbit,
    Rev,
    Rev16,
    AtomicLoad,
    AtomicStore,
    AtomicAdd,
    AtomicSub,
    AtomicAnd,
    AtomicOr,
    AtomicXor,
    AtomicSwap,
    BitSet,
    BitClear,
    BitToggle,
    BitCheck,
    BitsGet,
    BitsSet,
    CriticalEnter,
    CriticalExit,
    Clrex,
    Print,
    Input,
}

impl Intrinsic {
    fn from_name(name: &str) -> Option<Intrinsic> {
        Some(match name {
            "len" => Intrinsic::Len,
            "ord" => Intrinsic::Ord,
            "chr" => Intrinsic::Chr,
            "abs" => Intrinsic::Abs,
            "min" => Intrinsic::Min,
            "max" => Intrinsic::Max,
            "dmb" => Intrinsic::Dmb,
            "dsb" => Intrinsic::Dsb,
            "isb" => Intrinsic::Isb,
            "wfi" => Intrinsic::Wfi,
            "wfe" => Intrinsic::Wfe,
            "sev" => Intrinsic::Sev,
            "clz" => Intrinsic::Clz,
            "rbit" => Intrinsic::Rbit,
            "rev" => Intrinsic::Rev,
            "rev16" => Intrinsic::Rev16,
            "atomic_load" => Intrinsic::AtomicLoad,
            "atomic_store" => Intrinsic::AtomicStore,
            "atomic_add" => Intrinsic::AtomicAdd,
            "atomic_sub" => Intrinsic::AtomicSub,
            "atomic_and" => Intrinsic::AtomicAnd,
            "atomic_or" => Intrinsic::AtomicOr,
            "atomic_xor" => Intrinsic::AtomicXor,
            "atomic_swap" => Intrinsic::AtomicSwap,
            "bit_set" => Intrinsic::BitSet,
            "bit_clear" => Intrinsic::BitClear,
            "bit_toggle" => Intrinsic::BitToggle,
            "bit_check" => Intrinsic::BitCheck,
            "bits_get" => Intrinsic::BitsGet,
            "bits_set" => Intrinsic::BitsSet,
            "critical_enter" => Intrinsic::CriticalEnter,
            "critical_exit" => Intrinsic::CriticalExit,
            "clrex" => Intrinsic::Clrex,
            "print" => Intrinsic::Print,
            "input" => Intrinsic::Input,
            _ => return None,
        })
    }
}

/// String methods lowered to `__pynux_str_*` helpers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrMethod {
    Upper,
    Lower,
    Strip,
    Startswith,
    Endswith,
    Find,
    Isdigit,
    Isalpha,
}

impl StrMethod {
    fn from_name(name: &str) -> Option<StrMethod> {
        Some(match name {
            "upper" => StrMethod::Upper,
            "lower" => StrMethod::Lower,
            "strip" => StrMethod::Strip,
            "startswith" => StrMethod::Startswith,
            "endswith" => StrMethod::Endswith,
            "find" => StrMethod::Find,
            "isdigit" => StrMethod::Isdigit,
            "isalpha" => StrMethod::Isalpha,
            _ => return None,
        })
    }

    /// The runtime helper symbol this method calls.
    pub fn helper(self) -> &'static str {
        match self {
            StrMethod::Upper => "__pynux_str_upper",
            StrMethod::Lower => "__pynux_str_lower",
            StrMethod::Strip => "__pynux_str_strip",
            StrMethod::Startswith => "__pynux_str_startswith",
            StrMethod::Endswith => "__pynux_str_endswith",
            StrMethod::Find => "__pynux_str_find",
            StrMethod::Isdigit => "__pynux_str_isdigit",
            StrMethod::Isalpha => "__pynux_str_isalpha",
        }
    }

    /// Number of explicit arguments (beyond the receiver).
    fn arity(self) -> usize {
        match self {
            StrMethod::Startswith | StrMethod::Endswith | StrMethod::Find => 1,
            _ => 0,
        }
    }

    fn result(self) -> Ty {
        match self {
            StrMethod::Upper | StrMethod::Lower | StrMethod::Strip => Ty::Str,
            StrMethod::Find => Ty::INT32,
            _ => Ty::Bool,
        }
    }
}

/// One stack slot of a function frame.
#[derive(Debug, Clone)]
pub struct LocalSlot {
    pub name: Symbol,
    pub ty: Ty,
    /// Byte offset from the post-prologue stack pointer.
    pub offset: u32,
}

/// Frame layout of one compiled function.
#[derive(Debug, Clone, Default)]
pub struct FrameInfo {
    pub slots: Vec<LocalSlot>,
    by_name: HashMap<Symbol, u32>,
    /// Bytes of locals before the generator's alignment padding.
    pub local_bytes: u32,
    /// Slot index of each declared parameter, in order.
    pub param_slots: Vec<u32>,
    pub is_interrupt: bool,
}

impl FrameInfo {
    pub fn slot_by_name(&self, name: Symbol) -> Option<u32> {
        self.by_name.get(&name).copied()
    }

    pub fn slot(&self, index: u32) -> &LocalSlot {
        &self.slots[index as usize]
    }
}

/// Hidden slots carrying a list comprehension's loop state.
#[derive(Debug, Clone, Copy)]
pub struct CompInfo {
    pub var_slot: u32,
    pub ptr_slot: u32,
    pub idx_slot: u32,
}

/// One module-scope variable, in declaration order.
#[derive(Debug)]
pub struct GlobalDecl<'a> {
    pub name: Symbol,
    pub ty: Ty,
    pub init: Option<ExprRef<'a>>,
    pub volatile: bool,
}

/// The checker's output: the AST plus everything the generator needs.
pub struct CheckedModule<'a> {
    pub module: Module<'a>,
    pub registry: TypeRegistry,
    pub fn_sigs: HashMap<Symbol, FnSig>,
    pub frames: HashMap<Symbol, FrameInfo>,
    pub globals: Vec<GlobalDecl<'a>>,
    /// `(class, method)` → mangled free-function symbol.
    pub method_symbols: HashMap<(Symbol, Symbol), Symbol>,
    /// Lambda expression → its emitted private function symbol.
    pub lambda_symbols: HashMap<ExprId, Symbol>,
    /// Comprehension expression → its hidden loop slots.
    pub comps: HashMap<ExprId, CompInfo>,
    pub has_interrupt: bool,
    types: Vec<Option<Ty>>,
    bindings: Vec<Option<Binding>>,
}

impl<'a> CheckedModule<'a> {
    /// The resolved type of an expression.
    ///
    /// # Panics
    ///
    /// Panics if the expression was never checked — an `emit`-stage
    /// invariant violation, caught by the generator's own guard first.
    pub fn ty(&self, id: ExprId) -> &Ty {
        self.types[id.index()].as_ref().expect("expression missing a checked type")
    }

    pub fn try_ty(&self, id: ExprId) -> Option<&Ty> {
        self.types.get(id.index()).and_then(|t| t.as_ref())
    }

    pub fn binding(&self, id: ExprId) -> Option<&Binding> {
        self.bindings.get(id.index()).and_then(|b| b.as_ref())
    }
}

// ============================================================================
// Checker state
// ============================================================================

struct FnCtx {
    ret: Ty,
    slots: Vec<LocalSlot>,
    by_name: HashMap<Symbol, u32>,
    local_bytes: u32,
    param_slots: Vec<u32>,
    declared_globals: HashSet<Symbol>,
    loop_depth: u32,
    is_interrupt: bool,
    /// Locals of the enclosing function while checking a lambda body, for
    /// the capture diagnostic.
    outer_names: HashSet<Symbol>,
}

impl FnCtx {
    fn new(ret: Ty, is_interrupt: bool) -> Self {
        FnCtx {
            ret,
            slots: Vec::new(),
            by_name: HashMap::new(),
            local_bytes: 0,
            param_slots: Vec::new(),
            declared_globals: HashSet::new(),
            loop_depth: 0,
            is_interrupt,
            outer_names: HashSet::new(),
        }
    }

    fn into_frame(self) -> FrameInfo {
        FrameInfo {
            slots: self.slots,
            by_name: self.by_name,
            local_bytes: self.local_bytes,
            param_slots: self.param_slots,
            is_interrupt: self.is_interrupt,
        }
    }
}

/// Runs all checking passes over one module.
pub struct Checker<'a, 'i> {
    interner: &'i mut Interner,
    target: Target,
    registry: TypeRegistry,
    fn_sigs: HashMap<Symbol, FnSig>,
    globals: HashMap<Symbol, (Ty, bool)>,
    global_order: Vec<GlobalDecl<'a>>,
    classes: HashSet<Symbol>,
    module_aliases: HashSet<Symbol>,
    method_symbols: HashMap<(Symbol, Symbol), Symbol>,
    lambda_symbols: HashMap<ExprId, Symbol>,
    comps: HashMap<ExprId, CompInfo>,
    next_lambda: u32,
    next_hidden: u32,
    frames: HashMap<Symbol, FrameInfo>,
    has_interrupt: bool,
    types: Vec<Option<Ty>>,
    bindings: Vec<Option<Binding>>,
    fcx: Option<FnCtx>,
}

/// Checks a whole module, consuming it into a [`CheckedModule`].
pub fn check_module<'a>(
    module: Module<'a>,
    interner: &mut Interner,
    target: Target,
) -> Result<CheckedModule<'a>> {
    let mut checker = Checker {
        interner,
        target,
        registry: TypeRegistry::new(),
        fn_sigs: HashMap::new(),
        globals: HashMap::new(),
        global_order: Vec::new(),
        classes: HashSet::new(),
        module_aliases: HashSet::new(),
        method_symbols: HashMap::new(),
        lambda_symbols: HashMap::new(),
        comps: HashMap::new(),
        next_lambda: 0,
        next_hidden: 0,
        frames: HashMap::new(),
        has_interrupt: false,
        types: vec![None; module.expr_count as usize],
        bindings: vec![None; module.expr_count as usize],
        fcx: None,
    };

    checker.register_runtime_abi();
    checker.pass_types(&module)?;
    checker.pass_signatures(&module)?;
    checker.pass_globals(&module)?;
    checker.pass_bodies(&module)?;

    Ok(CheckedModule {
        module,
        registry: checker.registry,
        fn_sigs: checker.fn_sigs,
        frames: checker.frames,
        globals: checker.global_order,
        method_symbols: checker.method_symbols,
        lambda_symbols: checker.lambda_symbols,
        comps: checker.comps,
        has_interrupt: checker.has_interrupt,
        types: checker.types,
        bindings: checker.bindings,
    })
}

impl<'a, 'i> Checker<'a, 'i> {
    fn err(&self, message: impl Into<String>, span: Span) -> Diagnostic {
        Diagnostic::ty(message, span)
    }

    fn name(&self, sym: Symbol) -> &str {
        self.interner.resolve(sym)
    }

    /// Pre-registers the fixed runtime helper symbols as known externs, so
    /// source code can call them without declarations.
    fn register_runtime_abi(&mut self) {
        let ptr_void = Ty::Ptr(Box::new(Ty::Void));
        let ptr_char = Ty::Ptr(Box::new(Ty::Char));
        let entries: Vec<(&str, Vec<Ty>, Ty)> = vec![
            ("uart_init", vec![], Ty::Void),
            ("uart_putc", vec![Ty::INT32], Ty::Void),
            ("uart_getc", vec![], Ty::INT32),
            ("uart_available", vec![], Ty::INT32),
            ("print_str", vec![Ty::Str], Ty::Void),
            ("print_int", vec![Ty::INT32], Ty::Void),
            ("print_hex", vec![Ty::UINT32], Ty::Void),
            ("print_newline", vec![], Ty::Void),
            ("malloc", vec![Ty::UINT32], ptr_void.clone()),
            ("free", vec![ptr_void.clone()], Ty::Void),
            ("__pynux_read_line", vec![ptr_char.clone()], Ty::Str),
            ("__pynux_strlen", vec![Ty::Str], Ty::INT32),
            ("__pynux_strcmp", vec![Ty::Str, Ty::Str], Ty::INT32),
            ("__pynux_strcpy", vec![ptr_char.clone(), Ty::Str], ptr_char.clone()),
            ("__pynux_strcat", vec![ptr_char.clone(), Ty::Str], ptr_char),
            (
                "__pynux_memcpy",
                vec![ptr_void.clone(), ptr_void.clone(), Ty::UINT32],
                ptr_void.clone(),
            ),
            (
                "__pynux_memset",
                vec![ptr_void.clone(), Ty::INT32, Ty::UINT32],
                ptr_void,
            ),
        ];
        for (name, params, ret) in entries {
            let sym = self.interner.intern(name);
            self.fn_sigs.insert(
                sym,
                FnSig {
                    params,
                    ret,
                    unchecked: false,
                },
            );
        }
    }

    // ────────────────────────────────────────────────────────────────────
    // Pass A: aggregate layouts
    // ────────────────────────────────────────────────────────────────────

    fn pass_types(&mut self, module: &Module<'a>) -> Result<()> {
        for item in &module.items {
            match item {
                Item::Struct(def) => {
                    if self.registry.contains(def.name) {
                        return Err(self.err(
                            format!("duplicate type '{}'", self.name(def.name)),
                            def.span,
                        ));
                    }
                    let fields = self.resolve_fields(&def.fields, def.span)?;
                    self.registry.define_struct(def.name, fields, def.packed);
                }
                Item::Union(def) => {
                    if self.registry.contains(def.name) {
                        return Err(self.err(
                            format!("duplicate type '{}'", self.name(def.name)),
                            def.span,
                        ));
                    }
                    let fields = self.resolve_fields(&def.fields, def.span)?;
                    self.registry.define_union(def.name, fields);
                }
                Item::Class(def) => {
                    if self.registry.contains(def.name) {
                        return Err(self.err(
                            format!("duplicate type '{}'", self.name(def.name)),
                            def.span,
                        ));
                    }
                    // Flatten: base fields first, then own fields.
                    let mut fields: Vec<(Symbol, Ty)> = Vec::new();
                    for base in &def.bases {
                        let layout = self.registry.layout(*base).ok_or_else(|| {
                            self.err(
                                format!("unknown base class '{}'", self.name(*base)),
                                def.span,
                            )
                        })?;
                        if layout.is_union {
                            return Err(self.err("cannot derive from a union", def.span));
                        }
                        for f in &layout.fields {
                            fields.push((f.name, f.ty.clone()));
                        }
                    }
                    let own = self.resolve_fields(&def.fields, def.span)?;
                    fields.extend(own);
                    self.registry.define_struct(def.name, fields, false);
                    self.classes.insert(def.name);
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn resolve_fields(
        &mut self,
        fields: &[(Symbol, TypeExpr<'a>)],
        span: Span,
    ) -> Result<Vec<(Symbol, Ty)>> {
        let mut out = Vec::with_capacity(fields.len());
        let mut seen = HashSet::new();
        for (name, te) in fields {
            if !seen.insert(*name) {
                return Err(self.err(format!("duplicate field '{}'", self.name(*name)), span));
            }
            out.push((*name, self.resolve_type(te, span)?));
        }
        Ok(out)
    }

    /// Maps surface type syntax onto the semantic model.
    fn resolve_type(&mut self, te: &TypeExpr<'a>, span: Span) -> Result<Ty> {
        Ok(match te {
            TypeExpr::Name(sym) => match self.interner.resolve(*sym) {
                "int8" => Ty::Int { bits: 8, signed: true },
                "int16" => Ty::Int { bits: 16, signed: true },
                "int32" => Ty::INT32,
                "int64" => Ty::INT64,
                "uint8" => Ty::Int { bits: 8, signed: false },
                "uint16" => Ty::Int { bits: 16, signed: false },
                "uint32" => Ty::UINT32,
                "uint64" => Ty::Int { bits: 64, signed: false },
                "float32" => Ty::Float { bits: 32 },
                "float64" => Ty::Float { bits: 64 },
                "bool" => Ty::Bool,
                "char" => Ty::Char,
                "str" => Ty::Str,
                "void" => Ty::Void,
                other => {
                    if let Some(layout) = self.registry.layout(*sym) {
                        if layout.is_union {
                            Ty::Union(*sym)
                        } else {
                            Ty::Struct(*sym)
                        }
                    } else {
                        return Err(self.err(format!("unknown type '{}'", other), span));
                    }
                }
            },
            TypeExpr::Ptr(inner) => Ty::Ptr(Box::new(self.resolve_type(inner, span)?)),
            TypeExpr::Array(n, elem) => {
                Ty::Array(*n as u32, Box::new(self.resolve_type(elem, span)?))
            }
            TypeExpr::Fn { ret, params } => {
                let ret = self.resolve_type(ret, span)?;
                let params = params
                    .iter()
                    .map(|p| self.resolve_type(p, span))
                    .collect::<Result<Vec<_>>>()?;
                Ty::Fn {
                    ret: Box::new(ret),
                    params,
                }
            }
            TypeExpr::Optional(inner) => {
                let inner = self.resolve_type(inner, span)?;
                if !inner.is_pointer_shaped() {
                    return Err(self.err(
                        format!(
                            "Optional requires a pointer-shaped type, not {}",
                            inner.display(self.interner)
                        ),
                        span,
                    ));
                }
                Ty::Optional(Box::new(inner))
            }
            TypeExpr::List(elem) => {
                let elem = self.resolve_type(elem, span)?;
                self.require_word_sized(&elem, span)?;
                Ty::List(Box::new(elem))
            }
            TypeExpr::Dict(k, v) => {
                let k = self.resolve_type(k, span)?;
                let v = self.resolve_type(v, span)?;
                if !matches!(k, Ty::Int { bits: 32, .. } | Ty::Str) {
                    return Err(self.err("dict keys must be int32 or str", span));
                }
                if !matches!(v, Ty::Int { bits: 32, .. }) {
                    return Err(self.err("dict values must be int32", span));
                }
                Ty::Dict(Box::new(k), Box::new(v))
            }
            TypeExpr::Tuple(elems) => {
                let elems = elems
                    .iter()
                    .map(|e| {
                        let t = self.resolve_type(e, span)?;
                        self.require_word_sized(&t, span)?;
                        Ok(t)
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ty::Tuple(elems)
            }
            TypeExpr::Volatile(inner) => self.resolve_type(inner, span)?,
        })
    }

    fn require_word_sized(&self, ty: &Ty, span: Span) -> Result<()> {
        if ty.is_wide() || matches!(ty, Ty::Struct(_) | Ty::Union(_) | Ty::Array(_, _)) {
            return Err(self.err(
                format!(
                    "{} does not fit a collection element (one word required)",
                    ty.display(self.interner)
                ),
                span,
            ));
        }
        Ok(())
    }

    // ────────────────────────────────────────────────────────────────────
    // Pass B: callable signatures
    // ────────────────────────────────────────────────────────────────────

    fn pass_signatures(&mut self, module: &Module<'a>) -> Result<()> {
        for item in &module.items {
            match item {
                Item::Function(def) => {
                    let sig = self.signature_of(def, None)?;
                    self.insert_callable(def.name, sig, def.span)?;
                }
                Item::Extern(def) => {
                    let mut params = Vec::with_capacity(def.params.len());
                    for p in &def.params {
                        let te = p.ty.ok_or_else(|| {
                            self.err("extern parameters require a type annotation", p.span)
                        })?;
                        params.push(self.resolve_type(&te, p.span)?);
                    }
                    let ret = match &def.ret {
                        Some(te) => self.resolve_type(te, def.span)?,
                        None => Ty::Void,
                    };
                    self.validate_param_words(&params, def.span)?;
                    self.insert_callable(
                        def.name,
                        FnSig {
                            params,
                            ret,
                            unchecked: false,
                        },
                        def.span,
                    )?;
                }
                Item::Class(def) => {
                    for method in &def.methods {
                        let mangled = format!(
                            "{}_{}",
                            self.interner.resolve(def.name),
                            self.interner.resolve(method.name)
                        );
                        let mangled = self.interner.intern(&mangled);
                        self.method_symbols.insert((def.name, method.name), mangled);
                        let sig = self.signature_of(method, Some(def.name))?;
                        self.insert_callable(mangled, sig, method.span)?;
                    }
                }
                Item::Import { module, alias, .. } => {
                    self.module_aliases.insert(alias.unwrap_or(*module));
                }
                Item::FromImport { names, .. } => {
                    for (name, alias) in names {
                        let local = alias.unwrap_or(*name);
                        // Flat linkage: record the symbol, trust the linker.
                        self.fn_sigs.entry(local).or_insert(FnSig {
                            params: Vec::new(),
                            ret: Ty::INT32,
                            unchecked: true,
                        });
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn signature_of(
        &mut self,
        def: &FunctionDef<'a>,
        self_class: Option<Symbol>,
    ) -> Result<FnSig> {
        let mut params = Vec::with_capacity(def.params.len());
        for (i, p) in def.params.iter().enumerate() {
            if i == 0 && self_class.is_some() && p.ty.is_none() {
                let class = self_class.unwrap();
                params.push(Ty::Ptr(Box::new(Ty::Struct(class))));
                continue;
            }
            let te = p
                .ty
                .ok_or_else(|| self.err("parameters require a type annotation", p.span))?;
            let ty = self.resolve_type(&te, p.span)?;
            if matches!(ty, Ty::Struct(_) | Ty::Union(_)) {
                return Err(self.err(
                    "structs are passed by pointer; declare the parameter as Ptr[...]",
                    p.span,
                ));
            }
            params.push(ty);
        }
        let ret = match &def.ret {
            Some(te) => self.resolve_type(te, def.span)?,
            None => Ty::Void,
        };
        if matches!(ret, Ty::Struct(_) | Ty::Union(_)) {
            return Err(self.err(
                "structs are returned by pointer; declare the return type as Ptr[...]",
                def.span,
            ));
        }
        self.validate_param_words(&params, def.span)?;
        Ok(FnSig {
            params,
            ret,
            unchecked: false,
        })
    }

    /// AAPCS register assignment restrictions for 64-bit parameters.
    fn validate_param_words(&self, params: &[Ty], span: Span) -> Result<()> {
        let mut word = 0u32;
        for p in params {
            if p.is_wide() {
                if word % 2 == 1 {
                    word += 1; // pair alignment
                }
                if word + 2 > 4 {
                    return Err(self.err(
                        "64-bit parameters must fit in registers r0-r3",
                        span,
                    ));
                }
                word += 2;
            } else {
                word += 1;
            }
        }
        Ok(())
    }

    fn insert_callable(&mut self, name: Symbol, sig: FnSig, span: Span) -> Result<()> {
        if self
            .fn_sigs
            .insert(name, sig)
            .is_some_and(|old| !old.unchecked)
        {
            return Err(self.err(
                format!("duplicate definition of '{}'", self.name(name)),
                span,
            ));
        }
        Ok(())
    }

    // ────────────────────────────────────────────────────────────────────
    // Pass C: globals
    // ────────────────────────────────────────────────────────────────────

    fn pass_globals(&mut self, module: &Module<'a>) -> Result<()> {
        for item in &module.items {
            if let Item::Global {
                name,
                ty,
                init,
                volatile,
                span,
            } = item
            {
                if self.globals.contains_key(name) || self.fn_sigs.contains_key(name) {
                    return Err(self.err(
                        format!("duplicate definition of '{}'", self.name(*name)),
                        *span,
                    ));
                }
                let ty = self.resolve_type(ty, *span)?;
                if let Some(init) = init {
                    let got = self.check_expr(*init, Some(&ty))?;
                    self.require_assignable(&got, &ty, init.span)?;
                }
                self.globals.insert(*name, (ty.clone(), *volatile));
                self.global_order.push(GlobalDecl {
                    name: *name,
                    ty,
                    init: *init,
                    volatile: *volatile,
                });
            }
        }
        Ok(())
    }

    // ────────────────────────────────────────────────────────────────────
    // Pass D: function bodies
    // ────────────────────────────────────────────────────────────────────

    fn pass_bodies(&mut self, module: &Module<'a>) -> Result<()> {
        for item in &module.items {
            match item {
                Item::Function(def) => {
                    self.check_function(def.name, def)?;
                }
                Item::Class(def) => {
                    for method in &def.methods {
                        let symbol = self.method_symbols[&(def.name, method.name)];
                        self.check_function(symbol, method)?;
                    }
                }
                _ => {}
            }
        }
        Ok(())
    }

    fn check_function(&mut self, symbol: Symbol, def: &FunctionDef<'a>) -> Result<()> {
        let sig = self.fn_sigs[&symbol].clone();
        let is_interrupt = def
            .decorators
            .iter()
            .any(|d| self.interner.resolve(*d) == "interrupt");
        for d in &def.decorators {
            let name = self.interner.resolve(*d);
            if name != "interrupt" {
                return Err(self.err(
                    format!("unknown decorator '@{}' on a function", name),
                    def.span,
                ));
            }
        }
        if is_interrupt {
            if !sig.params.is_empty() || sig.ret != Ty::Void {
                return Err(self.err(
                    "@interrupt handlers take no parameters and return nothing",
                    def.span,
                ));
            }
            self.has_interrupt = true;
        }

        let fcx = bind_params(FnCtx::new(sig.ret.clone(), is_interrupt), def, &sig)?;
        self.fcx = Some(fcx);
        self.check_block(&def.body)?;
        let fcx = self.fcx.take().expect("function context");
        self.frames.insert(symbol, fcx.into_frame());
        Ok(())
    }

    fn fcx(&mut self) -> &mut FnCtx {
        self.fcx.as_mut().expect("statement outside a function")
    }

    /// Allocates (or re-uses) the frame slot for `name`.
    fn alloc_slot(&mut self, name: Symbol, ty: Ty, span: Span) -> Result<u32> {
        let align = if ty.is_wide() { 8 } else { ty.align_of(&self.registry).max(4) };
        let size = ty.size_of(&self.registry);
        let Some(fcx) = self.fcx.as_mut() else {
            return Err(Diagnostic::ty(
                "only constant expressions are allowed at module scope",
                span,
            ));
        };
        if let Some(&slot) = fcx.by_name.get(&name) {
            let existing = &fcx.slots[slot as usize].ty;
            if *existing != ty {
                let msg = format!(
                    "'{}' is already declared with type {}",
                    self.interner.resolve(name),
                    existing.display(self.interner)
                );
                return Err(Diagnostic::ty(msg, span));
            }
            return Ok(slot);
        }
        let offset = align_up(fcx.local_bytes, align);
        fcx.local_bytes = offset + size.max(4);
        let slot = fcx.slots.len() as u32;
        fcx.slots.push(LocalSlot { name, ty, offset });
        fcx.by_name.insert(name, slot);
        Ok(slot)
    }

    fn hidden_slot(&mut self, hint: &str, ty: Ty, span: Span) -> Result<u32> {
        let name = format!("__{}{}", hint, self.next_hidden);
        self.next_hidden += 1;
        let sym = self.interner.intern(&name);
        self.alloc_slot(sym, ty, span)
    }

    // ── Statements ──────────────────────────────────────────────────────

    fn check_block(&mut self, block: &[Stmt<'a>]) -> Result<()> {
        for stmt in block {
            self.check_stmt(stmt)?;
        }
        Ok(())
    }

    fn check_stmt(&mut self, stmt: &Stmt<'a>) -> Result<()> {
        match stmt {
            Stmt::Decl { name, ty, span } => {
                let ty = self.resolve_type(ty, *span)?;
                if ty == Ty::Void {
                    return Err(self.err("cannot declare a void variable", *span));
                }
                self.alloc_slot(*name, ty, *span)?;
                Ok(())
            }
            Stmt::Assign {
                target,
                ty,
                value,
                span,
            } => self.check_assign(*target, ty.as_ref(), *value, *span),
            Stmt::AugAssign {
                target,
                op,
                value,
                span,
            } => {
                let target_ty = self.check_expr(*target, None)?;
                self.require_lvalue(target)?;
                let value_ty = self.check_expr(*value, Some(&target_ty))?;
                let result = self.binary_result(*op, *target, &target_ty, *value, &value_ty, *span)?;
                self.require_assignable(&result, &target_ty, *span)?;
                Ok(())
            }
            Stmt::If { arms, orelse, .. } => {
                for (cond, body) in arms {
                    let ty = self.check_expr(*cond, Some(&Ty::Bool))?;
                    self.require_condition(&ty, cond.span)?;
                    self.check_block(body)?;
                }
                if let Some(body) = orelse {
                    self.check_block(body)?;
                }
                Ok(())
            }
            Stmt::While { cond, body, .. } => {
                let ty = self.check_expr(*cond, Some(&Ty::Bool))?;
                self.require_condition(&ty, cond.span)?;
                self.fcx().loop_depth += 1;
                self.check_block(body)?;
                self.fcx().loop_depth -= 1;
                Ok(())
            }
            Stmt::ForRange {
                var,
                start,
                stop,
                step,
                body,
                span,
            } => {
                for bound in [*start, Some(*stop), *step].into_iter().flatten() {
                    let ty = self.check_expr(bound, Some(&Ty::INT32))?;
                    if !ty.is_integer() {
                        return Err(self.err(
                            format!("range bounds must be integers, not {}", ty.display(self.interner)),
                            bound.span,
                        ));
                    }
                }
                self.alloc_slot(*var, Ty::INT32, *span)?;
                self.fcx().loop_depth += 1;
                self.check_block(body)?;
                self.fcx().loop_depth -= 1;
                Ok(())
            }
            Stmt::ForIter { span, .. } => Err(self.err(
                "only 'for ... in range(...)' iteration is supported",
                *span,
            )),
            Stmt::Break(span) | Stmt::Continue(span) => {
                if self.fcx().loop_depth == 0 {
                    return Err(self.err("'break'/'continue' outside a loop", *span));
                }
                Ok(())
            }
            Stmt::Return { value, span } => {
                let ret = self.fcx().ret.clone();
                match (value, ret == Ty::Void) {
                    (None, true) => Ok(()),
                    (None, false) => Err(self.err(
                        format!(
                            "this function must return {}",
                            ret.display(self.interner)
                        ),
                        *span,
                    )),
                    (Some(v), true) => Err(self.err("void function cannot return a value", v.span)),
                    (Some(v), false) => {
                        let got = self.check_expr(*v, Some(&ret))?;
                        self.require_assignable(&got, &ret, v.span)
                    }
                }
            }
            Stmt::Raise { exc, .. } => {
                if let Some(exc) = exc {
                    self.check_expr(*exc, None)?;
                }
                Ok(())
            }
            Stmt::Try {
                body,
                handlers,
                orelse,
                finally,
                ..
            } => {
                self.check_block(body)?;
                for handler in handlers {
                    if let Some(name) = handler.name {
                        self.alloc_slot(name, Ty::INT32, handler.span)?;
                    }
                    self.check_block(&handler.body)?;
                }
                if let Some(orelse) = orelse {
                    self.check_block(orelse)?;
                }
                if let Some(finally) = finally {
                    self.check_block(finally)?;
                }
                Ok(())
            }
            Stmt::With {
                ctx, name, body, span,
            } => {
                let ctx_ty = self.check_expr(*ctx, None)?;
                if !ctx_ty.is_pointer_shaped() {
                    return Err(self.err(
                        "'with' expects a pointer-shaped context value",
                        ctx.span,
                    ));
                }
                if let Some(name) = name {
                    self.alloc_slot(*name, ctx_ty, *span)?;
                }
                self.check_block(body)
            }
            Stmt::Match {
                scrutinee, arms, ..
            } => {
                let scrut_ty = self.check_expr(*scrutinee, None)?;
                if !(scrut_ty.is_integer() || scrut_ty == Ty::Str || scrut_ty == Ty::Char) {
                    return Err(self.err(
                        format!(
                            "match requires an integer or string scrutinee, not {}",
                            scrut_ty.display(self.interner)
                        ),
                        scrutinee.span,
                    ));
                }
                for arm in arms {
                    match arm.pattern {
                        Pattern::Wildcard => {}
                        Pattern::Literal(lit) => {
                            let got = self.check_expr(lit, Some(&scrut_ty))?;
                            self.require_assignable(&got, &scrut_ty, lit.span)?;
                        }
                        Pattern::Bind(name) => {
                            self.alloc_slot(name, scrut_ty.clone(), arm.span)?;
                        }
                    }
                    self.check_block(&arm.body)?;
                }
                Ok(())
            }
            Stmt::Asm { .. } | Stmt::Pass(_) => Ok(()),
            Stmt::Assert { cond, message, .. } => {
                let ty = self.check_expr(*cond, Some(&Ty::Bool))?;
                self.require_condition(&ty, cond.span)?;
                if let Some(message) = message {
                    let got = self.check_expr(*message, Some(&Ty::Str))?;
                    self.require_assignable(&got, &Ty::Str, message.span)?;
                }
                Ok(())
            }
            Stmt::Global { names, span } => {
                for name in names {
                    if !self.globals.contains_key(name) {
                        return Err(self.err(
                            format!("no module-scope variable named '{}'", self.name(*name)),
                            *span,
                        ));
                    }
                    self.fcx().declared_globals.insert(*name);
                }
                Ok(())
            }
            Stmt::Expr(e) => {
                if let ExprKind::FString(parts) = &e.kind {
                    self.check_fstring(e.id, *parts)?;
                } else {
                    self.check_expr(*e, None)?;
                }
                Ok(())
            }
        }
    }

    fn check_assign(
        &mut self,
        target: ExprRef<'a>,
        ty: Option<&TypeExpr<'a>>,
        value: ExprRef<'a>,
        span: Span,
    ) -> Result<()> {
        // Typed declaration: `x: T = e`.
        if let Some(te) = ty {
            let declared = self.resolve_type(te, span)?;
            let ExprKind::Ident(name) = target.kind else {
                return Err(self.err("only a plain name can carry a type annotation", target.span));
            };
            let got = self.check_expr(value, Some(&declared))?;
            self.require_assignable(&got, &declared, value.span)?;
            let slot = self.alloc_slot(name, declared.clone(), span)?;
            self.record(target, declared, Some(Binding::Local { slot }));
            return Ok(());
        }

        // Plain assignment to a name: introduce or reuse.
        if let ExprKind::Ident(name) = target.kind {
            let declared_global = self.fcx.as_ref().is_some_and(|f| f.declared_globals.contains(&name));
            let existing_local = self
                .fcx
                .as_ref()
                .and_then(|f| f.by_name.get(&name).copied())
                .filter(|_| !declared_global);
            if let Some(slot) = existing_local {
                let slot_ty = self.fcx.as_ref().unwrap().slots[slot as usize].ty.clone();
                let got = self.check_expr(value, Some(&slot_ty))?;
                self.require_assignable(&got, &slot_ty, value.span)?;
                self.record(target, slot_ty, Some(Binding::Local { slot }));
                return Ok(());
            }
            if declared_global {
                let (gty, _) = self.globals[&name].clone();
                let got = self.check_expr(value, Some(&gty))?;
                self.require_assignable(&got, &gty, value.span)?;
                self.record(target, gty, Some(Binding::Global { name }));
                return Ok(());
            }
            if self.globals.contains_key(&name) {
                return Err(self.err(
                    format!(
                        "assignment to module variable '{}' requires a 'global {}' declaration",
                        self.name(name),
                        self.name(name)
                    ),
                    target.span,
                ));
            }
            // New local of the RHS's type.
            let got = self.check_expr(value, None)?;
            if got == Ty::Void {
                return Err(self.err("cannot assign a void value", value.span));
            }
            let slot = self.alloc_slot(name, got.clone(), span)?;
            self.record(target, got, Some(Binding::Local { slot }));
            return Ok(());
        }

        // Store through a place expression.
        let target_ty = self.check_expr(target, None)?;
        self.require_lvalue(target)?;
        if let ExprKind::Index { base, .. } = &target.kind {
            if let Some(Ty::Dict(k, _)) = self.types[base.id.index()].as_ref() {
                if **k == Ty::Str {
                    return Err(self.err(
                        "string-keyed dict entries cannot be assigned (no set helper)",
                        target.span,
                    ));
                }
            }
        }
        let got = self.check_expr(value, Some(&target_ty))?;
        self.require_assignable(&got, &target_ty, value.span)
    }

    // ── Expressions ─────────────────────────────────────────────────────

    fn record(&mut self, e: ExprRef<'a>, ty: Ty, binding: Option<Binding>) -> Ty {
        self.types[e.id.index()] = Some(ty.clone());
        if let Some(b) = binding {
            self.bindings[e.id.index()] = Some(b);
        }
        ty
    }

    fn check_expr(&mut self, e: ExprRef<'a>, expected: Option<&Ty>) -> Result<Ty> {
        let ty = self.check_expr_inner(e, expected)?;
        self.types[e.id.index()] = Some(ty.clone());
        Ok(ty)
    }

    fn check_expr_inner(&mut self, e: ExprRef<'a>, expected: Option<&Ty>) -> Result<Ty> {
        match &e.kind {
            ExprKind::Int(v) => Ok(self.int_literal_ty(*v, expected)),
            ExprKind::Float(_) => Ok(match expected {
                Some(Ty::Float { bits }) => Ty::Float { bits: *bits },
                _ => Ty::Float { bits: 64 },
            }),
            ExprKind::Str(_) => Ok(match expected {
                Some(Ty::Str) => Ty::Str,
                _ => Ty::Ptr(Box::new(Ty::Char)),
            }),
            ExprKind::Bool(_) => Ok(Ty::Bool),
            ExprKind::NoneLit => Ok(match expected {
                Some(t) if t.is_pointer_shaped() => t.clone(),
                _ => Ty::Ptr(Box::new(Ty::Void)),
            }),
            ExprKind::FString(_) => Err(self.err(
                "f-strings print directly; they cannot be used as values",
                e.span,
            )),
            ExprKind::Ident(name) => self.check_ident(e, *name),
            ExprKind::Attr { base, name } => self.check_attr(e, base, *name),
            ExprKind::Index { base, index } => self.check_index(base, index, e.span),
            ExprKind::Slice {
                base, start, stop, step,
            } => {
                let base_ty = self.check_expr(base, None)?;
                if !matches!(base_ty, Ty::Str | Ty::Ptr(_)) {
                    return Err(self.err(
                        format!("cannot slice {}", base_ty.display(self.interner)),
                        e.span,
                    ));
                }
                for part in [*start, *stop, *step].into_iter().flatten() {
                    let ty = self.check_expr(part, Some(&Ty::INT32))?;
                    if !ty.is_integer() {
                        return Err(self.err("slice bounds must be integers", part.span));
                    }
                }
                Ok(Ty::Str)
            }
            ExprKind::Call { callee, args, kwargs } => {
                self.check_call(e, callee, args, kwargs, expected)
            }
            ExprKind::Unary { op, operand } => self.check_unary(*op, operand, expected, e.span),
            ExprKind::Binary { op, lhs, rhs } => {
                let lhs_ty = self.check_expr(lhs, expected.filter(|t| t.is_integer()))?;
                let rhs_expected = if lhs_ty.is_integer() || lhs_ty == Ty::Char {
                    Some(lhs_ty.clone())
                } else {
                    None
                };
                let rhs_ty = self.check_expr(rhs, rhs_expected.as_ref())?;
                self.binary_result(*op, lhs, &lhs_ty, rhs, &rhs_ty, e.span)
            }
            ExprKind::Ternary { cond, then, orelse } => {
                let cond_ty = self.check_expr(cond, Some(&Ty::Bool))?;
                self.require_condition(&cond_ty, cond.span)?;
                let then_ty = self.check_expr(then, expected)?;
                let orelse_ty = self.check_expr(orelse, Some(&then_ty))?;
                if self.assignable(&orelse_ty, &then_ty) {
                    Ok(then_ty)
                } else if self.assignable(&then_ty, &orelse_ty) {
                    Ok(orelse_ty)
                } else {
                    Err(self.err(
                        format!(
                            "ternary arms disagree: {} vs {}",
                            then_ty.display(self.interner),
                            orelse_ty.display(self.interner)
                        ),
                        e.span,
                    ))
                }
            }
            ExprKind::AddressOf(operand) => {
                let ty = self.check_expr(operand, None)?;
                self.require_lvalue(operand)?;
                Ok(match ty {
                    Ty::Array(_, elem) => Ty::Ptr(elem),
                    other => Ty::Ptr(Box::new(other)),
                })
            }
            ExprKind::Deref(operand) => {
                let ty = self.check_expr(operand, None)?;
                match ty {
                    Ty::Ptr(inner) if *inner != Ty::Void => Ok(*inner),
                    Ty::Ptr(_) => Err(self.err("cannot dereference Ptr[void]", e.span)),
                    Ty::Str => Ok(Ty::Char),
                    other => Err(self.err(
                        format!("cannot dereference {}", other.display(self.interner)),
                        e.span,
                    )),
                }
            }
            ExprKind::Cast { ty, value } => {
                self.check_expr(value, None)?;
                self.resolve_type(ty, e.span)
            }
            ExprKind::Sizeof(te) => {
                // The size itself is folded at emission.
                self.resolve_type(te, e.span)?;
                Ok(Ty::INT32)
            }
            ExprKind::Lambda { params, body } => self.check_lambda(e, params, body, expected),
            ExprKind::ListLit(elems) => self.check_list_lit(elems, expected, e.span),
            ExprKind::DictLit(pairs) => self.check_dict_lit(pairs, expected, e.span),
            ExprKind::TupleLit(elems) => {
                let mut tys = Vec::with_capacity(elems.len());
                for elem in *elems {
                    let ty = self.check_expr(elem, None)?;
                    self.require_word_sized(&ty, elem.span)?;
                    tys.push(ty);
                }
                Ok(Ty::Tuple(tys))
            }
            ExprKind::StructLit { name, fields } => self.check_struct_lit(*name, fields, e.span),
            ExprKind::Comp {
                elem, var, iter, filter,
            } => self.check_comp(e, elem, *var, iter, *filter),
        }
    }

    fn int_literal_ty(&self, v: i64, expected: Option<&Ty>) -> Ty {
        match expected {
            Some(t @ Ty::Int { .. }) if int_fits(v, t) => t.clone(),
            Some(Ty::Char) if (0..=255).contains(&v) => Ty::Char,
            _ => {
                if int_fits(v, &Ty::INT32) {
                    Ty::INT32
                } else if int_fits(v, &Ty::UINT32) {
                    Ty::UINT32
                } else {
                    Ty::INT64
                }
            }
        }
    }

    fn check_ident(&mut self, e: ExprRef<'a>, name: Symbol) -> Result<Ty> {
        // Locals first, unless masked by a `global` declaration.
        let declared_global = self
            .fcx
            .as_ref()
            .is_some_and(|f| f.declared_globals.contains(&name));
        if !declared_global {
            if let Some(slot) = self.fcx.as_ref().and_then(|f| f.by_name.get(&name).copied()) {
                let ty = self.fcx.as_ref().unwrap().slots[slot as usize].ty.clone();
                return Ok(self.record(e, ty, Some(Binding::Local { slot })));
            }
        }
        if let Some((ty, _)) = self.globals.get(&name).cloned() {
            return Ok(self.record(e, ty, Some(Binding::Global { name })));
        }
        if self.classes.contains(&name) {
            return Ok(self.record(e, Ty::Void, Some(Binding::Ctor { class: name })));
        }
        if let Some(sig) = self.fn_sigs.get(&name) {
            let ty = Ty::Fn {
                ret: Box::new(sig.ret.clone()),
                params: sig.params.clone(),
            };
            return Ok(self.record(e, ty, Some(Binding::Func { name })));
        }
        if self.module_aliases.contains(&name) {
            return Ok(self.record(e, Ty::Void, Some(Binding::Module)));
        }
        if let Some(fcx) = &self.fcx {
            if fcx.outer_names.contains(&name) {
                return Err(self.err(
                    format!("lambda cannot capture '{}'", self.name(name)),
                    e.span,
                ));
            }
        }
        Err(self.err(format!("unknown identifier '{}'", self.name(name)), e.span))
    }

    fn check_attr(&mut self, e: ExprRef<'a>, base: ExprRef<'a>, name: Symbol) -> Result<Ty> {
        // Module member: flat linkage, bare symbol.
        if let ExprKind::Ident(base_name) = base.kind {
            if !self
                .fcx
                .as_ref()
                .is_some_and(|f| f.by_name.contains_key(&base_name))
                && self.module_aliases.contains(&base_name)
            {
                self.record(base, Ty::Void, Some(Binding::Module));
                let sig = self
                    .fn_sigs
                    .entry(name)
                    .or_insert(FnSig {
                        params: Vec::new(),
                        ret: Ty::INT32,
                        unchecked: true,
                    })
                    .clone();
                let ty = Ty::Fn {
                    ret: Box::new(sig.ret),
                    params: sig.params,
                };
                return Ok(self.record(e, ty, Some(Binding::Func { name })));
            }
        }

        let base_ty = self.check_expr(base, None)?;
        let aggregate = match &base_ty {
            Ty::Struct(s) | Ty::Union(s) => Some(*s),
            Ty::Ptr(inner) => match inner.as_ref() {
                Ty::Struct(s) | Ty::Union(s) => Some(*s),
                _ => None,
            },
            _ => None,
        };
        if let Some(agg) = aggregate {
            if let Some(layout) = self.registry.layout(agg) {
                if let Some(field) = layout.field(name) {
                    let (offset, ty) = (field.offset, field.ty.clone());
                    return Ok(self.record(e, ty, Some(Binding::Field { offset })));
                }
            }
            if let Some(&symbol) = self.method_symbols.get(&(agg, name)) {
                let sig = &self.fn_sigs[&symbol];
                let ty = Ty::Fn {
                    ret: Box::new(sig.ret.clone()),
                    params: sig.params.clone(),
                };
                return Ok(self.record(e, ty, Some(Binding::Method { symbol })));
            }
            return Err(self.err(
                format!(
                    "no field or method '{}' on {}",
                    self.name(name),
                    base_ty.display(self.interner)
                ),
                e.span,
            ));
        }
        if base_ty == Ty::Str {
            if let Some(method) = StrMethod::from_name(self.interner.resolve(name)) {
                return Ok(self.record(e, Ty::Void, Some(Binding::StrMethod(method))));
            }
            return Err(self.err(
                format!("unknown string method '{}'", self.name(name)),
                e.span,
            ));
        }
        Err(self.err(
            format!("{} has no attributes", base_ty.display(self.interner)),
            e.span,
        ))
    }

    fn check_index(&mut self, base: ExprRef<'a>, index: ExprRef<'a>, span: Span) -> Result<Ty> {
        let base_ty = self.check_expr(base, None)?;
        match base_ty {
            Ty::Dict(k, v) => {
                let got = self.check_expr(index, Some(&k))?;
                self.require_assignable(&got, &k, index.span)?;
                Ok(*v)
            }
            Ty::Tuple(elems) => {
                let idx = fold::const_int(index).ok_or_else(|| {
                    self.err("tuple indices must be constant", index.span)
                })?;
                self.check_expr(index, Some(&Ty::INT32))?;
                elems
                    .get(idx as usize)
                    .cloned()
                    .ok_or_else(|| self.err("tuple index out of range", index.span))
            }
            _ => {
                let idx_ty = self.check_expr(index, Some(&Ty::INT32))?;
                if !idx_ty.is_integer() {
                    return Err(self.err("index must be an integer", index.span));
                }
                match base_ty {
                    Ty::Ptr(inner) if *inner != Ty::Void => Ok(*inner),
                    Ty::Str => Ok(Ty::Char),
                    Ty::Array(_, elem) => Ok(*elem),
                    Ty::List(elem) => Ok(*elem),
                    other => Err(self.err(
                        format!("cannot index {}", other.display(self.interner)),
                        span,
                    )),
                }
            }
        }
    }

    fn check_unary(
        &mut self,
        op: UnaryOp,
        operand: ExprRef<'a>,
        expected: Option<&Ty>,
        span: Span,
    ) -> Result<Ty> {
        match op {
            UnaryOp::Neg => {
                // Fold `-LITERAL` so INT32_MIN and friends type correctly.
                if let ExprKind::Int(v) = operand.kind {
                    let ty = self.int_literal_ty(v.wrapping_neg(), expected);
                    self.types[operand.id.index()] = Some(ty.clone());
                    return Ok(ty);
                }
                let ty = self.check_expr(operand, expected.filter(|t| t.is_integer()))?;
                if !ty.is_signed() {
                    return Err(self.err(
                        format!("cannot negate {}", ty.display(self.interner)),
                        span,
                    ));
                }
                Ok(ty)
            }
            UnaryOp::Not => {
                let ty = self.check_expr(operand, Some(&Ty::Bool))?;
                self.require_condition(&ty, operand.span)?;
                Ok(Ty::Bool)
            }
            UnaryOp::BitNot => {
                let ty = self.check_expr(operand, expected.filter(|t| t.is_integer()))?;
                if !ty.is_integer() {
                    return Err(self.err(
                        format!("'~' needs an integer, not {}", ty.display(self.interner)),
                        span,
                    ));
                }
                Ok(ty)
            }
        }
    }

    fn binary_result(
        &mut self,
        op: BinOp,
        lhs: ExprRef<'a>,
        lhs_ty: &Ty,
        rhs: ExprRef<'a>,
        rhs_ty: &Ty,
        span: Span,
    ) -> Result<Ty> {
        use BinOp::*;
        match op {
            And | Or => {
                self.require_condition(lhs_ty, lhs.span)?;
                self.require_condition(rhs_ty, rhs.span)?;
                Ok(Ty::Bool)
            }
            In | NotIn => {
                let ok_needle = matches!(lhs_ty, Ty::Char) || lhs_ty.is_integer();
                if !ok_needle || *rhs_ty != Ty::Str {
                    return Err(self.err(
                        "'in' tests a char against a string",
                        span,
                    ));
                }
                Ok(Ty::Bool)
            }
            Is | IsNot => {
                if !lhs_ty.is_pointer_shaped() || !rhs_ty.is_pointer_shaped() {
                    return Err(self.err("'is' compares pointer values", span));
                }
                Ok(Ty::Bool)
            }
            Eq | Ne | Lt | Le | Gt | Ge => {
                if lhs_ty == &Ty::Str && rhs_ty == &Ty::Str {
                    if matches!(op, Eq | Ne) {
                        return Ok(Ty::Bool);
                    }
                    return Err(self.err("strings only support '==' and '!='", span));
                }
                if lhs_ty.is_pointer_shaped() && rhs_ty.is_pointer_shaped() {
                    if matches!(op, Eq | Ne) {
                        return Ok(Ty::Bool);
                    }
                    return Err(self.err("pointers only support '==' and '!='", span));
                }
                if matches!(lhs_ty, Ty::Float { .. }) || matches!(rhs_ty, Ty::Float { .. }) {
                    return Err(self.err(
                        format!("float comparison is not supported on {}", self.target),
                        span,
                    ));
                }
                self.unify_numeric(lhs, lhs_ty, rhs, rhs_ty, span)?;
                Ok(Ty::Bool)
            }
            Add | Sub => {
                // Pointer arithmetic, scaled by the pointee size.
                match (lhs_ty, rhs_ty) {
                    (Ty::Ptr(_), r) if r.is_integer() => return Ok(lhs_ty.clone()),
                    (l, Ty::Ptr(_)) if l.is_integer() && op == Add => {
                        return Ok(rhs_ty.clone());
                    }
                    (Ty::Ptr(a), Ty::Ptr(b)) if op == Sub && a == b => {
                        return Ok(Ty::INT32);
                    }
                    (Ty::Str, r) if r.is_integer() => return Ok(Ty::Str),
                    _ => {}
                }
                self.arith(op, lhs, lhs_ty, rhs, rhs_ty, span)
            }
            Mul | Div | FloorDiv | Mod | Pow => {
                let ty = self.arith(op, lhs, lhs_ty, rhs, rhs_ty, span)?;
                if ty.is_wide() {
                    return Err(self.err(
                        format!("64-bit '{}' has no runtime helper", op.spelling()),
                        span,
                    ));
                }
                Ok(ty)
            }
            Shl | Shr => {
                if !lhs_ty.is_integer() || !rhs_ty.is_integer() {
                    return Err(self.err(
                        format!("'{}' needs integer operands", op.spelling()),
                        span,
                    ));
                }
                if lhs_ty.is_wide() {
                    return Err(self.err("64-bit shifts are not supported", span));
                }
                Ok(lhs_ty.clone())
            }
            BitAnd | BitOr | BitXor => self.arith(op, lhs, lhs_ty, rhs, rhs_ty, span),
        }
    }

    fn arith(
        &mut self,
        op: BinOp,
        lhs: ExprRef<'a>,
        lhs_ty: &Ty,
        rhs: ExprRef<'a>,
        rhs_ty: &Ty,
        span: Span,
    ) -> Result<Ty> {
        if matches!(lhs_ty, Ty::Float { .. }) || matches!(rhs_ty, Ty::Float { .. }) {
            return Err(self.err(
                format!("float arithmetic is not supported on {}", self.target),
                span,
            ));
        }
        if !lhs_ty.is_integer() || !rhs_ty.is_integer() {
            return Err(self.err(
                format!(
                    "'{}' needs integer operands, got {} and {}",
                    op.spelling(),
                    lhs_ty.display(self.interner),
                    rhs_ty.display(self.interner)
                ),
                span,
            ));
        }
        self.unify_numeric(lhs, lhs_ty, rhs, rhs_ty, span)
    }

    /// Widens matching-signedness integers; adapts bare literals.
    fn unify_numeric(
        &mut self,
        lhs: ExprRef<'a>,
        lhs_ty: &Ty,
        rhs: ExprRef<'a>,
        rhs_ty: &Ty,
        span: Span,
    ) -> Result<Ty> {
        if lhs_ty == rhs_ty {
            return Ok(lhs_ty.clone());
        }
        // A literal operand takes the other side's type when it fits.
        if let Some(v) = fold::const_int(rhs) {
            if int_fits(v, lhs_ty) {
                self.retype(rhs, lhs_ty.clone());
                return Ok(lhs_ty.clone());
            }
        }
        if let Some(v) = fold::const_int(lhs) {
            if int_fits(v, rhs_ty) {
                self.retype(lhs, rhs_ty.clone());
                return Ok(rhs_ty.clone());
            }
        }
        if let (
            Ty::Int { bits: lb, signed: ls },
            Ty::Int { bits: rb, signed: rs },
        ) = (lhs_ty, rhs_ty)
        {
            if ls == rs {
                let bits = (*lb).max(*rb);
                return Ok(Ty::Int { bits, signed: *ls });
            }
        }
        if (lhs_ty == &Ty::Char && rhs_ty.is_integer()) || (rhs_ty == &Ty::Char && lhs_ty.is_integer()) {
            return Err(self.err(
                "mixing char and integers needs ord()/chr()",
                span,
            ));
        }
        Err(self.err(
            format!(
                "mismatched operand types: {} and {}",
                lhs_ty.display(self.interner),
                rhs_ty.display(self.interner)
            ),
            span,
        ))
    }

    /// Overrides the recorded type of a literal subtree.
    fn retype(&mut self, e: ExprRef<'a>, ty: Ty) {
        self.types[e.id.index()] = Some(ty.clone());
        match &e.kind {
            ExprKind::Unary { operand, .. } => self.retype(operand, ty),
            ExprKind::Binary { lhs, rhs, .. } => {
                self.retype(lhs, ty.clone());
                self.retype(rhs, ty);
            }
            _ => {}
        }
    }

    // ── Calls ───────────────────────────────────────────────────────────

    fn check_call(
        &mut self,
        e: ExprRef<'a>,
        callee: ExprRef<'a>,
        args: &'a [ExprRef<'a>],
        kwargs: &'a [(Symbol, ExprRef<'a>)],
        expected: Option<&Ty>,
    ) -> Result<Ty> {
        if !kwargs.is_empty() {
            return Err(self.err("keyword arguments are not supported in calls", e.span));
        }

        // Named callee: locals shadow functions shadow intrinsics.
        if let ExprKind::Ident(name) = callee.kind {
            let is_local = self
                .fcx
                .as_ref()
                .is_some_and(|f| f.by_name.contains_key(&name));
            if !is_local {
                if self.classes.contains(&name) {
                    self.record(callee, Ty::Void, Some(Binding::Ctor { class: name }));
                    return self.check_ctor_call(name, args, e.span);
                }
                if let Some(sig) = self.fn_sigs.get(&name).cloned() {
                    self.record(
                        callee,
                        Ty::Fn {
                            ret: Box::new(sig.ret.clone()),
                            params: sig.params.clone(),
                        },
                        Some(Binding::Func { name }),
                    );
                    return self.check_args_against(&sig, args, None, e.span);
                }
                let text = self.interner.resolve(name).to_string();
                if text == "range" {
                    return Err(self.err(
                        "range(...) is only meaningful in a 'for' loop",
                        e.span,
                    ));
                }
                if let Some(intrinsic) = Intrinsic::from_name(&text) {
                    self.record(callee, Ty::Void, Some(Binding::Intrinsic(intrinsic)));
                    return self.check_intrinsic(intrinsic, args, expected, e.span);
                }
            }
        }

        // Method / string-method receivers.
        if let ExprKind::Attr { base, .. } = &callee.kind {
            let callee_ty = self.check_expr(callee, None)?;
            match self.bindings[callee.id.index()].clone() {
                Some(Binding::Method { symbol }) => {
                    let sig = self.fn_sigs[&symbol].clone();
                    return self.check_args_against(&sig, args, Some(*base), e.span);
                }
                Some(Binding::StrMethod(method)) => {
                    if args.len() != method.arity() {
                        return Err(self.err(
                            format!(
                                "'{}' takes {} argument(s), got {}",
                                method.helper(),
                                method.arity(),
                                args.len()
                            ),
                            e.span,
                        ));
                    }
                    for arg in args {
                        let got = self.check_expr(arg, Some(&Ty::Str))?;
                        self.require_assignable(&got, &Ty::Str, arg.span)?;
                    }
                    return Ok(method.result());
                }
                _ => {
                    // Fall through to indirect call through a field value.
                    return self.check_indirect_call(callee, callee_ty, args, e.span);
                }
            }
        }

        // Indirect call through any function-typed value.
        let callee_ty = self.check_expr(callee, None)?;
        self.check_indirect_call(callee, callee_ty, args, e.span)
    }

    fn check_indirect_call(
        &mut self,
        callee: ExprRef<'a>,
        callee_ty: Ty,
        args: &'a [ExprRef<'a>],
        span: Span,
    ) -> Result<Ty> {
        let Ty::Fn { ret, params } = callee_ty.clone() else {
            return Err(self.err(
                format!("cannot call {}", callee_ty.display(self.interner)),
                callee.span,
            ));
        };
        let words: u32 = params.iter().map(|p| if p.is_wide() { 2 } else { 1 }).sum();
        if words > 4 {
            return Err(self.err(
                "indirect calls take at most four argument words",
                span,
            ));
        }
        let sig = FnSig {
            params,
            ret: *ret,
            unchecked: false,
        };
        self.check_args_against(&sig, args, None, span)
    }

    fn check_args_against(
        &mut self,
        sig: &FnSig,
        args: &'a [ExprRef<'a>],
        receiver: Option<ExprRef<'a>>,
        span: Span,
    ) -> Result<Ty> {
        if sig.unchecked {
            for arg in args {
                self.check_expr(arg, None)?;
            }
            return Ok(sig.ret.clone());
        }
        let offset = usize::from(receiver.is_some());
        if args.len() + offset != sig.params.len() {
            return Err(self.err(
                format!(
                    "expected {} argument(s), got {}",
                    sig.params.len() - offset,
                    args.len()
                ),
                span,
            ));
        }
        if let Some(recv) = receiver {
            let got = self.types[recv.id.index()].clone().expect("receiver type");
            let want = &sig.params[0];
            let ok = match (&got, want) {
                (Ty::Struct(a), Ty::Ptr(p)) => matches!(p.as_ref(), Ty::Struct(b) if a == b),
                _ => self.assignable(&got, want),
            };
            if !ok {
                return Err(self.err(
                    format!(
                        "method receiver is {}, expected {}",
                        got.display(self.interner),
                        want.display(self.interner)
                    ),
                    recv.span,
                ));
            }
        }
        for (arg, want) in args.iter().zip(sig.params.iter().skip(offset)) {
            if let ExprKind::FString(_) = arg.kind {
                return Err(self.err(
                    "f-strings print directly; pass a str instead",
                    arg.span,
                ));
            }
            let got = self.check_expr(arg, Some(want))?;
            self.require_assignable(&got, want, arg.span)?;
        }
        Ok(sig.ret.clone())
    }

    fn check_ctor_call(&mut self, class: Symbol, args: &'a [ExprRef<'a>], span: Span) -> Result<Ty> {
        let init_name = self.interner.intern("__init__");
        if let Some(&init_sym) = self.method_symbols.get(&(class, init_name)) {
            let sig = self.fn_sigs[&init_sym].clone();
            if args.len() + 1 != sig.params.len() {
                return Err(self.err(
                    format!(
                        "{}() takes {} argument(s), got {}",
                        self.name(class),
                        sig.params.len() - 1,
                        args.len()
                    ),
                    span,
                ));
            }
            for (arg, want) in args.iter().zip(sig.params.iter().skip(1)) {
                let got = self.check_expr(arg, Some(want))?;
                self.require_assignable(&got, want, arg.span)?;
            }
        } else if !args.is_empty() {
            return Err(self.err(
                format!("{}() has no __init__ and takes no arguments", self.name(class)),
                span,
            ));
        }
        Ok(Ty::Ptr(Box::new(Ty::Struct(class))))
    }

    fn check_intrinsic(
        &mut self,
        intrinsic: Intrinsic,
        args: &'a [ExprRef<'a>],
        _expected: Option<&Ty>,
        span: Span,
    ) -> Result<Ty> {
        use Intrinsic::*;

        let arity: std::ops::RangeInclusive<usize> = match intrinsic {
            Dmb | Dsb | Isb | Wfi | Wfe | Sev | CriticalEnter | Clrex | Input => 0..=0,
            Print => 0..=1,
            Len | Ord | Chr | Abs | Clz | Rbit | Rev | Rev16 | CriticalExit | AtomicLoad => 1..=1,
            Min | Max | AtomicStore | AtomicAdd | AtomicSub | AtomicAnd | AtomicOr | AtomicXor
            | AtomicSwap | BitSet | BitClear | BitToggle | BitCheck => 2..=2,
            BitsGet => 3..=3,
            BitsSet => 4..=4,
        };
        if !arity.contains(&args.len()) {
            return Err(self.err(
                format!("wrong number of arguments (expected {:?})", arity),
                span,
            ));
        }

        if matches!(
            intrinsic,
            AtomicLoad | AtomicStore | AtomicAdd | AtomicSub | AtomicAnd | AtomicOr | AtomicXor
                | AtomicSwap | Clrex
        ) && !self.target.has_exclusives()
        {
            return Err(self.err(
                format!("atomic intrinsics are not available on {}", self.target),
                span,
            ));
        }
        if matches!(intrinsic, BitsGet | BitsSet) && !self.target.has_bitfield() {
            return Err(self.err(
                format!("bitfield intrinsics are not available on {}", self.target),
                span,
            ));
        }
        if matches!(intrinsic, Clz | Rbit) && !self.target.has_thumb2() {
            return Err(self.err(
                format!("clz()/rbit() are not available on {}", self.target),
                span,
            ));
        }

        match intrinsic {
            Dmb | Dsb | Isb | Wfi | Wfe | Sev | Clrex => Ok(Ty::Void),
            CriticalEnter => Ok(Ty::UINT32),
            CriticalExit => {
                let got = self.check_expr(args[0], Some(&Ty::UINT32))?;
                self.require_assignable(&got, &Ty::UINT32, args[0].span)?;
                Ok(Ty::Void)
            }
            Input => Ok(Ty::Str),
            Print => {
                if let Some(arg) = args.first() {
                    if let ExprKind::FString(parts) = &arg.kind {
                        self.check_fstring(arg.id, *parts)?;
                    } else {
                        let ty = self.check_expr(arg, None)?;
                        self.require_printable(&ty, arg.span)?;
                    }
                }
                Ok(Ty::Void)
            }
            Len => {
                let ty = self.check_expr(args[0], None)?;
                match ty {
                    Ty::Str | Ty::Array(_, _) | Ty::List(_) | Ty::Dict(_, _) | Ty::Tuple(_) => {
                        Ok(Ty::INT32)
                    }
                    other => Err(self.err(
                        format!("len() does not apply to {}", other.display(self.interner)),
                        span,
                    )),
                }
            }
            Ord => {
                let ty = self.check_expr(args[0], None)?;
                if !matches!(ty, Ty::Char | Ty::Str | Ty::Ptr(_)) {
                    return Err(self.err("ord() takes a char or a 1-char string", args[0].span));
                }
                Ok(Ty::INT32)
            }
            Chr => {
                let ty = self.check_expr(args[0], Some(&Ty::INT32))?;
                if !ty.is_integer() {
                    return Err(self.err("chr() takes an integer", args[0].span));
                }
                Ok(Ty::Char)
            }
            Abs => {
                let ty = self.check_expr(args[0], None)?;
                if !ty.is_signed() || ty.is_wide() {
                    return Err(self.err("abs() takes a signed 32-bit integer", args[0].span));
                }
                Ok(ty)
            }
            Min | Max => {
                let a = self.check_expr(args[0], None)?;
                let b = self.check_expr(args[1], Some(&a))?;
                let ty = self.unify_numeric(args[0], &a, args[1], &b, span)?;
                if ty.is_wide() {
                    return Err(self.err("min()/max() take 32-bit integers", span));
                }
                Ok(ty)
            }
            Clz | Rbit | Rev | Rev16 => {
                let ty = self.check_expr(args[0], Some(&Ty::UINT32))?;
                if !ty.is_integer() || ty.is_wide() {
                    return Err(self.err("bit intrinsics take a 32-bit integer", args[0].span));
                }
                Ok(Ty::UINT32)
            }
            AtomicLoad => {
                let ty = self.check_expr(args[0], None)?;
                match ty {
                    Ty::Ptr(inner) if inner.is_integer() && !inner.is_wide() => Ok(*inner),
                    _ => Err(self.err("atomic_load takes Ptr to a 32-bit integer", args[0].span)),
                }
            }
            AtomicStore | AtomicAdd | AtomicSub | AtomicAnd | AtomicOr | AtomicXor | AtomicSwap => {
                let ptr_ty = self.check_expr(args[0], None)?;
                let inner = match ptr_ty {
                    Ty::Ptr(inner) if inner.is_integer() && !inner.is_wide() => *inner,
                    _ => {
                        return Err(self.err(
                            "atomic operations take Ptr to a 32-bit integer",
                            args[0].span,
                        ));
                    }
                };
                let got = self.check_expr(args[1], Some(&inner))?;
                self.require_assignable(&got, &inner, args[1].span)?;
                if intrinsic == AtomicStore {
                    Ok(Ty::Void)
                } else {
                    // Returns the previous value.
                    Ok(inner)
                }
            }
            BitSet | BitClear | BitToggle | BitCheck => {
                let v = self.check_expr(args[0], Some(&Ty::UINT32))?;
                if !v.is_integer() || v.is_wide() {
                    return Err(self.err("bit_* take a 32-bit integer", args[0].span));
                }
                let n = self.check_expr(args[1], Some(&Ty::UINT32))?;
                if !n.is_integer() {
                    return Err(self.err("bit position must be an integer", args[1].span));
                }
                if intrinsic == BitCheck {
                    Ok(Ty::Bool)
                } else {
                    Ok(v)
                }
            }
            BitsGet => {
                let v = self.check_expr(args[0], Some(&Ty::UINT32))?;
                if !v.is_integer() || v.is_wide() {
                    return Err(self.err("bits_get takes a 32-bit integer", args[0].span));
                }
                for arg in &args[1..] {
                    if fold::const_int(arg).is_none() {
                        return Err(self.err("bit-field position and width must be constant", arg.span));
                    }
                    self.check_expr(arg, Some(&Ty::INT32))?;
                }
                Ok(Ty::UINT32)
            }
            BitsSet => {
                let v = self.check_expr(args[0], Some(&Ty::UINT32))?;
                if !v.is_integer() || v.is_wide() {
                    return Err(self.err("bits_set takes a 32-bit integer", args[0].span));
                }
                for arg in &args[1..3] {
                    if fold::const_int(arg).is_none() {
                        return Err(self.err("bit-field position and width must be constant", arg.span));
                    }
                    self.check_expr(arg, Some(&Ty::INT32))?;
                }
                let got = self.check_expr(args[3], Some(&Ty::UINT32))?;
                if !got.is_integer() {
                    return Err(self.err("bit-field value must be an integer", args[3].span));
                }
                Ok(v)
            }
        }
    }

    fn check_fstring(&mut self, id: ExprId, parts: &'a [FStringPart<'a>]) -> Result<()> {
        for part in parts {
            if let FStringPart::Expr(e) = part {
                let ty = self.check_expr(e, None)?;
                self.require_printable(&ty, e.span)?;
            }
        }
        self.types[id.index()] = Some(Ty::Void);
        Ok(())
    }

    fn require_printable(&self, ty: &Ty, span: Span) -> Result<()> {
        let ok = matches!(ty, Ty::Str | Ty::Char | Ty::Bool | Ty::Ptr(_))
            || (ty.is_integer() && !ty.is_wide());
        if !ok {
            return Err(self.err(
                format!("cannot print {}", ty.display(self.interner)),
                span,
            ));
        }
        Ok(())
    }

    // ── Literals and aggregates ─────────────────────────────────────────

    fn check_list_lit(
        &mut self,
        elems: &'a [ExprRef<'a>],
        expected: Option<&Ty>,
        span: Span,
    ) -> Result<Ty> {
        let elem_expected = match expected {
            Some(Ty::List(elem)) => Some(elem.as_ref().clone()),
            _ => None,
        };
        let mut elem_ty = elem_expected;
        for elem in elems {
            let got = self.check_expr(elem, elem_ty.as_ref())?;
            match &elem_ty {
                None => {
                    self.require_word_sized(&got, elem.span)?;
                    elem_ty = Some(got);
                }
                Some(want) => self.require_assignable(&got, want, elem.span)?,
            }
        }
        let elem_ty = elem_ty
            .ok_or_else(|| self.err("cannot infer the element type of an empty list", span))?;
        Ok(Ty::List(Box::new(elem_ty)))
    }

    fn check_dict_lit(
        &mut self,
        pairs: &'a [(ExprRef<'a>, ExprRef<'a>)],
        expected: Option<&Ty>,
        span: Span,
    ) -> Result<Ty> {
        let mut key_ty = match expected {
            Some(Ty::Dict(k, _)) => Some(k.as_ref().clone()),
            _ => None,
        };
        for (k, v) in pairs {
            let is_str_key = matches!(k.kind, ExprKind::Str(_));
            if !is_str_key && fold::const_int(k).is_none() {
                return Err(self.err("dict keys must be constant", k.span));
            }
            if fold::const_int(v).is_none() {
                return Err(self.err("dict values must be constant integers", v.span));
            }
            let got_k = self.check_expr(k, key_ty.as_ref())?;
            match &key_ty {
                None => {
                    if !matches!(got_k, Ty::Int { bits: 32, .. } | Ty::Str | Ty::Ptr(_)) {
                        return Err(self.err("dict keys must be int32 or str", k.span));
                    }
                    key_ty = Some(if matches!(got_k, Ty::Str | Ty::Ptr(_)) {
                        Ty::Str
                    } else {
                        got_k
                    });
                }
                Some(want) => self.require_assignable(&got_k, want, k.span)?,
            }
            let got_v = self.check_expr(v, Some(&Ty::INT32))?;
            self.require_assignable(&got_v, &Ty::INT32, v.span)?;
        }
        let key_ty = key_ty
            .ok_or_else(|| self.err("cannot infer the key type of an empty dict", span))?;
        Ok(Ty::Dict(Box::new(key_ty), Box::new(Ty::INT32)))
    }

    fn check_struct_lit(
        &mut self,
        name: Symbol,
        fields: &'a [(Symbol, ExprRef<'a>)],
        span: Span,
    ) -> Result<Ty> {
        let layout = self
            .registry
            .layout(name)
            .ok_or_else(|| self.err(format!("unknown struct '{}'", self.name(name)), span))?;
        if layout.is_union {
            return Err(self.err("unions have no literal form", span));
        }
        let expected: Vec<(Symbol, Ty)> =
            layout.fields.iter().map(|f| (f.name, f.ty.clone())).collect();
        let mut seen = HashSet::new();
        for (fname, value) in fields {
            let Some((_, want)) = expected.iter().find(|(n, _)| n == fname) else {
                return Err(self.err(
                    format!(
                        "'{}' has no field '{}'",
                        self.name(name),
                        self.name(*fname)
                    ),
                    value.span,
                ));
            };
            if !seen.insert(*fname) {
                return Err(self.err(
                    format!("field '{}' given twice", self.name(*fname)),
                    value.span,
                ));
            }
            let want = want.clone();
            let got = self.check_expr(value, Some(&want))?;
            self.require_assignable(&got, &want, value.span)?;
        }
        for (fname, _) in &expected {
            if !seen.contains(fname) {
                return Err(self.err(
                    format!(
                        "missing field '{}' in {} literal",
                        self.name(*fname),
                        self.name(name)
                    ),
                    span,
                ));
            }
        }
        Ok(Ty::Struct(name))
    }

    fn check_comp(
        &mut self,
        e: ExprRef<'a>,
        elem: ExprRef<'a>,
        var: Symbol,
        iter: ExprRef<'a>,
        filter: Option<ExprRef<'a>>,
    ) -> Result<Ty> {
        // The iterator must be a literal range(...) call.
        let ExprKind::Call { callee, args, kwargs } = &iter.kind else {
            return Err(self.err("comprehensions iterate over range(...)", iter.span));
        };
        let is_range = matches!(callee.kind, ExprKind::Ident(sym)
            if self.interner.resolve(sym) == "range");
        if !is_range || !kwargs.is_empty() || args.is_empty() || args.len() > 3 {
            return Err(self.err("comprehensions iterate over range(...)", iter.span));
        }
        for bound in *args {
            let ty = self.check_expr(bound, Some(&Ty::INT32))?;
            if !ty.is_integer() {
                return Err(self.err("range bounds must be integers", bound.span));
            }
        }
        if let Some(step) = args.get(2) {
            match fold::const_int(step) {
                Some(s) if s > 0 => {}
                _ => {
                    return Err(self.err(
                        "comprehension steps must be positive constants",
                        step.span,
                    ));
                }
            }
        }

        let var_slot = self.alloc_slot(var, Ty::INT32, e.span)?;
        let ptr_slot = self.hidden_slot("comp_ptr", Ty::Ptr(Box::new(Ty::Void)), e.span)?;
        let idx_slot = self.hidden_slot("comp_idx", Ty::INT32, e.span)?;
        self.comps.insert(
            e.id,
            CompInfo {
                var_slot,
                ptr_slot,
                idx_slot,
            },
        );

        let elem_ty = self.check_expr(elem, None)?;
        self.require_word_sized(&elem_ty, elem.span)?;
        if let Some(filter) = filter {
            let ty = self.check_expr(filter, Some(&Ty::Bool))?;
            self.require_condition(&ty, filter.span)?;
        }
        Ok(Ty::List(Box::new(elem_ty)))
    }

    fn check_lambda(
        &mut self,
        e: ExprRef<'a>,
        params: &'a [Symbol],
        body: ExprRef<'a>,
        expected: Option<&Ty>,
    ) -> Result<Ty> {
        let Some(Ty::Fn { ret, params: param_tys }) = expected else {
            return Err(self.err(
                "a lambda needs a Fn[...] annotation to fix its type",
                e.span,
            ));
        };
        if params.len() != param_tys.len() {
            return Err(self.err(
                format!(
                    "lambda takes {} parameter(s), annotation names {}",
                    params.len(),
                    param_tys.len()
                ),
                e.span,
            ));
        }

        let symbol = {
            let name = format!("__lambda_{}", self.next_lambda);
            self.next_lambda += 1;
            self.interner.intern(&name)
        };
        self.lambda_symbols.insert(e.id, symbol);

        // Check the body in a fresh frame; enclosing locals are visible only
        // for the capture diagnostic.
        let outer = self.fcx.take();
        let mut fcx = FnCtx::new(ret.as_ref().clone(), false);
        if let Some(outer_fcx) = &outer {
            fcx.outer_names = outer_fcx.by_name.keys().copied().collect();
        }
        self.fcx = Some(fcx);
        let result = (|| -> Result<()> {
            for (name, ty) in params.iter().zip(param_tys.iter()) {
                let slot = self.alloc_slot(*name, ty.clone(), e.span)?;
                self.fcx().param_slots.push(slot);
            }
            let ret_ty = self.fcx().ret.clone();
            let got = self.check_expr(body, Some(&ret_ty))?;
            self.require_assignable(&got, &ret_ty, body.span)
        })();
        let lambda_fcx = self.fcx.take().expect("lambda context");
        self.fcx = outer;
        result?;

        self.frames.insert(symbol, lambda_fcx.into_frame());
        self.fn_sigs.insert(
            symbol,
            FnSig {
                params: param_tys.clone(),
                ret: ret.as_ref().clone(),
                unchecked: false,
            },
        );
        Ok(Ty::Fn {
            ret: ret.clone(),
            params: param_tys.clone(),
        })
    }

    // ── Shared predicates ───────────────────────────────────────────────

    fn require_lvalue(&self, e: &Expr<'a>) -> Result<()> {
        if !e.is_lvalue() {
            return Err(self.err("expression is not assignable", e.span));
        }
        Ok(())
    }

    /// Conditions accept bool, integers, chars, and pointers (zero tests).
    fn require_condition(&self, ty: &Ty, span: Span) -> Result<()> {
        let ok = *ty == Ty::Bool
            || (ty.is_integer() && !ty.is_wide())
            || *ty == Ty::Char
            || ty.is_pointer_shaped();
        if !ok {
            return Err(self.err(
                format!("condition must be bool-like, not {}", ty.display(self.interner)),
                span,
            ));
        }
        Ok(())
    }

    fn assignable(&self, from: &Ty, to: &Ty) -> bool {
        if from == to {
            return true;
        }
        match (from, to) {
            // Implicit widening, same signedness.
            (
                Ty::Int { bits: fb, signed: fs },
                Ty::Int { bits: tb, signed: ts },
            ) => fs == ts && fb <= tb,
            // Str and Ptr[char] are interchangeable.
            (Ty::Str, Ty::Ptr(p)) | (Ty::Ptr(p), Ty::Str) => matches!(p.as_ref(), Ty::Char),
            // Arrays decay to element pointers.
            (Ty::Array(_, elem), Ty::Ptr(p)) => elem == p,
            // None and any pointer flow into Optional.
            (f, Ty::Optional(inner)) => self.assignable(f, inner) || matches!(f, Ty::Ptr(p) if **p == Ty::Void),
            // None (Ptr[void]) into any pointer.
            (Ty::Ptr(p), Ty::Ptr(_)) if **p == Ty::Void => true,
            // Any pointer into Ptr[void].
            (Ty::Ptr(_), Ty::Ptr(p)) if **p == Ty::Void => true,
            (Ty::Optional(inner), t) => self.assignable(inner, t),
            _ => false,
        }
    }

    fn require_assignable(&self, from: &Ty, to: &Ty, span: Span) -> Result<()> {
        if !self.assignable(from, to) {
            return Err(self.err(
                format!(
                    "expected {}, got {} (use cast[...] for explicit conversions)",
                    to.display(self.interner),
                    from.display(self.interner)
                ),
                span,
            ));
        }
        Ok(())
    }
}

/// Binds a function's parameters into its fresh frame context.
fn bind_params<'a>(mut fcx: FnCtx, def: &FunctionDef<'a>, sig: &FnSig) -> Result<FnCtx> {
    for (param, ty) in def.params.iter().zip(sig.params.iter()) {
        if param.default.is_some() {
            return Err(Diagnostic::ty(
                "parameter defaults are not supported",
                param.span,
            ));
        }
        let (align, size) = if ty.is_wide() { (8, 8) } else { (4, 4) };
        let offset = align_up(fcx.local_bytes, align);
        fcx.local_bytes = offset + size;
        let slot = fcx.slots.len() as u32;
        fcx.slots.push(LocalSlot {
            name: param.name,
            ty: ty.clone(),
            offset,
        });
        fcx.by_name.insert(param.name, slot);
        fcx.param_slots.push(slot);
    }
    Ok(fcx)
}

fn int_fits(v: i64, ty: &Ty) -> bool {
    match ty {
        Ty::Int { bits: 8, signed: true } => i8::try_from(v).is_ok(),
        Ty::Int { bits: 16, signed: true } => i16::try_from(v).is_ok(),
        Ty::Int { bits: 32, signed: true } => i32::try_from(v).is_ok(),
        Ty::Int { bits: 64, signed: true } => true,
        Ty::Int { bits: 8, signed: false } => (0..=0xff).contains(&v),
        Ty::Int { bits: 16, signed: false } => (0..=0xffff).contains(&v),
        Ty::Int { bits: 32, signed: false } => (0..=0xffff_ffff).contains(&v),
        Ty::Int { bits: 64, signed: false } => v >= 0,
        _ => false,
    }
}
