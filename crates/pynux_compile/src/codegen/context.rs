//! The emission context threaded through the generator.
//!
//! [`Emitter`] owns the section buffers, the `.rodata` string pool, and the
//! per-function state (label counter, loop stack, temporary-push depth).
//! Everything the expression and statement emitters need — slot addressing,
//! immediate loads, aligned helper calls — lives here so the lowering code
//! reads as instruction selection only.

use std::collections::HashMap;
use std::fmt::Write as _;

use pynux_base::{Diagnostic, Interner, LineMap, Span, Symbol};

use crate::analysis::{CheckedModule, FrameInfo, Ty};
use crate::codegen::asciz_escape;
use crate::target::Target;

/// Labels a `break`/`continue` can land on, plus the temporary depth at
/// loop entry so jumps out of the loop can drop stacked temporaries.
pub(crate) struct LoopLabels {
    pub cont: String,
    pub brk: String,
    pub depth: u32,
}

/// Per-function emission state.
pub(crate) struct FnState {
    /// `None` for the synthetic `__init_<unit>` sequence, which has no
    /// frame slots of its own.
    pub symbol: Option<Symbol>,
    pub label_base: String,
    pub next_label: u32,
    /// Words currently pushed by the expression discipline.
    pub temp_depth: u32,
    pub loop_stack: Vec<LoopLabels>,
    /// Nonzero while emitting `except` handler bodies; a bare `raise`
    /// there re-raises.
    pub handler_depth: u32,
}

/// Owns the output buffers and emission state for one translation unit.
pub(crate) struct Emitter<'c, 'a> {
    pub checked: &'c CheckedModule<'a>,
    pub interner: &'c Interner,
    pub target: Target,
    pub line_comments: bool,
    pub line_map: LineMap,

    pub text: String,
    pub rodata: String,
    pub data: String,
    pub bss: String,
    /// Interrupt handlers, in declaration order.
    pub vectors: Vec<Symbol>,

    str_labels: HashMap<Symbol, u32>,
    str_order: Vec<Symbol>,
    next_const: u32,

    pub fns: Option<FnState>,
    last_comment_line: usize,
}

impl<'c, 'a> Emitter<'c, 'a> {
    pub fn new(
        checked: &'c CheckedModule<'a>,
        interner: &'c Interner,
        target: Target,
        source: &str,
        line_comments: bool,
    ) -> Self {
        Emitter {
            checked,
            interner,
            target,
            line_comments,
            line_map: LineMap::new(source),
            text: String::new(),
            rodata: String::new(),
            data: String::new(),
            bss: String::new(),
            vectors: Vec::new(),
            str_labels: HashMap::new(),
            str_order: Vec::new(),
            next_const: 0,
            fns: None,
            last_comment_line: 0,
        }
    }

    pub fn emit_err(&self, message: impl Into<String>, span: Span) -> Diagnostic {
        Diagnostic::emit(message, span)
    }

    // ── Raw emission ────────────────────────────────────────────────────

    /// One instruction line into `.text`.
    pub fn ins(&mut self, instruction: &str) {
        let _ = writeln!(self.text, "    {}", instruction);
    }

    pub fn ins_fmt(&mut self, instruction: String) {
        let _ = writeln!(self.text, "    {}", instruction);
    }

    pub fn raw(&mut self, line: &str) {
        let _ = writeln!(self.text, "{}", line);
    }

    pub fn label(&mut self, name: &str) {
        let _ = writeln!(self.text, "{}:", name);
    }

    /// Optional `@`-comment mapping the next instructions to a source line.
    pub fn source_note(&mut self, span: Span) {
        if !self.line_comments {
            return;
        }
        let (line, _) = self.line_map.locate(span.start);
        if line != self.last_comment_line {
            self.last_comment_line = line;
            let _ = writeln!(self.text, "    @ line {}", line);
        }
    }

    // ── Labels ──────────────────────────────────────────────────────────

    pub fn state(&mut self) -> &mut FnState {
        self.fns.as_mut().expect("emission outside a function")
    }

    pub fn new_label(&mut self) -> String {
        let state = self.state();
        let n = state.next_label;
        state.next_label += 1;
        format!(".L{}_{}", state.label_base, n)
    }

    pub fn temp_depth(&self) -> u32 {
        self.fns.as_ref().map(|f| f.temp_depth).unwrap_or(0)
    }

    // ── String pool ─────────────────────────────────────────────────────

    /// Interns a string literal, returning its `.rodata` label. Identical
    /// contents share one label; first occurrence fixes numbering.
    pub fn string_label(&mut self, content: Symbol) -> String {
        if let Some(&n) = self.str_labels.get(&content) {
            return format!(".LC{}", n);
        }
        let n = self.next_const;
        self.next_const += 1;
        self.str_labels.insert(content, n);
        self.str_order.push(content);
        format!(".LC{}", n)
    }

    /// A fresh `.LC` label for a constant data image (dict/list literals).
    pub fn const_label(&mut self) -> String {
        let n = self.next_const;
        self.next_const += 1;
        format!(".LC{}", n)
    }

    /// Writes the accumulated string pool into `.rodata`.
    pub fn flush_strings(&mut self) {
        let order = std::mem::take(&mut self.str_order);
        for sym in order {
            let n = self.str_labels[&sym];
            let text = asciz_escape(self.interner.resolve(sym));
            let _ = writeln!(self.rodata, ".LC{}:", n);
            let _ = writeln!(self.rodata, "    .asciz \"{}\"", text);
            let _ = writeln!(self.rodata, "    .align 2");
        }
    }

    // ── Temporaries ─────────────────────────────────────────────────────

    /// Pushes `r0` as an expression temporary.
    pub fn push_r0(&mut self) {
        self.ins("push {r0}");
        self.state().temp_depth += 1;
    }

    /// Pushes an `r0:r1` pair (low word at lower address).
    pub fn push_pair(&mut self) {
        self.ins("push {r0, r1}");
        self.state().temp_depth += 2;
    }

    pub fn pop_into(&mut self, reg: &str) {
        self.ins_fmt(format!("pop {{{}}}", reg));
        self.state().temp_depth -= 1;
    }

    pub fn pop_pair_into(&mut self, lo: &str, hi: &str) {
        self.ins_fmt(format!("pop {{{}, {}}}", lo, hi));
        self.state().temp_depth -= 2;
    }

    /// Drops `words` stacked temporaries without reading them.
    pub fn drop_temps(&mut self, words: u32) {
        if words > 0 {
            self.adjust_sp_up(words * 4);
            self.state().temp_depth -= words;
        }
    }

    // ── Stack pointer arithmetic ────────────────────────────────────────

    /// `sub sp, sp, #bytes`, split to stay within the imm7 encoding.
    pub fn adjust_sp_down(&mut self, mut bytes: u32) {
        while bytes > 0 {
            let step = bytes.min(508);
            self.ins_fmt(format!("sub sp, sp, #{}", step));
            bytes -= step;
        }
    }

    pub fn adjust_sp_up(&mut self, mut bytes: u32) {
        while bytes > 0 {
            let step = bytes.min(508);
            self.ins_fmt(format!("add sp, sp, #{}", step));
            bytes -= step;
        }
    }

    // ── Immediates ──────────────────────────────────────────────────────

    /// Loads a 32-bit constant into `reg`.
    pub fn load_const(&mut self, reg: &str, value: i64) {
        let v = value as i32;
        if (0..=255).contains(&v) {
            self.ins_fmt(format!("movs {}, #{}", reg, v));
        } else {
            self.ins_fmt(format!("ldr {}, ={}", reg, v));
        }
    }

    /// Loads a 64-bit constant into `r0:r1`.
    pub fn load_const_wide(&mut self, value: i64) {
        let lo = value as u32;
        let hi = (value >> 32) as u32;
        if lo <= 255 {
            self.ins_fmt(format!("movs r0, #{}", lo));
        } else {
            self.ins_fmt(format!("ldr r0, ={}", lo));
        }
        if hi <= 255 {
            self.ins_fmt(format!("movs r1, #{}", hi));
        } else {
            self.ins_fmt(format!("ldr r1, ={}", hi));
        }
    }

    // ── Frame slots ─────────────────────────────────────────────────────

    pub fn frame(&self) -> &FrameInfo {
        let symbol = self
            .fns
            .as_ref()
            .expect("no current function")
            .symbol
            .expect("frame slots outside a user function");
        &self.checked.frames[&symbol]
    }

    /// A slot's `sp`-relative offset, adjusted for pushed temporaries.
    pub fn slot_offset(&self, slot: u32) -> u32 {
        self.frame().slot(slot).offset + self.temp_depth() * 4
    }

    /// Materializes `sp + bytes` into `reg` (an address).
    pub fn addr_of_sp(&mut self, reg: &str, bytes: u32) {
        if bytes == 0 {
            self.ins_fmt(format!("mov {}, sp", reg));
        } else if bytes <= 1020 && bytes % 4 == 0 {
            self.ins_fmt(format!("add {}, sp, #{}", reg, bytes));
        } else {
            self.ins_fmt(format!("mov {}, sp", reg));
            self.ins_fmt(format!("ldr r3, ={}", bytes));
            self.ins_fmt(format!("add {}, r3", reg));
        }
    }

    /// Loads the word at `[sp, #bytes]` into `reg`.
    pub fn load_sp_word(&mut self, reg: &str, bytes: u32) {
        if bytes <= 1020 && bytes % 4 == 0 {
            self.ins_fmt(format!("ldr {}, [sp, #{}]", reg, bytes));
        } else {
            self.addr_of_sp("r3", bytes);
            self.ins_fmt(format!("ldr {}, [r3]", reg));
        }
    }

    pub fn store_sp_word(&mut self, reg: &str, bytes: u32) {
        if bytes <= 1020 && bytes % 4 == 0 {
            self.ins_fmt(format!("str {}, [sp, #{}]", reg, bytes));
        } else {
            self.addr_of_sp("r3", bytes);
            self.ins_fmt(format!("str {}, [r3]", reg));
        }
    }

    // ── Helper calls ────────────────────────────────────────────────────

    /// `bl` to a runtime helper with arguments already in registers,
    /// padding `sp` to 8 bytes when the temporary depth is odd.
    pub fn call_helper(&mut self, symbol: &str) {
        let pad = self.temp_depth() % 2 == 1;
        if pad {
            self.ins("sub sp, sp, #4");
        }
        self.ins_fmt(format!("bl {}", symbol));
        if pad {
            self.ins("add sp, sp, #4");
        }
    }

    // ── Typed memory access ─────────────────────────────────────────────

    /// Loads a value of `ty` from the address in `addr_reg` into `r0`
    /// (`r0:r1` when wide). `addr_reg` may be `r0`.
    pub fn load_typed(&mut self, ty: &Ty, addr_reg: &str) {
        match load_kind(ty) {
            AccessKind::Byte { signed } => {
                self.ins_fmt(format!("ldrb r0, [{}]", addr_reg));
                if signed {
                    self.ins("sxtb r0, r0");
                }
            }
            AccessKind::Half { signed } => {
                self.ins_fmt(format!("ldrh r0, [{}]", addr_reg));
                if signed {
                    self.ins("sxth r0, r0");
                }
            }
            AccessKind::Word => {
                self.ins_fmt(format!("ldr r0, [{}]", addr_reg));
            }
            AccessKind::Wide => {
                // Order matters when addr_reg is r0.
                self.ins_fmt(format!("ldr r1, [{}, #4]", addr_reg));
                self.ins_fmt(format!("ldr r0, [{}]", addr_reg));
            }
        }
    }

    /// Stores `r0` (or `r0:r1`) through the address in `addr_reg`
    /// (which must not be `r0` or `r1`).
    pub fn store_typed(&mut self, ty: &Ty, addr_reg: &str) {
        match load_kind(ty) {
            AccessKind::Byte { .. } => self.ins_fmt(format!("strb r0, [{}]", addr_reg)),
            AccessKind::Half { .. } => self.ins_fmt(format!("strh r0, [{}]", addr_reg)),
            AccessKind::Word => self.ins_fmt(format!("str r0, [{}]", addr_reg)),
            AccessKind::Wide => {
                self.ins_fmt(format!("str r0, [{}]", addr_reg));
                self.ins_fmt(format!("str r1, [{}, #4]", addr_reg));
            }
        }
    }

    /// Loads the local in `slot` into `r0` (`r0:r1` when wide).
    pub fn load_slot(&mut self, slot: u32) {
        let ty = self.frame().slot(slot).ty.clone();
        let off = self.slot_offset(slot);
        match load_kind(&ty) {
            AccessKind::Word => self.load_sp_word("r0", off),
            AccessKind::Wide => {
                self.load_sp_word("r0", off);
                self.load_sp_word("r1", off + 4);
            }
            _ => {
                self.addr_of_sp("r2", off);
                self.load_typed(&ty, "r2");
            }
        }
    }

    /// Stores `r0` (or `r0:r1`) into the local in `slot`.
    pub fn store_slot(&mut self, slot: u32) {
        let ty = self.frame().slot(slot).ty.clone();
        let off = self.slot_offset(slot);
        match load_kind(&ty) {
            AccessKind::Word => self.store_sp_word("r0", off),
            AccessKind::Wide => {
                self.store_sp_word("r0", off);
                self.store_sp_word("r1", off + 4);
            }
            _ => {
                self.addr_of_sp("r2", off);
                self.store_typed(&ty, "r2");
            }
        }
    }
}

/// How a type moves through memory.
pub(crate) enum AccessKind {
    Byte { signed: bool },
    Half { signed: bool },
    Word,
    Wide,
}

/// Access width for loads and stores of `ty`.
///
/// Aggregates are addressed, not moved, so they never reach here; treating
/// them as words would be a generator bug caught by the callers' guards.
pub(crate) fn load_kind(ty: &Ty) -> AccessKind {
    match ty {
        Ty::Int { bits: 8, signed } => AccessKind::Byte { signed: *signed },
        Ty::Bool | Ty::Char => AccessKind::Byte { signed: false },
        Ty::Int { bits: 16, signed } => AccessKind::Half { signed: *signed },
        Ty::Int { bits: 64, .. } | Ty::Float { bits: 64 } => AccessKind::Wide,
        Ty::Optional(inner) => load_kind(inner),
        _ => AccessKind::Word,
    }
}
