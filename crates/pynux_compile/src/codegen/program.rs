//! Translation-unit assembly.
//!
//! [`codegen_unit`] drives emission for one checked module:
//!
//! 1. `.syntax unified` / `.cpu <target>` / `.thumb` header
//! 2. `.text`: every function in source order (class methods inline, then
//!    lambdas, then the synthetic `__init_<unit>` when non-constant global
//!    initializers exist), each closed by `.ltorg`
//! 3. `.rodata`: the deduplicated string pool
//! 4. `.data` / `.bss`: globals in declaration order
//! 5. `.vectors`: interrupt handlers, only when any are declared
//!
//! The entry point is the function named `main`; failing that, the first
//! function named `kernel_main` also receives a `main` label. The entry
//! function calls `__init_<unit>` before its body when the unit has
//! runtime-initialized globals.

use pynux_base::{Interner, Result, Symbol};
use pynux_language::ast::{Expr, ExprKind, ExprRef, FStringPart, Item, Stmt};

use super::context::{Emitter, FnState};
use super::label_sanitize;
use crate::analysis::{align_up, CheckedModule, FrameInfo, Ty};
use crate::optimize::fold;
use crate::target::Target;

/// Options for one emission run.
pub struct EmitOptions<'s> {
    pub target: Target,
    pub unit_name: &'s str,
    pub line_comments: bool,
}

/// Emits the complete assembly text for one translation unit.
pub fn codegen_unit(
    checked: &CheckedModule<'_>,
    interner: &Interner,
    source: &str,
    options: &EmitOptions<'_>,
) -> Result<String> {
    let mut em = Emitter::new(checked, interner, options.target, source, options.line_comments);
    let module = &checked.module;

    let has_main = module.items.iter().any(|item| {
        matches!(item, Item::Function(f) if interner.resolve(f.name) == "main")
    });
    let runtime_inits: Vec<(Symbol, Ty, ExprRef<'_>)> = checked
        .globals
        .iter()
        .filter_map(|g| {
            let init = g.init?;
            if constant_global_init(init) {
                None
            } else {
                Some((g.name, g.ty.clone(), init))
            }
        })
        .collect();
    let init_symbol = if runtime_inits.is_empty() {
        None
    } else {
        Some(format!("__init_{}", label_sanitize(options.unit_name)))
    };

    // Functions, in source order.
    for item in &module.items {
        match item {
            Item::Function(def) => {
                let name = interner.resolve(def.name).to_string();
                let is_entry =
                    name == "main" || (!has_main && name == "kernel_main");
                let alias_main = !has_main && name == "kernel_main";
                emit_function(
                    &mut em,
                    def.name,
                    &def.body,
                    is_entry.then(|| init_symbol.clone()).flatten(),
                    alias_main,
                    true,
                )?;
            }
            Item::Class(def) => {
                for method in &def.methods {
                    let symbol = checked.method_symbols[&(def.name, method.name)];
                    emit_function(&mut em, symbol, &method.body, None, false, true)?;
                }
            }
            _ => {}
        }
    }

    // Lambda bodies, in checking order.
    for (expr, symbol) in collect_lambdas(checked) {
        emit_lambda(&mut em, symbol, expr)?;
    }

    // Synthetic initializer for non-constant globals.
    if let Some(init_symbol) = &init_symbol {
        emit_init_fn(&mut em, init_symbol, &runtime_inits)?;
    }

    emit_globals(&mut em)?;
    em.flush_strings();

    // Assemble the final text.
    let mut out = String::new();
    out.push_str("    .syntax unified\n");
    out.push_str(&format!("    .cpu {}\n", options.target.cpu_directive()));
    out.push_str("    .thumb\n\n");
    if !em.text.is_empty() {
        out.push_str("    .text\n");
        out.push_str(&em.text);
    }
    if !em.rodata.is_empty() {
        out.push_str("    .section .rodata\n");
        out.push_str(&em.rodata);
    }
    if !em.data.is_empty() {
        out.push_str("    .data\n");
        out.push_str(&em.data);
    }
    if !em.bss.is_empty() {
        out.push_str("    .bss\n");
        out.push_str(&em.bss);
    }
    if !em.vectors.is_empty() {
        out.push_str("    .section .vectors, \"a\"\n");
        let handlers: Vec<String> = em
            .vectors
            .iter()
            .map(|h| interner.resolve(*h).to_string())
            .collect();
        for handler in handlers {
            out.push_str(&format!("    .word {}\n", handler));
        }
    }
    Ok(out)
}

/// The padded `sub sp` amount: locals rounded to 8, plus 4 so that the
/// 20-byte register push leaves `sp` 8-byte aligned.
fn frame_size(frame: &FrameInfo) -> u32 {
    align_up(frame.local_bytes, 8) + 4
}

fn emit_function<'c, 'a>(
    em: &mut Emitter<'c, 'a>,
    symbol: Symbol,
    body: &'c [Stmt<'a>],
    init_call: Option<String>,
    alias_main: bool,
    global: bool,
) -> Result<()> {
    let name = em.interner.resolve(symbol).to_string();
    let frame = em.checked.frames[&symbol].clone();
    let size = frame_size(&frame);

    em.raw("");
    em.raw("    .align 1");
    if global {
        em.raw(&format!("    .global {}", name));
    }
    em.raw(&format!("    .type {}, %function", name));
    em.raw("    .thumb_func");
    if alias_main {
        em.raw("    .global main");
        em.raw("    .type main, %function");
        em.raw("main:");
    }
    em.label(&name);

    em.fns = Some(FnState {
        symbol: Some(symbol),
        label_base: label_sanitize(&name),
        next_label: 0,
        temp_depth: 0,
        loop_stack: Vec::new(),
        handler_depth: 0,
    });
    if frame.is_interrupt {
        em.vectors.push(symbol);
    }

    em.ins("push {r4, r5, r6, r7, lr}");
    em.adjust_sp_down(size);
    spill_params(em, &frame, size);
    if let Some(init_symbol) = init_call {
        em.ins_fmt(format!("bl {}", init_symbol));
    }

    em.block(body)?;

    let label_base = em.state().label_base.clone();
    em.label(&format!(".L{}_return", label_base));
    em.adjust_sp_up(size);
    if frame.is_interrupt && em.target.has_thumb2() {
        em.ins("pop {r4, r5, r6, r7, lr}");
        em.ins("bx lr");
    } else {
        em.ins("pop {r4, r5, r6, r7, pc}");
    }
    em.raw("    .ltorg");
    em.fns = None;
    Ok(())
}

/// Stores incoming arguments into their frame slots.
///
/// The first four words arrive in `r0..r3` (64-bit values in even/odd
/// pairs); later words sit above the saved registers at
/// `[sp, #frame + 20 + 4i]`. Stack-passed parameters are copied after the
/// register parameters, so `r0` is free as scratch by then.
fn spill_params(em: &mut Emitter<'_, '_>, frame: &FrameInfo, size: u32) {
    let mut reg = 0u32;
    let mut stack_i = 0u32;
    for &slot_idx in &frame.param_slots {
        let slot = frame.slot(slot_idx);
        let off = slot.offset;
        if slot.ty.is_wide() {
            if reg % 2 == 1 {
                reg += 1;
            }
            store_reg_to_frame(em, reg, off);
            store_reg_to_frame(em, reg + 1, off + 4);
            reg += 2;
        } else if reg < 4 {
            store_reg_to_frame(em, reg, off);
            reg += 1;
        } else {
            let src = size + 20 + stack_i * 4;
            em.load_sp_word("r0", src);
            em.store_sp_word("r0", off);
            stack_i += 1;
        }
    }
}

/// `str rN, [sp, #off]` using `r4` (already saved) for out-of-range
/// offsets, so live parameter registers are never clobbered.
fn store_reg_to_frame(em: &mut Emitter<'_, '_>, reg: u32, off: u32) {
    if off <= 1020 && off % 4 == 0 {
        em.ins_fmt(format!("str r{}, [sp, #{}]", reg, off));
    } else {
        em.ins_fmt(format!("ldr r4, ={}", off));
        em.ins("add r4, sp");
        em.ins_fmt(format!("str r{}, [r4]", reg));
    }
}

fn emit_lambda<'c, 'a>(
    em: &mut Emitter<'c, 'a>,
    symbol: Symbol,
    lambda: ExprRef<'a>,
) -> Result<()> {
    let ExprKind::Lambda { body, .. } = &lambda.kind else {
        return Err(em.emit_err("lambda table points at a non-lambda", lambda.span));
    };
    let name = em.interner.resolve(symbol).to_string();
    let frame = em.checked.frames[&symbol].clone();
    let size = frame_size(&frame);

    em.raw("");
    em.raw("    .align 1");
    em.raw(&format!("    .type {}, %function", name));
    em.raw("    .thumb_func");
    em.label(&name);
    em.fns = Some(FnState {
        symbol: Some(symbol),
        label_base: label_sanitize(&name),
        next_label: 0,
        temp_depth: 0,
        loop_stack: Vec::new(),
        handler_depth: 0,
    });
    em.ins("push {r4, r5, r6, r7, lr}");
    em.adjust_sp_down(size);
    spill_params(em, &frame, size);
    em.expr(body)?;
    let label_base = em.state().label_base.clone();
    em.label(&format!(".L{}_return", label_base));
    em.adjust_sp_up(size);
    em.ins("pop {r4, r5, r6, r7, pc}");
    em.raw("    .ltorg");
    em.fns = None;
    Ok(())
}

/// The `__init_<unit>` sequence: evaluates each non-constant global
/// initializer and stores it. Frame-less (module-scope expressions cannot
/// allocate slots), with a 4-byte pad keeping `sp` 8-byte aligned.
fn emit_init_fn<'c, 'a>(
    em: &mut Emitter<'c, 'a>,
    init_symbol: &str,
    inits: &[(Symbol, Ty, ExprRef<'a>)],
) -> Result<()> {
    em.raw("");
    em.raw("    .align 1");
    em.raw(&format!("    .type {}, %function", init_symbol));
    em.raw("    .thumb_func");
    em.label(init_symbol);
    em.fns = Some(FnState {
        symbol: None,
        label_base: label_sanitize(init_symbol),
        next_label: 0,
        temp_depth: 0,
        loop_stack: Vec::new(),
        handler_depth: 0,
    });
    em.ins("push {r4, r5, r6, r7, lr}");
    em.ins("sub sp, sp, #4");
    for (name, ty, init) in inits {
        em.expr(*init)?;
        let label = em.interner.resolve(*name).to_string();
        em.ins_fmt(format!("ldr r2, ={}", label));
        em.store_typed(ty, "r2");
    }
    em.ins("add sp, sp, #4");
    em.ins("pop {r4, r5, r6, r7, pc}");
    em.raw("    .ltorg");
    em.fns = None;
    Ok(())
}

/// `true` when a global initializer emits as a `.data` image (integer
/// constant, float literal, or string literal) with no runtime code.
fn constant_global_init(init: ExprRef<'_>) -> bool {
    fold::const_int(init).is_some()
        || matches!(init.kind, ExprKind::Float(_) | ExprKind::Str(_))
}

/// A constant `.data` image for a global initializer, when one exists.
///
/// Returns the directive lines (without the label), or `None` when the
/// initializer needs runtime code.
fn global_image(
    checked: &CheckedModule<'_>,
    ty: &Ty,
    init: ExprRef<'_>,
) -> Option<Vec<String>> {
    if let Some(v) = fold::const_int(init) {
        return Some(match ty.size_of(&checked.registry) {
            1 => vec![format!("    .byte {}", v as i8)],
            2 => vec![format!("    .short {}", v as i16)],
            8 => vec![
                format!("    .word {}", v as u32 as i64),
                format!("    .word {}", (v >> 32) as u32 as i64),
            ],
            _ => vec![format!("    .word {}", v as i32)],
        });
    }
    // Float literals store their bit patterns.
    if let ExprKind::Float(v) = init.kind {
        return Some(match ty {
            Ty::Float { bits: 32 } => vec![format!("    .word {:#010x}", (v as f32).to_bits())],
            _ => {
                let bits = v.to_bits();
                vec![
                    format!("    .word {:#010x}", bits as u32),
                    format!("    .word {:#010x}", (bits >> 32) as u32),
                ]
            }
        });
    }
    None
}

fn emit_globals(em: &mut Emitter<'_, '_>) -> Result<()> {
    let checked = em.checked;
    let globals: Vec<(Symbol, Ty, Option<ExprRef<'_>>)> = checked
        .globals
        .iter()
        .map(|g| (g.name, g.ty.clone(), g.init))
        .collect();

    for (name, ty, init) in globals {
        let label = em.interner.resolve(name).to_string();
        let size = ty.size_of(&checked.registry).max(1);
        let align_exp = match ty.align_of(&checked.registry) {
            1 => 0,
            2 => 1,
            8 => 3,
            _ => 2,
        };

        // String-literal initializers hold the literal's address.
        if let Some(init) = init {
            if let ExprKind::Str(sym) = init.kind {
                let str_label = em.string_label(sym);
                em.data.push_str(&format!("    .global {}\n", label));
                em.data.push_str(&format!("    .align 2\n{}:\n", label));
                em.data.push_str(&format!("    .word {}\n", str_label));
                continue;
            }
            if let Some(image) = global_image(checked, &ty, init) {
                em.data.push_str(&format!("    .global {}\n", label));
                em.data
                    .push_str(&format!("    .align {}\n{}:\n", align_exp, label));
                for line in image {
                    em.data.push_str(&line);
                    em.data.push('\n');
                }
                continue;
            }
        }

        // Zero storage; runtime initializers run in __init_<unit>.
        em.bss.push_str(&format!("    .global {}\n", label));
        em.bss
            .push_str(&format!("    .align {}\n{}:\n", align_exp, label));
        em.bss.push_str(&format!("    .space {}\n", size));
    }
    Ok(())
}

/// Collects lambda expressions in source order, pairing each with its
/// emitted symbol.
fn collect_lambdas<'c, 'a>(checked: &'c CheckedModule<'a>) -> Vec<(ExprRef<'a>, Symbol)> {
    let mut out = Vec::new();
    for item in &checked.module.items {
        match item {
            Item::Function(def) => walk_block(&def.body, checked, &mut out),
            Item::Class(def) => {
                for method in &def.methods {
                    walk_block(&method.body, checked, &mut out);
                }
            }
            Item::Global { init: Some(e), .. } => walk_expr(*e, checked, &mut out),
            _ => {}
        }
    }
    out
}

fn walk_block<'c, 'a>(
    block: &'c [Stmt<'a>],
    checked: &'c CheckedModule<'a>,
    out: &mut Vec<(ExprRef<'a>, Symbol)>,
) {
    for stmt in block {
        walk_stmt(stmt, checked, out);
    }
}

fn walk_stmt<'c, 'a>(
    stmt: &'c Stmt<'a>,
    checked: &'c CheckedModule<'a>,
    out: &mut Vec<(ExprRef<'a>, Symbol)>,
) {
    match stmt {
        Stmt::Assign { target, value, .. } | Stmt::AugAssign { target, value, .. } => {
            walk_expr(*target, checked, out);
            walk_expr(*value, checked, out);
        }
        Stmt::If { arms, orelse, .. } => {
            for (cond, body) in arms {
                walk_expr(*cond, checked, out);
                walk_block(body, checked, out);
            }
            if let Some(orelse) = orelse {
                walk_block(orelse, checked, out);
            }
        }
        Stmt::While { cond, body, .. } => {
            walk_expr(*cond, checked, out);
            walk_block(body, checked, out);
        }
        Stmt::ForRange {
            start, stop, step, body, ..
        } => {
            for bound in [*start, Some(*stop), *step].into_iter().flatten() {
                walk_expr(bound, checked, out);
            }
            walk_block(body, checked, out);
        }
        Stmt::ForIter { iter, body, .. } => {
            walk_expr(*iter, checked, out);
            walk_block(body, checked, out);
        }
        Stmt::Return { value, .. } => {
            if let Some(value) = value {
                walk_expr(*value, checked, out);
            }
        }
        Stmt::Raise { exc, .. } => {
            if let Some(exc) = exc {
                walk_expr(*exc, checked, out);
            }
        }
        Stmt::Try {
            body,
            handlers,
            orelse,
            finally,
            ..
        } => {
            walk_block(body, checked, out);
            for handler in handlers {
                walk_block(&handler.body, checked, out);
            }
            if let Some(orelse) = orelse {
                walk_block(orelse, checked, out);
            }
            if let Some(finally) = finally {
                walk_block(finally, checked, out);
            }
        }
        Stmt::With { ctx, body, .. } => {
            walk_expr(*ctx, checked, out);
            walk_block(body, checked, out);
        }
        Stmt::Match {
            scrutinee, arms, ..
        } => {
            walk_expr(*scrutinee, checked, out);
            for arm in arms {
                walk_block(&arm.body, checked, out);
            }
        }
        Stmt::Assert { cond, message, .. } => {
            walk_expr(*cond, checked, out);
            if let Some(message) = message {
                walk_expr(*message, checked, out);
            }
        }
        Stmt::Expr(e) => walk_expr(*e, checked, out),
        Stmt::Decl { .. }
        | Stmt::Break(_)
        | Stmt::Continue(_)
        | Stmt::Pass(_)
        | Stmt::Global { .. }
        | Stmt::Asm { .. } => {}
    }
}

fn walk_expr<'a>(
    e: &'a Expr<'a>,
    checked: &CheckedModule<'a>,
    out: &mut Vec<(ExprRef<'a>, Symbol)>,
) {
    match &e.kind {
        ExprKind::Lambda { body, .. } => {
            if let Some(&symbol) = checked.lambda_symbols.get(&e.id) {
                out.push((e, symbol));
            }
            walk_expr(body, checked, out);
        }
        ExprKind::FString(parts) => {
            for part in *parts {
                if let FStringPart::Expr(x) = part {
                    walk_expr(x, checked, out);
                }
            }
        }
        ExprKind::Attr { base, .. } => walk_expr(base, checked, out),
        ExprKind::Index { base, index } => {
            walk_expr(base, checked, out);
            walk_expr(index, checked, out);
        }
        ExprKind::Slice {
            base, start, stop, step,
        } => {
            walk_expr(base, checked, out);
            for part in [*start, *stop, *step].into_iter().flatten() {
                walk_expr(part, checked, out);
            }
        }
        ExprKind::Call { callee, args, kwargs } => {
            walk_expr(callee, checked, out);
            for arg in *args {
                walk_expr(arg, checked, out);
            }
            for (_, arg) in *kwargs {
                walk_expr(arg, checked, out);
            }
        }
        ExprKind::Unary { operand, .. } => walk_expr(operand, checked, out),
        ExprKind::Binary { lhs, rhs, .. } => {
            walk_expr(lhs, checked, out);
            walk_expr(rhs, checked, out);
        }
        ExprKind::Ternary { cond, then, orelse } => {
            walk_expr(cond, checked, out);
            walk_expr(then, checked, out);
            walk_expr(orelse, checked, out);
        }
        ExprKind::AddressOf(x) | ExprKind::Deref(x) | ExprKind::Cast { value: x, .. } => {
            walk_expr(x, checked, out);
        }
        ExprKind::ListLit(elems) | ExprKind::TupleLit(elems) => {
            for elem in *elems {
                walk_expr(elem, checked, out);
            }
        }
        ExprKind::DictLit(pairs) => {
            for (k, v) in *pairs {
                walk_expr(k, checked, out);
                walk_expr(v, checked, out);
            }
        }
        ExprKind::StructLit { fields, .. } => {
            for (_, value) in *fields {
                walk_expr(value, checked, out);
            }
        }
        ExprKind::Comp {
            elem, iter, filter, ..
        } => {
            walk_expr(elem, checked, out);
            walk_expr(iter, checked, out);
            if let Some(filter) = filter {
                walk_expr(filter, checked, out);
            }
        }
        _ => {}
    }
}
