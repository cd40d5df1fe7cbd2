//! Expression lowering.
//!
//! Every expression leaves its value in `r0` (`r0:r1` for 64-bit pairs).
//! Binary operations follow the push/pop discipline: left operand pushed,
//! right operand evaluated, left popped into `r1`, operation emitted.
//! Aggregate-typed lvalues (structs, unions, arrays) evaluate to their
//! address — they are copied or indexed, never moved through registers.
//!
//! Call sites respect AAPCS: the first four argument words travel in
//! `r0..r3` (64-bit values in even/odd pairs), the rest in a caller-built
//! outgoing area with `arg[4]` at `[sp, #0]`, and `sp` is 8-byte aligned at
//! every `bl` (a 4-byte pad is inserted when the temporary depth is odd).

use pynux_base::Result;
use pynux_language::ast::{BinOp, ExprKind, ExprRef, FStringPart, UnaryOp};

use super::context::Emitter;
use super::types::{branch_cond, printer_for, shift_for_size};
use crate::analysis::{Binding, Intrinsic, Ty};
use crate::optimize::fold;

/// How one argument of a call is produced.
pub(crate) enum CallArg<'a> {
    /// Evaluate the expression's value.
    Value(ExprRef<'a>),
    /// Evaluate the expression's address (struct receivers).
    Addr(ExprRef<'a>),
    /// An integer constant.
    Const(i64),
    /// A word already pushed as a temporary; the value of `temp_depth`
    /// recorded immediately after its push.
    TempAt(u32),
}

pub(crate) enum CallTarget<'a> {
    Direct(String),
    Indirect(ExprRef<'a>),
}

impl<'c, 'a> Emitter<'c, 'a> {
    /// Emits `e`, leaving its value in `r0` (`r0:r1` when wide).
    pub(crate) fn expr(&mut self, e: ExprRef<'a>) -> Result<()> {
        let ty = self
            .checked
            .try_ty(e.id)
            .cloned()
            .ok_or_else(|| self.emit_err("expression reached the generator untyped", e.span))?;
        self.source_note(e.span);

        // Constant integer subtrees collapse to immediate loads.
        if ty.is_integer() || ty == Ty::Bool || ty == Ty::Char {
            if let Some(v) = fold::const_int(e) {
                if ty.is_wide() {
                    self.load_const_wide(v);
                } else {
                    self.load_const("r0", v);
                }
                return Ok(());
            }
        }

        match &e.kind {
            ExprKind::Int(v) => {
                if ty.is_wide() {
                    self.load_const_wide(*v);
                } else {
                    self.load_const("r0", *v);
                }
                Ok(())
            }
            ExprKind::Bool(b) => {
                self.load_const("r0", i64::from(*b));
                Ok(())
            }
            ExprKind::Float(v) => {
                match ty {
                    Ty::Float { bits: 32 } => {
                        let bits = (*v as f32).to_bits();
                        self.ins_fmt(format!("ldr r0, ={:#010x}", bits));
                    }
                    _ => {
                        let bits = v.to_bits();
                        self.ins_fmt(format!("ldr r0, ={:#010x}", bits as u32));
                        self.ins_fmt(format!("ldr r1, ={:#010x}", (bits >> 32) as u32));
                    }
                }
                Ok(())
            }
            ExprKind::NoneLit => {
                self.ins("movs r0, #0");
                Ok(())
            }
            ExprKind::Str(sym) => {
                let label = self.string_label(*sym);
                self.ins_fmt(format!("ldr r0, ={}", label));
                Ok(())
            }
            ExprKind::FString(_) => {
                Err(self.emit_err("f-string evaluated as a value", e.span))
            }
            ExprKind::Ident(_) => self.ident_value(e, &ty),
            ExprKind::Attr { base, .. } => self.attr_value(e, base, &ty),
            ExprKind::Index { base, index } => self.index_value(e, base, index, &ty),
            ExprKind::Slice {
                base, start, stop, step,
            } => {
                let mut args = vec![CallArg::Value(base)];
                args.push((*start).map_or(CallArg::Const(0), CallArg::Value));
                args.push((*stop).map_or(CallArg::Const(-1), CallArg::Value));
                args.push((*step).map_or(CallArg::Const(1), CallArg::Value));
                self.emit_call(CallTarget::Direct("__pynux_slice".to_string()), &args)
            }
            ExprKind::Call { callee, args, .. } => self.call_value(e, callee, args),
            ExprKind::Unary { op, operand } => self.unary_value(*op, operand, &ty),
            ExprKind::Binary { op, lhs, rhs } => self.binary_value(*op, lhs, rhs),
            ExprKind::Ternary { cond, then, orelse } => {
                let l_else = self.new_label();
                let l_end = self.new_label();
                self.expr(cond)?;
                self.ins("cmp r0, #0");
                self.ins_fmt(format!("beq {}", l_else));
                self.expr(then)?;
                self.ins_fmt(format!("b {}", l_end));
                self.label(&l_else.clone());
                self.expr(orelse)?;
                self.label(&l_end.clone());
                Ok(())
            }
            ExprKind::AddressOf(operand) => self.lvalue_addr(operand),
            ExprKind::Deref(operand) => {
                self.expr(operand)?;
                self.load_typed(&ty, "r0");
                Ok(())
            }
            ExprKind::Cast { value, .. } => {
                let from = self.checked.ty(value.id).clone();
                self.expr(value)?;
                self.cast_value(&from, &ty);
                Ok(())
            }
            ExprKind::Sizeof(_) => {
                // Checker validated the type; the value is its size.
                let size = self.sizeof_expr(e)?;
                self.load_const("r0", i64::from(size));
                Ok(())
            }
            ExprKind::Lambda { .. } => {
                let symbol = self.checked.lambda_symbols[&e.id];
                let name = self.interner.resolve(symbol).to_string();
                self.ins_fmt(format!("ldr r0, ={}", name));
                Ok(())
            }
            ExprKind::ListLit(elems) => self.list_lit(elems),
            ExprKind::DictLit(pairs) => self.dict_lit(pairs),
            ExprKind::TupleLit(elems) => self.tuple_lit(elems),
            ExprKind::StructLit { .. } => Err(self.emit_err(
                "struct literal outside a variable initialization",
                e.span,
            )),
            ExprKind::Comp {
                elem, var, iter, filter,
            } => self.comp_value(e, elem, *var, iter, *filter),
        }
    }

    /// Emits the address of a place expression into `r0`.
    pub(crate) fn lvalue_addr(&mut self, e: ExprRef<'a>) -> Result<()> {
        match &e.kind {
            ExprKind::Ident(_) => match self.checked.binding(e.id).cloned() {
                Some(Binding::Local { slot }) => {
                    let off = self.slot_offset(slot);
                    self.addr_of_sp("r0", off);
                    Ok(())
                }
                Some(Binding::Global { name }) => {
                    let name = self.interner.resolve(name).to_string();
                    self.ins_fmt(format!("ldr r0, ={}", name));
                    Ok(())
                }
                _ => Err(self.emit_err("cannot take the address of this name", e.span)),
            },
            ExprKind::Attr { base, .. } => {
                let Some(Binding::Field { offset }) = self.checked.binding(e.id).cloned() else {
                    return Err(self.emit_err("attribute store without a field binding", e.span));
                };
                self.aggregate_addr(base)?;
                self.add_to_r0(offset);
                Ok(())
            }
            ExprKind::Index { base, index } => self.element_addr(e, base, index),
            ExprKind::Deref(operand) => self.expr(operand),
            _ => Err(self.emit_err("expression is not addressable", e.span)),
        }
    }

    /// Address of a struct/union/array base: pointer values pass through,
    /// lvalues are addressed.
    pub(crate) fn aggregate_addr(&mut self, base: ExprRef<'a>) -> Result<()> {
        let base_ty = self.checked.ty(base.id).clone();
        match base_ty {
            Ty::Struct(_) | Ty::Union(_) | Ty::Array(_, _) => self.lvalue_addr(base),
            _ => self.expr(base),
        }
    }

    // ── Names and fields ────────────────────────────────────────────────

    fn ident_value(&mut self, e: ExprRef<'a>, ty: &Ty) -> Result<()> {
        match self.checked.binding(e.id).cloned() {
            Some(Binding::Local { slot }) => {
                match ty {
                    // Arrays decay; aggregates evaluate to their address.
                    Ty::Array(_, _) | Ty::Struct(_) | Ty::Union(_) => {
                        let off = self.slot_offset(slot);
                        self.addr_of_sp("r0", off);
                    }
                    _ => self.load_slot(slot),
                }
                Ok(())
            }
            Some(Binding::Global { name }) => {
                let name = self.interner.resolve(name).to_string();
                self.ins_fmt(format!("ldr r0, ={}", name));
                if !matches!(ty, Ty::Array(_, _) | Ty::Struct(_) | Ty::Union(_)) {
                    self.load_typed(ty, "r0");
                }
                Ok(())
            }
            Some(Binding::Func { name }) => {
                let name = self.interner.resolve(name).to_string();
                self.ins_fmt(format!("ldr r0, ={}", name));
                Ok(())
            }
            _ => Err(self.emit_err("name reached the generator unbound", e.span)),
        }
    }

    fn attr_value(&mut self, e: ExprRef<'a>, base: ExprRef<'a>, ty: &Ty) -> Result<()> {
        match self.checked.binding(e.id).cloned() {
            Some(Binding::Field { offset }) => {
                self.aggregate_addr(base)?;
                self.add_to_r0(offset);
                if !matches!(ty, Ty::Array(_, _) | Ty::Struct(_) | Ty::Union(_)) {
                    self.load_typed(ty, "r0");
                }
                Ok(())
            }
            Some(Binding::Method { symbol }) => {
                let name = self.interner.resolve(symbol).to_string();
                self.ins_fmt(format!("ldr r0, ={}", name));
                Ok(())
            }
            Some(Binding::Func { name }) => {
                let name = self.interner.resolve(name).to_string();
                self.ins_fmt(format!("ldr r0, ={}", name));
                Ok(())
            }
            _ => Err(self.emit_err("attribute reached the generator unbound", e.span)),
        }
    }

    fn index_value(
        &mut self,
        e: ExprRef<'a>,
        base: ExprRef<'a>,
        index: ExprRef<'a>,
        ty: &Ty,
    ) -> Result<()> {
        let base_ty = self.checked.ty(base.id).clone();
        match base_ty {
            Ty::Dict(k, _) => {
                let helper = if *k == Ty::Str {
                    "__pynux_dict_get_str"
                } else {
                    "__pynux_dict_get_int"
                };
                self.emit_call(
                    CallTarget::Direct(helper.to_string()),
                    &[CallArg::Value(base), CallArg::Value(index)],
                )
            }
            Ty::Tuple(_) => {
                let idx = fold::const_int(index)
                    .ok_or_else(|| self.emit_err("non-constant tuple index", index.span))?;
                self.expr(base)?;
                self.load_word_at("r0", idx as u32 * 4);
                Ok(())
            }
            _ => {
                self.element_addr(e, base, index)?;
                if !matches!(ty, Ty::Array(_, _) | Ty::Struct(_) | Ty::Union(_)) {
                    self.load_typed(ty, "r0");
                }
                Ok(())
            }
        }
    }

    /// Address of `base[index]` for pointers, arrays, strings, and lists.
    pub(crate) fn element_addr(
        &mut self,
        e: ExprRef<'a>,
        base: ExprRef<'a>,
        index: ExprRef<'a>,
    ) -> Result<()> {
        let elem_ty = self.checked.ty(e.id).clone();
        let elem_size = elem_ty.size_of(&self.checked.registry).max(1);
        let base_ty = self.checked.ty(base.id).clone();
        let skip = if matches!(base_ty, Ty::List(_)) { 4u32 } else { 0 };

        if let Some(idx) = fold::const_int(index) {
            self.aggregate_or_pointer_addr(base, &base_ty)?;
            self.add_to_r0(skip + idx as u32 * elem_size);
            return Ok(());
        }

        self.aggregate_or_pointer_addr(base, &base_ty)?;
        self.push_r0();
        self.expr(index)?;
        match shift_for_size(elem_size) {
            Some(0) => {}
            Some(k) => self.ins_fmt(format!("lsls r0, r0, #{}", k)),
            None => {
                self.ins_fmt(format!("ldr r2, ={}", elem_size));
                self.ins("muls r0, r2, r0");
            }
        }
        self.pop_into("r1");
        self.ins("adds r0, r1, r0");
        self.add_to_r0(skip);
        Ok(())
    }

    fn aggregate_or_pointer_addr(&mut self, base: ExprRef<'a>, base_ty: &Ty) -> Result<()> {
        match base_ty {
            Ty::Array(_, _) | Ty::Struct(_) | Ty::Union(_) => self.lvalue_addr(base),
            _ => self.expr(base),
        }
    }

    fn add_to_r0(&mut self, off: u32) {
        if off == 0 {
        } else if off <= 255 {
            self.ins_fmt(format!("adds r0, #{}", off));
        } else {
            self.ins_fmt(format!("ldr r3, ={}", off));
            self.ins("adds r0, r0, r3");
        }
    }

    /// `ldr reg, [reg, #off]` with a register-offset fallback.
    fn load_word_at(&mut self, reg: &str, off: u32) {
        if off <= 124 {
            self.ins_fmt(format!("ldr {}, [{}, #{}]", reg, reg, off));
        } else {
            self.ins_fmt(format!("ldr r3, ={}", off));
            self.ins_fmt(format!("ldr {}, [{}, r3]", reg, reg));
        }
    }

    // ── Unary and binary operations ─────────────────────────────────────

    fn unary_value(&mut self, op: UnaryOp, operand: ExprRef<'a>, ty: &Ty) -> Result<()> {
        self.expr(operand)?;
        match op {
            UnaryOp::Neg => {
                if ty.is_wide() {
                    self.ins("movs r2, #0");
                    self.ins("movs r3, #0");
                    self.ins("subs r2, r2, r0");
                    self.ins("sbcs r3, r1");
                    self.ins("mov r0, r2");
                    self.ins("mov r1, r3");
                } else {
                    self.ins("rsbs r0, r0, #0");
                }
            }
            UnaryOp::BitNot => {
                self.ins("mvns r0, r0");
                if ty.is_wide() {
                    self.ins("mvns r1, r1");
                }
            }
            UnaryOp::Not => self.bool_invert(),
        }
        Ok(())
    }

    /// `r0 = (r0 == 0)`, normalized to 0/1.
    fn bool_invert(&mut self) {
        let l_one = self.new_label();
        let l_end = self.new_label();
        self.ins("cmp r0, #0");
        self.ins_fmt(format!("beq {}", l_one));
        self.ins("movs r0, #0");
        self.ins_fmt(format!("b {}", l_end));
        self.label(&l_one);
        self.ins("movs r0, #1");
        self.label(&l_end);
    }

    fn binary_value(&mut self, op: BinOp, lhs: ExprRef<'a>, rhs: ExprRef<'a>) -> Result<()> {
        let lhs_ty = self.checked.ty(lhs.id).clone();
        let rhs_ty = self.checked.ty(rhs.id).clone();

        if matches!(op, BinOp::And | BinOp::Or) {
            return self.short_circuit(op, lhs, rhs);
        }
        if matches!(op, BinOp::In | BinOp::NotIn) {
            self.binary_operands(lhs, rhs)?;
            // needle was pushed first: r1 = needle, r0 = haystack.
            self.ins("mov r2, r0");
            self.ins("mov r0, r1");
            self.ins("mov r1, r2");
            self.call_helper("__pynux_in");
            if op == BinOp::NotIn {
                self.ins("movs r1, #1");
                self.ins("eors r0, r1");
            }
            return Ok(());
        }
        if lhs_ty == Ty::Str && rhs_ty == Ty::Str && matches!(op, BinOp::Eq | BinOp::Ne) {
            self.binary_operands(lhs, rhs)?;
            self.ins("mov r2, r0");
            self.ins("mov r0, r1");
            self.ins("mov r1, r2");
            self.call_helper("__pynux_strcmp");
            self.ins("cmp r0, #0");
            let cc = branch_cond(op, true);
            self.bool_from_cond(cc);
            return Ok(());
        }
        if lhs_ty.is_wide() {
            return self.wide_binary(op, lhs, rhs, lhs_ty.is_signed());
        }
        if op.is_comparison() {
            let signed = lhs_ty.is_signed();
            self.binary_operands(lhs, rhs)?;
            self.ins("cmp r1, r0");
            let cc = branch_cond(op, signed);
            self.bool_from_cond(cc);
            return Ok(());
        }

        // Pointer arithmetic scales by the pointee size.
        let lhs_scale = self.pointee_size(&lhs_ty);
        let rhs_scale = self.pointee_size(&rhs_ty);
        match op {
            BinOp::Add | BinOp::Sub => {
                if let (Some(size), true) = (lhs_scale, rhs_ty.is_integer()) {
                    self.binary_operands(lhs, rhs)?;
                    self.scale_reg("r0", size);
                    if op == BinOp::Add {
                        self.ins("adds r0, r1, r0");
                    } else {
                        self.ins("subs r0, r1, r0");
                    }
                    return Ok(());
                }
                if let (BinOp::Add, true, Some(size)) = (op, lhs_ty.is_integer(), rhs_scale) {
                    self.binary_operands(lhs, rhs)?;
                    self.scale_reg("r1", size);
                    self.ins("adds r0, r1, r0");
                    return Ok(());
                }
                if op == BinOp::Sub {
                    if let (Some(size), Some(_)) = (lhs_scale, rhs_scale) {
                        self.binary_operands(lhs, rhs)?;
                        self.ins("subs r0, r1, r0");
                        match shift_for_size(size) {
                            Some(0) => {}
                            Some(k) => self.ins_fmt(format!("asrs r0, r0, #{}", k)),
                            None => {
                                self.ins_fmt(format!("ldr r1, ={}", size));
                                self.call_helper("__aeabi_idiv");
                            }
                        }
                        return Ok(());
                    }
                }
            }
            _ => {}
        }

        let signed = lhs_ty.is_signed();
        self.binary_operands(lhs, rhs)?;
        match op {
            BinOp::Add => self.ins("adds r0, r1, r0"),
            BinOp::Sub => self.ins("subs r0, r1, r0"),
            BinOp::Mul => self.ins("muls r0, r1, r0"),
            BinOp::Div | BinOp::FloorDiv => {
                self.swap_args_for_helper();
                if signed {
                    self.call_helper("__aeabi_idiv");
                } else {
                    self.call_helper("__aeabi_uidivmod");
                }
            }
            BinOp::Mod => {
                self.swap_args_for_helper();
                if signed {
                    self.call_helper("__aeabi_idivmod");
                } else {
                    self.call_helper("__aeabi_uidivmod");
                }
                self.ins("mov r0, r1");
            }
            BinOp::Pow => {
                self.swap_args_for_helper();
                self.call_helper("__pynux_pow");
            }
            BinOp::Shl => {
                self.ins("lsls r1, r0");
                self.ins("mov r0, r1");
            }
            BinOp::Shr => {
                if signed {
                    self.ins("asrs r1, r0");
                } else {
                    self.ins("lsrs r1, r0");
                }
                self.ins("mov r0, r1");
            }
            BinOp::BitAnd => self.ins("ands r0, r1"),
            BinOp::BitOr => self.ins("orrs r0, r1"),
            BinOp::BitXor => self.ins("eors r0, r1"),
            _ => return Err(self.emit_err("operator fell through lowering", lhs.span)),
        }
        Ok(())
    }

    /// Element size for pointer arithmetic, when `ty` is pointer-like.
    fn pointee_size(&self, ty: &Ty) -> Option<u32> {
        match ty {
            Ty::Ptr(inner) => Some(inner.size_of(&self.checked.registry).max(1)),
            Ty::Str => Some(1),
            _ => None,
        }
    }

    /// lhs → pushed, rhs → `r0`, then lhs popped into `r1`.
    fn binary_operands(&mut self, lhs: ExprRef<'a>, rhs: ExprRef<'a>) -> Result<()> {
        self.expr(lhs)?;
        self.push_r0();
        self.expr(rhs)?;
        self.pop_into("r1");
        Ok(())
    }

    /// Moves `(r1, r0)` into the AAPCS argument order `(r0, r1)`.
    fn swap_args_for_helper(&mut self) {
        self.ins("mov r2, r0");
        self.ins("mov r0, r1");
        self.ins("mov r1, r2");
    }

    fn scale_reg(&mut self, reg: &str, size: u32) {
        match shift_for_size(size) {
            Some(0) => {}
            Some(k) => self.ins_fmt(format!("lsls {}, {}, #{}", reg, reg, k)),
            None => {
                self.ins_fmt(format!("ldr r2, ={}", size));
                self.ins_fmt(format!("muls {}, r2, {}", reg, reg));
            }
        }
    }

    fn bool_from_cond(&mut self, cc: &str) {
        let l_true = self.new_label();
        let l_end = self.new_label();
        self.ins_fmt(format!("b{} {}", cc, l_true));
        self.ins("movs r0, #0");
        self.ins_fmt(format!("b {}", l_end));
        self.label(&l_true);
        self.ins("movs r0, #1");
        self.label(&l_end);
    }

    fn short_circuit(&mut self, op: BinOp, lhs: ExprRef<'a>, rhs: ExprRef<'a>) -> Result<()> {
        let l_out = self.new_label();
        let l_end = self.new_label();
        self.expr(lhs)?;
        self.ins("cmp r0, #0");
        match op {
            BinOp::And => self.ins_fmt(format!("beq {}", l_out)),
            _ => self.ins_fmt(format!("bne {}", l_out)),
        }
        self.expr(rhs)?;
        self.ins("cmp r0, #0");
        match op {
            BinOp::And => self.ins_fmt(format!("beq {}", l_out)),
            _ => self.ins_fmt(format!("bne {}", l_out)),
        }
        // Fell through: And → all true, Or → all false.
        let fallthrough = if op == BinOp::And { 1 } else { 0 };
        self.ins_fmt(format!("movs r0, #{}", fallthrough));
        self.ins_fmt(format!("b {}", l_end));
        self.label(&l_out);
        self.ins_fmt(format!("movs r0, #{}", 1 - fallthrough));
        self.label(&l_end);
        Ok(())
    }

    /// 64-bit operations on `r0:r1` pairs; lhs arrives in `r2:r3`.
    fn wide_binary(&mut self, op: BinOp, lhs: ExprRef<'a>, rhs: ExprRef<'a>, signed: bool) -> Result<()> {
        self.expr(lhs)?;
        self.push_pair();
        self.expr(rhs)?;
        self.pop_pair_into("r2", "r3");
        match op {
            BinOp::Add => {
                self.ins("adds r0, r2, r0");
                self.ins("adcs r1, r3");
            }
            BinOp::Sub => {
                self.ins("subs r2, r2, r0");
                self.ins("sbcs r3, r1");
                self.ins("mov r0, r2");
                self.ins("mov r1, r3");
            }
            BinOp::BitAnd => {
                self.ins("ands r0, r2");
                self.ins("ands r1, r3");
            }
            BinOp::BitOr => {
                self.ins("orrs r0, r2");
                self.ins("orrs r1, r3");
            }
            BinOp::BitXor => {
                self.ins("eors r0, r2");
                self.ins("eors r1, r3");
            }
            BinOp::Eq | BinOp::Ne => {
                self.ins("eors r0, r2");
                self.ins("eors r1, r3");
                self.ins("orrs r0, r1");
                self.ins("cmp r0, #0");
                self.bool_from_cond(branch_cond(op, true));
            }
            BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge => {
                let strict = match op {
                    BinOp::Lt | BinOp::Le => BinOp::Lt,
                    _ => BinOp::Gt,
                };
                let l_true = self.new_label();
                let l_false = self.new_label();
                let l_end = self.new_label();
                self.ins("cmp r3, r1");
                self.ins_fmt(format!("b{} {}", branch_cond(strict, signed), l_true));
                self.ins_fmt(format!("bne {}", l_false));
                self.ins("cmp r2, r0");
                self.ins_fmt(format!("b{} {}", branch_cond(op, false), l_true));
                self.label(&l_false);
                self.ins("movs r0, #0");
                self.ins_fmt(format!("b {}", l_end));
                self.label(&l_true);
                self.ins("movs r0, #1");
                self.label(&l_end);
            }
            _ => {
                return Err(self.emit_err("64-bit operator fell through checking", lhs.span));
            }
        }
        Ok(())
    }

    // ── Casts ───────────────────────────────────────────────────────────

    fn cast_value(&mut self, from: &Ty, to: &Ty) {
        match (from.is_wide(), to.is_wide()) {
            (true, false) => {} // take the low word already in r0
            (false, true) => {
                if from.is_signed() {
                    self.ins("asrs r1, r0, #31");
                } else {
                    self.ins("movs r1, #0");
                }
            }
            _ => {}
        }
        match to {
            Ty::Int { bits: 8, signed: true } => self.ins("sxtb r0, r0"),
            Ty::Int { bits: 8, signed: false } | Ty::Char => self.ins("uxtb r0, r0"),
            Ty::Int { bits: 16, signed: true } => self.ins("sxth r0, r0"),
            Ty::Int { bits: 16, signed: false } => self.ins("uxth r0, r0"),
            Ty::Bool => self.bool_normalize(),
            _ => {}
        }
    }

    /// `r0 = (r0 != 0)`.
    fn bool_normalize(&mut self) {
        let l_zero = self.new_label();
        let l_end = self.new_label();
        self.ins("cmp r0, #0");
        self.ins_fmt(format!("beq {}", l_zero));
        self.ins("movs r0, #1");
        self.ins_fmt(format!("b {}", l_end));
        self.label(&l_zero);
        self.ins("movs r0, #0");
        self.label(&l_end);
    }

    fn sizeof_expr(&mut self, e: ExprRef<'a>) -> Result<u32> {
        // Re-resolve the surface type against the registry through the
        // checker's recorded result: sizeof's own type is int32, so the
        // operand type is recovered from the AST node.
        let ExprKind::Sizeof(te) = &e.kind else {
            return Err(self.emit_err("sizeof guard", e.span));
        };
        self.surface_type_size(te, e)
    }

    // ── Aggregate literals ──────────────────────────────────────────────

    fn list_lit(&mut self, elems: &'a [ExprRef<'a>]) -> Result<()> {
        let n = elems.len() as u32;
        self.load_const("r0", i64::from(4 + n * 4));
        self.call_helper("malloc");
        self.push_r0();
        let marker = self.temp_depth();
        for (i, elem) in elems.iter().enumerate() {
            self.expr(elem)?;
            let back = (self.temp_depth() - marker) * 4;
            self.load_sp_word("r1", back);
            self.store_word_at("r1", 4 + i as u32 * 4);
        }
        self.pop_into("r0");
        self.load_const("r1", i64::from(n));
        self.ins("str r1, [r0]");
        Ok(())
    }

    fn tuple_lit(&mut self, elems: &'a [ExprRef<'a>]) -> Result<()> {
        let n = elems.len() as u32;
        self.load_const("r0", i64::from(n.max(1) * 4));
        self.call_helper("malloc");
        self.push_r0();
        let marker = self.temp_depth();
        for (i, elem) in elems.iter().enumerate() {
            self.expr(elem)?;
            let back = (self.temp_depth() - marker) * 4;
            self.load_sp_word("r1", back);
            self.store_word_at("r1", i as u32 * 4);
        }
        self.pop_into("r0");
        Ok(())
    }

    /// `str r0, [r1, #off]` with a scratch fallback for large offsets.
    fn store_word_at(&mut self, base: &str, off: u32) {
        if off <= 124 {
            self.ins_fmt(format!("str r0, [{}, #{}]", base, off));
        } else {
            self.ins_fmt(format!("ldr r3, ={}", off));
            self.ins_fmt(format!("str r0, [{}, r3]", base));
        }
    }

    /// Constant dict literals become a `[count, k, v, …]` image in `.data`.
    fn dict_lit(&mut self, pairs: &'a [(ExprRef<'a>, ExprRef<'a>)]) -> Result<()> {
        let label = self.const_label();
        let mut image = format!("{}:\n    .word {}\n", label, pairs.len());
        for (k, v) in pairs {
            let key_text = if let ExprKind::Str(sym) = k.kind {
                self.string_label(sym)
            } else {
                let kv = fold::const_int(k)
                    .ok_or_else(|| self.emit_err("non-constant dict key", k.span))?;
                format!("{}", kv as i32)
            };
            let vv = fold::const_int(v)
                .ok_or_else(|| self.emit_err("non-constant dict value", v.span))?;
            image.push_str(&format!("    .word {}, {}\n", key_text, vv as i32));
        }
        self.data.push_str(&image);
        self.ins_fmt(format!("ldr r0, ={}", label));
        Ok(())
    }

    // ── Comprehensions ──────────────────────────────────────────────────

    /// `[elem for var in range(...) if filter]` — a malloc'd list filled by
    /// an inline loop; the step is a positive constant (checked).
    fn comp_value(
        &mut self,
        e: ExprRef<'a>,
        elem: ExprRef<'a>,
        _var: pynux_base::Symbol,
        iter: ExprRef<'a>,
        filter: Option<ExprRef<'a>>,
    ) -> Result<()> {
        let info = self.checked.comps[&e.id];
        let ExprKind::Call { args, .. } = &iter.kind else {
            return Err(self.emit_err("comprehension iterator guard", iter.span));
        };
        let (start, stop) = match args.len() {
            1 => (None, args[0]),
            _ => (Some(args[0]), args[1]),
        };
        let step = args.get(2).and_then(|s| fold::const_int(s)).unwrap_or(1);

        // stop and start are evaluated once and kept as stack temporaries.
        self.expr(stop)?;
        self.push_r0();
        let stop_mark = self.temp_depth();
        match start {
            Some(s) => self.expr(s)?,
            None => self.ins("movs r0, #0"),
        }
        self.push_r0();
        let start_mark = self.temp_depth();

        // Capacity: (stop - start + step - 1) / step, clamped at zero.
        self.load_sp_word("r0", (self.temp_depth() - stop_mark) * 4);
        self.load_sp_word("r1", (self.temp_depth() - start_mark) * 4);
        self.ins("subs r0, r0, r1");
        if step != 1 {
            self.load_const("r1", step - 1);
            self.ins("adds r0, r0, r1");
            self.load_const("r1", step);
            self.call_helper("__aeabi_idiv");
        }
        let l_cap_ok = self.new_label();
        self.ins("cmp r0, #0");
        self.ins_fmt(format!("bge {}", l_cap_ok));
        self.ins("movs r0, #0");
        self.label(&l_cap_ok);

        // List storage: [count, cap words...].
        self.ins("lsls r0, r0, #2");
        self.ins("adds r0, #4");
        self.call_helper("malloc");
        self.store_slot(info.ptr_slot);
        self.ins("movs r0, #0");
        self.store_slot(info.idx_slot);

        // var = start
        self.load_sp_word("r0", (self.temp_depth() - start_mark) * 4);
        self.store_slot(info.var_slot);

        let l_cond = self.new_label();
        let l_next = self.new_label();
        let l_end = self.new_label();
        self.label(&l_cond);
        self.load_slot(info.var_slot);
        self.load_sp_word("r1", (self.temp_depth() - stop_mark) * 4);
        self.ins("cmp r0, r1");
        self.ins_fmt(format!("bge {}", l_end));
        if let Some(filter) = filter {
            self.expr(filter)?;
            self.ins("cmp r0, #0");
            self.ins_fmt(format!("beq {}", l_next));
        }
        self.expr(elem)?;
        // list[4 + idx*4] = r0; idx += 1
        self.ins("mov r2, r0");
        self.load_slot(info.ptr_slot);
        self.ins("mov r1, r0");
        self.load_slot(info.idx_slot);
        self.ins("lsls r3, r0, #2");
        self.ins("adds r1, r1, r3");
        self.ins("str r2, [r1, #4]");
        self.ins("adds r0, #1");
        self.store_slot(info.idx_slot);
        self.label(&l_next);
        self.load_slot(info.var_slot);
        self.load_const("r1", step);
        self.ins("adds r0, r0, r1");
        self.store_slot(info.var_slot);
        self.ins_fmt(format!("b {}", l_cond));
        self.label(&l_end);

        // Store the final count and produce the list pointer.
        self.load_slot(info.idx_slot);
        self.ins("mov r2, r0");
        self.load_slot(info.ptr_slot);
        self.ins("str r2, [r0]");
        self.drop_temps(2);
        Ok(())
    }

    // ── Calls ───────────────────────────────────────────────────────────

    fn call_value(
        &mut self,
        e: ExprRef<'a>,
        callee: ExprRef<'a>,
        args: &'a [ExprRef<'a>],
    ) -> Result<()> {
        match self.checked.binding(callee.id).cloned() {
            Some(Binding::Func { name }) => {
                let symbol = self.interner.resolve(name).to_string();
                let call_args: Vec<CallArg<'a>> = args.iter().map(|&a| CallArg::Value(a)).collect();
                self.emit_call(CallTarget::Direct(symbol), &call_args)
            }
            Some(Binding::Ctor { class }) => self.ctor_call(class, args, e),
            Some(Binding::Intrinsic(intrinsic)) => self.intrinsic_call(intrinsic, args, e),
            Some(Binding::Method { symbol }) => {
                let ExprKind::Attr { base, .. } = &callee.kind else {
                    return Err(self.emit_err("method call without a receiver", e.span));
                };
                let base_ty = self.checked.ty(base.id).clone();
                let receiver = if matches!(base_ty, Ty::Struct(_) | Ty::Union(_)) {
                    CallArg::Addr(base)
                } else {
                    CallArg::Value(base)
                };
                let mut call_args = vec![receiver];
                call_args.extend(args.iter().map(|&a| CallArg::Value(a)));
                let symbol = self.interner.resolve(symbol).to_string();
                self.emit_call(CallTarget::Direct(symbol), &call_args)
            }
            Some(Binding::StrMethod(method)) => {
                let ExprKind::Attr { base, .. } = &callee.kind else {
                    return Err(self.emit_err("string method without a receiver", e.span));
                };
                let mut call_args = vec![CallArg::Value(base)];
                call_args.extend(args.iter().map(|&a| CallArg::Value(a)));
                self.emit_call(CallTarget::Direct(method.helper().to_string()), &call_args)
            }
            _ => {
                let call_args: Vec<CallArg<'a>> = args.iter().map(|&a| CallArg::Value(a)).collect();
                self.emit_call(CallTarget::Indirect(callee), &call_args)
            }
        }
    }

    fn ctor_call(
        &mut self,
        class: pynux_base::Symbol,
        args: &'a [ExprRef<'a>],
        e: ExprRef<'a>,
    ) -> Result<()> {
        let size = self
            .checked
            .registry
            .layout(class)
            .ok_or_else(|| self.emit_err("constructor for an unregistered class", e.span))?
            .size;
        self.load_const("r0", i64::from(size));
        self.call_helper("malloc");
        self.push_r0();
        let marker = self.temp_depth();

        let init_sym = self
            .interner
            .lookup("__init__")
            .and_then(|init| self.checked.method_symbols.get(&(class, init)).copied());
        if let Some(init_sym) = init_sym {
            let mut call_args = vec![CallArg::TempAt(marker)];
            call_args.extend(args.iter().map(|&a| CallArg::Value(a)));
            let symbol = self.interner.resolve(init_sym).to_string();
            self.emit_call(CallTarget::Direct(symbol), &call_args)?;
        }
        self.pop_into("r0");
        Ok(())
    }

    /// Lowers a call site against AAPCS.
    pub(crate) fn emit_call(
        &mut self,
        target: CallTarget<'a>,
        args: &[CallArg<'a>],
    ) -> Result<()> {
        // Register word assignment (with 64-bit pair alignment).
        let mut assignments: Vec<(usize, u32, bool)> = Vec::new(); // (arg, first reg/slot word, wide)
        let mut word = 0u32;
        for (i, arg) in args.iter().enumerate() {
            let wide = match arg {
                CallArg::Value(e) => self.checked.ty(e.id).is_wide(),
                _ => false,
            };
            if wide && word % 2 == 1 {
                word += 1;
            }
            assignments.push((i, word, wide));
            word += if wide { 2 } else { 1 };
        }

        if word <= 4 {
            self.emit_call_registers(target, args, &assignments)
        } else {
            self.emit_call_with_stack_args(target, args, word)
        }
    }

    fn emit_call_registers(
        &mut self,
        target: CallTarget<'a>,
        args: &[CallArg<'a>],
        assignments: &[(usize, u32, bool)],
    ) -> Result<()> {
        let pad = self.temp_depth() % 2 == 1;
        if pad {
            self.ins("sub sp, sp, #4");
            self.state().temp_depth += 1;
        }

        let indirect = matches!(target, CallTarget::Indirect(_));
        if let CallTarget::Indirect(callee) = &target {
            self.expr(*callee)?;
            self.push_r0();
        }

        for &(i, _, wide) in assignments {
            self.emit_call_arg(&args[i])?;
            if wide {
                self.push_pair();
            } else {
                self.push_r0();
            }
        }

        // Pop in reverse so the last-pushed argument lands first.
        for &(_, reg, wide) in assignments.iter().rev() {
            if wide {
                self.pop_pair_into(&format!("r{}", reg), &format!("r{}", reg + 1));
            } else {
                self.pop_into(&format!("r{}", reg));
            }
        }
        if indirect {
            self.pop_into("r4");
        }

        match &target {
            CallTarget::Direct(symbol) => self.ins_fmt(format!("bl {}", symbol)),
            CallTarget::Indirect(_) => self.ins("blx r4"),
        }

        if pad {
            self.ins("add sp, sp, #4");
            self.state().temp_depth -= 1;
        }
        Ok(())
    }

    /// Beyond four words: caller-built outgoing area, `arg[4]` at `[sp, #0]`.
    fn emit_call_with_stack_args(
        &mut self,
        target: CallTarget<'a>,
        args: &[CallArg<'a>],
        total_words: u32,
    ) -> Result<()> {
        let CallTarget::Direct(symbol) = target else {
            return Err(pynux_base::Diagnostic::emit(
                "indirect call overflowed the argument registers",
                pynux_base::Span::default(),
            ));
        };
        let n = args.len() as u32;
        if total_words != n {
            // A wide argument slipped past checking into the stack area.
            return Err(pynux_base::Diagnostic::emit(
                "64-bit arguments do not fit the outgoing stack area",
                pynux_base::Span::default(),
            ));
        }
        let stack_n = n - 4;
        let entry = self.temp_depth();
        let pad = (entry + n + stack_n) % 2;
        let outgoing = stack_n + pad;

        for arg in args {
            self.emit_call_arg(arg)?;
            self.push_r0();
        }
        self.adjust_sp_down(outgoing * 4);
        self.state().temp_depth += outgoing;

        // Copy stack-bound arguments into position, left to right.
        for i in 4..n {
            self.load_sp_word("r0", (outgoing + (n - 1 - i)) * 4);
            self.store_sp_word("r0", (i - 4) * 4);
        }
        for i in (0..4).rev() {
            self.load_sp_word(&format!("r{}", i), (outgoing + (n - 1 - i)) * 4);
        }
        self.ins_fmt(format!("bl {}", symbol));
        self.adjust_sp_up((outgoing + n) * 4);
        self.state().temp_depth -= outgoing + n;
        Ok(())
    }

    fn emit_call_arg(&mut self, arg: &CallArg<'a>) -> Result<()> {
        match arg {
            CallArg::Value(e) => self.expr(*e),
            CallArg::Addr(e) => self.lvalue_addr(*e),
            CallArg::Const(v) => {
                self.load_const("r0", *v);
                Ok(())
            }
            CallArg::TempAt(marker) => {
                let back = (self.temp_depth() - marker) * 4;
                self.load_sp_word("r0", back);
                Ok(())
            }
        }
    }

    // ── Intrinsics ──────────────────────────────────────────────────────

    fn intrinsic_call(
        &mut self,
        intrinsic: Intrinsic,
        args: &'a [ExprRef<'a>],
        e: ExprRef<'a>,
    ) -> Result<()> {
        use Intrinsic::*;
        match intrinsic {
            Dmb => self.ins("dmb"),
            Dsb => self.ins("dsb"),
            Isb => self.ins("isb"),
            Wfi => self.ins("wfi"),
            Wfe => self.ins("wfe"),
            Sev => self.ins("sev"),
            Clrex => self.ins("clrex"),
            CriticalEnter => {
                self.ins("mrs r0, primask");
                self.ins("cpsid i");
            }
            CriticalExit => {
                self.expr(args[0])?;
                self.ins("msr primask, r0");
            }
            Input => {
                self.load_const("r0", 128);
                self.call_helper("malloc");
                self.push_r0();
                let marker = self.temp_depth();
                self.load_sp_word("r0", (self.temp_depth() - marker) * 4);
                self.call_helper("__pynux_read_line");
                self.pop_into("r1");
            }
            Print => {
                self.print_call(args)?;
            }
            Len => self.len_call(args[0])?,
            Ord => {
                let ty = self.checked.ty(args[0].id).clone();
                self.expr(args[0])?;
                if !matches!(ty, Ty::Char) {
                    self.ins("ldrb r0, [r0]");
                }
            }
            Chr => {
                self.expr(args[0])?;
                self.ins("uxtb r0, r0");
            }
            Abs => {
                self.expr(args[0])?;
                let l_pos = self.new_label();
                self.ins("cmp r0, #0");
                self.ins_fmt(format!("bge {}", l_pos));
                self.ins("rsbs r0, r0, #0");
                self.label(&l_pos);
            }
            Min | Max => {
                let signed = self.checked.ty(e.id).is_signed();
                self.binary_operands(args[0], args[1])?;
                let l_keep = self.new_label();
                self.ins("cmp r1, r0");
                let cc = match (intrinsic, signed) {
                    (Min, true) => "ge",
                    (Min, false) => "hs",
                    (_, true) => "le",
                    (_, false) => "ls",
                };
                self.ins_fmt(format!("b{} {}", cc, l_keep));
                self.ins("mov r0, r1");
                self.label(&l_keep);
            }
            Clz => {
                self.expr(args[0])?;
                self.ins("clz r0, r0");
            }
            Rbit => {
                self.expr(args[0])?;
                self.ins("rbit r0, r0");
            }
            Rev => {
                self.expr(args[0])?;
                self.ins("rev r0, r0");
            }
            Rev16 => {
                self.expr(args[0])?;
                self.ins("rev16 r0, r0");
            }
            AtomicLoad => {
                self.expr(args[0])?;
                self.ins("dmb");
                self.ins("ldr r0, [r0]");
                self.ins("dmb");
            }
            AtomicStore => {
                self.binary_operands(args[0], args[1])?;
                // ptr in r1, value in r0.
                self.ins("dmb");
                self.ins("str r0, [r1]");
                self.ins("dmb");
            }
            AtomicAdd | AtomicSub | AtomicAnd | AtomicOr | AtomicXor | AtomicSwap => {
                self.binary_operands(args[0], args[1])?;
                let l_retry = self.new_label();
                self.label(&l_retry);
                self.ins("ldrex r2, [r1]");
                match intrinsic {
                    AtomicAdd => self.ins("adds r3, r2, r0"),
                    AtomicSub => self.ins("subs r3, r2, r0"),
                    AtomicAnd => {
                        self.ins("mov r3, r2");
                        self.ins("ands r3, r0");
                    }
                    AtomicOr => {
                        self.ins("mov r3, r2");
                        self.ins("orrs r3, r0");
                    }
                    AtomicXor => {
                        self.ins("mov r3, r2");
                        self.ins("eors r3, r0");
                    }
                    _ => self.ins("mov r3, r0"), // swap
                }
                self.ins("strex r12, r3, [r1]");
                self.ins("cmp r12, #0");
                self.ins_fmt(format!("bne {}", l_retry));
                self.ins("mov r0, r2");
            }
            BitSet | BitClear | BitToggle => {
                self.binary_operands(args[0], args[1])?;
                // value in r1, bit position in r0.
                self.ins("movs r2, #1");
                self.ins("lsls r2, r0");
                match intrinsic {
                    BitSet => self.ins("orrs r1, r2"),
                    BitClear => self.ins("bics r1, r2"),
                    _ => self.ins("eors r1, r2"),
                }
                self.ins("mov r0, r1");
            }
            BitCheck => {
                self.binary_operands(args[0], args[1])?;
                self.ins("lsrs r1, r0");
                self.ins("movs r0, #1");
                self.ins("ands r0, r1");
            }
            BitsGet => {
                let pos = fold::const_int(args[1]).unwrap_or(0);
                let len = fold::const_int(args[2]).unwrap_or(1);
                self.expr(args[0])?;
                self.ins_fmt(format!("ubfx r0, r0, #{}, #{}", pos, len));
            }
            BitsSet => {
                let pos = fold::const_int(args[1]).unwrap_or(0);
                let len = fold::const_int(args[2]).unwrap_or(1);
                self.expr(args[0])?;
                self.push_r0();
                self.expr(args[3])?;
                self.pop_into("r1");
                self.ins_fmt(format!("bfi r1, r0, #{}, #{}", pos, len));
                self.ins("mov r0, r1");
            }
        }
        Ok(())
    }

    fn len_call(&mut self, arg: ExprRef<'a>) -> Result<()> {
        let ty = self.checked.ty(arg.id).clone();
        match ty {
            Ty::Str => {
                self.expr(arg)?;
                self.call_helper("__pynux_strlen");
            }
            Ty::Array(n, _) => self.load_const("r0", i64::from(n)),
            Ty::Tuple(elems) => self.load_const("r0", elems.len() as i64),
            _ => {
                // Lists and dicts store their count in the first word.
                self.expr(arg)?;
                self.ins("ldr r0, [r0]");
            }
        }
        Ok(())
    }

    /// `print(x)` — typed printer plus a trailing newline.
    fn print_call(&mut self, args: &'a [ExprRef<'a>]) -> Result<()> {
        if let Some(arg) = args.first() {
            if let ExprKind::FString(parts) = &arg.kind {
                self.fstring_print(parts)?;
            } else {
                let ty = self.checked.ty(arg.id).clone();
                self.expr(arg)?;
                let printer = printer_for(&ty);
                self.call_helper(printer);
            }
        }
        self.call_helper("print_newline");
        Ok(())
    }

    /// An f-string lowers to one print call per fragment.
    pub(crate) fn fstring_print(&mut self, parts: &'a [FStringPart<'a>]) -> Result<()> {
        for part in parts {
            match part {
                FStringPart::Text(sym) => {
                    let label = self.string_label(*sym);
                    self.ins_fmt(format!("ldr r0, ={}", label));
                    self.call_helper("print_str");
                }
                FStringPart::Expr(x) => {
                    let ty = self.checked.ty(x.id).clone();
                    self.expr(x)?;
                    let printer = printer_for(&ty);
                    self.call_helper(printer);
                }
            }
        }
        Ok(())
    }

    /// Byte size of a surface type, via the checker's registry.
    fn surface_type_size(
        &mut self,
        te: &pynux_language::ast::TypeExpr<'a>,
        e: ExprRef<'a>,
    ) -> Result<u32> {
        use pynux_language::ast::TypeExpr;
        Ok(match te {
            TypeExpr::Name(sym) => match self.interner.resolve(*sym) {
                "int8" | "uint8" | "bool" | "char" => 1,
                "int16" | "uint16" => 2,
                "int32" | "uint32" | "float32" | "str" => 4,
                "int64" | "uint64" | "float64" => 8,
                "void" => 0,
                _ => {
                    self.checked
                        .registry
                        .layout(*sym)
                        .ok_or_else(|| self.emit_err("sizeof of an unknown type", e.span))?
                        .size
                }
            },
            TypeExpr::Ptr(_)
            | TypeExpr::Fn { .. }
            | TypeExpr::List(_)
            | TypeExpr::Dict(_, _)
            | TypeExpr::Tuple(_) => 4,
            TypeExpr::Array(n, elem) => *n as u32 * self.surface_type_size(elem, e)?,
            TypeExpr::Optional(inner) | TypeExpr::Volatile(inner) => {
                self.surface_type_size(inner, e)?
            }
        })
    }
}
