//! Statement lowering and control flow.
//!
//! Statements enter and leave with the same temporary depth; jumps out of a
//! structure (`return`, `break`, `continue`) first drop whatever that
//! structure keeps on the machine stack (`with` contexts, `match`
//! scrutinees, loop bounds), computed statically from the recorded depth.
//!
//! Labels use the per-function counter: `.L<fn>_<n>`. Loop statements push
//! their continue/break labels on the loop stack.

use pynux_base::{Result, Symbol};
use pynux_language::ast::{BinOp, ExprKind, ExprRef, MatchArm, Pattern, Stmt};

use super::context::{Emitter, LoopLabels};
use super::expr::{CallArg, CallTarget};
use crate::analysis::{Binding, Ty};
use crate::optimize::fold;

impl<'c, 'a> Emitter<'c, 'a> {
    pub(crate) fn block(&mut self, block: &'c [Stmt<'a>]) -> Result<()> {
        for stmt in block {
            self.stmt(stmt)?;
        }
        Ok(())
    }

    pub(crate) fn stmt(&mut self, stmt: &'c Stmt<'a>) -> Result<()> {
        self.source_note(stmt.span());
        match stmt {
            // The slot already exists in the frame; nothing to emit.
            Stmt::Decl { .. } => Ok(()),
            Stmt::Assign { target, value, .. } => self.assign(*target, *value),
            Stmt::AugAssign {
                target, op, value, ..
            } => self.aug_assign(*target, *op, *value),
            Stmt::If { arms, orelse, .. } => self.if_stmt(arms, orelse.as_deref()),
            Stmt::While { cond, body, .. } => self.while_stmt(*cond, body),
            Stmt::ForRange {
                var,
                start,
                stop,
                step,
                body,
                ..
            } => self.for_range(*var, *start, *stop, *step, body),
            Stmt::ForIter { span, .. } => {
                Err(self.emit_err("iterator loop fell through checking", *span))
            }
            Stmt::Break(_) => {
                let Some(labels) = self.state().loop_stack.last() else {
                    return Err(self.emit_err("break outside a loop", stmt.span()));
                };
                let target = labels.brk.clone();
                let depth = labels.depth;
                let drop_words = self.temp_depth() - depth;
                self.adjust_sp_up(drop_words * 4);
                self.ins_fmt(format!("b {}", target));
                Ok(())
            }
            Stmt::Continue(_) => {
                let Some(labels) = self.state().loop_stack.last() else {
                    return Err(self.emit_err("continue outside a loop", stmt.span()));
                };
                let target = labels.cont.clone();
                let depth = labels.depth;
                let drop_words = self.temp_depth() - depth;
                self.adjust_sp_up(drop_words * 4);
                self.ins_fmt(format!("b {}", target));
                Ok(())
            }
            Stmt::Return { value, .. } => {
                if let Some(value) = value {
                    if let ExprKind::StructLit { .. } = value.kind {
                        return Err(self.emit_err(
                            "struct literal cannot be returned directly",
                            value.span,
                        ));
                    }
                    self.expr(*value)?;
                }
                let depth = self.temp_depth();
                self.adjust_sp_up(depth * 4);
                let label = format!(".L{}_return", self.state().label_base);
                self.ins_fmt(format!("b {}", label));
                Ok(())
            }
            Stmt::Raise { exc, .. } => {
                match exc {
                    Some(exc) => {
                        self.expr(*exc)?;
                        self.call_helper("__pynux_raise");
                    }
                    None if self.state().handler_depth > 0 => {
                        self.call_helper("__pynux_reraise");
                    }
                    None => self.call_helper("__pynux_raise"),
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
                // Structural emission: the runtime's raise halts, so the
                // handler bodies sit behind labels nothing branches to, and
                // the finally block runs on the non-exceptional path.
                let l_finally = self.new_label();
                self.block(body)?;
                if let Some(orelse) = orelse {
                    self.block(orelse)?;
                }
                self.ins_fmt(format!("b {}", l_finally));
                for handler in handlers {
                    let l_handler = self.new_label();
                    self.label(&l_handler);
                    if let Some(name) = handler.name {
                        if let Some(slot) = self.frame().slot_by_name(name) {
                            self.ins("movs r0, #0");
                            self.store_slot(slot);
                        }
                    }
                    self.state().handler_depth += 1;
                    self.block(&handler.body)?;
                    self.state().handler_depth -= 1;
                    self.ins_fmt(format!("b {}", l_finally));
                }
                self.label(&l_finally);
                if let Some(finally) = finally {
                    self.block(finally)?;
                }
                Ok(())
            }
            Stmt::With {
                ctx, name, body, ..
            } => {
                self.expr(*ctx)?;
                self.call_helper("__pynux_context_enter");
                if let Some(name) = name {
                    if let Some(slot) = self.frame().slot_by_name(*name) {
                        self.store_slot(slot);
                    }
                }
                self.push_r0();
                self.block(body)?;
                self.pop_into("r0");
                self.call_helper("__pynux_context_exit");
                Ok(())
            }
            Stmt::Match {
                scrutinee, arms, ..
            } => self.match_stmt(*scrutinee, arms),
            Stmt::Asm { text, .. } => {
                let body = self.interner.resolve(*text).to_string();
                for line in body.lines() {
                    if !line.trim().is_empty() {
                        self.raw(line);
                    }
                }
                Ok(())
            }
            Stmt::Assert { cond, message, .. } => {
                let l_ok = self.new_label();
                self.expr(*cond)?;
                self.ins("cmp r0, #0");
                self.ins_fmt(format!("bne {}", l_ok));
                match message {
                    Some(message) => {
                        self.expr(*message)?;
                        self.call_helper("__pynux_assert_fail_msg");
                    }
                    None => self.call_helper("__pynux_assert_fail"),
                }
                self.label(&l_ok);
                Ok(())
            }
            Stmt::Global { .. } | Stmt::Pass(_) => Ok(()),
            Stmt::Expr(e) => {
                if let ExprKind::FString(parts) = &e.kind {
                    self.fstring_print(*parts)
                } else {
                    self.expr(*e)
                }
            }
        }
    }

    // ── Assignment ──────────────────────────────────────────────────────

    fn assign(&mut self, target: ExprRef<'a>, value: ExprRef<'a>) -> Result<()> {
        let target_ty = self.checked.ty(target.id).clone();

        // Struct literals fill the destination in place.
        if let ExprKind::StructLit { fields, .. } = &value.kind {
            return self.struct_lit_into(target, &target_ty, fields);
        }

        // Aggregate copies go through memcpy.
        if matches!(target_ty, Ty::Struct(_) | Ty::Union(_) | Ty::Array(_, _)) {
            let size = target_ty.size_of(&self.checked.registry);
            return self.emit_call(
                CallTarget::Direct("__pynux_memcpy".to_string()),
                &[
                    CallArg::Addr(target),
                    CallArg::Value(value),
                    CallArg::Const(i64::from(size)),
                ],
            );
        }

        match &target.kind {
            ExprKind::Ident(_) => match self.checked.binding(target.id).cloned() {
                Some(Binding::Local { slot }) => {
                    self.expr(value)?;
                    self.store_slot(slot);
                    Ok(())
                }
                Some(Binding::Global { name }) => {
                    self.expr(value)?;
                    let name = self.interner.resolve(name).to_string();
                    self.ins_fmt(format!("ldr r2, ={}", name));
                    self.store_typed(&target_ty, "r2");
                    Ok(())
                }
                _ => Err(self.emit_err("assignment target unbound", target.span)),
            },
            ExprKind::Index { base, index } => {
                let base_ty = self.checked.ty(base.id).clone();
                if let Ty::Dict(_, _) = base_ty {
                    return self.emit_call(
                        CallTarget::Direct("__pynux_dict_set_int".to_string()),
                        &[
                            CallArg::Value(base),
                            CallArg::Value(index),
                            CallArg::Value(value),
                        ],
                    );
                }
                self.store_through(target, value, &target_ty)
            }
            _ => self.store_through(target, value, &target_ty),
        }
    }

    /// `*addr = value` for attribute, index, and deref targets.
    fn store_through(
        &mut self,
        target: ExprRef<'a>,
        value: ExprRef<'a>,
        ty: &Ty,
    ) -> Result<()> {
        self.lvalue_addr(target)?;
        self.push_r0();
        self.expr(value)?;
        self.pop_into("r2");
        self.store_typed(ty, "r2");
        Ok(())
    }

    /// Writes a struct literal's fields directly into the target.
    fn struct_lit_into(
        &mut self,
        target: ExprRef<'a>,
        target_ty: &Ty,
        fields: &'a [(Symbol, ExprRef<'a>)],
    ) -> Result<()> {
        let (Ty::Struct(name) | Ty::Union(name)) = target_ty else {
            return Err(self.emit_err("struct literal into a non-struct place", target.span));
        };
        let layout: Vec<(Symbol, u32, Ty)> = self
            .checked
            .registry
            .layout(*name)
            .map(|l| {
                l.fields
                    .iter()
                    .map(|f| (f.name, f.offset, f.ty.clone()))
                    .collect()
            })
            .unwrap_or_default();

        self.lvalue_addr(target)?;
        self.push_r0();
        let marker = self.temp_depth();
        for (fname, fvalue) in fields {
            let Some((_, offset, fty)) = layout.iter().find(|(n, _, _)| n == fname).cloned()
            else {
                return Err(
                    self.emit_err("struct literal field fell through checking", fvalue.span)
                );
            };
            self.expr(fvalue)?;
            let back = (self.temp_depth() - marker) * 4;
            self.load_sp_word("r2", back);
            if offset > 0 {
                if offset <= 255 {
                    self.ins_fmt(format!("adds r2, #{}", offset));
                } else {
                    self.ins_fmt(format!("ldr r3, ={}", offset));
                    self.ins("adds r2, r2, r3");
                }
            }
            self.store_typed(&fty, "r2");
        }
        self.drop_temps(1);
        Ok(())
    }

    fn aug_assign(&mut self, target: ExprRef<'a>, op: BinOp, value: ExprRef<'a>) -> Result<()> {
        let ty = self.checked.ty(target.id).clone();
        self.lvalue_addr(target)?;
        self.push_r0();

        if ty.is_wide() {
            self.load_sp_word("r0", 0);
            self.load_typed(&ty, "r0");
            self.push_pair();
            self.expr(value)?;
            self.pop_pair_into("r2", "r3");
            self.apply_wide_op(op, target)?;
            self.pop_into("r2");
            self.store_typed(&ty, "r2");
            return Ok(());
        }

        self.load_sp_word("r0", 0);
        self.load_typed(&ty, "r0");
        self.push_r0();
        self.expr(value)?;
        self.pop_into("r1");
        self.apply_binop(op, &ty, target)?;
        self.pop_into("r2");
        self.store_typed(&ty, "r2");
        Ok(())
    }

    /// Applies `r0 = r1 <op> r0` for 32-bit operands.
    fn apply_binop(&mut self, op: BinOp, ty: &Ty, target: ExprRef<'a>) -> Result<()> {
        let signed = ty.is_signed();
        // Pointer targets scale the integer operand.
        if let Ty::Ptr(inner) = ty {
            let size = inner.size_of(&self.checked.registry).max(1);
            if matches!(op, BinOp::Add | BinOp::Sub) {
                self.scale_r0(size);
                if op == BinOp::Add {
                    self.ins("adds r0, r1, r0");
                } else {
                    self.ins("subs r0, r1, r0");
                }
                return Ok(());
            }
        }
        match op {
            BinOp::Add => self.ins("adds r0, r1, r0"),
            BinOp::Sub => self.ins("subs r0, r1, r0"),
            BinOp::Mul => self.ins("muls r0, r1, r0"),
            BinOp::Div | BinOp::FloorDiv => {
                self.swap_helper_args();
                if signed {
                    self.call_helper("__aeabi_idiv");
                } else {
                    self.call_helper("__aeabi_uidivmod");
                }
            }
            BinOp::Mod => {
                self.swap_helper_args();
                if signed {
                    self.call_helper("__aeabi_idivmod");
                } else {
                    self.call_helper("__aeabi_uidivmod");
                }
                self.ins("mov r0, r1");
            }
            BinOp::Pow => {
                self.swap_helper_args();
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
            _ => {
                return Err(self.emit_err(
                    "operator is not valid in augmented assignment",
                    target.span,
                ));
            }
        }
        Ok(())
    }

    /// Applies `r0:r1 = r2:r3 <op> r0:r1` for the wide operators.
    fn apply_wide_op(&mut self, op: BinOp, target: ExprRef<'a>) -> Result<()> {
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
            _ => {
                return Err(self.emit_err(
                    "operator is not valid for 64-bit augmented assignment",
                    target.span,
                ));
            }
        }
        Ok(())
    }

    fn swap_helper_args(&mut self) {
        self.ins("mov r2, r0");
        self.ins("mov r0, r1");
        self.ins("mov r1, r2");
    }

    fn scale_r0(&mut self, size: u32) {
        match super::types::shift_for_size(size) {
            Some(0) => {}
            Some(k) => self.ins_fmt(format!("lsls r0, r0, #{}", k)),
            None => {
                self.ins_fmt(format!("ldr r2, ={}", size));
                self.ins("muls r0, r2, r0");
            }
        }
    }

    // ── Control flow ────────────────────────────────────────────────────

    fn if_stmt(
        &mut self,
        arms: &'c [(ExprRef<'a>, Vec<Stmt<'a>>)],
        orelse: Option<&'c [Stmt<'a>]>,
    ) -> Result<()> {
        let l_end = self.new_label();
        for (cond, body) in arms {
            let l_next = self.new_label();
            self.expr(*cond)?;
            self.ins("cmp r0, #0");
            self.ins_fmt(format!("beq {}", l_next));
            self.block(body)?;
            self.ins_fmt(format!("b {}", l_end));
            self.label(&l_next);
        }
        if let Some(orelse) = orelse {
            self.block(orelse)?;
        }
        self.label(&l_end);
        Ok(())
    }

    fn while_stmt(&mut self, cond: ExprRef<'a>, body: &'c [Stmt<'a>]) -> Result<()> {
        let l_cond = self.new_label();
        let l_end = self.new_label();
        self.label(&l_cond);
        self.expr(cond)?;
        self.ins("cmp r0, #0");
        self.ins_fmt(format!("beq {}", l_end));
        let depth = self.temp_depth();
        self.state().loop_stack.push(LoopLabels {
            cont: l_cond.clone(),
            brk: l_end.clone(),
            depth,
        });
        self.block(body)?;
        self.state().loop_stack.pop();
        self.ins_fmt(format!("b {}", l_cond));
        self.label(&l_end);
        Ok(())
    }

    /// `for var in range(start, stop, step)` — bounds evaluated once and
    /// held as stack temporaries for the loop's lifetime.
    fn for_range(
        &mut self,
        var: Symbol,
        start: Option<ExprRef<'a>>,
        stop: ExprRef<'a>,
        step: Option<ExprRef<'a>>,
        body: &'c [Stmt<'a>],
    ) -> Result<()> {
        let var_slot = self
            .frame()
            .slot_by_name(var)
            .ok_or_else(|| self.emit_err("loop variable without a slot", stop.span))?;
        let step_const = step.and_then(|s| fold::const_int(s));
        let descending = matches!(step_const, Some(s) if s < 0);

        self.expr(stop)?;
        self.push_r0();
        let stop_mark = self.temp_depth();
        match step {
            Some(s) => self.expr(s)?,
            None => self.ins("movs r0, #1"),
        }
        self.push_r0();
        let step_mark = self.temp_depth();

        match start {
            Some(s) => self.expr(s)?,
            None => self.ins("movs r0, #0"),
        }
        self.store_slot(var_slot);

        let l_cond = self.new_label();
        let l_cont = self.new_label();
        let l_end = self.new_label();
        self.label(&l_cond);
        self.load_slot(var_slot);
        let stop_back = (self.temp_depth() - stop_mark) * 4;
        self.load_sp_word("r1", stop_back);
        self.ins("cmp r0, r1");
        if descending {
            self.ins_fmt(format!("ble {}", l_end));
        } else {
            self.ins_fmt(format!("bge {}", l_end));
        }

        let depth = self.temp_depth();
        self.state().loop_stack.push(LoopLabels {
            cont: l_cont.clone(),
            brk: l_end.clone(),
            depth,
        });
        self.block(body)?;
        self.state().loop_stack.pop();

        self.label(&l_cont);
        self.load_slot(var_slot);
        let step_back = (self.temp_depth() - step_mark) * 4;
        self.load_sp_word("r1", step_back);
        self.ins("adds r0, r0, r1");
        self.store_slot(var_slot);
        self.ins_fmt(format!("b {}", l_cond));
        self.label(&l_end);
        self.drop_temps(2);
        Ok(())
    }

    fn match_stmt(&mut self, scrutinee: ExprRef<'a>, arms: &'c [MatchArm<'a>]) -> Result<()> {
        let scrut_ty = self.checked.ty(scrutinee.id).clone();
        let l_done = self.new_label();
        self.expr(scrutinee)?;
        self.push_r0();

        for arm in arms {
            let l_next = self.new_label();
            match arm.pattern {
                Pattern::Wildcard => {}
                Pattern::Literal(lit) => {
                    self.load_sp_word("r0", 0);
                    if scrut_ty == Ty::Str {
                        let ExprKind::Str(sym) = lit.kind else {
                            return Err(self.emit_err(
                                "string match arm without a string literal",
                                lit.span,
                            ));
                        };
                        let label = self.string_label(sym);
                        self.ins_fmt(format!("ldr r1, ={}", label));
                        self.call_helper("__pynux_strcmp");
                        self.ins("cmp r0, #0");
                        self.ins_fmt(format!("bne {}", l_next));
                    } else {
                        let v = fold::const_int(lit).ok_or_else(|| {
                            self.emit_err("match literal fell through checking", lit.span)
                        })?;
                        self.load_const("r1", v);
                        self.ins("cmp r0, r1");
                        self.ins_fmt(format!("bne {}", l_next));
                    }
                }
                Pattern::Bind(name) => {
                    if let Some(slot) = self.frame().slot_by_name(name) {
                        self.load_sp_word("r0", 0);
                        self.store_slot(slot);
                    }
                }
            }
            self.block(&arm.body)?;
            self.ins_fmt(format!("b {}", l_done));
            self.label(&l_next);
        }

        self.label(&l_done);
        self.drop_temps(1);
        Ok(())
    }
}
