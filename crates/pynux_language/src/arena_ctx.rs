//! Arena bundle for one translation unit's AST.
//!
//! The parser allocates every expression node, type expression, and shared
//! slice out of an [`AstContext`]. Bundling the typed arenas in one value
//! keeps the parser's signature small and ties every `&'a` AST reference to
//! a single owner that is dropped after emission.
//!
//! The context also owns the [`ExprId`] counter, so sub-parsers (f-string
//! fragments) hand out ids from the same dense sequence.

use crate::ast::expr::{Expr, ExprId, ExprKind, ExprRef, FStringPart};
use crate::ast::types::TypeExpr;
use pynux_base::{Arena, Span, Symbol};
use std::cell::Cell;

/// Owns the arenas backing one module's AST.
pub struct AstContext<'a> {
    exprs: Arena<Expr<'a>>,
    expr_refs: Arena<ExprRef<'a>>,
    fstring_parts: Arena<FStringPart<'a>>,
    type_exprs: Arena<TypeExpr<'a>>,
    expr_pairs: Arena<(ExprRef<'a>, ExprRef<'a>)>,
    named_exprs: Arena<(Symbol, ExprRef<'a>)>,
    symbols: Arena<Symbol>,
    next_id: Cell<u32>,
}

impl<'a> AstContext<'a> {
    pub fn new() -> Self {
        AstContext {
            exprs: Arena::new(),
            expr_refs: Arena::new(),
            fstring_parts: Arena::new(),
            type_exprs: Arena::new(),
            expr_pairs: Arena::new(),
            named_exprs: Arena::new(),
            symbols: Arena::new(),
            next_id: Cell::new(0),
        }
    }

    /// Allocates an expression node, assigning the next dense [`ExprId`].
    pub fn expr(&'a self, kind: ExprKind<'a>, span: Span) -> ExprRef<'a> {
        let id = ExprId(self.next_id.get());
        self.next_id.set(id.0 + 1);
        self.exprs.alloc(Expr { id, span, kind })
    }

    /// Number of expression ids handed out so far.
    pub fn expr_count(&self) -> u32 {
        self.next_id.get()
    }

    pub fn expr_slice(&'a self, items: Vec<ExprRef<'a>>) -> &'a [ExprRef<'a>] {
        self.expr_refs.alloc_slice(items)
    }

    pub fn part_slice(&'a self, items: Vec<FStringPart<'a>>) -> &'a [FStringPart<'a>] {
        self.fstring_parts.alloc_slice(items)
    }

    pub fn type_expr(&'a self, ty: TypeExpr<'a>) -> &'a TypeExpr<'a> {
        self.type_exprs.alloc(ty)
    }

    pub fn type_slice(&'a self, items: Vec<TypeExpr<'a>>) -> &'a [TypeExpr<'a>] {
        self.type_exprs.alloc_slice(items)
    }

    pub fn pair_slice(
        &'a self,
        items: Vec<(ExprRef<'a>, ExprRef<'a>)>,
    ) -> &'a [(ExprRef<'a>, ExprRef<'a>)] {
        self.expr_pairs.alloc_slice(items)
    }

    pub fn named_slice(
        &'a self,
        items: Vec<(Symbol, ExprRef<'a>)>,
    ) -> &'a [(Symbol, ExprRef<'a>)] {
        self.named_exprs.alloc_slice(items)
    }

    pub fn symbol_slice(&'a self, items: Vec<Symbol>) -> &'a [Symbol] {
        self.symbols.alloc_slice(items)
    }
}

impl<'a> Default for AstContext<'a> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expr_ids_are_dense() {
        let ctx = AstContext::new();
        let a = ctx.expr(ExprKind::Int(1), Span::default());
        let b = ctx.expr(ExprKind::Int(2), Span::default());
        assert_eq!(a.id.index(), 0);
        assert_eq!(b.id.index(), 1);
        assert_eq!(ctx.expr_count(), 2);
    }

    #[test]
    fn slices_round_trip() {
        let ctx = AstContext::new();
        let a = ctx.expr(ExprKind::Int(1), Span::default());
        let b = ctx.expr(ExprKind::Int(2), Span::default());
        let slice = ctx.expr_slice(vec![a, b]);
        assert_eq!(slice.len(), 2);
        assert!(matches!(slice[0].kind, ExprKind::Int(1)));
    }
}
