//! Recursive-descent parser for Pynux.
//!
//! The parser consumes the lexer's token stream and produces a [`Module`]:
//! a list of top-level declarations whose expression nodes live in the
//! [`AstContext`] arena. Layout tokens (`Newline`/`Indent`/`Dedent`) are
//! consumed like ordinary punctuation — a block is `:` `Newline` `Indent`
//! … `Dedent`.
//!
//! There is no error recovery: the first unexpected token aborts the parse
//! with a `parse` diagnostic of the form `expected X, found Y`.
//!
//! Submodules:
//!
//! - [`mod@self`] — items, statements, blocks
//! - `expr` — precedence-climbing expression grammar, f-string bodies
//! - `types` — the `Ptr[T]` / `Array[N, T]` / `Fn[R, …]` type syntax

mod expr;
mod types;

use crate::arena_ctx::AstContext;
use crate::ast::expr::{BinOp, ExprKind};
use crate::ast::stmt::{
    Block, ClassDef, ExternDef, FunctionDef, Handler, Item, MatchArm, Module, Param, Pattern,
    Stmt, StructDef, UnionDef,
};
use crate::token::{Token, TokenKind};
use pynux_base::{Diagnostic, Interner, Result, Span, Symbol};

/// Parses one translation unit.
pub struct Parser<'t, 'a, 'i> {
    tokens: &'t [Token],
    pos: usize,
    ctx: &'a AstContext<'a>,
    interner: &'i mut Interner,
}

impl<'t, 'a, 'i> Parser<'t, 'a, 'i> {
    /// `tokens` must be non-empty and end with [`TokenKind::Eof`], which is
    /// what [`Lexer::tokenize`](crate::lexer::Lexer::tokenize) guarantees.
    pub fn new(tokens: &'t [Token], ctx: &'a AstContext<'a>, interner: &'i mut Interner) -> Self {
        Parser {
            tokens,
            pos: 0,
            ctx,
            interner,
        }
    }

    /// Parses the whole token stream into a module.
    pub fn parse_module(mut self) -> Result<Module<'a>> {
        let mut items = Vec::new();
        self.skip_newlines();
        while !self.at(TokenKind::Eof) {
            let decorators = self.parse_decorators()?;
            items.push(self.parse_item(decorators)?);
            self.skip_newlines();
        }
        Ok(Module {
            items,
            expr_count: self.ctx.expr_count(),
        })
    }

    // ── Top-level items ─────────────────────────────────────────────────

    fn parse_decorators(&mut self) -> Result<Vec<Symbol>> {
        let mut decorators = Vec::new();
        while self.at(TokenKind::At) {
            self.advance();
            let (name, _) = self.expect_ident()?;
            decorators.push(name);
            self.expect(TokenKind::Newline)?;
            self.skip_newlines();
        }
        Ok(decorators)
    }

    fn parse_item(&mut self, decorators: Vec<Symbol>) -> Result<Item<'a>> {
        match self.kind() {
            TokenKind::Def => Ok(Item::Function(self.parse_function(decorators)?)),
            TokenKind::Extern => self.parse_extern(),
            TokenKind::Class => self.parse_class(),
            TokenKind::Struct => self.parse_struct(decorators),
            TokenKind::Union => self.parse_union(),
            TokenKind::Import => self.parse_import(),
            TokenKind::From => self.parse_from_import(),
            TokenKind::Ident(_) => self.parse_global_var(),
            _ => Err(self.err_expected("a declaration")),
        }
    }

    fn parse_function(&mut self, decorators: Vec<Symbol>) -> Result<FunctionDef<'a>> {
        let start = self.peek().span;
        self.expect(TokenKind::Def)?;
        let (name, _) = self.expect_ident()?;
        let params = self.parse_params()?;
        let ret = if self.eat(TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };
        let body = self.parse_block()?;
        Ok(FunctionDef {
            name,
            params,
            ret,
            body,
            decorators,
            span: self.span_from(start),
        })
    }

    fn parse_params(&mut self) -> Result<Vec<Param<'a>>> {
        self.expect(TokenKind::LParen)?;
        let mut params = Vec::new();
        while !self.at(TokenKind::RParen) {
            let pstart = self.peek().span;
            let (name, _) = self.expect_ident()?;
            let ty = if self.eat(TokenKind::Colon) {
                Some(self.parse_type()?)
            } else {
                None
            };
            let default = if self.eat(TokenKind::Assign) {
                Some(self.parse_expr()?)
            } else {
                None
            };
            params.push(Param {
                name,
                ty,
                default,
                span: self.span_from(pstart),
            });
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok(params)
    }

    fn parse_extern(&mut self) -> Result<Item<'a>> {
        let start = self.peek().span;
        self.expect(TokenKind::Extern)?;
        self.expect(TokenKind::Def)?;
        let (name, _) = self.expect_ident()?;
        let params = self.parse_params()?;
        let ret = if self.eat(TokenKind::Arrow) {
            Some(self.parse_type()?)
        } else {
            None
        };
        self.expect(TokenKind::Newline)?;
        Ok(Item::Extern(ExternDef {
            name,
            params,
            ret,
            span: self.span_from(start),
        }))
    }

    fn parse_struct(&mut self, decorators: Vec<Symbol>) -> Result<Item<'a>> {
        let start = self.peek().span;
        self.expect(TokenKind::Struct)?;
        let (name, _) = self.expect_ident()?;
        let fields = self.parse_field_block()?;
        let packed = decorators
            .iter()
            .any(|d| self.interner.resolve(*d) == "packed");
        Ok(Item::Struct(StructDef {
            name,
            fields,
            packed,
            span: self.span_from(start),
        }))
    }

    fn parse_union(&mut self) -> Result<Item<'a>> {
        let start = self.peek().span;
        self.expect(TokenKind::Union)?;
        let (name, _) = self.expect_ident()?;
        let fields = self.parse_field_block()?;
        Ok(Item::Union(UnionDef {
            name,
            fields,
            span: self.span_from(start),
        }))
    }

    /// `:` NEWLINE INDENT (`name: T` NEWLINE | `pass` NEWLINE)+ DEDENT
    fn parse_field_block(&mut self) -> Result<Vec<(Symbol, crate::ast::TypeExpr<'a>)>> {
        self.expect(TokenKind::Colon)?;
        self.expect(TokenKind::Newline)?;
        self.expect(TokenKind::Indent)?;
        let mut fields = Vec::new();
        while !self.at(TokenKind::Dedent) {
            if self.eat(TokenKind::Pass) {
                self.expect(TokenKind::Newline)?;
                continue;
            }
            let (fname, _) = self.expect_ident()?;
            self.expect(TokenKind::Colon)?;
            let fty = self.parse_type()?;
            fields.push((fname, fty));
            self.expect(TokenKind::Newline)?;
        }
        self.expect(TokenKind::Dedent)?;
        Ok(fields)
    }

    fn parse_class(&mut self) -> Result<Item<'a>> {
        let start = self.peek().span;
        self.expect(TokenKind::Class)?;
        let (name, _) = self.expect_ident()?;
        let mut bases = Vec::new();
        if self.eat(TokenKind::LParen) {
            while !self.at(TokenKind::RParen) {
                let (base, _) = self.expect_ident()?;
                bases.push(base);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
            self.expect(TokenKind::RParen)?;
        }
        self.expect(TokenKind::Colon)?;
        self.expect(TokenKind::Newline)?;
        self.expect(TokenKind::Indent)?;

        let mut fields = Vec::new();
        let mut methods = Vec::new();
        while !self.at(TokenKind::Dedent) {
            match self.kind() {
                TokenKind::Pass => {
                    self.advance();
                    self.expect(TokenKind::Newline)?;
                }
                TokenKind::Def => {
                    methods.push(self.parse_function(Vec::new())?);
                }
                TokenKind::Ident(_) => {
                    let (fname, _) = self.expect_ident()?;
                    self.expect(TokenKind::Colon)?;
                    let fty = self.parse_type()?;
                    fields.push((fname, fty));
                    self.expect(TokenKind::Newline)?;
                }
                _ => return Err(self.err_expected("a field or method")),
            }
        }
        self.expect(TokenKind::Dedent)?;
        Ok(Item::Class(ClassDef {
            name,
            bases,
            fields,
            methods,
            span: self.span_from(start),
        }))
    }

    fn parse_import(&mut self) -> Result<Item<'a>> {
        let start = self.peek().span;
        self.expect(TokenKind::Import)?;
        let module = self.parse_module_path()?;
        let alias = if self.eat(TokenKind::As) {
            Some(self.expect_ident()?.0)
        } else {
            None
        };
        self.expect(TokenKind::Newline)?;
        Ok(Item::Import {
            module,
            alias,
            span: self.span_from(start),
        })
    }

    fn parse_from_import(&mut self) -> Result<Item<'a>> {
        let start = self.peek().span;
        self.expect(TokenKind::From)?;
        let module = self.parse_module_path()?;
        self.expect(TokenKind::Import)?;
        let mut names = Vec::new();
        loop {
            let (name, _) = self.expect_ident()?;
            let alias = if self.eat(TokenKind::As) {
                Some(self.expect_ident()?.0)
            } else {
                None
            };
            names.push((name, alias));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::Newline)?;
        Ok(Item::FromImport {
            module,
            names,
            span: self.span_from(start),
        })
    }

    /// `a` or `a.b.c`, interned as one dotted name.
    fn parse_module_path(&mut self) -> Result<Symbol> {
        let (first, _) = self.expect_ident()?;
        if !self.at(TokenKind::Dot) {
            return Ok(first);
        }
        let mut path = self.interner.resolve(first).to_string();
        while self.eat(TokenKind::Dot) {
            let (seg, _) = self.expect_ident()?;
            path.push('.');
            path.push_str(self.interner.resolve(seg));
        }
        Ok(self.interner.intern(&path))
    }

    fn parse_global_var(&mut self) -> Result<Item<'a>> {
        let start = self.peek().span;
        let (name, _) = self.expect_ident()?;
        if !self.at(TokenKind::Colon) {
            return Err(Diagnostic::parse(
                "top-level variables require a type annotation",
                self.peek().span,
            ));
        }
        self.advance();
        let ty = self.parse_type()?;
        let init = if self.eat(TokenKind::Assign) {
            Some(self.parse_expr()?)
        } else {
            None
        };
        self.expect(TokenKind::Newline)?;
        let (ty, volatile) = match ty {
            crate::ast::TypeExpr::Volatile(inner) => (*inner, true),
            other => (other, false),
        };
        Ok(Item::Global {
            name,
            ty,
            init,
            volatile,
            span: self.span_from(start),
        })
    }

    // ── Statements ──────────────────────────────────────────────────────

    /// `:` NEWLINE INDENT stmt+ DEDENT
    fn parse_block(&mut self) -> Result<Block<'a>> {
        self.expect(TokenKind::Colon)?;
        self.expect(TokenKind::Newline)?;
        self.expect(TokenKind::Indent)?;
        let mut stmts = Vec::new();
        while !self.at(TokenKind::Dedent) {
            stmts.push(self.parse_stmt()?);
        }
        self.expect(TokenKind::Dedent)?;
        if stmts.is_empty() {
            return Err(self.err_expected("at least one statement"));
        }
        Ok(stmts)
    }

    fn parse_stmt(&mut self) -> Result<Stmt<'a>> {
        let start = self.peek().span;
        match self.kind() {
            TokenKind::If => self.parse_if(),
            TokenKind::While => {
                self.advance();
                let cond = self.parse_expr()?;
                let body = self.parse_block()?;
                Ok(Stmt::While {
                    cond,
                    body,
                    span: self.span_from(start),
                })
            }
            TokenKind::For => self.parse_for(),
            TokenKind::Try => self.parse_try(),
            TokenKind::With => self.parse_with(),
            TokenKind::Match => self.parse_match(),
            TokenKind::Return => {
                self.advance();
                let value = if self.at(TokenKind::Newline) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(TokenKind::Newline)?;
                Ok(Stmt::Return {
                    value,
                    span: self.span_from(start),
                })
            }
            TokenKind::Break => {
                self.advance();
                self.expect(TokenKind::Newline)?;
                Ok(Stmt::Break(start))
            }
            TokenKind::Continue => {
                self.advance();
                self.expect(TokenKind::Newline)?;
                Ok(Stmt::Continue(start))
            }
            TokenKind::Pass => {
                self.advance();
                self.expect(TokenKind::Newline)?;
                Ok(Stmt::Pass(start))
            }
            TokenKind::Raise => {
                self.advance();
                let exc = if self.at(TokenKind::Newline) {
                    None
                } else {
                    Some(self.parse_expr()?)
                };
                self.expect(TokenKind::Newline)?;
                Ok(Stmt::Raise {
                    exc,
                    span: self.span_from(start),
                })
            }
            TokenKind::Global => {
                self.advance();
                let mut names = vec![self.expect_ident()?.0];
                while self.eat(TokenKind::Comma) {
                    names.push(self.expect_ident()?.0);
                }
                self.expect(TokenKind::Newline)?;
                Ok(Stmt::Global {
                    names,
                    span: self.span_from(start),
                })
            }
            TokenKind::Assert => {
                self.advance();
                let cond = self.parse_expr()?;
                let message = if self.eat(TokenKind::Comma) {
                    Some(self.parse_expr()?)
                } else {
                    None
                };
                self.expect(TokenKind::Newline)?;
                Ok(Stmt::Assert {
                    cond,
                    message,
                    span: self.span_from(start),
                })
            }
            TokenKind::Asm => {
                self.advance();
                self.expect(TokenKind::LParen)?;
                let text = match self.kind() {
                    TokenKind::Str(sym) => {
                        self.advance();
                        sym
                    }
                    _ => return Err(self.err_expected("a string literal")),
                };
                self.expect(TokenKind::RParen)?;
                self.expect(TokenKind::Newline)?;
                Ok(Stmt::Asm {
                    text,
                    span: self.span_from(start),
                })
            }
            _ => self.parse_simple_stmt(),
        }
    }

    /// Expression-leading statements: assignment, augmented assignment,
    /// typed local declaration, or a bare expression.
    fn parse_simple_stmt(&mut self) -> Result<Stmt<'a>> {
        let start = self.peek().span;
        let target = self.parse_expr()?;

        if self.at(TokenKind::Colon) {
            let ExprKind::Ident(name) = target.kind else {
                return Err(Diagnostic::parse(
                    "only a plain name can carry a type annotation",
                    target.span,
                ));
            };
            self.advance();
            let ty = self.parse_type()?;
            // Bare `name: T` reserves an uninitialized slot.
            if self.eat(TokenKind::Newline) {
                return Ok(Stmt::Decl {
                    name,
                    ty,
                    span: self.span_from(start),
                });
            }
            self.expect(TokenKind::Assign)?;
            let value = self.parse_expr()?;
            self.expect(TokenKind::Newline)?;
            return Ok(Stmt::Assign {
                target,
                ty: Some(ty),
                value,
                span: self.span_from(start),
            });
        }

        if self.at(TokenKind::Assign) {
            if !target.is_lvalue() {
                return Err(Diagnostic::parse("cannot assign to this expression", target.span));
            }
            self.advance();
            let value = self.parse_expr()?;
            self.expect(TokenKind::Newline)?;
            return Ok(Stmt::Assign {
                target,
                ty: None,
                value,
                span: self.span_from(start),
            });
        }

        if let Some(op) = aug_assign_op(self.kind()) {
            if !target.is_lvalue() {
                return Err(Diagnostic::parse("cannot assign to this expression", target.span));
            }
            self.advance();
            let value = self.parse_expr()?;
            self.expect(TokenKind::Newline)?;
            return Ok(Stmt::AugAssign {
                target,
                op,
                value,
                span: self.span_from(start),
            });
        }

        self.expect(TokenKind::Newline)?;
        Ok(Stmt::Expr(target))
    }

    fn parse_if(&mut self) -> Result<Stmt<'a>> {
        let start = self.peek().span;
        self.expect(TokenKind::If)?;
        let mut arms = Vec::new();
        let cond = self.parse_expr()?;
        let body = self.parse_block()?;
        arms.push((cond, body));
        let mut orelse = None;
        loop {
            if self.eat(TokenKind::Elif) {
                let cond = self.parse_expr()?;
                let body = self.parse_block()?;
                arms.push((cond, body));
            } else if self.eat(TokenKind::Else) {
                orelse = Some(self.parse_block()?);
                break;
            } else {
                break;
            }
        }
        Ok(Stmt::If {
            arms,
            orelse,
            span: self.span_from(start),
        })
    }

    fn parse_for(&mut self) -> Result<Stmt<'a>> {
        let start = self.peek().span;
        self.expect(TokenKind::For)?;
        let (var, _) = self.expect_ident()?;
        self.expect(TokenKind::In)?;
        let iter = self.parse_expr()?;
        let body = self.parse_block()?;
        let span = self.span_from(start);

        // `for i in range(…)` is loop sugar, not a real call.
        if let ExprKind::Call { callee, args, kwargs } = &iter.kind {
            if let ExprKind::Ident(sym) = callee.kind {
                if self.interner.resolve(sym) == "range"
                    && kwargs.is_empty()
                    && (1..=3).contains(&args.len())
                {
                    let (fr_start, stop, step) = match args.len() {
                        1 => (None, args[0], None),
                        2 => (Some(args[0]), args[1], None),
                        _ => (Some(args[0]), args[1], Some(args[2])),
                    };
                    return Ok(Stmt::ForRange {
                        var,
                        start: fr_start,
                        stop,
                        step,
                        body,
                        span,
                    });
                }
            }
        }
        Ok(Stmt::ForIter {
            var,
            iter,
            body,
            span,
        })
    }

    fn parse_try(&mut self) -> Result<Stmt<'a>> {
        let start = self.peek().span;
        self.expect(TokenKind::Try)?;
        let body = self.parse_block()?;
        let mut handlers = Vec::new();
        while self.at(TokenKind::Except) {
            let hstart = self.peek().span;
            self.advance();
            let exc = if self.at(TokenKind::Colon) {
                None
            } else {
                Some(self.expect_ident()?.0)
            };
            let name = if self.eat(TokenKind::As) {
                Some(self.expect_ident()?.0)
            } else {
                None
            };
            let hbody = self.parse_block()?;
            handlers.push(Handler {
                exc,
                name,
                body: hbody,
                span: self.span_from(hstart),
            });
        }
        let orelse = if !handlers.is_empty() && self.eat(TokenKind::Else) {
            Some(self.parse_block()?)
        } else {
            None
        };
        let finally = if self.eat(TokenKind::Finally) {
            Some(self.parse_block()?)
        } else {
            None
        };
        if handlers.is_empty() && finally.is_none() {
            return Err(self.err_expected("'except' or 'finally'"));
        }
        Ok(Stmt::Try {
            body,
            handlers,
            orelse,
            finally,
            span: self.span_from(start),
        })
    }

    fn parse_with(&mut self) -> Result<Stmt<'a>> {
        let start = self.peek().span;
        self.expect(TokenKind::With)?;
        let ctx = self.parse_expr()?;
        let name = if self.eat(TokenKind::As) {
            Some(self.expect_ident()?.0)
        } else {
            None
        };
        let body = self.parse_block()?;
        Ok(Stmt::With {
            ctx,
            name,
            body,
            span: self.span_from(start),
        })
    }

    fn parse_match(&mut self) -> Result<Stmt<'a>> {
        let start = self.peek().span;
        self.expect(TokenKind::Match)?;
        let scrutinee = self.parse_expr()?;
        self.expect(TokenKind::Colon)?;
        self.expect(TokenKind::Newline)?;
        self.expect(TokenKind::Indent)?;
        let mut arms = Vec::new();
        while !self.at(TokenKind::Dedent) {
            let astart = self.peek().span;
            self.expect(TokenKind::Case)?;
            let pattern = self.parse_pattern()?;
            let body = self.parse_block()?;
            arms.push(MatchArm {
                pattern,
                body,
                span: self.span_from(astart),
            });
        }
        self.expect(TokenKind::Dedent)?;
        if arms.is_empty() {
            return Err(self.err_expected("at least one 'case' arm"));
        }
        Ok(Stmt::Match {
            scrutinee,
            arms,
            span: self.span_from(start),
        })
    }

    fn parse_pattern(&mut self) -> Result<Pattern<'a>> {
        let start = self.peek().span;
        match self.kind() {
            TokenKind::Int(_) | TokenKind::Str(_) | TokenKind::Minus | TokenKind::True
            | TokenKind::False => {
                let lit = self.parse_expr()?;
                Ok(Pattern::Literal(lit))
            }
            TokenKind::Ident(sym) => {
                self.advance();
                if self.interner.resolve(sym) == "_" {
                    Ok(Pattern::Wildcard)
                } else {
                    Ok(Pattern::Bind(sym))
                }
            }
            _ => Err(Diagnostic::parse(
                "expected a literal, a name, or '_' pattern",
                start,
            )),
        }
    }

    // ── Token helpers ───────────────────────────────────────────────────

    fn peek(&self) -> &Token {
        &self.tokens[self.pos.min(self.tokens.len() - 1)]
    }

    fn peek_kind_at(&self, offset: usize) -> TokenKind {
        let idx = (self.pos + offset).min(self.tokens.len() - 1);
        self.tokens[idx].kind
    }

    fn kind(&self) -> TokenKind {
        self.peek().kind
    }

    fn at(&self, kind: TokenKind) -> bool {
        self.kind() == kind
    }

    fn advance(&mut self) -> Token {
        let tok = *self.peek();
        if self.pos + 1 < self.tokens.len() {
            self.pos += 1;
        }
        tok
    }

    fn eat(&mut self, kind: TokenKind) -> bool {
        if self.at(kind) {
            self.advance();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token> {
        if self.at(kind) {
            Ok(self.advance())
        } else {
            Err(Diagnostic::parse(
                format!("expected {}, found {}", kind, self.kind()),
                self.peek().span,
            ))
        }
    }

    fn expect_ident(&mut self) -> Result<(Symbol, Span)> {
        match self.kind() {
            TokenKind::Ident(sym) => {
                let tok = self.advance();
                Ok((sym, tok.span))
            }
            found => Err(Diagnostic::parse(
                format!("expected identifier, found {}", found),
                self.peek().span,
            )),
        }
    }

    fn skip_newlines(&mut self) {
        while self.at(TokenKind::Newline) {
            self.advance();
        }
    }

    fn err_expected(&self, what: &str) -> Diagnostic {
        Diagnostic::parse(
            format!("expected {}, found {}", what, self.kind()),
            self.peek().span,
        )
    }

    fn prev_end(&self) -> usize {
        if self.pos == 0 {
            0
        } else {
            self.tokens[self.pos - 1].span.end
        }
    }

    fn span_from(&self, start: Span) -> Span {
        Span::new(start.start, self.prev_end().max(start.start))
    }
}

fn aug_assign_op(kind: TokenKind) -> Option<BinOp> {
    Some(match kind {
        TokenKind::PlusEq => BinOp::Add,
        TokenKind::MinusEq => BinOp::Sub,
        TokenKind::StarEq => BinOp::Mul,
        TokenKind::SlashEq => BinOp::Div,
        TokenKind::SlashSlashEq => BinOp::FloorDiv,
        TokenKind::PercentEq => BinOp::Mod,
        TokenKind::AmpEq => BinOp::BitAnd,
        TokenKind::PipeEq => BinOp::BitOr,
        TokenKind::CaretEq => BinOp::BitXor,
        TokenKind::ShlEq => BinOp::Shl,
        TokenKind::ShrEq => BinOp::Shr,
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lexer::Lexer;

    fn parse(src: &str) -> Module<'static> {
        // Tests leak the arena so the module can outlive this frame.
        let ctx: &'static AstContext<'static> = Box::leak(Box::new(AstContext::new()));
        let interner: &'static mut Interner = Box::leak(Box::new(Interner::new()));
        let tokens = Lexer::new(src, &mut *interner).tokenize().expect("lex");
        let tokens: &'static [Token] = Box::leak(tokens.into_boxed_slice());
        Parser::new(tokens, ctx, interner).parse_module().expect("parse")
    }

    fn parse_err(src: &str) -> Diagnostic {
        let ctx = AstContext::new();
        let mut interner = Interner::new();
        let tokens = Lexer::new(src, &mut interner).tokenize().expect("lex");
        Parser::new(&tokens, &ctx, &mut interner)
            .parse_module()
            .expect_err("expected parse failure")
    }

    #[test]
    fn empty_module_parses() {
        let module = parse("");
        assert!(module.items.is_empty());
    }

    #[test]
    fn function_with_params_and_return_type() {
        let module = parse("def add(a: int32, b: int32) -> int32:\n    return a + b\n");
        assert_eq!(module.items.len(), 1);
        let Item::Function(f) = &module.items[0] else {
            panic!("expected function");
        };
        assert_eq!(f.params.len(), 2);
        assert!(f.ret.is_some());
        assert_eq!(f.body.len(), 1);
    }

    #[test]
    fn for_over_range_becomes_for_range() {
        let module = parse("def main() -> int32:\n    for i in range(3):\n        pass\n    return 0\n");
        let Item::Function(f) = &module.items[0] else {
            panic!();
        };
        assert!(matches!(f.body[0], Stmt::ForRange { start: None, step: None, .. }));
    }

    #[test]
    fn for_over_range_with_bounds() {
        let module =
            parse("def main() -> int32:\n    for i in range(1, 10, 2):\n        pass\n    return 0\n");
        let Item::Function(f) = &module.items[0] else {
            panic!();
        };
        assert!(matches!(
            f.body[0],
            Stmt::ForRange {
                start: Some(_),
                step: Some(_),
                ..
            }
        ));
    }

    #[test]
    fn typed_global_parses() {
        let module = parse("counter: int32 = 0\n");
        assert!(matches!(module.items[0], Item::Global { init: Some(_), .. }));
    }

    #[test]
    fn untyped_global_is_rejected() {
        let err = parse_err("counter = 0\n");
        assert!(err.message.contains("type annotation"));
    }

    #[test]
    fn volatile_global_sets_flag() {
        let module = parse("reg: volatile uint32 = 0\n");
        assert!(matches!(module.items[0], Item::Global { volatile: true, .. }));
    }

    #[test]
    fn packed_decorator_reaches_struct() {
        let module = parse("@packed\nstruct Header:\n    tag: uint8\n    len: uint16\n");
        let Item::Struct(s) = &module.items[0] else {
            panic!();
        };
        assert!(s.packed);
        assert_eq!(s.fields.len(), 2);
    }

    #[test]
    fn class_with_base_and_method() {
        let module = parse(
            "class Dog(Animal):\n    name: Ptr[char]\n    def speak(self) -> int32:\n        return 1\n",
        );
        let Item::Class(c) = &module.items[0] else {
            panic!();
        };
        assert_eq!(c.bases.len(), 1);
        assert_eq!(c.fields.len(), 1);
        assert_eq!(c.methods.len(), 1);
        assert!(c.methods[0].params[0].ty.is_none());
    }

    #[test]
    fn try_without_handlers_is_rejected() {
        let err = parse_err("def f() -> int32:\n    try:\n        pass\n    return 0\n");
        assert!(err.message.contains("except"));
    }

    #[test]
    fn match_patterns() {
        let module = parse(
            "def f(x: int32) -> int32:\n    match x:\n        case 0:\n            return 1\n        case _:\n            return 2\n    return 0\n",
        );
        let Item::Function(f) = &module.items[0] else {
            panic!();
        };
        let Stmt::Match { arms, .. } = &f.body[0] else {
            panic!();
        };
        assert!(matches!(arms[0].pattern, Pattern::Literal(_)));
        assert!(matches!(arms[1].pattern, Pattern::Wildcard));
    }

    #[test]
    fn asm_statement_keeps_text() {
        let module = parse("def f() -> int32:\n    asm(\"wfi\")\n    return 0\n");
        let Item::Function(f) = &module.items[0] else {
            panic!();
        };
        assert!(matches!(f.body[0], Stmt::Asm { .. }));
    }

    #[test]
    fn imports_parse() {
        let module = parse("import drivers.uart as uart\nfrom kernel import init, run as start\n");
        assert!(matches!(module.items[0], Item::Import { alias: Some(_), .. }));
        let Item::FromImport { names, .. } = &module.items[1] else {
            panic!();
        };
        assert_eq!(names.len(), 2);
    }

    #[test]
    fn parse_error_mentions_expected_and_found() {
        let err = parse_err("def f(:\n    pass\n");
        assert!(err.message.contains("expected"));
        assert!(err.message.contains("found"));
    }
}
