//! Expression grammar: precedence climbing, postfix trailers, f-strings.
//!
//! Precedence, lowest to highest: ternary, `or`, `and`, `not`, comparison
//! (including `in`, `not in`, `is`, `is not`), `|`, `^`, `&`, shifts,
//! additive, multiplicative, unary (`-` `~` `&` `*`), power (right
//! associative), postfix (`.attr`, `(args)`, `[index]`, `[a:b:c]`).
//!
//! `cast[T](e)`, `sizeof(T)`, and the struct literal `T{field=expr}` are
//! recognized syntactic forms rather than library calls.

use super::Parser;
use crate::ast::expr::{BinOp, ExprKind, ExprRef, FStringPart, UnaryOp};
use crate::lexer::{decode_escapes, Lexer};
use crate::token::{Token, TokenKind};
use pynux_base::{Diagnostic, Result, Span, Symbol};

impl<'t, 'a, 'i> Parser<'t, 'a, 'i> {
    pub(super) fn parse_expr(&mut self) -> Result<ExprRef<'a>> {
        if self.at(TokenKind::Lambda) {
            return self.parse_lambda();
        }
        let start = self.peek().span;
        let then = self.parse_or()?;
        if self.eat(TokenKind::If) {
            let cond = self.parse_or()?;
            self.expect(TokenKind::Else)?;
            let orelse = self.parse_expr()?;
            return Ok(self.ctx.expr(
                ExprKind::Ternary { cond, then, orelse },
                self.span_from(start),
            ));
        }
        Ok(then)
    }

    fn parse_lambda(&mut self) -> Result<ExprRef<'a>> {
        let start = self.peek().span;
        self.expect(TokenKind::Lambda)?;
        let mut params: Vec<Symbol> = Vec::new();
        if !self.at(TokenKind::Colon) {
            loop {
                params.push(self.expect_ident()?.0);
                if !self.eat(TokenKind::Comma) {
                    break;
                }
            }
        }
        self.expect(TokenKind::Colon)?;
        let body = self.parse_expr()?;
        Ok(self.ctx.expr(
            ExprKind::Lambda {
                params: self.ctx.symbol_slice(params),
                body,
            },
            self.span_from(start),
        ))
    }

    fn parse_or(&mut self) -> Result<ExprRef<'a>> {
        let start = self.peek().span;
        let mut lhs = self.parse_and()?;
        while self.eat(TokenKind::Or) {
            let rhs = self.parse_and()?;
            lhs = self.ctx.expr(
                ExprKind::Binary { op: BinOp::Or, lhs, rhs },
                self.span_from(start),
            );
        }
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<ExprRef<'a>> {
        let start = self.peek().span;
        let mut lhs = self.parse_not()?;
        while self.eat(TokenKind::And) {
            let rhs = self.parse_not()?;
            lhs = self.ctx.expr(
                ExprKind::Binary { op: BinOp::And, lhs, rhs },
                self.span_from(start),
            );
        }
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<ExprRef<'a>> {
        let start = self.peek().span;
        if self.eat(TokenKind::Not) {
            let operand = self.parse_not()?;
            return Ok(self.ctx.expr(
                ExprKind::Unary { op: UnaryOp::Not, operand },
                self.span_from(start),
            ));
        }
        self.parse_comparison()
    }

    fn parse_comparison(&mut self) -> Result<ExprRef<'a>> {
        let start = self.peek().span;
        let mut lhs = self.parse_bitor()?;
        loop {
            let op = match self.kind() {
                TokenKind::EqEq => BinOp::Eq,
                TokenKind::NotEq => BinOp::Ne,
                TokenKind::Lt => BinOp::Lt,
                TokenKind::LtEq => BinOp::Le,
                TokenKind::Gt => BinOp::Gt,
                TokenKind::GtEq => BinOp::Ge,
                TokenKind::In => BinOp::In,
                TokenKind::Is => {
                    if self.peek_kind_at(1) == TokenKind::Not {
                        self.advance();
                        BinOp::IsNot
                    } else {
                        BinOp::Is
                    }
                }
                TokenKind::Not if self.peek_kind_at(1) == TokenKind::In => {
                    self.advance();
                    BinOp::NotIn
                }
                _ => break,
            };
            self.advance();
            let rhs = self.parse_bitor()?;
            lhs = self.ctx.expr(ExprKind::Binary { op, lhs, rhs }, self.span_from(start));
        }
        Ok(lhs)
    }

    fn parse_bitor(&mut self) -> Result<ExprRef<'a>> {
        self.parse_left_assoc(&[(TokenKind::Pipe, BinOp::BitOr)], Self::parse_bitxor)
    }

    fn parse_bitxor(&mut self) -> Result<ExprRef<'a>> {
        self.parse_left_assoc(&[(TokenKind::Caret, BinOp::BitXor)], Self::parse_bitand)
    }

    fn parse_bitand(&mut self) -> Result<ExprRef<'a>> {
        self.parse_left_assoc(&[(TokenKind::Amp, BinOp::BitAnd)], Self::parse_shift)
    }

    fn parse_shift(&mut self) -> Result<ExprRef<'a>> {
        self.parse_left_assoc(
            &[(TokenKind::Shl, BinOp::Shl), (TokenKind::Shr, BinOp::Shr)],
            Self::parse_additive,
        )
    }

    fn parse_additive(&mut self) -> Result<ExprRef<'a>> {
        self.parse_left_assoc(
            &[(TokenKind::Plus, BinOp::Add), (TokenKind::Minus, BinOp::Sub)],
            Self::parse_multiplicative,
        )
    }

    fn parse_multiplicative(&mut self) -> Result<ExprRef<'a>> {
        self.parse_left_assoc(
            &[
                (TokenKind::Star, BinOp::Mul),
                (TokenKind::Slash, BinOp::Div),
                (TokenKind::SlashSlash, BinOp::FloorDiv),
                (TokenKind::Percent, BinOp::Mod),
            ],
            Self::parse_unary,
        )
    }

    fn parse_left_assoc(
        &mut self,
        table: &[(TokenKind, BinOp)],
        next: fn(&mut Self) -> Result<ExprRef<'a>>,
    ) -> Result<ExprRef<'a>> {
        let start = self.peek().span;
        let mut lhs = next(self)?;
        'outer: loop {
            for &(kind, op) in table {
                if self.at(kind) {
                    self.advance();
                    let rhs = next(self)?;
                    lhs = self.ctx.expr(ExprKind::Binary { op, lhs, rhs }, self.span_from(start));
                    continue 'outer;
                }
            }
            break;
        }
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<ExprRef<'a>> {
        let start = self.peek().span;
        match self.kind() {
            TokenKind::Minus => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(self.ctx.expr(
                    ExprKind::Unary { op: UnaryOp::Neg, operand },
                    self.span_from(start),
                ))
            }
            TokenKind::Tilde => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(self.ctx.expr(
                    ExprKind::Unary { op: UnaryOp::BitNot, operand },
                    self.span_from(start),
                ))
            }
            TokenKind::Amp => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(self.ctx.expr(ExprKind::AddressOf(operand), self.span_from(start)))
            }
            TokenKind::Star => {
                self.advance();
                let operand = self.parse_unary()?;
                Ok(self.ctx.expr(ExprKind::Deref(operand), self.span_from(start)))
            }
            _ => self.parse_power(),
        }
    }

    fn parse_power(&mut self) -> Result<ExprRef<'a>> {
        let start = self.peek().span;
        let base = self.parse_postfix()?;
        if self.eat(TokenKind::StarStar) {
            // Right associative; the exponent may itself be unary (`2 ** -1`).
            let rhs = self.parse_unary()?;
            return Ok(self.ctx.expr(
                ExprKind::Binary { op: BinOp::Pow, lhs: base, rhs },
                self.span_from(start),
            ));
        }
        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<ExprRef<'a>> {
        let start = self.peek().span;
        let mut e = self.parse_primary()?;
        loop {
            match self.kind() {
                TokenKind::Dot => {
                    self.advance();
                    let (name, _) = self.expect_ident()?;
                    e = self.ctx.expr(ExprKind::Attr { base: e, name }, self.span_from(start));
                }
                TokenKind::LParen => {
                    self.advance();
                    let (args, kwargs) = self.parse_call_args()?;
                    e = self.ctx.expr(
                        ExprKind::Call {
                            callee: e,
                            args: self.ctx.expr_slice(args),
                            kwargs: self.ctx.named_slice(kwargs),
                        },
                        self.span_from(start),
                    );
                }
                TokenKind::LBracket => {
                    self.advance();
                    e = self.parse_index_or_slice(e, start)?;
                }
                _ => break,
            }
        }
        Ok(e)
    }

    /// After the opening `[`: either `base[index]` or `base[a:b:c]`.
    fn parse_index_or_slice(&mut self, base: ExprRef<'a>, start: Span) -> Result<ExprRef<'a>> {
        let first = if self.at(TokenKind::Colon) {
            None
        } else {
            Some(self.parse_expr()?)
        };
        if self.eat(TokenKind::Colon) {
            let stop = if self.at(TokenKind::Colon) || self.at(TokenKind::RBracket) {
                None
            } else {
                Some(self.parse_expr()?)
            };
            let step = if self.eat(TokenKind::Colon) {
                if self.at(TokenKind::RBracket) {
                    None
                } else {
                    Some(self.parse_expr()?)
                }
            } else {
                None
            };
            self.expect(TokenKind::RBracket)?;
            return Ok(self.ctx.expr(
                ExprKind::Slice { base, start: first, stop, step },
                self.span_from(start),
            ));
        }
        let index = first.ok_or_else(|| self.err_expected("an index expression"))?;
        self.expect(TokenKind::RBracket)?;
        Ok(self.ctx.expr(ExprKind::Index { base, index }, self.span_from(start)))
    }

    /// After the opening `(` of a call.
    fn parse_call_args(
        &mut self,
    ) -> Result<(Vec<ExprRef<'a>>, Vec<(Symbol, ExprRef<'a>)>)> {
        let mut args = Vec::new();
        let mut kwargs = Vec::new();
        while !self.at(TokenKind::RParen) {
            if let TokenKind::Ident(name) = self.kind() {
                if self.peek_kind_at(1) == TokenKind::Assign {
                    self.advance();
                    self.advance();
                    kwargs.push((name, self.parse_expr()?));
                    if !self.eat(TokenKind::Comma) {
                        break;
                    }
                    continue;
                }
            }
            args.push(self.parse_expr()?);
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RParen)?;
        Ok((args, kwargs))
    }

    fn parse_primary(&mut self) -> Result<ExprRef<'a>> {
        let start = self.peek().span;
        match self.kind() {
            TokenKind::Int(v) => {
                self.advance();
                Ok(self.ctx.expr(ExprKind::Int(v), start))
            }
            TokenKind::Float(v) => {
                self.advance();
                Ok(self.ctx.expr(ExprKind::Float(v), start))
            }
            TokenKind::Str(sym) => {
                self.advance();
                Ok(self.ctx.expr(ExprKind::Str(sym), start))
            }
            TokenKind::FStr(sym) => {
                let tok = self.advance();
                self.parse_fstring(sym, tok)
            }
            TokenKind::True => {
                self.advance();
                Ok(self.ctx.expr(ExprKind::Bool(true), start))
            }
            TokenKind::False => {
                self.advance();
                Ok(self.ctx.expr(ExprKind::Bool(false), start))
            }
            TokenKind::NoneKw => {
                self.advance();
                Ok(self.ctx.expr(ExprKind::NoneLit, start))
            }
            TokenKind::Ident(sym) => {
                let text = self.interner.resolve(sym);
                if text == "cast" && self.peek_kind_at(1) == TokenKind::LBracket {
                    return self.parse_cast(start);
                }
                if text == "sizeof" && self.peek_kind_at(1) == TokenKind::LParen {
                    return self.parse_sizeof(start);
                }
                self.advance();
                if self.at(TokenKind::LBrace) {
                    return self.parse_struct_lit(sym, start);
                }
                Ok(self.ctx.expr(ExprKind::Ident(sym), start))
            }
            TokenKind::LParen => {
                self.advance();
                if self.at(TokenKind::RParen) {
                    return Err(self.err_expected("an expression"));
                }
                let first = self.parse_expr()?;
                if self.at(TokenKind::Comma) {
                    let mut elems = vec![first];
                    while self.eat(TokenKind::Comma) {
                        if self.at(TokenKind::RParen) {
                            break;
                        }
                        elems.push(self.parse_expr()?);
                    }
                    self.expect(TokenKind::RParen)?;
                    return Ok(self.ctx.expr(
                        ExprKind::TupleLit(self.ctx.expr_slice(elems)),
                        self.span_from(start),
                    ));
                }
                self.expect(TokenKind::RParen)?;
                Ok(first)
            }
            TokenKind::LBracket => self.parse_list_or_comp(start),
            TokenKind::LBrace => self.parse_dict_lit(start),
            _ => Err(self.err_expected("an expression")),
        }
    }

    fn parse_cast(&mut self, start: Span) -> Result<ExprRef<'a>> {
        self.advance(); // cast
        self.expect(TokenKind::LBracket)?;
        let ty = self.parse_type()?;
        self.expect(TokenKind::RBracket)?;
        self.expect(TokenKind::LParen)?;
        let value = self.parse_expr()?;
        self.expect(TokenKind::RParen)?;
        Ok(self.ctx.expr(ExprKind::Cast { ty, value }, self.span_from(start)))
    }

    fn parse_sizeof(&mut self, start: Span) -> Result<ExprRef<'a>> {
        self.advance(); // sizeof
        self.expect(TokenKind::LParen)?;
        let ty = self.parse_type()?;
        self.expect(TokenKind::RParen)?;
        Ok(self.ctx.expr(ExprKind::Sizeof(ty), self.span_from(start)))
    }

    fn parse_struct_lit(&mut self, name: Symbol, start: Span) -> Result<ExprRef<'a>> {
        self.expect(TokenKind::LBrace)?;
        let mut fields = Vec::new();
        while !self.at(TokenKind::RBrace) {
            let (fname, _) = self.expect_ident()?;
            self.expect(TokenKind::Assign)?;
            fields.push((fname, self.parse_expr()?));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(self.ctx.expr(
            ExprKind::StructLit {
                name,
                fields: self.ctx.named_slice(fields),
            },
            self.span_from(start),
        ))
    }

    fn parse_list_or_comp(&mut self, start: Span) -> Result<ExprRef<'a>> {
        self.expect(TokenKind::LBracket)?;
        if self.eat(TokenKind::RBracket) {
            return Ok(self.ctx.expr(
                ExprKind::ListLit(self.ctx.expr_slice(Vec::new())),
                self.span_from(start),
            ));
        }
        let first = self.parse_expr()?;
        if self.eat(TokenKind::For) {
            let (var, _) = self.expect_ident()?;
            self.expect(TokenKind::In)?;
            let iter = self.parse_or()?;
            let filter = if self.eat(TokenKind::If) {
                Some(self.parse_or()?)
            } else {
                None
            };
            self.expect(TokenKind::RBracket)?;
            return Ok(self.ctx.expr(
                ExprKind::Comp { elem: first, var, iter, filter },
                self.span_from(start),
            ));
        }
        let mut elems = vec![first];
        while self.eat(TokenKind::Comma) {
            if self.at(TokenKind::RBracket) {
                break;
            }
            elems.push(self.parse_expr()?);
        }
        self.expect(TokenKind::RBracket)?;
        Ok(self.ctx.expr(
            ExprKind::ListLit(self.ctx.expr_slice(elems)),
            self.span_from(start),
        ))
    }

    fn parse_dict_lit(&mut self, start: Span) -> Result<ExprRef<'a>> {
        self.expect(TokenKind::LBrace)?;
        let mut pairs = Vec::new();
        while !self.at(TokenKind::RBrace) {
            let key = self.parse_expr()?;
            self.expect(TokenKind::Colon)?;
            let value = self.parse_expr()?;
            pairs.push((key, value));
            if !self.eat(TokenKind::Comma) {
                break;
            }
        }
        self.expect(TokenKind::RBrace)?;
        Ok(self.ctx.expr(
            ExprKind::DictLit(self.ctx.pair_slice(pairs)),
            self.span_from(start),
        ))
    }

    // ── F-strings ───────────────────────────────────────────────────────

    /// Splits an f-string body into literal text and `{expr}` fragments.
    ///
    /// Each fragment is re-lexed and re-parsed against the same arena; its
    /// token spans are rebased so diagnostics land inside the original
    /// literal. `{{` and `}}` escape literal braces.
    fn parse_fstring(&mut self, raw_sym: Symbol, tok: Token) -> Result<ExprRef<'a>> {
        let raw = self.interner.resolve(raw_sym).to_string();
        let bytes = raw.as_bytes();
        // Body starts after the `f` prefix and the opening quote.
        let body_base = tok.span.start + 2;

        let mut parts: Vec<FStringPart<'a>> = Vec::new();
        let mut text = String::new();
        let mut i = 0;
        while i < bytes.len() {
            match bytes[i] {
                b'{' if bytes.get(i + 1) == Some(&b'{') => {
                    text.push('{');
                    i += 2;
                }
                b'}' if bytes.get(i + 1) == Some(&b'}') => {
                    text.push('}');
                    i += 2;
                }
                b'{' => {
                    self.flush_fstring_text(&mut text, &mut parts, tok.span)?;
                    let frag_start = i + 1;
                    let mut depth = 1;
                    let mut j = frag_start;
                    while j < bytes.len() && depth > 0 {
                        match bytes[j] {
                            b'{' => depth += 1,
                            b'}' => depth -= 1,
                            _ => {}
                        }
                        j += 1;
                    }
                    if depth != 0 {
                        return Err(Diagnostic::parse("unclosed '{' in f-string", tok.span));
                    }
                    let frag_end = j - 1;
                    let frag = raw[frag_start..frag_end].trim();
                    if frag.is_empty() {
                        return Err(Diagnostic::parse("empty expression in f-string", tok.span));
                    }
                    let expr = self.parse_fstring_fragment(frag, body_base + frag_start)?;
                    parts.push(FStringPart::Expr(expr));
                    i = j;
                }
                b'}' => {
                    return Err(Diagnostic::parse("single '}' in f-string", tok.span));
                }
                b => {
                    text.push(b as char);
                    i += 1;
                }
            }
        }
        self.flush_fstring_text(&mut text, &mut parts, tok.span)?;

        Ok(self
            .ctx
            .expr(ExprKind::FString(self.ctx.part_slice(parts)), tok.span))
    }

    fn flush_fstring_text(
        &mut self,
        text: &mut String,
        parts: &mut Vec<FStringPart<'a>>,
        span: Span,
    ) -> Result<()> {
        if text.is_empty() {
            return Ok(());
        }
        let decoded = decode_escapes(text).map_err(|msg| Diagnostic::lex(msg, span))?;
        let sym = self.interner.intern(&decoded);
        parts.push(FStringPart::Text(sym));
        text.clear();
        Ok(())
    }

    fn parse_fstring_fragment(&mut self, frag: &str, base: usize) -> Result<ExprRef<'a>> {
        let mut tokens = Lexer::new(frag, &mut *self.interner).tokenize().map_err(|mut d| {
            d.span.start += base;
            d.span.end += base;
            d
        })?;
        for t in &mut tokens {
            t.span.start += base;
            t.span.end += base;
        }
        let mut sub = Parser {
            tokens: &tokens,
            pos: 0,
            ctx: self.ctx,
            interner: &mut *self.interner,
        };
        let expr = sub.parse_expr()?;
        sub.skip_newlines();
        if !sub.at(TokenKind::Eof) {
            return Err(sub.err_expected("end of f-string expression"));
        }
        Ok(expr)
    }
}
