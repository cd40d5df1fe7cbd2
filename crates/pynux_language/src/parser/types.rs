//! Type annotation grammar.
//!
//! Appears after `:` on declarations and after `->` on functions:
//! `T`, `Ptr[T]`, `Array[N, T]`, `Fn[Ret, A, B]`, `volatile T`,
//! `Optional[T]`, `List[T]`, `Dict[K, V]`, `Tuple[T, …]`. Bare names stay
//! unresolved; the checker decides whether they are primitives or user
//! types.

use super::Parser;
use crate::ast::types::TypeExpr;
use crate::token::TokenKind;
use pynux_base::{Diagnostic, Result};

impl<'t, 'a, 'i> Parser<'t, 'a, 'i> {
    pub(super) fn parse_type(&mut self) -> Result<TypeExpr<'a>> {
        if self.eat(TokenKind::Volatile) {
            let inner = self.parse_type()?;
            return Ok(TypeExpr::Volatile(self.ctx.type_expr(inner)));
        }

        let (name, _) = self.expect_ident()?;
        match self.interner.resolve(name) {
            "Ptr" => {
                self.expect(TokenKind::LBracket)?;
                let inner = self.parse_type()?;
                self.expect(TokenKind::RBracket)?;
                Ok(TypeExpr::Ptr(self.ctx.type_expr(inner)))
            }
            "Array" => {
                self.expect(TokenKind::LBracket)?;
                let len = match self.kind() {
                    TokenKind::Int(n) if n > 0 => {
                        self.advance();
                        n
                    }
                    _ => {
                        return Err(Diagnostic::parse(
                            "Array length must be a positive integer literal",
                            self.peek().span,
                        ));
                    }
                };
                self.expect(TokenKind::Comma)?;
                let elem = self.parse_type()?;
                self.expect(TokenKind::RBracket)?;
                Ok(TypeExpr::Array(len, self.ctx.type_expr(elem)))
            }
            "Fn" => {
                self.expect(TokenKind::LBracket)?;
                let ret = self.parse_type()?;
                let mut params = Vec::new();
                while self.eat(TokenKind::Comma) {
                    params.push(self.parse_type()?);
                }
                self.expect(TokenKind::RBracket)?;
                Ok(TypeExpr::Fn {
                    ret: self.ctx.type_expr(ret),
                    params: self.ctx.type_slice(params),
                })
            }
            "Optional" => {
                self.expect(TokenKind::LBracket)?;
                let inner = self.parse_type()?;
                self.expect(TokenKind::RBracket)?;
                Ok(TypeExpr::Optional(self.ctx.type_expr(inner)))
            }
            "List" => {
                self.expect(TokenKind::LBracket)?;
                let inner = self.parse_type()?;
                self.expect(TokenKind::RBracket)?;
                Ok(TypeExpr::List(self.ctx.type_expr(inner)))
            }
            "Dict" => {
                self.expect(TokenKind::LBracket)?;
                let key = self.parse_type()?;
                self.expect(TokenKind::Comma)?;
                let value = self.parse_type()?;
                self.expect(TokenKind::RBracket)?;
                Ok(TypeExpr::Dict(self.ctx.type_expr(key), self.ctx.type_expr(value)))
            }
            "Tuple" => {
                self.expect(TokenKind::LBracket)?;
                let mut elems = vec![self.parse_type()?];
                while self.eat(TokenKind::Comma) {
                    elems.push(self.parse_type()?);
                }
                self.expect(TokenKind::RBracket)?;
                Ok(TypeExpr::Tuple(self.ctx.type_slice(elems)))
            }
            _ => Ok(TypeExpr::Name(name)),
        }
    }
}
