//! Compile-time evaluation of integer expressions.
//!
//! [`const_int`] walks an expression tree and produces its value when every
//! leaf is a literal. Overflow, division by zero, and out-of-range shifts
//! make an expression non-constant rather than folding to a wrong value —
//! the generator then emits the computation and the fault stays a runtime
//! fault.
//!
//! Folding never changes observable behavior: anything foldable is a pure
//! integer expression, and emission order and label numbering do not depend
//! on whether a fold succeeded.

use pynux_language::ast::{BinOp, Expr, ExprKind, UnaryOp};

/// Evaluates an expression to an `i64` if it is compile-time constant.
pub fn const_int(e: &Expr<'_>) -> Option<i64> {
    match &e.kind {
        ExprKind::Int(v) => Some(*v),
        ExprKind::Bool(b) => Some(i64::from(*b)),
        ExprKind::Unary { op, operand } => {
            let v = const_int(operand)?;
            match op {
                UnaryOp::Neg => v.checked_neg(),
                UnaryOp::BitNot => Some(!v),
                UnaryOp::Not => Some(i64::from(v == 0)),
            }
        }
        ExprKind::Binary { op, lhs, rhs } => {
            let l = const_int(lhs)?;
            let r = const_int(rhs)?;
            match op {
                BinOp::Add => l.checked_add(r),
                BinOp::Sub => l.checked_sub(r),
                BinOp::Mul => l.checked_mul(r),
                BinOp::Div | BinOp::FloorDiv => {
                    if r == 0 {
                        None
                    } else {
                        // Truncation toward zero, matching __aeabi_idiv.
                        l.checked_div(r)
                    }
                }
                BinOp::Mod => {
                    if r == 0 {
                        None
                    } else {
                        l.checked_rem(r)
                    }
                }
                BinOp::Pow => {
                    let exp = u32::try_from(r).ok()?;
                    l.checked_pow(exp)
                }
                BinOp::Shl => {
                    let amount = u32::try_from(r).ok().filter(|a| *a < 64)?;
                    l.checked_shl(amount)
                }
                BinOp::Shr => {
                    let amount = u32::try_from(r).ok().filter(|a| *a < 64)?;
                    Some(l >> amount)
                }
                BinOp::BitAnd => Some(l & r),
                BinOp::BitOr => Some(l | r),
                BinOp::BitXor => Some(l ^ r),
                BinOp::Eq => Some(i64::from(l == r)),
                BinOp::Ne => Some(i64::from(l != r)),
                BinOp::Lt => Some(i64::from(l < r)),
                BinOp::Le => Some(i64::from(l <= r)),
                BinOp::Gt => Some(i64::from(l > r)),
                BinOp::Ge => Some(i64::from(l >= r)),
                BinOp::And => Some(i64::from(l != 0 && r != 0)),
                BinOp::Or => Some(i64::from(l != 0 || r != 0)),
                BinOp::In | BinOp::NotIn | BinOp::Is | BinOp::IsNot => None,
            }
        }
        ExprKind::Ternary { cond, then, orelse } => {
            let c = const_int(cond)?;
            if c != 0 {
                const_int(then)
            } else {
                const_int(orelse)
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pynux_base::Interner;
    use pynux_language::{AstContext, Lexer, Parser};

    fn fold_of(src: &str) -> Option<i64> {
        let mut interner = Interner::new();
        let ctx = AstContext::new();
        let program = format!("def f() -> int32:\n    return {}\n", src);
        let tokens = Lexer::new(&program, &mut interner).tokenize().unwrap();
        let module = Parser::new(&tokens, &ctx, &mut interner).parse_module().unwrap();
        let pynux_language::ast::Item::Function(f) = &module.items[0] else {
            panic!();
        };
        let pynux_language::ast::Stmt::Return { value: Some(v), .. } = &f.body[0] else {
            panic!();
        };
        const_int(v)
    }

    #[test]
    fn folds_arithmetic() {
        assert_eq!(fold_of("2 + 40"), Some(42));
        assert_eq!(fold_of("(1 << 4) | 2"), Some(18));
        assert_eq!(fold_of("-10 / 3"), Some(-3));
        assert_eq!(fold_of("2 ** 10"), Some(1024));
    }

    #[test]
    fn folds_comparisons_and_ternary() {
        assert_eq!(fold_of("3 < 4"), Some(1));
        assert_eq!(fold_of("1 if 2 > 1 else 0"), Some(1));
    }

    #[test]
    fn division_by_zero_is_not_constant() {
        assert_eq!(fold_of("1 / 0"), None);
        assert_eq!(fold_of("1 % 0"), None);
    }

    #[test]
    fn overflow_is_not_constant() {
        assert_eq!(fold_of("9223372036854775807 + 1"), None);
    }

    #[test]
    fn names_are_not_constant() {
        assert_eq!(fold_of("x + 1"), None);
    }

    #[test]
    fn int32_boundary_folds() {
        assert_eq!(fold_of("-2147483648"), Some(-2147483648));
    }
}
