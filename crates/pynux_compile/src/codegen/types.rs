//! Type-directed instruction selection helpers.

use crate::analysis::Ty;
use pynux_language::ast::BinOp;

/// The branch condition that makes `cmp lhs, rhs` true for `op`.
///
/// Signedness picks between the arithmetic (`lt`/`le`/`gt`/`ge`) and
/// unsigned (`lo`/`ls`/`hi`/`hs`) condition codes.
pub(crate) fn branch_cond(op: BinOp, signed: bool) -> &'static str {
    match (op, signed) {
        (BinOp::Eq | BinOp::Is, _) => "eq",
        (BinOp::Ne | BinOp::IsNot, _) => "ne",
        (BinOp::Lt, true) => "lt",
        (BinOp::Le, true) => "le",
        (BinOp::Gt, true) => "gt",
        (BinOp::Ge, true) => "ge",
        (BinOp::Lt, false) => "lo",
        (BinOp::Le, false) => "ls",
        (BinOp::Gt, false) => "hi",
        (BinOp::Ge, false) => "hs",
        _ => unreachable!("not a comparison operator"),
    }
}

/// The runtime printer for a value of `ty` inside `print`/f-strings.
///
/// Chars go byte-wise through the UART; everything else integral prints as
/// signed decimal, and string-shaped values as text.
pub(crate) fn printer_for(ty: &Ty) -> &'static str {
    match ty {
        Ty::Str => "print_str",
        Ty::Char => "uart_putc",
        Ty::Ptr(inner) if **inner == Ty::Char => "print_str",
        Ty::Ptr(_) => "print_hex",
        _ => "print_int",
    }
}

/// `log2(size)` when `size` is a power of two — a shift beats a multiply.
pub(crate) fn shift_for_size(size: u32) -> Option<u32> {
    if size.is_power_of_two() {
        Some(size.trailing_zeros())
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unsigned_comparisons_use_unsigned_codes() {
        assert_eq!(branch_cond(BinOp::Lt, false), "lo");
        assert_eq!(branch_cond(BinOp::Ge, false), "hs");
        assert_eq!(branch_cond(BinOp::Lt, true), "lt");
    }

    #[test]
    fn printers_match_types() {
        assert_eq!(printer_for(&Ty::Str), "print_str");
        assert_eq!(printer_for(&Ty::Char), "uart_putc");
        assert_eq!(printer_for(&Ty::INT32), "print_int");
    }

    #[test]
    fn shifts_for_power_of_two_sizes() {
        assert_eq!(shift_for_size(1), Some(0));
        assert_eq!(shift_for_size(8), Some(3));
        assert_eq!(shift_for_size(12), None);
    }
}
