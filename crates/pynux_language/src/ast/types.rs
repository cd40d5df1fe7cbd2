//! Surface type syntax.
//!
//! A [`TypeExpr`] is the *written* form of a type, exactly as it appears
//! after `:` or `->` in the source. Scalar names (`int32`, `bool`, `str`,
//! user struct names) stay unresolved [`TypeExpr::Name`]s here; the checker
//! maps the whole tree onto the semantic type model.
//!
//! All nodes are arena-allocated and `Copy`, so statements and expressions
//! embed them freely.

use pynux_base::Symbol;

/// A parsed type annotation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TypeExpr<'a> {
    /// A bare name: a scalar primitive, `str`, `void`, or a user type.
    Name(Symbol),
    /// `Ptr[T]`
    Ptr(&'a TypeExpr<'a>),
    /// `Array[N, T]` with a literal element count.
    Array(i64, &'a TypeExpr<'a>),
    /// `Fn[Ret, A, B, …]`
    Fn {
        ret: &'a TypeExpr<'a>,
        params: &'a [TypeExpr<'a>],
    },
    /// `Optional[T]`
    Optional(&'a TypeExpr<'a>),
    /// `List[T]`
    List(&'a TypeExpr<'a>),
    /// `Dict[K, V]`
    Dict(&'a TypeExpr<'a>, &'a TypeExpr<'a>),
    /// `Tuple[T, …]`
    Tuple(&'a [TypeExpr<'a>]),
    /// `volatile T` — loads and stores must reach memory.
    Volatile(&'a TypeExpr<'a>),
}
