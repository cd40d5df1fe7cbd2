//! Abstract syntax tree for Pynux programs.
//!
//! The AST is the shared contract between the parser, the type checker, and
//! the code generator. It is split into three submodules:
//!
//! - [`types`]: surface type syntax (`Ptr[T]`, `Array[N, T]`, …)
//! - [`expr`]: expression nodes, arena-allocated
//! - [`stmt`]: statements and top-level declarations, owned
//!
//! # Arena Allocation
//!
//! Expression nodes and type expressions are bump-allocated; the `'a`
//! lifetime ties every `&'a Expr<'a>` to the [`AstContext`] that produced it
//! (one per translation unit). Expressions are immutable after parsing; the
//! checker records per-expression facts (resolved type, name binding) in side
//! tables keyed by the dense [`ExprId`] the parser assigns.
//!
//! Statements own their children in plain `Vec`s — they are traversed once
//! per stage and never shared.
//!
//! [`AstContext`]: crate::arena_ctx::AstContext

pub mod expr;
pub mod stmt;
pub mod types;

pub use expr::{BinOp, Expr, ExprId, ExprKind, ExprRef, FStringPart, UnaryOp};
pub use stmt::{
    Block, ClassDef, ExternDef, FunctionDef, Handler, Item, MatchArm, Module, Param, Pattern,
    Stmt, StructDef, UnionDef,
};
pub use types::TypeExpr;
