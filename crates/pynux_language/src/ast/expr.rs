//! Expression nodes.
//!
//! Expressions are arena-allocated and immutable after parsing. Every node
//! carries a [`Span`] and a dense [`ExprId`]; the checker's side tables
//! (resolved type, name binding) are indexed by the id, so no node is ever
//! mutated after construction.

use super::types::TypeExpr;
use pynux_base::{Span, Symbol};

/// Reference to an arena-allocated expression.
pub type ExprRef<'a> = &'a Expr<'a>;

/// Dense per-translation-unit expression identifier.
///
/// Assigned in parse order starting at zero; the checker sizes its side
/// tables from [`Module::expr_count`](super::stmt::Module::expr_count).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ExprId(pub u32);

impl ExprId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Binary operators, including comparisons and short-circuit connectives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Shl,
    Shr,
    BitAnd,
    BitOr,
    BitXor,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    And,
    Or,
    /// `x in s` — membership.
    In,
    /// `x not in s`
    NotIn,
    /// `x is y` — identity.
    Is,
    /// `x is not y`
    IsNot,
}

impl BinOp {
    /// `true` for `== != < <= > >= is is not`.
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOp::Eq | BinOp::Ne | BinOp::Lt | BinOp::Le | BinOp::Gt | BinOp::Ge | BinOp::Is | BinOp::IsNot
        )
    }

    /// The source-level spelling, used in diagnostics.
    pub fn spelling(self) -> &'static str {
        match self {
            BinOp::Add => "+",
            BinOp::Sub => "-",
            BinOp::Mul => "*",
            BinOp::Div => "/",
            BinOp::FloorDiv => "//",
            BinOp::Mod => "%",
            BinOp::Pow => "**",
            BinOp::Shl => "<<",
            BinOp::Shr => ">>",
            BinOp::BitAnd => "&",
            BinOp::BitOr => "|",
            BinOp::BitXor => "^",
            BinOp::Eq => "==",
            BinOp::Ne => "!=",
            BinOp::Lt => "<",
            BinOp::Le => "<=",
            BinOp::Gt => ">",
            BinOp::Ge => ">=",
            BinOp::And => "and",
            BinOp::Or => "or",
            BinOp::In => "in",
            BinOp::NotIn => "not in",
            BinOp::Is => "is",
            BinOp::IsNot => "is not",
        }
    }
}

/// Unary operators. Address-of and dereference are separate node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation `-x`.
    Neg,
    /// Boolean `not x`.
    Not,
    /// Bitwise complement `~x`.
    BitNot,
}

/// One fragment of an f-string body.
#[derive(Debug, Clone, Copy)]
pub enum FStringPart<'a> {
    /// Literal text between `{…}` regions, escapes decoded.
    Text(Symbol),
    /// A `{expr}` region, re-parsed by the expression parser.
    Expr(ExprRef<'a>),
}

/// An expression node.
#[derive(Debug)]
pub struct Expr<'a> {
    pub id: ExprId,
    pub span: Span,
    pub kind: ExprKind<'a>,
}

/// The expression variants of the language.
#[derive(Debug)]
pub enum ExprKind<'a> {
    Int(i64),
    Float(f64),
    /// String literal; payload interned with escapes already decoded.
    Str(Symbol),
    Bool(bool),
    NoneLit,
    FString(&'a [FStringPart<'a>]),
    Ident(Symbol),
    /// `base.name` — struct field, method, or module member.
    Attr { base: ExprRef<'a>, name: Symbol },
    /// `base[index]`
    Index { base: ExprRef<'a>, index: ExprRef<'a> },
    /// `base[start:stop:step]`, all three optional.
    Slice {
        base: ExprRef<'a>,
        start: Option<ExprRef<'a>>,
        stop: Option<ExprRef<'a>>,
        step: Option<ExprRef<'a>>,
    },
    Call {
        callee: ExprRef<'a>,
        args: &'a [ExprRef<'a>],
        kwargs: &'a [(Symbol, ExprRef<'a>)],
    },
    Unary { op: UnaryOp, operand: ExprRef<'a> },
    Binary {
        op: BinOp,
        lhs: ExprRef<'a>,
        rhs: ExprRef<'a>,
    },
    /// `then if cond else orelse`
    Ternary {
        cond: ExprRef<'a>,
        then: ExprRef<'a>,
        orelse: ExprRef<'a>,
    },
    /// `&expr`
    AddressOf(ExprRef<'a>),
    /// `*expr`
    Deref(ExprRef<'a>),
    /// `cast[T](expr)` — unchecked conversion.
    Cast { ty: TypeExpr<'a>, value: ExprRef<'a> },
    /// `sizeof(T)` — compile-time constant.
    Sizeof(TypeExpr<'a>),
    /// `lambda a, b: body` — capture-free anonymous function.
    Lambda {
        params: &'a [Symbol],
        body: ExprRef<'a>,
    },
    ListLit(&'a [ExprRef<'a>]),
    DictLit(&'a [(ExprRef<'a>, ExprRef<'a>)]),
    TupleLit(&'a [ExprRef<'a>]),
    /// `T{field=expr, …}` — keyword form only.
    StructLit {
        name: Symbol,
        fields: &'a [(Symbol, ExprRef<'a>)],
    },
    /// `[elem for var in iter if filter]`
    Comp {
        elem: ExprRef<'a>,
        var: Symbol,
        iter: ExprRef<'a>,
        filter: Option<ExprRef<'a>>,
    },
}

impl<'a> Expr<'a> {
    /// `true` when this expression is a grammatical assignment target.
    pub fn is_lvalue(&self) -> bool {
        matches!(
            self.kind,
            ExprKind::Ident(_) | ExprKind::Attr { .. } | ExprKind::Index { .. } | ExprKind::Deref(_)
        )
    }
}
