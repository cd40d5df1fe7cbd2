//! Statements and top-level declarations.
//!
//! Statements own their children; blocks are plain `Vec<Stmt>`. Expression
//! operands are arena references into the same [`AstContext`] the parser
//! used, so a `Module` is cheap to move but borrows the arena.
//!
//! [`AstContext`]: crate::arena_ctx::AstContext

use super::expr::{BinOp, ExprRef};
use super::types::TypeExpr;
use pynux_base::{Span, Symbol};

/// A sequence of statements at one indentation level.
pub type Block<'a> = Vec<Stmt<'a>>;

/// A function parameter: `name: T [= default]`.
///
/// `ty` is `None` only for the bare `self` parameter of a class method; the
/// checker substitutes `Ptr[Class]` there and rejects a missing annotation
/// anywhere else.
#[derive(Debug, Clone, Copy)]
pub struct Param<'a> {
    pub name: Symbol,
    pub ty: Option<TypeExpr<'a>>,
    pub default: Option<ExprRef<'a>>,
    pub span: Span,
}

/// An `except [Exc [as name]]:` handler.
#[derive(Debug)]
pub struct Handler<'a> {
    pub exc: Option<Symbol>,
    pub name: Option<Symbol>,
    pub body: Block<'a>,
    pub span: Span,
}

/// A `case` pattern: wildcard, literal, or identifier binding.
#[derive(Debug, Clone, Copy)]
pub enum Pattern<'a> {
    /// `case _:`
    Wildcard,
    /// `case 3:` / `case "s":` — integer or string literal, possibly negated.
    Literal(ExprRef<'a>),
    /// `case name:` — binds the scrutinee.
    Bind(Symbol),
}

/// One `case pattern:` arm of a `match`.
#[derive(Debug)]
pub struct MatchArm<'a> {
    pub pattern: Pattern<'a>,
    pub body: Block<'a>,
    pub span: Span,
}

/// A statement inside a function body.
#[derive(Debug)]
pub enum Stmt<'a> {
    /// `name: T` — a bare local declaration, reserving an uninitialized
    /// slot (the only way to obtain stack arrays and struct storage).
    Decl {
        name: Symbol,
        ty: TypeExpr<'a>,
        span: Span,
    },
    /// `target = value` or `target: T = value`.
    Assign {
        target: ExprRef<'a>,
        ty: Option<TypeExpr<'a>>,
        value: ExprRef<'a>,
        span: Span,
    },
    /// `target op= value`.
    AugAssign {
        target: ExprRef<'a>,
        op: BinOp,
        value: ExprRef<'a>,
        span: Span,
    },
    /// `if`/`elif` arms plus optional `else`.
    If {
        arms: Vec<(ExprRef<'a>, Block<'a>)>,
        orelse: Option<Block<'a>>,
        span: Span,
    },
    While {
        cond: ExprRef<'a>,
        body: Block<'a>,
        span: Span,
    },
    /// `for var in range(start, stop, step):` — recognized in the parser.
    ForRange {
        var: Symbol,
        start: Option<ExprRef<'a>>,
        stop: ExprRef<'a>,
        step: Option<ExprRef<'a>>,
        body: Block<'a>,
        span: Span,
    },
    /// `for var in iter:` over anything that is not a `range(…)` call.
    ForIter {
        var: Symbol,
        iter: ExprRef<'a>,
        body: Block<'a>,
        span: Span,
    },
    Break(Span),
    Continue(Span),
    Return {
        value: Option<ExprRef<'a>>,
        span: Span,
    },
    Raise {
        exc: Option<ExprRef<'a>>,
        span: Span,
    },
    Try {
        body: Block<'a>,
        handlers: Vec<Handler<'a>>,
        orelse: Option<Block<'a>>,
        finally: Option<Block<'a>>,
        span: Span,
    },
    With {
        ctx: ExprRef<'a>,
        name: Option<Symbol>,
        body: Block<'a>,
        span: Span,
    },
    Match {
        scrutinee: ExprRef<'a>,
        arms: Vec<MatchArm<'a>>,
        span: Span,
    },
    /// `asm("…")` — emitted verbatim.
    Asm { text: Symbol, span: Span },
    /// `assert cond [, message]`.
    Assert {
        cond: ExprRef<'a>,
        message: Option<ExprRef<'a>>,
        span: Span,
    },
    /// `global a, b` — names refer to module scope in this function.
    Global { names: Vec<Symbol>, span: Span },
    Pass(Span),
    Expr(ExprRef<'a>),
}

impl<'a> Stmt<'a> {
    pub fn span(&self) -> Span {
        match self {
            Stmt::Decl { span, .. }
            | Stmt::Assign { span, .. }
            | Stmt::AugAssign { span, .. }
            | Stmt::If { span, .. }
            | Stmt::While { span, .. }
            | Stmt::ForRange { span, .. }
            | Stmt::ForIter { span, .. }
            | Stmt::Break(span)
            | Stmt::Continue(span)
            | Stmt::Return { span, .. }
            | Stmt::Raise { span, .. }
            | Stmt::Try { span, .. }
            | Stmt::With { span, .. }
            | Stmt::Match { span, .. }
            | Stmt::Asm { span, .. }
            | Stmt::Assert { span, .. }
            | Stmt::Global { span, .. }
            | Stmt::Pass(span) => *span,
            Stmt::Expr(e) => e.span,
        }
    }
}

/// A function definition.
#[derive(Debug)]
pub struct FunctionDef<'a> {
    pub name: Symbol,
    pub params: Vec<Param<'a>>,
    /// `None` means `void`.
    pub ret: Option<TypeExpr<'a>>,
    pub body: Block<'a>,
    /// Decorator names, e.g. `interrupt`.
    pub decorators: Vec<Symbol>,
    pub span: Span,
}

/// A `struct Name:` definition.
#[derive(Debug)]
pub struct StructDef<'a> {
    pub name: Symbol,
    pub fields: Vec<(Symbol, TypeExpr<'a>)>,
    /// Set by `@packed`: no padding in layout.
    pub packed: bool,
    pub span: Span,
}

/// A `union Name:` definition; all fields at offset zero.
#[derive(Debug)]
pub struct UnionDef<'a> {
    pub name: Symbol,
    pub fields: Vec<(Symbol, TypeExpr<'a>)>,
    pub span: Span,
}

/// A `class Name(Base):` definition.
///
/// The checker flattens a derived class to the base's fields followed by its
/// own; methods become free functions taking `self: Ptr[Class]`.
#[derive(Debug)]
pub struct ClassDef<'a> {
    pub name: Symbol,
    pub bases: Vec<Symbol>,
    pub fields: Vec<(Symbol, TypeExpr<'a>)>,
    pub methods: Vec<FunctionDef<'a>>,
    pub span: Span,
}

/// An `extern def name(params) -> ret` declaration (no body).
#[derive(Debug)]
pub struct ExternDef<'a> {
    pub name: Symbol,
    pub params: Vec<Param<'a>>,
    pub ret: Option<TypeExpr<'a>>,
    pub span: Span,
}

/// One top-level item.
#[derive(Debug)]
pub enum Item<'a> {
    Function(FunctionDef<'a>),
    /// Module-level `name: T [= init]`.
    Global {
        name: Symbol,
        ty: TypeExpr<'a>,
        init: Option<ExprRef<'a>>,
        volatile: bool,
        span: Span,
    },
    Struct(StructDef<'a>),
    Union(UnionDef<'a>),
    Class(ClassDef<'a>),
    Extern(ExternDef<'a>),
    /// `import module [as alias]`.
    Import {
        module: Symbol,
        alias: Option<Symbol>,
        span: Span,
    },
    /// `from module import a [as b], …`.
    FromImport {
        module: Symbol,
        names: Vec<(Symbol, Option<Symbol>)>,
        span: Span,
    },
}

/// The parsed form of one translation unit.
#[derive(Debug)]
pub struct Module<'a> {
    pub items: Vec<Item<'a>>,
    /// Number of [`ExprId`](super::expr::ExprId)s assigned; sizes the
    /// checker's side tables.
    pub expr_count: u32,
}
