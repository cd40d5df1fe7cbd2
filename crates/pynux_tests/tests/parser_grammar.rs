//! Parser coverage across the statement and expression grammar, plus the
//! determinism invariant.

use pynux_base::Interner;
use pynux_language::ast::{ExprKind, Item, Module, Stmt};
use pynux_language::{AstContext, Lexer, Parser};

fn parse_with<R>(src: &str, f: impl FnOnce(&Module<'_>) -> R) -> R {
    let mut interner = Interner::new();
    let ctx = AstContext::new();
    let tokens = Lexer::new(src, &mut interner).tokenize().expect("lex");
    let module = Parser::new(&tokens, &ctx, &mut interner)
        .parse_module()
        .expect("parse");
    f(&module)
}

fn parse_debug(src: &str) -> String {
    parse_with(src, |m| format!("{:?}", m))
}

#[test]
fn parsing_the_same_tokens_twice_yields_equal_asts() {
    let src = "def main() -> int32:\n    x: int32 = 1 + 2 * 3\n    if x > 5 and x < 10:\n        print_int(x)\n    return 0\n";
    assert_eq!(parse_debug(src), parse_debug(src));
}

#[test]
fn precedence_nests_multiplication_under_addition() {
    parse_with("def f() -> int32:\n    return 1 + 2 * 3\n", |m| {
        let Item::Function(f) = &m.items[0] else { panic!() };
        let Stmt::Return { value: Some(v), .. } = &f.body[0] else {
            panic!()
        };
        let ExprKind::Binary { lhs, rhs, .. } = &v.kind else {
            panic!("expected top-level +");
        };
        assert!(matches!(lhs.kind, ExprKind::Int(1)));
        assert!(matches!(rhs.kind, ExprKind::Binary { .. }));
    });
}

#[test]
fn power_is_right_associative_and_tighter_than_unary() {
    parse_with("def f() -> int32:\n    return -2 ** 2\n", |m| {
        let Item::Function(f) = &m.items[0] else { panic!() };
        let Stmt::Return { value: Some(v), .. } = &f.body[0] else {
            panic!()
        };
        // -(2 ** 2)
        assert!(matches!(v.kind, ExprKind::Unary { .. }));
    });
}

#[test]
fn postfix_chain_attr_call_index_slice() {
    let src = "def f() -> int32:\n    x = obj.field\n    y = table[3]\n    z = s[1:4]\n    w = s[::2]\n    callee(1, 2)\n    return 0\n";
    parse_with(src, |m| {
        let Item::Function(f) = &m.items[0] else { panic!() };
        assert_eq!(f.body.len(), 6);
    });
}

#[test]
fn cast_and_sizeof_are_syntactic_forms() {
    parse_with(
        "def f() -> int32:\n    p: Ptr[uint32] = cast[Ptr[uint32]](1073741824)\n    return sizeof(uint32)\n",
        |m| {
            let Item::Function(f) = &m.items[0] else { panic!() };
            let Stmt::Assign { value, .. } = &f.body[0] else { panic!() };
            assert!(matches!(value.kind, ExprKind::Cast { .. }));
            let Stmt::Return { value: Some(v), .. } = &f.body[1] else {
                panic!()
            };
            assert!(matches!(v.kind, ExprKind::Sizeof(_)));
        },
    );
}

#[test]
fn fstring_bodies_reparse_into_parts() {
    parse_with(
        "def f(x: int32) -> int32:\n    f\"x={x} done\"\n    return 0\n",
        |m| {
            let Item::Function(f) = &m.items[0] else { panic!() };
            let Stmt::Expr(e) = &f.body[0] else { panic!() };
            let ExprKind::FString(parts) = &e.kind else {
                panic!("expected f-string");
            };
            assert_eq!(parts.len(), 3); // "x=", {x}, " done"
        },
    );
}

#[test]
fn struct_literal_requires_keyword_fields() {
    let mut interner = Interner::new();
    let ctx = AstContext::new();
    let tokens = Lexer::new(
        "def f() -> int32:\n    p: Point = Point{x=1, y=2}\n    return 0\n",
        &mut interner,
    )
    .tokenize()
    .unwrap();
    let module = Parser::new(&tokens, &ctx, &mut interner).parse_module().unwrap();
    let Item::Function(f) = &module.items[0] else { panic!() };
    let Stmt::Assign { value, .. } = &f.body[0] else { panic!() };
    assert!(matches!(value.kind, ExprKind::StructLit { .. }));
}

#[test]
fn with_match_try_parse_to_their_nodes() {
    let src = "def f(x: int32) -> int32:\n    with lock() as held:\n        pass\n    match x:\n        case 1:\n            pass\n        case _:\n            pass\n    try:\n        pass\n    except:\n        pass\n    finally:\n        pass\n    return 0\n";
    parse_with(src, |m| {
        let Item::Function(f) = &m.items[0] else { panic!() };
        assert!(matches!(f.body[0], Stmt::With { name: Some(_), .. }));
        assert!(matches!(f.body[1], Stmt::Match { .. }));
        assert!(matches!(
            f.body[2],
            Stmt::Try {
                finally: Some(_),
                ..
            }
        ));
    });
}

#[test]
fn comprehension_parses_with_filter() {
    parse_with(
        "def f() -> int32:\n    evens: List[int32] = [i * 2 for i in range(10) if i > 3]\n    return 0\n",
        |m| {
            let Item::Function(f) = &m.items[0] else { panic!() };
            let Stmt::Assign { value, .. } = &f.body[0] else { panic!() };
            assert!(matches!(
                value.kind,
                ExprKind::Comp { filter: Some(_), .. }
            ));
        },
    );
}

#[test]
fn decorators_attach_to_the_next_declaration() {
    parse_with(
        "@interrupt\ndef systick_handler():\n    pass\n",
        |m| {
            let Item::Function(f) = &m.items[0] else { panic!() };
            assert_eq!(f.decorators.len(), 1);
        },
    );
}

#[test]
fn parse_error_reports_expected_and_found() {
    let mut interner = Interner::new();
    let ctx = AstContext::new();
    let tokens = Lexer::new("def f() -> int32\n    return 0\n", &mut interner)
        .tokenize()
        .unwrap();
    let err = Parser::new(&tokens, &ctx, &mut interner)
        .parse_module()
        .unwrap_err();
    assert_eq!(err.stage, pynux_base::Stage::Parse);
    assert!(err.message.contains("expected"));
}
