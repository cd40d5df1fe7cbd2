//! Lexer invariants: round-trip stability, balanced layout tokens, and the
//! boundary behaviors of the literal grammar.

use pynux_base::Interner;
use pynux_language::{Lexer, TokenKind};

fn lex_kinds(src: &str) -> Vec<TokenKind> {
    let mut interner = Interner::new();
    Lexer::new(src, &mut interner)
        .tokenize()
        .expect("lex failure")
        .into_iter()
        .map(|t| t.kind)
        .collect()
}

/// Rebuilds a source string from a token stream: lexeme text recovered
/// through spans, layout recovered from `Newline`/`Indent`/`Dedent`.
fn reconstruct(src: &str) -> String {
    let mut interner = Interner::new();
    let tokens = Lexer::new(src, &mut interner).tokenize().expect("lex failure");
    let mut out = String::new();
    let mut level: usize = 0;
    let mut at_line_start = true;
    for tok in &tokens {
        match tok.kind {
            TokenKind::Newline => {
                out.push('\n');
                at_line_start = true;
            }
            TokenKind::Indent => level += 1,
            TokenKind::Dedent => level = level.saturating_sub(1),
            TokenKind::Eof => break,
            _ => {
                if at_line_start {
                    for _ in 0..level {
                        out.push_str("    ");
                    }
                    at_line_start = false;
                }
                out.push_str(&src[tok.span.start..tok.span.end]);
                out.push(' ');
            }
        }
    }
    out
}

const PROGRAMS: &[&str] = &[
    "def main() -> int32:\n    return 0\n",
    "def add(a: int32, b: int32) -> int32:\n    return a + b\n",
    "def main() -> int32:\n    for i in range(3):\n        print_int(i)\n    return 0\n",
    "c: int32 = 0\ndef main() -> int32:\n    global c\n    c = 7\n    return c\n",
    "def f(x: int32) -> int32:\n    if x > 0:\n        return 1\n    elif x < 0:\n        return -1\n    else:\n        return 0\n",
    "def g() -> int32:\n    x: int32 = 0x2A\n    y: int32 = 0b101010\n    z: int32 = 0o52\n    return x + y + z\n",
];

#[test]
fn reconstructed_source_lexes_to_the_same_stream() {
    for program in PROGRAMS {
        let original = lex_kinds(program);
        let rebuilt = reconstruct(program);
        let again = lex_kinds(&rebuilt);
        assert_eq!(original, again, "round-trip diverged for:\n{}", program);
    }
}

#[test]
fn indents_and_dedents_balance_at_every_prefix() {
    for program in PROGRAMS {
        let kinds = lex_kinds(program);
        let mut depth: i64 = 0;
        for kind in &kinds {
            match kind {
                TokenKind::Indent => depth += 1,
                TokenKind::Dedent => {
                    depth -= 1;
                    assert!(depth >= 0, "dedent below zero in:\n{}", program);
                }
                _ => {}
            }
        }
        assert_eq!(depth, 0, "unbalanced layout in:\n{}", program);
    }
}

#[test]
fn sixty_four_nesting_levels_lex() {
    let mut src = String::new();
    for depth in 0..64 {
        src.push_str(&"    ".repeat(depth));
        src.push_str("if x:\n");
    }
    src.push_str(&"    ".repeat(64));
    src.push_str("pass\n");
    let kinds = lex_kinds(&src);
    let indents = kinds.iter().filter(|k| **k == TokenKind::Indent).count();
    let dedents = kinds.iter().filter(|k| **k == TokenKind::Dedent).count();
    assert_eq!(indents, 64);
    assert_eq!(dedents, 64);
}

#[test]
fn int32_minimum_survives_lexing() {
    let kinds = lex_kinds("x: int32 = -2147483648\n");
    assert!(kinds.contains(&TokenKind::Minus));
    assert!(kinds.contains(&TokenKind::Int(2147483648)));
}

#[test]
fn every_escape_sequence_decodes() {
    let mut interner = Interner::new();
    let tokens = Lexer::new(
        r#"s: str = "\n\r\t\\\"\'\0\x7f""#,
        &mut interner,
    )
    .tokenize()
    .unwrap();
    let sym = tokens
        .iter()
        .find_map(|t| match t.kind {
            TokenKind::Str(s) => Some(s),
            _ => None,
        })
        .expect("no string token");
    assert_eq!(interner.resolve(sym), "\n\r\t\\\"'\0\x7f");
}

#[test]
fn lexing_twice_is_identical() {
    for program in PROGRAMS {
        assert_eq!(lex_kinds(program), lex_kinds(program));
    }
}
