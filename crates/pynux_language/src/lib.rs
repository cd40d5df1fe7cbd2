//! # pynux-language
//!
//! The Pynux surface language: a statically-typed systems language with
//! Python syntax, compiled ahead-of-time for bare-metal Cortex-M targets.
//!
//! This crate covers the front half of the pipeline:
//!
//! ```text
//! source text ──Lexer──▶ tokens ──Parser──▶ Module (AST)
//! ```
//!
//! - [`token`]: the closed token vocabulary, including the synthetic
//!   `Indent`/`Dedent` layout tokens
//! - [`lexer`]: the indentation-aware lexer
//! - [`ast`]: arena-allocated expression nodes, owned statements, surface
//!   type syntax
//! - [`parser`]: recursive descent over the layout-resolved token stream
//! - [`arena_ctx`]: the per-translation-unit arena bundle
//!
//! Semantic analysis and ARM Thumb-2 code generation live in
//! `pynux-compile`; this crate has no knowledge of the target machine.
//!
//! # Example
//!
//! ```
//! use pynux_base::Interner;
//! use pynux_language::{AstContext, Lexer, Parser};
//!
//! let mut interner = Interner::new();
//! let ctx = AstContext::new();
//! let tokens = Lexer::new("def main() -> int32:\n    return 0\n", &mut interner)
//!     .tokenize()
//!     .unwrap();
//! let module = Parser::new(&tokens, &ctx, &mut interner).parse_module().unwrap();
//! assert_eq!(module.items.len(), 1);
//! ```

pub mod arena_ctx;
pub mod ast;
pub mod lexer;
pub mod parser;
pub mod token;

pub use arena_ctx::AstContext;
pub use lexer::Lexer;
pub use parser::Parser;
pub use token::{Token, TokenKind};
