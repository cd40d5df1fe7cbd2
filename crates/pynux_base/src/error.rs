//! Stage-tagged diagnostics with source positions.
//!
//! Every pipeline stage produces exactly one kind of error: the lexer emits
//! `lex` diagnostics, the parser `parse`, the checker `type`, and the code
//! generator `emit` (the last marking an internal invariant violation rather
//! than a user mistake). A stage returns its output or the first diagnostic
//! it encountered; there is no recovery within a file.
//!
//! The driver renders diagnostics as `<file>:<line>:<col>: <stage>: <message>`
//! using a [`LineMap`](crate::LineMap); this crate only stores the byte span.

use crate::span::Span;
use std::fmt;

/// Which pipeline stage produced a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Tokenization: bad characters, unterminated strings, indentation faults.
    Lex,
    /// Syntax: unexpected token, missing `:`/`)`/block.
    Parse,
    /// Semantics: unknown names, type mismatches, bad arity.
    Type,
    /// Internal invariant violation in the code generator. A bug, not a
    /// user error.
    Emit,
}

impl Stage {
    /// The lowercase tag used in rendered diagnostics.
    pub fn tag(self) -> &'static str {
        match self {
            Stage::Lex => "lex",
            Stage::Parse => "parse",
            Stage::Type => "type",
            Stage::Emit => "emit",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// An error annotated with its producing stage and source location.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub stage: Stage,
    pub message: String,
    pub span: Span,
}

impl Diagnostic {
    pub fn new(stage: Stage, message: impl Into<String>, span: Span) -> Self {
        Self {
            stage,
            message: message.into(),
            span,
        }
    }

    /// Shorthand for a lexer diagnostic.
    pub fn lex(message: impl Into<String>, span: Span) -> Self {
        Self::new(Stage::Lex, message, span)
    }

    /// Shorthand for a parser diagnostic.
    pub fn parse(message: impl Into<String>, span: Span) -> Self {
        Self::new(Stage::Parse, message, span)
    }

    /// Shorthand for a type-checker diagnostic.
    pub fn ty(message: impl Into<String>, span: Span) -> Self {
        Self::new(Stage::Type, message, span)
    }

    /// Shorthand for a code-generator diagnostic.
    pub fn emit(message: impl Into<String>, span: Span) -> Self {
        Self::new(Stage::Emit, message, span)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.stage, self.message)
    }
}

impl std::error::Error for Diagnostic {}

/// Alias for `std::result::Result<T, Diagnostic>`, the return type of every
/// fallible compiler operation.
pub type Result<T> = std::result::Result<T, Diagnostic>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_stage_tag() {
        let d = Diagnostic::lex("unterminated string literal", Span::new(5, 9));
        assert_eq!(d.to_string(), "lex: unterminated string literal");
    }

    #[test]
    fn shorthands_set_stage() {
        assert_eq!(Diagnostic::parse("x", Span::default()).stage, Stage::Parse);
        assert_eq!(Diagnostic::ty("x", Span::default()).stage, Stage::Type);
        assert_eq!(Diagnostic::emit("x", Span::default()).stage, Stage::Emit);
    }

    #[test]
    fn stage_tags_are_lowercase() {
        assert_eq!(Stage::Lex.tag(), "lex");
        assert_eq!(Stage::Parse.tag(), "parse");
        assert_eq!(Stage::Type.tag(), "type");
        assert_eq!(Stage::Emit.tag(), "emit");
    }
}
