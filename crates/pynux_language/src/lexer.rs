//! Indentation-aware lexer for Pynux source text.
//!
//! The lexer turns UTF-8 source into a flat token stream ending in
//! [`TokenKind::Eof`]. Layout is resolved here and nowhere else: the parser
//! sees explicit [`Indent`](TokenKind::Indent)/[`Dedent`](TokenKind::Dedent)
//! tokens and treats them like ordinary punctuation.
//!
//! ## Indentation rule
//!
//! The column of the first non-whitespace character on a logical line defines
//! its indent level. A level greater than the top of the indent stack pushes
//! and emits one `Indent`; a smaller level pops and emits one `Dedent` per
//! popped frame and must land exactly on a remembered level. Blank lines and
//! comment-only lines are invisible to layout. Inside unbalanced `(` `[` `{`
//! pairs, newlines and indentation are suppressed entirely.
//!
//! Tabs advance to the next multiple of eight columns. A file must indent
//! with spaces or with tabs, not both; the first indented line fixes the
//! style and any later conflict is a `lex` error.
//!
//! ## Literals
//!
//! Integers accept decimal, `0x`, `0b`, and `0o` forms and arrive
//! radix-decoded. Floats need a `.` and/or an exponent. Strings accept both
//! quote styles plus the triple-quoted form (used by multi-line `asm`
//! blocks), with escapes `\n \r \t \\ \" \' \0 \xNN` processed during
//! lexing. An `f"…"`/`f'…'` literal becomes a single [`TokenKind::FStr`]
//! whose payload is the raw inner text; `{expr}` regions are re-parsed
//! later by the parser.

use crate::token::{Token, TokenKind};
use pynux_base::{Diagnostic, Interner, Result, Span};

/// Converts source text into tokens.
///
/// The lexer is not restartable: construct one per source file, call
/// [`tokenize`](Lexer::tokenize) once, and drop it.
pub struct Lexer<'src, 'i> {
    source: &'src str,
    bytes: &'src [u8],
    pos: usize,
    line: u32,
    col: u32,
    interner: &'i mut Interner,
    indent_stack: Vec<usize>,
    bracket_depth: usize,
    /// `b' '` or `b'\t'`, fixed by the first indented line.
    indent_style: Option<u8>,
    tokens: Vec<Token>,
}

impl<'src, 'i> Lexer<'src, 'i> {
    pub fn new(source: &'src str, interner: &'i mut Interner) -> Self {
        Lexer {
            source,
            bytes: source.as_bytes(),
            pos: 0,
            line: 1,
            col: 1,
            interner,
            indent_stack: vec![0],
            bracket_depth: 0,
            indent_style: None,
            tokens: Vec::new(),
        }
    }

    /// Runs the lexer to completion, producing a balanced token stream.
    pub fn tokenize(mut self) -> Result<Vec<Token>> {
        while self.pos < self.bytes.len() {
            if self.bracket_depth == 0 {
                if !self.start_of_line()? {
                    continue;
                }
            }
            self.lex_logical_line()?;
        }

        // Close any blocks still open at end of input.
        while self.indent_stack.len() > 1 {
            self.indent_stack.pop();
            self.push_token(TokenKind::Dedent, Span::point(self.pos));
        }
        self.push_token(TokenKind::Eof, Span::point(self.pos));
        Ok(self.tokens)
    }

    // ── Layout ──────────────────────────────────────────────────────────

    /// Handles indentation at the start of a physical line.
    ///
    /// Returns `false` when the line was blank or comment-only (the caller
    /// should re-test for EOF and try the next line).
    fn start_of_line(&mut self) -> Result<bool> {
        let indent_start = self.pos;
        let mut level = 0usize;
        let mut seen_space = false;
        let mut seen_tab = false;

        while let Some(&b) = self.bytes.get(self.pos) {
            match b {
                b' ' => {
                    level += 1;
                    seen_space = true;
                    self.advance();
                }
                b'\t' => {
                    level = (level / 8 + 1) * 8;
                    seen_tab = true;
                    self.advance();
                }
                _ => break,
            }
        }

        // Blank or comment-only lines do not affect layout.
        match self.bytes.get(self.pos) {
            None => return Ok(false),
            Some(b'\n') => {
                self.advance();
                return Ok(false);
            }
            Some(b'\r') if self.bytes.get(self.pos + 1) == Some(&b'\n') => {
                self.advance();
                self.advance();
                return Ok(false);
            }
            Some(b'#') => {
                self.skip_comment();
                if self.bytes.get(self.pos).is_some() {
                    self.consume_newline();
                }
                return Ok(false);
            }
            _ => {}
        }

        if level > 0 {
            if seen_space && seen_tab {
                return Err(self.err_here("inconsistent use of tabs and spaces in indentation"));
            }
            let style = if seen_tab { b'\t' } else { b' ' };
            match self.indent_style {
                None => self.indent_style = Some(style),
                Some(fixed) if fixed != style => {
                    return Err(self.err_here("inconsistent use of tabs and spaces in indentation"));
                }
                _ => {}
            }
        }

        let current = *self.indent_stack.last().unwrap_or(&0);
        if level > current {
            self.indent_stack.push(level);
            self.push_token(TokenKind::Indent, Span::new(indent_start, self.pos));
        } else if level < current {
            while *self.indent_stack.last().unwrap_or(&0) > level {
                self.indent_stack.pop();
                self.push_token(TokenKind::Dedent, Span::new(indent_start, self.pos));
            }
            if *self.indent_stack.last().unwrap_or(&0) != level {
                return Err(self.err_here("unindent does not match any outer indentation level"));
            }
        }
        Ok(true)
    }

    /// Lexes tokens until the end of the logical line (or EOF).
    fn lex_logical_line(&mut self) -> Result<()> {
        let mut line_had_tokens = false;
        loop {
            while matches!(self.bytes.get(self.pos), Some(b' ') | Some(b'\t')) {
                self.advance();
            }
            let Some(&b) = self.bytes.get(self.pos) else {
                if line_had_tokens && self.bracket_depth == 0 {
                    self.push_token(TokenKind::Newline, Span::point(self.pos));
                }
                return Ok(());
            };
            match b {
                b'#' => {
                    self.skip_comment();
                }
                b'\r' if self.bytes.get(self.pos + 1) == Some(&b'\n') => {
                    self.advance();
                    self.advance();
                    if self.bracket_depth == 0 {
                        if line_had_tokens {
                            self.push_token(TokenKind::Newline, Span::point(self.pos));
                        }
                        return Ok(());
                    }
                }
                b'\n' => {
                    self.advance();
                    if self.bracket_depth == 0 {
                        if line_had_tokens {
                            self.push_token(TokenKind::Newline, Span::point(self.pos));
                        }
                        return Ok(());
                    }
                }
                _ => {
                    self.lex_token()?;
                    line_had_tokens = true;
                }
            }
        }
    }

    // ── Single tokens ───────────────────────────────────────────────────

    fn lex_token(&mut self) -> Result<()> {
        let b = self.bytes[self.pos];
        match b {
            b'"' | b'\'' => self.lex_string(b, false),
            b'f' | b'F' if matches!(self.bytes.get(self.pos + 1), Some(b'"') | Some(b'\'')) => {
                self.advance();
                let quote = self.bytes[self.pos];
                self.lex_string(quote, true)
            }
            b'a'..=b'z' | b'A'..=b'Z' | b'_' => self.lex_word(),
            b'0'..=b'9' => self.lex_number(),
            _ => self.lex_operator(),
        }
    }

    fn lex_word(&mut self) -> Result<()> {
        let start = self.pos;
        let (line, col) = (self.line, self.col);
        while matches!(
            self.bytes.get(self.pos),
            Some(b'a'..=b'z') | Some(b'A'..=b'Z') | Some(b'0'..=b'9') | Some(b'_')
        ) {
            self.advance();
        }
        let word = &self.source[start..self.pos];
        let kind = match TokenKind::keyword(word) {
            Some(kw) => kw,
            None => TokenKind::Ident(self.interner.intern(word)),
        };
        self.tokens.push(Token::new(kind, Span::new(start, self.pos), line, col));
        Ok(())
    }

    fn lex_number(&mut self) -> Result<()> {
        let start = self.pos;
        let (line, col) = (self.line, self.col);

        if self.bytes[self.pos] == b'0' {
            let radix = match self.bytes.get(self.pos + 1) {
                Some(b'x') | Some(b'X') => Some(16),
                Some(b'b') | Some(b'B') => Some(2),
                Some(b'o') | Some(b'O') => Some(8),
                _ => None,
            };
            if let Some(radix) = radix {
                self.advance();
                self.advance();
                let digits_start = self.pos;
                while self
                    .bytes
                    .get(self.pos)
                    .is_some_and(|&d| (d as char).is_digit(radix))
                {
                    self.advance();
                }
                if self.pos == digits_start {
                    return Err(self.err_at(start, "missing digits after radix prefix"));
                }
                let value = i64::from_str_radix(&self.source[digits_start..self.pos], radix)
                    .map_err(|_| self.err_at(start, "integer literal too large"))?;
                self.tokens
                    .push(Token::new(TokenKind::Int(value), Span::new(start, self.pos), line, col));
                return Ok(());
            }
        }

        while self.bytes.get(self.pos).is_some_and(|d| d.is_ascii_digit()) {
            self.advance();
        }
        let mut is_float = false;
        if self.bytes.get(self.pos) == Some(&b'.')
            && self.bytes.get(self.pos + 1).is_some_and(|d| d.is_ascii_digit())
        {
            is_float = true;
            self.advance();
            while self.bytes.get(self.pos).is_some_and(|d| d.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.bytes.get(self.pos), Some(b'e') | Some(b'E')) {
            let mut look = self.pos + 1;
            if matches!(self.bytes.get(look), Some(b'+') | Some(b'-')) {
                look += 1;
            }
            if self.bytes.get(look).is_some_and(|d| d.is_ascii_digit()) {
                is_float = true;
                self.pos_to(look);
                while self.bytes.get(self.pos).is_some_and(|d| d.is_ascii_digit()) {
                    self.advance();
                }
            }
        }

        let text = &self.source[start..self.pos];
        let kind = if is_float {
            let value: f64 = text
                .parse()
                .map_err(|_| self.err_at(start, "malformed float literal"))?;
            TokenKind::Float(value)
        } else {
            let value: i64 = text
                .parse()
                .map_err(|_| self.err_at(start, "integer literal too large"))?;
            TokenKind::Int(value)
        };
        self.tokens.push(Token::new(kind, Span::new(start, self.pos), line, col));
        Ok(())
    }

    fn lex_string(&mut self, quote: u8, is_fstring: bool) -> Result<()> {
        let start = self.pos;
        let (line, col) = (self.line, self.col);
        self.advance(); // opening quote

        let triple = self.bytes.get(self.pos) == Some(&quote)
            && self.bytes.get(self.pos + 1) == Some(&quote);
        if triple {
            self.advance();
            self.advance();
        }

        if is_fstring {
            // Raw body: skip escaped characters so \" does not terminate,
            // but leave decoding to the parser's fragment scanner.
            let body_start = self.pos;
            loop {
                match self.bytes.get(self.pos) {
                    None => return Err(self.err_at(start, "unterminated f-string literal")),
                    Some(b'\\') => {
                        self.advance();
                        if self.bytes.get(self.pos).is_none() {
                            return Err(self.err_at(start, "unterminated f-string literal"));
                        }
                        self.advance();
                    }
                    Some(b'\n') if !triple => {
                        return Err(self.err_at(start, "unterminated f-string literal"));
                    }
                    Some(&b) if b == quote => {
                        if !triple {
                            break;
                        }
                        if self.bytes.get(self.pos + 1) == Some(&quote)
                            && self.bytes.get(self.pos + 2) == Some(&quote)
                        {
                            break;
                        }
                        self.advance();
                    }
                    Some(_) => self.advance(),
                }
            }
            let raw = self.source[body_start..self.pos].to_string();
            self.advance();
            if triple {
                self.advance();
                self.advance();
            }
            let sym = self.interner.intern(&raw);
            self.tokens
                .push(Token::new(TokenKind::FStr(sym), Span::new(start, self.pos), line, col));
            return Ok(());
        }

        let mut value = String::new();
        loop {
            match self.bytes.get(self.pos) {
                None => return Err(self.err_at(start, "unterminated string literal")),
                Some(b'\n') if !triple => {
                    return Err(self.err_at(start, "unterminated string literal"));
                }
                Some(b'\\') => {
                    self.advance();
                    let esc = self
                        .bytes
                        .get(self.pos)
                        .copied()
                        .ok_or_else(|| self.err_at(start, "unterminated string literal"))?;
                    self.advance();
                    match esc {
                        b'n' => value.push('\n'),
                        b'r' => value.push('\r'),
                        b't' => value.push('\t'),
                        b'\\' => value.push('\\'),
                        b'"' => value.push('"'),
                        b'\'' => value.push('\''),
                        b'0' => value.push('\0'),
                        b'x' => {
                            let hi = self.hex_digit()?;
                            let lo = self.hex_digit()?;
                            value.push((hi * 16 + lo) as char);
                        }
                        other => {
                            return Err(self.err_here(format!(
                                "unknown escape sequence '\\{}'",
                                other as char
                            )));
                        }
                    }
                }
                Some(&b) if b == quote => {
                    if !triple {
                        self.advance();
                        break;
                    }
                    if self.bytes.get(self.pos + 1) == Some(&quote)
                        && self.bytes.get(self.pos + 2) == Some(&quote)
                    {
                        self.advance();
                        self.advance();
                        self.advance();
                        break;
                    }
                    value.push(b as char);
                    self.advance();
                }
                Some(&b) => {
                    // Multi-byte UTF-8 passes through unchanged.
                    let ch_len = utf8_len(b);
                    value.push_str(&self.source[self.pos..self.pos + ch_len]);
                    for _ in 0..ch_len {
                        self.advance();
                    }
                }
            }
        }

        let sym = self.interner.intern(&value);
        self.tokens
            .push(Token::new(TokenKind::Str(sym), Span::new(start, self.pos), line, col));
        Ok(())
    }

    fn hex_digit(&mut self) -> Result<u8> {
        let b = self
            .bytes
            .get(self.pos)
            .copied()
            .ok_or_else(|| self.err_here("truncated \\x escape"))?;
        let v = (b as char)
            .to_digit(16)
            .ok_or_else(|| self.err_here("invalid hex digit in \\x escape"))?;
        self.advance();
        Ok(v as u8)
    }

    fn lex_operator(&mut self) -> Result<()> {
        let start = self.pos;
        let (line, col) = (self.line, self.col);
        let b = self.bytes[self.pos];
        let b1 = self.bytes.get(self.pos + 1).copied();
        let b2 = self.bytes.get(self.pos + 2).copied();

        let (kind, len) = match (b, b1, b2) {
            (b'/', Some(b'/'), Some(b'=')) => (TokenKind::SlashSlashEq, 3),
            (b'<', Some(b'<'), Some(b'=')) => (TokenKind::ShlEq, 3),
            (b'>', Some(b'>'), Some(b'=')) => (TokenKind::ShrEq, 3),
            (b'/', Some(b'/'), _) => (TokenKind::SlashSlash, 2),
            (b'*', Some(b'*'), _) => (TokenKind::StarStar, 2),
            (b'=', Some(b'='), _) => (TokenKind::EqEq, 2),
            (b'!', Some(b'='), _) => (TokenKind::NotEq, 2),
            (b'<', Some(b'='), _) => (TokenKind::LtEq, 2),
            (b'>', Some(b'='), _) => (TokenKind::GtEq, 2),
            (b'<', Some(b'<'), _) => (TokenKind::Shl, 2),
            (b'>', Some(b'>'), _) => (TokenKind::Shr, 2),
            (b'+', Some(b'='), _) => (TokenKind::PlusEq, 2),
            (b'-', Some(b'='), _) => (TokenKind::MinusEq, 2),
            (b'*', Some(b'='), _) => (TokenKind::StarEq, 2),
            (b'/', Some(b'='), _) => (TokenKind::SlashEq, 2),
            (b'%', Some(b'='), _) => (TokenKind::PercentEq, 2),
            (b'&', Some(b'='), _) => (TokenKind::AmpEq, 2),
            (b'|', Some(b'='), _) => (TokenKind::PipeEq, 2),
            (b'^', Some(b'='), _) => (TokenKind::CaretEq, 2),
            (b'-', Some(b'>'), _) => (TokenKind::Arrow, 2),
            (b'+', _, _) => (TokenKind::Plus, 1),
            (b'-', _, _) => (TokenKind::Minus, 1),
            (b'*', _, _) => (TokenKind::Star, 1),
            (b'/', _, _) => (TokenKind::Slash, 1),
            (b'%', _, _) => (TokenKind::Percent, 1),
            (b'=', _, _) => (TokenKind::Assign, 1),
            (b'<', _, _) => (TokenKind::Lt, 1),
            (b'>', _, _) => (TokenKind::Gt, 1),
            (b'&', _, _) => (TokenKind::Amp, 1),
            (b'|', _, _) => (TokenKind::Pipe, 1),
            (b'^', _, _) => (TokenKind::Caret, 1),
            (b'~', _, _) => (TokenKind::Tilde, 1),
            (b':', _, _) => (TokenKind::Colon, 1),
            (b',', _, _) => (TokenKind::Comma, 1),
            (b'.', _, _) => (TokenKind::Dot, 1),
            (b'(', _, _) => (TokenKind::LParen, 1),
            (b')', _, _) => (TokenKind::RParen, 1),
            (b'[', _, _) => (TokenKind::LBracket, 1),
            (b']', _, _) => (TokenKind::RBracket, 1),
            (b'{', _, _) => (TokenKind::LBrace, 1),
            (b'}', _, _) => (TokenKind::RBrace, 1),
            (b'@', _, _) => (TokenKind::At, 1),
            _ => {
                return Err(self.err_here(format!(
                    "unknown character '{}'",
                    self.source[self.pos..].chars().next().unwrap_or('?')
                )));
            }
        };

        match kind {
            TokenKind::LParen | TokenKind::LBracket | TokenKind::LBrace => {
                self.bracket_depth += 1;
            }
            TokenKind::RParen | TokenKind::RBracket | TokenKind::RBrace => {
                self.bracket_depth = self.bracket_depth.saturating_sub(1);
            }
            _ => {}
        }

        for _ in 0..len {
            self.advance();
        }
        self.tokens.push(Token::new(kind, Span::new(start, self.pos), line, col));
        Ok(())
    }

    // ── Cursor helpers ──────────────────────────────────────────────────

    fn advance(&mut self) {
        if let Some(&b) = self.bytes.get(self.pos) {
            self.pos += 1;
            if b == b'\n' {
                self.line += 1;
                self.col = 1;
            } else {
                self.col += 1;
            }
        }
    }

    fn pos_to(&mut self, target: usize) {
        while self.pos < target {
            self.advance();
        }
    }

    fn skip_comment(&mut self) {
        while let Some(&b) = self.bytes.get(self.pos) {
            if b == b'\n' {
                break;
            }
            self.advance();
        }
    }

    fn consume_newline(&mut self) {
        if self.bytes.get(self.pos) == Some(&b'\r') {
            self.advance();
        }
        if self.bytes.get(self.pos) == Some(&b'\n') {
            self.advance();
        }
    }

    fn push_token(&mut self, kind: TokenKind, span: Span) {
        self.tokens.push(Token::new(kind, span, self.line, self.col));
    }

    fn err_here(&self, message: impl Into<String>) -> Diagnostic {
        Diagnostic::lex(message, Span::point(self.pos))
    }

    fn err_at(&self, start: usize, message: impl Into<String>) -> Diagnostic {
        Diagnostic::lex(message, Span::new(start, self.pos.max(start + 1)))
    }
}

/// Decodes the escape sequences of a raw literal body.
///
/// Used by the parser for the literal fragments of f-strings, whose bodies
/// are kept raw at lex time so that `{expr}` regions survive intact. Returns
/// the message of the first bad escape on failure.
pub fn decode_escapes(raw: &str) -> std::result::Result<String, String> {
    let bytes = raw.as_bytes();
    let mut out = String::with_capacity(raw.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'\\' {
            let len = utf8_len(bytes[i]);
            out.push_str(&raw[i..i + len]);
            i += len;
            continue;
        }
        let esc = *bytes
            .get(i + 1)
            .ok_or_else(|| "trailing backslash in literal".to_string())?;
        i += 2;
        match esc {
            b'n' => out.push('\n'),
            b'r' => out.push('\r'),
            b't' => out.push('\t'),
            b'\\' => out.push('\\'),
            b'"' => out.push('"'),
            b'\'' => out.push('\''),
            b'0' => out.push('\0'),
            b'x' => {
                let hex = raw
                    .get(i..i + 2)
                    .ok_or_else(|| "truncated \\x escape".to_string())?;
                let v = u8::from_str_radix(hex, 16)
                    .map_err(|_| "invalid hex digit in \\x escape".to_string())?;
                out.push(v as char);
                i += 2;
            }
            other => {
                return Err(format!("unknown escape sequence '\\{}'", other as char));
            }
        }
    }
    Ok(out)
}

fn utf8_len(first: u8) -> usize {
    match first {
        0x00..=0x7f => 1,
        0xc0..=0xdf => 2,
        0xe0..=0xef => 3,
        _ => 4,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lex(src: &str) -> Vec<TokenKind> {
        let mut interner = Interner::new();
        Lexer::new(src, &mut interner)
            .tokenize()
            .expect("lex failure")
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn lex_err(src: &str) -> Diagnostic {
        let mut interner = Interner::new();
        Lexer::new(src, &mut interner).tokenize().unwrap_err()
    }

    #[test]
    fn empty_source_is_just_eof() {
        assert_eq!(lex(""), vec![TokenKind::Eof]);
    }

    #[test]
    fn comments_and_blank_lines_are_invisible() {
        assert_eq!(lex("# nothing here\n\n   \n# more\n"), vec![TokenKind::Eof]);
    }

    #[test]
    fn keywords_and_identifiers() {
        let toks = lex("def main\n");
        assert_eq!(toks.len(), 4);
        assert_eq!(toks[0], TokenKind::Def);
        assert!(matches!(toks[1], TokenKind::Ident(_)));
        assert_eq!(toks[2], TokenKind::Newline);
    }

    #[test]
    fn indent_dedent_balance() {
        let toks = lex("if x:\n    pass\n");
        assert!(toks.contains(&TokenKind::Indent));
        let indents = toks.iter().filter(|t| **t == TokenKind::Indent).count();
        let dedents = toks.iter().filter(|t| **t == TokenKind::Dedent).count();
        assert_eq!(indents, dedents);
    }

    #[test]
    fn nested_blocks_emit_matched_dedents() {
        let toks = lex("if a:\n    if b:\n        pass\npass\n");
        let indents = toks.iter().filter(|t| **t == TokenKind::Indent).count();
        let dedents = toks.iter().filter(|t| **t == TokenKind::Dedent).count();
        assert_eq!(indents, 2);
        assert_eq!(dedents, 2);
    }

    #[test]
    fn dedents_flush_at_eof() {
        let toks = lex("if a:\n    pass");
        assert_eq!(toks.last(), Some(&TokenKind::Eof));
        assert!(toks.contains(&TokenKind::Dedent));
    }

    #[test]
    fn partial_dedent_must_match() {
        let err = lex_err("if a:\n        pass\n   pass\n");
        assert!(err.message.contains("unindent"));
    }

    #[test]
    fn deep_nesting_succeeds() {
        let mut src = String::new();
        for depth in 0..70 {
            src.push_str(&" ".repeat(depth));
            src.push_str("if x:\n");
        }
        src.push_str(&" ".repeat(70));
        src.push_str("pass\n");
        let toks = lex(&src);
        let indents = toks.iter().filter(|t| **t == TokenKind::Indent).count();
        assert_eq!(indents, 70);
    }

    #[test]
    fn brackets_suppress_layout() {
        let toks = lex("x = (1 +\n     2)\n");
        assert!(!toks.contains(&TokenKind::Indent));
        let newlines = toks.iter().filter(|t| **t == TokenKind::Newline).count();
        assert_eq!(newlines, 1);
    }

    #[test]
    fn radix_literals_decode() {
        assert!(lex("42 0x2A 0b101010 0o52\n")
            .iter()
            .filter(|t| **t == TokenKind::Int(42))
            .count()
            == 4);
    }

    #[test]
    fn int32_boundary_literal() {
        let toks = lex("x = -2147483648\n");
        assert!(toks.contains(&TokenKind::Int(2147483648)));
        assert!(toks.contains(&TokenKind::Minus));
    }

    #[test]
    fn float_requires_dot_or_exponent() {
        assert!(lex("1.5\n").contains(&TokenKind::Float(1.5)));
        assert!(lex("1e3\n").contains(&TokenKind::Float(1000.0)));
        assert!(lex("15\n").contains(&TokenKind::Int(15)));
    }

    #[test]
    fn string_escapes_decode() {
        let mut interner = Interner::new();
        let toks = Lexer::new(r#"s = "a\n\t\x41\0""#, &mut interner).tokenize().unwrap();
        let sym = toks
            .iter()
            .find_map(|t| match t.kind {
                TokenKind::Str(s) => Some(s),
                _ => None,
            })
            .unwrap();
        assert_eq!(interner.resolve(sym), "a\n\tA\0");
    }

    #[test]
    fn identical_literals_intern_to_one_symbol() {
        let mut interner = Interner::new();
        let toks = Lexer::new("a = \"hi\"\nb = \"hi\"\n", &mut interner).tokenize().unwrap();
        let syms: Vec<_> = toks
            .iter()
            .filter_map(|t| match t.kind {
                TokenKind::Str(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(syms.len(), 2);
        assert_eq!(syms[0], syms[1]);
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let err = lex_err("s = \"oops\n");
        assert!(err.message.contains("unterminated"));
    }

    #[test]
    fn unknown_escape_is_an_error() {
        let err = lex_err(r#"s = "\q""#);
        assert!(err.message.contains("escape"));
    }

    #[test]
    fn fstring_keeps_raw_body() {
        let mut interner = Interner::new();
        let toks = Lexer::new("f\"v={x}\"\n", &mut interner).tokenize().unwrap();
        let sym = toks
            .iter()
            .find_map(|t| match t.kind {
                TokenKind::FStr(s) => Some(s),
                _ => None,
            })
            .unwrap();
        assert_eq!(interner.resolve(sym), "v={x}");
    }

    #[test]
    fn triple_quoted_string_spans_lines() {
        let mut interner = Interner::new();
        let toks = Lexer::new("asm(\"\"\"\nmov r0, #1\n\"\"\")\n", &mut interner)
            .tokenize()
            .unwrap();
        let sym = toks
            .iter()
            .find_map(|t| match t.kind {
                TokenKind::Str(s) => Some(s),
                _ => None,
            })
            .unwrap();
        assert_eq!(interner.resolve(sym), "\nmov r0, #1\n");
    }

    #[test]
    fn tab_space_mix_is_an_error() {
        let err = lex_err("if a:\n\tpass\n        pass\n");
        assert!(err.message.contains("tabs and spaces"));
    }

    #[test]
    fn crlf_is_normalized() {
        let toks = lex("x = 1\r\ny = 2\r\n");
        let newlines = toks.iter().filter(|t| **t == TokenKind::Newline).count();
        assert_eq!(newlines, 2);
    }

    #[test]
    fn operators_longest_match() {
        let toks = lex("a <<= b >> c // d ** e\n");
        assert!(toks.contains(&TokenKind::ShlEq));
        assert!(toks.contains(&TokenKind::Shr));
        assert!(toks.contains(&TokenKind::SlashSlash));
        assert!(toks.contains(&TokenKind::StarStar));
    }

    #[test]
    fn unknown_character_reports_position() {
        let err = lex_err("x = $\n");
        assert!(err.message.contains("unknown character"));
        assert_eq!(err.span.start, 4);
    }

    #[test]
    fn token_positions_are_one_based() {
        let mut interner = Interner::new();
        let toks = Lexer::new("x = 1\n", &mut interner).tokenize().unwrap();
        assert_eq!((toks[0].line, toks[0].col), (1, 1));
        assert_eq!((toks[1].line, toks[1].col), (1, 3));
        assert_eq!((toks[2].line, toks[2].col), (1, 5));
    }
}
