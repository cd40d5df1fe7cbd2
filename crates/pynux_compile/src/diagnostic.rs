//! Diagnostic rendering.
//!
//! Diagnostics travel through the pipeline as byte spans; this module turns
//! them into the single-line format the driver prints:
//!
//! ```text
//! <file>:<line>:<col>: <stage>: <message>
//! ```
//!
//! With `--error-format=json` the same fields serialize as one JSON object
//! per line, mirroring the plain format field-for-field so tooling never
//! has to parse the human text.

use pynux_base::{Diagnostic, LineMap};
use serde::Serialize;

/// A diagnostic resolved against its source file, ready to print.
#[derive(Debug, Serialize)]
pub struct RenderedDiagnostic<'a> {
    pub file: &'a str,
    /// 1-based line of the error's start.
    pub line: usize,
    /// 1-based column of the error's start.
    pub col: usize,
    /// `lex`, `parse`, `type`, or `emit`.
    pub stage: &'a str,
    pub message: &'a str,
}

impl<'a> RenderedDiagnostic<'a> {
    /// Resolves a diagnostic's span against the source it came from.
    pub fn new(file: &'a str, source: &str, diag: &'a Diagnostic) -> Self {
        let (line, col) = LineMap::new(source).locate(diag.span.start);
        RenderedDiagnostic {
            file,
            line,
            col,
            stage: diag.stage.tag(),
            message: &diag.message,
        }
    }

    /// The one-line human format.
    pub fn plain(&self) -> String {
        format!(
            "{}:{}:{}: {}: {}",
            self.file, self.line, self.col, self.stage, self.message
        )
    }

    /// The one-line JSON format.
    pub fn json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| self.plain())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pynux_base::Span;

    #[test]
    fn plain_format_matches_contract() {
        let diag = Diagnostic::lex("unterminated string literal", Span::new(16, 17));
        let rendered = RenderedDiagnostic::new("shell.py", "def main() -> i\nxyz", &diag);
        assert_eq!(
            rendered.plain(),
            "shell.py:2:1: lex: unterminated string literal"
        );
    }

    #[test]
    fn json_format_carries_the_same_fields() {
        let diag = Diagnostic::ty("unknown identifier 'x'", Span::new(0, 1));
        let rendered = RenderedDiagnostic::new("a.py", "x", &diag);
        let json = rendered.json();
        assert!(json.contains("\"file\":\"a.py\""));
        assert!(json.contains("\"line\":1"));
        assert!(json.contains("\"col\":1"));
        assert!(json.contains("\"stage\":\"type\""));
        assert!(json.contains("unknown identifier"));
    }
}
