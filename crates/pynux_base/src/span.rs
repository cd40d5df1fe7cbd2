//! Source location tracking.
//!
//! A [`Span`] is a byte-offset range into the source text; every token, AST
//! node, and diagnostic carries one. `&source[span.start..span.end]` extracts
//! the spanned text. Diagnostics are rendered as `file:line:col`, so a
//! [`LineMap`] converts byte offsets to 1-based line/column pairs without
//! rescanning the file per error.

/// A byte-offset range in source text. `Copy` and cheap to pass around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Span {
    /// Byte offset of the first character (inclusive).
    pub start: usize,
    /// Byte offset past the last character (exclusive).
    pub end: usize,
}

impl Span {
    /// Creates a span from byte offsets. No validation is performed.
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    /// A zero-width span at a single offset.
    pub fn point(at: usize) -> Self {
        Self { start: at, end: at }
    }

    /// The span of `a <op> b` is `a.span.merge(b.span)`.
    pub fn merge(self, other: Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }
}

/// Byte-offset to line/column conversion, built once per source file.
///
/// Lines and columns are 1-based, matching the `<file>:<line>:<col>`
/// diagnostic format. Columns count bytes, which is exact for the ASCII
/// sources the language accepts and a reasonable approximation elsewhere.
pub struct LineMap {
    /// Byte offset of the start of each line. `line_starts[0] == 0`.
    line_starts: Vec<usize>,
}

impl LineMap {
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, b) in source.bytes().enumerate() {
            if b == b'\n' {
                line_starts.push(i + 1);
            }
        }
        LineMap { line_starts }
    }

    /// Returns the 1-based `(line, column)` of a byte offset.
    ///
    /// Offsets past the end of the source report a position on the last line.
    pub fn locate(&self, offset: usize) -> (usize, usize) {
        let line = match self.line_starts.binary_search(&offset) {
            Ok(exact) => exact,
            Err(next) => next - 1,
        };
        (line + 1, offset - self.line_starts[line] + 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merge_covers_both_ranges() {
        let a = Span::new(4, 9);
        let b = Span::new(7, 20);
        assert_eq!(a.merge(b), Span::new(4, 20));
    }

    #[test]
    fn point_is_empty() {
        assert!(Span::point(12).is_empty());
        assert_eq!(Span::point(12).len(), 0);
    }

    #[test]
    fn locate_first_line() {
        let map = LineMap::new("def main():\n    pass\n");
        assert_eq!(map.locate(0), (1, 1));
        assert_eq!(map.locate(4), (1, 5));
    }

    #[test]
    fn locate_second_line() {
        let map = LineMap::new("def main():\n    pass\n");
        // Offset 12 is the first byte of line 2.
        assert_eq!(map.locate(12), (2, 1));
        assert_eq!(map.locate(16), (2, 5));
    }

    #[test]
    fn locate_offset_at_newline_stays_on_line() {
        let map = LineMap::new("ab\ncd\n");
        assert_eq!(map.locate(2), (1, 3));
        assert_eq!(map.locate(3), (2, 1));
    }

    #[test]
    fn locate_past_end_uses_last_line() {
        let map = LineMap::new("x = 1");
        assert_eq!(map.locate(99), (1, 100));
    }
}
