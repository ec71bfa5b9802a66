//! Source location tracking.
//!
//! # Design
//!
//! - `Span` — byte range in the main file's buffer
//! - `SourceLocation` — a spelling offset plus the expansion offset it ended up at
//! - `LineIndex` — line/column lookup for diagnostics
//!
//! # Examples
//!
//! ```
//! # use hipify_ast::foundation::span::*;
//! let index = LineIndex::new("int a;\nint b;");
//! assert_eq!(index.line_col(7), (2, 1));
//!
//! let span = Span::new(4, 5);
//! assert_eq!(span.len(), 1);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Byte range in the main source buffer (end exclusive).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Span {
    /// Byte offset of start position
    pub start: u32,
    /// Byte offset of end position (exclusive)
    pub end: u32,
}

impl Span {
    /// Create a new span.
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }

    /// Create a zero-length span at `offset`.
    pub fn empty(offset: u32) -> Self {
        Self::new(offset, offset)
    }

    /// Check if this span is zero-length.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Get the length of this span in bytes.
    ///
    /// # Panics
    /// Panics if end < start (malformed span).
    pub fn len(&self) -> u32 {
        assert!(
            self.end >= self.start,
            "malformed span: end ({}) < start ({})",
            self.end,
            self.start
        );
        self.end - self.start
    }

    /// Merge two spans (returns span covering both).
    pub fn merge(&self, other: &Span) -> Span {
        Span {
            start: self.start.min(other.start),
            end: self.end.max(other.end),
        }
    }

    /// True when `other` lies entirely inside this span.
    pub fn contains(&self, other: &Span) -> bool {
        self.start <= other.start && other.end <= self.end
    }

    /// Byte range for slicing the source buffer.
    pub fn range(&self) -> Range<usize> {
        self.start as usize..self.end as usize
    }

    /// Source text covered by this span.
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.range()]
    }
}

impl From<Range<usize>> for Span {
    fn from(range: Range<usize>) -> Self {
        Span::new(range.start as u32, range.end as u32)
    }
}

/// Location of a construct in terms of where it was written and where it was
/// expanded.
///
/// The reference front end does not substitute macros, so for ordinary code
/// both offsets coincide. For a construct written as an actual argument of a
/// macro invocation, `spelling` is where the tokens were written and
/// `expansion` is the offset of the invocation's macro name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    spelling: u32,
    expansion: u32,
    macro_arg: bool,
}

impl SourceLocation {
    /// Location of a construct written directly in the file.
    pub fn file(offset: u32) -> Self {
        Self {
            spelling: offset,
            expansion: offset,
            macro_arg: false,
        }
    }

    /// Location of a construct spelled inside a macro argument.
    pub fn macro_arg(spelling: u32, expansion: u32) -> Self {
        Self {
            spelling,
            expansion,
            macro_arg: true,
        }
    }

    /// True when the construct came from a macro argument expansion.
    pub fn is_macro_arg_expansion(&self) -> bool {
        self.macro_arg
    }

    /// Offset where the construct's first token was written.
    pub fn spelling(&self) -> u32 {
        self.spelling
    }

    /// Offset the construct was expanded at.
    pub fn expansion(&self) -> u32 {
        self.expansion
    }
}

/// Line start index for one buffer.
#[derive(Debug, Clone)]
pub struct LineIndex {
    /// Byte offsets of each line start; `line_starts[0]` is always 0.
    line_starts: Vec<u32>,
    len: u32,
}

impl LineIndex {
    /// Index the line starts of `source`.
    pub fn new(source: &str) -> Self {
        let mut line_starts = vec![0];
        for (i, byte) in source.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push((i + 1) as u32);
            }
        }
        Self {
            line_starts,
            len: source.len() as u32,
        }
    }

    /// Get (line, column) for a byte offset.
    ///
    /// Both line and column are 1-based. Offsets past the end clamp to the end.
    pub fn line_col(&self, offset: u32) -> (u32, u32) {
        let offset = offset.min(self.len);

        // Binary search to find the line
        let line_idx = match self.line_starts.binary_search(&offset) {
            Ok(idx) => idx,             // Exact match (start of line)
            Err(idx) => idx.max(1) - 1, // Falls within line idx-1
        };

        let line = (line_idx + 1) as u32;
        let col = (offset - self.line_starts[line_idx]) + 1;

        (line, col)
    }

    /// Number of lines in the buffer.
    pub fn line_count(&self) -> usize {
        self.line_starts.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_span_contains_and_merge() {
        let outer = Span::new(10, 40);
        assert!(outer.contains(&Span::new(10, 12)));
        assert!(outer.contains(&Span::empty(40)));
        assert!(!outer.contains(&Span::new(39, 41)));
        assert_eq!(outer.merge(&Span::new(5, 12)), Span::new(5, 40));
    }

    #[test]
    fn test_span_text() {
        let source = "hipMalloc(&p, n);";
        assert_eq!(Span::new(0, 9).text(source), "hipMalloc");
    }

    #[test]
    fn test_macro_arg_location() {
        let file = SourceLocation::file(12);
        assert!(!file.is_macro_arg_expansion());
        assert_eq!(file.spelling(), file.expansion());

        let arg = SourceLocation::macro_arg(18, 12);
        assert!(arg.is_macro_arg_expansion());
        assert_eq!(arg.spelling(), 18);
        assert_eq!(arg.expansion(), 12);
    }

    #[test]
    fn test_line_col() {
        let index = LineIndex::new("a\nbc\n\nd");
        assert_eq!(index.line_col(0), (1, 1));
        assert_eq!(index.line_col(3), (2, 2));
        assert_eq!(index.line_col(5), (3, 1));
        assert_eq!(index.line_col(6), (4, 1));
        assert_eq!(index.line_col(100), (4, 2));
        assert_eq!(index.line_count(), 4);
    }
}
