//! Source text bookkeeping for one compilation.
//!
//! Tokens come from self-contained buffers (there is no include stack),
//! so a location is just a buffer id plus byte offsets. [`SourceSpan`]
//! keeps plain fields in 8 bytes: a `u16` buffer id, a `u32` start
//! offset, and a `u16` length. A single token never approaches 64 KiB,
//! and merged spans clamp, so nothing needs bit packing.

use serde::Serialize;
use std::num::NonZeroU16;

/// Identifies one buffer owned by a [`SourceManager`].
///
/// The all-ones value is reserved as the builtin sentinel for
/// diagnostics that have no real source position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SourceId(NonZeroU16);

impl SourceId {
    /// Sentinel id carried by placeholder spans.
    pub const BUILTIN: SourceId = SourceId(NonZeroU16::MAX);

    fn from_index(index: usize) -> SourceId {
        let id = u16::try_from(index + 1).expect("source buffer limit exceeded");
        assert!(id != u16::MAX, "source buffer limit exceeded");
        SourceId(NonZeroU16::new(id).expect("source index starts at 1"))
    }

    fn index(self) -> Option<usize> {
        if self == Self::BUILTIN {
            None
        } else {
            Some(self.0.get() as usize - 1)
        }
    }
}

/// A byte range in one buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct SourceSpan {
    source: SourceId,
    start: u32,
    len: u16,
}

impl SourceSpan {
    pub(crate) fn new(source: SourceId, start: u32, len: u32) -> Self {
        SourceSpan {
            source,
            start,
            len: len.min(u16::MAX as u32) as u16,
        }
    }

    /// Placeholder span with no source position.
    pub(crate) fn empty() -> Self {
        SourceSpan {
            source: SourceId::BUILTIN,
            start: 0,
            len: 0,
        }
    }

    pub(crate) fn source_id(&self) -> SourceId {
        self.source
    }

    pub(crate) fn start_offset(&self) -> u32 {
        self.start
    }

    pub(crate) fn end_offset(&self) -> u32 {
        self.start + self.len as u32
    }

    pub(crate) fn is_builtin(&self) -> bool {
        self.source == SourceId::BUILTIN
    }

    /// Smallest span covering both operands. A placeholder never widens
    /// a real span, and when both sides are real but from different
    /// buffers the left side wins.
    pub(crate) fn merge(self, other: SourceSpan) -> SourceSpan {
        if self.is_builtin() {
            return other;
        }
        if other.is_builtin() || other.source != self.source {
            return self;
        }
        let start = self.start.min(other.start);
        let end = self.end_offset().max(other.end_offset());
        SourceSpan::new(self.source, start, end - start)
    }
}

impl Default for SourceSpan {
    fn default() -> Self {
        Self::empty()
    }
}

/// One registered buffer.
struct SourceFile {
    name: String,
    text: String,
    line_starts: Vec<u32>,
}

/// Owns the source text of one compilation.
#[derive(Default)]
pub struct SourceManager {
    files: Vec<SourceFile>,
}

impl SourceManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a buffer under a display name and get its id. Sources
    /// are UTF-8 text; reading files from disk is the driver's job.
    pub fn add_source(&mut self, text: String, name: &str) -> SourceId {
        let mut line_starts = vec![0];
        for (i, byte) in text.bytes().enumerate() {
            if byte == b'\n' {
                line_starts.push(i as u32 + 1);
            }
        }
        let id = SourceId::from_index(self.files.len());
        self.files.push(SourceFile {
            name: name.to_string(),
            text,
            line_starts,
        });
        id
    }

    fn file(&self, id: SourceId) -> Option<&SourceFile> {
        self.files.get(id.index()?)
    }

    /// The full text of a buffer; empty for the builtin id.
    pub(crate) fn source_text(&self, id: SourceId) -> &str {
        self.file(id).map(|f| f.text.as_str()).unwrap_or("")
    }

    /// The name a buffer was registered under.
    pub(crate) fn file_name(&self, id: SourceId) -> &str {
        self.file(id).map(|f| f.name.as_str()).unwrap_or("<builtin>")
    }

    /// The text a span covers (lexeme lookup).
    pub(crate) fn get_source_text(&self, span: SourceSpan) -> &str {
        let text = self.source_text(span.source_id());
        let start = span.start_offset() as usize;
        let end = (span.end_offset() as usize).min(text.len());
        text.get(start..end).unwrap_or("")
    }

    /// 1-based line and column of a span's start.
    pub fn line_col(&self, span: SourceSpan) -> Option<(u32, u32)> {
        let file = self.file(span.source_id())?;
        let offset = span.start_offset();
        // line_starts[0] is always 0, so the insertion point is never 0
        let line = match file.line_starts.binary_search(&offset) {
            Ok(i) => i,
            Err(i) => i - 1,
        };
        Some((line as u32 + 1, offset - file.line_starts[line] + 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_span_is_builtin() {
        let span = SourceSpan::empty();
        assert!(span.is_builtin());
        assert_eq!(span.start_offset(), span.end_offset());
        assert_eq!(SourceSpan::default(), span);
    }

    #[test]
    fn spans_cover_their_text() {
        let mut sm = SourceManager::new();
        let id = sm.add_source("int x;\nint y;\n".to_string(), "<test>");
        let a = SourceSpan::new(id, 0, 3);
        let b = SourceSpan::new(id, 7, 3);
        assert_eq!(sm.get_source_text(a), "int");
        assert_eq!(sm.get_source_text(b), "int");
        assert_eq!(sm.get_source_text(a.merge(b)), "int x;\nint");
        assert_eq!(sm.file_name(id), "<test>");
    }

    #[test]
    fn merge_ignores_placeholders() {
        let mut sm = SourceManager::new();
        let id = sm.add_source("abc".to_string(), "<test>");
        let real = SourceSpan::new(id, 1, 2);
        assert_eq!(real.merge(SourceSpan::empty()), real);
        assert_eq!(SourceSpan::empty().merge(real), real);
    }

    #[test]
    fn merge_across_buffers_keeps_left() {
        let mut sm = SourceManager::new();
        let a = sm.add_source("aa".to_string(), "<a>");
        let b = sm.add_source("bb".to_string(), "<b>");
        let left = SourceSpan::new(a, 0, 2);
        let right = SourceSpan::new(b, 0, 2);
        assert_eq!(left.merge(right), left);
    }

    #[test]
    fn overlong_spans_clamp() {
        let span = SourceSpan::new(SourceId::BUILTIN, 0, 1 << 20);
        assert_eq!(span.end_offset(), u16::MAX as u32);
    }

    #[test]
    fn line_col_lookup() {
        let mut sm = SourceManager::new();
        let id = sm.add_source("int x;\nint y;\n".to_string(), "<test>");
        assert_eq!(sm.line_col(SourceSpan::new(id, 0, 1)), Some((1, 1)));
        assert_eq!(sm.line_col(SourceSpan::new(id, 7, 1)), Some((2, 1)));
        assert_eq!(sm.line_col(SourceSpan::new(id, 11, 1)), Some((2, 5)));
        assert_eq!(sm.line_col(SourceSpan::empty()), None);
    }
}
