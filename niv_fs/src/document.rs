//! In-memory document text with creation options and a simple undo log.

use std::ops::Range;

/// Creation options chosen from the file size before a document is built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DocumentOptions {
    /// Optimise for very large text.
    pub large_file: bool,
    /// Skip styling (syntax colouring) for this document.
    pub no_styling: bool,
}

impl DocumentOptions {
    pub fn for_size(size: u64, large_file_size: u64, no_style_size: u64) -> Self {
        Self {
            large_file: size > large_file_size,
            no_styling: size > no_style_size,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct UndoStep {
    start: usize,
    removed: String,
    inserted_len: usize,
}

/// Text of one open file.
///
/// Every edit bumps `revision`, so a caller can tell whether the text changed
/// since some earlier point (for example since a save snapshot was taken).
#[derive(Debug, Clone, Default)]
pub struct Document {
    text: String,
    options: DocumentOptions,
    collect_undo: bool,
    undo: Vec<UndoStep>,
    revision: u64,
}

impl Document {
    pub fn new(options: DocumentOptions) -> Self {
        Self::with_capacity(options, 0)
    }

    pub fn with_capacity(options: DocumentOptions, capacity: usize) -> Self {
        Self {
            text: String::with_capacity(capacity),
            options,
            collect_undo: true,
            undo: Vec::new(),
            revision: 0,
        }
    }

    pub fn from_text(text: impl Into<String>, options: DocumentOptions) -> Self {
        Self { text: text.into(), ..Self::with_capacity(options, 0) }
    }

    pub fn options(&self) -> DocumentOptions {
        self.options
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Immutable copy of the whole text.
    pub fn snapshot(&self) -> String {
        self.text.clone()
    }

    pub fn line_count(&self) -> usize {
        self.text.split('\n').count()
    }

    /// Byte offset of the start of zero-based `line`, clamped to the last line.
    pub fn line_start(&self, line: usize) -> usize {
        if line == 0 {
            return 0;
        }
        self.text
            .match_indices('\n')
            .nth(line - 1)
            .map_or_else(|| self.last_line_start(), |(pos, _)| pos + 1)
    }

    fn last_line_start(&self) -> usize {
        self.text.rfind('\n').map_or(0, |pos| pos + 1)
    }

    /// Zero-based line containing byte offset `pos`.
    pub fn line_of(&self, pos: usize) -> usize {
        let pos = self.clamp(pos);
        self.text.as_bytes()[..pos].iter().filter(|&&b| b == b'\n').count()
    }

    /// Clamp `pos` to the text and move it back onto a character boundary.
    pub fn clamp(&self, pos: usize) -> usize {
        let mut pos = pos.min(self.text.len());
        while !self.text.is_char_boundary(pos) {
            pos -= 1;
        }
        pos
    }

    /// Append text while loading. Not recorded for undo and does not count
    /// as an edit.
    pub fn append(&mut self, text: &str) {
        self.text.push_str(text);
    }

    pub fn insert(&mut self, pos: usize, text: &str) {
        let pos = self.clamp(pos);
        self.replace(pos..pos, text);
    }

    pub fn delete(&mut self, range: Range<usize>) {
        self.replace(range, "");
    }

    /// Replace `range` with `text`, recording the change for undo when
    /// collection is on. Out-of-range or mid-character bounds are clamped.
    pub fn replace(&mut self, range: Range<usize>, text: &str) {
        let start = self.clamp(range.start);
        let end = self.clamp(range.end).max(start);
        let removed: String = self.text[start..end].to_string();
        self.text.replace_range(start..end, text);
        if self.collect_undo {
            self.undo.push(UndoStep { start, removed, inserted_len: text.len() });
        }
        self.revision += 1;
    }

    pub fn set_undo_collection(&mut self, collect: bool) {
        self.collect_undo = collect;
    }

    pub fn is_collecting_undo(&self) -> bool {
        self.collect_undo
    }

    pub fn can_undo(&self) -> bool {
        !self.undo.is_empty()
    }

    pub fn clear_undo(&mut self) {
        self.undo.clear();
    }

    /// Revert the most recent recorded change.
    pub fn undo(&mut self) -> bool {
        let Some(step) = self.undo.pop() else {
            return false;
        };
        let end = step.start + step.inserted_len;
        self.text.replace_range(step.start..end, &step.removed);
        self.revision += 1;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_for_size() {
        let small = DocumentOptions::for_size(10, 100, 200);
        assert_eq!(small, DocumentOptions::default());
        let huge = DocumentOptions::for_size(500, 100, 200);
        assert!(huge.large_file && huge.no_styling);
    }

    #[test]
    fn test_append_is_not_an_edit() {
        let mut doc = Document::new(DocumentOptions::default());
        doc.append("loaded");
        assert_eq!(doc.revision(), 0);
        assert!(!doc.can_undo());
    }

    #[test]
    fn test_edit_and_undo() {
        let mut doc = Document::from_text("hello world", DocumentOptions::default());
        doc.replace(6..11, "there");
        doc.insert(0, ">");
        assert_eq!(doc.text(), ">hello there");
        assert_eq!(doc.revision(), 2);

        assert!(doc.undo());
        assert!(doc.undo());
        assert_eq!(doc.text(), "hello world");
        assert!(!doc.undo());
    }

    #[test]
    fn test_undo_collection_suspended() {
        let mut doc = Document::new(DocumentOptions::default());
        doc.set_undo_collection(false);
        doc.insert(0, "abc");
        doc.set_undo_collection(true);
        assert!(!doc.can_undo());
        assert_eq!(doc.revision(), 1);
    }

    #[test]
    fn test_lines_and_clamp() {
        let doc = Document::from_text("one\ntw\u{e9}\nthree", DocumentOptions::default());
        assert_eq!(doc.line_count(), 3);
        assert_eq!(doc.line_start(1), 4);
        assert_eq!(doc.line_start(2), 9);
        assert_eq!(doc.line_start(10), 9);
        assert_eq!(doc.line_of(10), 2);
        assert_eq!(doc.clamp(7), 6);
        assert_eq!(doc.clamp(100), doc.len());
    }
}
