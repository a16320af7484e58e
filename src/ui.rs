//! Toolkit-neutral widgets the list adapter and detail renderer draw into.
//!
//! A frontend provides a [`ListStore`] for the notes list, a [`TextBuffer`]
//! for the note content and a [`NoteFields`] for the tags entry and pin
//! checkbox. The in-memory implementations back the terminal frontend and
//! the tests.

use std::collections::BTreeMap;
use std::ops::Range;

use regex::{Regex, RegexBuilder};

/// Case-insensitive literal matcher for `needle`, `None` when it is empty.
pub fn literal_searcher(needle: &str) -> Option<Regex> {
    if needle.is_empty() {
        return None;
    }
    RegexBuilder::new(&regex::escape(needle)).case_insensitive(true).build().ok()
}

/// One row of the notes list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListRow {
    /// Title snippet, escaped for markup display.
    pub title: String,
    pub modified: String,
    pub tags: String,
    pub pinned: bool,
    pub key: String,
}

pub trait ListStore {
    fn clear(&mut self);
    fn append(&mut self, row: ListRow);
    fn rows(&self) -> &[ListRow];
}

#[derive(Debug, Default)]
pub struct MemoryListStore {
    rows: Vec<ListRow>,
    clears: usize,
}

impl MemoryListStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many times the store has been cleared.
    pub fn clear_count(&self) -> usize {
        self.clears
    }
}

impl ListStore for MemoryListStore {
    fn clear(&mut self) {
        self.rows.clear();
        self.clears += 1;
    }

    fn append(&mut self, row: ListRow) {
        self.rows.push(row);
    }

    fn rows(&self) -> &[ListRow] {
        &self.rows
    }
}

/// Annotation applied to a span of the text buffer. Link tags are keyed by
/// the literal link text, so every occurrence of a link shares one tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TextTag {
    Highlight,
    Url(String),
    NoteLink(String),
}

impl TextTag {
    pub fn is_link(&self) -> bool {
        !matches!(self, TextTag::Highlight)
    }
}

pub trait TextBuffer {
    /// Replace the text. Existing tags are dropped.
    fn set_text(&mut self, text: &str);
    fn text(&self) -> &str;
    fn apply_tag(&mut self, tag: &TextTag, span: Range<usize>);
    /// Every tagged span as `(tag, byte range)`, ordered by span start.
    fn tagged_spans(&self) -> Vec<(TextTag, Range<usize>)>;

    /// Next match of `searcher` at or after byte offset `from`.
    fn forward_search(&self, searcher: &Regex, from: usize) -> Option<Range<usize>> {
        let text = self.text();
        if from > text.len() || !text.is_char_boundary(from) {
            return None;
        }
        searcher.find_at(text, from).map(|m| m.range())
    }
}

#[derive(Debug, Default)]
pub struct MemoryTextBuffer {
    text: String,
    tags: BTreeMap<TextTag, Vec<Range<usize>>>,
}

impl MemoryTextBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spans carrying `tag`, in the order they were applied.
    pub fn spans_for(&self, tag: &TextTag) -> &[Range<usize>] {
        self.tags.get(tag).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of distinct tags in the buffer's tag table.
    pub fn tag_count(&self) -> usize {
        self.tags.len()
    }
}

impl TextBuffer for MemoryTextBuffer {
    fn set_text(&mut self, text: &str) {
        self.text = text.to_string();
        self.tags.clear();
    }

    fn text(&self) -> &str {
        &self.text
    }

    fn apply_tag(&mut self, tag: &TextTag, span: Range<usize>) {
        if span.start >= span.end || span.end > self.text.len() {
            return;
        }
        self.tags.entry(tag.clone()).or_default().push(span);
    }

    fn tagged_spans(&self) -> Vec<(TextTag, Range<usize>)> {
        let mut spans: Vec<(TextTag, Range<usize>)> = self
            .tags
            .iter()
            .flat_map(|(tag, ranges)| ranges.iter().map(move |r| (tag.clone(), r.clone())))
            .collect();
        spans.sort_by_key(|(_, r)| (r.start, r.end));
        spans
    }
}

/// The tags entry and pinned checkbox next to the note text.
pub trait NoteFields {
    fn set_tags_text(&mut self, text: &str);
    fn set_pinned(&mut self, pinned: bool);
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct MemoryNoteFields {
    pub tags_text: String,
    pub pinned: bool,
}

impl NoteFields for MemoryNoteFields {
    fn set_tags_text(&mut self, text: &str) {
        self.tags_text = text.to_string();
    }

    fn set_pinned(&mut self, pinned: bool) {
        self.pinned = pinned;
    }
}
