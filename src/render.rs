//! Detail view of the selected note.
//!
//! [`DetailView`] owns the text buffer and the tags/pin fields. Selecting a
//! note loads its content, tags every occurrence of the search string and
//! every link, and mirrors the tags and pinned flag into the fields.

use std::io;
use std::ops::Range;
use std::sync::LazyLock;

use pulldown_cmark::{Event, HeadingLevel, Parser, Tag, TagEnd};
use regex::Regex;
use yansi::Paint;

use crate::note::{ListedNote, Note};
use crate::tags::{note_pinned, tags_display};
use crate::ui::{NoteFields, TextBuffer, TextTag, literal_searcher};

static URL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b[a-zA-Z][a-zA-Z0-9+.\-]*://[^\s<>\[\]]+").expect("valid url regex")
});

static NOTE_LINK_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\[[^\]\n]+\]\]").expect("valid note link regex"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DetailState {
    Empty,
    Loaded(String),
}

/// A link found in the displayed note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkSpan {
    pub tag: TextTag,
    pub span: Range<usize>,
}

impl LinkSpan {
    /// The text shown for the link.
    pub fn label(&self) -> &str {
        match &self.tag {
            TextTag::Url(url) => url,
            TextTag::NoteLink(text) => text,
            TextTag::Highlight => "",
        }
    }
}

/// Result of activating a link.
#[derive(Debug, Clone, PartialEq)]
pub enum LinkOutcome {
    Opened(String),
    /// A `[[title]]` reference resolved to this note.
    Note(ListedNote),
    Unresolved(String),
    NoSuchLink,
}

/// Opens URLs outside the application.
pub trait LinkOpener {
    fn open(&mut self, url: &str) -> io::Result<()>;
}

/// Hands URLs to `$BROWSER`, or the desktop's default handler when it is
/// unset.
#[derive(Debug, Default)]
pub struct SystemBrowser;

impl LinkOpener for SystemBrowser {
    fn open(&mut self, url: &str) -> io::Result<()> {
        match std::env::var("BROWSER") {
            Ok(browser) if !browser.trim().is_empty() => open::with(url, browser.trim()),
            _ => open::that(url),
        }
    }
}

pub struct DetailView<B, F> {
    buffer: B,
    fields: F,
    state: DetailState,
}

impl<B: TextBuffer, F: NoteFields> DetailView<B, F> {
    pub fn new(buffer: B, fields: F) -> Self {
        Self { buffer, fields, state: DetailState::Empty }
    }

    pub fn state(&self) -> &DetailState {
        &self.state
    }

    pub fn buffer(&self) -> &B {
        &self.buffer
    }

    pub fn fields(&self) -> &F {
        &self.fields
    }

    /// Display `note` under `key`, or clear the view when the lookup came
    /// back empty.
    pub fn select(&mut self, key: &str, note: Option<&Note>, highlight: &str) {
        let Some(note) = note else {
            tracing::debug!(key, "selected note not in list; clearing detail view");
            self.clear();
            return;
        };

        self.buffer.set_text(&note.content);
        self.highlight(highlight);
        self.mark_links();
        self.fields.set_tags_text(&tags_display(&note.tags));
        self.fields.set_pinned(note_pinned(note));
        self.state = DetailState::Loaded(key.to_string());
    }

    pub fn clear(&mut self) {
        self.buffer.set_text("");
        self.fields.set_tags_text("");
        self.fields.set_pinned(false);
        self.state = DetailState::Empty;
    }

    /// Tag each occurrence of `needle`, scanning left to right from the end
    /// of the previous match. Returns the number of spans tagged.
    pub fn highlight(&mut self, needle: &str) -> usize {
        let Some(searcher) = literal_searcher(needle) else {
            return 0;
        };
        let mut count = 0;
        let mut from = 0;
        while let Some(found) = self.buffer.forward_search(&searcher, from) {
            from = found.end;
            self.buffer.apply_tag(&TextTag::Highlight, found);
            count += 1;
        }
        count
    }

    fn mark_links(&mut self) {
        let text = self.buffer.text();
        let mut found: Vec<LinkSpan> = URL_RE
            .find_iter(text)
            .map(|m| LinkSpan { tag: TextTag::Url(m.as_str().to_string()), span: m.range() })
            .collect();
        found.extend(NOTE_LINK_RE.find_iter(text).map(|m| LinkSpan {
            tag: TextTag::NoteLink(m.as_str().to_string()),
            span: m.range(),
        }));
        for link in found {
            self.buffer.apply_tag(&link.tag, link.span);
        }
    }

    /// Links in the displayed note, in text order.
    pub fn links(&self) -> Vec<LinkSpan> {
        self.buffer
            .tagged_spans()
            .into_iter()
            .filter(|(tag, _)| tag.is_link())
            .map(|(tag, span)| LinkSpan { tag, span })
            .collect()
    }

    /// Activate the link numbered `number` (1-based). Note references are
    /// resolved through `resolve_title`; the caller decides whether to
    /// select the resolved note.
    pub fn activate_link(
        &self,
        number: usize,
        opener: &mut dyn LinkOpener,
        resolve_title: impl FnOnce(&str) -> Option<ListedNote>,
    ) -> LinkOutcome {
        let Some(link) = number.checked_sub(1).and_then(|idx| self.links().into_iter().nth(idx))
        else {
            return LinkOutcome::NoSuchLink;
        };
        match link.tag {
            TextTag::Url(url) => {
                if let Err(err) = opener.open(&url) {
                    tracing::warn!(%url, %err, "could not open link");
                }
                LinkOutcome::Opened(url)
            }
            TextTag::NoteLink(text) => {
                let title = text.trim_start_matches("[[").trim_end_matches("]]").trim();
                match resolve_title(title) {
                    Some(found) => LinkOutcome::Note(found),
                    None => {
                        tracing::info!(title, "no note with that title");
                        LinkOutcome::Unresolved(title.to_string())
                    }
                }
            }
            TextTag::Highlight => LinkOutcome::NoSuchLink,
        }
    }
}

#[derive(Clone, Copy)]
enum Style {
    Heading,
    Bullet,
    Rule,
    Code,
    Quote,
    Plain,
}

fn paint(out: &mut String, text: &str, style: Style, use_color: bool) {
    if !use_color {
        out.push_str(text);
        return;
    }
    let painted = match style {
        Style::Heading => Paint::cyan(text).bold(),
        Style::Bullet => Paint::yellow(text).bold(),
        Style::Rule => Paint::new(text).dim(),
        Style::Code => Paint::blue(text),
        Style::Quote => Paint::new(text).italic(),
        Style::Plain => Paint::new(text),
    };
    out.push_str(&painted.to_string());
}

/// Terminal preview of a note written in markdown.
pub fn render_markdown(input: &str, use_color: bool) -> String {
    let mut out = String::new();
    let mut list_depth: usize = 0;
    let mut in_quote = false;
    let mut link_target: Option<String> = None;

    for event in Parser::new(input) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                let hashes = match level {
                    HeadingLevel::H1 => 1,
                    HeadingLevel::H2 => 2,
                    HeadingLevel::H3 => 3,
                    HeadingLevel::H4 => 4,
                    HeadingLevel::H5 => 5,
                    HeadingLevel::H6 => 6,
                };
                paint(&mut out, &format!("{} ", "#".repeat(hashes)), Style::Heading, use_color);
            }
            Event::End(TagEnd::Heading(_)) | Event::End(TagEnd::Paragraph) => {
                out.push_str("\n\n");
            }
            Event::Start(Tag::List(_)) => list_depth += 1,
            Event::End(TagEnd::List(_)) => {
                list_depth = list_depth.saturating_sub(1);
                if list_depth == 0 {
                    out.push('\n');
                }
            }
            Event::Start(Tag::Item) => {
                out.push_str(&"  ".repeat(list_depth.saturating_sub(1)));
                paint(&mut out, "- ", Style::Bullet, use_color);
            }
            Event::End(TagEnd::Item) => {
                if !out.ends_with('\n') {
                    out.push('\n');
                }
            }
            Event::Start(Tag::BlockQuote) => in_quote = true,
            Event::End(TagEnd::BlockQuote) => in_quote = false,
            Event::Start(Tag::Link { dest_url, .. }) => link_target = Some(dest_url.to_string()),
            Event::End(TagEnd::Link) => {
                if let Some(url) = link_target.take() {
                    paint(&mut out, &format!(" <{url}>"), Style::Rule, use_color);
                }
            }
            Event::Text(t) => {
                let style = if in_quote { Style::Quote } else { Style::Plain };
                if in_quote && out.ends_with('\n') {
                    paint(&mut out, "> ", Style::Rule, use_color);
                }
                paint(&mut out, &t, style, use_color);
            }
            Event::Code(t) => paint(&mut out, &t, Style::Code, use_color),
            Event::Start(Tag::CodeBlock(_)) => {}
            Event::End(TagEnd::CodeBlock) => out.push('\n'),
            Event::SoftBreak | Event::HardBreak => out.push('\n'),
            Event::Rule => paint(&mut out, "---\n\n", Style::Rule, use_color),
            Event::Html(t) | Event::InlineHtml(t) => out.push_str(&t),
            _ => {}
        }
    }

    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui::{MemoryNoteFields, MemoryTextBuffer};

    fn view() -> DetailView<MemoryTextBuffer, MemoryNoteFields> {
        DetailView::new(MemoryTextBuffer::new(), MemoryNoteFields::default())
    }

    fn note(content: &str) -> Note {
        Note { content: content.to_string(), ..Default::default() }
    }

    #[derive(Default)]
    struct RecordingOpener {
        opened: Vec<String>,
    }

    impl LinkOpener for RecordingOpener {
        fn open(&mut self, url: &str) -> io::Result<()> {
            self.opened.push(url.to_string());
            Ok(())
        }
    }

    #[test]
    fn empty_highlight_tags_nothing() {
        let mut v = view();
        v.select("k", Some(&note("nothing to see")), "");
        assert!(v.buffer().spans_for(&TextTag::Highlight).is_empty());
    }

    #[test]
    fn highlights_every_occurrence_in_order() {
        let mut v = view();
        v.select("k", Some(&note("Milk, milk and MILK")), "milk");
        let spans = v.buffer().spans_for(&TextTag::Highlight);
        assert_eq!(spans, &[0..4, 6..10, 15..19]);
        assert!(spans.windows(2).all(|w| w[0].end <= w[1].start));
    }

    #[test]
    fn adjacent_matches_do_not_overlap() {
        let mut v = view();
        v.select("k", Some(&note("aaaa")), "aa");
        assert_eq!(v.buffer().spans_for(&TextTag::Highlight), &[0..2, 2..4]);
    }

    #[test]
    fn finds_url_and_note_reference() {
        let mut v = view();
        v.select("k", Some(&note("see https://example.com/x and [[Other Note]]")), "");
        let links = v.links();
        assert_eq!(links.len(), 2);
        assert_eq!(links[0].tag, TextTag::Url("https://example.com/x".into()));
        assert_eq!(links[1].tag, TextTag::NoteLink("[[Other Note]]".into()));
        assert_eq!(links[1].label(), "[[Other Note]]");
    }

    #[test]
    fn repeated_links_share_one_tag() {
        let mut v = view();
        v.select("k", Some(&note("http://a.io/ then http://a.io/ again")), "");
        assert_eq!(v.links().len(), 2);
        assert_eq!(v.buffer().tag_count(), 1);
        assert_eq!(v.buffer().spans_for(&TextTag::Url("http://a.io/".into())).len(), 2);
    }

    #[test]
    fn loads_fields_and_state() {
        let mut v = view();
        let mut n = note("body");
        n.tags = vec!["a".into(), "b c".into()];
        n.systemtags = vec!["pinned".into()];
        v.select("key1", Some(&n), "");
        assert_eq!(v.state(), &DetailState::Loaded("key1".into()));
        assert_eq!(v.fields().tags_text, "a, bc");
        assert!(v.fields().pinned);
        assert_eq!(v.buffer().text(), "body");
    }

    #[test]
    fn missing_note_clears_view() {
        let mut v = view();
        let mut n = note("old text");
        n.tags = vec!["x".into()];
        v.select("key1", Some(&n), "old");
        v.select("gone", None, "old");
        assert_eq!(v.state(), &DetailState::Empty);
        assert_eq!(v.buffer().text(), "");
        assert_eq!(v.buffer().tag_count(), 0);
        assert_eq!(v.fields(), &MemoryNoteFields::default());
    }

    #[test]
    fn activating_links() {
        let mut v = view();
        v.select("k", Some(&note("go http://x.org/ or [[ Target ]] or [[Nope]]")), "");
        let mut opener = RecordingOpener::default();

        let out = v.activate_link(1, &mut opener, |_| None);
        assert_eq!(out, LinkOutcome::Opened("http://x.org/".into()));
        assert_eq!(opener.opened, vec!["http://x.org/"]);

        let target = ListedNote { key: "t".into(), note: note("Target") };
        let out = v.activate_link(2, &mut opener, |title| {
            assert_eq!(title, "Target");
            Some(target.clone())
        });
        assert_eq!(out, LinkOutcome::Note(target));

        let out = v.activate_link(3, &mut opener, |_| None);
        assert_eq!(out, LinkOutcome::Unresolved("Nope".into()));

        assert_eq!(v.activate_link(0, &mut opener, |_| None), LinkOutcome::NoSuchLink);
        assert_eq!(v.activate_link(9, &mut opener, |_| None), LinkOutcome::NoSuchLink);
    }

    #[test]
    fn markdown_without_color_keeps_text() {
        let out = render_markdown("# Title\n\n- one\n- two\n\nSee [site](https://x.y).", false);
        assert!(out.starts_with("# Title"));
        assert!(out.contains("- one\n- two"));
        assert!(out.contains("site <https://x.y>"));
    }
}
