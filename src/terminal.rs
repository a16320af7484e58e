//! Terminal frontend: list tables, the painted detail view, prompts and
//! the interactive `browse` loop.

use std::io::{self, BufRead, Write};
use std::ops::Range;

use regex::Regex;

use crate::app::{App, Controller, Prompt};
use crate::events::UiEvent;
use crate::formatting::{FormatContext, human_date, unescape_markup};
use crate::render::{DetailView, LinkOutcome};
use crate::shared::table::{Column, Table};
use crate::tags::tags_display;
use crate::ui::{ListRow, MemoryNoteFields, MemoryTextBuffer, TextBuffer, TextTag};

/// Paint every non-empty match of `pattern` in `text`. Plain output and an
/// empty or unusable pattern leave the text untouched.
pub fn mark_matches(text: &str, pattern: &str, ctx: &FormatContext) -> String {
    if !ctx.use_color || pattern.is_empty() {
        return text.to_string();
    }
    let Ok(re) = Regex::new(pattern) else {
        return text.to_string();
    };
    let mut out = String::new();
    let mut last = 0;
    for m in re.find_iter(text).filter(|m| !m.is_empty()) {
        out.push_str(&text[last..m.start()]);
        out.push_str(&ctx.format_highlight(m.as_str()));
        last = m.end();
    }
    out.push_str(&text[last..]);
    out
}

/// Table of list rows, numbered from 1 for `browse` selection. Titles have
/// the list's match pattern highlighted.
pub fn list_table(
    rows: &[ListRow],
    match_pattern: &str,
    ctx: &FormatContext,
    width: Option<usize>,
) -> String {
    let mut table = Table::new(vec![
        Column::fixed("#"),
        Column::fixed("P"),
        Column::flexible("Title"),
        Column::fixed("Modified"),
        Column::flexible("Tags"),
        Column::fixed("Key"),
    ]);
    for (idx, row) in rows.iter().enumerate() {
        table.push(vec![
            (idx + 1).to_string(),
            ctx.format_pinned(row.pinned),
            mark_matches(&unescape_markup(&row.title), match_pattern, ctx),
            row.modified.clone(),
            row.tags.clone(),
            ctx.format_key(&row.key),
        ]);
    }
    table.render(width)
}

fn list_view(app: &App, ctx: &FormatContext, width: Option<usize>) -> String {
    list_table(app.controller.rows(), app.controller.match_pattern(), ctx, width)
}

enum Mark {
    Link(usize),
    Highlight,
}

fn overlaps(a: &Range<usize>, b: &Range<usize>) -> bool {
    a.start < b.end && b.start < a.end
}

/// The detail buffer with highlights painted and each link suffixed by its
/// number. Links win where a highlight overlaps one.
pub fn painted_text(
    view: &DetailView<MemoryTextBuffer, MemoryNoteFields>,
    ctx: &FormatContext,
) -> String {
    let buffer = view.buffer();
    let text = buffer.text();
    let mut marks: Vec<(Range<usize>, Mark)> = view
        .links()
        .into_iter()
        .enumerate()
        .map(|(idx, link)| (link.span, Mark::Link(idx + 1)))
        .collect();
    for span in buffer.spans_for(&TextTag::Highlight) {
        if !marks.iter().any(|(r, _)| overlaps(r, span)) {
            marks.push((span.clone(), Mark::Highlight));
        }
    }
    marks.sort_by_key(|(r, _)| r.start);

    let mut out = String::with_capacity(text.len());
    let mut cursor = 0;
    for (span, mark) in marks {
        if span.start < cursor {
            continue;
        }
        out.push_str(&text[cursor..span.start]);
        let piece = &text[span.clone()];
        match mark {
            Mark::Link(number) => out.push_str(&ctx.format_link(piece, number)),
            Mark::Highlight => out.push_str(&ctx.format_highlight(piece)),
        }
        cursor = span.end;
    }
    out.push_str(&text[cursor..]);
    out
}

/// Header lines for the selected note: key, dates, tags and pin.
pub fn detail_header(controller: &Controller, ctx: &FormatContext) -> Option<String> {
    let key = controller.selected_key()?;
    let note = controller.note(key)?;
    let now = chrono::Local::now();
    let fields = controller.detail().fields();
    let mut lines = vec![format!(
        "{} {}",
        ctx.format_header("Key:"),
        ctx.format_key(key)
    )];
    lines.push(format!(
        "{} {}",
        ctx.format_header("Modified:"),
        ctx.format_timestamp(&human_date(note.modifydate, now))
    ));
    if !fields.tags_text.is_empty() {
        let tags: Vec<String> =
            fields.tags_text.split(", ").map(|t| ctx.format_tag(t)).collect();
        lines.push(format!("{} {}", ctx.format_header("Tags:"), tags.join(", ")));
    }
    if fields.pinned {
        lines.push(format!("{} {}", ctx.format_header("Pinned:"), ctx.format_pinned(true)));
    }
    Some(lines.join("\n"))
}

pub fn print_detail<W: Write>(
    out: &mut W,
    controller: &Controller,
    ctx: &FormatContext,
) -> io::Result<()> {
    match detail_header(controller, ctx) {
        Some(header) => {
            writeln!(out, "{header}\n")?;
            writeln!(out, "{}", painted_text(controller.detail(), ctx))
        }
        None => writeln!(out, "Nothing to display."),
    }
}

/// Warnings and confirmations go to stderr. Confirmation is answered yes:
/// exit goes ahead whatever the answer.
pub struct TerminalPrompt {
    ctx: FormatContext,
}

impl TerminalPrompt {
    pub fn new(ctx: FormatContext) -> Self {
        Self { ctx }
    }
}

impl Prompt for TerminalPrompt {
    fn warn(&mut self, title: &str, message: &str) {
        eprintln!("{} {message}", self.ctx.format_highlight(&format!("{title}:")));
    }

    fn confirm(&mut self, message: &str) -> bool {
        eprintln!("{message}");
        true
    }
}

pub fn describe_link_outcome(outcome: &LinkOutcome) -> String {
    match outcome {
        LinkOutcome::Opened(url) => format!("Opened {url}"),
        LinkOutcome::Note(found) => format!("Opened note {}", found.key),
        LinkOutcome::Unresolved(title) => format!("No note titled \"{title}\""),
        LinkOutcome::NoSuchLink => "No such link".to_string(),
    }
}

const BROWSE_HELP: &str = "\
Type text to search, a row number to open a note, `/text` to search for text
that looks like a command, `o N` to follow link N, `p` to toggle pin,
`t tags` to set tags, an empty line to list again, `q` to quit.";

/// Line-driven session over `input`. Returns when `q` is read or input ends.
pub fn browse<R: BufRead, W: Write>(
    app: &mut App,
    input: R,
    out: &mut W,
    ctx: &FormatContext,
    width: Option<usize>,
) -> io::Result<()> {
    writeln!(out, "{BROWSE_HELP}\n")?;
    writeln!(out, "{}", list_view(app, ctx, width))?;

    for line in input.lines() {
        let line = line?;
        let line = line.trim();
        match line {
            "q" => {
                app.emit(UiEvent::Quit);
            }
            "" => {
                writeln!(out, "{}", list_view(app, ctx, width))?;
            }
            "?" => writeln!(out, "{BROWSE_HELP}")?,
            "p" => {
                if app.controller.selected_key().is_none() {
                    writeln!(out, "Select a note first.")?;
                } else {
                    let pinned = !app.controller.detail().fields().pinned;
                    app.emit(UiEvent::PinToggled(pinned));
                    writeln!(out, "{}", if pinned { "Pinned." } else { "Unpinned." })?;
                }
            }
            _ => {
                if let Some(number) = line.strip_prefix("o ") {
                    match number.trim().parse::<usize>() {
                        Ok(n) => {
                            app.emit(UiEvent::LinkActivated(n));
                            let outcome = app.controller.last_link().cloned();
                            if let Some(outcome) = &outcome {
                                writeln!(out, "{}", describe_link_outcome(outcome))?;
                            }
                            if matches!(outcome, Some(LinkOutcome::Note(_))) {
                                print_detail(out, &app.controller, ctx)?;
                            }
                        }
                        Err(_) => writeln!(out, "Usage: o <link number>")?,
                    }
                } else if let Some(tags) = line.strip_prefix("t ") {
                    if app.controller.selected_key().is_none() {
                        writeln!(out, "Select a note first.")?;
                    } else {
                        app.emit(UiEvent::TagsEdited(tags.to_string()));
                        writeln!(out, "Tags: {}", app.controller.detail().fields().tags_text)?;
                    }
                } else if let Ok(number) = line.parse::<usize>() {
                    let key = number
                        .checked_sub(1)
                        .and_then(|i| app.controller.rows().get(i))
                        .map(|row| row.key.clone());
                    match key {
                        Some(key) => {
                            app.emit(UiEvent::RowActivated(key));
                            print_detail(out, &app.controller, ctx)?;
                        }
                        None => writeln!(out, "No row {number}.")?,
                    }
                } else {
                    let text = line.strip_prefix('/').unwrap_or(line);
                    app.emit(UiEvent::SearchChanged(text.to_string()));
                    writeln!(out, "{}", list_view(app, ctx, width))?;
                }
            }
        }
        if app.controller.quit_requested() {
            break;
        }
        out.flush()?;
    }
    Ok(())
}

/// Tags line for commands that print a single note's tags.
pub fn tags_line(tags: &[String], ctx: &FormatContext) -> String {
    let display = tags_display(tags);
    if display.is_empty() {
        return String::new();
    }
    display.split(", ").map(|t| ctx.format_tag(t)).collect::<Vec<_>>().join(", ")
}
