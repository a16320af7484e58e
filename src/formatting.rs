use chrono::{DateTime, Datelike, Local, TimeZone};
use yansi::Paint;

use crate::note::Note;

pub const TITLE_MAX_CHARS: usize = 80;

/// Color palette for consistent theming
pub struct ColorPalette {
    pub key: (u8, u8, u8),       // note keys, muted text
    pub secondary: (u8, u8, u8), // headers, emphasis
    pub timestamp: (u8, u8, u8),
    pub highlight: (u8, u8, u8), // search matches
    pub link: (u8, u8, u8),
}

impl ColorPalette {
    pub const CATPPUCCIN: Self = Self {
        key: (108, 112, 134),
        secondary: (148, 226, 213),
        timestamp: (137, 180, 250),
        highlight: (243, 139, 168),
        link: (116, 199, 236),
    };
}

/// Formatting context passed through the terminal rendering pipeline
pub struct FormatContext {
    pub use_color: bool,
    pub palette: ColorPalette,
}

impl FormatContext {
    pub fn new(use_color: bool) -> Self {
        Self { use_color, palette: ColorPalette::CATPPUCCIN }
    }

    pub fn from_env() -> Self {
        Self::new(std::env::var("NO_COLOR").is_err())
    }

    fn rgb(&self, text: &str, (r, g, b): (u8, u8, u8)) -> String {
        if self.use_color {
            Paint::rgb(text, r, g, b).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn format_key(&self, key: &str) -> String {
        self.rgb(key, self.palette.key)
    }

    pub fn format_header(&self, text: &str) -> String {
        if self.use_color {
            let (r, g, b) = self.palette.secondary;
            Paint::rgb(text, r, g, b).bold().to_string()
        } else {
            text.to_string()
        }
    }

    pub fn format_timestamp(&self, ts: &str) -> String {
        self.rgb(ts, self.palette.timestamp)
    }

    pub fn format_tag(&self, tag: &str) -> String {
        if self.use_color {
            let (r, g, b) = crate::tags::color_for_tag(tag);
            Paint::rgb(tag, r, g, b).bold().to_string()
        } else {
            tag.to_string()
        }
    }

    pub fn format_highlight(&self, text: &str) -> String {
        if self.use_color {
            let (r, g, b) = self.palette.highlight;
            Paint::rgb(text, r, g, b).bold().to_string()
        } else {
            text.to_string()
        }
    }

    /// Links stay visible without color: they are bracketed with their
    /// number so `follow <n>` can refer to them.
    pub fn format_link(&self, text: &str, number: usize) -> String {
        if self.use_color {
            let (r, g, b) = self.palette.link;
            format!("{}[{number}]", Paint::rgb(text, r, g, b).underline())
        } else {
            format!("{text}[{number}]")
        }
    }

    pub fn format_pinned(&self, pinned: bool) -> String {
        match (pinned, self.use_color) {
            (true, true) => Paint::yellow("*").bold().to_string(),
            (true, false) => "*".to_string(),
            (false, _) => " ".to_string(),
        }
    }
}

/// First line of the note content, cut at [`TITLE_MAX_CHARS`].
pub fn note_title(note: &Note) -> String {
    let first = note.content.lines().next().unwrap_or("").trim_end();
    if first.chars().count() > TITLE_MAX_CHARS {
        let mut out: String = first.chars().take(TITLE_MAX_CHARS).collect();
        out.push('…');
        out
    } else {
        first.to_string()
    }
}

/// Whole first line, untruncated, used to resolve `[[title]]` links.
pub fn note_title_search(note: &Note) -> &str {
    note.content.lines().next().unwrap_or("").trim()
}

/// Pretty modify date relative to `now`: a time for today, month and day
/// for this year, and month, day and year otherwise.
pub fn human_date(timestamp: f64, now: DateTime<Local>) -> String {
    if !timestamp.is_finite() || timestamp <= 0.0 {
        return String::new();
    }
    let secs = timestamp.trunc() as i64;
    let nanos = ((timestamp.fract()) * 1e9) as u32;
    let Some(dt) = Local.timestamp_opt(secs, nanos).single() else {
        return String::new();
    };
    if dt.date_naive() == now.date_naive() {
        dt.format("%H:%M").to_string()
    } else if dt.year() == now.year() {
        dt.format("%b %-d").to_string()
    } else {
        dt.format("%b %-d, %Y").to_string()
    }
}

/// Escape text for markup-rendered cells.
pub fn escape_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Reverse of [`escape_markup`], for frontends that print plain text.
pub fn unescape_markup(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}
