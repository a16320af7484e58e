//! Text table layout for the terminal frontend.
//! Widths are measured on visible characters so colored cells line up.

/// One column of a [`Table`]. A flexible column absorbs whatever width is
/// left once the fixed columns are laid out, truncating its cells.
#[derive(Debug, Clone)]
pub struct Column {
    pub header: String,
    pub flexible: bool,
}

impl Column {
    pub fn fixed(header: &str) -> Self {
        Self { header: header.to_string(), flexible: false }
    }

    pub fn flexible(header: &str) -> Self {
        Self { header: header.to_string(), flexible: true }
    }
}

const SEPARATOR: &str = " | ";
/// A flexible column never shrinks below this.
const MIN_FLEX_WIDTH: usize = 12;

pub struct Table {
    columns: Vec<Column>,
    rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Self {
        Self { columns, rows: Vec::new() }
    }

    pub fn push(&mut self, row: Vec<String>) {
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render within `max_width` columns when given. Only flexible columns
    /// are truncated, so colored fixed cells are never cut mid-escape.
    pub fn render(&self, max_width: Option<usize>) -> String {
        if self.columns.is_empty() {
            return String::new();
        }
        let mut widths: Vec<usize> =
            self.columns.iter().map(|c| display_len(&c.header)).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate().take(widths.len()) {
                widths[i] = widths[i].max(display_len(cell));
            }
        }

        if let Some(limit) = max_width {
            let total: usize =
                widths.iter().sum::<usize>() + SEPARATOR.len() * (widths.len() - 1);
            let flex: Vec<usize> = (0..widths.len())
                .filter(|&i| self.columns[i].flexible)
                .collect();
            if total > limit && !flex.is_empty() {
                let fixed: usize = (0..widths.len())
                    .filter(|i| !flex.contains(i))
                    .map(|i| widths[i])
                    .sum::<usize>()
                    + SEPARATOR.len() * (widths.len() - 1);
                let share = (limit.saturating_sub(fixed) / flex.len()).max(MIN_FLEX_WIDTH);
                for &i in &flex {
                    widths[i] = widths[i].min(share);
                }
            }
        }

        let headers: Vec<String> = self.columns.iter().map(|c| c.header.clone()).collect();
        let header_line = self.format_row(&headers, &widths);
        let mut out = String::new();
        out.push_str(header_line.trim_end());
        out.push('\n');
        out.push_str(&"-".repeat(display_len(header_line.trim_end())));
        for row in &self.rows {
            out.push('\n');
            out.push_str(self.format_row(row, &widths).trim_end());
        }
        out
    }

    fn format_row(&self, row: &[String], widths: &[usize]) -> String {
        row.iter()
            .zip(widths)
            .zip(&self.columns)
            .map(|((cell, &width), column)| {
                let cell = if column.flexible {
                    truncate_with_ellipsis(cell, width)
                } else {
                    cell.clone()
                };
                let visible = display_len(&cell);
                pad_field(&cell, width, visible)
            })
            .collect::<Vec<_>>()
            .join(SEPARATOR)
    }
}

/// Right-pad a field based on visible length (ignoring ANSI codes).
pub fn pad_field(display: &str, target: usize, plain_len: usize) -> String {
    let mut out = display.to_string();
    out.push_str(&" ".repeat(target.saturating_sub(plain_len)));
    out
}

/// Truncate to `max_width` visible characters, appending an ellipsis when
/// cut. Escape sequences are copied whole; a cut styled cell ends with a
/// reset.
pub fn truncate_with_ellipsis(text: &str, max_width: usize) -> String {
    if max_width == 0 {
        return String::new();
    }
    if display_len(text) <= max_width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut visible = 0;
    let mut styled = false;
    let mut chars = text.chars();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            out.push(ch);
            for next in chars.by_ref() {
                out.push(next);
                if next == 'm' {
                    break;
                }
            }
            styled = true;
            continue;
        }
        if visible + 1 == max_width {
            break;
        }
        out.push(ch);
        visible += 1;
    }
    out.push('…');
    if styled {
        out.push_str("\x1b[0m");
    }
    out
}

/// Visible length of a string, ignoring ANSI escape sequences.
pub fn display_len(s: &str) -> usize {
    let mut len = 0;
    let mut chars = s.chars();
    while let Some(ch) = chars.next() {
        if ch == '\x1b' {
            for next in chars.by_ref() {
                if next == 'm' {
                    break;
                }
            }
            continue;
        }
        len += 1;
    }
    len
}
