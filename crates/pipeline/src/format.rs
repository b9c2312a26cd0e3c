//! Deterministic MDX/markdown pretty-printing.
//!
//! [`MdxFormatter`] normalises a rendered proposal document so that the same
//! input always commits byte-identical content, and formatting its own output
//! is a no-op:
//!
//! - line endings become `\n`, trailing whitespace is trimmed;
//! - a leading `---` front-matter block is kept as-is;
//! - fenced code blocks are copied verbatim;
//! - `*` and `+` bullets become `-`;
//! - runs of blank lines collapse to one, and leading ones are dropped
//!   unless that would leave a bare `---` on line 1;
//! - pipe tables are re-aligned to the widest cell of each column.

use thiserror::Error;

/// Errors produced when a document cannot be formatted.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The document opens a front-matter block that never closes.
    #[error("front-matter opened on line 1 is never closed")]
    UnterminatedFrontMatter,

    /// A fenced code block is still open at the end of the document.
    #[error("code fence opened on line {line} is never closed")]
    UnterminatedFence {
        /// 1-based line number of the opening fence.
        line: usize,
    },
}

/// Pretty-prints a document into its canonical committed form.
///
/// Implementations must be deterministic and idempotent.
pub trait DocumentFormatter: Send + Sync {
    /// Formats `text`, returning the canonical form.
    fn format(&self, text: &str) -> Result<String, FormatError>;
}

/// Formatter for the markdown dialect used by the documentation site.
#[derive(Debug, Clone, Copy, Default)]
pub struct MdxFormatter;

impl DocumentFormatter for MdxFormatter {
    fn format(&self, text: &str) -> Result<String, FormatError> {
        let normalised = text.replace("\r\n", "\n").replace('\r', "\n");
        let lines: Vec<&str> = normalised.lines().collect();

        let (front_matter, body_start) = split_front_matter(&lines)?;
        let body = format_body(&lines[body_start..], body_start)?;

        let mut out = String::with_capacity(normalised.len());
        if let Some(front_matter) = front_matter {
            out.push_str("---\n");
            for line in front_matter {
                out.push_str(line.trim_end());
                out.push('\n');
            }
            out.push_str("---\n");
            if !body.is_empty() {
                out.push('\n');
            }
        } else if body.first().is_some_and(|first| first == "---") {
            // A bare `---` on line 1 would open front-matter on the next pass.
            out.push('\n');
        }
        for line in &body {
            out.push_str(line);
            out.push('\n');
        }
        Ok(out)
    }
}

/// Returns the front-matter lines (without delimiters) and the index of the
/// first body line.
fn split_front_matter<'a>(lines: &[&'a str]) -> Result<(Option<Vec<&'a str>>, usize), FormatError> {
    match lines.first() {
        Some(first) if first.trim_end() == "---" => {
            let close = lines[1..]
                .iter()
                .position(|line| line.trim_end() == "---")
                .ok_or(FormatError::UnterminatedFrontMatter)?;
            Ok((Some(lines[1..=close].to_vec()), close + 2))
        }
        _ => Ok((None, 0)),
    }
}

fn format_body(lines: &[&str], line_offset: usize) -> Result<Vec<String>, FormatError> {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut open_fence: Option<Fence> = None;
    let mut table: Vec<&str> = Vec::new();

    for (idx, raw) in lines.iter().enumerate() {
        if let Some(fence) = &open_fence {
            out.push((*raw).to_string());
            if fence.is_closed_by(raw) {
                open_fence = None;
            }
            continue;
        }

        let line = raw.trim_end();
        if line.trim_start().starts_with('|') {
            table.push(line);
            continue;
        }
        flush_table(&mut table, &mut out);

        if let Some(fence) = Fence::open(line, line_offset + idx + 1) {
            out.push(line.to_string());
            open_fence = Some(fence);
            continue;
        }

        if line.is_empty() {
            // Drops leading blanks as well as repeated ones.
            if out.last().is_some_and(|last| !last.is_empty()) {
                out.push(String::new());
            }
            continue;
        }

        out.push(normalise_bullet(line));
    }
    flush_table(&mut table, &mut out);

    if let Some(fence) = open_fence {
        return Err(FormatError::UnterminatedFence { line: fence.line });
    }
    while out.last().is_some_and(|last| last.is_empty()) {
        out.pop();
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Code fences
// ---------------------------------------------------------------------------

struct Fence {
    marker: char,
    len: usize,
    line: usize,
}

impl Fence {
    fn open(line: &str, line_no: usize) -> Option<Self> {
        let trimmed = line.trim_start();
        let marker = trimmed.chars().next().filter(|c| *c == '`' || *c == '~')?;
        let len = trimmed.chars().take_while(|c| *c == marker).count();
        let info = &trimmed[len..];
        if marker == '`' && info.contains('`') {
            return None;
        }
        (len >= 3).then_some(Self {
            marker,
            len,
            line: line_no,
        })
    }

    fn is_closed_by(&self, line: &str) -> bool {
        let trimmed = line.trim();
        trimmed.chars().count() >= self.len && trimmed.chars().all(|c| c == self.marker)
    }
}

// ---------------------------------------------------------------------------
// Lists
// ---------------------------------------------------------------------------

fn normalise_bullet(line: &str) -> String {
    let indent = line.len() - line.trim_start().len();
    let rest = &line[indent..];
    let is_bullet = (rest.starts_with("* ") || rest.starts_with("+ ")) && !is_thematic_break(rest);
    if is_bullet {
        format!("{}-{}", &line[..indent], &rest[1..])
    } else {
        line.to_string()
    }
}

fn is_thematic_break(line: &str) -> bool {
    let mut marks = line.chars().filter(|c| !c.is_whitespace());
    let Some(first) = marks.next() else {
        return false;
    };
    matches!(first, '*' | '-' | '_') && line.chars().filter(|c| *c == first).count() >= 3 && marks.all(|c| c == first)
}

// ---------------------------------------------------------------------------
// Tables
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, PartialEq, Eq)]
enum Align {
    None,
    Left,
    Right,
    Center,
}

fn flush_table(rows: &mut Vec<&str>, out: &mut Vec<String>) {
    if rows.is_empty() {
        return;
    }

    let cells: Vec<Vec<String>> = rows.iter().map(|row| split_row(row)).collect();
    let columns = cells.iter().map(Vec::len).max().unwrap_or(0);
    let delimiter: Vec<Option<Vec<Align>>> = cells.iter().map(|row| delimiter_alignments(row)).collect();

    let mut widths = vec![3usize; columns];
    for (row, delim) in cells.iter().zip(&delimiter) {
        if delim.is_some() {
            continue;
        }
        for (col, cell) in row.iter().enumerate() {
            widths[col] = widths[col].max(cell.chars().count());
        }
    }

    for (row, delim) in cells.iter().zip(&delimiter) {
        let rendered: Vec<String> = match delim {
            Some(aligns) => (0..columns)
                .map(|col| delimiter_cell(aligns.get(col).copied().unwrap_or(Align::None), widths[col]))
                .collect(),
            None => (0..columns)
                .map(|col| {
                    let cell = row.get(col).map_or("", String::as_str);
                    let pad = widths[col] - cell.chars().count();
                    format!("{cell}{}", " ".repeat(pad))
                })
                .collect(),
        };
        out.push(format!("| {} |", rendered.join(" | ")));
    }
    rows.clear();
}

/// Splits a table row into trimmed cells, honouring `\|` escapes.
fn split_row(row: &str) -> Vec<String> {
    let mut inner = row.trim();
    inner = inner.strip_prefix('|').unwrap_or(inner);
    if inner.ends_with('|') && !inner.ends_with("\\|") {
        inner = &inner[..inner.len() - 1];
    }

    let mut cells = Vec::new();
    let mut current = String::new();
    let mut escaped = false;
    for c in inner.chars() {
        if c == '|' && !escaped {
            cells.push(current.trim().to_string());
            current.clear();
        } else {
            current.push(c);
        }
        escaped = c == '\\' && !escaped;
    }
    cells.push(current.trim().to_string());
    cells
}

fn delimiter_alignments(cells: &[String]) -> Option<Vec<Align>> {
    cells
        .iter()
        .map(|cell| {
            let left = cell.starts_with(':');
            let right = cell.ends_with(':') && cell.len() > 1;
            let dashes = cell.trim_start_matches(':').trim_end_matches(':');
            if dashes.is_empty() || !dashes.chars().all(|c| c == '-') {
                return None;
            }
            Some(match (left, right) {
                (true, true) => Align::Center,
                (true, false) => Align::Left,
                (false, true) => Align::Right,
                (false, false) => Align::None,
            })
        })
        .collect()
}

fn delimiter_cell(align: Align, width: usize) -> String {
    match align {
        Align::None => "-".repeat(width),
        Align::Left => format!(":{}", "-".repeat(width - 1)),
        Align::Right => format!("{}:", "-".repeat(width - 1)),
        Align::Center => format!(":{}:", "-".repeat(width - 2)),
    }
}
