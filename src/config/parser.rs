//! Parser for the indented section format.
//!
//! A document is a sequence of top-level sections. Each section header is a
//! line ending in `:`; its body is the run of following lines that start with
//! the `-` marker:
//!
//! ```text
//! application:
//! 	- name: demo
//! 	- database:
//! 		- host: localhost
//! 		- port: 5432
//! 	- env: dev
//! ```
//!
//! A marker line ending in `:` opens a nested section whose body holds the
//! lines indented past that marker. A body ends at the first line that is
//! blank, lacks a leading marker, or is indented less than the body requires.
//! That line is handed back to the enclosing scope and read again there,
//! except a blank line, which closes every open nested section.
//!
//! Parsing is permissive: lines that do not fit the grammar are skipped.

use std::str::Lines;

use super::value::{Entries, Section, Value};

const INDENT: char = '\t';
const MARKER: char = '-';

/// What ended a section body.
enum End<'a> {
    Eof,
    Blank,
    Line(&'a str),
}

struct Cursor<'a> {
    lines: Lines<'a>,
    pending: Option<&'a str>,
}

impl<'a> Cursor<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines(),
            pending: None,
        }
    }

    fn next_line(&mut self) -> Option<&'a str> {
        self.pending.take().or_else(|| self.lines.next())
    }

    fn push_back(&mut self, line: &'a str) {
        self.pending = Some(line);
    }
}

/// Parses a document into a section holding its top-level sections.
pub fn parse(text: &str) -> Section {
    let mut cursor = Cursor::new(text);
    let mut root = Entries::new();

    while let Some(line) = cursor.next_line() {
        // Marker lines outside any section belong to nothing
        if marker_column(line).is_some() {
            continue;
        }
        let Some(key) = line.trim().strip_suffix(':') else {
            continue;
        };

        let (body, end) = read_section(&mut cursor, 0);
        root.insert(key.trim().to_string(), Value::Section(body));
        if let End::Line(next) = end {
            cursor.push_back(next);
        }
    }

    Section::from_entries(root)
}

/// Reads a section body whose marker lines sit at `min_column` or deeper.
///
/// Returns the body together with whatever ended it; a terminating line is
/// not consumed.
fn read_section<'a>(cursor: &mut Cursor<'a>, min_column: usize) -> (Section, End<'a>) {
    let mut entries = Entries::new();

    let end = loop {
        let Some(line) = cursor.next_line() else {
            break End::Eof;
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            break End::Blank;
        }
        let column = match marker_column(line) {
            Some(column) if column >= min_column => column,
            _ => break End::Line(line),
        };

        if let Some(head) = trimmed.strip_suffix(':') {
            let (body, end) = read_section(cursor, column + 1);
            entries.insert(subsection_key(head), Value::Section(body));
            match end {
                End::Line(next) => cursor.push_back(next),
                End::Blank => break End::Blank,
                End::Eof => break End::Eof,
            }
        } else if let Some((key, value)) = leaf_entry(trimmed) {
            entries.insert(key, Value::Text(value));
        }
    };

    (Section::from_entries(entries), end)
}

/// Column of the leading marker, if the line starts with one.
fn marker_column(line: &str) -> Option<usize> {
    let body = line.trim_start();
    body.starts_with(MARKER)
        .then(|| line[..line.len() - body.len()].chars().count())
}

/// Key of a nested section header, given the header without its final `:`.
fn subsection_key(head: &str) -> String {
    let after = head
        .find(MARKER)
        .map_or(head, |p| &head[p + MARKER.len_utf8()..]);
    let key = match after.find(':') {
        Some(q) => &after[..q],
        None => after,
    };
    key.trim().to_string()
}

/// Splits `- key: value` into its parts. The value runs to end of line.
fn leaf_entry(trimmed: &str) -> Option<(String, String)> {
    let cleaned = trimmed.replace(INDENT, "");
    let p = cleaned.find(MARKER)?;
    let rest = &cleaned[p + MARKER.len_utf8()..];
    let q = rest.find(':')?;
    Some((rest[..q].trim().to_string(), rest[q + 1..].trim().to_string()))
}
