//! Line-oriented dump scanning.
//!
//! A dump is processed as a sequence of lines. Lines that start an
//! `INSERT INTO` statement are grouped with the following lines until the
//! statement's `;` terminator (outside string literals) is reached; every
//! other line stands alone. Both the insert aggregator and the reassembler
//! walk the dump through [`DumpScanner`], so they agree on which lines belong
//! to which statement.

pub mod mysql_insert;
pub mod tokenizer;

pub use mysql_insert::{aggregate_inserts, parse_insert_statement, InsertMap, InsertRecord, Row};
pub use tokenizer::{split_fields, split_rows, QuoteState};

use std::iter::Enumerate;
use std::str::Lines;

/// An INSERT statement spanning one or more dump lines
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertStatement<'a> {
    /// Lower-cased target table
    pub table: String,
    /// 1-based number of the statement's first line
    pub line: usize,
    /// The statement's lines, verbatim
    pub lines: Vec<&'a str>,
}

impl InsertStatement<'_> {
    /// Statement text with its lines joined by newlines
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// One unit of a dump: a plain line or a whole INSERT statement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DumpSegment<'a> {
    Line { line: usize, text: &'a str },
    Insert(InsertStatement<'a>),
}

/// Iterator over the segments of a dump
pub struct DumpScanner<'a> {
    lines: Enumerate<Lines<'a>>,
}

impl<'a> DumpScanner<'a> {
    pub fn new(dump: &'a str) -> Self {
        Self {
            lines: dump.lines().enumerate(),
        }
    }
}

impl<'a> Iterator for DumpScanner<'a> {
    type Item = DumpSegment<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let (idx, text) = self.lines.next()?;

        let Some(table) = insert_table_name(text) else {
            return Some(DumpSegment::Line {
                line: idx + 1,
                text,
            });
        };

        let mut state = QuoteState::default();
        let mut lines = vec![text];
        let mut terminated = state.feed_until_terminator(text.as_bytes());

        while !terminated {
            let Some((_, continuation)) = self.lines.next() else {
                break;
            };
            // The newline itself is part of any literal that spans lines
            state.feed(b'\n');
            terminated = state.feed_until_terminator(continuation.as_bytes());
            lines.push(continuation);
        }

        Some(DumpSegment::Insert(InsertStatement {
            table,
            line: idx + 1,
            lines,
        }))
    }
}

/// If the line starts an `INSERT INTO` statement, return its lower-cased table
pub fn insert_table_name(line: &str) -> Option<String> {
    let stmt = trim_ascii_start(line.as_bytes());
    if stmt.len() < 11 || !stmt[..11].eq_ignore_ascii_case(b"INSERT INTO") {
        return None;
    }
    extract_table_name(stmt, 11).map(|name| name.to_lowercase())
}

#[inline]
fn trim_ascii_start(data: &[u8]) -> &[u8] {
    let start = data
        .iter()
        .position(|&b| !is_whitespace(b))
        .unwrap_or(data.len());
    &data[start..]
}

#[inline]
fn extract_table_name(stmt: &[u8], offset: usize) -> Option<String> {
    let mut i = offset;

    while i < stmt.len() && is_whitespace(stmt[i]) {
        i += 1;
    }
    if i == offset || i >= stmt.len() {
        return None;
    }

    let quote_char = if stmt[i] == b'`' || stmt[i] == b'"' {
        let q = stmt[i];
        i += 1;
        Some(q)
    } else {
        None
    };

    let start = i;

    while i < stmt.len() {
        let b = stmt[i];
        if let Some(q) = quote_char {
            if b == q {
                let name = &stmt[start..i];
                return Some(String::from_utf8_lossy(name).into_owned());
            }
        } else if is_whitespace(b) || b == b'(' || b == b';' || b == b',' {
            if i > start {
                let name = &stmt[start..i];
                return Some(String::from_utf8_lossy(name).into_owned());
            }
            return None;
        }
        i += 1;
    }

    if quote_char.is_none() && i > start {
        let name = &stmt[start..i];
        return Some(String::from_utf8_lossy(name).into_owned());
    }

    None
}

#[inline]
fn is_whitespace(b: u8) -> bool {
    matches!(b, b' ' | b'\t' | b'\n' | b'\r')
}
