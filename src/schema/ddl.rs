//! MySQL DDL extraction from dump text.
//!
//! mysqldump writes one column or constraint per line inside a `CREATE TABLE`
//! block. The extractor walks the dump line by line and classifies every line
//! following `CREATE TABLE` by its prefix:
//! - column declarations (start with a backtick)
//! - key/index declarations (no structural effect)
//! - `CONSTRAINT ... FOREIGN KEY` declarations
//!
//! The first line matching none of these ends the block, so column and
//! constraint lines must be contiguous.

use super::{Column, ColumnId, ForeignKey, Schema, SqlType, TableId, TableSchema};
use crate::error::{AnonymizeError, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Regex to extract table name from CREATE TABLE
static CREATE_TABLE_NAME_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?i)^CREATE\s+TABLE\s+(?:IF\s+NOT\s+EXISTS\s+)?(?:`[^`]+`\s*\.\s*)?`?([^`\s(]+)`?"#)
        .unwrap()
});

/// Regex for a FOREIGN KEY constraint line
/// Example: CONSTRAINT `fk-test-tracker` FOREIGN KEY (`tracker_code`) REFERENCES `tracker` (`code`)
static FOREIGN_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^CONSTRAINT\s+`([^`]+)`\s+FOREIGN\s+KEY\s*\(`([^`]+)`\)\s*REFERENCES\s+(?:`[^`]+`\s*\.\s*)?`([^`]+)`\s*\(`([^`]+)`\)",
    )
    .unwrap()
});

/// Key/index declarations inside a CREATE TABLE block
const KEY_PREFIXES: &[&str] = &[
    "primary key",
    "unique key",
    "unique index",
    "unique ",
    "key",
    "index",
    "fulltext",
    "spatial",
];

/// Classification of one line inside a CREATE TABLE block
#[derive(Debug, PartialEq, Eq)]
enum BlockLine {
    Column,
    Key,
    Constraint,
    End,
}

fn classify_block_line(lower: &str) -> BlockLine {
    if lower.starts_with('`') {
        BlockLine::Column
    } else if lower.starts_with("constraint") {
        BlockLine::Constraint
    } else if KEY_PREFIXES.iter().any(|p| lower.starts_with(p)) {
        BlockLine::Key
    } else {
        BlockLine::End
    }
}

/// Builder for constructing a schema from dump text
#[derive(Debug, Default)]
pub struct SchemaBuilder {
    schema: Schema,
}

impl SchemaBuilder {
    /// Create a new schema builder
    pub fn new() -> Self {
        Self {
            schema: Schema::new(),
        }
    }

    /// Scan a whole dump and add every CREATE TABLE block to the schema.
    ///
    /// A malformed block aborts the scan: FK resolution downstream needs the
    /// complete schema.
    pub fn parse_dump(&mut self, dump: &str) -> Result<()> {
        let mut lines = dump.lines().enumerate().peekable();

        while let Some((idx, line)) = lines.next() {
            let trimmed = line.trim();
            if !trimmed.to_lowercase().starts_with("create table") {
                continue;
            }

            let table_name = extract_create_table_name(trimmed).ok_or_else(|| {
                AnonymizeError::SchemaParse {
                    table: String::new(),
                    line: idx + 1,
                    message: format!("cannot read table name from '{}'", trimmed),
                }
            })?;

            let mut table = TableSchema::new(table_name, TableId(0));

            while let Some(&(body_idx, body_line)) = lines.peek() {
                let body = body_line.trim();
                let lower = body.to_lowercase();

                match classify_block_line(&lower) {
                    BlockLine::End => break,
                    BlockLine::Key => {}
                    BlockLine::Column => {
                        let ordinal = ColumnId(table.columns.len() as u16);
                        let column = parse_column_line(body, ordinal).ok_or_else(|| {
                            AnonymizeError::SchemaParse {
                                table: table.name.clone(),
                                line: body_idx + 1,
                                message: format!("malformed column declaration '{}'", body),
                            }
                        })?;
                        table.columns.push(column);
                    }
                    BlockLine::Constraint => {
                        if let Some(fk) = parse_foreign_key_line(body) {
                            table.foreign_keys.push(fk);
                        } else if !lower.contains(" check") {
                            return Err(AnonymizeError::SchemaParse {
                                table: table.name.clone(),
                                line: body_idx + 1,
                                message: format!("malformed constraint '{}'", body),
                            });
                        }
                    }
                }
                lines.next();
            }

            self.schema.add_table(table);
        }

        Ok(())
    }

    /// Finalize the schema
    pub fn build(self) -> Schema {
        self.schema
    }
}

/// Extract the schema of every table defined in a dump
pub fn extract_schema(dump: &str) -> Result<Schema> {
    let mut builder = SchemaBuilder::new();
    builder.parse_dump(dump)?;
    Ok(builder.build())
}

/// Extract the lower-cased table name from a CREATE TABLE line
pub fn extract_create_table_name(line: &str) -> Option<String> {
    CREATE_TABLE_NAME_RE
        .captures(line.trim())
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
}

/// Parse a column declaration into name + leading type token.
///
/// `` `status` enum('in progress','done') NOT NULL, `` yields
/// `status` / `enum('in progress','done')`.
fn parse_column_line(line: &str, ordinal: ColumnId) -> Option<Column> {
    let rest = line.strip_prefix('`')?;
    let name_end = rest.find('`')?;
    let name = rest[..name_end].to_lowercase();
    if name.is_empty() {
        return None;
    }

    let raw_type = leading_type_token(rest[name_end + 1..].trim_start())?;

    Some(Column {
        name,
        sql_type: SqlType::from_mysql_type(raw_type),
        raw_type: raw_type.to_string(),
        ordinal,
    })
}

/// Read a type word plus its optional parenthesized, quote-aware argument list
fn leading_type_token(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    let mut pos = 0;

    while pos < bytes.len() && (bytes[pos].is_ascii_alphanumeric() || bytes[pos] == b'_') {
        pos += 1;
    }
    if pos == 0 {
        return None;
    }

    if pos < bytes.len() && bytes[pos] == b'(' {
        let mut depth = 0;
        let mut in_string = false;
        let mut escape_next = false;

        while pos < bytes.len() {
            let b = bytes[pos];
            pos += 1;

            if escape_next {
                escape_next = false;
                continue;
            }
            if b == b'\\' && in_string {
                escape_next = true;
                continue;
            }
            if b == b'\'' {
                in_string = !in_string;
                continue;
            }
            if in_string {
                continue;
            }
            if b == b'(' {
                depth += 1;
            } else if b == b')' {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
        }
        if depth != 0 {
            return None;
        }
    }

    Some(&s[..pos])
}

/// Parse a `CONSTRAINT ... FOREIGN KEY ... REFERENCES ...` line
fn parse_foreign_key_line(line: &str) -> Option<ForeignKey> {
    let caps = FOREIGN_KEY_RE.captures(line)?;
    Some(ForeignKey {
        name: caps.get(1)?.as_str().to_lowercase(),
        column_name: caps.get(2)?.as_str().to_lowercase(),
        referenced_table: caps.get(3)?.as_str().to_lowercase(),
        referenced_column: caps.get(4)?.as_str().to_lowercase(),
    })
}
