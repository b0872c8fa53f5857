//! MySQL INSERT aggregation.
//!
//! Every INSERT statement in the dump is parsed into rows of raw field
//! tokens. Statements targeting the same table are merged into one
//! [`InsertRecord`]: the first statement fixes the column list, later ones
//! append their rows in dump order.

use super::tokenizer::{split_fields, split_rows};
use super::{DumpScanner, DumpSegment, InsertStatement};
use crate::error::{AnonymizeError, Result};
use crate::schema::Schema;
use ahash::AHashMap;
use once_cell::sync::Lazy;
use regex::Regex;

/// Header of an INSERT statement: table, optional column list, VALUES keyword
static INSERT_HEADER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?is)^\s*INSERT\s+INTO\s+[`"]?[^\s`"(]+[`"]?\s*(?:\(([^)]*)\))?\s*VALUES\b"#)
        .unwrap()
});

/// One row: raw literal tokens in column order
pub type Row = Vec<String>;

/// All rows of one table, consolidated across INSERT statements
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertRecord {
    /// Lower-cased table name
    pub table_name: String,
    /// Column names as listed by the first INSERT (or the schema order)
    pub columns: Vec<String>,
    /// Rows in dump order
    pub rows: Vec<Row>,
}

impl InsertRecord {
    pub fn new(table_name: String, columns: Vec<String>) -> Self {
        Self {
            table_name,
            columns,
            rows: Vec::new(),
        }
    }

    /// Position of a column in each row
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns
            .iter()
            .position(|c| c.eq_ignore_ascii_case(name))
    }

    /// Render the consolidated single-statement form.
    ///
    /// Every column name is backtick-quoted so reserved words survive.
    pub fn to_statement(&self) -> String {
        let columns: Vec<String> = self.columns.iter().map(|c| format!("`{}`", c)).collect();
        let rows: Vec<String> = self
            .rows
            .iter()
            .map(|row| format!("({})", row.join(",")))
            .collect();

        format!(
            "INSERT INTO `{}` ({}) VALUES {};",
            self.table_name,
            columns.join(","),
            rows.join(",")
        )
    }
}

/// Table name → consolidated INSERT record, remembering first-seen order
#[derive(Debug, Default, Clone)]
pub struct InsertMap {
    records: AHashMap<String, InsertRecord>,
    order: Vec<String>,
}

impl InsertMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, table: &str) -> Option<&InsertRecord> {
        self.records.get(table)
    }

    pub fn get_mut(&mut self, table: &str) -> Option<&mut InsertRecord> {
        self.records.get_mut(table)
    }

    pub fn contains(&self, table: &str) -> bool {
        self.records.contains_key(table)
    }

    /// Merge a record: a new table is added, an existing one gets the rows
    /// appended. Rows listing the same columns in another order are remapped
    /// to the first statement's order; any other column list is rejected.
    pub fn merge(&mut self, record: InsertRecord, line: usize) -> Result<()> {
        let Some(existing) = self.records.get_mut(&record.table_name) else {
            self.order.push(record.table_name.clone());
            self.records.insert(record.table_name.clone(), record);
            return Ok(());
        };

        if existing.columns == record.columns {
            existing.rows.extend(record.rows);
            return Ok(());
        }

        let positions: Option<Vec<usize>> = if existing.columns.len() == record.columns.len() {
            existing
                .columns
                .iter()
                .map(|c| record.column_index(c))
                .collect()
        } else {
            None
        };
        let Some(positions) = positions else {
            tracing::error!(
                table = %record.table_name,
                line,
                expected = ?existing.columns,
                found = ?record.columns,
                "INSERT column list differs from the table's first INSERT"
            );
            return Err(AnonymizeError::TokenizationMismatch {
                table: record.table_name,
                line,
                row: 1,
                expected: existing.columns.len(),
                found: record.columns.len(),
            });
        };

        for (row_idx, row) in record.rows.into_iter().enumerate() {
            let remapped: Option<Row> = positions.iter().map(|&i| row.get(i).cloned()).collect();
            match remapped {
                Some(remapped) => existing.rows.push(remapped),
                None => {
                    return Err(AnonymizeError::TokenizationMismatch {
                        table: record.table_name,
                        line,
                        row: row_idx + 1,
                        expected: existing.columns.len(),
                        found: row.len(),
                    })
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records in the order their tables first appeared in the dump
    pub fn iter(&self) -> impl Iterator<Item = &InsertRecord> {
        self.order.iter().filter_map(|name| self.records.get(name))
    }

    /// Total number of rows across all tables
    pub fn total_rows(&self) -> usize {
        self.records.values().map(|r| r.rows.len()).sum()
    }
}

/// Parse one INSERT statement into a record.
///
/// Without an explicit column list the table's schema column order is used.
/// Every row must tokenize to exactly as many fields as there are columns.
pub fn parse_insert_statement(stmt: &InsertStatement<'_>, schema: &Schema) -> Result<InsertRecord> {
    let text = stmt.text();

    let caps = INSERT_HEADER_RE
        .captures(&text)
        .ok_or_else(|| AnonymizeError::SchemaParse {
            table: stmt.table.clone(),
            line: stmt.line,
            message: "INSERT statement missing VALUES keyword".to_string(),
        })?;

    let columns = match caps.get(1) {
        Some(list) => parse_column_list(list.as_str()),
        None => schema
            .get_table(&stmt.table)
            .map(|t| t.column_names())
            .ok_or_else(|| AnonymizeError::MissingColumnList {
                table: stmt.table.clone(),
                line: stmt.line,
            })?,
    };

    let values_start = caps.get(0).map(|m| m.end()).unwrap_or(text.len());
    let mut record = InsertRecord::new(stmt.table.clone(), columns);

    for (row_idx, fragment) in split_rows(&text[values_start..]).into_iter().enumerate() {
        let fields = split_fields(fragment);
        if fields.len() != record.columns.len() {
            return Err(AnonymizeError::TokenizationMismatch {
                table: stmt.table.clone(),
                line: stmt.line,
                row: row_idx + 1,
                expected: record.columns.len(),
                found: fields.len(),
            });
        }
        record.rows.push(fields);
    }

    Ok(record)
}

/// Scan the dump and consolidate all INSERT statements per table
pub fn aggregate_inserts(dump: &str, schema: &Schema) -> Result<InsertMap> {
    let mut inserts = InsertMap::new();

    for segment in DumpScanner::new(dump) {
        let DumpSegment::Insert(stmt) = segment else {
            continue;
        };

        let record = parse_insert_statement(&stmt, schema)?;
        if record.rows.is_empty() {
            tracing::warn!(
                table = %stmt.table,
                line = stmt.line,
                "INSERT statement has no rows, leaving it untouched"
            );
            continue;
        }
        tracing::trace!(table = %stmt.table, rows = record.rows.len(), "parsed INSERT");
        inserts.merge(record, stmt.line)?;
    }

    Ok(inserts)
}

/// Parse a comma-separated column list, stripping quotes and lower-casing
fn parse_column_list(s: &str) -> Vec<String> {
    s.split(',')
        .map(|c| c.trim().trim_matches('`').trim_matches('"').to_lowercase())
        .filter(|c| !c.is_empty())
        .collect()
}
