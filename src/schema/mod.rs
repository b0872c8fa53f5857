//! Schema model for FK-aware anonymization.
//!
//! This module provides:
//! - Data models for tables, columns, and foreign keys
//! - Line-oriented MySQL DDL extraction (`CREATE TABLE` blocks in a dump)
//! - A reverse FK index answering "who references this column?"

mod ddl;
mod graph;

pub use ddl::*;
pub use graph::*;

use ahash::AHashMap;
use std::fmt;

/// Unique identifier for a table within a schema
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TableId(pub u32);

/// Unique identifier for a column within a table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ColumnId(pub u16);

/// Declared SQL type, classified once at extraction time.
///
/// Only the kinds that change how replacement values are generated get their
/// own variant; everything else is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlType {
    /// `datetime`, `datetime(6)`
    DateTime,
    /// `date`
    Date,
    /// `float`, `float(8,2)`
    Float,
    /// `int`, `int(11)`
    Int,
    /// `tinyint`, `tinyint(1)`
    TinyInt,
    /// `enum('a','b')` with the quoted values pre-split
    Enum(Vec<String>),
    /// Any other type
    Other(String),
}

impl SqlType {
    /// Classify a declared MySQL type token
    pub fn from_mysql_type(type_str: &str) -> Self {
        let type_lower = type_str.trim().to_lowercase();
        let base_type = type_lower
            .split('(')
            .next()
            .unwrap_or(&type_lower)
            .trim();

        if base_type.starts_with("datetime") {
            return SqlType::DateTime;
        }
        if base_type.starts_with("tinyint") {
            return SqlType::TinyInt;
        }
        if base_type.starts_with("enum") {
            return SqlType::Enum(parse_enum_values(type_str));
        }

        match base_type {
            "date" => SqlType::Date,
            "float" => SqlType::Float,
            "int" => SqlType::Int,
            _ => SqlType::Other(type_lower),
        }
    }
}

impl fmt::Display for SqlType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlType::DateTime => write!(f, "datetime"),
            SqlType::Date => write!(f, "date"),
            SqlType::Float => write!(f, "float"),
            SqlType::Int => write!(f, "int"),
            SqlType::TinyInt => write!(f, "tinyint"),
            SqlType::Enum(values) => write!(f, "enum({})", values.join(",")),
            SqlType::Other(raw) => write!(f, "{}", raw),
        }
    }
}

/// Split the value list of an `enum(...)` type, keeping each value quoted.
///
/// Commas inside quoted values do not split.
fn parse_enum_values(type_str: &str) -> Vec<String> {
    let Some(open) = type_str.find('(') else {
        return Vec::new();
    };
    let close = type_str.rfind(')').unwrap_or(type_str.len());
    if close <= open {
        return Vec::new();
    }
    let body = &type_str[open + 1..close];

    let mut values = Vec::new();
    let mut current = String::new();
    let mut in_string = false;
    let mut escape_next = false;

    for ch in body.chars() {
        if escape_next {
            current.push(ch);
            escape_next = false;
            continue;
        }
        match ch {
            '\\' if in_string => {
                current.push(ch);
                escape_next = true;
            }
            '\'' => {
                in_string = !in_string;
                current.push(ch);
            }
            ',' if !in_string => {
                values.push(current.trim().to_string());
                current.clear();
            }
            _ => current.push(ch),
        }
    }
    if !current.trim().is_empty() {
        values.push(current.trim().to_string());
    }

    values.retain(|v| !v.is_empty());
    values
}

/// Column definition within a table
#[derive(Debug, Clone)]
pub struct Column {
    /// Column name (lower-cased)
    pub name: String,
    /// Classified type
    pub sql_type: SqlType,
    /// Declared type token as written in the dump
    pub raw_type: String,
    /// Position in table (0-indexed)
    pub ordinal: ColumnId,
}

/// Foreign key constraint, single column on both sides
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    /// Constraint name
    pub name: String,
    /// Local column holding the reference
    pub column_name: String,
    /// Referenced table name
    pub referenced_table: String,
    /// Referenced column name
    pub referenced_column: String,
}

/// Complete table schema definition
#[derive(Debug, Clone)]
pub struct TableSchema {
    /// Table name (lower-cased)
    pub name: String,
    /// Table ID within the schema
    pub id: TableId,
    /// Column definitions in declaration order
    pub columns: Vec<Column>,
    /// Foreign key constraints declared by this table
    pub foreign_keys: Vec<ForeignKey>,
}

impl TableSchema {
    /// Create a new empty table schema
    pub fn new(name: String, id: TableId) -> Self {
        Self {
            name,
            id,
            columns: Vec::new(),
            foreign_keys: Vec::new(),
        }
    }

    /// Get a column by name
    pub fn get_column(&self, name: &str) -> Option<&Column> {
        self.columns
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    /// Column names in declaration order
    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }
}

/// Complete database schema
#[derive(Debug)]
pub struct Schema {
    /// Map from table name to table ID
    pub tables: AHashMap<String, TableId>,
    /// Table schemas indexed by TableId
    pub table_schemas: Vec<TableSchema>,
}

impl Schema {
    /// Create a new empty schema
    pub fn new() -> Self {
        Self {
            tables: AHashMap::new(),
            table_schemas: Vec::new(),
        }
    }

    /// Get table ID by name (case-insensitive)
    pub fn get_table_id(&self, name: &str) -> Option<TableId> {
        if let Some(&id) = self.tables.get(name) {
            return Some(id);
        }
        let name_lower = name.to_lowercase();
        self.tables.get(&name_lower).copied()
    }

    /// Get table schema by ID
    pub fn table(&self, id: TableId) -> Option<&TableSchema> {
        self.table_schemas.get(id.0 as usize)
    }

    /// Get table schema by name
    pub fn get_table(&self, name: &str) -> Option<&TableSchema> {
        self.get_table_id(name).and_then(|id| self.table(id))
    }

    /// Add a new table schema, returning its ID.
    ///
    /// A second definition of the same table name replaces the first.
    pub fn add_table(&mut self, mut schema: TableSchema) -> TableId {
        if let Some(id) = self.tables.get(&schema.name).copied() {
            schema.id = id;
            self.table_schemas[id.0 as usize] = schema;
            return id;
        }
        let id = TableId(self.table_schemas.len() as u32);
        schema.id = id;
        self.tables.insert(schema.name.clone(), id);
        self.table_schemas.push(schema);
        id
    }

    /// Get the number of tables
    pub fn len(&self) -> usize {
        self.table_schemas.len()
    }

    /// Check if schema is empty
    pub fn is_empty(&self) -> bool {
        self.table_schemas.is_empty()
    }

    /// Iterate over all table schemas
    pub fn iter(&self) -> impl Iterator<Item = &TableSchema> {
        self.table_schemas.iter()
    }
}

impl Default for Schema {
    fn default() -> Self {
        Self::new()
    }
}
