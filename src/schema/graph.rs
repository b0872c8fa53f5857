//! Reverse foreign-key index.
//!
//! Foreign keys are declared by the referencing (child) table. Anonymization
//! needs the opposite direction: given a column about to change, which other
//! columns point at it and must be rewritten too.

use super::Schema;
use ahash::{AHashMap, AHashSet};
use std::collections::VecDeque;

/// A (table, column) pair holding foreign-key values
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FkRef {
    pub table: String,
    pub column: String,
}

impl FkRef {
    pub fn new(table: impl Into<String>, column: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            column: column.into(),
        }
    }
}

impl std::fmt::Display for FkRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{}", self.table, self.column)
    }
}

/// FK fan-out of one anonymization rule: for every requested column that is
/// an FK target, the columns referencing it. Columns absent from the map are
/// referenced by nothing.
#[derive(Debug, Default, Clone)]
pub struct FanOut {
    by_column: AHashMap<String, Vec<FkRef>>,
}

impl FanOut {
    /// Whether changes to this column must be kept consistent elsewhere
    pub fn contains(&self, column: &str) -> bool {
        self.by_column.contains_key(column)
    }

    /// Referencers of a target column
    pub fn referencers(&self, column: &str) -> &[FkRef] {
        self.by_column
            .get(column)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Total number of (table, column) pairs in the fan-out
    pub fn len(&self) -> usize {
        self.by_column.values().map(|v| v.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.by_column.is_empty()
    }
}

/// Index from referenced (table, column) to the columns referencing it
#[derive(Debug, Default)]
pub struct ReferenceIndex {
    referenced_by: AHashMap<FkRef, Vec<FkRef>>,
}

impl ReferenceIndex {
    /// Build the index from every FK declared in the schema.
    ///
    /// Referencers are listed in schema declaration order.
    pub fn from_schema(schema: &Schema) -> Self {
        let mut referenced_by: AHashMap<FkRef, Vec<FkRef>> = AHashMap::new();

        for table in schema.iter() {
            for fk in &table.foreign_keys {
                let target = FkRef::new(&fk.referenced_table, &fk.referenced_column);
                let source = FkRef::new(&table.name, &fk.column_name);
                let entry = referenced_by.entry(target).or_default();
                if !entry.contains(&source) {
                    entry.push(source);
                }
            }
        }

        Self { referenced_by }
    }

    /// Columns directly referencing `table.column`
    pub fn referencing(&self, table: &str, column: &str) -> &[FkRef] {
        self.referenced_by
            .get(&FkRef::new(table, column))
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    /// Whether any FK targets `table.column`
    pub fn is_fk_target(&self, table: &str, column: &str) -> bool {
        !self.referencing(table, column).is_empty()
    }

    /// Direct fan-out of a set of columns of one table
    pub fn fan_out<S: AsRef<str>>(&self, table: &str, columns: &[S]) -> FanOut {
        let mut by_column = AHashMap::new();
        for column in columns {
            let column = column.as_ref();
            let refs = self.referencing(table, column);
            if !refs.is_empty() {
                by_column.insert(column.to_string(), refs.to_vec());
            }
        }
        FanOut { by_column }
    }

    /// Every column reachable from `table.column` by following FKs backwards,
    /// breadth-first. The starting column is never included; cycles stop at
    /// already-visited columns.
    pub fn transitive_referencers(&self, table: &str, column: &str) -> Vec<FkRef> {
        let start = FkRef::new(table, column);
        let mut visited: AHashSet<FkRef> = AHashSet::new();
        visited.insert(start.clone());

        let mut order = Vec::new();
        let mut queue = VecDeque::from([start]);

        while let Some(current) = queue.pop_front() {
            for next in self.referencing(&current.table, &current.column) {
                if visited.insert(next.clone()) {
                    order.push(next.clone());
                    queue.push_back(next.clone());
                }
            }
        }

        order
    }
}
