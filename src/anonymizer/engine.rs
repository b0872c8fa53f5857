//! FK-consistent anonymization of consolidated INSERT records.
//!
//! Rules are applied in request order. For each rule the requested columns
//! are rewritten; columns that other tables reference get a value map
//! (original literal → replacement) that is then pushed into every
//! referencing column, so joins keep working after anonymization.

use super::config::{ChangeRequest, TableRule};
use super::generator::{FieldContext, ValueGenerator};
use crate::error::{AnonymizeError, Result};
use crate::parser::tokenizer::is_null_literal;
use crate::parser::InsertMap;
use crate::schema::{FkRef, ReferenceIndex, Schema, SqlType};
use ahash::{AHashMap, AHashSet};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Original literal → replacement literal, for one FK-target column
pub type ValueMap = AHashMap<String, String>;

/// Literal written into referencing rows whose value has no mapping
const NULL_LITERAL: &str = "NULL";

/// Result of propagating one value map into one referencing column
#[derive(Debug, Clone)]
pub struct PropagatedColumn {
    pub target: FkRef,
    /// Old value → value now stored in the referencing column
    pub derived: ValueMap,
    pub mapped: u64,
    pub nulled: u64,
}

/// Rewrite every referencing column through the value map.
///
/// A non-NULL value without a mapping is an orphan and becomes `NULL`;
/// `NULL` stays `NULL`. Targets with no INSERT data, or whose INSERT column
/// list omits the column, are left alone.
pub fn propagate(
    mut inserts: InsertMap,
    value_map: &ValueMap,
    targets: &[FkRef],
) -> (InsertMap, Vec<PropagatedColumn>) {
    let mut results = Vec::with_capacity(targets.len());

    for target in targets {
        let Some(record) = inserts.get_mut(&target.table) else {
            debug!(target = %target, "referencing table has no rows");
            continue;
        };
        let Some(idx) = record.column_index(&target.column) else {
            warn!(target = %target, "referencing column missing from INSERT column list");
            continue;
        };

        let mut result = PropagatedColumn {
            target: target.clone(),
            derived: ValueMap::new(),
            mapped: 0,
            nulled: 0,
        };

        for row in &mut record.rows {
            let current = &row[idx];
            if is_null_literal(current) {
                continue;
            }
            let replacement = match value_map.get(current) {
                Some(new) if is_null_literal(new) => {
                    result.nulled += 1;
                    new.clone()
                }
                Some(new) => {
                    result.mapped += 1;
                    new.clone()
                }
                None => {
                    result.nulled += 1;
                    NULL_LITERAL.to_string()
                }
            };
            result
                .derived
                .insert(current.clone(), replacement.clone());
            row[idx] = replacement;
        }

        debug!(
            target = %target,
            mapped = result.mapped,
            nulled = result.nulled,
            "propagated values"
        );
        results.push(result);
    }

    (inserts, results)
}

/// Per-table counters
#[derive(Debug, Default, Clone, Serialize)]
pub struct TableAnonymizeStats {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: u64,
    pub values_generated: u64,
    pub values_propagated: u64,
    pub orphans_nulled: u64,
}

/// A rule that was skipped and why
#[derive(Debug, Clone, Serialize)]
pub struct SkippedRule {
    pub table: String,
    pub reason: String,
}

/// Counters for a whole change request
#[derive(Debug, Default, Clone, Serialize)]
pub struct EngineStats {
    pub tables: Vec<TableAnonymizeStats>,
    pub skipped: Vec<SkippedRule>,
}

impl EngineStats {
    pub fn values_generated(&self) -> u64 {
        self.tables.iter().map(|t| t.values_generated).sum()
    }

    pub fn values_propagated(&self) -> u64 {
        self.tables.iter().map(|t| t.values_propagated).sum()
    }

    pub fn orphans_nulled(&self) -> u64 {
        self.tables.iter().map(|t| t.orphans_nulled).sum()
    }

    pub fn rows_touched(&self) -> u64 {
        self.tables.iter().map(|t| t.rows).sum()
    }
}

/// Applies a change request to consolidated INSERT records
pub struct Engine<'s> {
    schema: &'s Schema,
    index: ReferenceIndex,
    generator: ValueGenerator,
    transitive: bool,
    progress_fn: Option<Box<dyn Fn(u64)>>,
}

impl<'s> Engine<'s> {
    pub fn new(schema: &'s Schema, generator: ValueGenerator) -> Self {
        Self {
            schema,
            index: ReferenceIndex::from_schema(schema),
            generator,
            transitive: false,
            progress_fn: None,
        }
    }

    /// Follow FK chains beyond the direct referencers
    pub fn with_transitive(mut self, transitive: bool) -> Self {
        self.transitive = transitive;
        self
    }

    /// Called with the number of rules processed so far
    pub fn with_progress<F: Fn(u64) + 'static>(mut self, f: F) -> Self {
        self.progress_fn = Some(Box::new(f));
        self
    }

    /// Apply every rule in order and return the rewritten records
    pub fn anonymize(
        &mut self,
        mut inserts: InsertMap,
        request: &ChangeRequest,
    ) -> Result<(InsertMap, EngineStats)> {
        let mut stats = EngineStats::default();

        for (i, rule) in request.iter().enumerate() {
            if self.schema.get_table(&rule.table_name).is_none() {
                let err = AnonymizeError::UnknownTable {
                    table: rule.table_name.clone(),
                };
                warn!("{}, skipping", err);
                stats.skipped.push(SkippedRule {
                    table: rule.table_name.clone(),
                    reason: err.to_string(),
                });
            } else if !inserts.contains(&rule.table_name) {
                warn!(table = %rule.table_name, "table has no INSERT data, skipping");
                stats.skipped.push(SkippedRule {
                    table: rule.table_name.clone(),
                    reason: "no INSERT data".to_string(),
                });
            } else {
                let (next, table_stats) = self.apply_rule(inserts, rule)?;
                inserts = next;
                info!(
                    table = %table_stats.name,
                    rows = table_stats.rows,
                    generated = table_stats.values_generated,
                    propagated = table_stats.values_propagated,
                    nulled = table_stats.orphans_nulled,
                    "anonymized table"
                );
                stats.tables.push(table_stats);
            }

            if let Some(ref f) = self.progress_fn {
                f(i as u64 + 1);
            }
        }

        Ok((inserts, stats))
    }

    fn apply_rule(
        &mut self,
        mut inserts: InsertMap,
        rule: &TableRule,
    ) -> Result<(InsertMap, TableAnonymizeStats)> {
        let table = rule.table_name.as_str();
        let table_schema = self
            .schema
            .get_table(table)
            .ok_or_else(|| AnonymizeError::UnknownTable {
                table: table.to_string(),
            })?;
        let record = inserts
            .get_mut(table)
            .ok_or_else(|| AnonymizeError::UnknownTable {
                table: table.to_string(),
            })?;

        let fan_out = self.index.fan_out(table, &rule.column_names());
        let mut stats = TableAnonymizeStats {
            name: table.to_string(),
            columns: rule.column_names().iter().map(|c| c.to_string()).collect(),
            rows: record.rows.len() as u64,
            ..Default::default()
        };

        let mut value_maps: Vec<(String, ValueMap)> = Vec::new();

        for column_rule in &rule.columns_to_change {
            let column = column_rule.name.as_str();
            let idx = record
                .column_index(column)
                .ok_or_else(|| AnonymizeError::UnknownColumn {
                    table: table.to_string(),
                    column: column.to_string(),
                })?;
            let sql_type = table_schema
                .get_column(column)
                .map(|c| c.sql_type.clone())
                .unwrap_or_else(|| SqlType::Other(String::new()));

            let mut value_map = fan_out.contains(column).then(ValueMap::new);

            for (row_index, row) in record.rows.iter_mut().enumerate() {
                let original = &row[idx];
                if is_null_literal(original) {
                    continue;
                }
                if let Some(existing) = value_map.as_ref().and_then(|m| m.get(original)) {
                    row[idx] = existing.clone();
                    continue;
                }

                let ctx = FieldContext {
                    table,
                    column,
                    sql_type: &sql_type,
                    row_index,
                    original,
                };
                let replacement = self.generator.generate(column_rule, &ctx)?;
                stats.values_generated += 1;

                if let Some(map) = value_map.as_mut() {
                    map.insert(original.clone(), replacement.clone());
                }
                row[idx] = replacement;
            }

            if let Some(map) = value_map {
                debug!(table, column, distinct = map.len(), "built value map");
                value_maps.push((column.to_string(), map));
            }
        }

        for (column, map) in value_maps {
            let direct = fan_out.referencers(&column);
            let (next, results) = propagate(inserts, &map, direct);
            inserts = next;

            if self.transitive {
                inserts = self.propagate_transitive(inserts, &column, table, results, &mut stats);
            } else {
                for r in &results {
                    stats.values_propagated += r.mapped;
                    stats.orphans_nulled += r.nulled;
                }
            }
        }

        Ok((inserts, stats))
    }

    /// Keep following referencers of rewritten columns until every reachable
    /// column has been visited once
    fn propagate_transitive(
        &self,
        mut inserts: InsertMap,
        column: &str,
        table: &str,
        first_hop: Vec<PropagatedColumn>,
        stats: &mut TableAnonymizeStats,
    ) -> InsertMap {
        let mut visited: AHashSet<FkRef> = AHashSet::new();
        visited.insert(FkRef::new(table, column));
        for target in self.index.referencing(table, column) {
            visited.insert(target.clone());
        }

        let mut pending = first_hop;
        while let Some(done) = pending.pop() {
            stats.values_propagated += done.mapped;
            stats.orphans_nulled += done.nulled;

            let next_targets: Vec<FkRef> = self
                .index
                .referencing(&done.target.table, &done.target.column)
                .iter()
                .filter(|t| visited.insert((*t).clone()))
                .cloned()
                .collect();
            if next_targets.is_empty() {
                continue;
            }

            debug!(from = %done.target, count = next_targets.len(), "following FK chain");
            let (next, results) = propagate(inserts, &done.derived, &next_targets);
            inserts = next;
            pending.extend(results);
        }

        inserts
    }
}
