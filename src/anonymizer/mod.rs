//! Anonymize a MySQL dump while keeping foreign keys consistent.
//!
//! The pipeline is: extract the schema from the CREATE TABLE blocks,
//! consolidate every INSERT per table, apply the change request, then write
//! the dump back with each table's INSERTs replaced by one statement.

pub mod config;
pub mod engine;
pub mod generator;
pub mod pattern;

pub use config::{
    AnonymizeConfig, AnonymizeConfigBuilder, ChangeRequest, ChangeRequestFile, ColumnRule,
    Subtype, TableRule,
};
pub use engine::{propagate, Engine, EngineStats, SkippedRule, TableAnonymizeStats, ValueMap};
pub use generator::{FieldContext, ValueGenerator};
pub use pattern::PatternGenerator;

use crate::error::{AnonymizeError, Result};
use crate::input::read_dump;
use crate::parser::aggregate_inserts;
use crate::schema::{extract_schema, Schema};
use crate::writer::{create_output, reassemble, ReassembleStats};
use serde::Serialize;
use std::io::Write;
use std::time::Instant;
use tracing::info;

/// Statistics from an anonymization run
#[derive(Debug, Default, Serialize)]
pub struct AnonymizeStats {
    /// Tables whose rules were applied
    pub tables_anonymized: usize,
    /// Rows in anonymized tables
    pub rows_touched: u64,
    /// Fresh replacement values
    pub values_generated: u64,
    /// FK values rewritten through a value map
    pub values_propagated: u64,
    /// FK values without a mapping, set to NULL
    pub orphans_nulled: u64,
    /// INSERT statements written
    pub statements_written: u64,
    /// Later INSERT statements merged into the first one
    pub statements_merged: u64,
    /// Wall-clock time for the run
    pub elapsed_ms: u64,
    /// Rules that were skipped
    pub skipped: Vec<SkippedRule>,
    /// Per-table statistics
    pub table_stats: Vec<TableAnonymizeStats>,
}

impl AnonymizeStats {
    fn from_engine(engine: EngineStats) -> Self {
        Self {
            tables_anonymized: engine.tables.len(),
            rows_touched: engine.rows_touched(),
            values_generated: engine.values_generated(),
            values_propagated: engine.values_propagated(),
            orphans_nulled: engine.orphans_nulled(),
            skipped: engine.skipped,
            table_stats: engine.tables,
            ..Default::default()
        }
    }
}

/// A rule that refers to something the dump does not define
#[derive(Debug, Clone, Serialize)]
pub struct RuleProblem {
    pub table: String,
    pub column: Option<String>,
    pub message: String,
}

/// Main anonymizer struct
pub struct Anonymizer {
    config: AnonymizeConfig,
    progress_fn: Option<Box<dyn Fn(u64)>>,
}

impl Anonymizer {
    pub fn new(config: AnonymizeConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            progress_fn: None,
        })
    }

    /// Called with the number of table rules processed so far
    pub fn with_progress<F: Fn(u64) + 'static>(mut self, f: F) -> Self {
        self.progress_fn = Some(Box::new(f));
        self
    }

    /// Read the input, anonymize it and write the output (unless dry-run)
    pub fn run(&mut self) -> Result<AnonymizeStats> {
        let start = Instant::now();
        let dump = read_dump(&self.config.input)?;

        let mut stats = if self.config.dry_run {
            self.anonymize_into(&dump, &mut std::io::sink())?
        } else {
            let mut output = create_output(self.config.output.as_deref()).map_err(|e| {
                AnonymizeError::io(format!("creating output {}", self.output_display()), e)
            })?;
            let stats = self.anonymize_into(&dump, &mut output)?;
            output
                .flush()
                .map_err(|e| AnonymizeError::io("flushing output", e))?;
            stats
        };

        stats.elapsed_ms = start.elapsed().as_millis() as u64;
        info!(
            tables = stats.tables_anonymized,
            generated = stats.values_generated,
            propagated = stats.values_propagated,
            elapsed_ms = stats.elapsed_ms,
            "anonymization complete"
        );
        Ok(stats)
    }

    /// Anonymize an in-memory dump and return the rewritten text
    pub fn anonymize_str(&mut self, dump: &str) -> Result<(String, AnonymizeStats)> {
        let mut buf = Vec::with_capacity(dump.len());
        let stats = self.anonymize_into(dump, &mut buf)?;
        Ok((String::from_utf8_lossy(&buf).into_owned(), stats))
    }

    fn anonymize_into<W: Write>(&mut self, dump: &str, out: &mut W) -> Result<AnonymizeStats> {
        let schema = extract_schema(dump)?;
        info!(tables = schema.len(), "extracted schema");

        let inserts = aggregate_inserts(dump, &schema)?;
        info!(
            tables = inserts.len(),
            rows = inserts.total_rows(),
            "consolidated INSERT statements"
        );

        let generator = ValueGenerator::new(self.config.seed);
        let mut engine = Engine::new(&schema, generator).with_transitive(self.config.transitive);
        if let Some(f) = self.progress_fn.take() {
            engine = engine.with_progress(f);
        }
        let (inserts, engine_stats) = engine.anonymize(inserts, &self.config.request)?;

        let ReassembleStats {
            statements_written,
            statements_merged,
        } = reassemble(dump, &inserts, out)
            .map_err(|e| AnonymizeError::io(format!("writing {}", self.output_display()), e))?;

        let mut stats = AnonymizeStats::from_engine(engine_stats);
        stats.statements_written = statements_written;
        stats.statements_merged = statements_merged;
        Ok(stats)
    }

    /// Check every rule against the dump's schema without anonymizing
    pub fn check_rules(&self) -> Result<Vec<RuleProblem>> {
        let dump = read_dump(&self.config.input)?;
        let schema = extract_schema(&dump)?;
        Ok(check_rules(&schema, &self.config.request))
    }

    fn output_display(&self) -> String {
        match self.config.output {
            Some(ref p) => p.display().to_string(),
            None => "stdout".to_string(),
        }
    }
}

/// Rules naming tables or columns the schema lacks
pub fn check_rules(schema: &Schema, request: &ChangeRequest) -> Vec<RuleProblem> {
    let mut problems = Vec::new();

    for rule in request.iter() {
        let Some(table) = schema.get_table(&rule.table_name) else {
            problems.push(RuleProblem {
                table: rule.table_name.clone(),
                column: None,
                message: AnonymizeError::UnknownTable {
                    table: rule.table_name.clone(),
                }
                .to_string(),
            });
            continue;
        };
        for column in &rule.columns_to_change {
            if table.get_column(&column.name).is_none() {
                problems.push(RuleProblem {
                    table: rule.table_name.clone(),
                    column: Some(column.name.clone()),
                    message: AnonymizeError::UnknownColumn {
                        table: rule.table_name.clone(),
                        column: column.name.clone(),
                    }
                    .to_string(),
                });
            }
        }
    }

    problems
}
