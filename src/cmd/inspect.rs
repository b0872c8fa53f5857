//! Inspect command: what the anonymizer sees in a dump.

use dump_anonymizer::input::read_dump;
use dump_anonymizer::parser::aggregate_inserts;
use dump_anonymizer::schema::{extract_schema, ReferenceIndex, Schema};
use serde::Serialize;
use std::path::PathBuf;

#[derive(Serialize)]
struct InspectReport {
    tables: Vec<TableReport>,
}

#[derive(Serialize)]
struct TableReport {
    name: String,
    rows: usize,
    columns: Vec<ColumnReport>,
    foreign_keys: Vec<ForeignKeyReport>,
}

#[derive(Serialize)]
struct ColumnReport {
    name: String,
    #[serde(rename = "type")]
    sql_type: String,
    raw_type: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    referenced_by: Vec<String>,
    /// Columns reached through FK chains, only when longer than `referenced_by`
    #[serde(skip_serializing_if = "Vec::is_empty")]
    reached_transitively: Vec<String>,
}

#[derive(Serialize)]
struct ForeignKeyReport {
    name: String,
    column: String,
    references: String,
}

pub fn run(file: PathBuf, json: bool) -> anyhow::Result<()> {
    let dump = read_dump(&file)?;
    let schema = extract_schema(&dump)?;
    let inserts = aggregate_inserts(&dump, &schema)?;

    let report = build_report(&schema, |table| {
        inserts.get(table).map(|r| r.rows.len()).unwrap_or(0)
    });

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }

    Ok(())
}

fn build_report(schema: &Schema, rows: impl Fn(&str) -> usize) -> InspectReport {
    let index = ReferenceIndex::from_schema(schema);

    let tables = schema
        .iter()
        .map(|table| TableReport {
            name: table.name.clone(),
            rows: rows(&table.name),
            columns: table
                .columns
                .iter()
                .map(|c| {
                    let mut report = ColumnReport {
                        name: c.name.clone(),
                        sql_type: c.sql_type.to_string(),
                        raw_type: c.raw_type.clone(),
                        referenced_by: Vec::new(),
                        reached_transitively: Vec::new(),
                    };
                    if index.is_fk_target(&table.name, &c.name) {
                        report.referenced_by = index
                            .referencing(&table.name, &c.name)
                            .iter()
                            .map(|r| r.to_string())
                            .collect();
                        let reach = index.transitive_referencers(&table.name, &c.name);
                        if reach.len() > report.referenced_by.len() {
                            report.reached_transitively =
                                reach.iter().map(|r| r.to_string()).collect();
                        }
                    }
                    report
                })
                .collect(),
            foreign_keys: table
                .foreign_keys
                .iter()
                .map(|fk| ForeignKeyReport {
                    name: fk.name.clone(),
                    column: fk.column_name.clone(),
                    references: format!("{}.{}", fk.referenced_table, fk.referenced_column),
                })
                .collect(),
        })
        .collect();

    InspectReport { tables }
}

fn print_report(report: &InspectReport) {
    if report.tables.is_empty() {
        println!("No CREATE TABLE statements found.");
        return;
    }

    println!("Found {} tables:\n", report.tables.len());
    for table in &report.tables {
        println!("{} ({} rows)", table.name, table.rows);
        for column in &table.columns {
            print!("  {:<30} {:<20}", column.name, column.raw_type);
            if !column.referenced_by.is_empty() {
                print!(" <- {}", column.referenced_by.join(", "));
            }
            if !column.reached_transitively.is_empty() {
                print!(" (transitive: {})", column.reached_transitively.join(", "));
            }
            println!();
        }
        for fk in &table.foreign_keys {
            println!("  FK {}: {} -> {}", fk.name, fk.column, fk.references);
        }
        println!();
    }
}
