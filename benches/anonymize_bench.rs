//! Benchmarks for the anonymization pipeline.
//!
//! Tests:
//! - Row tokenization throughput
//! - INSERT aggregation
//! - Full anonymize + propagate pass over a parent/child dump

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use dump_anonymizer::anonymizer::{ChangeRequest, ColumnRule, Engine, TableRule, ValueGenerator};
use dump_anonymizer::parser::{aggregate_inserts, split_fields, split_rows};
use dump_anonymizer::schema::extract_schema;
use std::fmt::Write;
use std::hint::black_box;

const SCHEMA: &str = "\
CREATE TABLE `customer` (
  `id` int NOT NULL,
  `code` varchar(36) NOT NULL,
  `email` varchar(255) DEFAULT NULL,
  `created_at` datetime DEFAULT NULL,
  PRIMARY KEY (`id`)
) ENGINE=InnoDB;
CREATE TABLE `invoice` (
  `id` int NOT NULL,
  `customer_code` varchar(36) DEFAULT NULL,
  `amount` float DEFAULT NULL,
  CONSTRAINT `fk_invoice_customer` FOREIGN KEY (`customer_code`) REFERENCES `customer` (`code`)
) ENGINE=InnoDB;
";

/// Build a dump with `rows` customers and two invoices per customer,
/// split into statements of 500 rows like mysqldump's extended inserts
fn generate_dump(rows: usize) -> String {
    let mut dump = String::from(SCHEMA);

    for chunk in (0..rows).collect::<Vec<_>>().chunks(500) {
        dump.push_str("INSERT INTO `customer` VALUES ");
        let values: Vec<String> = chunk
            .iter()
            .map(|i| {
                format!(
                    "({},'C{:06}','user{}@example.com','2024-01-01 00:00:00')",
                    i, i, i
                )
            })
            .collect();
        dump.push_str(&values.join(","));
        dump.push_str(";\n");
    }

    for chunk in (0..rows * 2).collect::<Vec<_>>().chunks(500) {
        dump.push_str("INSERT INTO `invoice` VALUES ");
        let values: Vec<String> = chunk
            .iter()
            .map(|i| format!("({},'C{:06}',{}.50)", i, i / 2, i % 100))
            .collect();
        dump.push_str(&values.join(","));
        dump.push_str(";\n");
    }

    dump
}

fn bench_tokenizer(c: &mut Criterion) {
    let mut group = c.benchmark_group("tokenizer");

    let mut values = String::new();
    for i in 0..1000 {
        if i > 0 {
            values.push(',');
        }
        let _ = write!(values, "({},'name, with comma {}','it\\'s',NULL,3.14)", i, i);
    }
    group.throughput(Throughput::Bytes(values.len() as u64));

    group.bench_function("split_rows_and_fields", |b| {
        b.iter(|| {
            let rows = split_rows(black_box(&values));
            let fields: usize = rows.iter().map(|r| split_fields(r).len()).sum();
            black_box(fields)
        })
    });

    group.finish();
}

fn bench_aggregate(c: &mut Criterion) {
    let mut group = c.benchmark_group("aggregate");

    for rows in [1_000, 10_000] {
        let dump = generate_dump(rows);
        let schema = extract_schema(&dump).unwrap();
        group.throughput(Throughput::Bytes(dump.len() as u64));

        group.bench_with_input(BenchmarkId::from_parameter(rows), &dump, |b, dump| {
            b.iter(|| black_box(aggregate_inserts(dump, &schema).unwrap()))
        });
    }

    group.finish();
}

fn bench_anonymize(c: &mut Criterion) {
    let mut group = c.benchmark_group("anonymize");

    let request = ChangeRequest::new(vec![TableRule::new(
        "customer",
        vec![ColumnRule::new("code"), ColumnRule::new("email"), ColumnRule::new("created_at")],
    )]);

    for rows in [1_000, 10_000] {
        let dump = generate_dump(rows);
        let schema = extract_schema(&dump).unwrap();
        let inserts = aggregate_inserts(&dump, &schema).unwrap();
        group.throughput(Throughput::Elements(rows as u64));

        group.bench_with_input(BenchmarkId::from_parameter(rows), &inserts, |b, inserts| {
            b.iter(|| {
                let mut engine = Engine::new(&schema, ValueGenerator::new(Some(42)));
                black_box(engine.anonymize(inserts.clone(), &request).unwrap())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_tokenizer, bench_aggregate, bench_anonymize);
criterion_main!(benches);
