//! End-to-end tests for dump anonymization.
//!
//! Each test writes a dump and a change request to temp files, runs the
//! anonymizer and re-parses the output.

use dump_anonymizer::anonymizer::{AnonymizeConfig, AnonymizeStats, Anonymizer};
use dump_anonymizer::parser::{aggregate_inserts, InsertMap};
use dump_anonymizer::schema::extract_schema;
use dump_anonymizer::AnonymizeError;
use std::fs;
use std::io::Write;
use tempfile::{Builder, NamedTempFile, TempDir};

const PARENT_CHILD: &str = r#"-- MySQL dump 10.13
/*!40101 SET NAMES utf8mb4 */;
DROP TABLE IF EXISTS `parent`;
CREATE TABLE `parent` (
  `id` varchar(10) NOT NULL,
  `code` varchar(10) NOT NULL,
  `active` tinyint(1) DEFAULT NULL,
  `status` enum('a','b','c') DEFAULT NULL,
  `created_at` datetime DEFAULT NULL,
  PRIMARY KEY (`id`),
  KEY `idx_code` (`code`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
DROP TABLE IF EXISTS `child`;
CREATE TABLE `child` (
  `id` int(11) NOT NULL,
  `parent_code` varchar(10) DEFAULT NULL,
  `order` int DEFAULT NULL,
  PRIMARY KEY (`id`),
  CONSTRAINT `fk_child_parent` FOREIGN KEY (`parent_code`) REFERENCES `parent` (`code`)
) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
LOCK TABLES `parent` WRITE;
INSERT INTO `parent` VALUES ('p1','A1',1,'a','2020-01-01 10:00:00'),('p2','A1',0,'b',NULL);
INSERT INTO `parent` VALUES ('p3','B2',1,'c','2021-06-30 08:30:00');
UNLOCK TABLES;
LOCK TABLES `child` WRITE;
INSERT INTO `child` VALUES (1,'A1',1),(2,'B2',2),(3,'ZZ',3),(4,NULL,4);
UNLOCK TABLES;
"#;

fn write_temp(content: &str, suffix: &str) -> NamedTempFile {
    let mut file = Builder::new().suffix(suffix).tempfile().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

fn run(dump: &str, config: &str, suffix: &str) -> (String, AnonymizeStats) {
    let input = write_temp(dump, ".sql");
    let config_file = write_temp(config, suffix);
    let output_dir = TempDir::new().unwrap();
    let output = output_dir.path().join("anon.sql");

    let config = AnonymizeConfig::builder()
        .input(input.path().to_path_buf())
        .output(Some(output.clone()))
        .config_file(Some(config_file.path().to_path_buf()))
        .seed(Some(1234))
        .build()
        .unwrap();

    let stats = Anonymizer::new(config).unwrap().run().unwrap();
    (fs::read_to_string(&output).unwrap(), stats)
}

fn parse_output(output: &str) -> InsertMap {
    let schema = extract_schema(output).unwrap();
    aggregate_inserts(output, &schema).unwrap()
}

fn column(inserts: &InsertMap, table: &str, name: &str) -> Vec<String> {
    let record = inserts.get(table).unwrap();
    let idx = record.column_index(name).unwrap();
    record.rows.iter().map(|r| r[idx].clone()).collect()
}

#[test]
fn test_shared_value_gets_one_replacement_across_tables() {
    let config = r#"{"tables": [{"table_name": "parent", "columns_to_change": [{"name": "code", "subtype": "UUID"}]}]}"#;
    let (output, stats) = run(PARENT_CHILD, config, ".json");
    let inserts = parse_output(&output);

    let codes = column(&inserts, "parent", "code");
    assert_eq!(codes[0], codes[1], "both 'A1' rows share a replacement");
    assert_ne!(codes[0], codes[2]);
    assert!(!output.contains("'A1'"));
    assert!(!output.contains("'B2'"));

    let refs = column(&inserts, "child", "parent_code");
    assert_eq!(refs[0], codes[0]);
    assert_eq!(refs[1], codes[2]);

    assert_eq!(stats.values_generated, 2);
    assert_eq!(stats.values_propagated, 2);
}

#[test]
fn test_orphan_reference_becomes_null() {
    let config = r#"{"tables": [{"table_name": "parent", "columns_to_change": [{"name": "code"}]}]}"#;
    let (output, stats) = run(PARENT_CHILD, config, ".json");
    let inserts = parse_output(&output);

    let refs = column(&inserts, "child", "parent_code");
    assert_eq!(refs[2], "NULL", "'ZZ' has no parent");
    assert_eq!(refs[3], "NULL", "NULL stays NULL");
    assert_eq!(stats.orphans_nulled, 1);
}

#[test]
fn test_statements_merged_and_rows_preserved() {
    let config = r#"{"tables": [{"table_name": "parent", "columns_to_change": [{"name": "id"}]}]}"#;
    let (output, stats) = run(PARENT_CHILD, config, ".json");

    assert_eq!(output.matches("INSERT INTO `parent`").count(), 1);
    assert_eq!(output.matches("INSERT INTO `child`").count(), 1);
    assert_eq!(stats.statements_merged, 1);

    let inserts = parse_output(&output);
    assert_eq!(inserts.get("parent").unwrap().rows.len(), 3);
    assert_eq!(inserts.get("child").unwrap().rows.len(), 4);

    // Untouched columns keep their order
    let statuses = column(&inserts, "parent", "status");
    assert_eq!(statuses, vec!["'a'", "'b'", "'c'"]);

    // Surrounding lines survive
    assert!(output.starts_with("-- MySQL dump 10.13\n"));
    assert!(output.contains("LOCK TABLES `parent` WRITE;\nINSERT INTO `parent`"));
}

#[test]
fn test_type_dispatch() {
    let config = r#"{"tables": [{"table_name": "parent", "columns_to_change": [
        {"name": "active"}, {"name": "status"}, {"name": "created_at"}
    ]}]}"#;
    let (output, _) = run(PARENT_CHILD, config, ".json");
    let inserts = parse_output(&output);

    for v in column(&inserts, "parent", "active") {
        assert!(v == "0" || v == "1", "tinyint gave {v}");
    }
    for v in column(&inserts, "parent", "status") {
        assert!(["'a'", "'b'", "'c'"].contains(&v.as_str()), "enum gave {v}");
    }
    let dates = column(&inserts, "parent", "created_at");
    assert_eq!(dates[1], "NULL");
    assert_eq!(dates[0].len(), "'2020-01-01 10:00:00'".len());
}

#[test]
fn test_reserved_word_column_round_trips() {
    let config = r#"{"tables": [{"table_name": "child", "columns_to_change": [{"name": "order", "interval": [10, 20]}]}]}"#;
    let (output, _) = run(PARENT_CHILD, config, ".json");
    assert!(output.contains("INSERT INTO `child` (`id`,`parent_code`,`order`) VALUES"));

    let inserts = parse_output(&output);
    for v in column(&inserts, "child", "order") {
        let n: i64 = v.parse().unwrap();
        assert!((10..=20).contains(&n));
    }
}

#[test]
fn test_yaml_config_and_regex() {
    let config = "
tables:
  - table_name: parent
    columns_to_change:
      - name: id
        regex: 'ID-[0-9]{4}'
";
    let (output, _) = run(PARENT_CHILD, config, ".yaml");
    let inserts = parse_output(&output);
    let re = regex::Regex::new(r"^'ID-[0-9]{4}'$").unwrap();
    for v in column(&inserts, "parent", "id") {
        assert!(re.is_match(&v), "{v}");
    }
}

#[test]
fn test_unknown_table_is_skipped() {
    let config = r#"{"tables": [
        {"table_name": "missing", "columns_to_change": [{"name": "x"}]},
        {"table_name": "child", "columns_to_change": [{"name": "id"}]}
    ]}"#;
    let (_, stats) = run(PARENT_CHILD, config, ".json");
    assert_eq!(stats.skipped.len(), 1);
    assert_eq!(stats.tables_anonymized, 1);
}

#[test]
fn test_seed_makes_output_reproducible() {
    let config = r#"{"tables": [{"table_name": "parent", "columns_to_change": [{"name": "code", "subtype": "uri"}]}]}"#;
    let (a, _) = run(PARENT_CHILD, config, ".json");
    let (b, _) = run(PARENT_CHILD, config, ".json");
    assert_eq!(a, b);
}

#[test]
fn test_transitive_from_config_file() {
    let dump = "\
CREATE TABLE `a` (
  `code` varchar(10) NOT NULL
) ENGINE=InnoDB;
CREATE TABLE `b` (
  `a_code` varchar(10) DEFAULT NULL,
  CONSTRAINT `fk_b_a` FOREIGN KEY (`a_code`) REFERENCES `a` (`code`)
) ENGINE=InnoDB;
CREATE TABLE `c` (
  `b_code` varchar(10) DEFAULT NULL,
  CONSTRAINT `fk_c_b` FOREIGN KEY (`b_code`) REFERENCES `b` (`a_code`)
) ENGINE=InnoDB;
INSERT INTO `a` VALUES ('x'),('y');
INSERT INTO `b` VALUES ('x'),('y');
INSERT INTO `c` VALUES ('y');
";
    let config = r#"{"transitive": true, "tables": [{"table_name": "a", "columns_to_change": [{"name": "code"}]}]}"#;
    let (output, _) = run(dump, config, ".json");
    let inserts = parse_output(&output);

    let a = column(&inserts, "a", "code");
    assert_eq!(column(&inserts, "b", "a_code"), a);
    assert_eq!(column(&inserts, "c", "b_code"), vec![a[1].clone()]);
}

#[test]
fn test_conflicting_rule_rejected_before_running() {
    let config_file = write_temp(
        r#"{"tables": [{"table_name": "parent", "columns_to_change": [{"name": "code", "subtype": "UUID", "regex": "[a-z]+"}]}]}"#,
        ".json",
    );
    let input = write_temp(PARENT_CHILD, ".sql");

    let err = AnonymizeConfig::builder()
        .input(input.path().to_path_buf())
        .config_file(Some(config_file.path().to_path_buf()))
        .build()
        .unwrap_err();
    assert!(matches!(err, AnonymizeError::Configuration { .. }));
}

#[test]
fn test_field_count_mismatch_is_fatal() {
    let dump = "\
CREATE TABLE `t` (
  `id` int NOT NULL,
  `name` varchar(10) DEFAULT NULL
) ENGINE=InnoDB;
INSERT INTO `t` VALUES (1,'a'),(2);
";
    let input = write_temp(dump, ".sql");
    let config_file = write_temp(
        r#"{"tables": [{"table_name": "t", "columns_to_change": [{"name": "name"}]}]}"#,
        ".json",
    );
    let output_dir = TempDir::new().unwrap();

    let config = AnonymizeConfig::builder()
        .input(input.path().to_path_buf())
        .output(Some(output_dir.path().join("out.sql")))
        .config_file(Some(config_file.path().to_path_buf()))
        .build()
        .unwrap();
    let err = Anonymizer::new(config).unwrap().run().unwrap_err();
    assert!(matches!(
        err,
        AnonymizeError::TokenizationMismatch { row: 2, expected: 2, found: 1, .. }
    ));
}

#[test]
fn test_narrower_later_insert_is_fatal_not_a_crash() {
    let dump = "\
INSERT INTO `t` (`a`,`b`,`c`) VALUES (1,2,'x');
INSERT INTO `t` (`a`,`b`) VALUES (3,4);
";
    let input = write_temp(dump, ".sql");
    let config_file = write_temp(
        r#"{"tables": [{"table_name": "t", "columns_to_change": [{"name": "c"}]}]}"#,
        ".json",
    );
    let output_dir = TempDir::new().unwrap();

    let config = AnonymizeConfig::builder()
        .input(input.path().to_path_buf())
        .output(Some(output_dir.path().join("out.sql")))
        .config_file(Some(config_file.path().to_path_buf()))
        .build()
        .unwrap();
    let err = Anonymizer::new(config).unwrap().run().unwrap_err();
    assert!(matches!(
        err,
        AnonymizeError::TokenizationMismatch { line: 2, expected: 3, found: 2, .. }
    ));
}

#[test]
fn test_dry_run_writes_nothing() {
    let input = write_temp(PARENT_CHILD, ".sql");
    let config_file = write_temp(
        r#"{"tables": [{"table_name": "parent", "columns_to_change": [{"name": "code"}]}]}"#,
        ".json",
    );
    let output_dir = TempDir::new().unwrap();
    let output = output_dir.path().join("out.sql");

    let config = AnonymizeConfig::builder()
        .input(input.path().to_path_buf())
        .output(Some(output.clone()))
        .config_file(Some(config_file.path().to_path_buf()))
        .dry_run(true)
        .build()
        .unwrap();
    let stats = Anonymizer::new(config).unwrap().run().unwrap();

    assert_eq!(stats.values_generated, 2);
    assert!(!output.exists());
}
