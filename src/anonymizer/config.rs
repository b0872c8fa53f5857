//! Configuration types for the anonymizer.

use crate::anonymizer::pattern::PatternGenerator;
use crate::error::{AnonymizeError, Result};
use crate::input::is_stdin;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Semantic subtype overriding type-based generation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Subtype {
    Uuid,
    Uri,
}

impl FromStr for Subtype {
    type Err = AnonymizeError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "uuid" => Ok(Subtype::Uuid),
            "uri" => Ok(Subtype::Uri),
            _ => Err(AnonymizeError::configuration(format!(
                "unknown subtype '{}'. Use: UUID, URI",
                s
            ))),
        }
    }
}

impl TryFrom<String> for Subtype {
    type Error = AnonymizeError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Subtype> for String {
    fn from(value: Subtype) -> Self {
        value.to_string()
    }
}

impl fmt::Display for Subtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Subtype::Uuid => write!(f, "UUID"),
            Subtype::Uri => write!(f, "URI"),
        }
    }
}

/// How to anonymize one column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRule {
    /// Column name
    pub name: String,
    /// Semantic subtype (exclusive with `regex`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subtype: Option<Subtype>,
    /// Pattern generated values must match (exclusive with `subtype`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    /// Inclusive numeric range for `int` and `float` columns
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<(f64, f64)>,
}

impl ColumnRule {
    /// A rule with no options: generation is driven by the column type
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            subtype: None,
            regex: None,
            interval: None,
        }
    }

    /// Validate the rule
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(AnonymizeError::configuration("column name cannot be empty"));
        }

        if let (Some(subtype), Some(regex)) = (&self.subtype, &self.regex) {
            return Err(AnonymizeError::configuration(format!(
                "column '{}': subtype and regex cannot both be set, got subtype={}, regex={}",
                self.name, subtype, regex
            )));
        }

        if let Some(regex) = &self.regex {
            PatternGenerator::compile(regex).map_err(|e| {
                AnonymizeError::configuration(format!("column '{}': {}", self.name, e))
            })?;
        }

        if let Some((low, high)) = self.interval {
            if !low.is_finite() || !high.is_finite() || low > high {
                return Err(AnonymizeError::configuration(format!(
                    "column '{}': invalid interval [{}, {}]",
                    self.name, low, high
                )));
            }
        }

        Ok(())
    }
}

/// Columns to anonymize in one table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableRule {
    pub table_name: String,
    #[serde(default)]
    pub columns_to_change: Vec<ColumnRule>,
}

impl TableRule {
    pub fn new(table_name: impl Into<String>, columns: Vec<ColumnRule>) -> Self {
        Self {
            table_name: table_name.into(),
            columns_to_change: columns,
        }
    }

    /// Validate the rule and all of its column rules
    pub fn validate(&self) -> Result<()> {
        if self.table_name.trim().is_empty() {
            return Err(AnonymizeError::configuration("table name cannot be empty"));
        }
        for column in &self.columns_to_change {
            column.validate().map_err(|e| match e {
                AnonymizeError::Configuration { message } => AnonymizeError::configuration(
                    format!("table '{}', {}", self.table_name, message),
                ),
                other => other,
            })?;
        }
        Ok(())
    }

    /// Names of the requested columns, in request order
    pub fn column_names(&self) -> Vec<&str> {
        self.columns_to_change
            .iter()
            .map(|c| c.name.as_str())
            .collect()
    }
}

/// Ordered list of table rules. Order is significant: propagation from an
/// earlier rule is visible to later ones.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeRequest {
    pub tables: Vec<TableRule>,
}

impl ChangeRequest {
    pub fn new(tables: Vec<TableRule>) -> Self {
        Self { tables }.normalized()
    }

    /// Validate every table rule
    pub fn validate(&self) -> Result<()> {
        for table in &self.tables {
            table.validate()?;
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.tables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tables.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TableRule> {
        self.tables.iter()
    }

    /// Lower-case all identifiers to match the extracted schema
    fn normalized(mut self) -> Self {
        for table in &mut self.tables {
            table.table_name = table.table_name.trim().to_lowercase();
            for column in &mut table.columns_to_change {
                column.name = column.name.trim().to_lowercase();
            }
        }
        self
    }
}

/// Change request file (JSON, or YAML by extension)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeRequestFile {
    /// Random seed for reproducibility
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,

    /// Propagate through chains of foreign keys
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transitive: Option<bool>,

    /// Table rules in processing order
    #[serde(default)]
    pub tables: Vec<TableRule>,
}

impl ChangeRequestFile {
    /// Load from a file; `.yaml`/`.yml` use YAML, anything else JSON
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| AnonymizeError::io(format!("reading {}", path.display()), e))?;

        let is_yaml = matches!(
            path.extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_lowercase())
                .as_deref(),
            Some("yaml" | "yml")
        );

        if is_yaml {
            Self::from_yaml_str(&content).map_err(|e| with_context(e, path))
        } else {
            Self::from_json_str(&content).map_err(|e| with_context(e, path))
        }
    }

    pub fn from_json_str(content: &str) -> Result<Self> {
        serde_json::from_str(content).map_err(|e| AnonymizeError::ConfigParse {
            context: "(json)".to_string(),
            source: Box::new(e),
        })
    }

    pub fn from_yaml_str(content: &str) -> Result<Self> {
        serde_yaml_ng::from_str(content).map_err(|e| AnonymizeError::ConfigParse {
            context: "(yaml)".to_string(),
            source: Box::new(e),
        })
    }

    pub fn change_request(&self) -> ChangeRequest {
        ChangeRequest::new(self.tables.clone())
    }
}

fn with_context(err: AnonymizeError, path: &Path) -> AnonymizeError {
    match err {
        AnonymizeError::ConfigParse { context, source } => AnonymizeError::ConfigParse {
            context: format!("{} {}", path.display(), context),
            source,
        },
        other => other,
    }
}

/// Runtime configuration for an anonymization run
#[derive(Debug)]
pub struct AnonymizeConfig {
    /// Input dump (`-` for stdin)
    pub input: PathBuf,
    /// Output dump (None or `-` for stdout)
    pub output: Option<PathBuf>,
    /// Table rules in processing order
    pub request: ChangeRequest,
    /// Random seed for reproducibility
    pub seed: Option<u64>,
    /// Follow FK chains beyond direct referencers
    pub transitive: bool,
    /// Run the pipeline without writing output
    pub dry_run: bool,
}

impl AnonymizeConfig {
    /// Create a new builder
    pub fn builder() -> AnonymizeConfigBuilder {
        AnonymizeConfigBuilder::default()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !is_stdin(&self.input) && !self.input.exists() {
            return Err(AnonymizeError::configuration(format!(
                "input file not found: {}",
                self.input.display()
            )));
        }
        self.request.validate()
    }
}

/// Builder for AnonymizeConfig
#[derive(Default)]
pub struct AnonymizeConfigBuilder {
    input: Option<PathBuf>,
    output: Option<PathBuf>,
    config_file: Option<PathBuf>,
    request: Option<ChangeRequest>,
    seed: Option<u64>,
    transitive: Option<bool>,
    dry_run: bool,
}

impl AnonymizeConfigBuilder {
    pub fn input(mut self, path: PathBuf) -> Self {
        self.input = Some(path);
        self
    }

    pub fn output(mut self, path: Option<PathBuf>) -> Self {
        self.output = path;
        self
    }

    pub fn config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file = path;
        self
    }

    /// Table rules given directly; appended after rules from the config file
    pub fn change_request(mut self, request: ChangeRequest) -> Self {
        self.request = Some(request);
        self
    }

    pub fn seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// `None` keeps the config file's setting (default: single-hop)
    pub fn transitive(mut self, transitive: Option<bool>) -> Self {
        self.transitive = transitive;
        self
    }

    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Build and validate the AnonymizeConfig
    pub fn build(self) -> Result<AnonymizeConfig> {
        let input = self
            .input
            .ok_or_else(|| AnonymizeError::configuration("input file is required"))?;

        let file = match self.config_file {
            Some(ref path) => Some(ChangeRequestFile::load(path)?),
            None => None,
        };

        let mut tables = Vec::new();
        if let Some(ref file) = file {
            tables.extend(file.tables.iter().cloned());
        }
        if let Some(request) = self.request {
            tables.extend(request.tables);
        }
        if tables.is_empty() {
            return Err(AnonymizeError::configuration(
                "no tables to anonymize: provide a config file with a non-empty 'tables' list",
            ));
        }

        // CLI overrides file
        let seed = self.seed.or_else(|| file.as_ref().and_then(|f| f.seed));
        let transitive = self
            .transitive
            .or_else(|| file.as_ref().and_then(|f| f.transitive))
            .unwrap_or(false);

        let config = AnonymizeConfig {
            input,
            output: self.output,
            request: ChangeRequest::new(tables),
            seed,
            transitive,
            dry_run: self.dry_run,
        };
        config.request.validate()?;

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_json_change_request() {
        let json = r#"{
            "seed": 7,
            "tables": [
                {"table_name": "Sample", "columns_to_change": [
                    {"name": "code", "subtype": "UUID"},
                    {"name": "vial_code", "regex": "[A-Z]{3}-[0-9]{4}"},
                    {"name": "volume", "interval": [1, 10]}
                ]},
                {"table_name": "test", "columns_to_change": [{"name": "code"}]}
            ]
        }"#;
        let file = ChangeRequestFile::from_json_str(json).unwrap();
        assert_eq!(file.seed, Some(7));

        let request = file.change_request();
        request.validate().unwrap();
        assert_eq!(request.len(), 2);
        assert_eq!(request.tables[0].table_name, "sample");
        assert_eq!(request.tables[0].columns_to_change[0].subtype, Some(Subtype::Uuid));
        assert_eq!(request.tables[0].columns_to_change[2].interval, Some((1.0, 10.0)));
    }

    #[test]
    fn test_parse_yaml_change_request() {
        let yaml = "
transitive: true
tables:
  - table_name: users
    columns_to_change:
      - name: website
        subtype: uri
";
        let file = ChangeRequestFile::from_yaml_str(yaml).unwrap();
        assert_eq!(file.transitive, Some(true));
        assert_eq!(file.tables[0].columns_to_change[0].subtype, Some(Subtype::Uri));
    }

    #[test]
    fn test_subtype_and_regex_are_exclusive() {
        let rule = ColumnRule {
            name: "code".to_string(),
            subtype: Some(Subtype::Uuid),
            regex: Some("[a-z]+".to_string()),
            interval: None,
        };
        let err = rule.validate().unwrap_err();
        assert!(err.to_string().contains("cannot both be set"));

        let request = ChangeRequest::new(vec![TableRule::new("t", vec![rule])]);
        assert!(matches!(
            request.validate(),
            Err(AnonymizeError::Configuration { .. })
        ));
    }

    #[test]
    fn test_unknown_subtype_rejected() {
        let json = r#"{"tables": [{"table_name": "t", "columns_to_change": [{"name": "c", "subtype": "email"}]}]}"#;
        assert!(ChangeRequestFile::from_json_str(json).is_err());
    }

    #[test]
    fn test_invalid_regex_rejected() {
        let mut rule = ColumnRule::new("c");
        rule.regex = Some("[unclosed".to_string());
        assert!(rule.validate().is_err());
    }

    #[test]
    fn test_invalid_interval_rejected() {
        let mut rule = ColumnRule::new("c");
        rule.interval = Some((10.0, 1.0));
        assert!(rule.validate().is_err());

        rule.interval = Some((1.0, 1.0));
        assert!(rule.validate().is_ok());
    }

    #[test]
    fn test_builder_requires_tables() {
        let result = AnonymizeConfig::builder()
            .input(PathBuf::from("-"))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_builder_cli_overrides() {
        let config = AnonymizeConfig::builder()
            .input(PathBuf::from("-"))
            .change_request(ChangeRequest::new(vec![TableRule::new(
                "T",
                vec![ColumnRule::new("C")],
            )]))
            .seed(Some(99))
            .transitive(Some(true))
            .build()
            .unwrap();

        assert_eq!(config.seed, Some(99));
        assert!(config.transitive);
        assert_eq!(config.request.tables[0].table_name, "t");
        assert_eq!(config.request.tables[0].columns_to_change[0].name, "c");
    }
}
