//! Replacement value generation.
//!
//! Values are produced as ready-to-write SQL literal tokens: strings and
//! dates come back single-quoted and escaped, numbers come back bare.

use super::config::{ColumnRule, Subtype};
use super::pattern::PatternGenerator;
use crate::error::{AnonymizeError, Result};
use crate::schema::SqlType;
use ahash::AHashMap;
use chrono::{DateTime, Utc};
use fake::faker::internet::en::DomainSuffix;
use fake::faker::lorem::en::Word;
use fake::Fake;
use rand::distr::Alphanumeric;
use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};

/// Upper bound for generated dates (2026-01-01 00:00:00 UTC)
const MAX_TIMESTAMP: i64 = 1_767_225_600;

/// Default ranges when a rule carries no interval
const DEFAULT_INT_RANGE: (i64, i64) = (0, 100);

/// Length of the random part of fallback strings
const FALLBACK_RANDOM_LEN: usize = 5;

/// Where a generated value goes
#[derive(Debug, Clone, Copy)]
pub struct FieldContext<'a> {
    pub table: &'a str,
    pub column: &'a str,
    pub sql_type: &'a SqlType,
    /// 0-based row position within the table's consolidated record
    pub row_index: usize,
    /// Current literal token
    pub original: &'a str,
}

/// Seedable replacement generator
pub struct ValueGenerator {
    rng: StdRng,
    patterns: AHashMap<String, PatternGenerator>,
}

impl ValueGenerator {
    /// Create a generator; a seed makes every run reproducible
    pub fn new(seed: Option<u64>) -> Self {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_os_rng(),
        };
        Self {
            rng,
            patterns: AHashMap::new(),
        }
    }

    /// Generate a replacement literal for one field.
    ///
    /// A subtype wins, then a regex, then the column type decides.
    pub fn generate(&mut self, rule: &ColumnRule, ctx: &FieldContext<'_>) -> Result<String> {
        if let Some(subtype) = rule.subtype {
            let value = match subtype {
                Subtype::Uuid => self.uuid(),
                Subtype::Uri => self.uri(),
            };
            return Ok(quote(&value));
        }

        if let Some(pattern) = &rule.regex {
            let value = self.from_pattern(pattern)?;
            return Ok(quote(&value));
        }

        let value = match ctx.sql_type {
            SqlType::DateTime => quote(&self.timestamp().format("%Y-%m-%d %H:%M:%S").to_string()),
            SqlType::Date => quote(&self.timestamp().format("%Y-%m-%d").to_string()),
            SqlType::Float => self.float(rule.interval),
            SqlType::Int => self.int(rule.interval).to_string(),
            SqlType::TinyInt => self.rng.random_range(0..=1).to_string(),
            SqlType::Enum(values) => match values.choose(&mut self.rng) {
                Some(choice) => choice.clone(),
                None => ctx.original.to_string(),
            },
            SqlType::Other(_) => self.fallback(ctx),
        };
        Ok(value)
    }

    fn uuid(&mut self) -> String {
        format!(
            "{:08x}-{:04x}-{:04x}-{:04x}-{:012x}",
            self.rng.random::<u32>(),
            self.rng.random::<u16>(),
            (self.rng.random::<u16>() & 0x0FFF) | 0x4000,
            (self.rng.random::<u16>() & 0x3FFF) | 0x8000,
            self.rng.random::<u64>() & 0xFFFF_FFFF_FFFF_u64
        )
    }

    fn uri(&mut self) -> String {
        let host: String = Word().fake_with_rng(&mut self.rng);
        let suffix: String = DomainSuffix().fake_with_rng(&mut self.rng);
        let path: String = Word().fake_with_rng(&mut self.rng);
        format!(
            "https://www.{}.{}/{}",
            host.to_lowercase(),
            suffix,
            path.to_lowercase()
        )
    }

    fn from_pattern(&mut self, pattern: &str) -> Result<String> {
        if !self.patterns.contains_key(pattern) {
            let compiled = PatternGenerator::compile(pattern)
                .map_err(|e| AnonymizeError::configuration(e.to_string()))?;
            self.patterns.insert(pattern.to_string(), compiled);
        }
        match self.patterns.get(pattern) {
            Some(generator) => Ok(generator.generate(&mut self.rng)),
            None => Err(AnonymizeError::configuration(format!(
                "pattern '{}' was not compiled",
                pattern
            ))),
        }
    }

    fn timestamp(&mut self) -> DateTime<Utc> {
        let secs = self.rng.random_range(0..MAX_TIMESTAMP);
        DateTime::<Utc>::from_timestamp(secs, 0).unwrap_or(DateTime::<Utc>::UNIX_EPOCH)
    }

    /// Three decimal places; `[low, high]` with an interval, `[0, 1)` without
    fn float(&mut self, interval: Option<(f64, f64)>) -> String {
        let value = match interval {
            Some((low, high)) if low < high => self.rng.random_range(low..=high),
            Some((low, _)) => low,
            None => self.rng.random_range(0.0..1.0),
        };
        format!("{:.3}", value)
    }

    /// Integers inside `[low, high]`; an interval holding no integer
    /// yields `low` rounded
    fn int(&mut self, interval: Option<(f64, f64)>) -> i64 {
        let (low, high) = match interval {
            Some((l, h)) => {
                let (low, high) = (l.ceil() as i64, h.floor() as i64);
                if low > high {
                    return l.round() as i64;
                }
                (low, high)
            }
            None => DEFAULT_INT_RANGE,
        };
        if low == high {
            return low;
        }
        self.rng.random_range(low..=high)
    }

    /// `'<table>-<column>-<random>-<row>'`, row counted from 1
    fn fallback(&mut self, ctx: &FieldContext<'_>) -> String {
        let random: String = (0..FALLBACK_RANDOM_LEN)
            .map(|_| self.rng.sample(Alphanumeric) as char)
            .collect();
        quote(&format!(
            "{}-{}-{}-{}",
            ctx.table,
            ctx.column,
            random,
            ctx.row_index + 1
        ))
    }
}

/// Quote a value as a MySQL string literal
pub fn quote(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('\'', "\\'")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
        .replace('\0', "\\0");
    format!("'{}'", escaped)
}
