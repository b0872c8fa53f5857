//! Random strings matching a regular expression.
//!
//! The pattern is parsed once into `regex-syntax`'s high-level IR and then
//! sampled by walking the tree. Look-around assertions (`^`, `$`, `\b`)
//! produce nothing; unbounded repetitions are capped at `min + 8`.

use rand::Rng;
use regex_syntax::hir::{Class, Hir, HirKind};
use std::fmt;

/// Extra repetitions allowed past the minimum for `*`, `+` and `{n,}`
const UNBOUNDED_EXTRA: u32 = 8;

/// Printable ASCII, preferred whenever a class allows it
const PRINTABLE_LOW: u32 = 0x20;
const PRINTABLE_HIGH: u32 = 0x7E;

/// A compiled pattern ready for sampling
#[derive(Clone)]
pub struct PatternGenerator {
    pattern: String,
    hir: Hir,
}

impl fmt::Debug for PatternGenerator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PatternGenerator")
            .field("pattern", &self.pattern)
            .finish()
    }
}

/// Pattern failed to parse
#[derive(Debug, Clone)]
pub struct PatternError {
    pattern: String,
    message: String,
}

impl fmt::Display for PatternError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid regex '{}': {}", self.pattern, self.message)
    }
}

impl std::error::Error for PatternError {}

impl PatternGenerator {
    pub fn compile(pattern: &str) -> Result<Self, PatternError> {
        let hir = regex_syntax::Parser::new()
            .parse(pattern)
            .map_err(|e| PatternError {
                pattern: pattern.to_string(),
                message: e.to_string(),
            })?;

        Ok(Self {
            pattern: pattern.to_string(),
            hir,
        })
    }

    /// Produce one string matching the pattern
    pub fn generate<R: Rng + ?Sized>(&self, rng: &mut R) -> String {
        let mut out = String::new();
        emit(&self.hir, rng, &mut out);
        out
    }
}

fn emit<R: Rng + ?Sized>(hir: &Hir, rng: &mut R, out: &mut String) {
    match hir.kind() {
        HirKind::Empty | HirKind::Look(_) => {}
        HirKind::Literal(lit) => out.push_str(&String::from_utf8_lossy(&lit.0)),
        HirKind::Class(Class::Unicode(cls)) => {
            let ranges: Vec<(u32, u32)> = cls
                .ranges()
                .iter()
                .map(|r| (r.start() as u32, r.end() as u32))
                .collect();
            if let Some(ch) = pick(&ranges, rng).and_then(char::from_u32) {
                out.push(ch);
            }
        }
        HirKind::Class(Class::Bytes(cls)) => {
            let ranges: Vec<(u32, u32)> = cls
                .ranges()
                .iter()
                .map(|r| (r.start() as u32, r.end() as u32))
                .collect();
            if let Some(ch) = pick(&ranges, rng).and_then(char::from_u32) {
                out.push(ch);
            }
        }
        HirKind::Repetition(rep) => {
            let max = rep.max.unwrap_or(rep.min.saturating_add(UNBOUNDED_EXTRA));
            let count = rng.random_range(rep.min..=max.max(rep.min));
            for _ in 0..count {
                emit(&rep.sub, rng, out);
            }
        }
        HirKind::Capture(cap) => emit(&cap.sub, rng, out),
        HirKind::Concat(parts) => {
            for part in parts {
                emit(part, rng, out);
            }
        }
        HirKind::Alternation(branches) => {
            if !branches.is_empty() {
                let i = rng.random_range(0..branches.len());
                emit(&branches[i], rng, out);
            }
        }
    }
}

/// Pick a code point uniformly from a set of inclusive ranges, restricted to
/// printable ASCII when the set intersects it
fn pick<R: Rng + ?Sized>(ranges: &[(u32, u32)], rng: &mut R) -> Option<u32> {
    let printable: Vec<(u32, u32)> = ranges
        .iter()
        .filter_map(|&(lo, hi)| {
            let lo = lo.max(PRINTABLE_LOW);
            let hi = hi.min(PRINTABLE_HIGH);
            (lo <= hi).then_some((lo, hi))
        })
        .collect();
    let pool = if printable.is_empty() {
        ranges
    } else {
        printable.as_slice()
    };

    let total: u64 = pool.iter().map(|&(lo, hi)| u64::from(hi - lo) + 1).sum();
    if total == 0 {
        return None;
    }

    let mut k = rng.random_range(0..total);
    for &(lo, hi) in pool {
        let size = u64::from(hi - lo) + 1;
        if k < size {
            // Surrogates can fall inside a wide Unicode range
            let cp = lo + k as u32;
            return Some(if char::from_u32(cp).is_some() { cp } else { lo });
        }
        k -= size;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use regex::Regex;

    fn assert_matches(pattern: &str) {
        let generator = PatternGenerator::compile(pattern).unwrap();
        let re = Regex::new(&format!("^(?:{})$", pattern)).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..200 {
            let value = generator.generate(&mut rng);
            assert!(re.is_match(&value), "{value:?} does not match {pattern}");
        }
    }

    #[test]
    fn test_generated_values_match() {
        assert_matches("[A-Z]{3}-[0-9]{4}");
        assert_matches("(foo|bar)_[a-f0-9]+");
        assert_matches(r"\d{2,5}");
        assert_matches(r"[^a-z]\w*");
        assert_matches("x?y*z");
        assert_matches(r"SMP-\d{6}");
    }

    #[test]
    fn test_anchors_are_ignored() {
        let generator = PatternGenerator::compile("^abc$").unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(generator.generate(&mut rng), "abc");
    }

    #[test]
    fn test_classes_prefer_printable_ascii() {
        let generator = PatternGenerator::compile(r"\S{20}").unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let value = generator.generate(&mut rng);
        assert!(value.chars().all(|c| c.is_ascii_graphic()));
    }

    #[test]
    fn test_non_ascii_class() {
        let generator = PatternGenerator::compile("[à-ÿ]{4}").unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let value = generator.generate(&mut rng);
        assert_eq!(value.chars().count(), 4);
        assert!(value.chars().all(|c| ('à'..='ÿ').contains(&c)));
    }

    #[test]
    fn test_invalid_pattern() {
        let err = PatternGenerator::compile("(abc").unwrap_err();
        assert!(err.to_string().contains("invalid regex '(abc'"));
    }
}
