//! Reassemble an anonymized dump.
//!
//! Every non-INSERT line is copied through. The first INSERT statement of a
//! table with a consolidated record is replaced by that record's single
//! statement; later INSERTs of the same table are dropped since their rows
//! are already in it. INSERTs of tables without a record pass through.

use crate::parser::{DumpScanner, DumpSegment, InsertMap};
use ahash::AHashSet;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

pub const WRITER_BUFFER_SIZE: usize = 256 * 1024;

/// Counters from reassembly
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReassembleStats {
    /// INSERT statements written, consolidated or verbatim
    pub statements_written: u64,
    /// INSERT statements folded into an earlier one
    pub statements_merged: u64,
}

/// Open the output: a file, or stdout for `None` / `-`
pub fn create_output(path: Option<&Path>) -> io::Result<Box<dyn Write>> {
    match path {
        Some(p) if p.as_os_str() != "-" => {
            let file = File::create(p)?;
            Ok(Box::new(BufWriter::with_capacity(WRITER_BUFFER_SIZE, file)))
        }
        _ => Ok(Box::new(BufWriter::with_capacity(
            WRITER_BUFFER_SIZE,
            io::stdout(),
        ))),
    }
}

/// Write `dump` to `out` with consolidated INSERTs substituted
pub fn reassemble<W: Write + ?Sized>(
    dump: &str,
    inserts: &InsertMap,
    out: &mut W,
) -> io::Result<ReassembleStats> {
    let mut stats = ReassembleStats::default();
    let mut emitted: AHashSet<String> = AHashSet::new();

    for segment in DumpScanner::new(dump) {
        match segment {
            DumpSegment::Line { text, .. } => {
                out.write_all(text.as_bytes())?;
                out.write_all(b"\n")?;
            }
            DumpSegment::Insert(stmt) => match inserts.get(&stmt.table) {
                Some(record) => {
                    if emitted.contains(&stmt.table) {
                        stats.statements_merged += 1;
                        continue;
                    }
                    out.write_all(record.to_statement().as_bytes())?;
                    out.write_all(b"\n")?;
                    emitted.insert(stmt.table);
                    stats.statements_written += 1;
                }
                None => {
                    for line in &stmt.lines {
                        out.write_all(line.as_bytes())?;
                        out.write_all(b"\n")?;
                    }
                    stats.statements_written += 1;
                }
            },
        }
    }

    Ok(stats)
}
