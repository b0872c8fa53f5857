//! Reading dump input: files (optionally compressed) or stdin.

use crate::error::{AnonymizeError, Result};
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;
use tracing::{debug, warn};

/// Compression format detected from file extension
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
    Xz,
    Zstd,
}

impl Compression {
    /// Detect compression format from file extension
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());

        match ext.as_deref() {
            Some("gz" | "gzip") => Compression::Gzip,
            Some("bz2" | "bzip2") => Compression::Bzip2,
            Some("xz" | "lzma") => Compression::Xz,
            Some("zst" | "zstd") => Compression::Zstd,
            _ => Compression::None,
        }
    }

    /// Wrap a reader with the appropriate decompressor
    pub fn wrap_reader<'a>(&self, reader: Box<dyn Read + 'a>) -> io::Result<Box<dyn Read + 'a>> {
        Ok(match self {
            Compression::None => reader,
            Compression::Gzip => Box::new(flate2::read::GzDecoder::new(reader)),
            Compression::Bzip2 => Box::new(bzip2::read::BzDecoder::new(reader)),
            Compression::Xz => Box::new(xz2::read::XzDecoder::new(reader)),
            Compression::Zstd => Box::new(zstd::stream::read::Decoder::new(reader)?),
        })
    }
}

impl std::fmt::Display for Compression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Compression::None => write!(f, "none"),
            Compression::Gzip => write!(f, "gzip"),
            Compression::Bzip2 => write!(f, "bzip2"),
            Compression::Xz => write!(f, "xz"),
            Compression::Zstd => write!(f, "zstd"),
        }
    }
}

/// Whether the path means stdin
pub fn is_stdin(path: &Path) -> bool {
    path.as_os_str() == "-"
}

/// Read a whole dump into memory.
///
/// `-` reads stdin. Invalid UTF-8 is replaced rather than rejected, so dumps
/// in legacy encodings still anonymize (untouched bytes may change).
pub fn read_dump(path: &Path) -> Result<String> {
    let context = || format!("reading {}", path.display());

    let reader: Box<dyn Read> = if is_stdin(path) {
        Box::new(io::stdin().lock())
    } else {
        let file = File::open(path).map_err(|e| AnonymizeError::io(context(), e))?;
        let compression = Compression::from_path(path);
        debug!(path = %path.display(), %compression, "opening dump");
        compression
            .wrap_reader(Box::new(BufReader::new(file)))
            .map_err(|e| AnonymizeError::io(context(), e))?
    };

    read_to_string(reader, path).map_err(|e| AnonymizeError::io(context(), e))
}

fn read_to_string<R: Read>(mut reader: R, path: &Path) -> io::Result<String> {
    let mut bytes = Vec::new();
    reader.read_to_end(&mut bytes)?;

    match String::from_utf8(bytes) {
        Ok(s) => Ok(s),
        Err(e) => {
            warn!(path = %path.display(), "dump is not valid UTF-8, replacing invalid bytes");
            Ok(String::from_utf8_lossy(e.as_bytes()).into_owned())
        }
    }
}
