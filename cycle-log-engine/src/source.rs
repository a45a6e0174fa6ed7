//! Log file sources
//!
//! Reads a file, detects its text encoding (cached per path for the run) and
//! exposes the decoded content as an iterator over lines in file order.

use crate::types::{EngineError, Result};
use encoding_rs::{Encoding, UTF_8};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Pick the encoding of a file from its raw bytes
///
/// A byte order mark wins; otherwise valid UTF-8 is UTF-8 and anything else
/// falls back to `fallback`.
pub fn detect_encoding(bytes: &[u8], fallback: &'static Encoding) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding;
    }
    if std::str::from_utf8(bytes).is_ok() {
        UTF_8
    } else {
        fallback
    }
}

/// Read-through cache of detected encodings, keyed by path
#[derive(Debug, Clone)]
pub struct EncodingCache {
    fallback: &'static Encoding,
    entries: HashMap<PathBuf, &'static Encoding>,
}

impl EncodingCache {
    pub fn new(fallback: &'static Encoding) -> Self {
        Self {
            fallback,
            entries: HashMap::new(),
        }
    }

    pub fn fallback(&self) -> &'static Encoding {
        self.fallback
    }

    pub fn get(&self, path: &Path) -> Option<&'static Encoding> {
        self.entries.get(path).copied()
    }

    /// Cached encoding for `path`, detecting it from `bytes` on first use
    pub fn get_or_detect(&mut self, path: &Path, bytes: &[u8]) -> &'static Encoding {
        let fallback = self.fallback;
        *self
            .entries
            .entry(path.to_path_buf())
            .or_insert_with(|| detect_encoding(bytes, fallback))
    }

    /// Record an encoding detected elsewhere; an existing entry is kept
    pub fn insert(&mut self, path: &Path, encoding: &'static Encoding) {
        self.entries.entry(path.to_path_buf()).or_insert(encoding);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One line of a log file, without its terminator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LogLine<'a> {
    /// 1-based line number
    pub number: usize,
    pub text: &'a str,
}

/// The decoded content of one log file
#[derive(Debug, Clone)]
pub struct LogSource {
    path: PathBuf,
    encoding: &'static Encoding,
    text: String,
}

impl LogSource {
    /// Read and decode a file, using the cache for its encoding
    pub fn open(path: &Path, cache: &mut EncodingCache) -> Result<Self> {
        let bytes = read_bytes(path)?;
        let encoding = cache.get_or_detect(path, &bytes);
        Ok(Self::decode(path, &bytes, encoding))
    }

    /// Read and decode a file without touching a shared cache
    ///
    /// `cached` is a previously detected encoding for this path, if any.
    pub fn open_with(path: &Path, cached: Option<&'static Encoding>, fallback: &'static Encoding) -> Result<Self> {
        let bytes = read_bytes(path)?;
        let encoding = cached.unwrap_or_else(|| detect_encoding(&bytes, fallback));
        Ok(Self::decode(path, &bytes, encoding))
    }

    /// Decode raw bytes; malformed sequences become U+FFFD
    pub fn decode(path: &Path, bytes: &[u8], encoding: &'static Encoding) -> Self {
        let (text, used, had_errors) = encoding.decode(bytes);
        if had_errors {
            log::debug!("Replaced malformed {} sequences in {:?}", used.name(), path);
        }
        Self {
            path: path.to_path_buf(),
            encoding: used,
            text: text.into_owned(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Lines in file order; `\n`, `\r\n` and a lone `\r` all end a line
    pub fn lines(&self) -> Lines<'_> {
        Lines {
            rest: &self.text,
            number: 0,
        }
    }
}

fn read_bytes(path: &Path) -> Result<Vec<u8>> {
    fs::read(path).map_err(|source| EngineError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Iterator over the lines of a `LogSource`
#[derive(Debug, Clone)]
pub struct Lines<'a> {
    rest: &'a str,
    number: usize,
}

impl<'a> Iterator for Lines<'a> {
    type Item = LogLine<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.rest.is_empty() {
            return None;
        }
        self.number += 1;
        let (text, rest) = match self.rest.find(['\n', '\r']) {
            Some(end) => {
                let terminator = if self.rest[end..].starts_with("\r\n") { 2 } else { 1 };
                (&self.rest[..end], &self.rest[end + terminator..])
            }
            None => (self.rest, ""),
        };
        self.rest = rest;
        Some(LogLine {
            number: self.number,
            text,
        })
    }
}
