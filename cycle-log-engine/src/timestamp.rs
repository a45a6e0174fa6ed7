//! Bracketed timestamp extraction
//!
//! Locates the first `[...]` group of a line and parses it with the configured
//! candidate formats. Format order matters: the first format that parses wins.

use crate::types::Timestamp;
use chrono::format::ParseErrorKind;
use chrono::{NaiveDate, NaiveDateTime};

/// Outcome of looking for a timestamp on one line
#[derive(Debug, Clone, PartialEq)]
pub enum TimestampMatch<'a> {
    /// The line has no bracketed group
    Missing,
    /// A bracketed group exists but no format parsed it
    Unrecognized(&'a str),
    Parsed(Timestamp),
}

/// Parses bracketed timestamps using an ordered list of formats
#[derive(Debug, Clone)]
pub struct TimestampParser {
    formats: Vec<String>,
}

impl TimestampParser {
    /// Create a parser; formats must already be in chrono notation
    pub fn new(formats: &[String]) -> Self {
        Self {
            formats: formats.to_vec(),
        }
    }

    /// Find and parse the timestamp of a line
    pub fn extract<'a>(&self, line: &'a str) -> TimestampMatch<'a> {
        let Some(raw) = first_bracketed(line) else {
            return TimestampMatch::Missing;
        };
        match self.parse(raw) {
            Some(ts) => TimestampMatch::Parsed(ts),
            None => TimestampMatch::Unrecognized(raw),
        }
    }

    /// Like `extract`, but folds an unrecognized timestamp into `None`
    pub fn parse_line(&self, line: &str) -> Option<Timestamp> {
        match self.extract(line) {
            TimestampMatch::Parsed(ts) => Some(ts),
            TimestampMatch::Unrecognized(raw) => {
                log::debug!("Unrecognized timestamp: {}", raw);
                None
            }
            TimestampMatch::Missing => None,
        }
    }

    /// Try each format in order
    pub fn parse(&self, raw: &str) -> Option<Timestamp> {
        self.formats.iter().find_map(|format| parse_with(raw, format))
    }
}

fn parse_with(raw: &str, format: &str) -> Option<Timestamp> {
    match NaiveDateTime::parse_from_str(raw, format) {
        Ok(ts) => Some(ts),
        // Date-only formats lack a time component; they mean midnight
        Err(e) if e.kind() == ParseErrorKind::NotEnough => NaiveDate::parse_from_str(raw, format)
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0)),
        Err(_) => None,
    }
}

/// Content of the first `[...]` group with at least one character
fn first_bracketed(line: &str) -> Option<&str> {
    let mut offset = 0;
    while let Some(open) = line[offset..].find('[') {
        let start = offset + open + 1;
        let close = start + line[start..].find(']')?;
        if close > start {
            return Some(&line[start..close]);
        }
        offset = start;
    }
    None
}
