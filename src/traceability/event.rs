//! Traceability Event
//!
//! The descriptor of a traceability operation: the time window the operation
//! secured and the Merkle root digest indexed alongside it.

use chrono::{DateTime, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

use crate::error::{Result, VerifierError};

/// Date layout used by logbook documents (no zone, optional fraction)
pub const LOGBOOK_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("cannot parse '{value}' as a logbook date")]
pub struct DateParseError {
    pub value: String,
}

/// Parse a logbook date.
///
/// Accepts the zone-less logbook layout first, then RFC 3339 with an offset,
/// which is normalized to UTC.
pub fn parse_log_date(value: &str) -> std::result::Result<NaiveDateTime, DateParseError> {
    let trimmed = value.trim();
    if let Ok(date) = NaiveDateTime::parse_from_str(trimmed, LOGBOOK_DATE_FORMAT) {
        return Ok(date);
    }

    DateTime::parse_from_rfc3339(trimmed)
        .map(|date| date.naive_utc())
        .map_err(|_| DateParseError {
            value: value.to_string(),
        })
}

/// Format a date the way logbook documents store it: milliseconds, or finer
/// when the date carries sub-millisecond precision
pub fn format_log_date(date: &NaiveDateTime) -> String {
    if date.nanosecond() % 1_000_000 == 0 {
        date.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
    } else {
        date.format(LOGBOOK_DATE_FORMAT).to_string()
    }
}

/// Traceability operation descriptor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceabilityEvent {
    #[serde(alias = "StartDate")]
    pub start_date: String,
    #[serde(alias = "EndDate")]
    pub end_date: String,
    #[serde(alias = "Hash")]
    pub hash: String,
    #[serde(default, alias = "LogType", skip_serializing_if = "Option::is_none")]
    pub log_type: Option<String>,
    #[serde(default, alias = "NumberOfElements", skip_serializing_if = "Option::is_none")]
    pub number_of_elements: Option<u64>,
    #[serde(default, alias = "FileName", skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, alias = "DigestAlgorithm", skip_serializing_if = "Option::is_none")]
    pub digest_algorithm: Option<String>,
    #[serde(default, alias = "TimeStampToken", skip_serializing_if = "Option::is_none")]
    pub time_stamp_token: Option<String>,
}

impl TraceabilityEvent {
    /// Load a descriptor from a file resolved by the calling workflow
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => VerifierError::InputUnavailable(format!(
                "traceability descriptor not found: {}",
                path.display()
            )),
            _ => VerifierError::io(format!("opening descriptor {}", path.display()), e),
        })?;

        let event = Self::from_reader(BufReader::new(file))?;
        debug!(
            "Loaded traceability descriptor {} ({} -> {})",
            path.display(),
            event.start_date,
            event.end_date
        );
        Ok(event)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        serde_json::from_reader(reader).map_err(|e| {
            VerifierError::MalformedContent(format!("invalid traceability descriptor: {}", e))
        })
    }

    /// Resolve the validity window declared by this descriptor
    pub fn window(&self) -> Result<TimeWindow> {
        let start = parse_log_date(&self.start_date)?;
        let end = parse_log_date(&self.end_date)?;
        TimeWindow::new(start, end)
    }
}

/// Inclusive `[start, end]` validity window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: NaiveDateTime,
    end: NaiveDateTime,
}

impl TimeWindow {
    pub fn new(start: NaiveDateTime, end: NaiveDateTime) -> Result<Self> {
        if start > end {
            return Err(VerifierError::invalid_window(
                &format_log_date(&start),
                &format_log_date(&end),
            ));
        }
        Ok(Self { start, end })
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    /// Boundaries belong to the window
    pub fn contains(&self, date: &NaiveDateTime) -> bool {
        *date >= self.start && *date <= self.end
    }
}
