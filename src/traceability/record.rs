//! Operation Records
//!
//! One serialized logbook operation per line. The raw line is the Merkle leaf;
//! only the identifier and `evDateTime` are interpreted.

use chrono::NaiveDateTime;
use serde_json::Value;
use std::io::BufRead;

use crate::error::{Result, VerifierError};
use crate::traceability::event::parse_log_date;

pub const EVENT_DATE_TIME: &str = "evDateTime";
pub const EVENT_ID: &str = "evId";
pub const DOCUMENT_ID: &str = "_id";

/// A single logbook operation line
#[derive(Debug, Clone, PartialEq)]
pub struct OperationRecord {
    pub line_number: usize,
    pub id: String,
    pub ev_date_time: String,
    pub raw: String,
}

impl OperationRecord {
    pub fn parse(line: &str, line_number: usize) -> Result<Self> {
        let document: Value = serde_json::from_str(line).map_err(|e| {
            VerifierError::MalformedContent(format!(
                "operation at line {} is not valid JSON: {}",
                line_number, e
            ))
        })?;

        let ev_date_time = document
            .get(EVENT_DATE_TIME)
            .and_then(Value::as_str)
            .ok_or_else(|| {
                VerifierError::missing_field(&format!("operation at line {}", line_number), EVENT_DATE_TIME)
            })?
            .to_string();

        let id = [EVENT_ID, DOCUMENT_ID]
            .iter()
            .find_map(|field| document.get(*field).and_then(Value::as_str))
            .map(str::to_string)
            .unwrap_or_else(|| format!("line:{}", line_number));

        Ok(Self {
            line_number,
            id,
            ev_date_time,
            raw: line.to_string(),
        })
    }

    pub fn timestamp(&self) -> Result<NaiveDateTime> {
        Ok(parse_log_date(&self.ev_date_time)?)
    }

    /// Bytes hashed into the Merkle leaf
    pub fn leaf_content(&self) -> &[u8] {
        self.raw.as_bytes()
    }
}

/// Sequential reader over an operation stream.
///
/// Yields records in stream order, skips blank lines and stops after the
/// first error.
pub struct OperationRecordReader<R> {
    lines: std::io::Lines<R>,
    line_number: usize,
    failed: bool,
}

impl<R: BufRead> OperationRecordReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
            failed: false,
        }
    }
}

impl<R: BufRead> Iterator for OperationRecordReader<R> {
    type Item = Result<OperationRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        loop {
            let line = self.lines.next()?;
            self.line_number += 1;

            let result = match line {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => OperationRecord::parse(line.trim_end_matches('\r'), self.line_number),
                Err(e) => Err(VerifierError::io(
                    format!("reading operation line {}", self.line_number),
                    e,
                )),
            };

            self.failed = result.is_err();
            return Some(result);
        }
    }
}
