//! Traceability Report
//!
//! Per-run report entry kept in the workspace next to the operation being
//! checked. Each verification step records its outcome there.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::traceability::status::StatusCode;
use crate::workspace::Workspace;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TraceabilityError {
    InequalMerkleHash,
    OperationsOutOfWindow,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TraceabilityReportEntry {
    pub operation_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<TraceabilityError>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl TraceabilityReportEntry {
    pub fn new(operation_id: impl Into<String>) -> Self {
        Self {
            operation_id: operation_id.into(),
            ..Self::default()
        }
    }

    pub fn set_status(&mut self, status: StatusCode) -> &mut Self {
        self.status = Some(status.to_string());
        self
    }

    pub fn set_error(&mut self, error: TraceabilityError) -> &mut Self {
        self.error = Some(error);
        self
    }

    pub fn set_message(&mut self, message: impl Into<String>) -> &mut Self {
        self.message = Some(message.into());
        self
    }
}

/// Load the report at `path` (or start one) and apply `update`, without saving
pub fn prepare_report<W, F>(
    workspace: &W,
    path: &str,
    operation_id: &str,
    update: F,
) -> Result<TraceabilityReportEntry>
where
    W: Workspace,
    F: FnOnce(&mut TraceabilityReportEntry),
{
    let mut entry = if workspace.exists(path) {
        workspace.read_json::<TraceabilityReportEntry>(path)?
    } else {
        TraceabilityReportEntry::new(operation_id)
    };

    update(&mut entry);
    Ok(entry)
}

pub fn save_report<W: Workspace>(workspace: &W, path: &str, entry: &TraceabilityReportEntry) -> Result<()> {
    let json = serde_json::to_vec_pretty(entry)?;
    workspace.put(path, &json)
}
