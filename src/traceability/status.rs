//! Step Status
//!
//! Status records handed back to the workflow that invoked a verification
//! step. KO and FATAL are data here, not errors.

use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;

/// Ordered by severity, aggregation keeps the worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusCode {
    #[default]
    Unknown,
    Ok,
    Warning,
    Ko,
    Fatal,
}

impl StatusCode {
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Unknown => "UNKNOWN",
            Self::Ok => "OK",
            Self::Warning => "WARNING",
            Self::Ko => "KO",
            Self::Fatal => "FATAL",
        };
        f.write_str(name)
    }
}

/// Status of a step or sub-action, with nested sub-item statuses
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStatus {
    pub item_id: String,
    pub global_status: StatusCode,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub sub_items: BTreeMap<String, ItemStatus>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub data: BTreeMap<String, Value>,
}

impl ItemStatus {
    pub fn new(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            ..Self::default()
        }
    }

    /// Raise the global status to `status` if it is worse
    pub fn increment(mut self, status: StatusCode) -> Self {
        self.global_status = self.global_status.max(status);
        self
    }

    /// Attach a sub-item; its status feeds the global status
    pub fn with_sub_item(mut self, sub_item: ItemStatus) -> Self {
        self.global_status = self.global_status.max(sub_item.global_status);
        self.sub_items.insert(sub_item.item_id.clone(), sub_item);
        self
    }

    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    pub fn sub_item_status(&self, item_id: &str) -> Option<StatusCode> {
        self.sub_items.get(item_id).map(|item| item.global_status)
    }
}
