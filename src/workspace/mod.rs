//! Workspace
//!
//! Storage area shared by the steps of a traceability workflow. Documents are
//! addressed by relative paths; the verifier reads operation data and secured
//! Merkle trees from it and writes its report and error flag back.

pub mod fs;

pub use fs::FsWorkspace;

use serde::de::DeserializeOwned;
use std::io::BufRead;

use crate::error::{Result, VerifierError};

pub const TRACEABILITY_OPERATION_DIRECTORY: &str = "traceabilityOperation";
pub const TRACEABILITY_MERKLE_TREE: &str = "merkleTree.json";
pub const TRACEABILITY_DATA: &str = "data.txt";
pub const ERROR_FLAG: &str = "error_flag";
pub const REPORT: &str = "report.json";

pub trait Workspace {
    type Reader: BufRead;

    fn exists(&self, path: &str) -> bool;

    /// Open a document for sequential reading
    fn open(&self, path: &str) -> Result<Self::Reader>;

    /// Create or replace a document
    fn put(&self, path: &str, content: &[u8]) -> Result<()>;

    /// Delete a document; a missing document is not an error
    fn remove(&self, path: &str) -> Result<()>;

    fn read_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let reader = self.open(path)?;
        serde_json::from_reader(reader).map_err(|e| {
            VerifierError::MalformedContent(format!("invalid JSON document {}: {}", path, e))
        })
    }
}

/// Secured Merkle tree of a traceability operation
pub fn merkle_tree_path(object_name: &str) -> String {
    format!(
        "{}/{}/{}",
        TRACEABILITY_OPERATION_DIRECTORY, object_name, TRACEABILITY_MERKLE_TREE
    )
}

/// Operations secured by a traceability operation
pub fn operations_data_path(object_name: &str) -> String {
    format!(
        "{}/{}/{}",
        TRACEABILITY_OPERATION_DIRECTORY, object_name, TRACEABILITY_DATA
    )
}

pub fn error_flag_path(object_name: &str) -> String {
    format!("{}/{}", object_name, ERROR_FLAG)
}

pub fn report_path(object_name: &str) -> String {
    format!("{}/{}", object_name, REPORT)
}
