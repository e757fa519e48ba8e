//! Merkle Tree Verification
//!
//! Rebuilds the Merkle tree of a traceability operation from the operations
//! it secured and checks the root against the secured tree and against the
//! digest indexed in the traceability descriptor.
//!
//! Window violations and digest mismatches are KO outcomes. Unreadable or
//! malformed inputs abort the run as FATAL.

use serde::Serialize;
use serde_json::json;
use std::collections::BTreeMap;
use std::io::BufRead;
use std::path::Path;
use tracing::{debug, error, field, info, info_span, warn, Span};
use uuid::Uuid;

use crate::error::Result;
use crate::traceability::event::{format_log_date, TimeWindow, TraceabilityEvent};
use crate::traceability::merkle::{DigestAlgorithm, MerkleTree, MerkleTreeAlgo, MerkleTreeDocument};
use crate::traceability::record::OperationRecordReader;
use crate::traceability::report::{prepare_report, save_report, TraceabilityError};
use crate::traceability::status::{ItemStatus, StatusCode};
use crate::workspace::{
    error_flag_path, merkle_tree_path, operations_data_path, report_path, Workspace,
};

pub const HANDLER_ID: &str = "CHECK_MERKLE_TREE";
pub const COMPARE_WITH_SAVED_HASH: &str = "COMPARE_MERKLE_HASH_WITH_SAVED_HASH";
pub const COMPARE_WITH_INDEXED_HASH: &str = "COMPARE_MERKLE_HASH_WITH_INDEXED_HASH";

/// State of one verification run, passed explicitly through the checks
#[derive(Debug, Clone)]
pub struct VerificationContext {
    pub run_id: Uuid,
    pub object_name: String,
    pub event: TraceabilityEvent,
    pub window: TimeWindow,
    pub algorithm: DigestAlgorithm,
}

impl VerificationContext {
    pub fn new(
        object_name: impl Into<String>,
        event: TraceabilityEvent,
        algorithm: DigestAlgorithm,
    ) -> Result<Self> {
        let window = event.window()?;
        Ok(Self {
            run_id: Uuid::new_v4(),
            object_name: object_name.into(),
            event,
            window,
            algorithm,
        })
    }
}

/// Result of scanning an operation stream
#[derive(Debug, Clone)]
pub struct TreeComputation {
    /// `None` once any operation fell outside the window
    pub tree: Option<MerkleTree>,
    /// Operation id -> offending `evDateTime`
    pub rejected_operations: BTreeMap<String, String>,
    pub records_read: usize,
}

impl TreeComputation {
    pub fn is_window_compliant(&self) -> bool {
        self.tree.is_some()
    }
}

/// Build the Merkle tree of the operations in `reader`, in stream order.
///
/// The first operation outside `window` abandons the tree; the stream is still
/// read to the end so every rejected operation is collected.
pub fn compute_merkle_tree<R: BufRead>(
    reader: R,
    window: &TimeWindow,
    algorithm: DigestAlgorithm,
) -> Result<TreeComputation> {
    let mut algo = MerkleTreeAlgo::new(algorithm);
    let mut rejected_operations = BTreeMap::new();
    let mut records_read = 0;

    for record in OperationRecordReader::new(reader) {
        let record = record?;
        records_read += 1;

        let timestamp = record.timestamp()?;
        if window.contains(&timestamp) {
            if rejected_operations.is_empty() {
                algo.add_leaf(record.leaf_content());
            }
        } else {
            warn!(
                "Operation {} dated {} is outside the traceability window",
                record.id, record.ev_date_time
            );
            rejected_operations.insert(record.id, record.ev_date_time);
        }
    }

    let tree = rejected_operations.is_empty().then(|| algo.generate());

    Ok(TreeComputation {
        tree,
        rejected_operations,
        records_read,
    })
}

/// Exact comparison of base64 digests; a missing computed root never matches
pub fn compare_digests(computed: Option<&str>, expected: &str) -> StatusCode {
    match computed {
        Some(computed) if computed == expected => StatusCode::Ok,
        _ => StatusCode::Ko,
    }
}

/// Outcome of a completed verification
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MerkleVerification {
    pub window_compliant: bool,
    pub computed_root: Option<String>,
    /// Comparison with the secured `merkleTree.json`, `None` when skipped
    pub secured_check: Option<StatusCode>,
    /// Comparison with the descriptor's indexed hash, `None` when skipped
    pub logged_check: Option<StatusCode>,
    pub rejected_operations: BTreeMap<String, String>,
    pub leaf_count: usize,
}

impl MerkleVerification {
    fn window_failed(rejected_operations: BTreeMap<String, String>) -> Self {
        Self {
            window_compliant: false,
            computed_root: None,
            secured_check: None,
            logged_check: None,
            rejected_operations,
            leaf_count: 0,
        }
    }

    pub fn status(&self) -> StatusCode {
        if !self.window_compliant {
            return StatusCode::Ko;
        }

        [self.secured_check, self.logged_check]
            .iter()
            .map(|check| check.unwrap_or(StatusCode::Ko))
            .fold(StatusCode::Ok, StatusCode::max)
    }

    pub fn to_item_status(&self) -> ItemStatus {
        let mut status = ItemStatus::new(HANDLER_ID).with_data("leafCount", self.leaf_count);

        if !self.window_compliant {
            return status
                .increment(StatusCode::Ko)
                .with_data("rejectedOperations", json!(self.rejected_operations));
        }

        if let Some(root) = &self.computed_root {
            status = status.with_data("computedRoot", root.clone());
        }

        let checks = [
            (COMPARE_WITH_SAVED_HASH, self.secured_check),
            (COMPARE_WITH_INDEXED_HASH, self.logged_check),
        ];
        for (item_id, check) in checks {
            status = status.with_sub_item(
                ItemStatus::new(item_id).increment(check.unwrap_or(StatusCode::Ko)),
            );
        }

        status.increment(StatusCode::Ok)
    }

    fn failure_summary(&self) -> Option<(TraceabilityError, String)> {
        if !self.window_compliant {
            return Some((
                TraceabilityError::OperationsOutOfWindow,
                format!(
                    "{} operation(s) outside the traceability window",
                    self.rejected_operations.len()
                ),
            ));
        }

        let failed: Vec<&str> = [
            (COMPARE_WITH_SAVED_HASH, self.secured_check),
            (COMPARE_WITH_INDEXED_HASH, self.logged_check),
        ]
        .iter()
        .filter(|(_, check)| *check != Some(StatusCode::Ok))
        .map(|(item_id, _)| *item_id)
        .collect();

        if failed.is_empty() {
            None
        } else {
            Some((
                TraceabilityError::InequalMerkleHash,
                format!("Merkle root mismatch: {}", failed.join(", ")),
            ))
        }
    }
}

/// Consistency check of a traceability operation's Merkle tree
pub struct MerkleVerifier<W> {
    workspace: W,
    algorithm: DigestAlgorithm,
}

impl<W: Workspace> MerkleVerifier<W> {
    pub fn new(workspace: W, algorithm: DigestAlgorithm) -> Self {
        Self {
            workspace,
            algorithm,
        }
    }

    /// Run the step and translate the outcome into a status record.
    ///
    /// Never fails: faults surface as a FATAL status.
    pub fn execute(&self, object_name: &str, descriptor_path: &Path) -> ItemStatus {
        let span = info_span!("check_merkle_tree", object = object_name, run_id = field::Empty);
        let _guard = span.enter();

        if self.workspace.exists(&error_flag_path(object_name)) {
            info!("A previous traceability check failed, skipping Merkle verification");
            return ItemStatus::new(HANDLER_ID).increment(StatusCode::Ko);
        }

        match self.run(object_name, descriptor_path) {
            Ok(status) => status,
            Err(e) => {
                error!("Merkle tree verification aborted: {}", e);
                ItemStatus::new(HANDLER_ID)
                    .increment(StatusCode::Fatal)
                    .with_data("error", e.to_string())
            }
        }
    }

    fn run(&self, object_name: &str, descriptor_path: &Path) -> Result<ItemStatus> {
        let event = TraceabilityEvent::load_from_file(descriptor_path)?;
        let context = VerificationContext::new(object_name, event, self.algorithm)?;
        Span::current().record("run_id", &field::display(context.run_id));
        info!(
            "Verifying Merkle tree of {} (window {} -> {}, {})",
            context.object_name,
            format_log_date(&context.window.start()),
            format_log_date(&context.window.end()),
            context.algorithm
        );

        let verification = self.verify(&context)?;
        self.record_outcome(&context, &verification)?;

        let status = verification.to_item_status();
        info!("Merkle tree verification finished: {}", status.global_status);
        Ok(status)
    }

    /// Scan, build, then compare against the secured and the indexed roots
    pub fn verify(&self, context: &VerificationContext) -> Result<MerkleVerification> {
        let computation = {
            let reader = self
                .workspace
                .open(&operations_data_path(&context.object_name))?;
            compute_merkle_tree(reader, &context.window, context.algorithm)?
        };

        let tree = match computation.tree {
            Some(tree) => tree,
            None => {
                warn!(
                    "{} of {} operations fall outside the traceability window",
                    computation.rejected_operations.len(),
                    computation.records_read
                );
                return Ok(MerkleVerification::window_failed(
                    computation.rejected_operations,
                ));
            }
        };

        self.check_descriptor_metadata(context, &tree);

        let computed_root = tree.root_base64();
        debug!("Computed Merkle root: {:?}", computed_root);

        let secured: MerkleTreeDocument = self
            .workspace
            .read_json(&merkle_tree_path(&context.object_name))?;

        let secured_check = compare_digests(computed_root.as_deref(), &secured.root);
        if !secured_check.is_ok() {
            warn!(
                "Computed Merkle root {:?} differs from secured root {}",
                computed_root, secured.root
            );
        }

        let logged_check = compare_digests(computed_root.as_deref(), &context.event.hash);
        if !logged_check.is_ok() {
            warn!(
                "Computed Merkle root {:?} differs from indexed hash {}",
                computed_root, context.event.hash
            );
        }

        Ok(MerkleVerification {
            window_compliant: true,
            computed_root,
            secured_check: Some(secured_check),
            logged_check: Some(logged_check),
            rejected_operations: BTreeMap::new(),
            leaf_count: tree.leaf_count(),
        })
    }

    fn check_descriptor_metadata(&self, context: &VerificationContext, tree: &MerkleTree) {
        if let Some(expected) = context.event.number_of_elements {
            if expected != tree.leaf_count() as u64 {
                warn!(
                    "Descriptor declares {} elements but {} operations were read",
                    expected,
                    tree.leaf_count()
                );
            }
        }

        if let Some(declared) = &context.event.digest_algorithm {
            match declared.parse::<DigestAlgorithm>() {
                Ok(algorithm) if algorithm == context.algorithm => {}
                _ => warn!(
                    "Descriptor declares digest algorithm {} but {} is configured",
                    declared, context.algorithm
                ),
            }
        }
    }

    fn record_outcome(
        &self,
        context: &VerificationContext,
        verification: &MerkleVerification,
    ) -> Result<()> {
        let status = verification.status();
        let failure = verification.failure_summary();
        let report = report_path(&context.object_name);
        let flag = error_flag_path(&context.object_name);

        let entry = prepare_report(&self.workspace, &report, &context.object_name, |entry| {
            entry.set_status(status);
            if let Some((error, message)) = &failure {
                entry.set_error(*error).set_message(message.clone());
            }
        })?;

        if failure.is_some() {
            self.workspace.put(&flag, b"")?;
        }

        // the flag must not outlive a report that was never written
        if let Err(e) = save_report(&self.workspace, &report, &entry) {
            if failure.is_some() {
                if let Err(cleanup) = self.workspace.remove(&flag) {
                    warn!("Failed to remove error flag {}: {}", flag, cleanup);
                }
            }
            return Err(e);
        }
        Ok(())
    }
}
