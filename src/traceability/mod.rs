//! Traceability Verification
//!
//! Merkle tree consistency checks for secured logbook operations: the
//! operations of a traceability window are re-hashed and the resulting root
//! is compared with the secured tree and the indexed digest.

pub mod event;
pub mod merkle;
pub mod record;
pub mod report;
pub mod seal;
pub mod status;
pub mod verify;

pub use event::{parse_log_date, TimeWindow, TraceabilityEvent};
pub use merkle::{DigestAlgorithm, MerkleTree, MerkleTreeAlgo, MerkleTreeDocument};
pub use seal::{seal_operations, SealedTraceability};
pub use status::{ItemStatus, StatusCode};
pub use verify::{compare_digests, compute_merkle_tree, MerkleVerification, MerkleVerifier, VerificationContext};
