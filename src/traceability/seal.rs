//! Traceability Sealing
//!
//! Computes the Merkle root of an operation stream and produces the two
//! artefacts a later consistency check reads: the secured `merkleTree.json`
//! and the traceability descriptor indexing the same root.

use chrono::NaiveDateTime;
use std::io::BufRead;
use tracing::info;

use crate::error::{Result, VerifierError};
use crate::traceability::event::TraceabilityEvent;
use crate::traceability::merkle::{DigestAlgorithm, MerkleTreeAlgo, MerkleTreeDocument};
use crate::traceability::record::OperationRecordReader;

pub const OPERATION_LOG_TYPE: &str = "OPERATION";

#[derive(Debug, Clone)]
pub struct SealedTraceability {
    pub event: TraceabilityEvent,
    pub merkle_tree: MerkleTreeDocument,
}

impl SealedTraceability {
    pub fn summary(&self) -> String {
        format!(
            "{} operations from {} to {}, root: {}",
            self.merkle_tree.leaf_count.unwrap_or_default(),
            self.event.start_date,
            self.event.end_date,
            self.merkle_tree.root
        )
    }
}

/// Earliest or latest operation date, with the text it was read from
type Bound = (NaiveDateTime, String);

/// Seal every operation of `reader`; the window spans the earliest and latest dates.
///
/// The bounds are written back exactly as the operations carry them so that no
/// precision is lost between sealing and verification.
pub fn seal_operations<R: BufRead>(reader: R, algorithm: DigestAlgorithm) -> Result<SealedTraceability> {
    let mut algo = MerkleTreeAlgo::new(algorithm);
    let mut bounds: Option<(Bound, Bound)> = None;

    for record in OperationRecordReader::new(reader) {
        let record = record?;
        let timestamp = record.timestamp()?;
        algo.add_leaf(record.leaf_content());

        let current = (timestamp, record.ev_date_time);
        bounds = Some(match bounds {
            None => (current.clone(), current),
            Some((start, end)) => {
                let start = if current.0 < start.0 { current.clone() } else { start };
                let end = if current.0 > end.0 { current } else { end };
                (start, end)
            }
        });
    }

    let ((_, start), (_, end)) = bounds.ok_or_else(|| {
        VerifierError::MalformedContent("cannot seal an empty operation stream".to_string())
    })?;

    let tree = algo.generate();
    let merkle_tree = MerkleTreeDocument::from_tree(&tree).ok_or_else(|| {
        VerifierError::MalformedContent("sealed tree has no root".to_string())
    })?;

    let event = TraceabilityEvent {
        start_date: start,
        end_date: end,
        hash: merkle_tree.root.clone(),
        log_type: Some(OPERATION_LOG_TYPE.to_string()),
        number_of_elements: Some(tree.leaf_count() as u64),
        file_name: None,
        digest_algorithm: Some(algorithm.to_string()),
        time_stamp_token: None,
    };

    let sealed = SealedTraceability { event, merkle_tree };
    info!("Sealed {}", sealed.summary());
    Ok(sealed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traceability::verify::compute_merkle_tree;
    use std::io::Cursor;

    const OPERATIONS: &str = concat!(
        r#"{"evId":"op-2","evDateTime":"2017-01-20T10:00:00.250"}"#,
        "\n",
        r#"{"evId":"op-1","evDateTime":"2017-01-05T08:30:00"}"#,
        "\n",
        r#"{"evId":"op-3","evDateTime":"2017-01-31T23:59:59.999"}"#,
        "\n",
    );

    #[test]
    fn test_seal_window_spans_all_operations() {
        let sealed = seal_operations(Cursor::new(OPERATIONS), DigestAlgorithm::Sha512).unwrap();

        assert_eq!(sealed.event.start_date, "2017-01-05T08:30:00");
        assert_eq!(sealed.event.end_date, "2017-01-31T23:59:59.999");
        assert_eq!(sealed.event.hash, sealed.merkle_tree.root);
        assert_eq!(sealed.event.number_of_elements, Some(3));
        assert_eq!(sealed.merkle_tree.leaf_count, Some(3));
        assert_eq!(sealed.event.digest_algorithm.as_deref(), Some("SHA-512"));
    }

    #[test]
    fn test_sealed_root_matches_recomputation() {
        let sealed = seal_operations(Cursor::new(OPERATIONS), DigestAlgorithm::Sha256).unwrap();
        let window = sealed.event.window().unwrap();

        let computation =
            compute_merkle_tree(Cursor::new(OPERATIONS), &window, DigestAlgorithm::Sha256).unwrap();
        assert_eq!(
            computation.tree.unwrap().root_base64().as_deref(),
            Some(sealed.merkle_tree.root.as_str())
        );
    }

    #[test]
    fn test_seal_empty_stream_fails() {
        let result = seal_operations(Cursor::new("\n\n"), DigestAlgorithm::Sha512);
        assert!(matches!(result, Err(VerifierError::MalformedContent(_))));
    }

    #[test]
    fn test_sealed_window_keeps_sub_millisecond_bounds() {
        let operations = concat!(
            r#"{"evId":"a","evDateTime":"2017-01-01T00:00:00.000250"}"#,
            "\n",
            r#"{"evId":"b","evDateTime":"2017-01-31T23:59:59.999500"}"#,
        );
        let sealed = seal_operations(Cursor::new(operations), DigestAlgorithm::Sha512).unwrap();

        assert_eq!(sealed.event.start_date, "2017-01-01T00:00:00.000250");
        assert_eq!(sealed.event.end_date, "2017-01-31T23:59:59.999500");

        let window = sealed.event.window().unwrap();
        let computation =
            compute_merkle_tree(Cursor::new(operations), &window, DigestAlgorithm::Sha512).unwrap();
        assert!(computation.is_window_compliant());
        assert!(computation.rejected_operations.is_empty());
        assert_eq!(
            computation.tree.unwrap().root_base64().as_deref(),
            Some(sealed.event.hash.as_str())
        );
    }
}
