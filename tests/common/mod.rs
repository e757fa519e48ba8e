use serde_json::json;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

use traceability_verifier::traceability::{DigestAlgorithm, MerkleTreeAlgo};
use traceability_verifier::workspace::{merkle_tree_path, operations_data_path, FsWorkspace, Workspace};

pub const OBJECT_NAME: &str = "aecaaaaaacfhnlqnabpe2alqbqvj6kaaaaaq";
pub const T0: &str = "2017-03-01T00:00:00.000";
pub const T1: &str = "2017-03-15T12:30:00.500";
pub const T2: &str = "2017-03-31T23:59:59.999";

/// Workspace on disk plus the descriptor file handed to the step
pub struct Fixture {
    pub dir: TempDir,
    pub workspace: FsWorkspace,
    pub descriptor_path: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let workspace = FsWorkspace::new(dir.path().join("workspace"));
        let descriptor_path = dir.path().join("traceability_event.json");
        Self {
            dir,
            workspace,
            descriptor_path,
        }
    }

    pub fn with_operations(self, lines: &[String]) -> Self {
        self.workspace
            .put(&operations_data_path(OBJECT_NAME), lines.join("\n").as_bytes())
            .expect("Failed to write operations");
        self
    }

    pub fn with_secured_root(self, root: &str) -> Self {
        let document = json!({ "Root": root });
        self.workspace
            .put(&merkle_tree_path(OBJECT_NAME), document.to_string().as_bytes())
            .expect("Failed to write merkle tree");
        self
    }

    pub fn with_descriptor(self, start: &str, end: &str, hash: &str) -> Self {
        let descriptor = json!({
            "LogType": "OPERATION",
            "StartDate": start,
            "EndDate": end,
            "Hash": hash,
            "TimeStampToken": "MIIEljAVAgEAMBAMDk9wZXJhdGlvbiBPa2F5",
            "NumberOfElements": 3,
            "DigestAlgorithm": "SHA512"
        });
        fs::write(&self.descriptor_path, descriptor.to_string()).expect("Failed to write descriptor");
        self
    }
}

/// A logbook operation line as stored in traceability data files
pub fn operation(id: &str, date: &str) -> String {
    json!({
        "_id": id,
        "evId": id,
        "evType": "PROCESS_SIP_UNITARY",
        "evDateTime": date,
        "outcome": "OK",
        "events": [{ "evType": "CHECK_SEDA", "evDateTime": date }]
    })
    .to_string()
}

pub fn in_window_operations() -> Vec<String> {
    vec![
        operation("aedqaaaaacaam7mxaaaamakvhiv4rsiaaaaq", T0),
        operation("aedqaaaaacaam7mxaaaamakvhiv4rsiaaaba", T1),
        operation("aedqaaaaacaam7mxaaaamakvhiv4rsiaaabq", T2),
    ]
}

pub fn root_of(lines: &[String], algorithm: DigestAlgorithm) -> String {
    let mut algo = MerkleTreeAlgo::new(algorithm);
    for line in lines {
        algo.add_leaf(line.as_bytes());
    }
    algo.generate().root_base64().expect("Tree has no root")
}
