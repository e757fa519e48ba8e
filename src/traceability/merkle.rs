//! Merkle Tree for Traceability Operations
//!
//! Builds a binary hash tree over logbook operation records, in the order the
//! records were secured, and exposes its root digest in base64.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha384, Sha512};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, info};

use crate::error::VerifierError;

/// Digest algorithm used for leaves and internal nodes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DigestAlgorithm {
    Sha256,
    Sha384,
    #[default]
    Sha512,
}

impl DigestAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
        }
    }

    pub fn digest(&self, data: &[u8]) -> Vec<u8> {
        self.digest_pair(data, &[])
    }

    /// Digest of `left` immediately followed by `right`
    pub fn digest_pair(&self, left: &[u8], right: &[u8]) -> Vec<u8> {
        match self {
            Self::Sha256 => digest_with(Sha256::new(), left, right),
            Self::Sha384 => digest_with(Sha384::new(), left, right),
            Self::Sha512 => digest_with(Sha512::new(), left, right),
        }
    }
}

fn digest_with<D: Digest>(mut hasher: D, left: &[u8], right: &[u8]) -> Vec<u8> {
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().to_vec()
}

impl fmt::Display for DigestAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DigestAlgorithm {
    type Err = VerifierError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized: String = value
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_uppercase();

        match normalized.as_str() {
            "SHA256" => Ok(Self::Sha256),
            "SHA384" => Ok(Self::Sha384),
            "SHA512" => Ok(Self::Sha512),
            _ => Err(VerifierError::ConfigError(format!(
                "Unsupported digest algorithm: {}",
                value
            ))),
        }
    }
}

impl TryFrom<String> for DigestAlgorithm {
    type Error = VerifierError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DigestAlgorithm> for String {
    fn from(algorithm: DigestAlgorithm) -> Self {
        algorithm.name().to_string()
    }
}

/// Merkle tree node
#[derive(Debug, Clone)]
pub struct MerkleNode {
    pub digest: Vec<u8>,
    pub left: Option<Box<MerkleNode>>,
    pub right: Option<Box<MerkleNode>>,
}

impl MerkleNode {
    /// Create leaf node from raw record content
    pub fn leaf(algorithm: DigestAlgorithm, content: &[u8]) -> Self {
        Self {
            digest: algorithm.digest(content),
            left: None,
            right: None,
        }
    }

    /// Create internal node from two child nodes
    pub fn internal(algorithm: DigestAlgorithm, left: MerkleNode, right: MerkleNode) -> Self {
        let digest = algorithm.digest_pair(&left.digest, &right.digest);

        Self {
            digest,
            left: Some(Box::new(left)),
            right: Some(Box::new(right)),
        }
    }

    /// Create node for the last node of an odd-sized level, paired with itself
    pub fn single_child(algorithm: DigestAlgorithm, child: MerkleNode) -> Self {
        let digest = algorithm.digest_pair(&child.digest, &child.digest);

        Self {
            digest,
            left: Some(Box::new(child.clone())),
            right: Some(Box::new(child)),
        }
    }
}

/// Append-only builder: leaves are kept in insertion order, never sorted
#[derive(Debug, Clone)]
pub struct MerkleTreeAlgo {
    algorithm: DigestAlgorithm,
    leaves: Vec<MerkleNode>,
}

impl MerkleTreeAlgo {
    pub fn new(algorithm: DigestAlgorithm) -> Self {
        Self {
            algorithm,
            leaves: Vec::new(),
        }
    }

    pub fn add_leaf(&mut self, content: &[u8]) {
        let leaf = MerkleNode::leaf(self.algorithm, content);
        debug!(
            "Merkle leaf {}: {}",
            self.leaves.len(),
            hex::encode(&leaf.digest)
        );
        self.leaves.push(leaf);
    }

    /// Build the tree bottom-up
    pub fn generate(self) -> MerkleTree {
        let algorithm = self.algorithm;
        let leaf_count = self.leaves.len();
        if leaf_count == 0 {
            return MerkleTree {
                algorithm,
                root: None,
                leaf_count,
            };
        }

        info!("Building Merkle tree from {} leaves", leaf_count);

        let mut nodes: VecDeque<MerkleNode> = self.leaves.into();

        while nodes.len() > 1 {
            let mut next_level = VecDeque::with_capacity(nodes.len() / 2 + 1);

            while let Some(left) = nodes.pop_front() {
                if let Some(right) = nodes.pop_front() {
                    next_level.push_back(MerkleNode::internal(algorithm, left, right));
                } else {
                    next_level.push_back(MerkleNode::single_child(algorithm, left));
                }
            }

            nodes = next_level;
        }

        let root = nodes.pop_front();
        if let Some(root) = &root {
            debug!("Merkle tree root: {}", hex::encode(&root.digest));
        }

        MerkleTree {
            algorithm,
            root,
            leaf_count,
        }
    }
}

/// Completed Merkle tree
#[derive(Debug, Clone)]
pub struct MerkleTree {
    algorithm: DigestAlgorithm,
    root: Option<MerkleNode>,
    leaf_count: usize,
}

impl MerkleTree {
    pub fn algorithm(&self) -> DigestAlgorithm {
        self.algorithm
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    /// Raw root digest, `None` for an empty tree
    pub fn root(&self) -> Option<&[u8]> {
        self.root.as_ref().map(|node| node.digest.as_slice())
    }

    /// Root digest in base64, the encoding persisted and indexed
    pub fn root_base64(&self) -> Option<String> {
        self.root().map(|digest| STANDARD.encode(digest))
    }
}

/// Secured Merkle tree document (`merkleTree.json`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MerkleTreeDocument {
    #[serde(rename = "Root")]
    pub root: String,
    #[serde(rename = "Algorithm", default, skip_serializing_if = "Option::is_none")]
    pub algorithm: Option<DigestAlgorithm>,
    #[serde(rename = "LeafCount", default, skip_serializing_if = "Option::is_none")]
    pub leaf_count: Option<usize>,
}

impl MerkleTreeDocument {
    /// Document for a tree, `None` when the tree has no root to secure
    pub fn from_tree(tree: &MerkleTree) -> Option<Self> {
        tree.root_base64().map(|root| Self {
            root,
            algorithm: Some(tree.algorithm()),
            leaf_count: Some(tree.leaf_count()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tree_of(algorithm: DigestAlgorithm, leaves: &[&str]) -> MerkleTree {
        let mut algo = MerkleTreeAlgo::new(algorithm);
        for leaf in leaves {
            algo.add_leaf(leaf.as_bytes());
        }
        algo.generate()
    }

    #[test]
    fn test_merkle_tree_construction() {
        let tree = tree_of(DigestAlgorithm::Sha256, &["a", "b", "c", "d"]);

        assert_eq!(tree.leaf_count(), 4);
        assert_eq!(tree.root().unwrap().len(), 32);

        let algorithm = DigestAlgorithm::Sha256;
        let ab = algorithm.digest_pair(&algorithm.digest(b"a"), &algorithm.digest(b"b"));
        let cd = algorithm.digest_pair(&algorithm.digest(b"c"), &algorithm.digest(b"d"));
        assert_eq!(tree.root().unwrap(), algorithm.digest_pair(&ab, &cd).as_slice());
    }

    #[test]
    fn test_root_of_two_leaves() {
        let algorithm = DigestAlgorithm::Sha256;
        let left = algorithm.digest(b"first");
        let right = algorithm.digest(b"second");
        let expected = algorithm.digest_pair(&left, &right);

        let tree = tree_of(algorithm, &["first", "second"]);
        assert_eq!(tree.root().unwrap(), expected.as_slice());
        assert_eq!(tree.root_base64().unwrap(), STANDARD.encode(&expected));
    }

    #[test]
    fn test_odd_level_pairs_last_node_with_itself() {
        let algorithm = DigestAlgorithm::Sha512;
        let a = algorithm.digest(b"a");
        let b = algorithm.digest(b"b");
        let c = algorithm.digest(b"c");
        let ab = algorithm.digest_pair(&a, &b);
        let cc = algorithm.digest_pair(&c, &c);
        let expected = algorithm.digest_pair(&ab, &cc);

        let tree = tree_of(algorithm, &["a", "b", "c"]);
        assert_eq!(tree.root().unwrap(), expected.as_slice());
    }

    #[test]
    fn test_single_leaf_root_is_leaf_digest() {
        let tree = tree_of(DigestAlgorithm::Sha384, &["only"]);
        assert_eq!(
            tree.root().unwrap(),
            DigestAlgorithm::Sha384.digest(b"only").as_slice()
        );
        assert_eq!(tree.leaf_count(), 1);
    }

    #[test]
    fn test_empty_tree_has_no_root() {
        let tree = tree_of(DigestAlgorithm::Sha512, &[]);
        assert!(tree.root().is_none());
        assert!(tree.root_base64().is_none());
        assert!(MerkleTreeDocument::from_tree(&tree).is_none());
    }

    #[test]
    fn test_root_is_order_sensitive() {
        let forward = tree_of(DigestAlgorithm::Sha512, &["a", "b", "c"]);
        let swapped = tree_of(DigestAlgorithm::Sha512, &["b", "a", "c"]);
        let reversed = tree_of(DigestAlgorithm::Sha512, &["c", "b", "a"]);

        assert_ne!(forward.root_base64(), swapped.root_base64());
        assert_ne!(forward.root_base64(), reversed.root_base64());
    }

    #[test]
    fn test_duplicate_leaves_are_kept() {
        let once = tree_of(DigestAlgorithm::Sha256, &["a", "b"]);
        let twice = tree_of(DigestAlgorithm::Sha256, &["a", "b", "b"]);
        assert_eq!(twice.leaf_count(), 3);
        assert_ne!(once.root_base64(), twice.root_base64());
    }

    #[test]
    fn test_root_is_deterministic() {
        let leaves = ["x", "y", "z", "w", "v"];
        let first = tree_of(DigestAlgorithm::Sha512, &leaves);
        let second = tree_of(DigestAlgorithm::Sha512, &leaves);
        assert_eq!(first.root_base64(), second.root_base64());
    }

    #[test]
    fn test_algorithm_changes_root() {
        let sha256 = tree_of(DigestAlgorithm::Sha256, &["a", "b"]);
        let sha512 = tree_of(DigestAlgorithm::Sha512, &["a", "b"]);
        assert_ne!(sha256.root_base64(), sha512.root_base64());
    }

    #[test]
    fn test_digest_algorithm_parsing() {
        assert_eq!("SHA-512".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha512);
        assert_eq!("sha256".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha256);
        assert_eq!("Sha_384".parse::<DigestAlgorithm>().unwrap(), DigestAlgorithm::Sha384);
        assert!("MD5".parse::<DigestAlgorithm>().is_err());
        assert_eq!(DigestAlgorithm::default().to_string(), "SHA-512");
    }

    #[test]
    fn test_merkle_tree_document_fields() {
        let tree = tree_of(DigestAlgorithm::Sha256, &["a"]);
        let document = MerkleTreeDocument::from_tree(&tree).unwrap();
        let value = serde_json::to_value(&document).unwrap();

        assert_eq!(value["Root"], tree.root_base64().unwrap());
        assert_eq!(value["Algorithm"], "SHA-256");
        assert_eq!(value["LeafCount"], 1);

        let minimal: MerkleTreeDocument = serde_json::from_str(r#"{"Root": "abc="}"#).unwrap();
        assert_eq!(minimal.root, "abc=");
        assert!(minimal.algorithm.is_none());
    }
}
