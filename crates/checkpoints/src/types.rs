//! Core types for checkpoint commitments

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};

/// 32-byte hash
pub type Hash32 = [u8; 32];

/// 256-bit token identifier (the tree key)
pub type TokenId = U256;

/// Number of levels in a checkpoint tree: 256 key bits plus the root level.
pub const DEPTH_257: usize = 257;

/// Sparse Merkle Tree proof
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct MerkleProof {
    /// Sibling hashes from leaf to root
    pub siblings: Vec<Hash32>,
}

impl MerkleProof {
    pub fn new() -> Self {
        Self {
            siblings: Vec::with_capacity(DEPTH_257 - 1),
        }
    }

    /// Number of tree levels this proof spans (siblings + the root level)
    pub fn depth(&self) -> usize {
        self.siblings.len() + 1
    }
}

impl Default for MerkleProof {
    fn default() -> Self {
        Self::new()
    }
}

/// Proof with default siblings elided.
///
/// Bit `i` of `bitmap` is set when sibling `i` differs from the default node
/// at height `i`; only those siblings are carried, in path order.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompressedProof {
    pub depth: u16,            // levels, 257 for checkpoint blocks
    pub bitmap: Vec<u8>,       // depth - 1 bits
    pub siblings: Vec<Hash32>, // only non-default siblings
}

/// Parse a token id from its decimal string form.
///
/// Only plain ASCII digits are accepted: no sign, no radix prefix.
pub fn parse_token_id(s: &str) -> Option<TokenId> {
    if s.is_empty() || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    U256::from_str_radix(s, 10).ok()
}
