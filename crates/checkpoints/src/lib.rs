//! Checkpoint commitments
//!
//! Aggregates per-token checkpoints into blocks committed by a depth-257
//! sparse Merkle tree, with inclusion and exclusion proofs per token id.

mod block;
mod crypto;
mod nodestore;
mod persist;
mod proof;
mod smt;
mod storage;
mod types;

pub use block::{verify_checkpoint_proof, CheckpointBlock};
pub use crypto::{commitment_for, empty_leaf_hash, hash_internal, hash_leaf, hash_value, zero_hash};
pub use nodestore::{InMemoryNodeStore, NodeId, NodeStore};
pub use persist::{load_block, save_block};
pub use proof::{compress_proof, decode_proof, decompress_proof, encode_proof};
pub use smt::{compute_default_nodes, SparseMerkleTree};
pub use storage::{FileBackedStorage, InMemoryStorage, Storage, BLOCKS_BUCKET, CHECKPOINTS_BUCKET};
pub use types::{parse_token_id, CompressedProof, Hash32, MerkleProof, TokenId, DEPTH_257};

pub use alloy_primitives::U256;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CheckpointError {
    #[error("checkpoint for uid {0} already exist in the block")]
    DuplicateCheckpoint(TokenId),

    #[error("block is already built")]
    AlreadyBuilt,

    #[error("Malformed encoding: {0}")]
    MalformedEncoding(String),

    #[error("key {key} does not fit in a tree of depth {depth}")]
    KeyOutOfRange { key: TokenId, depth: usize },

    #[error("unsupported tree depth {0}")]
    InvalidDepth(usize),

    #[error("Invalid proof")]
    InvalidProof,

    #[error("Storage error: {0}")]
    Storage(String),
}

pub type Result<T> = std::result::Result<T, CheckpointError>;
