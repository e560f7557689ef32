//! Checkpoint block: the aggregation unit committed to the root chain.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use alloy_primitives::U256;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::smt::SparseMerkleTree;
use crate::{crypto, parse_token_id, proof};
use crate::{CheckpointError, Hash32, MerkleProof, Result, TokenId, DEPTH_257};

/// A set of `uid -> commitment` checkpoints that is built exactly once into
/// a sparse Merkle tree.
#[derive(Debug, Default)]
pub struct CheckpointBlock {
    state: Mutex<BlockState>,
    tree: OnceLock<SparseMerkleTree>,
}

#[derive(Debug, Default)]
struct BlockState {
    checkpoints: BTreeMap<TokenId, Hash32>,
    built: bool,
}

impl CheckpointBlock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restore an unbuilt block from [`CheckpointBlock::marshal`] output.
    pub fn from_bytes(raw: &[u8]) -> Result<Self> {
        let block = Self::new();
        block.unmarshal(raw)?;
        Ok(block)
    }

    /// Root of the built tree, or the zero hash before `build`.
    pub fn hash(&self) -> Hash32 {
        self.tree
            .get()
            .map(|tree| tree.root())
            .unwrap_or_else(crypto::zero_hash)
    }

    pub fn is_built(&self) -> bool {
        self.tree.get().is_some()
    }

    /// Record that `uid` is at `number` (usually a child-chain block number).
    pub fn add_checkpoint(&self, uid: TokenId, number: U256) -> Result<()> {
        self.insert(uid, crypto::commitment_for(number))
    }

    fn insert(&self, uid: TokenId, commitment: Hash32) -> Result<()> {
        let mut state = self.state.lock();
        if state.built {
            return Err(CheckpointError::AlreadyBuilt);
        }

        match state.checkpoints.entry(uid) {
            Entry::Occupied(_) => Err(CheckpointError::DuplicateCheckpoint(uid)),
            Entry::Vacant(slot) => {
                slot.insert(commitment);
                debug!(%uid, "checkpoint added");
                Ok(())
            }
        }
    }

    pub fn number_of_checkpoints(&self) -> usize {
        self.state.lock().checkpoints.len()
    }

    pub fn commitment(&self, uid: TokenId) -> Option<Hash32> {
        self.state.lock().checkpoints.get(&uid).copied()
    }

    /// Token ids in ascending order
    pub fn token_ids(&self) -> Vec<TokenId> {
        self.state.lock().checkpoints.keys().copied().collect()
    }

    /// Freeze the checkpoint set and build its tree. Only the first call wins.
    pub fn build(&self) -> Result<Hash32> {
        let mut state = self.state.lock();
        if state.built {
            return Err(CheckpointError::AlreadyBuilt);
        }

        let tree = SparseMerkleTree::new(&state.checkpoints, DEPTH_257)?;
        let root = tree.root();

        if self.tree.set(tree).is_err() {
            return Err(CheckpointError::AlreadyBuilt);
        }
        state.built = true;

        info!(
            checkpoints = state.checkpoints.len(),
            root = %hex::encode(root),
            "checkpoint block built"
        );
        Ok(root)
    }

    pub fn tree(&self) -> Option<&SparseMerkleTree> {
        self.tree.get()
    }

    /// Encoded proof for `uid`; empty until the block is built.
    pub fn create_proof(&self, uid: TokenId) -> Result<Vec<u8>> {
        match self.tree.get() {
            Some(tree) => proof::encode_proof(&tree.prove(uid)?),
            None => Ok(Vec::new()),
        }
    }

    pub fn proof(&self, uid: TokenId) -> Option<MerkleProof> {
        self.tree.get()?.prove(uid).ok()
    }

    /// JSON object of decimal uid -> `0x` hex commitment. The tree is not included.
    pub fn marshal(&self) -> Result<Vec<u8>> {
        let encoded: BTreeMap<String, String> = self
            .state
            .lock()
            .checkpoints
            .iter()
            .map(|(uid, commitment)| (uid.to_string(), format!("0x{}", hex::encode(commitment))))
            .collect();

        serde_json::to_vec(&encoded)
            .map_err(|e| CheckpointError::MalformedEncoding(format!("failed to encode checkpoints: {e}")))
    }

    /// Restore the checkpoints in `raw` into this block.
    ///
    /// Keys that are not decimal integers are skipped. A malformed commitment
    /// or a uid already present (in the block or twice in the blob) rejects
    /// the whole blob and leaves the block unchanged.
    pub fn unmarshal(&self, raw: &[u8]) -> Result<()> {
        let decoded: BTreeMap<String, String> = serde_json::from_slice(raw)
            .map_err(|e| CheckpointError::MalformedEncoding(format!("failed to decode checkpoints: {e}")))?;

        let mut parsed = Vec::with_capacity(decoded.len());
        for (uid_str, hash_str) in &decoded {
            let commitment = parse_hash(hash_str)?;
            match parse_token_id(uid_str) {
                Some(uid) => parsed.push((uid, commitment)),
                None => warn!(uid = %uid_str, "skipping checkpoint with non-decimal uid"),
            }
        }

        let mut state = self.state.lock();
        if state.built {
            return Err(CheckpointError::AlreadyBuilt);
        }

        let mut staged = BTreeMap::new();
        for (uid, commitment) in parsed {
            if state.checkpoints.contains_key(&uid) || staged.insert(uid, commitment).is_some() {
                return Err(CheckpointError::DuplicateCheckpoint(uid));
            }
        }

        let restored = staged.len();
        state.checkpoints.extend(staged);
        debug!(restored, "checkpoints restored");
        Ok(())
    }
}

/// Verify an encoded proof for `uid` against `root`.
///
/// `number` is the checkpointed value, or `None` to check that no checkpoint
/// exists for `uid`.
pub fn verify_checkpoint_proof(
    raw_proof: &[u8],
    uid: TokenId,
    number: Option<U256>,
    root: Hash32,
) -> Result<bool> {
    let proof = proof::decode_proof(raw_proof)?;
    Ok(SparseMerkleTree::<crate::InMemoryNodeStore>::verify_proof(
        &proof,
        uid,
        number.map(crypto::commitment_for),
        root,
    ))
}

fn parse_hash(s: &str) -> Result<Hash32> {
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| CheckpointError::MalformedEncoding(format!("hash {s:?} is missing 0x prefix")))?;

    let mut out = [0u8; 32];
    hex::decode_to_slice(digits, &mut out)
        .map_err(|e| CheckpointError::MalformedEncoding(format!("invalid hash {s:?}: {e}")))?;
    Ok(out)
}
