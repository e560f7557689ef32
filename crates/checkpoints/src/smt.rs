use std::collections::BTreeMap;
use std::sync::OnceLock;

use alloy_primitives::U256;

use crate::crypto;
use crate::nodestore::{InMemoryNodeStore, NodeId, NodeStore};
use crate::{CheckpointError, Hash32, MerkleProof, Result, TokenId, DEPTH_257};

const MIN_DEPTH: usize = 2;
const ONE: U256 = U256::from_limbs([1, 0, 0, 0]);

/// Fixed-depth sparse Merkle tree over 256-bit keys.
///
/// Only occupied leaves and their ancestors are stored; every other node
/// resolves to the default hash of its height. The tree is immutable once
/// constructed.
#[derive(Debug)]
pub struct SparseMerkleTree<N: NodeStore = InMemoryNodeStore> {
    depth: usize,
    root: Hash32,
    default_nodes: Vec<Hash32>,
    leaf_count: usize,
    store: N,
}

impl SparseMerkleTree<InMemoryNodeStore> {
    /// Build a tree over `entries` (key -> commitment) with `depth` levels.
    pub fn new(entries: &BTreeMap<TokenId, Hash32>, depth: usize) -> Result<Self> {
        Self::with_store(entries, depth, InMemoryNodeStore::new())
    }
}

impl<N: NodeStore> SparseMerkleTree<N> {
    pub fn with_store(entries: &BTreeMap<TokenId, Hash32>, depth: usize, mut store: N) -> Result<Self> {
        check_depth(depth)?;
        for key in entries.keys() {
            check_key(*key, depth)?;
        }

        let default_nodes = default_nodes_for(depth).to_vec();

        // Fold level by level. Keys iterate in ascending order, so a left
        // child is always visited before its right sibling.
        let mut level: BTreeMap<TokenId, Hash32> = entries
            .iter()
            .map(|(key, commitment)| (*key, crypto::hash_leaf(*commitment)))
            .collect();

        for h in 0..depth - 1 {
            let mut parents = BTreeMap::new();
            for (&index, &hash) in &level {
                store.insert(NodeId::new(h, index), hash);

                let parent = index >> 1usize;
                if parents.contains_key(&parent) {
                    continue;
                }

                let sibling = level.get(&(index ^ ONE)).copied().unwrap_or(default_nodes[h]);
                let node = if index.bit(0) {
                    crypto::hash_internal(sibling, hash)
                } else {
                    crypto::hash_internal(hash, sibling)
                };
                parents.insert(parent, node);
            }
            level = parents;
        }

        let root = match level.get(&U256::ZERO) {
            Some(root) => {
                store.insert(NodeId::new(depth - 1, U256::ZERO), *root);
                *root
            }
            None => default_nodes[depth - 1],
        };

        Ok(Self {
            depth,
            root,
            default_nodes,
            leaf_count: entries.len(),
            store,
        })
    }

    pub fn root(&self) -> Hash32 {
        self.root
    }

    /// Levels in the tree, leaves and root included
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn default_nodes(&self) -> &[Hash32] {
        &self.default_nodes
    }

    /// Number of occupied leaves
    pub fn len(&self) -> usize {
        self.leaf_count
    }

    pub fn is_empty(&self) -> bool {
        self.leaf_count == 0
    }

    /// Leaf hash stored for `key`, if occupied
    pub fn leaf(&self, key: TokenId) -> Option<Hash32> {
        self.store.get(&NodeId::new(0, key))
    }

    /// Sibling path for `key`, leaf to root. Works for absent keys too.
    pub fn prove(&self, key: TokenId) -> Result<MerkleProof> {
        check_key(key, self.depth)?;

        let mut proof = MerkleProof {
            siblings: Vec::with_capacity(self.depth - 1),
        };
        for h in 0..self.depth - 1 {
            let sibling_id = NodeId::new(h, (key >> h) ^ ONE);
            proof.siblings.push(self.get_node_or_default(&sibling_id));
        }
        Ok(proof)
    }

    /// Fold `commitment` (or the empty leaf when `None`) up the proof and
    /// compare against `root`.
    pub fn verify_proof(
        proof: &MerkleProof,
        key: TokenId,
        commitment: Option<Hash32>,
        root: Hash32,
    ) -> bool {
        let rounds = proof.siblings.len();
        if rounds == 0 || rounds > DEPTH_257 - 1 || key.bit_len() > rounds {
            return false;
        }

        let mut current = match commitment {
            Some(c) => crypto::hash_leaf(c),
            None => crypto::empty_leaf_hash(),
        };
        for (h, sibling) in proof.siblings.iter().enumerate() {
            current = if key.bit(h) {
                crypto::hash_internal(*sibling, current)
            } else {
                crypto::hash_internal(current, *sibling)
            };
        }
        current == root
    }

    fn get_node_or_default(&self, id: &NodeId) -> Hash32 {
        self.store.get(id).unwrap_or(self.default_nodes[id.height as usize])
    }
}

/// Default (empty-subtree) hash for every height of a `depth`-level tree.
pub fn compute_default_nodes(depth: usize) -> Vec<Hash32> {
    let mut defaults = Vec::with_capacity(depth);
    defaults.push(crypto::empty_leaf_hash());
    for h in 1..depth {
        let prev = defaults[h - 1];
        defaults.push(crypto::hash_internal(prev, prev));
    }
    defaults
}

/// Cached default table, truncated to a `depth`-level tree. Heights do not
/// depend on the depth, so every table is a prefix of the deepest one.
pub(crate) fn default_nodes_for(depth: usize) -> &'static [Hash32] {
    static TABLE: OnceLock<Vec<Hash32>> = OnceLock::new();
    let table = TABLE.get_or_init(|| compute_default_nodes(DEPTH_257));
    &table[..depth.min(DEPTH_257)]
}

pub(crate) fn check_depth(depth: usize) -> Result<()> {
    if !(MIN_DEPTH..=DEPTH_257).contains(&depth) {
        return Err(CheckpointError::InvalidDepth(depth));
    }
    Ok(())
}

fn check_key(key: TokenId, depth: usize) -> Result<()> {
    if key.bit_len() > depth - 1 {
        return Err(CheckpointError::KeyOutOfRange { key, depth });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pairs: &[(u64, u8)]) -> BTreeMap<TokenId, Hash32> {
        pairs
            .iter()
            .map(|(k, v)| (U256::from(*k), [*v; 32]))
            .collect()
    }

    #[test]
    fn cached_defaults_match_fresh_table() {
        assert_eq!(default_nodes_for(9), compute_default_nodes(9).as_slice());
        assert_eq!(default_nodes_for(DEPTH_257), compute_default_nodes(DEPTH_257).as_slice());
        assert!(std::ptr::eq(default_nodes_for(DEPTH_257), default_nodes_for(DEPTH_257)));
    }

    #[test]
    fn empty_tree_root_is_top_default() {
        let tree = SparseMerkleTree::new(&BTreeMap::new(), DEPTH_257).unwrap();
        assert_eq!(tree.root(), tree.default_nodes()[DEPTH_257 - 1]);
        assert_eq!(tree.default_nodes().len(), DEPTH_257);
        assert!(tree.is_empty());
    }

    #[test]
    fn two_leaf_tree_matches_hand_fold() {
        // depth 2: one hashing round over a 1-bit key space
        let tree = SparseMerkleTree::new(&entries(&[(0, 1), (1, 2)]), 2).unwrap();
        let expected = crypto::hash_internal(crypto::hash_leaf([1; 32]), crypto::hash_leaf([2; 32]));
        assert_eq!(tree.root(), expected);
    }

    #[test]
    fn right_only_child_pairs_with_default() {
        let tree = SparseMerkleTree::new(&entries(&[(1, 9)]), 2).unwrap();
        let expected = crypto::hash_internal(crypto::empty_leaf_hash(), crypto::hash_leaf([9; 32]));
        assert_eq!(tree.root(), expected);
    }

    #[test]
    fn key_wider_than_depth_is_rejected() {
        let err = SparseMerkleTree::new(&entries(&[(256, 1)]), 9).unwrap_err();
        assert!(matches!(err, CheckpointError::KeyOutOfRange { depth: 9, .. }));
    }

    #[test]
    fn invalid_depth_is_rejected() {
        assert!(matches!(
            SparseMerkleTree::new(&BTreeMap::new(), 1),
            Err(CheckpointError::InvalidDepth(1))
        ));
        assert!(matches!(
            SparseMerkleTree::new(&BTreeMap::new(), 258),
            Err(CheckpointError::InvalidDepth(258))
        ));
    }

    #[test]
    fn full_small_key_space_terminates_and_proves() {
        // every key of an 8-bit space occupied
        let all: BTreeMap<TokenId, Hash32> = (0u64..256)
            .map(|k| (U256::from(k), crypto::hash_value(&k.to_be_bytes())))
            .collect();
        let tree = SparseMerkleTree::new(&all, 9).unwrap();
        for (key, commitment) in &all {
            let proof = tree.prove(*key).unwrap();
            assert!(!proof.siblings.iter().zip(tree.default_nodes()).any(|(s, d)| s == d));
            assert!(SparseMerkleTree::<InMemoryNodeStore>::verify_proof(
                &proof,
                *key,
                Some(*commitment),
                tree.root()
            ));
        }
    }
}
