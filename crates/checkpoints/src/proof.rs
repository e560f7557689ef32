//! Proof compression and wire encoding

use crate::smt::{check_depth, compute_default_nodes, default_nodes_for};
use crate::{CheckpointError, CompressedProof, MerkleProof, Result, DEPTH_257};

/// Drop every sibling equal to its height's default node.
pub fn compress_proof(proof: &MerkleProof) -> CompressedProof {
    let rounds = proof.siblings.len();
    let oversized;
    let defaults = if rounds < DEPTH_257 {
        default_nodes_for(rounds + 1)
    } else {
        oversized = compute_default_nodes(rounds + 1);
        &oversized[..]
    };

    let mut bitmap = vec![0u8; rounds.div_ceil(8)];
    let mut siblings = Vec::new();

    for (i, sibling) in proof.siblings.iter().enumerate() {
        if *sibling != defaults[i] {
            bitmap[i / 8] |= 1 << (i % 8);
            siblings.push(*sibling);
        }
    }

    CompressedProof {
        depth: (rounds + 1) as u16,
        bitmap,
        siblings,
    }
}

/// Expand a compressed proof back into the full sibling path.
pub fn decompress_proof(compressed: &CompressedProof) -> Result<MerkleProof> {
    let depth = compressed.depth as usize;
    check_depth(depth).map_err(|_| CheckpointError::InvalidProof)?;

    let rounds = depth - 1;
    if compressed.bitmap.len() != rounds.div_ceil(8) {
        return Err(CheckpointError::InvalidProof);
    }

    let defaults = default_nodes_for(depth);
    let mut full_siblings = Vec::with_capacity(rounds);
    let mut sib_iter = compressed.siblings.iter();

    for (i, default) in defaults.iter().take(rounds).enumerate() {
        let is_present = (compressed.bitmap[i / 8] >> (i % 8)) & 1 == 1;
        if is_present {
            match sib_iter.next() {
                Some(s) => full_siblings.push(*s),
                None => return Err(CheckpointError::InvalidProof),
            }
        } else {
            full_siblings.push(*default);
        }
    }

    if sib_iter.next().is_some() {
        return Err(CheckpointError::InvalidProof); // Too many siblings
    }

    Ok(MerkleProof { siblings: full_siblings })
}

/// Serialize a proof into the bytes handed to clients
pub fn encode_proof(proof: &MerkleProof) -> Result<Vec<u8>> {
    bincode::serialize(&compress_proof(proof))
        .map_err(|e| CheckpointError::MalformedEncoding(e.to_string()))
}

/// Inverse of [`encode_proof`]
pub fn decode_proof(raw: &[u8]) -> Result<MerkleProof> {
    let compressed: CompressedProof = bincode::deserialize(raw)
        .map_err(|e| CheckpointError::MalformedEncoding(e.to_string()))?;
    decompress_proof(&compressed).map_err(|_| {
        CheckpointError::MalformedEncoding("proof siblings do not match its bitmap".into())
    })
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use alloy_primitives::U256;

    use super::*;
    use crate::SparseMerkleTree;

    fn sample_proof() -> MerkleProof {
        let entries: BTreeMap<_, _> = [(U256::from(3u64), [1u8; 32]), (U256::from(900u64), [2u8; 32])]
            .into_iter()
            .collect();
        let tree = SparseMerkleTree::new(&entries, DEPTH_257).unwrap();
        tree.prove(U256::from(3u64)).unwrap()
    }

    #[test]
    fn sparse_proof_compresses_to_few_siblings() {
        let proof = sample_proof();
        let compressed = compress_proof(&proof);

        assert_eq!(compressed.depth as usize, DEPTH_257);
        assert_eq!(compressed.bitmap.len(), 32);
        // only the subtree holding key 900 is non-default on the path of key 3
        assert_eq!(compressed.siblings.len(), 1);
        assert_eq!(decompress_proof(&compressed).unwrap(), proof);
    }

    #[test]
    fn shallow_proof_compresses_against_its_own_defaults() {
        let entries: BTreeMap<_, _> = [(U256::from(5u64), [7u8; 32])].into_iter().collect();
        let tree = SparseMerkleTree::new(&entries, 9).unwrap();
        let proof = tree.prove(U256::from(5u64)).unwrap();

        let compressed = compress_proof(&proof);
        assert_eq!(compressed.depth, 9);
        assert!(compressed.siblings.is_empty());
        assert_eq!(decompress_proof(&compressed).unwrap(), proof);
    }

    #[test]
    fn decompress_rejects_sibling_count_mismatch() {
        let mut compressed = compress_proof(&sample_proof());
        compressed.siblings.push([9u8; 32]);
        assert!(matches!(decompress_proof(&compressed), Err(CheckpointError::InvalidProof)));

        compressed.siblings.clear();
        assert!(matches!(decompress_proof(&compressed), Err(CheckpointError::InvalidProof)));
    }

    #[test]
    fn decompress_rejects_bad_shape() {
        let mut compressed = compress_proof(&sample_proof());
        compressed.bitmap.pop();
        assert!(decompress_proof(&compressed).is_err());

        let bad_depth = CompressedProof { depth: 1, bitmap: vec![], siblings: vec![] };
        assert!(decompress_proof(&bad_depth).is_err());
    }
}
