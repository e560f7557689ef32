use crate::{CheckpointBlock, Result, Storage};

fn block_key(block_number: u64) -> Vec<u8> {
    block_number.to_string().into_bytes()
}

/// Persist the checkpoint set of `block` under `block_number`.
pub fn save_block<S: Storage + ?Sized>(storage: &S, block_number: u64, block: &CheckpointBlock) -> Result<()> {
    let raw = block.marshal()?;
    storage.put(&block_key(block_number), &raw)
}

/// Reload a persisted block. The result is unbuilt; call `build` to get proofs.
pub fn load_block<S: Storage + ?Sized>(storage: &S, block_number: u64) -> Result<Option<CheckpointBlock>> {
    match storage.get(&block_key(block_number))? {
        Some(raw) => Ok(Some(CheckpointBlock::from_bytes(&raw)?)),
        None => Ok(None),
    }
}
