use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use checkpoints::{
    load_block, save_block, verify_checkpoint_proof, CheckpointBlock, CheckpointError, Hash32, Storage, U256,
};
use rootchain::{Address, Backend, Receipt, RootChainCall, Transaction, TransportClient};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

#[derive(Clone, Debug)]
pub struct RoundOutcome {
    pub round: u64,
    pub root: Hash32,
    pub checkpoints: usize,
    pub skipped: usize,
    pub receipt: Receipt,
}

/// Collects checkpoints from the root chain, commits them and publishes the root.
pub struct CheckpointAggregator<S: Storage> {
    backend: Backend,
    transport: TransportClient,
    storage: Arc<S>,
    operator: Address,
    workers: usize,
    nonce: AtomicU64,
}

impl<S: Storage> CheckpointAggregator<S> {
    pub fn new(
        backend: Backend,
        transport: TransportClient,
        storage: Arc<S>,
        operator: Address,
        workers: usize,
    ) -> Self {
        Self {
            backend,
            transport,
            storage,
            operator,
            workers: workers.max(1),
            nonce: AtomicU64::new(0),
        }
    }

    /// One full round: collect, build, publish, persist.
    pub async fn run_round(&self, round: u64, uids: &[U256]) -> Result<RoundOutcome> {
        let challenge_period = self
            .transport
            .challenge_period()
            .await
            .context("failed to fetch challenge period")?;
        let deposits = self
            .transport
            .deposit_count()
            .await
            .context("failed to fetch deposit count")?;
        info!(round, %challenge_period, %deposits, uids = uids.len(), "checkpoint round started");

        let block = Arc::new(CheckpointBlock::new());
        let chunk = uids.len().div_ceil(self.workers).max(1);

        let mut tasks = JoinSet::new();
        for part in uids.chunks(chunk) {
            let part = part.to_vec();
            let block = block.clone();
            let transport = self.transport.clone();
            tasks.spawn(async move { collect(&transport, &block, &part).await });
        }

        let mut skipped = 0;
        while let Some(joined) = tasks.join_next().await {
            skipped += joined.context("checkpoint worker panicked")??;
        }

        let root = block.build().context("failed to build checkpoint block")?;

        let nonce = self.nonce.fetch_add(1, Ordering::SeqCst);
        let tx = Transaction::new(self.operator, nonce, RootChainCall::SubmitCheckpoint { root });
        let receipt = self
            .backend
            .submit_and_wait(&tx)
            .await
            .context("failed to publish checkpoint root")?;
        if !receipt.is_successful() {
            bail!("checkpoint root for round {round} rejected by the root chain");
        }

        save_block(self.storage.as_ref(), round, &block).context("failed to persist checkpoint block")?;

        let outcome = RoundOutcome {
            round,
            root,
            checkpoints: block.number_of_checkpoints(),
            skipped,
            receipt,
        };
        info!(
            round,
            root = %hex::encode(root),
            checkpoints = outcome.checkpoints,
            skipped,
            "checkpoint round published"
        );
        Ok(outcome)
    }

    /// Reload the block persisted for `round` and check the proof for `uid`
    /// against `published_root`. Works for tokens absent from the round too.
    pub fn verify_round(&self, round: u64, uid: U256, published_root: Hash32) -> Result<bool> {
        let block = load_block(self.storage.as_ref(), round)
            .context("failed to load checkpoint block")?
            .with_context(|| format!("no checkpoint block stored for round {round}"))?;

        let root = block.build().context("failed to rebuild checkpoint block")?;
        if root != published_root {
            warn!(round, "stored checkpoint block does not match the published root");
            return Ok(false);
        }

        let number = block.commitment(uid).map(|c| U256::from_be_bytes(c));
        let proof = block.create_proof(uid)?;
        Ok(verify_checkpoint_proof(&proof, uid, number, published_root)?)
    }
}

/// Add checkpoints for `uids`; returns how many were skipped.
async fn collect(transport: &TransportClient, block: &CheckpointBlock, uids: &[U256]) -> Result<usize> {
    let mut skipped = 0;

    for uid in uids {
        let exit = transport
            .exits(*uid)
            .await
            .with_context(|| format!("failed to fetch exit for uid {uid}"))?;
        if exit.is_active() {
            debug!(%uid, "token is exiting, no checkpoint");
            skipped += 1;
            continue;
        }

        let number = transport
            .wallet2(*uid)
            .await
            .with_context(|| format!("failed to fetch deposit block for uid {uid}"))?;
        if number.is_zero() {
            warn!(%uid, "no deposit for token, no checkpoint");
            skipped += 1;
            continue;
        }

        match block.add_checkpoint(*uid, number) {
            Ok(()) => {}
            Err(CheckpointError::DuplicateCheckpoint(_)) => debug!(%uid, "checkpoint already recorded"),
            Err(e) => return Err(e.into()),
        }
    }

    Ok(skipped)
}
