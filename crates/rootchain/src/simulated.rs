//! In-process root chain used for tests, demos and as a direct contract session.

use std::collections::HashMap;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use alloy_primitives::U256;
use async_trait::async_trait;
use checkpoints::Hash32;
use parking_lot::Mutex;
use tracing::debug;

use crate::transport::RootChainSession;
use crate::{
    Address, ChainQuery, ChainReply, ExitRecord, Receipt, RootChainCall, Transaction, TransportError,
    RECEIPT_STATUS_FAILED, RECEIPT_STATUS_SUCCESSFUL,
};

/// Simulated root chain contract plus a queue of unmined transactions.
#[derive(Debug)]
pub struct SimulatedChain {
    state: Mutex<ChainState>,
}

#[derive(Debug, Default)]
struct ChainState {
    operator: Address,
    challenge_period: U256,
    clock_offset: Duration,
    height: u64,
    pending: Vec<Transaction>,
    receipts: HashMap<Hash32, Receipt>,

    deposit_count: U256,
    wallet: HashMap<U256, U256>,
    wallet2: HashMap<U256, U256>,
    child_chain: HashMap<U256, Hash32>,
    checkpoints: Vec<Hash32>,
    exits: HashMap<U256, ExitRecord>,
}

impl SimulatedChain {
    pub fn new(operator: Address, challenge_period: Duration) -> Self {
        Self {
            state: Mutex::new(ChainState {
                operator,
                challenge_period: U256::from(challenge_period.as_secs()),
                ..Default::default()
            }),
        }
    }

    pub fn operator(&self) -> Address {
        self.state.lock().operator
    }

    /// Queue a transaction until the next [`SimulatedChain::commit`].
    pub fn send_transaction(&self, tx: Transaction) -> Hash32 {
        let hash = tx.hash();
        self.state.lock().pending.push(tx);
        hash
    }

    /// Mine every pending transaction into one block and return its height.
    pub fn commit(&self) -> u64 {
        let mut state = self.state.lock();
        state.height += 1;
        let height = state.height;

        let pending = std::mem::take(&mut state.pending);
        for tx in pending {
            let status = if state.apply(&tx) {
                RECEIPT_STATUS_SUCCESSFUL
            } else {
                RECEIPT_STATUS_FAILED
            };
            let tx_hash = tx.hash();
            state.receipts.insert(tx_hash, Receipt { tx_hash, status, block_number: height });
        }

        debug!(height, "simulated block committed");
        height
    }

    pub fn receipt(&self, tx_hash: &Hash32) -> Option<Receipt> {
        self.state.lock().receipts.get(tx_hash).cloned()
    }

    /// Shift the simulated clock forward
    pub fn adjust_time(&self, adjustment: Duration) {
        self.state.lock().clock_offset += adjustment;
    }

    /// Simulated wall clock, seconds since the unix epoch
    pub fn now(&self) -> u64 {
        let real = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0);
        real + self.state.lock().clock_offset.as_secs()
    }

    /// Record an exit for `uid`; exit games themselves are not simulated.
    pub fn set_exit(&self, uid: U256, record: ExitRecord) {
        self.state.lock().exits.insert(uid, record);
    }

    /// Checkpoint roots in submission order
    pub fn checkpoint_roots(&self) -> Vec<Hash32> {
        self.state.lock().checkpoints.clone()
    }

    pub fn checkpoint_root(&self, index: usize) -> Option<Hash32> {
        self.state.lock().checkpoints.get(index).copied()
    }

    fn lookup(&self, query: &ChainQuery) -> ChainReply {
        let state = self.state.lock();
        match query {
            ChainQuery::DepositCount => ChainReply::Number(state.deposit_count),
            ChainQuery::ChallengePeriod => ChainReply::Number(state.challenge_period),
            ChainQuery::Operator => ChainReply::Address(state.operator),
            ChainQuery::ChildChain { block_number } => {
                ChainReply::Hash(state.child_chain.get(block_number).copied().unwrap_or_default())
            }
            ChainQuery::Exits { uid } => ChainReply::Exit(state.exits.get(uid).cloned().unwrap_or_default()),
            ChainQuery::Wallet { uid } => ChainReply::Number(state.wallet.get(uid).copied().unwrap_or_default()),
            ChainQuery::Wallet2 { uid } => ChainReply::Number(state.wallet2.get(uid).copied().unwrap_or_default()),
        }
    }
}

impl ChainState {
    /// Returns the success flag the receipt will carry.
    fn apply(&mut self, tx: &Transaction) -> bool {
        match &tx.call {
            RootChainCall::Deposit { uid, amount } => {
                if self.wallet.contains_key(uid) {
                    return false;
                }
                self.deposit_count += U256::from(1u64);
                self.wallet.insert(*uid, *amount);
                self.wallet2.insert(*uid, self.deposit_count);
                true
            }
            RootChainCall::SubmitBlock { number, root } => {
                if tx.from != self.operator || self.child_chain.contains_key(number) {
                    return false;
                }
                self.child_chain.insert(*number, *root);
                true
            }
            RootChainCall::SubmitCheckpoint { root } => {
                if tx.from != self.operator {
                    return false;
                }
                self.checkpoints.push(*root);
                true
            }
        }
    }
}

#[async_trait]
impl RootChainSession for SimulatedChain {
    async fn query(&self, query: ChainQuery) -> Result<ChainReply, TransportError> {
        Ok(self.lookup(&query))
    }
}
