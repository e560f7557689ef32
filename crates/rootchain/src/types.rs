//! Root chain data types

use alloy_primitives::U256;
use checkpoints::Hash32;
use serde::{Deserialize, Serialize};

/// 20-byte account address
pub type Address = [u8; 20];

pub const RECEIPT_STATUS_FAILED: u64 = 0;
pub const RECEIPT_STATUS_SUCCESSFUL: u64 = 1;

/// Contract calls the operator and depositors make
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub enum RootChainCall {
    Deposit { uid: U256, amount: U256 },
    SubmitBlock { number: U256, root: Hash32 },
    SubmitCheckpoint { root: Hash32 },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Transaction {
    pub from: Address,
    pub nonce: u64,
    pub call: RootChainCall,
}

impl Transaction {
    pub fn new(from: Address, nonce: u64, call: RootChainCall) -> Self {
        Self { from, nonce, call }
    }

    /// Transaction hash over sender, nonce and the tagged call fields
    pub fn hash(&self) -> Hash32 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.from);
        hasher.update(&self.nonce.to_be_bytes());
        match &self.call {
            RootChainCall::Deposit { uid, amount } => {
                hasher.update(&[0u8]);
                hasher.update(&uid.to_be_bytes::<32>());
                hasher.update(&amount.to_be_bytes::<32>());
            }
            RootChainCall::SubmitBlock { number, root } => {
                hasher.update(&[1u8]);
                hasher.update(&number.to_be_bytes::<32>());
                hasher.update(root);
            }
            RootChainCall::SubmitCheckpoint { root } => {
                hasher.update(&[2u8]);
                hasher.update(root);
            }
        }
        hasher.finalize().into()
    }
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: Hash32,
    pub status: u64,
    pub block_number: u64,
}

impl Receipt {
    pub fn is_successful(&self) -> bool {
        self.status == RECEIPT_STATUS_SUCCESSFUL
    }
}

/// Exit record as stored by the root chain contract
#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ExitRecord {
    pub state: u8,
    pub exit_time: U256,
    pub exit_tx_blk_num: U256,
    pub exit_tx: Vec<u8>,
    pub tx_before_exit_tx_blk_num: U256,
    pub tx_before_exit_tx: Vec<u8>,
}

impl ExitRecord {
    /// A zero state means no exit was started for the token
    pub fn is_active(&self) -> bool {
        self.state != 0
    }
}

/// Chain facts a transport can fetch
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainQuery {
    DepositCount,
    ChallengePeriod,
    Operator,
    ChildChain { block_number: U256 },
    Exits { uid: U256 },
    Wallet { uid: U256 },
    Wallet2 { uid: U256 },
}

impl ChainQuery {
    pub fn method(&self) -> &'static str {
        match self {
            ChainQuery::DepositCount => "RootChain.DepositCount",
            ChainQuery::ChallengePeriod => "RootChain.ChallengePeriod",
            ChainQuery::Operator => "RootChain.Operator",
            ChainQuery::ChildChain { .. } => "RootChain.ChildChain",
            ChainQuery::Exits { .. } => "RootChain.Exits",
            ChainQuery::Wallet { .. } => "RootChain.Wallet",
            ChainQuery::Wallet2 { .. } => "RootChain.Wallet2",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChainReply {
    Number(U256),
    Address(Address),
    Hash(Hash32),
    Exit(ExitRecord),
}

/// Reply envelope of a remote call; a non-empty `error` wins over `reply`.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RpcResponse {
    pub reply: Option<ChainReply>,
    pub error: String,
}

impl RpcResponse {
    pub fn ok(reply: ChainReply) -> Self {
        Self { reply: Some(reply), error: String::new() }
    }

    pub fn err(error: impl Into<String>) -> Self {
        Self { reply: None, error: error.into() }
    }
}
