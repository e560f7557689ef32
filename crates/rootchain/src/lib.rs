//! Root chain adapters
//!
//! The backend publishes transactions and reports their receipts; the
//! transport fetches contract state with bounded latency.

mod backend;
mod simulated;
mod transport;
mod types;

pub use backend::{Backend, ChainClient};
pub use simulated::SimulatedChain;
pub use transport::{LoopbackConnection, RootChainSession, RpcConnection, Transport, TransportClient};
pub use types::{
    Address, ChainQuery, ChainReply, ExitRecord, Receipt, RootChainCall, RpcResponse, Transaction,
    RECEIPT_STATUS_FAILED, RECEIPT_STATUS_SUCCESSFUL,
};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("unsupported backend for {0}")]
    Unsupported(&'static str),

    #[error("receipt not found for transaction {0}")]
    ReceiptNotFound(String),

    #[error("Client error: {0}")]
    Client(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("{method}: timeout")]
    Timeout { method: &'static str },

    #[error("{method}: connection closed before reply")]
    Disconnected { method: &'static str },

    #[error("{method}: unexpected reply")]
    UnexpectedReply { method: &'static str },

    #[error("Remote error: {0}")]
    Remote(String),
}

impl TransportError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}
