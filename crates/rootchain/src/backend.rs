use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use checkpoints::Hash32;
use tracing::{info, warn};

use crate::{BackendError, Receipt, SimulatedChain, Transaction};

/// Connection to a live root chain node
#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn send_transaction(&self, tx: &Transaction) -> Result<Hash32, BackendError>;
    async fn wait_mined(&self, tx_hash: Hash32) -> Result<Receipt, BackendError>;
}

/// Root chain backend, chosen once at construction.
#[derive(Clone)]
pub enum Backend {
    Simulated(Arc<SimulatedChain>),
    Client(Arc<dyn ChainClient>),
}

impl fmt::Debug for Backend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Backend::Simulated(_) => f.write_str("Backend::Simulated"),
            Backend::Client(_) => f.write_str("Backend::Client"),
        }
    }
}

impl Backend {
    /// Submit `tx` and wait until it is mined.
    pub async fn submit_and_wait(&self, tx: &Transaction) -> Result<Receipt, BackendError> {
        let receipt = match self {
            Backend::Simulated(chain) => {
                let tx_hash = chain.send_transaction(tx.clone());
                chain.commit();
                chain
                    .receipt(&tx_hash)
                    .ok_or_else(|| BackendError::ReceiptNotFound(hex::encode(tx_hash)))?
            }
            Backend::Client(client) => {
                let tx_hash = client.send_transaction(tx).await?;
                client.wait_mined(tx_hash).await?
            }
        };

        info!(
            tx = %hex::encode(receipt.tx_hash),
            status = receipt.status,
            block = receipt.block_number,
            "transaction mined"
        );
        Ok(receipt)
    }

    /// True when `tx` was mined with a successful status. Errors count as failure.
    pub async fn is_successful(&self, tx: &Transaction) -> bool {
        match self.submit_and_wait(tx).await {
            Ok(receipt) => receipt.is_successful(),
            Err(e) => {
                warn!("transaction failed: {e}");
                false
            }
        }
    }

    /// Shift the chain clock. Only the simulator has one; elsewhere this is a no-op.
    pub fn adjust_time(&self, adjustment: Duration) -> Result<(), BackendError> {
        if let Backend::Simulated(chain) = self {
            chain.adjust_time(adjustment);
            chain.commit();
        }
        Ok(())
    }

    /// Mine pending transactions on the simulator.
    pub fn commit(&self) -> Result<u64, BackendError> {
        match self {
            Backend::Simulated(chain) => Ok(chain.commit()),
            Backend::Client(_) => Err(BackendError::Unsupported("commit")),
        }
    }
}
