//! Chain fact queries, either against a contract session or over RPC.
//!
//! Every round trip is bounded by the client's timeout; an elapsed deadline
//! surfaces as [`TransportError::Timeout`] so callers can tell it apart from
//! a failed request.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::U256;
use async_trait::async_trait;
use checkpoints::Hash32;
use tokio::sync::oneshot;
use tokio::time::timeout;
use tracing::warn;

use crate::{Address, ChainQuery, ChainReply, ExitRecord, RpcResponse, TransportError};

/// Direct access to the root chain contract
#[async_trait]
pub trait RootChainSession: Send + Sync {
    async fn query(&self, query: ChainQuery) -> Result<ChainReply, TransportError>;
}

/// Asynchronous RPC: starts a call and hands back its completion channel.
pub trait RpcConnection: Send + Sync {
    fn go(&self, method: &'static str, query: ChainQuery) -> oneshot::Receiver<Result<RpcResponse, TransportError>>;
}

#[derive(Clone)]
pub enum Transport {
    Direct(Arc<dyn RootChainSession>),
    Rpc(Arc<dyn RpcConnection>),
}

impl fmt::Debug for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Transport::Direct(_) => f.write_str("Transport::Direct"),
            Transport::Rpc(_) => f.write_str("Transport::Rpc"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct TransportClient {
    transport: Transport,
    timeout: Duration,
}

impl TransportClient {
    pub fn new(transport: Transport, timeout: Duration) -> Self {
        Self { transport, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Deposit counter
    pub async fn deposit_count(&self) -> Result<U256, TransportError> {
        let query = ChainQuery::DepositCount;
        let method = query.method();
        match self.fetch(query).await? {
            ChainReply::Number(n) => Ok(n),
            _ => Err(TransportError::UnexpectedReply { method }),
        }
    }

    /// Challenge period in seconds
    pub async fn challenge_period(&self) -> Result<U256, TransportError> {
        let query = ChainQuery::ChallengePeriod;
        let method = query.method();
        match self.fetch(query).await? {
            ChainReply::Number(n) => Ok(n),
            _ => Err(TransportError::UnexpectedReply { method }),
        }
    }

    /// Operator address
    pub async fn operator(&self) -> Result<Address, TransportError> {
        let query = ChainQuery::Operator;
        let method = query.method();
        match self.fetch(query).await? {
            ChainReply::Address(a) => Ok(a),
            _ => Err(TransportError::UnexpectedReply { method }),
        }
    }

    /// Child chain block root by block number
    pub async fn child_chain(&self, block_number: U256) -> Result<Hash32, TransportError> {
        let query = ChainQuery::ChildChain { block_number };
        let method = query.method();
        match self.fetch(query).await? {
            ChainReply::Hash(h) => Ok(h),
            _ => Err(TransportError::UnexpectedReply { method }),
        }
    }

    /// Exit record for `uid`
    pub async fn exits(&self, uid: U256) -> Result<ExitRecord, TransportError> {
        let query = ChainQuery::Exits { uid };
        let method = query.method();
        match self.fetch(query).await? {
            ChainReply::Exit(e) => Ok(e),
            _ => Err(TransportError::UnexpectedReply { method }),
        }
    }

    /// Deposit amount for `uid`
    pub async fn wallet(&self, uid: U256) -> Result<U256, TransportError> {
        let query = ChainQuery::Wallet { uid };
        let method = query.method();
        match self.fetch(query).await? {
            ChainReply::Number(n) => Ok(n),
            _ => Err(TransportError::UnexpectedReply { method }),
        }
    }

    /// Child chain block number of the deposit for `uid`
    pub async fn wallet2(&self, uid: U256) -> Result<U256, TransportError> {
        let query = ChainQuery::Wallet2 { uid };
        let method = query.method();
        match self.fetch(query).await? {
            ChainReply::Number(n) => Ok(n),
            _ => Err(TransportError::UnexpectedReply { method }),
        }
    }

    async fn fetch(&self, query: ChainQuery) -> Result<ChainReply, TransportError> {
        let method = query.method();

        let result = match &self.transport {
            Transport::Direct(session) => match timeout(self.timeout, session.query(query)).await {
                Ok(reply) => reply,
                Err(_) => Err(TransportError::Timeout { method }),
            },
            Transport::Rpc(conn) => {
                let call = conn.go(method, query);
                match timeout(self.timeout, call).await {
                    Ok(Ok(Ok(resp))) if !resp.error.is_empty() => Err(TransportError::Remote(resp.error)),
                    Ok(Ok(Ok(resp))) => resp.reply.ok_or(TransportError::UnexpectedReply { method }),
                    Ok(Ok(Err(e))) => Err(e),
                    Ok(Err(_)) => Err(TransportError::Disconnected { method }),
                    Err(_) => Err(TransportError::Timeout { method }),
                }
            }
        };

        if let Err(TransportError::Timeout { .. }) = &result {
            warn!(method, timeout_ms = self.timeout.as_millis() as u64, "chain query timed out");
        }
        result
    }
}

/// In-process RPC connection that serves calls from a session on spawned tasks.
///
/// `go` must be called from within a tokio runtime.
pub struct LoopbackConnection {
    session: Arc<dyn RootChainSession>,
    latency: Duration,
}

impl LoopbackConnection {
    pub fn new(session: Arc<dyn RootChainSession>) -> Self {
        Self { session, latency: Duration::ZERO }
    }

    /// Delay every reply by `latency`
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }
}

impl RpcConnection for LoopbackConnection {
    fn go(&self, _method: &'static str, query: ChainQuery) -> oneshot::Receiver<Result<RpcResponse, TransportError>> {
        let (tx, rx) = oneshot::channel();
        let session = self.session.clone();
        let latency = self.latency;

        tokio::spawn(async move {
            if !latency.is_zero() {
                tokio::time::sleep(latency).await;
            }
            let resp = match session.query(query).await {
                Ok(reply) => RpcResponse::ok(reply),
                Err(e) => RpcResponse::err(e.to_string()),
            };
            // receiver gone means the caller already timed out
            let _ = tx.send(Ok(resp));
        });

        rx
    }
}
