use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use checkpoints::U256;
use rootchain::{
    Backend, ChainQuery, ChainReply, ExitRecord, LoopbackConnection, RootChainCall, RootChainSession,
    RpcConnection, RpcResponse, SimulatedChain, Transaction, Transport, TransportClient, TransportError,
};
use tokio::sync::oneshot;

const OPERATOR: [u8; 20] = [0xAA; 20];
const TIMEOUT: Duration = Duration::from_millis(500);

async fn seeded_chain() -> Arc<SimulatedChain> {
    let chain = Arc::new(SimulatedChain::new(OPERATOR, Duration::from_secs(604_800)));
    let backend = Backend::Simulated(chain.clone());
    for (nonce, uid) in [11u64, 22, 33].into_iter().enumerate() {
        let call = RootChainCall::Deposit { uid: U256::from(uid), amount: U256::from(uid * 10) };
        assert!(backend.is_successful(&Transaction::new([1u8; 20], nonce as u64, call)).await);
    }
    let call = RootChainCall::SubmitBlock { number: U256::from(4u64), root: [4u8; 32] };
    assert!(backend.is_successful(&Transaction::new(OPERATOR, 0, call)).await);
    chain
}

fn direct(chain: Arc<SimulatedChain>) -> TransportClient {
    TransportClient::new(Transport::Direct(chain), TIMEOUT)
}

fn rpc(chain: Arc<SimulatedChain>, latency: Duration, timeout: Duration) -> TransportClient {
    let conn = LoopbackConnection::new(chain).with_latency(latency);
    TransportClient::new(Transport::Rpc(Arc::new(conn)), timeout)
}

async fn assert_chain_facts(client: &TransportClient) {
    assert_eq!(client.deposit_count().await.unwrap(), U256::from(3u64));
    assert_eq!(client.challenge_period().await.unwrap(), U256::from(604_800u64));
    assert_eq!(client.operator().await.unwrap(), OPERATOR);
    assert_eq!(client.child_chain(U256::from(4u64)).await.unwrap(), [4u8; 32]);
    assert_eq!(client.child_chain(U256::from(5u64)).await.unwrap(), [0u8; 32]);
    assert_eq!(client.wallet(U256::from(22u64)).await.unwrap(), U256::from(220u64));
    assert_eq!(client.wallet2(U256::from(22u64)).await.unwrap(), U256::from(2u64));
    assert!(!client.exits(U256::from(22u64)).await.unwrap().is_active());
}

#[tokio::test]
async fn test_direct_session_queries() {
    let chain = seeded_chain().await;
    assert_chain_facts(&direct(chain)).await;
}

#[tokio::test]
async fn test_rpc_queries_match_direct() {
    let chain = seeded_chain().await;
    assert_chain_facts(&rpc(chain, Duration::ZERO, TIMEOUT)).await;
}

#[tokio::test]
async fn test_exit_record_visible() {
    let chain = seeded_chain().await;
    let record = ExitRecord { state: 1, exit_time: U256::from(99u64), ..Default::default() };
    chain.set_exit(U256::from(33u64), record.clone());

    let client = rpc(chain, Duration::ZERO, TIMEOUT);
    let fetched = client.exits(U256::from(33u64)).await.unwrap();
    assert_eq!(fetched, record);
    assert!(fetched.is_active());
}

#[tokio::test]
async fn test_rpc_timeout() {
    let chain = seeded_chain().await;
    let client = rpc(chain, Duration::from_millis(300), Duration::from_millis(20));

    let err = client.deposit_count().await.unwrap_err();
    assert!(err.is_timeout());
    assert_eq!(err, TransportError::Timeout { method: "RootChain.DepositCount" });
}

struct SlowSession;

#[async_trait]
impl RootChainSession for SlowSession {
    async fn query(&self, _query: ChainQuery) -> Result<ChainReply, TransportError> {
        tokio::time::sleep(Duration::from_millis(300)).await;
        Ok(ChainReply::Number(U256::ZERO))
    }
}

#[tokio::test]
async fn test_direct_timeout() {
    let client = TransportClient::new(Transport::Direct(Arc::new(SlowSession)), Duration::from_millis(20));
    assert!(client.challenge_period().await.unwrap_err().is_timeout());
}

/// Connection that answers every call with a canned outcome
struct CannedConnection {
    response: Option<RpcResponse>,
}

impl RpcConnection for CannedConnection {
    fn go(&self, _method: &'static str, _query: ChainQuery) -> oneshot::Receiver<Result<RpcResponse, TransportError>> {
        let (tx, rx) = oneshot::channel();
        if let Some(resp) = self.response.clone() {
            let _ = tx.send(Ok(resp));
        }
        // dropping `tx` without sending closes the channel
        rx
    }
}

fn canned(response: Option<RpcResponse>) -> TransportClient {
    TransportClient::new(Transport::Rpc(Arc::new(CannedConnection { response })), TIMEOUT)
}

#[tokio::test]
async fn test_rpc_remote_error() {
    let client = canned(Some(RpcResponse::err("contract reverted")));
    let err = client.operator().await.unwrap_err();
    assert_eq!(err, TransportError::Remote("contract reverted".into()));
    assert!(!err.is_timeout());
}

#[tokio::test]
async fn test_rpc_disconnected() {
    let client = canned(None);
    assert!(matches!(
        client.wallet(U256::from(1u64)).await,
        Err(TransportError::Disconnected { .. })
    ));
}

#[tokio::test]
async fn test_rpc_unexpected_reply() {
    let client = canned(Some(RpcResponse::ok(ChainReply::Hash([0u8; 32]))));
    assert!(matches!(
        client.deposit_count().await,
        Err(TransportError::UnexpectedReply { method: "RootChain.DepositCount" })
    ));

    let empty = canned(Some(RpcResponse::default()));
    assert!(matches!(empty.operator().await, Err(TransportError::UnexpectedReply { .. })));
}
