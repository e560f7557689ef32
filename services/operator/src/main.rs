use std::sync::Arc;

use anyhow::{bail, Context, Result};
use checkpoints::{hash_value, FileBackedStorage, U256};
use rootchain::{
    Backend, LoopbackConnection, RootChainCall, SimulatedChain, Transaction, Transport, TransportClient,
};
use tracing::{error, info};

use operator::{CheckpointAggregator, OperatorConfig, TransportMode};

const DEPOSITOR: [u8; 20] = [0x0D; 20];

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cfg = OperatorConfig::from_env()?;

    // --- Root chain (simulated) ---
    let chain = Arc::new(SimulatedChain::new(cfg.operator, cfg.challenge_period));
    let backend = Backend::Simulated(chain.clone());

    let mut uids = Vec::with_capacity(cfg.demo_deposits);
    for i in 0..cfg.demo_deposits as u64 {
        uids.push(deposit(&backend, i).await?);
    }
    info!(deposits = uids.len(), "simulated deposits seeded");

    let transport = match cfg.transport {
        TransportMode::Direct => Transport::Direct(chain.clone()),
        TransportMode::Rpc => {
            let conn = LoopbackConnection::new(chain.clone()).with_latency(cfg.rpc_latency);
            Transport::Rpc(Arc::new(conn))
        }
    };

    // --- Storage ---
    let storage = FileBackedStorage::open(&cfg.db_path, &cfg.bucket)
        .with_context(|| format!("Failed to open checkpoint database {}", cfg.db_path.display()))?;

    let aggregator = CheckpointAggregator::new(
        backend.clone(),
        TransportClient::new(transport, cfg.rpc_timeout),
        Arc::new(storage),
        cfg.operator,
        cfg.workers,
    );

    info!(transport = ?cfg.transport, interval_secs = cfg.round_interval.as_secs(), "operator started");

    let mut interval = tokio::time::interval(cfg.round_interval);
    let mut round: u64 = 0;

    loop {
        tokio::select! {
            _ = interval.tick() => {
                // one new deposit per round keeps the demo roots moving
                match deposit(&backend, cfg.demo_deposits as u64 + round).await {
                    Ok(uid) => uids.push(uid),
                    Err(e) => error!("deposit failed: {e:?}"),
                }

                match aggregator.run_round(round, &uids).await {
                    Ok(outcome) => {
                        if let Some(uid) = uids.first() {
                            match aggregator.verify_round(round, *uid, outcome.root) {
                                Ok(ok) => info!(round, %uid, ok, "proof re-verified from storage"),
                                Err(e) => error!("round {round} verification error: {e:?}"),
                            }
                        }
                    }
                    Err(e) => error!("checkpoint round {round} failed: {e:?}"),
                }
                round += 1;
            }
            _ = tokio::signal::ctrl_c() => {
                info!("operator shutting down");
                break;
            }
        }
    }

    Ok(())
}

async fn deposit(backend: &Backend, index: u64) -> Result<U256> {
    let uid = U256::from_be_bytes(hash_value(format!("deposit-{index}").as_bytes()));
    let tx = Transaction::new(
        DEPOSITOR,
        index,
        RootChainCall::Deposit { uid, amount: U256::from(1_000u64) },
    );

    if !backend.is_successful(&tx).await {
        bail!("deposit {index} was not accepted");
    }
    Ok(uid)
}
