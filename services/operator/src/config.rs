use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use rootchain::Address;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportMode {
    Direct,
    Rpc,
}

#[derive(Clone, Debug)]
pub struct OperatorConfig {
    pub db_path: PathBuf,
    pub bucket: String,
    pub operator: Address,

    pub transport: TransportMode,
    pub rpc_timeout: Duration,
    pub rpc_latency: Duration,

    pub round_interval: Duration,
    pub workers: usize,
    pub demo_deposits: usize,
    pub challenge_period: Duration,
}

impl OperatorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (the environment in production)
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let db_path = PathBuf::from(
            lookup("OPERATOR_DB_PATH").unwrap_or_else(|| "operator_checkpoints.json".to_string()),
        );
        let bucket = lookup("OPERATOR_BUCKET").unwrap_or_else(|| checkpoints::CHECKPOINTS_BUCKET.to_string());

        let operator = match lookup("OPERATOR_ADDRESS") {
            Some(v) => parse_address(&v)?,
            None => [0xAA; 20],
        };

        let transport = match lookup("OPERATOR_TRANSPORT").as_deref() {
            None | Some("direct") => TransportMode::Direct,
            Some("rpc") => TransportMode::Rpc,
            Some(other) => bail!("OPERATOR_TRANSPORT must be \"direct\" or \"rpc\", got {other:?}"),
        };

        let rpc_timeout = Duration::from_millis(number(&lookup, "OPERATOR_RPC_TIMEOUT_MS", 5_000)?);
        let rpc_latency = Duration::from_millis(number(&lookup, "OPERATOR_RPC_LATENCY_MS", 0)?);
        let round_interval = Duration::from_secs(number(&lookup, "OPERATOR_ROUND_INTERVAL_SECS", 30)?);
        let workers = number(&lookup, "OPERATOR_WORKERS", 4)? as usize;
        let demo_deposits = number(&lookup, "OPERATOR_DEMO_DEPOSITS", 16)? as usize;
        let challenge_period = Duration::from_secs(number(&lookup, "OPERATOR_CHALLENGE_PERIOD_SECS", 604_800)?);

        // fail fast on settings that would stall every round
        if rpc_timeout.is_zero() {
            bail!("OPERATOR_RPC_TIMEOUT_MS must be greater than zero");
        }
        if round_interval.is_zero() {
            bail!("OPERATOR_ROUND_INTERVAL_SECS must be greater than zero");
        }
        if workers == 0 {
            bail!("OPERATOR_WORKERS must be at least 1");
        }

        Ok(Self {
            db_path,
            bucket,
            operator,
            transport,
            rpc_timeout,
            rpc_latency,
            round_interval,
            workers,
            demo_deposits,
            challenge_period,
        })
    }
}

fn number(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: u64) -> Result<u64> {
    match lookup(key) {
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a non-negative integer, got {v:?}")),
        None => Ok(default),
    }
}

fn parse_address(v: &str) -> Result<Address> {
    let digits = v.strip_prefix("0x").unwrap_or(v);
    let mut out = [0u8; 20];
    hex::decode_to_slice(digits, &mut out)
        .with_context(|| format!("OPERATOR_ADDRESS must be 20 hex-encoded bytes, got {v:?}"))?;
    Ok(out)
}
