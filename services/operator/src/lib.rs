pub mod aggregator;
pub mod config;

pub use aggregator::{CheckpointAggregator, RoundOutcome};
pub use config::{OperatorConfig, TransportMode};
