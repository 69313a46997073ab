//! RPC surface consumed by the client
//!
//! The node is a black box behind [`GuardRpc`]. [`HttpRpcClient`] speaks
//! Solana JSON-RPC; tests substitute in-memory doubles.

mod http;

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use solana_hash::Hash;
use solana_pubkey::Pubkey;
use solana_signature::Signature;

use crate::constants::confirm_timeouts;
use crate::errors::{GuardError, GuardResult};
use crate::models::{EpochInfo, PerformanceSample};

pub use self::http::HttpRpcClient;

/// Durability level requested for reads and confirmations
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Commitment {
    Processed,
    Confirmed,
    Finalized,
}

impl Commitment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Commitment::Processed => "processed",
            Commitment::Confirmed => "confirmed",
            Commitment::Finalized => "finalized",
        }
    }

    /// Default time to wait for a transaction to reach this level.
    pub fn default_confirm_timeout_ms(&self) -> u64 {
        match self {
            Commitment::Processed => confirm_timeouts::PROCESSED,
            Commitment::Confirmed => confirm_timeouts::CONFIRMED,
            Commitment::Finalized => confirm_timeouts::FINALIZED,
        }
    }
}

impl fmt::Display for Commitment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Commitment {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "processed" => Ok(Commitment::Processed),
            "confirmed" => Ok(Commitment::Confirmed),
            "finalized" => Ok(Commitment::Finalized),
            other => Err(GuardError::Config(format!("unknown commitment level: {}", other))),
        }
    }
}

/// Status of a broadcast transaction as reported by the node
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransactionStatus {
    pub slot: u64,
    /// Highest commitment reached so far; `None` when the node omits it
    pub confirmation: Option<Commitment>,
    /// Program/runtime error, if execution failed
    pub err: Option<String>,
}

impl TransactionStatus {
    /// Whether the transaction has reached at least `commitment`.
    pub fn satisfies(&self, commitment: Commitment) -> bool {
        self.confirmation.map_or(false, |reached| reached >= commitment)
    }
}

/// Outcome of a `simulateTransaction` call
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SimulationOutcome {
    pub success: bool,
    pub units_consumed: u64,
    pub error: Option<String>,
    pub logs: Vec<String>,
}

/// Node operations used by the Guard client.
///
/// Implementations classify failures: network and availability problems
/// are [`GuardError::RpcTransient`], everything else [`GuardError::Rpc`].
#[async_trait]
pub trait GuardRpc: Send + Sync {
    /// Raw account data, `None` if the account does not exist.
    async fn get_account_data(&self, address: &Pubkey, commitment: Commitment) -> GuardResult<Option<Vec<u8>>>;

    async fn get_latest_blockhash(&self, commitment: Commitment) -> GuardResult<Hash>;

    /// Broadcast a serialized, signed transaction.
    async fn send_transaction(&self, wire_transaction: &[u8]) -> GuardResult<Signature>;

    /// Current status of `signature`, `None` if the node has not seen it.
    async fn get_signature_status(&self, signature: &Signature) -> GuardResult<Option<TransactionStatus>>;

    async fn get_recent_performance_samples(&self, limit: usize) -> GuardResult<Vec<PerformanceSample>>;

    async fn get_epoch_info(&self, commitment: Commitment) -> GuardResult<EpochInfo>;

    /// Total token supply in lamports.
    async fn get_total_supply(&self, commitment: Commitment) -> GuardResult<u64>;

    /// Simulate a serialized transaction without signature verification.
    async fn simulate_transaction(&self, wire_transaction: &[u8], commitment: Commitment) -> GuardResult<SimulationOutcome>;
}
