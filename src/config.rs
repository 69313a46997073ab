//! Client configuration
//!
//! Program id, RPC endpoint and seed strings are environment-level inputs.
//! They are collected here and passed into constructors instead of living
//! in module-level globals.

use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use solana_pubkey::Pubkey;

use crate::constants::{self, buffer_sizes, refresh_intervals, seeds};
use crate::errors::{GuardError, GuardResult};
use crate::rpc::Commitment;

pub const ENV_PROGRAM_ID: &str = "GUARD_PROGRAM_ID";
pub const ENV_RPC_URL: &str = "GUARD_RPC_URL";
pub const ENV_COMMITMENT: &str = "GUARD_COMMITMENT";
pub const ENV_MAX_RETRIES: &str = "GUARD_MAX_RETRIES";

/// Seed strings used to derive the Guard accounts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeedConfig {
    pub analysis: String,
    pub metrics: String,
    pub network_stats: String,
}

impl Default for SeedConfig {
    fn default() -> Self {
        Self {
            analysis: seeds::ANALYSIS.to_string(),
            metrics: seeds::METRICS.to_string(),
            network_stats: seeds::NETWORK_STATS.to_string(),
        }
    }
}

/// Configuration for a Guard client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GuardConfig {
    /// Guard program id (base58). Required before any call is made.
    #[serde(with = "pubkey_string")]
    pub program_id: Pubkey,
    /// JSON-RPC endpoint
    pub rpc_url: String,
    pub seeds: SeedConfig,
    /// Commitment level for confirmations and reads
    pub commitment: Commitment,
    /// Retries after the first broadcast attempt
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
    /// Per-attempt confirmation window; defaults by commitment level
    pub confirm_timeout_ms: Option<u64>,
    pub status_poll_interval_ms: u64,
    pub refresh_interval_ms: u64,
    /// Default `data_size` for analyze requests
    pub analysis_buffer_size: u64,
}

impl Default for GuardConfig {
    fn default() -> Self {
        Self {
            program_id: Pubkey::default(),
            rpc_url: constants::SOON_DEVNET_RPC.to_string(),
            seeds: SeedConfig::default(),
            commitment: Commitment::Confirmed,
            max_retries: constants::DEFAULT_MAX_RETRIES,
            retry_base_delay_ms: constants::DEFAULT_RETRY_BASE_DELAY_MS,
            confirm_timeout_ms: None,
            status_poll_interval_ms: constants::DEFAULT_STATUS_POLL_INTERVAL_MS,
            refresh_interval_ms: refresh_intervals::MEDIUM,
            analysis_buffer_size: buffer_sizes::ANALYSIS,
        }
    }
}

impl GuardConfig {
    /// Config for `program_id` with every other field at its default.
    pub fn new(program_id: Pubkey) -> Self {
        Self {
            program_id,
            ..Self::default()
        }
    }

    /// Load a JSON config file. Missing fields take their defaults.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: GuardConfig = serde_json::from_str(&json)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// Defaults overlaid with `GUARD_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::default().with_env_overrides()
    }

    /// Overlay `GUARD_*` environment variables on top of this config.
    pub fn with_env_overrides(self) -> Result<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        if let Some(id) = lookup(ENV_PROGRAM_ID) {
            self.program_id = Pubkey::from_str(id.trim())
                .with_context(|| format!("{} is not a valid address: {}", ENV_PROGRAM_ID, id))?;
        }
        if let Some(url) = lookup(ENV_RPC_URL) {
            self.rpc_url = url;
        }
        if let Some(commitment) = lookup(ENV_COMMITMENT) {
            self.commitment = Commitment::from_str(commitment.trim())
                .with_context(|| format!("{} is invalid", ENV_COMMITMENT))?;
        }
        if let Some(retries) = lookup(ENV_MAX_RETRIES) {
            self.max_retries = retries
                .trim()
                .parse()
                .with_context(|| format!("{} must be a non-negative integer", ENV_MAX_RETRIES))?;
        }
        Ok(self)
    }

    /// Reject configurations that cannot address the program.
    pub fn validate(&self) -> GuardResult<()> {
        if self.program_id == Pubkey::default() {
            return Err(GuardError::Config("program id is not set".to_string()));
        }
        if self.rpc_url.trim().is_empty() {
            return Err(GuardError::Config("rpc url is empty".to_string()));
        }
        for seed in [&self.seeds.analysis, &self.seeds.metrics, &self.seeds.network_stats] {
            if seed.is_empty() {
                return Err(GuardError::Config("seed strings must not be empty".to_string()));
            }
        }
        Ok(())
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }

    /// Window one attempt spends polling for `commitment`.
    pub fn confirm_timeout(&self) -> Duration {
        Duration::from_millis(
            self.confirm_timeout_ms
                .unwrap_or_else(|| self.commitment.default_confirm_timeout_ms()),
        )
    }

    pub fn status_poll_interval(&self) -> Duration {
        Duration::from_millis(self.status_poll_interval_ms)
    }

    pub fn refresh_interval(&self) -> Duration {
        Duration::from_millis(self.refresh_interval_ms)
    }
}

mod pubkey_string {
    use serde::{de, Deserialize, Deserializer, Serializer};
    use solana_pubkey::Pubkey;
    use std::str::FromStr;

    pub fn serialize<S: Serializer>(key: &Pubkey, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(key)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Pubkey, D::Error> {
        let s = String::deserialize(deserializer)?;
        Pubkey::from_str(&s).map_err(de::Error::custom)
    }
}
