//! Cluster performance data returned by the RPC node

use serde::{Deserialize, Serialize};

use crate::constants::GAS_WARNING_THRESHOLD;

/// One entry of `getRecentPerformanceSamples`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSample {
    pub slot: u64,
    pub num_transactions: u64,
    pub num_slots: u64,
    pub sample_period_secs: u16,
}

/// Result of `getEpochInfo`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpochInfo {
    pub epoch: u64,
    pub slot_index: u64,
    pub slots_in_epoch: u64,
    pub absolute_slot: u64,
    #[serde(default)]
    pub block_height: Option<u64>,
}

/// Merged network health figures
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NetworkStats {
    pub tps: f64,
    /// Average slot time over the sample window
    pub avg_block_time_ms: f64,
    pub epoch: u64,
    /// Share of the current epoch already elapsed, 0-100
    pub epoch_progress: f64,
    pub absolute_slot: u64,
    /// Total supply in lamports
    pub total_supply: u64,
}

impl NetworkStats {
    /// Combine the three RPC reads. A missing sample yields zero throughput.
    pub fn from_parts(sample: Option<&PerformanceSample>, epoch: &EpochInfo, total_supply: u64) -> Self {
        let (tps, avg_block_time_ms) = match sample {
            Some(s) if s.sample_period_secs > 0 => {
                let period = f64::from(s.sample_period_secs);
                let block_time = if s.num_slots > 0 {
                    period * 1000.0 / s.num_slots as f64
                } else {
                    0.0
                };
                (s.num_transactions as f64 / period, block_time)
            }
            _ => (0.0, 0.0),
        };

        let epoch_progress = if epoch.slots_in_epoch > 0 {
            epoch.slot_index as f64 * 100.0 / epoch.slots_in_epoch as f64
        } else {
            0.0
        };

        Self {
            tps,
            avg_block_time_ms,
            epoch: epoch.epoch,
            epoch_progress,
            absolute_slot: epoch.absolute_slot,
            total_supply,
        }
    }
}

/// How a gas figure compares with the recorded average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GasLevel {
    Normal,
    Elevated,
    Excessive,
}

impl GasLevel {
    /// Classify `gas` against `average`; with no history the fixed warning
    /// threshold is the baseline.
    pub fn classify(gas: u64, average: u64) -> Self {
        let baseline = if average == 0 { GAS_WARNING_THRESHOLD } else { average };
        if gas <= baseline {
            GasLevel::Normal
        } else if gas.saturating_mul(2) <= baseline.saturating_mul(3) {
            GasLevel::Elevated
        } else {
            GasLevel::Excessive
        }
    }
}
