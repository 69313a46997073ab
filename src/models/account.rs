//! Account state records and their fixed binary layouts
//!
//! All integers are unsigned little-endian. Every decoder checks the buffer
//! against the layout's minimum length before touching a field.

use serde::{Deserialize, Serialize};

use crate::constants::risk;
use crate::errors::{GuardError, GuardResult};

/// Byte layout of an analysis account.
///
/// | offset | width | field                 |
/// |--------|-------|-----------------------|
/// | 0      | 1     | `risk_score`          |
/// | 1      | 2     | `vulnerability_count` |
/// | 3      | 8     | `timestamp`           |
/// | 11     | ..    | `details` (opaque)    |
pub mod analysis_layout {
    pub const RISK_SCORE: usize = 0;
    pub const VULNERABILITY_COUNT: usize = 1;
    pub const TIMESTAMP: usize = 3;
    pub const DETAILS: usize = 11;
    pub const MIN_LEN: usize = DETAILS;
}

/// Byte layout of the metrics account.
///
/// | offset | width | field                |
/// |--------|-------|----------------------|
/// | 0      | 8     | `total_transactions` |
/// | 8      | 8     | `total_gas_used`     |
/// | 16     | 1     | `success_rate`       |
/// | 17     | 8     | `last_updated`       |
///
/// Accounts written before `last_updated` existed are 17 bytes long; the
/// field then reads as zero.
pub mod metrics_layout {
    pub const TOTAL_TRANSACTIONS: usize = 0;
    pub const TOTAL_GAS_USED: usize = 8;
    pub const SUCCESS_RATE: usize = 16;
    pub const LAST_UPDATED: usize = 17;
    pub const MIN_LEN: usize = LAST_UPDATED;
    pub const FULL_LEN: usize = LAST_UPDATED + 8;
}

/// Risk analysis stored for one target program
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRecord {
    /// 0-100, higher is safer
    pub risk_score: u8,
    pub vulnerability_count: u16,
    /// Unix timestamp of the last analysis
    pub timestamp: u64,
    /// Trailing bytes, kept verbatim for forward compatibility
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<u8>,
}

/// Aggregate usage metrics recorded through the program
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub total_transactions: u64,
    pub total_gas_used: u64,
    /// 0-100
    pub success_rate: u8,
    pub last_updated: u64,
}

/// Risk bucket for an analysis score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn from_score(score: u8) -> Self {
        if score >= risk::LOW_RISK_MIN_SCORE {
            RiskLevel::Low
        } else if score >= risk::MEDIUM_RISK_MIN_SCORE {
            RiskLevel::Medium
        } else {
            RiskLevel::High
        }
    }
}

/// Bounds-checked little-endian reads over an account buffer.
struct Reader<'a> {
    data: &'a [u8],
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8], min_len: usize, record: &str) -> GuardResult<Self> {
        if data.len() < min_len {
            return Err(GuardError::InvalidAccountData(format!(
                "{} account needs at least {} bytes, got {}",
                record,
                min_len,
                data.len()
            )));
        }
        Ok(Self { data })
    }

    fn bytes<const N: usize>(&self, offset: usize) -> Option<[u8; N]> {
        self.data
            .get(offset..offset.checked_add(N)?)
            .and_then(|s| s.try_into().ok())
    }

    fn u8(&self, offset: usize) -> GuardResult<u8> {
        self.bytes::<1>(offset).map(|b| b[0]).ok_or_else(|| out_of_bounds(offset))
    }

    fn u16(&self, offset: usize) -> GuardResult<u16> {
        self.bytes(offset).map(u16::from_le_bytes).ok_or_else(|| out_of_bounds(offset))
    }

    fn u64(&self, offset: usize) -> GuardResult<u64> {
        self.bytes(offset).map(u64::from_le_bytes).ok_or_else(|| out_of_bounds(offset))
    }

    /// Optional trailing field: absent when the buffer ends before it.
    fn u64_or_zero(&self, offset: usize) -> u64 {
        self.bytes(offset).map(u64::from_le_bytes).unwrap_or(0)
    }

    fn tail(&self, offset: usize) -> &'a [u8] {
        self.data.get(offset..).unwrap_or(&[])
    }
}

fn out_of_bounds(offset: usize) -> GuardError {
    GuardError::InvalidAccountData(format!("read past end of buffer at offset {}", offset))
}

impl AnalysisRecord {
    pub fn decode(data: &[u8]) -> GuardResult<Self> {
        use analysis_layout::*;

        let reader = Reader::new(data, MIN_LEN, "analysis")?;
        Ok(Self {
            risk_score: reader.u8(RISK_SCORE)?,
            vulnerability_count: reader.u16(VULNERABILITY_COUNT)?,
            timestamp: reader.u64(TIMESTAMP)?,
            details: reader.tail(DETAILS).to_vec(),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(analysis_layout::MIN_LEN + self.details.len());
        data.push(self.risk_score);
        data.extend_from_slice(&self.vulnerability_count.to_le_bytes());
        data.extend_from_slice(&self.timestamp.to_le_bytes());
        data.extend_from_slice(&self.details);
        data
    }

    pub fn risk_level(&self) -> RiskLevel {
        RiskLevel::from_score(self.risk_score)
    }
}

impl MetricsRecord {
    pub fn decode(data: &[u8]) -> GuardResult<Self> {
        use metrics_layout::*;

        let reader = Reader::new(data, MIN_LEN, "metrics")?;
        Ok(Self {
            total_transactions: reader.u64(TOTAL_TRANSACTIONS)?,
            total_gas_used: reader.u64(TOTAL_GAS_USED)?,
            success_rate: reader.u8(SUCCESS_RATE)?,
            last_updated: reader.u64_or_zero(LAST_UPDATED),
        })
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(metrics_layout::FULL_LEN);
        data.extend_from_slice(&self.total_transactions.to_le_bytes());
        data.extend_from_slice(&self.total_gas_used.to_le_bytes());
        data.push(self.success_rate);
        data.extend_from_slice(&self.last_updated.to_le_bytes());
        data
    }

    /// Mean gas per transaction, 0 when nothing has been recorded.
    pub fn average_gas_used(&self) -> u64 {
        self.total_gas_used
            .checked_div(self.total_transactions)
            .unwrap_or(0)
    }
}

/// Decode an analysis account buffer.
pub fn decode_analysis(data: &[u8]) -> GuardResult<AnalysisRecord> {
    AnalysisRecord::decode(data)
}

/// Decode the metrics account buffer.
pub fn decode_metrics(data: &[u8]) -> GuardResult<MetricsRecord> {
    MetricsRecord::decode(data)
}

/// Percentage of successful transactions, rounded to the nearest integer.
pub fn success_rate_percent(successful: u64, total: u64) -> u8 {
    if total == 0 {
        return 0;
    }
    let successful = successful.min(total) as u128;
    let total = total as u128;
    ((successful * 100 + total / 2) / total) as u8
}
