//! Wire and state models for the Guard program

pub mod account;
pub mod instruction;
pub mod network;


pub use self::account::{decode_analysis, decode_metrics, AnalysisRecord, MetricsRecord, RiskLevel};
pub use self::instruction::{encode_analyze, encode_record_metrics, GuardInstruction};
pub use self::network::{EpochInfo, GasLevel, NetworkStats, PerformanceSample};
