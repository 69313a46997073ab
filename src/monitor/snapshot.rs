//! Merged view of program and cluster state

use log::debug;
use serde::Serialize;

use crate::errors::GuardResult;
use crate::models::{AnalysisRecord, MetricsRecord, NetworkStats};

/// Latest known values. A field keeps its last good value when a refresh
/// of that field fails.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Snapshot {
    pub analysis: Option<AnalysisRecord>,
    pub metrics: Option<MetricsRecord>,
    pub network_stats: Option<NetworkStats>,
    /// Most recent failure of the latest refresh, if any
    pub last_error: Option<String>,
}

/// Results of one refresh cycle, one entry per fetch.
#[derive(Debug)]
pub struct RefreshOutcome {
    /// `None` when no target program was configured
    pub analysis: Option<GuardResult<AnalysisRecord>>,
    pub metrics: GuardResult<MetricsRecord>,
    pub network_stats: GuardResult<NetworkStats>,
}

impl Snapshot {
    /// Apply a refresh: successes replace their field, failures leave it
    /// alone. "No data yet" errors are only silent while the field has
    /// never held a value.
    pub fn merged(&self, outcome: RefreshOutcome) -> Snapshot {
        let mut next = Snapshot {
            last_error: None,
            ..self.clone()
        };

        if let Some(analysis) = outcome.analysis {
            merge_field(&mut next.analysis, &mut next.last_error, "analysis", analysis);
        }
        merge_field(&mut next.metrics, &mut next.last_error, "metrics", outcome.metrics);
        merge_field(
            &mut next.network_stats,
            &mut next.last_error,
            "network stats",
            outcome.network_stats,
        );

        next
    }
}

fn merge_field<T>(field: &mut Option<T>, last_error: &mut Option<String>, name: &str, result: GuardResult<T>) {
    match result {
        Ok(value) => *field = Some(value),
        Err(e) if e.is_no_data() && field.is_none() => debug!("No {} data yet: {}", name, e),
        Err(e) => *last_error = Some(format!("Failed to fetch {}: {}", name, e)),
    }
}
