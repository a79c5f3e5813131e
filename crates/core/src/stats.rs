use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Telemetry for the most recent scan run; overwritten on every scan.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanStats {
    /// Candidate records the scan looked at.
    pub total_checked: usize,
    /// Alerts that were new this run (cache misses), not total candidates.
    pub alerts_found: usize,
    pub timestamp: DateTime<Utc>,
}

impl ScanStats {
    pub fn new(total_checked: usize, alerts_found: usize) -> Self {
        Self {
            total_checked,
            alerts_found,
            timestamp: Utc::now(),
        }
    }
}
