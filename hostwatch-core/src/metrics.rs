use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricStatus {
    Normal,
    Warning,
    Critical,
    /// The provider failed while producing this reading.
    Error,
}

impl std::fmt::Display for MetricStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            MetricStatus::Normal => "normal",
            MetricStatus::Warning => "warning",
            MetricStatus::Critical => "critical",
            MetricStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Classify a value against a warning/critical threshold pair. Ties go to the
/// more severe bucket. Stateless: a value oscillating at a boundary flips
/// status on every evaluation.
pub fn classify(value: f64, warning: f64, critical: f64) -> MetricStatus {
    if value >= critical {
        MetricStatus::Critical
    } else if value >= warning {
        MetricStatus::Warning
    } else {
        MetricStatus::Normal
    }
}

/// A single evaluated reading. Produced fresh on every check and never
/// retained.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricReading {
    pub value: f64,
    pub status: MetricStatus,
    pub message: String,
}

impl MetricReading {
    pub fn new(value: f64, status: MetricStatus, message: impl Into<String>) -> Self {
        Self {
            value,
            status,
            message: message.into(),
        }
    }

    /// Degraded reading emitted when the provider fails.
    pub fn provider_error(message: impl Into<String>) -> Self {
        Self {
            value: 0.0,
            status: MetricStatus::Error,
            message: message.into(),
        }
    }
}

/// Aggregate disk I/O counters, informational only.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiskIoStats {
    pub read_bytes: u64,
    pub write_bytes: u64,
    pub read_ops: u64,
    pub write_ops: u64,
}

/// Current readings across all metric categories, as served by the API.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub cpu: BTreeMap<String, MetricReading>,
    pub memory: BTreeMap<String, MetricReading>,
    pub disk: BTreeMap<String, MetricReading>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disk_io: Option<DiskIoStats>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SystemInfo {
    pub platform: String,
    pub os_release: String,
    pub os_version: String,
    pub architecture: String,
    pub hostname: String,
    pub physical_cores: Option<usize>,
    pub logical_cores: usize,
    pub memory_total: u64,
    pub memory_available: u64,
    pub disk_total: u64,
    pub disk_used: u64,
    pub disk_free: u64,
    pub boot_time: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_buckets() {
        assert_eq!(classify(40.0, 70.0, 90.0), MetricStatus::Normal);
        assert_eq!(classify(75.0, 70.0, 90.0), MetricStatus::Warning);
        assert_eq!(classify(92.0, 70.0, 90.0), MetricStatus::Critical);
    }

    #[test]
    fn classify_ties_favor_severity() {
        assert_eq!(classify(70.0, 70.0, 90.0), MetricStatus::Warning);
        assert_eq!(classify(90.0, 70.0, 90.0), MetricStatus::Critical);
        // Degenerate pair where warning == critical.
        assert_eq!(classify(50.0, 50.0, 50.0), MetricStatus::Critical);
    }

    #[test]
    fn classify_below_everything() {
        assert_eq!(classify(0.0, 0.0, 0.0), MetricStatus::Critical);
        assert_eq!(classify(-1.0, 0.0, 0.0), MetricStatus::Normal);
    }

    #[test]
    fn status_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&MetricStatus::Critical).unwrap(),
            "\"critical\""
        );
        assert_eq!(
            serde_json::to_string(&MetricStatus::Error).unwrap(),
            "\"error\""
        );
    }
}
