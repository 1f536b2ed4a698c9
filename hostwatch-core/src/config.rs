use crate::error::MonitorError;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Top-level configuration, loaded once at startup and immutable afterwards.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub metrics: MetricsConfig,
    pub processes: ProcessWatchConfig,
    pub alerting: AlertingConfig,
    pub api: ListenerConfig,
    pub dashboard: DashboardConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct MetricsConfig {
    pub cpu: CpuThresholds,
    pub memory: MemoryThresholds,
    pub disk: DiskThresholds,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CpuThresholds {
    pub enabled: bool,
    /// Minimum seconds between evaluations of this category.
    pub check_interval: u64,
    pub warning_threshold: f64,
    pub critical_threshold: f64,
    pub temperature_warning: f64,
    pub temperature_critical: f64,
}

impl Default for CpuThresholds {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval: 30,
            warning_threshold: 70.0,
            critical_threshold: 90.0,
            temperature_warning: 70.0,
            temperature_critical: 85.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct MemoryThresholds {
    pub enabled: bool,
    pub check_interval: u64,
    pub warning_threshold: f64,
    pub critical_threshold: f64,
    pub swap_warning_threshold: f64,
    pub swap_critical_threshold: f64,
}

impl Default for MemoryThresholds {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval: 30,
            warning_threshold: 75.0,
            critical_threshold: 90.0,
            swap_warning_threshold: 50.0,
            swap_critical_threshold: 75.0,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiskThresholds {
    pub enabled: bool,
    pub check_interval: u64,
    pub warning_threshold: f64,
    pub critical_threshold: f64,
    pub monitored_paths: Vec<PathBuf>,
}

impl Default for DiskThresholds {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval: 300,
            warning_threshold: 80.0,
            critical_threshold: 90.0,
            monitored_paths: vec![PathBuf::from("/")],
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProcessWatchConfig {
    pub enabled: bool,
    pub check_interval: u64,
    pub watch_list: Vec<WatchedProcessRule>,
}

impl Default for ProcessWatchConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_interval: 60,
            watch_list: Vec::new(),
        }
    }
}

/// A process-name substring paired with per-process resource ceilings.
/// Matching is case-insensitive; thresholds compare against raw (per-core)
/// CPU percent, not the normalized figure shown in listings.
#[derive(Debug, Clone, Deserialize)]
pub struct WatchedProcessRule {
    pub name: String,
    pub max_cpu_percent: f64,
    pub max_memory_percent: f64,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AlertingConfig {
    pub pagerduty: PagerDutyConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PagerDutyConfig {
    pub enabled: bool,
    pub api_key: String,
    pub service_id: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ListenerConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8001,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8000,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
        }
    }
}

impl Config {
    /// Load and parse the TOML configuration file. A missing or malformed
    /// file is fatal; everything inside it has a default.
    pub fn load(path: &Path) -> Result<Self, MonitorError> {
        let raw = std::fs::read_to_string(path).map_err(|e| {
            MonitorError::Configuration(format!(
                "cannot read configuration file {}: {e}",
                path.display()
            ))
        })?;

        toml::from_str(&raw).map_err(|e| {
            MonitorError::Configuration(format!(
                "cannot parse configuration file {}: {e}",
                path.display()
            ))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_cover_every_section() {
        let config: Config = toml::from_str("").unwrap();
        assert!(config.metrics.cpu.enabled);
        assert_eq!(config.metrics.cpu.check_interval, 30);
        assert_eq!(config.metrics.disk.monitored_paths, vec![PathBuf::from("/")]);
        assert!(config.processes.watch_list.is_empty());
        assert!(!config.alerting.pagerduty.enabled);
        assert_eq!(config.api.port, 8001);
        assert_eq!(config.dashboard.port, 8000);
        assert_eq!(config.logging.level, "info");
        assert!(config.logging.file.is_none());
    }

    #[test]
    fn parses_partial_override() {
        let config: Config = toml::from_str(
            r#"
            [metrics.cpu]
            warning_threshold = 60.0
            critical_threshold = 85.0

            [processes]
            check_interval = 120

            [[processes.watch_list]]
            name = "chrome"
            max_cpu_percent = 50.0
            max_memory_percent = 10.0

            [alerting.pagerduty]
            enabled = true
            api_key = "key"
            service_id = "SVC123"
            "#,
        )
        .unwrap();

        assert_eq!(config.metrics.cpu.warning_threshold, 60.0);
        assert_eq!(config.metrics.cpu.critical_threshold, 85.0);
        // Untouched sections keep their defaults.
        assert_eq!(config.metrics.memory.critical_threshold, 90.0);
        assert_eq!(config.processes.check_interval, 120);
        assert_eq!(config.processes.watch_list.len(), 1);
        assert_eq!(config.processes.watch_list[0].name, "chrome");
        assert!(config.alerting.pagerduty.enabled);
        assert_eq!(config.alerting.pagerduty.service_id, "SVC123");
    }

    #[test]
    fn missing_file_is_a_configuration_error() {
        let err = Config::load(Path::new("/nonexistent/hostwatch.toml")).unwrap_err();
        assert!(matches!(err, MonitorError::Configuration(_)));
    }
}
