use crate::alert::{AlertRecord, AlertRouter, Severity};
use crate::config::{Config, WatchedProcessRule};
use crate::metrics::{MetricReading, MetricStatus};
use crate::probe::SystemProbe;
use crate::process::ProcessSample;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{error, info};

/// Per-category interval gate. Owned exclusively by the poll loop; nothing
/// else reads or writes the timestamp table.
#[derive(Default)]
pub struct CheckGate {
    last_check: HashMap<String, Instant>,
}

impl CheckGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// True when `interval` has elapsed since the last granted check for
    /// `category` (always true on first call), recording the grant time as a
    /// side effect.
    pub fn should_check(&mut self, category: &str, interval: Duration) -> bool {
        let now = Instant::now();
        match self.last_check.get(category) {
            Some(last) if now.duration_since(*last) < interval => false,
            _ => {
                self.last_check.insert(category.to_string(), now);
                true
            }
        }
    }
}

/// The poll loop: samples the probe at each category's cadence, classifies
/// readings, and hands breaches to the alert router. One failed category is
/// logged and never stops the loop or the remaining categories of the same
/// iteration.
pub struct HealthMonitor {
    config: Arc<Config>,
    probe: Arc<SystemProbe>,
    router: AlertRouter,
    gate: CheckGate,
}

impl HealthMonitor {
    pub fn new(config: Arc<Config>, probe: Arc<SystemProbe>, router: AlertRouter) -> Self {
        Self {
            config,
            probe,
            router,
            gate: CheckGate::new(),
        }
    }

    /// Run until the shutdown channel flips. The 500 ms tick keeps process
    /// CPU deltas fresh without busy-waiting; the gate decides which
    /// categories actually run each tick.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        info!("starting health monitor loop");
        loop {
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = tokio::time::sleep(Duration::from_millis(500)) => {
                    self.run_checks().await;
                }
            }
        }
        info!("health monitor loop stopped");
    }

    pub async fn run_checks(&mut self) {
        self.probe.refresh();

        let metrics = &self.config.metrics;

        if metrics.cpu.enabled
            && self
                .gate
                .should_check("cpu", Duration::from_secs(metrics.cpu.check_interval))
        {
            match self.probe.check_cpu(&metrics.cpu) {
                Ok(readings) => {
                    for (metric, reading) in &readings {
                        let (warning, critical) = if metric == "temperature" {
                            (metrics.cpu.temperature_warning, metrics.cpu.temperature_critical)
                        } else {
                            (metrics.cpu.warning_threshold, metrics.cpu.critical_threshold)
                        };
                        if let Some(alert) = threshold_alert("CPU", metric, reading, warning, critical) {
                            self.router.route(&alert).await;
                        }
                    }
                }
                Err(e) => error!("CPU check failed: {e}"),
            }
        }

        if metrics.memory.enabled
            && self
                .gate
                .should_check("memory", Duration::from_secs(metrics.memory.check_interval))
        {
            match self.probe.check_memory(&metrics.memory) {
                Ok(readings) => {
                    for (metric, reading) in &readings {
                        let (warning, critical) = if metric == "swap" {
                            (
                                metrics.memory.swap_warning_threshold,
                                metrics.memory.swap_critical_threshold,
                            )
                        } else {
                            (
                                metrics.memory.warning_threshold,
                                metrics.memory.critical_threshold,
                            )
                        };
                        if let Some(alert) =
                            threshold_alert("Memory", metric, reading, warning, critical)
                        {
                            self.router.route(&alert).await;
                        }
                    }
                }
                Err(e) => error!("memory check failed: {e}"),
            }
        }

        if metrics.disk.enabled
            && self
                .gate
                .should_check("disk", Duration::from_secs(metrics.disk.check_interval))
        {
            match self.probe.check_disk(&metrics.disk) {
                Ok(readings) => {
                    for (metric, reading) in &readings {
                        if let Some(alert) = threshold_alert(
                            "Disk",
                            metric,
                            reading,
                            metrics.disk.warning_threshold,
                            metrics.disk.critical_threshold,
                        ) {
                            self.router.route(&alert).await;
                        }
                    }
                }
                Err(e) => error!("disk check failed: {e}"),
            }
        }

        let processes = &self.config.processes;
        if processes.enabled
            && self
                .gate
                .should_check("processes", Duration::from_secs(processes.check_interval))
        {
            match self.probe.watch_samples() {
                Ok(samples) => {
                    for alert in scan_watch_list(&samples, &processes.watch_list) {
                        self.router.route(&alert).await;
                    }
                }
                Err(e) => error!("process check failed: {e}"),
            }
        }
    }
}

/// Build an alert for a warning or critical reading; normal and error
/// readings produce none.
fn threshold_alert(
    category: &str,
    metric: &str,
    reading: &MetricReading,
    warning_threshold: f64,
    critical_threshold: f64,
) -> Option<AlertRecord> {
    let (severity, threshold) = match reading.status {
        MetricStatus::Critical => (Severity::Critical, critical_threshold),
        MetricStatus::Warning => (Severity::Warning, warning_threshold),
        MetricStatus::Normal | MetricStatus::Error => return None,
    };

    Some(AlertRecord::new(
        format!("{category} Alert: {metric}"),
        format!(
            "Current {metric} is {:.1}%, exceeding {} threshold of {threshold}%. {}",
            reading.value, reading.status, reading.message
        ),
        severity,
    ))
}

/// Compare every process against every matching watch rule. Violations are
/// always generated at warning severity, so they never escalate to the
/// external sink.
pub(crate) fn scan_watch_list(
    samples: &[ProcessSample],
    rules: &[WatchedProcessRule],
) -> Vec<AlertRecord> {
    let mut alerts = Vec::new();

    for sample in samples {
        let name = sample.name.to_lowercase();
        for rule in rules {
            if !name.contains(&rule.name.to_lowercase()) {
                continue;
            }

            if sample.cpu_percent > rule.max_cpu_percent {
                alerts.push(AlertRecord::new(
                    format!("High CPU Usage: {}", sample.name),
                    format!(
                        "Process {} (PID: {}) is using {:.1}% CPU, exceeding threshold of {}%",
                        sample.name, sample.pid, sample.cpu_percent, rule.max_cpu_percent
                    ),
                    Severity::Warning,
                ));
            }

            if sample.memory_percent > rule.max_memory_percent {
                alerts.push(AlertRecord::new(
                    format!("High Memory Usage: {}", sample.name),
                    format!(
                        "Process {} (PID: {}) is using {:.1}% memory, exceeding threshold of {}%",
                        sample.name, sample.pid, sample.memory_percent, rule.max_memory_percent
                    ),
                    Severity::Warning,
                ));
            }
        }
    }

    alerts
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::classify;

    #[test]
    fn gate_first_call_is_always_granted() {
        let mut gate = CheckGate::new();
        assert!(gate.should_check("cpu", Duration::from_secs(3600)));
    }

    #[test]
    fn gate_blocks_within_interval_and_reopens_after() {
        let mut gate = CheckGate::new();
        let interval = Duration::from_millis(50);

        assert!(gate.should_check("memory", interval));
        assert!(!gate.should_check("memory", interval));

        std::thread::sleep(Duration::from_millis(60));
        assert!(gate.should_check("memory", interval));
    }

    #[test]
    fn gate_categories_are_independent() {
        let mut gate = CheckGate::new();
        let interval = Duration::from_secs(3600);

        assert!(gate.should_check("cpu", interval));
        assert!(gate.should_check("disk", interval));
        assert!(!gate.should_check("cpu", interval));
    }

    #[test]
    fn worked_threshold_example() {
        // Thresholds {warning: 70, critical: 90} from the dedup policy docs.
        let critical = MetricReading::new(92.0, classify(92.0, 70.0, 90.0), "CPU usage is at 92.0%");
        let warning = MetricReading::new(75.0, classify(75.0, 70.0, 90.0), "CPU usage is at 75.0%");
        let normal = MetricReading::new(40.0, classify(40.0, 70.0, 90.0), "CPU usage is at 40.0%");

        let alert = threshold_alert("CPU", "usage", &critical, 70.0, 90.0).unwrap();
        assert_eq!(alert.title, "CPU Alert: usage");
        assert_eq!(alert.severity, Severity::Critical);
        assert_eq!(
            alert.description,
            "Current usage is 92.0%, exceeding critical threshold of 90%. CPU usage is at 92.0%"
        );

        let alert = threshold_alert("CPU", "usage", &warning, 70.0, 90.0).unwrap();
        assert_eq!(alert.severity, Severity::Warning);
        assert!(alert.description.contains("exceeding warning threshold of 70%"));

        assert!(threshold_alert("CPU", "usage", &normal, 70.0, 90.0).is_none());
    }

    #[test]
    fn error_readings_do_not_alert() {
        let reading = MetricReading::provider_error("sampling failed");
        assert!(threshold_alert("Memory", "ram", &reading, 70.0, 90.0).is_none());
    }

    fn sample(name: &str, cpu: f64, memory: f64) -> ProcessSample {
        ProcessSample {
            pid: 1234,
            name: name.to_string(),
            cpu_percent: cpu,
            memory_percent: memory,
        }
    }

    fn rule(name: &str, cpu: f64, memory: f64) -> WatchedProcessRule {
        WatchedProcessRule {
            name: name.to_string(),
            max_cpu_percent: cpu,
            max_memory_percent: memory,
        }
    }

    #[test]
    fn watch_list_matches_substring_case_insensitively() {
        let samples = vec![sample("Chrome Helper", 80.0, 2.0)];
        let rules = vec![rule("chrome", 50.0, 10.0)];

        let alerts = scan_watch_list(&samples, &rules);
        assert_eq!(alerts.len(), 1);
        assert!(alerts[0].title.starts_with("High CPU Usage"));
        assert_eq!(alerts[0].severity, Severity::Warning);
    }

    #[test]
    fn watch_list_flags_cpu_and_memory_independently() {
        let samples = vec![sample("postgres", 90.0, 40.0)];
        let rules = vec![rule("postgres", 50.0, 20.0)];

        let alerts = scan_watch_list(&samples, &rules);
        assert_eq!(alerts.len(), 2);
    }

    #[test]
    fn watch_list_ignores_non_matching_and_compliant_processes() {
        let samples = vec![sample("nginx", 90.0, 40.0), sample("postgres", 1.0, 1.0)];
        let rules = vec![rule("postgres", 50.0, 20.0)];

        assert!(scan_watch_list(&samples, &rules).is_empty());
    }

    #[test]
    fn watch_list_threshold_is_exclusive() {
        // Exactly at the ceiling is compliant; only strictly above trips.
        let samples = vec![sample("redis", 50.0, 20.0)];
        let rules = vec![rule("redis", 50.0, 20.0)];

        assert!(scan_watch_list(&samples, &rules).is_empty());
    }
}
