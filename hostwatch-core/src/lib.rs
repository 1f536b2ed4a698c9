pub mod alert;
pub mod config;
pub mod error;
pub mod metrics;
pub mod monitor;
pub mod probe;
pub mod process;
pub mod sink;

#[cfg(test)]
mod tests;

pub use alert::{AlertRecord, AlertRouter, Severity};
pub use config::Config;
pub use error::MonitorError;
pub use metrics::{classify, MetricReading, MetricStatus, MetricsSnapshot, SystemInfo};
pub use monitor::{CheckGate, HealthMonitor};
pub use probe::SystemProbe;
pub use process::{ProcessDetail, ProcessEntry, ProcessState};
pub use sink::{AlertSink, Incident, PagerDutySink};
