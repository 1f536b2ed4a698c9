use thiserror::Error;

/// Failure classes surfaced by the monitor. Per-check and per-request errors
/// are caught at the boundary that produced them; only configuration errors
/// are fatal, and only at startup.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("metrics provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("process {0} no longer exists")]
    ProcessVanished(u32),

    #[error("alert sink transport failure: {0}")]
    SinkTransport(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}
