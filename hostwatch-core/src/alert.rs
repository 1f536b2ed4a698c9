use crate::sink::AlertSink;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    Warning,
    Error,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Critical => "critical",
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Info => "info",
        };
        f.write_str(s)
    }
}

/// Immutable alert record. Logged and/or forwarded, then dropped; nothing is
/// retained locally.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRecord {
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub created_at: DateTime<Utc>,
}

impl AlertRecord {
    pub fn new(title: impl Into<String>, description: impl Into<String>, severity: Severity) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            severity,
            created_at: Utc::now(),
        }
    }
}

/// Routes alerts: every alert produces one warning-level log line; only
/// critical alerts are forwarded to the incident service, and only when one
/// is configured. Warning-severity breaches (including every watch-list
/// violation) deliberately stay local so that a CPU blip never pages anyone.
pub struct AlertRouter {
    sink: Option<Arc<dyn AlertSink>>,
}

impl AlertRouter {
    pub fn new(sink: Option<Arc<dyn AlertSink>>) -> Self {
        Self { sink }
    }

    pub async fn route(&self, alert: &AlertRecord) {
        warn!(
            severity = %alert.severity,
            "Alert: {} - {}",
            alert.title,
            alert.description
        );

        if alert.severity != Severity::Critical {
            return;
        }

        if let Some(sink) = &self.sink {
            let delivered = sink
                .create(&alert.title, &alert.description, alert.severity, None)
                .await;
            if !delivered {
                error!(title = %alert.title, "failed to deliver critical alert to incident service");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::Incident;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingSink {
        creates: AtomicUsize,
    }

    #[async_trait]
    impl AlertSink for CountingSink {
        async fn create(
            &self,
            _title: &str,
            _description: &str,
            _severity: Severity,
            _details: Option<serde_json::Value>,
        ) -> bool {
            self.creates.fetch_add(1, Ordering::SeqCst);
            true
        }

        async fn acknowledge(&self, _incident_id: &str) -> bool {
            false
        }

        async fn resolve(&self, _incident_id: &str) -> bool {
            false
        }

        async fn list_open(&self) -> Vec<Incident> {
            Vec::new()
        }
    }

    #[tokio::test]
    async fn critical_alert_triggers_exactly_one_create() {
        let sink = Arc::new(CountingSink::default());
        let router = AlertRouter::new(Some(sink.clone()));

        router
            .route(&AlertRecord::new("CPU Alert: usage", "92%", Severity::Critical))
            .await;

        assert_eq!(sink.creates.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn non_critical_severities_never_reach_the_sink() {
        let sink = Arc::new(CountingSink::default());
        let router = AlertRouter::new(Some(sink.clone()));

        for severity in [Severity::Warning, Severity::Error, Severity::Info] {
            router
                .route(&AlertRecord::new("Memory Alert: ram", "78%", severity))
                .await;
        }

        assert_eq!(sink.creates.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn critical_without_a_sink_is_logged_only() {
        let router = AlertRouter::new(None);
        // Must not panic or error out.
        router
            .route(&AlertRecord::new("Disk Alert: /", "95%", Severity::Critical))
            .await;
    }

    #[derive(Clone, Default)]
    struct WarnCounter {
        warns: Arc<AtomicUsize>,
    }

    impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for WarnCounter {
        fn on_event(
            &self,
            event: &tracing::Event<'_>,
            _ctx: tracing_subscriber::layer::Context<'_, S>,
        ) {
            if *event.metadata().level() == tracing::Level::WARN {
                self.warns.fetch_add(1, Ordering::SeqCst);
            }
        }
    }

    #[tokio::test]
    async fn every_route_emits_exactly_one_warning_log() {
        use tracing_subscriber::layer::SubscriberExt;

        let counter = WarnCounter::default();
        let warns = counter.warns.clone();
        let _guard = tracing::subscriber::set_default(tracing_subscriber::registry().with(counter));

        let router = AlertRouter::new(Some(Arc::new(CountingSink::default())));
        let severities = [
            Severity::Critical,
            Severity::Warning,
            Severity::Error,
            Severity::Info,
        ];
        for (emitted, severity) in severities.into_iter().enumerate() {
            router
                .route(&AlertRecord::new("Disk Alert: /", "95%", severity))
                .await;
            assert_eq!(warns.load(Ordering::SeqCst), emitted + 1);
        }
    }

    #[test]
    fn severity_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&Severity::Critical).unwrap(),
            "\"critical\""
        );
    }
}
