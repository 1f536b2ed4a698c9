use crate::alert::Severity;
use crate::error::MonitorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{error, info};

/// External incident-management endpoint. Every operation converts transport
/// failures into a boolean failure (or an empty list) plus a logged error;
/// callers never see a raw transport error.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn create(
        &self,
        title: &str,
        description: &str,
        severity: Severity,
        details: Option<serde_json::Value>,
    ) -> bool;

    async fn acknowledge(&self, incident_id: &str) -> bool;

    async fn resolve(&self, incident_id: &str) -> bool;

    async fn list_open(&self) -> Vec<Incident>;
}

/// An incident as reported back by the service. Fields beyond the id are
/// passed through to the API consumers untouched.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Incident {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub urgency: String,
    #[serde(default)]
    pub created_at: Option<String>,
    #[serde(default)]
    pub html_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IncidentList {
    #[serde(default)]
    incidents: Vec<Incident>,
}

const API_BASE: &str = "https://api.pagerduty.com";

/// PagerDuty-backed sink. Critical maps to high urgency, everything else to
/// low.
pub struct PagerDutySink {
    client: reqwest::Client,
    api_key: String,
    service_id: String,
    base_url: String,
}

impl PagerDutySink {
    pub fn new(api_key: impl Into<String>, service_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            service_id: service_id.into(),
            base_url: API_BASE.to_string(),
        }
    }

    #[cfg(test)]
    fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn auth_header(&self) -> String {
        format!("Token token={}", self.api_key)
    }

    async fn post_incident(&self, body: &serde_json::Value) -> Result<(), MonitorError> {
        let response = self
            .client
            .post(format!("{}/incidents", self.base_url))
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .header(reqwest::header::ACCEPT, "application/vnd.pagerduty+json;version=2")
            .json(body)
            .send()
            .await
            .map_err(|e| MonitorError::SinkTransport(e.to_string()))?;

        if response.status().is_success() {
            return Ok(());
        }

        let code = response.status();
        let text = response.text().await.unwrap_or_default();
        Err(MonitorError::SinkTransport(format!(
            "incident creation rejected with {code}: {text}"
        )))
    }

    async fn put_status(&self, incident_id: &str, status: &str) -> Result<(), MonitorError> {
        let body = json!({
            "incident": {
                "type": "incident_reference",
                "status": status,
            }
        });

        let response = self
            .client
            .put(format!("{}/incidents/{incident_id}", self.base_url))
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .header(reqwest::header::ACCEPT, "application/vnd.pagerduty+json;version=2")
            .json(&body)
            .send()
            .await
            .map_err(|e| MonitorError::SinkTransport(e.to_string()))?;

        if response.status().is_success() {
            return Ok(());
        }

        let code = response.status();
        let text = response.text().await.unwrap_or_default();
        Err(MonitorError::SinkTransport(format!(
            "status update rejected with {code}: {text}"
        )))
    }

    async fn fetch_open(&self) -> Result<Vec<Incident>, MonitorError> {
        let response = self
            .client
            .get(format!("{}/incidents", self.base_url))
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .header(reqwest::header::ACCEPT, "application/vnd.pagerduty+json;version=2")
            .query(&[
                ("service_ids[]", self.service_id.as_str()),
                ("statuses[]", "triggered"),
                ("statuses[]", "acknowledged"),
                ("sort_by", "created_at:desc"),
            ])
            .send()
            .await
            .map_err(|e| MonitorError::SinkTransport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MonitorError::SinkTransport(format!(
                "incident listing rejected with {}",
                response.status()
            )));
        }

        response
            .json::<IncidentList>()
            .await
            .map(|list| list.incidents)
            .map_err(|e| MonitorError::SinkTransport(format!("unexpected incident list payload: {e}")))
    }

    async fn set_status(&self, incident_id: &str, status: &str) -> bool {
        match self.put_status(incident_id, status).await {
            Ok(()) => {
                info!(incident_id, status, "updated incident status");
                true
            }
            Err(e) => {
                error!(incident_id, "incident status update failed: {e}");
                false
            }
        }
    }
}

#[async_trait]
impl AlertSink for PagerDutySink {
    async fn create(
        &self,
        title: &str,
        description: &str,
        severity: Severity,
        details: Option<serde_json::Value>,
    ) -> bool {
        let body = json!({
            "incident": {
                "type": "incident",
                "title": title,
                "service": {
                    "id": self.service_id,
                    "type": "service_reference",
                },
                "urgency": urgency_for(severity),
                "body": {
                    "type": "incident_body",
                    "details": description,
                },
                "custom_details": details.unwrap_or_else(|| json!({})),
            }
        });

        match self.post_incident(&body).await {
            Ok(()) => {
                info!(title, "created incident");
                true
            }
            Err(e) => {
                error!(title, "incident creation failed: {e}");
                false
            }
        }
    }

    async fn acknowledge(&self, incident_id: &str) -> bool {
        self.set_status(incident_id, "acknowledged").await
    }

    async fn resolve(&self, incident_id: &str) -> bool {
        self.set_status(incident_id, "resolved").await
    }

    async fn list_open(&self) -> Vec<Incident> {
        match self.fetch_open().await {
            Ok(incidents) => incidents,
            Err(e) => {
                error!("incident listing failed: {e}");
                Vec::new()
            }
        }
    }
}

fn urgency_for(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "high",
        _ => "low",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_critical_maps_to_high_urgency() {
        assert_eq!(urgency_for(Severity::Critical), "high");
        assert_eq!(urgency_for(Severity::Warning), "low");
        assert_eq!(urgency_for(Severity::Error), "low");
        assert_eq!(urgency_for(Severity::Info), "low");
    }

    #[test]
    fn incident_list_parses_with_missing_fields() {
        let payload = r#"{
            "incidents": [
                {"id": "PABC123", "title": "CPU Alert: usage", "status": "triggered", "urgency": "high"},
                {"id": "PDEF456"}
            ]
        }"#;

        let list: IncidentList = serde_json::from_str(payload).unwrap();
        assert_eq!(list.incidents.len(), 2);
        assert_eq!(list.incidents[0].id, "PABC123");
        assert_eq!(list.incidents[1].title, "");
        assert!(list.incidents[1].created_at.is_none());
    }

    #[test]
    fn empty_incident_payload_parses() {
        let list: IncidentList = serde_json::from_str("{}").unwrap();
        assert!(list.incidents.is_empty());
    }

    // Port 1 on loopback refuses connections, so these exercise the transport
    // failure path without touching the network.
    fn unreachable_sink() -> PagerDutySink {
        PagerDutySink::new("test-key", "PSVC123").with_base_url("http://127.0.0.1:1")
    }

    #[tokio::test]
    async fn transport_failure_surfaces_as_sink_transport_error() {
        let sink = unreachable_sink();

        let err = sink.put_status("PABC123", "resolved").await.unwrap_err();
        assert!(matches!(err, MonitorError::SinkTransport(_)));
    }

    #[tokio::test]
    async fn trait_methods_collapse_transport_failures() {
        let sink = unreachable_sink();

        assert!(!sink.create("CPU Alert: usage", "92%", Severity::Critical, None).await);
        assert!(!sink.acknowledge("PABC123").await);
        assert!(!sink.resolve("PABC123").await);
        assert!(sink.list_open().await.is_empty());
    }
}
