//! Heartbeat construction and delivery.
//!
//! A heartbeat is a point-in-time snapshot, built fresh each cycle and
//! never persisted. Delivery is best-effort by design: the control
//! plane's availability must never block or destabilize local
//! reconciliation, so the reconciler logs and drops any send error.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{SecondsFormat, Utc};
use log::debug;
use reqwest::Client;
use serde::Serialize;

use crate::error::{AgentError, Result};

/// Agent version reported in every heartbeat.
pub const AGENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default connect timeout for heartbeat requests.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default request timeout for heartbeat requests.
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Status report delivered to the control plane each cycle.
#[derive(Debug, Clone, Serialize)]
pub struct Heartbeat {
    /// Operator-supplied node identifier.
    pub node_id: String,
    /// Current config revision. Empty when the lookup failed.
    pub git_sha: String,
    /// Agent version constant.
    pub agent_version: String,
    /// Applier version. Empty when the lookup failed.
    pub caddy_version: String,
    /// Whether the most recent validate-and-apply step succeeded.
    pub last_reload_ok: bool,
    /// RFC3339 UTC timestamp of record construction.
    pub timestamp: String,
}

impl Heartbeat {
    /// Builds a heartbeat stamped with the current UTC time.
    pub fn now(node_id: &str, git_sha: String, caddy_version: String, last_reload_ok: bool) -> Self {
        Self {
            node_id: node_id.to_string(),
            git_sha,
            agent_version: AGENT_VERSION.to_string(),
            caddy_version,
            last_reload_ok,
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        }
    }
}

/// External sink accepting heartbeats. No response contract.
#[async_trait]
pub trait HeartbeatSink: Send + Sync {
    /// Attempts to deliver one heartbeat.
    async fn send(&self, heartbeat: &Heartbeat) -> Result<()>;
}

/// HTTP sink posting heartbeats to the control plane.
pub struct HttpSink {
    client: Client,
    endpoint: String,
}

impl HttpSink {
    /// Creates a sink posting to `<control_url>/api/heartbeat`.
    pub fn new(control_url: &str) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| AgentError::ReportUnreachable(e.to_string()))?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/heartbeat", control_url.trim_end_matches('/')),
        })
    }

    /// Returns the heartbeat endpoint URL.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl HeartbeatSink for HttpSink {
    async fn send(&self, heartbeat: &Heartbeat) -> Result<()> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(heartbeat)
            .send()
            .await
            .map_err(|e| AgentError::ReportUnreachable(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            debug!("Heartbeat accepted by control plane ({})", status);
            Ok(())
        } else {
            Err(AgentError::ReportUnreachable(format!(
                "control plane returned {}",
                status
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_heartbeat_wire_field_names() {
        let heartbeat = Heartbeat::now("nd1", "abc123".to_string(), "v2.8.4".to_string(), true);
        let json = serde_json::to_value(&heartbeat).unwrap();

        assert_eq!(json["node_id"], "nd1");
        assert_eq!(json["git_sha"], "abc123");
        assert_eq!(json["agent_version"], AGENT_VERSION);
        assert_eq!(json["caddy_version"], "v2.8.4");
        assert_eq!(json["last_reload_ok"], true);
        assert!(json["timestamp"].is_string());
    }

    #[test]
    fn test_heartbeat_timestamp_is_rfc3339_utc() {
        let heartbeat = Heartbeat::now("nd1", String::new(), String::new(), false);
        let parsed = chrono::DateTime::parse_from_rfc3339(&heartbeat.timestamp).unwrap();
        assert_eq!(parsed.offset().local_minus_utc(), 0);
        assert!(heartbeat.timestamp.ends_with('Z'));
    }

    #[test]
    fn test_heartbeat_best_effort_fields_may_be_empty() {
        let heartbeat = Heartbeat::now("nd1", String::new(), String::new(), false);
        let json = serde_json::to_value(&heartbeat).unwrap();
        assert_eq!(json["git_sha"], "");
        assert_eq!(json["caddy_version"], "");
        assert_eq!(json["last_reload_ok"], false);
    }

    #[test]
    fn test_endpoint_normalizes_trailing_slash() {
        let sink = HttpSink::new("https://control.example.com/").unwrap();
        assert_eq!(sink.endpoint(), "https://control.example.com/api/heartbeat");

        let sink = HttpSink::new("https://control.example.com").unwrap();
        assert_eq!(sink.endpoint(), "https://control.example.com/api/heartbeat");
    }

    #[tokio::test]
    async fn test_send_to_unreachable_sink_is_report_unreachable() {
        // Port 1 on loopback refuses connections immediately.
        let sink = HttpSink::new("http://127.0.0.1:1").unwrap();
        let heartbeat = Heartbeat::now("nd1", String::new(), String::new(), true);

        let err = sink.send(&heartbeat).await.unwrap_err();
        assert!(matches!(err, AgentError::ReportUnreachable(_)));
    }
}
