//! Advisory server facade
//!
//! Sessions, telemetry ingestion and AI suggestions. Suggestion replies are
//! returned as raw JSON because their schema is not fixed; see
//! [`normalize`](crate::normalize) for the display view.

use super::types::{
    EventIngestRequest, EventsReply, HealthStatus, SessionRecord, SessionStartRequest,
    SessionSummary, SuggestRequest,
};
use super::{decode, endpoint, normalize_base, ClientTimeouts};
use crate::error::Result;
use crate::http::{Gateway, RequestOptions};
use serde_json::Value;

/// Path of the telemetry agent script served by the advisory server
const AGENT_SCRIPT_PATH: &str = "static/kali_telemetry_agent.py";

/// Client for the advisory server
///
/// # Examples
///
/// ```
/// use rtai::clients::{AdvisoryClient, ClientTimeouts};
/// use rtai::http::Gateway;
///
/// # fn main() -> rtai::error::Result<()> {
/// let client = AdvisoryClient::new("http://127.0.0.1:8088/", Gateway::new()?, ClientTimeouts::default());
/// assert_eq!(client.base_url(), "http://127.0.0.1:8088");
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct AdvisoryClient {
    base_url: String,
    gateway: Gateway,
    timeouts: ClientTimeouts,
}

impl AdvisoryClient {
    /// Bind a base URL; trailing slashes are stripped once here
    pub fn new(base_url: &str, gateway: Gateway, timeouts: ClientTimeouts) -> Self {
        Self {
            base_url: normalize_base(base_url),
            gateway,
            timeouts,
        }
    }

    /// Normalized base URL
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Download location of the telemetry agent script
    pub fn agent_download_url(&self) -> String {
        format!("{}/{}", self.base_url, AGENT_SCRIPT_PATH)
    }

    /// `GET /health`
    pub async fn health(&self) -> Result<HealthStatus> {
        let url = endpoint(&self.base_url, &["health"])?;
        let value = self
            .gateway
            .request_json(
                url.as_str(),
                RequestOptions::get().with_timeout(self.timeouts.health),
            )
            .await?;
        // Legacy deployments answer with an empty body or plain text.
        match value {
            Value::Object(_) => decode(&url, value),
            _ => Ok(HealthStatus::default()),
        }
    }

    /// `POST /v1/sessions`
    pub async fn create_session(&self, request: &SessionStartRequest) -> Result<SessionRecord> {
        let url = endpoint(&self.base_url, &["v1", "sessions"])?;
        let value = self
            .gateway
            .request_json(
                url.as_str(),
                RequestOptions::post(serde_json::to_value(request)?)
                    .with_timeout(self.timeouts.session),
            )
            .await?;
        decode(&url, value)
    }

    /// `GET /v1/sessions/{id}`
    pub async fn get_session(&self, session_id: &str) -> Result<SessionRecord> {
        let url = endpoint(&self.base_url, &["v1", "sessions", session_id])?;
        let value = self
            .gateway
            .request_json(
                url.as_str(),
                RequestOptions::get().with_timeout(self.timeouts.session),
            )
            .await?;
        decode(&url, value)
    }

    /// `GET /v1/sessions?tenant_id=&user_id=&limit=`
    pub async fn list_sessions(
        &self,
        tenant_id: &str,
        user_id: &str,
        limit: u32,
    ) -> Result<Vec<SessionSummary>> {
        let mut url = endpoint(&self.base_url, &["v1", "sessions"])?;
        url.query_pairs_mut()
            .append_pair("tenant_id", tenant_id.trim())
            .append_pair("user_id", user_id.trim())
            .append_pair("limit", &limit.to_string());
        let value = self
            .gateway
            .request_json(
                url.as_str(),
                RequestOptions::get().with_timeout(self.timeouts.session),
            )
            .await?;
        match value {
            Value::Null => Ok(Vec::new()),
            other => decode(&url, other),
        }
    }

    /// `DELETE /v1/sessions/{id}`
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let url = endpoint(&self.base_url, &["v1", "sessions", session_id])?;
        self.gateway
            .request_void(
                url.as_str(),
                RequestOptions::delete().with_timeout(self.timeouts.session),
            )
            .await
    }

    /// `POST /v1/sessions/{id}/events`
    pub async fn add_events(
        &self,
        session_id: &str,
        request: &EventIngestRequest,
    ) -> Result<EventsReply> {
        let url = endpoint(&self.base_url, &["v1", "sessions", session_id, "events"])?;
        let value = self
            .gateway
            .request_json(
                url.as_str(),
                RequestOptions::post(serde_json::to_value(request)?)
                    .with_timeout(self.timeouts.session),
            )
            .await?;
        decode(&url, value)
    }

    /// `POST /v1/sessions/{id}/suggest`
    pub async fn suggest(&self, session_id: &str, request: &SuggestRequest) -> Result<Value> {
        let url = endpoint(&self.base_url, &["v1", "sessions", session_id, "suggest"])?;
        self.gateway
            .request_json(
                url.as_str(),
                RequestOptions::post(serde_json::to_value(request)?)
                    .with_timeout(self.timeouts.suggest),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_download_url() {
        let gateway = Gateway::new().unwrap();
        let client = AdvisoryClient::new("http://ai.lab:8088//", gateway, ClientTimeouts::default());
        assert_eq!(
            client.agent_download_url(),
            "http://ai.lab:8088/static/kali_telemetry_agent.py"
        );
    }
}
