//! Reachability probes for both remote endpoints
//!
//! Probes run on demand only. Each probe builds its facade from the base
//! URL the store holds at call time, so a config change takes effect on the
//! next probe without restarting anything.

use crate::clients::types::HealthStatus;
use crate::clients::{AdvisoryClient, AgentClient, ClientTimeouts};
use crate::error::{describe, Result};
use crate::http::Gateway;
use crate::state::{AppStore, Endpoint, HealthProbeResult};
use std::sync::Arc;
use url::Url;

/// Probes the advisory server and the execution agent
#[derive(Clone)]
pub struct HealthMonitor {
    store: Arc<AppStore>,
    gateway: Gateway,
    timeouts: ClientTimeouts,
}

impl HealthMonitor {
    /// Create a monitor writing into `store`
    pub fn new(store: Arc<AppStore>, gateway: Gateway, timeouts: ClientTimeouts) -> Self {
        Self {
            store,
            gateway,
            timeouts,
        }
    }

    /// Probe the advisory server and record the outcome
    pub async fn probe_advisory(&self) -> HealthProbeResult {
        let client = AdvisoryClient::new(
            &self.store.config().ai_base_url,
            self.gateway.clone(),
            self.timeouts,
        );
        let outcome = client.health().await;
        self.record(Endpoint::Advisory, outcome)
    }

    /// Probe the execution agent and record the outcome
    pub async fn probe_agent(&self) -> HealthProbeResult {
        let client = AgentClient::new(
            &self.store.config().agent_base_url,
            self.gateway.clone(),
            self.timeouts,
        );
        let outcome = client.health().await;
        self.record(Endpoint::Agent, outcome)
    }

    /// Probe both endpoints concurrently
    ///
    /// # Returns
    ///
    /// `(advisory, agent)` probe results
    pub async fn probe_all(&self) -> (HealthProbeResult, HealthProbeResult) {
        tokio::join!(self.probe_advisory(), self.probe_agent())
    }

    fn record(&self, endpoint: Endpoint, outcome: Result<HealthStatus>) -> HealthProbeResult {
        let result = match outcome {
            Ok(status) => {
                tracing::info!(%endpoint, summary = %status.summary(), "Health probe succeeded");
                HealthProbeResult::ok(status.summary())
            }
            Err(e) => {
                let message = describe(&e);
                tracing::warn!(%endpoint, "Health probe failed: {}", message);
                HealthProbeResult::error(message)
            }
        };
        self.store.set_health(endpoint, result.clone());
        result
    }
}

/// Whether a page served from `page_url` would be blocked from calling
/// `agent_url`: an `https` page calling a plain `http` agent
///
/// Unparsable URLs never warn.
///
/// # Examples
///
/// ```
/// use rtai::health::is_mixed_content;
///
/// assert!(is_mixed_content("https://ui.lab", "http://127.0.0.1:8787"));
/// assert!(!is_mixed_content("http://ui.lab", "http://127.0.0.1:8787"));
/// assert!(!is_mixed_content("https://ui.lab", "not a url"));
/// ```
pub fn is_mixed_content(page_url: &str, agent_url: &str) -> bool {
    match (Url::parse(page_url.trim()), Url::parse(agent_url.trim())) {
        (Ok(page), Ok(agent)) => page.scheme() == "https" && agent.scheme() == "http",
        _ => false,
    }
}

/// Operator-facing warning for a mixed-content setup, if any
pub fn mixed_content_warning(page_url: Option<&str>, agent_url: &str) -> Option<String> {
    let page_url = page_url?;
    if !is_mixed_content(page_url, agent_url) {
        return None;
    }
    Some(format!(
        "The UI at {} is served over HTTPS but the local agent {} uses HTTP; \
         browsers will block these calls. Serve the UI over HTTP or put the agent behind HTTPS.",
        page_url.trim(),
        agent_url.trim()
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigSources;
    use crate::state::ProbeStatus;

    #[test]
    fn test_mixed_content_matrix() {
        assert!(is_mixed_content("https://a", "http://b"));
        assert!(!is_mixed_content("https://a", "https://b"));
        assert!(!is_mixed_content("http://a", "http://b"));
        assert!(!is_mixed_content("http://a", "https://b"));
        assert!(!is_mixed_content("", "http://b"));
        assert!(!is_mixed_content("https://a", "127.0.0.1:8787"));
    }

    #[test]
    fn test_mixed_content_warning() {
        assert!(mixed_content_warning(None, "http://b").is_none());
        assert!(mixed_content_warning(Some("http://ui"), "http://b").is_none());
        let warning = mixed_content_warning(Some("https://ui"), "http://b").unwrap();
        assert!(warning.contains("http://b"));
    }

    #[tokio::test]
    async fn test_unreachable_agent_records_error() {
        let store = Arc::new(AppStore::in_memory(ConfigSources::default()));
        let mut patch = crate::config::ConfigPatch::default();
        patch.set(crate::config::ConfigKey::LocalAgentUrl, "http://127.0.0.1:9");
        store.set_config_patch(&patch).unwrap();

        let monitor = HealthMonitor::new(store.clone(), Gateway::new().unwrap(), ClientTimeouts::default());
        let result = monitor.probe_agent().await;
        assert_eq!(result.status, ProbeStatus::Error);
        assert!(result.checked_at.is_some());
        assert_eq!(store.health(Endpoint::Agent), result);
        assert_eq!(store.health(Endpoint::Advisory).status, ProbeStatus::Unknown);
    }
}
