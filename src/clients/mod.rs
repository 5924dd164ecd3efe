//! Backend client facades
//!
//! Each facade binds a base URL to a fixed catalog of remote operations,
//! each with its own path, method and timeout budget. Facades do no business
//! validation (a missing session id is the caller's concern); they only trim
//! and percent-encode path segments and decode typed replies.
//!
//! - [`AdvisoryClient`]: sessions, telemetry events and suggestions
//! - [`AgentClient`]: scans and tool execution on the operator's machine
//!
//! The two facades share nothing but the [`Gateway`](crate::http::Gateway)
//! connection pool, so a failure in one never affects the other.

pub mod advisory;
pub mod agent;
pub mod types;

pub use advisory::AdvisoryClient;
pub use agent::AgentClient;

use crate::error::{Result, RtaiError};
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// Timeout budgets per call class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientTimeouts {
    /// Reachability probes
    pub health: Duration,
    /// Session create/get/list/delete and event ingestion
    pub session: Duration,
    /// AI suggestion requests
    pub suggest: Duration,
    /// Long-running agent actions (scans, history ingestion, commands)
    pub agent: Duration,
}

impl Default for ClientTimeouts {
    fn default() -> Self {
        Self {
            health: Duration::from_secs(7),
            session: Duration::from_secs(20),
            suggest: Duration::from_secs(45),
            agent: Duration::from_secs(120),
        }
    }
}

/// Strip trailing slashes from a configured base URL
pub(crate) fn normalize_base(base_url: &str) -> String {
    base_url.trim().trim_end_matches('/').to_string()
}

/// Join `segments` onto `base`, percent-encoding each trimmed segment
///
/// # Errors
///
/// Returns `RtaiError::Config` if `base` is not an absolute URL.
pub(crate) fn endpoint(base: &str, segments: &[&str]) -> Result<Url> {
    let mut url = Url::parse(base)
        .map_err(|e| RtaiError::Config(format!("Invalid base URL '{}': {}", base, e)))?;
    url.path_segments_mut()
        .map_err(|_| RtaiError::Config(format!("Base URL cannot carry a path: {}", base)))?
        .pop_if_empty()
        .extend(segments.iter().map(|s| s.trim()));
    Ok(url)
}

/// Decode a typed record from a parsed reply
pub(crate) fn decode<T: DeserializeOwned>(url: &Url, value: Value) -> Result<T> {
    serde_json::from_value(value).map_err(|e| {
        RtaiError::Decode {
            url: url.to_string(),
            message: e.to_string(),
        }
        .into()
    })
}
