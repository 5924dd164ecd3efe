//! Execution agent facade
//!
//! The agent runs on the operator's own machine, executes tools and posts
//! telemetry to the advisory server on its own. Its replies are free-form
//! and returned as raw JSON.

use super::types::{HealthStatus, IngestHistoryRequest, ReconRequest, RunRequest};
use super::{decode, endpoint, normalize_base, ClientTimeouts};
use crate::error::Result;
use crate::http::{Gateway, RequestOptions};
use serde::Serialize;
use serde_json::Value;

/// Client for the local execution agent
#[derive(Debug, Clone)]
pub struct AgentClient {
    base_url: String,
    gateway: Gateway,
    timeouts: ClientTimeouts,
}

impl AgentClient {
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
        match value {
            Value::Object(_) => decode(&url, value),
            _ => Ok(HealthStatus::default()),
        }
    }

    /// `POST /auto-recon`
    pub async fn auto_recon(&self, request: &ReconRequest) -> Result<Value> {
        self.post_action("auto-recon", request).await
    }

    /// `POST /ingest-history`
    pub async fn ingest_history(&self, request: &IngestHistoryRequest) -> Result<Value> {
        self.post_action("ingest-history", request).await
    }

    /// `POST /run`
    pub async fn run(&self, request: &RunRequest) -> Result<Value> {
        self.post_action("run", request).await
    }

    async fn post_action<B: Serialize>(&self, path: &str, body: &B) -> Result<Value> {
        let url = endpoint(&self.base_url, &[path])?;
        self.gateway
            .request_json(
                url.as_str(),
                RequestOptions::post(serde_json::to_value(body)?).with_timeout(self.timeouts.agent),
            )
            .await
    }
}
