use rtai::clients::ClientTimeouts;
use rtai::config::{ConfigKey, ConfigLayer, ConfigSources};
use rtai::http::Gateway;
use rtai::ops::Operations;
use rtai::state::AppStore;
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Short budgets so failing tests finish quickly
#[allow(dead_code)]
pub fn fast_timeouts() -> ClientTimeouts {
    ClientTimeouts {
        health: Duration::from_secs(2),
        session: Duration::from_secs(2),
        suggest: Duration::from_secs(2),
        agent: Duration::from_secs(2),
    }
}

/// Sources whose runtime tier points both endpoints at the given URLs
#[allow(dead_code)]
pub fn sources(ai_base_url: &str, agent_url: &str) -> ConfigSources {
    ConfigSources {
        runtime: ConfigLayer::new()
            .with(ConfigKey::AiBaseUrl, ai_base_url)
            .with(ConfigKey::LocalAgentUrl, agent_url)
            .with(ConfigKey::DefaultTargets, "10.0.0.5, 10.0.0.6")
            .with(ConfigKey::DefaultTenantId, "lab")
            .with(ConfigKey::DefaultUserId, "alice"),
        ..Default::default()
    }
}

/// Operations over an in-memory store wired to the given endpoints
#[allow(dead_code)]
pub fn operations(ai_base_url: &str, agent_url: &str) -> Operations {
    let store = Arc::new(AppStore::in_memory(sources(ai_base_url, agent_url)));
    Operations::new(store, Gateway::new().expect("gateway"), fast_timeouts())
}

/// Minimal session record body
#[allow(dead_code)]
pub fn session_json(id: &str) -> Value {
    json!({
        "session_id": id,
        "tenant_id": "lab",
        "user_id": "alice",
        "agent_id": "kali-01",
        "objective": "Capture the flag",
        "target_scope": ["10.0.0.5", "10.0.0.6"],
        "current_phase": "recon",
        "events": []
    })
}

/// Write a runtime config file into a fresh temp dir
#[allow(dead_code)]
pub fn temp_runtime_config(contents: &str) -> (TempDir, PathBuf) {
    let temp_dir = TempDir::new().expect("failed to create tempdir");
    let path = temp_dir.path().join("app-config.yaml");
    std::fs::write(&path, contents).expect("failed to write runtime config");
    (temp_dir, path)
}
