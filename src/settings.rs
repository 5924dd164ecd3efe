//! Process settings for the rtai binary
//!
//! These govern how the client itself runs (where state lives, which UI
//! origin to check for mixed content, timeout budgets). They are separate
//! from the endpoint configuration in [`crate::config`], which the operator
//! edits at runtime and which is persisted in the state store.
//!
//! Precedence, lowest first: YAML file, `RTAI_*` environment variables,
//! command-line flags.

use crate::cli::Cli;
use crate::clients::ClientTimeouts;
use crate::error::{Result, RtaiError};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

/// Default settings file location
pub const DEFAULT_SETTINGS_PATH: &str = "config/rtai.yaml";

/// Upper bound for any single timeout budget
const MAX_TIMEOUT_MS: u64 = 600_000;

/// Main settings structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Runtime-injected endpoint overrides (JSON or YAML string map)
    #[serde(default = "default_runtime_config_path")]
    pub runtime_config_path: PathBuf,

    /// Directory of the state database; platform data dir when unset
    #[serde(default)]
    pub state_dir: Option<PathBuf>,

    /// Origin the operator's browser UI is served from
    #[serde(default)]
    pub page_url: Option<String>,

    /// Per call-class timeout budgets
    #[serde(default)]
    pub timeouts: TimeoutSettings,
}

/// Timeout budgets in milliseconds
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutSettings {
    /// Health probes
    #[serde(default = "default_health_ms")]
    pub health_ms: u64,

    /// Session CRUD and event ingestion
    #[serde(default = "default_session_ms")]
    pub session_ms: u64,

    /// Suggestion requests
    #[serde(default = "default_suggest_ms")]
    pub suggest_ms: u64,

    /// Agent actions
    #[serde(default = "default_agent_ms")]
    pub agent_ms: u64,
}

fn default_runtime_config_path() -> PathBuf {
    PathBuf::from("config/app-config.yaml")
}

fn default_health_ms() -> u64 {
    7_000
}

fn default_session_ms() -> u64 {
    20_000
}

fn default_suggest_ms() -> u64 {
    45_000
}

fn default_agent_ms() -> u64 {
    120_000
}

impl Default for TimeoutSettings {
    fn default() -> Self {
        Self {
            health_ms: default_health_ms(),
            session_ms: default_session_ms(),
            suggest_ms: default_suggest_ms(),
            agent_ms: default_agent_ms(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            runtime_config_path: default_runtime_config_path(),
            state_dir: None,
            page_url: None,
            timeouts: TimeoutSettings::default(),
        }
    }
}

impl Settings {
    /// Load settings from file with environment and CLI overrides
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the settings file
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns `RtaiError::Config` if the file exists but cannot be read or
    /// parsed
    pub fn load(path: &str, cli: &Cli) -> Result<Self> {
        let mut settings = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Settings file not found at {}, using defaults", path);
            Self::default()
        };

        settings.apply_env_vars();
        settings.apply_cli_overrides(cli);

        Ok(settings)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RtaiError::Config(format!("Failed to read settings file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| RtaiError::Config(format!("Failed to parse settings: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(path) = std::env::var("RTAI_RUNTIME_CONFIG") {
            self.runtime_config_path = PathBuf::from(path);
        }

        if let Ok(dir) = std::env::var("RTAI_STATE_DIR") {
            self.state_dir = Some(PathBuf::from(dir));
        }

        if let Ok(page_url) = std::env::var("RTAI_PAGE_URL") {
            self.page_url = Some(page_url);
        }

        let budgets = [
            ("RTAI_HEALTH_TIMEOUT_MS", &mut self.timeouts.health_ms),
            ("RTAI_SESSION_TIMEOUT_MS", &mut self.timeouts.session_ms),
            ("RTAI_SUGGEST_TIMEOUT_MS", &mut self.timeouts.suggest_ms),
            ("RTAI_AGENT_TIMEOUT_MS", &mut self.timeouts.agent_ms),
        ];
        for (name, slot) in budgets {
            if let Ok(raw) = std::env::var(name) {
                match raw.trim().parse() {
                    Ok(value) => *slot = value,
                    Err(_) => tracing::warn!("Invalid {}: {}", name, raw),
                }
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if let Some(path) = &cli.runtime_config {
            self.runtime_config_path = path.clone();
        }
        if let Some(dir) = &cli.state_dir {
            self.state_dir = Some(dir.clone());
        }
        if let Some(page_url) = &cli.page_url {
            self.page_url = Some(page_url.clone());
        }
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }
    }

    /// Validate the settings
    ///
    /// # Errors
    ///
    /// Returns `RtaiError::Config` for a zero or excessive timeout or an
    /// unparsable page URL
    pub fn validate(&self) -> Result<()> {
        let budgets = [
            ("timeouts.health_ms", self.timeouts.health_ms),
            ("timeouts.session_ms", self.timeouts.session_ms),
            ("timeouts.suggest_ms", self.timeouts.suggest_ms),
            ("timeouts.agent_ms", self.timeouts.agent_ms),
        ];
        for (name, value) in budgets {
            if value == 0 {
                return Err(RtaiError::Config(format!("{} must be greater than 0", name)).into());
            }
            if value > MAX_TIMEOUT_MS {
                return Err(RtaiError::Config(format!(
                    "{} must be less than or equal to {}",
                    name, MAX_TIMEOUT_MS
                ))
                .into());
            }
        }

        if let Some(page_url) = &self.page_url {
            Url::parse(page_url.trim()).map_err(|e| {
                RtaiError::Config(format!("Invalid page_url '{}': {}", page_url, e))
            })?;
        }

        Ok(())
    }

    /// Timeout budgets for the client facades
    pub fn client_timeouts(&self) -> ClientTimeouts {
        ClientTimeouts {
            health: Duration::from_millis(self.timeouts.health_ms),
            session: Duration::from_millis(self.timeouts.session_ms),
            suggest: Duration::from_millis(self.timeouts.suggest_ms),
            agent: Duration::from_millis(self.timeouts.agent_ms),
        }
    }

    /// Directory holding the state database
    ///
    /// # Errors
    ///
    /// Returns `RtaiError::Storage` if no directory is configured and the
    /// platform data directory cannot be determined
    pub fn state_dir(&self) -> Result<PathBuf> {
        if let Some(dir) = &self.state_dir {
            return Ok(dir.clone());
        }
        let dirs = ProjectDirs::from("com", "rtai", "rtai")
            .ok_or_else(|| RtaiError::Storage("Could not determine data directory".into()))?;
        Ok(dirs.data_dir().join("state"))
    }
}
