//! Layered client configuration for rtai
//!
//! The endpoint and identity defaults the client starts with come from three
//! tiers, highest priority first:
//!
//! 1. the runtime-injected map, written by the deployment from a template
//!    (`app-config.json` / `app-config.yaml`);
//! 2. build-time `RTAI_*` variables captured with `option_env!`;
//! 3. hardcoded defaults.
//!
//! A runtime value equal to its own unexpanded template token (`$AI_BASE_URL`
//! or `${AI_BASE_URL}`) counts as absent, so a deployment that skipped
//! template substitution degrades to a working default instead of a literal
//! placeholder URL.

use crate::error::{Result, RtaiError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;

/// Objective used when no tier supplies one
pub const DEFAULT_OBJECTIVE: &str = "Complete the lab objective safely within allowed scope.";

/// Names of the configuration fields in the runtime and build-time tiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfigKey {
    /// Advisory server base URL
    AiBaseUrl,
    /// Execution agent base URL
    LocalAgentUrl,
    /// CSV list of default targets
    DefaultTargets,
    /// Default policy identifier
    DefaultPolicyId,
    /// Default tenant identifier
    DefaultTenantId,
    /// Default user identifier
    DefaultUserId,
    /// Default agent identifier
    DefaultAgentId,
    /// Free-text session objective
    DefaultObjective,
}

impl ConfigKey {
    /// Every key, in resolution order
    pub const ALL: [ConfigKey; 8] = [
        ConfigKey::AiBaseUrl,
        ConfigKey::LocalAgentUrl,
        ConfigKey::DefaultTargets,
        ConfigKey::DefaultPolicyId,
        ConfigKey::DefaultTenantId,
        ConfigKey::DefaultUserId,
        ConfigKey::DefaultAgentId,
        ConfigKey::DefaultObjective,
    ];

    /// Key as it appears in the runtime-injected map
    pub fn name(self) -> &'static str {
        match self {
            ConfigKey::AiBaseUrl => "AI_BASE_URL",
            ConfigKey::LocalAgentUrl => "LOCAL_AGENT_URL",
            ConfigKey::DefaultTargets => "DEFAULT_TARGETS",
            ConfigKey::DefaultPolicyId => "DEFAULT_POLICY_ID",
            ConfigKey::DefaultTenantId => "DEFAULT_TENANT_ID",
            ConfigKey::DefaultUserId => "DEFAULT_USER_ID",
            ConfigKey::DefaultAgentId => "DEFAULT_AGENT_ID",
            ConfigKey::DefaultObjective => "DEFAULT_OBJECTIVE",
        }
    }

    /// Whether the field holds a CSV list
    pub fn is_csv(self) -> bool {
        matches!(self, ConfigKey::DefaultTargets)
    }

    /// Whether `value` is this key's own unexpanded template token
    ///
    /// # Examples
    ///
    /// ```
    /// use rtai::config::ConfigKey;
    ///
    /// assert!(ConfigKey::AiBaseUrl.is_placeholder("$AI_BASE_URL"));
    /// assert!(ConfigKey::AiBaseUrl.is_placeholder("${AI_BASE_URL}"));
    /// assert!(!ConfigKey::AiBaseUrl.is_placeholder("$LOCAL_AGENT_URL"));
    /// ```
    pub fn is_placeholder(self, value: &str) -> bool {
        let value = value.trim();
        let name = self.name();
        match value.strip_prefix('$') {
            Some(rest) if rest == name => true,
            Some(rest) => rest
                .strip_prefix('{')
                .and_then(|r| r.strip_suffix('}'))
                .map(|inner| inner == name)
                .unwrap_or(false),
            None => false,
        }
    }
}

/// One tier of raw string overrides keyed by [`ConfigKey::name`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfigLayer(BTreeMap<String, String>);

impl ConfigLayer {
    /// Create an empty layer
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: ConfigKey, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Set a value for `key`
    pub fn insert(&mut self, key: ConfigKey, value: impl Into<String>) {
        self.0.insert(key.name().to_string(), value.into());
    }

    /// Raw value for `key`, if any
    pub fn get(&self, key: ConfigKey) -> Option<&str> {
        self.0.get(key.name()).map(String::as_str)
    }

    /// Whether the layer holds no values
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Load the runtime-injected layer from a JSON or YAML map
    ///
    /// # Errors
    ///
    /// Returns `RtaiError::Config` if the file cannot be read or is not a
    /// flat string map.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            RtaiError::Config(format!(
                "Failed to read runtime config {}: {}",
                path.display(),
                e
            ))
        })?;
        Self::parse(&contents)
    }

    /// Parse a JSON or YAML map of string overrides
    ///
    /// Only string values count; `null`, numbers, lists and maps are treated
    /// as absent so they fall through to the next tier.
    pub fn parse(contents: &str) -> Result<Self> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        // YAML is a superset of JSON, so one parser covers both formats.
        let raw: BTreeMap<String, serde_yaml::Value> = serde_yaml::from_str(contents)
            .map_err(|e| RtaiError::Config(format!("Failed to parse runtime config: {}", e)))?;

        let mut layer = Self::default();
        for (key, value) in raw {
            match value {
                serde_yaml::Value::String(value) => {
                    layer.0.insert(key, value);
                }
                other => {
                    tracing::debug!(key = %key, value = ?other, "Ignoring non-string runtime value");
                }
            }
        }
        Ok(layer)
    }

    /// Load the runtime layer, degrading to an empty layer on any failure
    pub fn load_or_empty(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No runtime config file, skipping tier");
            return Self::default();
        }
        match Self::from_file(path) {
            Ok(layer) => {
                tracing::debug!(path = %path.display(), keys = layer.0.len(), "Loaded runtime config");
                layer
            }
            Err(e) => {
                tracing::warn!("Ignoring runtime config {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    /// Build-time layer captured from `RTAI_*` variables at compile time
    pub fn from_build_env() -> Self {
        let captured = [
            (ConfigKey::AiBaseUrl, option_env!("RTAI_AI_BASE_URL")),
            (ConfigKey::LocalAgentUrl, option_env!("RTAI_LOCAL_AGENT_URL")),
            (ConfigKey::DefaultTargets, option_env!("RTAI_DEFAULT_TARGETS")),
            (ConfigKey::DefaultPolicyId, option_env!("RTAI_DEFAULT_POLICY_ID")),
            (ConfigKey::DefaultTenantId, option_env!("RTAI_DEFAULT_TENANT_ID")),
            (ConfigKey::DefaultUserId, option_env!("RTAI_DEFAULT_USER_ID")),
            (ConfigKey::DefaultAgentId, option_env!("RTAI_DEFAULT_AGENT_ID")),
            (ConfigKey::DefaultObjective, option_env!("RTAI_DEFAULT_OBJECTIVE")),
        ];

        let mut layer = Self::default();
        for (key, value) in captured {
            if let Some(value) = value {
                layer.insert(key, value);
            }
        }
        layer
    }
}

/// Fully resolved client configuration
///
/// Persisted as part of the durable state record, so the serialized field
/// names are part of the storage format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedConfig {
    /// Advisory server base URL
    pub ai_base_url: String,
    /// Execution agent base URL
    #[serde(rename = "localAgentUrl")]
    pub agent_base_url: String,
    /// Normalized CSV list of default targets (`a,b,c`)
    pub default_targets_csv: String,
    /// Default policy identifier
    pub policy_id: String,
    /// Default tenant identifier
    pub tenant_id: String,
    /// Default user identifier
    pub user_id: String,
    /// Default agent identifier
    pub agent_id: String,
    /// Free-text objective sent on session creation
    pub objective: String,
}

impl ResolvedConfig {
    /// Value of the field named by `key`
    pub fn get(&self, key: ConfigKey) -> &str {
        match key {
            ConfigKey::AiBaseUrl => &self.ai_base_url,
            ConfigKey::LocalAgentUrl => &self.agent_base_url,
            ConfigKey::DefaultTargets => &self.default_targets_csv,
            ConfigKey::DefaultPolicyId => &self.policy_id,
            ConfigKey::DefaultTenantId => &self.tenant_id,
            ConfigKey::DefaultUserId => &self.user_id,
            ConfigKey::DefaultAgentId => &self.agent_id,
            ConfigKey::DefaultObjective => &self.objective,
        }
    }

    fn slot(&mut self, key: ConfigKey) -> &mut String {
        match key {
            ConfigKey::AiBaseUrl => &mut self.ai_base_url,
            ConfigKey::LocalAgentUrl => &mut self.agent_base_url,
            ConfigKey::DefaultTargets => &mut self.default_targets_csv,
            ConfigKey::DefaultPolicyId => &mut self.policy_id,
            ConfigKey::DefaultTenantId => &mut self.tenant_id,
            ConfigKey::DefaultUserId => &mut self.user_id,
            ConfigKey::DefaultAgentId => &mut self.agent_id,
            ConfigKey::DefaultObjective => &mut self.objective,
        }
    }

    /// Default targets as a list
    pub fn targets(&self) -> Vec<String> {
        split_csv(&self.default_targets_csv)
    }

    /// Copy of `self` with blank required fields taken from `fallback`
    ///
    /// Used when reading a stored record written by an older or hand-edited
    /// client; the targets list may legitimately stay empty.
    pub fn filled_from(&self, fallback: &ResolvedConfig) -> ResolvedConfig {
        let mut next = self.clone();
        for key in ConfigKey::ALL {
            let slot = next.slot(key);
            if key.is_csv() {
                *slot = normalize_csv(slot);
            } else if slot.trim().is_empty() {
                *slot = fallback.get(key).to_string();
            }
        }
        next
    }
}

/// Hardcoded tier of the resolver
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HardcodedDefaults(pub ResolvedConfig);

impl Default for HardcodedDefaults {
    fn default() -> Self {
        Self(ResolvedConfig {
            ai_base_url: "http://127.0.0.1:8088".to_string(),
            agent_base_url: "http://127.0.0.1:8787".to_string(),
            default_targets_csv: String::new(),
            policy_id: "lab-default".to_string(),
            tenant_id: "lab".to_string(),
            user_id: "student".to_string(),
            agent_id: "redteam-ai-assist".to_string(),
            objective: DEFAULT_OBJECTIVE.to_string(),
        })
    }
}

/// The three tiers, kept together so the store can re-resolve on reset
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Runtime-injected overrides
    pub runtime: ConfigLayer,
    /// Build-time overrides
    pub build: ConfigLayer,
    /// Hardcoded fallback values
    pub defaults: HardcodedDefaults,
}

impl ConfigSources {
    /// Sources for a running binary: runtime file, compile-time env, defaults
    pub fn discover(runtime_path: Option<&Path>) -> Self {
        Self {
            runtime: ConfigLayer::load_or_empty(runtime_path),
            build: ConfigLayer::from_build_env(),
            defaults: HardcodedDefaults::default(),
        }
    }

    /// Resolve the three tiers into a configuration
    pub fn resolve(&self) -> ResolvedConfig {
        resolve(&self.runtime, &self.build, &self.defaults)
    }
}

/// Resolve configuration from the runtime, build-time and hardcoded tiers
///
/// # Examples
///
/// ```
/// use rtai::config::{resolve, ConfigKey, ConfigLayer, HardcodedDefaults};
///
/// let runtime = ConfigLayer::new().with(ConfigKey::AiBaseUrl, "$AI_BASE_URL");
/// let build = ConfigLayer::new().with(ConfigKey::AiBaseUrl, "http://ai.lab:8088");
/// let config = resolve(&runtime, &build, &HardcodedDefaults::default());
/// assert_eq!(config.ai_base_url, "http://ai.lab:8088");
/// ```
pub fn resolve(
    runtime: &ConfigLayer,
    build: &ConfigLayer,
    defaults: &HardcodedDefaults,
) -> ResolvedConfig {
    let mut resolved = defaults.0.clone();
    for key in ConfigKey::ALL {
        let picked = pick(key, runtime, build, defaults.0.get(key));
        *resolved.slot(key) = if key.is_csv() {
            normalize_csv(&picked)
        } else {
            picked
        };
    }
    resolved
}

fn pick(key: ConfigKey, runtime: &ConfigLayer, build: &ConfigLayer, fallback: &str) -> String {
    if let Some(value) = runtime.get(key).map(str::trim) {
        if key.is_placeholder(value) {
            tracing::warn!(
                key = key.name(),
                "Runtime config holds an unexpanded template token, ignoring it"
            );
        } else if !value.is_empty() {
            return value.to_string();
        }
    }

    if let Some(value) = build.get(key).map(str::trim) {
        if !value.is_empty() {
            return value.to_string();
        }
    }

    fallback.to_string()
}

/// Split a CSV string into trimmed, non-empty entries
///
/// # Examples
///
/// ```
/// use rtai::config::split_csv;
///
/// assert_eq!(split_csv(" a, ,b ,,c,"), vec!["a", "b", "c"]);
/// assert!(split_csv("").is_empty());
/// ```
pub fn split_csv(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Canonical `a,b,c` form of a CSV string
pub fn normalize_csv(csv: &str) -> String {
    split_csv(csv).join(",")
}

/// Draft edits saved over the current configuration
///
/// Only the fields that are `Some` are written.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfigPatch {
    /// New advisory server base URL
    pub ai_base_url: Option<String>,
    /// New execution agent base URL
    pub agent_base_url: Option<String>,
    /// New default targets CSV
    pub default_targets_csv: Option<String>,
    /// New policy identifier
    pub policy_id: Option<String>,
    /// New tenant identifier
    pub tenant_id: Option<String>,
    /// New user identifier
    pub user_id: Option<String>,
    /// New agent identifier
    pub agent_id: Option<String>,
    /// New objective
    pub objective: Option<String>,
}

impl ConfigPatch {
    fn entries(&self) -> [(ConfigKey, Option<&String>); 8] {
        [
            (ConfigKey::AiBaseUrl, self.ai_base_url.as_ref()),
            (ConfigKey::LocalAgentUrl, self.agent_base_url.as_ref()),
            (ConfigKey::DefaultTargets, self.default_targets_csv.as_ref()),
            (ConfigKey::DefaultPolicyId, self.policy_id.as_ref()),
            (ConfigKey::DefaultTenantId, self.tenant_id.as_ref()),
            (ConfigKey::DefaultUserId, self.user_id.as_ref()),
            (ConfigKey::DefaultAgentId, self.agent_id.as_ref()),
            (ConfigKey::DefaultObjective, self.objective.as_ref()),
        ]
    }

    /// Whether the patch changes nothing
    pub fn is_empty(&self) -> bool {
        self.entries().iter().all(|(_, v)| v.is_none())
    }

    /// Set a field by key
    pub fn set(&mut self, key: ConfigKey, value: impl Into<String>) {
        let value = Some(value.into());
        match key {
            ConfigKey::AiBaseUrl => self.ai_base_url = value,
            ConfigKey::LocalAgentUrl => self.agent_base_url = value,
            ConfigKey::DefaultTargets => self.default_targets_csv = value,
            ConfigKey::DefaultPolicyId => self.policy_id = value,
            ConfigKey::DefaultTenantId => self.tenant_id = value,
            ConfigKey::DefaultUserId => self.user_id = value,
            ConfigKey::DefaultAgentId => self.agent_id = value,
            ConfigKey::DefaultObjective => self.objective = value,
        }
    }

    /// Reject blank values for fields that must never be empty
    ///
    /// # Errors
    ///
    /// Returns `RtaiError::Validation` naming the first blank field.
    pub fn validate(&self) -> Result<()> {
        for (key, value) in self.entries() {
            if let Some(value) = value {
                if !key.is_csv() && value.trim().is_empty() {
                    return Err(RtaiError::Validation(format!(
                        "{} cannot be empty",
                        key.name()
                    ))
                    .into());
                }
            }
        }
        Ok(())
    }

    /// Return `base` with every present field overwritten
    pub fn apply_to(&self, base: &ResolvedConfig) -> ResolvedConfig {
        let mut next = base.clone();
        for (key, value) in self.entries() {
            if let Some(value) = value {
                *next.slot(key) = if key.is_csv() {
                    normalize_csv(value)
                } else {
                    value.trim().to_string()
                };
            }
        }
        next
    }
}
