//! Application state store
//!
//! [`AppStore`] is the single source of truth for configuration, session
//! identity and the outcome of the last network call of each concern
//! (session, suggest, agent, health). Nothing else caches these values.
//!
//! Only the config, the session id and the local notes survive a restart.
//! They are written through the [`StateStorage`] port as one JSON record
//! before the in-memory state changes, so a failed write leaves both sides
//! as they were. Everything else lives for the process lifetime.
//!
//! Every change bumps a revision counter that views can watch through
//! [`AppStore::subscribe`].

pub mod storage;

pub use storage::{MemoryStorage, SledStorage, StateStorage, STATE_KEY};

use crate::clients::types::SessionRecord;
use crate::config::{ConfigPatch, ConfigSources, ResolvedConfig};
use crate::error::{Result, RtaiError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::watch;

/// Schema tag of the durable record
pub const SCHEMA: &str = STATE_KEY;

/// Operator note kept on this machine only
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalNote {
    /// ULID
    pub id: String,
    /// RFC 3339 creation time
    pub created_at: String,
    /// Note text
    pub text: String,
}

impl LocalNote {
    fn new(text: &str) -> Self {
        Self {
            id: ulid::Ulid::new().to_string(),
            created_at: Utc::now().to_rfc3339(),
            text: text.to_string(),
        }
    }
}

/// The durable record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedSlice {
    /// Always [`SCHEMA`]; anything else is discarded on load
    #[serde(default)]
    pub schema: String,
    /// Current configuration
    pub config: ResolvedConfig,
    /// Active session id, empty when none
    #[serde(default)]
    pub session_id: String,
    /// Local notes, newest first
    #[serde(default)]
    pub local_notes: Vec<LocalNote>,
}

impl PersistedSlice {
    fn fresh(config: ResolvedConfig) -> Self {
        Self {
            schema: SCHEMA.to_string(),
            config,
            session_id: String::new(),
            local_notes: Vec::new(),
        }
    }
}

/// Outcome of a reachability probe
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProbeStatus {
    /// Not probed yet
    #[default]
    Unknown,
    /// Reachable and healthy
    Ok,
    /// Probe failed
    Error,
}

/// Last probe of one endpoint
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HealthProbeResult {
    /// Probe outcome
    pub status: ProbeStatus,
    /// Health summary or error text
    pub message: Option<String>,
    /// When the probe finished
    pub checked_at: Option<DateTime<Utc>>,
}

impl HealthProbeResult {
    /// Successful probe finishing now
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Ok,
            message: Some(message.into()),
            checked_at: Some(Utc::now()),
        }
    }

    /// Failed probe finishing now
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Error,
            message: Some(message.into()),
            checked_at: Some(Utc::now()),
        }
    }
}

/// The two remote endpoints
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    /// Advisory server
    Advisory,
    /// Execution agent
    Agent,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Advisory => write!(f, "AI server"),
            Endpoint::Agent => write!(f, "Local agent"),
        }
    }
}

/// Last response and last error of one call concern
///
/// A failure records the error but keeps the previous response; a success
/// replaces the response and clears the error.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LastResult {
    /// Last successful reply
    pub response: Option<Value>,
    /// When `response` arrived
    pub received_at: Option<DateTime<Utc>>,
    /// Error of the most recent failed call
    pub error: Option<String>,
}

impl LastResult {
    fn succeed(&mut self, response: Value) {
        self.response = Some(response);
        self.received_at = Some(Utc::now());
        self.error = None;
    }

    fn fail(&mut self, message: String) {
        self.error = Some(message);
    }
}

/// Last fetched session record and the session concern's error
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    /// Last fetched record, replaced wholesale
    pub snapshot: Option<SessionRecord>,
    /// Error of the most recent failed session call
    pub error: Option<String>,
}

/// Read-only copy of the whole store
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    /// Durable part
    pub persisted: PersistedSlice,
    /// Session concern
    pub session: SessionState,
    /// Suggest concern
    pub suggest: LastResult,
    /// Agent concern
    pub agent: LastResult,
    /// Advisory server probe
    pub advisory_health: HealthProbeResult,
    /// Execution agent probe
    pub agent_health: HealthProbeResult,
}

impl StateSnapshot {
    fn new(persisted: PersistedSlice) -> Self {
        Self {
            persisted,
            session: SessionState::default(),
            suggest: LastResult::default(),
            agent: LastResult::default(),
            advisory_health: HealthProbeResult::default(),
            agent_health: HealthProbeResult::default(),
        }
    }

    /// Probe result for `endpoint`
    pub fn health(&self, endpoint: Endpoint) -> &HealthProbeResult {
        match endpoint {
            Endpoint::Advisory => &self.advisory_health,
            Endpoint::Agent => &self.agent_health,
        }
    }
}

/// The application state store
pub struct AppStore {
    state: RwLock<StateSnapshot>,
    storage: Arc<dyn StateStorage>,
    sources: ConfigSources,
    revision: watch::Sender<u64>,
}

impl AppStore {
    /// Build the store, restoring the durable slice from `storage`
    ///
    /// A missing, unreadable, corrupt or foreign-schema record is replaced by
    /// freshly resolved defaults with no session and no notes. Never fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use rtai::config::ConfigSources;
    /// use rtai::state::{AppStore, MemoryStorage};
    /// use std::sync::Arc;
    ///
    /// let store = AppStore::new(ConfigSources::default(), Arc::new(MemoryStorage::new()));
    /// assert_eq!(store.config().ai_base_url, "http://127.0.0.1:8088");
    /// assert!(store.session_id().is_empty());
    /// ```
    pub fn new(sources: ConfigSources, storage: Arc<dyn StateStorage>) -> Self {
        let persisted = restore(&sources, storage.as_ref());
        let (revision, _) = watch::channel(0);
        Self {
            state: RwLock::new(StateSnapshot::new(persisted)),
            storage,
            sources,
            revision,
        }
    }

    /// Store backed by process memory only
    pub fn in_memory(sources: ConfigSources) -> Self {
        Self::new(sources, Arc::new(MemoryStorage::new()))
    }

    fn read(&self) -> RwLockReadGuard<'_, StateSnapshot> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StateSnapshot> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn bump(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    /// Apply a change to the durable slice: write storage first, then memory
    fn commit(
        &self,
        change: impl FnOnce(&mut PersistedSlice),
        transient: impl FnOnce(&mut StateSnapshot),
    ) -> Result<()> {
        {
            let mut state = self.write();
            let mut next = state.persisted.clone();
            change(&mut next);
            let record = serde_json::to_string(&next)
                .map_err(|e| RtaiError::Storage(format!("Serialization failed: {}", e)))?;
            self.storage.save(&record)?;
            state.persisted = next;
            transient(&mut *state);
        }
        self.bump();
        Ok(())
    }

    /// Change only in-memory state
    fn update(&self, change: impl FnOnce(&mut StateSnapshot)) {
        change(&mut *self.write());
        self.bump();
    }

    /// Receiver of the revision counter, bumped on every change
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.revision.subscribe()
    }

    /// Current revision
    pub fn revision(&self) -> u64 {
        *self.revision.borrow()
    }

    /// Copy of the whole store
    pub fn snapshot(&self) -> StateSnapshot {
        self.read().clone()
    }

    /// Current configuration
    pub fn config(&self) -> ResolvedConfig {
        self.read().persisted.config.clone()
    }

    /// Active session id, empty when none
    pub fn session_id(&self) -> String {
        self.read().persisted.session_id.clone()
    }

    /// Session concern
    pub fn session(&self) -> SessionState {
        self.read().session.clone()
    }

    /// Suggest concern
    pub fn suggest(&self) -> LastResult {
        self.read().suggest.clone()
    }

    /// Agent concern
    pub fn agent(&self) -> LastResult {
        self.read().agent.clone()
    }

    /// Local notes, newest first
    pub fn local_notes(&self) -> Vec<LocalNote> {
        self.read().persisted.local_notes.clone()
    }

    /// Probe result for `endpoint`
    pub fn health(&self, endpoint: Endpoint) -> HealthProbeResult {
        self.read().health(endpoint).clone()
    }

    /// Overwrite the configuration fields present in `patch`
    ///
    /// # Errors
    ///
    /// Returns `RtaiError::Validation` for a blank required field, or
    /// `RtaiError::Storage` if the record cannot be written.
    pub fn set_config_patch(&self, patch: &ConfigPatch) -> Result<ResolvedConfig> {
        patch.validate()?;
        let mut applied = None;
        self.commit(
            |slice| {
                slice.config = patch.apply_to(&slice.config);
                applied = Some(slice.config.clone());
            },
            |_| {},
        )?;
        tracing::info!("Configuration saved");
        Ok(applied.unwrap_or_else(|| self.config()))
    }

    /// Recompute every configuration field from the resolver tiers
    pub fn reset_config_to_runtime(&self) -> Result<ResolvedConfig> {
        let fresh = self.sources.resolve();
        let config = fresh.clone();
        self.commit(|slice| slice.config = config, |_| {})?;
        tracing::info!("Configuration reset to runtime defaults");
        Ok(fresh)
    }

    /// Make `id` the active session
    pub fn set_session_id(&self, id: &str) -> Result<()> {
        let id = id.trim().to_string();
        tracing::info!(session_id = %id, "Active session set");
        self.commit(|slice| slice.session_id = id, |_| {})
    }

    /// Forget the active session id; the snapshot is kept
    pub fn clear_session_id(&self) -> Result<()> {
        self.commit(|slice| slice.session_id.clear(), |_| {})
    }

    /// The active session was deleted remotely: drop id and snapshot together
    pub fn session_deleted(&self) -> Result<()> {
        tracing::info!("Active session deleted");
        self.commit(
            |slice| slice.session_id.clear(),
            |state| state.session = SessionState::default(),
        )
    }

    /// Replace the session snapshot and clear the session error
    pub fn set_session_snapshot(&self, record: SessionRecord) {
        self.update(|state| {
            state.session.snapshot = Some(record);
            state.session.error = None;
        });
    }

    /// Record a session error; the snapshot is kept
    pub fn set_session_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|state| state.session.error = Some(message));
    }

    /// Record a suggestion reply
    pub fn set_suggest_result(&self, response: Value) {
        self.update(|state| state.suggest.succeed(response));
    }

    /// Record a suggestion failure; the previous reply is kept
    pub fn set_suggest_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|state| state.suggest.fail(message));
    }

    /// Record an agent reply
    pub fn set_agent_result(&self, response: Value) {
        self.update(|state| state.agent.succeed(response));
    }

    /// Record an agent failure; the previous reply is kept
    pub fn set_agent_error(&self, message: impl Into<String>) {
        let message = message.into();
        self.update(|state| state.agent.fail(message));
    }

    /// Prepend a local note
    ///
    /// # Errors
    ///
    /// Returns `RtaiError::Validation` for blank text.
    pub fn add_local_note(&self, text: &str) -> Result<LocalNote> {
        let text = text.trim();
        if text.is_empty() {
            return Err(RtaiError::Validation("Note text cannot be empty".into()).into());
        }
        let note = LocalNote::new(text);
        let stored = note.clone();
        self.commit(|slice| slice.local_notes.insert(0, stored), |_| {})?;
        Ok(note)
    }

    /// Drop every local note
    pub fn clear_local_notes(&self) -> Result<()> {
        self.commit(|slice| slice.local_notes.clear(), |_| {})
    }

    /// Record a probe result
    pub fn set_health(&self, endpoint: Endpoint, result: HealthProbeResult) {
        self.update(|state| match endpoint {
            Endpoint::Advisory => state.advisory_health = result,
            Endpoint::Agent => state.agent_health = result,
        });
    }
}

fn restore(sources: &ConfigSources, storage: &dyn StateStorage) -> PersistedSlice {
    let fresh = sources.resolve();
    let raw = match storage.load() {
        Ok(Some(raw)) => raw,
        Ok(None) => return PersistedSlice::fresh(fresh),
        Err(e) => {
            tracing::warn!("Could not read stored state, using defaults: {}", e);
            return PersistedSlice::fresh(fresh);
        }
    };

    match serde_json::from_str::<PersistedSlice>(&raw) {
        Ok(slice) if slice.schema == SCHEMA => {
            tracing::debug!(
                session_id = %slice.session_id,
                notes = slice.local_notes.len(),
                "Restored stored state"
            );
            PersistedSlice {
                config: slice.config.filled_from(&fresh),
                ..slice
            }
        }
        Ok(slice) => {
            tracing::warn!(schema = %slice.schema, "Stored state has an unknown schema, using defaults");
            PersistedSlice::fresh(fresh)
        }
        Err(e) => {
            tracing::warn!("Stored state is corrupt, using defaults: {}", e);
            PersistedSlice::fresh(fresh)
        }
    }
}
