//! Operations behind the CLI subcommands and the console
//!
//! Each operation validates its input locally, calls one facade and writes
//! the outcome into the store concern it belongs to (session, suggest or
//! agent). Failures are recorded there and returned as well, so callers can
//! render them without reading the store back.
//!
//! Facades are built from the store's configuration on every call; a saved
//! config change applies to the very next operation.

use crate::clients::types::{
    ActivityEvent, EventIngestRequest, EventType, EventsReply, IngestHistoryRequest, MemoryMode,
    PhaseName, RagFocus, ReconRequest, RunRequest, SessionRecord, SessionStartRequest,
    SessionSummary, SuggestRequest,
};
use crate::clients::{AdvisoryClient, AgentClient, ClientTimeouts};
use crate::error::{describe, Result, RtaiError};
use crate::health::HealthMonitor;
use crate::http::Gateway;
use crate::state::{AppStore, HealthProbeResult, LocalNote};
use serde_json::{json, Value};
use std::ops::RangeInclusive;
use std::sync::Arc;

/// Accepted `history_window` values
pub const HISTORY_WINDOW_RANGE: RangeInclusive<u32> = 1..=120;

/// `history_window` used when the operator gives none
pub const DEFAULT_HISTORY_WINDOW: u32 = 12;

/// Page size of the session list
pub const SESSION_LIST_LIMIT: u32 = 100;

/// `source` tag on notes posted from this client
pub const NOTE_SOURCE: &str = "rtai";

const MISSING_SESSION: &str = "Missing session id. Create or load a session first.";

/// Store concern an operation reports into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Concern {
    Session,
    Suggest,
    Agent,
}

/// Knobs of a suggestion request
#[derive(Debug, Clone, PartialEq)]
pub struct SuggestOptions {
    /// Optional operator question; blank is omitted
    pub user_message: Option<String>,
    /// History mode
    pub memory_mode: MemoryMode,
    /// Number of recent events considered, 1..=120
    pub history_window: u32,
    /// Force a phase
    pub phase_override: Option<PhaseName>,
    /// Keep the forced phase on the session
    pub persist_phase_override: bool,
    /// Retrieval focus
    pub rag_focus: RagFocus,
}

impl Default for SuggestOptions {
    fn default() -> Self {
        Self {
            user_message: None,
            memory_mode: MemoryMode::default(),
            history_window: DEFAULT_HISTORY_WINDOW,
            phase_override: None,
            persist_phase_override: false,
            rag_focus: RagFocus::default(),
        }
    }
}

impl SuggestOptions {
    /// Options of a report-template request
    pub fn report(user_message: Option<String>) -> Self {
        Self {
            user_message,
            rag_focus: RagFocus::Report,
            ..Default::default()
        }
    }

    /// Validated request body
    ///
    /// # Errors
    ///
    /// Returns `RtaiError::Validation` if `history_window` is out of range.
    pub fn to_request(&self) -> Result<SuggestRequest> {
        if !HISTORY_WINDOW_RANGE.contains(&self.history_window) {
            return Err(RtaiError::Validation(format!(
                "history_window must be between {} and {}, got {}",
                HISTORY_WINDOW_RANGE.start(),
                HISTORY_WINDOW_RANGE.end(),
                self.history_window
            ))
            .into());
        }
        let user_message = self
            .user_message
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string);
        Ok(SuggestRequest {
            user_message,
            memory_mode: self.memory_mode,
            history_window: self.history_window,
            phase_override: self.phase_override,
            persist_phase_override: Some(self.persist_phase_override),
            rag_focus: Some(self.rag_focus),
        })
    }
}

/// Knobs of an auto-recon run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconOptions {
    /// Hosts to scan; the configured default targets when `None`
    pub targets: Option<Vec<String>>,
    /// Run nmap
    pub enable_nmap: bool,
    /// Scan every port; ignored unless nmap is enabled
    pub full_port: bool,
    /// Single pass
    pub once: bool,
    /// Verbose agent output
    pub verbose: bool,
}

impl Default for ReconOptions {
    fn default() -> Self {
        Self {
            targets: None,
            enable_nmap: false,
            full_port: false,
            once: true,
            verbose: true,
        }
    }
}

/// Knobs of a history-ingestion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestOptions {
    /// History files; the agent's defaults when empty
    pub history_files: Vec<String>,
    /// Single pass
    pub once: bool,
    /// Verbose agent output
    pub verbose: bool,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            history_files: Vec::new(),
            once: true,
            verbose: true,
        }
    }
}

/// Split text into trimmed, non-empty lines
pub fn split_lines(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

/// Operations bound to one store
#[derive(Clone)]
pub struct Operations {
    store: Arc<AppStore>,
    gateway: Gateway,
    timeouts: ClientTimeouts,
    monitor: HealthMonitor,
}

impl Operations {
    /// Bind operations to `store`
    pub fn new(store: Arc<AppStore>, gateway: Gateway, timeouts: ClientTimeouts) -> Self {
        let monitor = HealthMonitor::new(store.clone(), gateway.clone(), timeouts);
        Self {
            store,
            gateway,
            timeouts,
            monitor,
        }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<AppStore> {
        &self.store
    }

    /// Advisory facade for the current configuration
    pub fn advisory(&self) -> AdvisoryClient {
        AdvisoryClient::new(
            &self.store.config().ai_base_url,
            self.gateway.clone(),
            self.timeouts,
        )
    }

    /// Agent facade for the current configuration
    pub fn agent(&self) -> AgentClient {
        AgentClient::new(
            &self.store.config().agent_base_url,
            self.gateway.clone(),
            self.timeouts,
        )
    }

    fn track<T>(&self, concern: Concern, outcome: Result<T>) -> Result<T> {
        if let Err(e) = &outcome {
            let message = describe(e);
            tracing::warn!(?concern, "Operation failed: {}", message);
            match concern {
                Concern::Session => self.store.set_session_error(message),
                Concern::Suggest => self.store.set_suggest_error(message),
                Concern::Agent => self.store.set_agent_error(message),
            }
        }
        outcome
    }

    fn require_session(&self, concern: Concern) -> Result<String> {
        let id = self.store.session_id();
        if id.trim().is_empty() {
            return self.track(concern, Err(RtaiError::Validation(MISSING_SESSION.into()).into()));
        }
        Ok(id)
    }

    /// Probe the advisory server
    pub async fn test_advisory(&self) -> HealthProbeResult {
        self.monitor.probe_advisory().await
    }

    /// Probe the execution agent
    pub async fn test_agent(&self) -> HealthProbeResult {
        self.monitor.probe_agent().await
    }

    /// Probe both endpoints concurrently
    pub async fn probe_all(&self) -> (HealthProbeResult, HealthProbeResult) {
        self.monitor.probe_all().await
    }

    /// Start a session from the configured identity and scope
    pub async fn create_session(&self) -> Result<SessionRecord> {
        let config = self.store.config();
        let request = SessionStartRequest {
            tenant_id: config.tenant_id.clone(),
            user_id: config.user_id.clone(),
            agent_id: config.agent_id.clone(),
            objective: config.objective.clone(),
            target_scope: config.targets(),
            policy_id: config.policy_id.clone(),
        };
        let outcome = self.advisory().create_session(&request).await;
        let record = self.track(Concern::Session, outcome)?;
        self.track(Concern::Session, self.store.set_session_id(&record.session_id))?;
        self.store.set_session_snapshot(record.clone());
        tracing::info!(session_id = %record.session_id, "Session created");
        Ok(record)
    }

    /// Fetch a session and make it the active one
    pub async fn load_session(&self, session_id: &str) -> Result<SessionRecord> {
        let session_id = session_id.trim();
        if session_id.is_empty() {
            return self.track(
                Concern::Session,
                Err(RtaiError::Validation("Session id cannot be empty".into()).into()),
            );
        }
        let outcome = self.advisory().get_session(session_id).await;
        let record = self.track(Concern::Session, outcome)?;
        self.track(Concern::Session, self.store.set_session_id(session_id))?;
        self.store.set_session_snapshot(record.clone());
        Ok(record)
    }

    /// Re-fetch the active session
    pub async fn refresh_session(&self) -> Result<SessionRecord> {
        let session_id = self.require_session(Concern::Session)?;
        let outcome = self.advisory().get_session(&session_id).await;
        let record = self.track(Concern::Session, outcome)?;
        self.store.set_session_snapshot(record.clone());
        Ok(record)
    }

    /// Sessions of the configured tenant and user
    pub async fn list_sessions(&self, limit: u32) -> Result<Vec<SessionSummary>> {
        let config = self.store.config();
        let outcome = self
            .advisory()
            .list_sessions(&config.tenant_id, &config.user_id, limit)
            .await;
        self.track(Concern::Session, outcome)
    }

    /// Delete the active session remotely, then forget it locally
    pub async fn delete_session(&self) -> Result<String> {
        let session_id = self.require_session(Concern::Session)?;
        let outcome = self.advisory().delete_session(&session_id).await;
        self.track(Concern::Session, outcome)?;
        self.track(Concern::Session, self.store.session_deleted())?;
        Ok(session_id)
    }

    /// Keep a local note and post it to the session as a `note` event
    ///
    /// The local note is kept even when the remote post fails.
    pub async fn add_note(&self, text: &str) -> Result<(LocalNote, EventsReply)> {
        let session_id = self.require_session(Concern::Session)?;
        let note = self.track(Concern::Session, self.store.add_local_note(text))?;
        let event = ActivityEvent::new(
            EventType::Note,
            json!({"note": note.text, "source": NOTE_SOURCE}),
        );
        let reply = self.ingest(&session_id, vec![event]).await?;
        Ok((note, reply))
    }

    /// Post telemetry events to the active session
    pub async fn post_events(&self, events: Vec<ActivityEvent>) -> Result<EventsReply> {
        let session_id = self.require_session(Concern::Session)?;
        if events.is_empty() {
            return self.track(
                Concern::Session,
                Err(RtaiError::Validation("No events to send".into()).into()),
            );
        }
        self.ingest(&session_id, events).await
    }

    async fn ingest(&self, session_id: &str, events: Vec<ActivityEvent>) -> Result<EventsReply> {
        let request = EventIngestRequest { events };
        let outcome = self.advisory().add_events(session_id, &request).await;
        let reply = self.track(Concern::Session, outcome)?;
        // Only a full record replaces the snapshot; acks leave it as is.
        if let EventsReply::Session(record) = &reply {
            self.store.set_session_snapshot(record.as_ref().clone());
        }
        Ok(reply)
    }

    /// Ask the advisory server for the next actions
    pub async fn suggest(&self, options: &SuggestOptions) -> Result<Value> {
        let session_id = self.require_session(Concern::Suggest)?;
        let request = self.track(Concern::Suggest, options.to_request())?;
        let outcome = self.advisory().suggest(&session_id, &request).await;
        let response = self.track(Concern::Suggest, outcome)?;
        self.store.set_suggest_result(response.clone());
        Ok(response)
    }

    /// Ask for a report template (`rag_focus=report`)
    pub async fn report_template(&self, user_message: Option<String>) -> Result<Value> {
        self.suggest(&SuggestOptions::report(user_message)).await
    }

    /// Have the agent scan targets and report into the active session
    pub async fn auto_recon(&self, options: &ReconOptions) -> Result<Value> {
        let session_id = self.require_session(Concern::Agent)?;
        let config = self.store.config();
        let request = ReconRequest {
            session_id,
            base_url: config.ai_base_url.clone(),
            targets: options.targets.clone().unwrap_or_else(|| config.targets()),
            enable_nmap: options.enable_nmap,
            full_port: options.enable_nmap && options.full_port,
            once: options.once,
            verbose: options.verbose,
        };
        let outcome = self.agent().auto_recon(&request).await;
        self.record_agent(outcome)
    }

    /// Have the agent ingest shell history into the active session
    pub async fn ingest_history(&self, options: &IngestOptions) -> Result<Value> {
        let session_id = self.require_session(Concern::Agent)?;
        let files: Vec<String> = options
            .history_files
            .iter()
            .map(|f| f.trim())
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect();
        let request = IngestHistoryRequest {
            session_id,
            base_url: self.store.config().ai_base_url,
            history_files: if files.is_empty() { None } else { Some(files) },
            once: options.once,
            verbose: options.verbose,
        };
        let outcome = self.agent().ingest_history(&request).await;
        self.record_agent(outcome)
    }

    /// Run one shell command on the agent host
    pub async fn run_command(&self, command: &str, timeout_secs: Option<u64>) -> Result<Value> {
        let command = command.trim();
        if command.is_empty() {
            return self.track(
                Concern::Agent,
                Err(RtaiError::Validation("Command cannot be empty".into()).into()),
            );
        }
        let request = RunRequest {
            command: command.to_string(),
            timeout: timeout_secs,
        };
        let outcome = self.agent().run(&request).await;
        self.record_agent(outcome)
    }

    fn record_agent(&self, outcome: Result<Value>) -> Result<Value> {
        let response = self.track(Concern::Agent, outcome)?;
        self.store.set_agent_result(response.clone());
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigSources;

    fn ops() -> Operations {
        let store = Arc::new(AppStore::in_memory(ConfigSources::default()));
        Operations::new(store, Gateway::new().unwrap(), ClientTimeouts::default())
    }

    #[test]
    fn test_suggest_options_trim_and_omit_blank_message() {
        let options = SuggestOptions {
            user_message: Some("   ".to_string()),
            ..Default::default()
        };
        let request = options.to_request().unwrap();
        assert!(request.user_message.is_none());
        assert_eq!(request.history_window, 12);
        assert_eq!(request.memory_mode, MemoryMode::Window);

        let options = SuggestOptions {
            user_message: Some("  what next? ".to_string()),
            ..Default::default()
        };
        assert_eq!(
            options.to_request().unwrap().user_message.as_deref(),
            Some("what next?")
        );
    }

    #[test]
    fn test_history_window_bounds() {
        for (window, ok) in [(0, false), (1, true), (120, true), (121, false)] {
            let options = SuggestOptions {
                history_window: window,
                ..Default::default()
            };
            assert_eq!(options.to_request().is_ok(), ok, "window = {}", window);
        }
    }

    #[test]
    fn test_report_options() {
        let request = SuggestOptions::report(None).to_request().unwrap();
        assert_eq!(request.rag_focus, Some(RagFocus::Report));
    }

    #[test]
    fn test_split_lines() {
        assert_eq!(
            split_lines("/home/kali/.zsh_history\r\n\n  /home/kali/.bash_history  \n"),
            vec!["/home/kali/.zsh_history", "/home/kali/.bash_history"]
        );
    }

    #[tokio::test]
    async fn test_session_operations_require_session_id() {
        let ops = ops();
        let err = ops.suggest(&SuggestOptions::default()).await.unwrap_err();
        assert!(err.downcast_ref::<RtaiError>().unwrap().is_validation());
        assert_eq!(ops.store().suggest().error.as_deref(), Some(MISSING_SESSION));

        assert!(ops.refresh_session().await.is_err());
        assert!(ops.delete_session().await.is_err());
        assert!(ops.add_note("hello").await.is_err());
        assert!(ops.auto_recon(&ReconOptions::default()).await.is_err());
        assert!(ops.ingest_history(&IngestOptions::default()).await.is_err());
        assert!(ops.store().local_notes().is_empty());
        assert_eq!(ops.store().agent().error.as_deref(), Some(MISSING_SESSION));
    }

    #[tokio::test]
    async fn test_blank_inputs_are_rejected_locally() {
        let ops = ops();
        assert!(ops.load_session("  ").await.is_err());
        assert!(ops.run_command("   ", None).await.is_err());
        ops.store().set_session_id("s-1").unwrap();
        assert!(ops.add_note("  ").await.is_err());
        assert!(ops.post_events(Vec::new()).await.is_err());
        let options = SuggestOptions {
            history_window: 500,
            ..Default::default()
        };
        assert!(ops.suggest(&options).await.is_err());
        assert!(ops.store().suggest().response.is_none());
    }

    #[tokio::test]
    async fn test_failed_durable_write_is_recorded_in_session_concern() {
        use crate::state::storage::MockStateStorage;
        use wiremock::matchers::{method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/sessions/s-9"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"session_id": "s-9"})))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/v1/sessions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"session_id": "s-10"})))
            .mount(&server)
            .await;

        let mut storage = MockStateStorage::new();
        storage.expect_load().returning(|| Ok(None));
        storage
            .expect_save()
            .returning(|_| Err(RtaiError::Storage("disk full".to_string()).into()));

        let sources = ConfigSources {
            runtime: crate::config::ConfigLayer::new()
                .with(crate::config::ConfigKey::AiBaseUrl, server.uri()),
            ..Default::default()
        };
        let store = Arc::new(AppStore::new(sources, Arc::new(storage)));
        let ops = Operations::new(store, Gateway::new().unwrap(), ClientTimeouts::default());

        assert!(ops.load_session("s-9").await.is_err());
        let error = ops.store().session().error.unwrap();
        assert!(error.contains("disk full"), "error = {}", error);
        assert!(ops.store().session_id().is_empty());

        ops.store().set_session_error("stale");
        assert!(ops.create_session().await.is_err());
        assert!(ops.store().session().error.unwrap().contains("disk full"));
    }
}
