//! Wire types for the advisory server and execution agent
//!
//! Request bodies are typed strictly. Response records are typed leniently:
//! every field the server may omit is optional or defaulted, and unknown
//! fields are kept in `extra` so a session snapshot never loses data the
//! server embedded.

use crate::error::{Result, RtaiError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

macro_rules! wire_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $text)]
                #[allow(missing_docs)]
                $variant,
            )+
        }

        impl $name {
            /// Every accepted value
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            /// Wire representation
            pub fn as_str(self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = anyhow::Error;

            fn from_str(s: &str) -> Result<Self> {
                let wanted = s.trim().to_lowercase();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|v| v.as_str() == wanted)
                    .ok_or_else(|| {
                        let allowed: Vec<&str> = $name::ALL.iter().map(|v| v.as_str()).collect();
                        RtaiError::Validation(format!(
                            "Invalid {}: {}. Must be one of: {}",
                            stringify!($name),
                            s,
                            allowed.join(", ")
                        ))
                        .into()
                    })
            }
        }
    };
}

wire_enum!(
    /// Telemetry event category
    EventType {
        Command => "command",
        Http => "http",
        Scan => "scan",
        Note => "note",
        System => "system",
    }
);

wire_enum!(
    /// Exercise phase tracked by the advisory server
    PhaseName {
        Recon => "recon",
        Enumeration => "enumeration",
        Hypothesis => "hypothesis",
        Attempt => "attempt",
        PostCheck => "post_check",
        Report => "report",
    }
);

wire_enum!(
    /// How much session history the advisory server feeds the model
    MemoryMode {
        Summary => "summary",
        Window => "window",
        Full => "full",
    }
);

wire_enum!(
    /// Retrieval context the advisory server should favour
    RagFocus {
        Auto => "auto",
        Recon => "recon",
        Report => "report",
    }
);

impl Default for MemoryMode {
    fn default() -> Self {
        MemoryMode::Window
    }
}

impl Default for RagFocus {
    fn default() -> Self {
        RagFocus::Auto
    }
}

/// One telemetry event, as sent and as echoed back inside a session record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Server-assigned identifier
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub event_id: Option<String>,
    /// Event category; kept as text so unknown categories survive decoding
    #[serde(default)]
    pub event_type: String,
    /// ISO timestamp
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
    /// Free-form payload
    #[serde(default)]
    pub payload: Value,
}

impl ActivityEvent {
    /// New outgoing event without id or timestamp
    pub fn new(event_type: EventType, payload: Value) -> Self {
        Self {
            event_id: None,
            event_type: event_type.as_str().to_string(),
            timestamp: None,
            payload,
        }
    }

    /// Short human title derived from the payload
    pub fn title(&self) -> Option<String> {
        let field = |key: &str| self.payload.get(key).and_then(Value::as_str);
        match self.event_type.as_str() {
            "command" => field("command").map(str::to_string),
            "http" => field("url").map(|url| {
                format!("{} {}", field("method").unwrap_or("GET"), url)
            }),
            "note" => field("note").or_else(|| field("text")).map(str::to_string),
            _ => None,
        }
    }
}

/// `POST /v1/sessions` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionStartRequest {
    /// Tenant identifier
    pub tenant_id: String,
    /// User identifier
    pub user_id: String,
    /// Agent identifier
    pub agent_id: String,
    /// Exercise objective
    pub objective: String,
    /// In-scope targets
    pub target_scope: Vec<String>,
    /// Policy identifier
    pub policy_id: String,
}

/// `POST /v1/sessions/{id}/events` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventIngestRequest {
    /// Events to append
    pub events: Vec<ActivityEvent>,
}

/// `POST /v1/sessions/{id}/suggest` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SuggestRequest {
    /// Optional operator question
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
    /// History mode
    pub memory_mode: MemoryMode,
    /// Number of recent events considered
    pub history_window: u32,
    /// Force a phase for this suggestion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase_override: Option<PhaseName>,
    /// Keep the override on the session
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persist_phase_override: Option<bool>,
    /// Retrieval focus
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rag_focus: Option<RagFocus>,
}

/// Suggestion cached on the session by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedSuggest {
    /// Cache key computed by the server
    #[serde(default)]
    pub fingerprint: Option<String>,
    /// Cached suggestion payload
    #[serde(default)]
    pub payload: Value,
    /// Cache time
    #[serde(default)]
    pub created_at: Option<String>,
}

/// Full session record returned by create/get and usually by event ingestion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Opaque session token
    pub session_id: String,
    #[serde(default)]
    #[allow(missing_docs)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    #[allow(missing_docs)]
    pub user_id: Option<String>,
    #[serde(default)]
    #[allow(missing_docs)]
    pub agent_id: Option<String>,
    #[serde(default)]
    #[allow(missing_docs)]
    pub objective: Option<String>,
    /// In-scope targets
    #[serde(default)]
    pub target_scope: Vec<String>,
    #[serde(default)]
    #[allow(missing_docs)]
    pub policy_id: Option<String>,
    #[serde(default)]
    #[allow(missing_docs)]
    pub created_at: Option<String>,
    #[serde(default)]
    #[allow(missing_docs)]
    pub updated_at: Option<String>,
    /// Phase the server believes the exercise is in
    #[serde(default)]
    pub current_phase: Option<String>,
    /// Event timeline, when the server embeds it
    #[serde(default)]
    pub events: Vec<ActivityEvent>,
    /// Server-side notes
    #[serde(default)]
    pub notes: Vec<Value>,
    /// Reasoning from the last suggestion
    #[serde(default)]
    pub last_reasoning: Option<String>,
    /// Last cached suggestion
    #[serde(default)]
    pub cached_suggest: Option<CachedSuggest>,
    /// Any other fields the server sent
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionRecord {
    /// Events sorted newest first; events without a parsable timestamp sink
    pub fn timeline(&self, filter: Option<EventType>) -> Vec<&ActivityEvent> {
        let mut events: Vec<&ActivityEvent> = self
            .events
            .iter()
            .filter(|e| filter.map_or(true, |f| e.event_type == f.as_str()))
            .collect();
        events.sort_by_key(|e| std::cmp::Reverse(event_millis(e)));
        events
    }
}

fn event_millis(event: &ActivityEvent) -> i64 {
    event
        .timestamp
        .as_deref()
        .and_then(parse_timestamp)
        .map(|t| t.timestamp_millis())
        .unwrap_or(0)
}

/// Parse an RFC 3339 or naive ISO timestamp (assumed UTC)
pub fn parse_timestamp(raw: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    if let Ok(t) = chrono::DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&chrono::Utc));
    }
    chrono::NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|n| n.and_utc())
}

/// Row of `GET /v1/sessions`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    /// Opaque session token
    pub session_id: String,
    #[serde(default)]
    #[allow(missing_docs)]
    pub tenant_id: Option<String>,
    #[serde(default)]
    #[allow(missing_docs)]
    pub user_id: Option<String>,
    #[serde(default)]
    #[allow(missing_docs)]
    pub agent_id: Option<String>,
    #[serde(default)]
    #[allow(missing_docs)]
    pub current_phase: Option<String>,
    #[serde(default)]
    #[allow(missing_docs)]
    pub updated_at: Option<String>,
}

/// Reply to event ingestion: a full record on most deployments, `{ok}` on others
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventsReply {
    /// Updated session record
    Session(Box<SessionRecord>),
    /// Bare acknowledgement
    Ack {
        /// Acknowledgement flag
        #[serde(default)]
        ok: Option<bool>,
    },
    /// Anything else (raw text, lists)
    Other(Value),
}

/// `GET /health` reply of either backend
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthStatus {
    /// Reported status
    #[serde(default)]
    pub status: Option<String>,
    /// Deployment environment (advisory server only)
    #[serde(default)]
    pub app_env: Option<String>,
}

impl HealthStatus {
    /// `status=ok · env=dev` summary
    pub fn summary(&self) -> String {
        let mut text = format!("status={}", self.status.as_deref().unwrap_or("unknown"));
        if let Some(env) = self.app_env.as_deref().filter(|e| !e.is_empty()) {
            text.push_str(&format!(" · env={}", env));
        }
        text
    }
}

/// `POST /auto-recon` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReconRequest {
    /// Session the agent reports telemetry into
    pub session_id: String,
    /// Advisory server base URL the agent posts to
    pub base_url: String,
    /// Hosts to scan
    pub targets: Vec<String>,
    /// Run nmap
    pub enable_nmap: bool,
    /// Scan every port
    pub full_port: bool,
    /// Single pass instead of polling
    pub once: bool,
    /// Verbose agent output
    pub verbose: bool,
}

/// `POST /ingest-history` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestHistoryRequest {
    /// Session the agent reports telemetry into
    pub session_id: String,
    /// Advisory server base URL the agent posts to
    pub base_url: String,
    /// Shell history files; the agent picks its defaults when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history_files: Option<Vec<String>>,
    /// Single pass instead of polling
    pub once: bool,
    /// Verbose agent output
    pub verbose: bool,
}

/// `POST /run` body
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRequest {
    /// Shell command to execute on the agent host
    pub command: String,
    /// Agent-side timeout in seconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}
