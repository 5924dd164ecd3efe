//! Best-effort view of suggestion responses
//!
//! The advisory server does not pin the suggestion schema, so display code
//! never reads the raw reply directly. [`normalize`] probes a fixed,
//! ordered list of key paths for every canonical field (including `data.*`
//! and `result.*` wrappers) and takes the first usable value.
//!
//! This is a compatibility shim, not a validator: it accepts any JSON value,
//! never fails, and leaves a field unset when no candidate matches. The
//! candidate table is exposed through [`FIELD_RULES`] so the policy can be
//! inspected and tested on its own.

use serde::Serialize;
use serde_json::Value;

/// A key path, outermost key first; the empty path is the root value
pub type KeyPath = &'static [&'static str];

/// Ordered candidate paths for one canonical field
#[derive(Debug, Clone, Copy)]
pub struct FieldRule {
    /// Canonical field name
    pub field: &'static str,
    /// Candidates, highest priority first
    pub paths: &'static [KeyPath],
}

const ACTIONS: FieldRule = FieldRule {
    field: "actions",
    paths: &[
        &["actions"],
        &["data", "actions"],
        &["result", "actions"],
        &["next_actions"],
        &["suggestions"],
        &["data", "suggestions"],
        &["result", "suggestions"],
        &["steps"],
    ],
};

const RATIONALE: FieldRule = FieldRule {
    field: "rationale",
    paths: &[
        &["reasoning"],
        &["rationale"],
        &["data", "reasoning"],
        &["data", "rationale"],
        &["result", "reasoning"],
        &["result", "rationale"],
        &["explanation"],
    ],
};

const DONE_CRITERIA: FieldRule = FieldRule {
    field: "done_criteria",
    paths: &[
        &["done_criteria"],
        &["doneCriteria"],
        &["data", "done_criteria"],
        &["data", "doneCriteria"],
        &["result", "done_criteria"],
        &["result", "doneCriteria"],
    ],
};

const REPORT_MARKDOWN: FieldRule = FieldRule {
    field: "report_markdown",
    paths: &[
        &["report_markdown"],
        &["reportMarkdown"],
        &["report"],
        &["report", "markdown"],
        &["markdown"],
        &["data", "report_markdown"],
        &["data", "reportMarkdown"],
        &["data", "report"],
        &["result", "report_markdown"],
        &["result", "reportMarkdown"],
        &["result", "report"],
        // A bare-text reply is the report itself
        &[],
    ],
};

const PHASE: FieldRule = FieldRule {
    field: "phase",
    paths: &[
        &["phase"],
        &["current_phase"],
        &["data", "phase"],
        &["result", "phase"],
    ],
};

const CONTEXT: FieldRule = FieldRule {
    field: "context",
    paths: &[
        &["retrieved_context"],
        &["data", "retrieved_context"],
        &["result", "retrieved_context"],
        &["context"],
    ],
};

const PHASE_CONFIDENCE: FieldRule = FieldRule {
    field: "phase_confidence",
    paths: &[
        &["phase_confidence"],
        &["phaseConfidence"],
        &["data", "phase_confidence"],
        &["result", "phase_confidence"],
    ],
};

const MISSING_ARTIFACTS: FieldRule = FieldRule {
    field: "missing_artifacts",
    paths: &[
        &["missing_artifacts"],
        &["missingArtifacts"],
        &["data", "missing_artifacts"],
        &["result", "missing_artifacts"],
    ],
};

const EPISODE_SUMMARY: FieldRule = FieldRule {
    field: "episode_summary",
    paths: &[
        &["episode_summary"],
        &["episodeSummary"],
        &["data", "episode_summary"],
        &["result", "episode_summary"],
    ],
};

const ACTION_TITLE: FieldRule = FieldRule {
    field: "action.title",
    paths: &[&["title"], &["action"], &["name"], &["step"], &["command"]],
};

const ACTION_DESCRIPTION: FieldRule = FieldRule {
    field: "action.description",
    paths: &[
        &["description"],
        &["desc"],
        &["details"],
        &["rationale"],
        &["summary"],
    ],
};

const ACTION_DONE_CRITERIA: FieldRule = FieldRule {
    field: "action.done_criteria",
    paths: &[
        &["done_criteria"],
        &["doneCriteria"],
        &["done"],
        &["success_criteria"],
    ],
};

const ACTION_COMMAND: FieldRule = FieldRule {
    field: "action.command",
    paths: &[&["command"], &["cmd"]],
};

/// The full candidate table, response-level rules first
pub const FIELD_RULES: &[FieldRule] = &[
    ACTIONS,
    RATIONALE,
    DONE_CRITERIA,
    REPORT_MARKDOWN,
    PHASE,
    CONTEXT,
    PHASE_CONFIDENCE,
    MISSING_ARTIFACTS,
    EPISODE_SUMMARY,
    ACTION_TITLE,
    ACTION_DESCRIPTION,
    ACTION_DONE_CRITERIA,
    ACTION_COMMAND,
];

/// One recommended action
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedAction {
    /// Short title
    pub title: String,
    /// Longer explanation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// How the operator knows the action is done
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done_criteria: Option<String>,
    /// Suggested shell command
    #[serde(skip_serializing_if = "Option::is_none")]
    pub command: Option<String>,
}

/// Retrieved-context snippet the server based its answer on
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ContextSnippet {
    /// Source document
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Retrieval score
    #[serde(skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    /// Snippet text (markdown)
    pub content: String,
}

/// Canonical display view of a suggestion reply
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NormalizedSuggestion {
    /// Recommended actions, in server order
    pub actions: Vec<NormalizedAction>,
    /// Overall reasoning
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rationale: Option<String>,
    /// Overall completion criteria
    #[serde(skip_serializing_if = "Option::is_none")]
    pub done_criteria: Option<String>,
    /// Report text
    #[serde(skip_serializing_if = "Option::is_none")]
    pub report_markdown: Option<String>,
    /// Phase the server assigned
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,
    /// Server confidence in the phase, 0.0 to 1.0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phase_confidence: Option<f64>,
    /// Evidence the server expects but has not seen
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub missing_artifacts: Vec<String>,
    /// Summary of the session so far
    #[serde(skip_serializing_if = "Option::is_none")]
    pub episode_summary: Option<String>,
    /// Retrieved context snippets
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<ContextSnippet>,
}

impl NormalizedSuggestion {
    /// Whether nothing could be extracted
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Extract the canonical view from an arbitrary suggestion reply
///
/// # Examples
///
/// ```
/// use rtai::normalize::normalize;
/// use serde_json::json;
///
/// let view = normalize(&json!({"result": {"actions": [{"action": "scan", "desc": "d"}]}}));
/// assert_eq!(view.actions[0].title, "scan");
/// assert_eq!(view.actions[0].description.as_deref(), Some("d"));
///
/// assert!(normalize(&json!({})).is_empty());
/// ```
pub fn normalize(raw: &Value) -> NormalizedSuggestion {
    NormalizedSuggestion {
        actions: first_match(raw, &ACTIONS, action_list).unwrap_or_default(),
        rationale: first_text(raw, &RATIONALE),
        done_criteria: first_text(raw, &DONE_CRITERIA),
        report_markdown: first_text(raw, &REPORT_MARKDOWN),
        phase: first_text(raw, &PHASE),
        phase_confidence: first_match(raw, &PHASE_CONFIDENCE, confidence),
        missing_artifacts: first_match(raw, &MISSING_ARTIFACTS, string_list).unwrap_or_default(),
        episode_summary: first_text(raw, &EPISODE_SUMMARY),
        context: first_match(raw, &CONTEXT, context_list).unwrap_or_default(),
    }
}

/// Value at `path` under `root`, if every step exists
pub fn lookup<'a>(root: &'a Value, path: &[&str]) -> Option<&'a Value> {
    path.iter().try_fold(root, |value, key| value.get(*key))
}

/// First candidate whose value `extract` accepts
fn first_match<T>(
    root: &Value,
    rule: &FieldRule,
    extract: impl Fn(&Value) -> Option<T>,
) -> Option<T> {
    rule.paths
        .iter()
        .filter_map(|path| lookup(root, path))
        .find_map(extract)
}

fn first_text(root: &Value, rule: &FieldRule) -> Option<String> {
    first_match(root, rule, text)
}

/// Non-blank string, or a list of strings joined by newlines
fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Array(items) => {
            let lines: Vec<&str> = items
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .collect();
            if lines.is_empty() {
                None
            } else {
                Some(lines.join("\n"))
            }
        }
        _ => None,
    }
}

/// Finite number, or a numeric string
fn confidence(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }?;
    number.is_finite().then_some(number)
}

/// Non-blank strings of a list; a single string is a one-item list
fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(vec![s.clone()]),
        Value::Array(items) => Some(
            items
                .iter()
                .filter_map(Value::as_str)
                .filter(|s| !s.trim().is_empty())
                .map(str::to_string)
                .collect(),
        ),
        _ => None,
    }
}

fn action_list(value: &Value) -> Option<Vec<NormalizedAction>> {
    match value {
        Value::Array(items) => Some(items.iter().filter_map(action).collect()),
        Value::String(_) => action(value).map(|a| vec![a]),
        _ => None,
    }
}

fn action(value: &Value) -> Option<NormalizedAction> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(NormalizedAction {
            title: s.clone(),
            ..Default::default()
        }),
        Value::Object(_) => {
            let mut description = first_text(value, &ACTION_DESCRIPTION);
            let title = match first_text(value, &ACTION_TITLE) {
                Some(title) => title,
                None => description.take()?,
            };
            Some(NormalizedAction {
                title,
                description,
                done_criteria: first_text(value, &ACTION_DONE_CRITERIA),
                command: first_text(value, &ACTION_COMMAND),
            })
        }
        _ => None,
    }
}

fn context_list(value: &Value) -> Option<Vec<ContextSnippet>> {
    let items = value.as_array()?;
    Some(items.iter().filter_map(snippet).collect())
}

fn snippet(value: &Value) -> Option<ContextSnippet> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(ContextSnippet {
            content: s.clone(),
            ..Default::default()
        }),
        Value::Object(map) => Some(ContextSnippet {
            source: map.get("source").and_then(Value::as_str).map(str::to_string),
            score: map.get("score").and_then(Value::as_f64),
            content: map
                .get("content")
                .or_else(|| map.get("text"))
                .and_then(text)?,
        }),
        _ => None,
    }
}
