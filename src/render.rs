//! Terminal rendering of store contents and replies
//!
//! Every function returns a `String` (or a `Table`) so callers decide where
//! it goes; nothing here prints.

use crate::clients::types::{parse_timestamp, ActivityEvent, EventType, SessionRecord, SessionSummary};
use crate::config::{ConfigKey, ResolvedConfig};
use crate::error::Result;
use crate::normalize::{normalize, NormalizedSuggestion};
use crate::state::{Endpoint, HealthProbeResult, LastResult, LocalNote, ProbeStatus};
use colored::Colorize;
use prettytable::{format, row, Table};
use serde_json::Value;
use std::fmt::Write as _;

/// Longest payload excerpt shown for untitled events
const EXCERPT_CHARS: usize = 120;

/// Pretty-printed JSON
pub fn json(value: &impl serde::Serialize) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Error line
pub fn error(message: &str) -> String {
    format!("{} {}", "Error:".red().bold(), message.red())
}

/// Success line
pub fn success(message: &str) -> String {
    message.green().to_string()
}

/// Human timestamp; `—` when absent, the raw text when unparsable
pub fn timestamp(raw: Option<&str>) -> String {
    match raw {
        None => "—".to_string(),
        Some(raw) => parse_timestamp(raw)
            .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
            .unwrap_or_else(|| raw.to_string()),
    }
}

/// One status line per endpoint
pub fn health_banner(endpoint: Endpoint, result: &HealthProbeResult) -> String {
    let message = result.message.as_deref().unwrap_or("not checked");
    let checked = result
        .checked_at
        .map(|t| format!(" ({})", t.format("%H:%M:%S")))
        .unwrap_or_default();
    let (tag, message) = match result.status {
        ProbeStatus::Ok => ("OK".green().bold(), message.green()),
        ProbeStatus::Error => ("ERROR".red().bold(), message.red()),
        ProbeStatus::Unknown => ("UNKNOWN".yellow().bold(), message.normal()),
    };
    format!("{:<12} {:<8} {}{}", endpoint.to_string(), tag, message, checked)
}

/// Resolved configuration as a two-column table
pub fn config_table(config: &ResolvedConfig) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(row!["Key".bold(), "Value".bold()]);
    for key in ConfigKey::ALL {
        let value = config.get(key);
        let value = if value.is_empty() { "—" } else { value };
        table.add_row(row![key.name().cyan(), value]);
    }
    table
}

/// Session list as a table
pub fn session_table(items: &[SessionSummary], active: &str) -> Table {
    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(row![
        "Session".bold(),
        "Phase".bold(),
        "Agent".bold(),
        "Updated".bold()
    ]);
    for item in items {
        let id = if item.session_id == active {
            format!("* {}", item.session_id).green()
        } else {
            item.session_id.cyan()
        };
        table.add_row(row![
            id,
            item.current_phase.as_deref().unwrap_or("-"),
            item.agent_id.as_deref().unwrap_or("-"),
            timestamp(item.updated_at.as_deref())
        ]);
    }
    table
}

/// Summary block of a session record
pub fn session_record(record: &SessionRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", "Session".bold(), record.session_id.cyan());
    let field = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());
    let _ = writeln!(out, "  phase:     {}", field(&record.current_phase).yellow());
    let _ = writeln!(out, "  objective: {}", field(&record.objective));
    let targets = if record.target_scope.is_empty() {
        "-".to_string()
    } else {
        record.target_scope.join(", ")
    };
    let _ = writeln!(out, "  targets:   {}", targets);
    let _ = writeln!(
        out,
        "  identity:  tenant={} user={} agent={}",
        field(&record.tenant_id),
        field(&record.user_id),
        field(&record.agent_id)
    );
    let _ = writeln!(
        out,
        "  events:    {} · notes: {}",
        record.events.len(),
        record.notes.len()
    );
    let _ = writeln!(out, "  updated:   {}", timestamp(record.updated_at.as_deref()));
    if let Some(reasoning) = record.last_reasoning.as_deref().filter(|r| !r.is_empty()) {
        let _ = writeln!(out, "  last reasoning: {}", reasoning);
    }
    out
}

/// Title of an event for the timeline
pub fn event_title(event: &ActivityEvent) -> String {
    if let Some(title) = event.title() {
        return title;
    }
    let text = match &event.payload {
        Value::Null => String::new(),
        other => other.to_string(),
    };
    if text.chars().count() > EXCERPT_CHARS {
        let cut: String = text.chars().take(EXCERPT_CHARS).collect();
        format!("{}…", cut)
    } else {
        text
    }
}

/// Event timeline, newest first
pub fn timeline(record: &SessionRecord, filter: Option<EventType>) -> String {
    let events = record.timeline(filter);
    if events.is_empty() {
        return "No events.".yellow().to_string();
    }
    let mut out = String::new();
    for event in events {
        let _ = writeln!(
            out,
            "{}  {:<8} {}",
            timestamp(event.timestamp.as_deref()).dimmed(),
            event.event_type.cyan(),
            event_title(event)
        );
    }
    out
}

/// Local notes, newest first
pub fn local_notes(notes: &[LocalNote]) -> String {
    if notes.is_empty() {
        return "No local notes.".yellow().to_string();
    }
    let mut out = String::new();
    for note in notes {
        let _ = writeln!(
            out,
            "{}  {}",
            timestamp(Some(&note.created_at)).dimmed(),
            note.text
        );
    }
    out
}

/// Display view of a suggestion
pub fn suggestion(view: &NormalizedSuggestion) -> String {
    if view.is_empty() {
        return "The server reply had no recognizable suggestion fields; use --json to see it."
            .yellow()
            .to_string();
    }

    let mut out = String::new();
    if let Some(phase) = &view.phase {
        match view.phase_confidence {
            Some(confidence) => {
                let _ = writeln!(
                    out,
                    "{} {} ({:.0}% confidence)",
                    "Phase:".bold(),
                    phase.yellow(),
                    confidence * 100.0
                );
            }
            None => {
                let _ = writeln!(out, "{} {}", "Phase:".bold(), phase.yellow());
            }
        }
    }
    if !view.missing_artifacts.is_empty() {
        let pills: Vec<String> = view
            .missing_artifacts
            .iter()
            .map(|a| format!("[{}]", a).magenta().to_string())
            .collect();
        let _ = writeln!(out, "{} {}", "Missing artifacts:".bold(), pills.join(" "));
    }
    if let Some(summary) = &view.episode_summary {
        let _ = writeln!(out, "{}\n{}\n", "Episode summary".bold(), summary);
    }
    if let Some(rationale) = &view.rationale {
        let _ = writeln!(out, "{}\n{}\n", "Reasoning".bold(), rationale);
    }
    if !view.actions.is_empty() {
        let _ = writeln!(out, "{}", "Actions".bold());
        for (i, action) in view.actions.iter().enumerate() {
            let _ = writeln!(out, "{:>2}. {}", i + 1, action.title.cyan());
            if let Some(description) = &action.description {
                let _ = writeln!(out, "    {}", description);
            }
            if let Some(command) = action.command.as_deref().filter(|c| *c != action.title) {
                let _ = writeln!(out, "    $ {}", command.green());
            }
            if let Some(done) = &action.done_criteria {
                let _ = writeln!(out, "    done when: {}", done.dimmed());
            }
        }
        out.push('\n');
    }
    if let Some(done) = &view.done_criteria {
        let _ = writeln!(out, "{} {}\n", "Done criteria:".bold(), done);
    }
    if let Some(report) = &view.report_markdown {
        let _ = writeln!(out, "{}\n{}\n", "Report".bold(), report);
    }
    if !view.context.is_empty() {
        let _ = writeln!(out, "{}", "Retrieved context".bold());
        for snippet in &view.context {
            let source = snippet.source.as_deref().unwrap_or("unknown");
            match snippet.score {
                Some(score) => {
                    let _ = writeln!(out, "  {} · score {:.3}", source.cyan(), score);
                }
                None => {
                    let _ = writeln!(out, "  {}", source.cyan());
                }
            }
            for line in snippet.content.lines() {
                let _ = writeln!(out, "    {}", line);
            }
        }
    }
    out.trim_end().to_string()
}

/// Cached reply of one concern, rendered with `body`
///
/// Shows when the reply arrived and, if the newest call failed, its error
/// under the reply it left in place.
pub fn cached(
    label: &str,
    result: &LastResult,
    body: impl FnOnce(&Value) -> Result<String>,
) -> Result<String> {
    let mut out = String::new();
    match &result.response {
        Some(response) => {
            let received = result
                .received_at
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "—".to_string());
            let _ = writeln!(out, "{} {}", format!("Last {} from", label).dimmed(), received);
            let _ = writeln!(out, "{}", body(response)?);
        }
        None => {
            let _ = writeln!(out, "{}", format!("No {} yet.", label).yellow());
        }
    }
    if let Some(error) = &result.error {
        let _ = writeln!(out, "{}", self::error(&format!("newest call failed: {}", error)));
    }
    Ok(out.trim_end().to_string())
}

/// Cached suggestion through the normalized view
pub fn cached_suggestion(result: &LastResult) -> Result<String> {
    cached("suggestion", result, |response| Ok(suggestion(&normalize(response))))
}

/// Cached agent reply as JSON
pub fn cached_agent_result(result: &LastResult) -> Result<String> {
    cached("agent result", result, |response| json(response))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record() -> SessionRecord {
        serde_json::from_value(json!({
            "session_id": "s-1",
            "current_phase": "recon",
            "target_scope": ["10.0.0.5"],
            "events": [
                {"event_type": "note", "timestamp": "2026-01-01T10:00:00Z", "payload": {"note": "older"}},
                {"event_type": "http", "timestamp": "2026-01-01T12:00:00Z", "payload": {"method": "POST", "url": "http://t/login"}},
                {"event_type": "command", "timestamp": "2026-01-01T11:00:00Z", "payload": {"command": "nmap -sV t"}}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_timeline_newest_first_with_titles() {
        let text = timeline(&record(), None);
        let http = text.find("POST http://t/login").unwrap();
        let command = text.find("nmap -sV t").unwrap();
        let note = text.find("older").unwrap();
        assert!(http < command && command < note);
    }

    #[test]
    fn test_timeline_filter() {
        let text = timeline(&record(), Some(EventType::Command));
        assert!(text.contains("nmap -sV t"));
        assert!(!text.contains("older"));
        assert!(timeline(&record(), Some(EventType::Scan)).contains("No events."));
    }

    #[test]
    fn test_event_title_falls_back_to_payload_excerpt() {
        let event = ActivityEvent {
            event_id: None,
            event_type: "scan".to_string(),
            timestamp: None,
            payload: json!({"host": "t", "ports": [80, 443]}),
        };
        assert!(event_title(&event).contains("\"host\""));
    }

    #[test]
    fn test_session_record_summary() {
        let text = session_record(&record());
        assert!(text.contains("s-1"));
        assert!(text.contains("10.0.0.5"));
        assert!(text.contains("events:    3"));
    }

    #[test]
    fn test_suggestion_render() {
        let view = normalize(&json!({
            "phase": "enumeration",
            "reasoning": "Port 80 open",
            "actions": [{"title": "Dir brute force", "command": "gobuster dir -u http://t"}],
            "retrieved_context": [{"source": "web.md", "score": 0.5, "content": "tips"}]
        }));
        let text = suggestion(&view);
        assert!(text.contains("Port 80 open"));
        assert!(text.contains("Dir brute force"));
        assert!(text.contains("gobuster dir -u http://t"));
        assert!(text.contains("score 0.500"));
    }

    #[test]
    fn test_suggestion_render_phase_details() {
        let view = normalize(&json!({
            "phase": "recon",
            "phase_confidence": 0.82,
            "missing_artifacts": ["nmap output"],
            "reasoning": "r",
            "episode_summary": "User scanned host"
        }));
        let text = suggestion(&view);
        assert!(text.contains("82% confidence"));
        assert!(text.contains("[nmap output]"));
        assert!(text.contains("User scanned host"));
    }

    #[test]
    fn test_cached_views() {
        let empty = LastResult::default();
        assert!(cached_suggestion(&empty).unwrap().contains("No suggestion yet."));
        assert!(cached_agent_result(&empty).unwrap().contains("No agent result yet."));

        let suggest = LastResult {
            response: Some(json!({"phase": "recon", "actions": ["run nmap"]})),
            received_at: Some(chrono::Utc::now()),
            error: Some("Request timed out".to_string()),
        };
        let text = cached_suggestion(&suggest).unwrap();
        assert!(text.contains("run nmap"));
        assert!(!text.contains("\"actions\""));
        assert!(text.contains("newest call failed: Request timed out"));

        let agent = LastResult {
            response: Some(json!({"status": "started", "pid": 4242})),
            received_at: None,
            error: None,
        };
        let text = cached_agent_result(&agent).unwrap();
        assert!(text.contains("\"pid\": 4242"));
        assert!(!text.contains("failed"));
    }

    #[test]
    fn test_empty_suggestion_hint() {
        assert!(suggestion(&normalize(&json!({}))).contains("--json"));
    }

    #[test]
    fn test_timestamp_formats() {
        assert_eq!(timestamp(None), "—");
        assert_eq!(timestamp(Some("2026-01-01T10:00:00Z")), "2026-01-01 10:00:00");
        assert_eq!(timestamp(Some("yesterday")), "yesterday");
    }

    #[test]
    fn test_health_banner() {
        let text = health_banner(Endpoint::Advisory, &HealthProbeResult::ok("status=ok · env=lab"));
        assert!(text.contains("AI server"));
        assert!(text.contains("status=ok · env=lab"));
        assert!(health_banner(Endpoint::Agent, &HealthProbeResult::default()).contains("not checked"));
    }

    #[test]
    fn test_tables_render() {
        let config = crate::config::HardcodedDefaults::default().0;
        assert!(config_table(&config).to_string().contains("AI_BASE_URL"));
        let items = vec![SessionSummary {
            session_id: "s-1".to_string(),
            tenant_id: None,
            user_id: None,
            agent_id: Some("a".to_string()),
            current_phase: None,
            updated_at: None,
        }];
        assert!(session_table(&items, "s-1").to_string().contains("s-1"));
    }
}
