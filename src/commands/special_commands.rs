//! Command parser for the interactive console
//!
//! Console commands are prefixed with `/` and are case-insensitive in their
//! name; arguments keep their case. Any other non-empty line is sent to the
//! advisor as a suggestion question.

use crate::clients::types::EventType;
use crate::config::{split_csv, ConfigKey};
use thiserror::Error;

/// Errors that can occur when parsing console commands
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    /// Unknown command was entered
    #[error("Unknown command: {0}\n\nType '/help' to see available commands")]
    UnknownCommand(String),

    /// Command was given an unsupported argument
    #[error("Unsupported argument for {command}: {arg}\n\nType '/help' to see valid usage")]
    UnsupportedArgument { command: String, arg: String },

    /// Command requires an argument but none was provided
    #[error("Command {command} requires an argument\n\nUsage: {usage}")]
    MissingArgument { command: String, usage: String },
}

/// Commands understood by the console
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    /// Show the command list
    Help,
    /// Show config, session and last errors
    Status,
    /// Probe both endpoints
    Health,
    /// Show the configuration
    ShowConfig,
    /// Overwrite one configuration field
    SetConfig(ConfigKey, String),
    /// Recompute the configuration from runtime defaults
    ResetConfig,
    /// Create a session
    NewSession,
    /// Load a session by id
    LoadSession(String),
    /// List sessions
    ListSessions,
    /// Refresh and show the active session
    ShowSession,
    /// Delete the active session (asks first)
    DeleteSession,
    /// Add a note
    Note(String),
    /// List local notes
    Notes,
    /// Show the timeline, optionally filtered
    Timeline(Option<EventType>),
    /// Ask for a report template
    Report,
    /// Print the raw JSON of the last suggestion
    LastJson,
    /// Show the last suggestion again through the normalized view
    LastSuggestion,
    /// Show the last agent reply again
    LastAgentResult,
    /// Auto-recon on the given targets, or the configured ones
    Recon(Option<Vec<String>>),
    /// Ingest history from the given files, or the agent's defaults
    Ingest(Vec<String>),
    /// Run a command on the agent host
    Run(String),
    /// Print the agent script download URL
    DownloadUrl,
    /// Ask the advisor a question
    Ask(String),
    /// Leave the console
    Exit,
    /// Blank line
    None,
}

/// Parse one console line
///
/// # Examples
///
/// ```
/// use rtai::commands::special_commands::{parse_console_command, ConsoleCommand};
///
/// assert_eq!(parse_console_command("/HEALTH").unwrap(), ConsoleCommand::Health);
/// assert_eq!(
///     parse_console_command("what should I scan next?").unwrap(),
///     ConsoleCommand::Ask("what should I scan next?".to_string())
/// );
/// ```
pub fn parse_console_command(input: &str) -> Result<ConsoleCommand, CommandError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(ConsoleCommand::None);
    }

    let lower = trimmed.to_lowercase();
    if lower == "exit" || lower == "quit" {
        return Ok(ConsoleCommand::Exit);
    }
    if !trimmed.starts_with('/') {
        return Ok(ConsoleCommand::Ask(trimmed.to_string()));
    }

    let (name, rest) = match trimmed.split_once(char::is_whitespace) {
        Some((name, rest)) => (name.to_lowercase(), rest.trim()),
        None => (lower.clone(), ""),
    };

    let required = |usage: &str| -> Result<String, CommandError> {
        if rest.is_empty() {
            Err(CommandError::MissingArgument {
                command: name.clone(),
                usage: usage.to_string(),
            })
        } else {
            Ok(rest.to_string())
        }
    };

    match name.as_str() {
        "/help" | "/?" => Ok(ConsoleCommand::Help),
        "/status" => Ok(ConsoleCommand::Status),
        "/health" => Ok(ConsoleCommand::Health),
        "/config" => Ok(ConsoleCommand::ShowConfig),
        "/reset" => Ok(ConsoleCommand::ResetConfig),
        "/set" => {
            let args = required("/set <KEY> <value>")?;
            let (key, value) = args
                .split_once(char::is_whitespace)
                .unwrap_or((args.as_str(), ""));
            let key = ConfigKey::ALL
                .into_iter()
                .find(|k| k.name().eq_ignore_ascii_case(key))
                .ok_or_else(|| CommandError::UnsupportedArgument {
                    command: "/set".to_string(),
                    arg: key.to_string(),
                })?;
            Ok(ConsoleCommand::SetConfig(key, value.trim().to_string()))
        }
        "/new" => Ok(ConsoleCommand::NewSession),
        "/load" => Ok(ConsoleCommand::LoadSession(required("/load <session_id>")?)),
        "/sessions" => Ok(ConsoleCommand::ListSessions),
        "/session" => Ok(ConsoleCommand::ShowSession),
        "/delete" => Ok(ConsoleCommand::DeleteSession),
        "/note" => Ok(ConsoleCommand::Note(required("/note <text>")?)),
        "/notes" => Ok(ConsoleCommand::Notes),
        "/timeline" => {
            if rest.is_empty() || rest.eq_ignore_ascii_case("all") {
                return Ok(ConsoleCommand::Timeline(None));
            }
            rest.parse::<EventType>()
                .map(|t| ConsoleCommand::Timeline(Some(t)))
                .map_err(|_| CommandError::UnsupportedArgument {
                    command: "/timeline".to_string(),
                    arg: rest.to_string(),
                })
        }
        "/report" => Ok(ConsoleCommand::Report),
        "/json" => Ok(ConsoleCommand::LastJson),
        "/last" => Ok(ConsoleCommand::LastSuggestion),
        "/agent" => Ok(ConsoleCommand::LastAgentResult),
        "/recon" => {
            let targets = split_csv(rest);
            Ok(ConsoleCommand::Recon(if targets.is_empty() {
                None
            } else {
                Some(targets)
            }))
        }
        "/ingest" => Ok(ConsoleCommand::Ingest(
            rest.split_whitespace().map(str::to_string).collect(),
        )),
        "/run" => Ok(ConsoleCommand::Run(required("/run <command>")?)),
        "/download" => Ok(ConsoleCommand::DownloadUrl),
        "/exit" | "/quit" => Ok(ConsoleCommand::Exit),
        _ => Err(CommandError::UnknownCommand(name)),
    }
}

/// Display help information
pub fn print_help() {
    println!(
        r#"
Console Commands
================

SETUP:
  /status              - Config, active session and last errors
  /health              - Probe the AI server and the local agent
  /config              - Show the configuration
  /set <KEY> <value>   - Change one field (e.g. /set AI_BASE_URL http://10.0.0.2:8088)
  /reset               - Reset the configuration to runtime defaults

SESSION:
  /new                 - Create a session from the configured identity
  /load <id>           - Load a session and make it active
  /sessions            - List sessions of the configured user
  /session             - Refresh and show the active session
  /delete              - Delete the active session

EVIDENCE:
  /note <text>         - Add a note (kept locally and posted to the session)
  /notes               - List local notes
  /timeline [type]     - Event timeline, newest first (command|http|scan|note|system)
  /report              - Ask for a report template

ADVISOR:
  <any text>           - Ask the advisor; the reply is rendered as actions
  /last                - Show the last suggestion again
  /json                - Raw JSON of the last suggestion

AGENT:
  /recon [a,b,c]       - Auto-recon on targets (default: configured targets)
  /ingest [files...]   - Ingest shell history
  /run <command>       - Run a command on the agent host
  /download            - Telemetry agent script URL
  /agent               - Show the last agent reply again

  /help                - Show this help
  exit, quit           - Leave the console

Press Ctrl-C while a request is running to cancel it.
"#
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_blank_and_exit() {
        assert_eq!(parse_console_command("   ").unwrap(), ConsoleCommand::None);
        assert_eq!(parse_console_command("exit").unwrap(), ConsoleCommand::Exit);
        assert_eq!(parse_console_command("QUIT").unwrap(), ConsoleCommand::Exit);
        assert_eq!(parse_console_command("/exit").unwrap(), ConsoleCommand::Exit);
    }

    #[test]
    fn test_parse_plain_text_is_a_question() {
        assert_eq!(
            parse_console_command("  Which port next? ").unwrap(),
            ConsoleCommand::Ask("Which port next?".to_string())
        );
    }

    #[test]
    fn test_parse_set_config() {
        assert_eq!(
            parse_console_command("/set ai_base_url http://10.0.0.2:8088").unwrap(),
            ConsoleCommand::SetConfig(ConfigKey::AiBaseUrl, "http://10.0.0.2:8088".to_string())
        );
        assert!(matches!(
            parse_console_command("/set NOPE x"),
            Err(CommandError::UnsupportedArgument { .. })
        ));
        assert!(matches!(
            parse_console_command("/set"),
            Err(CommandError::MissingArgument { .. })
        ));
    }

    #[test]
    fn test_parse_arguments_keep_case() {
        assert_eq!(
            parse_console_command("/LOAD Abc-123").unwrap(),
            ConsoleCommand::LoadSession("Abc-123".to_string())
        );
        assert_eq!(
            parse_console_command("/note Found SMB share").unwrap(),
            ConsoleCommand::Note("Found SMB share".to_string())
        );
    }

    #[test]
    fn test_parse_timeline_filter() {
        assert_eq!(
            parse_console_command("/timeline").unwrap(),
            ConsoleCommand::Timeline(None)
        );
        assert_eq!(
            parse_console_command("/timeline all").unwrap(),
            ConsoleCommand::Timeline(None)
        );
        assert_eq!(
            parse_console_command("/timeline scan").unwrap(),
            ConsoleCommand::Timeline(Some(EventType::Scan))
        );
        assert!(parse_console_command("/timeline email").is_err());
    }

    #[test]
    fn test_parse_agent_commands() {
        assert_eq!(
            parse_console_command("/recon 10.0.0.5, 10.0.0.6").unwrap(),
            ConsoleCommand::Recon(Some(vec!["10.0.0.5".to_string(), "10.0.0.6".to_string()]))
        );
        assert_eq!(parse_console_command("/recon").unwrap(), ConsoleCommand::Recon(None));
        assert_eq!(
            parse_console_command("/ingest /root/.zsh_history /root/.bash_history").unwrap(),
            ConsoleCommand::Ingest(vec![
                "/root/.zsh_history".to_string(),
                "/root/.bash_history".to_string()
            ])
        );
        assert_eq!(
            parse_console_command("/run id -a").unwrap(),
            ConsoleCommand::Run("id -a".to_string())
        );
        assert!(parse_console_command("/run").is_err());
    }

    #[test]
    fn test_parse_cached_result_commands() {
        assert_eq!(parse_console_command("/last").unwrap(), ConsoleCommand::LastSuggestion);
        assert_eq!(parse_console_command("/JSON").unwrap(), ConsoleCommand::LastJson);
        assert_eq!(parse_console_command("/agent").unwrap(), ConsoleCommand::LastAgentResult);
    }

    #[test]
    fn test_parse_unknown_command() {
        assert_eq!(
            parse_console_command("/frobnicate"),
            Err(CommandError::UnknownCommand("/frobnicate".to_string()))
        );
    }
}
