//! Command-line interface definition for rtai
//!
//! This module defines the CLI structure using clap's derive API. Each
//! subcommand group maps onto one area of the lab workflow: endpoint setup,
//! sessions, evidence, suggestions and the local execution agent.

use crate::clients::types::{EventType, MemoryMode, PhaseName, RagFocus};
use crate::ops::{DEFAULT_HISTORY_WINDOW, SESSION_LIST_LIMIT};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// rtai - control client for the red-team lab advisory pipeline
///
/// Configure the advisory server and local agent, track a session, submit
/// telemetry and request AI suggestions.
#[derive(Parser, Debug, Clone)]
#[command(name = "rtai")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to settings file
    #[arg(short, long, default_value = "config/rtai.yaml")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long)]
    pub json_logs: bool,

    /// Directory of the state database
    #[arg(long)]
    pub state_dir: Option<PathBuf>,

    /// Origin the browser UI is served from (mixed-content check)
    #[arg(long)]
    pub page_url: Option<String>,

    /// Runtime-injected endpoint overrides (JSON or YAML)
    #[arg(long)]
    pub runtime_config: Option<PathBuf>,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for rtai
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Show or edit the endpoint configuration
    Config {
        /// Config subcommand
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Probe the advisory server and the local agent
    Health,

    /// Create, load, list and delete sessions
    Session {
        /// Session subcommand
        #[command(subcommand)]
        command: SessionCommand,
    },

    /// Notes and the event timeline of the active session
    Event {
        /// Event subcommand
        #[command(subcommand)]
        command: EventCommand,
    },

    /// Ask the advisory server for next actions
    Suggest {
        /// Question for the advisor
        #[arg(short, long)]
        message: Option<String>,

        /// History mode (summary, window, full)
        #[arg(long, default_value_t = MemoryMode::Window)]
        memory_mode: MemoryMode,

        /// Number of recent events considered (1-120)
        #[arg(long, default_value_t = DEFAULT_HISTORY_WINDOW)]
        history_window: u32,

        /// Force a phase for this suggestion
        #[arg(long)]
        phase: Option<PhaseName>,

        /// Keep the forced phase on the session
        #[arg(long)]
        persist_phase: bool,

        /// Retrieval focus (auto, recon, report)
        #[arg(long, default_value_t = RagFocus::Auto)]
        rag_focus: RagFocus,

        /// Print the raw JSON reply
        #[arg(long)]
        json: bool,
    },

    /// Ask for a report template for the active session
    Report {
        /// Extra instructions for the report
        #[arg(short, long)]
        message: Option<String>,

        /// Print the raw JSON reply
        #[arg(long)]
        json: bool,
    },

    /// Drive the local execution agent
    Agent {
        /// Agent subcommand
        #[command(subcommand)]
        command: AgentCommand,
    },

    /// Interactive console
    Console,
}

/// Config subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigCommand {
    /// Show the current configuration
    Show {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Overwrite the given fields
    Set {
        /// Advisory server base URL
        #[arg(long)]
        ai_base_url: Option<String>,

        /// Local agent base URL
        #[arg(long)]
        agent_url: Option<String>,

        /// Default targets, comma separated
        #[arg(long)]
        targets: Option<String>,

        /// Policy identifier
        #[arg(long)]
        policy_id: Option<String>,

        /// Tenant identifier
        #[arg(long)]
        tenant_id: Option<String>,

        /// User identifier
        #[arg(long)]
        user_id: Option<String>,

        /// Agent identifier
        #[arg(long)]
        agent_id: Option<String>,

        /// Session objective
        #[arg(long)]
        objective: Option<String>,
    },

    /// Recompute every field from runtime, build-time and default values
    Reset,
}

/// Session subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum SessionCommand {
    /// Create a session from the configured identity and targets
    Create,

    /// Load a session by id and make it active
    Load {
        /// Session id
        id: String,
    },

    /// List sessions of the configured tenant and user
    List {
        /// Maximum number of sessions
        #[arg(short, long, default_value_t = SESSION_LIST_LIMIT)]
        limit: u32,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the active session
    Show {
        /// Print the raw record as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete the active session on the server
    Delete,

    /// Forget the active session id locally
    Clear,
}

/// Event subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum EventCommand {
    /// Add a note locally and to the active session
    Note {
        /// Note text
        text: String,
    },

    /// List local notes
    Notes,

    /// Delete all local notes
    ClearNotes,

    /// Show the event timeline, newest first
    Timeline {
        /// Only events of this type (command, http, scan, note, system)
        #[arg(short = 't', long = "type")]
        event_type: Option<EventType>,
    },
}

/// Agent subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum AgentCommand {
    /// Scan targets and report telemetry into the active session
    Recon {
        /// Targets, comma separated; configured defaults when omitted
        #[arg(short, long, value_delimiter = ',')]
        targets: Vec<String>,

        /// Run nmap
        #[arg(long)]
        nmap: bool,

        /// Scan every port (requires --nmap)
        #[arg(long, requires = "nmap")]
        full_port: bool,

        /// Keep polling instead of a single pass
        #[arg(long)]
        continuous: bool,

        /// Quiet agent output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Ingest shell history into the active session
    Ingest {
        /// History file; repeatable
        #[arg(short, long = "file")]
        files: Vec<String>,

        /// Keep polling instead of a single pass
        #[arg(long)]
        continuous: bool,

        /// Quiet agent output
        #[arg(short, long)]
        quiet: bool,
    },

    /// Run a shell command on the agent host
    Run {
        /// Command line
        command: String,

        /// Agent-side timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Print where to download the telemetry agent script
    DownloadUrl,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: Some("config/rtai.yaml".to_string()),
            verbose: false,
            json_logs: false,
            state_dir: None,
            page_url: None,
            runtime_config: None,
            command: Commands::Health,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_default() {
        let cli = Cli::default();
        assert_eq!(cli.config, Some("config/rtai.yaml".to_string()));
        assert!(!cli.verbose);
        assert!(matches!(cli.command, Commands::Health));
    }

    #[test]
    fn test_cli_parse_global_flags() {
        let cli = Cli::try_parse_from([
            "rtai",
            "-v",
            "--json-logs",
            "--state-dir",
            "/tmp/rtai",
            "--page-url",
            "https://ui.lab",
            "health",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert!(cli.json_logs);
        assert_eq!(cli.state_dir, Some(PathBuf::from("/tmp/rtai")));
        assert_eq!(cli.page_url.as_deref(), Some("https://ui.lab"));
    }

    #[test]
    fn test_cli_parse_config_set() {
        let cli = Cli::try_parse_from([
            "rtai",
            "config",
            "set",
            "--ai-base-url",
            "http://ai.lab:8088",
            "--targets",
            "10.0.0.5, 10.0.0.6",
        ])
        .unwrap();
        match cli.command {
            Commands::Config {
                command:
                    ConfigCommand::Set {
                        ai_base_url,
                        targets,
                        user_id,
                        ..
                    },
            } => {
                assert_eq!(ai_base_url.as_deref(), Some("http://ai.lab:8088"));
                assert_eq!(targets.as_deref(), Some("10.0.0.5, 10.0.0.6"));
                assert!(user_id.is_none());
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_suggest_defaults() {
        let cli = Cli::try_parse_from(["rtai", "suggest"]).unwrap();
        match cli.command {
            Commands::Suggest {
                memory_mode,
                history_window,
                rag_focus,
                phase,
                json,
                ..
            } => {
                assert_eq!(memory_mode, MemoryMode::Window);
                assert_eq!(history_window, 12);
                assert_eq!(rag_focus, RagFocus::Auto);
                assert!(phase.is_none());
                assert!(!json);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_suggest_options() {
        let cli = Cli::try_parse_from([
            "rtai",
            "suggest",
            "-m",
            "what next?",
            "--memory-mode",
            "full",
            "--phase",
            "post_check",
            "--persist-phase",
        ])
        .unwrap();
        match cli.command {
            Commands::Suggest {
                message,
                memory_mode,
                phase,
                persist_phase,
                ..
            } => {
                assert_eq!(message.as_deref(), Some("what next?"));
                assert_eq!(memory_mode, MemoryMode::Full);
                assert_eq!(phase, Some(PhaseName::PostCheck));
                assert!(persist_phase);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_rejects_unknown_enum_value() {
        assert!(Cli::try_parse_from(["rtai", "suggest", "--rag-focus", "everything"]).is_err());
        assert!(Cli::try_parse_from(["rtai", "event", "timeline", "--type", "email"]).is_err());
    }

    #[test]
    fn test_cli_parse_session_list_limit() {
        let cli = Cli::try_parse_from(["rtai", "session", "list"]).unwrap();
        match cli.command {
            Commands::Session {
                command: SessionCommand::List { limit, .. },
            } => assert_eq!(limit, 100),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_agent_recon() {
        let cli = Cli::try_parse_from([
            "rtai", "agent", "recon", "-t", "10.0.0.5,10.0.0.6", "--nmap", "--full-port",
        ])
        .unwrap();
        match cli.command {
            Commands::Agent {
                command:
                    AgentCommand::Recon {
                        targets,
                        nmap,
                        full_port,
                        continuous,
                        ..
                    },
            } => {
                assert_eq!(targets, vec!["10.0.0.5", "10.0.0.6"]);
                assert!(nmap);
                assert!(full_port);
                assert!(!continuous);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_full_port_requires_nmap() {
        assert!(Cli::try_parse_from(["rtai", "agent", "recon", "--full-port"]).is_err());
    }

    #[test]
    fn test_cli_parse_agent_ingest_files() {
        let cli = Cli::try_parse_from([
            "rtai",
            "agent",
            "ingest",
            "-f",
            "/home/kali/.zsh_history",
            "--file",
            "/home/kali/.bash_history",
        ])
        .unwrap();
        match cli.command {
            Commands::Agent {
                command: AgentCommand::Ingest { files, .. },
            } => assert_eq!(files.len(), 2),
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parse_event_timeline_filter() {
        let cli = Cli::try_parse_from(["rtai", "event", "timeline", "-t", "note"]).unwrap();
        match cli.command {
            Commands::Event {
                command: EventCommand::Timeline { event_type },
            } => assert_eq!(event_type, Some(EventType::Note)),
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
