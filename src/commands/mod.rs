//! Command handlers for the CLI
//!
//! Every handler takes the [`App`] context, runs one or more operations and
//! prints the result. Handlers never talk to the facades directly; all
//! network work goes through [`Operations`] so the store stays the single
//! source of truth.

use crate::cli::{AgentCommand, ConfigCommand, EventCommand, SessionCommand};
use crate::clients::types::{EventType, EventsReply, MemoryMode, PhaseName, RagFocus};
use crate::config::{ConfigKey, ConfigPatch, ConfigSources};
use crate::error::{Result, RtaiError};
use crate::health::mixed_content_warning;
use crate::http::Gateway;
use crate::normalize::normalize;
use crate::ops::{IngestOptions, Operations, ReconOptions, SuggestOptions};
use crate::render;
use crate::settings::Settings;
use crate::state::{AppStore, Endpoint, SledStorage};
use colored::Colorize;
use serde_json::Value;
use std::sync::Arc;

pub mod console;
pub mod special_commands;

/// Everything a command handler needs
#[derive(Clone)]
pub struct App {
    /// Process settings
    pub settings: Settings,
    /// Operations bound to the store
    pub ops: Operations,
}

impl App {
    /// Open the state database and wire the store and facades
    ///
    /// # Errors
    ///
    /// Returns `RtaiError::Storage` if the state database cannot be opened,
    /// or `RtaiError::Http` if the HTTP client cannot be built
    pub fn open(settings: Settings) -> Result<Self> {
        let state_dir = settings.state_dir()?;
        tracing::debug!(state_dir = %state_dir.display(), "Opening state store");
        let storage = SledStorage::open(&state_dir)?;
        let sources = ConfigSources::discover(Some(settings.runtime_config_path.as_path()));
        let store = Arc::new(AppStore::new(sources, Arc::new(storage)));
        let ops = Operations::new(store, Gateway::new()?, settings.client_timeouts());
        Ok(Self { settings, ops })
    }

    /// The state store
    pub fn store(&self) -> &Arc<AppStore> {
        self.ops.store()
    }
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!("{}", render::json(value)?);
    Ok(())
}

/// Handle `config` subcommands
pub fn handle_config(app: &App, command: ConfigCommand) -> Result<()> {
    let store = app.store();
    match command {
        ConfigCommand::Show { json } => {
            let config = store.config();
            if json {
                return print_json(&config);
            }
            println!("{}", render::config_table(&config));
            if let Some(warning) =
                mixed_content_warning(app.settings.page_url.as_deref(), &config.agent_base_url)
            {
                println!("{}", warning.yellow());
            }
        }
        ConfigCommand::Set {
            ai_base_url,
            agent_url,
            targets,
            policy_id,
            tenant_id,
            user_id,
            agent_id,
            objective,
        } => {
            let mut patch = ConfigPatch::default();
            let fields = [
                (ConfigKey::AiBaseUrl, ai_base_url),
                (ConfigKey::LocalAgentUrl, agent_url),
                (ConfigKey::DefaultTargets, targets),
                (ConfigKey::DefaultPolicyId, policy_id),
                (ConfigKey::DefaultTenantId, tenant_id),
                (ConfigKey::DefaultUserId, user_id),
                (ConfigKey::DefaultAgentId, agent_id),
                (ConfigKey::DefaultObjective, objective),
            ];
            for (key, value) in fields {
                if let Some(value) = value {
                    patch.set(key, value);
                }
            }
            if patch.is_empty() {
                return Err(RtaiError::Validation(
                    "Nothing to set; pass at least one field flag".into(),
                )
                .into());
            }
            let config = store.set_config_patch(&patch)?;
            println!("{}", render::success("Configuration saved."));
            println!("{}", render::config_table(&config));
        }
        ConfigCommand::Reset => {
            let config = store.reset_config_to_runtime()?;
            println!("{}", render::success("Configuration reset to runtime defaults."));
            println!("{}", render::config_table(&config));
        }
    }
    Ok(())
}

/// Handle `health`
pub async fn handle_health(app: &App) -> Result<()> {
    let (advisory, agent) = app.ops.probe_all().await;
    println!("{}", render::health_banner(Endpoint::Advisory, &advisory));
    println!("{}", render::health_banner(Endpoint::Agent, &agent));
    let config = app.store().config();
    if let Some(warning) =
        mixed_content_warning(app.settings.page_url.as_deref(), &config.agent_base_url)
    {
        println!("{}", warning.yellow());
    }
    Ok(())
}

/// Handle `session` subcommands
pub async fn handle_session(app: &App, command: SessionCommand) -> Result<()> {
    match command {
        SessionCommand::Create => {
            let record = app.ops.create_session().await?;
            println!("{}", render::success("Session created and set as active."));
            print!("{}", render::session_record(&record));
        }
        SessionCommand::Load { id } => {
            let record = app.ops.load_session(&id).await?;
            println!("{}", render::success("Session loaded and set as active."));
            print!("{}", render::session_record(&record));
        }
        SessionCommand::List { limit, json } => {
            let items = app.ops.list_sessions(limit).await?;
            if json {
                return print_json(&items);
            }
            if items.is_empty() {
                println!("{}", "No sessions found.".yellow());
                return Ok(());
            }
            render::session_table(&items, &app.store().session_id()).printstd();
        }
        SessionCommand::Show { json } => {
            let record = app.ops.refresh_session().await?;
            if json {
                return print_json(&record);
            }
            print!("{}", render::session_record(&record));
        }
        SessionCommand::Delete => {
            let id = app.ops.delete_session().await?;
            println!("{}", render::success(&format!("Deleted session {}", id)));
        }
        SessionCommand::Clear => {
            app.store().clear_session_id()?;
            println!("{}", render::success("Active session cleared."));
        }
    }
    Ok(())
}

/// Post a note and describe the outcome
pub async fn add_note(app: &App, text: &str) -> Result<()> {
    match app.ops.add_note(text).await {
        Ok((_, reply)) => {
            match reply {
                EventsReply::Session(record) => println!(
                    "{}",
                    render::success(&format!(
                        "Note posted; session has {} events.",
                        record.events.len()
                    ))
                ),
                EventsReply::Ack { .. } => println!("{}", render::success("Note posted.")),
                EventsReply::Other(value) => print_json(&value)?,
            }
            Ok(())
        }
        Err(e) => {
            let validation = e
                .downcast_ref::<RtaiError>()
                .map(RtaiError::is_validation)
                .unwrap_or(false);
            if !validation {
                eprintln!("{}", "The note was kept locally but could not be posted.".yellow());
            }
            Err(e)
        }
    }
}

/// Handle `event` subcommands
pub async fn handle_event(app: &App, command: EventCommand) -> Result<()> {
    match command {
        EventCommand::Note { text } => add_note(app, &text).await?,
        EventCommand::Notes => print!("{}", render::local_notes(&app.store().local_notes())),
        EventCommand::ClearNotes => {
            app.store().clear_local_notes()?;
            println!("{}", render::success("Local notes cleared."));
        }
        EventCommand::Timeline { event_type } => show_timeline(app, event_type).await?,
    }
    Ok(())
}

/// Refresh the active session and print its timeline
pub async fn show_timeline(app: &App, filter: Option<EventType>) -> Result<()> {
    let record = app.ops.refresh_session().await?;
    print!("{}", render::timeline(&record, filter));
    Ok(())
}

/// Print a suggestion reply as JSON or as the normalized view
pub fn print_suggestion(response: &Value, json: bool) -> Result<()> {
    if json {
        return print_json(response);
    }
    println!("{}", render::suggestion(&normalize(response)));
    Ok(())
}

/// Handle `suggest`
#[allow(clippy::too_many_arguments)]
pub async fn handle_suggest(
    app: &App,
    message: Option<String>,
    memory_mode: MemoryMode,
    history_window: u32,
    phase: Option<PhaseName>,
    persist_phase: bool,
    rag_focus: RagFocus,
    json: bool,
) -> Result<()> {
    let options = SuggestOptions {
        user_message: message,
        memory_mode,
        history_window,
        phase_override: phase,
        persist_phase_override: persist_phase,
        rag_focus,
    };
    let response = app.ops.suggest(&options).await?;
    print_suggestion(&response, json)
}

/// Handle `report`
pub async fn handle_report(app: &App, message: Option<String>, json: bool) -> Result<()> {
    let response = app.ops.report_template(message).await?;
    print_suggestion(&response, json)
}

/// Download URL of the telemetry agent plus a quickstart
pub fn agent_download_text(app: &App) -> String {
    let advisory = app.ops.advisory();
    let url = advisory.agent_download_url();
    let session_id = app.store().session_id();
    let session_id = if session_id.is_empty() {
        "<SESSION_ID>".to_string()
    } else {
        session_id
    };
    format!(
        "{}\n\nQuickstart (on the Kali host):\n  curl -fsSL {} -o /tmp/kali_telemetry_agent.py\n  BASE_URL={} SESSION_ID={} python /tmp/kali_telemetry_agent.py --poll-interval 5 --verbose",
        url.cyan(),
        url,
        advisory.base_url(),
        session_id
    )
}

/// Handle `agent` subcommands
pub async fn handle_agent(app: &App, command: AgentCommand) -> Result<()> {
    let response = match command {
        AgentCommand::Recon {
            targets,
            nmap,
            full_port,
            continuous,
            quiet,
        } => {
            let options = ReconOptions {
                targets: if targets.is_empty() {
                    None
                } else {
                    Some(targets)
                },
                enable_nmap: nmap,
                full_port,
                once: !continuous,
                verbose: !quiet,
            };
            app.ops.auto_recon(&options).await?
        }
        AgentCommand::Ingest {
            files,
            continuous,
            quiet,
        } => {
            let options = IngestOptions {
                history_files: files,
                once: !continuous,
                verbose: !quiet,
            };
            app.ops.ingest_history(&options).await?
        }
        AgentCommand::Run { command, timeout } => app.ops.run_command(&command, timeout).await?,
        AgentCommand::DownloadUrl => {
            println!("{}", agent_download_text(app));
            return Ok(());
        }
    };
    print_json(&response)
}
