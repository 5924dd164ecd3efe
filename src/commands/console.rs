//! Interactive console
//!
//! A readline loop over the same handlers the subcommands use. Every network
//! call races Ctrl-C; a cancelled call is recorded in the store like any
//! other failure and the console keeps running.

use super::special_commands::{parse_console_command, print_help, ConsoleCommand};
use super::{add_note, agent_download_text, print_suggestion, show_timeline, App};
use crate::config::ConfigPatch;
use crate::error::{describe, Result, RtaiError};
use crate::ops::{IngestOptions, ReconOptions, SuggestOptions, SESSION_LIST_LIMIT};
use crate::render;
use crate::state::{AppStore, Endpoint};
use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::future::Future;

/// Store concern a console command reports into
type Recorder = fn(&AppStore, String);

fn session_lane(store: &AppStore, message: String) {
    store.set_session_error(message);
}

fn suggest_lane(store: &AppStore, message: String) {
    store.set_suggest_error(message);
}

fn agent_lane(store: &AppStore, message: String) {
    store.set_agent_error(message);
}

/// Await `future` unless the operator presses Ctrl-C first
///
/// On Ctrl-C the future is dropped, which aborts its request, and a
/// `Cancelled` error is recorded through `record`.
async fn interruptible<T, F>(app: &App, record: Recorder, future: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        outcome = future => outcome,
        _ = tokio::signal::ctrl_c() => {
            let err: anyhow::Error = RtaiError::Cancelled {
                url: "console request".to_string(),
            }
            .into();
            record(app.store(), describe(&err));
            tracing::info!("Request cancelled from the console");
            Err(err)
        }
    }
}

/// Prompt showing the active session
fn prompt(app: &App) -> String {
    let session_id = app.store().session_id();
    if session_id.is_empty() {
        format!("{} ", "rtai>".cyan().bold())
    } else {
        format!("{} ", format!("rtai[{}]>", session_id).cyan().bold())
    }
}

fn print_welcome_banner(app: &App) {
    let config = app.store().config();
    println!("{}", "RTAI lab console".bold());
    println!("  AI server:   {}", config.ai_base_url.cyan());
    println!("  Local agent: {}", config.agent_base_url.cyan());
    println!("Type '/help' for commands, or ask the advisor anything.\n");
}

fn print_status(app: &App) {
    let snapshot = app.store().snapshot();
    println!("{}", render::config_table(&snapshot.persisted.config));
    let session_id = if snapshot.persisted.session_id.is_empty() {
        "none".yellow()
    } else {
        snapshot.persisted.session_id.cyan()
    };
    println!("Active session: {}", session_id);
    println!("Local notes:    {}", snapshot.persisted.local_notes.len());
    for endpoint in [Endpoint::Advisory, Endpoint::Agent] {
        println!("{}", render::health_banner(endpoint, snapshot.health(endpoint)));
    }
    let errors = [
        ("session", &snapshot.session.error),
        ("suggest", &snapshot.suggest.error),
        ("agent", &snapshot.agent.error),
    ];
    for (name, error) in errors {
        if let Some(error) = error {
            println!("Last {} error: {}", name, error.red());
        }
    }
}

/// Run the interactive console until `exit` or EOF
///
/// # Errors
///
/// Returns `RtaiError::Readline` if the line editor cannot be created
pub async fn run_console(app: &App) -> Result<()> {
    let mut rl = DefaultEditor::new()?;
    print_welcome_banner(app);

    loop {
        match rl.readline(&prompt(app)) {
            Ok(line) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if let Err(e) = rl.add_history_entry(trimmed) {
                    tracing::debug!("Could not add history entry: {}", e);
                }

                let command = match parse_console_command(trimmed) {
                    Ok(command) => command,
                    Err(e) => {
                        eprintln!("{}\n", render::error(&e.to_string()));
                        continue;
                    }
                };

                match command {
                    ConsoleCommand::Exit => break,
                    ConsoleCommand::DeleteSession => {
                        let session_id = app.store().session_id();
                        if !session_id.is_empty() {
                            let question = format!("Delete session {}? [y/N] ", session_id);
                            let answer = rl.readline(&question).unwrap_or_default();
                            if !answer.trim().eq_ignore_ascii_case("y") {
                                println!("Kept.\n");
                                continue;
                            }
                        }
                        report(dispatch(app, ConsoleCommand::DeleteSession).await);
                    }
                    command => report(dispatch(app, command).await),
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("CTRL-C");
                break;
            }
            Err(ReadlineError::Eof) => {
                println!("CTRL-D");
                break;
            }
            Err(err) => {
                tracing::error!("Readline error: {:?}", err);
                break;
            }
        }
    }

    println!("Goodbye!");
    Ok(())
}

fn report(outcome: Result<()>) {
    match outcome {
        Ok(()) => println!(),
        Err(e) => eprintln!("{}\n", render::error(&describe(&e))),
    }
}

/// Execute one parsed console command
pub async fn dispatch(app: &App, command: ConsoleCommand) -> Result<()> {
    let ops = &app.ops;
    let store = app.store();
    match command {
        ConsoleCommand::None | ConsoleCommand::Exit => {}
        ConsoleCommand::Help => print_help(),
        ConsoleCommand::Status => print_status(app),
        ConsoleCommand::Health => {
            let (advisory, agent) = tokio::select! {
                results = ops.probe_all() => results,
                _ = tokio::signal::ctrl_c() => {
                    return Err(RtaiError::Cancelled { url: "health probe".to_string() }.into());
                }
            };
            println!("{}", render::health_banner(Endpoint::Advisory, &advisory));
            println!("{}", render::health_banner(Endpoint::Agent, &agent));
        }
        ConsoleCommand::ShowConfig => println!("{}", render::config_table(&store.config())),
        ConsoleCommand::SetConfig(key, value) => {
            let mut patch = ConfigPatch::default();
            patch.set(key, value);
            let config = store.set_config_patch(&patch)?;
            println!("{} = {}", key.name().cyan(), config.get(key));
        }
        ConsoleCommand::ResetConfig => {
            store.reset_config_to_runtime()?;
            println!("{}", render::success("Configuration reset to runtime defaults."));
        }
        ConsoleCommand::NewSession => {
            let record = interruptible(app, session_lane, ops.create_session()).await?;
            print!("{}", render::session_record(&record));
        }
        ConsoleCommand::LoadSession(id) => {
            let record = interruptible(app, session_lane, ops.load_session(&id)).await?;
            print!("{}", render::session_record(&record));
        }
        ConsoleCommand::ListSessions => {
            let items =
                interruptible(app, session_lane, ops.list_sessions(SESSION_LIST_LIMIT)).await?;
            if items.is_empty() {
                println!("{}", "No sessions found.".yellow());
            } else {
                render::session_table(&items, &store.session_id()).printstd();
            }
        }
        ConsoleCommand::ShowSession => {
            let record = interruptible(app, session_lane, ops.refresh_session()).await?;
            print!("{}", render::session_record(&record));
        }
        ConsoleCommand::DeleteSession => {
            let id = interruptible(app, session_lane, ops.delete_session()).await?;
            println!("{}", render::success(&format!("Deleted session {}", id)));
        }
        ConsoleCommand::Note(text) => {
            interruptible(app, session_lane, add_note(app, &text)).await?;
        }
        ConsoleCommand::Notes => print!("{}", render::local_notes(&store.local_notes())),
        ConsoleCommand::Timeline(filter) => {
            interruptible(app, session_lane, show_timeline(app, filter)).await?;
        }
        ConsoleCommand::Ask(question) => {
            let options = SuggestOptions {
                user_message: Some(question),
                ..Default::default()
            };
            let response = interruptible(app, suggest_lane, ops.suggest(&options)).await?;
            print_suggestion(&response, false)?;
        }
        ConsoleCommand::Report => {
            let response = interruptible(app, suggest_lane, ops.report_template(None)).await?;
            print_suggestion(&response, false)?;
        }
        ConsoleCommand::LastJson => match store.suggest().response {
            Some(response) => print_suggestion(&response, true)?,
            None => println!("{}", "No suggestion yet.".yellow()),
        },
        ConsoleCommand::LastSuggestion => {
            println!("{}", render::cached_suggestion(&store.suggest())?)
        }
        ConsoleCommand::LastAgentResult => {
            println!("{}", render::cached_agent_result(&store.agent())?)
        }
        ConsoleCommand::Recon(targets) => {
            let options = ReconOptions {
                targets,
                ..Default::default()
            };
            let response = interruptible(app, agent_lane, ops.auto_recon(&options)).await?;
            println!("{}", render::json(&response)?);
        }
        ConsoleCommand::Ingest(files) => {
            let options = IngestOptions {
                history_files: files,
                ..Default::default()
            };
            let response = interruptible(app, agent_lane, ops.ingest_history(&options)).await?;
            println!("{}", render::json(&response)?);
        }
        ConsoleCommand::Run(command) => {
            let response = interruptible(app, agent_lane, ops.run_command(&command, None)).await?;
            println!("{}", render::json(&response)?);
        }
        ConsoleCommand::DownloadUrl => println!("{}", agent_download_text(app)),
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::ClientTimeouts;
    use crate::config::{ConfigKey, ConfigSources};
    use crate::http::Gateway;
    use crate::ops::Operations;
    use crate::settings::Settings;
    use crate::state::MemoryStorage;
    use std::sync::Arc;

    fn app() -> App {
        let store = Arc::new(AppStore::new(
            ConfigSources::default(),
            Arc::new(MemoryStorage::new()),
        ));
        App {
            settings: Settings::default(),
            ops: Operations::new(store, Gateway::new().unwrap(), ClientTimeouts::default()),
        }
    }

    #[test]
    fn test_prompt_shows_session() {
        let app = app();
        assert!(prompt(&app).contains("rtai>"));
        app.store().set_session_id("s-9").unwrap();
        assert!(prompt(&app).contains("rtai[s-9]>"));
    }

    #[tokio::test]
    async fn test_dispatch_set_config() {
        let app = app();
        dispatch(
            &app,
            ConsoleCommand::SetConfig(ConfigKey::DefaultUserId, "bob".to_string()),
        )
        .await
        .unwrap();
        assert_eq!(app.store().config().user_id, "bob");
    }

    #[tokio::test]
    async fn test_dispatch_without_session_reports_validation() {
        let app = app();
        let err = dispatch(&app, ConsoleCommand::Ask("next?".to_string()))
            .await
            .unwrap_err();
        assert!(err.downcast_ref::<RtaiError>().unwrap().is_validation());
        assert!(app.store().suggest().error.is_some());
    }

    #[tokio::test]
    async fn test_dispatch_shows_cached_results_without_network() {
        let app = app();
        dispatch(&app, ConsoleCommand::LastSuggestion).await.unwrap();
        dispatch(&app, ConsoleCommand::LastAgentResult).await.unwrap();

        app.store()
            .set_suggest_result(serde_json::json!({"phase": "recon", "phase_confidence": 0.4}));
        app.store()
            .set_agent_result(serde_json::json!({"status": "started"}));
        dispatch(&app, ConsoleCommand::LastSuggestion).await.unwrap();
        dispatch(&app, ConsoleCommand::LastAgentResult).await.unwrap();
        assert!(app.store().suggest().error.is_none());
        assert!(app.store().agent().error.is_none());
    }

    #[tokio::test]
    async fn test_interruptible_passes_outcome_through() {
        let app = app();
        let value = interruptible(&app, agent_lane, async { Ok(7) })
            .await
            .unwrap();
        assert_eq!(value, 7);
        assert!(app.store().agent().error.is_none());
    }
}
