//! RTAI - lab exercise control client
//!
#![doc = "Main entry point for the rtai command-line client."]

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rtai::cli::{Cli, Commands};
use rtai::commands::{self, console, App};
use rtai::error::{describe, Result};
use rtai::render;
use rtai::settings::{Settings, DEFAULT_SETTINGS_PATH};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_args();
    init_tracing(cli.verbose, cli.json_logs);

    if let Err(e) = run(cli).await {
        eprintln!("{}", render::error(&describe(&e)));
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref().unwrap_or(DEFAULT_SETTINGS_PATH);
    let settings = Settings::load(config_path, &cli)?;
    settings.validate()?;

    let app = App::open(settings)?;

    match cli.command {
        Commands::Config { command } => commands::handle_config(&app, command),
        Commands::Health => commands::handle_health(&app).await,
        Commands::Session { command } => commands::handle_session(&app, command).await,
        Commands::Event { command } => commands::handle_event(&app, command).await,
        Commands::Suggest {
            message,
            memory_mode,
            history_window,
            phase,
            persist_phase,
            rag_focus,
            json,
        } => {
            commands::handle_suggest(
                &app,
                message,
                memory_mode,
                history_window,
                phase,
                persist_phase,
                rag_focus,
                json,
            )
            .await
        }
        Commands::Report { message, json } => commands::handle_report(&app, message, json).await,
        Commands::Agent { command } => commands::handle_agent(&app, command).await,
        Commands::Console => {
            tracing::info!("Starting interactive console");
            console::run_console(&app).await
        }
    }
}

/// Initialize tracing; `RUST_LOG` wins over the verbosity flag
fn init_tracing(verbose: bool, json_logs: bool) {
    let default = if verbose { "rtai=debug" } else { "rtai=info" };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));

    let registry = tracing_subscriber::registry().with(env_filter);
    if json_logs {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}
