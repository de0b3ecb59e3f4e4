//! FormPilot application binary - composition root.
//!
//! 1. Parse CLI args and load configuration from TOML
//! 2. Initialize tracing
//! 3. Build the session registry (catalog, classifier, adapters)
//! 4. Start the idle-session pruner
//! 5. Serve the HTTP API, or run the terminal chat

mod cli;

use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use formpilot_api::AppState;
use formpilot_chat::SessionRegistry;
use formpilot_core::config::FormPilotConfig;
use formpilot_core::types::Turn;

use crate::cli::{CliArgs, Command};

const PRUNE_INTERVAL: Duration = Duration::from_secs(60);

/// Periodically drop sessions idle past the configured timeout.
async fn prune_loop(registry: Arc<SessionRegistry>) {
    let mut interval = tokio::time::interval(PRUNE_INTERVAL);
    // The first tick fires immediately.
    interval.tick().await;

    loop {
        interval.tick().await;
        match registry.prune_expired() {
            Ok(0) => {}
            Ok(removed) => tracing::info!(removed, "Pruned idle sessions"),
            Err(e) => tracing::warn!(error = %e, "Session pruning failed"),
        }
    }
}

fn print_reply(turns: &[Turn]) {
    if let Some(turn) = turns.last() {
        println!("\nassistant> {}\n", turn.content);
    }
}

/// Terminal chat against one local session.
///
/// Plain lines are text input. `/image <path>` submits an image file,
/// `/reset` starts over, `/status` shows the session state, `/quit` exits.
async fn run_chat(registry: Arc<SessionRegistry>) -> Result<(), Box<dyn std::error::Error>> {
    let session_id: Uuid = registry.start_session()?.id;
    println!("\nassistant> {}\n", registry.greeting());
    println!("(commands: /image <path>, /reset, /status, /quit)\n");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("you> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        match input.split_once(' ').map_or((input, ""), |(c, rest)| (c, rest.trim())) {
            ("/quit", _) | ("/exit", _) => break,
            ("/reset", _) => {
                let session = registry.reset_session(session_id).await?;
                print_reply(session.transcript());
            }
            ("/status", _) => {
                let session = registry.session(session_id).await?;
                let service = session
                    .selected_service
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "none".to_string());
                println!(
                    "\nstage: {}  service: {}  ready: {}  turns: {}",
                    session.stage,
                    service,
                    session.ready,
                    session.transcript().len()
                );
                if let Some(prediction) = &session.last_prediction {
                    println!(
                        "last image: {} ({:.0}%)",
                        prediction.category,
                        prediction.confidence * 100.0
                    );
                }
                println!();
            }
            ("/image", "") => println!("\nusage: /image <path>\n"),
            ("/image", path) => match tokio::fs::read(path).await {
                Ok(bytes) => {
                    let reply = registry.submit_image(session_id, &bytes).await?;
                    print_reply(&reply.turns);
                }
                Err(e) => println!("\ncould not read {}: {}\n", path, e),
            },
            _ => match registry.submit_text(session_id, input).await {
                Ok(outcome) => print_reply(&outcome.turns),
                // Caller mistakes (e.g. an over-long message) are shown, not fatal.
                Err(e) => println!("\n{}\n", e),
            },
        }
    }

    registry.end_session(session_id)?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let mut config = FormPilotConfig::load_or_default(&config_file);
    config.general.port = args.resolve_port(config.general.port);

    // Tracing. Logs go to stderr so the chat REPL keeps stdout.
    let filter = args.resolve_log_filter(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_new(&filter)
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    tracing::info!("Starting FormPilot v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_file.display(), "Configuration resolved");

    // Sessions.
    let registry = Arc::new(SessionRegistry::from_config(&config));
    tracing::info!(
        services = registry.catalog().len(),
        session_timeout_minutes = config.dialogue.session_timeout_minutes,
        "Session registry ready"
    );

    let pruner = tokio::spawn(prune_loop(Arc::clone(&registry)));

    let result = match args.command() {
        Command::Serve => {
            let state = AppState::new(config, Arc::clone(&registry));
            formpilot_api::start_server(state).await.map_err(Into::into)
        }
        Command::Chat => run_chat(Arc::clone(&registry)).await,
    };

    pruner.abort();
    result
}
