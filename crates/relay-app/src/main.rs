//! Relay application binary - composition root.
//!
//! 1. Load configuration from TOML and apply CLI overrides
//! 2. Build the session store, router, and collaborator registry
//! 3. Run the requested subcommand (console, route, or chart)

mod cli;
mod echo;

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use relay_core::{RelayConfig, Route, TableData};
use relay_router::{ModelError, OllamaClassifier, Router};
use relay_session::{ContextExtractor, SessionJanitor, SessionStore};
use relay_viz::VisualizationSpec;
use relay_workflow::{CollaboratorRegistry, Orchestrator, WorkflowReply};

use cli::{CliArgs, Command};
use echo::EchoCollaborator;

/// Install the tracing subscriber. An explicit --log-level beats RUST_LOG,
/// which beats the config file.
fn init_tracing(args: &CliArgs, config: &RelayConfig) {
    let level = args.resolve_log_level(config);
    let filter = if args.log_level.is_some() {
        tracing_subscriber::EnvFilter::new(&level)
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&level))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_router(config: &RelayConfig) -> Result<Arc<Router>, ModelError> {
    let store = Arc::new(SessionStore::new(config.session.clone()));
    let model = OllamaClassifier::new(&config.model)?;
    tracing::info!(
        model = %config.model.model,
        base_url = %config.model.base_url,
        "Classification model configured"
    );
    Ok(Arc::new(Router::new(store, Arc::new(model), config.router.clone())))
}

// =============================================================================
// Subcommands
// =============================================================================

async fn run_route(config: &RelayConfig, query: &str, session: &str) -> Result<(), Box<dyn std::error::Error>> {
    let router = build_router(config)?;
    let result = router.classify(query, session).await;
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn run_chart(file: &Path, query: &str) -> Result<(), Box<dyn std::error::Error>> {
    let raw = std::fs::read_to_string(file)?;
    let table: TableData = serde_json::from_str(&raw)?;
    tracing::debug!(
        path = %file.display(),
        columns = table.columns.len(),
        rows = table.rows.len(),
        "Table loaded"
    );
    let spec = VisualizationSpec::for_table(&table, query);
    println!("{}", serde_json::to_string_pretty(&spec)?);
    Ok(())
}

async fn run_console(config: &RelayConfig, session: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let router = build_router(config)?;
    let store = Arc::clone(router.store());
    let janitor = SessionJanitor::for_store(Arc::clone(&store)).spawn();

    let mut registry = CollaboratorRegistry::new();
    for route in [Route::Sql, Route::Csv, Route::Pdf, Route::Math] {
        registry.register(Arc::new(EchoCollaborator::new(route)))?;
    }
    let orchestrator = Orchestrator::new(
        router,
        registry,
        ContextExtractor::new(&config.context),
        config.workflow.clone(),
    );

    let session_id = session.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    tracing::info!(session = %session_id, "Console session started");
    println!("Session {}. Commands: /force <route> <query>, /history, /clear, /sessions, /quit", session_id);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let line = line.trim();

        let (query, forced) = match line {
            "" => continue,
            "/quit" | "/exit" | "quit" | "exit" => break,
            "/history" => {
                println!("{}", store.render_history(&session_id));
                continue;
            }
            "/clear" => {
                store.clear(&session_id);
                println!("Conversation cleared.");
                continue;
            }
            "/sessions" => {
                println!("{}", serde_json::to_string_pretty(&store.summaries())?);
                continue;
            }
            _ => match line.strip_prefix("/force ") {
                Some(rest) => {
                    let (label, query) = rest.trim().split_once(' ').unwrap_or((rest.trim(), ""));
                    match label.parse::<Route>() {
                        Ok(route) => (query, Some(route)),
                        Err(e) => {
                            println!("{}", e);
                            continue;
                        }
                    }
                }
                None => (line, None),
            },
        };

        match orchestrator.handle(query, Some(&session_id), forced).await {
            Ok(reply) => print_reply(&reply),
            Err(e) => println!("Error: {}", e),
        }
    }

    janitor.stop().await;
    tracing::info!(session = %session_id, "Console closed");
    Ok(())
}

fn print_reply(reply: &WorkflowReply) {
    println!("[{}] {}", reply.route, reply.content);
    if let Some(offer) = &reply.disambiguation {
        for (i, option) in offer.options.iter().enumerate() {
            println!("  {}. {} - {}", i + 1, option.display, option.description);
        }
    }
    if let Some(viz) = reply.visualization.as_ref().filter(|v| v.should_visualize) {
        if let Ok(json) = serde_json::to_string(viz) {
            println!("  chart: {}", json);
        }
    }
    if !reply.sources.is_empty() {
        println!("  sources: {}", reply.sources.join(", "));
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    let config_file = args.resolve_config_path();
    let mut config = RelayConfig::load_or_default(&config_file);
    args.apply_overrides(&mut config);
    init_tracing(&args, &config);
    tracing::info!(path = %config_file.display(), "Starting relay v{}", env!("CARGO_PKG_VERSION"));

    match &args.command {
        Command::Console { session } => run_console(&config, session.clone()).await,
        Command::Route { query, session } => run_route(&config, query, session).await,
        Command::Chart { file, query } => run_chart(file, query),
    }
}
