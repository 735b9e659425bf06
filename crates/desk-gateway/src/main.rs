//! desk-gateway: Front desk receptionist console
//!
//! Usage:
//!   desk-gateway                 - Start the console (caller + supervisor)
//!   desk-gateway --seed <file>   - Seed the knowledge base first
//!   desk-gateway --help          - Show help

mod cli;

use std::sync::Arc;

use desk_agent::{CreateHelpRequestTool, EscalationCoordinator, Receptionist, SupervisorDesk};
use desk_core::{
    AnswerMatcher, Config, ExactMatcher, KeywordOverlapMatcher, KnowledgeRepository, MatcherKind,
    SqliteHelpRequestStore, ToolManager,
};
use tracing_subscriber::EnvFilter;

/// Run mode
enum RunMode {
    /// Interactive console, optionally seeding first
    Console { seed: Option<String> },
    /// Show help
    Help,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mode = parse_args()?;

    let seed = match mode {
        RunMode::Help => {
            print_help();
            return Ok(());
        }
        RunMode::Version => {
            println!("desk-gateway {}", env!("CARGO_PKG_VERSION"));
            return Ok(());
        }
        RunMode::Console { seed } => seed,
    };

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // Load .env file
    dotenvy::dotenv().ok();

    let config = Config::load().map_err(|e| anyhow::anyhow!("Config error: {}", e))?;

    tracing::info!("Starting desk-gateway for {}", config.business.name);
    tracing::info!(
        "Voice pipeline: llm={} stt={} tts={}",
        config.voice.llm_model,
        config.voice.stt_model,
        config.voice.tts_voice
    );

    let db_path = config.database.effective_path().to_string();
    if config.database.emulator {
        tracing::info!("Emulator mode: using in-memory stores");
    } else {
        ensure_parent_dir(&db_path)?;
        tracing::info!("Database: {}", db_path);
    }

    let requests = Arc::new(
        open_store(&db_path, SqliteHelpRequestStore::new, SqliteHelpRequestStore::in_memory)
            .map_err(|e| anyhow::anyhow!("Failed to open help request store: {}", e))?,
    );
    let knowledge = Arc::new(
        open_store(&db_path, KnowledgeRepository::new, KnowledgeRepository::in_memory)
            .map_err(|e| anyhow::anyhow!("Failed to open knowledge base: {}", e))?,
    );

    if let Some(path) = seed.or_else(|| config.knowledge.seed_path.clone()) {
        let added = knowledge
            .seed_from_file(&path)
            .map_err(|e| anyhow::anyhow!("Failed to seed knowledge base from {}: {}", path, e))?;
        tracing::info!("Seeded {} entries from {}", added, path);
    }

    let matcher = matcher_for(config.knowledge.matcher);
    let base = knowledge
        .load_base(Arc::clone(&matcher), config.knowledge.threshold)
        .map_err(|e| anyhow::anyhow!("Failed to load knowledge base: {}", e))?;
    tracing::info!(
        "Knowledge base: {} entries, {} matcher, threshold {:.2}",
        base.len(),
        matcher.name(),
        base.threshold()
    );

    let voice = Arc::new(cli::ConsoleVoice::new());
    let coordinator = Arc::new(EscalationCoordinator::new(requests.clone()));

    let mut tool_manager = ToolManager::new();
    tool_manager.register(Arc::new(CreateHelpRequestTool::new(
        coordinator,
        voice.clone(),
        &config,
    )));
    tracing::info!("Registered tools: {:?}", tool_manager.tool_names());

    let receptionist = Arc::new(Receptionist::new(
        config.business.name.clone(),
        base,
        Arc::new(tool_manager),
        voice,
    ));
    let desk = SupervisorDesk::new(requests, knowledge.clone());

    cli::run_console(cli::Console {
        receptionist,
        desk,
        knowledge,
        matcher,
        threshold: config.knowledge.threshold,
    })
    .await
}

/// Parse command line arguments
fn parse_args() -> anyhow::Result<RunMode> {
    let mut args = std::env::args().skip(1);
    let mut seed = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--help" | "-h" => return Ok(RunMode::Help),
            "--version" | "-v" => return Ok(RunMode::Version),
            "--seed" | "-s" => {
                let path = args
                    .next()
                    .ok_or_else(|| anyhow::anyhow!("--seed requires a file path"))?;
                seed = Some(path);
            }
            other => anyhow::bail!("Unknown argument: {} (see --help)", other),
        }
    }

    Ok(RunMode::Console { seed })
}

/// Print help message
fn print_help() {
    println!("desk-gateway - Front desk receptionist with supervisor escalation");
    println!();
    println!("Usage:");
    println!("  desk-gateway                Start the interactive console");
    println!("  desk-gateway --seed <file>  Seed the knowledge base from a TOML file first");
    println!("  desk-gateway --help         Show this help message");
    println!("  desk-gateway --version      Show version");
    println!();
    println!("Configuration is read from desk-gateway.toml when present.");
    println!();
    println!("Environment Variables:");
    println!("  BUSINESS_NAME            Business name used in greetings");
    println!("  CUSTOMER_ID              Caller identifier recorded on help requests");
    println!("  DB_PATH                  SQLite database path (default: data/desk-gateway.db)");
    println!("  USE_EMULATOR             Use in-memory stores (default: true)");
    println!("  ESCALATION_TIMEOUT_SECS  Seconds to wait for a supervisor (default: 180)");
    println!("  KNOWLEDGE_THRESHOLD      Minimum match confidence (default: 0.6)");
    println!("  KNOWLEDGE_MATCHER        keywords or exact (default: keywords)");
    println!("  KNOWLEDGE_SEED_PATH      Seed file loaded at startup");
    println!("  LLM_MODEL, STT_MODEL, TTS_VOICE  Voice pipeline identifiers");
}

fn matcher_for(kind: MatcherKind) -> Arc<dyn AnswerMatcher> {
    match kind {
        MatcherKind::Keywords => Arc::new(KeywordOverlapMatcher),
        MatcherKind::Exact => Arc::new(ExactMatcher),
    }
}

/// Open an on-disk store, or an in-memory one for `:memory:`
fn open_store<T>(
    path: &str,
    on_disk: fn(&str) -> desk_core::Result<T>,
    in_memory: fn() -> desk_core::Result<T>,
) -> desk_core::Result<T> {
    if path == ":memory:" {
        in_memory()
    } else {
        on_disk(path)
    }
}

fn ensure_parent_dir(path: &str) -> anyhow::Result<()> {
    if let Some(parent) = std::path::Path::new(path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    Ok(())
}
