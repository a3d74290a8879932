//! Command-line entry point for the therapy session runner.

use ai_therapy::clients::{ChatClient, test_connection};
use ai_therapy::conversation::{
    ConversationManager, SessionOutcome, SessionSettings, default_output_file, markdown_path,
};
use ai_therapy::setup;
use ai_therapy_config::{LayeredConfigOptions, TherapyConfig};
use ai_therapy_memory::MemoryStore;
use anyhow::Context;
use chrono::Local;
use clap::{Parser, Subcommand};
use log::{debug, info, warn};
use std::path::PathBuf;

/// Command-line options.
#[derive(Parser)]
#[command(name = "ai-therapy", version, about)]
struct Cli {
    /// Optional path to an ai-therapy.json5 config file applied over the default layers
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Clone, Copy)]
enum Command {
    /// Run a therapy session (default)
    Run,
    /// Print memory store statistics
    Stats,
    /// Delete memories older than the retention period
    Cleanup,
    /// Serve stored memories as MCP tools over stdio
    Mcp,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    ai_therapy::init_logging();

    let cli = Cli::parse();
    let cwd = std::env::current_dir().context("failed to resolve current working directory")?;
    let mut options = LayeredConfigOptions::new(&cwd);
    if let Some(path) = cli.config.as_ref() {
        info!("loading config with runtime layer: {}", path.display());
        options = options.with_runtime_path(path);
    }
    let layered =
        TherapyConfig::load_layered_with_options(options).context("failed to load config")?;
    debug!("config loaded (layers={})", layered.layers.len());
    let config = layered.config;

    match cli.command.unwrap_or(Command::Run) {
        Command::Run => run(config).await,
        Command::Stats => stats(&config).await,
        Command::Cleanup => cleanup(&config).await,
        Command::Mcp => mcp(&config).await,
    }
}

async fn run(config: TherapyConfig) -> anyhow::Result<()> {
    let output_file = config
        .conversation
        .output_file
        .clone()
        .unwrap_or_else(|| default_output_file(Local::now()));
    info!(
        "configuration loaded (ollama_url={}, ollama_model={}, claude_api_url={}, max_rounds={}, delay_ms={}, output_file={})",
        config.ollama.url,
        config.ollama.model,
        config.claude.api_url,
        config.conversation.max_rounds,
        config.conversation.delay_between_messages_ms,
        output_file.display()
    );

    let memory = setup::memory_bank(&config)
        .await
        .context("failed to initialize memory bank")?;
    if let Some(bank) = &memory {
        let stats = bank.stats().await.context("failed to read memory stats")?;
        info!(
            "memory bank ready (existing_memories={}, retention_days={})",
            stats.total_memories, config.memory.retention_days
        );
    }

    let mut ollama = setup::ollama_client(&config).context("failed to build Ollama client")?;
    let mut claude = setup::claude_client(&config).context("failed to build Claude client")?;
    test_connection(&mut ollama)
        .await
        .context("failed to connect to Ollama")?;
    test_connection(&mut claude)
        .await
        .context("failed to connect to Claude")?;

    let therapist: Box<dyn ChatClient> = Box::new(ollama);
    let client: Box<dyn ChatClient> = Box::new(claude);
    let mut manager = ConversationManager::new(
        therapist,
        client,
        memory,
        SessionSettings {
            max_rounds: config.conversation.max_rounds,
            delay_between_messages: config.conversation.delay_between_messages(),
            output_file: output_file.clone(),
        },
    );
    let outcome = manager.run().await.context("conversation failed")?;
    let verb = match outcome {
        SessionOutcome::Completed => "completed",
        SessionOutcome::Interrupted => "interrupted",
    };
    println!(
        "Conversation {verb}. Saved to {} and {}",
        output_file.display(),
        markdown_path(&output_file).display()
    );
    Ok(())
}

async fn stats(config: &TherapyConfig) -> anyhow::Result<()> {
    let store = setup::memory_store(config);
    let stats = store.stats().await.context("failed to read memory stats")?;
    println!("Data directory:  {}", store.root().display());
    println!("Total memories:  {}", stats.total_memories);
    println!("Storage size:    {} bytes", stats.storage_size_bytes);
    println!("Retention:       {} days", config.memory.retention_days);
    if let Some(oldest) = stats.oldest_memory {
        println!("Oldest memory:   {}", oldest.to_rfc3339());
    }
    if let Some(newest) = stats.newest_memory {
        println!("Newest memory:   {}", newest.to_rfc3339());
    }
    Ok(())
}

async fn cleanup(config: &TherapyConfig) -> anyhow::Result<()> {
    let store = setup::memory_store(config);
    let expired = store
        .cleanup_expired()
        .await
        .context("failed to clean up expired memories")?;
    println!(
        "Removed {expired} expired memories from {}",
        store.root().display()
    );
    Ok(())
}

async fn mcp(config: &TherapyConfig) -> anyhow::Result<()> {
    let store = setup::memory_store(config);
    if !store.root().is_dir() {
        warn!(
            "memory directory does not exist, tools will report no memories (data_dir={})",
            store.root().display()
        );
    }
    let server = setup::memory_tool_server(config).context("failed to build MCP memory server")?;
    server
        .serve_stdio()
        .await
        .context("MCP memory server failed")
}
