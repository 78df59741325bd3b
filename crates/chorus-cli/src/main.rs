use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod console;

use chorus_core::{
    AgentExecutor, ChatPlatform, DecisionConfig, HttpRoutingSuggester, InvitationRegistry,
    ResponseTracker, RoutingSuggester, Runtime, RuntimeConfig, StaticRoutingSuggester, Store,
    ThreadRegistry,
};
use chorus_scheduler::{CleanupSweeper, SweeperConfig};
use config::ChorusConfig;

#[derive(Parser)]
#[command(name = "chorus")]
#[command(version)]
#[command(about = "Chorus — multi-agent response decision daemon")]
struct Cli {
    /// Path to config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config directory and default config
    Init,

    /// Show current configuration
    Config,

    /// Start the daemon with the console adapter
    Start,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match cli.command {
        Commands::Init => cmd_init().await,
        Commands::Config => cmd_config(&cli.config),
        Commands::Start => cmd_start(&cli.config).await,
    }
}

async fn cmd_init() -> Result<()> {
    let config_dir = config::config_dir();
    tokio::fs::create_dir_all(&config_dir)
        .await
        .with_context(|| format!("Failed to create config dir: {}", config_dir.display()))?;

    let config_path = config_dir.join("config.toml");
    if config_path.exists() {
        warn!("Config already exists at {}", config_path.display());
    } else {
        let default_config = include_str!("../../../config/default.toml");
        tokio::fs::write(&config_path, default_config).await?;
        info!("Created default config at {}", config_path.display());
    }

    println!("Chorus initialized at {}", config_dir.display());
    println!(
        "Edit {} to configure your agents.",
        config_path.display()
    );
    Ok(())
}

fn cmd_config(path: &Option<PathBuf>) -> Result<()> {
    let config = config::load(path.as_ref())?;
    println!("{:#?}", config);
    Ok(())
}

async fn cmd_start(path: &Option<PathBuf>) -> Result<()> {
    let config = config::load(path.as_ref())?;
    let agents = config.agent_names();
    info!("Starting chorus with agents: {:?}", agents);

    let db_path = config.db_path();
    if let Some(parent) = db_path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create data dir: {}", parent.display()))?;
    }
    let store = Store::open(&db_path)?;

    let registry = Arc::new(InvitationRegistry::load(store.clone(), agents.clone()).await?);
    let tracker = Arc::new(ResponseTracker::load(store).await?);
    let threads = Arc::new(ThreadRegistry::new());

    let suggest_timeout = Duration::from_secs(config.decision.suggest_timeout_secs);
    let suggester: Arc<dyn RoutingSuggester> = match &config.decision.suggester_url {
        Some(url) => {
            info!("Routing suggestions via {}", url);
            Arc::new(HttpRoutingSuggester::new(url.clone(), suggest_timeout)?)
        }
        None => Arc::new(StaticRoutingSuggester::none()),
    };

    let platform = Arc::new(console::ConsolePlatform::new());
    let executor: Arc<dyn AgentExecutor> = Arc::new(console::EchoExecutor);

    let runtime = Runtime::new(
        agents,
        Arc::clone(&registry),
        tracker,
        threads,
        Arc::clone(&platform) as Arc<dyn ChatPlatform>,
        executor,
        suggester,
        RuntimeConfig {
            inbox_depth: config.runtime.inbox_depth,
            queue_depth: config.runtime.queue_depth,
            revoke_room_on_uninvite: config.runtime.revoke_room_on_uninvite,
            decision: DecisionConfig { suggest_timeout },
        },
    );

    let shutdown = CancellationToken::new();
    let handle = runtime.spawn(shutdown.clone());

    let sweeper = CleanupSweeper::new(
        Arc::clone(&registry),
        SweeperConfig {
            interval: Duration::from_secs(config.cleanup.interval_secs.max(1)),
            stale_after: config.cleanup.stale_after_hours.map(chrono::Duration::hours),
        },
    );
    let sweeper_handle = sweeper.spawn(shutdown.clone());

    let console_task = tokio::spawn(console::read_stdin(
        handle.inbox.clone(),
        Arc::clone(&platform),
        shutdown.clone(),
    ));

    signal::ctrl_c().await.context("Failed to listen for ctrl-c")?;
    info!("Shutting down");
    shutdown.cancel();

    handle.join().await;
    if let Err(e) = sweeper_handle.await {
        warn!("Sweeper task ended badly: {}", e);
    }
    console_task.abort();

    Ok(())
}
