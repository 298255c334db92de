//! genpool - Command-line front end for the provider pool
//!
//! Loads the pool configuration, builds one pool for the process, and runs a
//! single command against it.
//!
//! # Usage
//!
//! ```bash
//! # Generate with providers discovered from GEMINI_API_KEY_1, GROQ_API_KEY, ...
//! genpool generate "Resume las ventas de hoy"
//!
//! # Read the prompt from stdin, rotating providers
//! echo "hola" | genpool --strategy round_robin generate -
//!
//! # Show persisted provider stats
//! genpool stats
//!
//! # List configured providers
//! genpool --config ./pool.toml providers
//!
//! # Verbose logging
//! RUST_LOG=debug genpool generate "hola"
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::AsyncReadExt;
use tracing::{info, warn};

use genpool_core::config::{default_config_path, load_config_from_path};
use genpool_core::{ConfigOverrides, JsonFileStore, PoolConfig, ProviderPool, StatsStore, Strategy};

/// genpool - Multi-provider text generation with automatic failover
#[derive(Parser, Debug)]
#[command(name = "genpool")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file path
    #[arg(short = 'c', long, env = "GENPOOL_CONFIG", value_name = "FILE")]
    config: Option<PathBuf>,

    /// Provider selection strategy (fallback, round_robin, fastest)
    #[arg(short = 's', long, value_name = "STRATEGY")]
    strategy: Option<Strategy>,

    /// Where provider stats are persisted
    #[arg(long, value_name = "PATH")]
    stats_path: Option<PathBuf>,

    /// Per-attempt timeout in seconds
    #[arg(long, value_name = "SECS")]
    timeout: Option<u64>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, env = "GENPOOL_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Generate text for a prompt
    Generate {
        /// Prompt text, or `-` to read it from stdin
        prompt: String,
    },
    /// Print per-provider stats as JSON
    Stats,
    /// List configured providers
    Providers,
}

/// Initialize logging with the specified level
fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        tracing_subscriber::EnvFilter::new(format!("genpool={level},genpool_core={level}"))
    });

    // stdout carries generated text only
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

fn resolve_config(args: &Args) -> Result<PoolConfig> {
    let path = args.config.clone().or_else(default_config_path);
    let mut config = load_config_from_path(path).context("Failed to load configuration")?;

    let mut overrides = ConfigOverrides::new();
    if let Some(strategy) = args.strategy {
        overrides = overrides.with_strategy(strategy);
    }
    if let Some(ref path) = args.stats_path {
        overrides = overrides.with_stats_path(path.clone());
    }
    if let Some(secs) = args.timeout {
        overrides = overrides.with_attempt_timeout_secs(secs);
    }
    overrides.apply(&mut config);

    info!(
        source = %config.source(),
        strategy = %config.strategy,
        providers = config.providers.len(),
        "Configuration resolved"
    );
    Ok(config)
}

async fn read_prompt(prompt: String) -> Result<String> {
    if prompt != "-" {
        return Ok(prompt);
    }
    let mut buffer = String::new();
    tokio::io::stdin()
        .read_to_string(&mut buffer)
        .await
        .context("Failed to read prompt from stdin")?;
    Ok(buffer)
}

fn print_providers(config: &PoolConfig) {
    if config.providers.is_empty() {
        println!("no providers configured");
        return;
    }
    for provider in &config.providers {
        println!(
            "{:<16} {:<16} {:<32} {}",
            provider.name, provider.kind, provider.model, provider.base_url
        );
    }
}

const NO_PROVIDERS_HINT: &str = "no providers configured; set GEMINI_API_KEY_1, GROQ_API_KEY_1, \
GROK_API_KEY or OPENAI_API_KEY, or add [[providers]] to the config file";

fn build_pool(config: &PoolConfig) -> Result<ProviderPool> {
    if config.providers.is_empty() {
        anyhow::bail!(NO_PROVIDERS_HINT);
    }
    Ok(ProviderPool::from_config(config)?)
}

/// Stats as JSON: the live pool view, or the saved document when no
/// provider is configured
fn stats_report(config: &PoolConfig) -> Result<serde_json::Value> {
    if !config.providers.is_empty() {
        return Ok(serde_json::to_value(build_pool(config)?.stats())?);
    }

    let document = JsonFileStore::new(&config.stats_path)
        .load()
        .with_context(|| format!("Failed to read {}", config.stats_path.display()))?;
    if document.is_empty() {
        anyhow::bail!(NO_PROVIDERS_HINT);
    }

    warn!(
        path = %config.stats_path.display(),
        "No providers configured, showing saved stats"
    );
    Ok(serde_json::to_value(document)?)
}

async fn run(args: Args) -> Result<()> {
    let config = resolve_config(&args)?;

    match args.command {
        Command::Providers => {
            print_providers(&config);
            Ok(())
        }
        Command::Stats => {
            println!("{}", serde_json::to_string_pretty(&stats_report(&config)?)?);
            Ok(())
        }
        Command::Generate { prompt } => {
            let prompt = read_prompt(prompt).await?;
            if prompt.trim().is_empty() {
                anyhow::bail!("prompt is empty");
            }

            let pool = build_pool(&config)?;
            let result = pool.generate(&prompt).await;
            pool.flush_stats().await;

            let text = result?;
            println!("{text}");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(&args.log_level);

    if let Err(e) = run(args).await {
        warn!(error = %e, "Command failed");
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
