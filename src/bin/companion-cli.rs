//! # Companion CLI
//!
//! Command-line tool for checking configuration and exercising the data
//! pipeline against the live API.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use companion_core::config::{CompanionConfig, ConfigLoader};
use companion_core::data::{
    DataKind, DataRequest, Faction, GameMode, PlayerContext, ResilientDataSource,
};
use companion_core::logging::{init_structured_logging, log_error, log_fetch_operation};
use std::path::PathBuf;
use std::process;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "companion-cli")]
#[command(about = "Inspect configuration and fetch companion data")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to load (development, test, production)
    #[arg(short, long)]
    environment: Option<String>,

    /// Configuration directory path (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate the layered configuration
    Validate,

    /// Print the effective configuration as JSON
    ShowConfig,

    /// Fetch one dataset through cache, resilience and durable fallback
    Fetch {
        /// tasks, hideout, items, traders or maps
        kind: DataKind,

        #[arg(long)]
        level: Option<u32>,

        #[arg(long, value_enum)]
        faction: Option<FactionArg>,

        #[arg(long)]
        edition: Option<String>,

        #[arg(long)]
        pve: bool,

        /// Print the full payload instead of a summary
        #[arg(long)]
        full: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum FactionArg {
    Usec,
    Bear,
}

impl From<FactionArg> for Faction {
    fn from(value: FactionArg) -> Self {
        match value {
            FactionArg::Usec => Faction::Usec,
            FactionArg::Bear => Faction::Bear,
        }
    }
}

#[tokio::main]
async fn main() {
    init_structured_logging();
    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Validate => validate(&cli),
        Commands::ShowConfig => show_config(&cli),
        Commands::Fetch {
            kind,
            level,
            faction,
            edition,
            pve,
            full,
        } => {
            let mut context = PlayerContext::default();
            context.level = *level;
            context.faction = faction.map(Faction::from);
            context.edition = edition.clone();
            if *pve {
                context.game_mode = GameMode::Pve;
            }
            fetch(&cli, DataRequest::new(*kind).with_context(context), *full).await
        }
    };

    if let Err(e) = result {
        log_error("companion-cli", "command", &format!("{e:#}"), None);
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<CompanionConfig> {
    let mut loader = ConfigLoader::new();
    if let Some(environment) = &cli.environment {
        loader = loader.with_environment(environment);
    }
    if let Some(dir) = &cli.config_dir {
        loader = loader.with_directory(dir);
    }

    loader.load().with_context(|| {
        format!(
            "failed to load configuration for '{}' from {}",
            loader.environment(),
            loader.config_directory().display()
        )
    })
}

fn validate(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    println!("Configuration is valid");
    println!("  environment: {}", config.environment);
    println!("  endpoint:    {}", config.api.endpoint);
    println!(
        "  cache:       ttl {}s, max {} entries, {:?}",
        config.cache.default_ttl_seconds, config.cache.max_entries, config.cache.eviction_policy
    );
    println!(
        "  breaker:     {} failures / {}ms window, open for {}ms",
        config.circuit_breaker.failure_threshold,
        config.circuit_breaker.window_ms,
        config.circuit_breaker.timeout_ms
    );
    println!(
        "  retry:       {} attempts, base {}ms, max {}ms",
        config.retry.max_attempts, config.retry.base_delay_ms, config.retry.max_delay_ms
    );
    println!("  storage:     {:?} ({})", config.storage.backend, config.storage.directory.display());
    Ok(())
}

fn show_config(cli: &Cli) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    println!("{}", serde_json::to_string_pretty(&config)?);
    Ok(())
}

async fn fetch(cli: &Cli, request: DataRequest, full: bool) -> anyhow::Result<()> {
    let config = load_config(cli)?;
    let source = ResilientDataSource::from_config(&config)?;
    let key = request.cache_key();

    let start = Instant::now();
    let outcome = source.fetch(&request).await;
    let elapsed_ms = start.elapsed().as_millis() as u64;

    let outcome = match outcome {
        Ok(outcome) => outcome,
        Err(e) => {
            log_fetch_operation(request.kind.name(), &key, "failed", false, Some(elapsed_ms));
            return Err(e).with_context(|| format!("failed to fetch {}", request.kind));
        }
    };
    log_fetch_operation(
        request.kind.name(),
        &key,
        "ok",
        outcome.is_stale(),
        Some(elapsed_ms),
    );

    if let Some(advisory) = outcome.advisory() {
        println!("WARNING: {advisory}");
    }

    if full {
        println!("{}", serde_json::to_string_pretty(&outcome.data)?);
    } else {
        let summary = outcome
            .data
            .as_object()
            .map(|fields| {
                fields
                    .iter()
                    .map(|(name, value)| {
                        let count = value.as_array().map_or(1, Vec::len);
                        format!("{name}: {count} records")
                    })
                    .collect::<Vec<_>>()
                    .join(", ")
            })
            .unwrap_or_else(|| "non-object payload".to_string());
        println!("{} ({key}) in {elapsed_ms}ms: {summary}", request.kind);
    }

    println!("{}", source.manager().metrics().format_summary());
    Ok(())
}
