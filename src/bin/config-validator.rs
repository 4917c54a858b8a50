//! # Orchestrator Configuration Validator
//!
//! Command-line tool for validating orchestrator configuration files and
//! environment overrides before starting runners or sweepers.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use orchestrator_core::config::{ConfigManager, OrchestratorConfig};
use std::path::PathBuf;
use std::process;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate orchestrator configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Configuration file (TOML, YAML or JSON); environment overrides only when omitted
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate every section
    All,

    /// Validate and show one section
    Section {
        /// Section name (queue_worker, finalizer, reaper, backoff, fast_path, protection)
        name: String,
    },

    /// Print the effective configuration after overrides
    Show,
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing based on verbosity
    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = match &cli.command {
        Some(Commands::All) | None => validate_all(&cli),
        Some(Commands::Section { name }) => validate_section(&cli, name),
        Some(Commands::Show) => show_config(&cli),
    };

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {e:#}");
            println!("❌ {e:#}");
            process::exit(1);
        }
    }
}

fn load(cli: &Cli) -> Result<std::sync::Arc<ConfigManager>> {
    let manager = match &cli.file {
        Some(path) => ConfigManager::load_from_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => ConfigManager::load().context("loading configuration from environment")?,
    };
    Ok(manager)
}

fn validate_all(cli: &Cli) -> Result<()> {
    println!("🔧 Validating Orchestrator Configuration");
    if let Some(path) = &cli.file {
        println!("Config File: {}", path.display());
    }
    println!();

    let manager = load(cli)?;
    println!("✅ Configuration loaded (environment: {})", manager.environment());

    let config = manager.config();
    print_queue_worker(config);
    print_sweepers(config);
    print_backoff_and_fast_path(config);
    print_protection(config);

    println!("\n🎉 All configuration validation checks passed!");
    Ok(())
}

fn validate_section(cli: &Cli, name: &str) -> Result<()> {
    println!("🔧 Validating Section: {name}");
    let manager = load(cli)?;
    let config = manager.config();

    match name.to_lowercase().replace('-', "_").as_str() {
        "queue_worker" => print_queue_worker(config),
        "finalizer" | "reaper" => print_sweepers(config),
        "backoff" | "fast_path" => print_backoff_and_fast_path(config),
        "protection" => print_protection(config),
        other => bail!("Unknown section: {other}"),
    }

    println!("✅ Section '{name}' validation passed!");
    Ok(())
}

fn show_config(cli: &Cli) -> Result<()> {
    let manager = load(cli)?;
    let json = manager.debug_config()?;
    match cli.format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&json)?),
        OutputFormat::Table => {
            let Some(sections) = json.as_object() else {
                bail!("configuration did not serialize to an object");
            };
            for (section, values) in sections {
                println!("[{section}]");
                if let Some(fields) = values.as_object() {
                    for (field, value) in fields {
                        println!("  {field:<28} {value}");
                    }
                }
            }
        }
    }
    Ok(())
}

fn print_queue_worker(config: &OrchestratorConfig) {
    let worker = &config.queue_worker;
    println!("\n📥 Queue Worker:");
    println!("   Polling interval: {}ms", worker.polling_interval_ms());
    println!("   Batch size: {}", worker.batch_size());
    println!("   Concurrency: {}", worker.concurrency());
    println!("   Max processing time: {}ms", worker.max_processing_time_ms());
    println!("   Max retries: {}", worker.max_retries());
    println!("   DLQ enabled: {}", worker.dlq_enabled());
}

fn print_sweepers(config: &OrchestratorConfig) {
    println!("\n🧹 Finalizer:");
    println!("   Scan interval: {}ms", config.finalizer.scan_interval_ms());
    println!("   Batch size: {}", config.finalizer.batch_size());

    println!("\n💀 Reaper:");
    println!("   Scan interval: {}ms", config.reaper.scan_interval_ms());
    println!("   Timeout threshold: {}ms", config.reaper.timeout_threshold_ms());
    println!("   Batch size: {}", config.reaper.batch_size());
    println!("   Strategy: {}", config.reaper.default_strategy());
}

fn print_backoff_and_fast_path(config: &OrchestratorConfig) {
    println!("\n🔄 Backoff:");
    println!("   Base delay: {}ms", config.backoff.base_delay_ms);
    println!("   Max delay: {}ms", config.backoff.max_delay_ms);
    println!("   Jitter factor: {}", config.backoff.jitter_factor);

    println!("\n⚡ Fast Path:");
    println!("   Poll interval: {}ms", config.fast_path.poll_interval_ms());
    println!("   Default time budget: {}ms", config.fast_path.default_time_budget_ms());
    println!("   Status URL base: {}", config.fast_path.status_url_base());
}

fn print_protection(config: &OrchestratorConfig) {
    let protection = &config.protection;
    let enabled = |on: bool| if on { "configured" } else { "no-op" };

    println!("\n🛡️ Protection ({}):", protection.component_name);
    println!("   Circuit breaker: {}", enabled(protection.circuit_breaker.is_some()));
    println!("   Timeout: {}", enabled(protection.timeout.is_some()));
    println!("   Bulkhead: {}", enabled(protection.bulkhead.is_some()));
    println!("   Rate limiter: {}", enabled(protection.rate_limiter.is_some()));
    println!("   Hedge: {}", enabled(protection.hedge.is_some()));
}
