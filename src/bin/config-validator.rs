//! # ERP Sync Configuration Validator
//!
//! Command-line tool for validating sync configuration files across environments.
//! Loads the layered configuration the same way the library does and reports
//! problems before a service is started with it.

use clap::{Parser, Subcommand};
use erp_sync_core::config::{ConfigManager, SyncConfig};
use erp_sync_core::remote::SettingsEndpointResolver;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate ERP sync configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment to validate (development, test, production)
    #[arg(short, long, default_value = "development")]
    environment: String,

    /// Configuration directory path (default: config)
    #[arg(short, long)]
    config_dir: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Subcommands
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate and print the effective configuration with secrets masked
    Validate,

    /// Print the built-in defaults as JSON
    Defaults,

    /// Show the endpoint URLs the configuration resolves to
    Endpoints,
}

fn main() {
    let cli = Cli::parse();

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
        Some(Commands::Validate) | None => validate(&cli),
        Some(Commands::Defaults) => show_defaults(),
        Some(Commands::Endpoints) => show_endpoints(&cli),
    };

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {:#}", e);
            eprintln!("❌ {e:#}");
            process::exit(1);
        }
    }
}

fn load(cli: &Cli) -> anyhow::Result<Arc<ConfigManager>> {
    Ok(ConfigManager::load_from_directory_with_env(
        cli.config_dir.clone(),
        &cli.environment,
    )?)
}

fn validate(cli: &Cli) -> anyhow::Result<()> {
    println!("🔧 Validating ERP sync configuration");
    println!("Environment: {}", cli.environment);

    let manager = load(cli)?;
    println!("Config Directory: {}", manager.config_directory().display());
    println!();
    println!("{}", serde_json::to_string_pretty(&manager.debug_config())?);
    println!();
    println!("✅ Configuration is valid");
    Ok(())
}

fn show_defaults() -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(&SyncConfig::default())?);
    Ok(())
}

fn show_endpoints(cli: &Cli) -> anyhow::Result<()> {
    let manager = load(cli)?;
    let endpoints = SettingsEndpointResolver::new(manager.config().remote.clone()).endpoint_set()?;

    for (operation, url) in [
        ("create_product", &endpoints.create_product),
        ("save_product", &endpoints.save_product),
        ("create_inventory", &endpoints.create_inventory),
        ("create_relation", &endpoints.create_relation),
        ("create_customer", &endpoints.create_customer),
        ("create_address", &endpoints.create_address),
    ] {
        println!("  {operation:<18} {url}");
    }
    Ok(())
}
