//! Cashier ledger command line

use anyhow::Context;
use cashier_ledger::{Config, ExportScope, Ledger, MemoryStore, Operator};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "cashier-ledger", version, about = "Casino cage ticket ledger")]
struct Cli {
    /// TOML configuration file; environment variables are used when absent
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// JSON snapshot to load, overrides store.seed_file
    #[arg(long, global = true)]
    seed: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Print every client balance
    Balances,
    /// Write tickets as CSV to stdout or a file
    Export {
        /// all or today
        #[arg(long, default_value = "all")]
        scope: ExportScope,
        /// Output file
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Print the dashboard summary as JSON
    Dashboard,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays clean for CSV and JSON
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::from_file(path)
            .with_context(|| format!("loading config from {}", path.display()))?,
        None => Config::from_env().context("loading config from environment")?,
    };

    tracing::info!(
        service = %config.service_name,
        version = %config.service_version,
        "Starting cashier ledger"
    );

    let store = match cli.seed.as_ref().or(config.store.seed_file.as_ref()) {
        Some(path) => MemoryStore::load(path)
            .with_context(|| format!("loading snapshot from {}", path.display()))?,
        None => {
            tracing::warn!("No snapshot configured, starting with an empty store");
            MemoryStore::new()
        }
    };

    let ledger = Ledger::new(Arc::new(store), config)?;
    let operator = Operator::system();

    match cli.command {
        Command::Balances => {
            for (client, balance) in ledger.client_balances().await? {
                let status = if client.active { "active" } else { "inactive" };
                println!(
                    "{:>5}  {:<30}  {:<8}  {:>12}  {}",
                    client.id.to_string(),
                    client.name,
                    client.membership.to_string(),
                    format!("{:.2}", balance),
                    status
                );
            }
        }
        Command::Export { scope, output } => {
            let export = ledger.export_tickets(&operator, scope).await?;
            match output {
                Some(path) if !export.is_empty() => {
                    std::fs::write(&path, export.as_text())
                        .with_context(|| format!("writing {}", path.display()))?;
                    tracing::info!(rows = export.rows(), path = %path.display(), "Export written");
                }
                _ => println!("{}", export),
            }
        }
        Command::Dashboard => {
            let dashboard = ledger.dashboard(&operator).await?;
            println!("{}", serde_json::to_string_pretty(&dashboard)?);
        }
    }

    Ok(())
}
