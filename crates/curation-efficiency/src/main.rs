//! Hive Curation Efficiency
//!
//! Scans an account's recent curation rewards, compares each one with the
//! value the vote was expected to earn and estimates the annual curation
//! yield on the account's effective stake.

mod aggregator;
mod amount;
mod config;
mod constants;
mod endpoints;
mod ledger;
mod model;
mod reports;
mod rpc;
mod scanner;
mod valuation;

#[cfg(test)]
mod testing;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use log::{LevelFilter, info};
use std::path::PathBuf;

use config::{Config, FileConfig, Overrides};
use endpoints::EndpointPool;
use ledger::LedgerClient;
use rpc::HttpTransport;

#[derive(Parser, Debug)]
#[command(name = "curation-efficiency")]
#[command(about = "Curation reward efficiency for a Hive account")]
struct Args {
    /// Account to analyze (with or without a leading @)
    account: String,

    /// Analysis window in days (default: 7)
    #[arg(short, long)]
    days: Option<u32>,

    /// RPC node URL, repeat for failover order (default: public nodes)
    #[arg(long = "node")]
    nodes: Vec<String>,

    /// Config file (default: ./config.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Write per-vote results to a CSV file
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Write the full report as JSON
    #[arg(long)]
    json: Option<PathBuf>,

    /// Stop the history scan after this many operations
    #[arg(long)]
    max_operations: Option<usize>,

    /// Stop the history scan after this many seconds
    #[arg(long)]
    max_scan_secs: Option<u64>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG takes precedence over the -v default
    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    env_logger::Builder::new().filter_level(level).parse_default_env().init();

    let file_config = FileConfig::load_or_default(args.config.as_deref())?;
    let overrides = Overrides {
        nodes: args.nodes,
        window_days: args.days,
        max_operations: args.max_operations,
        max_scan_secs: args.max_scan_secs,
    };
    let config = Config::from_file(&file_config, &args.account, overrides)?;

    info!(
        "Analyzing @{} over {} days using {} node(s)",
        config.account,
        config.window_days,
        config.nodes.len()
    );

    let transport = HttpTransport::new(config.request_timeout).context("Failed to build HTTP client")?;
    let pool = EndpointPool::new(config.nodes.clone()).context("No RPC nodes configured")?;
    let client = LedgerClient::new(transport, pool);

    client.connect().await.context("None of the configured nodes responded")?;
    info!("Using node {}", client.current_endpoint().await);

    let settings = config.analysis_settings();
    let run = aggregator::analyze(&client, &config.account, &settings, Utc::now())
        .await
        .with_context(|| format!("Analysis of @{} failed", config.account))?;

    reports::print_report(&config.account, config.window_days, &run);

    if let Some(path) = &args.csv {
        reports::write_csv(path, &run.report)?;
    }
    if let Some(path) = &args.json {
        reports::write_json(path, &run.report)?;
    }

    Ok(())
}
