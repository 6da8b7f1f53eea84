//! OANDA History Downloader
//!
//! Downloads daily spot and swap-point history from the OANDA v20 API and
//! stores one CSV per pair under `{data_dir}/history/`.
//!
//! # Usage
//!
//! ```bash
//! # Set credentials
//! export OANDA_TOKEN=your-token
//! export OANDA_ACCOUNT_ID=your-account
//!
//! # List accounts, quotes and published swap tenors
//! oanda-download explore --pairs EUR_USD,GBP_USD
//!
//! # Download one year of history
//! oanda-download download --pairs EUR_USD,GBP_USD,USD_JPY --days 365
//!
//! # Summarize stored files
//! oanda-download validate
//! ```

use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use cip_backtest::data::oanda::MAX_CANDLES_PER_REQUEST;
use cip_backtest::data::{DataLoader, MarketDataProvider, OandaClient};

const SEPARATOR: &str = "============================================================";

/// OANDA history downloader CLI.
#[derive(Parser)]
#[command(name = "oanda-download")]
#[command(about = "Download FX spot and swap-point history from OANDA")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Data output directory
    #[arg(long, default_value = "data")]
    data_dir: PathBuf,
}

#[derive(Subcommand)]
enum Commands {
    /// Show accounts, current quotes and published swap tenors
    Explore {
        /// Comma-separated list of pairs
        #[arg(long, default_value = "EUR_USD,GBP_USD,USD_JPY")]
        pairs: String,
    },

    /// Download daily history
    Download {
        /// Comma-separated list of pairs
        #[arg(long, default_value = "EUR_USD,GBP_USD,USD_JPY")]
        pairs: String,

        /// Days of history per pair
        #[arg(long, default_value_t = 365)]
        days: u32,

        /// Keep going when a pair fails
        #[arg(long)]
        keep_going: bool,
    },

    /// Summarize stored history files
    Validate,
}

fn split_pairs(pairs: &str) -> Vec<&str> {
    pairs.split(',').map(|s| s.trim()).filter(|s| !s.is_empty()).collect()
}

fn cmd_explore(pairs: Vec<&str>) -> Result<()> {
    let client = OandaClient::from_env().context("OANDA credentials not set")?;

    println!("{}", SEPARATOR);
    println!("OANDA API Exploration ({:?})", client.environment());
    println!("{}", SEPARATOR);

    println!("\n1. Accounts...");
    match client.fetch_accounts() {
        Ok(accounts) if accounts.is_empty() => println!("   none"),
        Ok(accounts) => {
            for account in &accounts {
                let marker = if account.id == client.account_id() { " (configured)" } else { "" };
                if account.tags.is_empty() {
                    println!("   {}{}", account.id, marker);
                } else {
                    println!("   {}{} [{}]", account.id, marker, account.tags.join(", "));
                }
            }
        }
        Err(e) => println!("   ERROR - {}", e),
    }

    println!("\n2. Current quotes...");
    for pair in &pairs {
        match client.fetch_quote(pair) {
            Ok(quote) => println!("   {}: {:.5} at {}", pair, quote.spot_mid, quote.timestamp),
            Err(e) => println!("   {}: ERROR - {}", pair, e),
        }
    }

    println!("\n3. Published swap tenors...");
    for pair in &pairs {
        match client.fetch_swap_rates(pair, None) {
            Ok(rates) => {
                let tenors: Vec<String> = rates
                    .iter()
                    .filter_map(|r| r.tenor_days().map(|d| format!("{}D={:+.6}", d, r.net_points())))
                    .collect();
                if tenors.is_empty() {
                    println!("   {}: none", pair);
                } else {
                    println!("   {}: {}", pair, tenors.join(" "));
                }
            }
            Err(e) => println!("   {}: ERROR - {}", pair, e),
        }
    }

    println!("\n4. Limits:");
    println!("   Max candles per request: {}", MAX_CANDLES_PER_REQUEST);
    println!("   Requests made: {}", client.request_count());
    println!("\n{}", SEPARATOR);

    Ok(())
}

fn cmd_download(data_dir: PathBuf, pairs: Vec<&str>, days: u32, keep_going: bool) -> Result<()> {
    let client = OandaClient::from_env().context("OANDA credentials not set")?;
    let loader = DataLoader::new(&data_dir);

    if days > MAX_CANDLES_PER_REQUEST {
        warn!(
            "Requested {} days; OANDA returns at most {} candles per request",
            days, MAX_CANDLES_PER_REQUEST
        );
    }

    println!("\nDownload Plan:");
    println!("  Pairs: {:?}", pairs);
    println!("  Days: {}", days);
    println!("  Output: {}", data_dir.join("history").display());
    println!();

    let start_time = Instant::now();
    let pb = ProgressBar::new(pairs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );

    let mut total_rows = 0usize;
    let mut errors = Vec::new();

    for pair in &pairs {
        pb.set_message(pair.to_string());

        let series = match client.fetch_history(pair, days) {
            Ok(series) => series,
            Err(e) if keep_going => {
                warn!("{}: {}", pair, e);
                errors.push(format!("{}: {}", pair, e));
                pb.inc(1);
                continue;
            }
            Err(e) => return Err(e).with_context(|| format!("Failed to download {}", pair)),
        };

        let path = loader
            .save_history(&series)
            .with_context(|| format!("Failed to store {}", pair))?;
        total_rows += series.spot.len();
        pb.println(format!(
            "  {}: {} spot rows, {} swap rows -> {}",
            pair,
            series.spot.len(),
            series.swap_points.len(),
            path.display()
        ));
        pb.inc(1);
    }

    pb.finish_with_message("complete");

    let elapsed = start_time.elapsed();
    println!("\nDownload Complete!");
    println!("  Total requests: {}", client.request_count());
    println!("  Total rows: {}", total_rows);
    println!("  Elapsed time: {:.1} seconds", elapsed.as_secs_f64());
    println!("  Errors: {}", errors.len());
    for e in &errors {
        println!("    {}", e);
    }

    Ok(())
}

fn cmd_validate(data_dir: PathBuf) -> Result<()> {
    let loader = DataLoader::new(&data_dir);
    let pairs = loader.available_pairs()?;
    if pairs.is_empty() {
        println!("No history files under {}", data_dir.join("history").display());
        return Ok(());
    }

    println!("Validating stored history...\n");
    for pair in &pairs {
        let series = match loader.load_history(pair) {
            Ok(series) => series,
            Err(e) => {
                println!("{}: unreadable ({})", pair, e);
                continue;
            }
        };
        let rows = series.align();
        let gaps = rows.iter().filter(|r| r.swap_points.is_none()).count();
        let spot_gaps = rows.iter().filter(|r| r.spot.is_none()).count();

        println!("{}:", pair);
        println!("  Rows: {}", rows.len());
        match series.date_range() {
            Some((start, end)) => println!("  Date range: {} to {}", start, end),
            None => println!("  Date range: n/a"),
        }
        println!("  Spot gaps: {}", spot_gaps);
        println!("  Swap gaps: {}", gaps);
        println!();
    }

    Ok(())
}

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env().add_directive("cip_backtest=info".parse()?),
        )
        .init();

    let cli = Cli::parse();

    // Ensure data directory exists
    fs::create_dir_all(&cli.data_dir)?;

    match cli.command {
        Commands::Explore { pairs } => {
            cmd_explore(split_pairs(&pairs))?;
        }
        Commands::Download {
            pairs,
            days,
            keep_going,
        } => {
            cmd_download(cli.data_dir, split_pairs(&pairs), days, keep_going)?;
        }
        Commands::Validate => {
            cmd_validate(cli.data_dir)?;
        }
    }

    Ok(())
}
