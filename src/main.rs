//! # Evaluate one quote
//! cip-backtest evaluate --spot 1.16910 --observed 1.16930
//!
//! # Backtest from a history CSV (or OANDA when --history is omitted)
//! cip-backtest backtest --pair EUR_USD --history data/history/EUR_USD.csv
//!
//! # Parameter sweep, then rank the results
//! cip-backtest optimize --pair EUR_USD --history data/history/EUR_USD.csv --output results/sweep.csv
//! cip-backtest analyze --results results/sweep.csv --top 5
//!
//! # Monte-Carlo PnL distribution of a locked forward
//! cip-backtest simulate --spot 1.1691 --observed 1.1705 --seed 42
//!
//! # Live monitor against OANDA (OANDA_TOKEN / OANDA_ACCOUNT_ID)
//! cip-backtest monitor --cycles 10 --interval 5 --swap-points

use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{info, warn};

use cip_backtest::backtest::{estimate_pnl, BacktestEngine};
use cip_backtest::config::AppConfig;
use cip_backtest::data::{load_history_file, HistoricalSeries, MarketDataProvider, OandaClient};
use cip_backtest::metrics::MetricsCalculator;
use cip_backtest::monitor::{ForwardSource, LiveMonitor};
use cip_backtest::optimize::{analyze_results, format_table, write_results_csv, ParameterSweep};
use cip_backtest::pricing::{observed_forward, ForwardPair};
use cip_backtest::signal::DeviationSignal;
use cip_backtest::simulation::MonteCarloSimulator;

const SEPARATOR: &str = "============================================================";
const DEFAULT_CONFIG: &str = "config/default.toml";

#[derive(Parser)]
#[command(name = "cip-backtest")]
#[command(about = "Covered-interest-parity FX forward arbitrage toolkit")]
#[command(version)]
struct Cli {
    /// Path to configuration file (defaults to config/default.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

/// Rate and tenor overrides shared by several commands.
#[derive(clap::Args, Clone, Debug)]
struct RateArgs {
    /// Domestic annual rate
    #[arg(long)]
    r_dom: Option<f64>,

    /// Foreign annual rate
    #[arg(long)]
    r_for: Option<f64>,

    /// Forward tenor in days
    #[arg(long)]
    tenor: Option<u32>,
}

/// Where historical rows come from.
#[derive(clap::Args, Clone, Debug)]
struct HistoryArgs {
    /// Currency pair, OANDA format
    #[arg(long, default_value = "EUR_USD")]
    pair: String,

    /// History CSV (date, spot, swap_points); fetched from OANDA when omitted
    #[arg(long)]
    history: Option<PathBuf>,

    /// Days of history to fetch from OANDA
    #[arg(long)]
    days: Option<u32>,

    /// Replace missing swap points with this value before running
    #[arg(long)]
    fill_swaps: Option<f64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Price and classify a single quote
    Evaluate {
        /// Spot mid
        #[arg(long)]
        spot: f64,

        /// Observed outright forward
        #[arg(long, conflicts_with = "swap_points")]
        observed: Option<f64>,

        /// Daily swap-point rate (observed = spot + swap * tenor / 360)
        #[arg(long)]
        swap_points: Option<f64>,

        /// Exit reference for the PnL estimate (defaults to the theoretical forward)
        #[arg(long)]
        exit: Option<f64>,

        #[command(flatten)]
        rates: RateArgs,

        /// Signal threshold (bps)
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Run a single backtest
    Backtest {
        #[command(flatten)]
        source: HistoryArgs,

        #[command(flatten)]
        rates: RateArgs,

        /// Signal threshold (bps)
        #[arg(long)]
        threshold: Option<f64>,

        /// Write the full result as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },

    /// Sweep threshold x stop-loss x spread and export the results
    Optimize {
        #[command(flatten)]
        source: HistoryArgs,

        #[command(flatten)]
        rates: RateArgs,

        /// Output CSV
        #[arg(short, long, default_value = "results/sweep.csv")]
        output: PathBuf,

        /// Rows to print
        #[arg(long, default_value_t = 5)]
        top: usize,
    },

    /// Rank a previously exported sweep
    Analyze {
        /// Sweep results CSV
        #[arg(short, long, default_value = "results/sweep.csv")]
        results: PathBuf,

        /// Rows to print
        #[arg(long, default_value_t = 5)]
        top: usize,
    },

    /// Monte-Carlo PnL distribution for a locked forward
    Simulate {
        /// Starting spot
        #[arg(long)]
        spot: f64,

        /// Forward rate locked at entry
        #[arg(long)]
        observed: f64,

        /// Days per path
        #[arg(long)]
        days: Option<usize>,

        /// Number of paths
        #[arg(long)]
        sims: Option<usize>,

        /// RNG seed
        #[arg(long)]
        seed: Option<u64>,

        /// Histogram buckets to print
        #[arg(long, default_value_t = 20)]
        bins: usize,
    },

    /// Poll OANDA and print the monitor table each cycle
    Monitor {
        /// Number of update cycles
        #[arg(long, default_value_t = 1)]
        cycles: u64,

        /// Seconds between cycles
        #[arg(long, default_value_t = 5)]
        interval: u64,

        /// Comma-separated pairs
        #[arg(long)]
        pairs: Option<String>,

        /// Observed forward = theoretical shifted by this many bps
        #[arg(long, conflicts_with = "swap_points")]
        offset: Option<f64>,

        /// Observed forward from live swap points
        #[arg(long)]
        swap_points: bool,

        /// Print the simulated PnL distribution for the first pair after the last cycle
        #[arg(long)]
        distribution: bool,
    },
}

fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path).with_context(|| format!("Failed to load {}", path.display())),
        None if Path::new(DEFAULT_CONFIG).exists() => {
            AppConfig::load(DEFAULT_CONFIG).with_context(|| format!("Failed to load {}", DEFAULT_CONFIG))
        }
        None => Ok(AppConfig::default()),
    }
}

fn apply_rates(config: &mut AppConfig, rates: &RateArgs) {
    if let Some(r) = rates.r_dom {
        config.backtest.r_dom = r;
        config.monitor.r_dom = r;
    }
    if let Some(r) = rates.r_for {
        config.backtest.r_for = r;
        config.monitor.r_for = r;
    }
    if let Some(t) = rates.tenor {
        config.backtest.tenor_days = t;
        config.monitor.tenor_days = t;
    }
}

fn load_series(config: &AppConfig, source: &HistoryArgs) -> Result<HistoricalSeries> {
    let mut series = match &source.history {
        Some(path) => load_history_file(path, &source.pair)
            .with_context(|| format!("Failed to load history from {}", path.display()))?,
        None => {
            let client = OandaClient::from_env().context("OANDA credentials required without --history")?;
            let days = source.days.unwrap_or(config.backtest.history_days);
            info!("Fetching {} days of {} from OANDA", days, source.pair);
            client
                .fetch_history(&source.pair, days)
                .with_context(|| format!("Failed to fetch history for {}", source.pair))?
        }
    };

    if let Some(value) = source.fill_swaps {
        let filled = series.fill_missing_swaps(value);
        info!("Filled {} missing swap points with {}", filled, value);
    }
    if series.is_empty() {
        bail!("No history rows for {}", source.pair);
    }
    Ok(series)
}

fn cmd_evaluate(
    config: &AppConfig,
    spot: f64,
    observed: Option<f64>,
    swap_points: Option<f64>,
    exit: Option<f64>,
) -> Result<()> {
    let bt = &config.backtest;
    let rates = bt.rates();
    let observed = match (observed, swap_points) {
        (Some(fwd), _) => fwd,
        (None, Some(swap)) => observed_forward(spot, swap, rates.tenor_days)?,
        (None, None) => bail!("Either --observed or --swap-points is required"),
    };

    let forwards = ForwardPair::evaluate(spot, observed, &rates)?;
    let deviation = DeviationSignal::new(forwards.deviation_bps()?, bt.threshold_bps)?;
    let exit = exit.unwrap_or(forwards.theoretical);
    let pnl = estimate_pnl(
        deviation.signal,
        forwards.observed,
        exit,
        bt.notional,
        bt.spread_bps,
        bt.stop_loss_bps,
    )?;

    println!("{}", SEPARATOR);
    println!("CIP evaluation ({}d, r_dom {}, r_for {})", rates.tenor_days, rates.r_dom, rates.r_for);
    println!("{}", SEPARATOR);
    println!("  Spot:                {:.6}", forwards.spot);
    println!("  Theoretical forward: {:.6}", forwards.theoretical);
    println!("  Observed forward:    {:.6}", forwards.observed);
    println!("  Deviation:           {:+.3} bps", deviation.deviation_bps);
    println!("  Signal:              {} ({})", deviation.signal, deviation.signal.action());
    println!(
        "  PnL vs {:.6}:   ${:.2} (raw ${:.2}, spread ${:.2}, floor ${:.2})",
        exit, pnl.clamped_pnl, pnl.raw_pnl, pnl.spread_cost, pnl.stop_floor
    );
    Ok(())
}

fn cmd_backtest(config: &AppConfig, source: &HistoryArgs, json: Option<&Path>) -> Result<()> {
    let series = load_series(config, source)?;
    let result = BacktestEngine::new(config.backtest.clone()).run_series(&series)?;
    let metrics = MetricsCalculator::calculate(&result);

    println!("{}\n", result.summary());
    println!("{}\n", metrics.summary());

    let months = MetricsCalculator::monthly_pnl(&result);
    if !months.is_empty() {
        println!("Monthly PnL");
        for m in &months {
            println!(
                "  {}-{:02}  ${:>12.2}  {:>4} trades  {:>5.1}%",
                m.year,
                m.month,
                m.pnl,
                m.trades,
                m.win_rate * 100.0
            );
        }
    }

    for failure in result.failures.iter().take(10) {
        warn!("{}: {} ({})", failure.date, failure.message, failure.kind);
    }

    if let Some(path) = json {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&result)?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        println!("\nResult written to {}", path.display());
    }
    Ok(())
}

fn cmd_optimize(config: &AppConfig, source: &HistoryArgs, output: &Path, top: usize) -> Result<()> {
    let series = load_series(config, source)?;
    let rows = series.align();

    let sweep = ParameterSweep::new(config.backtest.clone()).with_grid(config.grid.clone());
    let pb = ProgressBar::new(sweep.grid().total_combinations() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} {msg}")?
            .progress_chars("=>-"),
    );
    pb.set_message(source.pair.clone());

    let result = sweep.run_with_progress(&source.pair, &rows, |done, _| pb.set_position(done as u64));
    pb.finish_with_message(format!("{} complete", source.pair));

    for failure in &result.failures {
        warn!("{}: {}", failure.params.key(), failure.message);
    }

    write_results_csv(output, &result.rows)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    println!("\nWrote {} rows to {}\n", result.rows.len(), output.display());
    print!("{}", format_table(&result.top_by_total_pnl(top)));
    Ok(())
}

fn cmd_analyze(results: &Path, top: usize) -> Result<()> {
    let rows = analyze_results(results, top)
        .with_context(|| format!("Failed to read {}", results.display()))?;
    println!("Top {} by total PnL ({})\n", rows.len(), results.display());
    print!("{}", format_table(&rows));
    Ok(())
}

fn cmd_simulate(config: &AppConfig, spot: f64, observed: f64, bins: usize) -> Result<()> {
    let sim = MonteCarloSimulator::new(config.simulation.clone());
    let matrix = sim.simulate(spot, observed)?;
    let dist = matrix.distribution();

    println!("{}", SEPARATOR);
    println!(
        "Simulated {} paths x {} days (shock ±{:.2}%, notional {})",
        matrix.num_sims(),
        matrix.days(),
        config.simulation.daily_shock * 100.0,
        config.simulation.notional
    );
    println!("{}", SEPARATOR);
    println!("{}\n", dist.summary());

    let hist = matrix.histogram(bins);
    let peak = hist.iter().map(|b| b.count).max().unwrap_or(0).max(1);
    for bin in &hist {
        let width = bin.count * 40 / peak;
        println!("{:>12.0} .. {:>12.0} | {:<40} {}", bin.lower, bin.upper, "#".repeat(width), bin.count);
    }
    Ok(())
}

fn cmd_monitor(config: &AppConfig, cycles: u64, interval: u64, distribution: bool) -> Result<()> {
    let client = OandaClient::from_env().context("OANDA credentials required for the monitor")?;
    let monitor = LiveMonitor::new(config.monitor.clone())?;
    let mut state = monitor.new_state();

    for cycle in 0..cycles {
        if cycle > 0 {
            thread::sleep(Duration::from_secs(interval));
        }
        let snapshot = monitor.update(&client, &mut state);
        println!("{}", SEPARATOR);
        println!("Cycle {} ({} requests so far)", snapshot.cycle, client.request_count());
        println!("{}", SEPARATOR);
        print!("{}", snapshot.format_table());
        for alert in &snapshot.alerts {
            println!("  ! {}", alert.message);
        }
    }

    if distribution {
        if let Some(pair) = config.monitor.pairs.first() {
            let matrix = monitor
                .pnl_distribution(&client, pair)
                .with_context(|| format!("Failed to simulate {}", pair))?;
            println!("\n{}: {}", pair, matrix.distribution().summary());
        }
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
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Evaluate {
            spot,
            observed,
            swap_points,
            exit,
            rates,
            threshold,
        } => {
            apply_rates(&mut config, &rates);
            if let Some(t) = threshold {
                config.backtest.threshold_bps = t;
            }
            cmd_evaluate(&config, spot, observed, swap_points, exit)?;
        }
        Commands::Backtest {
            source,
            rates,
            threshold,
            json,
        } => {
            apply_rates(&mut config, &rates);
            if let Some(t) = threshold {
                config.backtest.threshold_bps = t;
            }
            cmd_backtest(&config, &source, json.as_deref())?;
        }
        Commands::Optimize {
            source,
            rates,
            output,
            top,
        } => {
            apply_rates(&mut config, &rates);
            cmd_optimize(&config, &source, &output, top)?;
        }
        Commands::Analyze { results, top } => {
            cmd_analyze(&results, top)?;
        }
        Commands::Simulate {
            spot,
            observed,
            days,
            sims,
            seed,
            bins,
        } => {
            if let Some(d) = days {
                config.simulation.days = d;
            }
            if let Some(n) = sims {
                config.simulation.num_sims = n;
            }
            if seed.is_some() {
                config.simulation.seed = seed;
            }
            cmd_simulate(&config, spot, observed, bins)?;
        }
        Commands::Monitor {
            cycles,
            interval,
            pairs,
            offset,
            swap_points,
            distribution,
        } => {
            if let Some(pairs) = pairs {
                config.monitor.pairs = pairs.split(',').map(|s| s.trim().to_string()).collect();
            }
            if let Some(offset_bps) = offset {
                config.monitor.source = ForwardSource::Manual { offset_bps };
            } else if swap_points {
                config.monitor.source = ForwardSource::SwapPoints;
            }
            cmd_monitor(&config, cycles, interval, distribution)?;
        }
    }

    Ok(())
}
