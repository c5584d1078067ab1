//! PriceVault CLI: sync, plan, and inspect the local price store.
//!
//! Commands:
//! - `sync`: fetch new daily rows for every symbol and persist them
//! - `plan`: write the current watermark of every symbol to a plan CSV
//! - `status`: latest close and one-day change per stored symbol
//! - `history`: full stored history for one symbol

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use pricevault_core::data::PriceStore;
use pricevault_core::Universe;
use pricevault_runner::{
    build_provider, read_plan, resolve_plan, run_sync, write_plan, LogProgress, RunReport,
    SyncConfig, SyncInput,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "pricevault",
    about = "PriceVault: incremental daily OHLCV store"
)]
struct Cli {
    /// TOML config file. Flags override its values.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database file.
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Debug-level logging (RUST_LOG takes precedence).
    #[arg(short, long, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and persist new rows for every symbol.
    Sync {
        /// Symbol universe CSV (needs a `symbol` column).
        #[arg(long, default_value = "data/symbols.csv")]
        universe: PathBuf,

        /// Use watermarks from a plan CSV instead of reading the store.
        #[arg(long)]
        plan: Option<PathBuf>,

        /// Fetch worker count. Defaults to 4x available cores.
        #[arg(long)]
        workers: Option<usize>,

        /// Lookback horizon for never-ingested symbols, in 365-day years.
        #[arg(long)]
        lookback_years: Option<u32>,

        /// Treat this date (YYYY-MM-DD) as today.
        #[arg(long)]
        today: Option<String>,

        /// Keep at most this many symbols from the universe.
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Write each symbol's last stored date to a plan CSV.
    Plan {
        /// Symbol universe CSV (needs a `symbol` column).
        #[arg(long, default_value = "data/symbols.csv")]
        universe: PathBuf,

        /// Output plan CSV.
        #[arg(long, default_value = "data/download_plan.csv")]
        output: PathBuf,
    },
    /// Latest close and one-day change for every stored symbol.
    Status,
    /// Full stored history for one symbol.
    History {
        symbol: String,

        /// Print JSON instead of a table.
        #[arg(long, default_value_t = false)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = match &cli.config {
        Some(path) => SyncConfig::from_file(path)?,
        None => SyncConfig::default(),
    };
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    tracing::debug!(
        db = %config.db_path.display(),
        lookback_years = config.lookback_years,
        "config resolved"
    );

    match cli.command {
        Commands::Sync {
            universe,
            plan,
            workers,
            lookback_years,
            today,
            limit,
        } => {
            if workers.is_some() {
                config.workers = workers;
            }
            if let Some(years) = lookback_years {
                config.lookback_years = years;
            }
            if let Some(today) = today {
                config.today = Some(parse_date(&today)?);
            }
            if limit.is_some() {
                config.universe.limit = limit;
            }
            run_sync_cmd(&config, &universe, plan.as_deref())
        }
        Commands::Plan { universe, output } => run_plan_cmd(&config, &universe, &output),
        Commands::Status => run_status_cmd(&config.db_path),
        Commands::History { symbol, json } => run_history_cmd(&config.db_path, &symbol, json),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn run_sync_cmd(config: &SyncConfig, universe_path: &Path, plan_path: Option<&Path>) -> Result<()> {
    let input = match plan_path {
        Some(path) => SyncInput::Plan(read_plan(path)?),
        None => SyncInput::Universe(Universe::from_csv(universe_path, &config.universe)?),
    };

    let provider = build_provider(config)?;
    let report = run_sync(config, input, &provider, &LogProgress)?;
    print_summary(&report);
    Ok(())
}

fn run_plan_cmd(config: &SyncConfig, universe_path: &Path, output: &Path) -> Result<()> {
    let universe = Universe::from_csv(universe_path, &config.universe)?;
    let marks = resolve_plan(&config.db_path, &universe)?;
    write_plan(output, &marks)?;

    let never = marks.iter().filter(|m| m.last_date.is_none()).count();
    println!(
        "Plan written to {} ({} symbols, {} never ingested)",
        output.display(),
        marks.len(),
        never
    );
    Ok(())
}

fn open_existing(db_path: &Path) -> Result<PriceStore> {
    if !db_path.exists() {
        bail!(
            "database does not exist: {} (run `sync` first)",
            db_path.display()
        );
    }
    Ok(PriceStore::open(db_path)?)
}

fn run_status_cmd(db_path: &Path) -> Result<()> {
    let store = open_existing(db_path)?;
    let snapshots = store.snapshots()?;
    if snapshots.is_empty() {
        println!("Store is empty: {}", db_path.display());
        return Ok(());
    }

    println!("Store: {}", db_path.display());
    println!("Symbols: {}", snapshots.len());
    println!("Rows: {}", store.row_count()?);
    println!();
    println!(
        "{:<12} {:<25} {:>8} {:>14} {:>10} {:>9}",
        "Symbol", "Date Range", "Rows", "Close", "Volume", "Change"
    );
    println!("{}", "-".repeat(83));
    for s in &snapshots {
        let change = s
            .change_pct
            .map_or_else(|| "-".to_string(), |c| format!("{c:+.2}%"));
        println!(
            "{:<12} {:<25} {:>8} {:>14.4} {:>10} {:>9}",
            s.symbol,
            format!("{} to {}", s.first_date, s.last_date),
            s.row_count,
            s.last_close,
            format_volume(s.last_volume),
            change
        );
    }
    Ok(())
}

fn run_history_cmd(db_path: &Path, symbol: &str, json: bool) -> Result<()> {
    let store = open_existing(db_path)?;
    let rows = store.history(symbol)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }
    if rows.is_empty() {
        println!("No rows stored for {symbol}");
        return Ok(());
    }

    println!(
        "{:<12} {:>14} {:>14} {:>14} {:>14} {:>16}",
        "Date", "Open", "High", "Low", "Close", "Volume"
    );
    for r in &rows {
        println!(
            "{:<12} {:>14.4} {:>14.4} {:>14.4} {:>14.4} {:>16.0}",
            r.date, r.open, r.high, r.low, r.close, r.volume
        );
    }
    Ok(())
}

fn format_volume(volume: f64) -> String {
    format!("{:.2}M", volume / 1_000_000.0)
}

fn print_summary(report: &RunReport) {
    let s = &report.scheduler;
    let w = &report.writer;
    println!();
    println!("=== Sync Complete ===");
    println!("As of:          {}", report.today);
    println!(
        "Symbols:        {} ({} workers, queue {})",
        report.symbols, report.workers, report.channel_capacity
    );
    println!("Fetched:        {}", s.fetched);
    println!("Up to date:     {}", s.skipped);
    println!("Failed fetches: {}", s.degraded);
    println!("Crashed tasks:  {}", s.crashed);
    println!("Rows fetched:   {}", s.rows_fetched);
    println!("Rows inserted:  {}", w.rows_inserted);
    if w.batches_failed > 0 {
        println!(
            "WARNING: {} batch insert(s) failed; they will be retried next run",
            w.batches_failed
        );
    }
    if let Some(err) = &w.close_error {
        println!("WARNING: store did not close cleanly: {err}");
    }
    println!("Elapsed:        {:.2}s", report.elapsed.as_secs_f64());
    println!();
}
