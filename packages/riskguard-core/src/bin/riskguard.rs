//! RiskGuard CLI - risk analytics over a local price snapshot.
//!
//! Every command prints one `ApiResponse` JSON document on stdout; logs go
//! to stderr.

use anyhow::Context;
use chrono::{Days, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use riskguard_core::{
    data::{
        bootstrap, daily_price_series, normalize, resample_to_daily, Lookback, MemoryPriceStore,
        PriceHistoryProvider, RawFrame,
    },
    forecast::ForecastEngine,
    portfolio::{position_valuations, PortfolioPerformance, PortfolioTracker},
    scenario::{risk_view, run_backtest, run_stress, StressShock, VarMethod},
    search::SymbolSearch,
    ApiResponse, EngineConfig, Portfolio,
};
use serde_json::{json, Value};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "riskguard")]
#[command(about = "RiskGuard CLI - portfolio risk and forecasting")]
#[command(version)]
struct Cli {
    /// Price snapshot file (defaults to ~/.riskguard/prices.json)
    #[arg(long, global = true)]
    prices: Option<PathBuf>,

    /// Portfolio file (defaults to ~/.riskguard/portfolio.json)
    #[arg(long, global = true)]
    portfolio: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Position management commands
    Positions {
        #[command(subcommand)]
        action: PositionsAction,
    },
    /// Import a vendor price table (JSON) for one symbol
    Import {
        #[arg(short, long)]
        symbol: String,
        /// Path to a JSON frame: {"columns": [...], "index": [...], "rows": [[...]]}
        #[arg(short, long)]
        file: PathBuf,
        /// Only store the newest bar, subject to the jump guard
        #[arg(long)]
        latest: bool,
        /// Collapse intraday bars to one bar per day first
        #[arg(long)]
        intraday: bool,
    },
    /// Risk panel: volatility, Sharpe, drawdown, VaR/ES, correlations
    Risk {
        /// Confidence level (0.95 = 95%)
        #[arg(long)]
        alpha: Option<f64>,
        /// "param" or "hist"
        #[arg(long, default_value = "param")]
        method: String,
    },
    /// Forecast a symbol's daily close
    Forecast {
        #[arg(short, long)]
        symbol: String,
        /// Steps ahead
        #[arg(long)]
        horizon: Option<usize>,
        #[arg(long)]
        alpha: Option<f64>,
        /// History window fed to the models ("6M", "1Y", "MAX")
        #[arg(long, default_value = "MAX")]
        lookback: String,
    },
    /// Buy-and-hold backtest against the benchmark
    Backtest {
        /// First date (YYYY-MM-DD); defaults to a year ago
        #[arg(long)]
        start: Option<NaiveDate>,
    },
    /// Apply an instant shock of 5, 10 or 20 percent
    Stress {
        #[arg(long, default_value = "10")]
        shock: String,
    },
    /// Suggest ticker symbols
    Search {
        #[arg(default_value = "")]
        query: String,
    },
}

#[derive(Subcommand)]
enum PositionsAction {
    /// List positions with valuation
    List,
    /// Add to a position (averages cost)
    Add {
        #[arg(short, long)]
        symbol: String,
        #[arg(short = 'n', long)]
        quantity: f64,
        #[arg(short, long)]
        cost: f64,
    },
    /// Set a position to exactly this quantity and cost
    Set {
        #[arg(short, long)]
        symbol: String,
        #[arg(short = 'n', long)]
        quantity: f64,
        #[arg(short, long)]
        cost: f64,
    },
    /// Remove a position
    Remove {
        #[arg(short, long)]
        symbol: String,
    },
    /// Add the starter positions to an empty portfolio and load history
    /// for the default tickers
    Seed,
}

fn main() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let output = match run(cli) {
        Ok(data) => serde_json::to_string_pretty(&ApiResponse::ok(data)),
        Err(e) => {
            tracing::debug!("Command failed: {:#}", e);
            serde_json::to_string_pretty(&ApiResponse::<()>::err(format!("{:#}", e)))
        }
    };

    match output {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Failed to encode response: {}", e);
            std::process::exit(1);
        }
    }
}

fn price_store_path(arg: Option<PathBuf>) -> PathBuf {
    if let Some(path) = arg {
        return path;
    }
    if let Ok(path) = env::var("RISKGUARD_PRICE_FILE") {
        return PathBuf::from(path);
    }
    directories::BaseDirs::new()
        .map(|dirs| dirs.home_dir().join(".riskguard/prices.json"))
        .unwrap_or_else(|| PathBuf::from("prices.json"))
}

fn open_tracker(arg: Option<PathBuf>) -> anyhow::Result<PortfolioTracker> {
    let tracker = match arg {
        Some(path) => PortfolioTracker::with_path(path)?,
        None => PortfolioTracker::new()?,
    };
    Ok(tracker)
}

fn run(cli: Cli) -> anyhow::Result<Value> {
    let config = EngineConfig::load().context("loading config")?;
    let prices_path = price_store_path(cli.prices);
    let mut store = MemoryPriceStore::load_snapshot(&prices_path)
        .with_context(|| format!("reading {}", prices_path.display()))?;

    match cli.command {
        Commands::Positions { action } => {
            let mut tracker = open_tracker(cli.portfolio)?;
            handle_positions(action, &mut tracker, &mut store, &prices_path, &config)
        }
        Commands::Import {
            symbol,
            file,
            latest,
            intraday,
        } => {
            let content =
                fs::read_to_string(&file).with_context(|| format!("reading {}", file.display()))?;
            let frame: RawFrame = serde_json::from_str(&content)?;
            let mut bars = normalize(&frame);
            if intraday {
                bars = resample_to_daily(&bars);
            }

            let written = if latest {
                usize::from(store.apply_latest(&symbol, &bars, config.update_skip_jump)?)
            } else {
                store.upsert_prices(&symbol, &bars)?
            };
            store.save_snapshot(&prices_path)?;
            tracing::info!("Stored {} bar(s) for {}", written, symbol);

            Ok(json!({
                "symbol": symbol.trim().to_uppercase(),
                "parsed": bars.len(),
                "written": written,
            }))
        }
        Commands::Risk { alpha, method } => {
            let tracker = open_tracker(cli.portfolio)?;
            let method: VarMethod = method.parse()?;
            let view = risk_view(&tracker, &store, &config, alpha.unwrap_or(config.alpha), method)?;
            let (var_label, es_label) = view.labels();
            Ok(json!({
                "view": view,
                "var_label": var_label,
                "es_label": es_label,
            }))
        }
        Commands::Forecast {
            symbol,
            horizon,
            alpha,
            lookback,
        } => {
            let lookback: Lookback = lookback.parse()?;
            let history = lookback.apply(&daily_price_series(
                &store,
                &symbol,
                config.outlier_max_jump,
            ));
            let engine = ForecastEngine::default();
            let result = engine.forecast(
                &history,
                horizon.unwrap_or(config.forecast_horizon),
                alpha.unwrap_or(config.alpha),
            );
            Ok(json!({
                "symbol": symbol.trim().to_uppercase(),
                "lookback": lookback.to_string(),
                "history": history,
                "result": result,
            }))
        }
        Commands::Backtest { start } => {
            let tracker = open_tracker(cli.portfolio)?;
            let start = start.or_else(|| {
                let lookback = Days::new(config.backtest_lookback_days.max(0) as u64);
                Utc::now().date_naive().checked_sub_days(lookback)
            });
            let report = run_backtest(&tracker, &mut store, &config, start)?;
            Ok(json!({
                "note": report.note(),
                "report": report,
            }))
        }
        Commands::Stress { shock } => {
            let tracker = open_tracker(cli.portfolio)?;
            let shock: StressShock = shock.parse()?;
            let report = run_stress(&tracker, &store, &config, shock)?;
            Ok(json!({
                "summary": report.summary(),
                "report": report,
            }))
        }
        Commands::Search { query } => {
            let mut search = SymbolSearch::new(store, config.search_cache_capacity);
            Ok(json!({ "results": search.search(&query) }))
        }
    }
}

fn handle_positions(
    action: PositionsAction,
    tracker: &mut PortfolioTracker,
    store: &mut MemoryPriceStore,
    prices_path: &Path,
    config: &EngineConfig,
) -> anyhow::Result<Value> {
    match action {
        PositionsAction::List => {
            let valued =
                position_valuations(tracker.positions(), &*store, config.outlier_max_jump);
            let portfolio = Portfolio {
                positions: valued,
                ..tracker.get().clone()
            };
            Ok(json!({
                "positions": portfolio.positions,
                "performance": PortfolioPerformance::from_portfolio(&portfolio),
                "updated_at": portfolio.updated_at,
            }))
        }
        PositionsAction::Add {
            symbol,
            quantity,
            cost,
        } => {
            let (position, was_update) = tracker.add_position(&symbol, quantity, cost);
            tracker.save()?;
            Ok(json!({
                "position": position,
                "action": if was_update { "updated" } else { "added" },
            }))
        }
        PositionsAction::Set {
            symbol,
            quantity,
            cost,
        } => {
            let position = tracker.set_position(&symbol, quantity, cost)?;
            tracker.save()?;
            Ok(json!({ "position": position }))
        }
        PositionsAction::Remove { symbol } => {
            let removed = tracker.remove_position(&symbol)?;
            tracker.save()?;
            Ok(json!({ "removed": removed }))
        }
        PositionsAction::Seed => {
            let seeded = tracker.seed_defaults();
            if seeded {
                tracker.save()?;
            }
            let missing = bootstrap(store, config)?;
            store.save_snapshot(prices_path)?;
            Ok(json!({
                "seeded": seeded,
                "positions": tracker.positions(),
                "missing_history": missing,
            }))
        }
    }
}
