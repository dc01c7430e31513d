//! Sniper — FX signal poller with a small status API
//!
//! Usage:
//!   sniper serve --port 8000         — Poll in the background and serve the status API
//!   sniper run                       — Poll from the CLI until Ctrl+C
//!   sniper run --once                — Run a single polling cycle and exit

use anyhow::Context;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::Utc;
use clap::{Parser, Subcommand};
use engine::{
    parse_pairs, run_sniper, CycleOutcome, Decision, Direction, HintInbox, LogNotifier, Notifier,
    PriceSource, Sniper, SniperConfig, SniperProgress, Symbol, TelegramNotifier, TwelveDataClient,
};
use persistence::repository::SignalRepository;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, info, warn};

const APP_VERSION: &str = env!("CARGO_PKG_VERSION");
const DEFAULT_SIGNAL_LIMIT: i64 = 50;
const MAX_SIGNAL_LIMIT: i64 = 500;

#[derive(Parser)]
#[command(name = "sniper")]
#[command(about = "Indicator ensemble signal poller for FX pairs", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Seconds between polling cycles (overrides SNIPER_INTERVAL)
    #[arg(long, global = true)]
    interval: Option<u64>,

    /// Comma separated pairs (overrides SNIPER_PAIRS)
    #[arg(long, global = true)]
    pairs: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll in the background and serve the status API
    Serve {
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        #[arg(short, long, default_value_t = 8000)]
        port: u16,
    },
    /// Poll from the command line (no web server)
    Run {
        /// Run one cycle over all pairs and exit
        #[arg(long)]
        once: bool,
    },
}

#[derive(Clone)]
struct AppState {
    pairs: Arc<Vec<Symbol>>,
    poll_interval: Duration,
    progress: Arc<SniperProgress>,
    hints: Arc<HintInbox>,
    db: Arc<persistence::Database>,
}

fn init_logging(verbose: bool) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = if verbose {
        EnvFilter::new("debug,engine=debug,persistence=debug,sniper=debug")
    } else {
        EnvFilter::new("info,engine=info,persistence=info,sniper=info")
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).compact())
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    dotenvy::dotenv().ok();

    let config = load_config(cli.interval, cli.pairs.as_deref())?;

    match cli.command {
        Commands::Serve { host, port } => {
            cmd_serve(config, &host, port).await?;
        }
        Commands::Run { once } => {
            cmd_run(config, once).await?;
        }
    }

    Ok(())
}

fn load_config(interval: Option<u64>, pairs: Option<&str>) -> anyhow::Result<SniperConfig> {
    let mut config = SniperConfig::from_env()?;
    if let Some(secs) = interval {
        anyhow::ensure!(secs > 0, "--interval must be at least 1 second");
        config.poll_interval = Duration::from_secs(secs);
    }
    if let Some(raw) = pairs {
        config.pairs = parse_pairs(raw)?;
    }
    Ok(config)
}

fn build_source(config: &SniperConfig) -> anyhow::Result<Arc<dyn PriceSource>> {
    let api_key = config
        .twelvedata_api_key
        .clone()
        .context("TWELVEDATA_API_KEY is not set")?;
    let client = TwelveDataClient::new(api_key).context("Failed to build TwelveData client")?;
    Ok(Arc::new(client))
}

fn build_notifier(config: &SniperConfig) -> anyhow::Result<Arc<dyn Notifier>> {
    match (&config.telegram_token, &config.telegram_chat_id) {
        (Some(token), Some(chat_id)) => {
            let telegram = TelegramNotifier::new(token.clone(), chat_id.clone())
                .context("Failed to build Telegram client")?;
            info!("Telegram notifications enabled");
            Ok(Arc::new(telegram))
        }
        _ => {
            warn!("Telegram not configured; signals will only be logged");
            Ok(Arc::new(LogNotifier))
        }
    }
}

/// Assemble the sniper and its journal from the configuration
async fn build_sniper(
    config: &SniperConfig,
    hints: Arc<HintInbox>,
) -> anyhow::Result<(Sniper, persistence::Database)> {
    let source = build_source(config)?;
    let notifier = build_notifier(config)?;

    let db = persistence::Database::new(&config.db_path).await.map_err(|e| {
        error!("Failed to initialize database: {}", e);
        anyhow::anyhow!("Database initialization failed: {}", e)
    })?;
    info!("Database initialized: {}", config.db_path);

    let sniper = Sniper::new(config, source, notifier)
        .with_hints(hints)
        .with_journal(db.pool_clone());
    Ok((sniper, db))
}

async fn shutdown_signal(progress: Arc<SniperProgress>) {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for Ctrl+C: {}", e);
    }
    info!("Shutdown requested");
    progress.cancel();
}

// ============================================================================
// Serve command — poller + status API
// ============================================================================

async fn cmd_serve(config: SniperConfig, host: &str, port: u16) -> anyhow::Result<()> {
    info!("Sniper v{} starting...", APP_VERSION);

    let hints = Arc::new(HintInbox::new());
    let progress = Arc::new(SniperProgress::new());
    let (sniper, db) = build_sniper(&config, hints.clone()).await?;

    let state = AppState {
        pairs: Arc::new(config.pairs.clone()),
        poll_interval: config.poll_interval,
        progress: progress.clone(),
        hints,
        db: Arc::new(db),
    };

    let poller = tokio::spawn(run_sniper(sniper, progress.clone()));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        .route("/health", get(api_health))
        .route("/pairs", get(api_pairs))
        .route("/status", get(api_status))
        .route("/status/symbol", get(api_symbol_status))
        .route("/signals", get(api_signals))
        .route("/hints", post(api_submit_hint))
        .with_state(state);

    let app = Router::new().nest("/api", api_routes).layer(cors);

    let addr: std::net::SocketAddr = format!("{}:{}", host, port).parse()?;
    let pair_names: Vec<&str> = config.pairs.iter().map(Symbol::as_str).collect();
    println!("\n=== Sniper v{} ===", APP_VERSION);
    println!("Listening on http://{}", addr);
    println!("\nEndpoints:");
    println!("  GET  /api/health              - Health check");
    println!("  GET  /api/pairs               - Configured pairs");
    println!("  GET  /api/status              - Per-pair status and recent alerts");
    println!("  GET  /api/status/symbol       - Status of one pair (?symbol=EUR/USD)");
    println!("  GET  /api/signals             - Journaled signals (?symbol=&limit=)");
    println!("  POST /api/hints               - Submit an override hint");
    println!("\n  Pairs: {}", pair_names.join(", "));
    println!("  Interval: {}s", config.poll_interval.as_secs());
    println!("  Database: {}", config.db_path);
    println!("\nPress Ctrl+C to stop\n");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(progress.clone()))
        .await?;

    poller.await.context("Sniper loop panicked")?;
    Ok(())
}

// ============================================================================
// Run command — CLI mode (no web server)
// ============================================================================

async fn cmd_run(config: SniperConfig, once: bool) -> anyhow::Result<()> {
    info!(
        pairs = config.pairs.len(),
        interval = config.poll_interval.as_secs(),
        "Sniper v{} starting (CLI mode)",
        APP_VERSION
    );

    let progress = Arc::new(SniperProgress::new());
    let (mut sniper, _db) = build_sniper(&config, Arc::new(HintInbox::new())).await?;

    if once {
        let outcomes = sniper.run_cycle(&progress, Utc::now()).await;
        print_outcomes(&outcomes);
        return Ok(());
    }

    let poller = tokio::spawn(run_sniper(sniper, progress.clone()));
    shutdown_signal(progress.clone()).await;
    poller.await.context("Sniper loop panicked")?;

    println!(
        "\nStopped after {} cycles, {} signals emitted",
        progress.cycles.load(Ordering::Relaxed),
        progress.recent_alerts().len()
    );
    Ok(())
}

fn print_outcomes(outcomes: &[(Symbol, CycleOutcome)]) {
    println!("\n{:<10} {:<8} {:>10}  {}", "Pair", "Signal", "Confidence", "Result");
    println!("{}", "-".repeat(46));
    for (symbol, outcome) in outcomes {
        match outcome {
            CycleOutcome::Decided { decision, emitted } => println!(
                "{:<10} {:<8} {:>10.2}  {}",
                symbol.as_str(),
                decision.direction.as_str(),
                decision.confidence,
                if *emitted { "emitted" } else { "held" }
            ),
            CycleOutcome::Stale => println!("{:<10} {:<8} {:>10}  no new bar", symbol.as_str(), "-", "-"),
            CycleOutcome::FetchFailed => {
                println!("{:<10} {:<8} {:>10}  fetch failed", symbol.as_str(), "-", "-")
            }
        }
    }
    println!();
}

// ============================================================================
// API Handlers
// ============================================================================

/// GET /api/health
async fn api_health(State(state): State<AppState>) -> Json<serde_json::Value> {
    let status = *state.progress.status.read().unwrap();
    Json(serde_json::json!({
        "status": "ok",
        "service": "sniper",
        "version": APP_VERSION,
        "sniper": status,
        "cycles": state.progress.cycles.load(Ordering::Relaxed),
        "time": Utc::now(),
    }))
}

/// GET /api/pairs
async fn api_pairs(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "pairs": *state.pairs,
        "interval_secs": state.poll_interval.as_secs(),
    }))
}

/// GET /api/status — every pair plus the most recent alerts
async fn api_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let progress = &state.progress;
    let alerts: Vec<serde_json::Value> = progress
        .recent_alerts()
        .iter()
        .map(|a| {
            serde_json::json!({
                "alert": a,
                "message": a.message(),
            })
        })
        .collect();

    Json(serde_json::json!({
        "status": *progress.status.read().unwrap(),
        "cycles": progress.cycles.load(Ordering::Relaxed),
        "symbols": progress.snapshot(),
        "recent_alerts": alerts,
        "pending_hints": state.hints.pending_count(),
    }))
}

/// GET /api/status/symbol?symbol=EUR/USD
async fn api_symbol_status(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let symbol = params
        .get("symbol")
        .and_then(|s| Symbol::parse(s).ok())
        .ok_or(StatusCode::BAD_REQUEST)?;

    match state.progress.symbol_status(&symbol) {
        Some(status) => Ok(Json(serde_json::json!({
            "success": true,
            "data": status,
        }))),
        None => Err(StatusCode::NOT_FOUND),
    }
}

/// GET /api/signals?symbol=&limit= — journaled signals, newest first
async fn api_signals(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
) -> Json<serde_json::Value> {
    let limit: i64 = params
        .get("limit")
        .and_then(|s| s.parse().ok())
        .unwrap_or(DEFAULT_SIGNAL_LIMIT)
        .clamp(1, MAX_SIGNAL_LIMIT);

    let symbol = params
        .get("symbol")
        .filter(|s| !s.trim().is_empty())
        .and_then(|s| Symbol::parse(s).ok());

    let repo = SignalRepository::new(state.db.pool());
    match repo.recent_signals(symbol.as_ref().map(Symbol::as_str), limit).await {
        Ok(records) => Json(serde_json::json!({
            "success": true,
            "data": records,
            "total": records.len(),
        })),
        Err(e) => Json(serde_json::json!({
            "success": false,
            "error": format!("Failed to query signals: {}", e),
            "data": [],
            "total": 0,
        })),
    }
}

#[derive(Debug, Deserialize)]
struct HintRequest {
    symbol: String,
    direction: String,
    confidence: f64,
}

/// POST /api/hints — queue an override decision for a pair's next cycle
async fn api_submit_hint(
    State(state): State<AppState>,
    Json(request): Json<HintRequest>,
) -> Result<Json<serde_json::Value>, StatusCode> {
    let symbol = Symbol::parse(&request.symbol).map_err(|_| StatusCode::BAD_REQUEST)?;
    if !state.pairs.contains(&symbol) {
        return Ok(Json(serde_json::json!({
            "success": false,
            "message": format!("{} is not a configured pair", symbol),
        })));
    }

    let direction = match request.direction.trim().to_ascii_uppercase().as_str() {
        "BUY" => Direction::Buy,
        "SELL" => Direction::Sell,
        "NONE" => Direction::None,
        _ => return Err(StatusCode::BAD_REQUEST),
    };
    if !(0.0..=1.0).contains(&request.confidence) {
        return Err(StatusCode::BAD_REQUEST);
    }

    let hint = Decision::new(direction, request.confidence);
    let replaced = state.hints.submit(symbol.clone(), hint);
    info!(
        symbol = %symbol,
        direction = %direction,
        confidence = request.confidence,
        replaced = replaced.is_some(),
        "Override hint queued"
    );

    Ok(Json(serde_json::json!({
        "success": true,
        "message": "Hint queued for the next cycle",
        "replaced": replaced,
    })))
}
