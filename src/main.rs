//! Binance Account Monitor - Main Entry Point

use anyhow::Result;
use binance_account_monitor::config::{load_accounts, Config};
use binance_account_monitor::display::{self, DisplayState};
use binance_account_monitor::exchange::BinanceClient;
use binance_account_monitor::monitor::{AccountRegistry, Poller};
use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{error, info, Level};
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::EnvFilter;

/// Binance Account Monitor CLI
#[derive(Parser)]
#[command(name = "binance-account-monitor")]
#[command(version, about = "Multi-account Binance balance and position monitor")]
struct Cli {
    /// Accounts file (overrides monitor.accounts_file)
    #[arg(short, long, global = true)]
    accounts: Option<String>,

    /// Seconds between poll cycles (overrides monitor.poll_interval_secs)
    #[arg(short, long, global = true)]
    interval: Option<u64>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll all accounts until interrupted (default)
    Watch,

    /// Poll all accounts once and exit
    Once,

    /// Show futures ticker prices
    Prices {
        /// Only show these symbols (e.g. BTCUSDT ETHUSDT)
        symbols: Vec<String>,
    },

    /// Show the biggest 24h futures gainers and losers
    Movers {
        /// Number of symbols on each side
        #[arg(short, long, default_value = "10")]
        top: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse CLI arguments
    let cli = Cli::parse();

    init_logging()?;

    let mut config = Config::load()?;
    if let Some(accounts) = cli.accounts {
        config.monitor.accounts_file = accounts;
    }
    if let Some(interval) = cli.interval {
        config.monitor.poll_interval_secs = interval;
    }
    config.validate()?;

    match cli.command.unwrap_or(Commands::Watch) {
        Commands::Watch => run_watch(&config).await,
        Commands::Once => run_once(&config).await,
        Commands::Prices { symbols } => show_prices(&config, &symbols).await,
        Commands::Movers { top } => show_movers(&config, top).await,
    }
}

/// Build the registry from the accounts file.
fn build_registry(config: &Config) -> Result<Arc<AccountRegistry>> {
    let credentials = load_accounts(&config.monitor.accounts_file)?;
    let registry = AccountRegistry::from_credentials(&config.exchange, &credentials)?;
    info!(
        "📋 Loaded {} accounts from {}",
        registry.len(),
        config.monitor.accounts_file
    );
    Ok(Arc::new(registry))
}

/// Poll until Ctrl-C, redrawing after every cycle.
async fn run_watch(config: &Config) -> Result<()> {
    info!(
        "Binance Account Monitor v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    let registry = build_registry(config)?;
    let (tx, rx) = mpsc::unbounded_channel();
    let state = DisplayState::new(registry.names());
    let poller = Poller::new(
        registry,
        Duration::from_secs(config.monitor.poll_interval_secs),
        tx,
    );

    // Shutdown signal
    let stop = poller.stop_handle();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("🛑 Shutdown signal received");
        stop.stop();
    });

    let poll_task = tokio::spawn(poller.run());
    display::consume(rx, state, |state| println!("{}", state.render())).await;

    if let Err(e) = poll_task.await {
        error!("Poller task failed: {}", e);
    }

    info!("👋 Monitor shutdown complete");
    Ok(())
}

/// Single refresh of every account.
async fn run_once(config: &Config) -> Result<()> {
    let registry = build_registry(config)?;
    let (tx, rx) = mpsc::unbounded_channel();
    let state = DisplayState::new(registry.names());

    let mut poller = Poller::new(
        registry,
        Duration::from_secs(config.monitor.poll_interval_secs),
        tx,
    );
    let stats = poller.run_once().await;
    drop(poller);

    let state = display::consume(rx, state, |_| {}).await;
    println!("{}", state.render());

    anyhow::ensure!(
        stats.succeeded > 0 || stats.accounts == 0,
        "every fetch failed ({} failures)",
        stats.failed
    );
    Ok(())
}

async fn show_prices(config: &Config, symbols: &[String]) -> Result<()> {
    let client = BinanceClient::public(&config.exchange)?;
    let wanted: Vec<&str> = symbols.iter().map(String::as_str).collect();
    let filter = (!wanted.is_empty()).then_some(wanted.as_slice());

    let prices = client.fetch_futures_prices(filter).await?;
    print!("{}", display::render_prices(&prices));
    Ok(())
}

async fn show_movers(config: &Config, top: usize) -> Result<()> {
    let client = BinanceClient::public(&config.exchange)?;
    let tickers = client.fetch_futures_24h_tickers().await?;
    print!("{}", display::render_movers(&tickers, top));
    Ok(())
}

/// Initialize logging to stderr and an hourly rolling file.
fn init_logging() -> Result<()> {
    use tracing_subscriber::fmt::writer::MakeWriterExt;

    // Create logs directory
    std::fs::create_dir_all("logs")?;

    let file_appender = tracing_appender::rolling::hourly("logs", "account-monitor.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);

    // Keep the guard alive for the program duration
    Box::leak(Box::new(guard));

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env()
                .add_directive("binance_account_monitor=debug".parse()?)
                .add_directive(Level::INFO.into()),
        )
        .with_writer(std::io::stderr.and(file_writer))
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .with_span_events(FmtSpan::CLOSE)
        .init();

    Ok(())
}
