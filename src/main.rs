//! Cross-exchange BTC/USD arbitrage monitor
//!
//! Runs the connector set and either loops on a refresh cadence or emits
//! a single snapshot as JSON for the serving layer.

use btc_arb::{aggregator::PriceAggregator, arbitrage, config::Config};
use clap::{Parser, Subcommand};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "btc-arb")]
#[command(about = "Cross-exchange BTC/USD price monitor and arbitrage detector")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file path (defaults to built-in exchange settings)
    #[arg(short, long)]
    config: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Poll all exchanges on a fixed cadence and log each snapshot
    Run {
        /// Refresh interval override, seconds
        #[arg(long)]
        interval: Option<u64>,
        /// Also log the ranked opportunity list each cycle
        #[arg(long)]
        opportunities: bool,
    },
    /// Emit one snapshot as JSON and exit
    Snapshot {
        /// Include the ranked opportunity list
        #[arg(long)]
        opportunities: bool,
        /// Pretty-print the JSON
        #[arg(long)]
        pretty: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => Config::load(path)?,
        None => Config::load_default()?,
    };

    match cli.command {
        Commands::Run {
            interval,
            opportunities,
        } => {
            if let Some(secs) = interval {
                config.refresh_interval_secs = secs;
            }
            run_loop(config, opportunities).await
        }
        Commands::Snapshot {
            opportunities,
            pretty,
        } => {
            let aggregator = PriceAggregator::from_config(&config)?;
            let report = aggregator.report(opportunities).await?;
            let json = if pretty {
                serde_json::to_string_pretty(&report)?
            } else {
                serde_json::to_string(&report)?
            };
            println!("{json}");
            Ok(())
        }
    }
}

async fn run_loop(config: Config, show_opportunities: bool) -> anyhow::Result<()> {
    let aggregator = PriceAggregator::from_config(&config)?;
    info!(
        exchanges = aggregator.exchange_count(),
        interval_secs = config.refresh_interval_secs,
        "starting refresh loop"
    );

    let mut ticker = tokio::time::interval(config.refresh_interval());
    loop {
        ticker.tick().await;

        let snapshot = match aggregator.snapshot().await {
            Ok(s) => s,
            Err(e) => {
                warn!("snapshot failed: {e}");
                continue;
            }
        };

        for quote in &snapshot.quotes {
            match (&quote.price, &quote.error) {
                (Some(price), _) => info!("{}: ${price}", quote.exchange),
                (None, Some(error)) => warn!("{}: {error}", quote.exchange),
                _ => {}
            }
        }

        if show_opportunities {
            for opp in arbitrage::opportunities(&snapshot) {
                info!(
                    "buy {} / sell {}: ${:.2} ({:.3}%)",
                    opp.buy_exchange,
                    opp.sell_exchange,
                    opp.price_difference,
                    opp.percentage_difference
                );
            }
        }
    }
}
