use anyhow::Context;
use autotrader::api::{BitbankClient, LineNotifier};
use autotrader::config::{Credentials, Settings};
use autotrader::execution::{
    report_balances, run_session, supervise, watch_rsi, OrderLifecycle, RunOutcome,
    SessionReport, Termination,
};
use autotrader::indicators::CandleIndicators;
use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::PathBuf;
use std::process::ExitCode;

/// bitbank spot auto-trader with LINE notifications
#[derive(Parser, Debug)]
#[command(name = "autotrader", version, about)]
struct Cli {
    /// Settings file (defaults to ./autotrader.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run buy→sell cycles on the configured pair
    Trade {
        /// Override `trading.cycles`
        #[arg(long)]
        cycles: Option<u32>,
    },
    /// Send LINE alerts when RSI is oversold
    WatchRsi {
        /// Stop after N passes over every pair and interval
        #[arg(long)]
        rounds: Option<u32>,
    },
    /// Print account balances for the reported assets
    Balances,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            tracing::error!("Startup failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("autotrader=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    // Fail fast on config and secrets before touching the network
    let mut settings = Settings::load(cli.config.as_deref()).context("Failed to load settings")?;
    let credentials = Credentials::from_env()?;

    let client = BitbankClient::new(&credentials, &settings.api)?;
    let notifier = LineNotifier::new(credentials.line_notify_token.clone(), &settings.api)?;

    let code = match cli.command {
        Command::Trade { cycles } => {
            if let Some(cycles) = cycles {
                settings.trading.cycles = cycles;
                settings.trading.validate()?;
            }
            tracing::info!("Trading config: {:?}", settings.trading);

            let lifecycle = OrderLifecycle::new(
                client.clone(),
                CandleIndicators::new(client),
                notifier.clone(),
                settings.trading,
            );
            let termination =
                supervise(&notifier, "Trading", run_session(&lifecycle), interrupt()).await;
            if let Termination::Finished(report) = &termination {
                log_report(report);
            }
            ExitCode::from(&termination)
        }
        Command::WatchRsi { rounds } => {
            if rounds.is_some() {
                settings.watch.rounds = rounds;
            }
            let indicators = CandleIndicators::new(client);
            let termination = supervise(
                &notifier,
                "RSI watch",
                watch_rsi(&indicators, &notifier, &settings.watch),
                interrupt(),
            )
            .await;
            if let Termination::Finished(alerts) = &termination {
                tracing::info!("RSI watch sent {} alert(s)", alerts);
            }
            ExitCode::from(&termination)
        }
        Command::Balances => {
            let balances = report_balances(&client, &settings.trading.report_assets).await?;
            for (asset, amount) in &balances {
                println!("{}: {}", asset, amount);
            }
            ExitCode::SUCCESS
        }
    };

    Ok(code)
}

fn log_report(report: &SessionReport) {
    match &report.outcome {
        RunOutcome::Completed => tracing::info!(
            "Completed {} cycle(s), P&L {}",
            report.cycles_run,
            report.total_profit
        ),
        RunOutcome::ActiveOrdersRemain { open_orders } => tracing::warn!(
            "Stopped after {} cycle(s) with {} open order(s), P&L {}",
            report.cycles_run,
            open_orders.len(),
            report.total_profit
        ),
    }
}

/// Resolves on Ctrl-C; never resolves if the signal handler cannot be installed
fn interrupt() -> impl Future<Output = ()> {
    async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!("Ctrl-C handler unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
