use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use coinbook::app;
use coinbook::config::{default_config_path, ResolvedConfig};
use coinbook::storage::JsonlSeriesStore;
use tokio::sync::broadcast::error::RecvError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "coinbook")]
#[command(about = "Records exchange balances and their value over time")]
struct Cli {
    /// Path to config file
    #[arg(short, long, default_value_os_t = default_config_path())]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Poll every minute and back up at local midnight until interrupted
    Run {
        /// Write each published sample to stdout as a JSON line
        #[arg(long)]
        print_events: bool,

        /// Skip the midnight backup
        #[arg(long)]
        no_backup: bool,
    },

    /// Run a single poll cycle now and print its report
    Poll,

    /// Inspect stored series
    Series {
        #[command(subcommand)]
        command: SeriesCommand,
    },

    /// Show current configuration
    Config,
}

#[derive(Subcommand)]
enum SeriesCommand {
    /// List currencies with a stored series
    List,

    /// Print the full series for one currency
    Show {
        /// Currency code, e.g. BTC
        code: String,
    },
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn run_daemon(config: &ResolvedConfig, print_events: bool, backups: bool) -> Result<()> {
    let services = app::build_services(config).await?;

    if print_events {
        let mut events = services.publisher.subscribe();
        tokio::spawn(async move {
            loop {
                match events.recv().await {
                    Ok(event) => match serde_json::to_string(&event) {
                        Ok(line) => println!("{line}"),
                        Err(err) => tracing::warn!(error = %err, "Failed to encode live event"),
                    },
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "Event printer fell behind; dropped oldest events");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });
    }

    let scheduler = app::scheduler(&services, config, backups);
    scheduler
        .run(async {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %err, "Failed to listen for ctrl-c");
                std::future::pending::<()>().await;
            }
        })
        .await
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true)
                .with_level(true)
                .json(),
        )
        .init();

    let cli = Cli::parse();

    let config = ResolvedConfig::load(&cli.config)
        .with_context(|| format!("Failed to load coinbook config: {}", cli.config.display()))?;

    match cli.command {
        Command::Run {
            print_events,
            no_backup,
        } => run_daemon(&config, print_events, !no_backup).await,
        Command::Poll => {
            let services = app::build_services(&config).await?;
            let report = services.ingest.run_cycle(Utc::now()).await?;
            print_json(&report)
        }
        Command::Series { command } => {
            let store = JsonlSeriesStore::new(&config.data_dir);
            match command {
                SeriesCommand::List => print_json(&app::list_series(&store).await?),
                SeriesCommand::Show { code } => print_json(&app::show_series(&store, &code).await?),
            }
        }
        Command::Config => print_json(&app::config_output(&cli.config, &config)),
    }
}
