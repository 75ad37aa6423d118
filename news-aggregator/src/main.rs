use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use news_aggregator::scheduler::spawn_periodic;
use news_aggregator::{AggregatorConfig, NewsAggregator, SourceType};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

#[derive(Parser)]
#[command(name = "news-aggregator", version, about = "Fetch, summarize and serve news from configured sources")]
struct Cli {
    /// Path to a TOML config file (defaults to ./news-aggregator.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Override the database URL
    #[arg(long, global = true)]
    database_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Manage the source registry
    Sources {
        #[command(subcommand)]
        action: SourcesCommand,
    },
    /// Run a single fetch pass and print the outcome
    Fetch {
        /// Print the per-source report instead of the short outcome
        #[arg(long)]
        report: bool,
    },
    /// Print stored articles, newest first
    Feed {
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Fetch periodically until interrupted
    Watch {
        /// Seconds between passes (defaults to fetch_interval_secs)
        #[arg(long)]
        interval: Option<u64>,
    },
}

#[derive(Subcommand)]
enum SourcesCommand {
    List,
    Add {
        name: String,
        url: String,
        #[arg(long = "type", default_value = "feed")]
        source_type: SourceType,
    },
    Remove {
        id: Uuid,
    },
    Enable {
        id: Uuid,
    },
    Disable {
        id: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = AggregatorConfig::load(cli.config.as_deref()).context("Failed to load configuration")?;
    if let Some(url) = cli.database_url {
        config.database_url = url;
    }

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let aggregator = NewsAggregator::new(&config)
        .await
        .with_context(|| format!("Failed to open {}", config.database_url))?;

    let result = run(&aggregator, &config, cli.command).await;
    aggregator.close().await;
    result
}

async fn run(aggregator: &NewsAggregator, config: &AggregatorConfig, command: Command) -> Result<()> {
    match command {
        Command::Sources { action } => match action {
            SourcesCommand::List => print_json(&aggregator.list_sources().await?)?,
            SourcesCommand::Add { name, url, source_type } => {
                print_json(&aggregator.add_source(name, url, source_type).await?)?
            }
            SourcesCommand::Remove { id } => {
                if !aggregator.remove_source(id).await? {
                    info!("No source with id {}", id);
                }
            }
            SourcesCommand::Enable { id } => print_json(&aggregator.set_source_enabled(id, true).await?)?,
            SourcesCommand::Disable { id } => print_json(&aggregator.set_source_enabled(id, false).await?)?,
        },
        Command::Fetch { report } => {
            if report {
                let report = aggregator.run_pass().await?;
                print_json(&report)?;
            } else {
                let outcome = aggregator.fetch_all().await;
                print_json(&outcome)?;
                if !outcome.success {
                    anyhow::bail!(outcome.message.unwrap_or_default());
                }
            }
        }
        Command::Feed { limit } => {
            let articles = match limit {
                Some(n) => aggregator.feed_limited(n).await,
                None => aggregator.feed().await,
            };
            print_json(&articles)?;
        }
        Command::Watch { interval } => {
            let interval = interval
                .map(|secs| Duration::from_secs(secs.max(1)))
                .unwrap_or_else(|| config.fetch_interval());
            let handle = spawn_periodic(aggregator.orchestrator(), interval);

            tokio::signal::ctrl_c().await.context("Failed to listen for Ctrl-C")?;
            info!("Shutting down");
            handle.abort();
            if let Err(e) = handle.await {
                if !e.is_cancelled() {
                    error!("Scheduler task failed: {}", e);
                }
            }
        }
    }
    Ok(())
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
