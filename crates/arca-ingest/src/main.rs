//! Arca Ingest - staging reconciliation runner

use anyhow::Result;
use arca_common::logging::{init_logging, LogConfig, LogLevel};
use arca_ingest::config::IngestConfig;
use arca_ingest::{runner, Supervisor};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tokio::io::BufReader;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "arca-ingest")]
#[command(author, version, about = "Staging reconciliation engine for preservation ingest")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Process newline-delimited JSON staging events
    Run {
        /// Event file (defaults to stdin)
        #[arg(short, long)]
        events: Option<PathBuf>,
    },

    /// Validate configuration and print the effective settings
    CheckConfig,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over the flag
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("arca-ingest")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    let config = IngestConfig::from_env()?;

    match cli.command {
        Command::CheckConfig => {
            println!("manifest tag:     {}", config.engine.manifest_tag);
            println!("staging suffix:   {}", config.engine.staging_suffix);
            println!("queue depth:      {}", config.queue_depth);
            println!(
                "content store:    {} (region {}, bucket prefix {:?})",
                config.content_store.endpoint.as_deref().unwrap_or("AWS"),
                config.content_store.region,
                config.content_store.bucket_prefix
            );
            println!("repository:       {}", config.repository.url);
            println!("index:            {}", config.index.url);
            Ok(())
        },
        Command::Run { events } => {
            let collaborators = runner::connect(&config)?;
            let mut supervisor = Supervisor::new(config.engine.clone(), collaborators, config.queue_depth);

            let summary = match events {
                Some(path) => {
                    info!("Reading events from {}", path.display());
                    let file = tokio::fs::File::open(&path).await?;
                    runner::feed_events(BufReader::new(file), &mut supervisor).await?
                },
                None => {
                    info!("Reading events from stdin");
                    runner::feed_events(BufReader::new(tokio::io::stdin()), &mut supervisor).await?
                },
            };

            info!(
                dispatched = summary.dispatched,
                malformed = summary.malformed,
                rejected = summary.rejected,
                "Event feed finished"
            );

            let reports = supervisor.shutdown().await;
            let mut fatal = 0;
            for report in &reports {
                info!(
                    space = %report.space_id,
                    events = report.events_handled,
                    recorded_failures = report.recorded_failures,
                    errors = report.errors,
                    "Worker finished"
                );
                if let Some(reason) = &report.fatal {
                    error!(space = %report.space_id, "Worker stopped: {}", reason);
                    fatal += 1;
                }
            }

            if fatal > 0 {
                anyhow::bail!("{} staging area(s) need operator attention", fatal);
            }

            info!("Ingest run complete");
            Ok(())
        },
    }
}
