// SPDX-License-Identifier: MIT

//! msqd: outage-resilient metadata sync queue daemon.

use anyhow::Context;
use clap::{Parser, Subcommand};
use msq_daemon::commands::{self, TimeSpec};
use msq_daemon::{DataPaths, UnconfiguredMediaServer, UnconfiguredSceneIndex};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "msqd", version, about = "Outage-resilient metadata sync queue daemon")]
struct Cli {
    /// Config file (TOML). Defaults to msq.toml in the data directory.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory for queue, dead letters, and durable state.
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the sync worker until SIGINT/SIGTERM
    Run,
    /// Print the operator status snapshot
    Status,
    /// Probe downstream health once
    Health,
    /// Re-enqueue dead-lettered jobs from a time window
    Recover {
        /// Window start: epoch seconds, or an age like 90m, 6h, 2d
        #[arg(long)]
        since: String,
        /// Window end, same forms; defaults to now
        #[arg(long)]
        until: Option<String>,
        /// Also recover transient and not-found failures
        #[arg(long)]
        extended: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let paths = DataPaths::resolve(cli.data_dir.clone())?;
    let cfg = commands::load_config(&paths, cli.config.as_deref())?;

    let _log_guard = init_tracing(&cfg)?;

    match cli.command {
        Command::Run => {
            commands::run(&paths, cfg, Arc::new(UnconfiguredMediaServer)).await?;
        }
        Command::Status => {
            let report = commands::status(&paths, cfg)?;
            print!("{report}");
        }
        Command::Health => {
            let outcome = commands::health(&cfg, &UnconfiguredMediaServer).await;
            if outcome.healthy {
                println!("healthy ({} ms)", outcome.latency.as_millis());
            } else {
                println!("unhealthy");
                std::process::exit(1);
            }
        }
        Command::Recover { since, until, extended } => {
            let since = TimeSpec::parse(&since)?;
            let until = until.as_deref().map(TimeSpec::parse).transpose()?;
            let report = commands::recover(
                &paths,
                cfg,
                &UnconfiguredMediaServer,
                &UnconfiguredSceneIndex,
                since,
                until,
                extended,
            )
            .await?;
            println!(
                "recovered {} | already queued {} | downstream down {} | scene missing {} | failed {}",
                report.recovered,
                report.skipped_already_queued,
                report.skipped_downstream_down,
                report.skipped_scene_missing,
                report.failed,
            );
        }
    }
    Ok(())
}

fn init_tracing(cfg: &msq_core::SyncConfig) -> anyhow::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match &cfg.daemon.log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let file = path.file_name().context("log_file has no file name")?;
            let appender = tracing_appender::rolling::never(dir, file);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
            Ok(None)
        }
    }
}
