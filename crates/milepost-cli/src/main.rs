//! `milepost` — operator entry point for the accident-data pipeline.
//!
//! # Usage
//!
//! ```
//! milepost ingest                              # bronze: load new extracts
//! milepost clean --object Accidents_2019.csv   # silver: replay one object
//! milepost refresh                             # gold: dimensions + facts
//! milepost watch --interval-secs 60            # poll and clean arrivals
//! milepost log --limit 20
//! ```
//!
//! Configuration comes from `config.toml` (or `--config`) overlaid with
//! `MILEPOST_*` environment variables. Stage commands exit 0 when the run
//! succeeded, 1 when the run-log entry reports failure, 2 when the
//! configuration is invalid.

use std::{path::PathBuf, process::ExitCode, time::Duration};

use anyhow::Context as _;
use clap::{Parser, Subcommand, ValueEnum};
use milepost_blob_fs::FsContainer;
use milepost_core::{
  blob::Container as _,
  runlog::{RunLogEntry, TIMESTAMP_FORMAT, TriggerKind},
  store::Warehouse as _,
};
use milepost_pipeline::{
  bronze,
  config::PipelineConfig,
  gold,
  notify::EmailNotifier,
  silver,
};
use milepost_store_sqlite::SqliteWarehouse;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::EnvFilter;

// ─── CLI args ────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(author, version, about = "Accident-data warehouse pipeline")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Bronze stage: load unprocessed source objects into raw tables.
  Ingest {
    /// What to record as the trigger of this run.
    #[arg(long, value_enum, default_value_t = Trigger::Schedule)]
    trigger: Trigger,
  },
  /// Silver stage: normalize source objects into the clean table.
  Clean {
    /// What to record as the trigger of this run.
    #[arg(long, value_enum, default_value_t = Trigger::BlobArrival)]
    trigger: Trigger,

    /// Clean only this object, even if already marked cleaned.
    #[arg(long)]
    object: Option<String>,
  },
  /// Gold stage: refresh dimensions and rebuild the fact table.
  Refresh {
    /// What to record as the trigger of this run.
    #[arg(long, value_enum, default_value_t = Trigger::Schedule)]
    trigger: Trigger,
  },
  /// Poll the source container, cleaning objects as they arrive.
  Watch {
    /// Seconds between polls.
    #[arg(long, default_value_t = 60)]
    interval_secs: u64,
  },
  /// Show recent run-log entries, newest first.
  Log {
    /// Maximum entries to show.
    #[arg(long, default_value_t = 20)]
    limit: u32,

    /// Emit JSON lines instead of columns.
    #[arg(long)]
    json: bool,
  },
}

/// Trigger names as they appear on the command line.
#[derive(Clone, Copy, ValueEnum)]
enum Trigger {
  Schedule,
  BlobArrival,
  Manual,
}

impl From<Trigger> for TriggerKind {
  fn from(t: Trigger) -> Self {
    match t {
      Trigger::Schedule => TriggerKind::Schedule,
      Trigger::BlobArrival => TriggerKind::BlobArrival,
      Trigger::Manual => TriggerKind::Manual,
    }
  }
}

// ─── Entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config.clone()).required(false))
    .add_source(config::Environment::with_prefix("MILEPOST"))
    .build()
    .context("failed to read configuration")?;
  let config: PipelineConfig = settings
    .try_deserialize()
    .context("failed to deserialise configuration")?;

  if let Err(e) = config.validate() {
    error!(error = %e, "configuration invalid");
    record_startup_failure(&cli.command, &config, &e.to_string()).await;
    return Ok(ExitCode::from(2));
  }

  run_command(cli.command, &config).await
}

/// A startup misconfiguration is itself an auditable failure: when the
/// database location is known the failed entry is written under the stage
/// that was about to run.
async fn record_startup_failure(
  command: &Command,
  config: &PipelineConfig,
  message: &str,
) {
  if config.database_path.is_empty() {
    return;
  }
  let stage = match command {
    Command::Ingest { .. } => bronze::STAGE,
    Command::Clean { .. } | Command::Watch { .. } => silver::STAGE,
    Command::Refresh { .. } => gold::STAGE,
    Command::Log { .. } => return,
  };
  let Ok(warehouse) = SqliteWarehouse::open(&config.database_path).await else {
    return;
  };
  let entry = RunLogEntry::failed(stage, TriggerKind::Manual, 0, message);
  if let Err(e) = warehouse.append_run_log(entry).await {
    error!(error = %e, "failed to record startup failure");
  }
}

// ─── Commands ────────────────────────────────────────────────────────────────

async fn run_command(
  command: Command,
  config: &PipelineConfig,
) -> anyhow::Result<ExitCode> {
  let warehouse = SqliteWarehouse::open(&config.database_path)
    .await
    .with_context(|| {
      format!("failed to open warehouse at {}", config.database_path)
    })?;

  match command {
    Command::Ingest { trigger } => {
      let container = open_container(config).await?;
      let notifier = EmailNotifier::new(config)?;
      let entry =
        bronze::run(&warehouse, &container, &notifier, trigger.into()).await?;
      Ok(exit_for(&entry))
    }
    Command::Clean { trigger, object } => {
      let container = open_container(config).await?;
      let notifier = EmailNotifier::new(config)?;
      let entry = silver::run(
        &warehouse,
        &container,
        &notifier,
        trigger.into(),
        object.as_deref(),
      )
      .await?;
      Ok(exit_for(&entry))
    }
    Command::Refresh { trigger } => {
      let notifier = EmailNotifier::new(config)?;
      let entry = gold::run(&warehouse, &notifier, trigger.into()).await?;
      Ok(exit_for(&entry))
    }
    Command::Watch { interval_secs } => {
      let container = open_container(config).await?;
      let notifier = EmailNotifier::new(config)?;
      watch(
        &warehouse,
        &container,
        &notifier,
        Duration::from_secs(interval_secs.max(1)),
      )
      .await
    }
    Command::Log { limit, json } => {
      let entries = warehouse.recent_run_log(limit).await?;
      print_log(&entries, json)?;
      Ok(ExitCode::SUCCESS)
    }
  }
}

async fn open_container(config: &PipelineConfig) -> anyhow::Result<FsContainer> {
  let path = config.source_container_path();
  FsContainer::open(&path)
    .await
    .with_context(|| format!("failed to open source container at {path:?}"))
}

fn exit_for(entry: &RunLogEntry) -> ExitCode {
  if entry.status.is_success() {
    ExitCode::SUCCESS
  } else {
    ExitCode::FAILURE
  }
}

// ─── Watch loop ──────────────────────────────────────────────────────────────

/// Polls the container and runs the silver stage whenever an object without
/// the cleaned marker shows up. Poll and stage errors are logged and the
/// loop keeps going.
async fn watch(
  warehouse: &SqliteWarehouse,
  container: &FsContainer,
  notifier: &EmailNotifier,
  interval: Duration,
) -> anyhow::Result<ExitCode> {
  info!(every_secs = interval.as_secs(), "watching source container");
  let mut ticker = tokio::time::interval(interval);
  ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

  loop {
    ticker.tick().await;
    match has_pending_objects(container).await {
      Ok(false) => {}
      Ok(true) => {
        match silver::run(
          warehouse,
          container,
          notifier,
          TriggerKind::BlobArrival,
          None,
        )
        .await
        {
          Ok(entry) => info!(
            status = entry.status.as_str(),
            records = entry.record_count,
            "silver run finished"
          ),
          Err(e) => error!(error = %e, "silver run could not be recorded"),
        }
      }
      Err(e) => error!(error = %e, "source container poll failed"),
    }
  }
}

async fn has_pending_objects(container: &FsContainer) -> anyhow::Result<bool> {
  for object in container.list_objects().await? {
    let metadata = container.object_metadata(object).await?;
    if !metadata.contains_key(silver::CLEANED_MARKER) {
      return Ok(true);
    }
  }
  Ok(false)
}

// ─── Log output ──────────────────────────────────────────────────────────────

fn print_log(entries: &[RunLogEntry], json: bool) -> anyhow::Result<()> {
  if json {
    for entry in entries {
      println!("{}", serde_json::to_string(entry)?);
    }
    return Ok(());
  }
  for entry in entries {
    println!(
      "{}  {:7}  {:13}  {:>8}  {:13}  {}",
      entry.timestamp.format(TIMESTAMP_FORMAT),
      entry.status.as_str(),
      entry.triggered_by.as_str(),
      entry.record_count,
      entry.function_name,
      entry.message
    );
  }
  Ok(())
}
