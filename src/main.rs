//! treesync - one-way directory synchronization
//!
//! Entry point for the `treesync` command.

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Args, Parser, Subcommand};
use treesync::config::{TaskConfig, TaskSet};
use treesync::observability::{config_from_env, init_tracing};
use treesync::runner::{build_coordinator, ensure_all_ran, run_tasks};
use treesync::sync::{SyncOptions, SyncResult};
use treesync::Config;

/// treesync - keep a target directory in line with a source directory
#[derive(Parser, Debug)]
#[command(name = "treesync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Enable JSON logging output
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Synchronize once
    Sync(SyncArgs),
    /// Synchronize, then keep synchronizing as the source changes
    Watch(WatchArgs),
    /// Write an example task configuration file
    InitConfig {
        /// Where to write the file
        path: PathBuf,
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
    /// List the tasks of a configuration file
    Tasks {
        #[arg(short, long, env = "TREESYNC_CONFIG")]
        config: PathBuf,
    },
}

/// Either a configuration file or an explicit source/target pair.
#[derive(Args, Debug)]
struct PairArgs {
    /// Task configuration file (ignored when --source and --target are given)
    #[arg(short, long, env = "TREESYNC_CONFIG")]
    config: Option<PathBuf>,

    /// Source directory
    #[arg(short, long, requires = "target")]
    source: Option<PathBuf>,

    /// Target directory
    #[arg(short, long, requires = "source")]
    target: Option<PathBuf>,

    /// Remove target entries that are absent from the source
    #[arg(long)]
    delete_extra: bool,

    /// Compare modification times instead of content
    #[arg(long)]
    mtime_only: bool,

    /// Ignore pattern (repeatable)
    #[arg(long = "ignore", value_name = "PATTERN")]
    ignore_patterns: Vec<String>,

    /// File with ignore patterns, one per line
    #[arg(long)]
    ignore_file: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SyncArgs {
    #[command(flatten)]
    pair: PairArgs,

    /// Tasks to run (default: every enabled task)
    #[arg(value_name = "TASK")]
    tasks: Vec<String>,

    /// Print the plan without applying it
    #[arg(long)]
    dry_run: bool,

    /// Save the result as JSON (explicit source/target only)
    #[arg(long)]
    report: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct WatchArgs {
    #[command(flatten)]
    pair: PairArgs,

    /// Task to watch (with --config)
    #[arg(long)]
    task: Option<String>,

    /// Seconds between full re-checks when polling
    #[arg(short, long, env = "TREESYNC_POLL_INTERVAL", default_value = "60")]
    interval: u64,

    /// Milliseconds of quiet before a burst of changes triggers a sync
    #[arg(long, env = "TREESYNC_DEBOUNCE_MS", default_value = "1000")]
    debounce_ms: u64,

    /// Poll instead of using file notifications
    #[arg(long)]
    polling: bool,

    /// Fail instead of polling when file notifications are unavailable
    #[arg(long)]
    no_fallback: bool,
}

impl PairArgs {
    /// The task described by `--source`/`--target` and the option flags.
    fn explicit_task(&self) -> anyhow::Result<Option<TaskConfig>> {
        let (Some(source), Some(target)) = (&self.source, &self.target) else {
            return Ok(None);
        };

        let mut task = TaskConfig::new("cli", source, target);
        task.options = SyncOptions {
            delete_extra: self.delete_extra,
            compare_by_content: !self.mtime_only,
        };
        task.ignore.patterns.clone_from(&self.ignore_patterns);
        task.ignore.file = match &self.ignore_file {
            Some(file) if file.is_relative() => Some(std::env::current_dir()?.join(file)),
            other => other.clone(),
        };
        Ok(Some(task))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let env = config_from_env();
    let settings = Config {
        log_level: cli.log_level.unwrap_or(env.level),
        log_json: cli.log_json || env.json,
        ..Config::default()
    };
    settings.validate()?;
    init_tracing(&settings.log_level, settings.log_json)?;

    tracing::debug!("treesync v{} starting", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Command::Sync(args) => sync(args).await,
        Command::Watch(args) => watch(args, settings).await,
        Command::InitConfig { path, force } => init_config(&path, force),
        Command::Tasks { config } => list_tasks(&config),
    }
}

async fn sync(args: SyncArgs) -> anyhow::Result<()> {
    if let Some(task) = args.pair.explicit_task()? {
        let job = task.job()?;
        if args.dry_run {
            println!("{}", job.plan()?);
            return Ok(());
        }

        let result = tokio::task::spawn_blocking(move || job.run())
            .await
            .context("sync task panicked")??;
        report(&task.name, &result);
        if let Some(path) = &args.report {
            result.save(path)?;
        }
        return Ok(());
    }

    let Some(config) = &args.pair.config else {
        bail!("either --config or --source and --target are required");
    };
    let set = TaskSet::load(config)?;

    if args.dry_run {
        for task in set.select(&args.tasks)? {
            println!("# {}", task.name);
            println!("{}", task.job()?.plan()?);
        }
        return Ok(());
    }

    let outcomes = run_tasks(&set, &args.tasks).await?;
    for outcome in &outcomes {
        match &outcome.result {
            Ok(result) => report(&outcome.name, result),
            Err(e) => tracing::error!(task = %outcome.name, error = %e, "Task did not run"),
        }
    }
    ensure_all_ran(&outcomes)?;
    Ok(())
}

async fn watch(args: WatchArgs, mut settings: Config) -> anyhow::Result<()> {
    settings.poll_interval = Duration::from_secs(args.interval);
    settings.debounce = Duration::from_millis(args.debounce_ms);
    settings.use_polling = args.polling;
    settings.fallback_to_polling = !args.no_fallback;
    settings.validate()?;

    let task = if let Some(task) = args.pair.explicit_task()? {
        task
    } else {
        let Some(config) = &args.pair.config else {
            bail!("either --config or --source and --target are required");
        };
        let Some(name) = &args.task else {
            bail!("--task is required with --config");
        };
        let set = TaskSet::load(config)?;
        set.find(name)
            .cloned()
            .with_context(|| format!("task '{name}' not found"))?
    };

    let mut coordinator = build_coordinator(task.job()?, &settings);
    let mut coordinator = tokio::task::spawn_blocking(move || {
        coordinator.start()?;
        Ok::<_, treesync::Error>(coordinator)
    })
    .await
    .context("watch session panicked")??;

    if let Some(result) = coordinator.latest_result() {
        report(&task.name, &result);
    }
    tracing::info!(
        task = %task.name,
        source = coordinator.source_name(),
        "Watching for changes, press Ctrl-C to stop"
    );

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for Ctrl-C")?;

    let cycles = tokio::task::spawn_blocking(move || {
        coordinator.stop().map(|()| coordinator.cycles_completed())
    })
    .await
    .context("watch session panicked")??;
    tracing::info!(cycles, "Stopped");
    Ok(())
}

fn init_config(path: &Path, force: bool) -> anyhow::Result<()> {
    if path.exists() && !force {
        bail!("'{}' already exists (use --force to overwrite)", path.display());
    }

    let home = std::env::var_os("HOME").map_or_else(|| PathBuf::from("."), PathBuf::from);
    TaskSet::example(&home).save(path)?;
    println!("Example configuration written to {}", path.display());
    Ok(())
}

fn list_tasks(config: &Path) -> anyhow::Result<()> {
    let set = TaskSet::load(config)?;
    for task in set.tasks() {
        let mark = if task.enabled { "enabled" } else { "disabled" };
        println!(
            "{}\t{mark}\t{} -> {}",
            task.name,
            task.source_dir.display(),
            task.target_dir.display()
        );
    }
    Ok(())
}

fn report(task: &str, result: &SyncResult) {
    for failure in result.failures() {
        tracing::warn!(task = %task, path = %failure.path, error = %failure.error, "Entry failed");
    }
    println!("{task}: {}", result.summary());
}
