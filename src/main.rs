// src/main.rs

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::{bail, Context};
use clap::{ArgGroup, Args, Parser, Subcommand};
use privacy_toggle::{
    backup::{
        file::{backup_status, export_manual, BackupStatus},
        restore::restore,
        BackupRecord,
    },
    constants::AUTO_BACKUP_FILE,
    log::{LogSink, TracingLog},
    orchestrator::{BatchWorker, WorkerEvent, WorkerJob},
    tweaks::{
        all_features,
        batch::{BackupOutcome, BatchPlan},
        FeatureId, ToggleAction,
    },
    utils::{elevation::is_elevated, registry::SystemRegistry, services::SystemServices},
};
use tracing::Level;

/// Toggle Windows privacy features, with an automatic registry backup.
#[derive(Parser, Debug)]
#[command(name = "privacy_toggle")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Enable debug output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Backup file written by `apply` and read by `restore`, `status` and `export`
    #[arg(long, global = true, default_value = AUTO_BACKUP_FILE)]
    backup_file: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Enable or disable privacy features
    Apply(ApplyArgs),

    /// Undo the last batch from the backup file
    Restore,

    /// Show what the backup file contains
    Status,

    /// Copy the backup file to a timestamped manual backup
    Export {
        /// Directory for the manual backup
        #[arg(long, default_value = ".")]
        dir: PathBuf,
    },

    /// List the features that can be toggled
    Features,
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("action").required(true).args(["enable", "disable"])))]
struct ApplyArgs {
    #[arg(long)]
    enable: bool,

    #[arg(long)]
    disable: bool,

    /// Feature to toggle (repeatable)
    #[arg(long = "feature", value_name = "NAME")]
    features: Vec<FeatureId>,

    /// Toggle every feature
    #[arg(long, conflicts_with = "features")]
    all: bool,

    /// Log what would change without writing anything
    #[arg(long)]
    dry_run: bool,

    /// Also disable Windows Update when disabling telemetry
    #[arg(long)]
    aggressive: bool,

    /// Skip the automatic backup
    #[arg(long)]
    no_backup: bool,
}

impl ApplyArgs {
    fn plan(&self, backup_path: PathBuf) -> BatchPlan {
        let features = if self.all {
            all_features().iter().map(|f| f.id).collect()
        } else {
            let mut selected: Vec<FeatureId> = Vec::new();
            for id in &self.features {
                if !selected.contains(id) {
                    selected.push(*id);
                }
            }
            selected
        };

        BatchPlan {
            features,
            action: if self.enable {
                ToggleAction::Enable
            } else {
                ToggleAction::Disable
            },
            simulate: self.dry_run,
            aggressive: self.aggressive,
            backup: !self.no_backup,
            backup_path,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose { Level::DEBUG } else { Level::INFO })
        .with_target(false)
        .init();

    match cli.command {
        Command::Apply(args) => cmd_apply(&args, cli.backup_file),
        Command::Restore => cmd_restore(&cli.backup_file),
        Command::Status => cmd_status(&cli.backup_file),
        Command::Export { dir } => cmd_export(&cli.backup_file, &dir),
        Command::Features => cmd_features(),
    }
}

fn warn_if_not_elevated() {
    if !is_elevated() {
        tracing::warn!("Not running as administrator. Machine-wide settings and services will fail to change.");
    }
}

fn cmd_apply(args: &ApplyArgs, backup_path: PathBuf) -> anyhow::Result<()> {
    let plan = args.plan(backup_path);
    if !plan.simulate {
        warn_if_not_elevated();
    }

    let worker = BatchWorker::spawn(
        Arc::new(SystemRegistry::new()),
        Arc::new(SystemServices::new()),
        WorkerJob::Apply(plan),
    );

    let log = TracingLog;
    for event in worker.events() {
        match event {
            WorkerEvent::Log(line) => log.log(&line),
            WorkerEvent::Progress { completed, total } => log.progress(completed, total),
            WorkerEvent::BatchFinished(result) => {
                let report = result.context("Batch finished without a usable backup")?;
                if report.backup_incomplete() {
                    bail!("Changes were applied but the backup is incomplete; some values cannot be restored");
                }
                if let BackupOutcome::Saved { path, entries } = &report.backup {
                    tracing::info!(
                        "Run `privacy_toggle restore` to undo ({} values in {}).",
                        entries,
                        path.display()
                    );
                }
                return Ok(());
            }
            WorkerEvent::RestoreFinished(_) => {}
        }
    }
    bail!("Worker stopped before finishing the batch")
}

fn cmd_restore(backup_path: &Path) -> anyhow::Result<()> {
    warn_if_not_elevated();

    let record = BackupRecord::load(backup_path)
        .with_context(|| format!("Cannot restore from '{}'", backup_path.display()))?;
    let summary = restore(&SystemRegistry::new(), &record, &TracingLog);

    if summary.failed > 0 {
        bail!("{} value(s) could not be restored", summary.failed);
    }
    Ok(())
}

fn cmd_status(backup_path: &Path) -> anyhow::Result<()> {
    match backup_status(backup_path) {
        BackupStatus::Missing => println!("No backup found at {}", backup_path.display()),
        BackupStatus::Corrupted(reason) => {
            println!("Backup at {} is unreadable: {}", backup_path.display(), reason)
        }
        BackupStatus::Available {
            created,
            kind,
            entries,
        } => {
            println!("Backup: {}", backup_path.display());
            match created {
                Some(created) => println!("  Created: {}", created.format("%Y-%m-%d %H:%M:%S")),
                None => println!("  Created: unknown"),
            }
            match kind {
                Some(kind) => println!("  Type:    {}", kind),
                None => println!("  Type:    unknown"),
            }
            println!("  Values:  {}", entries);
        }
    }
    Ok(())
}

fn cmd_export(backup_path: &Path, dir: &Path) -> anyhow::Result<()> {
    let record = BackupRecord::load(backup_path)
        .with_context(|| format!("Cannot read backup '{}'", backup_path.display()))?;
    let exported = export_manual(&record, dir).context("Failed to export backup")?;
    println!("Manual backup saved to {}", exported.display());
    Ok(())
}

fn cmd_features() -> anyhow::Result<()> {
    for feature in all_features() {
        println!("{:<16} {}", feature.id.to_string(), feature.title);
        println!("{:<16} {}", "", feature.description);
    }
    Ok(())
}
