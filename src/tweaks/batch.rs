// src/tweaks/batch.rs

use std::path::PathBuf;

use tracing::{error, info, warn};

use super::{
    method::{apply_feature, ApplyContext},
    FeatureId, ToggleAction,
};
use crate::{
    backup::{BackupKind, BackupRecord},
    constants::SUMMARY_RULE_WIDTH,
    errors::BatchError,
    log::LogSink,
    store::{EntryKey, RegistryStore},
    utils::services::ServiceControl,
};

/// One run of enable or disable over a set of features.
#[derive(Debug, Clone)]
pub struct BatchPlan {
    pub features: Vec<FeatureId>,
    pub action: ToggleAction,
    pub simulate: bool,
    /// Also disables services left running by default (Windows Update for telemetry).
    pub aggressive: bool,
    pub backup: bool,
    pub backup_path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureOutcome {
    pub id: FeatureId,
    pub title: &'static str,
    pub success: bool,
}

/// What happened to the batch's backup record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackupOutcome {
    Disabled,
    /// Captured during a dry run and left unsaved.
    Simulated,
    /// Backups were requested but nothing was captured.
    Empty,
    Saved { path: PathBuf, entries: usize },
    NotSaved { path: PathBuf },
}

#[derive(Debug)]
pub struct BatchReport {
    pub action: ToggleAction,
    pub simulate: bool,
    pub attempted: usize,
    pub succeeded: usize,
    pub outcomes: Vec<FeatureOutcome>,
    pub capture_failures: Vec<EntryKey>,
    pub backup: BackupOutcome,
    /// The record built during the batch; `None` when backups were disabled.
    pub record: Option<BackupRecord>,
}

impl BatchReport {
    fn new(plan: &BatchPlan) -> Self {
        Self {
            action: plan.action,
            simulate: plan.simulate,
            attempted: 0,
            succeeded: 0,
            outcomes: Vec::new(),
            capture_failures: Vec::new(),
            backup: BackupOutcome::Disabled,
            record: None,
        }
    }

    /// True when a real run asked for a backup but some of its changes
    /// cannot be restored. Callers must treat this as a failure.
    pub fn backup_incomplete(&self) -> bool {
        !self.warnings().is_empty()
    }

    pub fn failed(&self) -> impl Iterator<Item = &FeatureOutcome> {
        self.outcomes.iter().filter(|o| !o.success)
    }

    /// Problems with the safety net of a real run: changes that cannot be
    /// undone because their prior state was not captured.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        if self.simulate || self.attempted == 0 {
            return warnings;
        }

        if self.backup == BackupOutcome::Empty {
            warnings.push(
                "Backup was requested but no registry values were captured. These changes cannot be restored."
                    .to_string(),
            );
        }
        if !self.capture_failures.is_empty() {
            let keys: Vec<String> = self.capture_failures.iter().map(|k| k.to_string()).collect();
            warnings.push(format!(
                "{} value(s) could not be backed up and will not be restored: {}",
                keys.len(),
                keys.join(", ")
            ));
        }
        warnings
    }
}

/// Applies `plan.action` to every selected feature, capturing prior state
/// into a fresh backup record and saving it at the end.
///
/// Features run independently: a failure in one never stops the next. The
/// only error returned is a backup that could not be saved after changes
/// were applied; it still carries the full report.
pub fn apply_batch(
    store: &dyn RegistryStore,
    services: &dyn ServiceControl,
    plan: &BatchPlan,
    log: &dyn LogSink,
) -> Result<BatchReport, BatchError> {
    let mut report = BatchReport::new(plan);

    if plan.features.is_empty() {
        log.log("No features selected.");
        return Ok(report);
    }

    let total = plan.features.len();
    let mode = if plan.simulate { " [DRY-RUN]" } else { "" };
    info!("Starting batch: {} {} feature(s){}", plan.action, total, mode);
    log.log(&format!(
        "{} {} feature(s){}",
        plan.action.verb(),
        total,
        mode
    ));

    let mut record = plan.backup.then(|| BackupRecord::new(BackupKind::Automatic));
    let ctx = ApplyContext {
        store,
        services,
        log,
        action: plan.action,
        simulate: plan.simulate,
        aggressive: plan.aggressive,
    };

    for (index, id) in plan.features.iter().enumerate() {
        let feature = id.definition();
        let success = apply_feature(&feature, &ctx, record.as_mut());

        report.attempted += 1;
        if success {
            report.succeeded += 1;
        }
        report.outcomes.push(FeatureOutcome {
            id: *id,
            title: feature.title,
            success,
        });
        log.progress(index + 1, total);
    }

    log_summary(&report, log);

    if let Some(record) = &record {
        report.capture_failures = record.capture_failures().to_vec();
    }

    let backup = match &record {
        None => BackupOutcome::Disabled,
        Some(_) if plan.simulate => BackupOutcome::Simulated,
        Some(record) if record.is_empty() => BackupOutcome::Empty,
        Some(record) => match record.save(&plan.backup_path) {
            Ok(()) => {
                info!("Backup saved to '{}'.", plan.backup_path.display());
                log.log(&format!(
                    "Backup saved to {} ({} values).",
                    plan.backup_path.display(),
                    record.len()
                ));
                BackupOutcome::Saved {
                    path: plan.backup_path.clone(),
                    entries: record.len(),
                }
            }
            Err(source) => {
                error!("Backup not saved: {}", source);
                log.log(&format!(
                    "[CRITICAL] Changes were applied but the backup was NOT saved: {}",
                    source
                ));
                report.backup = BackupOutcome::NotSaved {
                    path: plan.backup_path.clone(),
                };
                report.record = Some(record.clone());
                return Err(BatchError::BackupNotSaved {
                    report: Box::new(report),
                    source,
                });
            }
        },
    };
    report.backup = backup;
    report.record = record;

    for warning in report.warnings() {
        warn!("{}", warning);
        log.log(&format!("[WARNING] {}", warning));
    }

    Ok(report)
}

fn log_summary(report: &BatchReport, log: &dyn LogSink) {
    let rule = "=".repeat(SUMMARY_RULE_WIDTH);
    let done = match report.action {
        ToggleAction::Enable => "enabled",
        ToggleAction::Disable => "disabled",
    };
    let suffix = if report.simulate { " (dry run)" } else { "" };

    log.log(&rule);
    log.log(&format!(
        "Summary: {}/{} features {} successfully{}.",
        report.succeeded, report.attempted, done, suffix
    ));
    for outcome in report.failed() {
        log.log(&format!("  Failed: {}", outcome.title));
    }
    log.log(&rule);
}
