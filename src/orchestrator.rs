// src/orchestrator.rs

use std::{path::PathBuf, sync::Arc, thread};

use crossbeam::channel;

use crate::{
    backup::{
        restore::{restore, RestoreSummary},
        BackupRecord,
    },
    errors::{BackupError, BatchError},
    log::LogSink,
    store::RegistryStore,
    tweaks::batch::{apply_batch, BatchPlan, BatchReport},
    utils::services::ServiceControl,
};

/// Work handed to a background worker.
#[derive(Debug, Clone)]
pub enum WorkerJob {
    Apply(BatchPlan),
    Restore { backup_path: PathBuf },
}

/// Messages streamed back from the worker, ending with exactly one
/// `BatchFinished` or `RestoreFinished`.
#[derive(Debug)]
pub enum WorkerEvent {
    Log(String),
    Progress { completed: usize, total: usize },
    BatchFinished(Result<BatchReport, BatchError>),
    RestoreFinished(Result<RestoreSummary, BackupError>),
}

/// Log sink that forwards lines over the worker's event channel.
struct ChannelLog {
    sender: channel::Sender<WorkerEvent>,
}

impl ChannelLog {
    fn send(&self, event: WorkerEvent) {
        if let Err(e) = self.sender.send(event) {
            tracing::error!("Failed to send worker event: {:?}", e);
        }
    }
}

impl LogSink for ChannelLog {
    fn log(&self, message: &str) {
        self.send(WorkerEvent::Log(message.to_string()));
    }

    fn progress(&self, completed: usize, total: usize) {
        self.send(WorkerEvent::Progress { completed, total });
    }
}

/// Runs one batch or restore on its own thread.
///
/// The backup record is created and owned by that thread for the whole job;
/// callers only see the events.
pub struct BatchWorker {
    event_receiver: channel::Receiver<WorkerEvent>,
}

impl BatchWorker {
    pub fn spawn(
        store: Arc<dyn RegistryStore>,
        services: Arc<dyn ServiceControl>,
        job: WorkerJob,
    ) -> Self {
        let (event_sender, event_receiver) = channel::unbounded::<WorkerEvent>();

        thread::spawn(move || {
            let log = ChannelLog {
                sender: event_sender,
            };
            let finished = match job {
                WorkerJob::Apply(plan) => WorkerEvent::BatchFinished(apply_batch(
                    store.as_ref(),
                    services.as_ref(),
                    &plan,
                    &log,
                )),
                WorkerJob::Restore { backup_path } => {
                    WorkerEvent::RestoreFinished(run_restore(store.as_ref(), &backup_path, &log))
                }
            };
            log.send(finished);
        });

        Self { event_receiver }
    }

    /// Blocking iterator over the remaining events. It ends once the worker
    /// has finished and every event has been received.
    pub fn events(&self) -> channel::Iter<'_, WorkerEvent> {
        self.event_receiver.iter()
    }
}

fn run_restore(
    store: &dyn RegistryStore,
    backup_path: &std::path::Path,
    log: &dyn LogSink,
) -> Result<RestoreSummary, BackupError> {
    let record = BackupRecord::load(backup_path).map_err(|e| {
        tracing::error!("Cannot restore from '{}': {}", backup_path.display(), e);
        log.log(&format!("[ERROR] {}", e));
        e
    })?;
    log.log(&format!(
        "Restoring {} values from {}",
        record.len(),
        backup_path.display()
    ));
    Ok(restore(store, &record, log))
}
