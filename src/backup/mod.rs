// src/backup/mod.rs

//! Registry snapshot and restore.
//!
//! A [`BackupRecord`] is filled during a batch, one entry per registry value,
//! right before that value is overwritten. It is saved as JSON at the end of
//! the batch and replayed later by [`restore::restore`].

pub mod file;
pub mod restore;

use chrono::{DateTime, Local};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use tracing::{debug, warn};

use crate::{
    constants::BACKUP_FORMAT_VERSION,
    log::LogSink,
    store::{EntryKey, RegistryStore, RegistryValue},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BackupKind {
    Automatic,
    Manual,
}

/// Prior state of every registry value touched by one batch.
///
/// `None` in the entry map means the value did not exist before the batch.
#[derive(Debug, Clone, PartialEq)]
pub struct BackupRecord {
    created: Option<DateTime<Local>>,
    version: String,
    kind: Option<BackupKind>,
    entries: IndexMap<EntryKey, Option<RegistryValue>>,
    capture_failures: Vec<EntryKey>,
}

impl BackupRecord {
    pub fn new(kind: BackupKind) -> Self {
        Self {
            created: Some(Local::now()),
            version: BACKUP_FORMAT_VERSION.to_string(),
            kind: Some(kind),
            entries: IndexMap::new(),
            capture_failures: Vec::new(),
        }
    }

    pub(crate) fn from_parts(
        created: Option<DateTime<Local>>,
        version: String,
        kind: Option<BackupKind>,
        entries: IndexMap<EntryKey, Option<RegistryValue>>,
    ) -> Self {
        Self {
            created,
            version,
            kind,
            entries,
            capture_failures: Vec::new(),
        }
    }

    /// `None` when the record was loaded from a file without a readable timestamp.
    pub fn created(&self) -> Option<DateTime<Local>> {
        self.created
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn kind(&self) -> Option<BackupKind> {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, key: &EntryKey) -> bool {
        self.entries.contains_key(key)
    }

    /// `Some(None)` for a captured absence, `None` when the key was never captured.
    pub fn get(&self, key: &EntryKey) -> Option<&Option<RegistryValue>> {
        self.entries.get(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&EntryKey, &Option<RegistryValue>)> {
        self.entries.iter()
    }

    /// Keys whose prior state could not be read during this batch.
    pub fn capture_failures(&self) -> &[EntryKey] {
        &self.capture_failures
    }

    /// Copy of this record relabelled with another kind and a fresh timestamp.
    pub fn relabelled(&self, kind: BackupKind) -> Self {
        Self {
            created: Some(Local::now()),
            kind: Some(kind),
            ..self.clone()
        }
    }

    /// Records the prior state of `key` unless it was already captured.
    fn record(&mut self, key: &EntryKey, previous: Option<RegistryValue>) {
        self.entries.entry(key.clone()).or_insert(previous);
    }

    fn record_failure(&mut self, key: &EntryKey) {
        if !self.capture_failures.contains(key) {
            self.capture_failures.push(key.clone());
        }
    }
}

/// Captures the current state of `key` into `record` before it is overwritten.
///
/// - `record == None` means no backup was requested; nothing happens.
/// - A key already in the record is left alone, so the record always holds the
///   state from before the batch even when several features touch one value.
/// - A missing value is recorded as absent.
/// - Any read failure is logged and remembered on the record, never returned.
///   A key that failed once is not read again in the same batch.
///
/// The store is only read, never written.
pub fn capture(
    record: Option<&mut BackupRecord>,
    store: &dyn RegistryStore,
    key: &EntryKey,
    log: &dyn LogSink,
) {
    let Some(record) = record else {
        return;
    };

    if record.contains(key) {
        debug!("'{}' already captured, keeping first state.", key);
        return;
    }
    // Once a capture has failed the store may hold this batch's own writes.
    if record.capture_failures.contains(key) {
        debug!("'{}' failed to capture earlier in this batch, not retrying.", key);
        return;
    }

    match store.read(key) {
        Ok(Some(value)) => {
            debug!("Captured {} for '{}'.", value, key);
            record.record(key, Some(value));
        }
        Ok(None) => {
            debug!("Captured absence of '{}'.", key);
            record.record(key, None);
        }
        Err(e) => {
            warn!("Could not back up '{}': {}", key, e);
            log.log(&format!("  [WARNING] Could not back up {}: {}", key, e));
            record.record_failure(key);
        }
    }
}
