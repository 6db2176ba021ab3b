// src/errors.rs

use std::path::PathBuf;

use thiserror::Error;

use crate::{store::EntryKey, tweaks::batch::BatchReport};

/// Failures of a single registry operation.
///
/// A value that simply does not exist is not an error: `RegistryStore::read`
/// reports it as `Ok(None)` and `RegistryStore::delete` as `Ok(false)`.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Permission denied accessing '{key}'")]
    PermissionDenied { key: EntryKey },

    #[error("Unexpected data for '{key}' (type {vtype}): {reason}")]
    UnexpectedType {
        key: EntryKey,
        vtype: u32,
        reason: String,
    },

    #[error("Registry I/O failed for '{key}': {source}")]
    Io {
        key: EntryKey,
        #[source]
        source: std::io::Error,
    },

    #[error("Registry access is not supported on this platform")]
    Unsupported,
}

/// Failures reading or writing a backup file.
#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Failed to save backup to '{}': {source}", path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read backup '{}': {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Backup is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid backup entry '{key}': {reason}")]
    InvalidEntry { key: String, reason: String },

    #[error("No backup data available to save")]
    NothingToSave,
}

/// The one batch failure that is escalated: changes were applied but the
/// safety net could not be written, so they are not reversible.
#[derive(Error, Debug)]
pub enum BatchError {
    #[error(
        "{}/{} features applied, but the backup was NOT saved: {source}",
        report.succeeded,
        report.attempted
    )]
    BackupNotSaved {
        report: Box<BatchReport>,
        #[source]
        source: BackupError,
    },
}
