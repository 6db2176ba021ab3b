// src/backup/file.rs

//! JSON backup files.
//!
//! ```text
//! {
//!   "timestamp": "2024-05-01T10:00:00.000000+02:00",
//!   "version": "1.0",
//!   "type": "automatic",
//!   "data": {
//!     "HKEY_LOCAL_MACHINE\\SOFTWARE\\...\\AllowTelemetry": { "value": 1, "type": 4 },
//!     "HKEY_CURRENT_USER\\Software\\...\\Enabled": null
//!   }
//! }
//! ```
//!
//! Files written by older releases are still accepted: a bare map of entries
//! without the metadata wrapper, and `HKLM`/`HKCU` hive aliases.

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
    str::FromStr,
};

use chrono::{DateTime, Local, NaiveDateTime, SecondsFormat, TimeZone};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use super::{BackupKind, BackupRecord};
use crate::{
    constants::{BACKUP_FORMAT_VERSION, MANUAL_BACKUP_PREFIX, MANUAL_BACKUP_TIMESTAMP},
    errors::BackupError,
    store::{vtype, EntryKey, RegistryValue, Scope},
};

#[derive(Debug, Serialize, Deserialize)]
struct StoredValue {
    value: Value,
    #[serde(rename = "type")]
    vtype: u32,
}

type StoredEntries = IndexMap<String, Option<StoredValue>>;

#[derive(Debug, Serialize, Deserialize)]
struct BackupDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    timestamp: Option<String>,
    #[serde(default = "default_version")]
    version: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    kind: Option<BackupKind>,
    data: StoredEntries,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum AnyDocument {
    Current(BackupDocument),
    Legacy(StoredEntries),
}

fn default_version() -> String {
    BACKUP_FORMAT_VERSION.to_string()
}

/// What is known about a backup file without restoring it.
#[derive(Debug, Clone, PartialEq)]
pub enum BackupStatus {
    Missing,
    Corrupted(String),
    Available {
        created: Option<DateTime<Local>>,
        kind: Option<BackupKind>,
        entries: usize,
    },
}

impl BackupRecord {
    /// Serializes the record as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, BackupError> {
        let data = self
            .entries()
            .map(|(key, value)| Ok((encode_key(key)?, value.as_ref().map(to_stored))))
            .collect::<Result<StoredEntries, BackupError>>()?;

        let document = BackupDocument {
            timestamp: self
                .created()
                .map(|t| t.to_rfc3339_opts(SecondsFormat::Micros, false)),
            version: self.version().to_string(),
            kind: self.kind(),
            data,
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Parses a record from JSON in the current or the legacy layout.
    pub fn from_json(text: &str) -> Result<Self, BackupError> {
        let (timestamp, version, kind, data) = match serde_json::from_str::<AnyDocument>(text)? {
            AnyDocument::Current(doc) => (doc.timestamp, doc.version, doc.kind, doc.data),
            AnyDocument::Legacy(data) => (None, default_version(), None, data),
        };

        let mut entries = IndexMap::with_capacity(data.len());
        for (raw_key, stored) in data {
            let key = decode_key(&raw_key)?;
            let value = match stored {
                Some(stored) => {
                    Some(from_stored(&stored).map_err(|reason| BackupError::InvalidEntry {
                        key: raw_key.clone(),
                        reason,
                    })?)
                }
                None => None,
            };
            entries.insert(key, value);
        }

        let created = timestamp.as_deref().and_then(parse_timestamp);
        Ok(BackupRecord::from_parts(created, version, kind, entries))
    }

    /// Writes the record to `path`, replacing any previous file.
    pub fn save(&self, path: &Path) -> Result<(), BackupError> {
        let json = self.to_json()?;
        write_atomic(path, json.as_bytes()).map_err(|source| BackupError::Persist {
            path: path.to_path_buf(),
            source,
        })?;
        debug!("Saved {} backup entries to '{}'.", self.len(), path.display());
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, BackupError> {
        let text = fs::read_to_string(path).map_err(|source| BackupError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&text)
    }
}

/// Saves a copy of `record` marked as manual into `dir`, named after the current time.
pub fn export_manual(record: &BackupRecord, dir: &Path) -> Result<PathBuf, BackupError> {
    if record.is_empty() {
        return Err(BackupError::NothingToSave);
    }
    let manual = record.relabelled(BackupKind::Manual);
    let file_name = format!(
        "{}{}.json",
        MANUAL_BACKUP_PREFIX,
        Local::now().format(MANUAL_BACKUP_TIMESTAMP)
    );
    let path = dir.join(file_name);
    manual.save(&path)?;
    Ok(path)
}

pub fn backup_status(path: &Path) -> BackupStatus {
    if !path.exists() {
        return BackupStatus::Missing;
    }
    match BackupRecord::load(path) {
        Ok(record) => BackupStatus::Available {
            created: record.created(),
            kind: record.kind(),
            entries: record.len(),
        },
        Err(e) => BackupStatus::Corrupted(e.to_string()),
    }
}

/// Formats a key as `HIVE\path\name`.
///
/// The path may itself contain backslashes; the name may not, since the last
/// backslash separates it from the path.
pub fn encode_key(key: &EntryKey) -> Result<String, BackupError> {
    if key.name.is_empty() || key.name.contains('\\') {
        return Err(BackupError::InvalidEntry {
            key: key.to_string(),
            reason: "value name must be non-empty and must not contain '\\'".to_string(),
        });
    }
    Ok(key.to_string())
}

/// Parses `HIVE\path\name`, splitting at the first and last backslash.
pub fn decode_key(raw: &str) -> Result<EntryKey, BackupError> {
    let invalid = |reason: &str| BackupError::InvalidEntry {
        key: raw.to_string(),
        reason: reason.to_string(),
    };

    let (hive, rest) = raw
        .split_once('\\')
        .ok_or_else(|| invalid("expected 'HIVE\\path\\name'"))?;
    let scope = Scope::from_str(hive).map_err(|_| invalid("unsupported registry hive"))?;
    let (path, name) = rest.rsplit_once('\\').unwrap_or(("", rest));
    if name.is_empty() {
        return Err(invalid("missing value name"));
    }
    Ok(EntryKey::new(scope, path, name))
}

fn to_stored(value: &RegistryValue) -> StoredValue {
    let json = match value {
        RegistryValue::String(s) | RegistryValue::ExpandString(s) => Value::from(s.as_str()),
        RegistryValue::Dword(v) => Value::from(*v),
        RegistryValue::Qword(v) => Value::from(*v),
        RegistryValue::MultiString(items) => Value::from(items.clone()),
        RegistryValue::Binary(bytes) | RegistryValue::Raw { bytes, .. } => Value::from(bytes.clone()),
    };
    StoredValue {
        value: json,
        vtype: value.type_tag(),
    }
}

fn from_stored(stored: &StoredValue) -> Result<RegistryValue, String> {
    let value = &stored.value;
    let mismatch = || format!("value {} does not match registry type {}", value, stored.vtype);

    match stored.vtype {
        vtype::REG_SZ => value
            .as_str()
            .map(|s| RegistryValue::String(s.to_string()))
            .ok_or_else(mismatch),
        vtype::REG_EXPAND_SZ => value
            .as_str()
            .map(|s| RegistryValue::ExpandString(s.to_string()))
            .ok_or_else(mismatch),
        vtype::REG_DWORD => value
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .map(RegistryValue::Dword)
            .ok_or_else(mismatch),
        vtype::REG_QWORD => value
            .as_u64()
            .map(RegistryValue::Qword)
            .ok_or_else(mismatch),
        vtype::REG_MULTI_SZ => value
            .as_array()
            .and_then(|items| {
                items
                    .iter()
                    .map(|item| item.as_str().map(str::to_string))
                    .collect::<Option<Vec<_>>>()
            })
            .map(RegistryValue::MultiString)
            .ok_or_else(mismatch),
        // Older files store empty binary data as null
        other if value.is_null() => Ok(if other == vtype::REG_BINARY {
            RegistryValue::Binary(Vec::new())
        } else {
            RegistryValue::Raw {
                vtype: other,
                bytes: Vec::new(),
            }
        }),
        other => {
            let bytes = value
                .as_array()
                .and_then(|items| {
                    items
                        .iter()
                        .map(|item| item.as_u64().and_then(|b| u8::try_from(b).ok()))
                        .collect::<Option<Vec<u8>>>()
                })
                .ok_or_else(mismatch)?;
            if other == vtype::REG_BINARY {
                Ok(RegistryValue::Binary(bytes))
            } else {
                Ok(RegistryValue::Raw {
                    vtype: other,
                    bytes,
                })
            }
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Local>> {
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Local));
    }
    match NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        Ok(naive) => Local.from_local_datetime(&naive).earliest(),
        Err(e) => {
            warn!("Unreadable backup timestamp '{}': {}", raw, e);
            None
        }
    }
}

/// Writes to a temporary sibling file, then renames it over `path`.
fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let temp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()));

    let written = File::create(&temp_path).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });
    if let Err(e) = written.and_then(|()| fs::rename(&temp_path, path)) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }
    Ok(())
}
