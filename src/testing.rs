// src/testing.rs

//! In-memory doubles for the registry, the service controller and the log sink.

use std::{
    collections::{HashMap, HashSet},
    sync::Mutex,
};

use crate::{
    errors::StoreError,
    log::LogSink,
    store::{EntryKey, RegistryStore, RegistryValue},
    utils::services::{ServiceChange, ServiceControl},
};

/// A registry kept in a map. Keys can be marked unreadable or unwritable to
/// simulate permission failures.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<EntryKey, RegistryValue>>,
    deny_reads: Mutex<HashSet<EntryKey>>,
    deny_writes: Mutex<HashSet<EntryKey>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(entries: impl IntoIterator<Item = (EntryKey, RegistryValue)>) -> Self {
        let store = Self::new();
        store.values.lock().unwrap().extend(entries);
        store
    }

    pub fn get(&self, key: &EntryKey) -> Option<RegistryValue> {
        self.values.lock().unwrap().get(key).cloned()
    }

    pub fn set(&self, key: &EntryKey, value: RegistryValue) {
        self.values.lock().unwrap().insert(key.clone(), value);
    }

    pub fn remove(&self, key: &EntryKey) {
        self.values.lock().unwrap().remove(key);
    }

    pub fn snapshot(&self) -> HashMap<EntryKey, RegistryValue> {
        self.values.lock().unwrap().clone()
    }

    pub fn deny_reads(&self, key: &EntryKey) {
        self.deny_reads.lock().unwrap().insert(key.clone());
    }

    pub fn allow_reads(&self, key: &EntryKey) {
        self.deny_reads.lock().unwrap().remove(key);
    }

    pub fn deny_writes(&self, key: &EntryKey) {
        self.deny_writes.lock().unwrap().insert(key.clone());
    }
}

impl RegistryStore for MemoryStore {
    fn read(&self, key: &EntryKey) -> Result<Option<RegistryValue>, StoreError> {
        if self.deny_reads.lock().unwrap().contains(key) {
            return Err(StoreError::PermissionDenied { key: key.clone() });
        }
        Ok(self.get(key))
    }

    fn write(&self, key: &EntryKey, value: &RegistryValue) -> Result<(), StoreError> {
        if self.deny_writes.lock().unwrap().contains(key) {
            return Err(StoreError::PermissionDenied { key: key.clone() });
        }
        self.set(key, value.clone());
        Ok(())
    }

    fn delete(&self, key: &EntryKey) -> Result<bool, StoreError> {
        if self.deny_writes.lock().unwrap().contains(key) {
            return Err(StoreError::PermissionDenied { key: key.clone() });
        }
        Ok(self.values.lock().unwrap().remove(key).is_some())
    }
}

/// Records service toggles and PowerShell commands instead of running them.
#[derive(Default)]
pub struct RecordingServices {
    calls: Mutex<Vec<(String, bool)>>,
    scripts: Mutex<Vec<String>>,
    failing: HashSet<String>,
    missing: HashSet<String>,
}

impl RecordingServices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, name: &str) -> Self {
        self.failing.insert(name.to_string());
        self
    }

    pub fn missing(mut self, name: &str) -> Self {
        self.missing.insert(name.to_string());
        self
    }

    pub fn calls(&self) -> Vec<(String, bool)> {
        self.calls.lock().unwrap().clone()
    }

    pub fn scripts(&self) -> Vec<String> {
        self.scripts.lock().unwrap().clone()
    }
}

impl ServiceControl for RecordingServices {
    fn set_service_enabled(&self, name: &str, enabled: bool) -> anyhow::Result<ServiceChange> {
        self.calls.lock().unwrap().push((name.to_string(), enabled));
        if self.failing.contains(name) {
            anyhow::bail!("access denied to service '{}'", name);
        }
        if self.missing.contains(name) {
            return Ok(ServiceChange::NotInstalled);
        }
        Ok(ServiceChange::Applied)
    }

    fn run_powershell(&self, script: &str) -> anyhow::Result<()> {
        self.scripts.lock().unwrap().push(script.to_string());
        Ok(())
    }
}

/// Collects log lines and progress updates.
#[derive(Default)]
pub struct MemoryLog {
    lines: Mutex<Vec<String>>,
    progress: Mutex<Vec<(usize, usize)>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.lines().iter().any(|line| line.contains(needle))
    }

    pub fn progress_updates(&self) -> Vec<(usize, usize)> {
        self.progress.lock().unwrap().clone()
    }
}

impl LogSink for MemoryLog {
    fn log(&self, message: &str) {
        self.lines.lock().unwrap().push(message.to_string());
    }

    fn progress(&self, completed: usize, total: usize) {
        self.progress.lock().unwrap().push((completed, total));
    }
}
