// src/backup/restore.rs

use tracing::{debug, error, info};

use super::BackupRecord;
use crate::{log::LogSink, store::RegistryStore};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RestoreSummary {
    pub restored: usize,
    pub failed: usize,
}

/// Returns every value in `record` to its captured state.
///
/// Values captured as absent are deleted; a value that is already gone counts
/// as restored. Captured values are written back with their original type,
/// recreating parent keys when needed. Each entry is handled on its own: a
/// failure is logged and counted, and the remaining entries still run.
pub fn restore(
    store: &dyn RegistryStore,
    record: &BackupRecord,
    log: &dyn LogSink,
) -> RestoreSummary {
    info!("Restoring {} registry values.", record.len());
    let mut summary = RestoreSummary::default();

    for (key, previous) in record.entries() {
        let result = match previous {
            None => store.delete(key).map(|removed| {
                if removed {
                    log.log(&format!("  [RESTORED] Deleted {}", key));
                } else {
                    debug!("'{}' already absent.", key);
                    log.log(&format!("  [RESTORED] {} already absent", key));
                }
            }),
            Some(value) => store.write(key, value).map(|()| {
                log.log(&format!("  [RESTORED] {} = {}", key, value));
            }),
        };

        match result {
            Ok(()) => summary.restored += 1,
            Err(e) => {
                error!("Failed to restore '{}': {}", key, e);
                log.log(&format!("  [ERROR] Failed to restore {}: {}", key, e));
                summary.failed += 1;
            }
        }
    }

    log.log(&format!(
        "Restore complete: {} restored, {} failed.",
        summary.restored, summary.failed
    ));
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        backup::{capture, BackupKind},
        store::{EntryKey, RegistryValue, Scope},
        testing::{MemoryLog, MemoryStore},
    };

    fn key(name: &str) -> EntryKey {
        EntryKey::new(Scope::LocalMachine, "A\\B", name)
    }

    fn record_of(store: &MemoryStore, keys: &[EntryKey]) -> BackupRecord {
        let mut record = BackupRecord::new(BackupKind::Automatic);
        for k in keys {
            capture(Some(&mut record), store, k, &MemoryLog::new());
        }
        record
    }

    #[test]
    fn test_restore_rewrites_present_values() {
        let store = MemoryStore::with([(key("C"), RegistryValue::Dword(1))]);
        let record = record_of(&store, &[key("C")]);
        store.set(&key("C"), RegistryValue::Dword(0));

        let summary = restore(&store, &record, &MemoryLog::new());

        assert_eq!(summary, RestoreSummary { restored: 1, failed: 0 });
        assert_eq!(store.get(&key("C")), Some(RegistryValue::Dword(1)));
    }

    #[test]
    fn test_restore_deletes_values_that_were_absent() {
        let store = MemoryStore::new();
        let record = record_of(&store, &[key("New")]);
        store.set(&key("New"), RegistryValue::Dword(0));

        restore(&store, &record, &MemoryLog::new());

        assert_eq!(store.read(&key("New")).unwrap(), None);
    }

    #[test]
    fn test_restore_tolerates_entries_deleted_since_capture() {
        let store = MemoryStore::with([(key("Kept"), RegistryValue::String("x".to_string()))]);
        let record = record_of(&store, &[key("Kept"), key("Gone")]);
        // Both values vanish before restore runs
        store.remove(&key("Kept"));

        let summary = restore(&store, &record, &MemoryLog::new());

        assert_eq!(summary, RestoreSummary { restored: 2, failed: 0 });
        assert_eq!(
            store.get(&key("Kept")),
            Some(RegistryValue::String("x".to_string()))
        );
        assert_eq!(store.get(&key("Gone")), None);
    }

    #[test]
    fn test_restore_continues_after_failure() {
        let store = MemoryStore::with([
            (key("One"), RegistryValue::Dword(1)),
            (key("Two"), RegistryValue::Dword(2)),
            (key("Three"), RegistryValue::Dword(3)),
        ]);
        let record = record_of(&store, &[key("One"), key("Two"), key("Three")]);
        for name in ["One", "Two", "Three"] {
            store.set(&key(name), RegistryValue::Dword(0));
        }
        store.deny_writes(&key("Two"));
        let log = MemoryLog::new();

        let summary = restore(&store, &record, &log);

        assert_eq!(summary, RestoreSummary { restored: 2, failed: 1 });
        assert_eq!(store.get(&key("One")), Some(RegistryValue::Dword(1)));
        assert_eq!(store.get(&key("Two")), Some(RegistryValue::Dword(0)));
        assert_eq!(store.get(&key("Three")), Some(RegistryValue::Dword(3)));
        assert!(log.contains("Failed to restore HKEY_LOCAL_MACHINE\\A\\B\\Two"));
        assert!(log.contains("Restore complete: 2 restored, 1 failed."));
    }

    #[test]
    fn test_restore_empty_record() {
        let summary = restore(
            &MemoryStore::new(),
            &BackupRecord::new(BackupKind::Manual),
            &MemoryLog::new(),
        );
        assert_eq!(summary, RestoreSummary::default());
    }
}
