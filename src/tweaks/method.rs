// src/tweaks/method.rs

use tracing::{debug, error, info, warn};

use super::{Feature, ScriptToggle, ServiceToggle, ToggleAction};
use crate::{
    backup::{capture, BackupRecord},
    log::LogSink,
    store::{EntryKey, RegistryStore, RegistryValue},
    utils::services::{ServiceChange, ServiceControl},
};

/// Everything a feature needs besides the backup record.
#[derive(Clone, Copy)]
pub struct ApplyContext<'a> {
    pub store: &'a dyn RegistryStore,
    pub services: &'a dyn ServiceControl,
    pub log: &'a dyn LogSink,
    pub action: ToggleAction,
    pub simulate: bool,
    pub aggressive: bool,
}

/// Captures the prior state of `key`, then writes `value` unless simulating.
///
/// Returns `false` when the write fails. Capture happens in both modes, so a
/// dry run produces the same record a real run would.
pub fn set_entry(
    store: &dyn RegistryStore,
    key: &EntryKey,
    value: &RegistryValue,
    simulate: bool,
    record: Option<&mut BackupRecord>,
    log: &dyn LogSink,
) -> bool {
    capture(record, store, key, log);

    if simulate {
        log.log(&format!("  [DRY-RUN] Would set {} = {}", key, value));
        return true;
    }

    match store.write(key, value) {
        Ok(()) => {
            debug!("Set '{}' to {}.", key, value);
            log.log(&format!("  [SUCCESS] Set {} = {}", key, value));
            true
        }
        Err(e) => {
            error!("Failed to set '{}': {}", key, e);
            log.log(&format!("  [ERROR] Failed to set {}: {}", key, e));
            false
        }
    }
}

/// Puts one service in the state `toggle` asks for. A service that is not
/// installed counts as success.
pub fn toggle_service(ctx: &ApplyContext, toggle: &ServiceToggle) -> bool {
    let Some(enabled) = toggle.target(ctx.action, ctx.aggressive) else {
        debug!("Leaving service '{}' untouched.", toggle.name);
        return true;
    };
    let state = if enabled { "enabled" } else { "disabled" };

    if ctx.simulate {
        ctx.log.log(&format!(
            "  [DRY-RUN] Would set service {} to {}",
            toggle.name, state
        ));
        return true;
    }

    match ctx.services.set_service_enabled(toggle.name, enabled) {
        Ok(ServiceChange::Applied) => {
            ctx.log
                .log(&format!("  [SUCCESS] Service {} {}", toggle.name, state));
            true
        }
        Ok(ServiceChange::NotInstalled) => {
            info!("Service '{}' not installed, skipping.", toggle.name);
            ctx.log.log(&format!(
                "  [SKIPPED] Service {} is not installed",
                toggle.name
            ));
            true
        }
        Err(e) => {
            error!("Failed to configure service '{}': {:?}", toggle.name, e);
            ctx.log.log(&format!(
                "  [ERROR] Failed to configure service {}: {}",
                toggle.name, e
            ));
            false
        }
    }
}

fn run_script(ctx: &ApplyContext, script: &ScriptToggle) -> bool {
    let command = script.script_for(ctx.action);

    if ctx.simulate {
        ctx.log
            .log(&format!("  [DRY-RUN] Would run PowerShell: {}", command));
        return true;
    }

    match ctx.services.run_powershell(command) {
        Ok(()) => {
            ctx.log.log(&format!("  [SUCCESS] Ran {}", command));
            true
        }
        Err(e) => {
            warn!("PowerShell command '{}' failed: {:?}", command, e);
            ctx.log.log(&format!(
                "  [WARNING] Could not run {}. It may be blocked by policy or Tamper Protection.",
                command
            ));
            false
        }
    }
}

/// Applies one feature: its script, then its registry values, then its
/// services. Every step runs even after an earlier one fails; the feature
/// succeeds only if all of them do.
pub fn apply_feature(
    feature: &Feature,
    ctx: &ApplyContext,
    mut record: Option<&mut BackupRecord>,
) -> bool {
    ctx.log.log(&format!(
        "{} {}...",
        ctx.action.verb(),
        feature.title
    ));
    let mut success = true;

    if let Some(script) = &feature.script {
        success &= run_script(ctx, script);
    }

    for modification in &feature.modifications {
        success &= set_entry(
            ctx.store,
            &modification.key,
            modification.value_for(ctx.action),
            ctx.simulate,
            record.as_deref_mut(),
            ctx.log,
        );
    }

    for toggle in &feature.services {
        success &= toggle_service(ctx, toggle);
    }

    if success {
        info!("{} applied.", feature.id);
    } else {
        warn!("{} applied with errors.", feature.id);
    }
    success
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::{
        backup::{restore::restore, BackupKind},
        store::Scope,
        testing::{MemoryLog, MemoryStore, RecordingServices},
        tweaks::{FeatureId, RegistryModification, ServicePolicy},
    };

    fn abc() -> EntryKey {
        EntryKey::new(Scope::LocalMachine, "A\\B", "C")
    }

    fn context<'a>(
        store: &'a MemoryStore,
        services: &'a RecordingServices,
        log: &'a MemoryLog,
        action: ToggleAction,
        simulate: bool,
    ) -> ApplyContext<'a> {
        ApplyContext {
            store,
            services,
            log,
            action,
            simulate,
            aggressive: false,
        }
    }

    #[test]
    fn test_set_then_restore_round_trips_dword() {
        let store = MemoryStore::with([(abc(), RegistryValue::Dword(1))]);
        let log = MemoryLog::new();
        let mut record = BackupRecord::new(BackupKind::Automatic);

        assert!(set_entry(
            &store,
            &abc(),
            &RegistryValue::Dword(0),
            false,
            Some(&mut record),
            &log
        ));
        assert_eq!(store.get(&abc()), Some(RegistryValue::Dword(0)));
        assert_eq!(record.get(&abc()), Some(&Some(RegistryValue::Dword(1))));

        restore(&store, &record, &log);

        assert_eq!(store.get(&abc()), Some(RegistryValue::Dword(1)));
    }

    #[test]
    fn test_set_then_restore_removes_created_value() {
        let store = MemoryStore::new();
        let key = EntryKey::new(Scope::CurrentUser, "Software\\Fresh", "Flag");
        let log = MemoryLog::new();
        let mut record = BackupRecord::new(BackupKind::Automatic);

        set_entry(
            &store,
            &key,
            &RegistryValue::String("on".to_string()),
            false,
            Some(&mut record),
            &log,
        );
        restore(&store, &record, &log);

        assert_eq!(store.get(&key), None);
    }

    #[test]
    fn test_set_entry_reports_write_failure() {
        let store = MemoryStore::new();
        store.deny_writes(&abc());
        let log = MemoryLog::new();

        let written = set_entry(&store, &abc(), &RegistryValue::Dword(0), false, None, &log);

        assert!(!written);
        assert!(log.contains("[ERROR] Failed to set HKEY_LOCAL_MACHINE\\A\\B\\C"));
    }

    #[test]
    fn test_simulate_fills_record_like_real_run() {
        let initial = [
            (abc(), RegistryValue::Dword(1)),
            (
                EntryKey::new(Scope::CurrentUser, "X", "Y"),
                RegistryValue::ExpandString("%TEMP%".to_string()),
            ),
        ];
        let feature = Feature {
            id: FeatureId::Cortana,
            title: "Test",
            description: "",
            script: None,
            modifications: vec![
                RegistryModification {
                    key: abc(),
                    enabled: RegistryValue::Dword(1),
                    disabled: RegistryValue::Dword(0),
                },
                RegistryModification {
                    key: EntryKey::new(Scope::CurrentUser, "X", "Y"),
                    enabled: RegistryValue::String("a".to_string()),
                    disabled: RegistryValue::String("b".to_string()),
                },
                RegistryModification {
                    key: EntryKey::new(Scope::CurrentUser, "X", "Missing"),
                    enabled: RegistryValue::Dword(1),
                    disabled: RegistryValue::Dword(0),
                },
            ],
            services: Vec::new(),
        };
        let services = RecordingServices::new();
        let log = MemoryLog::new();

        let dry_store = MemoryStore::with(initial.clone());
        let mut dry_record = BackupRecord::new(BackupKind::Automatic);
        let ctx = context(&dry_store, &services, &log, ToggleAction::Disable, true);
        assert!(apply_feature(&feature, &ctx, Some(&mut dry_record)));

        let real_store = MemoryStore::with(initial.clone());
        let mut real_record = BackupRecord::new(BackupKind::Automatic);
        let ctx = context(&real_store, &services, &log, ToggleAction::Disable, false);
        assert!(apply_feature(&feature, &ctx, Some(&mut real_record)));

        assert_eq!(dry_store.snapshot(), MemoryStore::with(initial).snapshot());
        assert_eq!(
            dry_record.entries().collect::<Vec<_>>(),
            real_record.entries().collect::<Vec<_>>()
        );
        assert_eq!(dry_record.len(), 3);
        assert!(log.contains("[DRY-RUN] Would set HKEY_LOCAL_MACHINE\\A\\B\\C = Dword(0)"));
    }

    #[test]
    fn test_simulate_does_not_touch_services() {
        let store = MemoryStore::new();
        let services = RecordingServices::new();
        let log = MemoryLog::new();
        let ctx = context(&store, &services, &log, ToggleAction::Disable, true);

        assert!(apply_feature(&FeatureId::Defender.definition(), &ctx, None));

        assert!(services.calls().is_empty());
        assert!(services.scripts().is_empty());
        assert!(log.contains("[DRY-RUN] Would set service WinDefend to disabled"));
        assert!(log.contains("[DRY-RUN] Would run PowerShell"));
    }

    #[test]
    fn test_missing_service_counts_as_success() {
        let store = MemoryStore::new();
        let services = RecordingServices::new().missing("dmwappushservice");
        let log = MemoryLog::new();
        let ctx = context(&store, &services, &log, ToggleAction::Disable, false);

        assert!(apply_feature(&FeatureId::Telemetry.definition(), &ctx, None));
        assert!(log.contains("[SKIPPED] Service dmwappushservice is not installed"));
    }

    #[test]
    fn test_failed_service_fails_feature_but_other_steps_run() {
        let store = MemoryStore::new();
        let services = RecordingServices::new().failing("DiagTrack");
        let log = MemoryLog::new();
        let ctx = context(&store, &services, &log, ToggleAction::Disable, false);

        assert!(!apply_feature(&FeatureId::Telemetry.definition(), &ctx, None));

        let allow = EntryKey::new(
            Scope::LocalMachine,
            "SOFTWARE\\Policies\\Microsoft\\Windows\\DataCollection",
            "AllowTelemetry",
        );
        assert_eq!(store.get(&allow), Some(RegistryValue::Dword(0)));
        assert_eq!(
            services.calls(),
            vec![
                ("DiagTrack".to_string(), false),
                ("dmwappushservice".to_string(), false),
            ]
        );
    }

    #[test]
    fn test_defender_runs_script_before_registry() {
        let store = MemoryStore::new();
        let services = RecordingServices::new();
        let log = MemoryLog::new();
        let ctx = context(&store, &services, &log, ToggleAction::Enable, false);

        assert!(apply_feature(&FeatureId::Defender.definition(), &ctx, None));

        assert_eq!(
            services.scripts(),
            vec!["Set-MpPreference -DisableRealtimeMonitoring $false".to_string()]
        );
        let lines = log.lines();
        let script_at = lines.iter().position(|l| l.contains("Set-MpPreference"));
        let registry_at = lines.iter().position(|l| l.contains("DisableAntiSpyware"));
        assert!(script_at < registry_at);
        assert_eq!(lines[0], "Enabling Windows Defender...");
    }

    #[test]
    fn test_untouched_service_is_not_called() {
        let store = MemoryStore::new();
        let services = RecordingServices::new();
        let log = MemoryLog::new();
        let ctx = context(&store, &services, &log, ToggleAction::Disable, false);
        let toggle = ServiceToggle {
            name: "wuauserv",
            policy: ServicePolicy::AggressiveOnly,
        };

        assert!(toggle_service(&ctx, &toggle));
        assert!(services.calls().is_empty());
    }
}
