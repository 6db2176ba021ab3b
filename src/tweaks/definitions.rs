// src/tweaks/definitions.rs

use super::{
    Feature, FeatureId, RegistryModification, ScriptToggle, ServicePolicy, ServiceToggle,
};
use crate::store::{EntryKey, RegistryValue, Scope};

/// A DWORD modification with distinct values for the enabled and disabled states.
fn dword(scope: Scope, path: &str, name: &str, enabled: u32, disabled: u32) -> RegistryModification {
    RegistryModification {
        key: EntryKey::new(scope, path, name),
        enabled: RegistryValue::Dword(enabled),
        disabled: RegistryValue::Dword(disabled),
    }
}

fn follow(name: &'static str) -> ServiceToggle {
    ServiceToggle {
        name,
        policy: ServicePolicy::Follow,
    }
}

pub fn defender() -> Feature {
    Feature {
        id: FeatureId::Defender,
        title: "Windows Defender",
        description: "Real-time monitoring, the DisableAntiSpyware policy and the WinDefend service. Tamper Protection may block the real-time monitoring change.",
        script: Some(ScriptToggle {
            enable: "Set-MpPreference -DisableRealtimeMonitoring $false",
            disable: "Set-MpPreference -DisableRealtimeMonitoring $true",
        }),
        modifications: vec![dword(
            Scope::LocalMachine,
            "SOFTWARE\\Policies\\Microsoft\\Windows Defender",
            "DisableAntiSpyware",
            0,
            1,
        )],
        services: vec![follow("WinDefend")],
    }
}

pub fn telemetry() -> Feature {
    Feature {
        id: FeatureId::Telemetry,
        title: "Telemetry & Data Collection",
        description: "The AllowTelemetry policy plus the DiagTrack and dmwappushservice services. Aggressive mode also disables Windows Update (wuauserv).",
        script: None,
        modifications: vec![dword(
            Scope::LocalMachine,
            "SOFTWARE\\Policies\\Microsoft\\Windows\\DataCollection",
            "AllowTelemetry",
            1,
            0,
        )],
        services: vec![
            follow("DiagTrack"),
            follow("dmwappushservice"),
            ServiceToggle {
                name: "wuauserv",
                policy: ServicePolicy::AggressiveOnly,
            },
        ],
    }
}

pub fn activity_and_recall() -> Feature {
    Feature {
        id: FeatureId::ActivityRecall,
        title: "Activity Tracking, Timeline & Recall",
        description: "Recall snapshots, activity history publishing and tailored experiences from diagnostic data.",
        script: None,
        modifications: vec![
            dword(
                Scope::LocalMachine,
                "SOFTWARE\\Policies\\Microsoft\\Windows\\WindowsAI",
                "AllowRecallEnablement",
                1,
                0,
            ),
            // Inverted: 1 turns snapshots off
            dword(
                Scope::LocalMachine,
                "SOFTWARE\\Policies\\Microsoft\\Windows\\WindowsAI",
                "DisableSnapshot",
                0,
                1,
            ),
            dword(
                Scope::LocalMachine,
                "SOFTWARE\\Policies\\Microsoft\\Windows\\System",
                "PublishUserActivities",
                1,
                0,
            ),
            dword(
                Scope::CurrentUser,
                "Software\\Microsoft\\Windows\\CurrentVersion\\Privacy",
                "TailoredExperiencesWithDiagnosticDataEnabled",
                1,
                0,
            ),
        ],
        services: Vec::new(),
    }
}

pub fn advertising_and_suggestions() -> Feature {
    Feature {
        id: FeatureId::Advertising,
        title: "Advertising ID & Content Suggestions",
        description: "The per-user advertising ID, silently installed apps and suggested content.",
        script: None,
        modifications: vec![
            dword(
                Scope::CurrentUser,
                "Software\\Microsoft\\Windows\\CurrentVersion\\AdvertisingInfo",
                "Enabled",
                1,
                0,
            ),
            dword(
                Scope::CurrentUser,
                "Software\\Microsoft\\Windows\\CurrentVersion\\ContentDeliveryManager",
                "SilentInstalledAppsEnabled",
                1,
                0,
            ),
            dword(
                Scope::CurrentUser,
                "Software\\Microsoft\\Windows\\CurrentVersion\\ContentDeliveryManager",
                "SubscribedContent-338389Enabled",
                1,
                0,
            ),
        ],
        services: Vec::new(),
    }
}

pub fn cortana() -> Feature {
    Feature {
        id: FeatureId::Cortana,
        title: "Cortana",
        description: "The AllowCortana search policy.",
        script: None,
        modifications: vec![dword(
            Scope::LocalMachine,
            "SOFTWARE\\Policies\\Microsoft\\Windows\\Windows Search",
            "AllowCortana",
            1,
            0,
        )],
        services: Vec::new(),
    }
}
