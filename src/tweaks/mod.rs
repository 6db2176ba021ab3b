// src/tweaks/mod.rs

pub mod batch;
pub mod definitions;
pub mod method;

use strum_macros::{Display, EnumIter, EnumString};

use crate::store::{EntryKey, RegistryValue};

/// Identifies a privacy feature. The kebab-case name is what the CLI accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter)]
#[strum(serialize_all = "kebab-case", ascii_case_insensitive)]
pub enum FeatureId {
    Defender,
    Telemetry,
    ActivityRecall,
    Advertising,
    Cortana,
}

impl FeatureId {
    pub fn definition(self) -> Feature {
        match self {
            FeatureId::Defender => definitions::defender(),
            FeatureId::Telemetry => definitions::telemetry(),
            FeatureId::ActivityRecall => definitions::activity_and_recall(),
            FeatureId::Advertising => definitions::advertising_and_suggestions(),
            FeatureId::Cortana => definitions::cortana(),
        }
    }
}

/// Whether a batch turns the selected features on or off.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum ToggleAction {
    Enable,
    Disable,
}

impl ToggleAction {
    pub fn is_enable(self) -> bool {
        self == ToggleAction::Enable
    }

    fn verb(self) -> &'static str {
        match self {
            ToggleAction::Enable => "Enabling",
            ToggleAction::Disable => "Disabling",
        }
    }
}

/// One registry value a feature controls, with its value in each state.
#[derive(Debug, Clone)]
pub struct RegistryModification {
    pub key: EntryKey,
    pub enabled: RegistryValue,
    pub disabled: RegistryValue,
}

impl RegistryModification {
    pub fn value_for(&self, action: ToggleAction) -> &RegistryValue {
        match action {
            ToggleAction::Enable => &self.enabled,
            ToggleAction::Disable => &self.disabled,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServicePolicy {
    /// Enabled with the feature, disabled with it.
    Follow,
    /// Disabled only in aggressive mode, but re-enabled whenever the feature is enabled.
    AggressiveOnly,
}

#[derive(Debug, Clone)]
pub struct ServiceToggle {
    pub name: &'static str,
    pub policy: ServicePolicy,
}

impl ServiceToggle {
    /// The state to put the service in, or `None` to leave it alone.
    pub fn target(&self, action: ToggleAction, aggressive: bool) -> Option<bool> {
        match (self.policy, action) {
            (ServicePolicy::Follow, action) => Some(action.is_enable()),
            (ServicePolicy::AggressiveOnly, ToggleAction::Enable) => Some(true),
            (ServicePolicy::AggressiveOnly, ToggleAction::Disable) if aggressive => Some(false),
            (ServicePolicy::AggressiveOnly, ToggleAction::Disable) => None,
        }
    }
}

/// PowerShell commands run before the registry changes.
#[derive(Debug, Clone)]
pub struct ScriptToggle {
    pub enable: &'static str,
    pub disable: &'static str,
}

impl ScriptToggle {
    pub fn script_for(&self, action: ToggleAction) -> &'static str {
        match action {
            ToggleAction::Enable => self.enable,
            ToggleAction::Disable => self.disable,
        }
    }
}

/// A privacy feature: the registry values and services that make it up.
#[derive(Debug, Clone)]
pub struct Feature {
    pub id: FeatureId,
    pub title: &'static str,
    pub description: &'static str,
    pub script: Option<ScriptToggle>,
    pub modifications: Vec<RegistryModification>,
    pub services: Vec<ServiceToggle>,
}

/// All features, in the order a batch runs them.
pub fn all_features() -> Vec<Feature> {
    use strum::IntoEnumIterator;

    FeatureId::iter().map(FeatureId::definition).collect()
}
