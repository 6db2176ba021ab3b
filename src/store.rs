// src/store.rs

use std::fmt;

use strum_macros::{Display, EnumIter, EnumString};

use crate::errors::StoreError;

/// Registry value type tags, as reported by the operating system.
pub mod vtype {
    pub const REG_NONE: u32 = 0;
    pub const REG_SZ: u32 = 1;
    pub const REG_EXPAND_SZ: u32 = 2;
    pub const REG_BINARY: u32 = 3;
    pub const REG_DWORD: u32 = 4;
    pub const REG_DWORD_BIG_ENDIAN: u32 = 5;
    pub const REG_LINK: u32 = 6;
    pub const REG_MULTI_SZ: u32 = 7;
    pub const REG_RESOURCE_LIST: u32 = 8;
    pub const REG_FULL_RESOURCE_DESCRIPTOR: u32 = 9;
    pub const REG_RESOURCE_REQUIREMENTS_LIST: u32 = 10;
    pub const REG_QWORD: u32 = 11;
}

/// Root namespace of a registry entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum Scope {
    #[strum(to_string = "HKEY_LOCAL_MACHINE", serialize = "HKLM")]
    LocalMachine,
    #[strum(to_string = "HKEY_CURRENT_USER", serialize = "HKCU")]
    CurrentUser,
}

/// Identifies one registry value: hive, key path inside the hive, value name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntryKey {
    pub scope: Scope,
    pub path: String,
    pub name: String,
}

impl EntryKey {
    pub fn new(scope: Scope, path: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            scope,
            path: path.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}\\{}", self.scope, self.name)
        } else {
            write!(f, "{}\\{}\\{}", self.scope, self.path, self.name)
        }
    }
}

/// Typed registry data. The variant fixes the type tag written back on restore.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum RegistryValue {
    String(String),
    ExpandString(String),
    Binary(Vec<u8>),
    Dword(u32),
    MultiString(Vec<String>),
    Qword(u64),
    /// Any other type, kept byte for byte.
    Raw { vtype: u32, bytes: Vec<u8> },
}

impl RegistryValue {
    pub fn type_tag(&self) -> u32 {
        match self {
            RegistryValue::String(_) => vtype::REG_SZ,
            RegistryValue::ExpandString(_) => vtype::REG_EXPAND_SZ,
            RegistryValue::Binary(_) => vtype::REG_BINARY,
            RegistryValue::Dword(_) => vtype::REG_DWORD,
            RegistryValue::MultiString(_) => vtype::REG_MULTI_SZ,
            RegistryValue::Qword(_) => vtype::REG_QWORD,
            RegistryValue::Raw { vtype, .. } => *vtype,
        }
    }
}

impl fmt::Display for RegistryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryValue::String(v) => write!(f, "String({})", v),
            RegistryValue::ExpandString(v) => write!(f, "ExpandString({})", v),
            RegistryValue::Binary(v) => write!(f, "Binary({:?})", v),
            RegistryValue::Dword(v) => write!(f, "Dword({})", v),
            RegistryValue::MultiString(v) => write!(f, "MultiString({:?})", v),
            RegistryValue::Qword(v) => write!(f, "Qword({})", v),
            RegistryValue::Raw { vtype, bytes } => write!(f, "Raw({}, {:?})", vtype, bytes),
        }
    }
}

/// Keyed access to the registry.
pub trait RegistryStore: Send + Sync {
    /// Reads a value. `Ok(None)` when the value or any parent key does not exist.
    fn read(&self, key: &EntryKey) -> Result<Option<RegistryValue>, StoreError>;

    /// Writes a value, creating missing parent keys.
    fn write(&self, key: &EntryKey, value: &RegistryValue) -> Result<(), StoreError>;

    /// Deletes a value. `Ok(false)` when there was nothing to delete.
    fn delete(&self, key: &EntryKey) -> Result<bool, StoreError>;
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;

    #[test]
    fn test_scope_parses_long_and_short_names() {
        assert_eq!(Scope::from_str("HKEY_LOCAL_MACHINE").unwrap(), Scope::LocalMachine);
        assert_eq!(Scope::from_str("HKLM").unwrap(), Scope::LocalMachine);
        assert_eq!(Scope::from_str("hkcu").unwrap(), Scope::CurrentUser);
        assert!(Scope::from_str("HKEY_USERS").is_err());
    }

    #[test]
    fn test_scope_displays_long_name() {
        assert_eq!(Scope::CurrentUser.to_string(), "HKEY_CURRENT_USER");
    }

    #[test]
    fn test_entry_key_display() {
        let key = EntryKey::new(Scope::LocalMachine, "A\\B", "C");
        assert_eq!(key.to_string(), "HKEY_LOCAL_MACHINE\\A\\B\\C");
    }

    #[test]
    fn test_type_tags() {
        assert_eq!(RegistryValue::Dword(0).type_tag(), vtype::REG_DWORD);
        assert_eq!(RegistryValue::String(String::new()).type_tag(), vtype::REG_SZ);
        assert_eq!(
            RegistryValue::Raw {
                vtype: vtype::REG_DWORD_BIG_ENDIAN,
                bytes: vec![0, 0, 0, 1]
            }
            .type_tag(),
            vtype::REG_DWORD_BIG_ENDIAN
        );
    }
}
