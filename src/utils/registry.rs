// src/utils/registry.rs

use crate::{
    errors::StoreError,
    store::{vtype, EntryKey, RegistryValue},
};

/// The registry implementation for the current platform.
#[cfg(windows)]
pub type SystemRegistry = WinRegistry;
#[cfg(not(windows))]
pub type SystemRegistry = UnsupportedRegistry;

/// Converts raw registry data into a typed value.
///
/// # Returns
///
/// - `Ok(RegistryValue)` for well-formed data. Unknown type tags become `RegistryValue::Raw`.
/// - `Err(StoreError::UnexpectedType)` if the bytes do not fit the declared type.
pub fn decode_raw_value(
    key: &EntryKey,
    value_type: u32,
    bytes: &[u8],
) -> Result<RegistryValue, StoreError> {
    let unexpected = |reason: String| StoreError::UnexpectedType {
        key: key.clone(),
        vtype: value_type,
        reason,
    };

    match value_type {
        vtype::REG_DWORD => {
            let data: [u8; 4] = bytes
                .try_into()
                .map_err(|_| unexpected(format!("REG_DWORD data is {} bytes", bytes.len())))?;
            Ok(RegistryValue::Dword(u32::from_le_bytes(data)))
        }
        vtype::REG_QWORD => {
            let data: [u8; 8] = bytes
                .try_into()
                .map_err(|_| unexpected(format!("REG_QWORD data is {} bytes", bytes.len())))?;
            Ok(RegistryValue::Qword(u64::from_le_bytes(data)))
        }
        vtype::REG_BINARY => Ok(RegistryValue::Binary(bytes.to_vec())),
        vtype::REG_SZ | vtype::REG_EXPAND_SZ => {
            let units = utf16_units(bytes).map_err(unexpected)?;
            let end = units.iter().position(|&u| u == 0).unwrap_or(units.len());
            let text = String::from_utf16(&units[..end])
                .map_err(|e| unexpected(format!("invalid UTF-16: {}", e)))?;
            if value_type == vtype::REG_SZ {
                Ok(RegistryValue::String(text))
            } else {
                Ok(RegistryValue::ExpandString(text))
            }
        }
        vtype::REG_MULTI_SZ => {
            let mut units = utf16_units(bytes).map_err(unexpected)?;
            while units.last() == Some(&0) {
                units.pop();
            }
            if units.is_empty() {
                return Ok(RegistryValue::MultiString(Vec::new()));
            }
            units
                .split(|&u| u == 0)
                .map(String::from_utf16)
                .collect::<Result<Vec<_>, _>>()
                .map(RegistryValue::MultiString)
                .map_err(|e| unexpected(format!("invalid UTF-16: {}", e)))
        }
        other => Ok(RegistryValue::Raw {
            vtype: other,
            bytes: bytes.to_vec(),
        }),
    }
}

/// Converts a typed value into the `(type tag, bytes)` pair the registry stores.
pub fn encode_raw_value(value: &RegistryValue) -> (u32, Vec<u8>) {
    let bytes = match value {
        RegistryValue::Dword(v) => v.to_le_bytes().to_vec(),
        RegistryValue::Qword(v) => v.to_le_bytes().to_vec(),
        RegistryValue::Binary(data) => data.clone(),
        RegistryValue::String(s) | RegistryValue::ExpandString(s) => {
            s.encode_utf16()
                .chain(std::iter::once(0))
                .flat_map(|c| c.to_le_bytes())
                .collect()
        }
        RegistryValue::MultiString(items) => items
            .iter()
            .flat_map(|s| s.encode_utf16().chain(std::iter::once(0)))
            .chain(std::iter::once(0))
            .flat_map(|c| c.to_le_bytes())
            .collect(),
        RegistryValue::Raw { bytes, .. } => bytes.clone(),
    };
    (value.type_tag(), bytes)
}

fn utf16_units(bytes: &[u8]) -> Result<Vec<u16>, String> {
    if bytes.len() % 2 != 0 {
        return Err(format!("string data has odd length {}", bytes.len()));
    }
    Ok(bytes
        .chunks_exact(2)
        .map(|chunk| u16::from_le_bytes([chunk[0], chunk[1]]))
        .collect())
}

#[cfg(windows)]
pub use windows_registry::WinRegistry;

#[cfg(windows)]
mod windows_registry {
    use std::io;

    use tracing::trace;
    use winreg::{
        enums::{RegType, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_READ, KEY_WRITE},
        RegKey, RegValue,
    };

    use super::{decode_raw_value, encode_raw_value};
    use crate::{
        errors::StoreError,
        store::{vtype, EntryKey, RegistryStore, RegistryValue, Scope},
    };

    /// The live Windows registry, accessed through `winreg`.
    #[derive(Debug, Default, Clone, Copy)]
    pub struct WinRegistry;

    impl WinRegistry {
        pub fn new() -> Self {
            Self
        }
    }

    fn hive(scope: Scope) -> RegKey {
        match scope {
            Scope::LocalMachine => RegKey::predef(HKEY_LOCAL_MACHINE),
            Scope::CurrentUser => RegKey::predef(HKEY_CURRENT_USER),
        }
    }

    fn classify(key: &EntryKey, err: io::Error) -> StoreError {
        if err.kind() == io::ErrorKind::PermissionDenied {
            StoreError::PermissionDenied { key: key.clone() }
        } else {
            StoreError::Io {
                key: key.clone(),
                source: err,
            }
        }
    }

    fn tag_of(reg_type: &RegType) -> u32 {
        match reg_type {
            RegType::REG_NONE => vtype::REG_NONE,
            RegType::REG_SZ => vtype::REG_SZ,
            RegType::REG_EXPAND_SZ => vtype::REG_EXPAND_SZ,
            RegType::REG_BINARY => vtype::REG_BINARY,
            RegType::REG_DWORD => vtype::REG_DWORD,
            RegType::REG_DWORD_BIG_ENDIAN => vtype::REG_DWORD_BIG_ENDIAN,
            RegType::REG_LINK => vtype::REG_LINK,
            RegType::REG_MULTI_SZ => vtype::REG_MULTI_SZ,
            RegType::REG_RESOURCE_LIST => vtype::REG_RESOURCE_LIST,
            RegType::REG_FULL_RESOURCE_DESCRIPTOR => vtype::REG_FULL_RESOURCE_DESCRIPTOR,
            RegType::REG_RESOURCE_REQUIREMENTS_LIST => vtype::REG_RESOURCE_REQUIREMENTS_LIST,
            RegType::REG_QWORD => vtype::REG_QWORD,
        }
    }

    fn reg_type_from_tag(tag: u32) -> Option<RegType> {
        Some(match tag {
            vtype::REG_NONE => RegType::REG_NONE,
            vtype::REG_SZ => RegType::REG_SZ,
            vtype::REG_EXPAND_SZ => RegType::REG_EXPAND_SZ,
            vtype::REG_BINARY => RegType::REG_BINARY,
            vtype::REG_DWORD => RegType::REG_DWORD,
            vtype::REG_DWORD_BIG_ENDIAN => RegType::REG_DWORD_BIG_ENDIAN,
            vtype::REG_LINK => RegType::REG_LINK,
            vtype::REG_MULTI_SZ => RegType::REG_MULTI_SZ,
            vtype::REG_RESOURCE_LIST => RegType::REG_RESOURCE_LIST,
            vtype::REG_FULL_RESOURCE_DESCRIPTOR => RegType::REG_FULL_RESOURCE_DESCRIPTOR,
            vtype::REG_RESOURCE_REQUIREMENTS_LIST => RegType::REG_RESOURCE_REQUIREMENTS_LIST,
            vtype::REG_QWORD => RegType::REG_QWORD,
            _ => return None,
        })
    }

    impl RegistryStore for WinRegistry {
        fn read(&self, key: &EntryKey) -> Result<Option<RegistryValue>, StoreError> {
            trace!("Reading '{}'.", key);
            let subkey = match hive(key.scope).open_subkey_with_flags(&key.path, KEY_READ) {
                Ok(subkey) => subkey,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
                Err(e) => return Err(classify(key, e)),
            };

            match subkey.get_raw_value(&key.name) {
                Ok(raw) => decode_raw_value(key, tag_of(&raw.vtype), &raw.bytes).map(Some),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(classify(key, e)),
            }
        }

        fn write(&self, key: &EntryKey, value: &RegistryValue) -> Result<(), StoreError> {
            let (tag, bytes) = encode_raw_value(value);
            let vtype = reg_type_from_tag(tag).ok_or_else(|| StoreError::UnexpectedType {
                key: key.clone(),
                vtype: tag,
                reason: "unknown registry type tag".to_string(),
            })?;

            // create_subkey creates all intermediate subkeys
            let (subkey, _) = hive(key.scope)
                .create_subkey(&key.path)
                .map_err(|e| classify(key, e))?;
            subkey
                .set_raw_value(&key.name, &RegValue { bytes, vtype })
                .map_err(|e| classify(key, e))?;
            trace!("Wrote {} to '{}'.", value, key);
            Ok(())
        }

        fn delete(&self, key: &EntryKey) -> Result<bool, StoreError> {
            let subkey = match hive(key.scope).open_subkey_with_flags(&key.path, KEY_WRITE) {
                Ok(subkey) => subkey,
                Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
                Err(e) => return Err(classify(key, e)),
            };

            match subkey.delete_value(&key.name) {
                Ok(()) => Ok(true),
                Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
                Err(e) => Err(classify(key, e)),
            }
        }
    }
}

/// Stand-in used where there is no Windows registry: every call fails.
#[cfg(not(windows))]
#[derive(Debug, Default, Clone, Copy)]
pub struct UnsupportedRegistry;

#[cfg(not(windows))]
impl UnsupportedRegistry {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(not(windows))]
impl crate::store::RegistryStore for UnsupportedRegistry {
    fn read(&self, _key: &EntryKey) -> Result<Option<RegistryValue>, StoreError> {
        Err(StoreError::Unsupported)
    }

    fn write(&self, _key: &EntryKey, _value: &RegistryValue) -> Result<(), StoreError> {
        Err(StoreError::Unsupported)
    }

    fn delete(&self, _key: &EntryKey) -> Result<bool, StoreError> {
        Err(StoreError::Unsupported)
    }
}
