//! Platform registry backend

use std::ffi::OsStr;
use std::os::windows::ffi::OsStrExt;
use windows::core::PCWSTR;
use windows::Win32::Foundation::{ERROR_ACCESS_DENIED, ERROR_FILE_NOT_FOUND, ERROR_SUCCESS, WIN32_ERROR};
use windows::Win32::System::Registry::{
    RegCloseKey, RegCreateKeyExW, RegDeleteKeyValueW, RegDeleteKeyW, RegDeleteTreeW, RegGetValueW,
    RegSetKeyValueW, HKEY, HKEY_CLASSES_ROOT, HKEY_CURRENT_USER, HKEY_LOCAL_MACHINE, KEY_WRITE,
    REG_MULTI_SZ, REG_OPTION_NON_VOLATILE, REG_SZ, REG_VALUE_TYPE, RRF_RT_REG_MULTI_SZ,
    RRF_RT_REG_SZ,
};
use super::store::{RegistryRoot, RegistryStore, RegistryValue, StoreError};

/// The Windows registry
#[derive(Debug, Default, Clone, Copy)]
pub struct WindowsRegistry;

impl WindowsRegistry {
    /// Create a handle to the platform registry
    pub fn new() -> Self {
        Self
    }
}

fn wide(text: &str) -> Vec<u16> {
    OsStr::new(text).encode_wide().chain(std::iter::once(0)).collect()
}

fn hive(root: RegistryRoot) -> HKEY {
    match root {
        RegistryRoot::ClassesRoot => HKEY_CLASSES_ROOT,
        RegistryRoot::CurrentUser => HKEY_CURRENT_USER,
        RegistryRoot::LocalMachine => HKEY_LOCAL_MACHINE,
    }
}

fn check(status: WIN32_ERROR, root: RegistryRoot, path: &str) -> Result<(), StoreError> {
    let context = format!("{}\\{}", root, path);
    match status {
        ERROR_SUCCESS => Ok(()),
        ERROR_FILE_NOT_FOUND => Err(StoreError::NotFound(context)),
        ERROR_ACCESS_DENIED => Err(StoreError::AccessDenied(context)),
        other => Err(StoreError::Os { code: other.0, context }),
    }
}

/// Encode a value as the UTF-16 byte payload Reg*Value expects
fn encode(value: &RegistryValue) -> (REG_VALUE_TYPE, Vec<u16>) {
    match value {
        RegistryValue::String(s) => (REG_SZ, wide(s)),
        RegistryValue::MultiString(items) => {
            let mut data: Vec<u16> = Vec::new();
            for item in items {
                data.extend(OsStr::new(item).encode_wide());
                data.push(0);
            }
            data.push(0);
            (REG_MULTI_SZ, data)
        }
    }
}

fn decode(kind: REG_VALUE_TYPE, data: &[u16]) -> RegistryValue {
    let trimmed = match data.iter().rposition(|&c| c != 0) {
        Some(last) => &data[..=last],
        None => &[],
    };
    if kind == REG_MULTI_SZ {
        RegistryValue::MultiString(
            trimmed
                .split(|&c| c == 0)
                .map(String::from_utf16_lossy)
                .collect(),
        )
    } else {
        RegistryValue::String(String::from_utf16_lossy(trimmed))
    }
}

impl RegistryStore for WindowsRegistry {
    fn create_key(&self, root: RegistryRoot, path: &str) -> Result<(), StoreError> {
        let subkey = wide(path);
        let mut key = HKEY::default();
        let status = unsafe {
            RegCreateKeyExW(
                hive(root),
                PCWSTR(subkey.as_ptr()),
                0,
                PCWSTR::null(),
                REG_OPTION_NON_VOLATILE,
                KEY_WRITE,
                None,
                &mut key,
                None,
            )
        };
        check(status, root, path)?;
        unsafe {
            let _ = RegCloseKey(key);
        }
        Ok(())
    }

    fn set_value(
        &self,
        root: RegistryRoot,
        path: &str,
        name: &str,
        value: &RegistryValue,
    ) -> Result<(), StoreError> {
        let subkey = wide(path);
        let value_name = wide(name);
        let (kind, data) = encode(value);
        let status = unsafe {
            RegSetKeyValueW(
                hive(root),
                PCWSTR(subkey.as_ptr()),
                PCWSTR(value_name.as_ptr()),
                kind.0,
                Some(data.as_ptr().cast()),
                (data.len() * 2) as u32,
            )
        };
        check(status, root, path)
    }

    fn get_value(&self, root: RegistryRoot, path: &str, name: &str) -> Result<RegistryValue, StoreError> {
        let subkey = wide(path);
        let value_name = wide(name);
        let flags = RRF_RT_REG_SZ | RRF_RT_REG_MULTI_SZ;
        let mut kind = REG_VALUE_TYPE::default();
        let mut size = 0u32;
        let status = unsafe {
            RegGetValueW(
                hive(root),
                PCWSTR(subkey.as_ptr()),
                PCWSTR(value_name.as_ptr()),
                flags,
                Some(&mut kind),
                None,
                Some(&mut size),
            )
        };
        check(status, root, path)?;

        let mut data = vec![0u16; (size as usize + 1) / 2];
        let status = unsafe {
            RegGetValueW(
                hive(root),
                PCWSTR(subkey.as_ptr()),
                PCWSTR(value_name.as_ptr()),
                flags,
                Some(&mut kind),
                Some(data.as_mut_ptr().cast()),
                Some(&mut size),
            )
        };
        check(status, root, path)?;
        data.truncate(size as usize / 2);
        Ok(decode(kind, &data))
    }

    fn delete_value(&self, root: RegistryRoot, path: &str, name: &str) -> Result<(), StoreError> {
        let subkey = wide(path);
        let value_name = wide(name);
        let status = unsafe {
            RegDeleteKeyValueW(hive(root), PCWSTR(subkey.as_ptr()), PCWSTR(value_name.as_ptr()))
        };
        check(status, root, path)
    }

    fn delete_key(&self, root: RegistryRoot, path: &str, recursive: bool) -> Result<(), StoreError> {
        let subkey = wide(path);
        let status = unsafe {
            if recursive {
                let status = RegDeleteTreeW(hive(root), PCWSTR(subkey.as_ptr()));
                if status != ERROR_SUCCESS {
                    status
                } else {
                    // some versions leave the emptied key itself behind
                    match RegDeleteKeyW(hive(root), PCWSTR(subkey.as_ptr())) {
                        ERROR_FILE_NOT_FOUND => ERROR_SUCCESS,
                        other => other,
                    }
                }
            } else {
                RegDeleteKeyW(hive(root), PCWSTR(subkey.as_ptr()))
            }
        };
        check(status, root, path)
    }
}
