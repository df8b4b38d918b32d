//! Hierarchical key/value store holding registration facts
//!
//! The store itself is an external collaborator (the platform registry on
//! Windows). [`MemoryRegistry`] is the portable backend used off Windows and
//! in tests.

use std::collections::BTreeMap;
use std::fmt;
use parking_lot::RwLock;
use thiserror::Error;
use crate::types::HResult;

/// Win32 ERROR_FILE_NOT_FOUND
const ERROR_FILE_NOT_FOUND: u32 = 2;

/// Top-level hive a registration path lives under
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum RegistryRoot {
    /// HKEY_CLASSES_ROOT
    ClassesRoot,
    /// HKEY_CURRENT_USER
    CurrentUser,
    /// HKEY_LOCAL_MACHINE
    LocalMachine,
}

impl fmt::Display for RegistryRoot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RegistryRoot::ClassesRoot => "HKCR",
            RegistryRoot::CurrentUser => "HKCU",
            RegistryRoot::LocalMachine => "HKLM",
        };
        f.write_str(name)
    }
}

/// Value stored under a key
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RegistryValue {
    /// REG_SZ
    String(String),
    /// REG_MULTI_SZ
    MultiString(Vec<String>),
}

impl RegistryValue {
    /// The value as a single string, if it is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            RegistryValue::String(s) => Some(s),
            RegistryValue::MultiString(_) => None,
        }
    }
}

/// Store errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Key or value does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Caller may not modify the key
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// Non-recursive delete of a key that still has subkeys
    #[error("key has subkeys: {0}")]
    HasSubkeys(String),

    /// Any other platform error
    #[error("error {code} on {context}")]
    Os { code: u32, context: String },
}

impl StoreError {
    /// True when the failure only means the entry is already absent
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    /// Status code for this error
    pub fn hresult(&self) -> HResult {
        match self {
            StoreError::NotFound(_) => HResult::from_win32(ERROR_FILE_NOT_FOUND),
            StoreError::AccessDenied(_) | StoreError::HasSubkeys(_) => HResult::E_ACCESSDENIED,
            StoreError::Os { code, .. } => HResult::from_win32(*code),
        }
    }
}

/// Hierarchical registry operations needed to advertise and revoke classes
///
/// Paths are backslash-separated and case-insensitive. The empty value name
/// addresses the key's default value.
pub trait RegistryStore: Send + Sync {
    /// Create `path` and any missing ancestors; existing keys are kept
    fn create_key(&self, root: RegistryRoot, path: &str) -> Result<(), StoreError>;

    /// Set a value on an existing key
    fn set_value(
        &self,
        root: RegistryRoot,
        path: &str,
        name: &str,
        value: &RegistryValue,
    ) -> Result<(), StoreError>;

    /// Read a value
    fn get_value(&self, root: RegistryRoot, path: &str, name: &str) -> Result<RegistryValue, StoreError>;

    /// Delete a value
    fn delete_value(&self, root: RegistryRoot, path: &str, name: &str) -> Result<(), StoreError>;

    /// Delete a key; with `recursive` its whole subtree goes too
    fn delete_key(&self, root: RegistryRoot, path: &str, recursive: bool) -> Result<(), StoreError>;
}

/// Ignore "already absent" failures, pass everything else through
pub fn tolerate_missing(result: Result<(), StoreError>) -> Result<(), StoreError> {
    match result {
        Err(e) if e.is_not_found() => Ok(()),
        other => other,
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
struct KeyNode {
    /// Path as first created
    display: String,
    /// Values by lower-cased name: (name as written, value)
    values: BTreeMap<String, (String, RegistryValue)>,
}

fn normalize(path: &str) -> String {
    path.trim_matches('\\').to_ascii_lowercase()
}

/// In-memory registry
#[derive(Default)]
pub struct MemoryRegistry {
    keys: RwLock<BTreeMap<(RegistryRoot, String), KeyNode>>,
}

impl MemoryRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Check whether a key exists
    pub fn contains_key(&self, root: RegistryRoot, path: &str) -> bool {
        self.keys.read().contains_key(&(root, normalize(path)))
    }

    /// Every key with its values, for comparing store states
    pub fn snapshot(&self) -> BTreeMap<(RegistryRoot, String), BTreeMap<String, RegistryValue>> {
        let keys = self.keys.read();
        keys.iter()
            .map(|((root, _), node)| {
                let values = node
                    .values
                    .values()
                    .map(|(name, value)| (name.clone(), value.clone()))
                    .collect();
                ((*root, node.display.clone()), values)
            })
            .collect()
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.keys.read().len()
    }

    /// True when no key exists
    pub fn is_empty(&self) -> bool {
        self.keys.read().is_empty()
    }
}

impl RegistryStore for MemoryRegistry {
    fn create_key(&self, root: RegistryRoot, path: &str) -> Result<(), StoreError> {
        let trimmed = path.trim_matches('\\');
        if trimmed.is_empty() {
            return Err(StoreError::AccessDenied(format!("{}\\", root)));
        }
        let mut keys = self.keys.write();
        let mut end = 0;
        for (i, part) in trimmed.split('\\').enumerate() {
            end += part.len() + usize::from(i > 0);
            let display = &trimmed[..end];
            keys.entry((root, display.to_ascii_lowercase()))
                .or_insert_with(|| KeyNode {
                    display: display.to_string(),
                    values: BTreeMap::new(),
                });
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
        let mut keys = self.keys.write();
        let node = keys
            .get_mut(&(root, normalize(path)))
            .ok_or_else(|| StoreError::NotFound(format!("{}\\{}", root, path)))?;
        node.values
            .insert(name.to_ascii_lowercase(), (name.to_string(), value.clone()));
        Ok(())
    }

    fn get_value(&self, root: RegistryRoot, path: &str, name: &str) -> Result<RegistryValue, StoreError> {
        let keys = self.keys.read();
        keys.get(&(root, normalize(path)))
            .and_then(|node| node.values.get(&name.to_ascii_lowercase()))
            .map(|(_, value)| value.clone())
            .ok_or_else(|| StoreError::NotFound(format!("{}\\{} [{}]", root, path, name)))
    }

    fn delete_value(&self, root: RegistryRoot, path: &str, name: &str) -> Result<(), StoreError> {
        let mut keys = self.keys.write();
        keys.get_mut(&(root, normalize(path)))
            .and_then(|node| node.values.remove(&name.to_ascii_lowercase()))
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("{}\\{} [{}]", root, path, name)))
    }

    fn delete_key(&self, root: RegistryRoot, path: &str, recursive: bool) -> Result<(), StoreError> {
        let key = normalize(path);
        let prefix = format!("{}\\", key);
        let mut keys = self.keys.write();
        if !keys.contains_key(&(root, key.clone())) {
            return Err(StoreError::NotFound(format!("{}\\{}", root, path)));
        }
        let children: Vec<(RegistryRoot, String)> = keys
            .range((root, prefix.clone())..)
            .take_while(|((r, p), _)| *r == root && p.starts_with(&prefix))
            .map(|(k, _)| k.clone())
            .collect();
        if !children.is_empty() && !recursive {
            return Err(StoreError::HasSubkeys(format!("{}\\{}", root, path)));
        }
        for child in children {
            keys.remove(&child);
        }
        keys.remove(&(root, key));
        Ok(())
    }
}
