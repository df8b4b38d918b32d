//! Writes and deletes registration facts in a registry store

use std::sync::Arc;
use tracing::debug;
use crate::config::{ProcessImage, RegistrationScope};
use crate::types::{Clsid, Result};
use super::descriptor::ClassDescriptor;
use super::entries::{class_key, registration_entries, registration_keys, RegistryEntry, LOGGING_KEY};
use super::store::{tolerate_missing, RegistryStore, RegistryValue};

/// Value holding the list of `logger=LEVEL` settings
pub const LEVELS_VALUE: &str = "levels";
/// Value holding the log line format
pub const FORMAT_VALUE: &str = "format";

/// Registers and unregisters classes in a registry store
///
/// Backs the register / unregister / configure-diagnostics /
/// clear-diagnostics operations of a registration tool.
pub struct Registrar {
    store: Arc<dyn RegistryStore>,
    image: ProcessImage,
    scope: RegistrationScope,
}

impl Registrar {
    /// Create a registrar writing machine-wide facts for `image`
    pub fn new(store: Arc<dyn RegistryStore>, image: ProcessImage) -> Self {
        Self {
            store,
            image,
            scope: RegistrationScope::Machine,
        }
    }

    /// Write facts in `scope` instead
    pub fn with_scope(mut self, scope: RegistrationScope) -> Self {
        self.scope = scope;
        self
    }

    /// Registration scope
    pub fn scope(&self) -> RegistrationScope {
        self.scope
    }

    /// Underlying store
    pub fn store(&self) -> &Arc<dyn RegistryStore> {
        &self.store
    }

    /// Facts that `register` would write for `descriptor`
    pub fn entries(&self, descriptor: &ClassDescriptor) -> Vec<RegistryEntry> {
        registration_entries(descriptor, &self.image, self.scope)
    }

    /// Advertise `descriptor`
    ///
    /// Stale entries from an earlier registration are removed first, so
    /// only the current facts remain afterwards.
    pub fn register(&self, descriptor: &ClassDescriptor) -> Result<()> {
        self.unregister(descriptor, true)?;

        debug!("Registering {:?}", descriptor);
        let mut entries = self.entries(descriptor);
        entries.sort();
        for entry in &entries {
            debug!("[{}\\{}] {}=\"{}\"", entry.root, entry.path,
                if entry.name.is_empty() { "@" } else { entry.name.as_str() }, entry.value);
            self.store.create_key(entry.root, &entry.path)?;
            self.store.set_value(
                entry.root,
                &entry.path,
                &entry.name,
                &RegistryValue::String(entry.value.clone()),
            )?;
        }
        debug!("Done");
        Ok(())
    }

    /// Revoke `descriptor`
    ///
    /// Without `force`, only the keys `register` writes are deleted and a
    /// key that gained other subkeys is an error. With `force`, each key is
    /// deleted with its whole subtree. Keys that are already absent are
    /// skipped either way.
    pub fn unregister(&self, descriptor: &ClassDescriptor, force: bool) -> Result<()> {
        debug!("Unregister {:?}", descriptor);
        for (root, path) in registration_keys(descriptor, &self.image, self.scope) {
            debug!("{} {}\\{}", if force { "DeleteTree" } else { "DeleteKey" }, root, path);
            tolerate_missing(self.store.delete_key(root, &path, force))?;
        }
        debug!("Done");
        Ok(())
    }

    /// Write the diagnostic sub-key of `clsid`
    ///
    /// `levels` are `logger=LEVEL` strings. A missing `format` removes any
    /// stored one.
    pub fn configure_diagnostics(&self, clsid: &Clsid, levels: &[String], format: Option<&str>) -> Result<()> {
        let (root, path) = self.scope.locate(&logging_key(clsid));
        debug!("CreateKey {}\\{}", root, path);
        self.store.create_key(root, &path)?;
        debug!("SetValue(levels, {:?})", levels);
        self.store.set_value(root, &path, LEVELS_VALUE, &RegistryValue::MultiString(levels.to_vec()))?;
        match format {
            Some(format) => {
                debug!("SetValue(format, {})", format);
                self.store.set_value(root, &path, FORMAT_VALUE, &RegistryValue::String(format.to_string()))?;
            }
            None => {
                debug!("DeleteValue(format)");
                tolerate_missing(self.store.delete_value(root, &path, FORMAT_VALUE))?;
            }
        }
        Ok(())
    }

    /// Delete the diagnostic sub-key of `clsid`
    pub fn clear_diagnostics(&self, clsid: &Clsid) -> Result<()> {
        let (root, path) = self.scope.locate(&logging_key(clsid));
        debug!("DeleteKey {}\\{}", root, path);
        tolerate_missing(self.store.delete_key(root, &path, false))?;
        Ok(())
    }
}

/// Classes-relative path of the diagnostic sub-key of `clsid`
pub fn logging_key(clsid: &Clsid) -> String {
    format!(r"{}\{}", class_key(clsid), LOGGING_KEY)
}
