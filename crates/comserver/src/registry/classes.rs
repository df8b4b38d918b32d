//! Class table: class id → constructible descriptor

use std::collections::HashMap;
use std::sync::Arc;
use parking_lot::RwLock;
use tracing::debug;
use crate::config::RegistrationScope;
use crate::types::{Clsid, Result};
use super::descriptor::ClassDescriptor;
use super::entries::{class_key, IMPLEMENTATION_CLASS};
use super::store::RegistryStore;

/// Classes this server can construct, keyed by class id
///
/// Registration and unregistration are idempotent: registering a class id
/// again replaces the previous descriptor.
#[derive(Default)]
pub struct ClassRegistry {
    classes: RwLock<HashMap<Clsid, Arc<ClassDescriptor>>>,
}

impl ClassRegistry {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a class
    pub fn register(&self, descriptor: impl Into<Arc<ClassDescriptor>>) -> Arc<ClassDescriptor> {
        let descriptor = descriptor.into();
        let previous = self.classes.write().insert(descriptor.clsid(), descriptor.clone());
        if previous.is_some() {
            debug!("replaced class {}", descriptor.clsid());
        }
        descriptor
    }

    /// Remove a class; returns the removed descriptor, if any
    pub fn unregister(&self, clsid: &Clsid) -> Option<Arc<ClassDescriptor>> {
        self.classes.write().remove(clsid)
    }

    /// Look up a class by id
    pub fn lookup(&self, clsid: &Clsid) -> Option<Arc<ClassDescriptor>> {
        self.classes.read().get(clsid).cloned()
    }

    /// Look up a class by implementation name
    pub fn lookup_by_name(&self, name: &str) -> Option<Arc<ClassDescriptor>> {
        self.classes.read().values().find(|d| d.name() == name).cloned()
    }

    /// Resolve a class through its persisted `ImplementationClass` value
    ///
    /// Used when the in-process host is asked for a class id that was
    /// registered under a different id than the one compiled in. A missing
    /// value is `Ok(None)`; every other store failure is returned.
    pub fn find_persisted(
        &self,
        clsid: &Clsid,
        store: &dyn RegistryStore,
        scope: RegistrationScope,
    ) -> Result<Option<Arc<ClassDescriptor>>> {
        let (root, path) = scope.locate(&format!(r"{}\InprocServer32", class_key(clsid)));
        let value = match store.get_value(root, &path, IMPLEMENTATION_CLASS) {
            Ok(value) => value,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let Some(name) = value.as_str() else {
            return Ok(None);
        };
        debug!("{} resolves to implementation {}", clsid, name);
        Ok(self.lookup_by_name(name))
    }

    /// Snapshot of every registered descriptor
    pub fn descriptors(&self) -> Vec<Arc<ClassDescriptor>> {
        self.classes.read().values().cloned().collect()
    }

    /// Number of registered classes
    pub fn len(&self) -> usize {
        self.classes.read().len()
    }

    /// True when no class is registered
    pub fn is_empty(&self) -> bool {
        self.classes.read().is_empty()
    }
}
