//! Registration facts
//!
//! The key/value entries that advertise a class in the persistent store.
//! Computing them is pure; writing and deleting them is the registrar's job.

use std::collections::BTreeSet;
use crate::config::{ProcessImage, RegistrationScope};
use super::descriptor::{ClassContext, ClassDescriptor};
use super::store::RegistryRoot;

/// Value naming the implementation class for a hosted in-process server
pub const IMPLEMENTATION_CLASS: &str = "ImplementationClass";
/// Value naming the directory the implementation is loaded from
pub const IMPLEMENTATION_PATH: &str = "ImplementationPath";
/// Threading model value under the in-process key
pub const THREADING_MODEL: &str = "ThreadingModel";
/// Diagnostic sub-key under the class key
pub const LOGGING_KEY: &str = "Logging";

/// One (scope, path, name, value) fact; an empty name is the default value
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RegistryEntry {
    /// Root hive
    pub root: RegistryRoot,
    /// Key path below the root
    pub path: String,
    /// Value name
    pub name: String,
    /// String value
    pub value: String,
}

/// Path of the class key, relative to the classes root
pub fn class_key(clsid: &crate::types::Clsid) -> String {
    format!(r"CLSID\{}", clsid)
}

struct EntryWriter {
    scope: RegistrationScope,
    entries: Vec<RegistryEntry>,
}

impl EntryWriter {
    fn push(&mut self, path: &str, name: &str, value: &str) {
        let (root, path) = self.scope.locate(path);
        self.entries.push(RegistryEntry {
            root,
            path,
            name: name.to_string(),
            value: value.to_string(),
        });
    }
}

/// Description written as the class key's default value
///
/// Falls back to the version-independent prog-id, then the prog-id, with
/// dots turned into spaces.
pub fn class_description(descriptor: &ClassDescriptor) -> String {
    if let Some(desc) = descriptor.description().filter(|d| !d.is_empty()) {
        return desc.to_string();
    }
    descriptor
        .version_independent_progid()
        .or(descriptor.progid())
        .map(|p| p.replace('.', " "))
        .unwrap_or_default()
}

/// Every fact that advertises `descriptor` when running from `image`
///
/// Produced in order: class entry, prog-id aliases, local-server entry,
/// in-process entries with threading model, type library entries.
pub fn registration_entries(
    descriptor: &ClassDescriptor,
    image: &ProcessImage,
    scope: RegistrationScope,
) -> Vec<RegistryEntry> {
    let mut w = EntryWriter { scope, entries: Vec::new() };
    let clsid = descriptor.clsid().to_string();
    let key = class_key(&descriptor.clsid());
    let description = class_description(descriptor);

    w.push(&key, "", &description);

    if let Some(progid) = descriptor.progid() {
        // clsid -> progid
        w.push(&format!(r"{}\ProgID", key), "", progid);
        // progid -> clsid
        if !description.is_empty() {
            w.push(progid, "", &description);
        }
        w.push(&format!(r"{}\CLSID", progid), "", &clsid);

        if let Some(novers) = descriptor.version_independent_progid() {
            w.push(&format!(r"{}\VersionIndependentProgID", key), "", novers);
            if !description.is_empty() {
                w.push(novers, "", &description);
            }
            w.push(&format!(r"{}\CurVer", novers), "", progid);
            w.push(&format!(r"{}\CLSID", novers), "", &clsid);
        }
    }

    let contexts = descriptor.contexts();
    if contexts.contains(ClassContext::LOCAL_SERVER) {
        if let Some(command) = image.local_server_command() {
            w.push(&format!(r"{}\LocalServer32", key), "", &command);
        }
    }

    if contexts.contains(ClassContext::INPROC_SERVER) {
        if let Some(module) = image.inproc_server_path() {
            let inproc = format!(r"{}\InprocServer32", key);
            w.push(&inproc, "", &module);
            if let Some(dir) = image.implementation_path() {
                w.push(&inproc, IMPLEMENTATION_CLASS, descriptor.name());
                w.push(&inproc, IMPLEMENTATION_PATH, &dir);
            }
            if let Some(model) = descriptor.threading() {
                w.push(&inproc, THREADING_MODEL, model.as_str());
            }
        }
    }

    if let Some(tlib) = descriptor.typelib() {
        w.push(&format!(r"{}\TypeLib", key), "", &tlib.libid.to_string());
        w.push(&format!(r"{}\Version", key), "", &format!("{}.{}", tlib.major, tlib.minor));
    }

    w.entries
}

/// The keys to delete when revoking `descriptor`: unique (root, path) pairs,
/// deepest first so every key is empty by the time it is deleted
pub fn registration_keys(
    descriptor: &ClassDescriptor,
    image: &ProcessImage,
    scope: RegistrationScope,
) -> Vec<(RegistryRoot, String)> {
    let keys: BTreeSet<(RegistryRoot, String)> = registration_entries(descriptor, image, scope)
        .into_iter()
        .map(|e| (e.root, e.path))
        .collect();
    keys.into_iter().rev().collect()
}
