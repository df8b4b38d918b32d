//! Activation registry
//!
//! - Class table: class id → constructible descriptor
//! - Registration facts: the key/value entries that advertise a class
//! - Registrar: writes and deletes those facts in a registry store
//! - Stores: in-memory, and the platform registry on Windows

mod classes;
mod descriptor;
mod entries;
mod registrar;
mod store;
#[cfg(windows)]
mod win32;

pub use classes::ClassRegistry;
pub use descriptor::*;
pub use entries::{
    class_description, class_key, registration_entries, registration_keys, RegistryEntry,
    IMPLEMENTATION_CLASS, IMPLEMENTATION_PATH, LOGGING_KEY, THREADING_MODEL,
};
pub use registrar::{logging_key, Registrar, FORMAT_VALUE, LEVELS_VALUE};
pub use store::*;
#[cfg(windows)]
pub use win32::WindowsRegistry;

/// The platform's default store: the Windows registry, or an empty
/// in-memory registry elsewhere
pub fn default_store() -> std::sync::Arc<dyn RegistryStore> {
    #[cfg(windows)]
    {
        std::sync::Arc::new(WindowsRegistry::new())
    }
    #[cfg(not(windows))]
    {
        std::sync::Arc::new(MemoryRegistry::new())
    }
}
