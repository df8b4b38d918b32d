//! Component object server runtime
//!
//! This crate turns plain Rust types into activatable component objects:
//! class factories, server lifetime accounting, the activation entry points
//! a hosting environment calls, persisted class registration, bulk
//! enumerators and the per-thread error channel.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                  Hosting environment                        │
//! │   DllGetClassObject │ DllCanUnloadNow │ class object table   │
//! ├─────────────────────────────────────────────────────────────┤
//! │  ComServer (server)                                         │
//! │  - activation entry points      - local-server run loop     │
//! ├──────────────────────────────┬──────────────────────────────┤
//! │  Activation                  │  Registry                    │
//! │  - ServerLifetime (atomics)  │  - ClassRegistry (lookup)    │
//! │  - ClassFactory              │  - registration facts        │
//! │  - ActivationEnvironment     │  - Registrar + stores        │
//! ├──────────────────────────────┴──────────────────────────────┤
//! │  Objects: ComObject / ComRef │ EnumCursor │ ErrorChannel    │
//! │  boundary guard: failures → status code + error record      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Key Concepts
//!
//! - **Class factory**: constructs instances of one class and takes part in
//!   server lifetime accounting (`LockServer`)
//! - **Server lifetime**: explicit locks plus live objects; the module may
//!   only be unloaded when both are zero, and by default never is
//! - **Registration facts**: the key/value entries advertising a class in
//!   the persistent store, computed without touching the store
//! - **Error record**: diagnostics travelling next to a status code, one
//!   pending record per thread
//!
//! # Modules
//!
//! - [`types`]: identifiers, status codes and errors
//! - [`object`]: component objects and interface handles
//! - [`activation`]: lifetime counters, class factories, activation environment
//! - [`registry`]: class table, registration facts and stores
//! - [`enumerator`]: bulk enumeration cursors
//! - [`errorinfo`]: per-thread error records
//! - [`boundary`]: catch-all wrapper for boundary-facing methods
//! - [`diagnostics`]: logging configured from the registry
//! - [`server`]: the entry points tying it together

pub mod types;
pub mod object;
pub mod activation;
pub mod registry;
pub mod enumerator;
pub mod errorinfo;
pub mod boundary;
pub mod diagnostics;
pub mod config;
pub mod server;

pub use types::{ComError, HResult, Result, Guid, Clsid, Iid, iid};
pub use object::{ComObject, ComRef};
pub use activation::{ClassFactory, ServerLifetime, RegCls, ActivationEnvironment, ClassObjectTable};
pub use registry::{ClassDescriptor, ClassContext, ClassRegistry, ThreadingModel, Registrar};
pub use enumerator::{EnumCursor, EnumObject};
pub use errorinfo::{ErrorRecord, Failure, get_error, set_error, report_error, report_failure, report_failure_with};
pub use config::{ServerConfig, UnloadPolicy, ProcessImage, RegistrationScope};
pub use server::{ComServer, ComServerBuilder, ClassFactoryState};
