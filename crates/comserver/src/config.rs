//! Server configuration

use std::path::{Path, PathBuf};
use crate::activation::RegCls;
use crate::registry::RegistryRoot;

/// When the hosting environment may unload the server module
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnloadPolicy {
    /// Always answer "not eligible"
    ///
    /// Unloading and reloading the module in one process can leave the
    /// runtime initialized twice, so the module stays resident.
    #[default]
    Never,
    /// Eligible once no explicit locks and no live objects remain
    WhenIdle,
}

/// Server configuration
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Unload policy reported by `dll_can_unload_now`
    pub unload_policy: UnloadPolicy,
    /// Activation mode for classes that do not declare one
    pub default_mode: RegCls,
    /// Configure logging from the persisted diagnostic sub-key on the
    /// first class object request
    pub configure_logging: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            unload_policy: UnloadPolicy::Never,
            default_mode: RegCls::MultipleUse,
            configure_logging: false,
        }
    }
}

impl ServerConfig {
    /// Create the default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the unload policy
    pub fn unload_policy(mut self, policy: UnloadPolicy) -> Self {
        self.unload_policy = policy;
        self
    }

    /// Set the default activation mode
    pub fn default_mode(mut self, mode: RegCls) -> Self {
        self.default_mode = mode;
        self
    }

    /// Enable logging configuration from the registry
    pub fn configure_logging(mut self, enable: bool) -> Self {
        self.configure_logging = enable;
        self
    }
}

/// Where registration facts are written
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RegistrationScope {
    /// Machine-wide, under the classes root
    #[default]
    Machine,
    /// Current user only, under `Software\Classes`
    PerUser,
}

impl RegistrationScope {
    /// Root and path of a classes-relative key in this scope
    pub fn locate(&self, path: &str) -> (RegistryRoot, String) {
        match self {
            RegistrationScope::Machine => (RegistryRoot::ClassesRoot, path.to_string()),
            RegistrationScope::PerUser => {
                (RegistryRoot::CurrentUser, format!(r"Software\Classes\{}", path))
            }
        }
    }
}

/// The image the server runs from, which decides what gets registered
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ProcessImage {
    /// A launcher runs the server entry point; in-process activation loads
    /// a shared host module that then resolves the implementation class
    Hosted {
        /// Launcher executable
        launcher: PathBuf,
        /// Extra launcher arguments placed before the entry point
        launcher_args: Vec<String>,
        /// Server entry point passed to the launcher
        entry: PathBuf,
        /// Shared module loaded for in-process activation
        host_module: PathBuf,
    },
    /// Standalone executable; cannot be embedded in another process
    Executable {
        /// Executable path
        path: PathBuf,
    },
    /// The server is itself the loadable hosting module
    Module {
        /// Module path
        path: PathBuf,
    },
}

fn quoted(path: &Path) -> String {
    let text = path.display().to_string();
    if text.contains(' ') {
        format!("\"{}\"", text)
    } else {
        text
    }
}

impl ProcessImage {
    /// The running executable
    pub fn current() -> std::io::Result<Self> {
        Ok(ProcessImage::Executable {
            path: std::env::current_exe()?,
        })
    }

    /// Command line that starts a local server, if this image can be one
    pub fn local_server_command(&self) -> Option<String> {
        match self {
            ProcessImage::Hosted { launcher, launcher_args, entry, .. } => {
                let mut parts = vec![quoted(launcher)];
                parts.extend(launcher_args.iter().cloned());
                parts.push(quoted(entry));
                Some(parts.join(" "))
            }
            ProcessImage::Executable { path } => Some(quoted(path)),
            ProcessImage::Module { .. } => None,
        }
    }

    /// Module loaded for in-process activation, if this image can be embedded
    pub fn inproc_server_path(&self) -> Option<String> {
        match self {
            ProcessImage::Hosted { host_module, .. } => Some(host_module.display().to_string()),
            ProcessImage::Executable { .. } => None,
            ProcessImage::Module { path } => Some(path.display().to_string()),
        }
    }

    /// Directory the host module loads the implementation from; only hosted
    /// images need it
    pub fn implementation_path(&self) -> Option<String> {
        match self {
            ProcessImage::Hosted { entry, .. } => Some(
                entry
                    .parent()
                    .map(|dir| dir.display().to_string())
                    .unwrap_or_default(),
            ),
            _ => None,
        }
    }
}
