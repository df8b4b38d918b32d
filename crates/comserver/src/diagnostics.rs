//! Logging configuration persisted per class
//!
//! A class may carry a `Logging` sub-key holding `levels`, a list of
//! `target=LEVEL` strings, and an optional `format`. The in-process server
//! reads it once, on its first class object request, and installs a
//! `tracing` subscriber accordingly.

use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, error, warn, Level};
use tracing_subscriber::EnvFilter;
use crate::config::RegistrationScope;
use crate::errorinfo::Failure;
use crate::registry::{logging_key, RegistryStore, RegistryValue, FORMAT_VALUE, LEVELS_VALUE};
use crate::types::{Clsid, ComError, Result};

static CONFIGURED: AtomicBool = AtomicBool::new(false);

/// Output layout of log lines
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Default fmt layout, with thread ids
    #[default]
    Full,
    /// Compact single-line layout
    Compact,
}

impl LogFormat {
    /// Parse a persisted format name; unknown names fall back to `Full`
    pub fn parse(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "compact" => LogFormat::Compact,
            "full" | "" => LogFormat::Full,
            other => {
                warn!("unknown log format {:?}, using full", other);
                LogFormat::Full
            }
        }
    }
}

/// Parse a level name
///
/// Accepts the usual names plus `WARNING`, and `CRITICAL`/`FATAL` as
/// aliases for `ERROR`.
pub fn parse_level(name: &str) -> Option<Level> {
    match name.trim().to_ascii_uppercase().as_str() {
        "TRACE" => Some(Level::TRACE),
        "DEBUG" => Some(Level::DEBUG),
        "INFO" => Some(Level::INFO),
        "WARN" | "WARNING" => Some(Level::WARN),
        "ERROR" | "CRITICAL" | "FATAL" => Some(Level::ERROR),
        _ => None,
    }
}

/// Per-target log levels and output format
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoggingConfig {
    /// (target, level) pairs
    pub levels: Vec<(String, Level)>,
    /// Output layout
    pub format: LogFormat,
}

impl LoggingConfig {
    /// Build from `target=LEVEL` strings and an optional format name
    pub fn parse<S: AsRef<str>>(levels: &[S], format: Option<&str>) -> Result<Self> {
        let levels = levels
            .iter()
            .map(|entry| {
                let entry = entry.as_ref();
                let (target, level) = entry
                    .split_once('=')
                    .ok_or_else(|| ComError::InvalidArgument(format!("expected target=LEVEL, got {:?}", entry)))?;
                let level = parse_level(level)
                    .ok_or_else(|| ComError::InvalidArgument(format!("unknown log level {:?}", level)))?;
                Ok((target.trim().to_string(), level))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self {
            levels,
            format: format.map(LogFormat::parse).unwrap_or_default(),
        })
    }

    /// Read the diagnostic sub-key of `clsid`; `None` when there is none
    pub fn load(store: &dyn RegistryStore, scope: RegistrationScope, clsid: &Clsid) -> Result<Option<Self>> {
        let (root, path) = scope.locate(&logging_key(clsid));
        let levels = match store.get_value(root, &path, LEVELS_VALUE) {
            Ok(RegistryValue::String(single)) => vec![single],
            Ok(RegistryValue::MultiString(list)) => list,
            Err(e) if e.is_not_found() => {
                if store.get_value(root, &path, FORMAT_VALUE).is_err() {
                    return Ok(None);
                }
                Vec::new()
            }
            Err(e) => return Err(e.into()),
        };
        let format = match store.get_value(root, &path, FORMAT_VALUE) {
            Ok(value) => value.as_str().map(str::to_string),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        };
        Self::parse(levels.as_slice(), format.as_deref()).map(Some)
    }

    /// Filter directives in `EnvFilter` syntax
    ///
    /// An empty target sets the default level.
    pub fn directives(&self) -> String {
        self.levels
            .iter()
            .map(|(target, level)| {
                let level = level.as_str().to_ascii_lowercase();
                if target.is_empty() || target == "root" {
                    level
                } else {
                    format!("{}={}", target, level)
                }
            })
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Build the filter for these levels
    pub fn env_filter(&self) -> Result<EnvFilter> {
        let directives = self.directives();
        let directives = if directives.is_empty() { "info".to_string() } else { directives };
        EnvFilter::try_new(&directives)
            .map_err(|e| ComError::InvalidArgument(format!("invalid log directives {:?}: {}", directives, e)))
    }
}

/// Install a global `tracing` subscriber for `config`
///
/// Returns false when a global subscriber was already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<bool> {
    let filter = config.env_filter()?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(true);
    let installed = match config.format {
        LogFormat::Full => builder.try_init().is_ok(),
        LogFormat::Compact => builder.compact().try_init().is_ok(),
    };
    Ok(installed)
}

/// Configure logging from the diagnostic sub-key of `clsid`
///
/// Returns whether a subscriber was installed. Missing or malformed
/// settings, store failures and panics in the store all leave logging
/// unconfigured.
pub fn configure(store: &dyn RegistryStore, scope: RegistrationScope, clsid: &Clsid) -> bool {
    let loaded = panic::catch_unwind(AssertUnwindSafe(|| LoggingConfig::load(store, scope, clsid)));
    match loaded {
        Ok(Ok(Some(config))) => match init_logging(&config) {
            Ok(installed) => {
                debug!("logging configured from {} (installed={})", clsid, installed);
                installed
            }
            Err(e) => {
                warn!("ignoring logging settings of {}: {}", clsid, e);
                false
            }
        },
        Ok(Ok(None)) => false,
        Ok(Err(e)) => {
            warn!("cannot read logging settings of {}: {}", clsid, e);
            false
        }
        Err(payload) => {
            error!("reading logging settings of {} failed: {}", clsid, Failure::from_panic(payload.as_ref()));
            false
        }
    }
}

/// [`configure`], once per process; later calls do nothing
pub fn configure_once(store: &dyn RegistryStore, scope: RegistrationScope, clsid: &Clsid) {
    if CONFIGURED.swap(true, Ordering::SeqCst) {
        return;
    }
    configure(store, scope, clsid);
}
