//! Globally unique identifiers
//!
//! Class identifiers (CLSID), interface identifiers (IID) and type library
//! identifiers (LIBID) all share the same 128-bit representation.

use std::fmt;
use std::str::FromStr;
use crate::types::{ComError, Result};

/// 128-bit globally unique identifier
///
/// Formats in registry form: upper-case hex groups inside braces,
/// e.g. `{00000001-0000-0000-C000-000000000046}`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Guid(uuid::Uuid);

/// Class identifier
pub type Clsid = Guid;

/// Interface identifier
pub type Iid = Guid;

impl Guid {
    /// Size of a GUID in bytes
    pub const SIZE: usize = 16;

    /// The all-zero GUID
    pub const NIL: Guid = Guid(uuid::Uuid::nil());

    /// Create from a 128-bit integer, most significant group first
    pub const fn from_u128(value: u128) -> Self {
        Self(uuid::Uuid::from_u128(value))
    }

    /// Generate a new random GUID
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4())
    }

    /// Parse from text, with or without surrounding braces
    pub fn parse(text: &str) -> Result<Self> {
        let trimmed = text.trim();
        let inner = trimmed
            .strip_prefix('{')
            .and_then(|s| s.strip_suffix('}'))
            .unwrap_or(trimmed);
        uuid::Uuid::parse_str(inner)
            .map(Self)
            .map_err(|e| ComError::InvalidArgument(format!("invalid GUID {:?}: {}", text, e)))
    }

    /// Check if this is the nil GUID
    pub fn is_nil(&self) -> bool {
        self.0.is_nil()
    }

    /// Get the underlying UUID
    pub fn as_uuid(&self) -> &uuid::Uuid {
        &self.0
    }
}

impl From<uuid::Uuid> for Guid {
    fn from(value: uuid::Uuid) -> Self {
        Self(value)
    }
}

impl FromStr for Guid {
    type Err = ComError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Debug for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GUID({})", self)
    }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut buf = uuid::Uuid::encode_buffer();
        write!(f, "{{{}}}", self.0.hyphenated().encode_upper(&mut buf))
    }
}
