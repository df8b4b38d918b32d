//! Status codes and error types

use std::fmt;
use thiserror::Error;
use crate::registry::StoreError;
use super::guid::{Clsid, Iid};

/// Result type for server runtime operations
pub type Result<T> = std::result::Result<T, ComError>;

/// Signed 32-bit status code carried across the component boundary
///
/// Negative values are failures, everything else is success
/// (`S_FALSE` is the partial-success code used by enumerators).
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HResult(pub i32);

impl HResult {
    /// Operation successful
    pub const S_OK: HResult = HResult(0x0000_0000);
    /// Operation successful, returning false / partial
    pub const S_FALSE: HResult = HResult(0x0000_0001);
    /// Catastrophic failure
    pub const E_UNEXPECTED: HResult = HResult(0x8000_FFFFu32 as i32);
    /// Not implemented
    pub const E_NOTIMPL: HResult = HResult(0x8000_4001u32 as i32);
    /// No such interface supported
    pub const E_NOINTERFACE: HResult = HResult(0x8000_4002u32 as i32);
    /// Invalid pointer
    pub const E_POINTER: HResult = HResult(0x8000_4003u32 as i32);
    /// Unspecified error
    pub const E_FAIL: HResult = HResult(0x8000_4005u32 as i32);
    /// Access denied
    pub const E_ACCESSDENIED: HResult = HResult(0x8007_0005u32 as i32);
    /// Invalid argument
    pub const E_INVALIDARG: HResult = HResult(0x8007_0057u32 as i32);
    /// Class does not support aggregation
    pub const CLASS_E_NOAGGREGATION: HResult = HResult(0x8004_0110u32 as i32);
    /// Class factory cannot supply the requested class
    pub const CLASS_E_CLASSNOTAVAILABLE: HResult = HResult(0x8004_0111u32 as i32);
    /// Class not registered
    pub const REGDB_E_CLASSNOTREG: HResult = HResult(0x8004_0154u32 as i32);
    /// Object is not registered
    pub const CO_E_OBJNOTREG: HResult = HResult(0x8004_01FCu32 as i32);
    /// Exception occurred
    pub const DISP_E_EXCEPTION: HResult = HResult(0x8002_0009u32 as i32);

    /// Convert a Win32 error code into a status code
    pub fn from_win32(code: u32) -> HResult {
        if code & 0x8000_0000 != 0 {
            return HResult(code as i32);
        }
        HResult(((code & 0xFFFF) | 0x8007_0000) as i32)
    }

    /// True for S_OK, S_FALSE and every other non-negative code
    pub fn is_success(self) -> bool {
        self.0 >= 0
    }

    /// True for negative codes
    pub fn is_failure(self) -> bool {
        self.0 < 0
    }

    /// Convert a failure code into an error, success codes into `Ok`
    pub fn ok(self) -> Result<HResult> {
        if self.is_failure() {
            Err(ComError::Status(self))
        } else {
            Ok(self)
        }
    }

    /// Symbolic name for the well-known codes
    pub fn name(self) -> Option<&'static str> {
        let name = match self {
            HResult::S_OK => "S_OK",
            HResult::S_FALSE => "S_FALSE",
            HResult::E_UNEXPECTED => "E_UNEXPECTED",
            HResult::E_NOTIMPL => "E_NOTIMPL",
            HResult::E_NOINTERFACE => "E_NOINTERFACE",
            HResult::E_POINTER => "E_POINTER",
            HResult::E_FAIL => "E_FAIL",
            HResult::E_ACCESSDENIED => "E_ACCESSDENIED",
            HResult::E_INVALIDARG => "E_INVALIDARG",
            HResult::CLASS_E_NOAGGREGATION => "CLASS_E_NOAGGREGATION",
            HResult::CLASS_E_CLASSNOTAVAILABLE => "CLASS_E_CLASSNOTAVAILABLE",
            HResult::REGDB_E_CLASSNOTREG => "REGDB_E_CLASSNOTREG",
            HResult::CO_E_OBJNOTREG => "CO_E_OBJNOTREG",
            HResult::DISP_E_EXCEPTION => "DISP_E_EXCEPTION",
            _ => return None,
        };
        Some(name)
    }
}

impl fmt::Debug for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{}", name),
            None => write!(f, "HRESULT(0x{:08X})", self.0 as u32),
        }
    }
}

impl fmt::Display for HResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08X}", self.0 as u32)
    }
}

/// Server runtime errors
#[derive(Error, Debug)]
pub enum ComError {
    /// Unknown class id
    #[error("class not available: {0}")]
    ClassNotAvailable(Clsid),

    /// Aggregation requested for a class that does not support it
    #[error("class {0} does not support aggregation")]
    NoAggregation(Clsid),

    /// Object does not implement the requested interface
    #[error("no such interface: {0}")]
    NoInterface(Iid),

    /// Null/absent output argument
    #[error("invalid pointer")]
    InvalidPointer,

    /// Null/out-of-range input
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Method is not implemented
    #[error("not implemented: {0}")]
    NotImplemented(String),

    /// Server lock count would drop below zero
    #[error("server lock count underflow")]
    LockUnderflow,

    /// Registration token is unknown to the activation environment
    #[error("class object not registered: token {0}")]
    NotRegistered(u32),

    /// Internal failure that should never happen
    #[error("unexpected: {0}")]
    Unexpected(String),

    /// Failure reported with an explicit status code and description
    ///
    /// The boundary turns this into an error record carrying `text`.
    #[error("{text} ({hresult})")]
    Returned { hresult: HResult, text: String },

    /// Status code produced by an invoked constructor or collaborator
    #[error("failed with status {0}")]
    Status(HResult),

    /// Persistent store error
    #[error("registry error: {0}")]
    Registry(#[from] StoreError),

    /// Any other failure raised by object code
    #[error("{kind}: {message}")]
    Failed { kind: String, message: String },
}

impl ComError {
    /// Status code this error is reported as at the boundary
    pub fn hresult(&self) -> HResult {
        match self {
            ComError::ClassNotAvailable(_) => HResult::CLASS_E_CLASSNOTAVAILABLE,
            ComError::NoAggregation(_) => HResult::CLASS_E_NOAGGREGATION,
            ComError::NoInterface(_) => HResult::E_NOINTERFACE,
            ComError::InvalidPointer => HResult::E_POINTER,
            ComError::InvalidArgument(_) => HResult::E_INVALIDARG,
            ComError::NotImplemented(_) => HResult::E_NOTIMPL,
            ComError::LockUnderflow => HResult::E_UNEXPECTED,
            ComError::NotRegistered(_) => HResult::CO_E_OBJNOTREG,
            ComError::Unexpected(_) => HResult::E_UNEXPECTED,
            ComError::Returned { hresult, .. } => *hresult,
            ComError::Status(hr) => *hr,
            ComError::Registry(e) => e.hresult(),
            ComError::Failed { .. } => HResult::E_FAIL,
        }
    }

    /// Short type name used in error record descriptions
    pub fn kind(&self) -> &str {
        match self {
            ComError::ClassNotAvailable(_) => "ClassNotAvailable",
            ComError::NoAggregation(_) => "NoAggregation",
            ComError::NoInterface(_) => "NoInterface",
            ComError::InvalidPointer => "InvalidPointer",
            ComError::InvalidArgument(_) => "InvalidArgument",
            ComError::NotImplemented(_) => "NotImplemented",
            ComError::LockUnderflow => "LockUnderflow",
            ComError::NotRegistered(_) => "NotRegistered",
            ComError::Unexpected(_) => "Unexpected",
            ComError::Returned { .. } => "Returned",
            ComError::Status(_) => "Status",
            ComError::Registry(_) => "Registry",
            ComError::Failed { kind, .. } => kind.as_str(),
        }
    }

    /// Wrap an arbitrary error raised by object code
    pub fn failed<E: std::error::Error>(err: &E) -> Self {
        ComError::Failed {
            kind: short_type_name::<E>().to_string(),
            message: err.to_string(),
        }
    }
}

pub(crate) fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    full.rsplit("::").next().unwrap_or(full)
}
