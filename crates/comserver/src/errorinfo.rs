//! Thread-scoped structured error channel
//!
//! A status code is all that crosses the component boundary. Richer
//! diagnostics travel beside it: a failing call stores an [`ErrorRecord`] in
//! its thread's slot and the caller claims it afterwards with [`get_error`].
//!
//! - At most one record is pending per thread; setting a new one replaces
//!   an unclaimed previous record.
//! - Reading clears the slot, so each record is delivered at most once.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::panic::Location;
use tracing::debug;
use crate::types::{ComError, HResult, Iid, Result};

thread_local! {
    static PENDING: RefCell<Option<ErrorRecord>> = const { RefCell::new(None) };
}

/// Diagnostic payload threaded alongside a boundary status code
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ErrorRecord {
    /// Status code the failing call returned
    pub hresult: HResult,
    /// Human readable description
    pub description: String,
    /// Prog-id of the class or application that raised the error
    pub source: Option<String>,
    /// Interface the error is reported against
    pub iid: Iid,
    /// Help file path
    pub help_file: Option<String>,
    /// Help context id inside `help_file`
    pub help_context: u32,
}

impl ErrorRecord {
    /// Create a record with no source and no help link
    pub fn new(hresult: HResult, description: impl Into<String>, iid: Iid) -> Self {
        Self {
            hresult,
            description: description.into(),
            source: None,
            iid,
            help_file: None,
            help_context: 0,
        }
    }

    /// Set the source prog-id
    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    /// Set the help file and context
    pub fn with_help(mut self, help_file: impl Into<String>, help_context: u32) -> Self {
        self.help_file = Some(help_file.into());
        self.help_context = help_context;
        self
    }
}

/// Store `record` as the calling thread's pending error
///
/// Returns the record's status code so a call site can set diagnostics and
/// return the code in one expression.
pub fn set_error(record: ErrorRecord) -> HResult {
    let hresult = record.hresult;
    PENDING.with(|slot| {
        if let Some(old) = slot.borrow_mut().replace(record) {
            debug!("discarding unclaimed error record {:?}", old.hresult);
        }
    });
    hresult
}

/// Take the calling thread's pending error, leaving the slot empty
pub fn get_error() -> Option<ErrorRecord> {
    PENDING.with(|slot| slot.borrow_mut().take())
}

/// Check for a pending record without claiming it
pub fn has_pending_error() -> bool {
    PENDING.with(|slot| slot.borrow().is_some())
}

/// Report an error: build a record, store it and return `hresult`
pub fn report_error(
    text: &str,
    iid: Iid,
    source: Option<&str>,
    help_file: Option<&str>,
    help_context: u32,
    hresult: HResult,
) -> HResult {
    let mut record = ErrorRecord::new(hresult, text, iid);
    record.source = source.map(str::to_string);
    record.help_file = help_file.map(str::to_string);
    record.help_context = help_context;
    set_error(record)
}

/// A failure in flight, with the source locations it passed through
///
/// The origin is recorded on construction; each [`Failure::propagated`]
/// call records one more frame on the way to the catch point. Frames are
/// kept catch point first, origin last.
#[derive(Clone)]
pub struct Failure {
    kind: String,
    message: String,
    frames: Vec<&'static Location<'static>>,
}

impl Failure {
    /// Start a failure at the caller's location
    #[track_caller]
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            frames: vec![Location::caller()],
        }
    }

    /// Start a failure from a runtime error
    #[track_caller]
    pub fn from_error(err: &ComError) -> Self {
        Self::new(err.kind(), err.to_string())
    }

    /// Start a failure from a panic payload
    #[track_caller]
    pub fn from_panic(payload: &(dyn Any + Send)) -> Self {
        let message = if let Some(s) = payload.downcast_ref::<&str>() {
            (*s).to_string()
        } else if let Some(s) = payload.downcast_ref::<String>() {
            s.clone()
        } else {
            "non-string panic payload".to_string()
        };
        Self::new("panic", message)
    }

    /// Record that the failure passed through the caller's location
    #[track_caller]
    pub fn propagated(mut self) -> Self {
        self.frames.insert(0, Location::caller());
        self
    }

    /// Failure type name
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Failure message
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Recorded frames, catch point first
    pub fn frames(&self) -> &[&'static Location<'static>] {
        &self.frames
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)
    }
}

impl fmt::Debug for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Failure")
            .field("kind", &self.kind)
            .field("message", &self.message)
            .field("frames", &self.frames.len())
            .finish()
    }
}

/// Report a failure as the thread's pending error and return `hresult`
///
/// The description names the failure's type and message. With
/// `stack_offset = Some(k)` it is tagged with the source location `k` frames
/// away from the catch point (0 is the catch point itself). An offset beyond
/// the recorded frames, or any offset without a failure, is rejected with
/// `InvalidArgument` and leaves the pending slot untouched.
pub fn report_failure(
    failure: Option<&Failure>,
    iid: Iid,
    hresult: HResult,
    stack_offset: Option<usize>,
) -> Result<HResult> {
    report_failure_with(failure, iid, None, None, 0, hresult, stack_offset)
}

/// [`report_failure`] with a source prog-id and help link, the way
/// [`report_error`] takes them
pub fn report_failure_with(
    failure: Option<&Failure>,
    iid: Iid,
    source: Option<&str>,
    help_file: Option<&str>,
    help_context: u32,
    hresult: HResult,
    stack_offset: Option<usize>,
) -> Result<HResult> {
    let text = match (failure, stack_offset) {
        (None, Some(_)) => {
            return Err(ComError::InvalidArgument(
                "stack offset is specified, but no failure is active".to_string(),
            ));
        }
        (None, None) => "unknown failure".to_string(),
        (Some(failure), None) => failure.to_string(),
        (Some(failure), Some(offset)) => {
            let frame = failure.frames.get(offset).ok_or_else(|| {
                ComError::InvalidArgument(format!(
                    "stack offset {} exceeds the available depth {}",
                    offset,
                    failure.frames.len()
                ))
            })?;
            format!("{} ({}, line {})", failure, frame.file(), frame.line())
        }
    };
    Ok(report_error(&text, iid, source, help_file, help_context, hresult))
}
