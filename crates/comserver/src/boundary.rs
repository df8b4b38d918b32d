//! Catch-all wrapper for operations invoked across the component boundary
//!
//! Nothing may unwind or escape past the boundary: every outcome of a
//! wrapped operation becomes a status code, with an error record where the
//! failure carries more than a code.

use std::panic::{self, AssertUnwindSafe};
use tracing::{error, warn};
use crate::errorinfo::{report_error, report_failure_with, Failure};
use crate::types::{ComError, HResult, Iid, Result};

/// Run `op` for method `method` of interface `iid`, converting any failure
///
/// - `Ok(hr)` is returned unchanged.
/// - `Returned { hresult, text }` sets a record with `text` and returns `hresult`.
/// - `NotImplemented` returns `E_NOTIMPL` without a record.
/// - `Failed` sets a record describing the failure and returns `E_FAIL`.
/// - `Unexpected` and panics set a record and return `E_UNEXPECTED`.
/// - Every other error returns its own status code without a record.
///
/// `source` is the prog-id stored in generated records.
#[track_caller]
pub fn guard<F>(iid: Iid, source: Option<&str>, method: &str, op: F) -> HResult
where
    F: FnOnce() -> Result<HResult>,
{
    match panic::catch_unwind(AssertUnwindSafe(op)) {
        Ok(Ok(hr)) => hr,
        Ok(Err(err)) => convert_error(iid, source, method, err),
        Err(payload) => {
            let failure = Failure::from_panic(payload.as_ref());
            error!("panic in {} implementation: {}", method, failure);
            record(&failure, iid, source, HResult::E_UNEXPECTED)
        }
    }
}

/// Convert an error that reached the boundary into its status code
#[track_caller]
pub fn convert_error(iid: Iid, source: Option<&str>, method: &str, err: ComError) -> HResult {
    match err {
        ComError::Returned { hresult, text } => {
            report_error(&text, iid, source, None, 0, hresult)
        }
        ComError::NotImplemented(what) => {
            warn!("unimplemented method {} called ({})", method, what);
            HResult::E_NOTIMPL
        }
        ComError::Failed { .. } => {
            error!("failure in {} implementation: {}", method, err);
            record(&Failure::from_error(&err), iid, source, HResult::E_FAIL)
        }
        ComError::Unexpected(_) => {
            error!("failure in {} implementation: {}", method, err);
            record(&Failure::from_error(&err), iid, source, HResult::E_UNEXPECTED)
        }
        other => {
            error!("error in {} implementation: {}", method, other);
            other.hresult()
        }
    }
}

fn record(failure: &Failure, iid: Iid, source: Option<&str>, hresult: HResult) -> HResult {
    report_failure_with(Some(failure), iid, source, None, 0, hresult, None).unwrap_or(hresult)
}
