//! Error Channel Tests
//!
//! The per-thread error slot seen from several threads at once:
//! - records never leak between threads
//! - at-most-once consumption
//! - failure reports with source-location tags and their misuse cases
//! - records produced by the boundary guard

mod common;

use std::sync::{Arc, Barrier};
use std::thread;

use common::*;
use comserver::boundary;
use comserver::errorinfo::{has_pending_error, report_failure, set_error, ErrorRecord, Failure};
use comserver::iid;
use comserver::{get_error, ComError, HResult};

/// Test: each thread sees only its own record
#[test]
fn test_records_are_thread_local() {
    init_logging();

    const THREADS: usize = 16;
    let barrier = Arc::new(Barrier::new(THREADS));

    let handles: Vec<_> = (0..THREADS)
        .map(|i| {
            let barrier = barrier.clone();
            thread::spawn(move || {
                let description = format!("failure on worker {}", i);
                set_error(ErrorRecord::new(HResult::E_FAIL, description.clone(), ICALCULATOR));
                // every thread has set its record before any reads
                barrier.wait();
                let record = get_error().expect("own record");
                assert_eq!(record.description, description);
                assert!(get_error().is_none());
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }
    assert!(!has_pending_error());
}

/// Test: a record set on one thread is invisible on another
#[test]
fn test_record_not_visible_elsewhere() {
    init_logging();

    let _ = get_error();
    set_error(ErrorRecord::new(HResult::E_INVALIDARG, "main thread", iid::IUNKNOWN));
    let seen = thread::spawn(|| get_error().is_some()).join().expect("worker panicked");
    assert!(!seen);
    assert_eq!(get_error().expect("main record").description, "main thread");
}

/// Test: the newest record wins and is consumed once
#[test]
fn test_latest_record_once() {
    init_logging();

    thread::spawn(|| {
        set_error(ErrorRecord::new(HResult::E_FAIL, "old", iid::IUNKNOWN));
        let hr = set_error(
            ErrorRecord::new(HResult::DISP_E_EXCEPTION, "new", ICALCULATOR)
                .with_source("Tests.Calculator.1")
                .with_help("calc.chm", 7),
        );
        assert_eq!(hr, HResult::DISP_E_EXCEPTION);
        let record = get_error().expect("record");
        assert_eq!(record.description, "new");
        assert_eq!(record.help_file.as_deref(), Some("calc.chm"));
        assert_eq!(record.help_context, 7);
        assert!(get_error().is_none());
    })
    .join()
    .expect("worker panicked");
}

fn parse_digit(text: &str) -> Result<u32, Failure> {
    text.parse::<u32>()
        .map_err(|e| Failure::new("ParseIntError", e.to_string()))
}

fn checked_sum(values: &[&str]) -> Result<u32, Failure> {
    let mut sum = 0;
    for v in values {
        sum += parse_digit(v).map_err(Failure::propagated)?;
    }
    Ok(sum)
}

/// Test: stack offsets select frames and reject out-of-range requests
#[test]
fn test_report_failure_stack_offsets() {
    init_logging();

    thread::spawn(|| {
        let failure = checked_sum(&["1", "x"]).unwrap_err();
        assert_eq!(failure.frames().len(), 2);

        let hr = report_failure(Some(&failure), ICALCULATOR, HResult::E_FAIL, Some(1)).expect("in range");
        assert_eq!(hr, HResult::E_FAIL);
        let record = get_error().expect("record");
        assert!(record.description.starts_with("ParseIntError: "));
        assert!(record.description.contains("error_channel_tests.rs, line"));

        // a pre-existing record survives a rejected report
        set_error(ErrorRecord::new(HResult::E_FAIL, "earlier", ICALCULATOR));
        let err = report_failure(Some(&failure), ICALCULATOR, HResult::E_FAIL, Some(2)).unwrap_err();
        assert!(matches!(err, ComError::InvalidArgument(_)));
        assert_eq!(get_error().expect("earlier record").description, "earlier");

        let err = report_failure(None, ICALCULATOR, HResult::E_FAIL, Some(1)).unwrap_err();
        assert_eq!(err.hresult(), HResult::E_INVALIDARG);
        assert!(get_error().is_none());
    })
    .join()
    .expect("worker panicked");
}

/// Test: boundary-guarded methods leave exactly the right records behind
#[test]
fn test_boundary_records_per_thread() {
    init_logging();

    let handles: Vec<_> = (0..8)
        .map(|i| {
            thread::spawn(move || {
                let hr = boundary::guard(ICALCULATOR, Some("Tests.Calculator.1"), "Divide", || {
                    if i % 2 == 0 {
                        panic!("division by zero on {}", i);
                    }
                    Err(ComError::NoInterface(iid::IDISPATCH))
                });
                let record = get_error();
                if i % 2 == 0 {
                    assert_eq!(hr, HResult::E_UNEXPECTED);
                    let record = record.expect("panic record");
                    assert!(record.description.contains(&format!("division by zero on {}", i)));
                    assert_eq!(record.source.as_deref(), Some("Tests.Calculator.1"));
                    assert_eq!(record.iid, ICALCULATOR);
                } else {
                    assert_eq!(hr, HResult::E_NOINTERFACE);
                    assert!(record.is_none());
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("worker panicked");
    }
}
