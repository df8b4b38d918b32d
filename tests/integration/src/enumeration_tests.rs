//! Enumeration Tests
//!
//! Enumerator objects over live component objects:
//! - bulk fetch with partial success at the end of the sequence
//! - Skip/Reset/Clone through the enumerator object
//! - visibility of changes made by the sequence owner

mod common;

use std::sync::Arc;

use parking_lot::RwLock;
use proptest::prelude::*;

use common::*;
use comserver::enumerator::{EnumCursor, EnumObject, SharedSequence};
use comserver::iid;
use comserver::{ComRef, ComServer, HResult};

fn calculators(server: &ComServer, count: usize) -> SharedSequence<ComRef> {
    let items = (0..count)
        .map(|i| {
            let calc = server.activate(&CALCULATOR_CLSID, &ICALCULATOR).expect("activate");
            calc.downcast::<Calculator>().expect("calculator").add(i as i64);
            calc
        })
        .collect();
    Arc::new(RwLock::new(items))
}

fn value(item: &ComRef) -> i64 {
    *item.downcast::<Calculator>().expect("calculator").memory.lock()
}

fn server() -> ComServer {
    ComServer::builder()
        .class(calculator_descriptor())
        .store(seeded_registry())
        .build()
}

/// Test: three-item walk with next, skip, reset over IEnumUnknown
#[test]
fn test_enum_unknown_walk() {
    init_logging();

    let server = server();
    let source = calculators(&server, 3);
    let enumerator = ComRef::new(EnumObject::unknowns(source.clone()));
    assert!(enumerator.supports(&iid::IENUMUNKNOWN));
    let enumerator = enumerator.downcast::<EnumObject<ComRef>>().expect("enumerator");

    let (items, hr) = enumerator.next(1);
    assert_eq!((items.iter().map(value).collect::<Vec<_>>(), hr), (vec![0], HResult::S_OK));
    let (items, hr) = enumerator.next(1);
    assert_eq!((items.iter().map(value).collect::<Vec<_>>(), hr), (vec![1], HResult::S_OK));
    assert_eq!(enumerator.skip(1), HResult::S_OK);

    let mut buffer: Vec<Option<ComRef>> = vec![None; 1];
    let mut fetched = usize::MAX;
    assert_eq!(
        enumerator.next_into(1, Some(&mut buffer[..]), Some(&mut fetched)),
        HResult::S_FALSE
    );
    assert_eq!(fetched, 0);
    assert!(buffer[0].is_none());

    assert_eq!(enumerator.reset(), HResult::S_OK);
    let mut buffer: Vec<Option<ComRef>> = vec![None; 3];
    assert_eq!(
        enumerator.next_into(3, Some(&mut buffer[..]), Some(&mut fetched)),
        HResult::S_OK
    );
    assert_eq!(fetched, 3);
    let values: Vec<i64> = buffer.iter().map(|b| value(b.as_ref().expect("item"))).collect();
    assert_eq!(values, vec![0, 1, 2]);
    assert_eq!(enumerator.next_into(1, None, None), HResult::E_POINTER);
}

/// Test: handed-out items keep their objects alive after the sequence drops them
#[test]
fn test_fetched_items_hold_references() {
    init_logging();

    let server = server();
    let source = calculators(&server, 2);
    let enumerator = EnumObject::unknowns(source.clone());
    let (items, _) = enumerator.next(2);
    source.write().clear();
    drop(enumerator);
    assert_eq!(server.lifetime().live_objects(), 2);
    drop(items);
    assert_eq!(server.lifetime().live_objects(), 0);
}

/// Test: clones start where the original stood and move independently
#[test]
fn test_clone_has_independent_position() {
    init_logging();

    let server = server();
    let enumerator = EnumObject::unknowns(calculators(&server, 4));
    enumerator.skip(1);

    let mut clone = None;
    assert_eq!(enumerator.clone_raw(Some(&mut clone)), HResult::S_OK);
    let clone = clone.expect("clone");
    assert_eq!(clone.iid(), iid::IENUMUNKNOWN);
    let clone = clone.downcast::<EnumObject<ComRef>>().expect("enumerator");

    let (a, _) = enumerator.next(2);
    let (b, _) = clone.next(1);
    assert_eq!(a.iter().map(value).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(b.iter().map(value).collect::<Vec<_>>(), vec![1]);
    assert_eq!(enumerator.clone_raw(None), HResult::E_POINTER);
}

/// Test: appends by the owner are visible to an exhausted cursor
#[test]
fn test_owner_changes_are_visible() {
    init_logging();

    let source: SharedSequence<u32> = Arc::new(RwLock::new(vec![1, 2]));
    let mut cursor = EnumCursor::new(source.clone());
    assert_eq!(cursor.next(5), (vec![1, 2], HResult::S_FALSE));
    assert_eq!(cursor.skip(0), HResult::S_FALSE);
    source.write().push(3);
    assert_eq!(cursor.next(1), (vec![3], HResult::S_OK));

    // shrinking below the position leaves the cursor at the end
    source.write().truncate(1);
    assert_eq!(cursor.next(1), (vec![], HResult::S_FALSE));
    cursor.reset();
    assert_eq!(cursor.next(1), (vec![1], HResult::S_OK));
}

proptest! {
    /// Interleaved operations never move the cursor past the sequence end
    /// and always report S_OK exactly when the full count was served
    #[test]
    fn prop_mixed_operations(
        len in 0usize..20,
        ops in proptest::collection::vec((0u8..3, 0usize..8), 0..40),
    ) {
        let mut cursor = EnumCursor::from_vec((0..len).collect::<Vec<_>>());
        let mut model = 0usize;
        for (op, n) in ops {
            match op {
                0 => {
                    let (items, hr) = cursor.next(n);
                    let expected: Vec<usize> = (model..(model + n).min(len)).collect();
                    prop_assert_eq!(hr == HResult::S_OK, expected.len() == n);
                    prop_assert_eq!(items, expected);
                    model = (model + n).min(len);
                }
                1 => {
                    let hr = cursor.skip(n);
                    let remaining = len - model;
                    prop_assert_eq!(hr == HResult::S_OK, remaining > 0 && n <= remaining);
                    model = (model + n).min(len);
                }
                _ => {
                    cursor.reset();
                    model = 0;
                }
            }
            prop_assert_eq!(cursor.position(), model);
        }
    }
}
