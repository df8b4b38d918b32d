//! Bulk-fetch enumeration cursors (IEnumXXX protocol)
//!
//! A cursor walks a shared sequence forward. Fetching past the end is not an
//! error: the call reports how many items it produced and answers `S_FALSE`
//! instead of `S_OK` when it produced fewer than requested.

use std::any::Any;
use std::sync::Arc;
use parking_lot::{Mutex, RwLock};
use crate::object::{ComObject, ComRef};
use crate::types::{iid, HResult, Iid};

/// Sequence shared between its owner and every cursor over it
///
/// Cursors hold the sequence by reference, so changes made by the owner are
/// visible to cursors that have not yet passed the changed items.
pub type SharedSequence<T> = Arc<RwLock<Vec<T>>>;

/// Forward cursor over a shared sequence
#[derive(Debug)]
pub struct EnumCursor<T> {
    source: SharedSequence<T>,
    position: usize,
}

fn completion(produced: usize, requested: usize) -> HResult {
    if produced == requested {
        HResult::S_OK
    } else {
        HResult::S_FALSE
    }
}

impl<T: Clone> EnumCursor<T> {
    /// Create a cursor at the start of `source`
    pub fn new(source: SharedSequence<T>) -> Self {
        Self { source, position: 0 }
    }

    /// Create a cursor over a sequence nobody else holds
    pub fn from_vec(items: Vec<T>) -> Self {
        Self::new(Arc::new(RwLock::new(items)))
    }

    /// Current position
    pub fn position(&self) -> usize {
        self.position
    }

    /// The sequence this cursor walks
    pub fn source(&self) -> &SharedSequence<T> {
        &self.source
    }

    /// Fetch up to `count` items
    ///
    /// Returns the items in sequence order together with `S_OK` when all
    /// `count` were produced, `S_FALSE` otherwise.
    pub fn next(&mut self, count: usize) -> (Vec<T>, HResult) {
        let items = self.source.read();
        let start = self.position.min(items.len());
        let end = start + count.min(items.len() - start);
        let fetched = items[start..end].to_vec();
        self.position = end;
        let status = completion(fetched.len(), count);
        (fetched, status)
    }

    /// Boundary form of `next`, filling a caller-supplied buffer
    ///
    /// A missing buffer is `E_POINTER`; a buffer shorter than `count` is
    /// `E_INVALIDARG`. `fetched` may be absent.
    pub fn next_into(
        &mut self,
        count: usize,
        buffer: Option<&mut [Option<T>]>,
        fetched: Option<&mut usize>,
    ) -> HResult {
        let Some(buffer) = buffer else {
            return HResult::E_POINTER;
        };
        if buffer.len() < count {
            return HResult::E_INVALIDARG;
        }
        let (items, status) = self.next(count);
        let produced = items.len();
        for (slot, item) in buffer.iter_mut().zip(items) {
            *slot = Some(item);
        }
        if let Some(fetched) = fetched {
            *fetched = produced;
        }
        status
    }

    /// Advance by up to `count` items
    ///
    /// `S_FALSE` when the end of the sequence cut the skip short, and also
    /// whenever nothing was left to skip.
    pub fn skip(&mut self, count: usize) -> HResult {
        let len = self.source.read().len();
        let remaining = len.saturating_sub(self.position);
        let skipped = count.min(remaining);
        self.position = self.position.min(len) + skipped;
        if remaining == 0 {
            return HResult::S_FALSE;
        }
        completion(skipped, count)
    }

    /// Rewind to the first item
    pub fn reset(&mut self) -> HResult {
        self.position = 0;
        HResult::S_OK
    }

    /// A second cursor over the same sequence, starting at this cursor's
    /// position and independent of it afterwards
    pub fn clone_cursor(&self) -> Self {
        Self {
            source: self.source.clone(),
            position: self.position,
        }
    }
}

/// Enumerator object exposing a cursor through an IEnumXXX interface
pub struct EnumObject<T> {
    iid: [Iid; 1],
    cursor: Mutex<EnumCursor<T>>,
}

impl<T: Clone + Send + Sync + 'static> EnumObject<T> {
    /// Create an enumerator answering for `enum_iid`
    pub fn new(enum_iid: Iid, cursor: EnumCursor<T>) -> Self {
        Self {
            iid: [enum_iid],
            cursor: Mutex::new(cursor),
        }
    }

    /// Fetch up to `count` items
    pub fn next(&self, count: usize) -> (Vec<T>, HResult) {
        self.cursor.lock().next(count)
    }

    /// Boundary form of `next`
    pub fn next_into(
        &self,
        count: usize,
        buffer: Option<&mut [Option<T>]>,
        fetched: Option<&mut usize>,
    ) -> HResult {
        self.cursor.lock().next_into(count, buffer, fetched)
    }

    /// Skip up to `count` items
    pub fn skip(&self, count: usize) -> HResult {
        self.cursor.lock().skip(count)
    }

    /// Rewind to the start
    pub fn reset(&self) -> HResult {
        self.cursor.lock().reset()
    }

    /// Clone into a new enumerator object with its own position
    pub fn clone_enum(&self) -> ComRef {
        let cursor = self.cursor.lock().clone_cursor();
        ComRef::new(Self::new(self.iid[0], cursor))
    }

    /// Boundary form of `clone_enum`
    pub fn clone_raw(&self, ppenum: Option<&mut Option<ComRef>>) -> HResult {
        let Some(ppenum) = ppenum else {
            return HResult::E_POINTER;
        };
        let iid = self.iid[0];
        self.clone_enum().query_interface_raw(&iid, Some(ppenum))
    }
}

impl EnumObject<ComRef> {
    /// IEnumUnknown over a sequence of objects
    pub fn unknowns(source: SharedSequence<ComRef>) -> Self {
        Self::new(iid::IENUMUNKNOWN, EnumCursor::new(source))
    }
}

impl<T: Clone + Send + Sync + 'static> ComObject for EnumObject<T> {
    fn interfaces(&self) -> &[Iid] {
        &self.iid
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
