//! IClassFactory implementation

use std::any::Any;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tracing::debug;
use crate::boundary;
use crate::object::{ComObject, ComRef};
use crate::registry::ClassDescriptor;
use crate::types::{iid, ComError, HResult, Iid, Result};
use super::lifetime::ServerLifetime;

/// Creates instances of one class and takes part in server lifetime
/// accounting
///
/// Every instance it creates is counted as a live object of the server
/// until its last reference is released.
pub struct ClassFactory {
    descriptor: Arc<ClassDescriptor>,
    lifetime: Arc<ServerLifetime>,
    /// Locks taken through this factory and not yet released
    locks: AtomicUsize,
}

impl ClassFactory {
    /// Create a factory for `descriptor` sharing `lifetime`
    pub fn new(descriptor: Arc<ClassDescriptor>, lifetime: Arc<ServerLifetime>) -> Self {
        Self {
            descriptor,
            lifetime,
            locks: AtomicUsize::new(0),
        }
    }

    /// Class served by this factory
    pub fn descriptor(&self) -> &Arc<ClassDescriptor> {
        &self.descriptor
    }

    /// Lifetime context shared with the server
    pub fn lifetime(&self) -> &Arc<ServerLifetime> {
        &self.lifetime
    }

    /// Server locks this factory currently holds
    pub fn outstanding_locks(&self) -> usize {
        self.locks.load(Ordering::SeqCst)
    }

    /// IClassFactory::CreateInstance
    ///
    /// Constructor failures are passed through unchanged. The new object is
    /// released again when it does not implement `iid`.
    pub fn create_instance(&self, outer: Option<&ComRef>, iid: &Iid) -> Result<ComRef> {
        let clsid = self.descriptor.clsid();
        if outer.is_some() && !self.descriptor.aggregatable() {
            return Err(ComError::NoAggregation(clsid));
        }
        let object = self.descriptor.construct(outer)?;
        let unknown = ComRef::from_box(object, Some(self.lifetime.object_created()));
        let result = unknown.query_interface(iid);
        debug!("CreateInstance {} for {} -> {}", self.descriptor.name(), iid,
            if result.is_ok() { "S_OK" } else { "E_NOINTERFACE" });
        result
    }

    /// IClassFactory::LockServer
    pub fn lock_server(&self, lock: bool) -> Result<()> {
        if lock {
            self.lifetime.lock();
            self.locks.fetch_add(1, Ordering::SeqCst);
        } else {
            self.lifetime.unlock()?;
            let released = self
                .locks
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
            if released.is_err() {
                debug!("{}: server lock was taken through another factory", self.descriptor.name());
            }
        }
        Ok(())
    }

    /// Boundary form of `create_instance`
    ///
    /// `ppv` is cleared first and receives the new interface on success.
    pub fn create_instance_raw(
        &self,
        outer: Option<&ComRef>,
        iid: &Iid,
        ppv: Option<&mut Option<ComRef>>,
    ) -> HResult {
        let Some(ppv) = ppv else {
            return HResult::E_POINTER;
        };
        *ppv = None;
        boundary::guard(iid::ICLASSFACTORY, self.descriptor.progid(), "CreateInstance", || {
            *ppv = Some(self.create_instance(outer, iid)?);
            Ok(HResult::S_OK)
        })
    }

    /// Boundary form of `lock_server`
    pub fn lock_server_raw(&self, lock: bool) -> HResult {
        boundary::guard(iid::ICLASSFACTORY, self.descriptor.progid(), "LockServer", || {
            self.lock_server(lock)?;
            Ok(HResult::S_OK)
        })
    }
}

impl ComObject for ClassFactory {
    fn interfaces(&self) -> &[Iid] {
        &[iid::ICLASSFACTORY]
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl std::fmt::Debug for ClassFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassFactory")
            .field("class", &self.descriptor.name())
            .field("locks", &self.outstanding_locks())
            .finish()
    }
}
