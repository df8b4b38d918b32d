//! Component objects and reference-counted interface handles
//!
//! Every object declares the interfaces it implements as static data;
//! `QueryInterface` is a lookup in that table. IUnknown and
//! ISupportErrorInfo are answered for every object.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use crate::activation::LiveObjectGuard;
use crate::types::{iid, ComError, HResult, Iid, Result};

/// Trait for component object implementations
pub trait ComObject: Send + Sync + 'static {
    /// Interfaces implemented by this object, besides IUnknown and
    /// ISupportErrorInfo
    fn interfaces(&self) -> &[Iid];

    /// Cast to Any for downcasting
    fn as_any(&self) -> &dyn Any;

    /// Called once, when the last reference to the object is released
    fn final_release(&self) {}
}

/// Check whether `object` answers QueryInterface for `iid`
pub fn implements(object: &dyn ComObject, iid: &Iid) -> bool {
    *iid == iid::IUNKNOWN || *iid == iid::ISUPPORTERRORINFO || object.interfaces().contains(iid)
}

/// Shared allocation behind every handle to one object
struct ObjectCell {
    object: Box<dyn ComObject>,
    /// Live-object accounting for objects created by a class factory
    _guard: Option<LiveObjectGuard>,
}

impl Drop for ObjectCell {
    fn drop(&mut self) {
        self.object.final_release();
    }
}

/// Reference-counted handle to one interface of a component object
///
/// Cloning a handle is AddRef, dropping it is Release. The object is torn
/// down when the last handle to any of its interfaces goes away.
#[derive(Clone)]
pub struct ComRef {
    cell: Arc<ObjectCell>,
    iid: Iid,
}

impl ComRef {
    /// Wrap an untracked object, returning its IUnknown with one reference
    pub fn new<T: ComObject>(object: T) -> Self {
        Self::from_box(Box::new(object), None)
    }

    pub(crate) fn from_box(object: Box<dyn ComObject>, guard: Option<LiveObjectGuard>) -> Self {
        Self {
            cell: Arc::new(ObjectCell { object, _guard: guard }),
            iid: iid::IUNKNOWN,
        }
    }

    /// The interface this handle was obtained for
    pub fn iid(&self) -> Iid {
        self.iid
    }

    /// Number of outstanding handles to the object
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.cell)
    }

    /// Access the object behind the handle
    pub fn object(&self) -> &dyn ComObject {
        self.cell.object.as_ref()
    }

    /// Check whether the object implements `iid`
    pub fn supports(&self, iid: &Iid) -> bool {
        implements(self.object(), iid)
    }

    /// QueryInterface: a new handle for `iid`, or `NoInterface`
    pub fn query_interface(&self, iid: &Iid) -> Result<ComRef> {
        if self.supports(iid) {
            debug!("QueryInterface({}) -> S_OK", iid);
            Ok(Self {
                cell: self.cell.clone(),
                iid: *iid,
            })
        } else {
            debug!("QueryInterface({}) -> E_NOINTERFACE", iid);
            Err(ComError::NoInterface(*iid))
        }
    }

    /// Boundary form of QueryInterface writing into an output slot
    pub fn query_interface_raw(&self, iid: &Iid, ppv: Option<&mut Option<ComRef>>) -> HResult {
        let Some(ppv) = ppv else {
            return HResult::E_POINTER;
        };
        match self.query_interface(iid) {
            Ok(handle) => {
                *ppv = Some(handle);
                HResult::S_OK
            }
            Err(e) => {
                *ppv = None;
                e.hresult()
            }
        }
    }

    /// Downcast to the concrete object type
    pub fn downcast<T: ComObject>(&self) -> Option<&T> {
        self.object().as_any().downcast_ref::<T>()
    }

    /// ISupportErrorInfo::InterfaceSupportsErrorInfo
    pub fn interface_supports_error_info(&self, iid: &Iid) -> HResult {
        if self.supports(iid) {
            HResult::S_OK
        } else {
            HResult::S_FALSE
        }
    }

    /// Identity comparison, independent of the interface held
    pub fn same_object(&self, other: &ComRef) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl fmt::Debug for ComRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComRef")
            .field("iid", &self.iid)
            .field("refs", &self.ref_count())
            .finish()
    }
}
