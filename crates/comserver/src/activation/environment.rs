//! Activation environment: where class objects are advertised for
//! local-server activation

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use parking_lot::Mutex;
use tracing::debug;
use crate::object::ComRef;
use crate::registry::ClassContext;
use crate::types::{Clsid, ComError, Iid, Result};

/// Multiplicity mode of an advertised class object (REGCLS)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum RegCls {
    /// Serves a single activation request, then disappears
    SingleUse,
    /// Serves any number of requests
    #[default]
    MultipleUse,
    /// Multiple use; in-process requests from this server get their own
    /// instance of the class object
    MultiSeparate,
    /// Registered but invisible until resumed
    Suspended,
    /// Registered by a surrogate process
    Surrogate,
}

impl RegCls {
    /// Numeric REGCLS value
    pub fn value(self) -> u32 {
        match self {
            RegCls::SingleUse => 0,
            RegCls::MultipleUse => 1,
            RegCls::MultiSeparate => 2,
            RegCls::Suspended => 4,
            RegCls::Surrogate => 8,
        }
    }

    /// Mode for a numeric REGCLS value
    pub fn from_value(value: u32) -> Option<Self> {
        match value {
            0 => Some(RegCls::SingleUse),
            1 => Some(RegCls::MultipleUse),
            2 => Some(RegCls::MultiSeparate),
            4 => Some(RegCls::Suspended),
            8 => Some(RegCls::Surrogate),
            _ => None,
        }
    }
}

/// Opaque handle identifying one advertised class object
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RegistrationToken(u32);

impl RegistrationToken {
    /// Raw cookie value
    pub fn value(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for RegistrationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RegistrationToken({})", self.0)
    }
}

/// The environment class objects are advertised to
///
/// Calls are synchronous and treated as fast.
pub trait ActivationEnvironment: Send + Sync {
    /// Advertise `factory` for `clsid`
    fn register_class_object(
        &self,
        clsid: Clsid,
        factory: ComRef,
        contexts: ClassContext,
        mode: RegCls,
    ) -> Result<RegistrationToken>;

    /// Withdraw a class object
    fn revoke_class_object(&self, token: RegistrationToken) -> Result<()>;

    /// Make suspended registrations visible
    fn resume_class_objects(&self) -> Result<()>;
}

struct Registration {
    clsid: Clsid,
    factory: ComRef,
    contexts: ClassContext,
    mode: RegCls,
    suspended: bool,
    /// A single-use object that has served its request
    served: bool,
}

/// In-process activation environment
///
/// Keeps advertised class objects in a table and serves them to
/// `get_class_object` the way the system activator would.
#[derive(Default)]
pub struct ClassObjectTable {
    entries: Mutex<BTreeMap<RegistrationToken, Registration>>,
    next: AtomicU32,
}

impl ClassObjectTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registrations, including suspended and served ones
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// True when nothing is registered
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Check whether `token` is still registered
    pub fn contains(&self, token: RegistrationToken) -> bool {
        self.entries.lock().contains_key(&token)
    }

    /// Fetch the class object for `clsid` in `context`, queried for `iid`
    ///
    /// Suspended registrations are skipped. A single-use registration stops
    /// serving after one request but keeps its token until revoked.
    pub fn get_class_object(&self, clsid: &Clsid, context: ClassContext, iid: &Iid) -> Result<ComRef> {
        let mut entries = self.entries.lock();
        let token = entries
            .iter()
            .find(|(_, r)| {
                r.clsid == *clsid
                    && !r.suspended
                    && !r.served
                    && r.contexts.bits() & context.bits() != 0
            })
            .map(|(token, _)| *token)
            .ok_or(ComError::ClassNotAvailable(*clsid))?;

        let factory = match entries.get_mut(&token) {
            Some(r) => {
                if r.mode == RegCls::SingleUse {
                    debug!("single-use class object {} served by {:?}", clsid, token);
                    r.served = true;
                }
                r.factory.clone()
            }
            None => return Err(ComError::ClassNotAvailable(*clsid)),
        };
        drop(entries);
        factory.query_interface(iid)
    }
}

impl ActivationEnvironment for ClassObjectTable {
    fn register_class_object(
        &self,
        clsid: Clsid,
        factory: ComRef,
        contexts: ClassContext,
        mode: RegCls,
    ) -> Result<RegistrationToken> {
        let token = RegistrationToken(self.next.fetch_add(1, Ordering::SeqCst) + 1);
        debug!("register class object {} mode={:?} {:?} -> {:?}", clsid, mode, contexts, token);
        self.entries.lock().insert(
            token,
            Registration {
                clsid,
                factory,
                contexts,
                mode,
                suspended: mode == RegCls::Suspended,
                served: false,
            },
        );
        Ok(token)
    }

    fn revoke_class_object(&self, token: RegistrationToken) -> Result<()> {
        debug!("revoke class object {:?}", token);
        self.entries
            .lock()
            .remove(&token)
            .map(|_| ())
            .ok_or(ComError::NotRegistered(token.0))
    }

    fn resume_class_objects(&self) -> Result<()> {
        for registration in self.entries.lock().values_mut() {
            registration.suspended = false;
        }
        Ok(())
    }
}
