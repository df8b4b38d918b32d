//! Server lifetime accounting
//!
//! Two counters decide whether the hosting process or module may go away:
//! explicit server locks (`LockServer`) and live objects created through a
//! class factory. Both are atomics shared by every factory of one server.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use parking_lot::{Condvar, Mutex};
use tracing::{debug, error};
use crate::config::UnloadPolicy;
use crate::types::{ComError, Result};

/// Lock and live-object counters of one server
#[derive(Default)]
pub struct ServerLifetime {
    /// Explicit server locks
    locks: AtomicUsize,
    /// Objects created by a factory and not yet released
    objects: AtomicUsize,
    /// Set once the first lock or object appears
    active: AtomicBool,
    /// Set by `request_shutdown`
    shutdown: AtomicBool,
    /// Wakes `wait_idle`
    idle: Condvar,
    gate: Mutex<()>,
}

impl ServerLifetime {
    /// Create a lifetime context with both counters at zero
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Take an explicit server lock; returns the new lock count
    pub fn lock(&self) -> usize {
        self.active.store(true, Ordering::SeqCst);
        let count = self.locks.fetch_add(1, Ordering::SeqCst) + 1;
        debug!("server lock count {}", count);
        count
    }

    /// Release an explicit server lock; returns the new lock count
    ///
    /// Releasing more locks than were taken is a caller error: the call
    /// fails with `LockUnderflow` and the count is left as it was.
    pub fn unlock(&self) -> Result<usize> {
        let previous = self
            .locks
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .map_err(|_| {
                error!("LockServer(false) without a matching LockServer(true)");
                ComError::LockUnderflow
            })?;
        let count = previous - 1;
        debug!("server lock count {}", count);
        if count == 0 {
            self.notify();
        }
        Ok(count)
    }

    /// Current explicit lock count
    pub fn lock_count(&self) -> usize {
        self.locks.load(Ordering::SeqCst)
    }

    /// Objects created through a factory and still alive
    pub fn live_objects(&self) -> usize {
        self.objects.load(Ordering::SeqCst)
    }

    /// Account for a newly created object until the guard is dropped
    pub fn object_created(self: &Arc<Self>) -> LiveObjectGuard {
        self.active.store(true, Ordering::SeqCst);
        self.objects.fetch_add(1, Ordering::SeqCst);
        LiveObjectGuard {
            lifetime: self.clone(),
        }
    }

    /// No locks and no live objects
    pub fn is_idle(&self) -> bool {
        self.lock_count() == 0 && self.live_objects() == 0
    }

    /// Whether the module may be unloaded under `policy`
    pub fn can_unload(&self, policy: UnloadPolicy) -> bool {
        match policy {
            UnloadPolicy::Never => false,
            UnloadPolicy::WhenIdle => self.is_idle(),
        }
    }

    /// Block until the server went idle after its first activity, or
    /// until shutdown is requested
    pub fn wait_idle(&self) {
        let mut gate = self.gate.lock();
        while !self.finished() {
            self.idle.wait(&mut gate);
        }
    }

    /// Make `wait_idle` return
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify();
    }

    /// Whether shutdown was requested
    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    fn finished(&self) -> bool {
        self.is_shutdown_requested() || (self.active.load(Ordering::SeqCst) && self.is_idle())
    }

    fn notify(&self) {
        let _gate = self.gate.lock();
        self.idle.notify_all();
    }

    fn object_released(&self) {
        let remaining = self.objects.fetch_sub(1, Ordering::SeqCst) - 1;
        if remaining == 0 {
            self.notify();
        }
    }
}

impl std::fmt::Debug for ServerLifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServerLifetime")
            .field("locks", &self.lock_count())
            .field("objects", &self.live_objects())
            .finish()
    }
}

/// Keeps one live object counted; released on drop
pub struct LiveObjectGuard {
    lifetime: Arc<ServerLifetime>,
}

impl Drop for LiveObjectGuard {
    fn drop(&mut self) {
        self.lifetime.object_released();
    }
}
