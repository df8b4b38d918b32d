//! Server entry points
//!
//! [`ComServer`] ties the class table, the lifetime counters and the
//! activation environment together and exposes the operations the hosting
//! environment calls: `DllGetClassObject`, `DllCanUnloadNow`, and class
//! object registration for local-server activation.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info};
use crate::activation::{
    ActivationEnvironment, ClassFactory, ClassObjectTable, RegCls, RegistrationToken, ServerLifetime,
};
use crate::config::{RegistrationScope, ServerConfig};
use crate::diagnostics;
use crate::errorinfo::Failure;
use crate::object::ComRef;
use crate::registry::{self, ClassContext, ClassDescriptor, ClassRegistry, RegistryStore};
use crate::types::{Clsid, ComError, HResult, Iid, Result};

/// A class factory advertised for local-server activation
pub struct ClassFactoryState {
    descriptor: Arc<ClassDescriptor>,
    factory: ComRef,
    mode: RegCls,
    token: Mutex<Option<RegistrationToken>>,
}

impl ClassFactoryState {
    /// Advertised class
    pub fn descriptor(&self) -> &Arc<ClassDescriptor> {
        &self.descriptor
    }

    /// The class factory object
    pub fn factory(&self) -> &ComRef {
        &self.factory
    }

    /// Multiplicity mode it was advertised with
    pub fn mode(&self) -> RegCls {
        self.mode
    }

    /// Token issued by the activation environment, until revoked
    pub fn token(&self) -> Option<RegistrationToken> {
        *self.token.lock()
    }

    /// Still advertised
    pub fn is_registered(&self) -> bool {
        self.token.lock().is_some()
    }

    /// Server locks currently held through this factory
    pub fn outstanding_locks(&self) -> usize {
        self.factory
            .downcast::<ClassFactory>()
            .map(ClassFactory::outstanding_locks)
            .unwrap_or(0)
    }
}

impl std::fmt::Debug for ClassFactoryState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClassFactoryState")
            .field("clsid", &self.descriptor.clsid())
            .field("mode", &self.mode)
            .field("token", &self.token())
            .finish()
    }
}

/// Component server runtime
pub struct ComServer {
    config: ServerConfig,
    classes: Arc<ClassRegistry>,
    lifetime: Arc<ServerLifetime>,
    environment: Arc<dyn ActivationEnvironment>,
    store: Arc<dyn RegistryStore>,
    scope: RegistrationScope,
    /// Class factories handed out by `get_class_object`
    factories: RwLock<HashMap<Clsid, ComRef>>,
    /// Local-server registrations by class
    local: Mutex<HashMap<Clsid, Arc<ClassFactoryState>>>,
}

impl ComServer {
    /// Start building a server
    pub fn builder() -> ComServerBuilder {
        ComServerBuilder::new()
    }

    /// Configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Class table
    pub fn classes(&self) -> &Arc<ClassRegistry> {
        &self.classes
    }

    /// Lock and live-object counters
    pub fn lifetime(&self) -> &Arc<ServerLifetime> {
        &self.lifetime
    }

    /// Environment class objects are advertised to
    pub fn environment(&self) -> &Arc<dyn ActivationEnvironment> {
        &self.environment
    }

    /// Persistent registration store
    pub fn store(&self) -> &Arc<dyn RegistryStore> {
        &self.store
    }

    /// Resolve a class id, falling back to the persisted implementation
    /// class name
    ///
    /// Store failures other than a missing entry are returned as errors.
    pub fn resolve(&self, clsid: &Clsid) -> Result<Option<Arc<ClassDescriptor>>> {
        match self.classes.lookup(clsid) {
            Some(descriptor) => Ok(Some(descriptor)),
            None => self.classes.find_persisted(clsid, self.store.as_ref(), self.scope),
        }
    }

    /// Create an instance of `clsid` and return its `iid` interface
    ///
    /// Does not touch the server lock count; the instance counts as a live
    /// object until released.
    pub fn activate(&self, clsid: &Clsid, iid: &Iid) -> Result<ComRef> {
        debug!("Activate(clsid={}, iid={})", clsid, iid);
        let descriptor = self.resolve(clsid)?.ok_or(ComError::ClassNotAvailable(*clsid))?;
        ClassFactory::new(descriptor, self.lifetime.clone()).create_instance(None, iid)
    }

    /// The class factory for `clsid`, queried for `iid`
    pub fn get_class_object(&self, clsid: &Clsid, iid: &Iid) -> Result<ComRef> {
        if let Some(factory) = self.factories.read().get(clsid) {
            return factory.query_interface(iid);
        }
        let descriptor = self.resolve(clsid)?.ok_or(ComError::ClassNotAvailable(*clsid))?;
        let factory = self
            .factories
            .write()
            .entry(*clsid)
            .or_insert_with(|| ComRef::new(ClassFactory::new(descriptor, self.lifetime.clone())))
            .clone();
        factory.query_interface(iid)
    }

    /// DllGetClassObject
    ///
    /// Never unwinds: a panic while resolving the class is logged and
    /// reported as `E_FAIL`. Failing to read the logging settings only
    /// leaves logging unconfigured.
    pub fn dll_get_class_object(&self, clsid: &Clsid, iid: &Iid, ppv: Option<&mut Option<ComRef>>) -> HResult {
        let Some(ppv) = ppv else {
            return HResult::E_POINTER;
        };
        *ppv = None;
        if self.config.configure_logging {
            diagnostics::configure_once(self.store.as_ref(), self.scope, clsid);
        }
        debug!("DllGetClassObject(clsid={}, iid={})", clsid, iid);
        let hr = match panic::catch_unwind(AssertUnwindSafe(|| self.get_class_object(clsid, iid))) {
            Ok(Ok(factory)) => {
                *ppv = Some(factory);
                HResult::S_OK
            }
            Ok(Err(e)) => e.hresult(),
            Err(payload) => {
                error!("DllGetClassObject failed: {}", Failure::from_panic(payload.as_ref()));
                HResult::E_FAIL
            }
        };
        debug!("DllGetClassObject() -> {:?}", hr);
        hr
    }

    /// Whether the hosting environment may unload the server now
    pub fn query_unload_eligibility(&self) -> bool {
        let eligible = self.lifetime.can_unload(self.config.unload_policy);
        debug!("unload eligibility: {} ({:?})", eligible, self.lifetime);
        eligible
    }

    /// DllCanUnloadNow: `S_OK` when eligible, `S_FALSE` otherwise
    pub fn dll_can_unload_now(&self) -> HResult {
        if self.query_unload_eligibility() {
            HResult::S_OK
        } else {
            HResult::S_FALSE
        }
    }

    /// Advertise class factories for local-server activation
    ///
    /// A class that declares its own mode uses it instead of `mode`.
    /// Registering a class that is already advertised revokes the earlier
    /// registration first. In-process contexts are never advertised from
    /// here.
    pub fn register_local<I>(&self, descriptors: I, mode: RegCls) -> Result<Vec<Arc<ClassFactoryState>>>
    where
        I: IntoIterator<Item = Arc<ClassDescriptor>>,
    {
        let mut states = Vec::new();
        for descriptor in descriptors {
            let clsid = descriptor.clsid();
            let previous = self.local.lock().remove(&clsid);
            if let Some(previous) = previous {
                debug!("{} already advertised, revoking {:?}", clsid, previous.token());
                self.revoke_state(&previous)?;
            }

            let mode = descriptor.mode().unwrap_or(mode);
            let contexts = descriptor.contexts().without(ClassContext::INPROC);
            let factory = ComRef::new(ClassFactory::new(descriptor.clone(), self.lifetime.clone()));
            let token = self
                .environment
                .register_class_object(clsid, factory.clone(), contexts, mode)?;
            info!("advertised {} ({}) as {:?}", descriptor.name(), clsid, token);

            let state = Arc::new(ClassFactoryState {
                descriptor,
                factory,
                mode,
                token: Mutex::new(Some(token)),
            });
            self.local.lock().insert(clsid, state.clone());
            states.push(state);
        }
        Ok(states)
    }

    /// Make registrations made in suspended mode visible
    pub fn resume_local(&self) -> Result<()> {
        self.environment.resume_class_objects()
    }

    /// Withdraw a local-server registration; a second call does nothing
    pub fn revoke_local(&self, state: &Arc<ClassFactoryState>) -> Result<()> {
        {
            let mut local = self.local.lock();
            let clsid = state.descriptor.clsid();
            if local.get(&clsid).is_some_and(|current| Arc::ptr_eq(current, state)) {
                local.remove(&clsid);
            }
        }
        self.revoke_state(state)
    }

    /// Withdraw every local-server registration
    pub fn revoke_all_local(&self) -> Result<()> {
        let states: Vec<_> = self.local.lock().drain().map(|(_, state)| state).collect();
        for state in states {
            self.revoke_state(&state)?;
        }
        Ok(())
    }

    /// Current local-server registrations
    pub fn local_registrations(&self) -> Vec<Arc<ClassFactoryState>> {
        self.local.lock().values().cloned().collect()
    }

    /// Serve `descriptors` as a local server
    ///
    /// Advertises the classes, blocks until the server went idle after its
    /// first activity or `shutdown` was called, then revokes them.
    pub fn run_local<I>(&self, descriptors: I, mode: RegCls) -> Result<()>
    where
        I: IntoIterator<Item = Arc<ClassDescriptor>>,
    {
        let states = self.register_local(descriptors, mode)?;
        if states.iter().any(|s| s.mode() == RegCls::Suspended) {
            self.resume_local()?;
        }
        info!("local server running with {} classes", states.len());
        self.lifetime.wait_idle();
        info!("local server stopping");
        for state in &states {
            self.revoke_local(state)?;
        }
        Ok(())
    }

    /// Serve every class in the class table as a local server, using the
    /// configured default mode
    pub fn serve(&self) -> Result<()> {
        self.run_local(self.classes.descriptors(), self.config.default_mode)
    }

    /// Make `run_local` return
    pub fn shutdown(&self) {
        self.lifetime.request_shutdown();
    }

    fn revoke_state(&self, state: &ClassFactoryState) -> Result<()> {
        let token = state.token.lock().take();
        match token {
            Some(token) => {
                debug!("revoking {:?} for {}", token, state.descriptor.clsid());
                self.environment.revoke_class_object(token)
            }
            None => Ok(()),
        }
    }
}

/// Builder for [`ComServer`]
pub struct ComServerBuilder {
    config: ServerConfig,
    classes: Vec<ClassDescriptor>,
    environment: Option<Arc<dyn ActivationEnvironment>>,
    store: Option<Arc<dyn RegistryStore>>,
    scope: RegistrationScope,
}

impl ComServerBuilder {
    /// Create a builder with the default configuration
    pub fn new() -> Self {
        Self {
            config: ServerConfig::default(),
            classes: Vec::new(),
            environment: None,
            store: None,
            scope: RegistrationScope::Machine,
        }
    }

    /// Set the configuration
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = config;
        self
    }

    /// Add a class
    pub fn class(mut self, descriptor: ClassDescriptor) -> Self {
        self.classes.push(descriptor);
        self
    }

    /// Advertise class objects to `environment` instead of a private
    /// [`ClassObjectTable`]
    pub fn environment(mut self, environment: Arc<dyn ActivationEnvironment>) -> Self {
        self.environment = Some(environment);
        self
    }

    /// Read persisted settings from `store` instead of the platform default
    pub fn store(mut self, store: Arc<dyn RegistryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Scope persisted settings are read from
    pub fn scope(mut self, scope: RegistrationScope) -> Self {
        self.scope = scope;
        self
    }

    /// Build the server
    pub fn build(self) -> ComServer {
        let classes = Arc::new(ClassRegistry::new());
        for descriptor in self.classes {
            classes.register(descriptor);
        }
        ComServer {
            config: self.config,
            classes,
            lifetime: ServerLifetime::new(),
            environment: self
                .environment
                .unwrap_or_else(|| Arc::new(ClassObjectTable::new()) as Arc<dyn ActivationEnvironment>),
            store: self.store.unwrap_or_else(registry::default_store),
            scope: self.scope,
            factories: RwLock::new(HashMap::new()),
            local: Mutex::new(HashMap::new()),
        }
    }
}

impl Default for ComServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}
