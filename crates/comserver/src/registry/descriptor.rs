//! Class descriptors: everything needed to construct and advertise a class

use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;
use crate::activation::RegCls;
use crate::object::{ComObject, ComRef};
use crate::types::{Clsid, Guid, Result};

/// Constructor producing a new instance; receives the controlling outer
/// object when the class is created as part of an aggregate
pub type Constructor = Arc<dyn Fn(Option<&ComRef>) -> Result<Box<dyn ComObject>> + Send + Sync>;

/// Set of activation contexts (CLSCTX flags)
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ClassContext(u32);

impl ClassContext {
    /// No context
    pub const NONE: ClassContext = ClassContext(0);
    /// Loaded into the caller's process
    pub const INPROC_SERVER: ClassContext = ClassContext(0x1);
    /// In-process handler
    pub const INPROC_HANDLER: ClassContext = ClassContext(0x2);
    /// Separate server process on the same machine
    pub const LOCAL_SERVER: ClassContext = ClassContext(0x4);
    /// Both in-process flavours
    pub const INPROC: ClassContext = ClassContext(0x3);

    /// Raw flag bits
    pub fn bits(self) -> u32 {
        self.0
    }

    /// Check whether every flag of `other` is set
    pub fn contains(self, other: ClassContext) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    /// These flags with `other`'s cleared
    pub fn without(self, other: ClassContext) -> ClassContext {
        ClassContext(self.0 & !other.0)
    }
}

impl BitOr for ClassContext {
    type Output = ClassContext;

    fn bitor(self, rhs: ClassContext) -> ClassContext {
        ClassContext(self.0 | rhs.0)
    }
}

impl fmt::Debug for ClassContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CLSCTX(0x{:x})", self.0)
    }
}

/// Threading model declared for in-process activation
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ThreadingModel {
    /// Single-threaded apartment
    Single,
    /// Multi-threaded apartment
    Multi,
    /// Either apartment type
    Both,
    /// Neutral apartment
    Neutral,
}

impl ThreadingModel {
    /// Registry spelling
    pub fn as_str(&self) -> &'static str {
        match self {
            ThreadingModel::Single => "Apartment",
            ThreadingModel::Multi => "Free",
            ThreadingModel::Both => "Both",
            ThreadingModel::Neutral => "Neutral",
        }
    }
}

/// Type library reference: (library id, major version, minor version)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TypeLibRef {
    /// Library id
    pub libid: Guid,
    /// Major version
    pub major: u16,
    /// Minor version
    pub minor: u16,
}

/// Constructible class
///
/// Immutable once registered; shared read-only by the class table and every
/// factory serving the class.
#[derive(Clone)]
pub struct ClassDescriptor {
    clsid: Clsid,
    name: String,
    description: Option<String>,
    progid: Option<String>,
    version_independent_progid: Option<String>,
    contexts: ClassContext,
    threading: Option<ThreadingModel>,
    typelib: Option<TypeLibRef>,
    aggregatable: bool,
    mode: Option<RegCls>,
    constructor: Constructor,
}

impl ClassDescriptor {
    /// Describe class `name` identified by `clsid`
    ///
    /// Defaults: local-server context only, no prog-ids, no threading model,
    /// no aggregation.
    pub fn new<F>(clsid: Clsid, name: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(Option<&ComRef>) -> Result<Box<dyn ComObject>> + Send + Sync + 'static,
    {
        Self {
            clsid,
            name: name.into(),
            description: None,
            progid: None,
            version_independent_progid: None,
            contexts: ClassContext::LOCAL_SERVER,
            threading: None,
            typelib: None,
            aggregatable: false,
            mode: None,
            constructor: Arc::new(constructor),
        }
    }

    /// Describe a class whose instances are built with `Default`
    pub fn of<T: ComObject + Default>(clsid: Clsid, name: impl Into<String>) -> Self {
        Self::new(clsid, name, |_| Ok(Box::new(T::default()) as Box<dyn ComObject>))
    }

    /// Set the description
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Set the versioned prog-id, e.g. `Server.Object.1`
    pub fn with_progid(mut self, progid: impl Into<String>) -> Self {
        self.progid = Some(progid.into());
        self
    }

    /// Set the version-independent prog-id, e.g. `Server.Object`
    pub fn with_version_independent_progid(mut self, progid: impl Into<String>) -> Self {
        self.version_independent_progid = Some(progid.into());
        self
    }

    /// Set the activation contexts
    pub fn with_contexts(mut self, contexts: ClassContext) -> Self {
        self.contexts = contexts;
        self
    }

    /// Declare a threading model
    pub fn with_threading(mut self, model: ThreadingModel) -> Self {
        self.threading = Some(model);
        self
    }

    /// Declare a type library
    pub fn with_typelib(mut self, libid: Guid, major: u16, minor: u16) -> Self {
        self.typelib = Some(TypeLibRef { libid, major, minor });
        self
    }

    /// Allow creation as part of an aggregate
    pub fn with_aggregation(mut self, aggregatable: bool) -> Self {
        self.aggregatable = aggregatable;
        self
    }

    /// Activation mode used when advertising the class
    pub fn with_mode(mut self, mode: RegCls) -> Self {
        self.mode = Some(mode);
        self
    }

    /// Class id
    pub fn clsid(&self) -> Clsid {
        self.clsid
    }

    /// Implementation class name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Explicit description
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Versioned prog-id
    pub fn progid(&self) -> Option<&str> {
        self.progid.as_deref()
    }

    /// Version-independent prog-id
    pub fn version_independent_progid(&self) -> Option<&str> {
        self.version_independent_progid.as_deref()
    }

    /// Activation contexts
    pub fn contexts(&self) -> ClassContext {
        self.contexts
    }

    /// Threading model
    pub fn threading(&self) -> Option<ThreadingModel> {
        self.threading
    }

    /// Type library
    pub fn typelib(&self) -> Option<TypeLibRef> {
        self.typelib
    }

    /// Whether the class may be aggregated
    pub fn aggregatable(&self) -> bool {
        self.aggregatable
    }

    /// Declared activation mode
    pub fn mode(&self) -> Option<RegCls> {
        self.mode
    }

    /// Run the constructor
    pub fn construct(&self, outer: Option<&ComRef>) -> Result<Box<dyn ComObject>> {
        (self.constructor)(outer)
    }
}

impl fmt::Debug for ClassDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassDescriptor")
            .field("clsid", &self.clsid)
            .field("name", &self.name)
            .field("progid", &self.progid)
            .field("contexts", &self.contexts)
            .field("threading", &self.threading)
            .finish()
    }
}
