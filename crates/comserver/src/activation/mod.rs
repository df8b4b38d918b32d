//! Object activation
//!
//! - Server lifetime: lock and live-object counters deciding unload
//! - Class factory: IClassFactory over a class descriptor
//! - Activation environment: where class objects are advertised

mod environment;
mod factory;
mod lifetime;

pub use environment::*;
pub use factory::ClassFactory;
pub use lifetime::{LiveObjectGuard, ServerLifetime};
