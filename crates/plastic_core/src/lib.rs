//! Plastic dataflow engine
//!
//! Modules are built by factories from typed arguments, wired together with
//! lazily resolved references into an environment, and run in lockstep by a
//! [`ModuleNetwork`] in dependency order. Feedback is only possible through a
//! propagation-delay pair, which yields the previous tick's value.

#[macro_use]
extern crate lazy_static;

pub mod dsp;
pub mod environment;
pub mod error;
pub mod factory;
pub mod module;
pub mod name;
pub mod network;
pub mod patch;
pub mod port;
pub mod reference;
pub mod template;
pub mod types;

// Re-export commonly used items
pub use environment::Environment;
pub use error::{Error, Result};
pub use factory::{Factory, instantiate};
pub use module::{Behavior, Module, ModuleHandle, Phase};
pub use network::{ModuleNetwork, NetworkState};
pub use patch::{PatchFile, RunReport, Runnable};
pub use port::{Port, PortReader};
pub use reference::Reference;
pub use template::Template;
pub use types::{Args, PortKind, Primitive, Value, ValueType};
