//! Typed single-value cells exchanged between modules.
//!
//! A [`Port`] is held only by the module that produces it and is the only way
//! to write the cell. Every consumer gets a [`PortReader`], which shares the
//! cell but can only copy values out.

use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::module::{Module, ModuleHandle};
use crate::types::{PortKind, Primitive};

pub struct Port {
    kind: PortKind,
    cell: Arc<Mutex<Primitive>>,
    owner: Weak<Module>,
}

impl Port {
    pub(crate) fn new(kind: PortKind, owner: Weak<Module>) -> Self {
        Port {
            kind,
            cell: Arc::new(Mutex::new(kind.default_value())),
            owner,
        }
    }

    pub fn kind(&self) -> PortKind {
        self.kind
    }

    pub fn get(&self) -> Primitive {
        *self.cell.lock()
    }

    pub fn get_double(&self) -> Result<f64> {
        self.get().as_double().ok_or_else(|| Error::PortType {
            expected: PortKind::Double,
            found: self.kind.to_string(),
        })
    }

    pub fn get_bool(&self) -> Result<bool> {
        self.get().as_bool().ok_or_else(|| Error::PortType {
            expected: PortKind::Bool,
            found: self.kind.to_string(),
        })
    }

    /// Store a boxed primitive. The primitive must be of the port's kind.
    pub fn set(&self, value: Primitive) -> Result<()> {
        if value.kind() != self.kind {
            return Err(Error::PortType {
                expected: self.kind,
                found: value.kind().to_string(),
            });
        }
        *self.cell.lock() = value;
        Ok(())
    }

    /// Copy the current value of another port of the identical kind.
    pub fn set_from(&self, other: &PortReader) -> Result<()> {
        if other.kind != self.kind {
            return Err(Error::PortType {
                expected: self.kind,
                found: other.kind.to_string(),
            });
        }
        let value = *other.cell.lock();
        *self.cell.lock() = value;
        Ok(())
    }

    pub fn set_double(&self, value: f64) -> Result<()> {
        self.set(Primitive::Double(value))
    }

    pub fn set_bool(&self, value: bool) -> Result<()> {
        self.set(Primitive::Bool(value))
    }

    /// Restore the kind's default value.
    pub(crate) fn clear(&self) {
        *self.cell.lock() = self.kind.default_value();
    }

    /// A read-only handle to this port for consumers.
    pub fn reader(&self) -> PortReader {
        PortReader {
            kind: self.kind,
            cell: Arc::clone(&self.cell),
            owner: self.owner.clone(),
        }
    }
}

impl fmt::Debug for Port {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Port")
            .field("kind", &self.kind)
            .field("value", &self.get())
            .finish()
    }
}

/// Consumer side of a port: copy-out access only.
#[derive(Clone)]
pub struct PortReader {
    kind: PortKind,
    cell: Arc<Mutex<Primitive>>,
    owner: Weak<Module>,
}

impl PortReader {
    pub fn kind(&self) -> PortKind {
        self.kind
    }

    pub fn get(&self) -> Primitive {
        *self.cell.lock()
    }

    pub fn get_double(&self) -> Result<f64> {
        self.get().as_double().ok_or_else(|| Error::PortType {
            expected: PortKind::Double,
            found: self.kind.to_string(),
        })
    }

    pub fn get_bool(&self) -> Result<bool> {
        self.get().as_bool().ok_or_else(|| Error::PortType {
            expected: PortKind::Bool,
            found: self.kind.to_string(),
        })
    }

    /// The module that produces this port, if it is still alive.
    pub fn owner(&self) -> Option<ModuleHandle> {
        self.owner.upgrade()
    }

    /// Whether both handles refer to the same cell.
    pub fn same_port(&self, other: &PortReader) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell)
    }
}

impl fmt::Debug for PortReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortReader")
            .field("kind", &self.kind)
            .field("value", &self.get())
            .finish()
    }
}
