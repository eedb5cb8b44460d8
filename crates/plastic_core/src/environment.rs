//! Append-only name -> value namespaces.
//!
//! The root environment of a run holds the built-in factories and every
//! declared module. Child environments are point-in-time copies of their
//! parent; later bindings in the parent are not visible through the child.

use std::fmt;
use std::sync::{Arc, Weak};

use indexmap::IndexMap;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::factory::Factory;
use crate::name::Name;
use crate::reference::Reference;
use crate::types::{Value, ValueType};

type Bindings = IndexMap<Name, Value>;

/// A shared handle to one namespace. Cloning the handle does not copy the
/// bindings; use [`make_child`](Environment::make_child) for that.
#[derive(Clone, Default)]
pub struct Environment {
    bindings: Arc<RwLock<Bindings>>,
}

impl Environment {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind `name` to `value`. A name can only be bound once.
    pub fn bind(&self, name: &str, value: impl Into<Value>) -> Result<()> {
        let name = Name::new(name);
        let value = value.into();
        let mut bindings = self.bindings.write();
        if bindings.contains_key(&name) {
            return Err(Error::AlreadyBound {
                name: name.to_string(),
            });
        }
        if let Value::Module(module) = &value {
            module.label(&name);
        }
        tracing::trace!(name = %name, value = ?value, "bind");
        bindings.insert(name, value);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<Value> {
        self.bindings
            .read()
            .get(&Name::new(name))
            .cloned()
            .ok_or_else(|| Error::Unbound {
                name: name.to_string(),
            })
    }

    pub fn is_bound(&self, name: &str) -> bool {
        self.bindings.read().contains_key(&Name::new(name))
    }

    /// Look up a factory by name.
    pub fn factory(&self, name: &str) -> Result<Arc<dyn Factory>> {
        match self.get(name)? {
            Value::Factory(factory) => Ok(factory),
            other => Err(Error::ReferenceType {
                path: name.to_string(),
                expected: ValueType::Factory,
                found: other.value_type(),
            }),
        }
    }

    /// A snapshot of the current bindings. The child never observes later
    /// bindings made in `self`, and vice versa.
    pub fn make_child(&self) -> Environment {
        Environment {
            bindings: Arc::new(RwLock::new(self.bindings.read().clone())),
        }
    }

    /// Bound names, in binding order.
    pub fn names(&self) -> Vec<Name> {
        self.bindings.read().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.bindings.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.read().is_empty()
    }

    /// An unrestricted reference to `name` in this environment.
    pub fn reference(&self, name: &str) -> Reference {
        Reference::name(self, name)
    }

    pub(crate) fn downgrade(&self) -> WeakEnvironment {
        WeakEnvironment(Arc::downgrade(&self.bindings))
    }
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Environment")
            .field("names", &self.names())
            .finish()
    }
}

/// Non-owning environment handle held by references, so that modules stored
/// in an environment do not keep it alive through their own arguments.
#[derive(Clone)]
pub struct WeakEnvironment(Weak<RwLock<Bindings>>);

impl WeakEnvironment {
    pub(crate) fn upgrade(&self) -> Option<Environment> {
        self.0.upgrade().map(|bindings| Environment { bindings })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_then_get() {
        let env = Environment::new();
        env.bind("x", 1.5).unwrap();
        assert!(env.is_bound("x"));
        assert!(matches!(env.get("x").unwrap(), Value::Double(v) if v == 1.5));
    }

    #[test]
    fn rebinding_fails_even_with_equal_value() {
        let env = Environment::new();
        env.bind("x", 1i64).unwrap();
        assert!(matches!(env.bind("x", 1i64), Err(Error::AlreadyBound { name }) if name == "x"));
        assert!(env.bind("x", 2i64).is_err());
    }

    #[test]
    fn unbound_lookup_fails() {
        let env = Environment::new();
        assert!(!env.is_bound("nope"));
        assert!(matches!(env.get("nope"), Err(Error::Unbound { name }) if name == "nope"));
    }

    #[test]
    fn child_is_isolated_from_later_parent_bindings() {
        let parent = Environment::new();
        parent.bind("before", true).unwrap();
        let child = parent.make_child();
        parent.bind("after", true).unwrap();

        assert!(child.get("before").is_ok());
        assert!(child.get("after").is_err());

        child.bind("local", 1i64).unwrap();
        assert!(!parent.is_bound("local"));
    }

    #[test]
    fn names_preserve_binding_order() {
        let env = Environment::new();
        for name in ["c", "a", "b"] {
            env.bind(name, 0i64).unwrap();
        }
        let names: Vec<_> = env.names().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, ["c", "a", "b"]);
    }

    #[test]
    fn factory_lookup_checks_type() {
        let env = Environment::new();
        env.bind("x", 1.0).unwrap();
        assert!(matches!(
            env.factory("x"),
            Err(Error::ReferenceType { expected: ValueType::Factory, .. })
        ));
    }
}
