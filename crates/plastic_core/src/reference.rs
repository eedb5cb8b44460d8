//! Lazily resolved symbolic pointers into an environment.
//!
//! A reference can be created before the name it points at is bound. It is
//! only resolved when it is used, typically when the network is built, so
//! declarations may appear in any order.

use std::fmt;

use crate::environment::{Environment, WeakEnvironment};
use crate::error::{Error, Result};
use crate::module::ModuleHandle;
use crate::name::Name;
use crate::types::{Value, ValueType};

/// Longest reference-to-reference chain followed before giving up.
const MAX_DEPTH: usize = 64;

#[derive(Clone)]
pub enum Reference {
    /// A name bound in an environment.
    Name {
        env: WeakEnvironment,
        name: Name,
        ty: ValueType,
    },
    /// A named field of the module another reference resolves to.
    Field {
        module: Box<Reference>,
        field: Name,
        ty: ValueType,
    },
}

impl Reference {
    pub fn name(env: &Environment, name: &str) -> Self {
        Reference::Name {
            env: env.downgrade(),
            name: Name::new(name),
            ty: ValueType::Any,
        }
    }

    pub fn field(module: Reference, field: &str) -> Self {
        Reference::Field {
            module: Box::new(module.with_type(ValueType::Any)),
            field: Name::new(field),
            ty: ValueType::Any,
        }
    }

    /// Parse a dotted path: `osc` is a name reference, `osc.out` a field
    /// reference on it.
    pub fn parse(env: &Environment, path: &str) -> Result<Self> {
        let mut parts = path.split('.');
        let head = parts.next().filter(|p| !p.is_empty()).ok_or_else(|| Error::Patch {
            message: format!("empty reference `{path}`"),
        })?;
        let mut reference = Reference::name(env, head);
        for field in parts {
            if field.is_empty() {
                return Err(Error::Patch {
                    message: format!("empty field in reference `{path}`"),
                });
            }
            reference = Reference::field(reference, field);
        }
        Ok(reference)
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            Reference::Name { ty, .. } | Reference::Field { ty, .. } => *ty,
        }
    }

    /// A copy of this reference restricted to `ty`. `self` is unchanged.
    pub fn with_type(&self, ty: ValueType) -> Reference {
        let mut narrowed = self.clone();
        match &mut narrowed {
            Reference::Name { ty: t, .. } | Reference::Field { ty: t, .. } => *t = ty,
        }
        narrowed
    }

    /// The symbolic path, e.g. `osc.out`.
    pub fn path(&self) -> String {
        match self {
            Reference::Name { name, .. } => name.to_string(),
            Reference::Field { module, field, .. } => format!("{}.{}", module.path(), field),
        }
    }

    pub fn resolve(&self) -> Result<Value> {
        self.resolve_at(0).map_err(|e| e.in_path(&self.path()))
    }

    /// Resolve to a module, failing if the target is anything else.
    pub fn resolve_module(&self) -> Result<ModuleHandle> {
        match self.with_type(ValueType::Module).resolve()? {
            Value::Module(module) => Ok(module),
            _ => Err(Error::NotAModule { path: self.path() }),
        }
    }

    fn resolve_at(&self, depth: usize) -> Result<Value> {
        if depth > MAX_DEPTH {
            return Err(Error::ReferenceDepth { path: self.path() });
        }
        let value = match self {
            Reference::Name { env, name, .. } => {
                let env = env.upgrade().ok_or_else(|| Error::DetachedReference {
                    path: self.path(),
                })?;
                env.get(name.as_str())?
            }
            Reference::Field { module, field, .. } => {
                let target = module.resolve_at(depth + 1)?;
                let Value::Module(target) = target else {
                    return Err(Error::NotAModule {
                        path: module.path(),
                    });
                };
                target.field(field.as_str())?
            }
        };
        // Follow reference-to-reference chains.
        let value = match value {
            Value::Reference(next) => next.resolve_at(depth + 1)?,
            other => other,
        };
        let expected = self.value_type();
        if !expected.accepts(&value) {
            return Err(Error::ReferenceType {
                path: self.path(),
                expected,
                found: value.value_type(),
            });
        }
        Ok(value)
    }
}

impl fmt::Debug for Reference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}: {}", self.path(), self.value_type())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_before_binding_fails_and_after_succeeds() {
        let env = Environment::new();
        let r = env.reference("x");
        assert!(r.resolve().is_err());
        env.bind("x", 2.0).unwrap();
        assert!(matches!(r.resolve().unwrap(), Value::Double(v) if v == 2.0));
    }

    #[test]
    fn narrowing_is_non_destructive() {
        let env = Environment::new();
        env.bind("x", 1i64).unwrap();
        let r = env.reference("x");

        let as_double = r.with_type(ValueType::Double);
        assert!(matches!(
            as_double.resolve(),
            Err(Error::ReferenceType { expected: ValueType::Double, found: ValueType::Int, .. })
        ));
        assert!(r.with_type(ValueType::Int).resolve().is_ok());

        assert_eq!(r.value_type(), ValueType::Any);
        assert!(r.resolve().is_ok());
    }

    #[test]
    fn chains_are_followed() {
        let env = Environment::new();
        env.bind("alias", env.reference("target")).unwrap();
        env.bind("target", true).unwrap();
        let r = env.reference("alias").with_type(ValueType::Bool);
        assert!(matches!(r.resolve().unwrap(), Value::Bool(true)));
    }

    #[test]
    fn self_referential_chain_is_bounded() {
        let env = Environment::new();
        env.bind("loop", env.reference("loop")).unwrap();
        assert!(matches!(
            env.reference("loop").resolve(),
            Err(Error::ReferenceDepth { .. })
        ));
    }

    #[test]
    fn field_of_non_module_fails() {
        let env = Environment::new();
        env.bind("x", 1.0).unwrap();
        let r = Reference::parse(&env, "x.out").unwrap();
        assert_eq!(r.path(), "x.out");
        assert!(matches!(r.resolve(), Err(Error::NotAModule { path }) if path == "x"));
    }

    #[test]
    fn unbound_name_is_wrapped_with_path() {
        let env = Environment::new();
        let r = Reference::parse(&env, "osc.out").unwrap();
        match r.resolve() {
            Err(Error::Resolve { path, source }) => {
                assert_eq!(path, "osc.out");
                assert!(matches!(*source, Error::Unbound { .. }));
            }
            other => panic!("expected Resolve, got {other:?}"),
        }
    }

    #[test]
    fn dropped_environment_detaches() {
        let r = {
            let env = Environment::new();
            env.bind("x", 1.0).unwrap();
            env.reference("x")
        };
        assert!(matches!(r.resolve(), Err(Error::DetachedReference { .. })));
    }

    #[test]
    fn parse_rejects_empty_segments() {
        let env = Environment::new();
        assert!(Reference::parse(&env, "").is_err());
        assert!(Reference::parse(&env, "a..b").is_err());
    }
}
