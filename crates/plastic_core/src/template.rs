//! Ordered schemas of named, typed fields.
//!
//! A factory has a base template describing the arguments it accepts; each
//! module has a full template describing every field it exposes. Full
//! templates are derived from base ones with [`Template::with_more`].

use std::fmt;

use crate::error::{Error, Result};
use crate::name::Name;
use crate::types::{Args, ValueType};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Template {
    names: Vec<Name>,
    types: Vec<ValueType>,
}

impl Template {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build a template from `(name, type)` pairs. Fails on duplicate names.
    pub fn new<N: Into<Name>>(fields: impl IntoIterator<Item = (N, ValueType)>) -> Result<Self> {
        Template::empty().with_more(fields)
    }

    pub fn count(&self) -> usize {
        self.names.len()
    }

    pub fn name_at(&self, index: usize) -> Option<&Name> {
        self.names.get(index)
    }

    pub fn type_at(&self, index: usize) -> Option<ValueType> {
        self.types.get(index).copied()
    }

    pub fn index_of(&self, name: &str) -> Result<usize> {
        let name = Name::new(name);
        self.names
            .iter()
            .position(|n| *n == name)
            .ok_or_else(|| Error::NoSuchField {
                name: name.to_string(),
            })
    }

    pub fn type_of(&self, name: &str) -> Option<ValueType> {
        self.index_of(name).ok().and_then(|i| self.type_at(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, ValueType)> {
        self.names.iter().zip(self.types.iter().copied())
    }

    /// Every field of the template must be present in `args` with a matching
    /// type. Extra arguments are ignored.
    pub fn check_args_allow_extras(&self, factory: &str, args: &Args) -> Result<()> {
        for (name, ty) in self.iter() {
            let value = args.get(name.as_str()).ok_or_else(|| Error::MissingArgument {
                factory: factory.to_string(),
                field: name.to_string(),
            })?;
            if !ty.accepts(value) {
                return Err(Error::ArgumentType {
                    factory: factory.to_string(),
                    field: name.to_string(),
                    expected: ty,
                    found: value.value_type().to_string(),
                });
            }
        }
        Ok(())
    }

    /// Like [`check_args_allow_extras`](Self::check_args_allow_extras), and the
    /// argument count must match exactly.
    pub fn check_args_no_extras(&self, factory: &str, args: &Args) -> Result<()> {
        self.check_args_allow_extras(factory, args)?;
        if args.len() != self.count() {
            return Err(Error::ArgumentCount {
                factory: factory.to_string(),
                expected: self.count(),
                found: args.len(),
            });
        }
        Ok(())
    }

    /// A new template with `fields` appended.
    pub fn with_more<N: Into<Name>>(
        &self,
        fields: impl IntoIterator<Item = (N, ValueType)>,
    ) -> Result<Template> {
        let mut template = self.clone();
        for (name, ty) in fields {
            let name = name.into();
            // Names are interned, so this compares pointers.
            if template.names.iter().any(|n| *n == name) {
                return Err(Error::DuplicateField {
                    name: name.to_string(),
                });
            }
            template.names.push(name);
            template.types.push(ty);
        }
        Ok(template)
    }

    /// A new template with every port-typed field removed.
    pub fn without_port_fields(&self) -> Template {
        let (names, types) = self
            .iter()
            .filter(|(_, ty)| !ty.is_port())
            .map(|(name, ty)| (name.clone(), ty))
            .unzip();
        Template { names, types }
    }
}

impl fmt::Display for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("{")?;
        for (i, (name, ty)) in self.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{name}: {ty}")?;
        }
        f.write_str("}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PortKind;

    fn sum_template() -> Template {
        Template::new([
            ("count", ValueType::Int),
            ("in_0", ValueType::Port(PortKind::Double)),
            ("in_1", ValueType::Port(PortKind::Double)),
            ("out", ValueType::Port(PortKind::Double)),
        ])
        .unwrap()
    }

    #[test]
    fn duplicate_names_fail() {
        let result = Template::new([("a", ValueType::Int), ("b", ValueType::Int), ("a", ValueType::Bool)]);
        assert!(matches!(result, Err(Error::DuplicateField { name }) if name == "a"));
    }

    #[test]
    fn index_of_returns_original_position() {
        let names = ["v0", "v1", "wavelength", "phase", "out"];
        let template = Template::new(names.iter().map(|n| (*n, ValueType::Double))).unwrap();
        for (i, name) in names.iter().enumerate() {
            assert_eq!(template.index_of(name).unwrap(), i);
            assert_eq!(template.name_at(i).unwrap().as_str(), *name);
        }
        assert!(matches!(template.index_of("missing"), Err(Error::NoSuchField { .. })));
        assert_eq!(template.name_at(names.len()), None);
    }

    #[test]
    fn with_more_appends_without_mutating() {
        let base = Template::new([("count", ValueType::Int)]).unwrap();
        let full = base.with_more([("out", ValueType::Port(PortKind::Double))]).unwrap();
        assert_eq!(base.count(), 1);
        assert_eq!(full.count(), 2);
        assert_eq!(full.type_at(1), Some(ValueType::Port(PortKind::Double)));
        assert!(full.with_more([("count", ValueType::Int)]).is_err());
    }

    #[test]
    fn without_port_fields_keeps_configuration() {
        let config = sum_template().without_port_fields();
        assert_eq!(config.count(), 1);
        assert_eq!(config.name_at(0).unwrap().as_str(), "count");
    }

    #[test]
    fn allow_extras_ignores_unknown_keys() {
        let template = Template::new([("value", ValueType::Double)]).unwrap();
        let args = Args::new().with("value", 1.0).with("extra", true);
        template.check_args_allow_extras("Const", &args).unwrap();
        assert!(matches!(
            template.check_args_no_extras("Const", &args),
            Err(Error::ArgumentCount { expected: 1, found: 2, .. })
        ));
    }

    #[test]
    fn missing_and_mistyped_arguments_fail() {
        let template = Template::new([("value", ValueType::Double)]).unwrap();
        assert!(matches!(
            template.check_args_allow_extras("Const", &Args::new()),
            Err(Error::MissingArgument { field, .. }) if field == "value"
        ));
        assert!(matches!(
            template.check_args_no_extras("Const", &Args::new().with("value", 3i64)),
            Err(Error::ArgumentType { expected: ValueType::Double, .. })
        ));
    }

    #[test]
    fn display_lists_fields() {
        let template = Template::new([("count", ValueType::Int), ("type", ValueType::Kind)]).unwrap();
        assert_eq!(template.to_string(), "{count: Int, type: Kind}");
    }
}
