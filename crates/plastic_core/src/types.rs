//! Value model shared by templates, environments, references and ports.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::factory::Factory;
use crate::module::ModuleHandle;
use crate::name::Name;
use crate::port::PortReader;
use crate::reference::Reference;

/// The kinds of value a port can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PortKind {
    Double,
    Bool,
}

impl PortKind {
    pub fn default_value(self) -> Primitive {
        match self {
            PortKind::Double => Primitive::Double(0.0),
            PortKind::Bool => Primitive::Bool(false),
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Double" => Some(PortKind::Double),
            "Bool" => Some(PortKind::Bool),
            _ => None,
        }
    }

    /// The scalar argument type holding a value of this kind.
    pub fn scalar_type(self) -> ValueType {
        match self {
            PortKind::Double => ValueType::Double,
            PortKind::Bool => ValueType::Bool,
        }
    }
}

impl fmt::Display for PortKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortKind::Double => f.write_str("Double"),
            PortKind::Bool => f.write_str("Bool"),
        }
    }
}

/// A single value held by a port.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Primitive {
    Double(f64),
    Bool(bool),
}

impl Primitive {
    pub fn kind(&self) -> PortKind {
        match self {
            Primitive::Double(_) => PortKind::Double,
            Primitive::Bool(_) => PortKind::Bool,
        }
    }

    pub fn as_double(&self) -> Option<f64> {
        match self {
            Primitive::Double(v) => Some(*v),
            Primitive::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Primitive::Bool(v) => Some(*v),
            Primitive::Double(_) => None,
        }
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Primitive::Double(v) => write!(f, "{v}"),
            Primitive::Bool(v) => write!(f, "{v}"),
        }
    }
}

impl From<f64> for Primitive {
    fn from(value: f64) -> Self {
        Primitive::Double(value)
    }
}

impl From<bool> for Primitive {
    fn from(value: bool) -> Self {
        Primitive::Bool(value)
    }
}

/// Type restriction carried by template entries and references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    Any,
    Double,
    Int,
    Bool,
    Str,
    /// A port kind, used for arguments like `type = Double`.
    Kind,
    Port(PortKind),
    Module,
    Factory,
}

impl ValueType {
    pub fn is_port(&self) -> bool {
        matches!(self, ValueType::Port(_))
    }

    /// Whether `value` may fill a slot of this type.
    ///
    /// An unresolved reference is accepted when its own restriction is
    /// compatible; it gets narrowed to this type when it is eventually used.
    pub fn accepts(&self, value: &Value) -> bool {
        if *self == ValueType::Any {
            return true;
        }
        match value {
            Value::Reference(r) => {
                let declared = r.value_type();
                declared == ValueType::Any || declared == *self
            }
            other => other.value_type() == *self,
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueType::Any => f.write_str("Any"),
            ValueType::Double => f.write_str("Double"),
            ValueType::Int => f.write_str("Int"),
            ValueType::Bool => f.write_str("Bool"),
            ValueType::Str => f.write_str("Str"),
            ValueType::Kind => f.write_str("Kind"),
            ValueType::Port(kind) => write!(f, "Port<{kind}>"),
            ValueType::Module => f.write_str("Module"),
            ValueType::Factory => f.write_str("Factory"),
        }
    }
}

/// Anything that can be bound in an environment or passed as an argument.
#[derive(Clone)]
pub enum Value {
    Double(f64),
    Int(i64),
    Bool(bool),
    Str(String),
    Kind(PortKind),
    Port(PortReader),
    Module(ModuleHandle),
    Factory(Arc<dyn Factory>),
    Reference(Reference),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Double(_) => ValueType::Double,
            Value::Int(_) => ValueType::Int,
            Value::Bool(_) => ValueType::Bool,
            Value::Str(_) => ValueType::Str,
            Value::Kind(_) => ValueType::Kind,
            Value::Port(port) => ValueType::Port(port.kind()),
            Value::Module(_) => ValueType::Module,
            Value::Factory(_) => ValueType::Factory,
            Value::Reference(r) => r.value_type(),
        }
    }

    pub fn as_module(&self) -> Option<&ModuleHandle> {
        match self {
            Value::Module(m) => Some(m),
            _ => None,
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Double(v) => f.debug_tuple("Double").field(v).finish(),
            Value::Int(v) => f.debug_tuple("Int").field(v).finish(),
            Value::Bool(v) => f.debug_tuple("Bool").field(v).finish(),
            Value::Str(v) => f.debug_tuple("Str").field(v).finish(),
            Value::Kind(v) => f.debug_tuple("Kind").field(v).finish(),
            Value::Port(p) => f.debug_tuple("Port").field(&p.kind()).finish(),
            Value::Module(m) => f.debug_tuple("Module").field(&m.name()).finish(),
            Value::Factory(factory) => f.debug_tuple("Factory").field(&factory.name()).finish(),
            Value::Reference(r) => f.debug_tuple("Reference").field(r).finish(),
        }
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Double(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<PortKind> for Value {
    fn from(value: PortKind) -> Self {
        Value::Kind(value)
    }
}

impl From<PortReader> for Value {
    fn from(value: PortReader) -> Self {
        Value::Port(value)
    }
}

impl From<ModuleHandle> for Value {
    fn from(value: ModuleHandle) -> Self {
        Value::Module(value)
    }
}

impl From<Arc<dyn Factory>> for Value {
    fn from(value: Arc<dyn Factory>) -> Self {
        Value::Factory(value)
    }
}

impl From<Reference> for Value {
    fn from(value: Reference) -> Self {
        Value::Reference(value)
    }
}

/// Named arguments passed to a factory, in insertion order.
#[derive(Clone, Debug, Default)]
pub struct Args {
    entries: IndexMap<Name, Value>,
}

impl Args {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert(&mut self, name: &str, value: impl Into<Value>) -> Option<Value> {
        self.entries.insert(Name::new(name), value.into())
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.entries.get(&Name::new(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(&Name::new(name))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Name, &Value)> {
        self.entries.iter()
    }

    fn require(&self, factory: &str, field: &str) -> Result<&Value> {
        self.get(field).ok_or_else(|| Error::MissingArgument {
            factory: factory.to_string(),
            field: field.to_string(),
        })
    }

    fn mismatch(factory: &str, field: &str, expected: ValueType, found: &Value) -> Error {
        Error::ArgumentType {
            factory: factory.to_string(),
            field: field.to_string(),
            expected,
            found: found.value_type().to_string(),
        }
    }

    pub fn double(&self, factory: &str, field: &str) -> Result<f64> {
        match self.require(factory, field)? {
            Value::Double(v) => Ok(*v),
            other => Err(Self::mismatch(factory, field, ValueType::Double, other)),
        }
    }

    pub fn int(&self, factory: &str, field: &str) -> Result<i64> {
        match self.require(factory, field)? {
            Value::Int(v) => Ok(*v),
            other => Err(Self::mismatch(factory, field, ValueType::Int, other)),
        }
    }

    pub fn boolean(&self, factory: &str, field: &str) -> Result<bool> {
        match self.require(factory, field)? {
            Value::Bool(v) => Ok(*v),
            other => Err(Self::mismatch(factory, field, ValueType::Bool, other)),
        }
    }

    pub fn kind(&self, factory: &str, field: &str) -> Result<PortKind> {
        match self.require(factory, field)? {
            Value::Kind(v) => Ok(*v),
            other => Err(Self::mismatch(factory, field, ValueType::Kind, other)),
        }
    }

    /// Read a scalar of the given port kind, e.g. an initial value.
    pub fn primitive(&self, factory: &str, field: &str, kind: PortKind) -> Result<Primitive> {
        match kind {
            PortKind::Double => self.double(factory, field).map(Primitive::Double),
            PortKind::Bool => self.boolean(factory, field).map(Primitive::Bool),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_matching_scalars_only() {
        assert!(ValueType::Double.accepts(&Value::Double(1.0)));
        assert!(!ValueType::Double.accepts(&Value::Int(1)));
        assert!(!ValueType::Int.accepts(&Value::Double(1.0)));
        assert!(ValueType::Any.accepts(&Value::Str("x".into())));
    }

    #[test]
    fn args_typed_getters() {
        let args = Args::new()
            .with("count", 2i64)
            .with("value", 0.5)
            .with("type", PortKind::Bool);
        assert_eq!(args.int("Sum", "count").unwrap(), 2);
        assert_eq!(args.double("Const", "value").unwrap(), 0.5);
        assert_eq!(args.kind("Null", "type").unwrap(), PortKind::Bool);
        assert_eq!(args.len(), 3);
    }

    #[test]
    fn args_getter_reports_factory_and_field() {
        let args = Args::new().with("count", 1.5);
        match args.int("Sum", "count") {
            Err(Error::ArgumentType {
                factory,
                field,
                expected,
                found,
            }) => {
                assert_eq!(factory, "Sum");
                assert_eq!(field, "count");
                assert_eq!(expected, ValueType::Int);
                assert_eq!(found, "Double");
            }
            other => panic!("expected ArgumentType, got {other:?}"),
        }
        assert!(matches!(
            args.double("Const", "value"),
            Err(Error::MissingArgument { .. })
        ));
    }

    #[test]
    fn port_kind_round_trips_through_text() {
        for kind in [PortKind::Double, PortKind::Bool] {
            assert_eq!(PortKind::parse(&kind.to_string()), Some(kind));
        }
        assert_eq!(PortKind::parse("Float"), None);
    }

    #[test]
    fn primitive_accessors() {
        assert_eq!(Primitive::Double(2.0).as_double(), Some(2.0));
        assert_eq!(Primitive::Double(2.0).as_bool(), None);
        assert_eq!(Primitive::Bool(true).kind(), PortKind::Bool);
    }
}
