//! Executable graph nodes.
//!
//! A [`Module`] is a generic harness: it owns the field table computed from
//! its factory's object template and drives a per-kind [`Behavior`] through
//! the bind -> tick* -> reset lifecycle.
//!
//! Fields are laid out from the object template:
//! - a port-typed field with a matching argument is an input (the argument is
//!   a reference to, or a reader of, another module's output);
//! - a port-typed field without an argument is an output owned by this module;
//! - a module-typed field is a link to another module;
//! - anything else is configuration copied from the arguments.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::factory::Factory;
use crate::name::Name;
use crate::port::{Port, PortReader};
use crate::template::Template;
use crate::types::{Args, PortKind, Primitive, Value, ValueType};

pub type ModuleHandle = Arc<Module>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModuleId(Uuid);

impl ModuleId {
    fn new() -> Self {
        ModuleId(Uuid::new_v4())
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Just constructed or reset: outputs exist, inputs are unresolved.
    Unbound,
    /// Inputs resolved; ready to tick.
    Bound,
    /// A tick failed. Only `reset` is accepted.
    Broken,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Unbound => f.write_str("unbound"),
            Phase::Bound => f.write_str("bound"),
            Phase::Broken => f.write_str("broken"),
        }
    }
}

/// Per-kind module behavior driven by the [`Module`] harness.
pub trait Behavior: Send + 'static {
    /// Called once the harness has resolved every input port.
    fn bind(&mut self, _ctx: &BindContext<'_>) -> Result<()> {
        Ok(())
    }

    /// Produce one unit of output from the current inputs and internal state.
    fn tick(&mut self, io: &mut TickIo<'_>) -> Result<()>;

    /// Release resources and return to the just-constructed state.
    fn reset(&mut self) {}

    fn as_any(&self) -> &dyn Any;
}

#[derive(Debug)]
enum Field {
    Input { kind: PortKind, source: Value },
    /// Index into `Module::ports`.
    Output(usize),
    Link(Value),
    Config(Value),
}

/// An edge found while collecting a network.
#[derive(Debug, Clone)]
pub enum Dependency {
    /// One of this module's inputs reads an output of the target, so the
    /// target must tick first.
    Port(ModuleHandle),
    /// A module-typed field names the target. The target belongs to the
    /// network but imposes no ordering; propagation-delay pairs rely on this.
    Unordered(ModuleHandle),
}

impl Dependency {
    pub fn module(&self) -> &ModuleHandle {
        match self {
            Dependency::Port(m) | Dependency::Unordered(m) => m,
        }
    }
}

struct State {
    phase: Phase,
    inputs: Vec<Option<PortReader>>,
    behavior: Box<dyn Behavior>,
}

pub struct Module {
    id: ModuleId,
    label: RwLock<Option<Name>>,
    factory: Arc<dyn Factory>,
    args: Args,
    template: Arc<Template>,
    fields: Vec<Field>,
    /// Field indices of inputs, in template order.
    inputs: Vec<usize>,
    /// Field indices of links, in template order.
    links: Vec<usize>,
    ports: Vec<Port>,
    state: Mutex<State>,
}

impl Module {
    /// Lay out a module's fields from `template` and `args` and wrap
    /// `behavior` in a fresh, unbound harness.
    pub fn build(
        factory: Arc<dyn Factory>,
        args: Args,
        template: Arc<Template>,
        behavior: impl Behavior,
    ) -> Result<ModuleHandle> {
        enum Plan {
            Input(PortKind, Value),
            Output(PortKind),
            Link(Value),
            Config(Value),
        }

        let mut plan = Vec::with_capacity(template.count());
        for (name, ty) in template.iter() {
            let entry = match (ty, args.get(name.as_str()).cloned()) {
                (ValueType::Port(kind), Some(source)) => Plan::Input(kind, source),
                (ValueType::Port(kind), None) => Plan::Output(kind),
                (ValueType::Module, Some(source)) => Plan::Link(source),
                (_, Some(value)) => Plan::Config(value),
                (_, None) => {
                    return Err(Error::MissingArgument {
                        factory: factory.name().to_string(),
                        field: name.to_string(),
                    });
                }
            };
            plan.push(entry);
        }

        let module = Arc::new_cyclic(|owner: &Weak<Module>| {
            let mut fields = Vec::with_capacity(plan.len());
            let mut inputs = Vec::new();
            let mut links = Vec::new();
            let mut ports = Vec::new();
            for (index, entry) in plan.into_iter().enumerate() {
                let field = match entry {
                    Plan::Input(kind, source) => {
                        inputs.push(index);
                        Field::Input { kind, source }
                    }
                    Plan::Output(kind) => {
                        ports.push(Port::new(kind, owner.clone()));
                        Field::Output(ports.len() - 1)
                    }
                    Plan::Link(source) => {
                        links.push(index);
                        Field::Link(source)
                    }
                    Plan::Config(value) => Field::Config(value),
                };
                fields.push(field);
            }
            let state = State {
                phase: Phase::Unbound,
                inputs: vec![None; inputs.len()],
                behavior: Box::new(behavior),
            };
            Module {
                id: ModuleId::new(),
                label: RwLock::new(None),
                factory,
                args,
                template,
                fields,
                inputs,
                links,
                ports,
                state: Mutex::new(state),
            }
        });
        Ok(module)
    }

    pub fn id(&self) -> ModuleId {
        self.id
    }

    /// The first name this module was bound under, or `<factory>#<id>`.
    pub fn name(&self) -> String {
        match &*self.label.read() {
            Some(label) => label.to_string(),
            None => {
                let id = self.id.to_string();
                format!("{}#{}", self.factory.name(), &id[..8])
            }
        }
    }

    pub(crate) fn label(&self, name: &Name) {
        let mut label = self.label.write();
        if label.is_none() {
            *label = Some(name.clone());
        }
    }

    pub fn factory(&self) -> &Arc<dyn Factory> {
        &self.factory
    }

    pub fn args(&self) -> &Args {
        &self.args
    }

    pub fn template(&self) -> &Arc<Template> {
        &self.template
    }

    pub fn phase(&self) -> Phase {
        self.state.lock().phase
    }

    pub fn field_at(&self, index: usize) -> Option<Value> {
        let value = match self.fields.get(index)? {
            Field::Input { source, .. } => source.clone(),
            Field::Output(port) => Value::Port(self.ports[*port].reader()),
            Field::Link(source) => source.clone(),
            Field::Config(value) => value.clone(),
        };
        Some(value)
    }

    pub fn field(&self, name: &str) -> Result<Value> {
        let index = self.template.index_of(name)?;
        self.field_at(index).ok_or_else(|| Error::NoSuchField {
            name: name.to_string(),
        })
    }

    /// Reader for the named output port.
    pub fn output(&self, name: &str) -> Result<PortReader> {
        let index = self.template.index_of(name)?;
        match self.fields.get(index) {
            Some(Field::Output(port)) => Ok(self.ports[*port].reader()),
            _ => Err(Error::NotAnOutput {
                path: format!("{}.{}", self.name(), name),
                role: match self.template.type_at(index) {
                    Some(ValueType::Port(_)) => "an input",
                    Some(ValueType::Module) => "a link",
                    _ => "configuration",
                },
            }),
        }
    }

    /// The configuration subset of this module's template.
    pub fn config_template(&self) -> Template {
        self.template.without_port_fields()
    }

    /// Values of the non-port fields, in template order.
    pub fn config(&self) -> Vec<(Name, Value)> {
        self.template
            .iter()
            .enumerate()
            .filter(|(_, (_, ty))| !ty.is_port())
            .filter_map(|(i, (name, _))| self.field_at(i).map(|v| (name.clone(), v)))
            .collect()
    }

    /// Resolve every input and link to the module on the other end.
    pub fn dependencies(&self) -> Result<Vec<Dependency>> {
        let mut deps = Vec::with_capacity(self.inputs.len() + self.links.len());
        for &index in &self.inputs {
            let Field::Input { kind, source } = &self.fields[index] else {
                continue;
            };
            let reader = resolve_input(*kind, source)?;
            let owner = reader.owner().ok_or_else(|| Error::Link {
                module: self.name(),
                message: format!("input `{}` reads a port of a dropped module", self.field_name(index)),
            })?;
            deps.push(Dependency::Port(owner));
        }
        for &index in &self.links {
            let Field::Link(source) = &self.fields[index] else {
                continue;
            };
            deps.push(Dependency::Unordered(resolve_link(source)?));
        }
        Ok(deps)
    }

    /// Resolve inputs and let the behavior finish binding.
    pub fn bind(&self) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        for (slot, &index) in self.inputs.iter().enumerate() {
            let Field::Input { kind, source } = &self.fields[index] else {
                continue;
            };
            state.inputs[slot] = Some(resolve_input(*kind, source)?);
        }
        state.behavior.bind(&BindContext { module: self })?;
        state.phase = Phase::Bound;
        Ok(())
    }

    /// Run one step. A failing tick leaves the module broken until reset.
    pub fn tick(&self) -> Result<()> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        match state.phase {
            Phase::Bound => {}
            Phase::Broken => return Err(Error::Broken { module: self.name() }),
            Phase::Unbound => {
                return Err(Error::InvalidState {
                    operation: "tick",
                    state: format!("{} is unbound", self.name()),
                });
            }
        }
        let mut io = TickIo {
            module: self,
            inputs: &state.inputs,
        };
        if let Err(source) = state.behavior.tick(&mut io) {
            state.phase = Phase::Broken;
            return Err(Error::Tick {
                module: self.name(),
                source: Box::new(source),
            });
        }
        Ok(())
    }

    /// Release resources and forget resolved inputs. Idempotent.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.behavior.reset();
        state.inputs.iter_mut().for_each(|input| *input = None);
        for port in &self.ports {
            port.clear();
        }
        state.phase = Phase::Unbound;
    }

    /// Run `f` on the behavior if it is a `B`.
    pub fn with_behavior<B: Behavior, R>(&self, f: impl FnOnce(&B) -> R) -> Option<R> {
        let state = self.state.lock();
        state.behavior.as_any().downcast_ref::<B>().map(f)
    }

    fn field_name(&self, index: usize) -> String {
        self.template
            .name_at(index)
            .map(|n| n.to_string())
            .unwrap_or_default()
    }
}

impl fmt::Debug for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Module")
            .field("name", &self.name())
            .field("factory", &self.factory.name())
            .field("template", &self.template.to_string())
            .finish()
    }
}

fn resolve_input(kind: PortKind, source: &Value) -> Result<PortReader> {
    let resolved = match source {
        Value::Reference(r) => r.with_type(ValueType::Port(kind)).resolve()?,
        other => other.clone(),
    };
    match resolved {
        Value::Port(reader) if reader.kind() == kind => Ok(reader),
        other => Err(Error::PortType {
            expected: kind,
            found: other.value_type().to_string(),
        }),
    }
}

fn resolve_link(source: &Value) -> Result<ModuleHandle> {
    match source {
        Value::Reference(r) => r.resolve_module(),
        Value::Module(m) => Ok(Arc::clone(m)),
        other => Err(Error::NotAModule {
            path: format!("{other:?}"),
        }),
    }
}

/// What a behavior sees while binding.
pub struct BindContext<'a> {
    module: &'a Module,
}

impl BindContext<'_> {
    pub fn module_name(&self) -> String {
        self.module.name()
    }

    /// The module named by the `index`th module-typed field.
    pub fn link(&self, index: usize) -> Result<ModuleHandle> {
        let field = self.module.links.get(index).ok_or_else(|| Error::Link {
            module: self.module.name(),
            message: format!("no link at index {index}"),
        })?;
        let Field::Link(source) = &self.module.fields[*field] else {
            return Err(Error::Link {
                module: self.module.name(),
                message: format!("field {index} is not a link"),
            });
        };
        let target = resolve_link(source)?;
        if std::ptr::eq(Arc::as_ptr(&target), self.module) {
            return Err(Error::Link {
                module: self.module.name(),
                message: "a module cannot link to itself".to_string(),
            });
        }
        Ok(target)
    }
}

/// What a behavior sees while ticking: its resolved inputs and its own
/// output ports, both by position.
pub struct TickIo<'a> {
    module: &'a Module,
    inputs: &'a [Option<PortReader>],
}

impl TickIo<'_> {
    pub fn module_name(&self) -> String {
        self.module.name()
    }

    pub fn input_count(&self) -> usize {
        self.inputs.len()
    }

    pub fn output_count(&self) -> usize {
        self.module.ports.len()
    }

    pub fn input(&self, index: usize) -> Result<&PortReader> {
        self.inputs
            .get(index)
            .and_then(Option::as_ref)
            .ok_or_else(|| Error::NoSuchPort {
                module: self.module.name(),
                direction: "input",
                index,
            })
    }

    pub fn read(&self, index: usize) -> Result<Primitive> {
        Ok(self.input(index)?.get())
    }

    pub fn double(&self, index: usize) -> Result<f64> {
        self.input(index)?.get_double()
    }

    pub fn boolean(&self, index: usize) -> Result<bool> {
        self.input(index)?.get_bool()
    }

    pub fn output(&self, index: usize) -> Result<&Port> {
        self.module.ports.get(index).ok_or_else(|| Error::NoSuchPort {
            module: self.module.name(),
            direction: "output",
            index,
        })
    }
}
