use std::any::Any;
use std::sync::Arc;

use crate::environment::Environment;
use crate::error::Result;
use crate::factory::{Factory, validate};
use crate::module::{Behavior, Module, ModuleHandle, TickIo};
use crate::template::Template;
use crate::types::{Args, PortKind, ValueType};

/// Emits 0, 1, 2, ... on `out`, one step per tick.
pub struct CounterFactory {
    base: Arc<Template>,
    object: Arc<Template>,
}

impl CounterFactory {
    pub const NAME: &'static str = "Counter";

    pub fn new() -> Result<Self> {
        let base = Template::empty();
        let object = base.with_more([("out", ValueType::Port(PortKind::Double))])?;
        Ok(CounterFactory {
            base: Arc::new(base),
            object: Arc::new(object),
        })
    }

    pub fn install(env: &Environment) -> Result<()> {
        let factory: Arc<dyn Factory> = Arc::new(Self::new()?);
        env.bind(Self::NAME, factory)
    }
}

impl Factory for CounterFactory {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn factory_template(&self) -> Arc<Template> {
        Arc::clone(&self.base)
    }

    fn object_template(&self, _args: &Args) -> Result<Arc<Template>> {
        Ok(Arc::clone(&self.object))
    }

    fn make(self: Arc<Self>, args: Args) -> Result<ModuleHandle> {
        let template = validate(&*self, &args)?;
        Module::build(self, args, template, Counter::default())
    }
}

#[derive(Default)]
pub struct Counter {
    next: u64,
}

impl Behavior for Counter {
    fn tick(&mut self, io: &mut TickIo<'_>) -> Result<()> {
        io.output(0)?.set_double(self.next as f64)?;
        self.next += 1;
        Ok(())
    }

    fn reset(&mut self) {
        self.next = 0;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
