use std::any::Any;
use std::sync::Arc;

use crate::environment::Environment;
use crate::error::Result;
use crate::factory::{Factory, validate};
use crate::module::{Behavior, Module, ModuleHandle, TickIo};
use crate::template::Template;
use crate::types::{Args, Primitive, ValueType};

/// Debug sink: logs and records every value seen on `in`.
pub struct PrintFactory {
    base: Arc<Template>,
}

impl PrintFactory {
    pub const NAME: &'static str = "Print";

    pub fn new() -> Result<Self> {
        let base = Template::new([("type", ValueType::Kind)])?;
        Ok(PrintFactory {
            base: Arc::new(base),
        })
    }

    pub fn install(env: &Environment) -> Result<()> {
        let factory: Arc<dyn Factory> = Arc::new(Self::new()?);
        env.bind(Self::NAME, factory)
    }
}

impl Factory for PrintFactory {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn factory_template(&self) -> Arc<Template> {
        Arc::clone(&self.base)
    }

    fn instantiation_template(&self, base_args: &Args) -> Result<Arc<Template>> {
        let kind = base_args.kind(Self::NAME, "type")?;
        Ok(Arc::new(self.base.with_more([("in", ValueType::Port(kind))])?))
    }

    fn object_template(&self, args: &Args) -> Result<Arc<Template>> {
        self.instantiation_template(args)
    }

    fn make(self: Arc<Self>, args: Args) -> Result<ModuleHandle> {
        let template = validate(&*self, &args)?;
        Module::build(self, args, template, Print::default())
    }
}

#[derive(Default)]
pub struct Print {
    history: Vec<Primitive>,
}

impl Print {
    /// Every value observed since the last reset, oldest first.
    pub fn history(&self) -> &[Primitive] {
        &self.history
    }

    pub fn last(&self) -> Option<Primitive> {
        self.history.last().copied()
    }
}

impl Behavior for Print {
    fn tick(&mut self, io: &mut TickIo<'_>) -> Result<()> {
        let value = io.read(0)?;
        tracing::info!(
            target: "plastic::print",
            module = %io.module_name(),
            tick = self.history.len(),
            %value
        );
        self.history.push(value);
        Ok(())
    }

    fn reset(&mut self) {
        self.history.clear();
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
