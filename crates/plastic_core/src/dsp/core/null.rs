//! Pass-through: `out_i` copies `in_i` every tick.

use std::any::Any;
use std::sync::Arc;

use crate::dsp::{numbered, port_count};
use crate::environment::Environment;
use crate::error::Result;
use crate::factory::{Factory, validate};
use crate::module::{Behavior, Module, ModuleHandle, TickIo};
use crate::template::Template;
use crate::types::{Args, ValueType};

pub struct NullFactory {
    base: Arc<Template>,
}

impl NullFactory {
    pub const NAME: &'static str = "Null";

    pub fn new() -> Result<Self> {
        let base = Template::new([("count", ValueType::Int), ("type", ValueType::Kind)])?;
        Ok(NullFactory {
            base: Arc::new(base),
        })
    }

    pub fn install(env: &Environment) -> Result<()> {
        let factory: Arc<dyn Factory> = Arc::new(Self::new()?);
        env.bind(Self::NAME, factory)
    }
}

impl Factory for NullFactory {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn factory_template(&self) -> Arc<Template> {
        Arc::clone(&self.base)
    }

    fn instantiation_template(&self, base_args: &Args) -> Result<Arc<Template>> {
        let count = port_count(Self::NAME, base_args.int(Self::NAME, "count")?)?;
        let kind = base_args.kind(Self::NAME, "type")?;
        let template = self.base.with_more(numbered("in", count, ValueType::Port(kind)))?;
        Ok(Arc::new(template))
    }

    fn object_template(&self, args: &Args) -> Result<Arc<Template>> {
        let count = port_count(Self::NAME, args.int(Self::NAME, "count")?)?;
        let kind = args.kind(Self::NAME, "type")?;
        let template = self
            .instantiation_template(args)?
            .with_more(numbered("out", count, ValueType::Port(kind)))?;
        Ok(Arc::new(template))
    }

    fn make(self: Arc<Self>, args: Args) -> Result<ModuleHandle> {
        let template = validate(&*self, &args)?;
        Module::build(self, args, template, Null)
    }
}

pub struct Null;

impl Behavior for Null {
    fn tick(&mut self, io: &mut TickIo<'_>) -> Result<()> {
        for i in 0..io.input_count() {
            io.output(i)?.set_from(io.input(i)?)?;
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
