use std::any::Any;
use std::sync::Arc;

use crate::environment::Environment;
use crate::error::Result;
use crate::factory::{Factory, validate};
use crate::module::{Behavior, Module, ModuleHandle, TickIo};
use crate::template::Template;
use crate::types::{Args, PortKind, ValueType};

/// Emits `value` on `out` every tick.
pub struct ConstFactory {
    base: Arc<Template>,
    object: Arc<Template>,
}

impl ConstFactory {
    pub const NAME: &'static str = "Const";

    pub fn new() -> Result<Self> {
        let base = Template::new([("value", ValueType::Double)])?;
        let object = base.with_more([("out", ValueType::Port(PortKind::Double))])?;
        Ok(ConstFactory {
            base: Arc::new(base),
            object: Arc::new(object),
        })
    }

    pub fn install(env: &Environment) -> Result<()> {
        let factory: Arc<dyn Factory> = Arc::new(Self::new()?);
        env.bind(Self::NAME, factory)
    }
}

impl Factory for ConstFactory {
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
        let value = args.double(Self::NAME, "value")?;
        Module::build(self, args, template, Const { value })
    }
}

pub struct Const {
    value: f64,
}

impl Behavior for Const {
    fn tick(&mut self, io: &mut TickIo<'_>) -> Result<()> {
        io.output(0)?.set_double(self.value)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
