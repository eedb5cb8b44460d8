//! `out` is the sum of `in_0 .. in_{count-1}`.
//!
//! A one-input sum is a plain pass-through, so `count = 1` is built by the
//! `Null` factory instead.

use std::any::Any;
use std::sync::Arc;

use crate::dsp::core::null::NullFactory;
use crate::dsp::{numbered, port_count};
use crate::environment::Environment;
use crate::error::Result;
use crate::factory::{Factory, validate};
use crate::module::{Behavior, Module, ModuleHandle, TickIo};
use crate::template::Template;
use crate::types::{Args, PortKind, ValueType};

pub struct SumFactory {
    base: Arc<Template>,
    null: Arc<NullFactory>,
}

impl SumFactory {
    pub const NAME: &'static str = "Sum";

    pub fn new() -> Result<Self> {
        let base = Template::new([("count", ValueType::Int)])?;
        Ok(SumFactory {
            base: Arc::new(base),
            null: Arc::new(NullFactory::new()?),
        })
    }

    pub fn install(env: &Environment) -> Result<()> {
        let factory: Arc<dyn Factory> = Arc::new(Self::new()?);
        env.bind(Self::NAME, factory)
    }
}

impl Factory for SumFactory {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn factory_template(&self) -> Arc<Template> {
        Arc::clone(&self.base)
    }

    fn instantiation_template(&self, base_args: &Args) -> Result<Arc<Template>> {
        let count = port_count(Self::NAME, base_args.int(Self::NAME, "count")?)?;
        let inputs = numbered("in", count, ValueType::Port(PortKind::Double));
        Ok(Arc::new(self.base.with_more(inputs)?))
    }

    fn object_template(&self, args: &Args) -> Result<Arc<Template>> {
        let template = self
            .instantiation_template(args)?
            .with_more([("out", ValueType::Port(PortKind::Double))])?;
        Ok(Arc::new(template))
    }

    fn make(self: Arc<Self>, args: Args) -> Result<ModuleHandle> {
        let template = validate(&*self, &args)?;
        if args.int(Self::NAME, "count")? == 1 {
            let mut pass = Args::new()
                .with("count", 1i64)
                .with("type", PortKind::Double);
            if let Some(input) = args.get("in_0") {
                pass.insert("in_0", input.clone());
            }
            return Arc::clone(&self.null).make(pass);
        }
        Module::build(self, args, template, Sum)
    }
}

pub struct Sum;

impl Behavior for Sum {
    fn tick(&mut self, io: &mut TickIo<'_>) -> Result<()> {
        let mut total = 0.0;
        for i in 0..io.input_count() {
            total += io.double(i)?;
        }
        io.output(0)?.set_double(total)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn count_must_be_positive() {
        let factory: Arc<dyn Factory> = Arc::new(SumFactory::new().unwrap());
        let result = crate::factory::instantiate(&factory, Args::new().with("count", 0i64));
        assert!(matches!(result, Err(Error::UnsupportedArguments { factory, .. }) if factory == "Sum"));
    }

    #[test]
    fn extra_inputs_are_rejected() {
        let factory: Arc<dyn Factory> = Arc::new(SumFactory::new().unwrap());
        let env = Environment::new();
        let args = Args::new()
            .with("count", 1i64)
            .with("in_0", env.reference("a"))
            .with("in_1", env.reference("b"));
        assert!(matches!(
            crate::factory::instantiate(&factory, args),
            Err(Error::ArgumentCount { expected: 2, found: 3, .. })
        ));
    }
}
