//! Propagation-delay pair: the one sanctioned way to close a feedback loop.
//!
//! `PropagationDelayIn` samples its `input` every tick into a two-slot line
//! indexed by a parity bit that flips after each write.
//! `PropagationDelayOut` names the `PropagationDelayIn` module itself (not one
//! of its ports), so the scheduler does not order it after the in-side. On each
//! tick it emits the slot opposite its own parity and then flips that parity.
//!
//! Both sides start at parity 0, so on tick `k` the out-side reads the slot
//! written on tick `k - 1` (or the initial value on tick 0) whichever side
//! ticks first.

use std::any::Any;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::factory::{Factory, validate};
use crate::module::{BindContext, Behavior, Module, ModuleHandle, TickIo};
use crate::template::Template;
use crate::types::{Args, PortKind, Primitive, ValueType};

type Line = Arc<Mutex<[Primitive; 2]>>;

pub fn install_factories(env: &Environment) -> Result<()> {
    DelayInFactory::install(env)?;
    DelayOutFactory::install(env)?;
    Ok(())
}

pub struct DelayInFactory {
    base: Arc<Template>,
}

impl DelayInFactory {
    pub const NAME: &'static str = "PropagationDelayIn";

    pub fn new() -> Result<Self> {
        let base = Template::new([("type", ValueType::Kind)])?;
        Ok(DelayInFactory {
            base: Arc::new(base),
        })
    }

    pub fn install(env: &Environment) -> Result<()> {
        let factory: Arc<dyn Factory> = Arc::new(Self::new()?);
        env.bind(Self::NAME, factory)
    }
}

impl Factory for DelayInFactory {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn factory_template(&self) -> Arc<Template> {
        Arc::clone(&self.base)
    }

    /// `{type, input}`, plus `initial` when the caller supplies one.
    fn instantiation_template(&self, base_args: &Args) -> Result<Arc<Template>> {
        let kind = base_args.kind(Self::NAME, "type")?;
        let mut template = self.base.with_more([("input", ValueType::Port(kind))])?;
        if base_args.contains("initial") {
            template = template.with_more([("initial", kind.scalar_type())])?;
        }
        Ok(Arc::new(template))
    }

    fn object_template(&self, args: &Args) -> Result<Arc<Template>> {
        self.instantiation_template(args)
    }

    fn make(self: Arc<Self>, args: Args) -> Result<ModuleHandle> {
        let template = validate(&*self, &args)?;
        let kind = args.kind(Self::NAME, "type")?;
        let initial = if args.contains("initial") {
            args.primitive(Self::NAME, "initial", kind)?
        } else {
            kind.default_value()
        };
        let delay = DelayIn {
            kind,
            initial,
            line: Arc::new(Mutex::new([initial; 2])),
            parity: false,
        };
        Module::build(self, args, template, delay)
    }
}

pub struct DelayIn {
    kind: PortKind,
    initial: Primitive,
    line: Line,
    parity: bool,
}

impl DelayIn {
    pub fn kind(&self) -> PortKind {
        self.kind
    }

    fn line(&self) -> Line {
        Arc::clone(&self.line)
    }

    fn store(&mut self, value: Primitive) {
        self.line.lock()[self.parity as usize] = value;
        self.parity = !self.parity;
    }
}

impl Behavior for DelayIn {
    fn tick(&mut self, io: &mut TickIo<'_>) -> Result<()> {
        let value = io.read(0)?;
        self.store(value);
        Ok(())
    }

    fn reset(&mut self) {
        *self.line.lock() = [self.initial; 2];
        self.parity = false;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub struct DelayOutFactory {
    base: Arc<Template>,
}

impl DelayOutFactory {
    pub const NAME: &'static str = "PropagationDelayOut";

    pub fn new() -> Result<Self> {
        let base = Template::new([("type", ValueType::Kind), ("source", ValueType::Module)])?;
        Ok(DelayOutFactory {
            base: Arc::new(base),
        })
    }

    pub fn install(env: &Environment) -> Result<()> {
        let factory: Arc<dyn Factory> = Arc::new(Self::new()?);
        env.bind(Self::NAME, factory)
    }
}

impl Factory for DelayOutFactory {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn factory_template(&self) -> Arc<Template> {
        Arc::clone(&self.base)
    }

    fn object_template(&self, args: &Args) -> Result<Arc<Template>> {
        let kind = args.kind(Self::NAME, "type")?;
        Ok(Arc::new(self.base.with_more([("out", ValueType::Port(kind))])?))
    }

    fn make(self: Arc<Self>, args: Args) -> Result<ModuleHandle> {
        let template = validate(&*self, &args)?;
        let kind = args.kind(Self::NAME, "type")?;
        let delay = DelayOut {
            kind,
            line: None,
            parity: false,
        };
        Module::build(self, args, template, delay)
    }
}

pub struct DelayOut {
    kind: PortKind,
    line: Option<Line>,
    parity: bool,
}

impl DelayOut {
    /// The value stored on the previous tick, or `None` before binding.
    fn take(&mut self) -> Option<Primitive> {
        let value = self.line.as_ref()?.lock()[!self.parity as usize];
        self.parity = !self.parity;
        Some(value)
    }
}

impl Behavior for DelayOut {
    fn bind(&mut self, ctx: &BindContext<'_>) -> Result<()> {
        let source = ctx.link(0)?;
        let (kind, line) = source
            .with_behavior::<DelayIn, _>(|d| (d.kind(), d.line()))
            .ok_or_else(|| Error::Link {
                module: ctx.module_name(),
                message: format!(
                    "`source` must be a {}, found {}",
                    DelayInFactory::NAME,
                    source.factory().name()
                ),
            })?;
        if kind != self.kind {
            return Err(Error::Link {
                module: ctx.module_name(),
                message: format!("`source` carries {kind}, expected {}", self.kind),
            });
        }
        self.line = Some(line);
        Ok(())
    }

    fn tick(&mut self, io: &mut TickIo<'_>) -> Result<()> {
        let value = self.take().ok_or_else(|| Error::Link {
            module: io.module_name(),
            message: "ticked before its source was linked".to_string(),
        })?;
        io.output(0)?.set(value)
    }

    fn reset(&mut self) {
        self.line = None;
        self.parity = false;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}
