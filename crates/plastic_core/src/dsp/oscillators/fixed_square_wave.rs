use std::any::Any;
use std::sync::Arc;

use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::factory::{Factory, validate};
use crate::module::{Behavior, Module, ModuleHandle, TickIo};
use crate::template::Template;
use crate::types::{Args, PortKind, ValueType};

/// A square wave counted in ticks: the first half of each `wavelength`
/// emits `v0`, the second half `v1`. `phase` shifts the start position.
pub struct FixedSquareWaveFactory {
    base: Arc<Template>,
    object: Arc<Template>,
}

impl FixedSquareWaveFactory {
    pub const NAME: &'static str = "FixedSquareWave";

    pub fn new() -> Result<Self> {
        let base = Template::new([
            ("v0", ValueType::Double),
            ("v1", ValueType::Double),
            ("wavelength", ValueType::Int),
            ("phase", ValueType::Int),
        ])?;
        let object = base.with_more([("out", ValueType::Port(PortKind::Double))])?;
        Ok(FixedSquareWaveFactory {
            base: Arc::new(base),
            object: Arc::new(object),
        })
    }

    pub fn install(env: &Environment) -> Result<()> {
        let factory: Arc<dyn Factory> = Arc::new(Self::new()?);
        env.bind(Self::NAME, factory)
    }
}

impl Factory for FixedSquareWaveFactory {
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
        let wavelength = args.int(Self::NAME, "wavelength")?;
        if wavelength < 1 {
            return Err(Error::UnsupportedArguments {
                factory: Self::NAME.to_string(),
                message: format!("wavelength must be at least 1, got {wavelength}"),
            });
        }
        let start = args.int(Self::NAME, "phase")?.rem_euclid(wavelength);
        let wave = FixedSquareWave {
            v0: args.double(Self::NAME, "v0")?,
            v1: args.double(Self::NAME, "v1")?,
            wavelength,
            start,
            position: start,
        };
        Module::build(self, args, template, wave)
    }
}

pub struct FixedSquareWave {
    v0: f64,
    v1: f64,
    wavelength: i64,
    start: i64,
    /// Always in `0..wavelength`.
    position: i64,
}

impl FixedSquareWave {
    fn step(&mut self) -> f64 {
        let value = if self.position < self.wavelength - self.position {
            self.v0
        } else {
            self.v1
        };
        self.position = (self.position + 1) % self.wavelength;
        value
    }
}

impl Behavior for FixedSquareWave {
    fn tick(&mut self, io: &mut TickIo<'_>) -> Result<()> {
        let value = self.step();
        io.output(0)?.set_double(value)
    }

    fn reset(&mut self) {
        self.position = self.start;
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wave(wavelength: i64, phase: i64) -> FixedSquareWave {
        let start = phase.rem_euclid(wavelength);
        FixedSquareWave {
            v0: -1.0,
            v1: 1.0,
            wavelength,
            start,
            position: start,
        }
    }

    fn levels(mut w: FixedSquareWave, n: usize) -> Vec<f64> {
        (0..n).map(|_| w.step()).collect()
    }

    #[test]
    fn odd_wavelength_favours_v0() {
        assert_eq!(levels(wave(3, 0), 6), [-1.0, -1.0, 1.0, -1.0, -1.0, 1.0]);
    }

    #[test]
    fn negative_phase_wraps() {
        assert_eq!(levels(wave(4, -1), 4), [1.0, -1.0, -1.0, 1.0]);
    }

    #[test]
    fn reset_returns_to_phase() {
        let mut w = wave(4, 2);
        assert_eq!(w.step(), 1.0);
        w.step();
        w.reset();
        assert_eq!(w.step(), 1.0);
    }

    #[test]
    fn huge_wavelength_does_not_overflow() {
        let mut w = wave(i64::MAX, i64::MAX - 1);
        assert_eq!(w.step(), 1.0);
        assert_eq!(w.step(), -1.0);
        assert_eq!(w.position, 1);
    }

    #[test]
    fn huge_wavelength_ticks_through_module() {
        let factory: Arc<dyn Factory> = Arc::new(FixedSquareWaveFactory::new().unwrap());
        let args = Args::new()
            .with("v0", -1.0)
            .with("v1", 1.0)
            .with("wavelength", i64::MAX)
            .with("phase", i64::MAX - 1);
        let module = crate::factory::instantiate(&factory, args).unwrap();
        module.bind().unwrap();
        module.tick().unwrap();
        let out = module.output("out").unwrap();
        assert_eq!(out.get_double().unwrap(), 1.0);
        module.tick().unwrap();
        assert_eq!(out.get_double().unwrap(), -1.0);
    }

    #[test]
    fn zero_wavelength_is_unsupported() {
        let factory: Arc<dyn Factory> = Arc::new(FixedSquareWaveFactory::new().unwrap());
        let args = Args::new()
            .with("v0", 0.0)
            .with("v1", 1.0)
            .with("wavelength", 0i64)
            .with("phase", 0i64);
        assert!(matches!(
            crate::factory::instantiate(&factory, args),
            Err(Error::UnsupportedArguments { .. })
        ));
    }
}
