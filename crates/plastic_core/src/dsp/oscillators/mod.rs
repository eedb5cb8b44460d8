use crate::environment::Environment;
use crate::error::Result;

pub mod fixed_square_wave;

pub fn install_factories(env: &Environment) -> Result<()> {
    fixed_square_wave::FixedSquareWaveFactory::install(env)?;
    Ok(())
}
