use crate::environment::Environment;
use crate::error::Result;

pub mod constant;
pub mod counter;
pub mod null;
pub mod sum;

pub fn install_factories(env: &Environment) -> Result<()> {
    constant::ConstFactory::install(env)?;
    sum::SumFactory::install(env)?;
    null::NullFactory::install(env)?;
    counter::CounterFactory::install(env)?;
    Ok(())
}
