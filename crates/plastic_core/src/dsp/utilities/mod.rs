use crate::environment::Environment;
use crate::error::Result;

pub mod print;

pub fn install_factories(env: &Environment) -> Result<()> {
    print::PrintFactory::install(env)?;
    Ok(())
}
