//! Built-in factories, grouped by category.

use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::name::Name;
use crate::types::ValueType;

pub mod core;
pub mod delay;
pub mod oscillators;
pub mod utilities;

/// Bind every built-in factory in `env` under its fixed name.
pub fn install_factories(env: &Environment) -> Result<()> {
    core::install_factories(env)?;
    oscillators::install_factories(env)?;
    delay::install_factories(env)?;
    utilities::install_factories(env)?;
    tracing::debug!(count = env.len(), "installed factories");
    Ok(())
}

/// A fresh root environment holding only the built-in factories.
pub fn root_environment() -> Result<Environment> {
    let env = Environment::new();
    install_factories(&env)?;
    Ok(env)
}

/// `prefix_0 .. prefix_{count-1}`, all of type `ty`.
pub(crate) fn numbered(prefix: &str, count: usize, ty: ValueType) -> Vec<(Name, ValueType)> {
    (0..count).map(|i| (Name::indexed(prefix, i), ty)).collect()
}

/// Read a positive `count` argument as a port count.
pub(crate) fn port_count(factory: &str, count: i64) -> Result<usize> {
    match usize::try_from(count) {
        Ok(n) if n >= 1 => Ok(n),
        _ => Err(Error::UnsupportedArguments {
            factory: factory.to_string(),
            message: format!("count must be at least 1, got {count}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn root_environment_binds_every_factory() {
        let env = root_environment().unwrap();
        for name in [
            "Const",
            "Sum",
            "Null",
            "Counter",
            "FixedSquareWave",
            "PropagationDelayIn",
            "PropagationDelayOut",
            "Print",
        ] {
            let factory = env.factory(name).unwrap();
            assert_eq!(factory.name(), name);
        }
    }

    #[test]
    fn port_count_rejects_non_positive() {
        assert_eq!(port_count("Sum", 3).unwrap(), 3);
        assert!(matches!(
            port_count("Sum", 0),
            Err(Error::UnsupportedArguments { .. })
        ));
        assert!(port_count("Sum", -2).is_err());
    }
}
