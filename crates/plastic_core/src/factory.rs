//! Two-phase module construction.
//!
//! A factory first describes the base arguments it needs
//! ([`Factory::factory_template`]). From concrete base arguments it computes
//! the full list of arguments an instance requires
//! ([`Factory::instantiation_template`]), which may depend on the base values
//! (`count = 3` asks for `in_0`, `in_1`, `in_2`). Finally the object template
//! describes every field of the resulting module, including generated output
//! ports.

use std::sync::Arc;

use crate::error::Result;
use crate::module::ModuleHandle;
use crate::template::Template;
use crate::types::Args;

pub trait Factory: Send + Sync {
    /// The short name the factory is registered under.
    fn name(&self) -> &'static str;

    fn factory_template(&self) -> Arc<Template>;

    /// Template of every argument needed to build an instance, given base
    /// arguments that already passed the factory template.
    fn instantiation_template(&self, _base_args: &Args) -> Result<Arc<Template>> {
        Ok(self.factory_template())
    }

    /// Template of the module built from `args`.
    fn object_template(&self, args: &Args) -> Result<Arc<Template>>;

    /// Build a module in the unbound state. Implementations start with
    /// [`validate`].
    fn make(self: Arc<Self>, args: Args) -> Result<ModuleHandle>;
}

/// Check `args` against both templates and compute the object template.
pub fn validate(factory: &dyn Factory, args: &Args) -> Result<Arc<Template>> {
    factory
        .factory_template()
        .check_args_allow_extras(factory.name(), args)?;
    factory
        .instantiation_template(args)?
        .check_args_no_extras(factory.name(), args)?;
    factory.object_template(args)
}

/// Build a module from a registered factory.
pub fn instantiate(factory: &Arc<dyn Factory>, args: Args) -> Result<ModuleHandle> {
    let module = Arc::clone(factory).make(args)?;
    tracing::debug!(
        factory = factory.name(),
        produced = module.factory().name(),
        "instantiated module"
    );
    Ok(module)
}
