//! Declarative patch files and the runnable root they evaluate to.
//!
//! A patch is a list of module declarations evaluated in order against an
//! environment, plus the names of the sink modules to run. String arguments
//! starting with `@` are references (`@osc` or `@osc.out`) and may point at
//! modules declared later in the file.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as Json;
use tracing::{debug, warn};

use crate::dsp::utilities::print::Print;
use crate::environment::Environment;
use crate::error::{Error, Result};
use crate::factory::instantiate;
use crate::module::ModuleHandle;
use crate::network::ModuleNetwork;
use crate::reference::Reference;
use crate::types::{Args, PortKind, Primitive, Value, ValueType};

fn default_ticks() -> u64 {
    1
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PatchFile {
    /// Module declarations, evaluated in order.
    pub modules: Vec<Declaration>,
    /// Names of the modules whose upstream closure is run.
    pub sinks: Vec<String>,
    /// How many times to tick the network.
    #[serde(default = "default_ticks")]
    pub ticks: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Declaration {
    /// Name the module is bound under.
    pub name: String,
    /// Name of a factory bound in the environment, e.g. `Sum`.
    pub factory: String,
    /// Arguments. Strings starting with `@` are references.
    #[serde(default)]
    pub args: BTreeMap<String, Json>,
}

impl PatchFile {
    pub fn from_json(text: &str) -> Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// JSON Schema of the patch format.
    pub fn schema() -> schemars::Schema {
        schemars::schema_for!(PatchFile)
    }

    /// Declare every module in `env` and return the root that runs them.
    pub fn evaluate(&self, env: &Environment) -> Result<Runnable> {
        if self.sinks.is_empty() {
            return Err(Error::Patch {
                message: "a patch needs at least one sink".to_string(),
            });
        }
        for declaration in &self.modules {
            let module = declaration.evaluate(env)?;
            env.bind(&declaration.name, module)?;
        }
        let sinks = self
            .sinks
            .iter()
            .map(|sink| Reference::parse(env, sink))
            .collect::<Result<Vec<_>>>()?;
        Ok(Runnable::new(env.clone(), sinks, self.ticks))
    }
}

impl Declaration {
    fn evaluate(&self, env: &Environment) -> Result<ModuleHandle> {
        let factory = env.factory(&self.factory)?;
        let name = factory.name();

        // Base arguments decide the shape of the instantiation template, so
        // they are converted first. Extra keys are passed through with their
        // natural JSON type so factories can test for optional arguments.
        let base_template = factory.factory_template();
        let mut base = Args::new();
        for (key, json) in &self.args {
            let ty = base_template.type_of(key).unwrap_or(ValueType::Any);
            base.insert(key, convert(env, name, key, ty, json)?);
        }

        let template = factory.instantiation_template(&base)?;
        let mut args = Args::new();
        for (key, json) in &self.args {
            let ty = template.type_of(key).ok_or_else(|| Error::UnexpectedArgument {
                factory: name.to_string(),
                field: key.clone(),
            })?;
            args.insert(key, convert(env, name, key, ty, json)?);
        }
        debug!(module = %self.name, factory = name, "declare");
        instantiate(&factory, args)
    }
}

/// Convert one JSON argument to the value a slot of type `ty` expects.
fn convert(env: &Environment, factory: &str, field: &str, ty: ValueType, json: &Json) -> Result<Value> {
    if let Some(path) = json.as_str().and_then(|s| s.strip_prefix('@')) {
        return Ok(Value::Reference(Reference::parse(env, path)?));
    }
    let value = match (ty, json) {
        (ValueType::Any, _) => infer(json),
        // JSON does not distinguish integral doubles.
        (ValueType::Double, Json::Number(n)) => n.as_f64().map(Value::Double),
        (ValueType::Int, Json::Number(n)) => n.as_i64().map(Value::Int),
        (ValueType::Bool, Json::Bool(b)) => Some(Value::Bool(*b)),
        (ValueType::Str, Json::String(s)) => Some(Value::Str(s.clone())),
        (ValueType::Kind, Json::String(s)) => PortKind::parse(s).map(Value::Kind),
        _ => None,
    };
    value.ok_or_else(|| Error::ArgumentType {
        factory: factory.to_string(),
        field: field.to_string(),
        expected: ty,
        found: describe(json),
    })
}

fn infer(json: &Json) -> Option<Value> {
    match json {
        Json::Bool(b) => Some(Value::Bool(*b)),
        Json::Number(n) => match n.as_i64() {
            Some(i) => Some(Value::Int(i)),
            None => n.as_f64().map(Value::Double),
        },
        Json::String(s) => Some(Value::Str(s.clone())),
        _ => None,
    }
}

fn describe(json: &Json) -> String {
    match json {
        Json::Null => "null".to_string(),
        Json::Bool(_) => "boolean".to_string(),
        Json::Number(n) if n.is_i64() || n.is_u64() => format!("integer {n}"),
        Json::Number(n) => format!("number {n}"),
        Json::String(s) => format!("string \"{s}\""),
        Json::Array(_) => "array".to_string(),
        Json::Object(_) => "object".to_string(),
    }
}

/// The root of a run: a set of sink references and a tick count.
///
/// Holds the environment the sinks were declared in, since references only
/// keep a weak handle to it.
pub struct Runnable {
    env: Environment,
    sinks: Vec<Reference>,
    ticks: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    /// Ticks completed before the run stopped.
    pub ticks: u64,
    /// Module names in scheduling order.
    pub order: Vec<String>,
    /// Values recorded by each `Print` module in the network, by name.
    pub printed: BTreeMap<String, Vec<Primitive>>,
}

impl Runnable {
    pub fn new(env: Environment, sinks: Vec<Reference>, ticks: u64) -> Self {
        Runnable { env, sinks, ticks }
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    pub fn sinks(&self) -> Result<Vec<ModuleHandle>> {
        self.sinks.iter().map(Reference::resolve_module).collect()
    }

    pub fn network(&self) -> Result<ModuleNetwork> {
        ModuleNetwork::new(&self.sinks()?)
    }

    /// Bind, tick `ticks` times and reset. The network is reset even when a
    /// step fails; the failure is then returned.
    pub fn run(&self) -> Result<RunReport> {
        let mut network = self.network()?;
        let outcome = network.bind().and_then(|()| network.run(self.ticks));

        let report = RunReport {
            ticks: network.ticks(),
            order: network.order().iter().map(|m| m.name()).collect(),
            printed: network
                .order()
                .iter()
                .filter_map(|m| {
                    m.with_behavior::<Print, _>(|p| p.history().to_vec())
                        .map(|history| (m.name(), history))
                })
                .collect(),
        };
        network.reset();

        if let Err(err) = outcome {
            warn!(error = %err, ticks = report.ticks, "run stopped early; network reset");
            return Err(err);
        }
        Ok(report)
    }
}
