//! plastic: run and inspect module-network patch files
//!
//! - `run`: evaluate a patch, tick it and report what the `Print` sinks saw
//! - `order`: show the scheduling order without ticking
//! - `factories`: list the built-in factories and their base arguments
//! - `schema`: print the JSON Schema of the patch format

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use plastic_core::dsp::root_environment;
use plastic_core::{PatchFile, Primitive, RunReport, Runnable, Value};
use serde_json::json;
use tracing::Level;

/// Run and inspect plastic patch files
#[derive(Parser)]
#[command(name = "plastic")]
#[command(about = "Run dataflow patches built from plastic modules")]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Output format
    #[arg(long, global = true, default_value = "table")]
    format: OutputFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Evaluate a patch and tick its network
    Run {
        /// Patch file (JSON)
        patch: PathBuf,

        /// Override the patch's tick count
        #[arg(short = 'n', long)]
        ticks: Option<u64>,
    },

    /// Print the order modules would be ticked in
    Order {
        /// Patch file (JSON)
        patch: PathBuf,
    },

    /// List built-in factories
    Factories,

    /// Print the JSON Schema of patch files
    Schema,
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
}

fn load(path: &Path, ticks: Option<u64>) -> Result<Runnable> {
    let mut patch =
        PatchFile::load(path).with_context(|| format!("failed to read {}", path.display()))?;
    if let Some(ticks) = ticks {
        patch.ticks = ticks;
    }
    let env = root_environment().context("failed to install factories")?;
    patch
        .evaluate(&env)
        .with_context(|| format!("failed to evaluate {}", path.display()))
}

fn primitive_json(value: &Primitive) -> serde_json::Value {
    match value {
        Primitive::Double(v) => json!(v),
        Primitive::Bool(v) => json!(v),
    }
}

fn print_report(report: &RunReport, format: OutputFormat) {
    match format {
        OutputFormat::Json => {
            let printed: serde_json::Map<_, _> = report
                .printed
                .iter()
                .map(|(name, values)| {
                    let values = values.iter().map(primitive_json).collect::<Vec<_>>();
                    (name.clone(), json!(values))
                })
                .collect();
            let out = json!({
                "ticks": report.ticks,
                "order": report.order,
                "printed": printed,
            });
            println!("{out}");
        }
        OutputFormat::Table => {
            println!(
                "{} {} tick(s), {} module(s)",
                "ran".green().bold(),
                report.ticks,
                report.order.len()
            );
            for (name, values) in &report.printed {
                let values: Vec<String> = values.iter().map(|v| v.to_string()).collect();
                println!("  {:<16} {}", name.cyan(), values.join(" "));
            }
        }
    }
}

fn run(path: &Path, ticks: Option<u64>, format: OutputFormat) -> Result<()> {
    let root = load(path, ticks)?;
    let report = root
        .run()
        .with_context(|| format!("run of {} failed", path.display()))?;
    print_report(&report, format);
    Ok(())
}

fn order(path: &Path, format: OutputFormat) -> Result<()> {
    let root = load(path, None)?;
    let network = root.network().context("failed to build network")?;
    let names: Vec<String> = network.order().iter().map(|m| m.name()).collect();
    match format {
        OutputFormat::Json => println!("{}", json!(names)),
        OutputFormat::Table => {
            for (i, module) in network.order().iter().enumerate() {
                println!(
                    "{:>3}  {:<16} {}",
                    i,
                    module.name().cyan(),
                    module.factory().name().dimmed()
                );
            }
        }
    }
    Ok(())
}

fn factories(format: OutputFormat) -> Result<()> {
    let env = root_environment().context("failed to install factories")?;
    let mut listed = Vec::new();
    for name in env.names() {
        if let Value::Factory(factory) = env.get(name.as_str())? {
            listed.push((name.to_string(), factory.factory_template().to_string()));
        }
    }
    match format {
        OutputFormat::Json => {
            let out: serde_json::Map<_, _> = listed
                .into_iter()
                .map(|(name, template)| (name, json!(template)))
                .collect();
            println!("{}", serde_json::Value::Object(out));
        }
        OutputFormat::Table => {
            for (name, template) in listed {
                println!("{:<22} {}", name.bold(), template);
            }
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Run { patch, ticks } => run(&patch, ticks, cli.format),
        Commands::Order { patch } => order(&patch, cli.format),
        Commands::Factories => factories(cli.format),
        Commands::Schema => {
            let schema = PatchFile::schema();
            println!("{}", serde_json::to_string_pretty(&schema)?);
            Ok(())
        }
    }
}
