//! `taxon` operator CLI.
//!
//! Thin shell over the library against the configured graph store and
//! predictor.
//!
//! ## Commands
//!
//! - `taxon vocabulary` - print the feature schema sent to the predictor
//! - `taxon parameter show <code>` - constraint edges of one parameter
//! - `taxon class show <id>` - parameters a class allows
//! - `taxon validate <codes...>` - contradiction check, non-zero exit when found
//! - `taxon compatible --class <id> <codes...>` - class coverage check
//! - `taxon predict <codes...>` - predictor call plus coverage cross-check

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use serde_json::json;
use taxon_classify::{
    ClassSuggester, ConstraintValidator, HttpPredictor, TaxonConfig, parameter_set,
};
use taxon_graph::SparqlGraph;
use taxon_types::{ClassId, ParameterCode};

/// Service classification constraint engine
#[derive(Debug, Parser)]
#[command(name = "taxon", version)]
struct Cli {
    /// Config file (default: $TAXON_CONFIG or ~/.config/taxon/taxon.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Debug logging unless RUST_LOG is set
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Output as JSON for automation
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the versioned feature schema
    Vocabulary,

    /// Inspect a parameter
    Parameter {
        #[command(subcommand)]
        command: ParameterCommand,
    },

    /// Inspect a class
    Class {
        #[command(subcommand)]
        command: ClassCommand,
    },

    /// Check a parameter set for contradictions
    Validate(CodesArgs),

    /// Check whether a class allows every parameter of a set
    Compatible(CompatibleArgs),

    /// Ask the predictor for a class and cross-check it against the graph
    Predict(CodesArgs),
}

#[derive(Debug, Subcommand)]
enum ParameterCommand {
    /// Allowed classes and contradicting parameters
    Show {
        #[arg(value_name = "CODE")]
        code: String,
    },
}

#[derive(Debug, Subcommand)]
enum ClassCommand {
    /// Allowed parameters
    Show {
        #[arg(value_name = "CLASS_ID")]
        id: u64,
    },
}

#[derive(Debug, clap::Args)]
struct CodesArgs {
    #[arg(value_name = "CODE", required = true)]
    codes: Vec<String>,
}

#[derive(Debug, clap::Args)]
struct CompatibleArgs {
    #[arg(long = "class", value_name = "CLASS_ID")]
    class_id: u64,

    #[arg(value_name = "CODE", required = true)]
    codes: Vec<String>,
}

fn init_tracing(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: Option<&PathBuf>) -> anyhow::Result<TaxonConfig> {
    let cfg = match path {
        Some(path) => TaxonConfig::load_explicit(path),
        None => TaxonConfig::load(),
    };
    cfg.context("failed to load configuration")
}

fn codes(raw: &[String]) -> Vec<ParameterCode> {
    parameter_set(&raw.iter().map(|c| ParameterCode::new(c.as_str())).collect::<Vec<_>>())
}

fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn join(codes: &[ParameterCode]) -> String {
    codes
        .iter()
        .map(ParameterCode::as_str)
        .collect::<Vec<_>>()
        .join(", ")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    tracing::debug!("taxon v{} starting", taxon_classify::VERSION);

    let exit_code = run(cli).await?;
    if exit_code != 0 {
        std::process::exit(exit_code);
    }
    Ok(())
}

async fn run(cli: Cli) -> anyhow::Result<i32> {
    let cfg = load_config(cli.config.as_ref())?;

    if matches!(cli.command, Command::Vocabulary) {
        let schema = cfg.vocabulary.schema();
        if cli.json {
            print_json(&json!({
                "version": schema.version(),
                "parameters": schema.codes(),
            }))?;
        } else {
            println!("feature schema v{} ({} parameters)", schema.version(), schema.len());
            for (index, code) in schema.codes().iter().enumerate() {
                println!("{index:>3}  {code}");
            }
        }
        return Ok(0);
    }

    let graph = Arc::new(SparqlGraph::new(cfg.graph.endpoint()).context("failed to build graph client")?);
    let validator = ConstraintValidator::new(graph);

    match cli.command {
        Command::Vocabulary => Ok(0),

        Command::Parameter {
            command: ParameterCommand::Show { code },
        } => {
            let code = ParameterCode::from(code);
            let constraints = validator.parameter_constraints(&code).await?;
            if cli.json {
                print_json(&json!({ "code": code, "constraints": constraints }))?;
            } else {
                let classes = constraints
                    .allowed_classes
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                println!("parameter {code}");
                println!("  allowed classes:   {classes}");
                println!("  contradicts:       {}", join(&constraints.contradiction_parameters));
            }
            Ok(0)
        }

        Command::Class {
            command: ClassCommand::Show { id },
        } => {
            let class_id = ClassId(id);
            let allowed = validator.class_constraints(class_id).await?;
            if cli.json {
                print_json(&json!({ "class_id": class_id, "allowed_parameters": allowed }))?;
            } else {
                println!("class {class_id}");
                println!("  allowed parameters: {}", join(&allowed));
            }
            Ok(0)
        }

        Command::Validate(args) => {
            let set = codes(&args.codes);
            let contradictions = validator.validate_service_parameters(&set).await?;
            if cli.json {
                print_json(&json!({
                    "valid": contradictions.is_empty(),
                    "contradictions": contradictions,
                }))?;
            } else if contradictions.is_empty() {
                println!("ok: {} parameters, no contradictions", set.len());
            } else {
                println!("contradictory parameters: {}", join(&contradictions));
            }
            Ok(if contradictions.is_empty() { 0 } else { 1 })
        }

        Command::Compatible(args) => {
            let class_id = ClassId(args.class_id);
            let set = codes(&args.codes);
            let compatible = validator.validate_class_compatibility(&set, class_id).await?;
            if cli.json {
                print_json(&json!({ "class_id": class_id, "compatible": compatible }))?;
            } else if compatible {
                println!("class {class_id} allows every parameter");
            } else {
                println!("class {class_id} does not allow every parameter");
            }
            Ok(if compatible { 0 } else { 1 })
        }

        Command::Predict(args) => {
            if !cfg.predictor.enabled {
                anyhow::bail!("predictor is disabled in configuration");
            }
            let predictor = HttpPredictor::new(&cfg.predictor).context("failed to build predictor client")?;
            let suggester = ClassSuggester::new(Arc::new(predictor), cfg.vocabulary.schema(), validator);
            let set = codes(&args.codes);
            let suggestion = suggester.suggest(&set).await?;
            if cli.json {
                print_json(&json!({ "suggestion": suggestion }))?;
            } else {
                match &suggestion {
                    Some(s) => println!(
                        "class {} (p={:.3}){}",
                        s.prediction.class_id,
                        s.prediction.probability,
                        if s.compatible { "" } else { ", does not allow every parameter" }
                    ),
                    None => println!("predictor returned no candidates"),
                }
            }
            Ok(match suggestion {
                Some(s) if s.compatible => 0,
                _ => 1,
            })
        }
    }
}
