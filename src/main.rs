use std::{
    io::Read,
    path::{Path, PathBuf},
};

use clap::Parser;
use hadrian_scim::{
    config::{ConfigError, ScimConfig},
    observability::init_tracing,
    scim::{Attributes, ScimEngine, ScimError, ScimErrorResponse, ValidatedOperation},
};
use serde_json::{Value, json};

/// CLI arguments for the SCIM engine
#[derive(Parser, Debug)]
#[command(version, about = "SCIM 2.0 filter and PATCH engine", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,

    /// Path to config file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(clap::Subcommand, Debug)]
enum Command {
    /// Print the resources that match a filter
    Filter {
        #[arg(short = 't', long, value_enum, default_value = "user")]
        resource_type: ResourceType,
        /// Filter expression; all resources match when omitted
        #[arg(short, long)]
        filter: Option<String>,
        /// JSON array of resources (defaults to stdin)
        input: Option<PathBuf>,
    },
    /// Validate a PATCH request and print the normalized operations
    Patch {
        #[arg(short = 't', long, value_enum, default_value = "user")]
        resource_type: ResourceType,
        /// PatchOp request body (defaults to stdin)
        input: Option<PathBuf>,
    },
    /// Print the schemas for a resource type
    Schema {
        #[arg(short = 't', long, value_enum, default_value = "user")]
        resource_type: ResourceType,
    },
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ResourceType {
    User,
    Group,
}

impl ResourceType {
    fn engine(self) -> ScimEngine {
        match self {
            ResourceType::User => ScimEngine::users(),
            ResourceType::Group => ScimEngine::groups(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Failed to read {0}: {1}")]
    Input(String, std::io::Error),

    #[error(transparent)]
    Scim(#[from] ScimError),
}

fn main() {
    let args = Args::parse();

    let config = match load_config(args.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = init_tracing(&config.observability.logging) {
        eprintln!("Warning: {}", e);
    }

    let result = match args.command {
        Command::Filter {
            resource_type,
            filter,
            input,
        } => run_filter(
            &resource_type.engine().with_config(&config),
            filter.as_deref(),
            input.as_deref(),
        ),
        Command::Patch {
            resource_type,
            input,
        } => run_patch(&resource_type.engine().with_config(&config), input.as_deref()),
        Command::Schema { resource_type } => run_schema(&resource_type.engine()),
    };

    match result {
        Ok(output) => println!("{}", output),
        Err(CliError::Scim(e)) => {
            tracing::debug!(error = %e, "Request rejected");
            println!("{}", pretty(&ScimErrorResponse::from(e)));
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<ScimConfig, ConfigError> {
    match path {
        Some(path) => ScimConfig::from_file(path),
        None => Ok(ScimConfig::default()),
    }
}

fn read_input(path: Option<&Path>) -> Result<Value, CliError> {
    let contents = match path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| CliError::Input(path.display().to_string(), e))?,
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .map_err(|e| CliError::Input("stdin".into(), e))?;
            buf
        }
    };
    Ok(serde_json::from_str(&contents).map_err(ScimError::from)?)
}

fn run_filter(
    engine: &ScimEngine,
    filter: Option<&str>,
    input: Option<&Path>,
) -> Result<String, CliError> {
    let resources = match read_input(input)? {
        Value::Array(items) => items
            .iter()
            .map(Attributes::from_json)
            .collect::<Result<Vec<_>, _>>()?,
        other => vec![Attributes::from_json(&other)?],
    };

    let matched = engine.filter_resources(filter, resources)?;
    let output: Vec<Value> = matched.iter().map(Attributes::to_json).collect();
    Ok(pretty(&output))
}

fn run_patch(engine: &ScimEngine, input: Option<&Path>) -> Result<String, CliError> {
    let body = read_input(input)?;
    let operations = engine.validate_patch(&body)?;
    let output: Vec<Value> = operations.iter().map(operation_json).collect();
    Ok(pretty(&output))
}

fn run_schema(engine: &ScimEngine) -> Result<String, CliError> {
    let schemas: Vec<_> = std::iter::once(engine.schema())
        .chain(engine.extensions())
        .collect();
    Ok(pretty(&schemas))
}

fn operation_json(operation: &ValidatedOperation) -> Value {
    let mut out = json!({ "op": operation.op });
    if let Some(path) = &operation.path {
        out["path"] = json!(path);
    }
    if let Some(value) = &operation.value {
        out["value"] = value.to_json();
    }
    out
}

fn pretty<T: serde::Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|e| format!("{{\"error\": \"{}\"}}", e))
}
