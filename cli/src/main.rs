use anyhow::{Context, bail};
use clap::Parser;
use oxflow::{
    EchoRunner, Pipeline, PipelineConfig, PipelineError, PipelineRequest, SignatureDefinition,
};
use oxshape::{ShaclProcessor, ShapeFormat, ShapeSource, ValidationEngineContext};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::ffi::OsStr;
use std::fs;
use std::io::{Write, stdout};
use std::path::Path;
use std::process::ExitCode;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod cli;

use cli::{Args, Command};

pub fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();
    init_logging(args.log_json);
    let mut config = match &args.config {
        Some(path) => read_json::<PipelineConfig>(path)?,
        None => PipelineConfig::default(),
    };
    match args.command {
        Command::Compile {
            shapes,
            format,
            legacy,
        } => {
            let source = read_shapes(&shapes, format.as_deref())?;
            let context = ValidationEngineContext::new(config.engine);
            let processor = ShaclProcessor::new(&context);
            let compiled = if legacy {
                processor.compile_legacy(&source)
            } else {
                processor.compile(&source)
            }
            .with_context(|| format!("Failed to compile {}", shapes.display()))?;
            info!(rules = compiled.rule_count(), "compiled shapes");
            write_json(&compiled)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Validate {
            shapes,
            format,
            data,
            legacy_mode,
        } => {
            config.engine.legacy_mode |= legacy_mode;
            let source = read_shapes(&shapes, format.as_deref())?;
            let data = read_json::<Map<String, Value>>(&data)?;
            let context = ValidationEngineContext::new(config.engine);
            let processor = ShaclProcessor::new(&context);
            let compiled = processor
                .compile(&source)
                .with_context(|| format!("Failed to compile {}", shapes.display()))?;
            let result = processor.validate_data(&data, &compiled.rules());
            write_json(&result)?;
            Ok(if result.valid {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
        Command::Run {
            shapes,
            format,
            inputs,
            signatures,
        } => {
            let request = PipelineRequest {
                shapes: read_shapes(&shapes, format.as_deref())?,
                signatures: read_json::<Vec<SignatureDefinition>>(&signatures)?,
                inputs: read_json::<Map<String, Value>>(&inputs)?,
            };
            match Pipeline::new(config, EchoRunner).run(request) {
                Ok(outcome) => {
                    write_json(&outcome)?;
                    Ok(ExitCode::SUCCESS)
                }
                Err(PipelineError::ExecutionFailed { result }) => {
                    warn!(failures = result.failure_count(), "inputs are invalid");
                    write_json(&result)?;
                    Ok(ExitCode::FAILURE)
                }
                Err(e) => Err(e.into()),
            }
        }
    }
}

fn init_logging(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn read_shapes(path: &Path, format: Option<&str>) -> anyhow::Result<ShapeSource> {
    let format = if let Some(name) = format {
        name.parse()?
    } else {
        shape_format_from_path(path)?
    };
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read the shapes file {}", path.display()))?;
    Ok(ShapeSource::new(text, format))
}

fn shape_format_from_path(path: &Path) -> anyhow::Result<ShapeFormat> {
    let Some(extension) = path.extension().and_then(OsStr::to_str) else {
        bail!(
            "The --format option must be set when the shapes file {} has no extension",
            path.display()
        )
    };
    ShapeFormat::from_extension(extension).with_context(|| {
        format!("The file extension '{extension}' is unknown, set the --format option")
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> anyhow::Result<T> {
    let file = fs::File::open(path)
        .with_context(|| format!("Failed to open the JSON file {}", path.display()))?;
    serde_json::from_reader(file)
        .with_context(|| format!("The JSON file {} is invalid", path.display()))
}

fn write_json(value: &impl Serialize) -> anyhow::Result<()> {
    let mut stdout = stdout().lock();
    serde_json::to_writer_pretty(&mut stdout, value)?;
    writeln!(stdout)?;
    Ok(())
}
