#![deny(missing_docs)]

//! # IR Command
//!
//! Runs the whole pipeline and writes the emitter input as JSON.

use std::fs;
use std::path::{Path, PathBuf};

use oasc_core::{Config, Generator};
use tracing::info;

use crate::error::CliResult;

/// Arguments for the `ir` command.
#[derive(clap::Args, Debug, Clone)]
pub struct IrArgs {
    /// Path to the OpenAPI document (YAML or JSON).
    #[clap(long)]
    pub spec: PathBuf,

    /// Optional YAML/JSON config file.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Package name recorded in the output.
    #[clap(long, default_value = "api")]
    pub package: String,

    /// Output file; stdout when omitted.
    #[clap(long)]
    pub output: Option<PathBuf>,

    /// Not-implemented names to skip (repeatable); `all` skips everything.
    #[clap(long = "ignore-not-implemented")]
    pub ignore_not_implemented: Vec<String>,

    /// Content type alias in `content/type=encoding` form (repeatable).
    #[clap(long = "content-type-alias")]
    pub content_type_aliases: Vec<String>,
}

/// Loads the config named by `args`, applying command line overrides.
pub fn load_config(
    config: Option<&Path>,
    ignore: &[String],
    aliases: &[String],
) -> CliResult<Config> {
    let mut config = match config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    config
        .generator
        .ignore_not_implemented
        .extend(ignore.iter().cloned());
    for alias in aliases {
        config.generator.content_type_aliases.set(alias)?;
    }
    Ok(config)
}

/// Renders the emitter input for `args`.
pub fn render(args: &IrArgs) -> CliResult<String> {
    let config = load_config(
        args.config.as_deref(),
        &args.ignore_not_implemented,
        &args.content_type_aliases,
    )?;
    let generator = Generator::from_file(&args.spec, config)?;
    let json = serde_json::to_string_pretty(&generator.template_config(&args.package))?;
    Ok(json)
}

/// Executes the `ir` command.
pub fn execute(args: &IrArgs) -> CliResult<()> {
    let json = render(args)?;
    match &args.output {
        Some(path) => {
            if let Some(parent) = path.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(path, json)?;
            info!(output = %path.display(), "Wrote IR");
        }
        None => println!("{json}"),
    }
    Ok(())
}
