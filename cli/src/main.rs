#![deny(missing_docs)]

//! # OASC CLI
//!
//! Command line front-end for the OpenAPI compiler.
//!
//! Supported Commands:
//! - `ir`: Lowers a document and writes the emitter input as JSON.
//! - `routes`: Prints the route tree.
//! - `schema`: Lowers a single component schema.

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use crate::error::CliResult;

mod error;
mod ir;
mod routes;
mod schema;

const DEFAULT_FILTER: &str = "oasc=info";

#[derive(Parser, Debug)]
#[clap(author, version, about = "OpenAPI front-end compiler")]
struct Cli {
    /// Log filter, e.g. `debug` or `oasc_core=trace`. Overrides `RUST_LOG`.
    #[clap(long, global = true, env = "OASC_LOG")]
    log_level: Option<String>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Lower a document and write the emitter input as JSON.
    Ir(ir::IrArgs),
    /// Print the route tree of a document.
    Routes(routes::RoutesArgs),
    /// Lower one component schema and print its types.
    Schema(schema::SchemaArgs),
}

fn init_tracing(level: Option<&str>) {
    let filter = match level {
        Some(level) => EnvFilter::new(level),
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER)),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> CliResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_level.as_deref());

    match &cli.command {
        Commands::Ir(args) => ir::execute(args)?,
        Commands::Routes(args) => routes::execute(args)?,
        Commands::Schema(args) => schema::execute(args)?,
    }

    Ok(())
}
