#![deny(missing_docs)]

//! # Routes Command
//!
//! Prints the route tree of a document.

use std::fmt::Write;
use std::path::PathBuf;

use oasc_core::Generator;

use crate::error::CliResult;
use crate::ir::load_config;

/// Arguments for the `routes` command.
#[derive(clap::Args, Debug, Clone)]
pub struct RoutesArgs {
    /// Path to the OpenAPI document (YAML or JSON).
    #[clap(long)]
    pub spec: PathBuf,

    /// Optional YAML/JSON config file.
    #[clap(long)]
    pub config: Option<PathBuf>,

    /// Not-implemented names to skip (repeatable); `all` skips everything.
    #[clap(long = "ignore-not-implemented")]
    pub ignore_not_implemented: Vec<String>,
}

/// Renders the tree, followed by the webhooks when there are any.
pub fn render(args: &RoutesArgs) -> CliResult<String> {
    let config = load_config(args.config.as_deref(), &args.ignore_not_implemented, &[])?;
    let generator = Generator::from_file(&args.spec, config)?;

    let mut out = generator.router().render(generator.operations());
    let webhooks = &generator.webhook_router().webhooks;
    if !webhooks.is_empty() {
        out.push_str("webhooks:\n");
        for (name, methods) in webhooks {
            let _ = write!(out, "  {name}");
            for (method, &idx) in methods {
                let op = &generator.webhooks()[idx];
                let _ = write!(out, " [{method} {}]", op.name);
            }
            out.push('\n');
        }
    }
    Ok(out)
}

/// Executes the `routes` command.
pub fn execute(args: &RoutesArgs) -> CliResult<()> {
    print!("{}", render(args)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn test_render_tree() {
        let dir = tempdir().unwrap();
        let spec = dir.path().join("openapi.yaml");
        fs::write(
            &spec,
            r#"
openapi: 3.1.0
info: {title: T, version: "1"}
paths:
  /a/b:
    get:
      operationId: getB
      responses: {"200": {description: ok}}
  /a/{id}:
    get:
      operationId: getByID
      parameters:
        - {name: id, in: path, required: true, schema: {type: string}}
      responses: {"200": {description: ok}}
webhooks:
  newPet:
    post:
      responses: {"200": {description: ok}}
"#,
        )
        .unwrap();

        let out = render(&RoutesArgs {
            spec,
            config: None,
            ignore_not_implemented: Vec::new(),
        })
        .unwrap();
        assert_eq!(
            out,
            "<root>\n  /a/\n    b [GET GetB]\n    :id [GET GetByID]\nwebhooks:\n  newPet [POST NewPetPost]\n"
        );
    }
}
