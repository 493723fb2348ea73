#![deny(missing_docs)]

//! # Schema Command
//!
//! Lowers one component schema and prints the produced types.

use std::fmt::Write;
use std::path::PathBuf;

use oasc_core::ir::{Kind, Type, TypeArena};
use oasc_core::{load_file, lower_component, ParseOptions};
use serde::Serialize;

use crate::error::CliResult;

/// Arguments for the `schema` command.
#[derive(clap::Args, Debug, Clone)]
pub struct SchemaArgs {
    /// Path to the OpenAPI document (YAML or JSON).
    #[clap(long)]
    pub spec: PathBuf,

    /// Name under `#/components/schemas`.
    #[clap(long)]
    pub name: String,

    /// Print the full type nodes as JSON instead of one line per type.
    #[clap(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct Lowered<'a> {
    root: &'a str,
    types: Vec<&'a Type>,
    arena: &'a TypeArena,
}

/// Renders the types produced for `args.name`.
pub fn render(args: &SchemaArgs) -> CliResult<String> {
    let parse = ParseOptions::default();
    let doc = load_file(&args.spec, &parse)?;
    let (arena, storage, root) = lower_component(&doc, &args.name, &parse)?;

    if args.json {
        let lowered = Lowered {
            root: &arena[root].name,
            types: storage.types.values().map(|&id| &arena[id]).collect(),
            arena: &arena,
        };
        return Ok(serde_json::to_string_pretty(&lowered)?);
    }

    let mut out = String::new();
    for (name, &id) in &storage.types {
        let marker = if id == root { "*" } else { " " };
        let t = &arena[id];
        let _ = match &t.kind {
            Kind::Alias { to } | Kind::Generic { of: to, .. } => {
                writeln!(out, "{marker} {name} ({:?} of {})", t.tag(), arena.type_expr(*to))
            }
            _ => writeln!(out, "{marker} {name} ({:?})", t.tag()),
        };
    }
    Ok(out)
}

/// Executes the `schema` command.
pub fn execute(args: &SchemaArgs) -> CliResult<()> {
    print!("{}", render(args)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    fn write_spec(dir: &std::path::Path) -> PathBuf {
        let spec = dir.join("openapi.yaml");
        fs::write(
            &spec,
            r#"
openapi: 3.0.3
info: {title: T, version: "1"}
paths: {}
components:
  schemas:
    Pet:
      type: object
      required: [name]
      properties:
        name: {type: string}
        kind:
          type: string
          enum: [cat, dog]
"#,
        )
        .unwrap();
        spec
    }

    #[test]
    fn test_render_lines() {
        let dir = tempdir().unwrap();
        let out = render(&SchemaArgs {
            spec: write_spec(dir.path()),
            name: "Pet".into(),
            json: false,
        })
        .unwrap();
        assert!(out.lines().any(|l| l == "* Pet (Struct)"));
        assert!(out.lines().any(|l| l == "  PetKind (Enum)"));
    }

    #[test]
    fn test_render_json() {
        let dir = tempdir().unwrap();
        let out = render(&SchemaArgs {
            spec: write_spec(dir.path()),
            name: "Pet".into(),
            json: true,
        })
        .unwrap();
        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["root"], "Pet");
    }

    #[test]
    fn test_unknown_component() {
        let dir = tempdir().unwrap();
        let err = render(&SchemaArgs {
            spec: write_spec(dir.path()),
            name: "Nope".into(),
            json: false,
        })
        .unwrap_err();
        assert!(err.to_string().contains("not found"));
    }
}
