//! Named server lowering.

use crate::error::{AppError, AppResult, ResultExt};
use crate::ir;
use crate::naming::pascal_non_empty;
use crate::spec::{self, parse_path, PathPart};
use std::collections::HashSet;
use tracing::warn;

/// Lowers a server carrying `x-ogen-server-name`.
///
/// Every `{variable}` of the URL must be declared; a declared default must
/// be one of the variable's `enum` values when those are given.
pub fn generate_server(name: &str, server: &spec::Server) -> AppResult<ir::Server> {
    let server_name = pascal_non_empty(&[name]).at(&server.location)?;
    let template = parse_path(&server.url).at(&server.location)?;

    let mut params = Vec::new();
    let mut seen = HashSet::new();
    for part in &template {
        let PathPart::Param(var) = part else {
            continue;
        };
        if !seen.insert(var.as_str()) {
            continue;
        }
        let Some(variable) = server.variables.get(var) else {
            return Err(AppError::General(format!(
                "server variable {var:?} is not defined"
            )))
            .at(&server.location);
        };
        if !variable.enum_values.is_empty() && !variable.enum_values.contains(&variable.default) {
            return Err(AppError::General(format!(
                "default value {:?} of server variable {var:?} is not in enum",
                variable.default
            )))
            .at(&server.location);
        }
        params.push(ir::ServerParam {
            name: pascal_non_empty(&[var]).at(&server.location)?,
            spec: variable.clone(),
        });
    }

    for var in server.variables.keys() {
        let used = template
            .iter()
            .any(|part| matches!(part, PathPart::Param(p) if p == var));
        if !used {
            warn!(location = %server.location, variable = %var, "Server variable is not used");
        }
    }

    Ok(ir::Server {
        name: server_name,
        params,
        template,
        spec: server.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn server(url: &str, vars: &[(&str, &str, &[&str])]) -> spec::Server {
        spec::Server {
            url: url.into(),
            name: Some("prod".into()),
            variables: vars
                .iter()
                .map(|(name, default, values)| {
                    (
                        name.to_string(),
                        spec::ServerVariable {
                            default: default.to_string(),
                            enum_values: values.iter().map(|v| v.to_string()).collect(),
                            description: String::new(),
                        },
                    )
                })
                .collect::<IndexMap<_, _>>(),
            ..Default::default()
        }
    }

    #[test]
    fn test_template_server() {
        let s = server(
            "https://{region}.example.com/{version}",
            &[("region", "eu", &["eu", "us"]), ("version", "v1", &[])],
        );
        let lowered = generate_server("prod", &s).unwrap();
        assert_eq!(lowered.name, "Prod");
        assert!(lowered.is_template());
        assert_eq!(
            lowered.params.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            vec!["Region", "Version"]
        );
        assert_eq!(lowered.format_string(), "https://%s.example.com/%s");
    }

    #[test]
    fn test_missing_variable() {
        let s = server("https://{region}.example.com", &[]);
        let err = generate_server("prod", &s).unwrap_err();
        assert!(err.to_string().contains("\"region\" is not defined"));
    }

    #[test]
    fn test_default_not_in_enum() {
        let s = server("https://{region}.example.com", &[("region", "asia", &["eu", "us"])]);
        assert!(generate_server("prod", &s).is_err());
    }
}
