//! Security requirement lowering.

use super::vet_header_name;
use crate::context::GenCtx;
use crate::error::{AppError, AppResult, ResultExt};
use crate::ir::{self, Field, Kind, NilSemantic, PrimitiveType, SecurityFormat, SecurityKind, Type};
use crate::naming::pascal_non_empty;
use crate::spec::{self, Location, SecurityRequirement};
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// Lowers the security requirements of operation `op_name`.
///
/// Schemes already lowered (in `known` or in `local`) are reused with the
/// operation's scopes appended; new ones are added to `local`. A requirement
/// naming a scheme that fails with a skippable error is dropped as a whole.
pub fn generate_securities(
    ctx: &mut GenCtx<'_>,
    known: &IndexMap<String, ir::Security>,
    local: &mut IndexMap<String, ir::Security>,
    schemes: &IndexMap<String, spec::SecurityScheme>,
    op_name: &str,
    location: &Location,
    requirements: &[SecurityRequirement],
) -> AppResult<ir::SecurityRequirements> {
    let mut result = ir::SecurityRequirements::default();
    for (idx, requirement) in requirements.iter().enumerate() {
        let lowered = ctx.skippable("Skipping security", location, |ctx| {
            let mut out = Vec::with_capacity(requirement.len());
            for (name, scopes) in requirement {
                let existing = local.get(name).or_else(|| known.get(name));
                let security = generate_security(ctx, existing, schemes, op_name, name, scopes)
                    .map_err(|e| requirement_error(e, idx, name))?;
                out.push((name.clone(), security));
            }
            Ok(out)
        })?;
        let Some(lowered) = lowered else {
            continue;
        };

        let mut set = Vec::with_capacity(lowered.len());
        for (name, security) in lowered {
            local.insert(name.clone(), security);
            let pos = match result.securities.iter().position(|s| *s == name) {
                Some(pos) => pos,
                None => {
                    result.securities.push(name);
                    result.securities.len() - 1
                }
            };
            if !set.contains(&pos) {
                set.push(pos);
            }
        }
        set.sort_unstable();
        result.requirements.push(set);
    }
    Ok(result)
}

fn requirement_error(err: AppError, idx: usize, name: &str) -> AppError {
    match err {
        AppError::General(msg) => {
            AppError::General(format!("security requirement {idx}: scheme {name:?}: {msg}"))
        }
        other => other,
    }
}

fn generate_security(
    ctx: &mut GenCtx<'_>,
    existing: Option<&ir::Security>,
    schemes: &IndexMap<String, spec::SecurityScheme>,
    op_name: &str,
    name: &str,
    scopes: &[String],
) -> AppResult<ir::Security> {
    if let Some(existing) = existing {
        let mut security = existing.clone();
        security
            .scopes
            .entry(op_name.to_string())
            .or_default()
            .extend(scopes.iter().cloned());
        return Ok(security);
    }

    let Some(scheme) = schemes.get(name) else {
        return Err(AppError::General(format!("unknown security scheme {name:?}")));
    };
    let type_name = pascal_non_empty(&[name]).at(&scheme.location)?;

    let (kind, format, parameter_name, fields) = if scheme.custom {
        (SecurityKind::Header, SecurityFormat::Custom, String::new(), custom_fields(ctx))
    } else {
        match scheme.ty.as_str() {
            "apiKey" => api_key(ctx, scheme)?,
            "http" => http(ctx, scheme)?,
            "oauth2" | "openIdConnect" => {
                if let Some(flows) = &scheme.flows {
                    if let Some(scope) = scopes.iter().find(|s| !flows.has_scope(s)) {
                        return Err(AppError::General(format!("unknown scope {scope:?}")))
                            .at(&scheme.location);
                    }
                }
                return Err(AppError::not_implemented(format!("{} security", scheme.ty)));
            }
            "mutualTLS" => return Err(AppError::not_implemented("mutualTLS security")),
            other => {
                return Err(AppError::General(format!("unknown security type {other:?}")))
                    .at(&scheme.location);
            }
        }
    };

    let mut t = Type::new(type_name.clone(), Kind::empty_struct());
    t.doc = scheme.description.clone();
    if let Some(slot) = t.fields_mut() {
        *slot = fields;
    }
    let ty = ctx.alloc_saved(t)?;

    Ok(ir::Security {
        name: type_name,
        kind,
        format,
        parameter_name,
        description: scheme.description.clone(),
        ty,
        scopes: BTreeMap::from([(op_name.to_string(), scopes.to_vec())]),
    })
}

type Lowered = (SecurityKind, SecurityFormat, String, Vec<Field>);

fn string_field(ctx: &mut GenCtx<'_>, name: &str) -> Field {
    let t = ctx.alloc(Type::primitive(PrimitiveType::String, None));
    Field::new(name, t, "")
}

fn roles_field(ctx: &mut GenCtx<'_>) -> Field {
    let item = ctx.alloc(Type::primitive(PrimitiveType::String, None));
    let roles = ctx.alloc(Type::new(
        "",
        Kind::Array {
            item,
            nil: NilSemantic::Optional,
        },
    ));
    Field::new("Roles", roles, "")
}

fn api_key(ctx: &mut GenCtx<'_>, scheme: &spec::SecurityScheme) -> AppResult<Lowered> {
    if scheme.name.is_empty() {
        return Err(AppError::General(format!(
            "invalid \"apiKey\" name {:?}",
            scheme.name
        )))
        .at(&scheme.location);
    }
    let kind = match scheme.location_in.as_str() {
        "query" => SecurityKind::Query,
        "header" => {
            vet_header_name(&scheme.name, &scheme.location, &[]);
            SecurityKind::Header
        }
        "cookie" => return Err(AppError::not_implemented("cookie security")),
        other => {
            return Err(AppError::General(format!("unknown \"in\" value {other:?}")))
                .at(&scheme.location);
        }
    };
    let fields = vec![string_field(ctx, "APIKey"), roles_field(ctx)];
    Ok((kind, SecurityFormat::ApiKey, scheme.name.clone(), fields))
}

fn http(ctx: &mut GenCtx<'_>, scheme: &spec::SecurityScheme) -> AppResult<Lowered> {
    let (format, mut fields) = match scheme.scheme.to_ascii_lowercase().as_str() {
        "basic" => (
            SecurityFormat::Basic,
            vec![string_field(ctx, "Username"), string_field(ctx, "Password")],
        ),
        "bearer" => (SecurityFormat::Bearer, vec![string_field(ctx, "Token")]),
        _ => return Err(AppError::not_implemented("http security scheme")),
    };
    fields.push(roles_field(ctx));
    Ok((SecurityKind::Header, format, "Authorization".to_string(), fields))
}

fn custom_fields(ctx: &mut GenCtx<'_>) -> Vec<Field> {
    let mut request = Type::any(None);
    request.doc = "Raw HTTP request.".to_string();
    let request = ctx.alloc(request);
    vec![Field::new("Request", request, ""), roles_field(ctx)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{LowerOptions, SkipPolicy};
    use crate::ir::TypeArena;
    use crate::spec::SchemaArena;
    use crate::storage::Storage;

    fn scheme(ty: &str, location_in: &str, name: &str, http_scheme: &str) -> spec::SecurityScheme {
        spec::SecurityScheme {
            ty: ty.into(),
            name: name.into(),
            location_in: location_in.into(),
            scheme: http_scheme.into(),
            ..Default::default()
        }
    }

    fn requirement(names: &[&str]) -> SecurityRequirement {
        names.iter().map(|n| (n.to_string(), Vec::new())).collect()
    }

    #[test]
    fn test_requirements_share_scheme_indices() {
        let schemes = IndexMap::from([
            ("api_key".to_string(), scheme("apiKey", "header", "X-Api-Key", "")),
            ("basic".to_string(), scheme("http", "", "", "basic")),
        ]);
        let mut arena = TypeArena::new();
        let schemas = SchemaArena::default();
        let global = Storage::new();
        let mut policy = SkipPolicy::new(Vec::new(), None);
        let opts = LowerOptions::default();
        let mut ctx = GenCtx::new(&mut arena, &schemas, &global, &mut policy, &opts);

        let mut local = IndexMap::new();
        let reqs = vec![
            requirement(&["api_key"]),
            requirement(&["basic", "api_key"]),
        ];
        let result = generate_securities(
            &mut ctx,
            &IndexMap::new(),
            &mut local,
            &schemes,
            "GetPet",
            &Location::default(),
            &reqs,
        )
        .unwrap();

        assert_eq!(result.securities, vec!["api_key", "basic"]);
        assert_eq!(result.requirements, vec![vec![0], vec![0, 1]]);
        assert_eq!(local["api_key"].format, SecurityFormat::ApiKey);
        assert_eq!(local["api_key"].parameter_name, "X-Api-Key");
        assert_eq!(local["basic"].format, SecurityFormat::Basic);
        assert!(ctx.lookup_type("APIKey").is_some());
    }

    #[test]
    fn test_cookie_api_key_is_skippable() {
        let schemes = IndexMap::from([
            ("cookie".to_string(), scheme("apiKey", "cookie", "session", "")),
            ("bearer".to_string(), scheme("http", "", "", "Bearer")),
        ]);
        let mut arena = TypeArena::new();
        let schemas = SchemaArena::default();
        let global = Storage::new();
        let mut policy = SkipPolicy::new(vec!["cookie security".into()], None);
        let opts = LowerOptions::default();
        let mut ctx = GenCtx::new(&mut arena, &schemas, &global, &mut policy, &opts);

        let mut local = IndexMap::new();
        let reqs = vec![requirement(&["cookie"]), requirement(&["bearer"])];
        let result = generate_securities(
            &mut ctx,
            &IndexMap::new(),
            &mut local,
            &schemes,
            "Op",
            &Location::default(),
            &reqs,
        )
        .unwrap();

        assert_eq!(result.securities, vec!["bearer"]);
        assert_eq!(result.requirements, vec![vec![0]]);
        assert!(!local.contains_key("cookie"));
        assert!(ctx.lookup_type("Cookie").is_none());
    }

    #[test]
    fn test_oauth2_checks_scopes_first() {
        let mut oauth = scheme("oauth2", "", "", "");
        oauth.flows = Some(spec::OAuthFlows {
            implicit: Some(spec::OAuthFlow {
                scopes: IndexMap::from([("read".to_string(), String::new())]),
            }),
            ..Default::default()
        });
        let schemes = IndexMap::from([("oauth".to_string(), oauth)]);
        let mut arena = TypeArena::new();
        let schemas = SchemaArena::default();
        let global = Storage::new();
        let mut policy = SkipPolicy::new(vec!["all".into()], None);
        let opts = LowerOptions::default();
        let mut ctx = GenCtx::new(&mut arena, &schemas, &global, &mut policy, &opts);

        let known = IndexMap::new();
        let mut local = IndexMap::new();
        let ok = IndexMap::from([("oauth".to_string(), vec!["read".to_string()])]);
        let result = generate_securities(
            &mut ctx, &known, &mut local, &schemes, "Op", &Location::default(), &[ok],
        )
        .unwrap();
        assert!(result.is_empty());

        let bad = IndexMap::from([("oauth".to_string(), vec!["write".to_string()])]);
        let err = generate_securities(
            &mut ctx, &known, &mut local, &schemes, "Op", &Location::default(), &[bad],
        )
        .unwrap_err();
        assert!(err.to_string().contains("unknown scope"));
    }

    #[test]
    fn test_existing_scheme_gets_scopes() {
        let mut known = IndexMap::new();
        known.insert(
            "bearer".to_string(),
            ir::Security {
                name: "Bearer".into(),
                kind: SecurityKind::Header,
                format: SecurityFormat::Bearer,
                parameter_name: "Authorization".into(),
                description: String::new(),
                ty: ir::TypeId::PENDING,
                scopes: BTreeMap::from([("First".to_string(), vec![])]),
            },
        );
        let mut arena = TypeArena::new();
        let schemas = SchemaArena::default();
        let global = Storage::new();
        let mut policy = SkipPolicy::new(Vec::new(), None);
        let opts = LowerOptions::default();
        let mut ctx = GenCtx::new(&mut arena, &schemas, &global, &mut policy, &opts);

        let mut local = IndexMap::new();
        let req = IndexMap::from([("bearer".to_string(), vec!["admin".to_string()])]);
        generate_securities(
            &mut ctx,
            &known,
            &mut local,
            &IndexMap::new(),
            "Second",
            &Location::default(),
            &[req],
        )
        .unwrap();
        let scopes = &local["bearer"].scopes;
        assert_eq!(scopes["First"], Vec::<String>::new());
        assert_eq!(scopes["Second"], vec!["admin".to_string()]);
    }
}
