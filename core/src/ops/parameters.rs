//! Parameter lowering.

use super::vet_header_name;
use crate::context::GenCtx;
use crate::error::{AppError, AppResult, ResultExt};
use crate::ir::{self, Feature, Kind, TypeArena, TypeId};
use crate::naming::{capitalize, clean_ref, pascal, pascal_non_empty, pascal_special};
use crate::schema::generate_schema;
use crate::spec::{self, ParameterIn, ParameterStyle, SchemaType};
use std::collections::{HashMap, HashSet};
use tracing::warn;

/// Lowers the parameters of operation `op_name`.
///
/// Header parameters named `Content-Type` or `Authorization` are ignored.
/// Skippable failures drop the parameter, except for path parameters.
/// Names shared by parameters of different locations get a location
/// prefix (`QueryID`, `PathID`).
pub fn generate_parameters(
    ctx: &mut GenCtx<'_>,
    op_name: &str,
    params: &[spec::Parameter],
) -> AppResult<Vec<ir::Parameter>> {
    let mut result = Vec::with_capacity(params.len());
    for p in params {
        if p.location_in == ParameterIn::Header
            && vet_header_name(&p.name, &p.location, &["Content-Type", "Authorization"])
        {
            continue;
        }

        if p.location_in == ParameterIn::Path {
            result.push(generate_parameter(ctx, op_name, p)?);
            continue;
        }
        let lowered = ctx.skippable("Skipping parameter", &p.location, |ctx| {
            generate_parameter(ctx, op_name, p)
        })?;
        result.extend(lowered);
    }

    resolve_name_collisions(&mut result)?;
    Ok(result)
}

fn resolve_name_collisions(params: &mut [ir::Parameter]) -> AppResult<()> {
    for i in 0..params.len() {
        for j in 0..params.len() {
            if i == j || params[i].name != params[j].name {
                continue;
            }
            let same_in = params[i].spec.location_in == params[j].spec.location_in;
            let same_name = params[i].spec.name == params[j].spec.name;
            if same_in && same_name {
                return Err(AppError::General(format!(
                    "duplicate parameter {:?} in {}",
                    params[i].spec.name, params[i].spec.location_in
                )))
                .at(&params[j].spec.location);
            }
            if same_in {
                let left = pascal_special(&[&params[i].spec.name]);
                let right = pascal_special(&[&params[j].spec.name]);
                if left == right {
                    return Err(AppError::not_implemented("too similar parameter name"))
                        .at(&params[j].spec.location);
                }
                params[i].name = left;
                params[j].name = right;
            } else {
                for idx in [i, j] {
                    let prefix = capitalize(&params[idx].spec.location_in.to_string());
                    params[idx].name = format!("{prefix}{}", params[idx].name);
                }
            }
        }
    }
    Ok(())
}

pub(super) fn generate_parameter(
    ctx: &mut GenCtx<'_>,
    op_name: &str,
    p: &spec::Parameter,
) -> AppResult<ir::Parameter> {
    check_param_style(ctx, p).at(&p.location)?;

    let type_name = match &p.xref {
        Some(reference) => pascal_non_empty(&[&clean_ref(reference)]),
        None => Ok(pascal(&[op_name, &p.name])),
    }
    .at(&p.location)?;

    let ty = match &p.content {
        Some((content_type, media)) => {
            if content_type != "application/json" {
                return Err(AppError::not_implemented("parameter content encoding"))
                    .at(&media.location);
            }
            let t = generate_schema(ctx, &type_name, media.schema, !p.required)?;
            ctx.arena.add_feature(t, Feature::Json);
            t
        }
        None => {
            let t = generate_schema(ctx, &type_name, p.schema, !p.required)?;
            is_param_allowed(ctx.arena, t, true, &mut HashSet::new())
                .map_err(|e| prefixed(e, &p.name))
                .at(&p.location)?;
            ctx.arena.add_feature(t, Feature::Uri);
            t
        }
    };

    let name = pascal_non_empty(&[&p.name]).at(&p.location)?;
    Ok(ir::Parameter {
        name,
        ty,
        spec: p.clone(),
    })
}

fn prefixed(err: AppError, name: &str) -> AppError {
    match err {
        AppError::General(msg) => AppError::General(format!("{name:?}: {msg}")),
        other => other,
    }
}

fn check_param_style(ctx: &GenCtx<'_>, p: &spec::Parameter) -> AppResult<()> {
    match p.location_in {
        ParameterIn::Cookie => return Err(AppError::not_implemented("cookie parameters")),
        _ if !p.style.allowed_in(p.location_in) => {
            return Err(AppError::General(format!(
                "style {:?} is not allowed in {}",
                p.style, p.location_in
            )));
        }
        _ => {}
    }
    match p.style {
        ParameterStyle::SpaceDelimited => {
            Err(AppError::not_implemented("spaceDelimited parameter style"))
        }
        ParameterStyle::PipeDelimited
            if p.schema
                .is_some_and(|s| ctx.schemas[s].ty == SchemaType::Object) =>
        {
            Err(AppError::not_implemented(
                "pipeDelimited style for object parameters",
            ))
        }
        _ => Ok(()),
    }
}

/// Checks that a parameter type is flat: scalars, arrays of scalars, or a
/// struct of scalars.
pub fn is_param_allowed(
    arena: &TypeArena,
    t: TypeId,
    root: bool,
    visited: &mut HashSet<TypeId>,
) -> AppResult<()> {
    if !visited.insert(t) {
        return Ok(());
    }
    match &arena[t].kind {
        Kind::Primitive { .. } | Kind::Enum { .. } => Ok(()),
        Kind::Array { item, .. } => {
            if !root {
                return Err(AppError::General("nested arrays not allowed".into()));
            }
            is_param_allowed(arena, *item, false, visited)
        }
        Kind::Alias { to } | Kind::Pointer { to, .. } => is_param_allowed(arena, *to, root, visited),
        Kind::Generic { of, .. } => is_param_allowed(arena, *of, root, visited),
        Kind::Struct { fields, .. } => {
            if !root {
                return Err(AppError::General("nested objects not allowed".into()));
            }
            for field in fields {
                is_param_allowed(arena, field.ty, false, visited).map_err(|e| match e {
                    AppError::General(msg) => {
                        AppError::General(format!("field {:?}: {msg}", field.name))
                    }
                    other => other,
                })?;
            }
            Ok(())
        }
        Kind::Sum { .. } => Err(AppError::not_implemented("sum type parameter")),
        Kind::Map { .. } => Err(AppError::not_implemented(
            "object with additionalProperties",
        )),
        Kind::Any => Err(AppError::not_implemented("any type parameter")),
        Kind::Interface { .. } | Kind::Stream => Err(AppError::General(format!(
            "unexpected {} parameter type",
            arena[t].tag()
        ))),
    }
}

/// Lowers a path template, linking each placeholder to its parameter.
///
/// Path parameters declared but absent from the template are reported with
/// a warning.
pub fn convert_path_parts(op: &spec::Operation, params: &[ir::Parameter]) -> AppResult<Vec<ir::PathPart>> {
    let by_name: HashMap<&str, usize> = params
        .iter()
        .enumerate()
        .filter(|(_, p)| p.spec.location_in == ParameterIn::Path)
        .map(|(i, p)| (p.spec.name.as_str(), i))
        .collect();

    let mut used = HashSet::new();
    let mut result = Vec::with_capacity(op.path_parts.len());
    for part in &op.path_parts {
        match part {
            spec::PathPart::Raw(raw) => result.push(ir::PathPart::Raw(raw.clone())),
            spec::PathPart::Param(name) => {
                let Some(&idx) = by_name.get(name.as_str()) else {
                    return Err(AppError::General(format!(
                        "path parameter {name:?} not found"
                    )))
                    .at(&op.location);
                };
                used.insert(name.as_str());
                result.push(ir::PathPart::Param(idx));
            }
        }
    }

    for p in op.parameters.iter().filter(|p| p.location_in == ParameterIn::Path) {
        if !used.contains(p.name.as_str()) {
            warn!(location = %p.location, name = %p.name, "Path parameter is not used");
        }
    }
    Ok(result)
}
