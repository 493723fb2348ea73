//! Response lowering and wrapping.

use super::parameters::generate_parameter;
use super::{generate_contents, vet_header_name};
use crate::context::GenCtx;
use crate::error::{AppResult, ResultExt};
use crate::ir::{self, is_mask, status_text, Field, Kind, PrimitiveType, StatusKey, Type, TypeId};
use crate::naming::{camel, pascal, pascal_non_empty};
use crate::spec::{self, Location, ParameterIn, ParameterStyle};
use crate::storage::WrappedKey;
use indexmap::IndexMap;
use std::collections::BTreeMap;

/// Name part for a response key (`OK`, `4XX`, `Default`).
fn status_name(key: &str) -> String {
    match key.parse::<u16>() {
        Ok(code) if !status_text(code).is_empty() => status_text(code).to_string(),
        Ok(code) => format!("Code{code}"),
        Err(_) if key == "default" => "Default".to_string(),
        Err(_) => key.to_string(),
    }
}

/// Calls `f` for every payload type of `responses`, replacing it with the
/// returned type. The name passed along identifies the arm (`OK`,
/// `OKApplicationJSON`, `Default`).
pub fn walk_response_types(
    responses: &mut ir::Responses,
    mut f: impl FnMut(&str, TypeId) -> AppResult<TypeId>,
) -> AppResult<()> {
    for (key, resp) in responses.iter_mut() {
        let res_name = status_name(&key);
        if let Some(t) = resp.no_content {
            resp.no_content = Some(f(&res_name, t)?);
        }
        let multi = resp.contents.len() > 1;
        for (content_type, media) in resp.contents.iter_mut() {
            let name = if multi {
                pascal(&[&res_name, content_type])
            } else {
                res_name.clone()
            };
            media.ty = f(&name, media.ty)?;
        }
    }
    Ok(())
}

/// Lowers the responses of operation `op_name`.
///
/// Pattern and default responses are wrapped to carry the status code;
/// responses with headers are wrapped to carry them. A single payload is
/// the result type as is, otherwise `<op>Res` is an interface over all of
/// them.
pub fn generate_responses(
    ctx: &mut GenCtx<'_>,
    op_name: &str,
    responses: &IndexMap<String, spec::Response>,
) -> AppResult<ir::Responses> {
    let name = format!("{op_name}Res");
    let mut result = ir::Responses::new(TypeId::PENDING);

    let mut keyed = Vec::with_capacity(responses.len());
    for (key, resp) in responses {
        keyed.push((StatusKey::parse(key).at(&resp.location)?, key, resp));
    }
    for (status, key, resp) in keyed {
        let resp_name = pascal(&[op_name, &status_name(key)]);
        match status {
            StatusKey::Code(code) => {
                let r = response_to_ir(ctx, &resp_name, resp).at(&resp.location)?;
                let r = wrap_response(ctx, &resp_name, r, false).at(&resp.location)?;
                result.status_code.insert(code, r);
            }
            StatusKey::Pattern(class) => {
                let r = response_to_ir(ctx, &resp_name, resp).at(&resp.location)?;
                let r = wrap_response(ctx, &resp_name, r, true).at(&resp.location)?;
                result.pattern[usize::from(class - 1)] = Some(r);
            }
            StatusKey::Default if ctx.opts.skip_default_response => {}
            StatusKey::Default => {
                let resp_name = format!("{op_name}Def");
                let r = response_to_ir(ctx, &resp_name, resp).at(&resp.location)?;
                let r = wrap_response(ctx, &resp_name, r, true).at(&resp.location)?;
                result.default = Some(r);
            }
        }
    }

    let types: Vec<TypeId> = result.iter().flat_map(|(_, r)| r.types().collect::<Vec<_>>()).collect();
    if let [single] = types.as_slice() {
        result.ty = *single;
        return Ok(result);
    }

    let iface = ctx.alloc(Type::new(name.clone(), Kind::empty_interface()));
    ctx.arena.add_method(iface, camel(&[&name]));
    ctx.save_type(iface)?;
    walk_response_types(&mut result, |res_name, t| {
        let t = if ctx.arena[t].can_have_methods() {
            t
        } else {
            ctx.alloc_saved(Type::new(pascal(&[op_name, res_name]), Kind::Alias { to: t }))?
        };
        ctx.arena.implement(t, iface)?;
        Ok(t)
    })?;
    result.ty = iface;
    Ok(result)
}

/// Lowers one response. Responses reached through `$ref` are lowered once
/// and named after the component.
pub fn response_to_ir(
    ctx: &mut GenCtx<'_>,
    name: &str,
    resp: &spec::Response,
) -> AppResult<ir::Response> {
    let mut name = name.to_string();
    let mut doc = String::new();
    if let Some(reference) = &resp.xref {
        if let Some(cached) = ctx.lookup_response(reference) {
            return Ok(cached.clone());
        }
        name = pascal_non_empty(&[reference.trim_start_matches("#/components/responses/")])?;
        doc = format!("Ref: {reference}");
    }

    let mut headers = IndexMap::new();
    for (header_name, header) in &resp.headers {
        if vet_header_name(header_name, &header.location, &["Content-Type"]) {
            continue;
        }
        let param = generate_parameter(ctx, &name, header)?;
        headers.insert(header_name.clone(), param);
    }

    let (no_content, contents) = if resp.content.is_empty() {
        let mut t = Type::new(name.clone(), Kind::empty_struct());
        t.doc = if doc.is_empty() {
            format!("{name} is a response without content.")
        } else {
            doc
        };
        (Some(ctx.alloc_saved(t)?), BTreeMap::new())
    } else {
        (None, generate_contents(ctx, &name, false, false, &resp.content)?)
    };

    let lowered = ir::Response {
        no_content,
        contents,
        headers,
        with_status_code: false,
        with_headers: false,
        spec: resp.clone(),
    };
    if let Some(reference) = &resp.xref {
        ctx.save_response(reference, lowered.clone())?;
    }
    Ok(lowered)
}

fn content_type_header(ctx: &mut GenCtx<'_>, location: &Location) -> ir::Parameter {
    let ty = ctx.alloc(Type::primitive(PrimitiveType::String, None));
    ir::Parameter {
        name: "ContentType".to_string(),
        ty,
        spec: spec::Parameter {
            xref: None,
            name: "Content-Type".to_string(),
            location_in: ParameterIn::Header,
            description: String::new(),
            schema: None,
            content: None,
            style: ParameterStyle::Simple,
            explode: false,
            required: true,
            deprecated: false,
            location: location.clone(),
        },
    }
}

/// Wraps every payload of `resp` into a struct carrying the status code
/// and/or the headers. A wildcard content type adds a required
/// `Content-Type` header.
fn wrap_response(
    ctx: &mut GenCtx<'_>,
    name: &str,
    mut resp: ir::Response,
    status_code: bool,
) -> AppResult<ir::Response> {
    if resp.contents.keys().any(|ct| is_mask(ct)) && !resp.headers.contains_key("Content-Type") {
        let header = content_type_header(ctx, &resp.spec.location);
        resp.headers.insert("Content-Type".to_string(), header);
    }
    let with_headers = !resp.headers.is_empty();
    if !status_code && !with_headers {
        return Ok(resp);
    }

    let response_ref = resp.spec.xref.clone().unwrap_or_default();
    let name = match response_ref.strip_prefix("#/components/responses/") {
        Some(component) => pascal_non_empty(&[component])?,
        None => name.to_string(),
    };
    let wrap = Wrap {
        response_ref: &response_ref,
        headers: &resp.headers,
        status_code,
    };
    if let Some(t) = resp.no_content {
        resp.no_content = Some(wrap_type(ctx, &name, t, "", &wrap)?);
    }
    let multi = resp.contents.len() > 1;
    for (content_type, media) in resp.contents.iter_mut() {
        let base = if multi {
            pascal(&[&name, content_type])
        } else {
            name.clone()
        };
        media.ty = wrap_type(ctx, &base, media.ty, content_type, &wrap)?;
    }
    resp.with_status_code = status_code;
    resp.with_headers = with_headers;
    Ok(resp)
}

/// What a wrapper carries besides the payload.
struct Wrap<'a> {
    response_ref: &'a str,
    headers: &'a IndexMap<String, ir::Parameter>,
    status_code: bool,
}

fn wrap_type(
    ctx: &mut GenCtx<'_>,
    name: &str,
    t: TypeId,
    content_type: &str,
    wrap: &Wrap<'_>,
) -> AppResult<TypeId> {
    let schemas = ctx.schemas;
    let (headers, status_code) = (wrap.headers, wrap.status_code);
    let schema_ref = ctx.arena[t]
        .schema
        .and_then(|s| schemas[s].xref.clone())
        .unwrap_or_default();
    // Inline payloads of one response differ per media type.
    let content_type = if schema_ref.is_empty() {
        content_type.to_string()
    } else {
        String::new()
    };
    let key = WrappedKey {
        response_ref: wrap.response_ref.to_string(),
        schema_ref,
        content_type,
        status_code,
        headers: !headers.is_empty(),
    };
    let cacheable = !key.response_ref.is_empty() || !key.schema_ref.is_empty();
    if cacheable {
        if let Some(wrapped) = ctx.lookup_wtype(&key) {
            return Ok(wrapped);
        }
    }

    let base = match ctx.arena[t].name.as_str() {
        "" => name.to_string(),
        named => named.to_string(),
    };
    let suffix = match (status_code, key.headers) {
        (true, true) => "StatusCodeWithHeaders",
        (true, false) => "StatusCode",
        _ => "Headers",
    };
    let wrapper_name = format!("{base}{suffix}");

    let mut fields = Vec::with_capacity(headers.len() + 2);
    if status_code {
        let int = ctx.alloc(Type::primitive(PrimitiveType::Int, None));
        fields.push(Field::new("StatusCode", int, ""));
    }
    for param in headers.values() {
        fields.push(Field::new(param.name.clone(), param.ty, ""));
    }
    fields.push(Field::new("Response", t, ""));

    let mut wrapper = Type::new(wrapper_name.clone(), Kind::empty_struct());
    wrapper.doc = format!("{wrapper_name} wraps {} with {suffix}.", ctx.arena.type_expr(t));
    if let Some(slot) = wrapper.fields_mut() {
        *slot = fields;
    }
    let wrapper = ctx.alloc(wrapper);
    if cacheable {
        ctx.save_wtype(key, wrapper)?;
    } else {
        ctx.save_type(wrapper)?;
    }
    Ok(wrapper)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_name() {
        assert_eq!(status_name("200"), "OK");
        assert_eq!(status_name("299"), "Code299");
        assert_eq!(status_name("4XX"), "4XX");
        assert_eq!(status_name("default"), "Default");
    }
}
