//! Media type handling: wildcard filtering and per-content-type payloads.

use crate::context::GenCtx;
use crate::error::{AppError, AppResult, ResultExt};
use crate::ir::{self, is_mask, Encoding, Feature, FormSpec, Kind, Type, TypeId};
use crate::naming::pascal;
use crate::schema::{generate_request_schema, generate_schema};
use crate::spec::{self, ParameterIn, ParameterStyle, SchemaArena, SchemaId, SchemaType};
use indexmap::IndexMap;
use std::collections::{BTreeMap, HashSet};
use tracing::{info, warn};

fn is_token(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c))
}

/// Media type without parameters, lower-cased (`Text/HTML; charset=utf-8`
/// becomes `text/html`).
pub fn parse_media_type(value: &str) -> AppResult<String> {
    let essence = value
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    let valid = match essence.split_once('/') {
        Some((ty, subtype)) => is_token(ty) && is_token(subtype),
        None => is_token(&essence),
    };
    if !valid {
        return Err(AppError::General(format!("parse content type {value:?}")));
    }
    Ok(essence)
}

/// Shell-style match: `*` spans any run of characters except `/`, `?`
/// matches one.
fn mask_matches(mask: &[u8], s: &[u8]) -> bool {
    match (mask.first(), s.first()) {
        (None, None) => true,
        (Some(b'*'), _) => {
            mask_matches(&mask[1..], s)
                || (s.first().is_some_and(|&c| c != b'/') && mask_matches(mask, &s[1..]))
        }
        (Some(b'?'), Some(&c)) if c != b'/' => mask_matches(&mask[1..], &s[1..]),
        (Some(m), Some(c)) if m == c => mask_matches(&mask[1..], &s[1..]),
        _ => false,
    }
}

/// Drops wildcard content types shadowed by a more specific entry.
///
/// A mask made only of `*` is dropped when any other entry exists; other
/// masks (`text/*`) are dropped when another entry matches them.
pub fn filter_most_specific<V>(contents: &mut IndexMap<String, V>) -> AppResult<()> {
    let keys: Vec<String> = contents.keys().cloned().collect();
    for key in keys {
        let mask = parse_media_type(&key)?;
        let only_stars = mask.chars().all(|c| c == '*');
        let replacement = contents
            .keys()
            .filter(|other| **other != key)
            .find(|other| only_stars || mask_matches(mask.as_bytes(), other.as_bytes()))
            .cloned();
        if let Some(replacement) = replacement {
            info!(mask = %key, replacement = %replacement, "Filter common content type");
            contents.shift_remove(&key);
        }
    }
    Ok(())
}

fn is_stream(schemas: &SchemaArena, schema: Option<SchemaId>) -> bool {
    let Some(id) = schema else {
        return true;
    };
    let s = &schemas[id];
    s.is_empty() || (s.ty == SchemaType::String && s.format == "binary")
}

/// Lowers the content map of a request body or response.
///
/// Returns the payload per parsed content type. Content types that cannot
/// be lowered are collected; when none remains,
/// [`AppError::UnsupportedContentTypes`] is returned.
pub fn generate_contents(
    ctx: &mut GenCtx<'_>,
    name: &str,
    optional: bool,
    request: bool,
    contents: &IndexMap<String, spec::Media>,
) -> AppResult<BTreeMap<String, ir::Media>> {
    let mut contents = contents.clone();
    filter_most_specific(&mut contents)?;

    let mut keys: Vec<&String> = contents.keys().collect();
    keys.sort();

    let mut result = BTreeMap::new();
    let mut names = BTreeMap::new();
    let mut unsupported = Vec::new();
    for content_type in keys {
        let media = &contents[content_type];
        let parsed = parse_media_type(content_type).at(&media.location)?;
        let type_name = if contents.len() > 1 {
            pascal(&[name, content_type])
        } else {
            name.to_string()
        };
        names.insert(parsed.clone(), type_name.clone());

        let lowered = ctx.skippable("Skipping media", &media.location, |ctx| {
            generate_media(ctx, &type_name, &parsed, media, optional, request)
                .at(&media.location)
        })?;
        match lowered {
            Some(Some(m)) => {
                result.insert(parsed, m);
            }
            Some(None) | None => unsupported.push(content_type.clone()),
        }
    }

    if result.is_empty() && !unsupported.is_empty() {
        return Err(AppError::UnsupportedContentTypes(unsupported));
    }

    if request {
        let masks: Vec<String> = result.keys().filter(|ct| is_mask(ct)).cloned().collect();
        for ct in masks {
            if let Some(media) = result.get_mut(&ct) {
                media.ty = wrap_content(ctx, &names[&ct], media.ty)?;
            }
        }
    }
    Ok(result)
}

fn generate_media(
    ctx: &mut GenCtx<'_>,
    type_name: &str,
    content_type: &str,
    media: &spec::Media,
    optional: bool,
    request: bool,
) -> AppResult<Option<ir::Media>> {
    let mut encoding = Encoding::of(content_type);
    if let Some(alias) = ctx.opts.content_type_aliases.get(content_type) {
        if alias == Encoding::Multipart {
            return Err(AppError::not_implemented("multipart content type alias"));
        }
        encoding = Some(alias);
    }

    if encoding != Some(Encoding::Json) && media.json_streaming {
        warn!(
            location = %media.location,
            content_type,
            r#"Extension "x-ogen-json-streaming" will be ignored for non-JSON encoding"#
        );
    }

    let lowered = match encoding {
        Some(Encoding::Json) => {
            let ty = if request {
                generate_request_schema(ctx, type_name, media.schema, optional)?
            } else {
                generate_schema(ctx, type_name, media.schema, optional)?
            };
            ctx.arena.add_feature(ty, Feature::Json);
            ir::Media {
                encoding: Encoding::Json,
                ty,
                json_streaming: media.json_streaming,
            }
        }
        Some(enc @ (Encoding::FormUrlEncoded | Encoding::Multipart)) => ir::Media {
            encoding: enc,
            ty: generate_form_content(ctx, type_name, media, optional, enc)?,
            json_streaming: false,
        },
        other => {
            if !is_stream(ctx.schemas, media.schema) {
                info!(
                    location = %media.location,
                    content_type,
                    r#"Content type is unsupported, set "format" to "binary" to use a stream"#
                );
                return Ok(None);
            }
            let encoding = match other {
                Some(enc @ Encoding::TextPlain) => enc,
                _ => Encoding::OctetStream,
            };
            let stream = Type::new(type_name, Kind::Stream).with_schema(media.schema);
            let ty = ctx.alloc_saved(stream)?;
            ir::Media {
                encoding,
                ty,
                json_streaming: false,
            }
        }
    };
    Ok(Some(lowered))
}

fn wrap_content(ctx: &mut GenCtx<'_>, name: &str, t: TypeId) -> AppResult<TypeId> {
    let base = match ctx.arena[t].name.as_str() {
        "" => name.to_string(),
        named => named.to_string(),
    };
    let wrapper_name = format!("{base}WithContentType");
    let mut wrapper = Type::new(wrapper_name.clone(), Kind::empty_struct());
    wrapper.doc = format!("{wrapper_name} wraps {} with Content-Type.", ctx.arena.type_expr(t));
    let content_type = ctx.alloc(Type::primitive(ir::PrimitiveType::String, None));
    if let Some(fields) = wrapper.fields_mut() {
        fields.push(ir::Field::new("ContentType", content_type, ""));
        fields.push(ir::Field::new("Content", t, ""));
    }
    ctx.alloc_saved(wrapper)
}

fn is_complex_multipart(schemas: &SchemaArena, schema: Option<SchemaId>) -> bool {
    let Some(id) = schema else {
        return true;
    };
    let s = &schemas[id];
    match s.ty {
        SchemaType::Object | SchemaType::Empty => true,
        SchemaType::Array => !s.prefix_items.is_empty() || is_complex_multipart(schemas, s.items),
        _ => false,
    }
}

fn generate_form_content(
    ctx: &mut GenCtx<'_>,
    type_name: &str,
    media: &spec::Media,
    optional: bool,
    encoding: Encoding,
) -> AppResult<TypeId> {
    if let Some(id) = media.schema {
        let s = &ctx.schemas[id];
        if s.additional_item.is_some() || !s.pattern_properties.is_empty() || !s.prefix_items.is_empty() {
            return Err(AppError::not_implemented("complex form schema"));
        }
    }

    let t = generate_request_schema(ctx, type_name, media.schema, optional)?;
    let struct_type = match &ctx.arena[t].kind {
        Kind::Struct { .. } => t,
        Kind::Generic { of, variant } if optional && variant.only_optional() && ctx.arena[*of].is_struct() => *of,
        _ => return Err(AppError::not_implemented("complex form schema")),
    };

    let field_count = ctx.arena[struct_type].fields().len();
    for idx in 0..field_count {
        let field = &ctx.arena[struct_type].fields()[idx];
        let tag = field.tag.json.clone();
        let field_ty = field.ty;
        let (required, field_schema) = field
            .spec
            .as_ref()
            .map_or((false, None), |spec| (spec.required, spec.schema));

        let mut form = FormSpec {
            name: tag.clone(),
            location_in: ParameterIn::Query,
            style: ParameterStyle::Form,
            explode: true,
            required,
            content_type: None,
        };
        let declared = media.encoding.get(&tag);
        if let Some(e) = declared {
            form.style = e.style.unwrap_or(ParameterStyle::Form);
            form.explode = e.explode.unwrap_or(form.style == ParameterStyle::Form);
        }
        let mut content_type = declared.and_then(|e| e.content_type.clone());
        if content_type.is_none()
            && encoding == Encoding::Multipart
            && is_complex_multipart(ctx.schemas, field_schema)
        {
            content_type = Some(Encoding::Json.as_str().to_string());
        }

        let checked = match content_type.as_deref().map(Encoding::parse) {
            None | Some(Some(Encoding::FormUrlEncoded)) => {
                if form.style == ParameterStyle::SpaceDelimited {
                    Err(AppError::not_implemented("spaceDelimited parameter style"))
                } else {
                    super::is_param_allowed(ctx.arena, field_ty, true, &mut HashSet::new())
                        .map(|()| Feature::Uri)
                }
            }
            Some(Some(Encoding::Json)) => {
                form.content_type = content_type.clone();
                Ok(Feature::Json)
            }
            Some(_) => Err(AppError::not_implemented("form content encoding")),
        };
        let feature = checked.map_err(|e| match e {
            AppError::General(msg) => AppError::General(format!("form parameter {tag:?}: {msg}")),
            other => other,
        })?;
        ctx.arena.add_feature(field_ty, feature);

        if let Some(fields) = ctx.arena[struct_type].fields_mut() {
            fields[idx].tag.form = Some(form);
        }
    }
    ctx.arena.add_feature(struct_type, Feature::Uri);
    Ok(t)
}
