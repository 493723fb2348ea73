//! Default-error reduction ("convenient errors").
//!
//! When every operation declares the same `default` response, that response
//! is lowered once as `ErrResp` and the per-operation default arms are
//! dropped.

use crate::context::GenCtx;
use crate::error::{AppError, AppResult, ResultExt};
use crate::ir::{self, Encoding};
use crate::ops::response_to_ir;
use crate::options::ConvenientErrors;
use crate::spec::{self, Location, SchemaArena, SchemaId};
use indexmap::IndexMap;
use std::cell::RefCell;
use std::collections::HashSet;
use tracing::info;

/// Name of the shared error response.
pub const ERR_RESP: &str = "ErrResp";

fn reduce_failed(mode: ConvenientErrors, reason: &str, location: &Location) -> AppResult<Option<ir::Response>> {
    if mode.is_forced() {
        return Err(AppError::General(format!(
            "can't reduce to convenient error: {reason}"
        )))
        .at(location);
    }
    info!(reason, location = %location, "Convenient errors are not available");
    Ok(None)
}

/// Lowers the shared `default` response of `ops` into the error type.
///
/// Returns `None` when reduction is disabled or not possible; with
/// [`ConvenientErrors::On`] the latter is an error.
pub fn reduce_default(
    ctx: &mut GenCtx<'_>,
    ops: &[&spec::Operation],
    mode: ConvenientErrors,
) -> AppResult<Option<ir::Response>> {
    if mode.is_disabled() {
        info!("Convenient errors are disabled, skip reduce");
        return Ok(None);
    }
    let Some(first) = ops.first() else {
        return Ok(None);
    };

    let Some(default) = first.responses.get("default") else {
        return reduce_failed(mode, "operation has no \"default\" response", &first.location);
    };
    let content_type = match default.content.len() {
        0 => return reduce_failed(mode, "response is no-content", &default.location),
        1 => default.content.keys().next().map(String::as_str).unwrap_or_default(),
        _ => return reduce_failed(mode, "response is multi-content", &default.location),
    };
    let encoding = ctx
        .opts
        .content_type_aliases
        .get(content_type)
        .or_else(|| Encoding::of(content_type));
    if encoding != Some(Encoding::Json) {
        return reduce_failed(mode, "response content must be JSON", &default.location);
    }

    let cmp = ResponseComparator::new(ctx.schemas);
    for op in &ops[1..] {
        match op.responses.get("default") {
            None => {
                return reduce_failed(mode, "operation has no \"default\" response", &op.location);
            }
            Some(other) if !cmp.response(default, other) => {
                return reduce_failed(mode, "response is different", &other.location);
            }
            Some(_) => {}
        }
    }

    info!(location = %default.location, "Generating convenient error response");
    let mut unnamed = default.clone();
    unnamed.xref = None;
    let resp = response_to_ir(ctx, ERR_RESP, &unnamed).at(&default.location)?;

    let has_json = resp.contents.values().any(|m| m.encoding == Encoding::Json);
    if resp.no_content.is_some() || resp.contents.len() > 1 || !has_json {
        return Err(AppError::General(
            "too complicated to reduce default error".into(),
        ))
        .at(&default.location);
    }
    Ok(Some(resp))
}

/// Structural comparison of document responses.
///
/// Schema pairs under comparison are assumed equal, so recursive
/// components terminate.
struct ResponseComparator<'a> {
    schemas: &'a SchemaArena,
    assumed: RefCell<HashSet<(SchemaId, SchemaId)>>,
}

impl<'a> ResponseComparator<'a> {
    fn new(schemas: &'a SchemaArena) -> Self {
        Self {
            schemas,
            assumed: RefCell::new(HashSet::new()),
        }
    }

    fn response(&self, a: &spec::Response, b: &spec::Response) -> bool {
        if a.xref.is_some() && a.xref == b.xref {
            return true;
        }
        self.map_eq(&a.headers, &b.headers, |x, y| self.header(x, y))
            && self.map_eq(&a.content, &b.content, |x, y| self.media(x, y))
    }

    fn map_eq<V>(
        &self,
        a: &IndexMap<String, V>,
        b: &IndexMap<String, V>,
        eq: impl Fn(&V, &V) -> bool,
    ) -> bool {
        a.len() == b.len() && a.iter().all(|(k, x)| b.get(k).is_some_and(|y| eq(x, y)))
    }

    fn header(&self, a: &spec::Parameter, b: &spec::Parameter) -> bool {
        if a.xref.is_some() && a.xref == b.xref {
            return true;
        }
        let content = match (&a.content, &b.content) {
            (None, None) => true,
            (Some((ca, ma)), Some((cb, mb))) => ca == cb && self.media(ma, mb),
            _ => false,
        };
        a.name == b.name
            && a.location_in == b.location_in
            && a.style == b.style
            && a.explode == b.explode
            && a.required == b.required
            && self.opt_schema(a.schema, b.schema)
            && content
    }

    fn media(&self, a: &spec::Media, b: &spec::Media) -> bool {
        self.opt_schema(a.schema, b.schema)
            && a.encoding == b.encoding
            && a.json_streaming == b.json_streaming
    }

    fn opt_schema(&self, a: Option<SchemaId>, b: Option<SchemaId>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) => self.schema(a, b),
            _ => false,
        }
    }

    fn schemas_eq(&self, a: &[SchemaId], b: &[SchemaId]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.schema(*x, *y))
    }

    fn schema(&self, a: SchemaId, b: SchemaId) -> bool {
        if a == b {
            return true;
        }
        let (sa, sb) = (&self.schemas[a], &self.schemas[b]);
        if sa.xref.is_some() && sa.xref == sb.xref {
            return true;
        }
        if !self.assumed.borrow_mut().insert((a, b)) {
            return true;
        }
        let equal = self.structural(sa, sb);
        if !equal {
            self.assumed.borrow_mut().remove(&(a, b));
        }
        equal
    }

    fn structural(&self, sa: &spec::Schema, sb: &spec::Schema) -> bool {
        fn required(s: &spec::Schema) -> Vec<&str> {
            let mut names: Vec<&str> = s
                .properties
                .iter()
                .filter(|p| p.required)
                .map(|p| p.name.as_str())
                .collect();
            names.sort_unstable();
            names
        }
        let properties = || {
            sa.properties.len() == sb.properties.len()
                && sa
                    .properties
                    .iter()
                    .zip(&sb.properties)
                    .all(|(x, y)| x.name == y.name && self.schema(x.schema, y.schema))
        };
        let patterns = || {
            sa.pattern_properties.len() == sb.pattern_properties.len()
                && sa
                    .pattern_properties
                    .iter()
                    .zip(&sb.pattern_properties)
                    .all(|(x, y)| x.pattern == y.pattern && self.schema(x.schema, y.schema))
        };
        let discriminator = match (&sa.discriminator, &sb.discriminator) {
            (None, None) => true,
            (Some(x), Some(y)) => x == y,
            _ => false,
        };

        sa.x_name == sb.x_name
            && sa.ty == sb.ty
            && sa.format == sb.format
            && sa.nullable == sb.nullable
            && self.opt_schema(sa.items, sb.items)
            && self.schemas_eq(&sa.prefix_items, &sb.prefix_items)
            && sa.additional_properties == sb.additional_properties
            && self.opt_schema(sa.additional_item, sb.additional_item)
            && patterns()
            && sa.enum_values == sb.enum_values
            && properties()
            && required(sa) == required(sb)
            && self.schemas_eq(&sa.one_of, &sb.one_of)
            && self.schemas_eq(&sa.any_of, &sb.any_of)
            && self.schemas_eq(&sa.all_of, &sb.all_of)
            && discriminator
            && sa.maximum == sb.maximum
            && sa.exclusive_maximum == sb.exclusive_maximum
            && sa.minimum == sb.minimum
            && sa.exclusive_minimum == sb.exclusive_minimum
            && sa.multiple_of == sb.multiple_of
            && sa.max_length == sb.max_length
            && sa.min_length == sb.min_length
            && sa.pattern == sb.pattern
            && sa.max_items == sb.max_items
            && sa.min_items == sb.min_items
            && sa.unique_items == sb.unique_items
            && sa.max_properties == sb.max_properties
            && sa.min_properties == sb.min_properties
            && sa.default == sb.default
            && sa.x_type == sb.x_type
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{LowerOptions, SkipPolicy};
    use crate::ir::TypeArena;
    use crate::spec::{parse_document, ParseOptions};
    use crate::storage::Storage;

    const TWO_OPS: &str = r#"
openapi: 3.1.0
info: {title: t, version: "1"}
paths:
  /a:
    get:
      operationId: getA
      responses:
        "200": {description: ok}
        default:
          description: error
          content:
            application/json:
              schema:
                type: object
                properties:
                  code: {type: integer}
  /b:
    get:
      operationId: getB
      responses:
        "200": {description: ok}
        default:
          description: error
          content:
            application/json:
              schema:
                type: object
                properties:
                  code: {type: integer}
"#;

    fn reduce(text: &str, mode: ConvenientErrors) -> AppResult<(Option<ir::Response>, TypeArena, Storage)> {
        let doc = parse_document(text, None, &ParseOptions::default())?;
        let mut arena = TypeArena::new();
        let global = Storage::new();
        let mut policy = SkipPolicy::new(Vec::new(), None);
        let opts = LowerOptions::default();
        let mut ctx = GenCtx::new(&mut arena, &doc.schemas, &global, &mut policy, &opts);
        let ops: Vec<&spec::Operation> = doc.operations.iter().collect();
        let resp = reduce_default(&mut ctx, &ops, mode)?;
        let local = ctx.into_local();
        Ok((resp, arena, local))
    }

    #[test]
    fn test_structurally_equal_defaults_reduce() {
        let (resp, arena, local) = reduce(TWO_OPS, ConvenientErrors::Auto).unwrap();
        let resp = resp.expect("reduced");
        let media = &resp.contents["application/json"];
        assert_eq!(arena[media.ty].name, ERR_RESP);
        assert!(local.lookup_type(ERR_RESP).is_some());
    }

    #[test]
    fn test_different_defaults() {
        let text = TWO_OPS.replacen("code: {type: integer}", "code: {type: string}", 1);
        let (resp, _, _) = reduce(&text, ConvenientErrors::Auto).unwrap();
        assert!(resp.is_none());

        let err = reduce(&text, ConvenientErrors::On).unwrap_err();
        assert!(err.to_string().contains("response is different"));
    }

    #[test]
    fn test_recursive_components_compare_structurally() {
        let text = r##"
openapi: 3.1.0
info: {title: t, version: "1"}
paths:
  /a:
    get:
      operationId: getA
      responses:
        "200": {description: ok}
        default:
          description: error
          content:
            application/json:
              schema:
                type: object
                properties:
                  n: {$ref: "#/components/schemas/A"}
  /b:
    get:
      operationId: getB
      responses:
        "200": {description: ok}
        default:
          description: error
          content:
            application/json:
              schema:
                type: object
                properties:
                  n: {$ref: "#/components/schemas/B"}
components:
  schemas:
    A:
      type: object
      properties:
        next: {$ref: "#/components/schemas/A"}
    B:
      type: object
      properties:
        next: {$ref: "#/components/schemas/B"}
"##;
        let (resp, _, _) = reduce(text, ConvenientErrors::Auto).unwrap();
        assert!(resp.is_some());

        let text = text.replacen("next: {$ref: \"#/components/schemas/B\"}", "next: {type: string}", 1);
        let (resp, _, _) = reduce(&text, ConvenientErrors::Auto).unwrap();
        assert!(resp.is_none());
    }

    #[test]
    fn test_disabled() {
        let (resp, _, local) = reduce(TWO_OPS, ConvenientErrors::Off).unwrap();
        assert!(resp.is_none());
        assert!(local.lookup_type(ERR_RESP).is_none());
    }
}
