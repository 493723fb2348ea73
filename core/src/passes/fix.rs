//! Equivalence collapse.
//!
//! An interface over request or response payloads cannot tell two arms apart
//! when both are the same type. For example, `200` and `202` both returning
//! `#/components/schemas/Foo` would give two `Foo` arms. Each offending arm
//! is replaced by a nominal alias (`<Op>ApplicationJSONOK`,
//! `<Op>ApplicationJSONAccepted`) that implements the interface instead.

use crate::context::GenCtx;
use crate::error::AppResult;
use crate::ir::{self, status_text, Kind, Type, TypeId};
use crate::naming::pascal;
use std::collections::BTreeMap;
use tracing::debug;

fn status_name(code: u16) -> String {
    match status_text(code) {
        "" => format!("Code{code}"),
        text => text.to_string(),
    }
}

fn alias_arm(
    ctx: &mut GenCtx<'_>,
    iface: TypeId,
    name: &str,
    t: TypeId,
) -> AppResult<TypeId> {
    if ctx.arena[t].can_have_methods() {
        ctx.arena.unimplement(t, iface)?;
    }
    let alias = ctx.alloc_saved(Type::new(name, Kind::Alias { to: t }))?;
    ctx.arena.implement(alias, iface)?;
    debug!(alias = name, target = %ctx.arena.type_expr(t), "Aliased equal interface arm");
    Ok(alias)
}

/// Gives every structurally equal request payload its own alias.
pub fn fix_equal_requests(
    ctx: &mut GenCtx<'_>,
    op_name: &str,
    request: &mut ir::Request,
) -> AppResult<()> {
    let iface = request.ty;
    if !ctx.arena[iface].is_interface() {
        return Ok(());
    }

    let mut candidates: BTreeMap<String, (String, TypeId)> = BTreeMap::new();
    for (lct, lmedia) in &request.contents {
        for (rct, rmedia) in &request.contents {
            if lct == rct || !ctx.arena.deep_equal(lmedia.ty, rmedia.ty) {
                continue;
            }
            candidates
                .entry(lct.clone())
                .or_insert_with(|| (pascal(&[op_name, lct]), lmedia.ty));
        }
    }

    for (content_type, (name, t)) in candidates {
        let alias = alias_arm(ctx, iface, &name, t)?;
        if let Some(media) = request.contents.get_mut(&content_type) {
            media.ty = alias;
        }
    }
    Ok(())
}

/// Gives every structurally equal response payload (across status codes
/// and content types) its own alias.
pub fn fix_equal_responses(
    ctx: &mut GenCtx<'_>,
    op_name: &str,
    responses: &mut ir::Responses,
) -> AppResult<()> {
    let iface = responses.ty;
    if !ctx.arena[iface].is_interface() {
        return Ok(());
    }

    // (code, content type or None for no-content) -> (alias name, payload)
    let mut candidates: BTreeMap<(u16, Option<String>), (String, TypeId)> = BTreeMap::new();
    let codes: Vec<u16> = responses.status_code.keys().copied().collect();
    for (i, &lcode) in codes.iter().enumerate() {
        for &rcode in &codes[i..] {
            let (lresp, rresp) = (&responses.status_code[&lcode], &responses.status_code[&rcode]);

            if let (Some(l), Some(r)) = (lresp.no_content, rresp.no_content) {
                if lcode != rcode && ctx.arena.deep_equal(l, r) {
                    for (code, t) in [(lcode, l), (rcode, r)] {
                        candidates
                            .entry((code, None))
                            .or_insert_with(|| (pascal(&[op_name, &status_name(code)]), t));
                    }
                    continue;
                }
            }

            for (lct, lmedia) in &lresp.contents {
                for (rct, rmedia) in &rresp.contents {
                    if lcode == rcode && lct == rct {
                        continue;
                    }
                    if !ctx.arena.deep_equal(lmedia.ty, rmedia.ty) {
                        continue;
                    }
                    for (code, ct, t) in [(lcode, lct, lmedia.ty), (rcode, rct, rmedia.ty)] {
                        candidates.entry((code, Some(ct.clone()))).or_insert_with(|| {
                            (pascal(&[op_name, ct, &status_name(code)]), t)
                        });
                    }
                }
            }
        }
    }

    for ((code, content_type), (name, t)) in candidates {
        let alias = alias_arm(ctx, iface, &name, t)?;
        let Some(resp) = responses.status_code.get_mut(&code) else {
            continue;
        };
        match content_type {
            None => resp.no_content = Some(alias),
            Some(ct) => {
                if let Some(media) = resp.contents.get_mut(&ct) {
                    media.ty = alias;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{LowerOptions, SkipPolicy};
    use crate::ir::{Encoding, Media, TypeArena};
    use crate::spec::{self, SchemaArena};
    use crate::storage::Storage;
    use indexmap::IndexMap;

    fn media(ty: TypeId) -> Media {
        Media {
            encoding: Encoding::Json,
            ty,
            json_streaming: false,
        }
    }

    fn response(contents: &[(&str, TypeId)]) -> ir::Response {
        ir::Response {
            no_content: None,
            contents: contents.iter().map(|(ct, t)| (ct.to_string(), media(*t))).collect(),
            headers: IndexMap::new(),
            with_status_code: false,
            with_headers: false,
            spec: spec::Response::default(),
        }
    }

    #[test]
    fn test_fix_equal_responses() {
        let mut arena = TypeArena::new();
        let schemas = SchemaArena::default();
        let global = Storage::new();
        let mut policy = SkipPolicy::new(Vec::new(), None);
        let opts = LowerOptions::default();
        let mut ctx = GenCtx::new(&mut arena, &schemas, &global, &mut policy, &opts);

        let foo = ctx.alloc_saved(Type::new("Foo", Kind::empty_struct())).unwrap();
        let iface = ctx.alloc_saved(Type::new("GetFooRes", Kind::empty_interface())).unwrap();
        ctx.arena.implement(foo, iface).unwrap();

        let mut responses = ir::Responses::new(iface);
        responses.status_code.insert(200, response(&[("application/json", foo)]));
        responses.status_code.insert(202, response(&[("application/json", foo)]));

        fix_equal_responses(&mut ctx, "GetFoo", &mut responses).unwrap();

        let ok = responses.status_code[&200].contents["application/json"].ty;
        let accepted = responses.status_code[&202].contents["application/json"].ty;
        assert_eq!(ctx.arena[ok].name, "GetFooApplicationJSONOK");
        assert_eq!(ctx.arena[accepted].name, "GetFooApplicationJSONAccepted");
        assert!(ctx.arena[ok].implements.contains(&iface));
        assert!(!ctx.arena[foo].implements.contains(&iface));
        assert_eq!(ctx.arena.implementations(iface), vec![accepted, ok]);
        assert!(!ctx.arena.deep_equal(ok, accepted));
    }

    #[test]
    fn test_fix_equal_requests() {
        let mut arena = TypeArena::new();
        let schemas = SchemaArena::default();
        let global = Storage::new();
        let mut policy = SkipPolicy::new(Vec::new(), None);
        let opts = LowerOptions::default();
        let mut ctx = GenCtx::new(&mut arena, &schemas, &global, &mut policy, &opts);

        let pet = ctx.alloc_saved(Type::new("Pet", Kind::empty_struct())).unwrap();
        let iface = ctx.alloc_saved(Type::new("AddPetReq", Kind::empty_interface())).unwrap();
        ctx.arena.implement(pet, iface).unwrap();

        let mut request = ir::Request {
            ty: iface,
            contents: [
                ("application/json".to_string(), media(pet)),
                ("application/x-www-form-urlencoded".to_string(), media(pet)),
            ]
            .into_iter()
            .collect(),
            empty_body: None,
            spec: spec::RequestBody {
                xref: None,
                description: String::new(),
                content: IndexMap::new(),
                required: true,
                location: spec::Location::default(),
            },
        };
        fix_equal_requests(&mut ctx, "AddPet", &mut request).unwrap();

        let names: Vec<&str> = request
            .contents
            .values()
            .map(|m| ctx.arena[m.ty].name.as_str())
            .collect();
        assert_eq!(
            names,
            vec!["AddPetApplicationJSON", "AddPetApplicationXWwwFormUrlencoded"]
        );
        assert!(ctx.arena[pet].implements.is_empty());
    }

    #[test]
    fn test_no_interface_is_untouched() {
        let mut arena = TypeArena::new();
        let schemas = SchemaArena::default();
        let global = Storage::new();
        let mut policy = SkipPolicy::new(Vec::new(), None);
        let opts = LowerOptions::default();
        let mut ctx = GenCtx::new(&mut arena, &schemas, &global, &mut policy, &opts);

        let foo = ctx.alloc_saved(Type::new("Foo", Kind::empty_struct())).unwrap();
        let mut responses = ir::Responses::new(foo);
        responses.status_code.insert(200, response(&[("application/json", foo)]));
        fix_equal_responses(&mut ctx, "GetFoo", &mut responses).unwrap();
        assert_eq!(responses.status_code[&200].contents["application/json"].ty, foo);
    }
}
