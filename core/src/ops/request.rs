//! Request body lowering.

use super::generate_contents;
use crate::context::GenCtx;
use crate::error::{AppError, AppResult, ResultExt};
use crate::ir::{self, Kind, Type};
use crate::naming::{camel, pascal};
use crate::spec;

/// Lowers the request body of operation `op_name` into `<op>Req`.
///
/// Several content types, or an optional body, make the request type an
/// interface every payload implements; payloads that cannot carry methods
/// are aliased first. An optional body also gets an `EmptyBody` arm.
pub fn generate_request(
    ctx: &mut GenCtx<'_>,
    op_name: &str,
    body: &spec::RequestBody,
) -> AppResult<ir::Request> {
    let name = format!("{op_name}Req");
    let optional = !body.required;

    let mut contents = generate_contents(ctx, &name, optional, true, &body.content).at(&body.location)?;

    let is_sum = contents.len() > 1 || optional;
    let request_type = if is_sum {
        let iface = ctx.alloc(Type::new(name.clone(), Kind::empty_interface()));
        ctx.arena.add_method(iface, camel(&[&name]));
        ctx.save_type(iface)?;
        for (content_type, media) in contents.iter_mut() {
            let mut t = media.ty;
            if !ctx.arena[t].can_have_methods() {
                let alias = Type::new(pascal(&[&name, content_type]), Kind::Alias { to: t });
                t = ctx.alloc_saved(alias)?;
                media.ty = t;
            }
            ctx.arena.implement(t, iface)?;
        }
        iface
    } else {
        match contents.values().next() {
            Some(media) => media.ty,
            None => {
                return Err(AppError::General("request body has no content".into()))
                    .at(&body.location);
            }
        }
    };

    let empty_body = if optional {
        let empty = Type::new(pascal(&[&name, "EmptyBody"]), Kind::empty_struct());
        let empty = ctx.alloc_saved(empty)?;
        ctx.arena.implement(empty, request_type)?;
        Some(empty)
    } else {
        None
    };

    Ok(ir::Request {
        ty: request_type,
        contents,
        empty_body,
        spec: body.clone(),
    })
}
