//! Operation lowering.

use super::{convert_path_parts, generate_parameters, generate_request, generate_responses, generate_securities};
use crate::context::GenCtx;
use crate::error::{AppError, AppResult, ResultExt};
use crate::ir;
use crate::naming::{pascal, pascal_non_empty};
use crate::spec;
use indexmap::IndexMap;

/// Read-only document state an operation is lowered against.
#[derive(Debug, Clone, Copy)]
pub struct OpEnv<'a> {
    /// Document components.
    pub components: &'a spec::Components,
    /// Security schemes lowered by earlier operations.
    pub securities: &'a IndexMap<String, ir::Security>,
}

/// An operation together with the security schemes it touched.
///
/// The schemes are committed to the generator's map only when the
/// operation itself is kept.
#[derive(Debug, Clone)]
pub struct LoweredOperation {
    /// The operation.
    pub op: ir::Operation,
    /// New or updated security schemes.
    pub securities: IndexMap<String, ir::Security>,
}

fn operation_name(webhook: Option<&str>, op: &spec::Operation) -> AppResult<String> {
    let method = op.http_method.to_ascii_lowercase();
    match (&op.operation_id, webhook) {
        (Some(id), _) if !id.is_empty() => pascal_non_empty(&[id.as_str()]),
        (_, Some(webhook)) => pascal_non_empty(&[webhook, &method]),
        _ => Ok(pascal(&[&op.path, &method])),
    }
}

fn context(err: AppError, what: &str) -> AppError {
    match err {
        AppError::General(msg) => AppError::General(format!("{what}: {msg}")),
        other => other,
    }
}

/// Lowers one operation in the scope of `ctx`.
///
/// `webhook` names the webhook the operation belongs to; it is also used for
/// naming when the operation has no `operationId`.
pub fn generate_operation(
    ctx: &mut GenCtx<'_>,
    env: OpEnv<'_>,
    webhook: Option<&str>,
    spec_op: &spec::Operation,
) -> AppResult<LoweredOperation> {
    let name = operation_name(webhook, spec_op)
        .map_err(|e| context(e, "operation name"))
        .at(&spec_op.location)?;

    let params = generate_parameters(ctx, &name, &spec_op.parameters)
        .map_err(|e| context(e, "parameters"))?;
    let path_parts = convert_path_parts(spec_op, &params)?;

    let request = match &spec_op.request_body {
        Some(body) => Some(
            generate_request(ctx, &name, body).map_err(|e| context(e, "requestBody"))?,
        ),
        None => None,
    };

    let responses = generate_responses(ctx, &name, &spec_op.responses)
        .map_err(|e| context(e, "responses"))?;

    let mut securities = IndexMap::new();
    let security = generate_securities(
        ctx,
        env.securities,
        &mut securities,
        &env.components.security_schemes,
        &name,
        &spec_op.location,
        &spec_op.security,
    )
    .map_err(|e| context(e, "security"))?;

    let op = ir::Operation {
        name,
        operation_id: spec_op.operation_id.clone(),
        summary: spec_op.summary.clone(),
        description: spec_op.description.clone(),
        deprecated: spec_op.deprecated,
        method: spec_op.http_method.to_ascii_uppercase(),
        path: spec_op.path.clone(),
        path_parts,
        params,
        request,
        responses,
        security,
        webhook: webhook.map(|name| ir::WebhookInfo {
            name: name.to_string(),
        }),
        location: spec_op.location.clone(),
    };
    Ok(LoweredOperation { op, securities })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn op(operation_id: Option<&str>, path: &str, method: &str) -> spec::Operation {
        spec::Operation {
            operation_id: operation_id.map(str::to_string),
            summary: String::new(),
            description: String::new(),
            deprecated: false,
            http_method: method.into(),
            path: path.into(),
            path_parts: Vec::new(),
            parameters: Vec::new(),
            request_body: None,
            responses: IndexMap::new(),
            security: Vec::new(),
            location: Default::default(),
        }
    }

    #[test]
    fn test_operation_name() {
        assert_eq!(
            operation_name(None, &op(Some("listPets"), "/pets", "get")).unwrap(),
            "ListPets"
        );
        assert_eq!(
            operation_name(Some("newPet"), &op(None, "/", "post")).unwrap(),
            "NewPetPost"
        );
        assert_eq!(
            operation_name(None, &op(None, "/pets/{id}", "GET")).unwrap(),
            "PetsIDGet"
        );
        assert!(operation_name(Some(""), &op(None, "", "")).is_err());
    }
}
