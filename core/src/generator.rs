//! # Generator
//!
//! Drives the whole pipeline over a resolved document: servers, webhooks,
//! default-error reduction, operations, the route tree and the equality
//! planner. Every operation is lowered in its own scope that is merged into
//! the global storage only when the operation is kept.

use crate::context::{GenCtx, LowerOptions, SkipPolicy};
use crate::error::{AppError, AppResult};
use crate::features::FeatureSet;
use crate::ir::{self, Type, TypeArena, TypeId};
use crate::naming::pascal_non_empty;
use crate::ops::{generate_operation, generate_server, OpEnv};
use crate::options::{Config, ConvenientErrors, Filters, GenerateOptions};
use crate::passes::{fix_equal_requests, fix_equal_responses, plan_equality, reduce_default, EqualityPlan};
use crate::router::{Router, WebhookRouter};
use crate::schema::generate_schema;
use crate::spec::{self, Location, ParameterIn, ParseOptions};
use crate::storage::Storage;
use crate::template::TemplateConfig;
use indexmap::IndexMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// The lowered form of a document.
#[derive(Debug)]
pub struct Generator {
    doc: spec::Document,
    features: FeatureSet,
    arena: TypeArena,
    storage: Storage,
    servers: Vec<ir::Server>,
    operations: Vec<ir::Operation>,
    webhooks: Vec<ir::Operation>,
    securities: IndexMap<String, ir::Security>,
    error_type: Option<ir::Response>,
    router: Router,
    webhook_router: WebhookRouter,
    equality: EqualityPlan,
}

/// Mutable state of a generator run, split from the document it reads.
struct Lowerer<'d> {
    doc: &'d spec::Document,
    filters: &'d Filters,
    lower: LowerOptions,
    policy: SkipPolicy,
    arena: TypeArena,
    storage: Storage,
    securities: IndexMap<String, ir::Security>,
}

impl Lowerer<'_> {
    fn servers(&self) -> AppResult<Vec<ir::Server>> {
        let mut servers = Vec::new();
        for server in &self.doc.servers {
            let Some(name) = server.name.as_deref().filter(|n| !n.is_empty()) else {
                continue;
            };
            servers.push(generate_server(name, server)?);
        }
        Ok(servers)
    }

    fn webhooks(&mut self) -> AppResult<Vec<ir::Operation>> {
        let mut result = Vec::new();
        let doc = self.doc;
        for webhook in &doc.webhooks {
            if webhook.name.is_empty() {
                let location = webhook
                    .operations
                    .first()
                    .map_or_else(|| Location::pointer("#/webhooks"), |op| op.location.clone());
                let err = AppError::General("webhook name is empty".into()).at(&location);
                self.policy.try_skip(err, "Skipping webhook", &location)?;
                continue;
            }

            for spec_op in &webhook.operations {
                if !self.filters.accept(&spec_op.path, &spec_op.http_method) {
                    info!(location = %spec_op.location, "Skipping filtered operation");
                    continue;
                }
                let mut spec_op = spec_op.clone();
                spec_op.parameters.retain(|p| {
                    if p.location_in != ParameterIn::Path {
                        return true;
                    }
                    warn!(
                        location = %spec_op.location,
                        name = %p.name,
                        "Webhooks can't have path parameters"
                    );
                    false
                });
                if let Some(op) = self.operation(Some(&webhook.name), &spec_op)? {
                    result.push(op);
                }
            }
        }
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    fn reduce(&mut self, mode: ConvenientErrors) -> AppResult<Option<ir::Response>> {
        let ops: Vec<&spec::Operation> = self.doc.operations.iter().collect();
        let mut ctx = GenCtx::new(
            &mut self.arena,
            &self.doc.schemas,
            &self.storage,
            &mut self.policy,
            &self.lower,
        );
        let reduced = reduce_default(&mut ctx, &ops, mode)?;
        let local = ctx.into_local();
        self.storage.merge(&mut self.arena, local)?;
        if reduced.is_some() {
            self.lower.skip_default_response = true;
        }
        Ok(reduced)
    }

    fn operations(&mut self) -> AppResult<Vec<ir::Operation>> {
        let mut result = Vec::new();
        let doc = self.doc;
        for spec_op in &doc.operations {
            if !self.filters.accept(&spec_op.path, &spec_op.http_method) {
                info!(location = %spec_op.location, "Skipping filtered operation");
                continue;
            }
            if let Some(op) = self.operation(None, spec_op)? {
                result.push(op);
            }
        }
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    /// Lowers one operation; `None` when it was skipped.
    fn operation(
        &mut self,
        webhook: Option<&str>,
        spec_op: &spec::Operation,
    ) -> AppResult<Option<ir::Operation>> {
        let env = OpEnv {
            components: &self.doc.components,
            securities: &self.securities,
        };
        let mut ctx = GenCtx::new(
            &mut self.arena,
            &self.doc.schemas,
            &self.storage,
            &mut self.policy,
            &self.lower,
        );
        let lowered = ctx.skippable("Skipping operation", &spec_op.location, |ctx| {
            let mut lowered = generate_operation(ctx, env, webhook, spec_op)?;
            let op = &mut lowered.op;
            if let Some(request) = &mut op.request {
                fix_equal_requests(ctx, &op.name, request)?;
            }
            fix_equal_responses(ctx, &op.name, &mut op.responses)?;
            Ok(lowered)
        })?;
        let local = ctx.into_local();

        let Some(lowered) = lowered else {
            return Ok(None);
        };
        self.storage.merge(&mut self.arena, local)?;
        self.securities.extend(lowered.securities);
        debug!(operation = %lowered.op.name, "Lowered operation");
        Ok(Some(lowered.op))
    }
}

impl Generator {
    /// Lowers `doc`.
    pub fn new(doc: spec::Document, parse: &ParseOptions, opts: GenerateOptions) -> AppResult<Self> {
        let features = opts.features.build()?;
        let lower = LowerOptions {
            depth_limit: parse.depth_limit,
            content_type_aliases: opts.content_type_aliases,
            skip_default_response: false,
        };
        let mut lowerer = Lowerer {
            doc: &doc,
            filters: &opts.filters,
            lower,
            policy: SkipPolicy::new(opts.ignore_not_implemented, opts.not_implemented_hook),
            arena: TypeArena::new(),
            storage: Storage::new(),
            securities: IndexMap::new(),
        };

        let servers = lowerer.servers()?;
        let webhooks = lowerer.webhooks()?;
        let error_type = lowerer.reduce(opts.convenient_errors)?;
        let operations = lowerer.operations()?;

        let router = Router::build(&operations)?;
        let webhook_router =
            WebhookRouter::build(&webhooks).map_err(|e| AppError::BuildRouter(Box::new(e)))?;

        let Lowerer {
            arena,
            storage,
            securities,
            ..
        } = lowerer;
        arena.check_interfaces()?;
        let equality = plan_equality(&arena, storage.types.values().copied());
        info!(
            operations = operations.len(),
            webhooks = webhooks.len(),
            types = storage.types.len(),
            "Generated IR"
        );

        Ok(Self {
            doc,
            features,
            arena,
            storage,
            servers,
            operations,
            webhooks,
            securities,
            error_type,
            router,
            webhook_router,
            equality,
        })
    }

    /// Loads the document at `path` and lowers it with `config`.
    pub fn from_file(path: &Path, config: Config) -> AppResult<Self> {
        let doc = spec::load_file(path, &config.parser)?;
        Self::new(doc, &config.parser, config.generator)
    }

    /// The document the IR was lowered from.
    pub fn document(&self) -> &spec::Document {
        &self.doc
    }

    /// Enabled features.
    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// Every type node.
    pub fn arena(&self) -> &TypeArena {
        &self.arena
    }

    /// Nominal types by name.
    pub fn types(&self) -> &IndexMap<String, TypeId> {
        &self.storage.types
    }

    /// Nominal type named `name`.
    pub fn lookup(&self, name: &str) -> Option<&Type> {
        self.storage.lookup_type(name).map(|id| &self.arena[id])
    }

    /// Named servers.
    pub fn servers(&self) -> &[ir::Server] {
        &self.servers
    }

    /// Path operations, sorted by name.
    pub fn operations(&self) -> &[ir::Operation] {
        &self.operations
    }

    /// Webhook operations, sorted by name.
    pub fn webhooks(&self) -> &[ir::Operation] {
        &self.webhooks
    }

    /// Security schemes used by kept operations.
    pub fn securities(&self) -> &IndexMap<String, ir::Security> {
        &self.securities
    }

    /// Shared error response, when the default responses were reduced.
    pub fn error_type(&self) -> Option<&ir::Response> {
        self.error_type.as_ref()
    }

    /// Route tree over [`Generator::operations`].
    pub fn router(&self) -> &Router {
        &self.router
    }

    /// Webhooks by name and method.
    pub fn webhook_router(&self) -> &WebhookRouter {
        &self.webhook_router
    }

    /// `Equal`/`Hash` plans.
    pub fn equality(&self) -> &EqualityPlan {
        &self.equality
    }

    /// The record handed to an emitter.
    pub fn template_config(&self, package: &str) -> TemplateConfig<'_> {
        TemplateConfig::new(self, package)
    }
}

/// Lowers the component schema `name` on its own.
///
/// Returns the arena, the scope holding every produced type and the root.
pub fn lower_component(
    doc: &spec::Document,
    name: &str,
    parse: &ParseOptions,
) -> AppResult<(TypeArena, Storage, TypeId)> {
    let Some(&schema) = doc.components.schemas.get(name) else {
        return Err(AppError::General(format!("schema {name:?} not found")));
    };
    let type_name = pascal_non_empty(&[name])?;

    let mut arena = TypeArena::new();
    let global = Storage::new();
    let mut policy = SkipPolicy::new(Vec::new(), None);
    let opts = LowerOptions {
        depth_limit: parse.depth_limit,
        ..LowerOptions::default()
    };
    let mut ctx = GenCtx::new(&mut arena, &doc.schemas, &global, &mut policy, &opts);
    let root = generate_schema(&mut ctx, &type_name, Some(schema), false)?;
    let local = ctx.into_local();
    Ok((arena, local, root))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::parse_document;

    const PETSTORE: &str = r##"
openapi: 3.0.3
info: {title: pets, version: "1"}
servers:
  - url: https://{region}.pets.example.com
    x-ogen-server-name: production
    variables:
      region: {default: eu, enum: [eu, us]}
  - url: http://localhost
paths:
  /pets:
    get:
      operationId: listPets
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema:
                type: array
                items: {$ref: "#/components/schemas/Pet"}
    post:
      operationId: createPet
      requestBody:
        required: true
        content:
          application/json:
            schema: {$ref: "#/components/schemas/Pet"}
      responses:
        "201": {description: created}
  /pets/{id}:
    get:
      operationId: getPet
      parameters:
        - {name: id, in: path, required: true, schema: {type: integer}}
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema: {$ref: "#/components/schemas/Pet"}
    delete:
      operationId: deletePet
      parameters:
        - {name: id, in: path, required: true, schema: {type: integer}}
        - {name: session, in: cookie, schema: {type: string}}
      responses:
        "204": {description: deleted}
components:
  schemas:
    Pet:
      type: object
      required: [name]
      properties:
        name: {type: string}
        tag: {type: string}
"##;

    fn generate(text: &str, opts: GenerateOptions) -> AppResult<Generator> {
        let parse = ParseOptions::default();
        let doc = parse_document(text, None, &parse)?;
        Generator::new(doc, &parse, opts)
    }

    #[test]
    fn test_operations_sorted_and_routed() {
        let opts = GenerateOptions {
            ignore_not_implemented: vec!["cookie parameters".into()],
            ..Default::default()
        };
        let g = generate(PETSTORE, opts).unwrap();
        let names: Vec<&str> = g.operations().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["CreatePet", "DeletePet", "GetPet", "ListPets"]);
        assert_eq!(g.router().max_parameters_count, 1);
        assert!(g.lookup("Pet").is_some());
        assert_eq!(g.servers().len(), 1);
        assert_eq!(g.servers()[0].name, "Production");
    }

    #[test]
    fn test_skipped_parameter_keeps_operation() {
        let opts = GenerateOptions {
            ignore_not_implemented: vec!["all".into()],
            ..Default::default()
        };
        let g = generate(PETSTORE, opts).unwrap();
        let delete = g
            .operations()
            .iter()
            .find(|o| o.name == "DeletePet")
            .unwrap();
        assert_eq!(delete.params.len(), 1);
    }

    #[test]
    fn test_not_implemented_is_fatal_by_default() {
        let err = generate(PETSTORE, GenerateOptions::default()).unwrap_err();
        assert_eq!(err.skip_name(), Some("cookie parameters"));
    }

    #[test]
    fn test_filters_skip_operations() {
        let opts = GenerateOptions {
            filters: Filters {
                path_regex: None,
                methods: vec!["GET".into()],
            },
            ..Default::default()
        };
        let g = generate(PETSTORE, opts).unwrap();
        let names: Vec<&str> = g.operations().iter().map(|o| o.name.as_str()).collect();
        assert_eq!(names, vec!["GetPet", "ListPets"]);
    }

    #[test]
    fn test_forced_reduction_fails_without_defaults() {
        let opts = GenerateOptions {
            convenient_errors: ConvenientErrors::On,
            ignore_not_implemented: vec!["all".into()],
            ..Default::default()
        };
        let err = generate(PETSTORE, opts).unwrap_err();
        assert!(err.to_string().contains("can't reduce to convenient error"));
    }

    #[test]
    fn test_lower_component() {
        let doc = parse_document(PETSTORE, None, &ParseOptions::default()).unwrap();
        let (arena, storage, root) = lower_component(&doc, "Pet", &ParseOptions::default()).unwrap();
        assert_eq!(arena[root].name, "Pet");
        assert_eq!(storage.lookup_type("Pet"), Some(root));
        assert!(lower_component(&doc, "Nope", &ParseOptions::default()).is_err());
    }
}
