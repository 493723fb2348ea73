//! # Document Loader
//!
//! Reads a YAML or JSON document and resolves it into a [`Document`].
//!
//! Local references are followed eagerly. References to other files are
//! followed only with `allow_remote`; URLs are never fetched.

use crate::error::{AppError, AppResult};
use crate::spec::document::{
    Components, Document, Encoding, Media, OAuthFlow, OAuthFlows, Operation, Parameter,
    ParameterIn, ParameterStyle, RequestBody, Response, SecurityRequirement, SecurityScheme,
    Server, ServerVariable, Webhook,
};
use crate::spec::path::parse_path;
use crate::spec::refs::{parse_reference, resolve_pointer, ReferenceKind};
use crate::spec::schema::{
    Discriminator, PatternProperty, Property, Schema, SchemaArena, SchemaId, SchemaType,
};
use crate::spec::shims::{
    ShimDocument, ShimMedia, ShimOAuthFlow, ShimOAuthFlows, ShimOperation, ShimParameter,
    ShimPathItem, ShimRequestBody, ShimResponse, ShimSecurityScheme,
};
use crate::spec::Location;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Maximum length of a `$ref` -> `$ref` chain for non-schema objects.
const MAX_REF_CHAIN: usize = 64;

/// Parser options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ParseOptions {
    /// Infer a missing `type` from the other keywords.
    pub infer_types: bool,
    /// Follow references into other documents.
    pub allow_remote: bool,
    /// Maximum schema nesting during lowering.
    pub depth_limit: usize,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            infer_types: false,
            allow_remote: false,
            depth_limit: 1000,
        }
    }
}

/// Loads and resolves a document from disk.
pub fn load_file(path: &Path, options: &ParseOptions) -> AppResult<Document> {
    let text = fs::read_to_string(path)?;
    let file = path.to_string_lossy().into_owned();
    parse_document(&text, Some(&file), options)
}

/// Parses and resolves a document from text.
///
/// `file` is used for error locations and to resolve relative references.
pub fn parse_document(text: &str, file: Option<&str>, options: &ParseOptions) -> AppResult<Document> {
    let root = read_value(text, file)?;
    let base_dir = file
        .map(Path::new)
        .and_then(Path::parent)
        .map(Path::to_path_buf);
    let mut loader = Loader {
        root: Rc::new(root),
        file: file.map(str::to_string),
        base_dir,
        options,
        arena: SchemaArena::new(),
        schema_refs: HashMap::new(),
        documents: HashMap::new(),
    };
    loader.load()
}

/// Decodes YAML (a superset of JSON) into a JSON value tree.
pub(crate) fn read_value(text: &str, file: Option<&str>) -> AppResult<Value> {
    let yaml: serde_yaml::Value = serde_yaml::from_str(text).map_err(|e| {
        let location = Location {
            pointer: "#".to_string(),
            file: file.map(str::to_string),
            line: e.location().map(|l| l.line()),
        };
        AppError::Yaml(e).at(&location)
    })?;
    yaml_to_json(yaml)
}

fn yaml_to_json(value: serde_yaml::Value) -> AppResult<Value> {
    use serde_yaml::Value as Y;
    Ok(match value {
        Y::Null => Value::Null,
        Y::Bool(b) => Value::Bool(b),
        Y::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Number(i.into())
            } else if let Some(u) = n.as_u64() {
                Value::Number(u.into())
            } else {
                let f = n.as_f64().unwrap_or(f64::NAN);
                Value::Number(Number::from_f64(f).ok_or_else(|| {
                    AppError::ParseSpec(format!("number {n} is not representable in JSON"))
                })?)
            }
        }
        Y::String(s) => Value::String(s),
        Y::Sequence(items) => Value::Array(
            items
                .into_iter()
                .map(yaml_to_json)
                .collect::<AppResult<Vec<_>>>()?,
        ),
        Y::Mapping(mapping) => {
            let mut map = Map::with_capacity(mapping.len());
            for (k, v) in mapping {
                let key = match k {
                    Y::String(s) => s,
                    Y::Number(n) => n.to_string(),
                    Y::Bool(b) => b.to_string(),
                    Y::Null => "null".to_string(),
                    other => {
                        return Err(AppError::ParseSpec(format!(
                            "unsupported mapping key {other:?}"
                        )))
                    }
                };
                map.insert(key, yaml_to_json(v)?);
            }
            Value::Object(map)
        }
        Y::Tagged(tagged) => yaml_to_json(tagged.value)?,
    })
}

struct Loader<'o> {
    root: Rc<Value>,
    file: Option<String>,
    base_dir: Option<PathBuf>,
    options: &'o ParseOptions,
    arena: SchemaArena,
    /// Normalized `$ref` -> parsed schema.
    schema_refs: HashMap<String, SchemaId>,
    /// Other documents, keyed by path.
    documents: HashMap<String, Rc<Value>>,
}

/// Identifies which document a value came from (`None` is the root).
type DocKey = Option<String>;

impl Loader<'_> {
    fn root_location(&self, pointer: &str) -> Location {
        Location {
            pointer: pointer.to_string(),
            file: self.file.clone(),
            line: None,
        }
    }

    fn load(&mut self) -> AppResult<Document> {
        let root = Rc::clone(&self.root);
        let shim: ShimDocument = serde_json::from_value((*root).clone())
            .map_err(|e| AppError::ParseSpec(format!("invalid document: {e}")))?;

        if !shim.openapi.is_empty() && !shim.openapi.starts_with('3') {
            return Err(AppError::ParseSpec(format!(
                "unsupported OpenAPI version {:?}",
                shim.openapi
            )));
        }

        let components = self.load_components(&shim)?;

        let global_security: Vec<SecurityRequirement> = shim.security.clone();
        let paths_loc = self.root_location("#/paths");
        let mut operations = Vec::new();
        for (path, item) in &shim.paths.items {
            let loc = paths_loc.child(path);
            let ops = self.load_path_item(path, item, &loc, &global_security)?;
            operations.extend(ops);
        }

        let hooks_loc = self.root_location("#/webhooks");
        let mut webhooks = Vec::new();
        for (name, item) in &shim.webhooks.items {
            let loc = hooks_loc.child(name);
            let operations = self.load_path_item("", item, &loc, &global_security)?;
            webhooks.push(Webhook {
                name: name.clone(),
                operations,
            });
        }

        let servers_loc = self.root_location("#/servers");
        let servers = shim
            .servers
            .iter()
            .enumerate()
            .map(|(i, s)| Server {
                url: s.url.clone(),
                description: s.description.clone(),
                name: s.name.clone(),
                variables: s
                    .variables
                    .iter()
                    .map(|(k, v)| {
                        (
                            k.clone(),
                            ServerVariable {
                                default: v.default.clone(),
                                enum_values: v.enum_values.clone(),
                                description: v.description.clone(),
                            },
                        )
                    })
                    .collect(),
                location: servers_loc.child(&i.to_string()),
            })
            .collect();

        let extensions = shim
            .rest
            .iter()
            .filter(|(k, _)| k.starts_with("x-"))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();

        Ok(Document {
            openapi: shim.openapi,
            title: shim.info.title,
            schemas: std::mem::take(&mut self.arena),
            servers,
            operations,
            webhooks,
            components,
            extensions,
            file: self.file.clone(),
        })
    }

    fn load_components(&mut self, shim: &ShimDocument) -> AppResult<Components> {
        let mut components = Components::default();
        let c = &shim.components;

        for name in c.schemas.items.keys() {
            let reference = format!("#/components/schemas/{}", super::refs::encode_pointer_segment(name));
            let loc = self.root_location(&reference);
            let id = self.parse_schema_ref(&reference, &loc, &None)?;
            components.schemas.insert(name.clone(), id);
        }
        for (name, value) in &c.parameters.items {
            let loc = self.root_location("#/components/parameters").child(name);
            let param = self.load_parameter(value, &loc)?;
            components.parameters.insert(name.clone(), param);
        }
        for (name, value) in &c.request_bodies.items {
            let loc = self.root_location("#/components/requestBodies").child(name);
            let body = self.load_request_body(value, &loc)?;
            components.request_bodies.insert(name.clone(), body);
        }
        for (name, value) in &c.responses.items {
            let loc = self.root_location("#/components/responses").child(name);
            let response = self.load_response(value, &loc)?;
            components.responses.insert(name.clone(), response);
        }
        for (name, value) in &c.security_schemes.items {
            let loc = self.root_location("#/components/securitySchemes").child(name);
            let (value, _, loc) = self.follow(value, &loc)?;
            let raw: ShimSecurityScheme = decode(&value, &loc)?;
            components
                .security_schemes
                .insert(name.clone(), security_scheme(raw, loc));
        }
        Ok(components)
    }

    /// Follows a local `$ref` chain for a non-schema object.
    ///
    /// Returns the target value, the first reference and the target location.
    fn follow(&self, value: &Value, loc: &Location) -> AppResult<(Value, Option<String>, Location)> {
        let mut current = value.clone();
        let mut current_loc = loc.clone();
        let mut first_ref = None;
        for _ in 0..MAX_REF_CHAIN {
            let Some(reference) = current.get("$ref").and_then(Value::as_str) else {
                return Ok((current, first_ref, current_loc));
            };
            let parsed = parse_reference(reference);
            if parsed.kind != ReferenceKind::Local {
                return Err(AppError::ParseSpec(format!(
                    "external reference {reference:?} is only supported for schemas"
                ))
                .at(&current_loc));
            }
            let fragment = parsed.fragment.unwrap_or_default();
            let target = resolve_pointer(&self.root, fragment).ok_or_else(|| {
                AppError::ParseSpec(format!("can't resolve reference {reference:?}")).at(&current_loc)
            })?;
            if first_ref.is_none() {
                first_ref = Some(reference.to_string());
            }
            current_loc = self.root_location(&format!("#{fragment}"));
            current = target.clone();
        }
        Err(AppError::ParseSpec("reference chain is too long".into()).at(loc))
    }

    fn load_path_item(
        &mut self,
        path: &str,
        item: &Value,
        loc: &Location,
        global_security: &[SecurityRequirement],
    ) -> AppResult<Vec<Operation>> {
        let (value, _, item_loc) = self.follow(item, loc)?;
        let item: ShimPathItem = decode(&value, &item_loc)?;
        let path_parts = parse_path(path).map_err(|e| e.at(loc))?;

        let mut shared = Vec::with_capacity(item.parameters.len());
        for (i, p) in item.parameters.iter().enumerate() {
            let p_loc = item_loc.child("parameters").child(&i.to_string());
            shared.push(self.load_parameter(p, &p_loc)?);
        }

        let mut operations = Vec::new();
        for (method, op) in item.operations() {
            let op_loc = item_loc.child(method);
            let operation =
                self.load_operation(path, &path_parts, method, op, &shared, &op_loc, global_security)?;
            operations.push(operation);
        }
        Ok(operations)
    }

    #[allow(clippy::too_many_arguments)]
    fn load_operation(
        &mut self,
        path: &str,
        path_parts: &[crate::spec::PathPart],
        method: &str,
        op: &ShimOperation,
        shared: &[Parameter],
        loc: &Location,
        global_security: &[SecurityRequirement],
    ) -> AppResult<Operation> {
        let mut parameters: Vec<Parameter> = shared.to_vec();
        for (i, p) in op.parameters.iter().enumerate() {
            let p_loc = loc.child("parameters").child(&i.to_string());
            let param = self.load_parameter(p, &p_loc)?;
            match parameters
                .iter_mut()
                .find(|existing| existing.name == param.name && existing.location_in == param.location_in)
            {
                Some(existing) => *existing = param,
                None => parameters.push(param),
            }
        }

        let request_body = match &op.request_body {
            Some(body) => Some(self.load_request_body(body, &loc.child("requestBody"))?),
            None => None,
        };

        let mut responses = IndexMap::new();
        let responses_loc = loc.child("responses");
        for (status, value) in &op.responses.items {
            let response = self.load_response(value, &responses_loc.child(status))?;
            responses.insert(status.clone(), response);
        }

        Ok(Operation {
            operation_id: op.operation_id.clone(),
            summary: op.summary.clone(),
            description: op.description.clone(),
            deprecated: op.deprecated,
            http_method: method.to_string(),
            path: path.to_string(),
            path_parts: path_parts.to_vec(),
            parameters,
            request_body,
            responses,
            security: op
                .security
                .clone()
                .unwrap_or_else(|| global_security.to_vec()),
            location: loc.clone(),
        })
    }

    fn load_parameter(&mut self, value: &Value, loc: &Location) -> AppResult<Parameter> {
        let (value, xref, loc) = self.follow(value, loc)?;
        let raw: ShimParameter = decode(&value, &loc)?;
        let location_in = raw
            .location_in
            .as_deref()
            .and_then(ParameterIn::parse)
            .ok_or_else(|| {
                AppError::ParseSpec(format!(
                    "parameter {:?}: invalid location {:?}",
                    raw.name, raw.location_in
                ))
                .at(&loc)
            })?;
        self.build_parameter(raw, location_in, xref, loc)
    }

    fn load_header(&mut self, name: &str, value: &Value, loc: &Location) -> AppResult<Parameter> {
        let (value, xref, loc) = self.follow(value, loc)?;
        let mut raw: ShimParameter = decode(&value, &loc)?;
        raw.name = name.to_string();
        self.build_parameter(raw, ParameterIn::Header, xref, loc)
    }

    fn build_parameter(
        &mut self,
        raw: ShimParameter,
        location_in: ParameterIn,
        xref: Option<String>,
        loc: Location,
    ) -> AppResult<Parameter> {
        if location_in == ParameterIn::Path && !raw.required {
            return Err(AppError::ParseSpec(format!(
                "path parameter {:?} must be required",
                raw.name
            ))
            .at(&loc));
        }

        let style = match raw.style.as_deref() {
            Some(s) => ParameterStyle::parse(s).ok_or_else(|| {
                AppError::ParseSpec(format!("unknown parameter style {s:?}")).at(&loc)
            })?,
            None => location_in.default_style(),
        };

        let schema = match &raw.schema {
            Some(s) => Some(self.parse_schema(s, &loc.child("schema"), &None)?),
            None => None,
        };

        let content = match &raw.content {
            Some(content) => {
                if content.len() != 1 {
                    return Err(AppError::ParseSpec(format!(
                        "parameter {:?}: content must have exactly one entry",
                        raw.name
                    ))
                    .at(&loc));
                }
                match content.iter().next() {
                    Some((ct, media)) => {
                        let media_loc = loc.child("content").child(ct);
                        Some((ct.clone(), self.load_media(media, &media_loc)?))
                    }
                    None => None,
                }
            }
            None => None,
        };

        if schema.is_none() && content.is_none() {
            return Err(AppError::ParseSpec(format!(
                "parameter {:?} has neither schema nor content",
                raw.name
            ))
            .at(&loc));
        }

        Ok(Parameter {
            xref,
            name: raw.name,
            location_in,
            description: raw.description,
            schema,
            content,
            style,
            explode: raw.explode.unwrap_or(style == ParameterStyle::Form),
            required: raw.required,
            deprecated: raw.deprecated,
            location: loc,
        })
    }

    fn load_media(&mut self, media: &ShimMedia, loc: &Location) -> AppResult<Media> {
        let schema = match &media.schema {
            Some(s) => Some(self.parse_schema(s, &loc.child("schema"), &None)?),
            None => None,
        };
        let mut encoding = IndexMap::new();
        for (prop, e) in &media.encoding {
            let style = match e.style.as_deref() {
                Some(s) => Some(ParameterStyle::parse(s).ok_or_else(|| {
                    AppError::ParseSpec(format!("unknown encoding style {s:?}")).at(loc)
                })?),
                None => None,
            };
            encoding.insert(
                prop.clone(),
                Encoding {
                    content_type: e.content_type.clone(),
                    style,
                    explode: e.explode,
                },
            );
        }
        Ok(Media {
            schema,
            encoding,
            json_streaming: media.json_streaming,
            location: loc.clone(),
        })
    }

    fn load_request_body(&mut self, value: &Value, loc: &Location) -> AppResult<RequestBody> {
        let (value, xref, loc) = self.follow(value, loc)?;
        let raw: ShimRequestBody = decode(&value, &loc)?;
        let mut content = IndexMap::new();
        for (ct, media) in &raw.content {
            let media_loc = loc.child("content").child(ct);
            content.insert(ct.clone(), self.load_media(media, &media_loc)?);
        }
        Ok(RequestBody {
            xref,
            description: raw.description,
            content,
            required: raw.required,
            location: loc,
        })
    }

    fn load_response(&mut self, value: &Value, loc: &Location) -> AppResult<Response> {
        let (value, xref, loc) = self.follow(value, loc)?;
        let raw: ShimResponse = decode(&value, &loc)?;
        let mut headers = IndexMap::new();
        for (name, header) in &raw.headers.items {
            let header_loc = loc.child("headers").child(name);
            headers.insert(name.clone(), self.load_header(name, header, &header_loc)?);
        }
        let mut content = IndexMap::new();
        for (ct, media) in &raw.content {
            let media_loc = loc.child("content").child(ct);
            content.insert(ct.clone(), self.load_media(media, &media_loc)?);
        }
        Ok(Response {
            xref,
            description: raw.description,
            headers,
            content,
            location: loc,
        })
    }

    // Schemas.

    fn document(&mut self, key: &DocKey) -> AppResult<Rc<Value>> {
        let Some(path) = key else {
            return Ok(Rc::clone(&self.root));
        };
        if let Some(doc) = self.documents.get(path) {
            return Ok(Rc::clone(doc));
        }
        let text = fs::read_to_string(path)?;
        let doc = Rc::new(read_value(&text, Some(path))?);
        self.documents.insert(path.clone(), Rc::clone(&doc));
        Ok(doc)
    }

    /// Normalizes `reference` relative to the document it appears in.
    ///
    /// Returns the target document and the fragment.
    fn normalize(&self, reference: &str, doc: &DocKey, loc: &Location) -> AppResult<(DocKey, String)> {
        let parsed = parse_reference(reference);
        let fragment = parsed.fragment.unwrap_or_default().to_string();
        match parsed.kind {
            ReferenceKind::Local => Ok((doc.clone(), fragment)),
            _ if !self.options.allow_remote => Err(AppError::ParseSpec(format!(
                "remote reference {reference:?} is not allowed"
            ))
            .at(loc)),
            ReferenceKind::Relative => {
                let base = match doc {
                    Some(current) => Path::new(current).parent().map(Path::to_path_buf),
                    None => self.base_dir.clone(),
                };
                let target = match base {
                    Some(dir) => dir.join(parsed.document),
                    None => PathBuf::from(parsed.document),
                };
                Ok((Some(target.to_string_lossy().into_owned()), fragment))
            }
            ReferenceKind::Remote => {
                let url = url::Url::parse(parsed.document)
                    .map_err(|e| AppError::ParseSpec(format!("invalid reference {reference:?}: {e}")))?;
                if url.scheme() != "file" {
                    return Err(AppError::ParseSpec(format!(
                        "fetching {reference:?} is not supported"
                    ))
                    .at(loc));
                }
                let path = url
                    .to_file_path()
                    .map_err(|_| AppError::ParseSpec(format!("invalid file URL {reference:?}")))?;
                Ok((Some(path.to_string_lossy().into_owned()), fragment))
            }
        }
    }

    fn parse_schema(&mut self, value: &Value, loc: &Location, doc: &DocKey) -> AppResult<SchemaId> {
        match value {
            Value::Bool(_) => Ok(self.arena.alloc(Schema {
                location: loc.clone(),
                ..Default::default()
            })),
            Value::Object(map) => {
                if let Some(reference) = map.get("$ref").and_then(Value::as_str) {
                    return self.parse_schema_ref(reference, loc, doc);
                }
                let schema = self.build_schema(map, loc, doc)?;
                Ok(self.arena.alloc(schema))
            }
            other => Err(AppError::ParseSpec(format!(
                "schema must be an object or a boolean, got {other}"
            ))
            .at(loc)),
        }
    }

    fn parse_schema_ref(&mut self, reference: &str, loc: &Location, doc: &DocKey) -> AppResult<SchemaId> {
        let (target_doc, fragment) = self.normalize(reference, doc, loc)?;
        let key = match &target_doc {
            Some(path) => format!("{path}#{fragment}"),
            None => format!("#{fragment}"),
        };
        if let Some(id) = self.schema_refs.get(&key) {
            return Ok(*id);
        }

        let document = self.document(&target_doc)?;
        let target = resolve_pointer(&document, &fragment).ok_or_else(|| {
            AppError::ParseSpec(format!("can't resolve reference {reference:?}")).at(loc)
        })?;
        let target_loc = Location {
            pointer: format!("#{fragment}"),
            file: target_doc.clone().or_else(|| self.file.clone()),
            line: None,
        };

        if let Some(inner) = target.get("$ref").and_then(Value::as_str) {
            let id = self.parse_schema_ref(inner, &target_loc, &target_doc)?;
            self.schema_refs.insert(key, id);
            return Ok(id);
        }

        let id = self.arena.reserve();
        self.schema_refs.insert(key.clone(), id);
        let mut schema = match target {
            Value::Object(map) => self.build_schema(map, &target_loc, &target_doc)?,
            Value::Bool(_) => Schema {
                location: target_loc.clone(),
                ..Default::default()
            },
            other => {
                return Err(AppError::ParseSpec(format!(
                    "reference {reference:?} points to {other}, not a schema"
                ))
                .at(loc))
            }
        };
        schema.xref = Some(key);
        self.arena.set(id, schema);
        Ok(id)
    }

    fn schema_list(&mut self, map: &Map<String, Value>, key: &str, loc: &Location, doc: &DocKey) -> AppResult<Vec<SchemaId>> {
        let Some(value) = map.get(key) else {
            return Ok(Vec::new());
        };
        let Value::Array(items) = value else {
            return Err(AppError::ParseSpec(format!("{key} must be an array")).at(loc));
        };
        let list_loc = loc.child(key);
        items
            .iter()
            .enumerate()
            .map(|(i, v)| self.parse_schema(v, &list_loc.child(&i.to_string()), doc))
            .collect()
    }

    fn build_schema(&mut self, map: &Map<String, Value>, loc: &Location, doc: &DocKey) -> AppResult<Schema> {
        let mut schema = Schema {
            location: loc.clone(),
            ..Default::default()
        };

        let mut extra_types = Vec::new();
        match map.get("type") {
            Some(Value::String(t)) => {
                schema.ty = SchemaType::parse(t)
                    .ok_or_else(|| AppError::ParseSpec(format!("unknown type {t:?}")).at(loc))?;
            }
            Some(Value::Array(types)) => {
                let mut named = Vec::new();
                for t in types {
                    let t = t.as_str().and_then(SchemaType::parse).ok_or_else(|| {
                        AppError::ParseSpec(format!("invalid type entry {t}")).at(loc)
                    })?;
                    if t == SchemaType::Null {
                        schema.nullable = true;
                    } else {
                        named.push(t);
                    }
                }
                match named.as_slice() {
                    [] if schema.nullable => schema.ty = SchemaType::Null,
                    [] => {}
                    [single] => schema.ty = *single,
                    many => extra_types = many.to_vec(),
                }
            }
            Some(other) => {
                return Err(AppError::ParseSpec(format!("invalid type {other}")).at(loc));
            }
            None => {}
        }

        schema.format = str_field(map, "format");
        schema.description = str_field(map, "description");
        schema.deprecated = bool_field(map, "deprecated");
        if bool_field(map, "nullable") {
            schema.nullable = true;
        }

        let required: Vec<&str> = map
            .get("required")
            .and_then(Value::as_array)
            .map(|r| r.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        if let Some(Value::Object(props)) = map.get("properties") {
            let props_loc = loc.child("properties");
            for (name, value) in props {
                let id = self.parse_schema(value, &props_loc.child(name), doc)?;
                schema.properties.push(Property {
                    name: name.clone(),
                    schema: id,
                    required: required.contains(&name.as_str()),
                    description: value
                        .get("description")
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string(),
                });
            }
        }

        match map.get("additionalProperties") {
            Some(Value::Bool(b)) => schema.additional_properties = Some(*b),
            Some(value @ Value::Object(_)) => {
                schema.additional_properties = Some(true);
                schema.additional_item =
                    Some(self.parse_schema(value, &loc.child("additionalProperties"), doc)?);
            }
            _ => {}
        }

        if let Some(Value::Object(patterns)) = map.get("patternProperties") {
            let pp_loc = loc.child("patternProperties");
            for (pattern, value) in patterns {
                let id = self.parse_schema(value, &pp_loc.child(pattern), doc)?;
                schema.pattern_properties.push(PatternProperty {
                    pattern: pattern.clone(),
                    schema: id,
                });
            }
        }

        match map.get("items") {
            Some(Value::Array(_)) => schema.prefix_items = self.schema_list(map, "items", loc, doc)?,
            Some(value) => schema.items = Some(self.parse_schema(value, &loc.child("items"), doc)?),
            None => {}
        }
        if map.contains_key("prefixItems") {
            schema.prefix_items = self.schema_list(map, "prefixItems", loc, doc)?;
        }

        if let Some(Value::Array(values)) = map.get("enum") {
            schema.enum_values = values.clone();
        } else if let Some(value) = map.get("const") {
            schema.enum_values = vec![value.clone()];
        }

        schema.one_of = self.schema_list(map, "oneOf", loc, doc)?;
        schema.any_of = self.schema_list(map, "anyOf", loc, doc)?;
        schema.all_of = self.schema_list(map, "allOf", loc, doc)?;

        if let Some(Value::Object(d)) = map.get("discriminator") {
            let mut discriminator = Discriminator {
                property_name: d
                    .get("propertyName")
                    .and_then(Value::as_str)
                    .unwrap_or_default()
                    .to_string(),
                mapping: Vec::new(),
            };
            if let Some(Value::Object(mapping)) = d.get("mapping") {
                for (key, target) in mapping {
                    let Some(target) = target.as_str() else {
                        continue;
                    };
                    let reference = if target.contains('#') || target.contains('/') {
                        target.to_string()
                    } else {
                        format!("#/components/schemas/{target}")
                    };
                    let (target_doc, fragment) = self.normalize(&reference, doc, loc)?;
                    let normalized = match target_doc {
                        Some(path) => format!("{path}#{fragment}"),
                        None => format!("#{fragment}"),
                    };
                    discriminator.mapping.push((key.clone(), normalized));
                }
            }
            schema.discriminator = Some(discriminator);
        }

        schema.default = map.get("default").cloned();

        schema.maximum = map.get("maximum").and_then(num_field);
        schema.minimum = map.get("minimum").and_then(num_field);
        match map.get("exclusiveMaximum") {
            Some(Value::Bool(b)) => schema.exclusive_maximum = *b,
            Some(Value::Number(n)) => {
                schema.maximum = Some(n.clone());
                schema.exclusive_maximum = true;
            }
            _ => {}
        }
        match map.get("exclusiveMinimum") {
            Some(Value::Bool(b)) => schema.exclusive_minimum = *b,
            Some(Value::Number(n)) => {
                schema.minimum = Some(n.clone());
                schema.exclusive_minimum = true;
            }
            _ => {}
        }
        schema.multiple_of = map.get("multipleOf").and_then(num_field);
        schema.max_length = map.get("maxLength").and_then(Value::as_u64);
        schema.min_length = map.get("minLength").and_then(Value::as_u64);
        schema.pattern = map.get("pattern").and_then(Value::as_str).map(str::to_string);
        schema.max_items = map.get("maxItems").and_then(Value::as_u64);
        schema.min_items = map.get("minItems").and_then(Value::as_u64);
        schema.unique_items = bool_field(map, "uniqueItems");
        schema.max_properties = map.get("maxProperties").and_then(Value::as_u64);
        schema.min_properties = map.get("minProperties").and_then(Value::as_u64);
        schema.x_name = map.get("x-ogen-name").and_then(Value::as_str).map(str::to_string);
        schema.x_type = map.get("x-ogen-type").and_then(Value::as_str).map(str::to_string);

        if schema.ty == SchemaType::Empty && self.options.infer_types {
            schema.ty = infer_type(map);
        }

        if !extra_types.is_empty() {
            // A list of several types is a oneOf over single-typed copies.
            for ty in extra_types {
                let variant = Schema {
                    ty,
                    format: schema.format.clone(),
                    location: loc.child("type"),
                    ..Default::default()
                };
                schema.one_of.push(self.arena.alloc(variant));
            }
        }

        Ok(schema)
    }
}

fn infer_type(map: &Map<String, Value>) -> SchemaType {
    let has = |keys: &[&str]| keys.iter().any(|k| map.contains_key(*k));
    if has(&[
        "properties",
        "additionalProperties",
        "patternProperties",
        "required",
        "maxProperties",
        "minProperties",
    ]) {
        SchemaType::Object
    } else if has(&["items", "prefixItems", "maxItems", "minItems", "uniqueItems"]) {
        SchemaType::Array
    } else if has(&["pattern", "maxLength", "minLength"]) {
        SchemaType::String
    } else if has(&["maximum", "minimum", "multipleOf", "exclusiveMaximum", "exclusiveMinimum"]) {
        SchemaType::Number
    } else {
        SchemaType::Empty
    }
}

fn decode<T: serde::de::DeserializeOwned>(value: &Value, loc: &Location) -> AppResult<T> {
    serde_json::from_value(value.clone())
        .map_err(|e| AppError::ParseSpec(e.to_string()).at(loc))
}

fn str_field(map: &Map<String, Value>, key: &str) -> String {
    map.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

fn bool_field(map: &Map<String, Value>, key: &str) -> bool {
    map.get(key).and_then(Value::as_bool).unwrap_or(false)
}

fn num_field(value: &Value) -> Option<Number> {
    match value {
        Value::Number(n) => Some(n.clone()),
        _ => None,
    }
}

fn oauth_flow(flow: Option<ShimOAuthFlow>) -> Option<OAuthFlow> {
    flow.map(|f| OAuthFlow { scopes: f.scopes })
}

fn security_scheme(raw: ShimSecurityScheme, location: Location) -> SecurityScheme {
    SecurityScheme {
        ty: raw.ty,
        description: raw.description,
        name: raw.name,
        location_in: raw.location_in,
        scheme: raw.scheme,
        bearer_format: raw.bearer_format,
        flows: raw.flows.map(|f: ShimOAuthFlows| OAuthFlows {
            implicit: oauth_flow(f.implicit),
            password: oauth_flow(f.password),
            client_credentials: oauth_flow(f.client_credentials),
            authorization_code: oauth_flow(f.authorization_code),
        }),
        open_id_connect_url: raw.open_id_connect_url,
        custom: raw.custom,
        location,
    }
}
