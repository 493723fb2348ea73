//! # Document Model
//!
//! Operations, parameters, bodies, responses, security and servers of a
//! resolved document. References to shared components are already followed;
//! the original `$ref` string is kept in `xref` so shared entities can be
//! cached by the lowerer.

use crate::spec::path::PathPart;
use crate::spec::{Location, SchemaArena, SchemaId};
use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Parameter location (`in`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParameterIn {
    /// `in: query`
    Query,
    /// `in: header`
    Header,
    /// `in: path`
    Path,
    /// `in: cookie`
    Cookie,
}

impl ParameterIn {
    /// Parses the `in` keyword.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "query" => Some(ParameterIn::Query),
            "header" => Some(ParameterIn::Header),
            "path" => Some(ParameterIn::Path),
            "cookie" => Some(ParameterIn::Cookie),
            _ => None,
        }
    }

    /// Default serialization style for the location.
    pub fn default_style(self) -> ParameterStyle {
        match self {
            ParameterIn::Query | ParameterIn::Cookie => ParameterStyle::Form,
            ParameterIn::Header | ParameterIn::Path => ParameterStyle::Simple,
        }
    }
}

impl fmt::Display for ParameterIn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ParameterIn::Query => "query",
            ParameterIn::Header => "header",
            ParameterIn::Path => "path",
            ParameterIn::Cookie => "cookie",
        })
    }
}

/// Parameter serialization style.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterStyle {
    /// `matrix`
    Matrix,
    /// `label`
    Label,
    /// `form`
    Form,
    /// `simple`
    Simple,
    /// `spaceDelimited`
    SpaceDelimited,
    /// `pipeDelimited`
    PipeDelimited,
    /// `deepObject`
    DeepObject,
}

impl ParameterStyle {
    /// Parses the `style` keyword.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "matrix" => Some(ParameterStyle::Matrix),
            "label" => Some(ParameterStyle::Label),
            "form" => Some(ParameterStyle::Form),
            "simple" => Some(ParameterStyle::Simple),
            "spaceDelimited" => Some(ParameterStyle::SpaceDelimited),
            "pipeDelimited" => Some(ParameterStyle::PipeDelimited),
            "deepObject" => Some(ParameterStyle::DeepObject),
            _ => None,
        }
    }

    /// Whether the style is valid for the given location.
    pub fn allowed_in(self, location: ParameterIn) -> bool {
        use ParameterStyle::*;
        match location {
            ParameterIn::Path => matches!(self, Matrix | Label | Simple),
            ParameterIn::Query => matches!(self, Form | SpaceDelimited | PipeDelimited | DeepObject),
            ParameterIn::Header => matches!(self, Simple),
            ParameterIn::Cookie => matches!(self, Form),
        }
    }
}

/// Per-property encoding of a form body.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Encoding {
    /// `contentType`
    pub content_type: Option<String>,
    /// `style`
    pub style: Option<ParameterStyle>,
    /// `explode`
    pub explode: Option<bool>,
}

/// Media Type Object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Media {
    /// Payload schema.
    pub schema: Option<SchemaId>,
    /// Form encodings keyed by property.
    pub encoding: IndexMap<String, Encoding>,
    /// `x-ogen-json-streaming`
    pub json_streaming: bool,
    /// Where the media was defined.
    pub location: Location,
}

/// Parameter Object (also used for response headers).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    /// `$ref` the parameter was reached through.
    pub xref: Option<String>,
    /// `name`
    pub name: String,
    /// `in`
    pub location_in: ParameterIn,
    /// `description`
    pub description: String,
    /// `schema`
    pub schema: Option<SchemaId>,
    /// `content` (single entry).
    pub content: Option<(String, Media)>,
    /// Effective style (explicit or the location default).
    pub style: ParameterStyle,
    /// Effective `explode`.
    pub explode: bool,
    /// `required`
    pub required: bool,
    /// `deprecated`
    pub deprecated: bool,
    /// Where the parameter was defined.
    pub location: Location,
}

/// Request Body Object.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestBody {
    /// `$ref` the body was reached through.
    pub xref: Option<String>,
    /// `description`
    pub description: String,
    /// `content`
    pub content: IndexMap<String, Media>,
    /// `required`
    pub required: bool,
    /// Where the body was defined.
    pub location: Location,
}

/// Response Object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Response {
    /// `$ref` the response was reached through.
    pub xref: Option<String>,
    /// `description`
    pub description: String,
    /// `headers`, as header parameters.
    pub headers: IndexMap<String, Parameter>,
    /// `content`
    pub content: IndexMap<String, Media>,
    /// Where the response was defined.
    pub location: Location,
}

/// Security requirement: scheme name to required scopes.
pub type SecurityRequirement = IndexMap<String, Vec<String>>;

/// Operation Object with its method and path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operation {
    /// `operationId`
    pub operation_id: Option<String>,
    /// `summary`
    pub summary: String,
    /// `description`
    pub description: String,
    /// `deprecated`
    pub deprecated: bool,
    /// Lower-case HTTP method.
    pub http_method: String,
    /// Raw path template.
    pub path: String,
    /// Parsed path template.
    pub path_parts: Vec<PathPart>,
    /// Path-item and operation parameters, merged.
    pub parameters: Vec<Parameter>,
    /// `requestBody`
    pub request_body: Option<RequestBody>,
    /// `responses`, keyed by status pattern (`200`, `4XX`, `default`).
    pub responses: IndexMap<String, Response>,
    /// Effective security (operation-level or document-level).
    pub security: Vec<SecurityRequirement>,
    /// Where the operation was defined.
    pub location: Location,
}

/// Webhook entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Webhook {
    /// Webhook name.
    pub name: String,
    /// Its operations.
    pub operations: Vec<Operation>,
}

/// OAuth2 flow.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OAuthFlow {
    /// Declared scopes.
    pub scopes: IndexMap<String, String>,
}

/// OAuth2 flows.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct OAuthFlows {
    /// `implicit`
    pub implicit: Option<OAuthFlow>,
    /// `password`
    pub password: Option<OAuthFlow>,
    /// `clientCredentials`
    pub client_credentials: Option<OAuthFlow>,
    /// `authorizationCode`
    pub authorization_code: Option<OAuthFlow>,
}

impl OAuthFlows {
    /// Whether any flow declares `scope`.
    pub fn has_scope(&self, scope: &str) -> bool {
        [
            &self.implicit,
            &self.password,
            &self.client_credentials,
            &self.authorization_code,
        ]
        .into_iter()
        .flatten()
        .any(|flow| flow.scopes.contains_key(scope))
    }
}

/// Security Scheme Object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SecurityScheme {
    /// `type`
    pub ty: String,
    /// `description`
    pub description: String,
    /// `name` (apiKey)
    pub name: String,
    /// `in` (apiKey)
    pub location_in: String,
    /// `scheme` (http)
    pub scheme: String,
    /// `bearerFormat` (http)
    pub bearer_format: String,
    /// `flows` (oauth2)
    pub flows: Option<OAuthFlows>,
    /// `openIdConnectUrl`
    pub open_id_connect_url: String,
    /// `x-ogen-custom-security`
    pub custom: bool,
    /// Where the scheme was defined.
    pub location: Location,
}

/// Server variable.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ServerVariable {
    /// `default`
    pub default: String,
    /// `enum`
    pub enum_values: Vec<String>,
    /// `description`
    pub description: String,
}

/// Server Object.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Server {
    /// `url`
    pub url: String,
    /// `description`
    pub description: String,
    /// `x-ogen-server-name`
    pub name: Option<String>,
    /// `variables`
    pub variables: IndexMap<String, ServerVariable>,
    /// Where the server was defined.
    pub location: Location,
}

/// Named components that can be reached by `$ref`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Components {
    /// `components.schemas`
    pub schemas: IndexMap<String, SchemaId>,
    /// `components.responses`
    pub responses: IndexMap<String, Response>,
    /// `components.parameters`
    pub parameters: IndexMap<String, Parameter>,
    /// `components.requestBodies`
    pub request_bodies: IndexMap<String, RequestBody>,
    /// `components.securitySchemes`
    pub security_schemes: IndexMap<String, SecurityScheme>,
}

/// A resolved OpenAPI document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Document {
    /// `openapi` version string.
    pub openapi: String,
    /// `info.title`
    pub title: String,
    /// Every schema in the document.
    pub schemas: SchemaArena,
    /// `servers`
    pub servers: Vec<Server>,
    /// Operations in path/method order.
    pub operations: Vec<Operation>,
    /// `webhooks`
    pub webhooks: Vec<Webhook>,
    /// `components`
    pub components: Components,
    /// Document extensions (`x-...`).
    pub extensions: IndexMap<String, Value>,
    /// Source file, when loaded from disk.
    pub file: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_style_rules() {
        assert_eq!(ParameterIn::Query.default_style(), ParameterStyle::Form);
        assert!(ParameterStyle::DeepObject.allowed_in(ParameterIn::Query));
        assert!(!ParameterStyle::DeepObject.allowed_in(ParameterIn::Path));
        assert_eq!(
            ParameterStyle::parse("pipeDelimited"),
            Some(ParameterStyle::PipeDelimited)
        );
    }

    #[test]
    fn test_oauth_scopes() {
        let mut flow = OAuthFlow::default();
        flow.scopes.insert("read:pets".into(), "read".into());
        let flows = OAuthFlows {
            implicit: Some(flow),
            ..Default::default()
        };
        assert!(flows.has_scope("read:pets"));
        assert!(!flows.has_scope("write:pets"));
    }
}
