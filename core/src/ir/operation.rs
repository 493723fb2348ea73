//! # Operation IR
//!
//! Per-operation envelopes: parameters, request, responses, security and
//! servers. Types are referenced by [`TypeId`]; the originating document
//! entities are kept alongside for the emitter.

use crate::error::{AppError, AppResult};
use crate::ir::types::TypeId;
use crate::spec::{self, Location, ParameterIn};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Wire encoding class of a content type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Encoding {
    /// `application/json`
    #[serde(rename = "application/json")]
    Json,
    /// `application/x-www-form-urlencoded`
    #[serde(rename = "application/x-www-form-urlencoded")]
    FormUrlEncoded,
    /// `multipart/form-data`
    #[serde(rename = "multipart/form-data")]
    Multipart,
    /// `application/octet-stream`
    #[serde(rename = "application/octet-stream")]
    OctetStream,
    /// `text/plain`
    #[serde(rename = "text/plain")]
    TextPlain,
}

impl Encoding {
    /// Canonical content type.
    pub fn as_str(self) -> &'static str {
        match self {
            Encoding::Json => "application/json",
            Encoding::FormUrlEncoded => "application/x-www-form-urlencoded",
            Encoding::Multipart => "multipart/form-data",
            Encoding::OctetStream => "application/octet-stream",
            Encoding::TextPlain => "text/plain",
        }
    }

    /// Parses a canonical content type.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "application/json" => Some(Encoding::Json),
            "application/x-www-form-urlencoded" => Some(Encoding::FormUrlEncoded),
            "multipart/form-data" => Some(Encoding::Multipart),
            "application/octet-stream" => Some(Encoding::OctetStream),
            "text/plain" => Some(Encoding::TextPlain),
            _ => None,
        }
    }

    /// Encoding class of a parsed content type: canonical types, plus
    /// structured JSON suffixes (`application/problem+json`).
    pub fn of(content_type: &str) -> Option<Self> {
        Self::parse(content_type).or_else(|| {
            (content_type.starts_with("application/") && content_type.ends_with("+json"))
                .then_some(Encoding::Json)
        })
    }

    /// Short name used in generated identifiers.
    pub fn name(self) -> &'static str {
        match self {
            Encoding::Json => "JSON",
            Encoding::FormUrlEncoded => "FormURLEncoded",
            Encoding::Multipart => "MultipartFormData",
            Encoding::OctetStream => "OctetStream",
            Encoding::TextPlain => "TextPlain",
        }
    }
}

impl fmt::Display for Encoding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether a content type contains a `*` wildcard.
pub fn is_mask(content_type: &str) -> bool {
    content_type.contains('*')
}

/// Payload of one content type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Media {
    /// Encoding class.
    pub encoding: Encoding,
    /// Payload type.
    #[serde(rename = "type")]
    pub ty: TypeId,
    /// `x-ogen-json-streaming`
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub json_streaming: bool,
}

/// Operation parameter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Parameter {
    /// Identifier.
    pub name: String,
    /// Parameter type (boxed when optional or nullable).
    #[serde(rename = "type")]
    pub ty: TypeId,
    /// Document parameter.
    pub spec: spec::Parameter,
}

impl Parameter {
    /// Location of the parameter.
    pub fn location_in(&self) -> ParameterIn {
        self.spec.location_in
    }
}

/// Piece of a lowered path template.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum PathPart {
    /// Literal text.
    Raw(String),
    /// Index into [`Operation::params`].
    Param(usize),
}

/// Request body envelope.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Request {
    /// Body type: the single payload, or an interface over all payloads.
    #[serde(rename = "type")]
    pub ty: TypeId,
    /// Payload per content type, sorted by content type.
    pub contents: BTreeMap<String, Media>,
    /// Marker type for an omitted optional body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub empty_body: Option<TypeId>,
    /// Document body.
    pub spec: spec::RequestBody,
}

/// One response (a status code, a pattern or the default).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response {
    /// Type for a response without content.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub no_content: Option<TypeId>,
    /// Payload per content type, sorted by content type.
    pub contents: BTreeMap<String, Media>,
    /// Response headers.
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub headers: IndexMap<String, Parameter>,
    /// Payload wrapped to carry the status code.
    pub with_status_code: bool,
    /// Payload wrapped to carry headers.
    pub with_headers: bool,
    /// Document response.
    pub spec: spec::Response,
}

impl Response {
    /// Every payload type, `no_content` first.
    pub fn types(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.no_content
            .into_iter()
            .chain(self.contents.values().map(|m| m.ty))
    }
}

/// Response envelope of an operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Responses {
    /// Result type: the single payload, or an interface over all payloads.
    #[serde(rename = "type")]
    pub ty: TypeId,
    /// Explicit status codes.
    pub status_code: BTreeMap<u16, Response>,
    /// `1XX` ..= `5XX`, at index `class - 1`.
    pub pattern: [Option<Response>; 5],
    /// `default`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Response>,
}

impl Responses {
    /// An envelope without responses.
    pub fn new(ty: TypeId) -> Self {
        Self {
            ty,
            status_code: BTreeMap::new(),
            pattern: Default::default(),
            default: None,
        }
    }

    /// Every response with its status text (`200`, `4XX`, `default`).
    pub fn iter(&self) -> impl Iterator<Item = (String, &Response)> {
        let codes = self
            .status_code
            .iter()
            .map(|(code, r)| (code.to_string(), r));
        let patterns = self
            .pattern
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.as_ref().map(|r| (format!("{}XX", i + 1), r)));
        codes
            .chain(patterns)
            .chain(self.default.iter().map(|r| ("default".to_string(), r)))
    }

    /// Mutable variant of [`Responses::iter`].
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (String, &mut Response)> {
        let codes = self
            .status_code
            .iter_mut()
            .map(|(code, r)| (code.to_string(), r));
        let patterns = self
            .pattern
            .iter_mut()
            .enumerate()
            .filter_map(|(i, r)| r.as_mut().map(|r| (format!("{}XX", i + 1), r)));
        codes
            .chain(patterns)
            .chain(self.default.iter_mut().map(|r| ("default".to_string(), r)))
    }

    /// Whether no response is defined.
    pub fn is_empty(&self) -> bool {
        self.status_code.is_empty() && self.pattern.iter().all(Option::is_none) && self.default.is_none()
    }
}

/// Parsed response key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKey {
    /// `200`
    Code(u16),
    /// `4XX`, holding the class digit.
    Pattern(u8),
    /// `default`
    Default,
}

impl StatusKey {
    /// Parses a `responses` key.
    pub fn parse(key: &str) -> AppResult<Self> {
        if key.eq_ignore_ascii_case("default") {
            return Ok(StatusKey::Default);
        }
        let bytes = key.as_bytes();
        if bytes.len() == 3 && bytes[1..].eq_ignore_ascii_case(b"XX") {
            if let Some(class @ 1..=5) = (bytes[0] as char).to_digit(10) {
                return Ok(StatusKey::Pattern(class as u8));
            }
        }
        match key.parse::<u16>() {
            Ok(code @ 100..=599) => Ok(StatusKey::Code(code)),
            _ => Err(AppError::ParseSpec(format!("invalid response status {key:?}"))),
        }
    }
}

/// Reason phrase of a status code, as a name part (`OK`, `NotFound`).
pub fn status_text(code: u16) -> &'static str {
    match code {
        100 => "Continue",
        101 => "SwitchingProtocols",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "NonAuthoritativeInfo",
        204 => "NoContent",
        205 => "ResetContent",
        206 => "PartialContent",
        207 => "MultiStatus",
        300 => "MultipleChoices",
        301 => "MovedPermanently",
        302 => "Found",
        303 => "SeeOther",
        304 => "NotModified",
        307 => "TemporaryRedirect",
        308 => "PermanentRedirect",
        400 => "BadRequest",
        401 => "Unauthorized",
        402 => "PaymentRequired",
        403 => "Forbidden",
        404 => "NotFound",
        405 => "MethodNotAllowed",
        406 => "NotAcceptable",
        407 => "ProxyAuthRequired",
        408 => "RequestTimeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "LengthRequired",
        412 => "PreconditionFailed",
        413 => "RequestEntityTooLarge",
        414 => "RequestURITooLong",
        415 => "UnsupportedMediaType",
        416 => "RequestedRangeNotSatisfiable",
        417 => "ExpectationFailed",
        418 => "Teapot",
        422 => "UnprocessableEntity",
        423 => "Locked",
        424 => "FailedDependency",
        425 => "TooEarly",
        426 => "UpgradeRequired",
        428 => "PreconditionRequired",
        429 => "TooManyRequests",
        431 => "RequestHeaderFieldsTooLarge",
        451 => "UnavailableForLegalReasons",
        500 => "InternalServerError",
        501 => "NotImplemented",
        502 => "BadGateway",
        503 => "ServiceUnavailable",
        504 => "GatewayTimeout",
        505 => "HTTPVersionNotSupported",
        507 => "InsufficientStorage",
        508 => "LoopDetected",
        511 => "NetworkAuthenticationRequired",
        _ => "",
    }
}

/// Where a security value is carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SecurityKind {
    /// Query parameter.
    Query,
    /// Header.
    Header,
}

/// Credential scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SecurityFormat {
    /// `apiKey`
    ApiKey,
    /// HTTP `bearer`
    Bearer,
    /// HTTP `basic`
    Basic,
    /// `x-ogen-custom-security`
    Custom,
}

/// A lowered security scheme.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Security {
    /// Identifier.
    pub name: String,
    /// Carrier.
    pub kind: SecurityKind,
    /// Scheme.
    pub format: SecurityFormat,
    /// Header or query parameter name.
    pub parameter_name: String,
    /// Scheme description.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Credential struct type.
    #[serde(rename = "type")]
    pub ty: TypeId,
    /// Scopes required by each operation, keyed by operation name.
    pub scopes: BTreeMap<String, Vec<String>>,
}

/// Security of one operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct SecurityRequirements {
    /// Names of the schemes used by the operation, in first-use order.
    pub securities: Vec<String>,
    /// Alternatives; each lists indices into `securities` that must all pass.
    pub requirements: Vec<Vec<usize>>,
}

impl SecurityRequirements {
    /// No security.
    pub fn is_empty(&self) -> bool {
        self.securities.is_empty()
    }
}

/// Webhook an operation belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WebhookInfo {
    /// Webhook name.
    pub name: String,
}

/// A lowered operation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Operation {
    /// Identifier.
    pub name: String,
    /// `operationId`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    /// `summary`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub summary: String,
    /// `description`
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// `deprecated`
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
    /// Upper-case HTTP method.
    pub method: String,
    /// Raw path template.
    pub path: String,
    /// Lowered path template.
    pub path_parts: Vec<PathPart>,
    /// Parameters.
    pub params: Vec<Parameter>,
    /// Request body.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request: Option<Request>,
    /// Responses.
    pub responses: Responses,
    /// Security.
    #[serde(skip_serializing_if = "SecurityRequirements::is_empty")]
    pub security: SecurityRequirements,
    /// Set for webhook operations.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub webhook: Option<WebhookInfo>,
    /// Where the operation was defined.
    pub location: Location,
}

impl Operation {
    /// Parameters in `location`.
    pub fn params_in(&self, location: ParameterIn) -> impl Iterator<Item = &Parameter> {
        self.params
            .iter()
            .filter(move |p| p.location_in() == location)
    }

    /// Number of path parameters in the template.
    pub fn path_params_count(&self) -> usize {
        self.path_parts
            .iter()
            .filter(|p| matches!(p, PathPart::Param(_)))
            .count()
    }

    /// Position of the path parameter `name` among the template parameters.
    pub fn path_param_index(&self, name: &str) -> Option<usize> {
        self.path_parts
            .iter()
            .filter_map(|p| match p {
                PathPart::Param(idx) => Some(*idx),
                PathPart::Raw(_) => None,
            })
            .position(|idx| self.params.get(idx).is_some_and(|p| p.spec.name == name))
    }
}

/// Server variable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ServerParam {
    /// Identifier.
    pub name: String,
    /// Document variable.
    pub spec: spec::ServerVariable,
}

/// Named server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Server {
    /// Identifier.
    pub name: String,
    /// Variables in template order.
    pub params: Vec<ServerParam>,
    /// URL template.
    pub template: Vec<spec::PathPart>,
    /// Document server.
    pub spec: spec::Server,
}

impl Server {
    /// Whether the URL has variables.
    pub fn is_template(&self) -> bool {
        !self.params.is_empty()
    }

    /// URL with each variable replaced by `%s`.
    pub fn format_string(&self) -> String {
        self.template
            .iter()
            .map(|part| match part {
                spec::PathPart::Raw(raw) => raw.as_str(),
                spec::PathPart::Param(_) => "%s",
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_key() {
        assert_eq!(StatusKey::parse("200").unwrap(), StatusKey::Code(200));
        assert_eq!(StatusKey::parse("4XX").unwrap(), StatusKey::Pattern(4));
        assert_eq!(StatusKey::parse("5xx").unwrap(), StatusKey::Pattern(5));
        assert_eq!(StatusKey::parse("default").unwrap(), StatusKey::Default);
        assert!(StatusKey::parse("6XX").is_err());
        assert!(StatusKey::parse("99").is_err());
    }

    #[test]
    fn test_encoding() {
        assert_eq!(Encoding::parse("multipart/form-data"), Some(Encoding::Multipart));
        assert_eq!(Encoding::Json.name(), "JSON");
        assert_eq!(Encoding::of("application/problem+json"), Some(Encoding::Json));
        assert_eq!(Encoding::of("text/problem+json"), None);
        assert!(is_mask("text/*"));
        assert!(!is_mask("text/plain"));
    }

    #[test]
    fn test_responses_iter_order() {
        let resp = Response {
            no_content: Some(TypeId(0)),
            contents: BTreeMap::new(),
            headers: IndexMap::new(),
            with_status_code: false,
            with_headers: false,
            spec: spec::Response::default(),
        };
        let mut responses = Responses::new(TypeId(0));
        responses.default = Some(resp.clone());
        responses.pattern[3] = Some(resp.clone());
        responses.status_code.insert(200, resp);
        let keys: Vec<_> = responses.iter().map(|(k, _)| k).collect();
        assert_eq!(keys, vec!["200", "4XX", "default"]);
    }

    #[test]
    fn test_server_format_string() {
        let server = Server {
            name: "Prod".into(),
            params: vec![],
            template: spec::parse_path("https://{region}.example.com/v1").unwrap(),
            spec: spec::Server::default(),
        };
        assert_eq!(server.format_string(), "https://%s.example.com/v1");
    }
}
