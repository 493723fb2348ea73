//! # Document Shims
//!
//! Structures acting as an intermediate deserialization layer.
//! They map directly to OpenAPI objects; anything that may be a `$ref` is
//! kept as a raw [`Value`] so the loader can resolve it first.

use indexmap::IndexMap;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// A map that skips `x-` keys (specification extensions).
#[derive(Debug, Clone)]
pub(crate) struct ShimMap<T> {
    pub(crate) items: IndexMap<String, T>,
}

impl<T> Default for ShimMap<T> {
    fn default() -> Self {
        Self {
            items: IndexMap::new(),
        }
    }
}

impl<'de, T> Deserialize<'de> for ShimMap<T>
where
    T: serde::de::DeserializeOwned,
{
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = IndexMap::<String, Value>::deserialize(deserializer)?;
        let mut items = IndexMap::new();

        for (key, value) in raw {
            if key.starts_with("x-") {
                continue;
            }
            let item = serde_json::from_value::<T>(value)
                .map_err(|e| DeError::custom(format!("Failed to parse '{}': {}", key, e)))?;
            items.insert(key, item);
        }

        Ok(Self { items })
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ShimInfo {
    pub(crate) title: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ShimDocument {
    pub(crate) openapi: String,
    pub(crate) info: ShimInfo,
    pub(crate) servers: Vec<ShimServer>,
    pub(crate) paths: ShimMap<Value>,
    pub(crate) webhooks: ShimMap<Value>,
    pub(crate) components: ShimComponents,
    pub(crate) security: Vec<IndexMap<String, Vec<String>>>,
    #[serde(flatten)]
    pub(crate) rest: IndexMap<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct ShimComponents {
    pub(crate) schemas: ShimMap<Value>,
    pub(crate) responses: ShimMap<Value>,
    pub(crate) parameters: ShimMap<Value>,
    pub(crate) request_bodies: ShimMap<Value>,
    pub(crate) security_schemes: ShimMap<Value>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ShimServerVariable {
    pub(crate) default: String,
    #[serde(rename = "enum")]
    pub(crate) enum_values: Vec<String>,
    pub(crate) description: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ShimServer {
    pub(crate) url: String,
    pub(crate) description: String,
    pub(crate) variables: IndexMap<String, ShimServerVariable>,
    #[serde(rename = "x-ogen-server-name")]
    pub(crate) name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct ShimPathItem {
    pub(crate) summary: String,
    pub(crate) description: String,
    pub(crate) parameters: Vec<Value>,
    pub(crate) get: Option<ShimOperation>,
    pub(crate) put: Option<ShimOperation>,
    pub(crate) post: Option<ShimOperation>,
    pub(crate) delete: Option<ShimOperation>,
    pub(crate) options: Option<ShimOperation>,
    pub(crate) head: Option<ShimOperation>,
    pub(crate) patch: Option<ShimOperation>,
    pub(crate) trace: Option<ShimOperation>,
}

impl ShimPathItem {
    /// Operations in canonical method order.
    pub(crate) fn operations(&self) -> impl Iterator<Item = (&'static str, &ShimOperation)> {
        [
            ("get", &self.get),
            ("put", &self.put),
            ("post", &self.post),
            ("delete", &self.delete),
            ("options", &self.options),
            ("head", &self.head),
            ("patch", &self.patch),
            ("trace", &self.trace),
        ]
        .into_iter()
        .filter_map(|(method, op)| op.as_ref().map(|op| (method, op)))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct ShimOperation {
    pub(crate) operation_id: Option<String>,
    pub(crate) summary: String,
    pub(crate) description: String,
    pub(crate) deprecated: bool,
    pub(crate) parameters: Vec<Value>,
    pub(crate) request_body: Option<Value>,
    pub(crate) responses: ShimMap<Value>,
    pub(crate) security: Option<Vec<IndexMap<String, Vec<String>>>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ShimEncoding {
    #[serde(rename = "contentType")]
    pub(crate) content_type: Option<String>,
    pub(crate) style: Option<String>,
    pub(crate) explode: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ShimMedia {
    pub(crate) schema: Option<Value>,
    pub(crate) encoding: IndexMap<String, ShimEncoding>,
    #[serde(rename = "x-ogen-json-streaming")]
    pub(crate) json_streaming: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ShimParameter {
    pub(crate) name: String,
    #[serde(rename = "in")]
    pub(crate) location_in: Option<String>,
    pub(crate) description: String,
    pub(crate) required: bool,
    pub(crate) deprecated: bool,
    pub(crate) style: Option<String>,
    pub(crate) explode: Option<bool>,
    pub(crate) schema: Option<Value>,
    pub(crate) content: Option<IndexMap<String, ShimMedia>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ShimRequestBody {
    pub(crate) description: String,
    pub(crate) content: IndexMap<String, ShimMedia>,
    pub(crate) required: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ShimResponse {
    pub(crate) description: String,
    pub(crate) headers: ShimMap<Value>,
    pub(crate) content: IndexMap<String, ShimMedia>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub(crate) struct ShimOAuthFlow {
    pub(crate) scopes: IndexMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct ShimOAuthFlows {
    pub(crate) implicit: Option<ShimOAuthFlow>,
    pub(crate) password: Option<ShimOAuthFlow>,
    pub(crate) client_credentials: Option<ShimOAuthFlow>,
    pub(crate) authorization_code: Option<ShimOAuthFlow>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub(crate) struct ShimSecurityScheme {
    #[serde(rename = "type")]
    pub(crate) ty: String,
    pub(crate) description: String,
    pub(crate) name: String,
    #[serde(rename = "in")]
    pub(crate) location_in: String,
    pub(crate) scheme: String,
    pub(crate) bearer_format: String,
    pub(crate) flows: Option<ShimOAuthFlows>,
    pub(crate) open_id_connect_url: String,
    #[serde(rename = "x-ogen-custom-security")]
    pub(crate) custom: bool,
}
