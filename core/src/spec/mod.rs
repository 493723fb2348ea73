#![deny(missing_docs)]

//! # Input Model
//!
//! The resolved OpenAPI document the compiler consumes.
//!
//! Schemas live in a [`SchemaArena`] and are addressed by [`SchemaId`];
//! every `$ref` target is parsed exactly once, so reference cycles are plain
//! index cycles. Every parsed value keeps a [`Location`] for error reporting.

use serde::Serialize;
use std::fmt;

/// Document model (operations, parameters, responses, security, servers).
pub mod document;

/// YAML/JSON loading and local `$ref` resolution.
pub mod loader;

/// Path template scanning.
pub mod path;

/// `$ref` string helpers.
pub mod refs;

/// Schema model and arena.
pub mod schema;

/// Deserialization shims for the raw document.
mod shims;

pub use document::{
    Components, Document, Encoding as MediaEncoding, Media, OAuthFlow, OAuthFlows, Operation,
    Parameter, ParameterIn, ParameterStyle, RequestBody, Response, SecurityRequirement,
    SecurityScheme, Server, ServerVariable, Webhook,
};
pub use loader::{load_file, parse_document, ParseOptions};
pub use path::{parse_path, PathPart, PathScanner};
pub use schema::{
    Discriminator, PatternProperty, Property, Schema, SchemaArena, SchemaId, SchemaType,
};

/// Position of a value inside the source document.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct Location {
    /// JSON pointer to the value, e.g. `#/paths/~1pets/get`.
    pub pointer: String,
    /// Source file, when loaded from disk.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    /// 1-based line, when known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<usize>,
}

impl Location {
    /// A location with only a pointer.
    pub fn pointer(pointer: impl Into<String>) -> Self {
        Self {
            pointer: pointer.into(),
            file: None,
            line: None,
        }
    }

    /// Returns a child location, escaping `key` as a pointer segment.
    pub fn child(&self, key: &str) -> Self {
        Self {
            pointer: format!("{}/{}", self.pointer, refs::encode_pointer_segment(key)),
            file: self.file.clone(),
            line: None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.file, self.line) {
            (Some(file), Some(line)) => write!(f, "{file}:{line}: {}", self.pointer),
            (Some(file), None) => write!(f, "{file}: {}", self.pointer),
            _ => write!(f, "{}", self.pointer),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_child_escapes() {
        let root = Location::pointer("#/paths");
        let loc = root.child("/pets/{id}").child("get");
        assert_eq!(loc.pointer, "#/paths/~1pets~1{id}/get");
    }

    #[test]
    fn test_location_display() {
        let mut loc = Location::pointer("#/components/schemas/Pet");
        assert_eq!(loc.to_string(), "#/components/schemas/Pet");
        loc.file = Some("api.yaml".into());
        loc.line = Some(12);
        assert_eq!(loc.to_string(), "api.yaml:12: #/components/schemas/Pet");
    }
}
