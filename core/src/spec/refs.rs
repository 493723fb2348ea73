//! # Reference Utilities
//!
//! Helpers for `$ref` strings and JSON pointers.
//!
//! These never fetch anything: a reference is either local to the current
//! document (`#/components/...`) or names another document by relative path
//! or URL, which the loader decides how to handle.

use percent_encoding::percent_decode_str;
use serde_json::Value;
use url::Url;

/// Where a `$ref` points.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceKind {
    /// Same document (`#/...`).
    Local,
    /// Relative file path (`other.yaml#/...`).
    Relative,
    /// Absolute URL (`https://...`).
    Remote,
}

/// A `$ref` split into its document and fragment parts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReference<'a> {
    /// Classification of the document part.
    pub kind: ReferenceKind,
    /// Document part (empty for local references).
    pub document: &'a str,
    /// Fragment without the leading `#`, if any.
    pub fragment: Option<&'a str>,
}

/// Splits a reference into document and fragment.
pub fn parse_reference(reference: &str) -> ParsedReference<'_> {
    let (document, fragment) = match reference.split_once('#') {
        Some((doc, frag)) => (doc, Some(frag)),
        None => (reference, None),
    };

    let kind = if document.is_empty() {
        ReferenceKind::Local
    } else if Url::parse(document).is_ok() {
        ReferenceKind::Remote
    } else {
        ReferenceKind::Relative
    };

    ParsedReference {
        kind,
        document,
        fragment,
    }
}

/// Decodes a JSON Pointer segment (handles `~1`, `~0` and percent-encoding).
pub fn decode_pointer_segment(segment: &str) -> String {
    let decoded = segment.replace("~1", "/").replace("~0", "~");
    percent_decode_str(&decoded).decode_utf8_lossy().into_owned()
}

/// Encodes a key as a JSON Pointer segment.
pub fn encode_pointer_segment(key: &str) -> String {
    key.replace('~', "~0").replace('/', "~1")
}

/// Follows a fragment such as `/components/schemas/Pet` inside `root`.
pub fn resolve_pointer<'v>(root: &'v Value, fragment: &str) -> Option<&'v Value> {
    let trimmed = fragment.trim_start_matches('#');
    if trimmed.is_empty() {
        return Some(root);
    }
    let mut current = root;
    for raw in trimmed.trim_start_matches('/').split('/') {
        let segment = decode_pointer_segment(raw);
        current = match current {
            Value::Object(map) => map.get(&segment)?,
            Value::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Extracts the component name from `#/components/{section}/{name}`.
pub fn component_name(reference: &str, section: &str) -> Option<String> {
    let parsed = parse_reference(reference);
    if parsed.kind != ReferenceKind::Local {
        return None;
    }
    let pointer = parsed.fragment?.trim_start_matches('/');
    let segments: Vec<&str> = pointer.split('/').collect();
    match segments.as_slice() {
        ["components", sec, name] if *sec == section && !name.is_empty() => {
            Some(decode_pointer_segment(name))
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_reference_kinds() {
        assert_eq!(
            parse_reference("#/components/schemas/User").kind,
            ReferenceKind::Local
        );
        assert_eq!(
            parse_reference("common.yaml#/components/schemas/User").kind,
            ReferenceKind::Relative
        );
        let remote = parse_reference("https://example.com/api.yaml#/x");
        assert_eq!(remote.kind, ReferenceKind::Remote);
        assert_eq!(remote.document, "https://example.com/api.yaml");
        assert_eq!(remote.fragment, Some("/x"));
    }

    #[test]
    fn test_decode_pointer_segment_percent_encoding() {
        assert_eq!(
            decode_pointer_segment("User%20Profile~1details"),
            "User Profile/details"
        );
        assert_eq!(encode_pointer_segment("a/b~c"), "a~1b~0c");
    }

    #[test]
    fn test_resolve_pointer() {
        let doc = json!({"paths": {"/pets": {"get": {"tags": ["a", "b"]}}}});
        let tag = resolve_pointer(&doc, "#/paths/~1pets/get/tags/1").unwrap();
        assert_eq!(tag, &json!("b"));
        assert!(resolve_pointer(&doc, "#/paths/missing").is_none());
        assert_eq!(resolve_pointer(&doc, "#").unwrap(), &doc);
    }

    #[test]
    fn test_component_name() {
        assert_eq!(
            component_name("#/components/responses/Err", "responses").as_deref(),
            Some("Err")
        );
        assert!(component_name("#/components/schemas/Err", "responses").is_none());
    }
}
