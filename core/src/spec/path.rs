//! # Path Templates
//!
//! Scans `/pets/{id}/photos` into raw text and parameter parts.
//! Malformed templates (`{` without `}` and the reverse, nested or empty
//! braces) are rejected as soon as they are seen.

use crate::error::{AppError, AppResult};
use serde::Serialize;

/// Piece of a path template.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "lowercase")]
pub enum PathPart {
    /// Literal text.
    Raw(String),
    /// `{name}` placeholder.
    Param(String),
}

/// Lazy scanner over a path template.
#[derive(Debug, Clone)]
pub struct PathScanner<'a> {
    src: &'a str,
    rest: &'a str,
    done: bool,
}

impl<'a> PathScanner<'a> {
    /// Creates a scanner over `src`.
    pub fn new(src: &'a str) -> Self {
        Self {
            src,
            rest: src,
            done: false,
        }
    }

    fn error(&mut self, msg: &str) -> Option<AppResult<PathPart>> {
        self.done = true;
        Some(Err(AppError::ParseSpec(format!(
            "invalid path {:?}: {msg}",
            self.src
        ))))
    }
}

impl Iterator for PathScanner<'_> {
    type Item = AppResult<PathPart>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done || self.rest.is_empty() {
            return None;
        }

        if let Some(after) = self.rest.strip_prefix('{') {
            let Some(end) = after.find('}') else {
                return self.error("unclosed '{'");
            };
            let name = &after[..end];
            if name.is_empty() {
                return self.error("empty parameter name");
            }
            if name.contains('{') {
                return self.error("nested '{'");
            }
            self.rest = &after[end + 1..];
            return Some(Ok(PathPart::Param(name.to_string())));
        }

        let end = self.rest.find(['{', '}']).unwrap_or(self.rest.len());
        if self.rest[end..].starts_with('}') {
            return self.error("unexpected '}'");
        }
        let raw = &self.rest[..end];
        self.rest = &self.rest[end..];
        Some(Ok(PathPart::Raw(raw.to_string())))
    }
}

/// Parses a whole template.
pub fn parse_path(src: &str) -> AppResult<Vec<PathPart>> {
    PathScanner::new(src).collect()
}

/// Finds the first `{param}` in `path`.
///
/// Returns the start of `{`, the index after `}` and the parameter name.
pub fn find_param(path: &str) -> AppResult<Option<(usize, usize, &str)>> {
    let Some(start) = path.find('{') else {
        return Ok(None);
    };
    let Some(len) = path[start..].find('}') else {
        return Err(AppError::ParseSpec(format!(
            "invalid path {path:?}: unclosed '{{'"
        )));
    };
    let end = start + len + 1;
    Ok(Some((start, end, &path[start + 1..end - 1])))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_parse_path() {
        let parts = parse_path("/pets/{id}/photos/{photo}.png").unwrap();
        assert_eq!(
            parts,
            vec![
                PathPart::Raw("/pets/".into()),
                PathPart::Param("id".into()),
                PathPart::Raw("/photos/".into()),
                PathPart::Param("photo".into()),
                PathPart::Raw(".png".into()),
            ]
        );
    }

    #[test]
    fn test_parse_path_malformed() {
        assert!(parse_path("/pets/{id").is_err());
        assert!(parse_path("/pets/id}").is_err());
        assert!(parse_path("/pets/{}").is_err());
        assert!(parse_path("/pets/{a{b}").is_err());
    }

    #[test]
    fn test_scanner_is_lazy() {
        let mut scanner = PathScanner::new("/a/{b}/{");
        assert_eq!(scanner.next().unwrap().unwrap(), PathPart::Raw("/a/".into()));
        assert_eq!(scanner.next().unwrap().unwrap(), PathPart::Param("b".into()));
        assert_eq!(scanner.next().unwrap().unwrap(), PathPart::Raw("/".into()));
        assert!(scanner.next().unwrap().is_err());
        assert!(scanner.next().is_none());
    }

    #[test]
    fn test_find_param() {
        assert_eq!(find_param("b/{id}/c").unwrap(), Some((2, 6, "id")));
        assert_eq!(find_param("static").unwrap(), None);
        assert!(find_param("{id").is_err());
    }
}
