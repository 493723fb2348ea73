//! # Name Former
//!
//! Converts arbitrary identifiers found in a document (schema names, property
//! keys, enum values, paths) into capitalized type names.
//!
//! Input is split at every character that is not an ASCII letter or digit;
//! the first letter of each part is upper-cased and the part is replaced by its
//! canonical acronym form when one exists (`api` -> `API`).
//! In *special* mode the punctuation `+ - / < > = .` is spelled out.

use crate::error::{AppError, AppResult};
use std::collections::HashMap;
use std::sync::LazyLock;

const ACRONYM_TABLE: &[&str] = &[
    "ACL", "API", "ASCII", "AWS", "CPU", "CSS", "DNS", "EOF", "GB", "GUID", "HTML", "HTTP", "HTTPS",
    "ID", "IP", "IPv4", "IPv6", "JSON", "JWT", "KB", "LHS", "MAC", "MB", "OS", "QPS", "RAM", "RHS",
    "RPC", "SLA", "SMTP", "SQL", "SSH", "SSO", "TCP", "TLS", "TTL", "UDP", "UI", "UID", "URI",
    "URL", "UTF8", "UUID", "VM", "XML", "XMPP", "XSRF", "XSS",
];

/// Canonical acronym forms, keyed by their lower-cased spelling.
static ACRONYMS: LazyLock<HashMap<String, &'static str>> = LazyLock::new(|| {
    ACRONYM_TABLE
        .iter()
        .map(|canonical| (canonical.to_ascii_lowercase(), *canonical))
        .collect()
});

/// Returns the canonical acronym spelling of `part`, if it is one.
pub fn acronym(part: &str) -> Option<&'static str> {
    ACRONYMS.get(part.to_ascii_lowercase().as_str()).copied()
}

/// Spelled-out replacements for punctuation in special mode.
fn named_char(c: char) -> Option<&'static str> {
    match c {
        '+' => Some("Plus"),
        '-' => Some("Minus"),
        '/' => Some("Slash"),
        '<' => Some("Less"),
        '>' => Some("Greater"),
        '=' => Some("Eq"),
        '.' => Some("Dot"),
        _ => None,
    }
}

/// Whether `c` starts a spelled-out token in special mode.
pub fn is_special_char(c: char) -> bool {
    named_char(c).is_some()
}

struct NameGen {
    parts: Vec<String>,
    allow_special: bool,
}

impl NameGen {
    fn new(allow_special: bool) -> Self {
        Self {
            parts: Vec::new(),
            allow_special,
        }
    }

    fn push_part(&mut self, part: &mut String) {
        let taken = std::mem::take(part);
        match acronym(&taken) {
            Some(rule) => self.parts.push(rule.to_string()),
            None => self.parts.push(taken),
        }
    }

    fn run(mut self, src: &str, capitalize: bool) -> String {
        let mut part = String::new();
        let mut upper = true;
        for c in src.chars() {
            if c.is_ascii_alphanumeric() {
                if capitalize && upper {
                    part.push(c.to_ascii_uppercase());
                    upper = false;
                } else {
                    part.push(c);
                }
                continue;
            }

            upper = true;
            if self.allow_special {
                if let Some(word) = named_char(c) {
                    self.push_part(&mut part);
                    part.push_str(word);
                }
            }
            self.push_part(&mut part);
        }
        self.push_part(&mut part);

        let name = self.parts.concat();
        if capitalize && name.starts_with(|c: char| c.is_ascii_digit()) {
            format!("R{name}")
        } else {
            name
        }
    }
}

/// Capitalized name from the given parts, joined by spaces.
pub fn pascal(parts: &[&str]) -> String {
    NameGen::new(false).run(&parts.join(" "), true)
}

/// Like [`pascal`], spelling out punctuation.
pub fn pascal_special(parts: &[&str]) -> String {
    NameGen::new(true).run(&parts.join(" "), true)
}

/// Like [`pascal`], falling back to [`pascal_special`]; an empty result is an error.
pub fn pascal_non_empty(parts: &[&str]) -> AppResult<String> {
    let name = pascal(parts);
    if !name.is_empty() {
        return Ok(name);
    }
    let name = pascal_special(parts);
    if !name.is_empty() {
        return Ok(name);
    }
    Err(AppError::General(format!("can't generate name for {parts:?}")))
}

/// Removes disallowed characters without changing case.
pub fn clean_special(parts: &[&str]) -> String {
    NameGen::new(true).run(&parts.join(" "), false)
}

/// [`pascal`] with the first character lower-cased.
pub fn camel(parts: &[&str]) -> String {
    first_lower(&pascal(parts))
}

/// [`pascal_special`] with the first character lower-cased.
pub fn camel_special(parts: &[&str]) -> String {
    first_lower(&pascal_special(parts))
}

/// Upper-cases the first character.
pub fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Lower-cases the first character.
pub fn first_lower(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Whether `s` is usable as an identifier by the emitter.
pub fn is_identifier(s: &str) -> bool {
    let mut chars = s.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_')
}

/// Extracts the short name a `$ref` points to.
///
/// `#/components/schemas/Pet` -> `Pet`, `https://example.com/pet.json` -> `pet`.
pub fn clean_ref(reference: &str) -> String {
    let (before, fragment) = match reference.split_once('#') {
        Some((before, fragment)) => (before, fragment),
        None => (reference, ""),
    };

    let mut result = fragment.to_string();
    if result.is_empty() {
        result = reference.to_string();
        if !before.is_empty() {
            let path = match url::Url::parse(before) {
                Ok(u) => u.path().to_string(),
                Err(_) => before.to_string(),
            };
            let file = path.rsplit('/').next().unwrap_or_default();
            result = match file.rsplit_once('.') {
                Some((stem, _)) => stem.to_string(),
                None => file.to_string(),
            };
        }
    }

    match result.rsplit_once('/') {
        Some((_, cut)) if !cut.is_empty() => cut.to_string(),
        _ => result,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pascal_basic() {
        assert_eq!(pascal(&["foo_bar"]), "FooBar");
        assert_eq!(pascal(&["get", "/pets/{id}"]), "GetPetsID");
        assert_eq!(pascal(&["user id"]), "UserID");
        assert_eq!(pascal(&["1st"]), "R1st");
        assert_eq!(pascal(&[""]), "");
    }

    #[test]
    fn test_pascal_keeps_inner_case() {
        assert_eq!(pascal(&["userName"]), "UserName");
        assert_eq!(pascal(&["Op", "OK"]), "OpOK");
    }

    #[test]
    fn test_pascal_idempotent() {
        for input in ["foo_bar", "user-id", "api/v2", "1a", "x.y.z", "HTTPServer", ""] {
            let once = pascal(&[input]);
            assert_eq!(pascal(&[&once]), once, "input {input:?}");
        }
    }

    #[test]
    fn test_acronyms_canonical() {
        for canonical in ACRONYMS.values() {
            assert_eq!(pascal(&[&canonical.to_ascii_lowercase()]), *canonical);
        }
    }

    #[test]
    fn test_special_mode() {
        assert_eq!(pascal_special(&["a+b"]), "APlusB");
        assert_eq!(pascal_special(&["-1"]), "Minus1");
        assert_eq!(pascal_special(&["<=", ">"]), "LessEqGreater");
        assert_eq!(pascal(&["-1"]), "R1");
    }

    #[test]
    fn test_camel() {
        assert_eq!(camel(&["create", "pet"]), "createPet");
        assert_eq!(camel_special(&["a.b"]), "aDotB");
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(pascal_non_empty(&["+"]).unwrap(), "Plus");
        assert!(pascal_non_empty(&["%%"]).is_err());
    }

    #[test]
    fn test_clean_special() {
        assert_eq!(clean_special(&["a-b c"]), "aMinusbc");
    }

    #[test]
    fn test_clean_ref() {
        assert_eq!(clean_ref("#/components/schemas/Pet"), "Pet");
        assert_eq!(clean_ref("https://example.com/foo/bar.json"), "bar");
        assert_eq!(clean_ref("foo/bar.json"), "bar");
        assert_eq!(clean_ref("other.yaml#/definitions/Item"), "Item");
    }
}
