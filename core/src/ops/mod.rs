//! # Operation Lowerer
//!
//! Builds the per-operation IR: parameters, the request body envelope, the
//! response envelope and security requirements. Every function here works
//! inside one [`GenCtx`](crate::context::GenCtx) scope; committing that scope
//! into the global storage is the generator's job.

mod contents;
mod operation;
mod parameters;
mod request;
mod responses;
mod security;
mod servers;

pub use contents::{filter_most_specific, generate_contents, parse_media_type};
pub use operation::{generate_operation, LoweredOperation, OpEnv};
pub use parameters::{convert_path_parts, generate_parameters, is_param_allowed};
pub use request::generate_request;
pub use responses::{generate_responses, response_to_ir, walk_response_types};
pub use security::generate_securities;
pub use servers::generate_server;

use crate::spec::Location;
use tracing::warn;

/// `http.CanonicalHeaderKey`: first letter and letters after `-` upper
/// case, the rest lower case. Keys with characters outside the token set are
/// returned unchanged.
pub fn canonical_header_key(name: &str) -> String {
    let token = |c: char| c.is_ascii_alphanumeric() || "!#$%&'*+-.^_`|~".contains(c);
    if !name.chars().all(token) {
        return name.to_string();
    }
    let mut upper = true;
    name.chars()
        .map(|c| {
            let out = if upper {
                c.to_ascii_uppercase()
            } else {
                c.to_ascii_lowercase()
            };
            upper = c == '-';
            out
        })
        .collect()
}

/// Warns about non-canonical header names; returns `true` when the header
/// is one of `ignore` and must be skipped.
pub(crate) fn vet_header_name(name: &str, location: &Location, ignore: &[&str]) -> bool {
    let canonical = canonical_header_key(name);
    if canonical != name {
        warn!(
            location = %location,
            original_name = name,
            canonical_name = %canonical,
            "Header name is not canonical, canonical name will be used"
        );
    }
    if ignore.contains(&canonical.as_str()) {
        warn!(
            location = %location,
            "{canonical} is described separately and will be ignored in this section"
        );
        return true;
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_header_key() {
        assert_eq!(canonical_header_key("x-request-id"), "X-Request-Id");
        assert_eq!(canonical_header_key("CONTENT-TYPE"), "Content-Type");
        assert_eq!(canonical_header_key("bad header"), "bad header");
    }

    #[test]
    fn test_vet_header_name_ignores() {
        let loc = Location::default();
        assert!(vet_header_name("content-type", &loc, &["Content-Type"]));
        assert!(!vet_header_name("X-Trace", &loc, &["Content-Type"]));
    }
}
