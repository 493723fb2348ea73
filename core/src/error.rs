//! # Error Handling
//!
//! Provides the unified `AppError` enum used across the workspace.
//!
//! Errors fall into two groups: recoverable feature gaps (`NotImplemented`,
//! `UnsupportedContentTypes`, discriminator inference) that go through the
//! skip policy, and everything else, which is fatal.

use crate::spec::Location;
use derive_more::{Display, From};

/// The Global Error Enum.
///
/// We use `derive_more` for boilerplate.
/// Note: String errors default to `General`.
#[derive(Debug, Display, From)]
pub enum AppError {
    /// Wrapper for standard IO errors.
    #[display("IO Error: {_0}")]
    Io(std::io::Error),

    /// Wrapper for YAML decoding errors.
    #[display("YAML Error: {_0}")]
    Yaml(serde_yaml::Error),

    /// Wrapper for JSON encoding/decoding errors.
    #[display("JSON Error: {_0}")]
    Json(serde_json::Error),

    /// Invalid regular expression (filters, patterns).
    #[display("Regex Error: {_0}")]
    Regex(regex::Error),

    /// The document could not be parsed or resolved.
    #[from(ignore)]
    #[display("parse spec: {_0}")]
    ParseSpec(String),

    /// The route tree could not be built.
    #[from(ignore)]
    #[display("build router: {_0}")]
    BuildRouter(Box<AppError>),

    /// A known but unsupported OpenAPI feature.
    #[from(ignore)]
    #[display("{name} not implemented")]
    NotImplemented {
        /// Name of the feature, used as the skip-policy key.
        name: String,
    },

    /// None of the content types of a body could be lowered.
    #[from(ignore)]
    #[display("unsupported content types: [{}]", _0.join(", "))]
    UnsupportedContentTypes(Vec<String>),

    /// `oneOf` arms could not be told apart by their unique fields.
    #[from(ignore)]
    #[display("can't infer fields discriminator: [{}]", _0.join(", "))]
    FieldsDiscriminatorInference(Vec<String>),

    /// Two distinct types claim the same name.
    #[from(ignore)]
    #[display("name conflict: {_0}")]
    NameConflict(String),

    /// Two operations share a path and an HTTP method.
    #[from(ignore)]
    #[display("duplicate method {method:?} for path {path:?}")]
    DuplicateMethod {
        /// Upper-case HTTP method.
        method: String,
        /// Raw path template.
        path: String,
    },

    /// Schema nesting exceeded the configured limit.
    #[from(ignore)]
    #[display("schema depth limit ({_0}) exceeded")]
    DepthExceeded(usize),

    /// An error annotated with the place in the document it came from.
    #[from(ignore)]
    #[display("{location}: {source}")]
    At {
        /// Where the error happened.
        location: Location,
        /// The underlying error.
        source: Box<AppError>,
    },

    /// Generic errors.
    #[display("General Error: {_0}")]
    General(String),
}

/// Manual implementation of the standard Error trait.
impl std::error::Error for AppError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AppError::Io(e) => Some(e),
            AppError::Yaml(e) => Some(e),
            AppError::Json(e) => Some(e),
            AppError::Regex(e) => Some(e),
            AppError::At { source, .. } => Some(source.as_ref()),
            AppError::BuildRouter(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Helper type alias for Result using AppError.
pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    /// Shorthand for [`AppError::NotImplemented`].
    pub fn not_implemented(name: impl Into<String>) -> Self {
        AppError::NotImplemented { name: name.into() }
    }

    /// Attaches a location unless the error already carries one.
    ///
    /// The innermost location is the most precise, so it wins.
    pub fn at(self, location: &Location) -> Self {
        match self {
            AppError::At { .. } => self,
            other => AppError::At {
                location: location.clone(),
                source: Box::new(other),
            },
        }
    }

    /// Returns the error with any location annotations removed.
    pub fn inner(&self) -> &AppError {
        match self {
            AppError::At { source, .. } => source.inner(),
            other => other,
        }
    }

    /// Returns the location attached to this error, if any.
    pub fn location(&self) -> Option<&Location> {
        match self {
            AppError::At { location, .. } => Some(location),
            _ => None,
        }
    }

    /// Name used by the skip policy for recoverable errors.
    ///
    /// Returns `None` for fatal errors.
    pub fn skip_name(&self) -> Option<&str> {
        match self.inner() {
            AppError::NotImplemented { name } => Some(name),
            AppError::UnsupportedContentTypes(_) => Some("unsupported content types"),
            AppError::FieldsDiscriminatorInference(_) => Some("discriminator inference"),
            _ => None,
        }
    }

    /// Whether the error is a recoverable feature gap.
    pub fn is_recoverable(&self) -> bool {
        self.skip_name().is_some()
    }
}

/// Extension to attach a location to any `AppResult`.
pub trait ResultExt<T> {
    /// Wraps the error with `location` (see [`AppError::at`]).
    fn at(self, location: &Location) -> AppResult<T>;
}

impl<T> ResultExt<T> for AppResult<T> {
    fn at(self, location: &Location) -> AppResult<T> {
        self.map_err(|e| e.at(location))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Error, ErrorKind};

    #[test]
    fn test_io_conversion() {
        let io_err = Error::new(ErrorKind::Other, "test");
        let app_err: AppError = io_err.into();
        assert!(matches!(app_err, AppError::Io(_)));
    }

    #[test]
    fn test_string_conversion() {
        let msg = String::from("something wrong");
        let app_err: AppError = msg.into();
        match app_err {
            AppError::General(s) => assert_eq!(s, "something wrong"),
            _ => panic!("String should convert to AppError::General"),
        }
    }

    #[test]
    fn test_messages() {
        assert_eq!(
            AppError::not_implemented("cookie parameters").to_string(),
            "cookie parameters not implemented"
        );
        assert_eq!(
            AppError::UnsupportedContentTypes(vec!["text/html".into(), "image/png".into()])
                .to_string(),
            "unsupported content types: [text/html, image/png]"
        );
        assert_eq!(
            AppError::ParseSpec("bad".into()).to_string(),
            "parse spec: bad"
        );
    }

    #[test]
    fn test_skip_name_through_location() {
        let loc = Location::pointer("#/paths/~1pets/get");
        let err = AppError::not_implemented("complex anyOf").at(&loc);
        assert_eq!(err.skip_name(), Some("complex anyOf"));
        assert_eq!(err.location(), Some(&loc));
        assert!(err.to_string().ends_with("complex anyOf not implemented"));

        let fatal = AppError::NameConflict("Pet".into()).at(&loc);
        assert!(!fatal.is_recoverable());
    }

    #[test]
    fn test_innermost_location_wins() {
        let inner = Location::pointer("#/components/schemas/Pet");
        let outer = Location::pointer("#/paths");
        let err = AppError::DepthExceeded(3).at(&inner).at(&outer);
        assert_eq!(err.location(), Some(&inner));
    }
}
