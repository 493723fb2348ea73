//! # Options
//!
//! Parser and generator configuration, loadable from a YAML or JSON file.

use crate::error::{AppError, AppResult};
use crate::features::FeatureOptions;
use crate::ir::Encoding;
use crate::spec::ParseOptions;
use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

/// Operation filter.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Filters {
    /// Operations whose path does not match are skipped.
    #[serde(deserialize_with = "deserialize_regex")]
    pub path_regex: Option<Regex>,
    /// When non-empty, operations with other methods are skipped.
    pub methods: Vec<String>,
}

fn deserialize_regex<'de, D>(deserializer: D) -> Result<Option<Regex>, D::Error>
where
    D: Deserializer<'de>,
{
    let src = Option::<String>::deserialize(deserializer)?;
    src.map(|s| Regex::new(&s).map_err(serde::de::Error::custom))
        .transpose()
}

impl Filters {
    /// Whether an operation at `path` with `method` passes the filter.
    pub fn accept(&self, path: &str, method: &str) -> bool {
        if let Some(re) = &self.path_regex {
            if !re.is_match(path) {
                return false;
            }
        }
        self.methods.is_empty() || self.methods.iter().any(|m| m.eq_ignore_ascii_case(method))
    }
}

/// Whether the shared default response is promoted to a single error type.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ConvenientErrors {
    /// Try the reduction, keep going if it does not apply.
    #[default]
    Auto,
    /// Fail if the reduction does not apply.
    On,
    /// Never reduce.
    Off,
}

impl ConvenientErrors {
    /// `off`
    pub fn is_disabled(self) -> bool {
        self == ConvenientErrors::Off
    }

    /// `on`
    pub fn is_forced(self) -> bool {
        self == ConvenientErrors::On
    }
}

impl FromStr for ConvenientErrors {
    type Err = AppError;

    fn from_str(s: &str) -> AppResult<Self> {
        match s {
            "" | "auto" => Ok(ConvenientErrors::Auto),
            "on" | "true" => Ok(ConvenientErrors::On),
            "off" | "false" => Ok(ConvenientErrors::Off),
            other => Err(AppError::General(format!(
                "expected \"on\", \"off\" or \"auto\", got {other:?}"
            ))),
        }
    }
}

impl<'de> Deserialize<'de> for ConvenientErrors {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Bool(bool),
            Str(String),
        }
        match Raw::deserialize(deserializer)? {
            Raw::Bool(true) => Ok(ConvenientErrors::On),
            Raw::Bool(false) => Ok(ConvenientErrors::Off),
            Raw::Str(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// Content type to encoding overrides (`text/x-json` handled as JSON).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct ContentTypeAliases(pub IndexMap<String, Encoding>);

impl ContentTypeAliases {
    /// Adds a `content-type=encoding` mapping.
    pub fn set(&mut self, mapping: &str) -> AppResult<()> {
        let (ct, enc) = mapping
            .split_once('=')
            .ok_or_else(|| AppError::General(format!("invalid mapping {mapping:?}")))?;
        let encoding = Encoding::parse(enc.trim())
            .ok_or_else(|| AppError::General(format!("unknown encoding {enc:?}")))?;
        self.0.insert(ct.trim().to_string(), encoding);
        Ok(())
    }

    /// Encoding configured for `content_type`.
    pub fn get(&self, content_type: &str) -> Option<Encoding> {
        self.0.get(content_type).copied()
    }
}

/// Callback invoked for every recoverable error before the skip decision.
pub struct NotImplementedHook(pub Box<dyn FnMut(&str, &AppError)>);

impl fmt::Debug for NotImplementedHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("NotImplementedHook(..)")
    }
}

/// Generator options.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerateOptions {
    /// Feature toggles.
    pub features: FeatureOptions,
    /// Operation filter.
    pub filters: Filters,
    /// Skip-policy names to swallow; `all` matches everything.
    pub ignore_not_implemented: Vec<String>,
    /// Default-error reduction mode.
    pub convenient_errors: ConvenientErrors,
    /// Content type overrides.
    pub content_type_aliases: ContentTypeAliases,
    /// Set programmatically.
    #[serde(skip)]
    pub not_implemented_hook: Option<NotImplementedHook>,
}

/// Whole configuration file.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Loader options.
    pub parser: ParseOptions,
    /// Lowering options.
    pub generator: GenerateOptions,
}

impl Config {
    /// Reads a YAML or JSON config file.
    pub fn load(path: &Path) -> AppResult<Self> {
        let text = fs::read_to_string(path)?;
        Self::parse(&text)
    }

    /// Parses config text.
    pub fn parse(text: &str) -> AppResult<Self> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features;

    #[test]
    fn test_filters() {
        let filters = Filters {
            path_regex: Some(Regex::new("^/pets").unwrap()),
            methods: vec!["get".into()],
        };
        assert!(filters.accept("/pets/{id}", "GET"));
        assert!(!filters.accept("/pets/{id}", "POST"));
        assert!(!filters.accept("/users", "GET"));
        assert!(Filters::default().accept("/anything", "DELETE"));
    }

    #[test]
    fn test_convenient_errors_parse() {
        assert_eq!("on".parse::<ConvenientErrors>().unwrap(), ConvenientErrors::On);
        assert_eq!("".parse::<ConvenientErrors>().unwrap(), ConvenientErrors::Auto);
        let err = "maybe".parse::<ConvenientErrors>().unwrap_err();
        assert!(err.to_string().contains("got \"maybe\""));
    }

    #[test]
    fn test_content_type_aliases_set() {
        let mut aliases = ContentTypeAliases::default();
        aliases.set("text/x-json=application/json").unwrap();
        assert_eq!(aliases.get("text/x-json"), Some(Encoding::Json));
        assert!(aliases.set("no-equals-sign").is_err());
        assert!(aliases.set("a/b=image/png").is_err());
    }

    #[test]
    fn test_config_parse() {
        let cfg = Config::parse(
            r#"
parser:
  depthLimit: 8
generator:
  convenientErrors: false
  ignoreNotImplemented: [all]
  filters:
    pathRegex: "^/v1/"
    methods: [GET]
  contentTypeAliases:
    text/x-json: application/json
  features:
    enable: [client/request/validation]
"#,
        )
        .unwrap();
        assert_eq!(cfg.parser.depth_limit, 8);
        assert!(cfg.generator.convenient_errors.is_disabled());
        assert_eq!(cfg.generator.ignore_not_implemented, vec!["all"]);
        assert!(cfg.generator.filters.accept("/v1/pets", "get"));
        assert_eq!(
            cfg.generator.content_type_aliases.get("text/x-json"),
            Some(Encoding::Json)
        );
        let set = cfg.generator.features.build().unwrap();
        assert!(set.has(features::CLIENT_REQUEST_VALIDATION));
        assert!(set.has(features::PATHS_SERVER));
    }

    #[test]
    fn test_bad_regex_rejected() {
        assert!(Config::parse("generator:\n  filters:\n    pathRegex: \"(\"\n").is_err());
    }
}
