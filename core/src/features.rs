//! # Generation Features
//!
//! The closed table of emitter knobs and the set arithmetic used to
//! configure them.

use crate::error::{AppError, AppResult};
use serde::{Deserialize, Deserializer, Serialize};
use std::collections::BTreeSet;

/// A named generation knob.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GenFeature {
    /// Config name.
    pub name: &'static str,
    /// What it toggles.
    pub description: &'static str,
}

/// `paths/client`
pub const PATHS_CLIENT: GenFeature = GenFeature {
    name: "paths/client",
    description: "Enables paths client generation",
};
/// `paths/server`
pub const PATHS_SERVER: GenFeature = GenFeature {
    name: "paths/server",
    description: "Enables paths server generation",
};
/// `webhooks/client`
pub const WEBHOOKS_CLIENT: GenFeature = GenFeature {
    name: "webhooks/client",
    description: "Enables webhooks client generation",
};
/// `webhooks/server`
pub const WEBHOOKS_SERVER: GenFeature = GenFeature {
    name: "webhooks/server",
    description: "Enables webhooks server generation",
};
/// `client/security/reentrant`
pub const CLIENT_SECURITY_REENTRANT: GenFeature = GenFeature {
    name: "client/security/reentrant",
    description: "Enables client usage in security source implementations",
};
/// `client/request/validation`
pub const CLIENT_REQUEST_VALIDATION: GenFeature = GenFeature {
    name: "client/request/validation",
    description: "Enables validation of client requests",
};
/// `server/response/validation`
pub const SERVER_RESPONSE_VALIDATION: GenFeature = GenFeature {
    name: "server/response/validation",
    description: "Enables validation of server responses",
};
/// `ogen/otel`
pub const OGEN_OTEL: GenFeature = GenFeature {
    name: "ogen/otel",
    description: "Enables OpenTelemetry integration",
};
/// `ogen/unimplemented`
pub const OGEN_UNIMPLEMENTED: GenFeature = GenFeature {
    name: "ogen/unimplemented",
    description: "Enables stub Handler generation",
};
/// `debug/example_tests`
pub const DEBUG_EXAMPLE_TESTS: GenFeature = GenFeature {
    name: "debug/example_tests",
    description: "Enables example tests generation",
};

/// Features enabled unless `disableAll` is set.
pub const DEFAULT_FEATURES: &[GenFeature] = &[
    PATHS_CLIENT,
    PATHS_SERVER,
    WEBHOOKS_CLIENT,
    WEBHOOKS_SERVER,
    OGEN_OTEL,
    OGEN_UNIMPLEMENTED,
];

/// Every known feature.
pub const ALL_FEATURES: &[GenFeature] = &[
    PATHS_CLIENT,
    PATHS_SERVER,
    WEBHOOKS_CLIENT,
    WEBHOOKS_SERVER,
    CLIENT_SECURITY_REENTRANT,
    CLIENT_REQUEST_VALIDATION,
    SERVER_RESPONSE_VALIDATION,
    OGEN_OTEL,
    OGEN_UNIMPLEMENTED,
    DEBUG_EXAMPLE_TESTS,
];

/// Set of enabled feature names. Only known names can be inserted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FeatureSet(BTreeSet<String>);

impl FeatureSet {
    /// Enables `name`, rejecting unknown features.
    pub fn enable(&mut self, name: &str) -> AppResult<()> {
        if !ALL_FEATURES.iter().any(|f| f.name == name) {
            return Err(AppError::General(format!("unknown feature {name:?}")));
        }
        self.0.insert(name.to_string());
        Ok(())
    }

    /// Disables `name`.
    pub fn disable(&mut self, name: &str) {
        self.0.remove(name);
    }

    /// Whether `feature` is enabled.
    pub fn has(&self, feature: GenFeature) -> bool {
        self.0.contains(feature.name)
    }

    /// Enabled names, sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<'de> Deserialize<'de> for FeatureSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let names = Vec::<String>::deserialize(deserializer)?;
        let mut set = FeatureSet::default();
        for name in names {
            set.enable(&name).map_err(serde::de::Error::custom)?;
        }
        Ok(set)
    }
}

/// `features` config block.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FeatureOptions {
    /// Features to enable on top of the defaults.
    pub enable: FeatureSet,
    /// Features to remove from the defaults.
    pub disable: FeatureSet,
    /// Start from an empty set.
    pub disable_all: bool,
}

impl FeatureOptions {
    /// Computes the effective set: defaults, minus `disable`, plus `enable`.
    pub fn build(&self) -> AppResult<FeatureSet> {
        let mut set = FeatureSet::default();
        if !self.disable_all {
            for f in DEFAULT_FEATURES {
                set.enable(f.name)?;
            }
        }
        for name in self.disable.names() {
            set.disable(name);
        }
        for name in self.enable.names() {
            set.enable(name)?;
        }
        Ok(set)
    }
}
