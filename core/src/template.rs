//! # Template Config
//!
//! The record handed to an emitter: everything the generator produced plus
//! a few derived slices the emitter would otherwise recompute.

use crate::features::FeatureSet;
use crate::generator::Generator;
use crate::ir::{self, EqualitySpec, HashSpec, Kind, TypeArena, TypeId};
use crate::router::{Router, WebhookRouter};
use indexmap::IndexMap;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

/// Emitter input.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateConfig<'a> {
    /// Package or module name.
    pub package: String,
    /// Enabled features.
    pub features: &'a FeatureSet,
    /// Operations, sorted by name.
    pub operations: &'a [ir::Operation],
    /// Webhooks, sorted by name.
    pub webhooks: &'a [ir::Operation],
    /// Nominal types by name.
    pub types: BTreeMap<&'a str, TypeId>,
    /// Interfaces by name.
    pub interfaces: BTreeMap<&'a str, TypeId>,
    /// Every type node; the ids above index into it.
    pub arena: &'a TypeArena,
    /// Shared error response.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<&'a ir::Response>,
    /// Route tree.
    pub router: &'a Router,
    /// Webhook index.
    pub webhook_router: &'a WebhookRouter,
    /// Named servers.
    pub servers: &'a [ir::Server],
    /// Security schemes by name.
    pub securities: &'a IndexMap<String, ir::Security>,
    /// `Equal` methods to generate.
    pub equality: &'a [EqualitySpec],
    /// `Hash` methods to generate.
    pub hash: &'a [HashSpec],
    /// Distinct regex sources, sorted.
    pub regex_strings: Vec<String>,
    /// Distinct `multipleOf` rationals, sorted.
    pub rat_strings: Vec<String>,
}

impl<'a> TemplateConfig<'a> {
    /// Builds the record over the output of `g`.
    pub fn new(g: &'a Generator, package: &str) -> Self {
        let arena = g.arena();
        let types: BTreeMap<&str, TypeId> = g
            .types()
            .iter()
            .map(|(name, &id)| (name.as_str(), id))
            .collect();
        let interfaces = types
            .iter()
            .filter(|&(_, &id)| arena[id].is_interface())
            .map(|(&name, &id)| (name, id))
            .collect();
        let plan = g.equality();

        Self {
            package: package.to_string(),
            features: g.features(),
            operations: g.operations(),
            webhooks: g.webhooks(),
            types,
            interfaces,
            arena,
            error_type: g.error_type(),
            router: g.router(),
            webhook_router: g.webhook_router(),
            servers: g.servers(),
            securities: g.securities(),
            equality: &plan.equality,
            hash: &plan.hash,
            regex_strings: regex_strings(arena),
            rat_strings: rat_strings(arena),
        }
    }
}

/// String-validator patterns and map key patterns.
pub fn regex_strings(arena: &TypeArena) -> Vec<String> {
    let mut set = BTreeSet::new();
    for (_, t) in arena.iter() {
        if let Some(re) = &t.validators.string.regex {
            set.insert(re.clone());
        }
        if let Kind::Map {
            pattern: Some(p), ..
        } = &t.kind
        {
            set.insert(p.clone());
        }
    }
    set.into_iter().collect()
}

/// Float `multipleOf` values.
pub fn rat_strings(arena: &TypeArena) -> Vec<String> {
    arena
        .iter()
        .filter_map(|(_, t)| t.validators.float.multiple_of.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
