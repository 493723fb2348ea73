//! # Type Storage
//!
//! Keyed stores of lowered entities: nominal types by name, shared types by
//! schema `$ref`, shared responses by response `$ref`, and wrapped response
//! types. One storage is the global scope; each operation is lowered into a
//! fresh local scope that is merged on success.

use crate::error::{AppError, AppResult};
use crate::ir::{self, TypeArena, TypeId};
use indexmap::IndexMap;
use serde::Serialize;

/// Key of a wrapped (`StatusCode`/`Headers`) response type.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct WrappedKey {
    /// `$ref` of the response the wrapper belongs to.
    pub response_ref: String,
    /// `$ref` of the wrapped schema.
    pub schema_ref: String,
    /// Media type of an inline payload, empty for a `$ref` payload.
    pub content_type: String,
    /// Wrapper carries the status code.
    pub status_code: bool,
    /// Wrapper carries headers.
    pub headers: bool,
}

/// A scope of lowered entities.
#[derive(Debug, Clone, Default)]
pub struct Storage {
    /// Nominal types by name.
    pub types: IndexMap<String, TypeId>,
    /// Shared types by schema `$ref`.
    pub refs: IndexMap<String, TypeId>,
    /// Shared responses by response `$ref`.
    pub responses: IndexMap<String, ir::Response>,
    /// Wrapped response types.
    pub wtypes: IndexMap<WrappedKey, TypeId>,
}

impl Storage {
    /// Creates an empty scope.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a nominal type.
    ///
    /// A generic of an existing name replaces the previous node, inheriting
    /// its features and interfaces; any other kind fails with
    /// [`AppError::NameConflict`].
    pub fn save_type(&mut self, arena: &mut TypeArena, id: TypeId) -> AppResult<()> {
        let t = &arena[id];
        let name = t.has_name().map(str::to_string).ok_or_else(|| {
            AppError::General(format!("unexpected {} type {:?} in storage", t.tag(), t.name))
        })?;
        if name.is_empty() {
            return Err(AppError::General(format!("unnamed {} type", t.tag())));
        }
        if let Some(&existing) = self.types.get(&name) {
            if existing == id {
                return Ok(());
            }
            if !arena[id].is_generic() {
                return Err(AppError::NameConflict(format!("schema name conflict: {name:?}")));
            }
            inherit(arena, existing, id)?;
        }
        self.types.insert(name, id);
        Ok(())
    }

    /// Registers a shared type under its schema `$ref`.
    pub fn save_ref(&mut self, arena: &TypeArena, reference: &str, id: TypeId) -> AppResult<()> {
        if self.refs.contains_key(reference) {
            return Err(AppError::General(format!("reference conflict: {reference:?}")));
        }
        let name = &arena[id].name;
        if self.types.contains_key(name) {
            return Err(AppError::NameConflict(format!(
                "reference {reference:?} type name conflict: {name:?}"
            )));
        }
        self.refs.insert(reference.to_string(), id);
        self.types.insert(name.clone(), id);
        Ok(())
    }

    /// Registers a shared response.
    pub fn save_response(&mut self, reference: &str, response: ir::Response) -> AppResult<()> {
        if self.responses.contains_key(reference) {
            return Err(AppError::General(format!("reference conflict: {reference:?}")));
        }
        self.responses.insert(reference.to_string(), response);
        Ok(())
    }

    /// Registers a wrapped response type.
    pub fn save_wtype(&mut self, arena: &TypeArena, key: WrappedKey, id: TypeId) -> AppResult<()> {
        if self.wtypes.contains_key(&key) {
            return Err(AppError::General(format!(
                "wrapped type conflict: {:?} in {:?}",
                key.schema_ref, key.response_ref
            )));
        }
        let name = &arena[id].name;
        if self.types.contains_key(name) {
            return Err(AppError::NameConflict(format!(
                "wrapped type {:?} name conflict: {name:?}",
                key.schema_ref
            )));
        }
        self.wtypes.insert(key, id);
        self.types.insert(name.clone(), id);
        Ok(())
    }

    /// Type registered under `name`.
    pub fn lookup_type(&self, name: &str) -> Option<TypeId> {
        self.types.get(name).copied()
    }

    /// Merges `other` into this scope.
    ///
    /// Every conflict is checked before anything is applied, so a failed
    /// merge leaves the scope untouched.
    pub fn merge(&mut self, arena: &mut TypeArena, other: Storage) -> AppResult<()> {
        for (reference, id) in &other.refs {
            if self.refs.contains_key(reference) {
                return Err(AppError::General(format!("reference conflict: {reference:?}")));
            }
            let name = &arena[*id].name;
            if self.types.contains_key(name) {
                return Err(AppError::NameConflict(format!(
                    "reference type {reference:?} name conflict: {name:?}"
                )));
            }
        }
        for (name, id) in &other.types {
            if let Some(existing) = self.types.get(name) {
                if existing != id && !arena[*id].is_generic() {
                    return Err(AppError::NameConflict(format!(
                        "anonymous type name conflict: {name:?}"
                    )));
                }
            }
        }
        for reference in other.responses.keys() {
            if self.responses.contains_key(reference) {
                return Err(AppError::General(format!(
                    "response reference conflict: {reference:?}"
                )));
            }
        }
        for key in other.wtypes.keys() {
            if self.wtypes.contains_key(key) {
                return Err(AppError::General(format!(
                    "wrapped type reference conflict: {:?}",
                    key.schema_ref
                )));
            }
        }

        for (name, id) in other.types {
            if let Some(existing) = self.types.get(&name).copied() {
                if existing != id {
                    inherit(arena, existing, id)?;
                }
            }
            self.types.insert(name, id);
        }
        for (reference, id) in other.refs {
            self.types.insert(arena[id].name.clone(), id);
            self.refs.insert(reference, id);
        }
        self.responses.extend(other.responses);
        self.wtypes.extend(other.wtypes);
        Ok(())
    }
}

/// Copies features and interfaces of a replaced generic onto its successor.
fn inherit(arena: &mut TypeArena, from: TypeId, to: TypeId) -> AppResult<()> {
    let features: Vec<_> = arena[from].features.iter().copied().collect();
    for feature in features {
        arena.add_feature(to, feature);
    }
    let ifaces: Vec<_> = arena[from].implements.iter().copied().collect();
    for iface in ifaces {
        arena.implement(to, iface)?;
    }
    Ok(())
}
