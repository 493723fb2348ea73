//! # Equality Specs
//!
//! Plans for `Equal`/`Hash` methods on types used as items of
//! `uniqueItems` arrays.

use crate::ir::types::TypeId;
use serde::Serialize;

/// Depth bound for nested comparisons.
pub const DEFAULT_MAX_DEPTH: usize = 10;

/// How a field is compared.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldCategory {
    /// Scalar.
    Primitive,
    /// `Opt…` wrapper.
    Optional,
    /// `Nil…` wrapper.
    Nullable,
    /// Pointer.
    Pointer,
    /// Struct with its own `Equal`.
    NestedObject,
    /// Sequence.
    Array,
    /// Mapping.
    Map,
}

/// Comparison plan for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldEquality {
    /// Field identifier.
    pub name: String,
    /// Field type.
    #[serde(rename = "type")]
    pub ty: TypeId,
    /// Comparison category.
    pub category: FieldCategory,
    /// Field holds a struct (possibly wrapped).
    pub nested: bool,
    /// Field holds a map (possibly wrapped).
    pub map: bool,
    /// Field holds an array (possibly wrapped).
    pub array: bool,
    /// Array elements are structs.
    pub array_of_structs: bool,
    /// Array elements are nullable wrappers.
    pub array_of_nullable: bool,
    /// Field holds raw bytes.
    pub byte_slice: bool,
}

/// `Equal` method plan of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EqualitySpec {
    /// Type the method is generated for.
    #[serde(rename = "type")]
    pub ty: TypeId,
    /// Type name.
    pub name: String,
    /// Per-field plans.
    pub fields: Vec<FieldEquality>,
    /// Whether comparisons recurse into nested objects.
    pub needs_depth_tracking: bool,
    /// Recursion bound.
    pub max_depth: usize,
}

/// Hash plan for one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldHash {
    /// Field identifier.
    pub name: String,
    /// Field type.
    #[serde(rename = "type")]
    pub ty: TypeId,
    /// Hashing category.
    pub category: FieldCategory,
    /// Field hashes through a nested `Hash`.
    pub nested: bool,
}

/// `Hash` method plan of a type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HashSpec {
    /// Type the method is generated for.
    #[serde(rename = "type")]
    pub ty: TypeId,
    /// Type name.
    pub name: String,
    /// Per-field plans.
    pub fields: Vec<FieldHash>,
    /// Whether any field delegates to a nested `Hash`.
    pub uses_nested_hash: bool,
}

impl From<&EqualitySpec> for HashSpec {
    fn from(spec: &EqualitySpec) -> Self {
        let fields: Vec<FieldHash> = spec
            .fields
            .iter()
            .map(|f| FieldHash {
                name: f.name.clone(),
                ty: f.ty,
                category: f.category,
                nested: f.nested,
            })
            .collect();
        Self {
            ty: spec.ty,
            name: spec.name.clone(),
            uses_nested_hash: fields.iter().any(|f| f.nested),
            fields,
        }
    }
}
