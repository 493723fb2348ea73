//! # Sum Types
//!
//! `oneOf` and `anyOf` lowering and the choice of a discrimination strategy:
//! an explicit tag property, the JSON kind of the value, or fields only one
//! arm declares.

use super::SchemaGen;
use crate::error::{AppError, AppResult, ResultExt};
use crate::ir::{
    Kind, PrimitiveType, SumMapping, SumSpec, Type, TypeArena, TypeId, TypeKind, UniqueArm,
};
use crate::naming::capitalize;
use crate::spec::{SchemaArena, SchemaId, SchemaType};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Fails when following `oneOf`/`allOf`/`anyOf` from `root` reaches a
/// reference already on the path.
pub(crate) fn ensure_no_infinite_recursion(schemas: &SchemaArena, root: SchemaId) -> AppResult<()> {
    fn walk(schemas: &SchemaArena, list: &[SchemaId], path: &mut Vec<String>) -> AppResult<()> {
        for (i, &id) in list.iter().enumerate() {
            let s = &schemas[id];
            let pushed = match &s.xref {
                Some(reference) if path.contains(reference) => {
                    return Err(AppError::General(format!(
                        "reference {reference:?} [{i}] leads to infinite recursion"
                    )))
                    .at(&s.location);
                }
                Some(reference) => {
                    path.push(reference.clone());
                    true
                }
                None => false,
            };
            let nested = if !s.one_of.is_empty() {
                &s.one_of
            } else if !s.all_of.is_empty() {
                &s.all_of
            } else {
                &s.any_of
            };
            walk(schemas, nested, path)?;
            if pushed {
                path.pop();
            }
        }
        Ok(())
    }
    walk(schemas, &[root], &mut Vec::new())
}

/// JSON kind names used to tell arms apart.
fn kind_name(arena: &TypeArena, schemas: &SchemaArena, t: TypeId, is_one_of: bool) -> Option<&'static str> {
    use crate::ir::JsonKind;
    let name = match arena.json_kind(t)? {
        JsonKind::Object => "object",
        JsonKind::Array => "array",
        JsonKind::String => "string",
        JsonKind::Bool => "bool",
        JsonKind::Null => "null",
        JsonKind::Integer => "integer",
        JsonKind::Number => {
            let integer_schema = arena[t]
                .schema
                .is_some_and(|s| schemas[s].ty == SchemaType::Integer);
            if integer_schema && !is_one_of {
                "integer"
            } else {
                "number"
            }
        }
    };
    Some(name)
}

fn collect_kinds(
    arena: &TypeArena,
    schemas: &SchemaArena,
    arms: &[TypeId],
    kinds: &mut HashSet<&'static str>,
    is_one_of: bool,
) {
    for &arm in arms {
        match kind_name(arena, schemas, arm, is_one_of) {
            Some(kind) => {
                kinds.insert(kind);
            }
            None => {
                if let Kind::Sum { of, .. } = &arena[arm].kind {
                    collect_kinds(arena, schemas, of, kinds, is_one_of);
                }
            }
        }
    }
}

/// Which type-based strategy distinguishes `arms`, if any.
pub(crate) fn type_discriminator(
    arena: &TypeArena,
    schemas: &SchemaArena,
    arms: &[TypeId],
    is_one_of: bool,
) -> Option<SumSpec> {
    let mut kinds = HashSet::new();
    let mut nested_sum = false;
    for &arm in arms {
        if let Kind::Sum { of, spec } = &arena[arm].kind {
            nested_sum = true;
            match spec {
                SumSpec::Discriminator { .. } | SumSpec::UniqueFields { .. } => {
                    kinds.insert("object");
                }
                SumSpec::TypeDiscriminator | SumSpec::JsonTypeKind => {
                    collect_kinds(arena, schemas, of, &mut kinds, is_one_of);
                }
            }
            continue;
        }
        // Any, streams and interfaces have no single kind.
        let kind = kind_name(arena, schemas, arm, is_one_of)?;
        if !kinds.insert(kind) {
            return None;
        }
    }

    let mixed_numbers = kinds.contains("integer") && kinds.contains("number");
    match (mixed_numbers, nested_sum) {
        (true, true) => None,
        (true, false) => Some(SumSpec::JsonTypeKind),
        (false, _) => Some(SumSpec::TypeDiscriminator),
    }
}

/// Key of the implicit discriminator mapping: the last segment of the
/// pointer part of a reference.
fn schema_name(reference: &str) -> Option<String> {
    let (_, after) = reference.split_once("#/")?;
    let base = after.trim_end_matches('/').rsplit('/').next()?;
    (!base.is_empty()).then(|| base.to_string())
}

impl SchemaGen<'_, '_> {
    fn collect_sum_variants(&mut self, name: &str, arms: &[SchemaId]) -> AppResult<Vec<TypeId>> {
        let schemas = self.ctx.schemas;
        let mut variants = Vec::with_capacity(arms.len() + 1);
        let mut names = HashSet::new();

        if arms.iter().any(|&arm| schemas[arm].nullable) {
            let mut null = Type::primitive(PrimitiveType::Null, None);
            null.name = "Null".to_string();
            names.insert(null.name.clone());
            variants.push(self.ctx.alloc(null));
        }

        for (i, &arm) in arms.iter().enumerate() {
            let t = self.generate2(&format!("{name}{i}"), Some(arm))?;
            let variant_name = capitalize(&self.ctx.arena.name_postfix(t, schemas));
            if !names.insert(variant_name.clone()) {
                return Err(AppError::not_implemented("sum types with same names"))
                    .at(&schemas[arm].location);
            }
            self.ctx.arena[t].name = variant_name;
            variants.push(t);
        }
        Ok(variants)
    }

    fn register_sum(
        &mut self,
        name: &str,
        id: SchemaId,
        side: bool,
        arms: &[SchemaId],
    ) -> AppResult<(TypeId, Vec<TypeId>)> {
        ensure_no_infinite_recursion(self.ctx.schemas, id)?;
        let node = Type::new(
            name,
            Kind::Sum {
                of: Vec::new(),
                spec: SumSpec::TypeDiscriminator,
            },
        )
        .with_schema((!side).then_some(id));
        let sum = self.ctx.alloc(node);
        let sum = self.regtype(name, sum);
        let variants = self.collect_sum_variants(name, arms)?;
        Ok((sum, variants))
    }

    fn finish_sum(&mut self, sum: TypeId, variants: Vec<TypeId>, strategy: SumSpec) {
        self.ctx.arena[sum].kind = Kind::Sum {
            of: variants,
            spec: strategy,
        };
    }

    /// Lowers `anyOf`. Only arms of distinct JSON kinds are supported.
    pub(super) fn any_of(&mut self, name: &str, id: SchemaId, side: bool) -> AppResult<TypeId> {
        let schemas = self.ctx.schemas;
        let schema = &schemas[id];
        let (sum, variants) = self.register_sum(name, id, side, &schema.any_of)?;

        let Some(strategy) = type_discriminator(self.ctx.arena, schemas, &variants, false) else {
            return Err(AppError::not_implemented("complex anyOf"));
        };

        // Validators of the parent apply to the arms that lack their own.
        for &v in &variants {
            let t = &mut self.ctx.arena[v];
            match t.tag() {
                TypeKind::Primitive | TypeKind::Enum => {
                    if t.is_integer() {
                        if !t.validators.int.is_set() {
                            t.validators.set_int(schema)?;
                        }
                    } else if t.is_float() {
                        if !t.validators.float.is_set() {
                            t.validators.set_float(schema)?;
                        }
                    } else if !t.validators.string.is_set() {
                        t.validators.set_string(schema)?;
                    }
                }
                TypeKind::Array => {
                    if !t.validators.array.is_set() {
                        t.validators.set_array(schema);
                    }
                }
                TypeKind::Map | TypeKind::Struct => {
                    if !t.validators.object.is_set() {
                        t.validators.set_object(schema);
                    }
                }
                _ => {}
            }
        }

        self.finish_sum(sum, variants, strategy);
        Ok(sum)
    }

    /// Lowers `oneOf`, trying an explicit discriminator, then JSON kinds,
    /// then unique fields.
    pub(super) fn one_of(&mut self, name: &str, id: SchemaId, side: bool) -> AppResult<TypeId> {
        let schemas = self.ctx.schemas;
        let schema = &schemas[id];
        let (sum, variants) = self.register_sum(name, id, side, &schema.one_of)?;

        if let Some(d) = &schema.discriminator {
            let mapping = self.discriminator_mapping(id, &variants)?;
            for entry in &mapping {
                if let Some(fields) = self.ctx.arena[entry.ty].fields_mut() {
                    fields.retain(|f| f.tag.json != d.property_name);
                }
            }
            self.finish_sum(
                sum,
                variants,
                SumSpec::Discriminator {
                    property: d.property_name.clone(),
                    mapping,
                },
            );
            return Ok(sum);
        }

        if let Some(strategy) = type_discriminator(self.ctx.arena, schemas, &variants, true) {
            self.finish_sum(sum, variants, strategy);
            return Ok(sum);
        }

        let strategy = unique_fields(self.ctx.arena, &variants)?;
        self.finish_sum(sum, variants, strategy);
        Ok(sum)
    }

    fn discriminator_mapping(&self, id: SchemaId, variants: &[TypeId]) -> AppResult<Vec<SumMapping>> {
        let schemas = self.ctx.schemas;
        let arena = &*self.ctx.arena;
        let schema = &schemas[id];
        // A nullable arm prepends the null variant.
        let offset = variants.len() - schema.one_of.len();
        let arm_ref = |i: usize, t: TypeId| -> Option<String> {
            let s = arena[t].schema.unwrap_or(schema.one_of[i - offset]);
            schemas[s].xref.clone()
        };

        let mut mapping = Vec::new();
        let explicit = schema
            .discriminator
            .as_ref()
            .map(|d| d.mapping.as_slice())
            .unwrap_or_default();
        for (key, target) in explicit {
            let mut found = false;
            for (i, &t) in variants.iter().enumerate() {
                if !arena[t].is(&[TypeKind::Struct, TypeKind::Map]) {
                    return Err(AppError::not_implemented("unsupported sum type variant"))
                        .at(&schema.location);
                }
                if arm_ref(i, t).as_deref() == Some(target.as_str()) {
                    found = true;
                    mapping.push(SumMapping {
                        key: key.clone(),
                        ty: t,
                    });
                }
            }
            if !found {
                return Err(AppError::General(format!(
                    "discriminator: unable to map {key:?} to {target:?}"
                )))
                .at(&schema.location);
            }
        }

        if mapping.is_empty() {
            let mut keys = HashSet::new();
            for (i, &t) in variants.iter().enumerate() {
                let reference = if i < offset { None } else { arm_ref(i, t) };
                let Some(key) = reference.as_deref().and_then(schema_name) else {
                    return Err(AppError::not_implemented("complicated reference"))
                        .at(&schema.location);
                };
                if !keys.insert(key.clone()) {
                    return Err(AppError::not_implemented("duplicate mapping key"))
                        .at(&schema.location);
                }
                mapping.push(SumMapping { key, ty: t });
            }
        }
        mapping.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(mapping)
    }
}

/// Infers a fields discriminator: each arm is recognized by the JSON
/// fields no other arm has.
fn unique_fields(arena: &TypeArena, variants: &[TypeId]) -> AppResult<SumSpec> {
    let mut fields: BTreeMap<TypeId, BTreeSet<String>> = BTreeMap::new();
    for &v in variants {
        if !arena[v].is_struct() {
            return Err(AppError::not_implemented("discriminator inference"));
        }
        let json: BTreeSet<String> = arena[v].json_fields().map(|f| f.tag.json.clone()).collect();
        fields.insert(v, json);
    }

    let mut seen = HashSet::new();
    let mut common = HashSet::new();
    for set in fields.values() {
        for f in set {
            if !seen.insert(f.clone()) {
                common.insert(f.clone());
            }
        }
    }
    for set in fields.values_mut() {
        set.retain(|f| !common.contains(f));
    }

    let empty: Vec<TypeId> = variants
        .iter()
        .copied()
        .filter(|v| fields[v].is_empty())
        .collect();
    if empty.len() > 1 {
        return Err(AppError::FieldsDiscriminatorInference(
            empty.iter().map(|&v| arena[v].name.clone()).collect(),
        ));
    }

    let mut unique: Vec<UniqueArm> = variants
        .iter()
        .map(|&v| UniqueArm {
            ty: v,
            fields: fields[&v].iter().cloned().collect(),
        })
        .collect();
    unique.sort_by(|a, b| arena[a.ty].name.cmp(&arena[b.ty].name));
    Ok(SumSpec::UniqueFields {
        default: empty.first().copied(),
        unique,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_schema_name() {
        assert_eq!(
            schema_name("#/components/schemas/Cat").as_deref(),
            Some("Cat")
        );
        assert_eq!(schema_name("pets.yaml#/Dog").as_deref(), Some("Dog"));
        assert_eq!(schema_name("pets.yaml#"), None);
        assert_eq!(schema_name("#/"), None);
    }

    #[test]
    fn test_type_discriminator_kinds() {
        let mut arena = TypeArena::new();
        let schemas = SchemaArena::new();
        let s = arena.alloc(Type::primitive(PrimitiveType::String, None));
        let i = arena.alloc(Type::primitive(PrimitiveType::Int, None));
        let f = arena.alloc(Type::primitive(PrimitiveType::Float64, None));
        let any = arena.alloc(Type::any(None));

        assert_eq!(
            type_discriminator(&arena, &schemas, &[s, i], true),
            Some(SumSpec::TypeDiscriminator)
        );
        // Both numeric arms read as numbers without an integer schema.
        assert_eq!(type_discriminator(&arena, &schemas, &[i, f], false), None);
        assert_eq!(type_discriminator(&arena, &schemas, &[s, any], true), None);
    }

    #[test]
    fn test_unique_fields_default_and_order() {
        use crate::ir::Field;
        let mut arena = TypeArena::new();
        let int = arena.alloc(Type::primitive(PrimitiveType::Int, None));
        let mut mk = |name: &str, fields: &[&str]| {
            let mut t = Type::new(name, Kind::empty_struct());
            if let Some(fs) = t.fields_mut() {
                fs.extend(fields.iter().map(|f| Field::new(capitalize(f), int, *f)));
            }
            arena.alloc(t)
        };
        let b = mk("B", &["id", "bark"]);
        let a = mk("A", &["id"]);
        let c = mk("C", &["id", "meow", "claws"]);

        let spec = unique_fields(&arena, &[b, a, c]).unwrap();
        let SumSpec::UniqueFields { default, unique } = spec else {
            panic!("expected fields strategy");
        };
        assert_eq!(default, Some(a));
        let order: Vec<_> = unique.iter().map(|u| u.ty).collect();
        assert_eq!(order, vec![a, b, c]);
        assert_eq!(unique[2].fields, vec!["claws", "meow"]);
    }

    #[test]
    fn test_unique_fields_ambiguous() {
        let mut arena = TypeArena::new();
        let a = arena.alloc(Type::new("A", Kind::empty_struct()));
        let b = arena.alloc(Type::new("B", Kind::empty_struct()));
        let err = unique_fields(&arena, &[a, b]).unwrap_err();
        assert_eq!(err.skip_name(), Some("discriminator inference"));
        assert!(err.to_string().contains("[A, B]"));
    }
}
