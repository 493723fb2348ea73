//! Equality planner.
//!
//! Items of `uniqueItems` arrays that are not plain scalars need generated
//! `Equal`/`Hash` methods. The planner finds those arrays among the stored
//! types and produces one plan per nominal type reachable from their items.

use crate::ir::equality::DEFAULT_MAX_DEPTH;
use crate::ir::{EqualitySpec, FieldCategory, FieldEquality, HashSpec, Kind, TypeArena, TypeId};
use std::collections::HashSet;
use tracing::debug;

/// `Equal` and `Hash` plans, in discovery order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EqualityPlan {
    /// `Equal` methods.
    pub equality: Vec<EqualitySpec>,
    /// `Hash` methods, one per equality plan.
    pub hash: Vec<HashSpec>,
}

/// Plans methods for every `uniqueItems` array reachable from `roots`.
pub fn plan_equality(arena: &TypeArena, roots: impl IntoIterator<Item = TypeId>) -> EqualityPlan {
    let mut planner = Planner {
        arena,
        specs: Vec::new(),
        planned: HashSet::new(),
        walked: HashSet::new(),
        nested: HashSet::new(),
    };
    for root in roots {
        planner.walk(root);
    }
    let hash = planner.specs.iter().map(HashSpec::from).collect();
    EqualityPlan {
        equality: planner.specs,
        hash,
    }
}

/// Whether values of `t` cannot be compared with `==`.
fn needs_equality(arena: &TypeArena, t: TypeId) -> bool {
    match &arena[t].kind {
        Kind::Struct { .. } | Kind::Array { .. } | Kind::Map { .. } => true,
        Kind::Alias { to } => needs_equality(arena, *to),
        _ => false,
    }
}

/// Payload of an optional/nullable wrapper, or `t` itself.
fn unwrap_generic(arena: &TypeArena, t: TypeId) -> TypeId {
    match &arena[t].kind {
        Kind::Generic { of, .. } => *of,
        _ => t,
    }
}

fn is_nested_object(arena: &TypeArena, t: TypeId) -> bool {
    match &arena[t].kind {
        Kind::Struct { .. } => true,
        Kind::Generic { of, .. } | Kind::Alias { to: of } => is_nested_object(arena, *of),
        _ => false,
    }
}

fn categorize(arena: &TypeArena, t: TypeId) -> FieldCategory {
    match &arena[t].kind {
        Kind::Generic { variant, .. } if variant.optional => FieldCategory::Optional,
        Kind::Generic { .. } => FieldCategory::Nullable,
        Kind::Struct { .. } => FieldCategory::NestedObject,
        Kind::Array { .. } => FieldCategory::Array,
        Kind::Map { .. } => FieldCategory::Map,
        Kind::Pointer { .. } => FieldCategory::Pointer,
        Kind::Alias { to } => categorize(arena, *to),
        _ => FieldCategory::Primitive,
    }
}

struct Planner<'a> {
    arena: &'a TypeArena,
    specs: Vec<EqualitySpec>,
    planned: HashSet<TypeId>,
    walked: HashSet<TypeId>,
    nested: HashSet<TypeId>,
}

impl Planner<'_> {
    /// Finds `uniqueItems` arrays under `t`.
    fn walk(&mut self, t: TypeId) {
        if !self.walked.insert(t) {
            return;
        }
        let arena = self.arena;
        match &arena[t].kind {
            Kind::Array { item, .. } => {
                if arena[t].validators.array.unique_items && needs_equality(arena, *item) {
                    self.plan(*item);
                    self.collect_nested(*item);
                }
                self.walk(*item);
            }
            Kind::Struct { fields, .. } | Kind::Map { fields, .. } => {
                for field in fields {
                    self.walk(field.ty);
                }
                if let Kind::Map { item, .. } = &arena[t].kind {
                    self.walk(*item);
                }
            }
            Kind::Sum { of, .. } => {
                for &arm in of {
                    self.walk(arm);
                }
            }
            Kind::Generic { of: to, .. } | Kind::Alias { to } | Kind::Pointer { to, .. } => {
                self.walk(*to);
            }
            _ => {}
        }
    }

    /// Plans every nominal struct reachable from a unique item.
    fn collect_nested(&mut self, t: TypeId) {
        let arena = self.arena;
        match &arena[t].kind {
            Kind::Generic { of: to, .. } | Kind::Alias { to } | Kind::Pointer { to, .. } => {
                self.collect_nested(*to);
            }
            Kind::Array { item, .. } => self.collect_nested(*item),
            Kind::Struct { fields, .. } => {
                if !self.nested.insert(t) {
                    return;
                }
                self.plan(t);
                for field in fields {
                    self.collect_nested(field.ty);
                }
            }
            _ => {}
        }
    }

    fn plan(&mut self, t: TypeId) {
        let arena = self.arena;
        let ty = &arena[t];
        if ty.name.is_empty() || !self.planned.insert(t) {
            return;
        }

        let fields: Vec<FieldEquality> = match &ty.kind {
            Kind::Struct { fields, .. } => fields
                .iter()
                .map(|f| self.field(&f.name, f.ty))
                .collect(),
            _ => Vec::new(),
        };
        debug!(type_name = %ty.name, fields = fields.len(), "Planned equality method");
        self.specs.push(EqualitySpec {
            ty: t,
            name: ty.name.clone(),
            needs_depth_tracking: fields.iter().any(|f| f.nested),
            fields,
            max_depth: DEFAULT_MAX_DEPTH,
        });
    }

    fn field(&self, name: &str, t: TypeId) -> FieldEquality {
        let arena = self.arena;
        let unwrapped = unwrap_generic(arena, t);
        let array = [t, unwrapped].into_iter().find(|&a| arena[a].is_array());

        let (mut array_of_structs, mut array_of_nullable) = (false, false);
        if let Some(Kind::Array { item, .. }) = array.map(|a| &arena[a].kind) {
            let item_ty = &arena[*item];
            if let Kind::Generic { variant, .. } = &item_ty.kind {
                array_of_nullable = variant.nullable;
            }
            array_of_structs = arena[unwrap_generic(arena, *item)].is_struct();
        }

        FieldEquality {
            name: name.to_string(),
            ty: t,
            category: categorize(arena, t),
            nested: is_nested_object(arena, t),
            map: arena[unwrapped].is_map(),
            array: array.is_some(),
            array_of_structs,
            array_of_nullable,
            byte_slice: arena[t].is_byte_slice() || arena[unwrapped].is_byte_slice(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Field, GenericVariant, NilSemantic, PrimitiveType, Type};

    fn array(arena: &mut TypeArena, item: TypeId, unique: bool) -> TypeId {
        let mut t = Type::new(
            "",
            Kind::Array {
                item,
                nil: NilSemantic::Invalid,
            },
        );
        t.validators.array.unique_items = unique;
        arena.alloc(t)
    }

    fn object(arena: &mut TypeArena, name: &str, fields: Vec<Field>) -> TypeId {
        arena.alloc(Type::new(
            name,
            Kind::Struct {
                fields,
                tuple: false,
                deny_additional: false,
            },
        ))
    }

    #[test]
    fn test_plans_nested_structs() {
        let mut arena = TypeArena::new();
        let int = arena.alloc(Type::primitive(PrimitiveType::Int, None));
        let string = arena.alloc(Type::primitive(PrimitiveType::String, None));
        let opt_string = arena.alloc(Type::new(
            "OptString",
            Kind::Generic {
                of: string,
                variant: GenericVariant {
                    optional: true,
                    nullable: false,
                },
            },
        ));
        let point = object(
            &mut arena,
            "Point",
            vec![Field::new("X", int, "x"), Field::new("Y", int, "y")],
        );
        let points = array(&mut arena, point, false);
        let shape = object(
            &mut arena,
            "Shape",
            vec![
                Field::new("Center", point, "center"),
                Field::new("Label", opt_string, "label"),
                Field::new("Path", points, "path"),
            ],
        );
        let shapes = array(&mut arena, shape, true);
        let root = object(&mut arena, "Canvas", vec![Field::new("Shapes", shapes, "shapes")]);

        let plan = plan_equality(&arena, [root]);
        let names: Vec<&str> = plan.equality.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Shape", "Point"]);

        let shape_spec = &plan.equality[0];
        assert!(shape_spec.needs_depth_tracking);
        assert_eq!(shape_spec.max_depth, DEFAULT_MAX_DEPTH);
        let categories: Vec<FieldCategory> = shape_spec.fields.iter().map(|f| f.category).collect();
        assert_eq!(
            categories,
            vec![
                FieldCategory::NestedObject,
                FieldCategory::Optional,
                FieldCategory::Array
            ]
        );
        assert!(shape_spec.fields[2].array_of_structs);
        assert!(!plan.equality[1].needs_depth_tracking);

        assert_eq!(plan.hash.len(), 2);
        assert!(plan.hash[0].uses_nested_hash);
        assert!(!plan.hash[1].uses_nested_hash);
    }

    #[test]
    fn test_scalar_items_need_nothing() {
        let mut arena = TypeArena::new();
        let string = arena.alloc(Type::primitive(PrimitiveType::String, None));
        let tags = array(&mut arena, string, true);
        let root = object(&mut arena, "Tagged", vec![Field::new("Tags", tags, "tags")]);
        assert_eq!(plan_equality(&arena, [root]), EqualityPlan::default());
    }

    #[test]
    fn test_recursive_item_terminates() {
        let mut arena = TypeArena::new();
        let node = object(&mut arena, "Node", Vec::new());
        let ptr = arena.alloc(Type::new(
            "",
            Kind::Pointer {
                to: node,
                nil: NilSemantic::Optional,
            },
        ));
        if let Some(fields) = arena.get_mut(node).and_then(|t| t.fields_mut()) {
            fields.push(Field::new("Next", ptr, "next"));
        }
        let nodes = array(&mut arena, node, true);

        let plan = plan_equality(&arena, [nodes]);
        assert_eq!(plan.equality.len(), 1);
        assert_eq!(plan.equality[0].fields[0].category, FieldCategory::Pointer);
        assert!(!plan.equality[0].needs_depth_tracking);
    }
}
