//! # Boxing
//!
//! Wraps a payload into the optional/nullable carrier its use site needs:
//! nil semantics in place for arrays and byte slices, a named generic when
//! the payload allows one, a pointer otherwise.

use crate::error::{AppError, AppResult};
use crate::ir::{GenericVariant, Kind, NilSemantic, Type, TypeArena, TypeId};
use crate::spec::SchemaArena;
use crate::storage::Storage;

fn nil_of(v: GenericVariant) -> NilSemantic {
    if v.optional {
        NilSemantic::Optional
    } else {
        NilSemantic::Null
    }
}

fn generic(
    arena: &mut TypeArena,
    schemas: &SchemaArena,
    store: &mut Storage,
    of: TypeId,
    variant: GenericVariant,
) -> AppResult<TypeId> {
    let name = format!("{}{}", variant.prefix(), arena.generic_postfix(of, schemas));
    let id = arena.alloc(Type::new(name, Kind::Generic { of, variant }));
    store.save_type(arena, id)?;
    Ok(id)
}

/// Boxes `t` for variant `v`, saving any generic it creates into `store`.
pub fn box_type(
    arena: &mut TypeArena,
    schemas: &SchemaArena,
    store: &mut Storage,
    t: TypeId,
    v: GenericVariant,
) -> AppResult<TypeId> {
    if arena[t].is_any() || arena[t].is_stream() || !v.any() {
        return Ok(t);
    }

    if arena[t].is_array() || arena[t].is_byte_slice() {
        if v.nullable_optional() {
            return generic(arena, schemas, store, t, v);
        }
        match &mut arena[t].kind {
            Kind::Array { nil, .. } | Kind::Primitive { nil, .. } => *nil = nil_of(v),
            _ => {}
        }
        return Ok(t);
    }

    if arena[t].can_generic() {
        return generic(arena, schemas, store, t, v);
    }

    if v.nullable_optional() {
        let ptr = arena.alloc(Type::new(
            "",
            Kind::Pointer {
                to: t,
                nil: NilSemantic::Null,
            },
        ));
        let optional = GenericVariant {
            optional: true,
            nullable: false,
        };
        return generic(arena, schemas, store, ptr, optional);
    }
    Ok(arena.alloc(Type::new(
        "",
        Kind::Pointer {
            to: t,
            nil: nil_of(v),
        },
    )))
}

/// Boxes the property fields of struct or map `owner` per their own
/// optional/nullable flags.
///
/// Fields that lead back to the owner become pointers; a required
/// recursive field is an error.
pub fn box_struct_fields(
    arena: &mut TypeArena,
    schemas: &SchemaArena,
    store: &mut Storage,
    owner: TypeId,
) -> AppResult<()> {
    let count = arena[owner].fields().len();
    for idx in 0..count {
        let field = &arena[owner].fields()[idx];
        let Some(spec) = &field.spec else {
            continue;
        };
        let ty = field.ty;
        let v = GenericVariant {
            optional: !spec.required,
            nullable: spec.nullable,
        };

        let boxed = if arena.recursive_to(owner, ty) {
            if !v.any() {
                return Err(AppError::General(format!(
                    "recursion: {}.{} is required",
                    arena[owner].name, field.name
                )));
            }
            let nil = nil_of(v);
            if v.nullable_optional() {
                let inner = arena.alloc(Type::new(
                    "",
                    Kind::Pointer {
                        to: ty,
                        nil: NilSemantic::Optional,
                    },
                ));
                arena.alloc(Type::new(
                    "",
                    Kind::Pointer {
                        to: inner,
                        nil: NilSemantic::Null,
                    },
                ))
            } else {
                arena.alloc(Type::new("", Kind::Pointer { to: ty, nil }))
            }
        } else {
            box_type(arena, schemas, store, ty, v)?
        };

        if let Some(fields) = arena[owner].fields_mut() {
            fields[idx].ty = boxed;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Field, FieldSpec, PrimitiveType};

    const OPT: GenericVariant = GenericVariant {
        optional: true,
        nullable: false,
    };
    const NIL: GenericVariant = GenericVariant {
        optional: false,
        nullable: true,
    };
    const BOTH: GenericVariant = GenericVariant {
        optional: true,
        nullable: true,
    };

    fn setup() -> (TypeArena, SchemaArena, Storage) {
        (TypeArena::new(), SchemaArena::new(), Storage::new())
    }

    #[test]
    fn test_box_primitive_generic_names() {
        let (mut arena, schemas, mut store) = setup();
        let s = arena.alloc(Type::primitive(PrimitiveType::String, None));
        let opt = box_type(&mut arena, &schemas, &mut store, s, OPT).unwrap();
        assert_eq!(arena[opt].name, "OptString");
        let nil = box_type(&mut arena, &schemas, &mut store, s, NIL).unwrap();
        assert_eq!(arena[nil].name, "NilString");
        let both = box_type(&mut arena, &schemas, &mut store, s, BOTH).unwrap();
        assert_eq!(arena[both].name, "OptNilString");
        assert_eq!(store.lookup_type("OptNilString"), Some(both));
    }

    #[test]
    fn test_box_unchanged() {
        let (mut arena, schemas, mut store) = setup();
        let any = arena.alloc(Type::any(None));
        assert_eq!(box_type(&mut arena, &schemas, &mut store, any, BOTH).unwrap(), any);
        let s = arena.alloc(Type::primitive(PrimitiveType::Int, None));
        let none = GenericVariant::default();
        assert_eq!(box_type(&mut arena, &schemas, &mut store, s, none).unwrap(), s);
        assert!(store.types.is_empty());
    }

    #[test]
    fn test_box_array_in_place() {
        let (mut arena, schemas, mut store) = setup();
        let item = arena.alloc(Type::primitive(PrimitiveType::Int, None));
        let arr = arena.alloc(Type::new(
            "",
            Kind::Array {
                item,
                nil: NilSemantic::Invalid,
            },
        ));
        assert_eq!(box_type(&mut arena, &schemas, &mut store, arr, NIL).unwrap(), arr);
        assert!(matches!(
            arena[arr].kind,
            Kind::Array {
                nil: NilSemantic::Null,
                ..
            }
        ));
        let both = box_type(&mut arena, &schemas, &mut store, arr, BOTH).unwrap();
        assert_eq!(arena[both].name, "OptNilIntArray");
    }

    #[test]
    fn test_box_empty_struct_uses_pointer() {
        let (mut arena, schemas, mut store) = setup();
        let st = arena.alloc(Type::new("Empty", Kind::empty_struct()));
        let p = box_type(&mut arena, &schemas, &mut store, st, OPT).unwrap();
        assert!(matches!(
            arena[p].kind,
            Kind::Pointer {
                nil: NilSemantic::Optional,
                ..
            }
        ));
        let g = box_type(&mut arena, &schemas, &mut store, st, BOTH).unwrap();
        assert_eq!(arena[g].name, "OptEmptyPointer");
    }

    fn field(name: &str, ty: TypeId, required: bool) -> Field {
        let mut f = Field::new(name, ty, name.to_lowercase());
        f.spec = Some(FieldSpec {
            name: name.to_lowercase(),
            required,
            ..Default::default()
        });
        f
    }

    #[test]
    fn test_recursive_field_becomes_pointer() {
        let (mut arena, schemas, mut store) = setup();
        let node = arena.alloc(Type::new("Node", Kind::empty_struct()));
        let value = arena.alloc(Type::primitive(PrimitiveType::Int, None));
        if let Some(fields) = arena[node].fields_mut() {
            fields.push(field("Value", value, true));
            fields.push(field("Next", node, false));
        }
        box_struct_fields(&mut arena, &schemas, &mut store, node).unwrap();
        let next = arena[node].fields()[1].ty;
        assert!(matches!(
            arena[next].kind,
            Kind::Pointer { to, nil: NilSemantic::Optional } if to == node
        ));
        assert_eq!(arena[node].fields()[0].ty, value);
    }

    #[test]
    fn test_required_recursion_is_error() {
        let (mut arena, schemas, mut store) = setup();
        let node = arena.alloc(Type::new("Node", Kind::empty_struct()));
        if let Some(fields) = arena[node].fields_mut() {
            fields.push(field("Next", node, true));
        }
        let err = box_struct_fields(&mut arena, &schemas, &mut store, node).unwrap_err();
        assert!(err.to_string().contains("recursion: Node.Next"));
    }
}
