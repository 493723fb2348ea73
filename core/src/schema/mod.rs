#![deny(missing_docs)]

//! # Schema Lowerer
//!
//! Recursively lowers resolved schemas into IR types.
//!
//! A [`SchemaGen`] lowers one root schema. Types created along the way are
//! collected in two lists: shared types reached through a `$ref`
//! (`local_refs`) and anonymous nominal types (`side`). When the root is
//! done, the struct fields of both lists are boxed per their own
//! optional/nullable flags and everything is saved into the context's local
//! scope.

mod boxing;
mod primitive;
mod sum;

pub use boxing::{box_struct_fields, box_type};
pub use primitive::parse_simple;

use crate::context::GenCtx;
use crate::error::{AppError, AppResult, ResultExt};
use crate::ir::{
    DefaultValue, Field, FieldSpec, GenericVariant, InlineField, Kind, NilSemantic, PrimitiveType,
    Type, TypeId, TypeKind,
};
use crate::naming::{clean_ref, pascal_non_empty, pascal_special};
use crate::spec::{SchemaArena, SchemaId, SchemaType};
use indexmap::IndexMap;
use primitive::json_type_name;
use std::collections::HashMap;
use tracing::{debug, warn};

/// Lowers `schema` under `name`, boxing the result for `optional`, and
/// saves every produced type into the local scope of `ctx`.
pub fn generate_schema(
    ctx: &mut GenCtx<'_>,
    name: &str,
    schema: Option<SchemaId>,
    optional: bool,
) -> AppResult<TypeId> {
    let mut g = SchemaGen::new(ctx, false);
    let t = g.generate(name, schema, optional)?;
    g.save()?;
    Ok(t)
}

/// Like [`generate_schema`] for a request body, where a missing schema is
/// not implemented.
pub fn generate_request_schema(
    ctx: &mut GenCtx<'_>,
    name: &str,
    schema: Option<SchemaId>,
    optional: bool,
) -> AppResult<TypeId> {
    let mut g = SchemaGen::new(ctx, true);
    let t = g.generate(name, schema, optional)?;
    g.save()?;
    Ok(t)
}

/// Single-member `oneOf` and `[T, null]` unions lower as `T`.
///
/// Returns the schema to lower and whether the value is nullable.
pub fn transform_schema(schemas: &SchemaArena, id: SchemaId) -> (SchemaId, bool) {
    let mut id = id;
    let mut nullable = schemas[id].nullable;
    let s = &schemas[id];
    if s.discriminator.is_none() && s.one_of.len() == 1 {
        id = s.one_of[0];
        nullable |= schemas[id].nullable;
    }

    let s = &schemas[id];
    let is_null = |arm: SchemaId| {
        let a = &schemas[arm];
        a.ty == SchemaType::Null && a.enum_values.is_empty()
    };
    for arms in [&s.one_of, &s.any_of] {
        if let [a, b] = arms.as_slice() {
            match (is_null(*a), is_null(*b)) {
                (true, false) => return (*b, true),
                (false, true) => return (*a, true),
                _ => {}
            }
        }
    }
    (id, nullable)
}

/// Lowering state of one root schema.
pub struct SchemaGen<'c, 'a> {
    ctx: &'c mut GenCtx<'a>,
    side: Vec<TypeId>,
    local_refs: IndexMap<String, TypeId>,
    depth: usize,
    request: bool,
}

impl<'c, 'a> SchemaGen<'c, 'a> {
    /// A lowerer writing into `ctx`. `request` rejects missing schemas.
    pub fn new(ctx: &'c mut GenCtx<'a>, request: bool) -> Self {
        Self {
            ctx,
            side: Vec::new(),
            local_refs: IndexMap::new(),
            depth: 0,
            request,
        }
    }

    /// Lowers and boxes one schema.
    pub fn generate(
        &mut self,
        name: &str,
        schema: Option<SchemaId>,
        optional: bool,
    ) -> AppResult<TypeId> {
        let (t, nullable) = self.lower(name, schema)?;
        box_type(
            self.ctx.arena,
            self.ctx.schemas,
            &mut self.ctx.local,
            t,
            GenericVariant { optional, nullable },
        )
    }

    /// Saves collected types into the local scope, boxing struct fields first.
    pub fn save(self) -> AppResult<()> {
        let SchemaGen {
            ctx,
            side,
            local_refs,
            ..
        } = self;
        for &t in side.iter().chain(local_refs.values()) {
            if ctx.arena[t].is(&[TypeKind::Struct, TypeKind::Map]) {
                box_struct_fields(ctx.arena, ctx.schemas, &mut ctx.local, t)?;
            }
        }
        for t in side {
            ctx.save_type(t)?;
        }
        for (reference, t) in local_refs {
            ctx.save_ref(&reference, t)?;
        }
        Ok(())
    }

    /// Lowers without boxing, returning the type and the effective nullability.
    fn lower(&mut self, name: &str, schema: Option<SchemaId>) -> AppResult<(TypeId, bool)> {
        self.depth += 1;
        let result = self.lower_guarded(name, schema);
        self.depth -= 1;
        result
    }

    fn lower_guarded(&mut self, name: &str, schema: Option<SchemaId>) -> AppResult<(TypeId, bool)> {
        let schemas = self.ctx.schemas;
        let limit = self.ctx.opts.depth_limit;
        if self.depth > limit {
            let err = AppError::DepthExceeded(limit);
            return Err(match schema {
                Some(id) => err.at(&schemas[id].location),
                None => err,
            });
        }
        let Some(id) = schema else {
            return Ok((self.generate2(name, None)?, false));
        };
        let (id, nullable) = transform_schema(schemas, id);
        Ok((self.generate2(name, Some(id))?, nullable))
    }

    /// Registers a freshly built type: shared types go to `local_refs`
    /// (scalars, arrays and any wrapped in a nominal alias), nominal
    /// anonymous types to `side`.
    fn regtype(&mut self, name: &str, id: TypeId) -> TypeId {
        let schemas = self.ctx.schemas;
        let reference = self.ctx.arena[id]
            .schema
            .and_then(|s| schemas[s].xref.clone());
        if let Some(reference) = reference {
            let schema = self.ctx.arena[id].schema;
            let scalar = self.ctx.arena[id].is(&[TypeKind::Primitive, TypeKind::Array, TypeKind::Any]);
            let t = if scalar {
                let alias = Type::new(name, Kind::Alias { to: id }).with_schema(schema);
                self.ctx.alloc(alias)
            } else {
                id
            };
            self.local_refs.insert(reference, t);
            return t;
        }
        if self.ctx.arena[id].is(&[TypeKind::Struct, TypeKind::Map, TypeKind::Enum, TypeKind::Sum]) {
            self.side.push(id);
        }
        id
    }

    fn generate2(&mut self, name: &str, schema: Option<SchemaId>) -> AppResult<TypeId> {
        let schemas = self.ctx.schemas;
        let Some(id) = schema else {
            if self.request {
                return Err(AppError::not_implemented("empty schema in request body"));
            }
            return Ok(self.ctx.alloc(Type::any(None)));
        };
        let s = &schemas[id];
        let mut name = name.to_string();

        if let Some(reference) = &s.xref {
            if let Some(t) = self.ctx.lookup_ref(reference) {
                return Ok(t);
            }
            if let Some(&t) = self.local_refs.get(reference) {
                return Ok(t);
            }
            name = pascal_non_empty(&[&clean_ref(reference)]).at(&s.location)?;
        }

        if let Some(external) = &s.x_type {
            let primitive = parse_simple(s.ty, &s.format).unwrap_or(PrimitiveType::String);
            let mut t = Type::primitive(primitive, Some(id));
            if let Kind::Primitive { external: slot, .. } = &mut t.kind {
                *slot = Some(external.clone());
            }
            let t = self.ctx.alloc(t);
            return Ok(self.regtype(&name, t));
        }

        let mut default = DefaultValue::default();
        if let Some(value) = &s.default {
            let unsupported = if s.ty == SchemaType::Object {
                Some("object defaults")
            } else if s.ty == SchemaType::Array {
                Some("array defaults")
            } else if s.ty == SchemaType::Empty || !s.any_of.is_empty() || !s.one_of.is_empty() {
                Some("complex defaults")
            } else {
                None
            };
            match unsupported {
                Some(feature) => self
                    .ctx
                    .policy
                    .fail(AppError::not_implemented(feature).at(&s.location))?,
                None => {
                    check_default_type(s.ty, s.nullable, value).at(&s.location)?;
                    default = DefaultValue {
                        value: Some(value.clone()),
                        set: true,
                    };
                }
            }
        }

        if s.unique_items {
            let empty_item = s.items.is_none_or(|item| schemas[item].ty == SchemaType::Empty);
            if empty_item {
                return Err(AppError::not_implemented("empty uniqueItems")).at(&s.location);
            }
        }

        if let Some(x_name) = &s.x_name {
            name = x_name.clone();
        } else if name.starts_with(|c: char| c.is_ascii_digit()) {
            name = format!("R{name}");
        }

        let mut inline_sum = None;
        if !s.any_of.is_empty() || !s.one_of.is_empty() {
            let side = s.ty == SchemaType::Object;
            let sum_name = if side { format!("{name}Sum") } else { name.clone() };
            let (arms, field) = if !s.any_of.is_empty() {
                let t = self.any_of(&sum_name, id, side).at(&s.location)?;
                (&s.any_of, ("AnyOf", t))
            } else if s.all_of.is_empty() {
                let t = self.one_of(&sum_name, id, side).at(&s.location)?;
                (&s.one_of, ("OneOf", t))
            } else {
                return Err(AppError::not_implemented("allOf")).at(&s.location);
            };
            if !side {
                return Ok(field.1);
            }
            for &arm in arms {
                let a = &schemas[arm];
                if a.ty != SchemaType::Object {
                    return Err(AppError::General(format!("can't merge object with {:?}", a.ty.to_string())))
                        .at(&a.location);
                }
            }
            inline_sum = Some(field);
        } else if !s.all_of.is_empty() {
            return Err(AppError::not_implemented("allOf")).at(&s.location);
        } else if !s.enum_values.is_empty() {
            match s.ty {
                SchemaType::Object => {
                    return Err(AppError::not_implemented("non-primitive enum")).at(&s.location);
                }
                SchemaType::Array | SchemaType::Empty => {
                    let t = self.ctx.alloc(Type::any(Some(id)));
                    return Ok(self.regtype(&name, t));
                }
                _ => {}
            }
        }

        match s.ty {
            SchemaType::Object => self.object(&name, id, inline_sum),
            SchemaType::Array => self.array(&name, id),
            SchemaType::Empty => {
                debug!(location = %s.location, name = %name, "Type is not defined, using any");
                let t = self.ctx.alloc(Type::any(Some(id)));
                Ok(self.regtype(&name, t))
            }
            _ => {
                let mut t = primitive::primitive(&name, id, s).at(&s.location)?;
                t.default = default;
                t.doc = s.description.clone();
                t.deprecated = s.deprecated;
                self.set_scalar_validators(&mut t, id)?;
                let t = self.ctx.alloc(t);
                Ok(self.regtype(&name, t))
            }
        }
    }

    fn set_scalar_validators(&self, t: &mut Type, id: SchemaId) -> AppResult<()> {
        let s = &self.ctx.schemas[id];
        let ignored = match s.ty {
            SchemaType::String => {
                t.validators.set_string(s).at(&s.location)?;
                let applies = matches!(
                    t.primitive_type(),
                    Some(PrimitiveType::String | PrimitiveType::ByteSlice)
                );
                (t.validators.string.is_set() && !applies).then_some("String")
            }
            SchemaType::Integer => {
                t.validators.set_int(s).at(&s.location)?;
                (t.validators.int.is_set() && !t.is_integer()).then_some("Int")
            }
            SchemaType::Number => {
                t.validators.set_float(s).at(&s.location)?;
                (t.validators.float.is_set() && !t.is_float()).then_some("Float")
            }
            _ => None,
        };
        if let Some(kind) = ignored {
            warn!(
                location = %s.location,
                r#type = %s.ty,
                format = %s.format,
                generated = t.primitive_type().map_or("", PrimitiveType::as_str),
                "{kind} validator cannot be applied to generated type and will be ignored"
            );
        }
        Ok(())
    }

    fn object(
        &mut self,
        name: &str,
        id: SchemaId,
        inline_sum: Option<(&'static str, TypeId)>,
    ) -> AppResult<TypeId> {
        let schemas = self.ctx.schemas;
        let s = &schemas[id];

        let has_props = !s.properties.is_empty();
        let has_additional = s.additional_properties == Some(true);
        let deny_additional = s.additional_properties == Some(false);
        let has_patterns = !s.pattern_properties.is_empty();
        let single_pattern = s.pattern_properties.len() == 1;
        let is_map = !has_props
            && ((!has_additional && single_pattern) || (has_additional && !has_patterns));

        let kind = if is_map {
            Kind::Map {
                item: TypeId::PENDING,
                pattern: None,
                fields: Vec::new(),
                deny_additional,
                allowed_props: Vec::new(),
            }
        } else {
            Kind::Struct {
                fields: Vec::new(),
                tuple: false,
                deny_additional,
            }
        };
        let mut node = Type::new(name, kind).with_schema(Some(id));
        node.doc = s.description.clone();
        node.deprecated = s.deprecated;
        node.validators.set_object(s);
        let node = self.ctx.alloc(node);
        let owner = self.regtype(name, node);

        let mut taken: HashMap<String, String> = HashMap::new();
        let mut fields = Vec::new();
        let mut add_field = |field: Field, origin: String, fields: &mut Vec<Field>| -> AppResult<()> {
            if let Some(existing) = taken.get(&field.name) {
                return Err(AppError::General(format!(
                    "conflict: field {:?} already defined by {existing}",
                    field.name
                )))
                .at(&s.location);
            }
            taken.insert(field.name.clone(), origin);
            fields.push(field);
            Ok(())
        };

        let mut props: Vec<(usize, &crate::spec::Property)> = s.properties.iter().enumerate().collect();
        props.sort_by(|a, b| a.1.name.cmp(&b.1.name));
        for (i, prop) in props {
            let prop_loc = s.location.child("properties").child(&prop.name);
            let type_name = pascal_special(&[name, &prop.name]);
            let (ty, nullable) = self.lower(&type_name, Some(prop.schema)).at(&prop_loc)?;

            let trimmed = prop.name.trim();
            let field_name = match &schemas[prop.schema].x_name {
                Some(x) if schemas[prop.schema].xref.is_none() => x.clone(),
                _ if trimmed.is_empty() => format!("Field{i}"),
                _ => pascal_special(&[trimmed]),
            };
            if field_name.is_empty() {
                return Err(AppError::General(format!("property name: {:?}", prop.name))).at(&prop_loc);
            }

            let default = schemas[prop.schema]
                .default
                .clone()
                .filter(|_| self.ctx.arena[ty].default.set);
            let mut field = Field::new(field_name, ty, prop.name.clone());
            field.spec = Some(FieldSpec {
                name: prop.name.clone(),
                required: prop.required,
                nullable,
                description: prop.description.clone(),
                schema: Some(prop.schema),
                default,
            });
            add_field(field, format!("property {:?}", prop.name), &mut fields)?;
        }

        if has_additional {
            let map = if is_map {
                owner
            } else {
                let map = self
                    .ctx
                    .alloc(Type::new(format!("{name}Additional"), Kind::empty_map()));
                let map = self.regtype(name, map);
                let mut field = Field::new("AdditionalProps", map, "");
                field.inline = InlineField::Additional;
                add_field(field, "additionalProperties".to_string(), &mut fields)?;
                map
            };
            let prefix = self.ctx.arena[map].name.clone();
            let item = self.map_item(&prefix, s.additional_item)?;
            self.set_map(map, item, None);
        }

        if has_patterns {
            if is_map {
                let pp = &s.pattern_properties[0];
                let item = self.map_item(name, Some(pp.schema))?;
                self.set_map(owner, item, Some(pp.pattern.clone()));
            } else {
                for (idx, pp) in s.pattern_properties.iter().enumerate() {
                    let suffix = format!("Pattern{idx}");
                    let map_name = format!("{name}{suffix}");
                    let map = self.ctx.alloc(Type::new(map_name.clone(), Kind::empty_map()));
                    let map = self.regtype(name, map);
                    let item = self.map_item(&map_name, Some(pp.schema))?;
                    self.set_map(map, item, Some(pp.pattern.clone()));

                    let mut field = Field::new(format!("{suffix}Props"), map, "");
                    field.inline = InlineField::Pattern;
                    add_field(field, format!("pattern {:?}", pp.pattern), &mut fields)?;
                }
            }
        }

        if let Some((field_name, sum)) = inline_sum {
            let mut field = Field::new(field_name, sum, "");
            field.inline = InlineField::Sum;
            add_field(field, field_name.to_string(), &mut fields)?;
        }

        if let Some(slot) = self.ctx.arena[node].fields_mut() {
            *slot = fields;
        }
        Ok(owner)
    }

    fn map_item(&mut self, prefix: &str, item: Option<SchemaId>) -> AppResult<TypeId> {
        match item {
            Some(item) => self.generate(&format!("{prefix}Item"), Some(item), false),
            None => Ok(self.ctx.alloc(Type::any(None))),
        }
    }

    fn set_map(&mut self, map: TypeId, new_item: TypeId, new_pattern: Option<String>) {
        if let Kind::Map { item, pattern, .. } = &mut self.ctx.arena[map].kind {
            *item = new_item;
            if new_pattern.is_some() {
                *pattern = new_pattern;
            }
        }
    }

    fn array(&mut self, name: &str, id: SchemaId) -> AppResult<TypeId> {
        let schemas = self.ctx.schemas;
        let s = &schemas[id];

        if !s.prefix_items.is_empty() {
            let node = Type::new(
                name,
                Kind::Struct {
                    fields: Vec::new(),
                    tuple: true,
                    deny_additional: false,
                },
            )
            .with_schema(Some(id));
            let node = self.ctx.alloc(node);
            let owner = self.regtype(name, node);
            let mut fields = Vec::with_capacity(s.prefix_items.len());
            for (i, &item) in s.prefix_items.iter().enumerate() {
                let field_name = schemas[item]
                    .x_name
                    .clone()
                    .unwrap_or_else(|| format!("V{i}"));
                let ty = self
                    .generate(&format!("{name}{field_name}"), Some(item), false)
                    .at(&s.location.child("prefixItems").child(&i.to_string()))?;
                fields.push(Field::new(field_name, ty, ""));
            }
            if let Some(slot) = self.ctx.arena[node].fields_mut() {
                *slot = fields;
            }
            return Ok(owner);
        }

        let mut array = Type::new(
            "",
            Kind::Array {
                item: TypeId::PENDING,
                nil: NilSemantic::Invalid,
            },
        )
        .with_schema(Some(id));
        array.validators.set_array(s);
        let array = self.ctx.alloc(array);
        let ret = self.regtype(name, array);

        let item = match s.items {
            Some(item) => self
                .generate(&format!("{name}Item"), Some(item), false)
                .at(&s.location.child("items"))?,
            None => self.ctx.alloc(Type::any(None)),
        };
        if let Kind::Array { item: slot, .. } = &mut self.ctx.arena[array].kind {
            *slot = item;
        }
        Ok(ret)
    }
}

fn check_default_type(ty: SchemaType, nullable: bool, value: &serde_json::Value) -> AppResult<()> {
    if value.is_null() && nullable {
        return Ok(());
    }
    let ok = match ty {
        SchemaType::Object => value.is_object(),
        SchemaType::Array => value.is_array(),
        SchemaType::Integer => value.is_i64() || value.is_u64(),
        SchemaType::Number => value.is_number(),
        SchemaType::String => value.is_string(),
        SchemaType::Boolean => value.is_boolean(),
        SchemaType::Null => value.is_null(),
        SchemaType::Empty => true,
    };
    if ok {
        return Ok(());
    }
    Err(AppError::General(format!(
        "expected schema type is {:?}, default value is {}",
        ty.to_string(),
        json_type_name(value)
    )))
}

#[cfg(test)]
mod tests;
