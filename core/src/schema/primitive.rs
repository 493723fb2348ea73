//! # Primitives and Enums
//!
//! `(type, format)` to [`PrimitiveType`] mapping and enum lowering.

use crate::error::{AppError, AppResult, ResultExt};
use crate::ir::{EnumVariant, Kind, PrimitiveType, Type};
use crate::naming::{clean_special, is_special_char, pascal, pascal_special};
use crate::spec::{Schema, SchemaId, SchemaType};
use serde_json::Value;
use std::collections::HashSet;

/// Scalar type of a `(type, format)` pair, falling back to the type's
/// format-less entry for unknown formats.
pub fn parse_simple(ty: SchemaType, format: &str) -> Option<PrimitiveType> {
    use PrimitiveType::*;
    let mapped = match (ty, format) {
        (SchemaType::Integer, "int8") => Int8,
        (SchemaType::Integer, "int16") => Int16,
        (SchemaType::Integer, "int32") => Int32,
        (SchemaType::Integer, "int64") => Int64,
        (SchemaType::Integer, "uint") => Uint,
        (SchemaType::Integer, "uint8") => Uint8,
        (SchemaType::Integer, "uint16") => Uint16,
        (SchemaType::Integer, "uint32") => Uint32,
        (SchemaType::Integer, "uint64") => Uint64,
        (
            SchemaType::Integer | SchemaType::String,
            "unix" | "unix-seconds" | "unix-nano" | "unix-micro" | "unix-milli",
        ) => Time,
        (SchemaType::Integer, _) => Int,

        (SchemaType::Number, "float") => Float32,
        (SchemaType::Number, "double") => Float64,
        (SchemaType::Number, "int32") => Int32,
        (SchemaType::Number, "int64") => Int64,
        (SchemaType::Number, _) => Float64,

        (SchemaType::String, "byte" | "base64") => ByteSlice,
        (SchemaType::String, "date-time" | "date" | "time") => Time,
        (SchemaType::String, "duration") => Duration,
        (SchemaType::String, "uuid") => Uuid,
        (SchemaType::String, "mac") => Mac,
        (SchemaType::String, "ip" | "ipv4" | "ipv6") => Ip,
        (SchemaType::String, "uri") => Url,
        (SchemaType::String, "int") => Int,
        (SchemaType::String, "int8") => Int8,
        (SchemaType::String, "int16") => Int16,
        (SchemaType::String, "int32") => Int32,
        (SchemaType::String, "int64") => Int64,
        (SchemaType::String, "uint") => Uint,
        (SchemaType::String, "uint8") => Uint8,
        (SchemaType::String, "uint16") => Uint16,
        (SchemaType::String, "uint32") => Uint32,
        (SchemaType::String, "uint64") => Uint64,
        (SchemaType::String, "float32") => Float32,
        (SchemaType::String, "float64") => Float64,
        (SchemaType::String, _) => String,

        (SchemaType::Boolean, _) => Bool,
        (SchemaType::Null, _) => Null,
        (SchemaType::Object | SchemaType::Array | SchemaType::Empty, _) => return None,
    };
    Some(mapped)
}

/// Lowers a scalar schema to a primitive or, with `enum` values, an enum.
pub(crate) fn primitive(name: &str, id: SchemaId, schema: &Schema) -> AppResult<Type> {
    let Some(primitive) = parse_simple(schema.ty, &schema.format) else {
        return Err(AppError::General(format!(
            "unexpected schema type {:?} for a primitive",
            schema.ty.to_string()
        )));
    };
    if schema.enum_values.is_empty() {
        return Ok(Type::primitive(primitive, Some(id)));
    }
    enumeration(name, id, primitive, schema)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Naming {
    Pascal,
    PascalSpecial,
    CleanSuffix,
    IndexSuffix,
}

const STRATEGIES: [Naming; 4] = [
    Naming::Pascal,
    Naming::PascalSpecial,
    Naming::CleanSuffix,
    Naming::IndexSuffix,
];

fn value_string(v: &Value) -> String {
    let s = match v {
        Value::String(s) => s.clone(),
        Value::Null => "Null".to_string(),
        other => other.to_string(),
    };
    if s.is_empty() {
        "Empty".to_string()
    } else {
        s
    }
}

fn variant_name(strategy: Naming, name: &str, idx: usize, value: &str) -> String {
    match strategy {
        Naming::Pascal => pascal(&[name, value]),
        Naming::PascalSpecial => pascal_special(&[name, value]),
        Naming::CleanSuffix => format!("{name}_{}", clean_special(&[value])),
        Naming::IndexSuffix => format!("{name}_{idx}"),
    }
}

fn enumeration(
    name: &str,
    id: SchemaId,
    primitive: PrimitiveType,
    schema: &Schema,
) -> AppResult<Type> {
    if !schema.format.is_empty() && !primitive.is_numeric() {
        return Err(AppError::not_implemented("enum format"));
    }
    validate_enum_values(schema)?;

    let values: Vec<String> = schema.enum_values.iter().map(value_string).collect();
    // `-1` and `1` collapse under plain pascal.
    let special_start = values
        .iter()
        .any(|v| v.chars().next().is_some_and(is_special_char));

    let chosen = STRATEGIES.into_iter().find(|&strategy| {
        if strategy == Naming::Pascal && special_start {
            return false;
        }
        let mut taken = HashSet::from([name.to_string()]);
        values.iter().enumerate().all(|(idx, v)| {
            let k = variant_name(strategy, name, idx, v);
            !k.is_empty() && taken.insert(k)
        })
    });
    let Some(strategy) = chosen else {
        return Err(AppError::General(format!(
            "unable to generate variant names for enum {name:?}"
        )));
    };

    let variants = values
        .iter()
        .zip(&schema.enum_values)
        .enumerate()
        .map(|(idx, (v, value))| EnumVariant {
            name: variant_name(strategy, name, idx, v),
            value: value.clone(),
        })
        .collect();
    Ok(Type::new(
        name,
        Kind::Enum {
            primitive,
            variants,
        },
    )
    .with_schema(Some(id)))
}

fn validate_enum_values(schema: &Schema) -> AppResult<()> {
    let expected = match schema.ty {
        SchemaType::Object | SchemaType::Array | SchemaType::Empty => {
            return Err(AppError::not_implemented("non-primitive enum"));
        }
        SchemaType::Integer => "an integer",
        SchemaType::Number => "a number",
        SchemaType::String => "a string",
        SchemaType::Boolean => "a boolean",
        SchemaType::Null => "a null",
    };
    for (idx, value) in schema.enum_values.iter().enumerate() {
        let ok = match schema.ty {
            SchemaType::Integer => value.is_i64() || value.is_u64(),
            SchemaType::Number => value.is_number(),
            SchemaType::String => value.is_string(),
            SchemaType::Boolean => value.is_boolean(),
            _ => value.is_null(),
        };
        if !ok {
            let location = schema.location.child("enum").child(&idx.to_string());
            return Err(AppError::General(format!(
                "enum value should be {expected}, got {}",
                json_type_name(value)
            )))
            .at(&location);
        }
    }
    Ok(())
}

/// JSON type name of a value, for messages.
pub(crate) fn json_type_name(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema(ty: SchemaType, values: Vec<Value>) -> Schema {
        Schema {
            ty,
            enum_values: values,
            ..Default::default()
        }
    }

    fn names(t: &Type) -> Vec<String> {
        match &t.kind {
            Kind::Enum { variants, .. } => variants.iter().map(|v| v.name.clone()).collect(),
            _ => panic!("not an enum"),
        }
    }

    #[test]
    fn test_parse_simple_fallback() {
        assert_eq!(
            parse_simple(SchemaType::String, "uuid"),
            Some(PrimitiveType::Uuid)
        );
        assert_eq!(
            parse_simple(SchemaType::String, "whatever"),
            Some(PrimitiveType::String)
        );
        assert_eq!(
            parse_simple(SchemaType::Integer, "unix-milli"),
            Some(PrimitiveType::Time)
        );
        assert_eq!(
            parse_simple(SchemaType::Number, ""),
            Some(PrimitiveType::Float64)
        );
        assert_eq!(parse_simple(SchemaType::Object, ""), None);
    }

    #[test]
    fn test_enum_pascal_names() {
        let s = schema(SchemaType::String, vec![json!("red"), json!("dark blue")]);
        let t = primitive("Color", SchemaId(0), &s).unwrap();
        assert_eq!(names(&t), vec!["ColorRed", "ColorDarkBlue"]);
    }

    #[test]
    fn test_enum_signed_numbers_skip_pascal() {
        let s = schema(
            SchemaType::Integer,
            vec![json!(1), json!(-2), json!(3), json!(-4)],
        );
        let t = primitive("Level", SchemaId(0), &s).unwrap();
        assert_eq!(names(&t), vec!["Level1", "LevelMinus2", "Level3", "LevelMinus4"]);
    }

    #[test]
    fn test_enum_collisions_fall_through() {
        let s = schema(SchemaType::String, vec![json!("a_b"), json!("a-b"), json!("")]);
        let t = primitive("K", SchemaId(0), &s).unwrap();
        assert_eq!(names(&t), vec!["KAB", "KAMinusB", "KEmpty"]);

        let s = schema(SchemaType::String, vec![json!("x"), json!("X")]);
        let t = primitive("K", SchemaId(0), &s).unwrap();
        assert_eq!(names(&t), vec!["K_x", "K_X"]);
    }

    #[test]
    fn test_enum_value_type_mismatch() {
        let s = schema(SchemaType::Integer, vec![json!(1), json!("two")]);
        let err = primitive("N", SchemaId(0), &s).unwrap_err();
        assert!(err.to_string().contains("should be an integer, got string"));
        assert_eq!(err.location().unwrap().pointer, "/enum/1");
    }

    #[test]
    fn test_enum_format_not_implemented() {
        let mut s = schema(SchemaType::String, vec![json!("a")]);
        s.format = "uuid".into();
        let err = primitive("U", SchemaId(0), &s).unwrap_err();
        assert_eq!(err.skip_name(), Some("enum format"));
    }
}
