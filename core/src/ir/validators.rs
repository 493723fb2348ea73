//! # Validators
//!
//! Value constraints attached to a type, populated from schema keywords.

use crate::error::{AppError, AppResult};
use crate::spec::Schema;
use serde::Serialize;
use serde_json::Number;

/// String constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StringValidator {
    /// `pattern` source.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regex: Option<String>,
    /// `minLength`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    /// `maxLength`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    /// `format: email`
    pub email: bool,
    /// `format: hostname`
    pub hostname: bool,
    /// `format: byte`
    pub byte: bool,
}

impl StringValidator {
    /// Whether any rule is set.
    pub fn is_set(&self) -> bool {
        self.regex.is_some()
            || self.min_length.is_some()
            || self.max_length.is_some()
            || self.email
            || self.hostname
            || self.byte
    }
}

/// Integer constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct IntValidator {
    /// `multipleOf`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<u64>,
    /// `maximum`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,
    /// `minimum`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,
    /// `exclusiveMaximum`
    pub max_exclusive: bool,
    /// `exclusiveMinimum`
    pub min_exclusive: bool,
}

impl IntValidator {
    /// Whether any rule is set.
    pub fn is_set(&self) -> bool {
        self.multiple_of.is_some() || self.max.is_some() || self.min.is_some()
    }
}

/// Floating point constraints.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FloatValidator {
    /// `multipleOf` as an exact rational, e.g. `1/100`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub multiple_of: Option<String>,
    /// `maximum`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    /// `minimum`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    /// `exclusiveMaximum`
    pub max_exclusive: bool,
    /// `exclusiveMinimum`
    pub min_exclusive: bool,
}

impl FloatValidator {
    /// Whether any rule is set.
    pub fn is_set(&self) -> bool {
        self.multiple_of.is_some() || self.max.is_some() || self.min.is_some()
    }
}

/// Array constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArrayValidator {
    /// `minItems`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    /// `maxItems`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    /// `uniqueItems`
    pub unique_items: bool,
}

impl ArrayValidator {
    /// Whether any rule is set.
    pub fn is_set(&self) -> bool {
        self.min_length.is_some() || self.max_length.is_some() || self.unique_items
    }
}

/// Object constraints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ObjectValidator {
    /// `minProperties`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_properties: Option<u64>,
    /// `maxProperties`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_properties: Option<u64>,
}

impl ObjectValidator {
    /// Whether any rule is set.
    pub fn is_set(&self) -> bool {
        self.min_properties.is_some() || self.max_properties.is_some()
    }
}

/// All constraints of a type.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Validators {
    /// String rules.
    pub string: StringValidator,
    /// Integer rules.
    pub int: IntValidator,
    /// Float rules.
    pub float: FloatValidator,
    /// Array rules.
    pub array: ArrayValidator,
    /// Object rules.
    pub object: ObjectValidator,
}

impl Validators {
    /// Whether any rule of any kind is set.
    pub fn is_set(&self) -> bool {
        self.string.is_set()
            || self.int.is_set()
            || self.float.is_set()
            || self.array.is_set()
            || self.object.is_set()
    }

    /// Populates string rules.
    pub fn set_string(&mut self, schema: &Schema) -> AppResult<()> {
        if let Some(pattern) = &schema.pattern {
            regex::Regex::new(pattern)?;
            self.string.regex = Some(pattern.clone());
        }
        if let Some(max) = schema.max_length {
            self.string.max_length = Some(max);
        }
        if let Some(min) = schema.min_length {
            self.string.min_length = Some(min);
        }
        match schema.format.as_str() {
            "email" => self.string.email = true,
            "hostname" => self.string.hostname = true,
            "byte" => self.string.byte = true,
            _ => {}
        }
        Ok(())
    }

    /// Populates integer rules.
    pub fn set_int(&mut self, schema: &Schema) -> AppResult<()> {
        if let Some(n) = &schema.multiple_of {
            let value = n
                .as_u64()
                .ok_or_else(|| AppError::General(format!("set multipleOf: {n} is not a positive integer")))?;
            self.int.multiple_of = Some(value);
        }
        let int = |n: &Option<Number>, what: &str| -> AppResult<Option<i64>> {
            match n {
                Some(n) => n
                    .as_i64()
                    .map(Some)
                    .ok_or_else(|| AppError::General(format!("set {what}: {n} is not an integer"))),
                None => Ok(None),
            }
        };
        self.int.max = int(&schema.maximum, "maximum")?;
        self.int.min = int(&schema.minimum, "minimum")?;
        self.int.max_exclusive = schema.exclusive_maximum;
        self.int.min_exclusive = schema.exclusive_minimum;
        Ok(())
    }

    /// Populates float rules.
    pub fn set_float(&mut self, schema: &Schema) -> AppResult<()> {
        if let Some(n) = &schema.multiple_of {
            self.float.multiple_of = Some(rational_string(&n.to_string())?);
        }
        self.float.max = schema.maximum.as_ref().and_then(Number::as_f64);
        self.float.min = schema.minimum.as_ref().and_then(Number::as_f64);
        self.float.max_exclusive = schema.exclusive_maximum;
        self.float.min_exclusive = schema.exclusive_minimum;
        Ok(())
    }

    /// Populates array rules.
    pub fn set_array(&mut self, schema: &Schema) {
        if let Some(max) = schema.max_items {
            self.array.max_length = Some(max);
        }
        if let Some(min) = schema.min_items {
            self.array.min_length = Some(min);
        }
        if schema.unique_items {
            self.array.unique_items = true;
        }
    }

    /// Populates object rules.
    pub fn set_object(&mut self, schema: &Schema) {
        if let Some(max) = schema.max_properties {
            self.object.max_properties = Some(max);
        }
        if let Some(min) = schema.min_properties {
            self.object.min_properties = Some(min);
        }
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Converts a decimal literal (`0.25`, `1e-3`) into a reduced `p/q` string.
///
/// Integers are rendered without a denominator.
pub fn rational_string(literal: &str) -> AppResult<String> {
    let invalid = || AppError::General(format!("parse multipleOf: invalid number {literal:?}"));

    let (negative, body) = match literal.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, literal),
    };
    let (mantissa, exponent) = match body.split_once(['e', 'E']) {
        Some((m, e)) => (m, e.parse::<i32>().map_err(|_| invalid())?),
        None => (body, 0),
    };
    let (int_part, frac_part) = mantissa.split_once('.').unwrap_or((mantissa, ""));
    if int_part.is_empty() && frac_part.is_empty() {
        return Err(invalid());
    }

    let digits = format!("{int_part}{frac_part}");
    let mut numerator: u128 = digits.parse().map_err(|_| invalid())?;
    let scale = exponent - frac_part.len() as i32;
    let mut denominator: u128 = 1;
    let pow = 10u128
        .checked_pow(scale.unsigned_abs())
        .ok_or_else(invalid)?;
    if scale >= 0 {
        numerator = numerator.checked_mul(pow).ok_or_else(invalid)?;
    } else {
        denominator = pow;
    }

    let g = gcd(numerator, denominator).max(1);
    let (p, q) = (numerator / g, denominator / g);
    let sign = if negative && p != 0 { "-" } else { "" };
    Ok(if q == 1 {
        format!("{sign}{p}")
    } else {
        format!("{sign}{p}/{q}")
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spec::SchemaType;

    #[test]
    fn test_rational_string() {
        assert_eq!(rational_string("0.01").unwrap(), "1/100");
        assert_eq!(rational_string("2.5").unwrap(), "5/2");
        assert_eq!(rational_string("3").unwrap(), "3");
        assert_eq!(rational_string("1e-3").unwrap(), "1/1000");
        assert_eq!(rational_string("1.5e2").unwrap(), "150");
        assert!(rational_string("abc").is_err());
    }

    #[test]
    fn test_set_int_rejects_fraction() {
        let schema = Schema {
            ty: SchemaType::Integer,
            maximum: Number::from_f64(1.5),
            ..Default::default()
        };
        let mut v = Validators::default();
        assert!(v.set_int(&schema).is_err());
    }

    #[test]
    fn test_set_string() {
        let schema = Schema {
            ty: SchemaType::String,
            format: "email".into(),
            pattern: Some("^[a-z]+$".into()),
            min_length: Some(1),
            ..Default::default()
        };
        let mut v = Validators::default();
        v.set_string(&schema).unwrap();
        assert!(v.string.email);
        assert_eq!(v.string.regex.as_deref(), Some("^[a-z]+$"));
        assert!(v.is_set());
    }
}
