//! # Schema Model
//!
//! A resolved JSON Schema as the lowerer sees it. Sub-schemas are stored in a
//! [`SchemaArena`] and referenced by [`SchemaId`].

use crate::spec::Location;
use serde::Serialize;
use serde_json::{Number, Value};
use std::fmt;
use std::ops::Index;

/// Index of a schema in a [`SchemaArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct SchemaId(pub usize);

/// JSON Schema `type` keyword.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    /// No type given.
    #[default]
    Empty,
    /// `object`
    Object,
    /// `array`
    Array,
    /// `string`
    String,
    /// `integer`
    Integer,
    /// `number`
    Number,
    /// `boolean`
    Boolean,
    /// `null`
    Null,
}

impl SchemaType {
    /// Parses the `type` keyword value.
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "object" => Some(SchemaType::Object),
            "array" => Some(SchemaType::Array),
            "string" => Some(SchemaType::String),
            "integer" => Some(SchemaType::Integer),
            "number" => Some(SchemaType::Number),
            "boolean" => Some(SchemaType::Boolean),
            "null" => Some(SchemaType::Null),
            _ => None,
        }
    }

    /// Whether the type is a JSON scalar.
    pub fn is_primitive(self) -> bool {
        matches!(
            self,
            SchemaType::String
                | SchemaType::Integer
                | SchemaType::Number
                | SchemaType::Boolean
                | SchemaType::Null
        )
    }
}

impl fmt::Display for SchemaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SchemaType::Empty => "",
            SchemaType::Object => "object",
            SchemaType::Array => "array",
            SchemaType::String => "string",
            SchemaType::Integer => "integer",
            SchemaType::Number => "number",
            SchemaType::Boolean => "boolean",
            SchemaType::Null => "null",
        };
        f.write_str(s)
    }
}

/// Object property.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Property {
    /// JSON key.
    pub name: String,
    /// Property schema.
    pub schema: SchemaId,
    /// Listed in `required`.
    pub required: bool,
    /// Property description.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// `patternProperties` entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PatternProperty {
    /// Regular expression source.
    pub pattern: String,
    /// Value schema.
    pub schema: SchemaId,
}

/// `discriminator` keyword.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Discriminator {
    /// Tag property name.
    pub property_name: String,
    /// Explicit tag value to `$ref` mapping, in document order.
    pub mapping: Vec<(String, String)>,
}

/// A resolved schema.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Schema {
    /// Original `$ref` this schema was reached through, if shared.
    #[serde(rename = "ref", skip_serializing_if = "Option::is_none")]
    pub xref: Option<String>,
    /// `type`
    #[serde(rename = "type")]
    pub ty: SchemaType,
    /// `format`
    pub format: String,
    /// Schema description.
    pub description: String,
    /// `deprecated`
    pub deprecated: bool,
    /// `nullable` (3.0) or `null` in a type array (3.1).
    pub nullable: bool,

    /// `properties`, in key order.
    pub properties: Vec<Property>,
    /// `additionalProperties` when given as a boolean or schema.
    pub additional_properties: Option<bool>,
    /// `additionalProperties` value schema.
    pub additional_item: Option<SchemaId>,
    /// `patternProperties`
    pub pattern_properties: Vec<PatternProperty>,
    /// `items`
    pub items: Option<SchemaId>,
    /// `prefixItems` (or an `items` array).
    pub prefix_items: Vec<SchemaId>,

    /// `enum`
    pub enum_values: Vec<Value>,
    /// `oneOf`
    pub one_of: Vec<SchemaId>,
    /// `anyOf`
    pub any_of: Vec<SchemaId>,
    /// `allOf`
    pub all_of: Vec<SchemaId>,
    /// `discriminator`
    pub discriminator: Option<Discriminator>,
    /// `default`
    pub default: Option<Value>,

    /// `maximum`
    pub maximum: Option<Number>,
    /// `exclusiveMaximum`
    pub exclusive_maximum: bool,
    /// `minimum`
    pub minimum: Option<Number>,
    /// `exclusiveMinimum`
    pub exclusive_minimum: bool,
    /// `multipleOf`
    pub multiple_of: Option<Number>,
    /// `maxLength`
    pub max_length: Option<u64>,
    /// `minLength`
    pub min_length: Option<u64>,
    /// `pattern`
    pub pattern: Option<String>,
    /// `maxItems`
    pub max_items: Option<u64>,
    /// `minItems`
    pub min_items: Option<u64>,
    /// `uniqueItems`
    pub unique_items: bool,
    /// `maxProperties`
    pub max_properties: Option<u64>,
    /// `minProperties`
    pub min_properties: Option<u64>,

    /// `x-ogen-name`: overrides the generated type name.
    pub x_name: Option<String>,
    /// `x-ogen-type`: external type the emitter should use.
    pub x_type: Option<String>,

    /// Where the schema was defined.
    pub location: Location,
}

impl Schema {
    /// Whether the schema has no constraints at all.
    pub fn is_empty(&self) -> bool {
        self.ty == SchemaType::Empty
            && self.xref.is_none()
            && self.properties.is_empty()
            && self.items.is_none()
            && self.enum_values.is_empty()
            && self.one_of.is_empty()
            && self.any_of.is_empty()
            && self.all_of.is_empty()
    }
}

/// Storage for every schema of a document.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SchemaArena {
    schemas: Vec<Schema>,
}

impl SchemaArena {
    /// Creates an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a schema.
    pub fn alloc(&mut self, schema: Schema) -> SchemaId {
        self.schemas.push(schema);
        SchemaId(self.schemas.len() - 1)
    }

    /// Reserves a slot to be filled by [`SchemaArena::set`].
    pub fn reserve(&mut self) -> SchemaId {
        self.alloc(Schema::default())
    }

    /// Replaces the schema at `id`.
    pub fn set(&mut self, id: SchemaId, schema: Schema) {
        if let Some(slot) = self.schemas.get_mut(id.0) {
            *slot = schema;
        }
    }

    /// Returns the schema at `id`.
    pub fn get(&self, id: SchemaId) -> &Schema {
        &self.schemas[id.0]
    }

    /// Number of schemas.
    pub fn len(&self) -> usize {
        self.schemas.len()
    }

    /// Whether the arena is empty.
    pub fn is_empty(&self) -> bool {
        self.schemas.is_empty()
    }
}

impl Index<SchemaId> for SchemaArena {
    type Output = Schema;

    fn index(&self, id: SchemaId) -> &Schema {
        self.get(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserve_then_set() {
        let mut arena = SchemaArena::new();
        let id = arena.reserve();
        assert_eq!(arena[id].ty, SchemaType::Empty);
        arena.set(
            id,
            Schema {
                ty: SchemaType::String,
                ..Default::default()
            },
        );
        assert_eq!(arena[id].ty, SchemaType::String);
        assert_eq!(arena.len(), 1);
    }

    #[test]
    fn test_schema_type_parse() {
        assert_eq!(SchemaType::parse("integer"), Some(SchemaType::Integer));
        assert_eq!(SchemaType::parse("file"), None);
        assert!(SchemaType::Null.is_primitive());
        assert!(!SchemaType::Array.is_primitive());
    }
}
