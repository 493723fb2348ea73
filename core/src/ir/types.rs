#![deny(missing_docs)]

//! # IR Types
//!
//! The node model of the type graph. Nodes live in a
//! [`TypeArena`](crate::ir::TypeArena) and refer to each other by [`TypeId`],
//! so back-references between interfaces and their implementors are plain
//! index sets rather than owning pointers.

use crate::ir::validators::Validators;
use crate::spec::{ParameterIn, ParameterStyle, SchemaId};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeSet;
use std::fmt;

/// Index of a type in the arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct TypeId(pub u32);

impl TypeId {
    /// Slot for a child that is filled in after the parent is registered.
    ///
    /// Parents are registered before their children are lowered so that
    /// recursive references resolve; the placeholder never survives lowering.
    pub const PENDING: TypeId = TypeId(u32::MAX);

    /// Index into the arena vector.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for TypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Scalar type of a primitive or enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    /// UTF-8 string.
    String,
    /// Raw bytes (base64 in JSON).
    ByteSlice,
    /// Boolean.
    Bool,
    /// Platform integer.
    Int,
    /// 8-bit integer.
    Int8,
    /// 16-bit integer.
    Int16,
    /// 32-bit integer.
    Int32,
    /// 64-bit integer.
    Int64,
    /// Platform unsigned integer.
    Uint,
    /// 8-bit unsigned integer.
    Uint8,
    /// 16-bit unsigned integer.
    Uint16,
    /// 32-bit unsigned integer.
    Uint32,
    /// 64-bit unsigned integer.
    Uint64,
    /// Single precision float.
    Float32,
    /// Double precision float.
    Float64,
    /// Date, time or timestamp.
    Time,
    /// Duration.
    Duration,
    /// UUID.
    Uuid,
    /// MAC address.
    Mac,
    /// IP address.
    Ip,
    /// URL.
    Url,
    /// JSON null.
    Null,
}

impl PrimitiveType {
    /// Whether the type is one of the integer kinds.
    pub fn is_integer(self) -> bool {
        use PrimitiveType::*;
        matches!(
            self,
            Int | Int8 | Int16 | Int32 | Int64 | Uint | Uint8 | Uint16 | Uint32 | Uint64
        )
    }

    /// Whether the type is a float.
    pub fn is_float(self) -> bool {
        matches!(self, PrimitiveType::Float32 | PrimitiveType::Float64)
    }

    /// Integer or float.
    pub fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// Name used in type expressions and wrapper name postfixes.
    pub fn as_str(self) -> &'static str {
        use PrimitiveType::*;
        match self {
            String => "string",
            ByteSlice => "bytes",
            Bool => "bool",
            Int => "int",
            Int8 => "int8",
            Int16 => "int16",
            Int32 => "int32",
            Int64 => "int64",
            Uint => "uint",
            Uint8 => "uint8",
            Uint16 => "uint16",
            Uint32 => "uint32",
            Uint64 => "uint64",
            Float32 => "float32",
            Float64 => "float64",
            Time => "time",
            Duration => "duration",
            Uuid => "uuid",
            Mac => "mac",
            Ip => "ip",
            Url => "url",
            Null => "null",
        }
    }
}

impl fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a missing value means for a pointer or array.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NilSemantic {
    /// The value must be present.
    #[default]
    Invalid,
    /// Absent means omitted.
    Optional,
    /// Absent means JSON null.
    Null,
}

impl NilSemantic {
    /// The default, must-be-present semantic.
    pub fn is_invalid(&self) -> bool {
        *self == NilSemantic::Invalid
    }
}

/// Which wrappers a [`Kind::Generic`] provides.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
pub struct GenericVariant {
    /// Value may be omitted.
    pub optional: bool,
    /// Value may be null.
    pub nullable: bool,
}

impl GenericVariant {
    /// At least one flag is set.
    pub fn any(self) -> bool {
        self.optional || self.nullable
    }

    /// Only `optional`.
    pub fn only_optional(self) -> bool {
        self.optional && !self.nullable
    }

    /// Only `nullable`.
    pub fn only_nullable(self) -> bool {
        self.nullable && !self.optional
    }

    /// Both flags.
    pub fn nullable_optional(self) -> bool {
        self.optional && self.nullable
    }

    /// Name prefix of the wrapper (`Opt`, `Nil`, `OptNil`).
    pub fn prefix(self) -> &'static str {
        match (self.optional, self.nullable) {
            (true, true) => "OptNil",
            (true, false) => "Opt",
            (false, true) => "Nil",
            (false, false) => "",
        }
    }
}

/// Encoding capability a type must provide.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Feature {
    /// JSON encoding.
    Json,
    /// URI (parameter/form) encoding.
    Uri,
}

/// Enum member.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumVariant {
    /// Identifier of the member.
    pub name: String,
    /// JSON value.
    pub value: Value,
}

/// Value of a `default` keyword.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DefaultValue {
    /// The value.
    pub value: Option<Value>,
    /// Whether a default was given (`null` is a valid default).
    pub set: bool,
}

/// Discriminator value to arm.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SumMapping {
    /// Tag value.
    pub key: String,
    /// Arm type.
    pub ty: TypeId,
}

/// Unique JSON fields of one sum arm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UniqueArm {
    /// Arm type.
    pub ty: TypeId,
    /// Sorted JSON names of the fields only this arm has.
    pub fields: Vec<String>,
}

/// How a sum type tells its arms apart.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "strategy", rename_all = "camelCase")]
pub enum SumSpec {
    /// An explicit tag property.
    Discriminator {
        /// Tag property name.
        property: String,
        /// Tag values, sorted by key.
        mapping: Vec<SumMapping>,
    },
    /// Arms differ in JSON value type (object, array, string, number, bool, null).
    TypeDiscriminator,
    /// Like [`SumSpec::TypeDiscriminator`], but integer and number arms
    /// coexist and are told apart by inspecting the number token.
    JsonTypeKind,
    /// Arms are told apart by fields only they declare.
    UniqueFields {
        /// Arm without unique fields, chosen when nothing else matches.
        default: Option<TypeId>,
        /// Per-arm unique fields, in arm name order.
        unique: Vec<UniqueArm>,
    },
}

impl SumSpec {
    /// Short strategy name.
    pub fn strategy(&self) -> &'static str {
        match self {
            SumSpec::Discriminator { .. } => "discriminator",
            SumSpec::TypeDiscriminator => "type",
            SumSpec::JsonTypeKind => "json-kind",
            SumSpec::UniqueFields { .. } => "fields",
        }
    }
}

/// Form serialization of a struct field (query objects, form bodies).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FormSpec {
    /// Wire name.
    pub name: String,
    /// Location the value is read from.
    #[serde(rename = "in")]
    pub location_in: ParameterIn,
    /// Serialization style.
    pub style: ParameterStyle,
    /// `explode`
    pub explode: bool,
    /// `required`
    pub required: bool,
    /// Per-part content type (multipart).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content_type: Option<String>,
}

/// Encoding tags of a field.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Tag {
    /// JSON key, empty for none.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub json: String,
    /// Extra struct tags, sorted.
    #[serde(skip_serializing_if = "std::collections::BTreeMap::is_empty")]
    pub extra_tags: std::collections::BTreeMap<String, String>,
    /// Form spec, for URI-encoded fields.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub form: Option<FormSpec>,
}

/// Why a field is flattened into its parent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InlineField {
    /// Regular field.
    #[default]
    None,
    /// `additionalProperties` map.
    Additional,
    /// `patternProperties` map.
    Pattern,
    /// Embedded `oneOf`/`anyOf` sum.
    Sum,
}

/// Schema property a field was lowered from.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldSpec {
    /// JSON property name.
    pub name: String,
    /// Listed in `required`.
    pub required: bool,
    /// Schema (or transformed arm) is nullable.
    pub nullable: bool,
    /// Property description.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
    /// Property schema.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaId>,
    /// Property `default`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
}

/// Struct or map field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    /// Identifier.
    pub name: String,
    /// Field type.
    #[serde(rename = "type")]
    pub ty: TypeId,
    /// Encoding tags.
    pub tag: Tag,
    /// Inline marker.
    pub inline: InlineField,
    /// Originating property.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spec: Option<FieldSpec>,
}

impl Field {
    /// A plain field with a JSON tag.
    pub fn new(name: impl Into<String>, ty: TypeId, json: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty,
            tag: Tag {
                json: json.into(),
                ..Default::default()
            },
            inline: InlineField::None,
            spec: None,
        }
    }

    /// Name used in validation errors (the JSON name when known).
    pub fn validation_name(&self) -> &str {
        match &self.spec {
            Some(spec) => &spec.name,
            None => &self.name,
        }
    }
}

/// Kind tag, for [`Type::is`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TypeKind {
    /// [`Kind::Primitive`]
    Primitive,
    /// [`Kind::Enum`]
    Enum,
    /// [`Kind::Array`]
    Array,
    /// [`Kind::Map`]
    Map,
    /// [`Kind::Struct`]
    Struct,
    /// [`Kind::Alias`]
    Alias,
    /// [`Kind::Pointer`]
    Pointer,
    /// [`Kind::Generic`]
    Generic,
    /// [`Kind::Sum`]
    Sum,
    /// [`Kind::Interface`]
    Interface,
    /// [`Kind::Any`]
    Any,
    /// [`Kind::Stream`]
    Stream,
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TypeKind::Primitive => "primitive",
            TypeKind::Enum => "enum",
            TypeKind::Array => "array",
            TypeKind::Map => "map",
            TypeKind::Struct => "struct",
            TypeKind::Alias => "alias",
            TypeKind::Pointer => "pointer",
            TypeKind::Generic => "generic",
            TypeKind::Sum => "sum",
            TypeKind::Interface => "interface",
            TypeKind::Any => "any",
            TypeKind::Stream => "stream",
        };
        f.write_str(s)
    }
}

/// Shape of a type node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Kind {
    /// Leaf scalar.
    Primitive {
        /// Scalar type.
        primitive: PrimitiveType,
        /// External type named by `x-ogen-type`.
        #[serde(skip_serializing_if = "Option::is_none")]
        external: Option<String>,
        /// Meaning of a nil byte slice.
        #[serde(skip_serializing_if = "NilSemantic::is_invalid")]
        nil: NilSemantic,
    },
    /// Scalar with a closed value set.
    Enum {
        /// Scalar type of the values.
        primitive: PrimitiveType,
        /// Members in document order.
        variants: Vec<EnumVariant>,
    },
    /// Sequence.
    Array {
        /// Element type.
        item: TypeId,
        /// Meaning of a nil array.
        nil: NilSemantic,
    },
    /// String-keyed mapping.
    Map {
        /// Value type.
        item: TypeId,
        /// Key pattern (`patternProperties`).
        #[serde(skip_serializing_if = "Option::is_none")]
        pattern: Option<String>,
        /// Fixed fields of a map with properties.
        fields: Vec<Field>,
        /// `additionalProperties: false`
        deny_additional: bool,
        /// Keys handled elsewhere and excluded from the map.
        allowed_props: Vec<String>,
    },
    /// Product of named fields.
    Struct {
        /// Fields.
        fields: Vec<Field>,
        /// Positional (`prefixItems`) struct.
        tuple: bool,
        /// `additionalProperties: false`
        deny_additional: bool,
    },
    /// Nominal newtype.
    Alias {
        /// Aliased type.
        to: TypeId,
    },
    /// Nullable reference, used to break recursion.
    Pointer {
        /// Pointee.
        to: TypeId,
        /// Meaning of nil.
        nil: NilSemantic,
    },
    /// Optional and/or nullable box.
    Generic {
        /// Payload.
        of: TypeId,
        /// Which wrappers apply.
        variant: GenericVariant,
    },
    /// Tagged union.
    Sum {
        /// Arms.
        of: Vec<TypeId>,
        /// Discrimination strategy.
        spec: SumSpec,
    },
    /// Polymorphic arm type of a request or response.
    Interface {
        /// Method names.
        methods: BTreeSet<String>,
        /// Types implementing the interface.
        implementations: BTreeSet<TypeId>,
    },
    /// Opaque JSON.
    Any,
    /// Raw byte stream.
    Stream,
}

impl Kind {
    /// Tag of the kind.
    pub fn tag(&self) -> TypeKind {
        match self {
            Kind::Primitive { .. } => TypeKind::Primitive,
            Kind::Enum { .. } => TypeKind::Enum,
            Kind::Array { .. } => TypeKind::Array,
            Kind::Map { .. } => TypeKind::Map,
            Kind::Struct { .. } => TypeKind::Struct,
            Kind::Alias { .. } => TypeKind::Alias,
            Kind::Pointer { .. } => TypeKind::Pointer,
            Kind::Generic { .. } => TypeKind::Generic,
            Kind::Sum { .. } => TypeKind::Sum,
            Kind::Interface { .. } => TypeKind::Interface,
            Kind::Any => TypeKind::Any,
            Kind::Stream => TypeKind::Stream,
        }
    }

    /// An empty struct.
    pub fn empty_struct() -> Self {
        Kind::Struct {
            fields: Vec::new(),
            tuple: false,
            deny_additional: false,
        }
    }

    /// An empty map awaiting its item.
    pub fn empty_map() -> Self {
        Kind::Map {
            item: TypeId::PENDING,
            pattern: None,
            fields: Vec::new(),
            deny_additional: false,
            allowed_props: Vec::new(),
        }
    }

    /// An interface without members.
    pub fn empty_interface() -> Self {
        Kind::Interface {
            methods: BTreeSet::new(),
            implementations: BTreeSet::new(),
        }
    }
}

/// A node of the type graph.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Type {
    /// Nominal name; empty for primitives, arrays, pointers and any.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
    /// Documentation from the schema.
    #[serde(skip_serializing_if = "String::is_empty")]
    pub doc: String,
    /// Shape.
    #[serde(flatten)]
    pub kind: Kind,
    /// Schema the type was lowered from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<SchemaId>,
    /// Required encodings.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub features: BTreeSet<Feature>,
    /// Value constraints.
    #[serde(skip_serializing_if = "skip_validators")]
    pub validators: Validators,
    /// Interfaces this type implements.
    #[serde(skip_serializing_if = "BTreeSet::is_empty")]
    pub implements: BTreeSet<TypeId>,
    /// Scalar `default`.
    #[serde(skip_serializing_if = "skip_default")]
    pub default: DefaultValue,
    /// Schema marks the type as deprecated.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub deprecated: bool,
}

fn skip_validators(v: &Validators) -> bool {
    !v.is_set()
}

fn skip_default(v: &DefaultValue) -> bool {
    !v.set
}

impl Type {
    /// A node of the given kind with every adornment empty.
    pub fn new(name: impl Into<String>, kind: Kind) -> Self {
        Self {
            name: name.into(),
            doc: String::new(),
            kind,
            schema: None,
            features: BTreeSet::new(),
            validators: Validators::default(),
            implements: BTreeSet::new(),
            default: DefaultValue::default(),
            deprecated: false,
        }
    }

    /// An unnamed primitive.
    pub fn primitive(primitive: PrimitiveType, schema: Option<SchemaId>) -> Self {
        Self::new(
            "",
            Kind::Primitive {
                primitive,
                external: None,
                nil: NilSemantic::Invalid,
            },
        )
        .with_schema(schema)
    }

    /// Opaque JSON.
    pub fn any(schema: Option<SchemaId>) -> Self {
        Self::new("", Kind::Any).with_schema(schema)
    }

    /// Sets the schema back-reference.
    pub fn with_schema(mut self, schema: Option<SchemaId>) -> Self {
        self.schema = schema;
        self
    }

    /// Kind tag.
    pub fn tag(&self) -> TypeKind {
        self.kind.tag()
    }

    /// Whether the kind is one of `kinds`.
    pub fn is(&self, kinds: &[TypeKind]) -> bool {
        kinds.contains(&self.tag())
    }

    /// Name, if the kind is nominal.
    pub fn has_name(&self) -> Option<&str> {
        use TypeKind::*;
        self.is(&[Struct, Alias, Interface, Enum, Stream, Generic, Map, Sum])
            .then_some(self.name.as_str())
    }

    /// Scalar type of a primitive or enum.
    pub fn primitive_type(&self) -> Option<PrimitiveType> {
        match &self.kind {
            Kind::Primitive { primitive, .. } | Kind::Enum { primitive, .. } => Some(*primitive),
            _ => None,
        }
    }

    /// Primitive or enum of an integer kind.
    pub fn is_integer(&self) -> bool {
        self.primitive_type().is_some_and(PrimitiveType::is_integer)
    }

    /// Primitive or enum of a float kind.
    pub fn is_float(&self) -> bool {
        self.primitive_type().is_some_and(PrimitiveType::is_float)
    }

    /// Integer or float.
    pub fn is_numeric(&self) -> bool {
        self.is_integer() || self.is_float()
    }

    /// A plain `bytes` primitive.
    pub fn is_byte_slice(&self) -> bool {
        matches!(
            self.kind,
            Kind::Primitive {
                primitive: PrimitiveType::ByteSlice,
                ..
            }
        )
    }

    /// Shorthands over [`Type::is`].
    pub fn is_struct(&self) -> bool {
        matches!(self.kind, Kind::Struct { .. })
    }

    /// Map kind.
    pub fn is_map(&self) -> bool {
        matches!(self.kind, Kind::Map { .. })
    }

    /// Array kind.
    pub fn is_array(&self) -> bool {
        matches!(self.kind, Kind::Array { .. })
    }

    /// Sum kind.
    pub fn is_sum(&self) -> bool {
        matches!(self.kind, Kind::Sum { .. })
    }

    /// Generic kind.
    pub fn is_generic(&self) -> bool {
        matches!(self.kind, Kind::Generic { .. })
    }

    /// Interface kind.
    pub fn is_interface(&self) -> bool {
        matches!(self.kind, Kind::Interface { .. })
    }

    /// Any kind.
    pub fn is_any(&self) -> bool {
        matches!(self.kind, Kind::Any)
    }

    /// Stream kind.
    pub fn is_stream(&self) -> bool {
        matches!(self.kind, Kind::Stream)
    }

    /// Struct without fields.
    pub fn is_empty_struct(&self) -> bool {
        matches!(&self.kind, Kind::Struct { fields, .. } if fields.is_empty())
    }

    /// Whether the type may implement interfaces.
    pub fn can_have_methods(&self) -> bool {
        use TypeKind::*;
        !self.is(&[Primitive, Array, Pointer, Any])
    }

    /// Whether the type can be boxed into a [`Kind::Generic`].
    pub fn can_generic(&self) -> bool {
        use TypeKind::*;
        if self.is_empty_struct() {
            return false;
        }
        self.is(&[Primitive, Enum, Struct, Map, Alias, Sum])
    }

    /// Fields of a struct or map.
    pub fn fields(&self) -> &[Field] {
        match &self.kind {
            Kind::Struct { fields, .. } | Kind::Map { fields, .. } => fields,
            _ => &[],
        }
    }

    /// Mutable fields of a struct or map.
    pub fn fields_mut(&mut self) -> Option<&mut Vec<Field>> {
        match &mut self.kind {
            Kind::Struct { fields, .. } | Kind::Map { fields, .. } => Some(fields),
            _ => None,
        }
    }

    /// Fields that are encoded as JSON object keys.
    pub fn json_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields()
            .iter()
            .filter(|f| f.inline == InlineField::None && !f.tag.json.is_empty())
    }

    /// Fields carrying a default.
    pub fn default_fields(&self) -> impl Iterator<Item = &Field> {
        self.fields()
            .iter()
            .filter(|f| f.spec.as_ref().is_some_and(|s| s.default.is_some()))
    }

    /// Whether the type carries `feature`.
    pub fn has_feature(&self, feature: Feature) -> bool {
        self.features.contains(&feature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generic_variant_prefix() {
        let v = GenericVariant {
            optional: true,
            nullable: true,
        };
        assert_eq!(v.prefix(), "OptNil");
        assert!(v.nullable_optional());
        assert_eq!(
            GenericVariant {
                optional: false,
                nullable: true
            }
            .prefix(),
            "Nil"
        );
        assert!(!GenericVariant::default().any());
    }

    #[test]
    fn test_can_generic() {
        let st = Type::new("Pet", Kind::empty_struct());
        assert!(!st.can_generic());
        assert!(Type::primitive(PrimitiveType::String, None).can_generic());
        assert!(!Type::any(None).can_generic());
        assert!(!Type::primitive(PrimitiveType::Int, None).can_have_methods());
    }

    #[test]
    fn test_has_name() {
        let st = Type::new("Pet", Kind::empty_struct());
        assert_eq!(st.has_name(), Some("Pet"));
        assert_eq!(Type::primitive(PrimitiveType::Bool, None).has_name(), None);
    }
}
