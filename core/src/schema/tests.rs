use super::*;
use crate::context::{LowerOptions, SkipPolicy};
use crate::ir::{SumSpec, TypeArena};
use crate::spec::{parse_document, Document, ParseOptions};
use crate::storage::Storage;

fn doc(schemas: &str) -> Document {
    let text = format!(
        "openapi: 3.1.0\ninfo: {{title: t, version: '1'}}\npaths: {{}}\ncomponents:\n  schemas:\n{schemas}"
    );
    parse_document(&text, None, &ParseOptions::default()).unwrap()
}

struct Lowered {
    arena: TypeArena,
    local: Storage,
    result: AppResult<TypeId>,
}

fn lower_with(doc: &Document, name: &str, opts: LowerOptions, ignore: Vec<String>) -> Lowered {
    let mut arena = TypeArena::new();
    let global = Storage::new();
    let mut policy = SkipPolicy::new(ignore, None);
    let id = doc.components.schemas[name];
    let mut ctx = GenCtx::new(&mut arena, &doc.schemas, &global, &mut policy, &opts);
    let result = generate_schema(&mut ctx, name, Some(id), false);
    let local = ctx.into_local();
    Lowered {
        arena,
        local,
        result,
    }
}

fn lower(doc: &Document, name: &str) -> Lowered {
    lower_with(doc, name, LowerOptions::default(), Vec::new())
}

fn field_types(arena: &TypeArena, owner: TypeId) -> Vec<(String, String)> {
    arena[owner]
        .fields()
        .iter()
        .map(|f| (f.name.clone(), arena.type_expr(f.ty)))
        .collect()
}

#[test]
fn test_plain_object() {
    let doc = doc(r#"
    Pet:
      type: object
      required: [name, id]
      properties:
        name: {type: string}
        id: {type: integer, format: int64}
        tag: {type: string}
"#);
    let out = lower(&doc, "Pet");
    let pet = out.result.unwrap();
    assert_eq!(out.arena[pet].name, "Pet");
    assert_eq!(out.local.refs.get("#/components/schemas/Pet"), Some(&pet));
    assert_eq!(
        field_types(&out.arena, pet),
        vec![
            ("ID".to_string(), "int64".to_string()),
            ("Name".to_string(), "string".to_string()),
            ("Tag".to_string(), "OptString".to_string()),
        ]
    );
    assert!(out.local.lookup_type("OptString").is_some());
}

#[test]
fn test_recursive_optional_field_is_pointer() {
    let doc = doc(r#"
    Node:
      type: object
      required: [value]
      properties:
        value: {type: integer}
        next: {$ref: '#/components/schemas/Node'}
"#);
    let out = lower(&doc, "Node");
    let node = out.result.unwrap();
    let next = &out.arena[node].fields()[1];
    assert_eq!(next.name, "Next");
    assert!(matches!(
        out.arena[next.ty].kind,
        Kind::Pointer { to, nil: NilSemantic::Optional } if to == node
    ));
}

#[test]
fn test_required_recursion_fails() {
    let doc = doc(r#"
    Node:
      type: object
      required: [next]
      properties:
        next: {$ref: '#/components/schemas/Node'}
"#);
    let err = lower(&doc, "Node").result.unwrap_err();
    assert!(err.to_string().contains("recursion: Node.Next is required"));
}

#[test]
fn test_null_union_collapses_to_nullable() {
    let doc = doc(r#"
    Box:
      type: object
      required: [label]
      properties:
        label:
          oneOf:
            - type: string
            - type: 'null'
        count:
          type: [integer, 'null']
"#);
    let out = lower(&doc, "Box");
    let owner = out.result.unwrap();
    assert_eq!(
        field_types(&out.arena, owner),
        vec![
            ("Count".to_string(), "OptNilInt".to_string()),
            ("Label".to_string(), "NilString".to_string()),
        ]
    );
}

#[test]
fn test_discriminated_one_of() {
    let doc = doc(r#"
    Cat:
      type: object
      required: [kind]
      properties:
        kind: {type: string}
        lives: {type: integer}
    Dog:
      type: object
      required: [kind]
      properties:
        kind: {type: string}
        bark: {type: boolean}
    Pet:
      oneOf:
        - $ref: '#/components/schemas/Cat'
        - $ref: '#/components/schemas/Dog'
      discriminator:
        propertyName: kind
        mapping:
          dog: '#/components/schemas/Dog'
          cat: '#/components/schemas/Cat'
"#);
    let out = lower(&doc, "Pet");
    let pet = out.result.unwrap();
    let Kind::Sum { of, spec } = &out.arena[pet].kind else {
        panic!("expected a sum");
    };
    let arms: Vec<_> = of.iter().map(|&t| out.arena[t].name.clone()).collect();
    assert_eq!(arms, vec!["Cat", "Dog"]);
    let SumSpec::Discriminator { property, mapping } = spec else {
        panic!("expected an explicit discriminator");
    };
    assert_eq!(property, "kind");
    let keys: Vec<_> = mapping.iter().map(|m| m.key.as_str()).collect();
    assert_eq!(keys, vec!["cat", "dog"]);
    // the tag property belongs to the sum, not the arms
    assert!(out.arena[of[0]].fields().iter().all(|f| f.tag.json != "kind"));
}

#[test]
fn test_scalar_any_of_uses_type_discriminator() {
    let doc = doc(r#"
    Id:
      anyOf:
        - type: string
        - type: integer
"#);
    let out = lower(&doc, "Id");
    let id = out.result.unwrap();
    assert!(matches!(
        out.arena[id].kind,
        Kind::Sum {
            spec: SumSpec::TypeDiscriminator,
            ..
        }
    ));
}

#[test]
fn test_map_from_additional_properties() {
    let doc = doc(r#"
    Labels:
      type: object
      additionalProperties: {type: string}
"#);
    let out = lower(&doc, "Labels");
    let labels = out.result.unwrap();
    let Kind::Map { item, .. } = out.arena[labels].kind else {
        panic!("expected a map");
    };
    assert_eq!(out.arena.type_expr(item), "string");
}

#[test]
fn test_struct_with_additional_properties() {
    let doc = doc(r#"
    Meta:
      type: object
      properties:
        id: {type: string}
      additionalProperties: {type: integer}
"#);
    let out = lower(&doc, "Meta");
    let meta = out.result.unwrap();
    let extra = out.arena[meta]
        .fields()
        .iter()
        .find(|f| f.inline == InlineField::Additional)
        .unwrap();
    assert_eq!(extra.name, "AdditionalProps");
    assert_eq!(out.arena[extra.ty].name, "MetaAdditional");
    assert!(out.local.lookup_type("MetaAdditional").is_some());
}

#[test]
fn test_depth_limit() {
    let doc = doc(r#"
    Deep:
      type: object
      properties:
        a:
          type: object
          properties:
            b:
              type: object
              properties:
                c: {type: string}
"#);
    let opts = LowerOptions {
        depth_limit: 2,
        ..Default::default()
    };
    let err = lower_with(&doc, "Deep", opts, Vec::new()).result.unwrap_err();
    assert!(matches!(err.inner(), AppError::DepthExceeded(2)));
    assert!(err.location().is_some());
}

#[test]
fn test_default_type_mismatch() {
    let doc = doc(r#"
    Limit:
      type: integer
      default: "ten"
"#);
    let err = lower(&doc, "Limit").result.unwrap_err();
    assert!(err
        .to_string()
        .contains(r#"expected schema type is "integer", default value is string"#));
}

#[test]
fn test_default_is_recorded() {
    let doc = doc(r#"
    Limit:
      type: integer
      default: 10
"#);
    let out = lower(&doc, "Limit");
    let limit = out.result.unwrap();
    // a shared primitive is wrapped in a nominal alias
    let Kind::Alias { to } = out.arena[limit].kind else {
        panic!("expected an alias");
    };
    assert_eq!(out.arena[limit].name, "Limit");
    assert!(out.arena[to].default.set);
}

#[test]
fn test_unsupported_features_are_skippable() {
    let doc = doc(r#"
    Combined:
      allOf:
        - type: object
    Tags:
      type: array
      uniqueItems: true
"#);
    let err = lower(&doc, "Combined").result.unwrap_err();
    assert_eq!(err.skip_name(), Some("allOf"));
    let err = lower(&doc, "Tags").result.unwrap_err();
    assert_eq!(err.skip_name(), Some("empty uniqueItems"));
}

#[test]
fn test_ignored_object_default_keeps_type() {
    let doc = doc(r#"
    Settings:
      type: object
      default: {}
      properties:
        on: {type: boolean}
"#);
    let out = lower_with(
        &doc,
        "Settings",
        LowerOptions::default(),
        vec!["object defaults".into()],
    );
    let settings = out.result.unwrap();
    assert_eq!(out.arena[settings].name, "Settings");
}

#[test]
fn test_tuple_from_prefix_items() {
    let doc = doc(r#"
    Point:
      type: array
      prefixItems:
        - type: number
        - type: number
"#);
    let out = lower(&doc, "Point");
    let point = out.result.unwrap();
    assert!(matches!(out.arena[point].kind, Kind::Struct { tuple: true, .. }));
    let names: Vec<_> = out.arena[point].fields().iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["V0", "V1"]);
}
