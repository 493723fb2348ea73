use oasc_core::ir::{Feature, JsonKind, Kind, SumSpec, TypeArena, TypeId};
use oasc_core::passes::ERR_RESP;
use oasc_core::{
    lower_component, parse_document, Config, Generator, GenerateOptions, ParseOptions,
};
use pretty_assertions::assert_eq;
use std::fs;

fn generate(text: &str) -> Generator {
    let parse = ParseOptions::default();
    let doc = parse_document(text, None, &parse).unwrap();
    Generator::new(doc, &parse, GenerateOptions::default()).unwrap()
}

fn components(schemas: &str) -> String {
    format!(
        "openapi: 3.1.0\ninfo: {{title: t, version: '1'}}\npaths: {{}}\ncomponents:\n  schemas:\n{schemas}"
    )
}

fn field_type(arena: &TypeArena, owner: TypeId, field: &str) -> TypeId {
    arena[owner]
        .fields()
        .iter()
        .find(|f| f.name == field)
        .map(|f| f.ty)
        .unwrap()
}

#[test]
fn test_single_member_one_of_unwraps() {
    let text = components(
        r#"
    Box:
      type: object
      required: [v]
      properties:
        v:
          oneOf:
            - type: string
"#,
    );
    let doc = parse_document(&text, None, &ParseOptions::default()).unwrap();
    let (arena, storage, root) = lower_component(&doc, "Box", &ParseOptions::default()).unwrap();

    let v = field_type(&arena, root, "V");
    assert!(matches!(arena[v].kind, Kind::Primitive { .. }));
    assert!(!arena[v].is_sum());
    let names: Vec<&str> = storage.types.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["Box"]);
}

#[test]
fn test_nullable_union_is_generic() {
    let text = components(
        r#"
    N:
      type: object
      required: [v]
      properties:
        v:
          oneOf:
            - type: string
            - type: 'null'
"#,
    );
    let doc = parse_document(&text, None, &ParseOptions::default()).unwrap();
    let (arena, _, root) = lower_component(&doc, "N", &ParseOptions::default()).unwrap();

    let v = field_type(&arena, root, "V");
    assert_eq!(arena[v].name, "NilString");
    let Kind::Generic { of, variant } = &arena[v].kind else {
        panic!("expected a generic, got {:?}", arena[v].tag());
    };
    assert!(variant.nullable);
    assert!(!variant.optional);
    assert_eq!(arena.json_kind(*of), Some(JsonKind::String));
}

#[test]
fn test_duplicate_response_payloads_get_aliases() {
    let g = generate(
        r##"
openapi: 3.0.3
info: {title: t, version: "1"}
paths:
  /foo:
    get:
      operationId: getFoo
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema: {$ref: "#/components/schemas/Foo"}
        "202":
          description: accepted
          content:
            application/json:
              schema: {$ref: "#/components/schemas/Foo"}
components:
  schemas:
    Foo:
      type: object
      properties:
        id: {type: integer}
"##,
    );
    let arena = g.arena();
    let op = &g.operations()[0];
    let iface = op.responses.ty;
    assert_eq!(arena[iface].name, "GetFooRes");

    let ok = op.responses.status_code[&200].contents["application/json"].ty;
    let accepted = op.responses.status_code[&202].contents["application/json"].ty;
    assert_eq!(arena[ok].name, "GetFooApplicationJSONOK");
    assert_eq!(arena[accepted].name, "GetFooApplicationJSONAccepted");

    let foo = g.types()["Foo"];
    assert!(matches!(arena[ok].kind, Kind::Alias { to } if to == foo));
    assert!(!arena[foo].implements.contains(&iface));
    let mut implementations = arena.implementations(iface);
    implementations.sort();
    let mut expected = vec![ok, accepted];
    expected.sort();
    assert_eq!(implementations, expected);
}

#[test]
fn test_router_splits_static_before_param() {
    let g = generate(
        r#"
openapi: 3.0.3
info: {title: t, version: "1"}
paths:
  /a/b:
    get:
      operationId: op1
      responses: {"200": {description: ok}}
  /a/{id}:
    get:
      operationId: op2
      parameters:
        - {name: id, in: path, required: true, schema: {type: string}}
      responses: {"200": {description: ok}}
"#,
    );
    let tree = &g.router().tree;
    assert_eq!(tree.static_children.len(), 1);
    let a = &tree.static_children[0];
    assert_eq!(a.prefix, "/a/");

    let children: Vec<&oasc_core::router::RouteNode> = a.children().collect();
    assert_eq!(children.len(), 2);
    assert!(children[0].is_static());
    assert_eq!(children[0].prefix, "b");
    assert!(children[1].is_param());
    assert_eq!(children[1].param_name, "id");

    let op_name = |node: &oasc_core::router::RouteNode| {
        let route = &node.routes[0];
        (route.method.clone(), g.operations()[route.operation].name.clone())
    };
    assert_eq!(op_name(children[0]), ("GET".to_string(), "Op1".to_string()));
    assert_eq!(op_name(children[1]), ("GET".to_string(), "Op2".to_string()));
}

#[test]
fn test_any_of_by_json_kind() {
    let text = components(
        r#"
    Id:
      anyOf:
        - type: string
        - type: integer
"#,
    );
    let doc = parse_document(&text, None, &ParseOptions::default()).unwrap();
    let (arena, _, root) = lower_component(&doc, "Id", &ParseOptions::default()).unwrap();

    let Kind::Sum { of, spec } = &arena[root].kind else {
        panic!("expected a sum");
    };
    assert_eq!(*spec, SumSpec::TypeDiscriminator);
    assert_eq!(of.len(), 2);
    let number = of
        .iter()
        .copied()
        .find(|&arm| arena.json_kind(arm) == Some(JsonKind::Number))
        .unwrap();
    assert!(arena[number].is_integer());
}

#[test]
fn test_default_error_reduction() {
    let g = generate(
        r##"
openapi: 3.0.3
info: {title: t, version: "1"}
paths:
  /a:
    get:
      operationId: getA
      responses:
        "200": {description: ok}
        default: {$ref: "#/components/responses/Err"}
  /b:
    get:
      operationId: getB
      responses:
        "200": {description: ok}
        default: {$ref: "#/components/responses/Err"}
  /c:
    post:
      operationId: postC
      responses:
        "201": {description: created}
        default: {$ref: "#/components/responses/Err"}
components:
  responses:
    Err:
      description: error
      content:
        application/json:
          schema:
            type: object
            required: [message]
            properties:
              message: {type: string}
"##,
    );
    let err = g.error_type().unwrap();
    let media = &err.contents["application/json"];
    assert_eq!(g.arena()[media.ty].name, ERR_RESP);
    assert!(g.lookup(ERR_RESP).is_some());
    for op in g.operations() {
        assert!(op.responses.default.is_none(), "{} kept its default", op.name);
    }
}

#[test]
fn test_from_file_with_config() {
    let dir = tempfile::tempdir().unwrap();
    let spec = dir.path().join("openapi.yaml");
    let config = dir.path().join("oasc.yaml");
    fs::write(
        &spec,
        r#"
openapi: 3.0.3
info: {title: t, version: "1"}
paths:
  /pets:
    get:
      operationId: listPets
      responses: {"200": {description: ok}}
    post:
      operationId: createPet
      responses: {"201": {description: created}}
  /users:
    get:
      operationId: listUsers
      responses: {"200": {description: ok}}
"#,
    )
    .unwrap();
    fs::write(
        &config,
        "generator:\n  filters:\n    pathRegex: '^/pets'\n    methods: [get]\n",
    )
    .unwrap();

    let g = Generator::from_file(&spec, Config::load(&config).unwrap()).unwrap();
    let names: Vec<&str> = g.operations().iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["ListPets"]);
}

#[test]
fn test_shared_response_wraps_each_media() {
    let g = generate(
        r##"
openapi: 3.0.3
info: {title: t, version: "1"}
paths:
  /a:
    get:
      operationId: getA
      responses:
        "200": {$ref: "#/components/responses/R"}
components:
  responses:
    R:
      description: ok
      headers:
        X-Rate:
          schema: {type: integer}
      content:
        application/json:
          schema:
            type: object
            properties:
              n: {type: integer}
        application/octet-stream:
          schema: {type: string, format: binary}
"##,
    );
    let arena = g.arena();
    let op = &g.operations()[0];
    let resp = &op.responses.status_code[&200];
    assert!(resp.with_headers);

    let wrappers: Vec<TypeId> = resp.contents.values().map(|m| m.ty).collect();
    assert_eq!(wrappers.len(), 2);
    assert_ne!(wrappers[0], wrappers[1]);
    let payloads: Vec<TypeId> = wrappers
        .iter()
        .map(|&w| field_type(arena, w, "Response"))
        .collect();
    assert_ne!(payloads[0], payloads[1]);
    assert!(matches!(arena[payloads[0]].kind, Kind::Struct { .. }));
    assert!(matches!(arena[payloads[1]].kind, Kind::Stream));
}

#[test]
fn test_recursive_defaults_reduce() {
    let g = generate(
        r##"
openapi: 3.0.3
info: {title: t, version: "1"}
paths:
  /a:
    get:
      operationId: getA
      responses:
        "200": {description: ok}
        default:
          description: error
          content:
            application/json:
              schema:
                type: object
                properties:
                  n: {$ref: "#/components/schemas/A"}
  /b:
    get:
      operationId: getB
      responses:
        "200": {description: ok}
        default:
          description: error
          content:
            application/json:
              schema:
                type: object
                properties:
                  n: {$ref: "#/components/schemas/B"}
components:
  schemas:
    A:
      type: object
      properties:
        next: {$ref: "#/components/schemas/A"}
    B:
      type: object
      properties:
        next: {$ref: "#/components/schemas/B"}
"##,
    );
    assert!(g.error_type().is_some());
    for op in g.operations() {
        assert!(op.responses.default.is_none(), "{} kept its default", op.name);
    }
}

#[test]
fn test_skipped_operation_leaves_shared_types_untouched() {
    let text = r##"
openapi: 3.0.3
info: {title: t, version: "1"}
paths:
  /a:
    post:
      operationId: postA
      requestBody:
        required: true
        content:
          application/json:
            schema: {$ref: "#/components/schemas/Pet"}
      responses:
        "204": {description: done}
  /b:
    get:
      operationId: getB
      parameters:
        - name: pet
          in: query
          schema: {$ref: "#/components/schemas/Pet"}
      requestBody:
        required: true
        content:
          application/xml:
            schema: {$ref: "#/components/schemas/Pet"}
      responses:
        "204": {description: done}
components:
  schemas:
    Pet:
      type: object
      properties:
        name: {type: string}
"##;
    let parse = ParseOptions::default();
    let doc = parse_document(text, None, &parse).unwrap();
    let opts = GenerateOptions {
        ignore_not_implemented: vec!["all".into()],
        ..Default::default()
    };
    let g = Generator::new(doc, &parse, opts).unwrap();

    let names: Vec<&str> = g.operations().iter().map(|o| o.name.as_str()).collect();
    assert_eq!(names, vec!["PostA"]);
    let pet = &g.arena()[g.types()["Pet"]];
    assert!(pet.has_feature(Feature::Json));
    assert!(!pet.has_feature(Feature::Uri));
}
