use beego_swagger::{
    error::Error,
    extractor::controller_key,
    openapi_builder::Document,
    schema_generator::{ModelState, Schema},
    serializer::{serialize_json, serialize_yaml, write_outputs},
    session::{GeneratorConfig, Session},
};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;

const IMPORT_ROOT: &str = "github.com/acme/bookstore";

const BOOKSTORE: &[(&str, &str)] = &[
    ("routers/router.go", include_str!("fixtures/bookstore/routers/router.go")),
    ("controllers/user.go", include_str!("fixtures/bookstore/controllers/user.go")),
    ("controllers/book.go", include_str!("fixtures/bookstore/controllers/book.go")),
    ("models/user.go", include_str!("fixtures/bookstore/models/user.go")),
    ("models/book.go", include_str!("fixtures/bookstore/models/book.go")),
];

struct TestProject {
    _temp_dir: TempDir,
    config: GeneratorConfig,
}

/// Lays out a GOROOT and a GOPATH holding the project under
/// `src/github.com/acme/bookstore`.
fn create_test_project(files: &[(&str, &str)]) -> TestProject {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let goroot = temp_dir.path().join("goroot");
    let gopath = temp_dir.path().join("gopath");
    let project = gopath.join("src").join(IMPORT_ROOT);

    std::fs::create_dir_all(goroot.join("src/encoding/json")).unwrap();
    for (path, content) in files {
        let file_path = project.join(path);
        if let Some(parent) = file_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(&file_path, content).expect("Failed to write test file");
    }

    let mut config = GeneratorConfig::new(project);
    config.goroot = Some(goroot);
    config.gopaths = vec![gopath];
    TestProject {
        _temp_dir: temp_dir,
        config,
    }
}

fn generate(project: &TestProject) -> (Session, Document) {
    let mut session = Session::new(project.config.clone()).expect("valid environment");
    let document = session.generate().expect("generation succeeds");
    (session, document)
}

fn controller(name: &str) -> String {
    controller_key(&format!("{}/controllers", IMPORT_ROOT), name)
}

#[test]
fn test_bookstore_end_to_end() {
    let project = create_test_project(BOOKSTORE);
    let (session, document) = generate(&project);

    assert_eq!(document.swagger_version, "2.0");
    assert_eq!(document.base_path.as_deref(), Some("/v1"));
    assert_eq!(document.info.title.as_deref(), Some("bookstore API"));
    assert_eq!(document.info.version.as_deref(), Some("1.0.0"));
    assert_eq!(
        document.info.contact.email.as_deref(),
        Some("api@bookstore.example.com")
    );
    assert_eq!(
        document.security_definitions["token"].location.as_deref(),
        Some("header")
    );

    let paths: Vec<_> = document.paths.keys().map(String::as_str).collect();
    assert_eq!(paths, vec!["/book/{id}", "/user/", "/user/{uid}"]);

    // Both methods of the "/" route share one item.
    let root = &document.paths["/user/"];
    let post = root.post.as_ref().unwrap();
    let get_all = root.get.as_ref().unwrap();
    assert_eq!(post.operation_id.as_deref(), Some("UserController.CreateUser"));
    assert_eq!(get_all.operation_id.as_deref(), Some("UserController.GetAll"));
    assert_eq!(post.tags, vec!["user"]);
    assert_eq!(post.consumes, vec!["application/json"]);
    assert_eq!(
        post.parameters[0].schema,
        Some(Schema::reference("models.User"))
    );
    assert_eq!(
        get_all.responses["200"].schema,
        Some(Schema::array_of(Schema::reference("models.User")))
    );

    let tags: Vec<_> = document
        .tags
        .iter()
        .map(|t| (t.name.as_str(), t.description.as_deref()))
        .collect();
    assert_eq!(
        tags,
        vec![
            ("user", Some("Operations about Users")),
            ("book", Some("Operations about books")),
        ]
    );

    assert_eq!(
        session.diagnostics().warnings(),
        &["Cannot find the object: publisher.Publisher".to_string()]
    );
}

#[test]
fn test_path_param_and_unmapped_function_params() {
    let project = create_test_project(BOOKSTORE);
    let (_, document) = generate(&project);

    let get = document.paths["/user/{uid}"].get.as_ref().unwrap();
    assert_eq!(get.security.len(), 1);
    let params = serde_json::to_value(&get.parameters).unwrap();
    assert_eq!(
        params,
        json!([
            {
                "in": "path",
                "name": "uid",
                "description": "The key for staticblock",
                "required": true,
                "type": "integer",
                "format": "int64"
            },
            {
                "in": "query",
                "name": "verbose",
                "type": "boolean"
            }
        ])
    );

    let response = &get.responses["200"];
    assert_eq!(response.schema, Some(Schema::reference("models.User")));
    assert_eq!(get.responses["403"].description, ":uid is empty");
}

#[test]
fn test_model_definitions() {
    let project = create_test_project(BOOKSTORE);
    let (_, document) = generate(&project);

    let names: Vec<_> = document.definitions.keys().map(String::as_str).collect();
    assert_eq!(
        names,
        vec![
            "models.Book",
            "models.Profile",
            "models.Status",
            "models.User",
            "publisher.Publisher",
        ]
    );

    let user = serde_json::to_value(&document.definitions["models.User"]).unwrap();
    assert_eq!(
        user,
        json!({
            "title": "User",
            "type": "object",
            "properties": {
                "id": {"type": "integer", "format": "int64"},
                "name": {"type": "string"},
                "profile": {"$ref": "#/definitions/models.Profile"},
                "status": {"$ref": "#/definitions/models.Status"},
                "tags": {"type": "array", "items": {"type": "string"}}
            }
        })
    );

    let status = serde_json::to_value(&document.definitions["models.Status"]).unwrap();
    assert_eq!(status["type"], "integer");
    assert_eq!(status["enum"], json!(["Active = 1", "Banned = 2"]));
    assert_eq!(status["example"], json!(1));

    let profile = &document.definitions["models.Profile"];
    assert_eq!(profile.required, vec!["email"]);
    assert_eq!(profile.properties["age"].example, Some(json!(30)));

    let publisher = &document.definitions["publisher.Publisher"];
    assert_eq!(publisher.title.as_deref(), Some("Publisher"));
    assert_eq!(publisher.schema_type.as_deref(), Some("object"));
    assert!(publisher.properties.is_empty());
}

#[test]
fn test_last_registered_controller_wins_a_path() {
    let project = create_test_project(BOOKSTORE);
    let (_, document) = generate(&project);

    let get = document.paths["/book/{id}"].get.as_ref().unwrap();
    assert_eq!(get.operation_id.as_deref(), Some("ArchiveController.Archived"));
    assert_eq!(get.tags, vec!["book"]);
    assert!(get.responses.contains_key("410"));
}

#[test]
fn test_models_are_resolved_once_per_controller() {
    let project = create_test_project(BOOKSTORE);
    let (session, _) = generate(&project);
    let schemas = session.schemas();

    // UserController: User, Status, Profile.
    // BookController: Book, User, Publisher, Status, Profile.
    assert_eq!(schemas.resolution_count(), 8);
    for model in ["models.User", "models.Status", "models.Profile"] {
        assert!(matches!(
            schemas.cached(&controller("UserController"), model),
            Some(ModelState::Resolved(_))
        ));
    }
    assert!(schemas
        .cached(&controller("UserController"), "models.Book")
        .is_none());
}

#[test]
fn test_generation_is_idempotent() {
    let project = create_test_project(BOOKSTORE);
    let mut session = Session::new(project.config.clone()).unwrap();
    let first = session.generate().unwrap();
    let second = session.generate().unwrap();
    assert_eq!(first, second);
    assert_eq!(serialize_json(&first).unwrap(), serialize_json(&second).unwrap());
    assert_eq!(session.diagnostics().warnings().len(), 1);
}

#[test]
fn test_outputs_written_under_project() {
    let project = create_test_project(BOOKSTORE);
    let (_, document) = generate(&project);
    let out = project.config.output_path();
    write_outputs(&document, &out).unwrap();

    let json_text = std::fs::read_to_string(out.join("swagger.json")).unwrap();
    assert!(json_text.starts_with("{\n    \"swagger\": \"2.0\","));
    let back: Document = serde_json::from_str(&json_text).unwrap();
    assert_eq!(back, document);

    let yaml_text = std::fs::read_to_string(out.join("swagger.yml")).unwrap();
    assert_eq!(yaml_text, serialize_yaml(&document).unwrap());
}

#[test]
fn test_declared_base_path_anchors_routes() {
    let router = include_str!("fixtures/bookstore/routers/router.go")
        .replace("// @APIVersion 1.0.0", "// @APIVersion 1.0.0\n// @Base /v1/user");
    let mut files: Vec<(&str, &str)> = BOOKSTORE.to_vec();
    files[0] = ("routers/router.go", router.as_str());
    let project = create_test_project(&files);
    let (_, document) = generate(&project);

    assert_eq!(document.base_path.as_deref(), Some("/v1/user"));
    let paths: Vec<_> = document.paths.keys().map(String::as_str).collect();
    assert_eq!(paths, vec!["/", "/{uid}"]);
}

#[test]
fn test_malformed_annotation_aborts_without_output() {
    let broken = include_str!("fixtures/bookstore/controllers/book.go")
        .replace("// @Param\tid\tpath\tint\ttrue\t\"book id\"", "// @Param\tid\tpath");
    let mut files: Vec<(&str, &str)> = BOOKSTORE.to_vec();
    files[2] = ("controllers/book.go", broken.as_str());
    let project = create_test_project(&files);

    let mut session = Session::new(project.config.clone()).unwrap();
    let err = session.generate().unwrap_err();
    assert!(matches!(err, Error::Annotation { ref context, .. } if context == "BookController.Get"));
    assert!(!project.config.output_path().exists());
}

#[test]
fn test_missing_router_file() {
    let project = create_test_project(&BOOKSTORE[1..]);
    let mut session = Session::new(project.config.clone()).unwrap();
    assert!(matches!(session.generate(), Err(Error::EntryFile { .. })));
}

#[test]
fn test_unparsable_controller_file_is_skipped() {
    let generic = r#"package controllers

type Repo[T any] struct {
	Items []T
}

func (r *Repo[T]) First() T {
	return r.Items[0]
}
"#;
    let mut files: Vec<(&str, &str)> = BOOKSTORE.to_vec();
    files.push(("controllers/generic.go", generic));
    files.push(("controllers/legacy.go", "package controllers\n\nfunc (\n"));
    let project = create_test_project(&files);
    let (session, document) = generate(&project);

    let paths: Vec<_> = document.paths.keys().map(String::as_str).collect();
    assert_eq!(paths, vec!["/book/{id}", "/user/", "/user/{uid}"]);
    let skipped: Vec<_> = session
        .diagnostics()
        .warnings()
        .iter()
        .filter(|w| w.starts_with("Skipped file") && w.contains("legacy.go"))
        .collect();
    assert!(!skipped.is_empty());
    assert!(!session
        .diagnostics()
        .warnings()
        .iter()
        .any(|w| w.contains("generic.go")));
}

const FAMILY: &[(&str, &str)] = &[
    ("routers/router.go", include_str!("fixtures/family/routers/router.go")),
    ("controllers/tree.go", include_str!("fixtures/family/controllers/tree.go")),
    ("models/tree.go", include_str!("fixtures/family/models/tree.go")),
];

fn collect_refs(value: &serde_json::Value, refs: &mut Vec<String>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, child) in map {
                match (key.as_str(), child) {
                    ("$ref", serde_json::Value::String(target)) => refs.push(target.clone()),
                    _ => collect_refs(child, refs),
                }
            }
        }
        serde_json::Value::Array(items) => items.iter().for_each(|item| collect_refs(item, refs)),
        _ => {}
    }
}

#[test]
fn test_recursive_models_resolve_once() {
    let project = create_test_project(FAMILY);
    let (session, document) = generate(&project);

    let names: Vec<_> = document.definitions.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["models.Node", "models.Partner", "models.Person"]);
    // Node pulls in Person and Partner; the second operation hits the cache.
    assert_eq!(session.schemas().resolution_count(), 3);

    let mut refs = Vec::new();
    collect_refs(&serde_json::to_value(&document).unwrap(), &mut refs);
    assert!(refs.contains(&"#/definitions/models.Node".to_string()));
    for target in refs {
        let name = target.trim_start_matches("#/definitions/");
        assert!(document.definitions.contains_key(name), "undefined {}", target);
    }

    let node = serde_json::to_value(&document.definitions["models.Node"]).unwrap();
    assert_eq!(
        node["properties"]["children"],
        json!({"type": "array", "items": {"$ref": "#/definitions/models.Node"}})
    );
    assert!(session.diagnostics().warnings().is_empty());
}
