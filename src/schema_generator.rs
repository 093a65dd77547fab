use crate::ast::{Field, SourceFile, TypeExpr};
use crate::package_resolver::PackageResolver;
use crate::session::Diagnostics;
use crate::type_resolver::{
    analyze_field, builtin, convert_literal, is_builtin, literal_value, qualify, split_qualified,
    struct_tag_get, BuiltinType, FieldAnalysis, FieldShape, TypeIndex,
};
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};

/// Swagger schema object
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// Reference to a definition
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Required property names for object types
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub required: Vec<String>,
    /// The type of the schema (string, integer, object, array, etc.)
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
    /// Items schema for array types
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Schema>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub properties: BTreeMap<String, Property>,
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty", default)]
    pub enum_values: Vec<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    /// Composition of embedded types
    #[serde(rename = "allOf", skip_serializing_if = "Vec::is_empty", default)]
    pub all_of: Vec<Schema>,
    /// Value schema for map types
    #[serde(
        rename = "additionalProperties",
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_properties: Option<Box<Property>>,
}

impl Schema {
    /// A schema that only points at a definition.
    pub fn reference(definition: &str) -> Self {
        Schema {
            reference: Some(definition_ref(definition)),
            ..Default::default()
        }
    }

    pub fn array_of(items: Schema) -> Self {
        Schema {
            schema_type: Some("array".to_string()),
            items: Some(Box::new(items)),
            ..Default::default()
        }
    }

    pub fn builtin(ty: BuiltinType) -> Self {
        Schema {
            schema_type: Some(ty.schema_type.to_string()),
            format: non_empty(ty.format),
            ..Default::default()
        }
    }
}

/// Property of an object schema
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Property {
    /// Reference to a definition
    #[serde(rename = "$ref", skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// The type of the property
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub property_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub example: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// Items for array properties
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<Property>>,
    #[serde(
        rename = "additionalProperties",
        skip_serializing_if = "Option::is_none"
    )]
    pub additional_properties: Option<Box<Property>>,
}

impl Property {
    fn reference(definition: &str) -> Self {
        Property {
            reference: Some(definition_ref(definition)),
            ..Default::default()
        }
    }

    fn builtin(ty: BuiltinType) -> Self {
        Property {
            property_type: Some(ty.schema_type.to_string()),
            format: non_empty(ty.format),
            ..Default::default()
        }
    }
}

/// `#/definitions/<name>`
pub fn definition_ref(name: &str) -> String {
    format!("#/definitions/{}", name)
}

fn non_empty(s: &str) -> Option<String> {
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// Entry of a controller's model cache.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelState {
    /// Claimed before its fields are analysed; lookups that hit it stop
    /// there and only keep the reference
    InProgress,
    Resolved(Schema),
}

/// Mutable collaborators of a resolution.
pub struct ModelContext<'a> {
    pub packages: &'a mut PackageResolver,
    pub diagnostics: &'a mut Diagnostics,
}

/// Type/model resolver.
///
/// Turns type references found in annotations into schema definitions.
/// Each controller has its own model cache; a qualified name is analysed
/// at most once per controller, while the shared definitions table always
/// holds the latest schema for every referenced name.
pub struct SchemaGenerator {
    definitions: BTreeMap<String, Schema>,
    /// controller key -> qualified type name -> state
    models: HashMap<String, HashMap<String, ModelState>>,
    /// Types whose fields are being expanded inline right now
    resolving_stack: HashSet<String>,
    /// Number of structural analyses performed
    resolutions: usize,
}

impl SchemaGenerator {
    pub fn new() -> Self {
        debug!("Initializing SchemaGenerator");
        Self {
            definitions: BTreeMap::new(),
            models: HashMap::new(),
            resolving_stack: HashSet::new(),
            resolutions: 0,
        }
    }

    /// Resolves `type_ref` as referenced from `file` on behalf of
    /// `controller`, together with every type it transitively refers to.
    ///
    /// Returns the qualified definition name; the definitions table holds
    /// an entry for it and for every nested reference afterwards.
    pub fn resolve(
        &mut self,
        ctx: &mut ModelContext<'_>,
        controller: &str,
        file: &SourceFile,
        type_ref: &str,
    ) -> String {
        let qualified = if is_builtin(type_ref) {
            type_ref.to_string()
        } else {
            qualify(&file.package, type_ref)
        };
        let index = ctx.packages.type_index_for(file);
        let mut queue = VecDeque::from([qualified.clone()]);

        while let Some(name) = queue.pop_front() {
            let cache = self.models.entry(controller.to_string()).or_default();
            if cache.contains_key(&name) {
                debug!("Model {} already known to {}", name, controller);
                continue;
            }
            cache.insert(name.clone(), ModelState::InProgress);

            let (_, schema, nested) = self.get_model(&index, ctx.diagnostics, &file.package, &name);
            if let Some(cache) = self.models.get_mut(controller) {
                cache.insert(name, ModelState::Resolved(schema));
            }
            queue.extend(nested);
        }
        qualified
    }

    /// Builds the schema of one type without following nested references.
    ///
    /// Returns the qualified name, the schema and the qualified names of the
    /// types the schema refers to. The schema is also stored in the
    /// definitions table.
    pub fn get_model(
        &mut self,
        index: &TypeIndex,
        diagnostics: &mut Diagnostics,
        default_package: &str,
        type_ref: &str,
    ) -> (String, Schema, Vec<String>) {
        self.resolutions += 1;
        let mut nested = Vec::new();

        let (qualified, schema) = if let Some(ty) = builtin(type_ref) {
            let (_, name) = split_qualified(type_ref, default_package);
            let schema = Schema {
                title: Some(name.to_string()),
                ..Schema::builtin(ty)
            };
            (type_ref.to_string(), schema)
        } else {
            let (package, name) = split_qualified(type_ref, default_package);
            let qualified = format!("{}.{}", package, name);
            let schema = match index.find_type(package, name) {
                Some(found) => {
                    let package = found.package.name.clone();
                    let ty = found.spec.ty.clone();
                    self.resolving_stack.insert(qualified.clone());
                    let schema =
                        self.build_model(index, diagnostics, &package, name, &ty, &mut nested);
                    self.resolving_stack.remove(&qualified);
                    schema
                }
                None => {
                    if !self.definitions.contains_key(&qualified) {
                        diagnostics.warn(format!("Cannot find the object: {}", qualified));
                    }
                    Schema {
                        title: Some(name.to_string()),
                        schema_type: Some("object".to_string()),
                        ..Default::default()
                    }
                }
            };
            (qualified, schema)
        };

        self.definitions.insert(qualified.clone(), schema.clone());
        (qualified, schema, nested)
    }

    fn build_model(
        &mut self,
        index: &TypeIndex,
        diagnostics: &mut Diagnostics,
        package: &str,
        name: &str,
        ty: &TypeExpr,
        nested: &mut Vec<String>,
    ) -> Schema {
        debug!("Building model {}.{}", package, name);
        let title = Some(name.to_string());
        match ty {
            TypeExpr::Struct(fields) => Schema {
                title,
                ..self.parse_struct(index, diagnostics, package, name, fields, nested)
            },
            TypeExpr::Ident(base) | TypeExpr::Selector { name: base, .. } => {
                let base_name = ty.to_string();
                match builtin(&base_name) {
                    Some(builtin) => Schema {
                        title,
                        ..self.parse_enum(index, package, name, builtin)
                    },
                    None => {
                        let target = qualify(package, &base_name);
                        debug!("{}.{} names {} ({})", package, name, target, base);
                        nested.push(target.clone());
                        Schema {
                            title,
                            ..Schema::reference(&target)
                        }
                    }
                }
            }
            TypeExpr::Pointer(inner) => self.build_model(index, diagnostics, package, name, inner, nested),
            TypeExpr::Array { .. } | TypeExpr::Map { .. } => {
                let analysis = analyze_field(ty);
                if analysis.opaque {
                    diagnostics.warn(format!(
                        "Temporary structure is not supported: {}.{}",
                        package, name
                    ));
                }
                let property = property_for(package, &analysis, nested);
                Schema {
                    title,
                    schema_type: property.property_type.clone(),
                    items: property.items.map(|items| Box::new(schema_of(*items))),
                    additional_properties: property.additional_properties,
                    ..Default::default()
                }
            }
            TypeExpr::Interface
            | TypeExpr::Func
            | TypeExpr::Chan(_)
            | TypeExpr::Ellipsis(_) => Schema {
                title,
                schema_type: Some("object".to_string()),
                ..Default::default()
            },
        }
    }

    /// A named scalar; sibling constants of the type become its enum.
    fn parse_enum(
        &self,
        index: &TypeIndex,
        package: &str,
        name: &str,
        ty: BuiltinType,
    ) -> Schema {
        let consts = index.consts_of_type(package, name);
        let enum_values = consts
            .iter()
            .map(|c| Value::String(format!("{} = {}", c.name, c.literal.raw)))
            .collect();
        let example = consts.first().and_then(|c| literal_value(&c.literal));
        Schema {
            enum_values,
            example,
            ..Schema::builtin(ty)
        }
    }

    fn parse_struct(
        &mut self,
        index: &TypeIndex,
        diagnostics: &mut Diagnostics,
        package: &str,
        name: &str,
        fields: &[Field],
        nested: &mut Vec<String>,
    ) -> Schema {
        let mut properties = BTreeMap::new();
        let mut required = Vec::new();
        let mut refs = Vec::new();

        for field in fields {
            if field.is_embedded() {
                self.embed_field(
                    index,
                    diagnostics,
                    package,
                    field,
                    &mut properties,
                    &mut refs,
                    nested,
                );
                continue;
            }

            let analysis = analyze_field(&field.ty);
            if analysis.opaque {
                diagnostics.warn(format!(
                    "Temporary structure is not supported: {}.{}.{}",
                    package, name, field.names[0]
                ));
            }
            let property = property_for(package, &analysis, nested);
            let type_name = match &analysis.shape {
                FieldShape::Builtin { name, .. } => name.clone(),
                FieldShape::Named(named) => qualify(package, named),
                FieldShape::Map(_) => "map".to_string(),
            };
            let is_object = !analysis.is_array && matches!(analysis.shape, FieldShape::Named(_));

            for field_name in &field.names {
                let mut property = property.clone();
                let Some(tag) = &field.tag else {
                    properties.insert(field_name.clone(), property);
                    continue;
                };

                if let Some(doc) = struct_tag_get(tag, "doc") {
                    match doc.find("default(").zip(doc.rfind(')')) {
                        Some((start, end)) if end > start + 8 => {
                            property.default =
                                Some(typed_or_text(&doc[start + 8..end], &type_name, diagnostics));
                        }
                        _ => diagnostics.warn(format!("Invalid default value: {}", doc)),
                    }
                }

                let json = struct_tag_get(tag, "json").unwrap_or_default();
                let first = json.split(',').next().unwrap_or_default();
                if first == "-" || struct_tag_get(tag, "ignore").is_some() {
                    continue;
                }
                let mut key = if first.is_empty() || first == "omitempty" {
                    field_name.clone()
                } else {
                    first.to_string()
                };
                if let Some(thrift) = struct_tag_get(tag, "thrift") {
                    if let Some(renamed) = thrift.split(',').next().filter(|s| !s.is_empty()) {
                        key = renamed.to_string();
                    }
                }
                if struct_tag_get(tag, "required").is_some_and(|r| !r.is_empty()) {
                    required.push(key.clone());
                }
                if let Some(description) = struct_tag_get(tag, "description").filter(|d| !d.is_empty()) {
                    property.description = Some(description);
                }
                if let Some(example) = struct_tag_get(tag, "example").filter(|e| !e.is_empty()) {
                    if !is_object && !analysis.is_array {
                        property.example = Some(typed_or_text(&example, &type_name, diagnostics));
                    }
                }
                properties.insert(key, property);
            }
        }

        let own = Schema {
            properties,
            required,
            ..Default::default()
        };
        if refs.is_empty() {
            Schema {
                schema_type: Some("object".to_string()),
                ..own
            }
        } else {
            refs.push(own);
            Schema {
                schema_type: Some("object".to_string()),
                all_of: refs,
                ..Default::default()
            }
        }
    }

    /// Embedded named types contribute an `allOf` reference and their
    /// fields; a json tag turns the embedding into a plain property.
    /// Pointer embeddings are not followed.
    #[allow(clippy::too_many_arguments)]
    fn embed_field(
        &mut self,
        index: &TypeIndex,
        diagnostics: &mut Diagnostics,
        package: &str,
        field: &Field,
        properties: &mut BTreeMap<String, Property>,
        refs: &mut Vec<Schema>,
        nested: &mut Vec<String>,
    ) {
        let type_name = match &field.ty {
            TypeExpr::Ident(_) | TypeExpr::Selector { .. } => field.ty.to_string(),
            other => {
                debug!("Not expanding embedded field of type {}", other);
                return;
            }
        };
        if is_builtin(&type_name) {
            return;
        }
        let target = qualify(package, &type_name);
        let json = field
            .tag
            .as_deref()
            .and_then(|tag| struct_tag_get(tag, "json"))
            .unwrap_or_default();
        let first = json.split(',').next().unwrap_or_default();
        if first == "-" {
            return;
        }
        nested.push(target.clone());
        if !first.is_empty() {
            properties.insert(first.to_string(), Property::reference(&target));
            return;
        }
        refs.push(Schema::reference(&target));

        if self.resolving_stack.contains(&target) {
            return;
        }
        let (embedded_package, embedded_name) = split_qualified(&target, package);
        let Some(found) = index.find_type(embedded_package, embedded_name) else {
            return;
        };
        let ty = found.spec.ty.clone();
        let found_package = found.package.name.clone();
        self.resolving_stack.insert(target.clone());
        let expanded = self.build_model(
            index,
            diagnostics,
            &found_package,
            embedded_name,
            &ty,
            nested,
        );
        self.resolving_stack.remove(&target);

        let inherited = expanded
            .all_of
            .into_iter()
            .flat_map(|schema| schema.properties)
            .chain(expanded.properties);
        for (key, property) in inherited {
            properties.entry(key).or_insert(property);
        }
    }

    /// Every definition produced so far, keyed by qualified name.
    pub fn definitions(&self) -> &BTreeMap<String, Schema> {
        &self.definitions
    }

    pub fn cached(&self, controller: &str, qualified: &str) -> Option<&ModelState> {
        self.models.get(controller)?.get(qualified)
    }

    pub fn resolution_count(&self) -> usize {
        self.resolutions
    }
}

impl Default for SchemaGenerator {
    fn default() -> Self {
        Self::new()
    }
}

/// Property for an analysed field; named types are queued in `nested`.
fn property_for(package: &str, analysis: &FieldAnalysis, nested: &mut Vec<String>) -> Property {
    let element = shape_property(package, &analysis.shape, nested);
    if analysis.is_array {
        Property {
            property_type: Some("array".to_string()),
            items: Some(Box::new(element)),
            ..Default::default()
        }
    } else {
        element
    }
}

fn shape_property(package: &str, shape: &FieldShape, nested: &mut Vec<String>) -> Property {
    match shape {
        FieldShape::Builtin { builtin, .. } => Property::builtin(*builtin),
        FieldShape::Named(name) => {
            let target = qualify(package, name);
            nested.push(target.clone());
            Property::reference(&target)
        }
        FieldShape::Map(value) => Property {
            property_type: Some("object".to_string()),
            additional_properties: Some(Box::new(shape_property(package, value, nested))),
            ..Default::default()
        },
    }
}

fn schema_of(property: Property) -> Schema {
    Schema {
        reference: property.reference,
        schema_type: property.property_type,
        format: property.format,
        items: property.items.map(|items| Box::new(schema_of(*items))),
        additional_properties: property.additional_properties,
        ..Default::default()
    }
}

fn typed_or_text(raw: &str, type_name: &str, diagnostics: &mut Diagnostics) -> Value {
    convert_literal(raw, type_name).unwrap_or_else(|message| {
        diagnostics.warn(message);
        Value::String(raw.to_string())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Package;
    use crate::parser::AstParser;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::path::PathBuf;
    use std::rc::Rc;

    const MODELS: &str = r#"package models

type Status int

const (
	Active   Status = 1
	Inactive Status = 2
)

type Base struct {
	Id      int64     `json:"id"`
	Created time.Time `json:"created"`
}

type User struct {
	Base
	Name     string            `json:"name,omitempty" required:"true" description:"display name"`
	Password string            `json:"-"`
	Age      int               `json:"age" doc:"default(18)" example:"21"`
	Status   Status            `json:"status"`
	Profile  *Profile          `json:"profile"`
	Tags     []string          `json:"tags"`
	Friends  []*User           `json:"friends"`
	Labels   map[string]string `json:"labels"`
	Extra    map[string]interface{}
	Secret   string `json:"secret" ignore:"true"`
	Nick     string `thrift:"nickname,1"`
	Meta     struct{ A int }
}

type Profile struct {
	Bio string `json:"bio"`
}

type Users []User
"#;

    fn index() -> TypeIndex {
        let file = AstParser::parse_source(&PathBuf::from("models.go"), MODELS).unwrap();
        TypeIndex::new(vec![Rc::new(Package {
            name: "models".to_string(),
            dir: PathBuf::from("models"),
            files: vec![file],
        })])
    }

    fn model(name: &str) -> (Schema, Vec<String>, Diagnostics) {
        let mut generator = SchemaGenerator::new();
        let mut diagnostics = Diagnostics::default();
        let (_, schema, nested) = generator.get_model(&index(), &mut diagnostics, "models", name);
        (schema, nested, diagnostics)
    }

    #[test]
    fn test_enum_from_sibling_constants() {
        let (schema, nested, _) = model("models.Status");
        assert_eq!(schema.schema_type.as_deref(), Some("integer"));
        assert_eq!(schema.format.as_deref(), Some("int64"));
        assert_eq!(schema.enum_values, vec![json!("Active = 1"), json!("Inactive = 2")]);
        assert_eq!(schema.example, Some(json!(1)));
        assert!(nested.is_empty());
    }

    #[test]
    fn test_struct_fields_and_tags() {
        let (schema, nested, diagnostics) = model("models.User");
        assert_eq!(schema.title.as_deref(), Some("User"));
        assert_eq!(schema.all_of.len(), 2);
        assert_eq!(
            schema.all_of[0].reference.as_deref(),
            Some("#/definitions/models.Base")
        );
        let own = &schema.all_of[1];
        let props = &own.properties;

        assert!(props.contains_key("name"));
        assert!(!props.contains_key("Password"));
        assert!(!props.contains_key("secret"));
        assert!(props.contains_key("nickname"));
        assert!(props.contains_key("id"), "embedded fields are inlined");
        assert_eq!(own.required, vec!["name".to_string()]);
        assert_eq!(props["name"].description.as_deref(), Some("display name"));
        assert_eq!(props["age"].default, Some(json!(18)));
        assert_eq!(props["age"].example, Some(json!(21)));
        assert_eq!(
            props["status"].reference.as_deref(),
            Some("#/definitions/models.Status")
        );
        assert_eq!(props["tags"].property_type.as_deref(), Some("array"));
        assert_eq!(
            props["friends"].items.as_ref().unwrap().reference.as_deref(),
            Some("#/definitions/models.User")
        );
        assert_eq!(
            props["labels"]
                .additional_properties
                .as_ref()
                .unwrap()
                .property_type
                .as_deref(),
            Some("string")
        );
        assert_eq!(
            props["Extra"]
                .additional_properties
                .as_ref()
                .unwrap()
                .property_type
                .as_deref(),
            Some("object")
        );
        assert_eq!(props["Meta"].property_type.as_deref(), Some("object"));
        assert!(diagnostics
            .warnings()
            .iter()
            .any(|w| w.contains("Temporary structure")));

        for expected in ["models.Base", "models.Status", "models.Profile", "models.User"] {
            assert!(nested.contains(&expected.to_string()), "missing {}", expected);
        }
    }

    #[test]
    fn test_array_model() {
        let (schema, nested, _) = model("models.Users");
        assert_eq!(schema.schema_type.as_deref(), Some("array"));
        assert_eq!(
            schema.items.unwrap().reference.as_deref(),
            Some("#/definitions/models.User")
        );
        assert_eq!(nested, vec!["models.User".to_string()]);
    }

    #[test]
    fn test_unknown_type_placeholder() {
        let mut generator = SchemaGenerator::new();
        let mut diagnostics = Diagnostics::default();
        let index = index();
        let (name, schema, _) = generator.get_model(&index, &mut diagnostics, "models", "Ghost");
        assert_eq!(name, "models.Ghost");
        assert_eq!(schema.title.as_deref(), Some("Ghost"));
        assert_eq!(schema.schema_type.as_deref(), Some("object"));
        assert_eq!(diagnostics.warnings().len(), 1);

        // Already defined: no second warning
        generator.get_model(&index, &mut diagnostics, "models", "Ghost");
        assert_eq!(diagnostics.warnings().len(), 1);
        assert!(generator.definitions().contains_key("models.Ghost"));
    }

    #[test]
    fn test_builtin_model() {
        let (schema, _, _) = model("time.Time");
        assert_eq!(schema.schema_type.as_deref(), Some("string"));
        assert_eq!(schema.format.as_deref(), Some("datetime"));
        assert_eq!(schema.title.as_deref(), Some("Time"));
    }

    const CYCLIC: &str = r#"package models

type Node struct {
	Name     string `json:"name"`
	Children []Node `json:"children"`
	Parent   *Node  `json:"parent"`
}

type Author struct {
	Books []Book `json:"books"`
}

type Book struct {
	Author *Author `json:"author"`
}
"#;

    fn collect_refs(value: &Value, refs: &mut Vec<String>) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    match (key.as_str(), child) {
                        ("$ref", Value::String(target)) => refs.push(target.clone()),
                        _ => collect_refs(child, refs),
                    }
                }
            }
            Value::Array(items) => items.iter().for_each(|item| collect_refs(item, refs)),
            _ => {}
        }
    }

    #[test]
    fn test_resolve_terminates_on_cycles() {
        let temp = tempfile::TempDir::new().unwrap();
        let env = crate::package_resolver::GoEnvironment::new(
            Some(temp.path().join("goroot")),
            vec![temp.path().join("gopath")],
        )
        .unwrap();
        let mut packages = PackageResolver::new(temp.path().to_path_buf(), env);
        let file = AstParser::parse_source(&PathBuf::from("models.go"), CYCLIC).unwrap();
        packages.set_base_packages(vec![Package {
            name: "models".to_string(),
            dir: PathBuf::from("models"),
            files: vec![file.clone()],
        }]);
        let mut diagnostics = Diagnostics::default();
        let mut ctx = ModelContext {
            packages: &mut packages,
            diagnostics: &mut diagnostics,
        };
        let mut generator = SchemaGenerator::new();

        assert_eq!(generator.resolve(&mut ctx, "c", &file, "Node"), "models.Node");
        assert_eq!(generator.resolution_count(), 1);
        assert_eq!(generator.resolve(&mut ctx, "c", &file, "Author"), "models.Author");
        assert_eq!(generator.resolution_count(), 3);
        generator.resolve(&mut ctx, "c", &file, "Book");
        assert_eq!(generator.resolution_count(), 3);
        // Another controller has its own cache
        generator.resolve(&mut ctx, "other", &file, "Book");
        assert_eq!(generator.resolution_count(), 5);

        for name in ["models.Node", "models.Author", "models.Book"] {
            assert!(matches!(
                generator.cached("c", name),
                Some(ModelState::Resolved(_))
            ));
        }
        let node = &generator.definitions()["models.Node"];
        assert_eq!(
            node.properties["children"].items.as_ref().unwrap().reference.as_deref(),
            Some("#/definitions/models.Node")
        );

        let mut refs = Vec::new();
        collect_refs(&serde_json::to_value(generator.definitions()).unwrap(), &mut refs);
        assert!(!refs.is_empty());
        for target in refs {
            let name = target.trim_start_matches("#/definitions/");
            assert!(generator.definitions().contains_key(name), "undefined {}", target);
        }
        assert!(ctx.diagnostics.warnings().is_empty());
    }

    #[test]
    fn test_schema_serialization_skips_empty() {
        let schema = Schema::array_of(Schema::reference("models.User"));
        assert_eq!(
            serde_json::to_value(&schema).unwrap(),
            json!({"type": "array", "items": {"$ref": "#/definitions/models.User"}})
        );
    }
}
