use crate::extractor::HttpMethod;
use crate::schema_generator::Schema;
use log::debug;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// A security requirement: scheme name -> scopes
pub type SecurityRequirement = BTreeMap<String, Vec<String>>;

fn is_false(value: &bool) -> bool {
    !*value
}

/// Complete swagger 2.0 document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "swagger", skip_serializing_if = "String::is_empty", default)]
    pub swagger_version: String,
    pub info: Info,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(rename = "basePath", skip_serializing_if = "Option::is_none")]
    pub base_path: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub schemes: Vec<String>,
    /// Path template -> operations
    pub paths: BTreeMap<String, Item>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub definitions: BTreeMap<String, Schema>,
    #[serde(
        rename = "securityDefinitions",
        skip_serializing_if = "BTreeMap::is_empty",
        default
    )]
    pub security_definitions: BTreeMap<String, SecurityScheme>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub security: Vec<SecurityRequirement>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<Tag>,
}

/// Info block
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Info {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(rename = "termsOfService", skip_serializing_if = "Option::is_none")]
    pub terms_of_service: Option<String>,
    #[serde(skip_serializing_if = "Contact::is_empty", default)]
    pub contact: Contact,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub license: Option<License>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

impl Contact {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.url.is_none() && self.email.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct License {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

/// Operations of one path template, one slot per HTTP method
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Item {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub get: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub put: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub options: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub head: Option<Operation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patch: Option<Operation>,
}

impl Item {
    pub fn slot_mut(&mut self, method: HttpMethod) -> &mut Option<Operation> {
        match method {
            HttpMethod::Get => &mut self.get,
            HttpMethod::Post => &mut self.post,
            HttpMethod::Put => &mut self.put,
            HttpMethod::Delete => &mut self.delete,
            HttpMethod::Patch => &mut self.patch,
            HttpMethod::Options => &mut self.options,
            HttpMethod::Head => &mut self.head,
        }
    }

    pub fn operations_mut(&mut self) -> impl Iterator<Item = &mut Operation> {
        [
            &mut self.get,
            &mut self.put,
            &mut self.post,
            &mut self.delete,
            &mut self.options,
            &mut self.head,
            &mut self.patch,
        ]
        .into_iter()
        .filter_map(Option::as_mut)
    }
}

/// One documented handler
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub tags: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "operationId", skip_serializing_if = "Option::is_none")]
    pub operation_id: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub consumes: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub produces: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub parameters: Vec<Parameter>,
    /// Status code -> response
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub responses: BTreeMap<String, Response>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub security: Vec<SecurityRequirement>,
    #[serde(skip_serializing_if = "is_false", default)]
    pub deprecated: bool,
}

/// Operation parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    /// query, header, path, formData or body
    #[serde(rename = "in")]
    pub location: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "is_false", default)]
    pub required: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub param_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<ParameterItems>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(rename = "enum", skip_serializing_if = "Vec::is_empty", default)]
    pub enum_values: Vec<Value>,
    #[serde(rename = "allowEmptyValue", skip_serializing_if = "is_false", default)]
    pub allow_empty_value: bool,
}

/// Element type of a non-body array parameter
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParameterItems {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Response {
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<Schema>,
}

/// Security scheme declared with `@SecurityDefinition`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityScheme {
    /// basic, apiKey or oauth2
    #[serde(rename = "type")]
    pub scheme_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "in", skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow: Option<String>,
    #[serde(rename = "authorizationUrl", skip_serializing_if = "Option::is_none")]
    pub authorization_url: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty", default)]
    pub scopes: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Tag {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Rewrites router placeholders into swagger templates.
///
/// `:id` and `?:id` segments become `{id}`; inside a braced segment
/// anything from the first `:` or `(` on is cut, so `:id:int` and
/// `:id([0-9]+)` both give `{id}`. Already normalized paths are returned
/// unchanged.
pub fn normalize_path(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            let segment = if let Some(name) = segment.strip_prefix("?:") {
                format!("{{{}}}", name)
            } else if let Some(name) = segment.strip_prefix(':') {
                format!("{{{}}}", name)
            } else {
                segment.to_string()
            };
            if segment.starts_with('{') {
                if let Some(cut) = segment.find(':').or_else(|| segment.find('(')) {
                    return format!("{}}}", &segment[..cut]);
                }
            }
            segment
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Document assembler
///
/// Owns the document while a run is in progress. Routes are written with
/// [`bind`](Self::bind); a template that normalizes to an existing entry
/// replaces it.
pub struct OpenApiBuilder {
    document: Document,
}

impl OpenApiBuilder {
    pub fn new() -> Self {
        debug!("Initializing OpenApiBuilder");
        Self {
            document: Document {
                swagger_version: "2.0".to_string(),
                ..Default::default()
            },
        }
    }

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn document_mut(&mut self) -> &mut Document {
        &mut self.document
    }

    pub fn base_path(&self) -> Option<&str> {
        self.document.base_path.as_deref().filter(|p| !p.is_empty())
    }

    pub fn set_base_path(&mut self, base_path: &str) {
        self.document.base_path = Some(base_path.to_string());
    }

    /// Writes `item` under the normalized `path`, replacing any previous
    /// entry. Every operation of the item is tagged with `tag`.
    pub fn bind(&mut self, path: &str, mut item: Item, tag: &str) {
        for operation in item.operations_mut() {
            operation.tags = vec![tag.to_string()];
        }
        let path = normalize_path(path);
        debug!("Binding path {}", path);
        self.document.paths.insert(path, item);
    }

    /// Declares a tag. The first description given for a name is kept.
    pub fn add_tag(&mut self, name: &str, description: &str) {
        if self.document.tags.iter().any(|tag| tag.name == name) {
            debug!("Tag {} already declared", name);
            return;
        }
        self.document.tags.push(Tag {
            name: name.to_string(),
            description: Some(description.to_string()).filter(|d| !d.is_empty()),
        });
    }

    /// Finishes the document with the given model definitions.
    pub fn build(mut self, definitions: BTreeMap<String, Schema>) -> Document {
        debug!(
            "Building final document: {} path(s), {} definition(s)",
            self.document.paths.len(),
            definitions.len()
        );
        self.document.definitions = definitions;
        self.document
    }
}

impl Default for OpenApiBuilder {
    fn default() -> Self {
        Self::new()
    }
}
