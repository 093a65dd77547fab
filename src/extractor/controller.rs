use super::annotation::{accept_media, parse_operation_tag, OperationTag, ParamSpec, ResponseSchema};
use super::{controller_key, HttpMethod, RouteTable};
use crate::ast::{Decl, FuncDecl, Import, SourceFile, TypeExpr};
use crate::error::{Error, Result};
use crate::openapi_builder::{Operation, Parameter, ParameterItems, Response};
use crate::package_resolver::PackageResolver;
use crate::schema_generator::{ModelContext, Schema, SchemaGenerator};
use crate::session::Diagnostics;
use crate::type_resolver::{builtin, convert_literal, param_type_name};
use log::{debug, info};
use serde_json::Value;

const PARAM_LOCATIONS: &[&str] = &["query", "header", "path", "formData", "body"];

/// Swagger primitive names accepted verbatim as `@Param` types
const SWAGGER_TYPES: &[&str] = &["string", "number", "integer", "boolean", "array", "file"];

/// Whether `name` appears as a `:name` placeholder of `route`.
pub fn param_in_path(name: &str, route: &str) -> bool {
    let placeholder = format!(":{}", name);
    route.ends_with(&placeholder) || route.contains(&format!("{}/", placeholder))
}

/// Reads controller packages and turns annotated methods into operations.
pub struct ControllerAnalyzer<'a> {
    pub packages: &'a mut PackageResolver,
    pub schemas: &'a mut SchemaGenerator,
    pub routes: &'a mut RouteTable,
    pub diagnostics: &'a mut Diagnostics,
}

impl<'a> ControllerAnalyzer<'a> {
    /// Expands a package imported by the router file.
    ///
    /// The package is registered under its import alias, or under the name
    /// its sources declare.
    ///
    /// System and framework packages are skipped. A package is expanded
    /// at most once per session.
    ///
    /// # Errors
    ///
    /// [`Error::PackageNotFound`] when the import does not resolve, or a
    /// malformed annotation. Files that fail to parse are skipped with a
    /// warning.
    pub fn analyse_package(&mut self, spec: &Import) -> Result<()> {
        let import = spec.path.as_str();
        if self.packages.is_system_package(import) || PackageResolver::is_framework_package(import) {
            debug!("Skipping non-project package {}", import);
            return Ok(());
        }
        let alias = match &spec.name {
            Some(name) => name.clone(),
            None => self
                .packages
                .real_package_name(import)
                .unwrap_or_else(|| spec.last_segment().to_string()),
        };
        self.routes.imports.insert(alias, import.to_string());

        if self.packages.resolve(import).is_none() {
            return Err(Error::PackageNotFound(import.to_string()));
        }
        if !self.packages.mark_visited(import) {
            return Ok(());
        }

        info!("Analysing controller package {}", import);
        let packages = self
            .packages
            .load(import)
            .ok_or_else(|| Error::PackageNotFound(import.to_string()))?;
        for warning in self.packages.take_skipped() {
            self.diagnostics.record_once(warning);
        }
        for package in &packages {
            for file in &package.files {
                self.analyse_file(file, import)?;
            }
        }
        Ok(())
    }

    fn analyse_file(&mut self, file: &SourceFile, import: &str) -> Result<()> {
        for decl in &file.decls {
            match decl {
                Decl::Func(func) => {
                    let receiver = func.recv.as_ref().map(|recv| &recv.ty);
                    if let Some(TypeExpr::Pointer(inner)) = receiver {
                        if let TypeExpr::Ident(controller) = inner.as_ref() {
                            self.parse_method(file, func, controller, import)?;
                        }
                    }
                }
                Decl::Type { doc, specs } => {
                    for spec in specs {
                        if !matches!(spec.ty, TypeExpr::Struct(_)) {
                            continue;
                        }
                        let text = doc.as_ref().or(spec.doc.as_ref()).map(|d| d.text());
                        if let Some(text) = text.filter(|t| !t.trim().is_empty()) {
                            self.routes.controller_comments.insert(
                                controller_key(import, &spec.name),
                                text.trim_end().to_string(),
                            );
                        }
                    }
                }
                Decl::Const { .. } | Decl::Var { .. } => {}
            }
        }
        Ok(())
    }

    /// Builds the operation documented on one controller method and
    /// stores it in the route table.
    ///
    /// Methods without a doc comment are ignored. The HTTP method defaults
    /// to the method name when it names one (`Get`, `Post`, ...); without
    /// either the method contributes nothing.
    pub fn parse_method(
        &mut self,
        file: &SourceFile,
        func: &FuncDecl,
        controller: &str,
        import: &str,
    ) -> Result<()> {
        let Some(doc) = func.doc.as_ref() else {
            return Ok(());
        };
        let context = format!("{}.{}", controller, func.name);
        let key = controller_key(import, controller);

        let mut route = String::new();
        let mut methods: Vec<HttpMethod> = HttpMethod::parse(&func.name).into_iter().collect();
        let mut descriptions = Vec::new();
        let mut operation = Operation::default();
        let mut unmapped = function_params(func);

        for line in doc.text().lines() {
            let Some(tag) = parse_operation_tag(line, &context)? else {
                continue;
            };
            match tag {
                OperationTag::Router { path, methods: named } => {
                    route = path;
                    methods = named;
                }
                OperationTag::Title(title) => {
                    operation.operation_id = Some(format!("{}.{}", controller, title));
                }
                OperationTag::Description(text) => descriptions.push(text),
                OperationTag::Summary(text) => operation.summary = Some(text),
                OperationTag::Response {
                    code,
                    schema,
                    description,
                } => {
                    let schema = schema.map(|s| self.response_schema(file, &key, &s));
                    operation
                        .responses
                        .insert(code, Response { description, schema });
                }
                OperationTag::Param(spec) => {
                    let declared = unmapped
                        .iter()
                        .position(|(name, _)| *name == spec.func_param)
                        .map(|i| unmapped.remove(i).1);
                    let parameter = self.build_parameter(file, &key, &context, spec, declared);
                    operation.parameters.push(parameter);
                }
                OperationTag::Accept(aliases) => {
                    for alias in aliases {
                        match accept_media(&alias) {
                            Some((mime, produced)) => {
                                operation.consumes.push(mime.to_string());
                                if produced {
                                    operation.produces.push(mime.to_string());
                                }
                            }
                            None => self
                                .diagnostics
                                .warn(format!("[{}] Unknown accept type: {}", context, alias)),
                        }
                    }
                }
                OperationTag::Security(requirement) => operation.security.push(requirement),
                OperationTag::Deprecated(flag) => operation.deprecated = flag,
            }
        }
        if !descriptions.is_empty() {
            operation.description = Some(descriptions.join("\n\n"));
        }
        if methods.is_empty() {
            return Ok(());
        }

        for (name, type_name) in unmapped {
            let mut parameter = Parameter {
                location: if param_in_path(&name, &route) {
                    "path".to_string()
                } else {
                    "query".to_string()
                },
                name,
                ..Default::default()
            };
            self.set_param_type(file, &key, &context, &mut parameter, &type_name);
            operation.parameters.push(parameter);
        }

        debug!("{} documents {} {:?}", context, route, methods);
        let item = self.routes.item_mut(&key, &route);
        for method in methods {
            *item.slot_mut(method) = Some(operation.clone());
        }
        Ok(())
    }

    fn resolve_model(&mut self, file: &SourceFile, key: &str, type_ref: &str) -> String {
        let mut ctx = ModelContext {
            packages: &mut *self.packages,
            diagnostics: &mut *self.diagnostics,
        };
        self.schemas.resolve(&mut ctx, key, file, type_ref)
    }

    fn response_schema(&mut self, file: &SourceFile, key: &str, response: &ResponseSchema) -> Schema {
        let schema = match builtin(&response.type_name) {
            Some(ty) => Schema::builtin(ty),
            None => Schema::reference(&self.resolve_model(file, key, &response.type_name)),
        };
        if response.is_array {
            Schema::array_of(schema)
        } else {
            schema
        }
    }

    fn build_parameter(
        &mut self,
        file: &SourceFile,
        key: &str,
        context: &str,
        spec: ParamSpec,
        declared: Option<String>,
    ) -> Parameter {
        if !PARAM_LOCATIONS.contains(&spec.location.as_str()) {
            self.diagnostics.warn(format!(
                "[{}] Unknown param location: {}. Possible values are `query`, `header`, `path`, `formData` or `body`.",
                context, spec.location
            ));
        }
        let mut parameter = Parameter {
            location: spec.location,
            name: spec.name,
            required: spec.required,
            allow_empty_value: !spec.required,
            description: spec.description,
            ..Default::default()
        };

        if spec.type_name.contains('.') {
            let (type_ref, is_array) = strip_array(&spec.type_name);
            let reference = Schema::reference(&self.resolve_model(file, key, type_ref));
            parameter.schema = Some(if is_array {
                Schema::array_of(reference)
            } else {
                reference
            });
        } else if spec.type_name == "auto" {
            match declared {
                Some(type_name) => {
                    self.set_param_type(file, key, context, &mut parameter, &type_name)
                }
                None => self.diagnostics.warn(format!(
                    "[{}] No function parameter backs auto-typed param {}",
                    context, parameter.name
                )),
            }
        } else {
            self.set_param_type(file, key, context, &mut parameter, &spec.type_name);
        }

        if let Some(raw) = spec.default {
            let type_name = parameter.param_type.clone().unwrap_or_default();
            parameter.default = Some(match convert_literal(&raw, &type_name) {
                Ok(value) => value,
                Err(message) => {
                    self.diagnostics.warn(format!("[{}] {}", context, message));
                    Value::String(raw)
                }
            });
        }
        parameter.enum_values = spec.enum_values.into_iter().map(Value::String).collect();
        parameter
    }

    /// Types a parameter from a scalar or model type name; a leading `[]`
    /// makes it an array.
    fn set_param_type(
        &mut self,
        file: &SourceFile,
        key: &str,
        context: &str,
        parameter: &mut Parameter,
        type_name: &str,
    ) {
        let (type_name, is_array) = strip_array(type_name);
        let (scalar, format) = if SWAGGER_TYPES.contains(&type_name) {
            (type_name.to_string(), None)
        } else if let Some(ty) = builtin(type_name) {
            (
                ty.schema_type.to_string(),
                Some(ty.format.to_string()).filter(|f| !f.is_empty()),
            )
        } else if type_name.is_empty() {
            self.diagnostics.warn(format!(
                "[{}] Cannot determine the type of param {}",
                context, parameter.name
            ));
            return;
        } else {
            let reference = Schema::reference(&self.resolve_model(file, key, type_name));
            parameter.schema = Some(if is_array {
                Schema::array_of(reference)
            } else {
                reference
            });
            return;
        };

        if !is_array {
            parameter.param_type = Some(scalar);
            parameter.format = format;
        } else if parameter.location == "body" {
            parameter.schema = Some(Schema::array_of(Schema {
                schema_type: Some(scalar),
                format,
                ..Default::default()
            }));
        } else {
            parameter.param_type = Some("array".to_string());
            parameter.items = Some(ParameterItems {
                item_type: Some(scalar),
                format,
            });
        }
    }
}

fn strip_array(type_name: &str) -> (&str, bool) {
    match type_name.strip_prefix("[]") {
        Some(inner) => (inner, true),
        None => (type_name, false),
    }
}

/// Named function parameters with their annotation-style type names, in
/// declaration order.
fn function_params(func: &FuncDecl) -> Vec<(String, String)> {
    func.params
        .iter()
        .flat_map(|field| {
            let type_name = param_type_name(&field.ty);
            field
                .names
                .iter()
                .map(move |name| (name.clone(), type_name.clone()))
        })
        .collect()
}
