use crate::ast::{Expr, Literal, LitKind, Package, SourceFile, TypeExpr, TypeSpec};
use log::debug;
use serde_json::Value;
use std::rc::Rc;

/// Built-in name standing in for values of unknown shape.
pub const RAW_MESSAGE: &str = "json.RawMessage";

/// Swagger type and format of a built-in Go type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuiltinType {
    pub schema_type: &'static str,
    /// Empty when the type has no format
    pub format: &'static str,
}

const fn builtin_type(schema_type: &'static str, format: &'static str) -> BuiltinType {
    BuiltinType {
        schema_type,
        format,
    }
}

/// Looks up a built-in scalar, including the two standard-library value
/// types the generator knows about.
pub fn builtin(name: &str) -> Option<BuiltinType> {
    let ty = match name {
        "bool" => builtin_type("boolean", ""),
        "uint" | "uint8" | "uint16" | "uint32" | "int8" | "int16" | "int32" => {
            builtin_type("integer", "int32")
        }
        "uint64" | "int" | "int64" | "uintptr" => builtin_type("integer", "int64"),
        "float32" | "complex64" => builtin_type("number", "float"),
        "float64" | "complex128" => builtin_type("number", "double"),
        "string" => builtin_type("string", ""),
        "byte" | "rune" => builtin_type("string", "byte"),
        "time.Time" => builtin_type("string", "datetime"),
        RAW_MESSAGE => builtin_type("object", ""),
        _ => return None,
    };
    Some(ty)
}

pub fn is_builtin(name: &str) -> bool {
    builtin(name).is_some()
}

/// Qualifies a bare type name with `package`; dotted names are kept.
pub fn qualify(package: &str, name: &str) -> String {
    if name.contains('.') {
        name.to_string()
    } else {
        format!("{}.{}", package, name)
    }
}

/// Splits `pkg.Type` into its parts; a bare name gets `default_package`.
pub fn split_qualified<'a>(name: &'a str, default_package: &'a str) -> (&'a str, &'a str) {
    match name.split_once('.') {
        Some((package, rest)) => (package, rest.rsplit('.').next().unwrap_or(rest)),
        None => (default_package, name),
    }
}

/// A type declaration found by [`TypeIndex::find_type`].
pub struct TypeLookup<'a> {
    pub package: &'a Package,
    pub file: &'a SourceFile,
    pub spec: &'a TypeSpec,
}

/// A constant declared with an explicit named type.
#[derive(Debug, Clone)]
pub struct EnumConst {
    pub name: String,
    pub literal: Literal,
}

/// Declaration index over a set of parsed packages.
///
/// Lookups go by package *name* (the package clause), not import path, and
/// the first match in index order wins.
pub struct TypeIndex {
    packages: Vec<Rc<Package>>,
}

impl TypeIndex {
    pub fn new(packages: Vec<Rc<Package>>) -> Self {
        Self { packages }
    }

    pub fn find_package<'a, 'b>(&'a self, name: &'b str) -> impl Iterator<Item = &'a Package> + 'b
    where
        'a: 'b,
    {
        self.packages
            .iter()
            .map(|pkg| pkg.as_ref())
            .filter(move |pkg| pkg.name == name)
    }

    pub fn find_type(&self, package: &str, name: &str) -> Option<TypeLookup<'_>> {
        for pkg in self.find_package(package) {
            for file in &pkg.files {
                if let Some(spec) = file.find_type(name) {
                    debug!("Found type {}.{} in {}", package, name, file.path.display());
                    return Some(TypeLookup {
                        package: pkg,
                        file,
                        spec,
                    });
                }
            }
        }
        None
    }

    /// Constants of `package` declared as `Name TypeName = literal`, in
    /// declaration order. Constants whose type is implied are skipped.
    pub fn consts_of_type(&self, package: &str, type_name: &str) -> Vec<EnumConst> {
        let mut found = Vec::new();
        for (pkg_idx, pkg) in self.find_package(package).enumerate() {
            for (file_idx, file) in pkg.files.iter().enumerate() {
                for spec in file.const_specs() {
                    if !matches!(&spec.ty, Some(TypeExpr::Ident(name)) if name == type_name) {
                        continue;
                    }
                    for (name, value) in spec.names.iter().zip(&spec.values) {
                        match value {
                            Expr::Lit(literal) => found.push((
                                (pkg_idx, file_idx, literal.pos),
                                EnumConst {
                                    name: name.clone(),
                                    literal: literal.clone(),
                                },
                            )),
                            _ => debug!("Skipping non-literal constant {}", name),
                        }
                    }
                }
            }
        }
        found.sort_by_key(|(key, _)| *key);
        found.into_iter().map(|(_, c)| c).collect()
    }
}

/// What a struct field's type boils down to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldShape {
    Builtin { name: String, builtin: BuiltinType },
    /// A declared type, bare (`User`) or qualified (`models.User`)
    Named(String),
    /// A map; the value shape is never itself a map
    Map(Box<FieldShape>),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldAnalysis {
    pub is_array: bool,
    pub shape: FieldShape,
    /// The field had an inline struct, nested slice, func or chan type and
    /// was replaced by an opaque object
    pub opaque: bool,
}

/// Classifies a struct field's type.
pub fn analyze_field(ty: &TypeExpr) -> FieldAnalysis {
    match ty {
        TypeExpr::Array { elem, .. } => {
            let mut analysis = analyze_element(elem);
            if matches!(elem.as_ref(), TypeExpr::Array { .. }) {
                analysis = opaque();
            }
            analysis.is_array = true;
            analysis
        }
        other => analyze_element(other),
    }
}

fn analyze_element(ty: &TypeExpr) -> FieldAnalysis {
    match ty {
        TypeExpr::Pointer(inner) => analyze_element(inner),
        TypeExpr::Ident(_) | TypeExpr::Selector { .. } => FieldAnalysis {
            is_array: false,
            shape: named_or_builtin(&ty.to_string()),
            opaque: false,
        },
        TypeExpr::Map { value, .. } => {
            let value = match value.as_ref() {
                TypeExpr::Pointer(inner) => inner.as_ref(),
                other => other,
            };
            let shape = match value {
                TypeExpr::Ident(_) | TypeExpr::Selector { .. } => {
                    named_or_builtin(&value.to_string())
                }
                _ => raw_message(),
            };
            FieldAnalysis {
                is_array: false,
                shape: FieldShape::Map(Box::new(shape)),
                opaque: false,
            }
        }
        TypeExpr::Interface => FieldAnalysis {
            is_array: false,
            shape: raw_message(),
            opaque: false,
        },
        TypeExpr::Struct(_)
        | TypeExpr::Array { .. }
        | TypeExpr::Func
        | TypeExpr::Chan(_)
        | TypeExpr::Ellipsis(_) => opaque(),
    }
}

fn opaque() -> FieldAnalysis {
    FieldAnalysis {
        is_array: false,
        shape: raw_message(),
        opaque: true,
    }
}

fn raw_message() -> FieldShape {
    named_or_builtin(RAW_MESSAGE)
}

fn named_or_builtin(name: &str) -> FieldShape {
    match builtin(name) {
        Some(builtin) => FieldShape::Builtin {
            name: name.to_string(),
            builtin,
        },
        None => FieldShape::Named(name.to_string()),
    }
}

/// Type name of a function parameter as written in annotations:
/// pointers are dropped, slices keep their `[]` prefix. Shapes that cannot
/// be named yield an empty string.
pub fn param_type_name(ty: &TypeExpr) -> String {
    match ty {
        TypeExpr::Ident(name) => name.clone(),
        TypeExpr::Selector { package, name } => format!("{}.{}", package, name),
        TypeExpr::Pointer(inner) => param_type_name(inner),
        TypeExpr::Array { elem, .. } => {
            let elem = param_type_name(elem);
            if elem.is_empty() {
                elem
            } else {
                format!("[]{}", elem)
            }
        }
        _ => String::new(),
    }
}

/// Reads one key of a Go struct tag (`json:"name,omitempty" doc:"..."`).
///
/// Returns `None` when the key is absent or the tag is malformed before
/// the key is reached.
pub fn struct_tag_get(tag: &str, key: &str) -> Option<String> {
    let mut rest = tag;
    loop {
        rest = rest.trim_start_matches(' ');
        if rest.is_empty() {
            return None;
        }
        let name_end = rest
            .find(|c: char| c <= ' ' || c == ':' || c == '"' || c == '\u{7f}')
            .unwrap_or(rest.len());
        if name_end == 0 || !rest[name_end..].starts_with(":\"") {
            return None;
        }
        let name = &rest[..name_end];
        let value_start = name_end + 2;

        let mut escaped = false;
        let mut value_end = None;
        for (offset, c) in rest[value_start..].char_indices() {
            match c {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => {
                    value_end = Some(value_start + offset);
                    break;
                }
                _ => {}
            }
        }
        let value_end = value_end?;
        if name == key {
            return Some(unescape(&rest[value_start..value_end]));
        }
        rest = &rest[value_end + 1..];
    }
}

fn unescape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => out.push(other),
                None => {}
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Converts a textual value to JSON according to a Go or swagger type
/// name. Types without a conversion keep the text as a string.
///
/// # Errors
///
/// Returns a message when the text does not parse as the requested type.
pub fn convert_literal(raw: &str, type_name: &str) -> std::result::Result<Value, String> {
    let invalid = || format!("Invalid default value type '{}': {}", type_name, raw);
    match type_name {
        "int" | "int64" | "int32" | "int16" | "int8" | "integer" => raw
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| invalid()),
        "uint" | "uint64" | "uint32" | "uint16" | "uint8" => raw
            .parse::<u64>()
            .map(Value::from)
            .map_err(|_| invalid()),
        "bool" | "boolean" => parse_go_bool(raw).map(Value::Bool).ok_or_else(invalid),
        "float64" | "float32" | "number" => raw
            .parse::<f64>()
            .ok()
            .and_then(|f| serde_json::Number::from_f64(f).map(Value::Number))
            .ok_or_else(invalid),
        _ => Ok(Value::String(raw.to_string())),
    }
}

/// Boolean spellings accepted by Go's `strconv.ParseBool`.
pub fn parse_go_bool(raw: &str) -> Option<bool> {
    match raw {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

/// Typed value of a constant literal: integers and floats become numbers,
/// anything else its unquoted text.
pub fn literal_value(literal: &Literal) -> Option<Value> {
    match literal.kind {
        LitKind::Int => literal.raw.parse::<i64>().ok().map(Value::from),
        LitKind::Float => literal
            .raw
            .parse::<f64>()
            .ok()
            .and_then(serde_json::Number::from_f64)
            .map(Value::Number),
        LitKind::String | LitKind::Char | LitKind::Imag => Some(Value::String(literal.unquoted())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::AstParser;
    use std::path::PathBuf;

    fn package(name: &str, sources: &[&str]) -> Rc<Package> {
        let files = sources
            .iter()
            .enumerate()
            .map(|(i, src)| {
                AstParser::parse_source(&PathBuf::from(format!("{}_{}.go", name, i)), src)
                    .unwrap()
            })
            .collect();
        Rc::new(Package {
            name: name.to_string(),
            dir: PathBuf::from(name),
            files,
        })
    }

    #[test]
    fn test_builtin_table() {
        assert_eq!(builtin("int"), Some(builtin_type("integer", "int64")));
        assert_eq!(builtin("uint8"), Some(builtin_type("integer", "int32")));
        assert_eq!(builtin("rune"), Some(builtin_type("string", "byte")));
        assert_eq!(builtin("time.Time"), Some(builtin_type("string", "datetime")));
        assert_eq!(builtin(RAW_MESSAGE), Some(builtin_type("object", "")));
        assert_eq!(builtin("User"), None);
    }

    #[test]
    fn test_find_type_and_package() {
        let index = TypeIndex::new(vec![
            package("models", &["package models\ntype User struct{}\n"]),
            package("other", &["package other\ntype User int\n"]),
        ]);
        let found = index.find_type("models", "User").unwrap();
        assert_eq!(found.package.name, "models");
        assert!(matches!(found.spec.ty, TypeExpr::Struct(_)));
        assert!(index.find_type("models", "Missing").is_none());
        assert_eq!(index.find_package("other").count(), 1);
    }

    #[test]
    fn test_consts_of_type_in_declaration_order() {
        let index = TypeIndex::new(vec![package(
            "models",
            &[
                "package models\ntype Status int\nconst (\n\tActive Status = 1\n\tInactive Status = 2\n\tImplied = 3\n\tComputed Status = 1 << 2\n)\n",
                "package models\nconst Archived Status = 9\n",
            ],
        )]);
        let consts = index.consts_of_type("models", "Status");
        let names: Vec<&str> = consts.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Active", "Inactive", "Archived"]);
        assert_eq!(consts[0].literal.raw, "1");
    }

    #[test]
    fn test_analyze_field_shapes() {
        let parsed = AstParser::parse_source(
            &PathBuf::from("m.go"),
            "package m\ntype T struct {\n\tA []string\n\tB *Profile\n\tC map[string]*base.Item\n\tD interface{}\n\tE struct{ X int }\n\tF []*Tag\n\tG time.Time\n}\n",
        )
        .unwrap();
        let fields = match &parsed.find_type("T").unwrap().ty {
            TypeExpr::Struct(fields) => fields.clone(),
            _ => unreachable!(),
        };
        let a = analyze_field(&fields[0].ty);
        assert!(a.is_array);
        assert!(matches!(a.shape, FieldShape::Builtin { ref name, .. } if name == "string"));
        assert_eq!(analyze_field(&fields[1].ty).shape, FieldShape::Named("Profile".into()));
        assert_eq!(
            analyze_field(&fields[2].ty).shape,
            FieldShape::Map(Box::new(FieldShape::Named("base.Item".into())))
        );
        let d = analyze_field(&fields[3].ty);
        assert!(!d.opaque);
        assert!(matches!(d.shape, FieldShape::Builtin { ref name, .. } if name == RAW_MESSAGE));
        assert!(analyze_field(&fields[4].ty).opaque);
        let f = analyze_field(&fields[5].ty);
        assert!(f.is_array);
        assert_eq!(f.shape, FieldShape::Named("Tag".into()));
        assert!(matches!(
            analyze_field(&fields[6].ty).shape,
            FieldShape::Builtin { builtin, .. } if builtin.format == "datetime"
        ));
    }

    #[test]
    fn test_struct_tag_get() {
        let tag = r#"json:"name,omitempty" description:"the \"display\" name" doc:"default(bob)""#;
        assert_eq!(struct_tag_get(tag, "json").as_deref(), Some("name,omitempty"));
        assert_eq!(
            struct_tag_get(tag, "description").as_deref(),
            Some("the \"display\" name")
        );
        assert_eq!(struct_tag_get(tag, "doc").as_deref(), Some("default(bob)"));
        assert_eq!(struct_tag_get(tag, "thrift"), None);
        assert_eq!(struct_tag_get("json:name", "json"), None);
    }

    #[test]
    fn test_convert_literal() {
        assert_eq!(convert_literal("42", "int"), Ok(Value::from(42)));
        assert_eq!(convert_literal("42", "integer"), Ok(Value::from(42)));
        assert_eq!(convert_literal("T", "bool"), Ok(Value::Bool(true)));
        assert_eq!(convert_literal("1.5", "float64"), Ok(serde_json::json!(1.5)));
        assert_eq!(convert_literal("abc", "string"), Ok(Value::from("abc")));
        assert!(convert_literal("abc", "int").is_err());
    }

    #[test]
    fn test_param_type_name() {
        let ty = TypeExpr::Array {
            len: None,
            elem: Box::new(TypeExpr::Pointer(Box::new(TypeExpr::Selector {
                package: "models".into(),
                name: "User".into(),
            }))),
        };
        assert_eq!(param_type_name(&ty), "[]models.User");
        assert_eq!(param_type_name(&TypeExpr::Interface), "");
    }

    #[test]
    fn test_qualify_and_split() {
        assert_eq!(qualify("models", "User"), "models.User");
        assert_eq!(qualify("models", "base.Entity"), "base.Entity");
        assert_eq!(split_qualified("base.Entity", "models"), ("base", "Entity"));
        assert_eq!(split_qualified("User", "models"), ("models", "User"));
    }
}
