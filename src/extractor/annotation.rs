//! Annotation grammar.
//!
//! Each comment line that starts with a known `@Keyword` is parsed on its
//! own into a typed descriptor. Lines with unknown keywords are ignored.

use super::HttpMethod;
use crate::error::{Error, Result};
use crate::openapi_builder::{SecurityRequirement, SecurityScheme};
use crate::type_resolver::parse_go_bool;
use log::warn;
use std::collections::BTreeMap;

/// Splits on whitespace outside double quotes. Quote characters are
/// dropped; an unmatched quote keeps the rest of the line in one field.
pub fn split_fields(text: &str) -> Vec<String> {
    let mut fields = Vec::new();
    let mut current = String::new();
    let mut started = false;
    let mut quoted = false;
    for c in text.chars() {
        if c.is_whitespace() && !quoted {
            if started {
                fields.push(std::mem::take(&mut current));
                started = false;
            }
            continue;
        }
        started = true;
        if c == '"' {
            quoted = !quoted;
            continue;
        }
        current.push(c);
    }
    if !current.is_empty() {
        fields.push(current);
    }
    fields
}

/// Returns the text up to the first whitespace and the trimmed remainder.
pub fn peek_field(text: &str) -> (&str, &str) {
    match text.find(char::is_whitespace) {
        Some(pos) => (text[..pos].trim(), text[pos..].trim()),
        None => (text, ""),
    }
}

fn trim_quotes(text: &str) -> &str {
    text.trim_matches(|c| c == '"' || c == ' ')
}

/// `{object}`/`{array}` part of a response annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResponseSchema {
    pub type_name: String,
    pub is_array: bool,
}

/// Fields of an `@Param` annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamSpec {
    pub name: String,
    /// Function parameter the annotation documents (`name=>funcParam`)
    pub func_param: String,
    pub location: String,
    pub type_name: String,
    pub required: bool,
    pub description: Option<String>,
    pub default: Option<String>,
    pub enum_values: Vec<String>,
}

/// A parsed operation annotation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationTag {
    Router {
        path: String,
        methods: Vec<HttpMethod>,
    },
    Title(String),
    Description(String),
    Summary(String),
    Response {
        code: String,
        schema: Option<ResponseSchema>,
        description: String,
    },
    Param(ParamSpec),
    /// Media aliases: json, xml, plain, html, form
    Accept(Vec<String>),
    Security(SecurityRequirement),
    Deprecated(bool),
}

type OperationRule = fn(&str, &str) -> Result<OperationTag>;

const OPERATION_TAGS: &[(&str, OperationRule)] = &[
    ("@router", parse_router),
    ("@Router", parse_router),
    ("@Title", |rest, _| Ok(OperationTag::Title(rest.to_string()))),
    ("@Description", |rest, _| {
        Ok(OperationTag::Description(rest.trim_matches('"').to_string()))
    }),
    ("@Summary", |rest, _| Ok(OperationTag::Summary(rest.to_string()))),
    ("@Success", parse_response),
    ("@Failure", parse_response),
    ("@Param", parse_param),
    ("@Accept", |rest, _| {
        Ok(OperationTag::Accept(
            rest.split(',').map(|s| s.trim().to_string()).collect(),
        ))
    }),
    ("@Security", |rest, context| {
        parse_security(rest, context).map(OperationTag::Security)
    }),
    ("@Deprecated", |rest, _| {
        Ok(OperationTag::Deprecated(parse_go_bool(rest).unwrap_or(false)))
    }),
];

/// Parses one comment line of a controller method.
///
/// `context` names the method in error messages. Returns `Ok(None)` for
/// lines that carry no known annotation.
///
/// # Errors
///
/// Malformed mandatory fields (`@Param` with fewer than four fields,
/// `{object}` without a type, `@Security` without a scheme) are errors.
pub fn parse_operation_tag(line: &str, context: &str) -> Result<Option<OperationTag>> {
    let line = line.trim();
    let (keyword, rest) = peek_field(line);
    match OPERATION_TAGS.iter().find(|(name, _)| *name == keyword) {
        Some((_, rule)) => rule(rest, context).map(Some),
        None => Ok(None),
    }
}

fn parse_router(rest: &str, _context: &str) -> Result<OperationTag> {
    let (path, remainder) = peek_field(rest);
    let methods = if remainder.is_empty() {
        vec![HttpMethod::Get]
    } else {
        let (list, _) = peek_field(remainder);
        list.trim_matches(|c| c == '[' || c == ']')
            .split(',')
            .filter_map(|name| {
                let method = HttpMethod::parse(name.trim());
                if method.is_none() {
                    warn!("Ignoring unknown HTTP method '{}' on route {}", name, path);
                }
                method
            })
            .collect()
    };
    Ok(OperationTag::Router {
        path: path.to_string(),
        methods,
    })
}

fn parse_response(rest: &str, context: &str) -> Result<OperationTag> {
    let (code, rest) = peek_field(rest);
    let (marker, after_marker) = peek_field(rest);
    if marker != "{object}" && marker != "{array}" {
        return Ok(OperationTag::Response {
            code: code.to_string(),
            schema: None,
            description: trim_quotes(rest).to_string(),
        });
    }

    let (type_name, description) = peek_field(after_marker);
    if type_name.is_empty() {
        return Err(Error::annotation(
            context,
            "Schema must follow {object} or {array}",
        ));
    }
    let (type_name, is_array) = match type_name.strip_prefix("[]") {
        Some(inner) => (inner, true),
        None => (type_name, marker == "{array}"),
    };
    Ok(OperationTag::Response {
        code: code.to_string(),
        schema: Some(ResponseSchema {
            type_name: type_name.to_string(),
            is_array,
        }),
        description: trim_quotes(description).to_string(),
    })
}

fn parse_param(rest: &str, context: &str) -> Result<OperationTag> {
    let fields = split_fields(rest);
    if fields.len() < 4 {
        return Err(Error::annotation(
            context,
            "@Param should have at least 4 params",
        ));
    }
    let (name, func_param) = match fields[0].split_once("=>") {
        Some((name, func_param)) => (name.to_string(), func_param.to_string()),
        None => (fields[0].clone(), fields[0].clone()),
    };
    let description = fields.get(4).map(|desc| {
        trim_quotes(desc)
            .split("\\n")
            .collect::<Vec<_>>()
            .join("\n")
    });
    let enum_values = fields
        .get(6)
        .map(|values| values.split(':').map(str::to_string).collect())
        .unwrap_or_default();

    Ok(OperationTag::Param(ParamSpec {
        name,
        func_param,
        location: fields[1].clone(),
        type_name: fields[2].clone(),
        required: parse_go_bool(&fields[3]).unwrap_or(false),
        description,
        default: fields.get(5).cloned(),
        enum_values,
    }))
}

fn parse_security(rest: &str, context: &str) -> Result<SecurityRequirement> {
    let mut fields = split_fields(rest).into_iter();
    let scheme = fields
        .next()
        .ok_or_else(|| Error::annotation(context, "No params for security specified"))?;
    let mut requirement = BTreeMap::new();
    requirement.insert(scheme, fields.collect());
    Ok(requirement)
}

/// MIME type of an `@Accept` alias and whether it is also produced.
pub fn accept_media(alias: &str) -> Option<(&'static str, bool)> {
    match alias {
        "json" => Some(("application/json", true)),
        "xml" => Some(("application/xml", true)),
        "plain" => Some(("text/plain", true)),
        "html" => Some(("text/html", true)),
        "form" => Some(("multipart/form-data", false)),
        _ => None,
    }
}

/// A parsed document-level annotation from the router file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DocumentTag {
    ApiVersion(String),
    Title(String),
    Description(String),
    TermsOfService(String),
    ContactEmail(String),
    ContactName(String),
    ContactUrl(String),
    License(String),
    LicenseUrl(String),
    Schemes(Vec<String>),
    Host(String),
    BasePath(String),
    SecurityDefinition {
        name: String,
        scheme: SecurityScheme,
    },
    Security(SecurityRequirement),
}

type DocumentRule = fn(&str) -> Result<DocumentTag>;

const DOCUMENT_TAGS: &[(&str, DocumentRule)] = &[
    ("@APIVersion", |rest| Ok(DocumentTag::ApiVersion(rest.to_string()))),
    ("@Title", |rest| Ok(DocumentTag::Title(rest.to_string()))),
    ("@Description", |rest| Ok(DocumentTag::Description(rest.to_string()))),
    ("@TermsOfServiceUrl", |rest| {
        Ok(DocumentTag::TermsOfService(rest.to_string()))
    }),
    ("@Contact", |rest| Ok(DocumentTag::ContactEmail(rest.to_string()))),
    ("@Name", |rest| Ok(DocumentTag::ContactName(rest.to_string()))),
    ("@URL", |rest| Ok(DocumentTag::ContactUrl(rest.to_string()))),
    ("@LicenseUrl", |rest| Ok(DocumentTag::LicenseUrl(rest.to_string()))),
    ("@License", |rest| Ok(DocumentTag::License(rest.to_string()))),
    ("@Schemes", |rest| {
        Ok(DocumentTag::Schemes(
            rest.split(',').map(|s| s.trim().to_string()).collect(),
        ))
    }),
    ("@Host", |rest| Ok(DocumentTag::Host(rest.to_string()))),
    ("@Base", |rest| Ok(DocumentTag::BasePath(rest.to_string()))),
    ("@BasePath", |rest| Ok(DocumentTag::BasePath(rest.to_string()))),
    ("@SecurityDefinition", parse_security_definition),
    ("@Security", |rest| {
        parse_security(rest, "Security").map(DocumentTag::Security)
    }),
];

/// Parses one comment line of the router file.
///
/// # Errors
///
/// A malformed `@SecurityDefinition` or an `@Security` without a scheme.
pub fn parse_document_tag(line: &str) -> Result<Option<DocumentTag>> {
    let (keyword, rest) = peek_field(line.trim());
    match DOCUMENT_TAGS.iter().find(|(name, _)| *name == keyword) {
        Some((_, rule)) => rule(rest).map(Some),
        None => Ok(None),
    }
}

/// `name type ...` where the remaining fields depend on the type:
///
/// - `basic [description]`
/// - `apiKey paramName header|query [description]`
/// - `oauth2 authorizationUrl flow scope description ... [description]`
fn parse_security_definition(rest: &str) -> Result<DocumentTag> {
    const CONTEXT: &str = "SecurityDefinition";
    let p = split_fields(rest);
    if p.len() < 2 {
        return Err(Error::annotation(
            CONTEXT,
            format!("Not enough params for security: {}", p.len()),
        ));
    }

    let mut scheme = SecurityScheme {
        scheme_type: p[1].clone(),
        ..Default::default()
    };
    match p[1].as_str() {
        "oauth2" => {
            if p.len() < 6 {
                return Err(Error::annotation(
                    CONTEXT,
                    format!("Not enough params for oauth2: {}", p.len()),
                ));
            }
            if !matches!(
                p[3].as_str(),
                "implicit" | "password" | "application" | "accessCode"
            ) {
                return Err(Error::annotation(
                    CONTEXT,
                    format!(
                        "Unknown flow type: {}. Possible values are `implicit`, `password`, `application` or `accessCode`.",
                        p[3]
                    ),
                ));
            }
            scheme.authorization_url = Some(p[2].clone());
            scheme.flow = Some(p[3].clone());
            if p.len() % 2 != 0 {
                scheme.description = Some(trim_quotes(&p[p.len() - 1]).to_string());
            }
            let mut i = 4;
            while i + 1 < p.len() {
                scheme
                    .scopes
                    .insert(p[i].clone(), trim_quotes(&p[i + 1]).to_string());
                i += 2;
            }
        }
        "apiKey" => {
            if p.len() < 4 {
                return Err(Error::annotation(
                    CONTEXT,
                    format!("Not enough params for apiKey: {}", p.len()),
                ));
            }
            if p[3] != "header" && p[3] != "query" {
                return Err(Error::annotation(
                    CONTEXT,
                    format!(
                        "Unknown in type: {}. Possible values are `query` or `header`.",
                        p[3]
                    ),
                ));
            }
            scheme.name = Some(p[2].clone());
            scheme.location = Some(p[3].clone());
            scheme.description = p.get(4).map(|d| trim_quotes(d).to_string());
        }
        "basic" => {
            scheme.description = p.get(2).map(|d| trim_quotes(d).to_string());
        }
        other => {
            return Err(Error::annotation(
                CONTEXT,
                format!(
                    "Unknown security type: {}. Possible values are `oauth2`, `apiKey` or `basic`.",
                    other
                ),
            ))
        }
    }
    Ok(DocumentTag::SecurityDefinition {
        name: p[0].clone(),
        scheme,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn op(line: &str) -> OperationTag {
        parse_operation_tag(line, "UserController.Get")
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_split_fields_quote_aware() {
        assert_eq!(
            split_fields(r#"id   path  int true "The user id""#),
            vec!["id", "path", "int", "true", "The user id"]
        );
        // An unmatched quote swallows the rest of the line.
        assert_eq!(split_fields(r#"a "b c d"#), vec!["a", "b c d"]);
        assert!(split_fields("   ").is_empty());
    }

    #[test]
    fn test_unknown_keyword_is_ignored() {
        assert_eq!(parse_operation_tag("@Foo bar", "ctx").unwrap(), None);
        assert_eq!(parse_operation_tag("plain comment", "ctx").unwrap(), None);
    }

    #[test]
    fn test_router_methods() {
        assert_eq!(
            op("@router /:uid [get,post]"),
            OperationTag::Router {
                path: "/:uid".to_string(),
                methods: vec![HttpMethod::Get, HttpMethod::Post],
            }
        );
        assert_eq!(
            op("@router /login"),
            OperationTag::Router {
                path: "/login".to_string(),
                methods: vec![HttpMethod::Get],
            }
        );
    }

    #[test]
    fn test_param_full() {
        let tag = op(r#"@Param   id=>uid  path  int  true  "user id\nsecond line"  7  1:7:9"#);
        assert_eq!(
            tag,
            OperationTag::Param(ParamSpec {
                name: "id".to_string(),
                func_param: "uid".to_string(),
                location: "path".to_string(),
                type_name: "int".to_string(),
                required: true,
                description: Some("user id\nsecond line".to_string()),
                default: Some("7".to_string()),
                enum_values: vec!["1".to_string(), "7".to_string(), "9".to_string()],
            })
        );
    }

    #[test]
    fn test_param_too_few_fields_is_fatal() {
        let err = parse_operation_tag("@Param id path int", "UserController.Get").unwrap_err();
        assert!(matches!(err, Error::Annotation { .. }));
    }

    #[test]
    fn test_response_forms() {
        assert_eq!(
            op(r#"@Success 200 {object} models.User "ok""#),
            OperationTag::Response {
                code: "200".to_string(),
                schema: Some(ResponseSchema {
                    type_name: "models.User".to_string(),
                    is_array: false,
                }),
                description: "ok".to_string(),
            }
        );
        assert_eq!(
            op("@Success 200 {object} []models.User"),
            OperationTag::Response {
                code: "200".to_string(),
                schema: Some(ResponseSchema {
                    type_name: "models.User".to_string(),
                    is_array: true,
                }),
                description: String::new(),
            }
        );
        assert_eq!(
            op("@Failure 403 :uid is empty"),
            OperationTag::Response {
                code: "403".to_string(),
                schema: None,
                description: ":uid is empty".to_string(),
            }
        );
        assert!(parse_operation_tag("@Success 200 {object}", "ctx").is_err());
    }

    #[test]
    fn test_accept_security_deprecated() {
        assert_eq!(
            op("@Accept json,form"),
            OperationTag::Accept(vec!["json".to_string(), "form".to_string()])
        );
        assert_eq!(accept_media("form"), Some(("multipart/form-data", false)));
        assert_eq!(accept_media("yaml"), None);

        let mut expected = BTreeMap::new();
        expected.insert(
            "oauth".to_string(),
            vec!["read".to_string(), "write".to_string()],
        );
        assert_eq!(op("@Security oauth read write"), OperationTag::Security(expected));
        assert!(parse_operation_tag("@Security", "ctx").is_err());
        assert_eq!(op("@Deprecated true"), OperationTag::Deprecated(true));
    }

    #[test]
    fn test_document_tags() {
        assert_eq!(
            parse_document_tag("@APIVersion 1.0.0").unwrap(),
            Some(DocumentTag::ApiVersion("1.0.0".to_string()))
        );
        assert_eq!(
            parse_document_tag("@Schemes http,https").unwrap(),
            Some(DocumentTag::Schemes(vec!["http".into(), "https".into()]))
        );
        assert_eq!(
            parse_document_tag("@LicenseUrl http://www.apache.org/licenses/LICENSE-2.0.html")
                .unwrap(),
            Some(DocumentTag::LicenseUrl(
                "http://www.apache.org/licenses/LICENSE-2.0.html".to_string()
            ))
        );
        assert_eq!(parse_document_tag("@Param x").unwrap(), None);
    }

    #[test]
    fn test_security_definitions() {
        let tag = parse_document_tag(
            r#"@SecurityDefinition oauth oauth2 https://auth.example.com/authorize implicit read "Read access" write "Write access" "OAuth login""#,
        )
        .unwrap()
        .unwrap();
        let DocumentTag::SecurityDefinition { name, scheme } = tag else {
            panic!("expected a security definition");
        };
        assert_eq!(name, "oauth");
        assert_eq!(scheme.flow.as_deref(), Some("implicit"));
        assert_eq!(scheme.scopes.len(), 2);
        assert_eq!(scheme.scopes["write"], "Write access");
        assert_eq!(scheme.description.as_deref(), Some("OAuth login"));

        let tag = parse_document_tag("@SecurityDefinition key apiKey X-Token header")
            .unwrap()
            .unwrap();
        assert!(matches!(
            tag,
            DocumentTag::SecurityDefinition { ref scheme, .. }
                if scheme.location.as_deref() == Some("header")
        ));

        for bad in [
            "@SecurityDefinition oauth oauth2 https://a implicit",
            "@SecurityDefinition oauth oauth2 https://a sideways read r",
            "@SecurityDefinition key apiKey X-Token cookie",
            "@SecurityDefinition x digest",
            "@SecurityDefinition lonely",
        ] {
            assert!(parse_document_tag(bad).is_err(), "{} should fail", bad);
        }
    }
}
