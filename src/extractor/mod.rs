//! Route extraction from annotated controllers and router namespaces.
//!
//! Extraction runs in two phases:
//!
//! - [`controller`]: every controller package imported by the router file is
//!   parsed once. Each annotated method becomes a partially built path item
//!   keyed by controller and route.
//! - [`namespace`]: the `beego.NewNamespace(...)` expressions in the router
//!   file are walked. They bind those path items under their final URL.
//!
//! Both phases share a [`RouteTable`].
//!
//! # Example
//!
//! ```no_run
//! use beego_swagger::extractor::annotation::{parse_operation_tag, OperationTag};
//!
//! let tag = parse_operation_tag("@router /:uid [get]", "UserController.Get").unwrap();
//! assert!(matches!(tag, Some(OperationTag::Router { .. })));
//! ```

pub mod annotation;
pub mod controller;
pub mod namespace;

use crate::openapi_builder::Item;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// HTTP methods a route annotation can name.
///
/// These map onto the operation slots of a path item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    /// HTTP GET method
    Get,
    /// HTTP POST method
    Post,
    /// HTTP PUT method
    Put,
    /// HTTP DELETE method
    Delete,
    /// HTTP PATCH method
    Patch,
    /// HTTP OPTIONS method
    Options,
    /// HTTP HEAD method
    Head,
}

impl HttpMethod {
    /// Parses a method name, ignoring case.
    pub fn parse(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "GET" => Some(HttpMethod::Get),
            "POST" => Some(HttpMethod::Post),
            "PUT" => Some(HttpMethod::Put),
            "DELETE" => Some(HttpMethod::Delete),
            "PATCH" => Some(HttpMethod::Patch),
            "OPTIONS" => Some(HttpMethod::Options),
            "HEAD" => Some(HttpMethod::Head),
            _ => None,
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Head => "HEAD",
        };
        f.write_str(name)
    }
}

/// Routes collected from controller packages.
///
/// Controller keys are the controller's import path followed directly by
/// its type name, e.g. `github.com/acme/shop/controllersUserController`.
#[derive(Debug, Default)]
pub struct RouteTable {
    /// controller key -> route suffix -> path item
    pub controllers: HashMap<String, BTreeMap<String, Item>>,
    /// controller key -> doc comment of the controller type
    pub controller_comments: HashMap<String, String>,
    /// local package name in the router file -> import path
    pub imports: HashMap<String, String>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Path item for `route` of `controller`, created on first use.
    pub fn item_mut(&mut self, controller: &str, route: &str) -> &mut Item {
        self.controllers
            .entry(controller.to_string())
            .or_default()
            .entry(route.to_string())
            .or_default()
    }

    pub fn routes(&self, controller: &str) -> Option<&BTreeMap<String, Item>> {
        self.controllers.get(controller)
    }

    pub fn clear(&mut self) {
        self.controllers.clear();
        self.controller_comments.clear();
        self.imports.clear();
    }
}

/// Key under which a controller's routes are stored.
pub fn controller_key(import_path: &str, type_name: &str) -> String {
    format!("{}{}", import_path, type_name)
}
