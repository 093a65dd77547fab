//! Namespace/route walker.
//!
//! The router file registers routes through nested calls:
//!
//! ```go
//! ns := beego.NewNamespace("/v1",
//!     beego.NSNamespace("/user",
//!         beego.NSInclude(&controllers.UserController{}),
//!     ),
//!     beego.NSRouter("/health", &controllers.HealthController{}, "get:Check"),
//! )
//! ```
//!
//! Those expressions are first converted into a [`Namespace`] tree, then
//! walked to bind each controller's path items under their final URL.

use super::{controller_key, RouteTable};
use crate::ast::{Expr, SourceFile, Stmt, TypeExpr, UnaryOp};
use crate::openapi_builder::OpenApiBuilder;
use crate::session::Diagnostics;
use log::debug;
use std::collections::{HashMap, HashSet};

/// A controller type named by a composite literal, `&pkg.Name{}`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerRef {
    /// Local package name as written in the router file
    pub package: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NamespaceChild {
    Namespace(Namespace),
    Router {
        route: String,
        controller: ControllerRef,
    },
    Include(Vec<ControllerRef>),
}

/// One `NewNamespace`/`NSNamespace` call
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Namespace {
    /// First literal argument, empty when it is not a string literal
    pub prefix: String,
    pub children: Vec<NamespaceChild>,
}

/// Local variables of one function body, name -> initializer
type Locals = HashMap<String, Expr>;

/// Collects every `NewNamespace(...)` call assigned in a function body of
/// the router file, in source order.
pub fn namespaces(file: &SourceFile, diagnostics: &mut Diagnostics) -> Vec<Namespace> {
    let mut found = Vec::new();
    for func in file.funcs() {
        let Some(body) = &func.body else {
            continue;
        };
        let locals = collect_locals(body);
        for stmt in body {
            let Stmt::Assign { rhs, .. } = stmt else {
                continue;
            };
            for expr in rhs {
                if is_selector_call(expr, "NewNamespace") {
                    found.push(Namespace::from_call(expr, &locals, diagnostics));
                }
            }
        }
    }
    found
}

/// Binds `a, b := x, y` pairwise. `a, b := f()` binds nothing.
fn collect_locals(body: &[Stmt]) -> Locals {
    let mut locals = Locals::new();
    for stmt in body {
        let Stmt::Assign {
            lhs,
            rhs,
            define: true,
        } = stmt
        else {
            continue;
        };
        if lhs.len() != rhs.len() {
            continue;
        }
        for (target, value) in lhs.iter().zip(rhs) {
            if let Expr::Ident(name) = target {
                locals.entry(name.clone()).or_insert_with(|| value.clone());
            }
        }
    }
    locals
}

fn is_selector_call(expr: &Expr, name: &str) -> bool {
    match expr {
        Expr::Call { func, .. } => {
            matches!(func.as_ref(), Expr::Selector { name: callee, .. } if callee == name)
        }
        _ => false,
    }
}

impl Namespace {
    fn from_call(call: &Expr, locals: &Locals, diagnostics: &mut Diagnostics) -> Self {
        let Expr::Call { args, .. } = call else {
            return Namespace::default();
        };
        let mut namespace = Namespace {
            prefix: args.first().and_then(Expr::string_value).unwrap_or_default(),
            children: Vec::new(),
        };

        for arg in args.iter().skip(1) {
            let Expr::Call { args: inner, .. } = arg else {
                continue;
            };
            match arg.callee_name() {
                Some("NSNamespace") => namespace
                    .children
                    .push(NamespaceChild::Namespace(Namespace::from_call(arg, locals, diagnostics))),
                Some("NSRouter") => {
                    let route = inner
                        .first()
                        .and_then(Expr::string_value)
                        .unwrap_or_default()
                        .trim_end_matches('/')
                        .to_string();
                    match inner.get(1).and_then(|e| controller_ref(e, locals)) {
                        Some(controller) => namespace
                            .children
                            .push(NamespaceChild::Router { route, controller }),
                        None => diagnostics.warn(format!(
                            "Couldn't determine the controller type of route {}",
                            route
                        )),
                    }
                }
                Some("NSInclude") => {
                    let mut controllers = Vec::new();
                    for expr in inner {
                        match controller_ref(expr, locals) {
                            Some(controller) => controllers.push(controller),
                            None => diagnostics.warn(format!(
                                "Couldn't determine the controller type included in namespace {}",
                                namespace.prefix
                            )),
                        }
                    }
                    namespace.children.push(NamespaceChild::Include(controllers));
                }
                other => debug!("Ignoring namespace option {:?}", other),
            }
        }
        namespace
    }
}

/// Matches `&pkg.Name{...}`, looking through one local variable.
fn controller_ref(expr: &Expr, locals: &Locals) -> Option<ControllerRef> {
    let expr = match expr {
        Expr::Ident(name) => locals.get(name)?,
        other => other,
    };
    let Expr::Unary {
        op: UnaryOp::Addr,
        operand,
    } = expr
    else {
        return None;
    };
    match operand.as_ref() {
        Expr::CompositeLit {
            ty: Some(TypeExpr::Selector { package, name }),
            ..
        } => Some(ControllerRef {
            package: package.clone(),
            name: name.clone(),
        }),
        _ => None,
    }
}

/// Finds the namespace whose accumulated prefix matches `base_path`.
///
/// Prefixes are compared segment by segment with surrounding slashes
/// trimmed. An exact match wins; otherwise the deepest namespace whose
/// prefix is a leading part of the base path is returned.
pub fn find_base_namespace<'n>(root: &'n Namespace, base_path: &str) -> Option<&'n Namespace> {
    let base = base_path.trim_matches('/');
    anchor(root, "", base).map(|(node, _)| node)
}

fn anchor<'n>(ns: &'n Namespace, url: &str, base: &str) -> Option<(&'n Namespace, usize)> {
    let current = format!("{}{}", url, ns.prefix);
    let trimmed = current.trim_matches('/');
    if trimmed == base {
        return Some((ns, base.len()));
    }
    if !trimmed.is_empty() && !base.starts_with(&format!("{}/", trimmed)) {
        return None;
    }

    let mut best = (ns, trimmed.len());
    for child in &ns.children {
        if let NamespaceChild::Namespace(inner) = child {
            if let Some(found) = anchor(inner, &current, base) {
                if found.1 > best.1 {
                    best = found;
                }
                if best.1 == base.len() {
                    break;
                }
            }
        }
    }
    Some(best)
}

fn tag_name(base_url: &str) -> String {
    match base_url.trim_matches('/') {
        "" => "/".to_string(),
        tag => tag.to_string(),
    }
}

/// Binds the routes of every controller reachable from a namespace tree.
pub struct NamespaceWalker<'a> {
    pub routes: &'a RouteTable,
    pub builder: &'a mut OpenApiBuilder,
    pub diagnostics: &'a mut Diagnostics,
    /// Controllers whose doc comment already produced a tag
    tagged: HashSet<String>,
}

impl<'a> NamespaceWalker<'a> {
    pub fn new(
        routes: &'a RouteTable,
        builder: &'a mut OpenApiBuilder,
        diagnostics: &'a mut Diagnostics,
    ) -> Self {
        Self {
            routes,
            builder,
            diagnostics,
            tagged: HashSet::new(),
        }
    }

    /// Walks one root namespace.
    ///
    /// With a declared base path the walk starts at the matching namespace
    /// and URLs are written relative to it. Without one, the root prefix
    /// becomes the base path.
    pub fn walk(&mut self, root: &Namespace) {
        let start = match self.builder.base_path().map(str::to_string) {
            Some(base_path) => match find_base_namespace(root, &base_path) {
                Some(found) => found,
                None => {
                    self.diagnostics.warn(format!(
                        "No namespace matches base path {}, walking from {}",
                        base_path, root.prefix
                    ));
                    root
                }
            },
            None => root,
        };
        self.traverse("", start);
    }

    fn traverse(&mut self, base_url: &str, namespace: &Namespace) {
        if base_url.is_empty() && self.builder.base_path().is_none() {
            self.builder.set_base_path(&namespace.prefix);
        }

        for child in &namespace.children {
            match child {
                NamespaceChild::Namespace(inner) => {
                    self.traverse(&format!("{}{}", base_url, inner.prefix), inner)
                }
                NamespaceChild::Router { route, controller } => {
                    self.append_controller(controller, base_url, route);
                }
                NamespaceChild::Include(controllers) => {
                    for controller in controllers {
                        self.append_controller(controller, base_url, "");
                    }
                }
            }
        }
    }

    fn append_controller(&mut self, controller: &ControllerRef, base_url: &str, route: &str) {
        let Some(import) = self.routes.imports.get(&controller.package) else {
            self.diagnostics.warn(format!(
                "Package {} of controller {} is not imported by the router",
                controller.package, controller.name
            ));
            return;
        };
        let key = controller_key(import, &controller.name);
        let tag = tag_name(base_url);

        match self.routes.routes(&key) {
            Some(items) => {
                for (suffix, item) in items {
                    let path = format!("{}{}{}", base_url, route, suffix);
                    self.builder.bind(&path, item.clone(), &tag);
                }
            }
            None => debug!("Controller {} documents no routes", key),
        }

        if self.tagged.insert(key.clone()) {
            if let Some(comment) = self.routes.controller_comments.get(&key) {
                self.builder.add_tag(&tag, comment);
            }
        }
    }
}
