//! Lowering of the tree-sitter Go tree into [`crate::ast`] nodes.
//!
//! Only the shapes the generator inspects are kept. Statements other than
//! assignments and expression statements become [`Stmt::Other`], and
//! expressions without a dedicated variant become [`Expr::Other`].

use crate::ast::{
    CommentGroup, Decl, Expr, Field, FuncDecl, Import, LitKind, Literal, SourceFile, Stmt,
    TypeExpr, TypeSpec, UnaryOp, ValueSpec,
};
use std::collections::HashMap;
use std::path::Path;
use tree_sitter::Node;

/// Line and message of the first error node in a tree.
pub fn first_error(root: Node<'_>, source: &str) -> Option<(usize, String)> {
    if !root.has_error() {
        return None;
    }
    let mut stack = vec![root];
    while let Some(node) = stack.pop() {
        if node.is_missing() {
            return Some((line_of(node), format!("missing {}", node.kind())));
        }
        if node.is_error() {
            let snippet: String = text_of(source, node).chars().take(24).collect();
            return Some((line_of(node), format!("unexpected {:?}", snippet)));
        }
        if node.has_error() {
            let mut inner = children(node);
            inner.reverse();
            stack.extend(inner);
        }
    }
    Some((line_of(root), "syntax error".to_string()))
}

pub struct Lowering<'s> {
    source: &'s str,
    groups: Vec<CommentGroup>,
    /// Index into `groups` by the line a non-trailing group ends on
    doc_by_end_line: HashMap<usize, usize>,
}

impl<'s> Lowering<'s> {
    pub fn new(source: &'s str, root: Node<'_>) -> Self {
        let mut lowering = Self {
            source,
            groups: Vec::new(),
            doc_by_end_line: HashMap::new(),
        };
        for (group, trailing) in lowering.comment_groups(root) {
            if !trailing {
                lowering
                    .doc_by_end_line
                    .insert(group.end_line, lowering.groups.len());
            }
            lowering.groups.push(group);
        }
        lowering
    }

    pub fn file(self, root: Node<'_>, path: &Path) -> SourceFile {
        let mut package = String::new();
        let mut imports = Vec::new();
        let mut decls = Vec::new();
        for child in named_children(root) {
            match child.kind() {
                "package_clause" => {
                    if let Some(name) = named_children(child).first() {
                        package = self.text(*name).to_string();
                    }
                }
                "import_declaration" => {
                    for spec in specs_of(child, "import_spec") {
                        imports.push(self.import(spec));
                    }
                }
                "type_declaration" => {
                    let mut specs: Vec<(TypeSpec, usize)> = specs_of(child, "type_spec")
                        .into_iter()
                        .chain(specs_of(child, "type_alias"))
                        .map(|spec| self.type_spec(spec))
                        .collect();
                    specs.sort_by_key(|spec| spec.1);
                    decls.push(Decl::Type {
                        doc: self.doc_for(child),
                        specs: specs.into_iter().map(|spec| spec.0).collect(),
                    });
                }
                "const_declaration" => decls.push(Decl::Const {
                    doc: self.doc_for(child),
                    specs: self.value_specs(child, "const_spec"),
                }),
                "var_declaration" => decls.push(Decl::Var {
                    specs: self.value_specs(child, "var_spec"),
                }),
                "function_declaration" | "method_declaration" => {
                    decls.push(Decl::Func(self.func(child)))
                }
                _ => {}
            }
        }
        SourceFile {
            path: path.to_path_buf(),
            package,
            imports,
            decls,
            comments: self.groups,
        }
    }

    fn text(&self, node: Node<'_>) -> &'s str {
        text_of(self.source, node)
    }

    fn field_text(&self, node: Node<'_>, field: &str) -> String {
        node.child_by_field_name(field)
            .map(|child| self.text(child).to_string())
            .unwrap_or_default()
    }

    // ----- comments ------------------------------------------------------

    /// Groups adjacent comments; the flag marks comments that follow code
    /// on their first line.
    fn comment_groups(&self, root: Node<'_>) -> Vec<(CommentGroup, bool)> {
        let mut comments = Vec::new();
        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.kind() == "comment" {
                comments.push(node);
            } else {
                stack.extend(children(node));
            }
        }
        comments.sort_by_key(|node| node.start_byte());

        let mut groups: Vec<(CommentGroup, bool)> = Vec::new();
        for node in comments {
            let start_line = line_of(node);
            let end_line = node.end_position().row + 1;
            let trailing = self.follows_code(node);
            let text = self.text(node).to_string();
            if let Some((group, group_trailing)) = groups.last_mut() {
                if !*group_trailing && !trailing && start_line == group.end_line + 1 {
                    group.lines.push(text);
                    group.end_line = end_line;
                    continue;
                }
            }
            groups.push((
                CommentGroup {
                    lines: vec![text],
                    start_line,
                    end_line,
                },
                trailing,
            ));
        }
        groups
    }

    fn follows_code(&self, node: Node<'_>) -> bool {
        let before = &self.source[..node.start_byte().min(self.source.len())];
        let line_start = before.rfind('\n').map_or(0, |idx| idx + 1);
        !before[line_start..].trim().is_empty()
    }

    /// Comment group ending on the line right above `node`.
    fn doc_for(&self, node: Node<'_>) -> Option<CommentGroup> {
        let prev = line_of(node).checked_sub(1)?;
        self.doc_by_end_line
            .get(&prev)
            .map(|idx| self.groups[*idx].clone())
    }

    // ----- declarations --------------------------------------------------

    fn import(&self, spec: Node<'_>) -> Import {
        Import {
            name: spec
                .child_by_field_name("name")
                .map(|name| self.text(name).to_string()),
            path: unquote(&self.field_text(spec, "path")),
        }
    }

    /// Lowers a type spec, keeping its start byte for source ordering.
    fn type_spec(&self, spec: Node<'_>) -> (TypeSpec, usize) {
        let ty = spec
            .child_by_field_name("type")
            .map(|ty| self.ty(ty))
            .unwrap_or(TypeExpr::Interface);
        let lowered = TypeSpec {
            name: self.field_text(spec, "name"),
            ty,
            doc: self.doc_for(spec),
        };
        (lowered, spec.start_byte())
    }

    fn value_specs(&self, decl: Node<'_>, kind: &str) -> Vec<ValueSpec> {
        specs_of(decl, kind)
            .into_iter()
            .map(|spec| ValueSpec {
                names: field_children(spec, "name")
                    .into_iter()
                    .map(|name| self.text(name).to_string())
                    .collect(),
                ty: spec.child_by_field_name("type").map(|ty| self.ty(ty)),
                values: spec
                    .child_by_field_name("value")
                    .map(|value| self.exprs(value))
                    .unwrap_or_default(),
            })
            .collect()
    }

    fn func(&self, node: Node<'_>) -> FuncDecl {
        let results = match node.child_by_field_name("result") {
            Some(result) if result.kind() == "parameter_list" => self.params(result),
            Some(result) => vec![Field {
                names: Vec::new(),
                ty: self.ty(result),
                tag: None,
            }],
            None => Vec::new(),
        };
        FuncDecl {
            doc: self.doc_for(node),
            recv: node
                .child_by_field_name("receiver")
                .and_then(|recv| self.params(recv).into_iter().next()),
            name: self.field_text(node, "name"),
            params: node
                .child_by_field_name("parameters")
                .map(|params| self.params(params))
                .unwrap_or_default(),
            results,
            body: node
                .child_by_field_name("body")
                .map(|body| self.block(body)),
        }
    }

    fn params(&self, list: Node<'_>) -> Vec<Field> {
        named_children(list)
            .into_iter()
            .filter_map(|param| {
                let ty = self.ty(param.child_by_field_name("type")?);
                let ty = match param.kind() {
                    "variadic_parameter_declaration" => TypeExpr::Ellipsis(Box::new(ty)),
                    _ => ty,
                };
                Some(Field {
                    names: field_children(param, "name")
                        .into_iter()
                        .map(|name| self.text(name).to_string())
                        .collect(),
                    ty,
                    tag: None,
                })
            })
            .collect()
    }

    // ----- types ---------------------------------------------------------

    fn ty(&self, node: Node<'_>) -> TypeExpr {
        let child = |field: &str| {
            Box::new(
                node.child_by_field_name(field)
                    .map(|inner| self.ty(inner))
                    .unwrap_or(TypeExpr::Interface),
            )
        };
        match node.kind() {
            "qualified_type" => TypeExpr::Selector {
                package: self.field_text(node, "package"),
                name: self.field_text(node, "name"),
            },
            // Type arguments are dropped: `Page[T]` is looked up as `Page`.
            "generic_type" => node
                .child_by_field_name("type")
                .or_else(|| named_children(node).into_iter().next())
                .map(|base| self.ty(base))
                .unwrap_or(TypeExpr::Interface),
            "pointer_type" => TypeExpr::Pointer(Box::new(self.first_type(node))),
            "parenthesized_type" | "negated_type" => self.first_type(node),
            "slice_type" => TypeExpr::Array {
                len: None,
                elem: child("element"),
            },
            "array_type" => TypeExpr::Array {
                len: Some(self.field_text(node, "length")),
                elem: child("element"),
            },
            "implicit_length_array_type" => TypeExpr::Array {
                len: Some("...".to_string()),
                elem: child("element"),
            },
            "map_type" => TypeExpr::Map {
                key: child("key"),
                value: child("value"),
            },
            "channel_type" => TypeExpr::Chan(child("value")),
            "struct_type" => TypeExpr::Struct(
                named_children(node)
                    .into_iter()
                    .find(|list| list.kind() == "field_declaration_list")
                    .map(|list| self.struct_fields(list))
                    .unwrap_or_default(),
            ),
            "interface_type" => TypeExpr::Interface,
            "function_type" => TypeExpr::Func,
            _ => TypeExpr::Ident(self.text(node).to_string()),
        }
    }

    fn first_type(&self, node: Node<'_>) -> TypeExpr {
        named_children(node)
            .into_iter()
            .next()
            .map(|inner| self.ty(inner))
            .unwrap_or(TypeExpr::Interface)
    }

    fn struct_fields(&self, list: Node<'_>) -> Vec<Field> {
        named_children(list)
            .into_iter()
            .filter(|field| field.kind() == "field_declaration")
            .filter_map(|field| {
                let names: Vec<String> = field_children(field, "name")
                    .into_iter()
                    .map(|name| self.text(name).to_string())
                    .collect();
                let mut ty = self.ty(field.child_by_field_name("type")?);
                // Embedded `*T` keeps the star as an anonymous token.
                if names.is_empty() && children(field).iter().any(|c| c.kind() == "*") {
                    ty = TypeExpr::Pointer(Box::new(ty));
                }
                Some(Field {
                    names,
                    ty,
                    tag: field
                        .child_by_field_name("tag")
                        .map(|tag| unquote(self.text(tag))),
                })
            })
            .collect()
    }

    // ----- statements ----------------------------------------------------

    fn block(&self, block: Node<'_>) -> Vec<Stmt> {
        let mut stmts = Vec::new();
        for child in named_children(block) {
            if child.kind() == "statement_list" {
                stmts.extend(named_children(child).into_iter().map(|s| self.stmt(s)));
            } else {
                stmts.push(self.stmt(child));
            }
        }
        stmts
    }

    fn stmt(&self, node: Node<'_>) -> Stmt {
        let sides = |define: bool| Stmt::Assign {
            lhs: node
                .child_by_field_name("left")
                .map(|lhs| self.exprs(lhs))
                .unwrap_or_default(),
            rhs: node
                .child_by_field_name("right")
                .map(|rhs| self.exprs(rhs))
                .unwrap_or_default(),
            define,
        };
        match node.kind() {
            "short_var_declaration" => sides(true),
            "assignment_statement" if self.field_text(node, "operator") == "=" => sides(false),
            "expression_statement" => named_children(node)
                .into_iter()
                .next()
                .map(|expr| Stmt::Expr(self.expr(expr)))
                .unwrap_or(Stmt::Other),
            _ => Stmt::Other,
        }
    }

    // ----- expressions ---------------------------------------------------

    fn exprs(&self, node: Node<'_>) -> Vec<Expr> {
        if node.kind() == "expression_list" {
            named_children(node)
                .into_iter()
                .map(|expr| self.expr(expr))
                .collect()
        } else {
            vec![self.expr(node)]
        }
    }

    fn operand(&self, node: Node<'_>, field: &str) -> Box<Expr> {
        Box::new(
            node.child_by_field_name(field)
                .map(|inner| self.expr(inner))
                .unwrap_or(Expr::Other),
        )
    }

    fn expr(&self, node: Node<'_>) -> Expr {
        match node.kind() {
            "identifier" | "field_identifier" | "package_identifier" | "type_identifier"
            | "true" | "false" | "nil" | "iota" => Expr::Ident(self.text(node).to_string()),
            "selector_expression" => Expr::Selector {
                base: self.operand(node, "operand"),
                name: self.field_text(node, "field"),
            },
            "call_expression" => Expr::Call {
                func: self.operand(node, "function"),
                args: node
                    .child_by_field_name("arguments")
                    .map(|args| {
                        named_children(args)
                            .into_iter()
                            .map(|arg| self.expr(arg))
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            "type_conversion_expression" => Expr::Call {
                func: Box::new(
                    node.child_by_field_name("type")
                        .map(|ty| Expr::Type(self.ty(ty)))
                        .unwrap_or(Expr::Other),
                ),
                args: vec![*self.operand(node, "operand")],
            },
            "unary_expression" => {
                let op = match self.field_text(node, "operator").as_str() {
                    "&" => UnaryOp::Addr,
                    "*" => UnaryOp::Deref,
                    "-" => UnaryOp::Neg,
                    "+" => UnaryOp::Plus,
                    "!" => UnaryOp::Not,
                    "^" => UnaryOp::Xor,
                    _ => UnaryOp::Recv,
                };
                Expr::Unary {
                    op,
                    operand: self.operand(node, "operand"),
                }
            }
            "binary_expression" => Expr::Binary {
                op: self.field_text(node, "operator"),
                lhs: self.operand(node, "left"),
                rhs: self.operand(node, "right"),
            },
            "composite_literal" => Expr::CompositeLit {
                ty: node.child_by_field_name("type").map(|ty| self.ty(ty)),
                elements: node
                    .child_by_field_name("body")
                    .map(|body| self.elements(body))
                    .unwrap_or_default(),
            },
            "parenthesized_expression" => named_children(node)
                .into_iter()
                .next()
                .map(|inner| self.expr(inner))
                .unwrap_or(Expr::Other),
            "func_literal" => Expr::FuncLit,
            "int_literal" => self.literal(node, LitKind::Int),
            "float_literal" => self.literal(node, LitKind::Float),
            "imaginary_literal" => self.literal(node, LitKind::Imag),
            "rune_literal" => self.literal(node, LitKind::Char),
            "raw_string_literal" | "interpreted_string_literal" => {
                self.literal(node, LitKind::String)
            }
            "qualified_type" | "generic_type" | "pointer_type" | "slice_type" | "array_type"
            | "map_type" | "channel_type" | "struct_type" | "interface_type"
            | "function_type" => Expr::Type(self.ty(node)),
            _ => Expr::Other,
        }
    }

    fn literal(&self, node: Node<'_>, kind: LitKind) -> Expr {
        Expr::Lit(Literal {
            kind,
            raw: self.text(node).to_string(),
            pos: node.start_byte(),
        })
    }

    fn elements(&self, body: Node<'_>) -> Vec<Expr> {
        named_children(body)
            .into_iter()
            .map(|element| self.element(element))
            .collect()
    }

    fn element(&self, node: Node<'_>) -> Expr {
        match node.kind() {
            "keyed_element" => {
                let parts = named_children(node);
                match (parts.first(), parts.last()) {
                    (Some(key), Some(value)) if parts.len() >= 2 => Expr::KeyValue {
                        key: Box::new(self.element(*key)),
                        value: Box::new(self.element(*value)),
                    },
                    _ => Expr::Other,
                }
            }
            "literal_element" => named_children(node)
                .into_iter()
                .next()
                .map(|inner| self.element(inner))
                .unwrap_or(Expr::Other),
            "literal_value" => Expr::CompositeLit {
                ty: None,
                elements: self.elements(node),
            },
            _ => self.expr(node),
        }
    }
}

fn text_of<'s>(source: &'s str, node: Node<'_>) -> &'s str {
    source.get(node.byte_range()).unwrap_or("")
}

fn line_of(node: Node<'_>) -> usize {
    node.start_position().row + 1
}

fn children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children(&mut cursor).collect()
}

/// Named children without comments.
fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor)
        .filter(|child| !child.is_extra())
        .collect()
}

fn field_children<'t>(node: Node<'t>, field: &str) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.children_by_field_name(field, &mut cursor).collect()
}

/// Specs of a declaration, looking through `( ... )` list nodes.
fn specs_of<'t>(decl: Node<'t>, kind: &str) -> Vec<Node<'t>> {
    let mut specs = Vec::new();
    for child in named_children(decl) {
        if child.kind() == kind {
            specs.push(child);
        } else if child.kind().ends_with("_list") {
            specs.extend(specs_of(child, kind));
        }
    }
    specs
}

/// Removes the quotes of a string literal, resolving simple escapes in
/// interpreted strings.
pub(crate) fn unquote(raw: &str) -> String {
    if let Some(inner) = raw.strip_prefix('`').and_then(|s| s.strip_suffix('`')) {
        return inner.to_string();
    }
    let inner = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}
