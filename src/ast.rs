//! Syntax tree model for the subset of Go the generator analyses.
//!
//! The tree is a closed set of tagged variants. Every consumer dispatches
//! with exhaustive `match`es, so adding a node kind forces every analysis
//! step to decide how to treat it.

use std::fmt;
use std::path::PathBuf;

/// All files of one directory that share a package clause.
#[derive(Debug, Clone)]
pub struct Package {
    /// Name from the package clause (not the import path)
    pub name: String,
    /// Directory the package was parsed from
    pub dir: PathBuf,
    /// Parsed files, ordered by file name
    pub files: Vec<SourceFile>,
}

/// One parsed source file.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    /// Name from the package clause
    pub package: String,
    pub imports: Vec<Import>,
    pub decls: Vec<Decl>,
    /// Every comment group in the file, in source order
    pub comments: Vec<CommentGroup>,
}

impl SourceFile {
    /// Iterates over every type spec declared at file level.
    pub fn type_specs(&self) -> impl Iterator<Item = &TypeSpec> {
        self.decls.iter().flat_map(|decl| match decl {
            Decl::Type { specs, .. } => specs.as_slice(),
            _ => &[][..],
        })
    }

    /// Finds a file-level type declaration by name.
    pub fn find_type(&self, name: &str) -> Option<&TypeSpec> {
        self.type_specs().find(|spec| spec.name == name)
    }

    /// Iterates over every constant spec declared at file level.
    pub fn const_specs(&self) -> impl Iterator<Item = &ValueSpec> {
        self.decls.iter().flat_map(|decl| match decl {
            Decl::Const { specs, .. } => specs.as_slice(),
            _ => &[][..],
        })
    }

    /// Iterates over function and method declarations.
    pub fn funcs(&self) -> impl Iterator<Item = &FuncDecl> {
        self.decls.iter().filter_map(|decl| match decl {
            Decl::Func(func) => Some(func),
            _ => None,
        })
    }
}

/// An import spec: `alias "path"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Import {
    /// Explicit local name (`.` and `_` included), if any
    pub name: Option<String>,
    /// Import path without quotes
    pub path: String,
}

impl Import {
    /// Last element of the import path, the conventional package name.
    pub fn last_segment(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// A run of adjacent comments, kept verbatim (markers included).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentGroup {
    pub lines: Vec<String>,
    /// Line of the first comment
    pub start_line: usize,
    /// Line on which the last comment ends
    pub end_line: usize,
}

impl CommentGroup {
    /// Returns the text of the comment with markers removed.
    ///
    /// Mirrors the usual Go rendering: `//` and `/* */` markers and the first
    /// space of a line comment are dropped, trailing spaces are trimmed,
    /// leading and trailing blank lines are removed, runs of blank lines
    /// collapse into one, and a non-empty result ends with a newline.
    pub fn text(&self) -> String {
        let mut lines: Vec<String> = Vec::new();
        for raw in &self.lines {
            if let Some(rest) = raw.strip_prefix("//") {
                if rest.starts_with("go:") {
                    continue;
                }
                lines.push(rest.strip_prefix(' ').unwrap_or(rest).to_string());
            } else if let Some(rest) = raw.strip_prefix("/*") {
                let body = rest.strip_suffix("*/").unwrap_or(rest);
                lines.extend(body.lines().map(str::to_string));
            } else {
                lines.push(raw.clone());
            }
        }

        let mut out: Vec<&str> = Vec::new();
        for line in &lines {
            let line = line.trim_end();
            if line.is_empty() && out.last().map_or(true, |last| last.is_empty()) {
                continue;
            }
            out.push(line);
        }
        while out.last().is_some_and(|last| last.is_empty()) {
            out.pop();
        }
        if out.is_empty() {
            return String::new();
        }
        let mut text = out.join("\n");
        text.push('\n');
        text
    }
}

/// A top-level declaration.
#[derive(Debug, Clone)]
pub enum Decl {
    Type {
        doc: Option<CommentGroup>,
        specs: Vec<TypeSpec>,
    },
    Const {
        doc: Option<CommentGroup>,
        specs: Vec<ValueSpec>,
    },
    Var {
        specs: Vec<ValueSpec>,
    },
    Func(FuncDecl),
}

#[derive(Debug, Clone)]
pub struct TypeSpec {
    pub name: String,
    pub ty: TypeExpr,
    /// Doc comment of the spec itself (inside a grouped `type (...)`)
    pub doc: Option<CommentGroup>,
}

/// One line of a `const` or `var` declaration.
#[derive(Debug, Clone)]
pub struct ValueSpec {
    pub names: Vec<String>,
    /// Declared type; `None` when the type is implied
    pub ty: Option<TypeExpr>,
    pub values: Vec<Expr>,
}

#[derive(Debug, Clone)]
pub struct FuncDecl {
    pub doc: Option<CommentGroup>,
    pub recv: Option<Field>,
    pub name: String,
    pub params: Vec<Field>,
    pub results: Vec<Field>,
    /// Statements of the body; `None` for external declarations
    pub body: Option<Vec<Stmt>>,
}

/// A struct field, a parameter or a receiver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Empty for embedded fields and unnamed parameters
    pub names: Vec<String>,
    pub ty: TypeExpr,
    /// Raw tag literal content without the surrounding quotes
    pub tag: Option<String>,
}

impl Field {
    pub fn is_embedded(&self) -> bool {
        self.names.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeExpr {
    Ident(String),
    Selector { package: String, name: String },
    Pointer(Box<TypeExpr>),
    /// `[]T` when `len` is `None`, `[N]T` otherwise
    Array {
        len: Option<String>,
        elem: Box<TypeExpr>,
    },
    Map {
        key: Box<TypeExpr>,
        value: Box<TypeExpr>,
    },
    Interface,
    Struct(Vec<Field>),
    Func,
    Chan(Box<TypeExpr>),
    /// Variadic parameter `...T`
    Ellipsis(Box<TypeExpr>),
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Ident(name) => write!(f, "{}", name),
            TypeExpr::Selector { package, name } => write!(f, "{}.{}", package, name),
            TypeExpr::Pointer(inner) => write!(f, "*{}", inner),
            TypeExpr::Array { len: None, elem } => write!(f, "[]{}", elem),
            TypeExpr::Array {
                len: Some(len),
                elem,
            } => write!(f, "[{}]{}", len, elem),
            TypeExpr::Map { key, value } => write!(f, "map[{}]{}", key, value),
            TypeExpr::Interface => write!(f, "interface{{}}"),
            TypeExpr::Struct(_) => write!(f, "struct{{...}}"),
            TypeExpr::Func => write!(f, "func(...)"),
            TypeExpr::Chan(inner) => write!(f, "chan {}", inner),
            TypeExpr::Ellipsis(inner) => write!(f, "...{}", inner),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Expr {
    Ident(String),
    Selector {
        base: Box<Expr>,
        name: String,
    },
    Call {
        func: Box<Expr>,
        args: Vec<Expr>,
    },
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: String,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    /// `T{...}`; `ty` is `None` for elided element types
    CompositeLit {
        ty: Option<TypeExpr>,
        elements: Vec<Expr>,
    },
    KeyValue {
        key: Box<Expr>,
        value: Box<Expr>,
    },
    Lit(Literal),
    FuncLit,
    /// A type used in expression position, e.g. the callee of `[]byte(s)`
    Type(TypeExpr),
    /// Index, slice and type-assertion expressions
    Other,
}

impl Expr {
    /// Name of the called function for `f(...)` and `pkg.f(...)`.
    pub fn callee_name(&self) -> Option<&str> {
        match self {
            Expr::Call { func, .. } => match func.as_ref() {
                Expr::Ident(name) => Some(name),
                Expr::Selector { name, .. } => Some(name),
                _ => None,
            },
            _ => None,
        }
    }

    /// Value of a string literal expression.
    pub fn string_value(&self) -> Option<String> {
        match self {
            Expr::Lit(lit) if lit.kind == LitKind::String => Some(lit.unquoted()),
            _ => None,
        }
    }

    /// Converts a type-shaped expression (`pkg.Name`, `Name`) into a type.
    pub fn as_type(&self) -> Option<TypeExpr> {
        match self {
            Expr::Ident(name) => Some(TypeExpr::Ident(name.clone())),
            Expr::Selector { base, name } => match base.as_ref() {
                Expr::Ident(package) => Some(TypeExpr::Selector {
                    package: package.clone(),
                    name: name.clone(),
                }),
                _ => None,
            },
            Expr::Type(ty) => Some(ty.clone()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    Addr,
    Deref,
    Neg,
    Plus,
    Not,
    Xor,
    Recv,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LitKind {
    Int,
    Float,
    Imag,
    Char,
    String,
}

/// A basic literal with its raw spelling and byte offset in the file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Literal {
    pub kind: LitKind,
    pub raw: String,
    pub pos: usize,
}

impl Literal {
    /// Raw text with surrounding quotes or backquotes removed.
    pub fn unquoted(&self) -> String {
        self.raw
            .trim_matches(|c| c == '"' || c == '`' || c == '\'')
            .to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stmt {
    /// `lhs = rhs` or `lhs := rhs` (`define`)
    Assign {
        lhs: Vec<Expr>,
        rhs: Vec<Expr>,
        define: bool,
    },
    Expr(Expr),
    /// Control flow and declarations the generator never inspects
    Other,
}
