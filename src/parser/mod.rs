//! Go source front-end.
//!
//! Sources are parsed with tree-sitter's Go grammar; [`lower`] turns the
//! resulting concrete tree into the [`crate::ast`] model.

pub mod lower;

use crate::ast::{Package, SourceFile};
use crate::error::{Error, Result};
use log::debug;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tree_sitter::Language;

/// AST parser for Go source files.
///
/// # Example
///
/// ```no_run
/// use beego_swagger::parser::AstParser;
/// use std::path::Path;
///
/// let file = AstParser::parse_file(Path::new("routers/router.go")).unwrap();
/// println!("package {} has {} declarations", file.package, file.decls.len());
/// ```
pub struct AstParser;

/// Packages of one directory plus the files that failed to parse.
#[derive(Debug, Default)]
pub struct ParsedDir {
    pub packages: Vec<Package>,
    /// One [`Error::ParseError`] or [`Error::IoError`] per skipped file
    pub skipped: Vec<Error>,
}

impl AstParser {
    /// Parses a single Go source file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or contains a syntax
    /// error.
    pub fn parse_file(path: &Path) -> Result<SourceFile> {
        debug!("Parsing file: {}", path.display());
        let content = fs::read_to_string(path)?;
        Self::parse_source(path, &content)
    }

    /// Parses Go source text; `path` is only recorded in the result and in
    /// error messages.
    pub fn parse_source(path: &Path, source: &str) -> Result<SourceFile> {
        let source = source.strip_prefix('\u{feff}').unwrap_or(source);
        let syntax_error = |line: usize, message: String| Error::ParseError {
            file: path.to_path_buf(),
            line,
            message,
        };

        let mut parser = tree_sitter::Parser::new();
        let language: Language = tree_sitter_go::LANGUAGE.into();
        parser
            .set_language(&language)
            .map_err(|e| syntax_error(0, e.to_string()))?;
        let tree = parser
            .parse(source, None)
            .ok_or_else(|| syntax_error(0, "parser returned no tree".to_string()))?;

        let root = tree.root_node();
        if let Some((line, message)) = lower::first_error(root, source) {
            return Err(syntax_error(line, message));
        }
        Ok(lower::Lowering::new(source, root).file(root, path))
    }

    /// Parses every `.go` file of one directory (not recursive) and groups
    /// the files by package clause.
    ///
    /// Dot-prefixed files are skipped. Files are parsed in name order so the
    /// result is deterministic. A file that fails to parse is left out and
    /// reported in [`ParsedDir::skipped`]; the rest of the directory is
    /// still returned.
    ///
    /// # Errors
    ///
    /// Only when the directory itself cannot be listed.
    pub fn parse_dir(dir: &Path) -> Result<ParsedDir> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            let is_source = path.is_file()
                && path.extension().and_then(|s| s.to_str()) == Some("go")
                && !path
                    .file_name()
                    .and_then(|s| s.to_str())
                    .is_some_and(|name| name.starts_with('.'));
            if is_source {
                paths.push(path);
            }
        }
        paths.sort();

        let mut packages: BTreeMap<String, Package> = BTreeMap::new();
        let mut skipped = Vec::new();
        for path in paths {
            let file = match Self::parse_file(&path) {
                Ok(file) => file,
                Err(e) => {
                    debug!("Skipping {}: {}", path.display(), e);
                    skipped.push(e);
                    continue;
                }
            };
            packages
                .entry(file.package.clone())
                .or_insert_with(|| Package {
                    name: file.package.clone(),
                    dir: dir.to_path_buf(),
                    files: Vec::new(),
                })
                .files
                .push(file);
        }

        debug!(
            "Parsed {} package(s) from {}, skipped {} file(s)",
            packages.len(),
            dir.display(),
            skipped.len()
        );
        Ok(ParsedDir {
            packages: packages.into_values().collect(),
            skipped,
        })
    }
}
