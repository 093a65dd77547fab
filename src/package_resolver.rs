use crate::ast::{Package, SourceFile};
use crate::error::{Error, Result};
use crate::parser::AstParser;
use crate::type_resolver::TypeIndex;
use log::{debug, warn};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Import paths of the web framework itself. They are never expanded as
/// controller packages.
pub const FRAMEWORK_PACKAGES: &[&str] = &[
    "github.com/astaxie/beego",
    "github.com/beego/beego/v2/server/web",
];

/// Locations of the Go distribution and the module roots.
#[derive(Debug, Clone)]
pub struct GoEnvironment {
    pub goroot: PathBuf,
    pub gopaths: Vec<PathBuf>,
}

impl GoEnvironment {
    /// Validates the configured roots.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Environment`] when GOROOT is unset or no GOPATH entry
    /// is configured.
    pub fn new(goroot: Option<PathBuf>, gopaths: Vec<PathBuf>) -> Result<Self> {
        let goroot = goroot
            .filter(|p| !p.as_os_str().is_empty())
            .ok_or_else(|| {
                Error::Environment("GOROOT environment variable is not set or empty".to_string())
            })?;
        let gopaths: Vec<PathBuf> = gopaths
            .into_iter()
            .filter(|p| !p.as_os_str().is_empty())
            .collect();
        if gopaths.is_empty() {
            return Err(Error::Environment(
                "GOPATH environment variable is not set or empty".to_string(),
            ));
        }
        Ok(Self { goroot, gopaths })
    }
}

/// Maps import paths to directories and caches parsed packages.
///
/// Lookup order is the project's `vendor` directory first, then
/// `<gopath>/src/<import>` for each configured root. Symlinks are
/// followed.
pub struct PackageResolver {
    project_root: PathBuf,
    env: GoEnvironment,
    /// Import paths already expanded for controller discovery
    visited: HashSet<String>,
    /// Parsed imports; `None` records a failed lookup
    loaded: HashMap<String, Option<Vec<Rc<Package>>>>,
    /// Packages found by the project scan
    base: Vec<Rc<Package>>,
    /// Files left out of loaded packages, not yet reported
    skipped: Vec<String>,
}

impl PackageResolver {
    pub fn new(project_root: PathBuf, env: GoEnvironment) -> Self {
        Self {
            project_root,
            env,
            visited: HashSet::new(),
            loaded: HashMap::new(),
            base: Vec::new(),
            skipped: Vec::new(),
        }
    }

    /// Replaces the project packages that seed every type search.
    pub fn set_base_packages(&mut self, packages: Vec<Package>) {
        self.base = packages.into_iter().map(Rc::new).collect();
    }

    /// Resolves an import path to a physical directory.
    pub fn resolve(&self, import: &str) -> Option<PathBuf> {
        let vendored = self.project_root.join("vendor").join(import);
        std::iter::once(vendored)
            .chain(
                self.env
                    .gopaths
                    .iter()
                    .map(|gopath| gopath.join("src").join(import)),
            )
            .find_map(|candidate| fs::canonicalize(candidate).ok())
    }

    /// Whether the import belongs to the standard distribution.
    pub fn is_system_package(&self, import: &str) -> bool {
        let src = self.env.goroot.join("src");
        exists(&src.join("pkg").join(import)) || exists(&src.join(import))
    }

    pub fn is_framework_package(import: &str) -> bool {
        FRAMEWORK_PACKAGES.contains(&import)
    }

    /// Marks an import path as expanded. Returns `false` when it already
    /// was, in which case the caller must not expand it again.
    pub fn mark_visited(&mut self, import: &str) -> bool {
        self.visited.insert(import.to_string())
    }

    pub fn is_visited(&self, import: &str) -> bool {
        self.visited.contains(import)
    }

    /// Parses the package behind an import path, once.
    ///
    /// Lookup failures are logged and cached as absent; callers treat the
    /// package as unavailable. Files that fail to parse are left out of the
    /// package and reported through [`PackageResolver::take_skipped`].
    pub fn load(&mut self, import: &str) -> Option<Vec<Rc<Package>>> {
        if let Some(cached) = self.loaded.get(import) {
            return cached.clone();
        }
        let packages = match self.resolve(import) {
            Some(dir) => match AstParser::parse_dir(&dir) {
                Ok(parsed) => {
                    for e in parsed.skipped {
                        let warning = format!("Skipped file: {}", e);
                        warn!("{}", warning);
                        self.skipped.push(warning);
                    }
                    Some(parsed.packages.into_iter().map(Rc::new).collect())
                }
                Err(e) => {
                    warn!("Skipping package {}: {}", import, e);
                    None
                }
            },
            None => {
                debug!("Package {} not found on any root", import);
                None
            }
        };
        self.loaded.insert(import.to_string(), packages.clone());
        packages
    }

    /// Package name declared by the sources of an import, if it resolves.
    pub fn real_package_name(&mut self, import: &str) -> Option<String> {
        self.load(import)?
            .iter()
            .map(|pkg| pkg.name.clone())
            .find(|name| !name.is_empty())
    }

    /// Builds the search set for types referenced from `file`: the project
    /// packages plus every non-system package the file imports.
    pub fn type_index_for(&mut self, file: &SourceFile) -> TypeIndex {
        let mut packages = self.base.clone();
        for import in &file.imports {
            if self.is_system_package(&import.path) {
                continue;
            }
            if let Some(loaded) = self.load(&import.path) {
                for pkg in loaded {
                    if !packages.iter().any(|known| known.dir == pkg.dir && known.name == pkg.name) {
                        packages.push(pkg);
                    }
                }
            }
        }
        TypeIndex::new(packages)
    }

    /// Drains the skipped-file warnings collected since the last call.
    pub fn take_skipped(&mut self) -> Vec<String> {
        std::mem::take(&mut self.skipped)
    }

    /// Forgets everything learned during a run.
    pub fn reset(&mut self) {
        self.visited.clear();
        self.loaded.clear();
        self.base.clear();
        self.skipped.clear();
    }
}

fn exists(path: &Path) -> bool {
    fs::canonicalize(path).is_ok()
}
