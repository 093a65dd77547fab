//! Analysis session.
//!
//! A [`Session`] owns every table a generation run mutates: visited
//! packages, parsed imports, per-controller models, routes, controller
//! comments and the document under construction. Nothing is global, so
//! runs can be repeated or run side by side.

use crate::ast::SourceFile;
use crate::error::{Error, Result};
use crate::extractor::annotation::{parse_document_tag, DocumentTag};
use crate::extractor::controller::ControllerAnalyzer;
use crate::extractor::namespace::{namespaces, NamespaceWalker};
use crate::extractor::RouteTable;
use crate::openapi_builder::{Document, OpenApiBuilder};
use crate::package_resolver::{GoEnvironment, PackageResolver};
use crate::parser::AstParser;
use crate::scanner::FileScanner;
use crate::schema_generator::SchemaGenerator;
use log::{info, warn};
use std::path::PathBuf;

/// Recoverable problems found during a run.
///
/// Every warning is logged when it is recorded.
#[derive(Debug, Default)]
pub struct Diagnostics {
    warnings: Vec<String>,
}

impl Diagnostics {
    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!("{}", message);
        self.warnings.push(message);
    }

    /// Records a warning that was already logged elsewhere.
    pub fn record(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Like [`Diagnostics::record`], unless the same text is already there.
    pub fn record_once(&mut self, message: impl Into<String>) {
        let message = message.into();
        if !self.warnings.contains(&message) {
            self.warnings.push(message);
        }
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn clear(&mut self) {
        self.warnings.clear();
    }
}

/// Inputs of a generation run
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    pub project_root: PathBuf,
    /// Router file, relative to the project root
    pub router_file: PathBuf,
    /// Output directory, relative to the project root
    pub output_dir: PathBuf,
    pub goroot: Option<PathBuf>,
    pub gopaths: Vec<PathBuf>,
}

impl GeneratorConfig {
    pub fn new(project_root: PathBuf) -> Self {
        Self {
            project_root,
            router_file: PathBuf::from("routers").join("router.go"),
            output_dir: PathBuf::from("swagger"),
            goroot: None,
            gopaths: Vec::new(),
        }
    }

    pub fn router_path(&self) -> PathBuf {
        self.project_root.join(&self.router_file)
    }

    pub fn output_path(&self) -> PathBuf {
        self.project_root.join(&self.output_dir)
    }
}

pub struct Session {
    config: GeneratorConfig,
    packages: PackageResolver,
    schemas: SchemaGenerator,
    routes: RouteTable,
    builder: OpenApiBuilder,
    diagnostics: Diagnostics,
}

impl Session {
    /// Creates a session for one project.
    ///
    /// # Errors
    ///
    /// [`Error::Environment`] when GOROOT or GOPATH is missing.
    pub fn new(config: GeneratorConfig) -> Result<Self> {
        let env = GoEnvironment::new(config.goroot.clone(), config.gopaths.clone())?;
        let packages = PackageResolver::new(config.project_root.clone(), env);
        Ok(Self {
            config,
            packages,
            schemas: SchemaGenerator::new(),
            routes: RouteTable::new(),
            builder: OpenApiBuilder::new(),
            diagnostics: Diagnostics::default(),
        })
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn schemas(&self) -> &SchemaGenerator {
        &self.schemas
    }

    pub fn routes(&self) -> &RouteTable {
        &self.routes
    }

    /// Forgets everything learned by a previous run.
    pub fn reset(&mut self) {
        self.packages.reset();
        self.schemas = SchemaGenerator::new();
        self.routes.clear();
        self.builder = OpenApiBuilder::new();
        self.diagnostics.clear();
    }

    /// Runs the whole analysis and returns the finished document.
    ///
    /// The session is reset first, so repeated calls on an unchanged
    /// project give identical documents.
    ///
    /// # Errors
    ///
    /// Any fatal condition: an unreadable or unparsable router file, an
    /// imported package that cannot be found, or a malformed mandatory
    /// annotation. Other Go files that fail to parse are skipped with a
    /// warning.
    pub fn generate(&mut self) -> Result<Document> {
        self.reset();

        info!("Scanning project {}", self.config.project_root.display());
        let scan = FileScanner::new(self.config.project_root.clone()).scan()?;
        for warning in scan.warnings {
            self.diagnostics.record(warning);
        }
        info!("Found {} package(s)", scan.packages.len());
        self.packages.set_base_packages(scan.packages);

        let router_path = self.config.router_path();
        let router = AstParser::parse_file(&router_path).map_err(|e| Error::EntryFile {
            file: router_path.clone(),
            message: e.to_string(),
        })?;

        self.apply_document_tags(&router)?;

        for import in &router.imports {
            let mut analyzer = ControllerAnalyzer {
                packages: &mut self.packages,
                schemas: &mut self.schemas,
                routes: &mut self.routes,
                diagnostics: &mut self.diagnostics,
            };
            analyzer.analyse_package(import)?;
        }

        let roots = namespaces(&router, &mut self.diagnostics);
        info!("Walking {} namespace(s)", roots.len());
        let mut walker = NamespaceWalker::new(&self.routes, &mut self.builder, &mut self.diagnostics);
        for root in &roots {
            walker.walk(root);
        }

        for warning in self.packages.take_skipped() {
            self.diagnostics.record_once(warning);
        }

        let builder = std::mem::take(&mut self.builder);
        let document = builder.build(self.schemas.definitions().clone());
        info!(
            "Generated {} path(s) and {} definition(s) with {} warning(s)",
            document.paths.len(),
            document.definitions.len(),
            self.diagnostics.warnings().len()
        );
        Ok(document)
    }

    /// Reads the document header annotations from the router file comments.
    fn apply_document_tags(&mut self, router: &SourceFile) -> Result<()> {
        for group in &router.comments {
            for line in group.text().lines() {
                let Some(tag) = parse_document_tag(line)? else {
                    continue;
                };
                let document = self.builder.document_mut();
                let info = &mut document.info;
                match tag {
                    DocumentTag::ApiVersion(v) => info.version = Some(v),
                    DocumentTag::Title(v) => info.title = Some(v),
                    DocumentTag::Description(v) => info.description = Some(v),
                    DocumentTag::TermsOfService(v) => info.terms_of_service = Some(v),
                    DocumentTag::ContactEmail(v) => info.contact.email = Some(v),
                    DocumentTag::ContactName(v) => info.contact.name = Some(v),
                    DocumentTag::ContactUrl(v) => info.contact.url = Some(v),
                    DocumentTag::License(v) => {
                        info.license.get_or_insert_with(Default::default).name = Some(v)
                    }
                    DocumentTag::LicenseUrl(v) => {
                        info.license.get_or_insert_with(Default::default).url = Some(v)
                    }
                    DocumentTag::Schemes(v) => document.schemes = v,
                    DocumentTag::Host(v) => document.host = Some(v),
                    DocumentTag::BasePath(v) => document.base_path = Some(v),
                    DocumentTag::SecurityDefinition { name, scheme } => {
                        document.security_definitions.insert(name, scheme);
                    }
                    DocumentTag::Security(requirement) => document.security.push(requirement),
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::fs;
    use tempfile::TempDir;

    fn project(router: &str) -> (TempDir, GeneratorConfig) {
        let temp = TempDir::new().unwrap();
        let root = temp.path().join("gopath/src/example.com/app");
        fs::create_dir_all(root.join("routers")).unwrap();
        fs::create_dir_all(temp.path().join("goroot/src")).unwrap();
        fs::write(root.join("routers/router.go"), router).unwrap();
        let mut config = GeneratorConfig::new(root);
        config.goroot = Some(temp.path().join("goroot"));
        config.gopaths = vec![temp.path().join("gopath")];
        (temp, config)
    }

    #[test]
    fn test_config_defaults() {
        let config = GeneratorConfig::new(PathBuf::from("/srv/app"));
        assert_eq!(config.router_path(), PathBuf::from("/srv/app/routers/router.go"));
        assert_eq!(config.output_path(), PathBuf::from("/srv/app/swagger"));
    }

    #[test]
    fn test_missing_environment_is_fatal() {
        let config = GeneratorConfig::new(PathBuf::from("/srv/app"));
        assert!(matches!(Session::new(config), Err(Error::Environment(_))));
    }

    #[test]
    fn test_header_tags() {
        let (_temp, config) = project(
            r#"// @APIVersion 1.0.0
// @Title shop API
// @Description sells things
// @Contact dev@example.com
// @License Apache 2.0
// @LicenseUrl http://www.apache.org/licenses/LICENSE-2.0.html
// @Schemes http,https
// @SecurityDefinition key apiKey X-Token header "token auth"
// @Security key
package routers
"#,
        );
        let mut session = Session::new(config).unwrap();
        let document = session.generate().unwrap();

        assert_eq!(document.swagger_version, "2.0");
        assert_eq!(document.info.version.as_deref(), Some("1.0.0"));
        assert_eq!(document.info.title.as_deref(), Some("shop API"));
        assert_eq!(document.info.contact.email.as_deref(), Some("dev@example.com"));
        let license = document.info.license.unwrap();
        assert_eq!(license.name.as_deref(), Some("Apache 2.0"));
        assert!(license.url.is_some());
        assert_eq!(document.schemes, vec!["http", "https"]);
        assert_eq!(
            document.security_definitions["key"].description.as_deref(),
            Some("token auth")
        );
        assert_eq!(document.security.len(), 1);
        assert!(document.paths.is_empty());
    }

    #[test]
    fn test_unparsable_router_is_entry_file_error() {
        let (_temp, config) = project("package routers\n\nfunc init( {\n");
        let mut session = Session::new(config).unwrap();
        assert!(matches!(session.generate(), Err(Error::EntryFile { .. })));
    }

    #[test]
    fn test_missing_controller_package_is_fatal() {
        let (_temp, config) = project(
            r#"package routers

import "example.com/app/controllers"
"#,
        );
        let mut session = Session::new(config).unwrap();
        assert!(matches!(
            session.generate(),
            Err(Error::PackageNotFound(ref p)) if p == "example.com/app/controllers"
        ));
    }
}
