//! beego swagger generator - Swagger 2.0 documents from annotated beego projects.
//!
//! The library reads Go sources statically. It needs no Go toolchain and
//! never runs the project. Three kinds of input are combined:
//!
//! - header annotations (`@APIVersion`, `@Title`, ...) in `routers/router.go`
//! - namespace registrations (`beego.NewNamespace(...)`) in the same file
//! - operation annotations (`@router`, `@Param`, `@Success`, ...) on
//!   controller methods, plus the model types they reference
//!
//! # Architecture
//!
//! 1. [`scanner`] - Walks the project and parses every package directory
//! 2. [`parser`] - tree-sitter Go front-end lowered into the [`ast`] model
//! 3. [`package_resolver`] - Maps import paths to directories (vendor, GOPATH)
//! 4. [`type_resolver`] - Declaration lookup, built-in types, struct tags
//! 5. [`schema_generator`] - Turns Go types into schema definitions
//! 6. [`extractor`] - Annotation grammar, controller analysis, namespace walk
//! 7. [`openapi_builder`] - Document model and path binding
//! 8. [`session`] - Owns the state of one run and drives it
//! 9. [`serializer`] - Writes `swagger.json` and `swagger.yml`
//!
//! # Example Usage
//!
//! ```no_run
//! use beego_swagger::{
//!     serializer::write_outputs,
//!     session::{GeneratorConfig, Session},
//! };
//! use std::path::PathBuf;
//!
//! let mut config = GeneratorConfig::new(PathBuf::from("/go/src/github.com/acme/shop"));
//! config.goroot = Some(PathBuf::from("/usr/local/go"));
//! config.gopaths = vec![PathBuf::from("/go")];
//!
//! let output = config.output_path();
//! let mut session = Session::new(config).unwrap();
//! let document = session.generate().unwrap();
//! write_outputs(&document, &output).unwrap();
//!
//! for warning in session.diagnostics().warnings() {
//!     eprintln!("{}", warning);
//! }
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod ast;
pub mod cli;
pub mod error;
pub mod extractor;
pub mod openapi_builder;
pub mod package_resolver;
pub mod parser;
pub mod scanner;
pub mod schema_generator;
pub mod serializer;
pub mod session;
pub mod type_resolver;
