use crate::serializer::write_outputs;
use crate::session::{GeneratorConfig, Session};
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info};
use std::path::PathBuf;

/// beego swagger generator - Generate Swagger 2.0 documents from annotated beego projects
#[derive(Parser, Debug)]
#[command(name = "beego-swagger")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the beego project directory
    #[arg(value_name = "PROJECT_PATH")]
    pub project_path: PathBuf,

    /// Root of the Go distribution
    #[arg(long = "goroot", env = "GOROOT", value_name = "DIR")]
    pub goroot: Option<PathBuf>,

    /// Module roots, separated like the platform's PATH
    #[arg(long = "gopath", env = "GOPATH", value_name = "DIRS")]
    pub gopath: Option<String>,

    /// Router file, relative to the project path
    #[arg(long = "router", value_name = "FILE", default_value = "routers/router.go")]
    pub router_file: PathBuf,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl CliArgs {
    /// Splits the GOPATH list with the platform separator.
    pub fn gopaths(&self) -> Vec<PathBuf> {
        self.gopath
            .as_deref()
            .map(|list| std::env::split_paths(list).collect())
            .unwrap_or_default()
    }

    pub fn to_config(&self) -> GeneratorConfig {
        let mut config = GeneratorConfig::new(self.project_path.clone());
        config.router_file = self.router_file.clone();
        config.goroot = self.goroot.clone();
        config.gopaths = self.gopaths();
        config
    }
}

/// Parse command line arguments
pub fn parse_args() -> Result<CliArgs> {
    let args = CliArgs::parse();
    parse_args_from_parsed(args)
}

/// Validate and log already-parsed arguments
pub fn parse_args_from_parsed(args: CliArgs) -> Result<CliArgs> {
    debug!("Parsed arguments: {:?}", args);

    if !args.project_path.exists() {
        anyhow::bail!(
            "Project path does not exist: {}",
            args.project_path.display()
        );
    }
    if !args.project_path.is_dir() {
        anyhow::bail!(
            "Project path is not a directory: {}",
            args.project_path.display()
        );
    }

    info!("Project path: {}", args.project_path.display());
    info!("Router file: {}", args.router_file.display());
    match &args.goroot {
        Some(goroot) => info!("GOROOT: {}", goroot.display()),
        None => info!("GOROOT: not set"),
    }
    info!("GOPATH entries: {}", args.gopaths().len());

    Ok(args)
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    info!("Starting swagger document generation...");
    let config = args.to_config();
    let output_dir = config.output_path();

    let mut session = Session::new(config).context("Invalid Go environment")?;
    let document = session
        .generate()
        .with_context(|| format!("Failed to analyse {}", args.project_path.display()))?;

    let (json_path, yaml_path) = write_outputs(&document, &output_dir)
        .with_context(|| format!("Failed to write documents to {}", output_dir.display()))?;

    info!("Generation complete!");
    info!("Summary:");
    info!("  - Paths: {}", document.paths.len());
    info!("  - Definitions: {}", document.definitions.len());
    info!("  - Warnings: {}", session.diagnostics().warnings().len());
    info!("  - Output: {}, {}", json_path.display(), yaml_path.display());

    Ok(())
}
