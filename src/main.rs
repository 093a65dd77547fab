//! beego swagger generator - command-line tool.
//!
//! Reads the `routers/router.go` file of a beego project, follows the
//! controller packages it imports and writes a Swagger 2.0 description of
//! the API to `swagger/swagger.json` and `swagger/swagger.yml` inside the
//! project.
//!
//! # Usage
//!
//! ```bash
//! beego-swagger [OPTIONS] <PROJECT_PATH>
//! ```
//!
//! `GOROOT` and `GOPATH` are read from the environment unless given with
//! `--goroot` and `--gopath`.
//!
//! Enable verbose logging:
//! ```bash
//! beego-swagger $GOPATH/src/github.com/acme/shop -v
//! ```

use anyhow::Result;
use beego_swagger::cli;
use clap::Parser;
use log::info;

fn main() -> Result<()> {
    // Parse once to read the verbose flag before the logger exists
    let args_for_verbose = cli::CliArgs::parse();

    let log_level = if args_for_verbose.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("beego swagger generator starting...");

    let args = cli::parse_args_from_parsed(args_for_verbose)?;
    cli::run(args)?;

    info!("Swagger document generation completed successfully");

    Ok(())
}
