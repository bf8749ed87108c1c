//! Polyglot OpenAPI - command-line tool that extracts API routes and schemas.
//!
//! # Usage
//!
//! ```bash
//! polyglot-openapi [OPTIONS] <PROJECT_PATH>
//! ```
//!
//! # Examples
//!
//! Extract every framework found, as YAML:
//! ```bash
//! polyglot-openapi ./my-api-project -o api.yaml
//! ```
//!
//! Only the Spring controllers, as JSON:
//! ```bash
//! polyglot-openapi ./my-api-project -w spring -f json -o api.json
//! ```
//!
//! Enable verbose logging:
//! ```bash
//! polyglot-openapi ./my-api-project -v
//! ```

use anyhow::Result;
use clap::Parser;
use log::info;
use polyglot_openapi::cli;

fn main() -> Result<()> {
    let args = cli::CliArgs::parse();

    let log_level = if args.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };

    env_logger::Builder::from_default_env()
        .filter_level(log_level)
        .init();

    info!("Polyglot OpenAPI starting...");

    let args = cli::parse_args_from_parsed(args)?;
    cli::run(args)?;

    info!("Extraction completed successfully");

    Ok(())
}
