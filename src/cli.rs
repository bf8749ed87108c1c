use crate::extractor::{unique_operation_ids, Framework, Route, Schema};
use crate::parser::{parse_batch, Language};
use crate::scanner::FileScanner;
use crate::serializer::{serialize, write_to_file, OutputFormat, Report};
use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

/// Polyglot OpenAPI - extract API routes and schemas from web projects in many languages
#[derive(Parser, Debug)]
#[command(name = "polyglot-openapi")]
#[command(author, version, about, long_about = None)]
pub struct CliArgs {
    /// Path to the project directory
    #[arg(value_name = "PROJECT_PATH")]
    pub project_path: PathBuf,

    /// Output format (yaml or json)
    #[arg(short = 'f', long = "format", value_enum, default_value = "yaml")]
    pub output_format: OutputFormat,

    /// Output file path (if not specified, outputs to stdout)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output_path: Option<PathBuf>,

    /// Web framework to extract (repeatable; default: one per language found)
    #[arg(short = 'w', long = "framework", value_enum)]
    pub frameworks: Vec<Framework>,

    /// Only scan files of these languages (repeatable)
    #[arg(short = 'l', long = "language", value_enum)]
    pub languages: Vec<Language>,

    /// Number of parser threads (default: one per CPU)
    #[arg(short = 'j', long = "jobs", value_name = "N")]
    pub jobs: Option<usize>,

    /// Enable verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
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
        anyhow::bail!("Project path does not exist: {}", args.project_path.display());
    }

    if !args.project_path.is_dir() {
        anyhow::bail!("Project path is not a directory: {}", args.project_path.display());
    }

    if args.jobs == Some(0) {
        anyhow::bail!("--jobs must be at least 1");
    }

    info!("Project path: {}", args.project_path.display());
    info!("Output format: {:?}", args.output_format);
    match &args.output_path {
        Some(output) => info!("Output file: {}", output.display()),
        None => info!("Output: stdout"),
    }
    if args.frameworks.is_empty() {
        info!("Frameworks: one default per language found");
    } else {
        info!("Frameworks: {:?}", args.frameworks);
    }

    Ok(args)
}

/// Scan, parse and extract: everything except writing the output.
pub fn generate(args: &CliArgs) -> Result<Report> {
    info!("Scanning project directory...");
    let scan_result = FileScanner::new(args.project_path.clone())
        .with_languages(args.languages.clone())
        .scan()?;

    info!("Found {} source files", scan_result.files.len());
    if scan_result.files.is_empty() {
        anyhow::bail!("No supported source files found in the project directory");
    }

    info!("Parsing source files...");
    let (mut units, diagnostics) = match args.jobs {
        Some(jobs) => rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .build()
            .context("Failed to start parser threads")?
            .install(|| parse_batch(&scan_result.files)),
        None => parse_batch(&scan_result.files),
    };
    for unit in &mut units {
        unit.release_tree();
    }
    for empty in &diagnostics.empty {
        info!("No facts extracted from {}", empty.display());
    }
    info!("Successfully parsed {} files", diagnostics.parsed);

    if units.is_empty() {
        anyhow::bail!("No files could be parsed successfully");
    }

    let frameworks = if args.frameworks.is_empty() {
        let mut frameworks = Vec::new();
        for language in scan_result.languages() {
            for framework in Framework::defaults_for(language) {
                if !frameworks.contains(framework) {
                    frameworks.push(*framework);
                }
            }
        }
        frameworks
    } else {
        args.frameworks.clone()
    };
    info!("Frameworks: {:?}", frameworks);

    info!("Extracting routes...");
    let mut routes: Vec<Route> = Vec::new();
    let mut schemas: BTreeMap<String, Schema> = BTreeMap::new();
    let mut seen = HashSet::new();
    for framework in &frameworks {
        let extractor = framework.extractor();
        let extracted = extractor.extract_routes(&units);
        debug!("Extracted {} routes for {}", extracted.len(), framework);
        for route in extracted {
            let key = (route.source_file.clone(), route.source_line, route.method, route.path.clone());
            if seen.insert(key) {
                routes.push(route);
            }
        }
        for schema in extractor.extract_schemas(&units) {
            if let Some(title) = schema.title.clone() {
                schemas.entry(title).or_insert(schema);
            }
        }
    }
    unique_operation_ids(&mut routes);

    info!("Extracted {} total routes", routes.len());
    if routes.is_empty() {
        warn!("No routes found in the project");
    }

    Ok(Report {
        routes,
        schemas: schemas.into_values().collect(),
        diagnostics,
    })
}

/// Run the main workflow
pub fn run(args: CliArgs) -> Result<()> {
    info!("Starting extraction...");
    let report = generate(&args)?;

    info!("Serializing to {:?} format...", args.output_format);
    let content = serialize(&report, args.output_format)?;

    if let Some(output_path) = &args.output_path {
        info!("Writing output to: {}", output_path.display());
        write_to_file(&content, output_path)?;
    } else {
        println!("{}", content);
    }

    info!("Summary:");
    info!("  - Files parsed: {}", report.diagnostics.parsed);
    info!("  - Files failed: {}", report.diagnostics.failed.len());
    info!("  - Routes found: {}", report.routes.len());
    info!("  - Schemas found: {}", report.schemas.len());

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn args(path: PathBuf) -> CliArgs {
        CliArgs::parse_from(["polyglot-openapi", path.to_str().unwrap()])
    }

    #[test]
    fn test_cli_flags() {
        let parsed = CliArgs::parse_from([
            "polyglot-openapi", "./app", "-f", "json", "-w", "spring", "-w", "actix-web", "-l", "java", "-j", "2", "-v",
        ]);
        assert_eq!(parsed.output_format, OutputFormat::Json);
        assert_eq!(parsed.frameworks, vec![Framework::Spring, Framework::ActixWeb]);
        assert_eq!(parsed.languages, vec![Language::Java]);
        assert_eq!(parsed.jobs, Some(2));
        assert!(parsed.verbose);
    }

    #[test]
    fn test_validation_rejects_missing_and_file_paths() {
        let temp_dir = TempDir::new().unwrap();
        assert!(parse_args_from_parsed(args(temp_dir.path().join("missing"))).is_err());

        let file = temp_dir.path().join("main.rs");
        fs::write(&file, "fn main() {}").unwrap();
        assert!(parse_args_from_parsed(args(file)).is_err());

        assert!(parse_args_from_parsed(args(temp_dir.path().to_path_buf())).is_ok());
    }

    #[test]
    fn test_generate_fails_without_sources() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("notes.txt"), "nothing here").unwrap();
        assert!(generate(&args(temp_dir.path().to_path_buf())).is_err());
    }
}
