//! Serialization of the extraction report to YAML or JSON.
//!
//! The report is the flat list of routes and component schemas the engine
//! produced, plus per-file diagnostics when some files failed to parse or
//! yielded no facts.

use crate::extractor::{Route, Schema};
use crate::parser::BatchReport;
use anyhow::{Context, Result};
use clap::ValueEnum;
use log::debug;
use serde::Serialize;
use std::fs;
use std::path::Path;

/// Output format for the report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Yaml,
    Json,
}

/// Everything one run extracted from a project.
#[derive(Debug, Default, Serialize)]
pub struct Report {
    pub routes: Vec<Route>,
    pub schemas: Vec<Schema>,
    #[serde(skip_serializing_if = "BatchReport::is_clean")]
    pub diagnostics: BatchReport,
}

/// Serializes a report to YAML format.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_yaml(report: &Report) -> Result<String> {
    debug!("Serializing report to YAML");
    serde_yaml::to_string(report).context("Failed to serialize report to YAML")
}

/// Serializes a report to JSON format with pretty printing.
///
/// # Errors
///
/// Returns an error if serialization fails.
pub fn serialize_json(report: &Report) -> Result<String> {
    debug!("Serializing report to JSON");
    serde_json::to_string_pretty(report).context("Failed to serialize report to JSON")
}

/// Serializes a report in `format`.
pub fn serialize(report: &Report, format: OutputFormat) -> Result<String> {
    match format {
        OutputFormat::Yaml => serialize_yaml(report),
        OutputFormat::Json => serialize_json(report),
    }
}

/// Writes string content to a file.
///
/// Creates the file and any missing parent directories, or overwrites an
/// existing file.
///
/// # Errors
///
/// Returns an error if the file cannot be created or written to.
pub fn write_to_file(content: &str, path: &Path) -> Result<()> {
    debug!("Writing content to file: {}", path.display());

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }

    fs::write(path, content).with_context(|| format!("Failed to write to file: {}", path.display()))?;

    debug!("Successfully wrote {} bytes to {}", content.len(), path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractor::{Parameter, ParameterLocation};
    use crate::model::HttpMethod;
    use crate::parser::FailedFile;
    use crate::type_map::TypeMapping;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn create_test_report() -> Report {
        let mut properties = BTreeMap::new();
        properties.insert("id".to_string(), Schema::of(TypeMapping::INT64));
        properties.insert("name".to_string(), Schema::string());
        let user = Schema {
            title: Some("User".to_string()),
            schema_type: Some("object".to_string()),
            properties: Some(properties),
            required: Some(vec!["id".to_string()]),
            ..Schema::default()
        };
        Report {
            routes: vec![Route {
                method: HttpMethod::Get,
                path: "/users/{id}".to_string(),
                handler: "get_user".to_string(),
                operation_id: "get_user".to_string(),
                tags: vec!["users".to_string()],
                parameters: vec![Parameter::new("id", ParameterLocation::Path, true, Schema::of(TypeMapping::INT64))],
                request_body: None,
                response: Some(Schema::reference("User")),
                source_file: PathBuf::from("src/main.rs"),
                source_line: 12,
            }],
            schemas: vec![user],
            diagnostics: BatchReport::default(),
        }
    }

    #[test]
    fn test_serialize_yaml() {
        let yaml = serialize_yaml(&create_test_report()).unwrap();

        assert!(yaml.contains("method: GET"));
        assert!(yaml.contains("path: /users/{id}"));
        assert!(yaml.contains("in: path"));
        assert!(yaml.contains("$ref: '#/components/schemas/User'"));
        assert!(yaml.contains("format: int64"));
        assert!(!yaml.contains("request_body"));
        assert!(!yaml.contains("diagnostics"));
    }

    #[test]
    fn test_serialize_json() {
        let json = serialize_json(&create_test_report()).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();

        let route = &value["routes"][0];
        assert_eq!(route["method"], "GET");
        assert_eq!(route["operation_id"], "get_user");
        assert_eq!(route["parameters"][0]["in"], "path");
        assert_eq!(route["parameters"][0]["schema"]["type"], "integer");
        assert_eq!(route["response"]["$ref"], "#/components/schemas/User");
        assert_eq!(value["schemas"][0]["title"], "User");
        assert_eq!(value["schemas"][0]["required"][0], "id");
        // pretty printed
        assert!(json.contains("\n  "));
    }

    #[test]
    fn test_diagnostics_are_reported_when_present() {
        let mut report = create_test_report();
        report.diagnostics.failed.push(FailedFile {
            path: PathBuf::from("src/broken.rs"),
            error: "expected `}`".to_string(),
        });
        report.diagnostics.empty.push(PathBuf::from("src/empty.py"));

        let value: serde_json::Value = serde_json::from_str(&serialize(&report, OutputFormat::Json).unwrap()).unwrap();
        assert_eq!(value["diagnostics"]["failed"][0]["path"], "src/broken.rs");
        assert_eq!(value["diagnostics"]["empty"][0], "src/empty.py");
    }

    #[test]
    fn test_write_to_file() {
        let temp_dir = TempDir::new().unwrap();
        let file_path = temp_dir.path().join("out/nested/report.yaml");

        write_to_file("routes: []\n", &file_path).unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "routes: []\n");

        write_to_file("routes: [1]\n", &file_path).unwrap();
        assert_eq!(fs::read_to_string(&file_path).unwrap(), "routes: [1]\n");
    }
}
