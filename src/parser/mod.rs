//! Per-language backends and the batch driver.
//!
//! Each source language has exactly one [`Backend`]. Three of them wrap a real
//! grammar (`syn` for Rust, tree-sitter for Python and Go); the rest are
//! lexical scanners built on [`crate::lexer`]. Callers dispatch on a
//! [`Language`] tag through [`backend_for`] and never name a backend type.

pub mod clike;
pub mod cpp;
pub mod csharp;
pub mod elixir;
pub mod go;
pub mod java;
pub mod jvm;
pub mod keyword;
pub mod kotlin;
pub mod php;
pub mod python;
pub mod ruby;
pub mod rust;
pub mod scala;
pub mod swift;
pub mod treesitter;
pub mod typescript;

use crate::error::{Error, Result};
use crate::model::SourceUnit;
use crate::type_map::{TypeMapping, TypeShape};
use clap::ValueEnum;
use log::{debug, info, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Source languages with a backend.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    Python,
    Go,
    #[value(name = "csharp")]
    CSharp,
    Java,
    Kotlin,
    Php,
    Ruby,
    Elixir,
    #[value(name = "typescript")]
    TypeScript,
    Scala,
    Swift,
    Cpp,
}

const ALL_LANGUAGES: &[Language] = &[
    Language::Rust,
    Language::Python,
    Language::Go,
    Language::CSharp,
    Language::Java,
    Language::Kotlin,
    Language::Php,
    Language::Ruby,
    Language::Elixir,
    Language::TypeScript,
    Language::Scala,
    Language::Swift,
    Language::Cpp,
];

impl Language {
    pub fn all() -> &'static [Language] {
        ALL_LANGUAGES
    }

    /// The language tag used on the wire (`csharp`, `typescript`, ...).
    pub fn tag(&self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::Python => "python",
            Language::Go => "go",
            Language::CSharp => "csharp",
            Language::Java => "java",
            Language::Kotlin => "kotlin",
            Language::Php => "php",
            Language::Ruby => "ruby",
            Language::Elixir => "elixir",
            Language::TypeScript => "typescript",
            Language::Scala => "scala",
            Language::Swift => "swift",
            Language::Cpp => "cpp",
        }
    }

    /// Parse a language tag, accepting a few common aliases.
    pub fn from_tag(tag: &str) -> Option<Self> {
        let tag = tag.trim().to_lowercase();
        ALL_LANGUAGES
            .iter()
            .copied()
            .find(|l| l.tag() == tag)
            .or(match tag.as_str() {
                "rs" => Some(Language::Rust),
                "py" => Some(Language::Python),
                "golang" => Some(Language::Go),
                "cs" | "c#" => Some(Language::CSharp),
                "kt" => Some(Language::Kotlin),
                "rb" => Some(Language::Ruby),
                "ex" => Some(Language::Elixir),
                "ts" | "javascript" | "js" => Some(Language::TypeScript),
                "c++" | "cxx" => Some(Language::Cpp),
                _ => None,
            })
    }

    /// Classify a file by extension. Play's extension-less `routes` files count as Scala.
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or("");
        if file_name == "routes" || file_name.ends_with(".routes") {
            let in_conf = path
                .parent()
                .and_then(|p| p.file_name())
                .map(|n| n == "conf")
                .unwrap_or(false);
            if in_conf {
                return Some(Language::Scala);
            }
        }
        let ext = path.extension()?.to_str()?.to_lowercase();
        Some(match ext.as_str() {
            "rs" => Language::Rust,
            "py" => Language::Python,
            "go" => Language::Go,
            "cs" => Language::CSharp,
            "java" => Language::Java,
            "kt" | "kts" => Language::Kotlin,
            "php" => Language::Php,
            "rb" => Language::Ruby,
            "ex" | "exs" => Language::Elixir,
            "ts" | "tsx" | "js" | "jsx" | "mjs" | "cjs" => Language::TypeScript,
            "scala" | "sc" => Language::Scala,
            "swift" => Language::Swift,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "h" => Language::Cpp,
            _ => return None,
        })
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// The capability set every language backend implements.
pub trait Backend: Send + Sync {
    fn language(&self) -> Language;

    /// Extract facts from one file.
    ///
    /// Lexical scanners never fail; structural parsers fail only when the
    /// grammar cannot produce a tree at all.
    fn parse(&self, path: &Path, content: &str) -> Result<SourceUnit>;

    /// Map a source type string to an OpenAPI `(type, format)` pair.
    fn map_type(&self, raw: &str) -> TypeMapping;

    /// Classify a source type string.
    fn shape(&self, raw: &str) -> TypeShape;
}

static RUST: rust::RustBackend = rust::RustBackend;
static PYTHON: python::PythonBackend = python::PythonBackend;
static GO: go::GoBackend = go::GoBackend;
static CSHARP: csharp::CSharpBackend = csharp::CSharpBackend;
static JAVA: java::JavaBackend = java::JavaBackend;
static KOTLIN: kotlin::KotlinBackend = kotlin::KotlinBackend;
static PHP: php::PhpBackend = php::PhpBackend;
static RUBY: ruby::RubyBackend = ruby::RubyBackend;
static ELIXIR: elixir::ElixirBackend = elixir::ElixirBackend;
static TYPESCRIPT: typescript::TypeScriptBackend = typescript::TypeScriptBackend;
static SCALA: scala::ScalaBackend = scala::ScalaBackend;
static SWIFT: swift::SwiftBackend = swift::SwiftBackend;
static CPP: cpp::CppBackend = cpp::CppBackend;

/// The backend for `language`.
pub fn backend_for(language: Language) -> &'static dyn Backend {
    match language {
        Language::Rust => &RUST,
        Language::Python => &PYTHON,
        Language::Go => &GO,
        Language::CSharp => &CSHARP,
        Language::Java => &JAVA,
        Language::Kotlin => &KOTLIN,
        Language::Php => &PHP,
        Language::Ruby => &RUBY,
        Language::Elixir => &ELIXIR,
        Language::TypeScript => &TYPESCRIPT,
        Language::Scala => &SCALA,
        Language::Swift => &SWIFT,
        Language::Cpp => &CPP,
    }
}

/// Implements [`Backend`] for a lexical scanner module exposing `scan`.
macro_rules! scanner_backend {
    ($name:ident, $language:expr, $types:ident) => {
        #[derive(Debug, Default, Clone, Copy)]
        pub struct $name;

        impl $crate::parser::Backend for $name {
            fn language(&self) -> $crate::parser::Language {
                $language
            }

            fn parse(
                &self,
                path: &std::path::Path,
                content: &str,
            ) -> $crate::error::Result<$crate::model::SourceUnit> {
                Ok(scan(path, content))
            }

            fn map_type(&self, raw: &str) -> $crate::type_map::TypeMapping {
                $crate::type_map::$types::map_type(raw)
            }

            fn shape(&self, raw: &str) -> $crate::type_map::TypeShape {
                $crate::type_map::$types::shape(raw)
            }
        }
    };
}
pub(crate) use scanner_backend;

/// One input file: path, language tag and raw bytes.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub path: PathBuf,
    pub language: Language,
    pub content: Vec<u8>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, language: Language, content: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            language,
            content: content.into(),
        }
    }
}

/// Parse one file with the backend for `language`.
///
/// Invalid UTF-8 is replaced rather than rejected.
pub fn parse_source(path: &Path, language: Language, content: &[u8]) -> Result<SourceUnit> {
    let text = String::from_utf8_lossy(content);
    debug!("Parsing {} as {}", path.display(), language);
    backend_for(language).parse(path, &text)
}

/// Parse a file named by a language tag string.
pub fn parse_tagged(path: &Path, tag: &str, content: &[u8]) -> Result<SourceUnit> {
    let language =
        Language::from_tag(tag).ok_or_else(|| Error::UnsupportedLanguage(tag.to_string()))?;
    parse_source(path, language, content)
}

/// Per-batch diagnostics: files that failed and files that yielded nothing.
#[derive(Debug, Default, Clone, Serialize)]
pub struct BatchReport {
    pub parsed: usize,
    pub failed: Vec<FailedFile>,
    pub empty: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub error: String,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty() && self.empty.is_empty()
    }
}

/// Parse every file in parallel.
///
/// A failing file never aborts the batch: it is recorded in the report and
/// skipped. Units come back in input order.
pub fn parse_batch(files: &[SourceFile]) -> (Vec<SourceUnit>, BatchReport) {
    info!("Parsing {} files", files.len());

    let results: Vec<(PathBuf, Result<SourceUnit>)> = files
        .par_iter()
        .map(|file| {
            let result = parse_source(&file.path, file.language, &file.content);
            (file.path.clone(), result)
        })
        .collect();

    let mut units = Vec::with_capacity(results.len());
    let mut report = BatchReport::default();
    for (path, result) in results {
        match result {
            Ok(unit) => {
                if unit.is_empty() {
                    debug!("No facts extracted from {}", path.display());
                    report.empty.push(path);
                }
                report.parsed += 1;
                units.push(unit);
            }
            Err(e) => {
                warn!("Failed to parse {}: {}", path.display(), e);
                report.failed.push(FailedFile {
                    path,
                    error: e.to_string(),
                });
            }
        }
    }

    debug!(
        "Parsing complete: {} succeeded, {} failed, {} empty",
        report.parsed,
        report.failed.len(),
        report.empty.len()
    );
    (units, report)
}
