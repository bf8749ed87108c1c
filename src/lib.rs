//! Polyglot OpenAPI - API surface extraction for web projects in many languages.
//!
//! This library statically analyzes source files and extracts the facts an
//! OpenAPI generator needs: declared types and their fields, handler
//! signatures, route declarations and resource macros. Every language has a
//! backend: Rust (via `syn`), Python and Go (via tree-sitter), and lexical
//! scanners for C#, Java, Kotlin, PHP, Ruby, Elixir, TypeScript, Scala,
//! Swift and C++. Framework plugins turn those facts into normalized routes
//! and schemas.
//!
//! # Architecture
//!
//! 1. [`scanner`] - Walks a project directory and classifies files by language
//! 2. [`parser`] - Dispatches each file to its language backend, in parallel
//! 3. [`model`] - The extracted facts (`SourceUnit`, `TypeDecl`, `RouteFact`, ...)
//! 4. [`type_map`] - Per-language type tables mapping source types to OpenAPI types
//! 5. [`path`] and [`resource`] - Route path normalization and resource expansion
//! 6. [`extractor`] - Framework plugins producing routes
//! 7. [`schema_generator`] - Converts type facts to schemas
//! 8. [`serializer`] - Writes the report as YAML or JSON
//!
//! # Example Usage
//!
//! ```no_run
//! use polyglot_openapi::{
//!     extractor::Framework,
//!     parser::parse_batch,
//!     scanner::FileScanner,
//!     serializer::{serialize_yaml, Report},
//! };
//! use std::path::PathBuf;
//!
//! let scan_result = FileScanner::new(PathBuf::from("./my-project")).scan().unwrap();
//! let (units, diagnostics) = parse_batch(&scan_result.files);
//!
//! let extractor = Framework::Spring.extractor();
//! let report = Report {
//!     routes: extractor.extract_routes(&units),
//!     schemas: extractor.extract_schemas(&units),
//!     diagnostics,
//! };
//! println!("{}", serialize_yaml(&report).unwrap());
//! ```
//!
//! # Command-Line Interface
//!
//! For command-line usage, see the [`cli`] module.

pub mod cli;
pub mod error;
pub mod extractor;
pub mod lexer;
pub mod model;
pub mod parser;
pub mod path;
pub mod resource;
pub mod scanner;
pub mod schema_generator;
pub mod serializer;
pub mod type_map;
