use crate::parser::{Language, SourceFile};
use anyhow::{Context, Result};
use log::{debug, warn};
use std::fs;
use std::path::PathBuf;
use walkdir::WalkDir;

/// Directories that hold dependencies or build output rather than project sources.
const SKIPPED_DIRS: &[&str] = &[
    "target", "node_modules", "vendor", "build", "dist", "out", "bin", "obj", "__pycache__", "venv", "deps",
    "_build", "Pods",
];

/// File scanner for traversing project directories.
///
/// The `FileScanner` recursively walks through a project directory and
/// classifies every file it recognizes into a source [`Language`]. It skips
/// hidden directories (those starting with `.`) and the usual dependency and
/// build-output directories (`target`, `node_modules`, `vendor`, ...).
///
/// # Example
///
/// ```no_run
/// use polyglot_openapi::scanner::FileScanner;
/// use std::path::PathBuf;
///
/// let scanner = FileScanner::new(PathBuf::from("./my-project"));
/// let result = scanner.scan().unwrap();
/// println!("Found {} source files", result.files.len());
/// ```
pub struct FileScanner {
    root_path: PathBuf,
    languages: Vec<Language>,
}

/// Result of directory scanning operation.
pub struct ScanResult {
    /// Loaded source files, in walk order
    pub files: Vec<SourceFile>,
    /// Warning messages for any issues encountered (e.g., inaccessible directories)
    pub warnings: Vec<String>,
}

impl ScanResult {
    /// Distinct languages present in the scanned files, in tag order.
    pub fn languages(&self) -> Vec<Language> {
        let mut languages: Vec<Language> = self.files.iter().map(|f| f.language).collect();
        languages.sort();
        languages.dedup();
        languages
    }
}

impl FileScanner {
    /// Creates a new `FileScanner` for the specified root directory.
    pub fn new(root_path: PathBuf) -> Self {
        Self {
            root_path,
            languages: Vec::new(),
        }
    }

    /// Only keep files in `languages`; an empty list keeps every language.
    pub fn with_languages(mut self, languages: Vec<Language>) -> Self {
        self.languages = languages;
        self
    }

    fn wanted(&self, language: Language) -> bool {
        self.languages.is_empty() || self.languages.contains(&language)
    }

    /// Scans the directory tree and loads every recognized source file.
    ///
    /// Unreadable entries are logged and recorded as warnings; scanning continues.
    ///
    /// # Errors
    ///
    /// Returns an error if the root directory cannot be accessed.
    pub fn scan(&self) -> Result<ScanResult> {
        fs::metadata(&self.root_path)
            .with_context(|| format!("Cannot access {}", self.root_path.display()))?;

        let mut files = Vec::new();
        let mut warnings = Vec::new();

        for entry in WalkDir::new(&self.root_path)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| {
                // Don't filter the root directory itself
                if e.path() == self.root_path {
                    return true;
                }
                let file_name = e.file_name().to_string_lossy();
                let is_hidden = file_name.starts_with('.');
                let is_skipped = e.file_type().is_dir() && SKIPPED_DIRS.contains(&file_name.as_ref());
                !is_hidden && !is_skipped
            })
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    let warning = format!("Failed to access path: {}", e);
                    warn!("{}", warning);
                    warnings.push(warning);
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let Some(language) = Language::from_path(path).filter(|l| self.wanted(*l)) else {
                continue;
            };
            match fs::read(path) {
                Ok(content) => {
                    debug!("Found {} file: {}", language, path.display());
                    files.push(SourceFile::new(path, language, content));
                }
                Err(e) => {
                    let warning = format!("Failed to read {}: {}", path.display(), e);
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }

        Ok(ScanResult { files, warnings })
    }
}
