//! Configuration loading and file filtering.
//!
//! Configuration is stored in TOML. Every section and key is optional; a
//! missing file yields the built-in defaults.
//!
//! ```toml
//! [filters]
//! enable_hidden_files = true
//!
//! [filters.exclude]
//! filenames = [".DS_Store", "Thumbs.db"]
//! patterns = ["*.tmp", "node_modules/**"]
//! extensions = ["bak", "tmp"]
//! regex = []
//!
//! [filters.include]
//! patterns = []
//!
//! [layout]
//! quarantine_dir = "Duplicates"
//! state_dir = ".blusort"
//! skip_output_dirs = false
//!
//! [classify]
//! date_buckets = ["images", "videos"]
//! extensions = { raw = "images", txt = "documents" }
//!
//! [scan]
//! hash_threads = 0
//! ```

use crate::file_category::{Category, FileMapper};
use glob::Pattern;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fs;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".blusortrc.toml";

/// Errors that can occur during configuration loading and compilation.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Invalid glob pattern '{0}': expected *.ext or dir/**")]
    InvalidGlobPattern(String),

    #[error("Invalid regex pattern '{pattern}': {reason}")]
    InvalidRegexPattern { pattern: String, reason: String },

    #[error("Unknown category '{0}'")]
    UnknownCategory(String),

    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    #[error("IO error reading configuration: {0}")]
    IoError(String),
}

/// Top-level configuration as read from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub filters: FilterRules,
    #[serde(default)]
    pub layout: LayoutConfig,
    #[serde(default)]
    pub classify: ClassifyConfig,
    #[serde(default)]
    pub scan: ScanConfig,
}

/// Rules deciding which files a scan considers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether to include hidden files and files under hidden directories.
    #[serde(default = "default_true")]
    pub enable_hidden_files: bool,

    #[serde(default)]
    pub exclude: ExcludeRules,

    /// Whitelist that overrides exclude rules.
    #[serde(default)]
    pub include: IncludeRules,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            enable_hidden_files: true,
            exclude: ExcludeRules::default(),
            include: IncludeRules::default(),
        }
    }
}

/// Rules for excluding files from the plan.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeRules {
    /// Exact filenames to exclude (e.g., ".DS_Store", "Thumbs.db").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns matched against the path relative to the scan root.
    #[serde(default)]
    pub patterns: Vec<String>,

    /// File extensions to exclude (case-insensitive).
    #[serde(default)]
    pub extensions: Vec<String>,

    /// Regex patterns matched against the file name.
    #[serde(default)]
    pub regex: Vec<String>,
}

/// Rules for including files, overriding exclude rules.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IncludeRules {
    #[serde(default)]
    pub patterns: Vec<String>,
}

/// Names of the directories the tool itself writes under the scan root.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayoutConfig {
    /// Directory receiving duplicates.
    #[serde(default = "default_quarantine_dir")]
    pub quarantine_dir: String,

    /// Directory holding the undo journal.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,

    /// Also skip the category output directories at the scan root. Off by
    /// default: a user's own `Documents/` is scanned like any other folder.
    #[serde(default)]
    pub skip_output_dirs: bool,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            quarantine_dir: default_quarantine_dir(),
            state_dir: default_state_dir(),
            skip_output_dirs: false,
        }
    }
}

/// Classification tweaks.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClassifyConfig {
    /// Categories whose files are bucketed by modification year and month.
    #[serde(default)]
    pub date_buckets: Vec<String>,

    /// Extra extension to category mappings, overriding the built-in table.
    #[serde(default)]
    pub extensions: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScanConfig {
    /// Size of the hashing worker pool; 0 means one worker per CPU.
    #[serde(default)]
    pub hash_threads: usize,
}

fn default_true() -> bool {
    true
}

fn default_quarantine_dir() -> String {
    "Duplicates".to_string()
}

fn default_state_dir() -> String {
    ".blusort".to_string()
}

impl Config {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.blusortrc.toml` in the current directory
    /// 3. Look for `~/.config/blusort/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but cannot be read,
    /// or if any discovered file is malformed.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("blusort")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        Ok(Self::default())
    }

    fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses configuration from a TOML string.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Validates and compiles the configuration into matching structures.
    ///
    /// # Errors
    ///
    /// Returns an error if any regex or glob pattern is invalid, a category
    /// name is unknown, or a layout directory name is not a single plain
    /// path component.
    pub fn compile(self) -> Result<CompiledConfig, ConfigError> {
        let filters = CompiledFilters::new(self.filters)?;

        for name in [&self.layout.quarantine_dir, &self.layout.state_dir] {
            validate_dir_name(name)?;
        }
        if Category::ALL
            .iter()
            .any(|c| c.dir_name() == self.layout.quarantine_dir)
        {
            return Err(ConfigError::InvalidLayout(format!(
                "quarantine directory '{}' collides with a category directory",
                self.layout.quarantine_dir
            )));
        }

        let mut mapper = FileMapper::default();
        for (ext, name) in &self.classify.extensions {
            let category =
                Category::from_name(name).ok_or_else(|| ConfigError::UnknownCategory(name.clone()))?;
            mapper.add_extension_mapping(ext, category);
        }

        let date_buckets = self
            .classify
            .date_buckets
            .iter()
            .map(|name| {
                Category::from_name(name).ok_or_else(|| ConfigError::UnknownCategory(name.clone()))
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        Ok(CompiledConfig {
            filters,
            layout: self.layout,
            mapper,
            date_buckets,
            hash_threads: self.scan.hash_threads,
        })
    }
}

fn validate_dir_name(name: &str) -> Result<(), ConfigError> {
    let mut components = Path::new(name).components();
    match (components.next(), components.next()) {
        (Some(Component::Normal(_)), None) => Ok(()),
        _ => Err(ConfigError::InvalidLayout(format!(
            "'{}' must be a single directory name",
            name
        ))),
    }
}

/// Configuration after validation, ready for the scanner and classifier.
#[derive(Debug)]
pub struct CompiledConfig {
    pub filters: CompiledFilters,
    pub layout: LayoutConfig,
    pub mapper: FileMapper,
    pub date_buckets: BTreeSet<Category>,
    pub hash_threads: usize,
}

impl Default for CompiledConfig {
    fn default() -> Self {
        Self {
            filters: CompiledFilters::allow_all(),
            layout: LayoutConfig::default(),
            mapper: FileMapper::default(),
            date_buckets: BTreeSet::new(),
            hash_threads: 0,
        }
    }
}

impl CompiledConfig {
    /// Directory names at the scan root that a scan never descends into.
    pub fn reserved_dirs(&self) -> Vec<&str> {
        let mut dirs = vec![
            self.layout.quarantine_dir.as_str(),
            self.layout.state_dir.as_str(),
        ];
        if self.layout.skip_output_dirs {
            dirs.extend(Category::ALL.iter().map(|c| c.dir_name()));
        }
        dirs
    }
}

/// Compiled filter rules for efficient file matching.
#[derive(Debug)]
pub struct CompiledFilters {
    enable_hidden_files: bool,
    exclude_filenames: HashSet<String>,
    exclude_extensions: HashSet<String>,
    exclude_patterns: Vec<Pattern>,
    exclude_regexes: Vec<Regex>,
    include_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    fn new(rules: FilterRules) -> Result<Self, ConfigError> {
        let compile_globs = |patterns: &[String]| {
            patterns
                .iter()
                .map(|pattern| {
                    Pattern::new(pattern)
                        .map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
                })
                .collect::<Result<Vec<_>, _>>()
        };

        let exclude_patterns = compile_globs(&rules.exclude.patterns)?;
        let include_patterns = compile_globs(&rules.include.patterns)?;

        let exclude_regexes = rules
            .exclude
            .regex
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|e| ConfigError::InvalidRegexPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            exclude_filenames: rules.exclude.filenames.into_iter().collect(),
            exclude_extensions: rules
                .exclude
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            exclude_patterns,
            exclude_regexes,
            include_patterns,
        })
    }

    /// Filters that let every file through.
    pub fn allow_all() -> Self {
        Self {
            enable_hidden_files: true,
            exclude_filenames: HashSet::new(),
            exclude_extensions: HashSet::new(),
            exclude_patterns: Vec::new(),
            exclude_regexes: Vec::new(),
            include_patterns: Vec::new(),
        }
    }

    /// Check if a file should be part of the plan.
    ///
    /// `relative_path` is the file's path relative to the scan root. Checks
    /// run in this order, with early termination:
    /// 1. Include patterns (whitelist) - if matched, always include
    /// 2. Hidden filter - a hidden file or directory component excludes
    /// 3. Exact filename match
    /// 4. File extension match
    /// 5. Glob pattern match
    /// 6. Regex pattern match on the file name
    /// 7. Default: include
    pub fn should_include(&self, relative_path: &Path) -> bool {
        let file_name = relative_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if self.matches_include_patterns(relative_path) {
            return true;
        }

        if !self.enable_hidden_files && is_hidden(relative_path) {
            return false;
        }

        if self.exclude_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = relative_path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.exclude_extensions.contains(&ext_lower) {
                return false;
            }
        }

        if self
            .exclude_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path))
        {
            return false;
        }

        if self
            .exclude_regexes
            .iter()
            .any(|regex| regex.is_match(&file_name))
        {
            return false;
        }

        true
    }

    fn matches_include_patterns(&self, relative_path: &Path) -> bool {
        self.include_patterns
            .iter()
            .any(|pattern| pattern.matches_path(relative_path))
    }
}

fn is_hidden(relative_path: &Path) -> bool {
    relative_path.components().any(|component| match component {
        Component::Normal(name) => name.to_string_lossy().starts_with('.'),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filters(rules: FilterRules) -> CompiledFilters {
        CompiledFilters::new(rules).unwrap()
    }

    #[test]
    fn test_default_config_includes_everything() {
        let compiled = Config::default().compile().unwrap();
        assert!(compiled.filters.should_include(Path::new(".DS_Store")));
        assert!(compiled.filters.should_include(Path::new("a/b/c.txt")));
        assert_eq!(compiled.layout.quarantine_dir, "Duplicates");
        assert!(compiled.date_buckets.is_empty());
    }

    #[test]
    fn test_hidden_files_excluded_when_disabled() {
        let compiled = filters(FilterRules {
            enable_hidden_files: false,
            ..Default::default()
        });

        assert!(!compiled.should_include(Path::new(".gitignore")));
        assert!(!compiled.should_include(Path::new(".git/config")));
        assert!(compiled.should_include(Path::new("docs/readme.md")));
    }

    #[test]
    fn test_exclude_exact_filename_and_extension() {
        let compiled = filters(FilterRules {
            exclude: ExcludeRules {
                filenames: vec!["Thumbs.db".to_string()],
                extensions: vec!["bak".to_string(), ".tmp".to_string()],
                ..Default::default()
            },
            ..Default::default()
        });

        assert!(!compiled.should_include(Path::new("Thumbs.db")));
        assert!(!compiled.should_include(Path::new("sub/Thumbs.db")));
        assert!(!compiled.should_include(Path::new("file.BAK")));
        assert!(!compiled.should_include(Path::new("file.tmp")));
        assert!(compiled.should_include(Path::new("image.jpg")));
    }

    #[test]
    fn test_glob_pattern_directory_boundary_semantics() {
        let compiled = filters(FilterRules {
            exclude: ExcludeRules {
                patterns: vec!["**/logs/**".to_string()],
                ..Default::default()
            },
            ..Default::default()
        });

        assert!(!compiled.should_include(Path::new("logs/file.txt")));
        assert!(!compiled.should_include(Path::new("app/logs/file.txt")));
        assert!(compiled.should_include(Path::new("my_logs/file.txt")));
    }

    #[test]
    fn test_include_overrides_exclude() {
        let compiled = filters(FilterRules {
            enable_hidden_files: false,
            exclude: ExcludeRules {
                extensions: vec!["log".to_string()],
                ..Default::default()
            },
            include: IncludeRules {
                patterns: vec![".important".to_string(), "keep.log".to_string()],
            },
        });

        assert!(compiled.should_include(Path::new(".important")));
        assert!(compiled.should_include(Path::new("keep.log")));
        assert!(!compiled.should_include(Path::new(".other")));
        assert!(!compiled.should_include(Path::new("drop.log")));
    }

    #[test]
    fn test_exclude_regex_on_file_name() {
        let compiled = filters(FilterRules {
            exclude: ExcludeRules {
                regex: vec![r"^test_.*\.txt$".to_string()],
                ..Default::default()
            },
            ..Default::default()
        });

        assert!(!compiled.should_include(Path::new("deep/test_file.txt")));
        assert!(compiled.should_include(Path::new("file.txt")));
    }

    #[test]
    fn test_invalid_patterns_return_error() {
        let bad_regex = Config {
            filters: FilterRules {
                exclude: ExcludeRules {
                    regex: vec!["[invalid(".to_string()],
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            bad_regex.compile(),
            Err(ConfigError::InvalidRegexPattern { .. })
        ));

        let bad_glob = Config {
            filters: FilterRules {
                exclude: ExcludeRules {
                    patterns: vec!["[invalid".to_string()],
                    ..Default::default()
                },
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(matches!(
            bad_glob.compile(),
            Err(ConfigError::InvalidGlobPattern(_))
        ));
    }

    #[test]
    fn test_from_toml_full_document() {
        let config = Config::from_toml(
            r#"
            [filters]
            enable_hidden_files = false

            [filters.exclude]
            extensions = ["part"]

            [layout]
            quarantine_dir = "Dupes"

            [classify]
            date_buckets = ["images"]
            extensions = { raw = "images", txt = "documents" }

            [scan]
            hash_threads = 2
            "#,
        )
        .unwrap();

        let compiled = config.compile().unwrap();
        assert_eq!(compiled.layout.quarantine_dir, "Dupes");
        assert_eq!(compiled.layout.state_dir, ".blusort");
        assert!(!compiled.layout.skip_output_dirs);
        assert_eq!(compiled.hash_threads, 2);
        assert!(compiled.date_buckets.contains(&Category::Image));
        assert_eq!(
            compiled.mapper.extension_to_category("raw"),
            Some(Category::Image)
        );
        assert_eq!(
            compiled.mapper.extension_to_category("txt"),
            Some(Category::Document)
        );
        assert!(!compiled.filters.should_include(Path::new("movie.part")));
    }

    #[test]
    fn test_unknown_category_rejected() {
        let config = Config::from_toml("[classify]\ndate_buckets = [\"pictures\"]\n").unwrap();
        assert!(matches!(
            config.compile(),
            Err(ConfigError::UnknownCategory(name)) if name == "pictures"
        ));
    }

    #[test]
    fn test_layout_names_validated() {
        let nested = Config::from_toml("[layout]\nquarantine_dir = \"a/b\"\n").unwrap();
        assert!(matches!(
            nested.compile(),
            Err(ConfigError::InvalidLayout(_))
        ));

        let clash = Config::from_toml("[layout]\nquarantine_dir = \"Images\"\n").unwrap();
        assert!(matches!(clash.compile(), Err(ConfigError::InvalidLayout(_))));
    }

    #[test]
    fn test_reserved_dirs_follow_skip_output_dirs() {
        let compiled = Config::default().compile().unwrap();
        assert_eq!(compiled.reserved_dirs(), vec!["Duplicates", ".blusort"]);

        let config = Config::from_toml("[layout]\nskip_output_dirs = true\n").unwrap();
        let compiled = config.compile().unwrap();
        let reserved = compiled.reserved_dirs();
        assert!(reserved.contains(&"Duplicates"));
        assert!(reserved.contains(&".blusort"));
        assert!(reserved.contains(&"Images"));
    }

    #[test]
    fn test_load_missing_explicit_file_errors() {
        let result = Config::load(Some(Path::new("/non/existent/blusort.toml")));
        assert!(matches!(result, Err(ConfigError::ConfigNotFound(_))));
    }
}
