//! Per-directory TOML configuration.
//!
//! An optional config file tunes which files a pass touches and how they
//! are grouped: exclusion filters, extra categories appended to the
//! built-in map, persisted custom rules, and a size-bucket table.
//!
//! # Configuration File Format
//!
//! ```toml
//! [filters]
//! enable_hidden_files = false
//! filenames = [".DS_Store", "Thumbs.db"]
//! patterns = ["*.tmp", "*.partial"]
//! extensions = ["bak", "crdownload"]
//!
//! [[categories]]
//! name = "ebooks"
//! extensions = [".epub", ".mobi"]
//!
//! [[rules]]
//! pattern = '\.log$'
//! destination = "logs"
//!
//! [[size_buckets]]
//! name = "tiny"
//! max_bytes = 102400
//!
//! [[size_buckets]]
//! name = "rest"        # last bucket omits max_bytes, open-ended
//! ```

use crate::classify::{CategoryMap, CustomRule, SizeTable};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the per-directory config file; excluded from every scan.
pub const LOCAL_CONFIG_FILE_NAME: &str = ".dirsort.toml";

/// Errors that can occur while loading or compiling configuration.
#[derive(Debug, Clone)]
pub enum ConfigError {
    /// Configuration file not found at an explicitly given path.
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    ConfigInvalid(String),
    /// Invalid glob pattern in the filter section.
    InvalidGlobPattern(String),
    /// Invalid regex in a persisted custom rule.
    InvalidRegexPattern {
        /// The pattern that failed to compile.
        pattern: String,
        /// Why it is invalid.
        reason: String,
    },
    /// Malformed size-bucket table.
    InvalidSizeTable(String),
    /// IO error while reading configuration.
    IoError(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ConfigNotFound(path) => {
                write!(f, "Configuration file not found: {}", path.display())
            }
            ConfigError::ConfigInvalid(msg) => write!(f, "Invalid configuration: {}", msg),
            ConfigError::InvalidGlobPattern(pattern) => {
                write!(f, "Invalid glob pattern '{}'", pattern)
            }
            ConfigError::InvalidRegexPattern { pattern, reason } => {
                write!(f, "Invalid regex pattern '{}': {}", pattern, reason)
            }
            ConfigError::InvalidSizeTable(reason) => {
                write!(f, "Invalid size bucket table: {}", reason)
            }
            ConfigError::IoError(msg) => write!(f, "IO error reading configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Root configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub filters: FilterRules,

    /// Extra categories appended after the built-in map.
    #[serde(default)]
    pub categories: Vec<CategoryDef>,

    /// Custom rules registered at startup, in file order.
    #[serde(default)]
    pub rules: Vec<RuleDef>,

    /// Size-bucket table; the standard table applies when absent.
    #[serde(default)]
    pub size_buckets: Vec<SizeBucketDef>,
}

/// Which files a pass skips.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterRules {
    /// Whether hidden files (leading ".") are organized. Defaults to false.
    #[serde(default)]
    pub enable_hidden_files: bool,

    /// Exact filenames to skip (e.g. "Thumbs.db").
    #[serde(default)]
    pub filenames: Vec<String>,

    /// Glob patterns to skip (e.g. "*.partial").
    #[serde(default)]
    pub patterns: Vec<String>,

    /// Extensions to skip, without the dot (e.g. "bak").
    #[serde(default)]
    pub extensions: Vec<String>,
}

impl Default for FilterRules {
    fn default() -> Self {
        Self {
            enable_hidden_files: false,
            filenames: Vec::new(),
            patterns: Vec::new(),
            extensions: Vec::new(),
        }
    }
}

/// A user-defined category in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryDef {
    pub name: String,
    pub extensions: Vec<String>,
}

/// A persisted custom rule in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDef {
    pub pattern: String,
    pub destination: String,
}

/// One size bucket; the last entry omits `max_bytes` and is open-ended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SizeBucketDef {
    pub name: String,
    #[serde(default)]
    pub max_bytes: Option<u64>,
}

impl Config {
    /// Loads configuration for a target directory.
    ///
    /// Lookup order:
    /// 1. `explicit` path, if given (missing file is an error here)
    /// 2. `<target>/.dirsort.toml`
    /// 3. `~/.config/dirsort/config.toml`
    /// 4. Built-in defaults
    pub fn load(target_dir: &Path, explicit: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = explicit {
            return Self::load_from_file(path);
        }

        let local = target_dir.join(LOCAL_CONFIG_FILE_NAME);
        if local.exists() {
            return Self::load_from_file(&local);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("dirsort")
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
        toml::from_str(&content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Compiles the filter section into matchable structures.
    pub fn compile_filters(&self) -> Result<CompiledFilters, ConfigError> {
        CompiledFilters::new(&self.filters)
    }

    /// Built-in categories plus the config's extras, in file order.
    pub fn category_map(&self) -> CategoryMap {
        let mut map = CategoryMap::with_defaults();
        for def in &self.categories {
            let extensions: Vec<&str> = def.extensions.iter().map(|s| s.as_str()).collect();
            map.add_category(&def.name, &extensions);
        }
        map
    }

    /// Compiles the persisted custom rules, in file order.
    pub fn custom_rules(&self) -> Result<Vec<CustomRule>, ConfigError> {
        self.rules
            .iter()
            .map(|def| {
                CustomRule::new(&def.pattern, &def.destination).map_err(|e| {
                    ConfigError::InvalidRegexPattern {
                        pattern: e.pattern,
                        reason: e.reason,
                    }
                })
            })
            .collect()
    }

    /// The size table: the config's buckets, or the standard table when
    /// none are defined.
    pub fn size_table(&self) -> Result<SizeTable, ConfigError> {
        if self.size_buckets.is_empty() {
            return Ok(SizeTable::standard());
        }

        let Some((last, bounded)) = self.size_buckets.split_last() else {
            return Ok(SizeTable::standard());
        };
        if last.max_bytes.is_some() {
            return Err(ConfigError::InvalidSizeTable(
                "last bucket must omit max_bytes so the table covers all sizes".to_string(),
            ));
        }
        let bounds: Vec<(&str, u64)> = bounded
            .iter()
            .map(|def| {
                def.max_bytes
                    .map(|max| (def.name.as_str(), max))
                    .ok_or_else(|| {
                        ConfigError::InvalidSizeTable(format!(
                            "bucket '{}' needs max_bytes (only the last bucket is open-ended)",
                            def.name
                        ))
                    })
            })
            .collect::<Result<_, _>>()?;

        SizeTable::from_bounds(&bounds, &last.name)
            .map_err(|e| ConfigError::InvalidSizeTable(e.to_string()))
    }
}

/// Pre-compiled filter structures, so matching never reparses patterns.
pub struct CompiledFilters {
    enable_hidden_files: bool,
    skip_filenames: HashSet<String>,
    skip_extensions: HashSet<String>,
    skip_patterns: Vec<Pattern>,
}

impl CompiledFilters {
    fn new(rules: &FilterRules) -> Result<Self, ConfigError> {
        let skip_patterns = rules
            .patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|_| ConfigError::InvalidGlobPattern(pattern.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            enable_hidden_files: rules.enable_hidden_files,
            skip_filenames: rules.filenames.iter().cloned().collect(),
            skip_extensions: rules
                .extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_lowercase())
                .collect(),
            skip_patterns,
        })
    }

    /// Whether a file belongs in an organize pass.
    ///
    /// Checks in order: hidden-file toggle, exact filename, extension,
    /// glob patterns; files pass by default.
    pub fn should_include(&self, file_path: &Path) -> bool {
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();

        if !self.enable_hidden_files && file_name.starts_with('.') {
            return false;
        }

        if self.skip_filenames.contains(file_name.as_ref()) {
            return false;
        }

        if let Some(ext) = file_path.extension() {
            let ext_lower = ext.to_string_lossy().to_lowercase();
            if self.skip_extensions.contains(&ext_lower) {
                return false;
            }
        }

        !self
            .skip_patterns
            .iter()
            .any(|pattern| pattern.matches_path(file_path))
    }
}
