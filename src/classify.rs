/// File classification: extension categories, custom regex rules, size
/// buckets, and date granularities.
///
/// Classification is name-based only. The classifier maps a lower-cased,
/// dot-prefixed extension (e.g. ".jpg") to a category label; custom rules
/// are consulted first, then the standard category map, then the `misc`
/// fallback. Matching is order-sensitive in both stages, so the map keeps
/// explicit insertion order rather than hashing.
use chrono::{DateTime, Datelike, Local};
use regex::Regex;
use std::path::PathBuf;

/// Fallback category for extensions nothing else claims.
pub const MISC_CATEGORY: &str = "misc";

/// Error raised when a custom rule's pattern fails to compile.
///
/// Registration is the only place a rule can fail; once constructed a rule
/// is valid for its lifetime.
#[derive(Debug, Clone)]
pub struct RuleError {
    /// The pattern that failed to compile.
    pub pattern: String,
    /// The compiler's reason.
    pub reason: String,
}

impl std::fmt::Display for RuleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Invalid rule pattern '{}': {}", self.pattern, self.reason)
    }
}

impl std::error::Error for RuleError {}

/// A user-registered regex-to-category rule.
///
/// Rules are checked before the standard category map, in insertion order.
/// The pattern matches at the start of the extension, not the full string,
/// so `\.log$` anchors on its own `$` while `\.tar` also matches `.tar.gz`.
#[derive(Debug, Clone)]
pub struct CustomRule {
    pattern: Regex,
    raw: String,
    destination: String,
}

impl CustomRule {
    /// Compiles a rule at registration time.
    ///
    /// The pattern is wrapped in `\A(?:...)` to pin matching to the start
    /// of the subject without otherwise altering its semantics.
    pub fn new(pattern: &str, destination: &str) -> Result<Self, RuleError> {
        let anchored = format!(r"\A(?:{})", pattern);
        let compiled = Regex::new(&anchored).map_err(|e| RuleError {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self {
            pattern: compiled,
            raw: pattern.to_string(),
            destination: destination.to_string(),
        })
    }

    /// The pattern text as the user entered it.
    pub fn pattern(&self) -> &str {
        &self.raw
    }

    /// The category this rule routes matches into.
    pub fn destination(&self) -> &str {
        &self.destination
    }

    fn matches(&self, extension: &str) -> bool {
        self.pattern.is_match(extension)
    }
}

/// One named category and the extension set it claims.
#[derive(Debug, Clone)]
pub struct CategoryEntry {
    name: String,
    extensions: Vec<String>,
}

/// Ordered mapping from category name to extension set.
///
/// Iteration order is insertion order; `category_for` returns the first
/// entry whose set contains the extension. Extensions are stored
/// lower-cased and dot-prefixed.
#[derive(Debug, Clone)]
pub struct CategoryMap {
    entries: Vec<CategoryEntry>,
}

impl CategoryMap {
    /// Creates an empty map.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Creates the map with the standard built-in categories.
    pub fn with_defaults() -> Self {
        let mut map = Self::empty();
        map.add_category(
            "images",
            &[
                ".png", ".jpg", ".jpeg", ".gif", ".webp", ".svg", ".bmp", ".tiff", ".ico",
                ".heic",
            ],
        );
        map.add_category(
            "audio",
            &[".mp3", ".wav", ".ogg", ".flac", ".aac", ".m4a", ".wma"],
        );
        map.add_category(
            "videos",
            &[".mp4", ".mkv", ".avi", ".mov", ".flv", ".wmv", ".webm", ".3gp"],
        );
        map.add_category(
            "documents",
            &[
                ".pdf", ".txt", ".doc", ".docx", ".html", ".htm", ".md", ".rtf", ".odt",
            ],
        );
        map.add_category(
            "archives",
            &[".zip", ".rar", ".7z", ".tar", ".gz", ".bz2", ".xz"],
        );
        map.add_category(
            "code",
            &[
                ".py", ".java", ".c", ".cpp", ".h", ".js", ".ts", ".rs", ".go", ".sh", ".json",
                ".xml", ".yaml", ".yml", ".toml",
            ],
        );
        map
    }

    /// Adds a category at the end of the traversal order.
    ///
    /// If the name already exists, the extensions are merged into the
    /// existing entry instead.
    pub fn add_category(&mut self, name: &str, extensions: &[&str]) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.name == name) {
            for ext in extensions {
                let ext = normalize_extension(ext);
                if !entry.extensions.contains(&ext) {
                    entry.extensions.push(ext);
                }
            }
            return;
        }
        self.entries.push(CategoryEntry {
            name: name.to_string(),
            extensions: extensions.iter().map(|e| normalize_extension(e)).collect(),
        });
    }

    /// Adds one extension to an existing category; creates the category if
    /// it is unknown.
    pub fn add_extension(&mut self, category: &str, extension: &str) {
        self.add_category(category, &[extension]);
    }

    /// Removes an extension from a category. Unknown pairs are a no-op.
    pub fn remove_extension(&mut self, category: &str, extension: &str) {
        let ext = normalize_extension(extension);
        if let Some(entry) = self.entries.iter_mut().find(|e| e.name == category) {
            entry.extensions.retain(|e| *e != ext);
        }
    }

    /// First category (in insertion order) claiming the extension.
    pub fn category_for(&self, extension: &str) -> Option<&str> {
        let ext = extension.to_lowercase();
        self.entries
            .iter()
            .find(|entry| entry.extensions.iter().any(|e| *e == ext))
            .map(|entry| entry.name.as_str())
    }

    /// Category names in traversal order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.name.as_str())
    }
}

impl Default for CategoryMap {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Lower-case and dot-prefix an extension string.
fn normalize_extension(ext: &str) -> String {
    let lower = ext.to_lowercase();
    if lower.starts_with('.') {
        lower
    } else {
        format!(".{}", lower)
    }
}

/// Maps an extension to a category label.
///
/// Total function: unmatched input degrades to [`MISC_CATEGORY`], never an
/// error.
#[derive(Debug, Clone)]
pub struct Classifier {
    map: CategoryMap,
    rules: Vec<CustomRule>,
}

impl Classifier {
    pub fn new(map: CategoryMap) -> Self {
        Self {
            map,
            rules: Vec::new(),
        }
    }

    /// Registers a rule at the end of the precedence order. Rules always
    /// win over the standard map.
    pub fn add_rule(&mut self, rule: CustomRule) {
        self.rules.push(rule);
    }

    pub fn rules(&self) -> &[CustomRule] {
        &self.rules
    }

    pub fn map(&self) -> &CategoryMap {
        &self.map
    }

    pub fn map_mut(&mut self) -> &mut CategoryMap {
        &mut self.map
    }

    /// Classifies a lower-cased extension like ".jpg".
    ///
    /// Custom rules first in insertion order, then the category map, then
    /// `misc`.
    pub fn classify(&self, extension: &str) -> &str {
        let ext = extension.to_lowercase();
        for rule in &self.rules {
            if rule.matches(&ext) {
                return rule.destination();
            }
        }
        self.map.category_for(&ext).unwrap_or(MISC_CATEGORY)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new(CategoryMap::with_defaults())
    }
}

/// Error raised when a size-bucket table is malformed.
#[derive(Debug, Clone)]
pub enum SizeTableError {
    /// No buckets were supplied.
    Empty,
    /// Two buckets share a name.
    DuplicateName(String),
    /// Upper bounds are not strictly increasing.
    NonIncreasingBound { name: String, bound: u64 },
    /// A bucket has a zero upper bound, so its `[0, 0)` range is empty.
    ZeroBound(String),
}

impl std::fmt::Display for SizeTableError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "Size table has no buckets"),
            Self::DuplicateName(name) => write!(f, "Duplicate size bucket name '{}'", name),
            Self::NonIncreasingBound { name, bound } => {
                write!(
                    f,
                    "Size bucket '{}' bound {} does not increase on the previous bucket",
                    name, bound
                )
            }
            Self::ZeroBound(name) => {
                write!(f, "Size bucket '{}' has a zero upper bound and can never match", name)
            }
        }
    }
}

impl std::error::Error for SizeTableError {}

#[derive(Debug, Clone)]
struct SizeBucket {
    name: String,
    /// Exclusive upper bound in bytes; `None` for the open-ended last bucket.
    max_bytes: Option<u64>,
}

/// Ordered table of `[min, max)` byte-size buckets covering `[0, ∞)`.
///
/// Built from ascending exclusive upper bounds plus an open-ended final
/// bucket, so the table is contiguous and exhaustive by construction.
#[derive(Debug, Clone)]
pub struct SizeTable {
    buckets: Vec<SizeBucket>,
}

impl SizeTable {
    /// Builds a table from `(name, exclusive upper bound)` pairs and the
    /// name of the open-ended final bucket.
    pub fn from_bounds(bounds: &[(&str, u64)], last: &str) -> Result<Self, SizeTableError> {
        if last.is_empty() {
            return Err(SizeTableError::Empty);
        }
        let mut buckets = Vec::with_capacity(bounds.len() + 1);
        let mut previous = None;
        for (name, bound) in bounds {
            if *bound == 0 {
                return Err(SizeTableError::ZeroBound(name.to_string()));
            }
            if let Some(prev) = previous
                && *bound <= prev
            {
                return Err(SizeTableError::NonIncreasingBound {
                    name: name.to_string(),
                    bound: *bound,
                });
            }
            previous = Some(*bound);
            buckets.push(SizeBucket {
                name: name.to_string(),
                max_bytes: Some(*bound),
            });
        }
        buckets.push(SizeBucket {
            name: last.to_string(),
            max_bytes: None,
        });
        for (i, bucket) in buckets.iter().enumerate() {
            if buckets[..i].iter().any(|b| b.name == bucket.name) {
                return Err(SizeTableError::DuplicateName(bucket.name.clone()));
            }
        }
        Ok(Self { buckets })
    }

    /// The standard table: tiny < 100 KiB ≤ small < 10 MiB ≤ medium
    /// < 1 GiB ≤ huge.
    pub fn standard() -> Self {
        Self::from_bounds(
            &[
                ("tiny", 100 * 1024),
                ("small", 10 * 1024 * 1024),
                ("medium", 1024 * 1024 * 1024),
            ],
            "huge",
        )
        .expect("standard size table is well-formed")
    }

    /// Bucket claiming `size`. Total over `[0, ∞)`.
    pub fn bucket_for(&self, size: u64) -> &str {
        for bucket in &self.buckets {
            match bucket.max_bytes {
                Some(max) if size < max => return &bucket.name,
                Some(_) => continue,
                None => return &bucket.name,
            }
        }
        // The last bucket is open-ended, so the loop always returns.
        unreachable!("size table covers all sizes")
    }

    /// Bucket names in ascending size order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.buckets.iter().map(|b| b.name.as_str())
    }
}

impl Default for SizeTable {
    fn default() -> Self {
        Self::standard()
    }
}

/// How deep the nested date path goes for date-based organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateGranularity {
    Year,
    YearMonth,
    YearMonthDay,
}

impl DateGranularity {
    /// Relative subpath for a timestamp, e.g. `2024/03` for `YearMonth`.
    pub fn subpath(&self, when: &DateTime<Local>) -> PathBuf {
        let mut path = PathBuf::from(format!("{:04}", when.year()));
        if matches!(self, Self::YearMonth | Self::YearMonthDay) {
            path.push(format!("{:02}", when.month()));
        }
        if matches!(self, Self::YearMonthDay) {
            path.push(format!("{:02}", when.day()));
        }
        path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_classify_standard_extensions() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify(".jpg"), "images");
        assert_eq!(classifier.classify(".pdf"), "documents");
        assert_eq!(classifier.classify(".rs"), "code");
    }

    #[test]
    fn test_classify_is_case_insensitive() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify(".JPG"), "images");
        assert_eq!(classifier.classify(".Mp3"), "audio");
    }

    #[test]
    fn test_classify_unknown_falls_back_to_misc() {
        let classifier = Classifier::default();
        assert_eq!(classifier.classify(".xyz"), MISC_CATEGORY);
        assert_eq!(classifier.classify(""), MISC_CATEGORY);
    }

    #[test]
    fn test_custom_rule_wins_over_standard_map() {
        let mut classifier = Classifier::default();
        classifier.add_rule(CustomRule::new(r"\.pdf$", "invoices").unwrap());
        assert_eq!(classifier.classify(".pdf"), "invoices");
    }

    #[test]
    fn test_custom_rule_precedence_is_insertion_order() {
        let mut classifier = Classifier::default();
        classifier.add_rule(CustomRule::new(r"\.log$", "logs").unwrap());
        classifier.add_rule(CustomRule::new(r"\.log$", "later").unwrap());
        assert_eq!(classifier.classify(".log"), "logs");
    }

    #[test]
    fn test_rule_matches_at_start_not_full_string() {
        let mut classifier = Classifier::default();
        classifier.add_rule(CustomRule::new(r"\.tar", "tarballs").unwrap());
        // Prefix match: ".tar.gz" starts with ".tar".
        assert_eq!(classifier.classify(".tar.gz"), "tarballs");
        // A mid-string match is not enough.
        assert_eq!(classifier.classify(".not-tar"), MISC_CATEGORY);
    }

    #[test]
    fn test_rule_dollar_anchor_still_applies() {
        let mut classifier = Classifier::default();
        classifier.add_rule(CustomRule::new(r"\.log$", "logs").unwrap());
        assert_eq!(classifier.classify(".log"), "logs");
        assert_eq!(classifier.classify(".logx"), MISC_CATEGORY);
    }

    #[test]
    fn test_invalid_rule_pattern_is_typed_error() {
        let err = CustomRule::new("[unclosed", "anywhere").unwrap_err();
        assert_eq!(err.pattern, "[unclosed");
        assert!(!err.reason.is_empty());
    }

    #[test]
    fn test_category_map_first_match_order() {
        let mut map = CategoryMap::empty();
        map.add_category("first", &[".dat"]);
        map.add_category("second", &[".dat"]);
        assert_eq!(map.category_for(".dat"), Some("first"));
    }

    #[test]
    fn test_category_map_mutation() {
        let mut map = CategoryMap::with_defaults();
        map.add_extension("documents", "tex");
        assert_eq!(map.category_for(".tex"), Some("documents"));
        map.remove_extension("documents", ".tex");
        assert_eq!(map.category_for(".tex"), None);
    }

    #[test]
    fn test_size_table_buckets() {
        let table = SizeTable::standard();
        assert_eq!(table.bucket_for(0), "tiny");
        assert_eq!(table.bucket_for(100 * 1024 - 1), "tiny");
        assert_eq!(table.bucket_for(100 * 1024), "small");
        assert_eq!(table.bucket_for(10 * 1024 * 1024), "medium");
        assert_eq!(table.bucket_for(u64::MAX), "huge");
    }

    #[test]
    fn test_size_table_rejects_bad_shapes() {
        assert!(matches!(
            SizeTable::from_bounds(&[("a", 10), ("b", 10)], "c"),
            Err(SizeTableError::NonIncreasingBound { .. })
        ));
        assert!(matches!(
            SizeTable::from_bounds(&[("a", 10)], "a"),
            Err(SizeTableError::DuplicateName(_))
        ));
        // A zero upper bound is a [0, 0) range no size can land in.
        assert!(matches!(
            SizeTable::from_bounds(&[("a", 0), ("b", 10)], "c"),
            Err(SizeTableError::ZeroBound(_))
        ));
    }

    #[test]
    fn test_date_granularity_subpaths() {
        let when = Local.with_ymd_and_hms(2024, 3, 7, 12, 0, 0).unwrap();
        assert_eq!(DateGranularity::Year.subpath(&when), PathBuf::from("2024"));
        assert_eq!(
            DateGranularity::YearMonth.subpath(&when),
            PathBuf::from("2024/03")
        );
        assert_eq!(
            DateGranularity::YearMonthDay.subpath(&when),
            PathBuf::from("2024/03/07")
        );
    }
}
