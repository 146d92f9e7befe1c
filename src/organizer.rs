/// Organization orchestration.
///
/// The organizer snapshots a directory's immediate files, decides a group
/// for each (category, date path, or size bucket), moves the file to a
/// collision-free destination, and appends a record to the operation log.
/// The log is persisted after every move. A failure on one file never
/// aborts the rest of the pass.
use crate::classify::{Classifier, CustomRule, DateGranularity, MISC_CATEGORY, RuleError, SizeTable};
use crate::config::{CompiledFilters, Config, ConfigError, LOCAL_CONFIG_FILE_NAME};
use crate::oplog::{HISTORY_FILE_NAME, MoveRecord, OperationLog, OrganizeError, OrganizeResult};
use crate::output::Diagnostics;
use crate::undo::{UndoEngine, UndoOutcome, UndoReport};
use chrono::{DateTime, Local};
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// How a pass groups files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrganizeMethod {
    /// By extension-derived category (custom rules apply).
    Extension,
    /// By creation date, nested to the given granularity.
    Date(DateGranularity),
    /// By size bucket.
    Size,
}

/// One planned move, as shown by `preview`.
#[derive(Debug, Clone)]
pub struct PlannedMove {
    pub file_name: String,
    /// Group label: category name, date path, or bucket name.
    pub group: String,
    pub destination: PathBuf,
}

/// What an organize pass did.
#[derive(Debug, Default)]
pub struct OrganizeSummary {
    /// (file name, group) for each successful move.
    pub moved: Vec<(String, String)>,
    /// (path, reason) for each file that was skipped over an error.
    pub failures: Vec<(PathBuf, String)>,
}

impl OrganizeSummary {
    /// Moved-file counts per group, for the summary table.
    pub fn group_counts(&self) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for (_, group) in &self.moved {
            *counts.entry(group.clone()).or_insert(0) += 1;
        }
        counts
    }
}

/// Drives classification passes over one directory and owns its log.
///
/// The directory is treated as exclusively owned by this organizer for the
/// session; there is no defense against concurrent external mutation
/// beyond per-file isolate-and-continue.
pub struct Organizer {
    root: PathBuf,
    classifier: Classifier,
    size_table: SizeTable,
    filters: CompiledFilters,
    log: OperationLog,
    diag: Box<dyn Diagnostics>,
}

impl Organizer {
    /// Creates an organizer for `root`, loading its config and any
    /// persisted history.
    pub fn new(
        root: &Path,
        config: &Config,
        diag: Box<dyn Diagnostics>,
    ) -> Result<Self, OrganizerSetupError> {
        if !root.is_dir() {
            return Err(OrganizerSetupError::Organize(OrganizeError::InvalidBasePath {
                path: root.to_path_buf(),
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "not an existing directory",
                ),
            }));
        }

        let mut classifier = Classifier::new(config.category_map());
        for rule in config.custom_rules().map_err(OrganizerSetupError::Config)? {
            classifier.add_rule(rule);
        }
        let size_table = config.size_table().map_err(OrganizerSetupError::Config)?;
        let filters = config
            .compile_filters()
            .map_err(OrganizerSetupError::Config)?;

        let log = OperationLog::load(root.to_path_buf(), diag.as_ref());

        Ok(Self {
            root: root.to_path_buf(),
            classifier,
            size_table,
            filters,
            log,
            diag,
        })
    }

    /// Convenience constructor with default config, for embedding.
    pub fn with_defaults(
        root: &Path,
        diag: Box<dyn Diagnostics>,
    ) -> Result<Self, OrganizerSetupError> {
        Self::new(root, &Config::default(), diag)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Registers a custom rule for the rest of the session.
    pub fn add_custom_rule(&mut self, pattern: &str, destination: &str) -> Result<(), RuleError> {
        let rule = CustomRule::new(pattern, destination)?;
        self.diag
            .info(&format!("Added rule '{}' -> {}", pattern, destination));
        self.classifier.add_rule(rule);
        Ok(())
    }

    pub fn custom_rules(&self) -> &[CustomRule] {
        self.classifier.rules()
    }

    /// Records oldest-first, for history display.
    pub fn history(&self) -> &[MoveRecord] {
        self.log.records()
    }

    /// Empties the in-memory log and deletes its backing file.
    pub fn clear_history(&mut self) -> OrganizeResult<()> {
        self.log.clear()?;
        self.diag.info("Cleared operation history");
        Ok(())
    }

    /// Moves every eligible file into its group directory.
    pub fn organize_files(&mut self, method: OrganizeMethod) -> OrganizeSummary {
        self.organize_files_with(method, |_| {})
    }

    /// As [`organize_files`](Self::organize_files), invoking `on_move`
    /// after each successful move (the CLI drives its progress bar here).
    pub fn organize_files_with(
        &mut self,
        method: OrganizeMethod,
        mut on_move: impl FnMut(&MoveRecord),
    ) -> OrganizeSummary {
        let mut summary = OrganizeSummary::default();
        // Fresh-directory tracking is per pass: group dir -> the highest
        // path component this pass created for it, if any.
        let mut created_this_pass: HashMap<PathBuf, Option<PathBuf>> = HashMap::new();

        for file_path in self.snapshot_files() {
            let group = match self.group_for(&file_path, method) {
                Ok(group) => group,
                Err(e) => {
                    self.diag
                        .error(&format!("Skipping {}: {}", file_path.display(), e));
                    summary.failures.push((file_path, e.to_string()));
                    continue;
                }
            };

            let result = self.move_into_group(&file_path, &group, &mut created_this_pass);
            match result {
                Ok(record) => {
                    self.diag.info(&format!(
                        "Moved {} to {}/",
                        record.file_name(),
                        group.display()
                    ));
                    summary
                        .moved
                        .push((record.file_name(), group_label(&group)));
                    self.log.append(record.clone());
                    if let Err(e) = self.log.save() {
                        self.diag
                            .error(&format!("Could not persist history: {}", e));
                    }
                    on_move(&record);
                }
                Err(e) => {
                    self.diag
                        .error(&format!("Skipping {}: {}", file_path.display(), e));
                    summary.failures.push((file_path, e.to_string()));
                }
            }
        }
        summary
    }

    /// Computes the moves a pass would make, without touching the
    /// filesystem or the log.
    pub fn preview(&self, method: OrganizeMethod) -> Vec<PlannedMove> {
        let mut planned = Vec::new();
        // Destinations already promised within this preview also count as
        // collisions, since nothing has moved yet.
        let mut promised: HashSet<PathBuf> = HashSet::new();

        for file_path in self.snapshot_files() {
            let group = match self.group_for(&file_path, method) {
                Ok(group) => group,
                Err(e) => {
                    self.diag
                        .error(&format!("Cannot plan {}: {}", file_path.display(), e));
                    continue;
                }
            };
            let Some(file_name) = file_path.file_name() else {
                continue;
            };
            let dir = self.root.join(&group);
            let destination = resolve_destination_among(&dir, Path::new(file_name), |p| {
                p.exists() || promised.contains(p)
            });
            promised.insert(destination.clone());
            planned.push(PlannedMove {
                file_name: file_name.to_string_lossy().to_string(),
                group: group_label(&group),
                destination,
            });
        }
        planned
    }

    /// Undoes the most recent recorded move.
    pub fn undo_last(&mut self) -> UndoOutcome {
        UndoEngine::undo_last(&mut self.log, self.diag.as_ref())
    }

    /// Undoes every recorded move, newest first.
    pub fn undo_all(&mut self) -> UndoReport {
        UndoEngine::undo_all(&mut self.log, self.diag.as_ref())
    }

    /// Removes empty standard category directories (plus `misc`).
    ///
    /// Only the managed category set is visited; arbitrary directories are
    /// never touched. Returns the removed names. A removal failure is
    /// logged and the sweep continues.
    pub fn cleanup_empty_directories(&self) -> Vec<String> {
        let mut removed = Vec::new();
        let mut names: Vec<String> = self.classifier.map().names().map(String::from).collect();
        names.push(MISC_CATEGORY.to_string());

        for name in names {
            let dir = self.root.join(&name);
            if !dir.is_dir() || !is_dir_empty(&dir) {
                continue;
            }
            match fs::remove_dir(&dir) {
                Ok(()) => {
                    self.diag
                        .info(&format!("Removed empty directory {}", dir.display()));
                    removed.push(name);
                }
                Err(e) => {
                    self.diag
                        .error(&format!("Could not remove {}: {}", dir.display(), e));
                }
            }
        }
        removed
    }

    /// Immediate file children eligible for a pass, snapshotted before any
    /// mutation so moves cannot invalidate the iteration.
    fn snapshot_files(&self) -> Vec<PathBuf> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                self.diag
                    .error(&format!("Cannot read {}: {}", self.root.display(), e));
                return Vec::new();
            }
        };

        let mut files = Vec::new();
        for entry in entries.flatten() {
            let Ok(file_type) = entry.file_type() else {
                continue;
            };
            if !file_type.is_file() {
                continue;
            }
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            // The log (including a stale save-time temp sibling) and the
            // local config never classify themselves.
            if name.starts_with(HISTORY_FILE_NAME) || name == LOCAL_CONFIG_FILE_NAME {
                continue;
            }
            if self.filters.should_include(&path) {
                files.push(path);
            }
        }
        files.sort();
        files
    }

    /// Relative group subpath for a file under the chosen method.
    fn group_for(&self, file_path: &Path, method: OrganizeMethod) -> OrganizeResult<PathBuf> {
        match method {
            OrganizeMethod::Extension => {
                let ext = extension_of(file_path);
                Ok(PathBuf::from(self.classifier.classify(&ext)))
            }
            OrganizeMethod::Size => {
                let metadata =
                    fs::metadata(file_path).map_err(|e| OrganizeError::MetadataFailed {
                        path: file_path.to_path_buf(),
                        source: e,
                    })?;
                Ok(PathBuf::from(self.size_table.bucket_for(metadata.len())))
            }
            OrganizeMethod::Date(granularity) => {
                let metadata =
                    fs::metadata(file_path).map_err(|e| OrganizeError::MetadataFailed {
                        path: file_path.to_path_buf(),
                        source: e,
                    })?;
                // Creation time where the platform has it, else mtime.
                let stamp = metadata
                    .created()
                    .or_else(|_| metadata.modified())
                    .map_err(|e| OrganizeError::MetadataFailed {
                        path: file_path.to_path_buf(),
                        source: e,
                    })?;
                let when: DateTime<Local> = stamp.into();
                Ok(granularity.subpath(&when))
            }
        }
    }

    /// Moves one file into its group directory and builds its record.
    fn move_into_group(
        &self,
        file_path: &Path,
        group: &Path,
        created_this_pass: &mut HashMap<PathBuf, Option<PathBuf>>,
    ) -> OrganizeResult<MoveRecord> {
        let file_name = file_path
            .file_name()
            .ok_or_else(|| OrganizeError::FileMoveFailure {
                source: file_path.to_path_buf(),
                destination: self.root.join(group),
                source_error: std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    "file has no name component",
                ),
            })?;

        let (dir, created_dir) = self.ensure_group_dir(group, created_this_pass)?;
        let destination = resolve_destination(&dir, Path::new(file_name));

        fs::rename(file_path, &destination).map_err(|e| OrganizeError::FileMoveFailure {
            source: file_path.to_path_buf(),
            destination: destination.clone(),
            source_error: e,
        })?;

        Ok(MoveRecord::new(
            file_path.to_path_buf(),
            destination,
            created_dir,
        ))
    }

    /// Ensures the group directory exists, remembering (per pass) the
    /// highest path component that had to be created for it.
    fn ensure_group_dir(
        &self,
        group: &Path,
        created_this_pass: &mut HashMap<PathBuf, Option<PathBuf>>,
    ) -> OrganizeResult<(PathBuf, Option<PathBuf>)> {
        let dir = self.root.join(group);
        if let Some(created) = created_this_pass.get(&dir) {
            return Ok((dir, created.clone()));
        }

        let mut fresh_root = None;
        let mut probe = self.root.clone();
        for component in group.components() {
            probe.push(component);
            if !probe.exists() {
                fresh_root = Some(probe.clone());
                break;
            }
        }

        if !dir.exists() {
            fs::create_dir_all(&dir).map_err(|e| OrganizeError::DirectoryCreationFailed {
                path: dir.clone(),
                source: e,
            })?;
        }
        created_this_pass.insert(dir.clone(), fresh_root.clone());
        Ok((dir, fresh_root))
    }
}

/// Errors from organizer construction.
#[derive(Debug)]
pub enum OrganizerSetupError {
    Config(ConfigError),
    Organize(OrganizeError),
}

impl std::fmt::Display for OrganizerSetupError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "{}", e),
            Self::Organize(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for OrganizerSetupError {}

/// Lower-cased, dot-prefixed extension of a path; empty when there is none.
fn extension_of(path: &Path) -> String {
    path.extension()
        .map(|ext| format!(".{}", ext.to_string_lossy().to_lowercase()))
        .unwrap_or_default()
}

/// Collision-free destination for `file_name` inside `dir`.
///
/// While the candidate exists, retries with `stem_{n}{ext}` for n = 1, 2,
/// ... Deterministic and side-effect-free.
pub fn resolve_destination(dir: &Path, file_name: &Path) -> PathBuf {
    resolve_destination_among(dir, file_name, |p| p.exists())
}

fn resolve_destination_among(
    dir: &Path,
    file_name: &Path,
    collides: impl Fn(&Path) -> bool,
) -> PathBuf {
    let candidate = dir.join(file_name);
    if !collides(&candidate) {
        return candidate;
    }

    let stem = file_name
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_default();
    let extension = file_name
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mut n = 1;
    loop {
        let candidate = dir.join(format!("{}_{}{}", stem, n, extension));
        if !collides(&candidate) {
            return candidate;
        }
        n += 1;
    }
}

/// Display label for a group subpath ("documents", "2024/03", "tiny").
fn group_label(group: &Path) -> String {
    group
        .iter()
        .map(|c| c.to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn is_dir_empty(dir: &Path) -> bool {
    fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::SilentOutput;
    use tempfile::TempDir;

    fn organizer(root: &Path) -> Organizer {
        Organizer::with_defaults(root, Box::new(SilentOutput)).expect("organizer setup")
    }

    #[test]
    fn test_resolve_destination_without_collision() {
        let temp = TempDir::new().unwrap();
        let dest = resolve_destination(temp.path(), Path::new("a.txt"));
        assert_eq!(dest, temp.path().join("a.txt"));
    }

    #[test]
    fn test_resolve_destination_counts_up_from_one() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "x").unwrap();
        fs::write(temp.path().join("a_1.txt"), "x").unwrap();
        let dest = resolve_destination(temp.path(), Path::new("a.txt"));
        assert_eq!(dest, temp.path().join("a_2.txt"));
    }

    #[test]
    fn test_resolve_destination_no_extension() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("README"), "x").unwrap();
        let dest = resolve_destination(temp.path(), Path::new("README"));
        assert_eq!(dest, temp.path().join("README_1"));
    }

    #[test]
    fn test_organize_by_extension_moves_and_records() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("photo.jpg"), "img").unwrap();
        fs::write(temp.path().join("notes.txt"), "text").unwrap();

        let mut org = organizer(temp.path());
        let summary = org.organize_files(OrganizeMethod::Extension);

        assert_eq!(summary.moved.len(), 2);
        assert!(summary.failures.is_empty());
        assert!(temp.path().join("images").join("photo.jpg").exists());
        assert!(temp.path().join("documents").join("notes.txt").exists());
        assert_eq!(org.history().len(), 2);
        // Both category directories were created by this pass.
        assert!(org.history().iter().all(|r| r.created_dir.is_some()));
    }

    #[test]
    fn test_organize_marks_preexisting_directory() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("images")).unwrap();
        fs::write(temp.path().join("photo.jpg"), "img").unwrap();

        let mut org = organizer(temp.path());
        org.organize_files(OrganizeMethod::Extension);
        assert_eq!(org.history()[0].created_dir, None);
    }

    #[test]
    fn test_organize_unknown_extension_goes_to_misc() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("data.xyz"), "?").unwrap();

        let mut org = organizer(temp.path());
        org.organize_files(OrganizeMethod::Extension);
        assert!(temp.path().join("misc").join("data.xyz").exists());
    }

    #[test]
    fn test_organize_skips_history_and_config_files() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(HISTORY_FILE_NAME), "[]").unwrap();
        fs::write(temp.path().join(LOCAL_CONFIG_FILE_NAME), "").unwrap();

        let mut org = organizer(temp.path());
        let summary = org.organize_files(OrganizeMethod::Extension);
        assert!(summary.moved.is_empty());
        assert!(temp.path().join(HISTORY_FILE_NAME).exists());
        assert!(temp.path().join(LOCAL_CONFIG_FILE_NAME).exists());
    }

    #[test]
    fn test_organize_by_size_buckets() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("small.bin"), vec![0u8; 10]).unwrap();
        fs::write(temp.path().join("bigger.bin"), vec![0u8; 200 * 1024]).unwrap();

        let mut org = organizer(temp.path());
        let summary = org.organize_files(OrganizeMethod::Size);

        assert_eq!(summary.moved.len(), 2);
        assert!(temp.path().join("tiny").join("small.bin").exists());
        assert!(temp.path().join("small").join("bigger.bin").exists());
        assert_eq!(org.history().len(), 2);
    }

    #[test]
    fn test_organize_by_date_builds_nested_path() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("old.txt"), "x").unwrap();

        let mut org = organizer(temp.path());
        let summary = org.organize_files(OrganizeMethod::Date(DateGranularity::YearMonth));

        assert_eq!(summary.moved.len(), 1);
        let record = &org.history()[0];
        // Freshly created year directory is the one recorded for undo.
        let created = record.created_dir.as_ref().unwrap();
        assert_eq!(created.parent().unwrap(), temp.path());
        assert!(record.dest_path.exists());
    }

    #[test]
    fn test_preview_plans_without_moving() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("photo.jpg"), "img").unwrap();

        let org = organizer(temp.path());
        let plan = org.preview(OrganizeMethod::Extension);

        assert_eq!(plan.len(), 1);
        assert_eq!(plan[0].group, "images");
        assert!(temp.path().join("photo.jpg").exists());
        assert!(!temp.path().join("images").exists());
        assert!(org.history().is_empty());
    }

    #[test]
    fn test_preview_accounts_for_existing_collisions() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("misc")).unwrap();
        fs::write(temp.path().join("misc").join("a.xyz"), "old").unwrap();
        fs::write(temp.path().join("a.xyz"), "new").unwrap();

        let org = organizer(temp.path());
        let plan = org.preview(OrganizeMethod::Extension);
        assert_eq!(plan[0].destination, temp.path().join("misc").join("a_1.xyz"));
    }

    #[test]
    fn test_cleanup_removes_only_empty_managed_dirs() {
        let temp = TempDir::new().unwrap();
        fs::create_dir(temp.path().join("images")).unwrap();
        fs::create_dir(temp.path().join("documents")).unwrap();
        fs::write(temp.path().join("documents").join("keep.txt"), "x").unwrap();
        fs::create_dir(temp.path().join("not-managed")).unwrap();

        let org = organizer(temp.path());
        let removed = org.cleanup_empty_directories();

        assert_eq!(removed, vec!["images".to_string()]);
        assert!(temp.path().join("documents").exists());
        assert!(temp.path().join("not-managed").exists());

        // Second sweep has nothing left to do.
        assert!(org.cleanup_empty_directories().is_empty());
    }

    #[test]
    fn test_add_custom_rule_rejects_bad_pattern() {
        let temp = TempDir::new().unwrap();
        let mut org = organizer(temp.path());
        assert!(org.add_custom_rule("[unclosed", "anywhere").is_err());
        assert!(org.custom_rules().is_empty());
    }

    #[test]
    fn test_custom_rule_routes_pass() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("app.log"), "log").unwrap();

        let mut org = organizer(temp.path());
        org.add_custom_rule(r"\.log$", "logs").unwrap();
        org.organize_files(OrganizeMethod::Extension);
        assert!(temp.path().join("logs").join("app.log").exists());
    }

    #[test]
    fn test_clear_history() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("a.txt"), "x").unwrap();

        let mut org = organizer(temp.path());
        org.organize_files(OrganizeMethod::Extension);
        assert!(!org.history().is_empty());

        org.clear_history().unwrap();
        assert!(org.history().is_empty());
        assert!(!temp.path().join(HISTORY_FILE_NAME).exists());
    }
}
