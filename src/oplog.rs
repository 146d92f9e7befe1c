/// Operation records and the persisted operation log.
///
/// Every successful move is recorded here so it can be reversed later. The
/// log is a JSON array persisted at a hidden filename inside the directory
/// it describes; that file is excluded from every scan the organizer runs,
/// so the log never classifies itself.
use crate::output::Diagnostics;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fs;
use std::path::PathBuf;

/// File name of the backing store inside the organized directory.
pub const HISTORY_FILE_NAME: &str = ".dirsort_history.json";

/// Errors that can occur during organization and log persistence.
#[derive(Debug)]
pub enum OrganizeError {
    /// The directory to organize is invalid or doesn't exist.
    InvalidBasePath {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to create a destination directory.
    DirectoryCreationFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to move a file to its destination.
    FileMoveFailure {
        source: PathBuf,
        destination: PathBuf,
        source_error: std::io::Error,
    },
    /// Failed to stat a file (size or creation time).
    MetadataFailed {
        path: PathBuf,
        source: std::io::Error,
    },
    /// Failed to write the history file.
    HistoryWriteFailed { source: std::io::Error },
    /// Failed to read the history file.
    HistoryReadFailed { source: std::io::Error },
    /// The history file is not a JSON array of records.
    InvalidHistoryFormat { reason: String },
}

impl std::fmt::Display for OrganizeError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidBasePath { path, source } => {
                write!(f, "Invalid base path {}: {}", path.display(), source)
            }
            Self::DirectoryCreationFailed { path, source } => {
                write!(
                    f,
                    "Failed to create directory {}: {}",
                    path.display(),
                    source
                )
            }
            Self::FileMoveFailure {
                source,
                destination,
                source_error,
            } => {
                write!(
                    f,
                    "Failed to move {} to {}: {}",
                    source.display(),
                    destination.display(),
                    source_error
                )
            }
            Self::MetadataFailed { path, source } => {
                write!(f, "Failed to stat {}: {}", path.display(), source)
            }
            Self::HistoryWriteFailed { source } => {
                write!(f, "Failed to write history file: {}", source)
            }
            Self::HistoryReadFailed { source } => {
                write!(f, "Failed to read history file: {}", source)
            }
            Self::InvalidHistoryFormat { reason } => {
                write!(f, "Invalid history file format: {}", reason)
            }
        }
    }
}

impl std::error::Error for OrganizeError {}

/// Result type for organization operations.
pub type OrganizeResult<T> = Result<T, OrganizeError>;

/// One completed move, sufficient to reverse it.
///
/// `created_dir` is set only when the move caused its destination directory
/// to be freshly created during that pass; it marks the directory as ours
/// to remove when the move is undone. Immutable after construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoveRecord {
    /// Where the file was before the move.
    pub src_path: PathBuf,
    /// Where the file is now. Must exist on disk until the record is undone.
    pub dest_path: PathBuf,
    /// Directory freshly created for this move, if any.
    pub created_dir: Option<PathBuf>,
    /// When the move happened, RFC 3339 on the wire.
    pub timestamp: DateTime<Utc>,
}

impl MoveRecord {
    pub fn new(src_path: PathBuf, dest_path: PathBuf, created_dir: Option<PathBuf>) -> Self {
        Self {
            src_path,
            dest_path,
            created_dir,
            timestamp: Utc::now(),
        }
    }

    /// File name component of the moved file, for display.
    pub fn file_name(&self) -> String {
        self.dest_path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default()
    }
}

/// Ordered, persisted sequence of move records for one directory.
///
/// Append-only during organization, pop-from-tail during undo. The
/// in-memory list is the source of truth for the session; persistence
/// failures are surfaced but never roll back in-memory state.
#[derive(Debug)]
pub struct OperationLog {
    dir: PathBuf,
    records: Vec<MoveRecord>,
}

impl OperationLog {
    /// Creates an empty log for a directory, without touching disk.
    pub fn new(dir: PathBuf) -> Self {
        Self {
            dir,
            records: Vec::new(),
        }
    }

    /// Loads the log from the directory's backing file.
    ///
    /// A missing file yields an empty log. An unreadable or malformed
    /// document degrades to an empty log with an error diagnostic. A record
    /// that fails to decode is skipped with a diagnostic; the rest load.
    pub fn load(dir: PathBuf, diag: &dyn Diagnostics) -> Self {
        let mut log = Self::new(dir);
        let path = log.file_path();
        if !path.exists() {
            return log;
        }

        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                diag.error(&format!(
                    "Could not read history file {}: {}",
                    path.display(),
                    e
                ));
                return log;
            }
        };

        let document: Value = match serde_json::from_str(&text) {
            Ok(value) => value,
            Err(e) => {
                diag.error(&format!("History file is not valid JSON: {}", e));
                return log;
            }
        };

        let Some(entries) = document.as_array() else {
            diag.error("History file is not a JSON array; starting with empty history");
            return log;
        };

        for (index, entry) in entries.iter().enumerate() {
            match serde_json::from_value::<MoveRecord>(entry.clone()) {
                Ok(record) => log.records.push(record),
                Err(e) => {
                    diag.error(&format!("Skipping unreadable history record {}: {}", index, e));
                }
            }
        }
        log
    }

    /// Path of the backing file inside the log's directory.
    pub fn file_path(&self) -> PathBuf {
        self.dir.join(HISTORY_FILE_NAME)
    }

    pub fn append(&mut self, record: MoveRecord) {
        self.records.push(record);
    }

    pub fn pop_last(&mut self) -> Option<MoveRecord> {
        self.records.pop()
    }

    /// Records oldest-first.
    pub fn records(&self) -> &[MoveRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Writes the log to its backing file, replacing it atomically with
    /// respect to readers (write to a sibling, then rename over).
    pub fn save(&self) -> OrganizeResult<()> {
        let json = serde_json::to_string_pretty(&self.records).map_err(|e| {
            OrganizeError::HistoryWriteFailed {
                source: std::io::Error::new(
                    std::io::ErrorKind::InvalidData,
                    format!("JSON serialization failed: {}", e),
                ),
            }
        })?;

        let path = self.file_path();
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, json).map_err(|e| OrganizeError::HistoryWriteFailed { source: e })?;
        fs::rename(&tmp_path, &path).map_err(|e| OrganizeError::HistoryWriteFailed { source: e })?;
        Ok(())
    }

    /// Empties the in-memory log and deletes the backing file.
    pub fn clear(&mut self) -> OrganizeResult<()> {
        self.records.clear();
        let path = self.file_path();
        if path.exists() {
            fs::remove_file(&path).map_err(|e| OrganizeError::HistoryWriteFailed { source: e })?;
        }
        Ok(())
    }
}
