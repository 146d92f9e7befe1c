/// Undo engine: reverses recorded moves, newest first.
///
/// Policy for a failed reversal: the record is popped from the log before
/// reversal is attempted and is never re-pushed, so `undo_all` terminates
/// in at most N steps for N records. Failure is reported separately
/// through the returned outcome and the diagnostics sink.
use crate::oplog::{MoveRecord, OperationLog};
use crate::output::Diagnostics;
use std::fs;
use std::path::{Path, PathBuf};

/// Outcome of undoing a single record.
#[derive(Debug)]
pub enum UndoOutcome {
    /// The file is back at its recorded source.
    Reverted(MoveRecord),
    /// The log was empty; a signal, not a fault.
    NothingToUndo,
    /// Reversal failed; the record has still been consumed from the log.
    Failed { record: MoveRecord, reason: String },
}

impl UndoOutcome {
    pub fn is_reverted(&self) -> bool {
        matches!(self, Self::Reverted(_))
    }
}

/// Result of an `undo_all` sweep.
#[derive(Debug)]
pub struct UndoReport {
    /// How many records the sweep started with.
    pub attempted: usize,
    /// How many reversals succeeded.
    pub reverted: usize,
    /// Destination path and reason for each failed reversal.
    pub failures: Vec<(PathBuf, String)>,
}

impl UndoReport {
    pub fn is_complete_success(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Consumes the operation log to reverse moves.
pub struct UndoEngine;

impl UndoEngine {
    /// Undoes the most recent move.
    ///
    /// The record is removed from the log and the shrunk log is persisted
    /// before the reversal runs, so a failed reversal cannot be retried by
    /// accident and cannot stall `undo_all`.
    pub fn undo_last(log: &mut OperationLog, diag: &dyn Diagnostics) -> UndoOutcome {
        let Some(record) = log.pop_last() else {
            diag.debug("Nothing to undo");
            return UndoOutcome::NothingToUndo;
        };

        if let Err(e) = log.save() {
            diag.error(&format!("Could not persist history after undo: {}", e));
        }

        match Self::revert(&record, diag) {
            Ok(()) => {
                diag.info(&format!(
                    "Moved {} back to {}",
                    record.file_name(),
                    record.src_path.display()
                ));
                UndoOutcome::Reverted(record)
            }
            Err(reason) => {
                diag.error(&format!(
                    "Could not undo move of {}: {}",
                    record.dest_path.display(),
                    reason
                ));
                UndoOutcome::Failed { record, reason }
            }
        }
    }

    /// Undoes every record in the log, newest first.
    ///
    /// Each record is consumed exactly once whether or not its reversal
    /// succeeds; the log is empty afterward.
    pub fn undo_all(log: &mut OperationLog, diag: &dyn Diagnostics) -> UndoReport {
        let attempted = log.len();
        let mut report = UndoReport {
            attempted,
            reverted: 0,
            failures: Vec::new(),
        };

        for _ in 0..attempted {
            match Self::undo_last(log, diag) {
                UndoOutcome::Reverted(_) => report.reverted += 1,
                UndoOutcome::Failed { record, reason } => {
                    report.failures.push((record.dest_path, reason));
                }
                UndoOutcome::NothingToUndo => break,
            }
        }
        report
    }

    /// Reverses one record: move the file from its destination back to its
    /// source, recreating the source's parent if needed. Afterward, if the
    /// record owns a freshly created directory, empty levels between the
    /// destination and that directory are removed best-effort.
    fn revert(record: &MoveRecord, diag: &dyn Diagnostics) -> Result<(), String> {
        if !record.dest_path.exists() {
            return Err("file no longer at recorded destination".to_string());
        }

        if let Some(parent) = record.src_path.parent()
            && !parent.exists()
        {
            fs::create_dir_all(parent)
                .map_err(|e| format!("could not recreate source directory: {}", e))?;
        }

        fs::rename(&record.dest_path, &record.src_path)
            .map_err(|e| format!("could not move file back: {}", e))?;

        if let Some(created) = &record.created_dir {
            Self::remove_created_dirs(record, created, diag);
        }
        Ok(())
    }

    /// Walks from the destination's parent up to the recorded created
    /// directory, removing each level that is now empty. Stops at the first
    /// non-empty level; removal failures are logged, not propagated.
    fn remove_created_dirs(record: &MoveRecord, created: &Path, diag: &dyn Diagnostics) {
        let mut current = record.dest_path.parent().map(|p| p.to_path_buf());
        while let Some(dir) = current {
            if !dir.starts_with(created) || !dir.exists() {
                break;
            }
            match fs::remove_dir(&dir) {
                Ok(()) => diag.info(&format!("Removed empty directory {}", dir.display())),
                Err(e) => {
                    // Non-empty or locked; either way the walk is done.
                    diag.debug(&format!("Left directory {} in place: {}", dir.display(), e));
                    break;
                }
            }
            if dir == created {
                break;
            }
            current = dir.parent().map(|p| p.to_path_buf());
        }
    }
}
