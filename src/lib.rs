//! dirsort - reversible directory organization
//!
//! This library organizes a directory's files into category subdirectories
//! (by extension, creation date, or size bucket), records every move in a
//! persisted operation log, and can undo one move or all of them.

pub mod classify;
pub mod cli;
pub mod config;
pub mod oplog;
pub mod organizer;
pub mod output;
pub mod undo;

pub use classify::{
    CategoryMap, Classifier, CustomRule, DateGranularity, MISC_CATEGORY, RuleError, SizeTable,
};
pub use config::{CompiledFilters, Config, ConfigError};
pub use oplog::{HISTORY_FILE_NAME, MoveRecord, OperationLog, OrganizeError, OrganizeResult};
pub use organizer::{
    OrganizeMethod, OrganizeSummary, Organizer, OrganizerSetupError, PlannedMove,
    resolve_destination,
};
pub use output::{ConsoleOutput, Diagnostics, SilentOutput};
pub use undo::{UndoEngine, UndoOutcome, UndoReport};
