//! Command-line front-end for dirsort.
//!
//! Parses arguments with clap, then either runs a single one-shot action
//! or drops into the interactive menu. All organization semantics live in
//! [`Organizer`]; this module only reads input and renders results.

use crate::classify::DateGranularity;
use crate::config::Config;
use crate::organizer::{OrganizeMethod, OrganizeSummary, Organizer};
use crate::output::ConsoleOutput;
use crate::undo::UndoOutcome;
use clap::Parser;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;

/// Organize a directory's files into subdirectories, reversibly.
#[derive(Debug, Parser)]
#[command(name = "dirsort", version, about)]
pub struct Cli {
    /// Directory to organize.
    pub directory: PathBuf,

    /// Path to a configuration file (default: <directory>/.dirsort.toml).
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Organize by extension and exit, skipping the menu.
    #[arg(long)]
    pub organize: bool,

    /// Show the planned moves and exit, without moving anything.
    #[arg(long)]
    pub preview: bool,

    /// Undo the most recent recorded move and exit.
    #[arg(long)]
    pub undo: bool,

    /// Undo every recorded move and exit.
    #[arg(long)]
    pub undo_all: bool,
}

/// Runs the CLI to completion. Errors are already user-readable.
pub fn run(cli: Cli) -> Result<(), String> {
    let config = Config::load(&cli.directory, cli.config.as_deref())
        .map_err(|e| format!("Error loading configuration: {}", e))?;
    let mut organizer = Organizer::new(&cli.directory, &config, Box::new(ConsoleOutput))
        .map_err(|e| e.to_string())?;

    if cli.preview {
        render_preview(&organizer, OrganizeMethod::Extension);
        return Ok(());
    }
    if cli.organize {
        organize_with_progress(&mut organizer, OrganizeMethod::Extension);
        return Ok(());
    }
    if cli.undo {
        report_undo_last(&mut organizer);
        return Ok(());
    }
    if cli.undo_all {
        report_undo_all(&mut organizer);
        return Ok(());
    }

    let stdin = io::stdin();
    run_menu(&mut organizer, &mut stdin.lock());
    Ok(())
}

/// Interactive menu loop. Reads numbered choices until exit or EOF.
fn run_menu(organizer: &mut Organizer, input: &mut impl BufRead) {
    loop {
        ConsoleOutput::header("dirsort menu");
        ConsoleOutput::plain("1. Organize files");
        ConsoleOutput::plain("2. Preview organization");
        ConsoleOutput::plain("3. Undo last operation");
        ConsoleOutput::plain("4. Undo all operations");
        ConsoleOutput::plain("5. Show operation history");
        ConsoleOutput::plain("6. Add custom rule");
        ConsoleOutput::plain("7. Cleanup empty directories");
        ConsoleOutput::plain("8. Clear history");
        ConsoleOutput::plain("9. Exit");

        let Some(choice) = prompt(input, "\nEnter your choice (1-9): ") else {
            break;
        };

        match choice.as_str() {
            "1" => {
                let Some(method) = prompt_method(input) else {
                    continue;
                };
                organize_with_progress(organizer, method);
            }
            "2" => {
                let Some(method) = prompt_method(input) else {
                    continue;
                };
                render_preview(organizer, method);
            }
            "3" => report_undo_last(organizer),
            "4" => report_undo_all(organizer),
            "5" => show_history(organizer),
            "6" => {
                let Some(pattern) = prompt(input, "Enter regex pattern (e.g. '\\.log$'): ")
                else {
                    break;
                };
                let Some(destination) = prompt(input, "Enter destination category: ") else {
                    break;
                };
                if let Err(e) = organizer.add_custom_rule(&pattern, &destination) {
                    ConsoleOutput::plain(&format!("Rule not added: {}", e));
                }
            }
            "7" => {
                let removed = organizer.cleanup_empty_directories();
                if removed.is_empty() {
                    ConsoleOutput::plain("No empty directories to remove");
                } else {
                    ConsoleOutput::plain(&format!(
                        "Removed empty directories: {}",
                        removed.join(", ")
                    ));
                }
            }
            "8" => {
                if let Err(e) = organizer.clear_history() {
                    ConsoleOutput::plain(&format!("Could not clear history: {}", e));
                }
            }
            "9" => break,
            _ => ConsoleOutput::plain("Invalid choice. Please try again."),
        }
    }
    ConsoleOutput::plain("Thanks for using dirsort!");
}

/// Asks which grouping method to use. `None` on invalid choice or EOF.
fn prompt_method(input: &mut impl BufRead) -> Option<OrganizeMethod> {
    ConsoleOutput::plain("1. By extension");
    ConsoleOutput::plain("2. By date (year/month)");
    ConsoleOutput::plain("3. By size");
    let choice = prompt(input, "Method (1-3): ")?;
    match choice.as_str() {
        "1" => Some(OrganizeMethod::Extension),
        "2" => Some(OrganizeMethod::Date(DateGranularity::YearMonth)),
        "3" => Some(OrganizeMethod::Size),
        _ => {
            ConsoleOutput::plain("Invalid choice. Please try again.");
            None
        }
    }
}

/// Prints a prompt and reads one trimmed line. `None` on EOF.
fn prompt(input: &mut impl BufRead, text: &str) -> Option<String> {
    print!("{}", text);
    let _ = io::stdout().flush();
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) => None,
        Ok(_) => Some(line.trim().to_string()),
        Err(_) => None,
    }
}

/// Runs an organize pass behind a progress bar sized from the preview.
fn organize_with_progress(organizer: &mut Organizer, method: OrganizeMethod) {
    let planned = organizer.preview(method).len();
    if planned == 0 {
        ConsoleOutput::plain("No files found to organize.");
        return;
    }

    let bar = ConsoleOutput::create_progress_bar(planned as u64);
    let summary = organizer.organize_files_with(method, |_| bar.inc(1));
    bar.finish_and_clear();
    render_summary(&summary);
}

fn render_summary(summary: &OrganizeSummary) {
    ConsoleOutput::summary_table(&summary.group_counts(), summary.moved.len());
    if !summary.failures.is_empty() {
        ConsoleOutput::plain(&format!(
            "\n{} file(s) could not be moved; see errors above.",
            summary.failures.len()
        ));
    }
}

fn render_preview(organizer: &Organizer, method: OrganizeMethod) {
    let plan = organizer.preview(method);
    if plan.is_empty() {
        ConsoleOutput::plain("No files found to organize.");
        return;
    }

    ConsoleOutput::preview_notice("Files would be organized as follows:");
    let mut counts = std::collections::HashMap::new();
    for planned in &plan {
        ConsoleOutput::plain(&format!(
            " - {} -> {}/",
            planned.file_name, planned.group
        ));
        *counts.entry(planned.group.clone()).or_insert(0) += 1;
    }
    ConsoleOutput::summary_table(&counts, plan.len());
    ConsoleOutput::preview_notice("No files were modified.");
}

fn report_undo_last(organizer: &mut Organizer) {
    match organizer.undo_last() {
        UndoOutcome::Reverted(_) => ConsoleOutput::plain("Successfully undid last operation"),
        UndoOutcome::NothingToUndo => ConsoleOutput::plain("No operations to undo"),
        UndoOutcome::Failed { .. } => ConsoleOutput::plain("Could not undo last operation"),
    }
}

fn report_undo_all(organizer: &mut Organizer) {
    let report = organizer.undo_all();
    ConsoleOutput::plain(&format!(
        "Successfully undid {} of {} operations",
        report.reverted, report.attempted
    ));
    for (path, reason) in &report.failures {
        ConsoleOutput::plain(&format!("  Could not undo {}: {}", path.display(), reason));
    }
}

fn show_history(organizer: &Organizer) {
    let history = organizer.history();
    if history.is_empty() {
        ConsoleOutput::plain("No operation history available");
        return;
    }

    ConsoleOutput::header("Operation History");
    for record in history {
        ConsoleOutput::plain(&format!(
            "{}: Moved {}",
            record.timestamp.to_rfc3339(),
            record.file_name()
        ));
        ConsoleOutput::plain(&format!("  From: {}", record.src_path.display()));
        ConsoleOutput::plain(&format!("  To: {}\n", record.dest_path.display()));
    }
}
