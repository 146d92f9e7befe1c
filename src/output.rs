//! Diagnostics sink and console output formatting.
//!
//! The core never configures process-global logging; it writes structured
//! lines to an injected [`Diagnostics`] sink. The console implementation
//! styles them with `colored`, and this module also carries the progress
//! bar and summary table the CLI renders around an organize pass.

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;

/// Sink the core emits diagnostics into.
///
/// Implementations must be callable through a shared reference so one sink
/// can serve the whole session.
pub trait Diagnostics {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
    fn debug(&self, message: &str);
}

/// Console sink with colored styling.
pub struct ConsoleOutput;

impl Diagnostics for ConsoleOutput {
    fn info(&self, message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    fn error(&self, message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    fn debug(&self, message: &str) {
        println!("{}", message.dimmed());
    }
}

impl ConsoleOutput {
    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Prints a plain, unstyled line.
    pub fn plain(message: &str) {
        println!("{}", message);
    }

    /// Prints a notice for actions that changed nothing on disk.
    pub fn preview_notice(message: &str) {
        println!("{}", format!("[PREVIEW] {}", message).yellow());
    }

    /// Progress bar for an organize pass, sized from the preview count.
    pub fn create_progress_bar(total: u64) -> ProgressBar {
        let pb = ProgressBar::new(total);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                .expect("Invalid progress bar template")
                .progress_chars("█▓░"),
        );
        pb
    }

    /// Summary table of moved-file counts per category.
    pub fn summary_table(category_counts: &HashMap<String, usize>, total_files: usize) {
        Self::header("SUMMARY");

        let mut categories: Vec<_> = category_counts.iter().collect();
        categories.sort_by_key(|&(name, _)| name);

        let max_category_len = categories
            .iter()
            .map(|(name, _)| name.len())
            .max()
            .unwrap_or(0)
            .max(8);

        println!(
            "{:<width$} | {}",
            "Category".bold(),
            "Files".bold(),
            width = max_category_len
        );
        println!("{}", "-".repeat(max_category_len + 10));

        for (category, count) in &categories {
            let file_word = if **count == 1 { "file" } else { "files" };
            println!(
                "{:<width$} | {} {}",
                category,
                count.to_string().green(),
                file_word,
                width = max_category_len
            );
        }

        println!("{}", "-".repeat(max_category_len + 10));
        println!(
            "{:<width$} | {} {}",
            "Total".bold(),
            total_files.to_string().green().bold(),
            if total_files == 1 { "file" } else { "files" },
            width = max_category_len
        );
    }
}

/// Sink that discards everything. Used by tests and embedders.
pub struct SilentOutput;

impl Diagnostics for SilentOutput {
    fn info(&self, _message: &str) {}
    fn error(&self, _message: &str) {}
    fn debug(&self, _message: &str) {}
}
