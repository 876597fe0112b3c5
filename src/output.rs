//! Output formatting and styling module.
//!
//! Provides a centralized interface for all CLI output: colored status
//! lines, progress bars, and the plan / apply / undo reports.

use crate::classifier::ReasonCode;
use crate::executor::ApplyReport;
use crate::plan::Plan;
use crate::undo::UndoResult;
use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::BTreeMap;
use std::path::Path;

/// Manages all CLI output with consistent styling and formatting.
pub struct OutputFormatter;

impl OutputFormatter {
    /// Prints a success message in green with a checkmark.
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Prints an error message in red with an X mark.
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Prints a warning message in yellow with a warning symbol.
    pub fn warning(message: &str) {
        println!("{} {}", "⚠".yellow(), message);
    }

    /// Prints an info message in cyan.
    pub fn info(message: &str) {
        println!("{}", message.cyan());
    }

    /// Prints a section header.
    pub fn header(header: &str) {
        println!("\n{}", header.bold());
    }

    /// Creates a progress bar drawn on stderr.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use blusort::output::OutputFormatter;
    /// let pb = OutputFormatter::create_progress_bar("Hashing");
    /// pb.set_length(100);
    /// pb.inc(1);
    /// pb.finish_and_clear();
    /// ```
    pub fn create_progress_bar(message: &'static str) -> ProgressBar {
        let pb = ProgressBar::new(0);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.cyan} {msg} [{bar:40.cyan/blue}] {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("█▓░");
        pb.set_style(style);
        pb.set_message(message);
        pb
    }

    /// Prints every plan item as `index  from → to  reason`.
    pub fn print_plan(plan: &Plan) {
        Self::header(&format!("PLAN for {}", plan.root().display()));

        if plan.is_empty() {
            Self::info("No files found to organize.");
            return;
        }

        for (index, item) in plan.items().iter().enumerate() {
            let reason = match item.reason {
                ReasonCode::DuplicateOf => item.reason.to_string().yellow(),
                ReasonCode::Unclassified => item.reason.to_string().dimmed(),
                _ => item.reason.to_string().green(),
            };
            println!(
                "{:>5}  {} → {}  {}",
                index.to_string().dimmed(),
                relative(plan.root(), &item.from),
                relative(plan.root(), &item.to),
                reason
            );
            if let Some(original) = &item.duplicate_of {
                println!(
                    "       {} {}",
                    "same content as".dimmed(),
                    relative(plan.root(), original)
                );
            }
        }

        let mut counts: BTreeMap<String, usize> = BTreeMap::new();
        for item in plan.items() {
            *counts.entry(item.reason.to_string()).or_insert(0) += 1;
        }
        Self::summary_table(&counts, plan.total(), plan.duplicates());
    }

    /// Prints a summary table of item counts per reason.
    pub fn summary_table(reason_counts: &BTreeMap<String, usize>, total: usize, duplicates: usize) {
        Self::header("SUMMARY");

        let width = reason_counts
            .keys()
            .map(|name| name.len())
            .max()
            .unwrap_or(0)
            .max(10);

        println!(
            "{:<width$} | {}",
            "Reason".bold(),
            "Files".bold(),
            width = width
        );
        println!("{}", "-".repeat(width + 10));
        for (reason, count) in reason_counts {
            println!(
                "{:<width$} | {}",
                reason,
                count.to_string().green(),
                width = width
            );
        }
        println!("{}", "-".repeat(width + 10));
        println!(
            "{:<width$} | {} ({} duplicates)",
            "Total".bold(),
            total.to_string().green().bold(),
            duplicates,
            width = width
        );
    }

    /// Prints what an apply moved, where it stopped, and what it left alone.
    pub fn print_apply_report(root: &Path, report: &ApplyReport) {
        for record in &report.applied {
            Self::success(&format!(
                "{} → {}",
                relative(root, &record.from),
                relative(root, &record.to)
            ));
        }
        for failed in &report.failed {
            Self::error(&format!(
                "{} → {}: {}",
                relative(root, &failed.from),
                relative(root, &failed.to),
                failed.error
            ));
        }
        if !report.skipped.is_empty() {
            let cause = if report.cancelled {
                "cancelled"
            } else {
                "batch stopped"
            };
            Self::warning(&format!(
                "{} file(s) skipped ({}), left in place",
                report.skipped.len(),
                cause
            ));
        }

        Self::header("APPLY SUMMARY");
        println!("  Applied: {}", report.applied.len().to_string().green());
        println!("  Failed:  {}", report.failed.len().to_string().red());
        println!("  Skipped: {}", report.skipped.len().to_string().yellow());
    }

    /// Prints what an undo restored and what it could not.
    pub fn print_undo_result(result: &UndoResult) {
        for entry in &result.reverted {
            Self::success(&format!(
                "{} → {}",
                entry.to.display(),
                entry.from.display()
            ));
        }
        for failed in &result.failed {
            Self::error(&format!(
                "{} → {}: {}",
                failed.entry.to.display(),
                failed.entry.from.display(),
                failed.error
            ));
        }

        Self::header("UNDO SUMMARY");
        println!("  Restored: {}", result.reverted.len().to_string().green());
        if !result.failed.is_empty() {
            println!("  Failed:   {}", result.failed.len().to_string().red());
            Self::warning("Failed entries were kept; fix the issues and run undo again.");
        }
    }
}

fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
