//! Command-line interface for blusort.
//!
//! This module handles all CLI-related functionality including:
//! - Argument parsing
//! - Building a session from the loaded configuration
//! - Printing plans and reports as tables or JSON

use crate::config::Config;
use crate::executor::Executor;
use crate::output::OutputFormatter;
use crate::plan::{Plan, Selection};
use crate::scanner::Scanner;
use crate::session::Session;
use crate::undo::UndoJournal;
use anyhow::{Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use std::path::{Path, PathBuf};

/// Plan, review and apply bulk file reorganization.
#[derive(Debug, Parser)]
#[command(name = "blusort", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: OrganizeCommand,

    /// Configuration file (defaults to .blusortrc.toml, then ~/.config/blusort/config.toml)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Print debug diagnostics on stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Do not draw progress bars
    #[arg(long, global = true)]
    pub no_progress: bool,
}

/// Represents a CLI command to execute.
#[derive(Debug, Clone, Subcommand)]
pub enum OrganizeCommand {
    /// Show the proposed moves for a directory without changing anything.
    Scan {
        dir: PathBuf,
        /// Print the plan as JSON
        #[arg(long)]
        json: bool,
    },
    /// Scan a directory and apply the selected moves.
    #[command(group(
        ArgGroup::new("selection")
            .required(true)
            .args(["select", "all", "duplicates_only"])
    ))]
    Apply {
        dir: PathBuf,
        /// Comma-separated plan indices to apply, as shown by `scan`
        #[arg(long, value_delimiter = ',', value_name = "INDICES")]
        select: Vec<usize>,
        /// Apply every proposed move
        #[arg(long)]
        all: bool,
        /// Apply only the moves of duplicates into quarantine
        #[arg(long)]
        duplicates_only: bool,
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Revert the last apply made in a directory.
    Undo {
        dir: PathBuf,
        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Runs a parsed command line.
///
/// Returns `Ok(true)` if the command fully succeeded and `Ok(false)` if it
/// completed with per-file failures or skipped files.
pub fn run_cli(cli: Cli) -> Result<bool> {
    let json = match &cli.command {
        OrganizeCommand::Scan { json, .. }
        | OrganizeCommand::Apply { json, .. }
        | OrganizeCommand::Undo { json, .. } => *json,
    };
    let show_progress = !cli.no_progress && !json;

    match &cli.command {
        OrganizeCommand::Scan { dir, .. } => {
            let session = build_session(cli.config.as_deref(), dir, show_progress)?;
            let plan = session
                .scan(dir)
                .with_context(|| format!("Error scanning {}", dir.display()))?;
            if json {
                println!("{}", serde_json::to_string_pretty(&*plan)?);
            } else {
                OutputFormatter::print_plan(&plan);
                OutputFormatter::info(&format!(
                    "Run 'blusort apply {} --all' (or --select) to execute.",
                    dir.display()
                ));
            }
            Ok(true)
        }
        OrganizeCommand::Apply {
            dir,
            select,
            all,
            duplicates_only,
            ..
        } => {
            let session = build_session(cli.config.as_deref(), dir, show_progress)?;
            let plan = session
                .scan(dir)
                .with_context(|| format!("Error scanning {}", dir.display()))?;
            let selection = build_selection(&plan, select, *all, *duplicates_only);
            if selection.is_empty() {
                if !json {
                    OutputFormatter::info("Nothing selected to apply.");
                }
                return Ok(true);
            }

            let report = session.apply(&selection)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                OutputFormatter::print_apply_report(plan.root(), &report);
                if !report.applied.is_empty() {
                    OutputFormatter::info(&format!(
                        "Use 'blusort undo {}' to revert these moves.",
                        dir.display()
                    ));
                }
            }
            Ok(report.is_complete_success())
        }
        OrganizeCommand::Undo { dir, .. } => {
            let session = build_session(cli.config.as_deref(), dir, false)?;
            if !session.can_undo() {
                if json {
                    println!("{}", serde_json::to_string_pretty(&session.undo())?);
                } else {
                    OutputFormatter::info("Nothing to undo.");
                }
                return Ok(true);
            }

            let result = session.undo();
            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                OutputFormatter::print_undo_result(&result);
            }
            Ok(result.is_complete_success())
        }
    }
}

/// Builds a session for `dir` with its undo journal attached.
fn build_session(config_path: Option<&Path>, dir: &Path, show_progress: bool) -> Result<Session> {
    let config = Config::load(config_path)
        .context("Error loading configuration")?
        .compile()
        .context("Error compiling configuration")?;
    let journal = UndoJournal::for_root(dir, &config.layout.state_dir);

    let mut scanner = Scanner::new(config)?;
    let mut executor = Executor::new();
    if show_progress {
        scanner = scanner.with_progress(OutputFormatter::create_progress_bar("Hashing"));
        executor = executor.with_progress(OutputFormatter::create_progress_bar("Moving"));
    }

    Session::new(scanner, executor)
        .with_journal(journal)
        .context("Error loading undo journal")
}

/// Turns the apply flags into a selection over `plan`.
///
/// Indices beyond the plan are kept so that apply rejects them.
fn build_selection(plan: &Plan, select: &[usize], all: bool, duplicates_only: bool) -> Selection {
    if all {
        Selection::all(plan)
    } else if duplicates_only {
        Selection::duplicates(plan)
    } else {
        select.iter().copied().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::ReasonCode;
    use crate::plan::PlanItem;
    use clap::CommandFactory;

    fn plan() -> Plan {
        let item = |name: &str, duplicate: bool| PlanItem {
            from: PathBuf::from(format!("/d/{}", name)),
            to: PathBuf::from(format!("/d/Other/{}", name)),
            reason: if duplicate {
                ReasonCode::DuplicateOf
            } else {
                ReasonCode::Unclassified
            },
            duplicate,
            duplicate_of: None,
        };
        Plan::new(
            PathBuf::from("/d"),
            vec![item("a", false), item("b", true), item("c", false)],
        )
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_apply_requires_a_selection_flag() {
        assert!(Cli::try_parse_from(["blusort", "apply", "/tmp"]).is_err());
        assert!(Cli::try_parse_from(["blusort", "apply", "/tmp", "--all"]).is_ok());
    }

    #[test]
    fn test_select_parses_comma_list() {
        let cli = Cli::try_parse_from(["blusort", "apply", "/tmp", "--select", "2,0,5"]).unwrap();
        match cli.command {
            OrganizeCommand::Apply { select, .. } => assert_eq!(select, vec![2, 0, 5]),
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_build_selection() {
        let plan = plan();
        assert_eq!(build_selection(&plan, &[], true, false).len(), 3);
        assert_eq!(
            build_selection(&plan, &[], false, true)
                .iter()
                .collect::<Vec<_>>(),
            vec![1]
        );
        assert_eq!(
            build_selection(&plan, &[2, 0], false, false)
                .iter()
                .collect::<Vec<_>>(),
            vec![0, 2]
        );
    }
}
