//! Execution of selected plan items as filesystem moves.
//!
//! Moves never overwrite anything. On the same volume a file is hard-linked
//! to its destination (which fails if the name is taken) and then unlinked
//! from its source; where hard links are unsupported a checked rename is
//! used. Across volumes the file is copied, verified by fingerprint, and only
//! then removed from its source.
use crate::cancel::CancelToken;
use crate::error::{ApplyError, FailureKind, HashError, MoveError};
use crate::hasher::ContentHasher;
use crate::plan::{Plan, PlanItem, Selection};
use crate::undo::UndoLog;
use indicatif::ProgressBar;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{self, ErrorKind};
use std::path::{Path, PathBuf};
use tracing::{debug, info, info_span, warn};

/// A plan item that was moved or left alone, identified by its plan index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MoveRecord {
    pub index: usize,
    pub from: PathBuf,
    pub to: PathBuf,
}

impl MoveRecord {
    fn new(index: usize, item: &PlanItem) -> Self {
        Self {
            index,
            from: item.from.clone(),
            to: item.to.clone(),
        }
    }
}

/// A plan item whose move was attempted and failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedMove {
    pub index: usize,
    pub from: PathBuf,
    pub to: PathBuf,
    pub kind: FailureKind,
    pub error: String,
}

/// Outcome of an apply call.
///
/// `applied` items are on disk at their destination and recorded in
/// `undo_log`; `failed` holds the item that stopped the batch; `skipped`
/// items were never attempted and are untouched.
#[derive(Debug, Clone, Serialize)]
pub struct ApplyReport {
    pub applied: Vec<MoveRecord>,
    pub failed: Vec<FailedMove>,
    pub skipped: Vec<MoveRecord>,
    /// True if the batch stopped because of a cancellation request.
    pub cancelled: bool,
    #[serde(skip)]
    pub undo_log: UndoLog,
}

impl ApplyReport {
    fn new(root: &Path) -> Self {
        Self {
            applied: Vec::new(),
            failed: Vec::new(),
            skipped: Vec::new(),
            cancelled: false,
            undo_log: UndoLog::new(root),
        }
    }

    /// Returns true if every selected item was moved.
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

/// Applies plan selections.
#[derive(Default)]
pub struct Executor {
    progress: Option<ProgressBar>,
}

impl Executor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports apply progress on `progress`.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Applies the selected items of `plan`, in ascending index order.
    pub fn apply(&self, plan: &Plan, selection: &Selection) -> Result<ApplyReport, ApplyError> {
        self.apply_with_cancel(plan, selection, &CancelToken::new())
    }

    /// Applies the selected items of `plan`, checking `cancel` before each move.
    ///
    /// The first failing item stops the batch. Items already moved stay
    /// moved and are recorded in the report's undo log, so the caller can
    /// revert exactly what changed. Cancellation stops the batch the same
    /// way, without a failed entry.
    ///
    /// # Errors
    ///
    /// Returns `ApplyError::SelectionOutOfRange` without touching the
    /// filesystem if any selected index is outside the plan.
    pub fn apply_with_cancel(
        &self,
        plan: &Plan,
        selection: &Selection,
        cancel: &CancelToken,
    ) -> Result<ApplyReport, ApplyError> {
        if let Some(last) = selection.last()
            && last >= plan.total()
        {
            return Err(ApplyError::SelectionOutOfRange {
                index: last,
                len: plan.total(),
            });
        }

        let _span = info_span!("apply", root = %plan.root().display(), selected = selection.len())
            .entered();
        if let Some(pb) = &self.progress {
            pb.set_length(selection.len() as u64);
            pb.set_position(0);
        }

        let mut report = ApplyReport::new(plan.root());
        let mut halted = false;

        for index in selection.iter() {
            let item = &plan.items()[index];

            if !halted && cancel.is_cancelled() {
                info!(index, "apply cancelled");
                report.cancelled = true;
                halted = true;
            }
            if halted {
                report.skipped.push(MoveRecord::new(index, item));
                continue;
            }

            match apply_item(item, &mut report.undo_log) {
                Ok(()) => {
                    debug!(index, from = %item.from.display(), to = %item.to.display(), "moved");
                    report.undo_log.record(item.from.clone(), item.to.clone());
                    report.applied.push(MoveRecord::new(index, item));
                }
                Err(e) => {
                    warn!(index, error = %e, "move failed, stopping batch");
                    report.failed.push(FailedMove {
                        index,
                        from: item.from.clone(),
                        to: item.to.clone(),
                        kind: e.kind(),
                        error: e.to_string(),
                    });
                    halted = true;
                }
            }

            if let Some(pb) = &self.progress {
                pb.inc(1);
            }
        }

        info!(
            applied = report.applied.len(),
            failed = report.failed.len(),
            skipped = report.skipped.len(),
            "apply finished"
        );
        Ok(report)
    }
}

fn apply_item(item: &PlanItem, log: &mut UndoLog) -> Result<(), MoveError> {
    check_move(&item.from, &item.to)?;
    place(&item.from, &item.to, log, move_file)
}

/// Creates the missing parents of `to`, then moves `from` there with `mv`.
///
/// Parents created for a move that then fails are removed again, so only
/// directories holding an applied file end up in the undo log.
fn place<M>(from: &Path, to: &Path, log: &mut UndoLog, mv: M) -> Result<(), MoveError>
where
    M: FnOnce(&Path, &Path) -> Result<(), MoveError>,
{
    let created = create_parent_dirs(to)?;
    match mv(from, to) {
        Ok(()) => {
            for dir in created {
                log.record_created_dir(dir);
            }
            Ok(())
        }
        Err(e) => {
            for dir in created.iter().rev() {
                if let Err(remove_err) = fs::remove_dir(dir) {
                    debug!(dir = %dir.display(), error = %remove_err, "could not remove directory");
                }
            }
            Err(e)
        }
    }
}

/// Creates the destination's missing ancestors and returns them, shallowest
/// first.
///
/// Fails with `DestinationExists` when the nearest existing ancestor is not a
/// directory, e.g. a file named like a category directory.
fn create_parent_dirs(to: &Path) -> Result<Vec<PathBuf>, MoveError> {
    let Some(parent) = to.parent() else {
        return Ok(Vec::new());
    };

    let mut missing = Vec::new();
    let mut current = Some(parent);
    while let Some(dir) = current
        && fs::symlink_metadata(dir).is_err()
    {
        missing.push(dir.to_path_buf());
        current = dir.parent();
    }
    if let Some(existing) = current
        && !fs::metadata(existing).is_ok_and(|metadata| metadata.is_dir())
    {
        return Err(MoveError::DestinationExists {
            path: existing.to_path_buf(),
        });
    }
    if missing.is_empty() {
        return Ok(missing);
    }

    fs::create_dir_all(parent).map_err(|e| MoveError::io(parent, e))?;
    missing.reverse();
    Ok(missing)
}

/// Checks that `from` is a regular file and `to` is unoccupied.
pub(crate) fn check_move(from: &Path, to: &Path) -> Result<(), MoveError> {
    match fs::symlink_metadata(from) {
        Ok(metadata) if metadata.is_file() => {}
        Ok(_) => {
            return Err(MoveError::StaleSource {
                path: from.to_path_buf(),
            });
        }
        Err(e) if e.kind() == ErrorKind::NotFound => {
            return Err(MoveError::StaleSource {
                path: from.to_path_buf(),
            });
        }
        Err(e) => return Err(MoveError::io(from, e)),
    }

    match fs::symlink_metadata(to) {
        Ok(_) => Err(MoveError::DestinationExists {
            path: to.to_path_buf(),
        }),
        // An ancestor that is a file is reported when parents are created.
        Err(e) if matches!(e.kind(), ErrorKind::NotFound | ErrorKind::NotADirectory) => Ok(()),
        Err(e) => Err(MoveError::io(to, e)),
    }
}

/// Moves `from` to `to` without ever replacing an existing `to`.
pub(crate) fn move_file(from: &Path, to: &Path) -> Result<(), MoveError> {
    check_move(from, to)?;

    match fs::hard_link(from, to) {
        Ok(()) => {
            if let Err(e) = fs::remove_file(from) {
                // Keep the filesystem as it was: one name, at the source.
                let _ = fs::remove_file(to);
                return Err(MoveError::io(from, e));
            }
            Ok(())
        }
        Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(MoveError::DestinationExists {
            path: to.to_path_buf(),
        }),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => copy_verify_remove(from, to),
        Err(e) => {
            debug!(error = %e, "hard link unavailable, falling back to rename");
            rename_checked(from, to)
        }
    }
}

fn rename_checked(from: &Path, to: &Path) -> Result<(), MoveError> {
    check_move(from, to)?;
    match fs::rename(from, to) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::CrossesDevices => copy_verify_remove(from, to),
        Err(e) => Err(MoveError::io(from, e)),
    }
}

/// Cross-volume move: copy, verify, then delete the source.
///
/// Any failure before the source is deleted removes the partial copy and
/// leaves the source untouched.
pub(crate) fn copy_verify_remove(from: &Path, to: &Path) -> Result<(), MoveError> {
    let mut source = File::open(from).map_err(|e| MoveError::io(from, e))?;
    let metadata = source.metadata().map_err(|e| MoveError::io(from, e))?;

    let mut dest = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(to)
        .map_err(|e| match e.kind() {
            ErrorKind::AlreadyExists => MoveError::DestinationExists {
                path: to.to_path_buf(),
            },
            _ => MoveError::io(to, e),
        })?;

    let copied = (|| -> io::Result<()> {
        io::copy(&mut source, &mut dest)?;
        if let Ok(modified) = metadata.modified() {
            dest.set_modified(modified)?;
        }
        dest.set_permissions(metadata.permissions())?;
        dest.sync_all()
    })();
    drop(dest);
    drop(source);

    if let Err(e) = copied {
        let _ = fs::remove_file(to);
        return Err(MoveError::io(to, e));
    }

    let verified = ContentHasher::fingerprint(from)
        .and_then(|a| ContentHasher::fingerprint(to).map(|b| a == b));
    match verified {
        Ok(true) => {}
        Ok(false) => {
            let _ = fs::remove_file(to);
            return Err(MoveError::VerifyFailed {
                from: from.to_path_buf(),
                to: to.to_path_buf(),
            });
        }
        Err(e) => {
            let _ = fs::remove_file(to);
            return Err(e.into());
        }
    }

    if let Err(e) = fs::remove_file(from) {
        let _ = fs::remove_file(to);
        return Err(MoveError::io(from, e));
    }
    Ok(())
}

impl From<HashError> for MoveError {
    fn from(error: HashError) -> Self {
        match error {
            HashError::Io { path, source } => MoveError::Io { path, source },
        }
    }
}
