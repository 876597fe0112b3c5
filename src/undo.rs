//! Undo functionality for reverting the most recent apply.
//!
//! This module records the moves an apply performed, replays them backwards
//! on undo, and can persist the record to a journal file so the undo
//! survives a process restart.
use crate::executor::{check_move, move_file};
use crate::error::{FailureKind, MoveError};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Size and modification time of a moved file, taken right after the move.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileStamp {
    pub size: u64,
    pub modified: Option<SystemTime>,
}

impl FileStamp {
    fn read(path: &Path) -> io::Result<Self> {
        let metadata = fs::symlink_metadata(path)?;
        Ok(Self {
            size: metadata.len(),
            modified: metadata.modified().ok(),
        })
    }
}

/// One performed move: the file now at `to` originally lived at `from`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoEntry {
    pub from: PathBuf,
    pub to: PathBuf,
    /// `None` if the destination could not be inspected after the move;
    /// such entries are restored without the modification check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stamp: Option<FileStamp>,
}

/// Moves of the last apply, in the order they were performed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UndoLog {
    /// RFC 3339 timestamp of when the log was started.
    pub timestamp: String,
    /// The scanned root the moves happened under.
    pub root: PathBuf,
    entries: Vec<UndoEntry>,
    /// Directories the apply created, shallowest first.
    #[serde(default)]
    created_dirs: Vec<PathBuf>,
}

impl Default for UndoLog {
    fn default() -> Self {
        Self::new(Path::new(""))
    }
}

impl UndoLog {
    pub fn new(root: &Path) -> Self {
        Self {
            timestamp: chrono::Utc::now().to_rfc3339(),
            root: root.to_path_buf(),
            entries: Vec::new(),
            created_dirs: Vec::new(),
        }
    }

    /// Records a completed move, stamping the file at its new location.
    pub(crate) fn record(&mut self, from: PathBuf, to: PathBuf) {
        let stamp = FileStamp::read(&to).ok();
        self.entries.push(UndoEntry { from, to, stamp });
    }

    pub(crate) fn record_created_dir(&mut self, dir: PathBuf) {
        self.created_dirs.push(dir);
    }

    pub fn entries(&self) -> &[UndoEntry] {
        &self.entries
    }

    pub fn created_dirs(&self) -> &[PathBuf] {
        &self.created_dirs
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// An undo step that could not be performed. The entry stays in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedUndo {
    #[serde(flatten)]
    pub entry: UndoEntry,
    pub kind: FailureKind,
    pub error: String,
}

/// Outcome of an undo call.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UndoResult {
    /// Entries moved back to their original location, in undo order.
    pub reverted: Vec<UndoEntry>,
    pub failed: Vec<FailedUndo>,
}

impl UndoResult {
    /// Returns true if every entry was reverted (or there was nothing to do).
    pub fn is_complete_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Replays undo logs.
pub struct UndoManager;

impl UndoManager {
    /// Reverts the moves in `log`, newest first.
    ///
    /// Each step moves a file from its recorded destination back to its
    /// original path. A step fails if the file is no longer at the
    /// destination, was modified there since the apply, or something now
    /// occupies the original path; failures are reported and the remaining
    /// steps still run.
    ///
    /// Reverted entries are removed from `log`. Failed ones stay, in their
    /// original order, so a later call can retry them. Once the log is empty
    /// the directories the apply created are removed again where empty.
    pub fn undo(log: &mut UndoLog) -> UndoResult {
        let mut result = UndoResult::default();
        let mut kept = Vec::new();

        for entry in std::mem::take(&mut log.entries).into_iter().rev() {
            match Self::restore_file(&entry) {
                Ok(()) => {
                    debug!(from = %entry.to.display(), to = %entry.from.display(), "restored");
                    result.reverted.push(entry);
                }
                Err(e) => {
                    warn!(error = %e, "undo step failed");
                    result.failed.push(FailedUndo {
                        entry: entry.clone(),
                        kind: e.kind(),
                        error: e.to_string(),
                    });
                    kept.push(entry);
                }
            }
        }

        kept.reverse();
        log.entries = kept;

        if log.entries.is_empty() {
            Self::remove_created_dirs(log);
        }

        info!(
            reverted = result.reverted.len(),
            failed = result.failed.len(),
            "undo finished"
        );
        result
    }

    fn restore_file(entry: &UndoEntry) -> Result<(), MoveError> {
        check_move(&entry.to, &entry.from)?;
        if let Some(stamp) = entry.stamp {
            let current = FileStamp::read(&entry.to).map_err(|e| MoveError::io(&entry.to, e))?;
            if current != stamp {
                return Err(MoveError::Modified {
                    path: entry.to.clone(),
                });
            }
        }
        if let Some(parent) = entry.from.parent() {
            fs::create_dir_all(parent).map_err(|e| MoveError::io(parent, e))?;
        }
        move_file(&entry.to, &entry.from)
    }

    fn remove_created_dirs(log: &mut UndoLog) {
        for dir in std::mem::take(&mut log.created_dirs).iter().rev() {
            // Fails harmlessly on directories that gained other content.
            if fs::remove_dir(dir).is_ok() {
                debug!(dir = %dir.display(), "removed created directory");
            }
        }
    }
}

/// Errors reading or writing the undo journal.
#[derive(Debug, Error)]
pub enum JournalError {
    #[error("Failed to read undo journal {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write undo journal {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid undo journal {}: {reason}", path.display())]
    InvalidFormat { path: PathBuf, reason: String },
}

/// On-disk copy of the current undo log.
#[derive(Debug, Clone)]
pub struct UndoJournal {
    path: PathBuf,
}

impl UndoJournal {
    /// File name used inside the state directory.
    pub const FILE_NAME: &'static str = "undo.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The journal for a scan root: `<root>/<state_dir>/undo.json`.
    pub fn for_root(root: &Path, state_dir: &str) -> Self {
        Self::new(root.join(state_dir).join(Self::FILE_NAME))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes `log`, replacing any previous journal atomically.
    pub fn save(&self, log: &UndoLog) -> Result<(), JournalError> {
        let write_err = |source| JournalError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let json = serde_json::to_string_pretty(log).map_err(|e| {
            write_err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("JSON serialization failed: {}", e),
            ))
        })?;

        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, json).map_err(write_err)?;
        fs::rename(&tmp, &self.path).map_err(write_err)?;
        Ok(())
    }

    /// Loads the journal, or `None` if there is none.
    pub fn load(&self) -> Result<Option<UndoLog>, JournalError> {
        if !self.path.exists() {
            return Ok(None);
        }

        let json = fs::read_to_string(&self.path).map_err(|source| JournalError::Read {
            path: self.path.clone(),
            source,
        })?;
        let log = serde_json::from_str(&json).map_err(|e| JournalError::InvalidFormat {
            path: self.path.clone(),
            reason: e.to_string(),
        })?;
        Ok(Some(log))
    }

    pub fn delete(&self) -> Result<(), JournalError> {
        if self.path.exists() {
            fs::remove_file(&self.path).map_err(|source| JournalError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Moves `name` from the root into `dir` and records it like an apply would.
    fn moved(root: &Path, log: &mut UndoLog, name: &str, dir: &str, content: &str) {
        let from = root.join(name);
        let to = root.join(dir).join(name);
        fs::write(&from, content).expect("Failed to write test file");
        if !root.join(dir).exists() {
            fs::create_dir_all(root.join(dir)).unwrap();
            log.record_created_dir(root.join(dir));
        }
        move_file(&from, &to).expect("Failed to move file");
        log.record(from, to);
    }

    #[test]
    fn test_undo_empty_log_is_noop() {
        let mut log = UndoLog::default();
        let result = UndoManager::undo(&mut log);
        assert!(result.reverted.is_empty());
        assert!(result.is_complete_success());
    }

    #[test]
    fn test_undo_multiple_files_in_reverse_order() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let mut log = UndoLog::new(root);
        moved(root, &mut log, "image.png", "Images", "image data");
        moved(root, &mut log, "document.pdf", "Documents", "pdf data");

        let result = UndoManager::undo(&mut log);
        assert!(result.is_complete_success());
        assert_eq!(result.reverted.len(), 2);
        assert_eq!(result.reverted[0].from, root.join("document.pdf"));
        assert_eq!(result.reverted[1].from, root.join("image.png"));
        assert!(log.is_empty());

        assert_eq!(
            fs::read_to_string(root.join("image.png")).unwrap(),
            "image data"
        );
        assert!(root.join("document.pdf").exists());
        // Created bucket directories are gone again.
        assert!(!root.join("Images").exists());
        assert!(!root.join("Documents").exists());
    }

    #[test]
    fn test_undo_conflict_keeps_entry_for_retry() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let mut log = UndoLog::new(root);
        moved(root, &mut log, "a.txt", "Other", "first");
        moved(root, &mut log, "b.txt", "Other", "second");

        // Someone recreated a.txt after the apply.
        fs::write(root.join("a.txt"), "new content").unwrap();

        let result = UndoManager::undo(&mut log);
        assert_eq!(result.reverted.len(), 1);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].kind, FailureKind::DestinationExists);
        assert_eq!(log.len(), 1);
        assert_eq!(log.entries()[0].from, root.join("a.txt"));

        // Neither copy of a.txt was touched, and the bucket is still needed.
        assert_eq!(
            fs::read_to_string(root.join("a.txt")).unwrap(),
            "new content"
        );
        assert_eq!(
            fs::read_to_string(root.join("Other").join("a.txt")).unwrap(),
            "first"
        );
        assert!(root.join("Other").exists());

        // Resolve the conflict and retry.
        fs::remove_file(root.join("a.txt")).unwrap();
        let retry = UndoManager::undo(&mut log);
        assert!(retry.is_complete_success());
        assert!(log.is_empty());
        assert_eq!(fs::read_to_string(root.join("a.txt")).unwrap(), "first");
        assert!(!root.join("Other").exists());
    }

    #[test]
    fn test_undo_refuses_modified_file() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let mut log = UndoLog::new(root);
        moved(root, &mut log, "c.jpg", "Images", "Y");
        moved(root, &mut log, "d.jpg", "Images", "Z");
        assert!(log.entries()[0].stamp.is_some());

        fs::write(root.join("Images").join("c.jpg"), "MODIFIED after move").unwrap();

        let result = UndoManager::undo(&mut log);
        assert_eq!(result.reverted.len(), 1);
        assert!(result.reverted[0].from.ends_with("d.jpg"));
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].kind, FailureKind::Modified);
        assert_eq!(log.len(), 1);
        assert!(!root.join("c.jpg").exists());
        assert_eq!(
            fs::read_to_string(root.join("Images").join("c.jpg")).unwrap(),
            "MODIFIED after move"
        );
        assert!(root.join("Images").exists());
    }

    #[test]
    fn test_undo_missing_file_reported_as_stale() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let mut log = UndoLog::new(root);
        log.record(root.join("ghost.txt"), root.join("Other").join("ghost.txt"));

        let result = UndoManager::undo(&mut log);
        assert_eq!(result.failed.len(), 1);
        assert_eq!(result.failed[0].kind, FailureKind::StaleSource);
        assert_eq!(log.len(), 1);
    }

    #[test]
    fn test_created_dir_with_foreign_content_survives() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        let mut log = UndoLog::new(root);
        moved(root, &mut log, "a.jpg", "Images", "a");
        fs::write(root.join("Images").join("unrelated.jpg"), "u").unwrap();

        let result = UndoManager::undo(&mut log);
        assert!(result.is_complete_success());
        assert!(root.join("Images").join("unrelated.jpg").exists());
    }

    #[test]
    fn test_journal_round_trip_and_delete() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let journal = UndoJournal::for_root(temp_dir.path(), ".blusort");
        assert!(journal.load().unwrap().is_none());

        let mut log = UndoLog::new(temp_dir.path());
        log.record(PathBuf::from("/d/a.txt"), PathBuf::from("/d/Other/a.txt"));
        log.record_created_dir(PathBuf::from("/d/Other"));
        journal.save(&log).unwrap();

        assert_eq!(journal.load().unwrap(), Some(log));
        assert!(journal.path().ends_with(".blusort/undo.json"));

        journal.delete().unwrap();
        assert!(journal.load().unwrap().is_none());
    }

    #[test]
    fn test_journal_invalid_format() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let journal = UndoJournal::new(temp_dir.path().join("undo.json"));
        fs::write(journal.path(), "{ not json").unwrap();

        assert!(matches!(
            journal.load(),
            Err(JournalError::InvalidFormat { .. })
        ));
    }
}
