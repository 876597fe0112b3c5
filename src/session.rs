//! The session: current plan, last undo log, and the lock serializing
//! `scan`, `apply` and `undo`.
//!
//! A session is an ordinary value. Callers that need several independent
//! sessions (for example one per directory) simply create several.

use crate::cancel::CancelToken;
use crate::error::SessionError;
use crate::executor::{ApplyReport, Executor};
use crate::plan::{Plan, Selection};
use crate::scanner::Scanner;
use crate::undo::{JournalError, UndoJournal, UndoLog, UndoManager, UndoResult};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::warn;

#[derive(Debug, Default)]
struct SessionState {
    plan: Option<Arc<Plan>>,
    undo_log: Option<UndoLog>,
}

/// Owns the scanner, the executor and the state shared between calls.
///
/// Every operation holds the session lock for its whole duration, so a
/// second call blocks until the first one has finished. Cancellation goes
/// through [`Session::cancel_token`], which does not need the lock.
pub struct Session {
    scanner: Scanner,
    executor: Executor,
    state: Mutex<SessionState>,
    cancel: CancelToken,
    journal: Option<UndoJournal>,
}

impl Session {
    /// Creates an empty, purely in-memory session.
    pub fn new(scanner: Scanner, executor: Executor) -> Self {
        Self {
            scanner,
            executor,
            state: Mutex::new(SessionState::default()),
            cancel: CancelToken::new(),
            journal: None,
        }
    }

    /// Persists the undo log to `journal` after every apply and undo.
    ///
    /// An existing journal is loaded as the session's current undo log, so
    /// an apply from an earlier process can still be undone.
    pub fn with_journal(mut self, journal: UndoJournal) -> Result<Self, JournalError> {
        let existing = journal.load()?;
        self.lock().undo_log = existing.filter(|log| !log.is_empty());
        self.journal = Some(journal);
        Ok(self)
    }

    /// A handle that cancels the operation currently running on this session.
    ///
    /// The flag is cleared when the next operation starts.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Scans `dir` and makes the result the session's current plan.
    ///
    /// On error (including cancellation) the previous plan is kept.
    pub fn scan(&self, dir: &Path) -> Result<Arc<Plan>, SessionError> {
        let mut state = self.lock();
        self.cancel.reset();

        let plan = Arc::new(self.scanner.scan_with_cancel(dir, &self.cancel)?);
        state.plan = Some(Arc::clone(&plan));
        Ok(plan)
    }

    /// The current plan, if a scan has completed.
    pub fn plan(&self) -> Option<Arc<Plan>> {
        self.lock().plan.clone()
    }

    /// Applies `selection` over the current plan.
    ///
    /// The resulting undo log replaces the previous one, even when it is
    /// empty: only the last apply can be undone.
    pub fn apply(&self, selection: &Selection) -> Result<ApplyReport, SessionError> {
        let mut state = self.lock();
        let plan = state.plan.clone().ok_or(SessionError::NoPlan)?;
        self.cancel.reset();

        let report = self
            .executor
            .apply_with_cancel(&plan, selection, &self.cancel)?;
        state.undo_log = Some(report.undo_log.clone());
        self.persist(state.undo_log.as_ref());
        Ok(report)
    }

    /// Reverts the last apply. Without an undo log this does nothing.
    pub fn undo(&self) -> UndoResult {
        let mut state = self.lock();
        self.cancel.reset();

        let Some(log) = state.undo_log.as_mut() else {
            return UndoResult::default();
        };
        let result = UndoManager::undo(log);
        if log.is_empty() {
            state.undo_log = None;
        }
        self.persist(state.undo_log.as_ref());
        result
    }

    /// A copy of the current undo log, if any.
    pub fn undo_log(&self) -> Option<UndoLog> {
        self.lock().undo_log.clone()
    }

    /// Returns true if there is something to undo.
    pub fn can_undo(&self) -> bool {
        self.lock()
            .undo_log
            .as_ref()
            .is_some_and(|log| !log.is_empty())
    }

    fn persist(&self, log: Option<&UndoLog>) {
        let Some(journal) = &self.journal else {
            return;
        };
        let result = match log {
            Some(log) if !log.is_empty() => journal.save(log),
            _ => journal.delete(),
        };
        // The moves already happened; a journal failure only costs
        // cross-process undo.
        if let Err(e) = result {
            warn!(error = %e, "could not update undo journal");
        }
    }

    fn lock(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CompiledConfig;
    use std::fs;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    fn session() -> Session {
        Session::new(
            Scanner::new(CompiledConfig::default()).unwrap(),
            Executor::new(),
        )
    }

    #[test]
    fn test_apply_without_plan_errors() {
        let result = session().apply(&Selection::new());
        assert!(matches!(result, Err(SessionError::NoPlan)));
    }

    #[test]
    fn test_undo_without_log_is_empty() {
        let result = session().undo();
        assert_eq!(result, UndoResult::default());
    }

    #[test]
    fn test_failed_scan_keeps_previous_plan() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join("a.txt"), "a").unwrap();
        let session = session();

        let plan = session.scan(temp_dir.path()).unwrap();
        assert!(session.scan(&temp_dir.path().join("missing")).is_err());
        assert_eq!(session.plan(), Some(plan));
    }

    #[test]
    fn test_apply_replaces_undo_log() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("a.txt"), "a").unwrap();
        fs::write(root.join("b.txt"), "b").unwrap();
        let session = session();

        session.scan(root).unwrap();
        session.apply(&[0].into_iter().collect()).unwrap();
        assert_eq!(session.undo_log().unwrap().len(), 1);

        // Second apply over the same plan: index 0 is now stale, index 1 moves.
        let report = session.apply(&[1].into_iter().collect()).unwrap();
        assert_eq!(report.applied.len(), 1);
        let log = session.undo_log().unwrap();
        assert_eq!(log.len(), 1);
        assert!(log.entries()[0].from.ends_with("b.txt"));
    }

    #[test]
    fn test_journal_survives_new_session() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let root = temp_dir.path();
        fs::write(root.join("c.jpg"), "Y").unwrap();
        let journal = UndoJournal::for_root(root, ".blusort");

        let first = session().with_journal(journal.clone()).unwrap();
        let plan = first.scan(root).unwrap();
        first.apply(&Selection::all(&plan)).unwrap();
        assert!(journal.path().exists());
        drop(first);

        let second = session().with_journal(journal.clone()).unwrap();
        assert!(second.can_undo());
        let result = second.undo();
        assert!(result.is_complete_success());
        assert_eq!(result.reverted.len(), 1);
        assert!(root.join("c.jpg").exists());
        assert!(!journal.path().exists());
        assert!(!second.can_undo());
    }

    #[test]
    fn test_concurrent_call_waits_for_running_one() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        fs::write(temp_dir.path().join("a.txt"), "a").unwrap();
        let session = session();
        let finished = AtomicBool::new(false);

        std::thread::scope(|scope| {
            // Stand-in for a long-running operation holding the session.
            let guard = session.lock();
            let waiter = scope.spawn(|| {
                let plan = session.scan(temp_dir.path());
                finished.store(true, Ordering::SeqCst);
                plan
            });

            std::thread::sleep(Duration::from_millis(100));
            assert!(!finished.load(Ordering::SeqCst));
            assert!(guard.plan.is_none());
            drop(guard);

            let plan = waiter.join().unwrap().unwrap();
            assert!(finished.load(Ordering::SeqCst));
            assert_eq!(plan.total(), 1);
        });
        assert!(session.plan().is_some());
    }
}
