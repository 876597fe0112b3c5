//! Error types shared by the scanning and execution engine.
//!
//! Scan-level errors abort a whole call. Move-level errors are scoped to a
//! single plan item and end up as entries in an apply or undo report.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a scan. No partial plan is produced.
#[derive(Debug, Error)]
pub enum ScanError {
    /// The scan target is missing, not a directory, or cannot be listed.
    #[error("invalid scan path {}: {reason}", path.display())]
    InvalidPath { path: PathBuf, reason: String },

    /// The scan observed a cancellation request between files.
    #[error("scan cancelled")]
    Cancelled,

    /// The hashing worker pool could not be started.
    #[error("failed to start hashing pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

/// Failure to fingerprint a single file.
#[derive(Debug, Error)]
pub enum HashError {
    #[error("failed to hash {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Failure of a single move during apply or undo.
#[derive(Debug, Error)]
pub enum MoveError {
    /// The file to move is no longer where the plan (or undo log) expects it.
    #[error("source no longer exists: {}", path.display())]
    StaleSource { path: PathBuf },

    /// Something already occupies the destination.
    #[error("destination already exists: {}", path.display())]
    DestinationExists { path: PathBuf },

    /// The moved file changed after the apply that moved it.
    #[error("file was modified after it was moved: {}", path.display())]
    Modified { path: PathBuf },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A cross-volume copy did not match its source; the source was kept.
    #[error("copy of {} to {} did not verify", from.display(), to.display())]
    VerifyFailed { from: PathBuf, to: PathBuf },
}

impl MoveError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Returns the report tag for this error.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::StaleSource { .. } => FailureKind::StaleSource,
            Self::DestinationExists { .. } => FailureKind::DestinationExists,
            Self::Modified { .. } => FailureKind::Modified,
            Self::Io { .. } => FailureKind::Io,
            Self::VerifyFailed { .. } => FailureKind::VerifyFailed,
        }
    }
}

/// Serializable tag of a [`MoveError`], used in reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum FailureKind {
    StaleSource,
    DestinationExists,
    Modified,
    Io,
    VerifyFailed,
}

/// Errors that reject an apply call before any file is touched.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApplyError {
    #[error("selected index {index} is out of range for a plan of {len} items")]
    SelectionOutOfRange { index: usize, len: usize },
}

/// Errors surfaced by [`crate::session::Session`].
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no plan available, run a scan first")]
    NoPlan,

    #[error(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    Apply(#[from] ApplyError),
}
