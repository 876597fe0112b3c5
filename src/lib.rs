//! blusort - plan, review and apply bulk file reorganization
//!
//! This library scans a directory tree into a reviewable [`Plan`] of moves
//! (content-hash duplicate detection plus category classification), applies
//! a chosen subset of that plan without ever overwriting a file, and reverts
//! the last apply through its [`UndoLog`].

pub mod cancel;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod executor;
pub mod file_category;
pub mod hasher;
pub mod logging;
pub mod output;
pub mod plan;
pub mod scanner;
pub mod session;
pub mod undo;

pub use cancel::CancelToken;
pub use classifier::{Classifier, ReasonCode};
pub use config::{CompiledConfig, CompiledFilters, Config, ConfigError};
pub use error::{ApplyError, FailureKind, HashError, MoveError, ScanError, SessionError};
pub use executor::{ApplyReport, Executor, FailedMove, MoveRecord};
pub use file_category::{Category, FileMapper};
pub use hasher::{ContentHasher, Fingerprint};
pub use plan::{Plan, PlanItem, Selection};
pub use scanner::{FileRecord, Scanner};
pub use session::Session;
pub use undo::{FileStamp, UndoEntry, UndoJournal, UndoLog, UndoManager, UndoResult};

pub use cli::{Cli, OrganizeCommand, run_cli};
