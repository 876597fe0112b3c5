//! Directory traversal and plan assembly.
//!
//! A scan runs in three phases:
//! 1. walk the directory tree in lexicographic order, collecting regular files
//! 2. fingerprint the files on a bounded worker pool
//! 3. feed the results, in traversal order, through the duplicate index,
//!    the classifier and the destination allocator
//!
//! Only phase 2 is parallel. The scan never writes to the filesystem.

use crate::cancel::CancelToken;
use crate::classifier::Classifier;
use crate::config::CompiledConfig;
use crate::duplicates::{DuplicateIndex, DuplicateStatus};
use crate::error::{HashError, ScanError};
use crate::hasher::{ContentHasher, Fingerprint};
use crate::plan::{DestinationAllocator, Plan, PlanItem};
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::ffi::OsStr;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{debug, info, info_span, warn};
use walkdir::{DirEntry, WalkDir};

/// One regular file found by a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    /// Absolute path under the canonical scan root.
    pub path: PathBuf,
    /// Path relative to the scan root.
    pub relative_path: PathBuf,
    pub size: u64,
    pub modified: Option<SystemTime>,
    /// Lowercased extension used for classification: the name's own
    /// extension, or one sniffed from content when the name has none.
    pub extension: Option<String>,
    /// `None` when the file could not be read for hashing.
    pub fingerprint: Option<Fingerprint>,
}

impl FileRecord {
    pub fn file_name(&self) -> &OsStr {
        self.path.file_name().unwrap_or(self.path.as_os_str())
    }
}

/// A file found by the walk, before any content was read.
struct FoundFile {
    path: PathBuf,
    relative_path: PathBuf,
    size: u64,
    modified: Option<SystemTime>,
}

/// Produces plans for directories.
pub struct Scanner {
    config: CompiledConfig,
    pool: rayon::ThreadPool,
    progress: Option<ProgressBar>,
}

impl Scanner {
    /// Creates a scanner with its own hashing pool.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::ThreadPool` if the worker threads cannot be spawned.
    pub fn new(config: CompiledConfig) -> Result<Self, ScanError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.hash_threads)
            .thread_name(|i| format!("blusort-hash-{}", i))
            .build()?;
        Ok(Self {
            config,
            pool,
            progress: None,
        })
    }

    /// Reports hashing progress on `progress`.
    pub fn with_progress(mut self, progress: ProgressBar) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &CompiledConfig {
        &self.config
    }

    /// Scans `dir` and returns the plan for it.
    pub fn scan(&self, dir: &Path) -> Result<Plan, ScanError> {
        self.scan_with_cancel(dir, &CancelToken::new())
    }

    /// Scans `dir`, stopping early with `ScanError::Cancelled` if `cancel`
    /// is triggered.
    ///
    /// # Errors
    ///
    /// Returns `ScanError::InvalidPath` if `dir` does not exist, is not a
    /// directory, or cannot be listed.
    pub fn scan_with_cancel(&self, dir: &Path, cancel: &CancelToken) -> Result<Plan, ScanError> {
        self.scan_with_hasher(dir, cancel, ContentHasher::fingerprint)
    }

    fn scan_with_hasher<H>(&self, dir: &Path, cancel: &CancelToken, hash: H) -> Result<Plan, ScanError>
    where
        H: Fn(&Path) -> Result<Fingerprint, HashError> + Sync,
    {
        let root = validate_root(dir)?;
        let _span = info_span!("scan", root = %root.display()).entered();

        let found = self.walk(&root, cancel)?;
        debug!(files = found.len(), "walk complete");

        let records = self.fingerprint_all(found, cancel, hash)?;

        let classifier = Classifier::new(&root, &self.config);
        let mut index = DuplicateIndex::new();
        let mut allocator = DestinationAllocator::new();
        let mut items = Vec::with_capacity(records.len());

        for record in &records {
            let status = index.register(&record.path, record.fingerprint.as_ref());
            let classification = classifier.classify(record, status.is_duplicate());
            let to = allocator.reserve(classification.destination);
            let duplicate_of = match status {
                DuplicateStatus::DuplicateOf(first) => Some(first),
                DuplicateStatus::Canonical => None,
            };
            items.push(PlanItem {
                from: record.path.clone(),
                to,
                reason: classification.reason,
                duplicate: duplicate_of.is_some(),
                duplicate_of,
            });
        }

        let plan = Plan::new(root, items);
        info!(
            total = plan.total(),
            duplicates = plan.duplicates(),
            "scan complete"
        );
        Ok(plan)
    }

    fn walk(&self, root: &Path, cancel: &CancelToken) -> Result<Vec<FoundFile>, ScanError> {
        let reserved = self.config.reserved_dirs();
        let layout = &self.config.layout;
        let is_reserved = |entry: &DirEntry| {
            let skip = entry.depth() == 1
                && entry.file_type().is_dir()
                && reserved.iter().any(|name| entry.file_name() == OsStr::new(name));
            if skip
                && entry.file_name() != OsStr::new(&layout.quarantine_dir)
                && entry.file_name() != OsStr::new(&layout.state_dir)
            {
                info!(dir = %entry.path().display(), "skipping category output directory");
            }
            skip
        };

        let mut found = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| !is_reserved(entry));

        for entry in walker {
            if cancel.is_cancelled() {
                return Err(ScanError::Cancelled);
            }

            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!(error = %e, "skipping unreadable entry");
                    continue;
                }
            };

            let file_type = entry.file_type();
            if file_type.is_symlink() {
                debug!(path = %entry.path().display(), "skipping symlink");
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let Ok(relative_path) = entry.path().strip_prefix(root).map(Path::to_path_buf) else {
                continue;
            };
            if !self.config.filters.should_include(&relative_path) {
                debug!(path = %relative_path.display(), "excluded by filters");
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(e) => {
                    warn!(path = %entry.path().display(), error = %e, "skipping file without metadata");
                    continue;
                }
            };

            found.push(FoundFile {
                path: entry.into_path(),
                relative_path,
                size: metadata.len(),
                modified: metadata.modified().ok(),
            });
        }

        Ok(found)
    }

    fn fingerprint_all<H>(
        &self,
        found: Vec<FoundFile>,
        cancel: &CancelToken,
        hash: H,
    ) -> Result<Vec<FileRecord>, ScanError>
    where
        H: Fn(&Path) -> Result<Fingerprint, HashError> + Sync,
    {
        if let Some(pb) = &self.progress {
            pb.set_length(found.len() as u64);
            pb.set_position(0);
        }

        // `collect` on an indexed parallel iterator keeps input order.
        let records: Vec<FileRecord> = self.pool.install(|| {
            found
                .into_par_iter()
                .map(|file| {
                    let fingerprint = if cancel.is_cancelled() {
                        None
                    } else {
                        match hash(&file.path) {
                            Ok(fingerprint) => Some(fingerprint),
                            Err(e) => {
                                warn!(error = %e, "excluding file from duplicate detection");
                                None
                            }
                        }
                    };
                    let extension = effective_extension(&file.path);
                    if let Some(pb) = &self.progress {
                        pb.inc(1);
                    }
                    FileRecord {
                        path: file.path,
                        relative_path: file.relative_path,
                        size: file.size,
                        modified: file.modified,
                        extension,
                        fingerprint,
                    }
                })
                .collect()
        });

        if cancel.is_cancelled() {
            return Err(ScanError::Cancelled);
        }
        Ok(records)
    }
}

fn validate_root(dir: &Path) -> Result<PathBuf, ScanError> {
    let invalid = |reason: String| ScanError::InvalidPath {
        path: dir.to_path_buf(),
        reason,
    };

    let root = fs::canonicalize(dir).map_err(|e| invalid(e.to_string()))?;
    let metadata = fs::metadata(&root).map_err(|e| invalid(e.to_string()))?;
    if !metadata.is_dir() {
        return Err(invalid("not a directory".to_string()));
    }
    fs::read_dir(&root).map_err(|e| invalid(e.to_string()))?;
    Ok(root)
}

fn effective_extension(path: &Path) -> Option<String> {
    if let Some(ext) = path.extension() {
        return Some(ext.to_string_lossy().to_lowercase());
    }
    infer::get_from_path(path)
        .ok()
        .flatten()
        .map(|kind| kind.extension().to_string())
}
