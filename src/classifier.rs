//! Destination and reason derivation for scanned files.
//!
//! Classification is a pure function of a [`FileRecord`] and the compiled
//! configuration: re-scanning an unchanged directory yields the same
//! destinations. Uniqueness against other plan items and existing files is
//! settled later by the plan builder.

use crate::config::CompiledConfig;
use crate::file_category::Category;
use crate::scanner::FileRecord;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Why a file was routed where it was.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReasonCode {
    /// Category bucket chosen from the file extension.
    ByExtension,
    /// Category bucket further split by modification year and month.
    ByDate,
    /// Same content as an earlier file; sent to quarantine.
    DuplicateOf,
    /// No rule matched; sent to the "Other" bucket.
    Unclassified,
}

impl ReasonCode {
    /// Short human-readable explanation, for tables and logs.
    pub fn describe(&self) -> &'static str {
        match self {
            ReasonCode::ByExtension => "sorted by file type",
            ReasonCode::ByDate => "sorted by file type and date",
            ReasonCode::DuplicateOf => "duplicate content",
            ReasonCode::Unclassified => "no matching rule",
        }
    }
}

impl fmt::Display for ReasonCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReasonCode::ByExtension => "ByExtension",
            ReasonCode::ByDate => "ByDate",
            ReasonCode::DuplicateOf => "DuplicateOf",
            ReasonCode::Unclassified => "Unclassified",
        };
        f.write_str(name)
    }
}

/// Candidate destination for one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub destination: PathBuf,
    pub reason: ReasonCode,
}

/// Routes files into category, date and quarantine buckets under a root.
pub struct Classifier<'a> {
    root: &'a Path,
    config: &'a CompiledConfig,
}

impl<'a> Classifier<'a> {
    pub fn new(root: &'a Path, config: &'a CompiledConfig) -> Self {
        Self { root, config }
    }

    /// Classifies a record.
    ///
    /// `duplicate` overrides every other rule: the file goes to the
    /// quarantine directory under a name derived from its fingerprint.
    pub fn classify(&self, record: &FileRecord, duplicate: bool) -> Classification {
        if duplicate && let Some(fingerprint) = &record.fingerprint {
            let mut name = fingerprint.to_hex();
            if let Some(ext) = record.path.extension() {
                name.push('.');
                name.push_str(&ext.to_string_lossy());
            }
            return Classification {
                destination: self
                    .root
                    .join(&self.config.layout.quarantine_dir)
                    .join(name),
                reason: ReasonCode::DuplicateOf,
            };
        }

        let file_name = record.file_name();

        // Zero-byte files are never bucketed by extension.
        let category = if record.size == 0 {
            Category::Other
        } else {
            self.config.mapper.categorize(record.extension.as_deref())
        };

        if category == Category::Other {
            return Classification {
                destination: self.root.join(Category::Other.dir_name()).join(file_name),
                reason: ReasonCode::Unclassified,
            };
        }

        let bucket = self.root.join(category.dir_name());
        if self.config.date_buckets.contains(&category)
            && let Some(modified) = record.modified
        {
            let modified: DateTime<Utc> = modified.into();
            return Classification {
                destination: bucket
                    .join(modified.format("%Y").to_string())
                    .join(modified.format("%m").to_string())
                    .join(file_name),
                reason: ReasonCode::ByDate,
            };
        }

        Classification {
            destination: bucket.join(file_name),
            reason: ReasonCode::ByExtension,
        }
    }
}
