//! The immutable output of a scan and the selection a caller makes over it.

use crate::classifier::ReasonCode;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

/// One proposed move.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanItem {
    /// Absolute path of the file as found by the scan.
    pub from: PathBuf,
    /// Absolute destination, free at plan time and unique within the plan.
    pub to: PathBuf,
    pub reason: ReasonCode,
    /// True iff an earlier file of the same scan has identical content.
    pub duplicate: bool,
    /// The earlier file this one duplicates.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplicate_of: Option<PathBuf>,
}

/// Ordered proposed moves from one scan, with aggregate counts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Plan {
    root: PathBuf,
    items: Vec<PlanItem>,
    total: usize,
    duplicates: usize,
}

impl Plan {
    /// Builds a plan over `root` from items in scan order.
    pub fn new(root: PathBuf, items: Vec<PlanItem>) -> Self {
        let duplicates = items.iter().filter(|item| item.duplicate).count();
        Self {
            root,
            total: items.len(),
            duplicates,
            items,
        }
    }

    /// The canonical directory that was scanned.
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn items(&self) -> &[PlanItem] {
        &self.items
    }

    pub fn get(&self, index: usize) -> Option<&PlanItem> {
        self.items.get(index)
    }

    pub fn total(&self) -> usize {
        self.total
    }

    pub fn duplicates(&self) -> usize {
        self.duplicates
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// A set of indices into a plan's items.
///
/// Iteration is always in ascending index order, which is the order apply
/// performs moves in.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selection(BTreeSet<usize>);

impl Selection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Selects every item of `plan`.
    pub fn all(plan: &Plan) -> Self {
        (0..plan.total()).collect()
    }

    /// Selects only the items flagged as duplicates.
    pub fn duplicates(plan: &Plan) -> Self {
        plan.items()
            .iter()
            .enumerate()
            .filter(|(_, item)| item.duplicate)
            .map(|(index, _)| index)
            .collect()
    }

    pub fn insert(&mut self, index: usize) -> bool {
        self.0.insert(index)
    }

    pub fn remove(&mut self, index: usize) -> bool {
        self.0.remove(&index)
    }

    pub fn contains(&self, index: usize) -> bool {
        self.0.contains(&index)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = usize> + '_ {
        self.0.iter().copied()
    }

    /// Largest selected index, if any.
    pub fn last(&self) -> Option<usize> {
        self.0.last().copied()
    }
}

impl FromIterator<usize> for Selection {
    fn from_iter<I: IntoIterator<Item = usize>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Hands out destinations that are unique within one plan and free on disk.
///
/// A taken candidate `dir/name.ext` is retried as `dir/name-1.ext`,
/// `dir/name-2.ext` and so on. Given the same directory snapshot and the same
/// candidate sequence, the same destinations come out.
#[derive(Debug, Default)]
pub(crate) struct DestinationAllocator {
    claimed: HashSet<PathBuf>,
}

impl DestinationAllocator {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reserve(&mut self, candidate: PathBuf) -> PathBuf {
        if self.is_free(&candidate) {
            self.claimed.insert(candidate.clone());
            return candidate;
        }

        let parent = candidate.parent().map(Path::to_path_buf).unwrap_or_default();
        let stem = candidate
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let ext = candidate
            .extension()
            .map(|e| format!(".{}", e.to_string_lossy()))
            .unwrap_or_default();

        let mut n = 1usize;
        loop {
            let next = parent.join(format!("{}-{}{}", stem, n, ext));
            if self.is_free(&next) {
                self.claimed.insert(next.clone());
                return next;
            }
            n += 1;
        }
    }

    fn is_free(&self, path: &Path) -> bool {
        !self.claimed.contains(path) && fs::symlink_metadata(path).is_err()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn item(from: &str, to: &str, duplicate: bool) -> PlanItem {
        PlanItem {
            from: PathBuf::from(from),
            to: PathBuf::from(to),
            reason: if duplicate {
                ReasonCode::DuplicateOf
            } else {
                ReasonCode::ByExtension
            },
            duplicate,
            duplicate_of: None,
        }
    }

    #[test]
    fn test_plan_counts() {
        let plan = Plan::new(
            PathBuf::from("/d"),
            vec![
                item("/d/a", "/d/Other/a", false),
                item("/d/b", "/d/Duplicates/x", true),
                item("/d/c", "/d/Duplicates/x-1", true),
            ],
        );
        assert_eq!(plan.total(), 3);
        assert_eq!(plan.duplicates(), 2);
        assert_eq!(plan.root(), Path::new("/d"));
    }

    #[test]
    fn test_selection_orders_and_filters() {
        let plan = Plan::new(
            PathBuf::from("/d"),
            vec![
                item("/d/a", "/d/Other/a", false),
                item("/d/b", "/d/Duplicates/x", true),
            ],
        );

        let selection: Selection = [5, 0, 3].into_iter().collect();
        assert_eq!(selection.iter().collect::<Vec<_>>(), vec![0, 3, 5]);
        assert_eq!(selection.last(), Some(5));

        assert_eq!(Selection::all(&plan).iter().collect::<Vec<_>>(), vec![0, 1]);
        assert_eq!(
            Selection::duplicates(&plan).iter().collect::<Vec<_>>(),
            vec![1]
        );
    }

    #[test]
    fn test_allocator_suffixes_claimed_names() {
        let mut allocator = DestinationAllocator::new();
        let base = PathBuf::from("/nonexistent-root/Other/a.txt");

        assert_eq!(allocator.reserve(base.clone()), base);
        assert_eq!(
            allocator.reserve(base.clone()),
            PathBuf::from("/nonexistent-root/Other/a-1.txt")
        );
        assert_eq!(
            allocator.reserve(base),
            PathBuf::from("/nonexistent-root/Other/a-2.txt")
        );
    }

    #[test]
    fn test_allocator_skips_existing_files() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let other = temp_dir.path().join("Other");
        fs::create_dir(&other).unwrap();
        fs::write(other.join("notes"), "taken").unwrap();
        fs::write(other.join("notes-1"), "taken").unwrap();

        let mut allocator = DestinationAllocator::new();
        assert_eq!(allocator.reserve(other.join("notes")), other.join("notes-2"));
    }

    #[test]
    fn test_plan_item_json_shape() {
        let json = serde_json::to_value(item("/d/a.txt", "/d/Other/a.txt", false)).unwrap();
        assert_eq!(json["from"], "/d/a.txt");
        assert_eq!(json["to"], "/d/Other/a.txt");
        assert_eq!(json["reason"], "ByExtension");
        assert_eq!(json["duplicate"], false);
        assert!(json.get("duplicate_of").is_none());
    }
}
