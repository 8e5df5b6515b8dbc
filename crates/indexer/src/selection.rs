use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// One toggle from the caller: watch or unwatch a path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectionRequest {
    pub path: PathBuf,
    pub included: bool,
}

/// Net effect of a batch of selection toggles.
///
/// `added` are roots whose files became covered, `removed` are roots whose
/// files stopped being covered. A descendant collapsed into a newly added
/// ancestor appears in neither list: its files stay covered throughout.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionDiff {
    pub added: Vec<PathBuf>,
    pub removed: Vec<PathBuf>,
}

impl SelectionDiff {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// The set of watched roots.
///
/// Invariant: no entry is an ancestor or descendant of another. A folder
/// entry implicitly covers everything beneath it, so adding a covered
/// descendant is a no-op and adding an ancestor replaces the descendants
/// it covers.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PathSelection {
    entries: BTreeSet<PathBuf>,
}

fn is_strict_ancestor(ancestor: &Path, path: &Path) -> bool {
    ancestor != path && path.starts_with(ancestor)
}

impl PathSelection {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn from_entries(entries: impl IntoIterator<Item = PathBuf>) -> Self {
        let mut selection = Self::new();
        for entry in entries {
            selection.add(entry);
        }
        selection
    }

    /// Whether `path` is an entry or lies under one.
    #[must_use]
    pub fn covers(&self, path: &Path) -> bool {
        self.entries
            .iter()
            .any(|entry| entry == path || is_strict_ancestor(entry, path))
    }

    /// Add a root. Covered paths are a no-op; an ancestor swallows the
    /// entries beneath it.
    pub fn add(&mut self, path: PathBuf) {
        if self.covers(&path) {
            return;
        }
        self.entries
            .retain(|entry| !is_strict_ancestor(&path, entry));
        self.entries.insert(path);
        debug_assert!(self.invariant_holds());
    }

    /// Remove a root, or every entry beneath `path` when it is an
    /// ancestor. Unrelated paths are untouched. Returns the entries that
    /// were dropped.
    pub fn remove(&mut self, path: &Path) -> Vec<PathBuf> {
        let dropped: Vec<PathBuf> = self
            .entries
            .iter()
            .filter(|entry| entry.as_path() == path || is_strict_ancestor(path, entry))
            .cloned()
            .collect();
        for entry in &dropped {
            self.entries.remove(entry);
        }
        debug_assert!(self.invariant_holds());
        dropped
    }

    /// Apply a batch of toggles in order and report the net coverage diff.
    ///
    /// The diff names exactly the incremental work: roots to scan and
    /// roots to purge, never unrelated paths.
    pub fn apply(&mut self, requests: &[SelectionRequest]) -> SelectionDiff {
        let committed = self.clone();
        for request in requests {
            if request.included {
                self.add(request.path.clone());
            } else {
                self.remove(&request.path);
            }
        }
        diff(&committed, self)
    }

    #[must_use]
    pub fn list(&self) -> Vec<PathBuf> {
        self.entries.iter().cloned().collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// No entry may be an ancestor of another. Checked after every
    /// mutation in debug builds, and directly by tests.
    #[must_use]
    pub fn invariant_holds(&self) -> bool {
        self.entries.iter().all(|a| {
            self.entries
                .iter()
                .all(|b| a == b || !is_strict_ancestor(a, b))
        })
    }
}

/// Coverage diff between two selections: which roots of `desired` are new,
/// and which roots of `committed` lost coverage.
#[must_use]
pub fn diff(committed: &PathSelection, desired: &PathSelection) -> SelectionDiff {
    let added = desired
        .entries
        .iter()
        .filter(|entry| !committed.covers(entry))
        .cloned()
        .collect();
    let removed = committed
        .entries
        .iter()
        .filter(|entry| !desired.covers(entry))
        .cloned()
        .collect();
    SelectionDiff { added, removed }
}
