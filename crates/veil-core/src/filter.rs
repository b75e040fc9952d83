//! Identifier-based enumeration filtering.
//!
//! The registry publishes a [`FilterSnapshot`] after every mutation. A filtered
//! enumeration loads the current snapshot once, builds an [`EnumerationContext`]
//! for the directory being listed, and runs the directory's real enumeration
//! through a callback that drops entries resolving to a concealed identifier.
//!
//! Everything an enumeration needs lives in its context, so concurrent
//! enumerations of different directories never see each other's state.
//!
//! Names are resolved through the dentry cache only. A name that is not cached is
//! passed through unchanged: a cold cache can reveal a concealed entry, but it can
//! never hide an unrelated one.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::trace;

use crate::error::VfsResult;
use crate::stats::FilterStats;
use crate::vfs::{DentryCache, FileOperations, FillDir, Ino, Inode};

/// Filter state for one hooked directory.
#[derive(Clone)]
pub struct ParentFilter {
    original: Arc<dyn FileOperations>,
    hidden: HashSet<Ino>,
}

impl ParentFilter {
    /// The directory's file operations as they were before it was hooked.
    pub fn original(&self) -> &Arc<dyn FileOperations> {
        &self.original
    }

    /// Returns true if entries resolving to `ino` are withheld.
    pub fn hides(&self, ino: Ino) -> bool {
        self.hidden.contains(&ino)
    }

    /// Number of identifiers withheld from this directory.
    pub fn hidden_count(&self) -> usize {
        self.hidden.len()
    }
}

impl std::fmt::Debug for ParentFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParentFilter")
            .field("original", &self.original.label())
            .field("hidden", &self.hidden)
            .finish()
    }
}

/// Immutable view of which identifiers are withheld from which directories.
#[derive(Debug, Clone, Default)]
pub struct FilterSnapshot {
    parents: HashMap<Ino, ParentFilter>,
}

impl FilterSnapshot {
    /// Returns true if `candidate` is withheld from listings of `parent`.
    pub fn contains(&self, parent: Ino, candidate: Ino) -> bool {
        self.parents
            .get(&parent)
            .is_some_and(|view| view.hides(candidate))
    }

    /// Filter state for `parent`, if it is hooked.
    pub fn parent(&self, parent: Ino) -> Option<&ParentFilter> {
        self.parents.get(&parent)
    }

    /// Number of hooked directories.
    pub fn parent_count(&self) -> usize {
        self.parents.len()
    }

    /// Returns true if `ino` is withheld from any directory.
    pub fn is_hidden(&self, ino: Ino) -> bool {
        self.parents.values().any(|view| view.hides(ino))
    }

    /// Returns a copy with `candidate` withheld from `parent`.
    ///
    /// `original` is only recorded the first time `parent` is hooked.
    pub(crate) fn with_hidden(
        &self,
        parent: Ino,
        original: &Arc<dyn FileOperations>,
        candidate: Ino,
    ) -> Self {
        let mut next = self.clone();
        next.parents
            .entry(parent)
            .or_insert_with(|| ParentFilter {
                original: Arc::clone(original),
                hidden: HashSet::new(),
            })
            .hidden
            .insert(candidate);
        next
    }
}

/// Copy-on-write publication point for [`FilterSnapshot`]s.
///
/// The lock is held only long enough to clone or swap the `Arc`.
#[derive(Debug, Default)]
pub(crate) struct SnapshotCell {
    current: RwLock<Arc<FilterSnapshot>>,
}

impl SnapshotCell {
    pub(crate) fn load(&self) -> Arc<FilterSnapshot> {
        Arc::clone(&self.current.read())
    }

    pub(crate) fn publish(&self, snapshot: FilterSnapshot) {
        *self.current.write() = Arc::new(snapshot);
    }
}

/// Per-call state of one filtered enumeration.
pub(crate) struct EnumerationContext<'a> {
    parent: Ino,
    delegate: Arc<dyn FileOperations>,
    view: &'a ParentFilter,
}

impl<'a> EnumerationContext<'a> {
    /// Builds the context for listing `dir`, or `None` if `dir` is not hooked in
    /// `snapshot`.
    pub(crate) fn new(snapshot: &'a FilterSnapshot, dir: &Inode) -> Option<Self> {
        let view = snapshot.parent(dir.ino())?;
        Some(Self {
            parent: dir.ino(),
            delegate: Arc::clone(&view.original),
            view,
        })
    }

    /// The real file operations of the directory being listed.
    pub(crate) fn delegate(&self) -> &Arc<dyn FileOperations> {
        &self.delegate
    }

    /// Runs the real enumeration of `dir`, forwarding only entries that do not
    /// resolve to a concealed identifier.
    pub(crate) fn run(
        &self,
        dir: &Inode,
        dcache: &DentryCache,
        stats: &FilterStats,
        filldir: &mut FillDir<'_>,
    ) -> VfsResult<()> {
        stats.record_enumeration();
        self.delegate.iterate(dir, &mut |entry| {
            match dcache.lookup(self.parent, entry.name) {
                Some(ino) if self.view.hides(ino) => {
                    trace!(parent = self.parent, ino, "Suppressed directory entry");
                    stats.record_suppressed();
                    true
                }
                Some(_) => {
                    stats.record_forwarded();
                    filldir(entry)
                }
                None => {
                    stats.record_cache_miss();
                    filldir(entry)
                }
            }
        })
    }
}
