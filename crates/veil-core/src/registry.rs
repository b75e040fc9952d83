//! The hook registry.
//!
//! The registry is the only owner of concealment state. It remembers, for every
//! concealed object, which tables were installed before it was hooked, and it
//! publishes the [`FilterSnapshot`] that filtered enumerations read.
//!
//! # Locking
//!
//! - `register` and `restore_all` serialize on the registry's mutex and hold it
//!   across table installation.
//! - `contains` and the filter read the published snapshot and never touch the
//!   mutex, so they can run concurrently with a registration.
//! - Enumeration callbacks must not call back into `register`, `restore_all` or
//!   the record accessors: a registration waiting to install a table on the
//!   directory being listed would never get it.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::error::{ConflictReason, HookError};
use crate::filter::{FilterSnapshot, SnapshotCell};
use crate::hooks::{ConcealedOps, FilteringDirOps};
use crate::restore::{RestoreReport, restore_records};
use crate::stats::FilterStats;
use crate::vfs::{DentryCache, FileOperations, Ino, Inode, InodeOperations};

/// What was replaced when one object was concealed.
pub struct TargetRecord {
    pub(crate) ino: Ino,
    pub(crate) parent_ino: Ino,
    pub(crate) target: Weak<Inode>,
    pub(crate) parent: Weak<Inode>,
    pub(crate) original_target_ops: Arc<dyn FileOperations>,
    pub(crate) original_target_attr_ops: Arc<dyn InodeOperations>,
    pub(crate) original_parent_enum_ops: Arc<dyn FileOperations>,
}

impl TargetRecord {
    /// Identifier of the concealed object.
    pub fn ino(&self) -> Ino {
        self.ino
    }

    /// Identifier of the directory that lists the concealed object.
    pub fn parent_ino(&self) -> Ino {
        self.parent_ino
    }

    /// The concealed object's file operations before it was hooked.
    pub fn original_target_ops(&self) -> &Arc<dyn FileOperations> {
        &self.original_target_ops
    }

    /// The concealed object's inode operations before it was hooked.
    pub fn original_target_attr_ops(&self) -> &Arc<dyn InodeOperations> {
        &self.original_target_attr_ops
    }

    /// The parent directory's file operations before it was hooked.
    pub fn original_parent_enum_ops(&self) -> &Arc<dyn FileOperations> {
        &self.original_parent_enum_ops
    }
}

impl std::fmt::Debug for TargetRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TargetRecord")
            .field("ino", &self.ino)
            .field("parent_ino", &self.parent_ino)
            .field("original_target_ops", &self.original_target_ops.label())
            .field("original_target_attr_ops", &self.original_target_attr_ops.label())
            .field("original_parent_enum_ops", &self.original_parent_enum_ops.label())
            .finish_non_exhaustive()
    }
}

/// Insertion-ordered store of concealment records.
pub struct Registry {
    records: Mutex<Vec<TargetRecord>>,
    snapshot: Arc<SnapshotCell>,
    stub_fop: Arc<dyn FileOperations>,
    stub_iop: Arc<dyn InodeOperations>,
    filter_fop: Arc<dyn FileOperations>,
    stats: Arc<FilterStats>,
    max_records: Option<usize>,
}

impl Registry {
    /// Creates an empty registry whose filter resolves names through `dcache`.
    pub fn new(dcache: DentryCache, config: &EngineConfig) -> Self {
        let snapshot = Arc::new(SnapshotCell::default());
        let stats = Arc::new(FilterStats::new());
        let stub = Arc::new(ConcealedOps);
        let filter_fop: Arc<dyn FileOperations> = Arc::new(FilteringDirOps::new(
            Arc::clone(&snapshot),
            dcache,
            Arc::clone(&stats),
        ));

        Self {
            records: Mutex::new(Vec::with_capacity(config.initial_capacity)),
            snapshot,
            stub_fop: Arc::clone(&stub) as Arc<dyn FileOperations>,
            stub_iop: stub,
            filter_fop,
            stats,
            max_records: config.max_records,
        }
    }

    /// Conceals `target`, which is listed by `parent`.
    ///
    /// On any error the registry and every operation table are left untouched.
    pub fn register(&self, target: &Arc<Inode>, parent: &Arc<Inode>) -> Result<Ino, HookError> {
        let mut records = self.records.lock();
        let ino = target.ino();
        let parent_ino = parent.ino();

        if records.iter().any(|r| r.ino == ino) {
            debug!(ino, "Target already concealed");
            return Err(HookError::HookConflict {
                ino,
                reason: ConflictReason::AlreadyConcealed,
            });
        }
        if records.iter().any(|r| r.ino == parent_ino) {
            debug!(ino, parent = parent_ino, "Parent of target is concealed");
            return Err(HookError::HookConflict {
                ino: parent_ino,
                reason: ConflictReason::ParentConcealed,
            });
        }
        if let Some(limit) = self.max_records {
            if records.len() >= limit {
                return Err(HookError::Allocation {
                    reason: format!("registry limit of {limit} records reached"),
                });
            }
        }
        records.try_reserve(1).map_err(|e| HookError::Allocation {
            reason: e.to_string(),
        })?;

        // A hooked directory currently holds the filtering table, so its true
        // original comes from the record that hooked it.
        let hooked_original = |dir: Ino| {
            records
                .iter()
                .find(|r| r.parent_ino == dir)
                .map(|r| Arc::clone(&r.original_parent_enum_ops))
        };
        let existing_parent_ops = hooked_original(parent_ino);
        let parent_already_hooked = existing_parent_ops.is_some();
        let original_parent_enum_ops = existing_parent_ops.unwrap_or_else(|| parent.fop().current());
        let original_target_ops = hooked_original(ino).unwrap_or_else(|| target.fop().current());
        let original_target_attr_ops = target.iop().current();

        self.snapshot
            .publish(self.snapshot.load().with_hidden(parent_ino, &original_parent_enum_ops, ino));

        target.fop().install(Arc::clone(&self.stub_fop));
        target.iop().install(Arc::clone(&self.stub_iop));
        if !parent_already_hooked {
            parent.fop().install(Arc::clone(&self.filter_fop));
            debug!(parent = parent_ino, "Installed filtering table on parent");
        }

        records.push(TargetRecord {
            ino,
            parent_ino,
            target: Arc::downgrade(target),
            parent: Arc::downgrade(parent),
            original_target_ops,
            original_target_attr_ops,
            original_parent_enum_ops,
        });
        info!(ino, parent = parent_ino, count = records.len(), "Concealed object");
        Ok(ino)
    }

    /// Returns true if `candidate` is withheld from listings of `parent`.
    pub fn contains(&self, parent: Ino, candidate: Ino) -> bool {
        self.snapshot.load().contains(parent, candidate)
    }

    /// Returns true if `ino` is concealed.
    pub fn is_concealed(&self, ino: Ino) -> bool {
        self.snapshot.load().is_hidden(ino)
    }

    /// The currently published filter view.
    pub fn snapshot(&self) -> Arc<FilterSnapshot> {
        self.snapshot.load()
    }

    /// Number of concealed objects.
    pub fn len(&self) -> usize {
        self.records.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.lock().is_empty()
    }

    /// Identifiers of the concealed objects, in registration order.
    pub fn identifiers(&self) -> Vec<Ino> {
        self.records.lock().iter().map(TargetRecord::ino).collect()
    }

    /// Runs `f` against the record for `ino`, if there is one.
    pub fn with_record<R>(&self, ino: Ino, f: impl FnOnce(&TargetRecord) -> R) -> Option<R> {
        self.records.lock().iter().find(|r| r.ino == ino).map(f)
    }

    /// Enumeration filter counters.
    pub fn stats(&self) -> &FilterStats {
        &self.stats
    }

    /// The stub installed into a concealed object's file-operations slot.
    pub fn concealed_file_ops(&self) -> &Arc<dyn FileOperations> {
        &self.stub_fop
    }

    /// The stub installed into a concealed object's inode-operations slot.
    pub fn concealed_inode_ops(&self) -> &Arc<dyn InodeOperations> {
        &self.stub_iop
    }

    /// The wrapper installed into a hooked directory's file-operations slot.
    pub fn filtering_dir_ops(&self) -> &Arc<dyn FileOperations> {
        &self.filter_fop
    }

    /// Writes every saved original table back and empties the registry.
    ///
    /// Records are processed newest first. Objects that no longer exist are logged
    /// and skipped. Calling this on an empty registry does nothing.
    pub fn restore_all(&self) -> RestoreReport {
        let mut records = self.records.lock();
        if records.is_empty() {
            return RestoreReport::default();
        }

        let drained = std::mem::take(&mut *records);
        let report = restore_records(drained);
        self.snapshot.publish(FilterSnapshot::default());
        report
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("records", &*self.records.lock())
            .field("max_records", &self.max_records)
            .finish_non_exhaustive()
    }
}
