//! Teardown: writing saved operation tables back.
//!
//! Restoration is best-effort and total. An object that no longer exists is
//! logged and skipped, and the remaining records are still processed.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};

use crate::registry::{Registry, TargetRecord};
use crate::vfs::Ino;

/// Outcome of a restore pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreReport {
    /// Number of records drained from the registry.
    pub records: usize,
    /// Number of operation-table slots written back.
    pub restored_tables: usize,
    /// Number of objects that were gone by the time they were restored.
    pub vanished_objects: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum SlotKind {
    File,
    Inode,
}

/// Restores `records` newest first.
///
/// Each slot of each object is written at most once. Records sharing a parent
/// all saved the same true original, so the first write is the right one.
pub(crate) fn restore_records(records: Vec<TargetRecord>) -> RestoreReport {
    let mut report = RestoreReport {
        records: records.len(),
        ..RestoreReport::default()
    };
    let mut restored: HashSet<(Ino, SlotKind)> = HashSet::new();

    for record in records.into_iter().rev() {
        let file_pending = restored.insert((record.ino, SlotKind::File));
        let inode_pending = restored.insert((record.ino, SlotKind::Inode));
        if file_pending || inode_pending {
            match record.target.upgrade() {
                Some(target) => {
                    if file_pending {
                        target.fop().install(record.original_target_ops);
                        report.restored_tables += 1;
                    }
                    if inode_pending {
                        target.iop().install(record.original_target_attr_ops);
                        report.restored_tables += 1;
                    }
                    debug!(ino = record.ino, "Restored concealed object");
                }
                None => {
                    warn!(ino = record.ino, "Concealed object vanished before restore");
                    report.vanished_objects += 1;
                }
            }
        }

        if restored.insert((record.parent_ino, SlotKind::File)) {
            match record.parent.upgrade() {
                Some(parent) => {
                    parent.fop().install(record.original_parent_enum_ops);
                    report.restored_tables += 1;
                    debug!(parent = record.parent_ino, "Restored parent directory");
                }
                None => {
                    warn!(parent = record.parent_ino, "Parent directory vanished before restore");
                    report.vanished_objects += 1;
                }
            }
        }
    }

    report
}

/// Runs the registry teardown exactly once.
#[derive(Debug, Default)]
pub struct RestoreEngine {
    ran: AtomicBool,
}

impl RestoreEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true once [`run`](Self::run) has been called.
    pub fn has_run(&self) -> bool {
        self.ran.load(Ordering::Acquire)
    }

    /// Restores every table saved in `registry`.
    ///
    /// Only the first call does anything; later calls return an empty report.
    pub fn run(&self, registry: &Registry) -> RestoreReport {
        if self.ran.swap(true, Ordering::AcqRel) {
            debug!("Restore already ran");
            return RestoreReport::default();
        }

        let report = registry.restore_all();
        info!(
            records = report.records,
            restored_tables = report.restored_tables,
            vanished_objects = report.vanished_objects,
            "Restored operation tables"
        );
        report
    }
}
