//! Replacement operation tables.
//!
//! - [`ConcealedOps`] is installed into both slots of a concealed object. Every
//!   operation fails with [`VfsError::NotSupported`], so the object cannot be
//!   opened, read, written, inspected or removed even by someone who already knows
//!   its name.
//! - [`FilteringDirOps`] is installed into the file-operations slot of the
//!   directory that lists a concealed object. Enumeration goes through the filter;
//!   every other call is forwarded to the directory's original table.
//!
//! One instance of each is created per registry and shared by every object it
//! hooks.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{VfsError, VfsResult};
use crate::filter::{EnumerationContext, SnapshotCell};
use crate::stats::FilterStats;
use crate::vfs::{Attr, DentryCache, FileOperations, FillDir, Ino, Inode, InodeOperations};

/// Stub table for concealed objects.
#[derive(Debug, Default)]
pub struct ConcealedOps;

impl ConcealedOps {
    fn reject<T>(op: &'static str, ino: Ino) -> VfsResult<T> {
        debug!(ino, op, "Rejected operation on concealed object");
        Err(VfsError::NotSupported)
    }
}

impl FileOperations for ConcealedOps {
    fn label(&self) -> &'static str {
        "concealed"
    }

    fn open(&self, inode: &Inode) -> VfsResult<()> {
        Self::reject("open", inode.ino())
    }

    fn release(&self, inode: &Inode) -> VfsResult<()> {
        Self::reject("release", inode.ino())
    }

    fn read(&self, inode: &Inode, _offset: u64, _buf: &mut [u8]) -> VfsResult<usize> {
        Self::reject("read", inode.ino())
    }

    fn write(&self, inode: &Inode, _offset: u64, _data: &[u8]) -> VfsResult<usize> {
        Self::reject("write", inode.ino())
    }

    fn flush(&self, inode: &Inode) -> VfsResult<()> {
        Self::reject("flush", inode.ino())
    }

    fn iterate(&self, dir: &Inode, _filldir: &mut FillDir<'_>) -> VfsResult<()> {
        Self::reject("iterate", dir.ino())
    }
}

impl InodeOperations for ConcealedOps {
    fn label(&self) -> &'static str {
        "concealed"
    }

    fn lookup(&self, dir: &Inode, _name: &str) -> VfsResult<Arc<Inode>> {
        Self::reject("lookup", dir.ino())
    }

    fn getattr(&self, inode: &Inode) -> VfsResult<Attr> {
        Self::reject("getattr", inode.ino())
    }

    fn remove(&self, inode: &Inode) -> VfsResult<()> {
        Self::reject("remove", inode.ino())
    }

    fn rename(&self, dir: &Inode, _from: &str, _to: &str) -> VfsResult<Ino> {
        Self::reject("rename", dir.ino())
    }
}

/// Enumeration wrapper for directories that list a concealed object.
pub struct FilteringDirOps {
    snapshot: Arc<SnapshotCell>,
    dcache: DentryCache,
    stats: Arc<FilterStats>,
}

impl FilteringDirOps {
    pub(crate) fn new(snapshot: Arc<SnapshotCell>, dcache: DentryCache, stats: Arc<FilterStats>) -> Self {
        Self {
            snapshot,
            dcache,
            stats,
        }
    }

    /// Runs `f` against the original table of `dir`.
    fn forward<R>(&self, dir: &Inode, f: impl FnOnce(&dyn FileOperations) -> VfsResult<R>) -> VfsResult<R> {
        let snapshot = self.snapshot.load();
        match EnumerationContext::new(&snapshot, dir) {
            Some(ctx) => f(ctx.delegate().as_ref()),
            None => {
                warn!(ino = dir.ino(), "Filtering table called on an unhooked directory");
                Err(VfsError::NotSupported)
            }
        }
    }
}

impl FileOperations for FilteringDirOps {
    fn label(&self) -> &'static str {
        "filtering_dir"
    }

    fn open(&self, inode: &Inode) -> VfsResult<()> {
        self.forward(inode, |ops| ops.open(inode))
    }

    fn release(&self, inode: &Inode) -> VfsResult<()> {
        self.forward(inode, |ops| ops.release(inode))
    }

    fn read(&self, inode: &Inode, offset: u64, buf: &mut [u8]) -> VfsResult<usize> {
        self.forward(inode, |ops| ops.read(inode, offset, buf))
    }

    fn write(&self, inode: &Inode, offset: u64, data: &[u8]) -> VfsResult<usize> {
        self.forward(inode, |ops| ops.write(inode, offset, data))
    }

    fn flush(&self, inode: &Inode) -> VfsResult<()> {
        self.forward(inode, |ops| ops.flush(inode))
    }

    fn iterate(&self, dir: &Inode, filldir: &mut FillDir<'_>) -> VfsResult<()> {
        let snapshot = self.snapshot.load();
        let Some(ctx) = EnumerationContext::new(&snapshot, dir) else {
            warn!(ino = dir.ino(), "Filtering table called on an unhooked directory");
            return Err(VfsError::NotSupported);
        };
        ctx.run(dir, &self.dcache, &self.stats, filldir)
    }
}

impl std::fmt::Debug for FilteringDirOps {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilteringDirOps")
            .field("stats", &self.stats.snapshot())
            .finish_non_exhaustive()
    }
}
