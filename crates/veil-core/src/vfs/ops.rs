//! Operation tables and the slots that hold them.
//!
//! Every live [`Inode`] carries two slots: one for its [`FileOperations`] and one for
//! its [`InodeOperations`]. Calls into an object are dispatched through the slot,
//! which holds a read guard for the duration of the call. Replacing a table takes
//! the write guard, so an installation never overlaps an in-flight call into the
//! table it replaces.
//!
//! Slots are typed: a saved `Arc<dyn FileOperations>` can only ever be written back
//! into a file-operations slot.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::inode::{Attr, Ino, Inode, InodeKind};
use crate::error::VfsResult;

/// One entry produced while enumerating a directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DirEntry<'a> {
    /// Entry name within the directory.
    pub name: &'a str,
    /// Identifier of the object the entry points at.
    pub ino: Ino,
    /// Kind of the object the entry points at.
    pub kind: InodeKind,
}

/// Enumeration callback. Returns `false` to stop the enumeration early.
pub type FillDir<'a> = dyn FnMut(&DirEntry<'_>) -> bool + 'a;

/// Operations on an open object: data access and directory enumeration.
pub trait FileOperations: Send + Sync {
    /// Short label used in logs and debug output.
    fn label(&self) -> &'static str;

    fn open(&self, inode: &Inode) -> VfsResult<()>;

    fn release(&self, inode: &Inode) -> VfsResult<()>;

    /// Reads into `buf` starting at `offset`, returning the number of bytes read.
    fn read(&self, inode: &Inode, offset: u64, buf: &mut [u8]) -> VfsResult<usize>;

    /// Writes `data` at `offset`, returning the number of bytes written.
    fn write(&self, inode: &Inode, offset: u64, data: &[u8]) -> VfsResult<usize>;

    fn flush(&self, inode: &Inode) -> VfsResult<()>;

    /// Calls `filldir` once per entry of `dir` until it returns `false`.
    fn iterate(&self, dir: &Inode, filldir: &mut FillDir<'_>) -> VfsResult<()>;
}

/// Operations on the object itself: name lookup, attributes, removal, renaming.
pub trait InodeOperations: Send + Sync {
    /// Short label used in logs and debug output.
    fn label(&self) -> &'static str;

    /// Finds the child `name` of `dir`.
    fn lookup(&self, dir: &Inode, name: &str) -> VfsResult<Arc<Inode>>;

    fn getattr(&self, inode: &Inode) -> VfsResult<Attr>;

    /// Checks that `inode` may be detached from its parent.
    fn remove(&self, inode: &Inode) -> VfsResult<()>;

    /// Renames the child `from` of `dir` to `to`, returning the moved object's id.
    fn rename(&self, dir: &Inode, from: &str, to: &str) -> VfsResult<Ino>;
}

/// A replaceable reference to an operation table.
pub struct OpsSlot<T: ?Sized> {
    table: RwLock<Arc<T>>,
}

impl<T: ?Sized> OpsSlot<T> {
    /// Creates a slot holding `table`.
    pub fn new(table: Arc<T>) -> Self {
        Self {
            table: RwLock::new(table),
        }
    }

    /// Returns the currently installed table.
    pub fn current(&self) -> Arc<T> {
        Arc::clone(&self.table.read_recursive())
    }

    /// Returns true if `table` is the currently installed table.
    pub fn is_installed(&self, table: &Arc<T>) -> bool {
        Arc::ptr_eq(&self.table.read_recursive(), table)
    }

    /// Runs `f` against the installed table, blocking installation until it returns.
    ///
    /// Uses a recursive read so that nested dispatch into the same object from
    /// inside a call cannot deadlock behind a queued writer.
    pub fn call<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        let guard = self.table.read_recursive();
        f(&**guard)
    }

    /// Installs `table` and returns the table it replaced.
    ///
    /// Waits for every in-flight [`call`](Self::call) to finish. Must not be invoked
    /// from inside a call on the same slot.
    pub fn install(&self, table: Arc<T>) -> Arc<T> {
        let mut guard = self.table.write();
        std::mem::replace(&mut *guard, table)
    }
}

impl fmt::Debug for OpsSlot<dyn FileOperations> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OpsSlot")
            .field(&self.table.read_recursive().label())
            .finish()
    }
}

impl fmt::Debug for OpsSlot<dyn InodeOperations> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OpsSlot")
            .field(&self.table.read_recursive().label())
            .finish()
    }
}
