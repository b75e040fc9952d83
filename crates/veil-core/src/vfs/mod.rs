//! In-memory virtual filesystem with swappable operation tables.
//!
//! This is the object model the concealment engine operates on. Each [`Inode`]
//! carries a file-operations slot and an inode-operations slot; every entry point
//! on [`Vfs`] dispatches through those slots, so whatever table is installed on an
//! object decides how that object behaves.
//!
//! # Caches
//!
//! - The dentry cache ([`DentryCache`]) maps `(parent, name)` to an identifier.
//!   [`Vfs::lookup`] consults it first and populates it on a miss.
//! - The inode cache maps identifiers to `Weak<Inode>` so a cached name can be
//!   turned back into a live object without walking the tree.

mod dcache;
mod inode;
mod memfs;
mod ops;

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::trace;

use crate::error::{VfsError, VfsResult};

pub use dcache::{DEFAULT_DCACHE_CAPACITY, DentryCache};
pub use inode::{Attr, Ino, Inode, InodeKind, ROOT_INO};
pub use memfs::{MAX_FILE_SIZE, MemDirOps, MemFileOps, MemInodeOps};
pub use ops::{DirEntry, FileOperations, FillDir, InodeOperations, OpsSlot};

use inode::Contents;

/// Read size used by [`Vfs::read_to_end`].
const READ_CHUNK: usize = 8 * 1024;

/// An owned directory entry, as returned by [`Vfs::read_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntryBuf {
    pub name: String,
    pub ino: Ino,
    pub kind: InodeKind,
}

/// The live filesystem.
pub struct Vfs {
    root: Arc<Inode>,
    dcache: DentryCache,
    icache: DashMap<Ino, Weak<Inode>>,
    next_ino: AtomicU64,
    file_ops: Arc<dyn FileOperations>,
    dir_ops: Arc<dyn FileOperations>,
    inode_ops: Arc<dyn InodeOperations>,
}

impl Vfs {
    /// Creates an empty filesystem containing only the root directory.
    pub fn new() -> Self {
        Self::with_dcache_capacity(DEFAULT_DCACHE_CAPACITY)
    }

    /// Creates an empty filesystem whose dentry cache holds at most `capacity` names.
    pub fn with_dcache_capacity(capacity: u64) -> Self {
        let file_ops: Arc<dyn FileOperations> = Arc::new(MemFileOps);
        let dir_ops: Arc<dyn FileOperations> = Arc::new(MemDirOps);
        let inode_ops: Arc<dyn InodeOperations> = Arc::new(MemInodeOps);

        let root = Arc::new(Inode::new(
            ROOT_INO,
            InodeKind::Directory,
            Contents::Directory(Default::default()),
            Arc::clone(&dir_ops),
            Arc::clone(&inode_ops),
        ));
        let icache = DashMap::new();
        icache.insert(ROOT_INO, Arc::downgrade(&root));

        Self {
            root,
            dcache: DentryCache::new(capacity),
            icache,
            next_ino: AtomicU64::new(ROOT_INO + 1),
            file_ops,
            dir_ops,
            inode_ops,
        }
    }

    /// The root directory.
    pub fn root(&self) -> Arc<Inode> {
        Arc::clone(&self.root)
    }

    /// The dentry cache.
    pub fn dcache(&self) -> &DentryCache {
        &self.dcache
    }

    /// Returns the live object with identifier `ino`, if it still exists.
    pub fn inode(&self, ino: Ino) -> Option<Arc<Inode>> {
        self.icache.get(&ino).and_then(|weak| weak.upgrade())
    }

    fn link(&self, dir: &Inode, name: &str, kind: InodeKind, contents: Contents) -> VfsResult<Arc<Inode>> {
        if !dir.is_dir() {
            return Err(VfsError::NotADirectory(dir.ino()));
        }
        if name.is_empty() || name == "." || name == ".." || name.contains('/') {
            return Err(VfsError::NotFound(name.to_owned()));
        }

        let ino = self.next_ino.fetch_add(1, Ordering::Relaxed);
        let fop = match kind {
            InodeKind::File => Arc::clone(&self.file_ops),
            InodeKind::Directory => Arc::clone(&self.dir_ops),
        };
        let child = Arc::new(Inode::new(ino, kind, contents, fop, Arc::clone(&self.inode_ops)));

        memfs::attach(dir, name, Arc::clone(&child))?;
        self.icache.insert(ino, Arc::downgrade(&child));
        self.dcache.insert(dir.ino(), name, ino);
        trace!(parent = dir.ino(), ino, name, ?kind, "Linked new object");
        Ok(child)
    }

    /// Creates an empty directory `name` in `dir`.
    pub fn mkdir(&self, dir: &Inode, name: &str) -> VfsResult<Arc<Inode>> {
        self.link(dir, name, InodeKind::Directory, Contents::Directory(Default::default()))
    }

    /// Creates a regular file `name` in `dir` holding `data`.
    pub fn create_file(&self, dir: &Inode, name: &str, data: &[u8]) -> VfsResult<Arc<Inode>> {
        self.link(dir, name, InodeKind::File, Contents::File(data.to_vec()))
    }

    /// Creates every missing directory along absolute `path` and returns the last one.
    pub fn mkdir_all(&self, path: &str) -> VfsResult<Arc<Inode>> {
        let mut dir = self.root();
        for name in path.split('/').filter(|c| !c.is_empty() && *c != ".") {
            dir = match self.lookup(&dir, name) {
                Ok(existing) if existing.is_dir() => existing,
                Ok(existing) => return Err(VfsError::NotADirectory(existing.ino())),
                Err(VfsError::NotFound(_)) => self.mkdir(&dir, name)?,
                Err(e) => return Err(e),
            };
        }
        Ok(dir)
    }

    /// Resolves `name` inside `dir`, consulting the dentry cache first.
    pub fn lookup(&self, dir: &Inode, name: &str) -> VfsResult<Arc<Inode>> {
        if let Some(ino) = self.dcache.lookup(dir.ino(), name) {
            if let Some(inode) = self.inode(ino) {
                return Ok(inode);
            }
            self.dcache.invalidate(dir.ino(), name);
        }

        let child = dir.iop().call(|ops| ops.lookup(dir, name))?;
        self.dcache.insert(dir.ino(), name, child.ino());
        Ok(child)
    }

    /// Enumerates `dir` through its installed file operations.
    pub fn iterate(&self, dir: &Inode, filldir: &mut FillDir<'_>) -> VfsResult<()> {
        dir.fop().call(|ops| ops.iterate(dir, filldir))
    }

    /// Collects every entry `dir` enumerates.
    pub fn read_dir(&self, dir: &Inode) -> VfsResult<Vec<DirEntryBuf>> {
        let mut entries = Vec::new();
        self.iterate(dir, &mut |entry| {
            entries.push(DirEntryBuf {
                name: entry.name.to_owned(),
                ino: entry.ino,
                kind: entry.kind,
            });
            true
        })?;
        Ok(entries)
    }

    pub fn open(&self, inode: &Inode) -> VfsResult<()> {
        inode.fop().call(|ops| ops.open(inode))
    }

    pub fn release(&self, inode: &Inode) -> VfsResult<()> {
        inode.fop().call(|ops| ops.release(inode))
    }

    pub fn flush(&self, inode: &Inode) -> VfsResult<()> {
        inode.fop().call(|ops| ops.flush(inode))
    }

    pub fn read(&self, inode: &Inode, offset: u64, buf: &mut [u8]) -> VfsResult<usize> {
        inode.fop().call(|ops| ops.read(inode, offset, buf))
    }

    pub fn write(&self, inode: &Inode, offset: u64, data: &[u8]) -> VfsResult<usize> {
        inode.fop().call(|ops| ops.write(inode, offset, data))
    }

    pub fn getattr(&self, inode: &Inode) -> VfsResult<Attr> {
        inode.iop().call(|ops| ops.getattr(inode))
    }

    /// Opens `inode`, reads it to the end and releases it.
    pub fn read_to_end(&self, inode: &Inode) -> VfsResult<Vec<u8>> {
        self.open(inode)?;
        let mut out = Vec::new();
        let mut buf = vec![0u8; READ_CHUNK];
        let result = loop {
            match self.read(inode, out.len() as u64, &mut buf) {
                Ok(0) => break Ok(()),
                Ok(n) => out.extend_from_slice(&buf[..n]),
                Err(e) => break Err(e),
            }
        };
        self.release(inode)?;
        result.map(|()| out)
    }

    /// Removes the entry `name` from `dir`.
    ///
    /// The victim's own `remove` operation is consulted first, so an object whose
    /// table rejects removal stays where it is.
    pub fn remove(&self, dir: &Inode, name: &str) -> VfsResult<()> {
        let victim = self.lookup(dir, name)?;
        victim.iop().call(|ops| ops.remove(&victim))?;

        memfs::detach(dir, name)?;
        self.dcache.invalidate(dir.ino(), name);
        self.icache.remove(&victim.ino());
        trace!(parent = dir.ino(), ino = victim.ino(), name, "Removed object");
        Ok(())
    }

    /// Renames `from` to `to` within `dir`. The moved object keeps its identifier.
    pub fn rename(&self, dir: &Inode, from: &str, to: &str) -> VfsResult<()> {
        let ino = dir.iop().call(|ops| ops.rename(dir, from, to))?;
        self.dcache.invalidate(dir.ino(), from);
        self.dcache.insert(dir.ino(), to, ino);
        trace!(parent = dir.ino(), ino, from, to, "Renamed object");
        Ok(())
    }
}

impl Default for Vfs {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Vfs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Vfs")
            .field("root", &self.root)
            .field("objects", &self.icache.len())
            .field("dcache", &self.dcache)
            .finish_non_exhaustive()
    }
}
