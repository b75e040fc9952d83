//! Shared fixtures for engine integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use veil_core::vfs::{FileOperations, FillDir, Inode, MemDirOps, MemFileOps};
use veil_core::{Engine, EngineConfig, Vfs, VfsResult, resolve};

/// Builds the standard tree:
///
/// ```text
/// /root/secret.txt
/// /root/notes.txt
/// /srv/data/report.csv
/// /srv/data/archive/
/// ```
pub fn sample_vfs() -> Arc<Vfs> {
    let vfs = Arc::new(Vfs::new());
    let root = vfs.mkdir_all("/root").unwrap();
    vfs.create_file(&root, "secret.txt", b"top secret").unwrap();
    vfs.create_file(&root, "notes.txt", b"shopping list").unwrap();
    let data = vfs.mkdir_all("/srv/data").unwrap();
    vfs.create_file(&data, "report.csv", b"a,b,c\n").unwrap();
    vfs.mkdir(&data, "archive").unwrap();
    vfs
}

pub fn sample_engine() -> Engine {
    Engine::start(sample_vfs(), EngineConfig::default())
}

/// Resolves an absolute path, panicking if it does not exist.
pub fn node(vfs: &Vfs, path: &str) -> Arc<Inode> {
    resolve(vfs, "/", path)
        .unwrap_or_else(|e| panic!("{path}: {e}"))
        .target
}

/// Names listed by `path`, in enumeration order.
pub fn list(vfs: &Vfs, path: &str) -> Vec<String> {
    let dir = if path == "/" { vfs.root() } else { node(vfs, path) };
    vfs.read_dir(&dir)
        .unwrap()
        .into_iter()
        .map(|e| e.name)
        .collect()
}

/// File table that delegates to the in-memory one but has its own identity, so a
/// test can tell exactly which table a slot holds.
#[derive(Debug)]
pub struct TaggedOps {
    tag: usize,
    dir: bool,
}

impl TaggedOps {
    pub fn file(tag: usize) -> Arc<dyn FileOperations> {
        Arc::new(Self { tag, dir: false })
    }

    pub fn dir(tag: usize) -> Arc<dyn FileOperations> {
        Arc::new(Self { tag, dir: true })
    }

    fn inner(&self) -> &dyn FileOperations {
        if self.dir {
            &MemDirOps as &dyn FileOperations
        } else {
            &MemFileOps
        }
    }
}

impl FileOperations for TaggedOps {
    fn label(&self) -> &'static str {
        "tagged"
    }

    fn open(&self, inode: &Inode) -> VfsResult<()> {
        self.inner().open(inode)
    }

    fn release(&self, inode: &Inode) -> VfsResult<()> {
        self.inner().release(inode)
    }

    fn read(&self, inode: &Inode, offset: u64, buf: &mut [u8]) -> VfsResult<usize> {
        self.inner().read(inode, offset, buf)
    }

    fn write(&self, inode: &Inode, offset: u64, data: &[u8]) -> VfsResult<usize> {
        self.inner().write(inode, offset, data)
    }

    fn flush(&self, inode: &Inode) -> VfsResult<()> {
        self.inner().flush(inode)
    }

    fn iterate(&self, dir: &Inode, filldir: &mut FillDir<'_>) -> VfsResult<()> {
        self.inner().iterate(dir, filldir)
    }
}
