//! Default operation tables for in-memory objects.
//!
//! These are the "real" implementations a freshly created object starts with,
//! and what a restored object ends up with again.

use std::collections::btree_map::Entry;
use std::sync::Arc;

use super::inode::{Attr, Contents, Ino, Inode};
use super::ops::{DirEntry, FileOperations, FillDir, InodeOperations};
use crate::error::{VfsError, VfsResult};

/// Largest size a file may grow to through `write`.
pub const MAX_FILE_SIZE: usize = 1 << 30;

/// File operations for regular in-memory files.
#[derive(Debug, Default)]
pub struct MemFileOps;

impl FileOperations for MemFileOps {
    fn label(&self) -> &'static str {
        "mem_file"
    }

    fn open(&self, _inode: &Inode) -> VfsResult<()> {
        Ok(())
    }

    fn release(&self, _inode: &Inode) -> VfsResult<()> {
        Ok(())
    }

    fn read(&self, inode: &Inode, offset: u64, buf: &mut [u8]) -> VfsResult<usize> {
        let contents = inode.contents().read();
        let Contents::File(data) = &*contents else {
            return Err(VfsError::IsADirectory(inode.ino()));
        };
        let Ok(start) = usize::try_from(offset) else {
            return Ok(0);
        };
        if start >= data.len() {
            return Ok(0);
        }
        let n = buf.len().min(data.len() - start);
        buf[..n].copy_from_slice(&data[start..start + n]);
        Ok(n)
    }

    fn write(&self, inode: &Inode, offset: u64, data: &[u8]) -> VfsResult<usize> {
        let mut contents = inode.contents().write();
        let Contents::File(bytes) = &mut *contents else {
            return Err(VfsError::IsADirectory(inode.ino()));
        };
        let range = usize::try_from(offset)
            .ok()
            .and_then(|start| start.checked_add(data.len()).map(|end| (start, end)))
            .filter(|&(_, end)| end <= MAX_FILE_SIZE);
        let Some((start, end)) = range else {
            return Err(VfsError::FileTooLarge(inode.ino()));
        };
        if end > bytes.len() {
            bytes.resize(end, 0);
        }
        bytes[start..end].copy_from_slice(data);
        Ok(data.len())
    }

    fn flush(&self, _inode: &Inode) -> VfsResult<()> {
        Ok(())
    }

    fn iterate(&self, dir: &Inode, _filldir: &mut FillDir<'_>) -> VfsResult<()> {
        Err(VfsError::NotADirectory(dir.ino()))
    }
}

/// File operations for in-memory directories.
#[derive(Debug, Default)]
pub struct MemDirOps;

impl FileOperations for MemDirOps {
    fn label(&self) -> &'static str {
        "mem_dir"
    }

    fn open(&self, _inode: &Inode) -> VfsResult<()> {
        Ok(())
    }

    fn release(&self, _inode: &Inode) -> VfsResult<()> {
        Ok(())
    }

    fn read(&self, inode: &Inode, _offset: u64, _buf: &mut [u8]) -> VfsResult<usize> {
        Err(VfsError::IsADirectory(inode.ino()))
    }

    fn write(&self, inode: &Inode, _offset: u64, _data: &[u8]) -> VfsResult<usize> {
        Err(VfsError::IsADirectory(inode.ino()))
    }

    fn flush(&self, _inode: &Inode) -> VfsResult<()> {
        Ok(())
    }

    fn iterate(&self, dir: &Inode, filldir: &mut FillDir<'_>) -> VfsResult<()> {
        // Snapshot the entries so the callback runs without the contents lock held.
        let entries: Vec<(String, Ino, _)> = {
            let contents = dir.contents().read();
            let Contents::Directory(children) = &*contents else {
                return Err(VfsError::NotADirectory(dir.ino()));
            };
            children
                .iter()
                .map(|(name, child)| (name.clone(), child.ino(), child.kind()))
                .collect()
        };

        for (name, ino, kind) in &entries {
            let entry = DirEntry {
                name,
                ino: *ino,
                kind: *kind,
            };
            if !filldir(&entry) {
                break;
            }
        }
        Ok(())
    }
}

/// Inode operations shared by in-memory files and directories.
#[derive(Debug, Default)]
pub struct MemInodeOps;

impl InodeOperations for MemInodeOps {
    fn label(&self) -> &'static str {
        "mem_inode"
    }

    fn lookup(&self, dir: &Inode, name: &str) -> VfsResult<Arc<Inode>> {
        let contents = dir.contents().read();
        let Contents::Directory(children) = &*contents else {
            return Err(VfsError::NotADirectory(dir.ino()));
        };
        children
            .get(name)
            .cloned()
            .ok_or_else(|| VfsError::NotFound(name.to_owned()))
    }

    fn getattr(&self, inode: &Inode) -> VfsResult<Attr> {
        let size = match &*inode.contents().read() {
            Contents::File(data) => data.len() as u64,
            Contents::Directory(children) => children.len() as u64,
        };
        Ok(Attr {
            ino: inode.ino(),
            kind: inode.kind(),
            size,
        })
    }

    fn remove(&self, inode: &Inode) -> VfsResult<()> {
        match &*inode.contents().read() {
            Contents::Directory(children) if !children.is_empty() => {
                Err(VfsError::NotEmpty(inode.ino()))
            }
            _ => Ok(()),
        }
    }

    fn rename(&self, dir: &Inode, from: &str, to: &str) -> VfsResult<Ino> {
        let mut contents = dir.contents().write();
        let Contents::Directory(children) = &mut *contents else {
            return Err(VfsError::NotADirectory(dir.ino()));
        };
        if from == to {
            return children
                .get(from)
                .map(|child| child.ino())
                .ok_or_else(|| VfsError::NotFound(from.to_owned()));
        }
        if children.contains_key(to) {
            return Err(VfsError::AlreadyExists(to.to_owned()));
        }
        let child = children
            .remove(from)
            .ok_or_else(|| VfsError::NotFound(from.to_owned()))?;
        let ino = child.ino();
        children.insert(to.to_owned(), child);
        Ok(ino)
    }
}

/// Adds `child` under `name` in `dir`.
pub(crate) fn attach(dir: &Inode, name: &str, child: Arc<Inode>) -> VfsResult<()> {
    let mut contents = dir.contents().write();
    let Contents::Directory(children) = &mut *contents else {
        return Err(VfsError::NotADirectory(dir.ino()));
    };
    match children.entry(name.to_owned()) {
        Entry::Occupied(_) => Err(VfsError::AlreadyExists(name.to_owned())),
        Entry::Vacant(slot) => {
            slot.insert(child);
            Ok(())
        }
    }
}

/// Removes `name` from `dir`, returning the detached object.
pub(crate) fn detach(dir: &Inode, name: &str) -> VfsResult<Arc<Inode>> {
    let mut contents = dir.contents().write();
    let Contents::Directory(children) = &mut *contents else {
        return Err(VfsError::NotADirectory(dir.ino()));
    };
    children
        .remove(name)
        .ok_or_else(|| VfsError::NotFound(name.to_owned()))
}
