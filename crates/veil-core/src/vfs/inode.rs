//! Live filesystem objects.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::ops::{FileOperations, InodeOperations, OpsSlot};

/// Stable numeric identifier of a filesystem object.
pub type Ino = u64;

/// Identifier of the filesystem root directory.
pub const ROOT_INO: Ino = 1;

/// Kind of a filesystem object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InodeKind {
    /// A regular file.
    File,
    /// A directory.
    Directory,
}

/// Attributes reported by `getattr`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attr {
    pub ino: Ino,
    pub kind: InodeKind,
    /// Byte length for files, entry count for directories.
    pub size: u64,
}

pub(crate) enum Contents {
    File(Vec<u8>),
    Directory(BTreeMap<String, Arc<Inode>>),
}

/// A live filesystem object.
///
/// The filesystem owns inodes through `Arc`s held by their parent directory.
/// Everything else, including the concealment engine, should hold `Weak`
/// references when it needs to outlive a single call.
pub struct Inode {
    ino: Ino,
    kind: InodeKind,
    contents: RwLock<Contents>,
    fop: OpsSlot<dyn FileOperations>,
    iop: OpsSlot<dyn InodeOperations>,
}

impl Inode {
    pub(crate) fn new(
        ino: Ino,
        kind: InodeKind,
        contents: Contents,
        fop: Arc<dyn FileOperations>,
        iop: Arc<dyn InodeOperations>,
    ) -> Self {
        Self {
            ino,
            kind,
            contents: RwLock::new(contents),
            fop: OpsSlot::new(fop),
            iop: OpsSlot::new(iop),
        }
    }

    #[inline]
    pub fn ino(&self) -> Ino {
        self.ino
    }

    #[inline]
    pub fn kind(&self) -> InodeKind {
        self.kind
    }

    #[inline]
    pub fn is_dir(&self) -> bool {
        self.kind == InodeKind::Directory
    }

    /// The file-operations slot.
    pub fn fop(&self) -> &OpsSlot<dyn FileOperations> {
        &self.fop
    }

    /// The inode-operations slot.
    pub fn iop(&self) -> &OpsSlot<dyn InodeOperations> {
        &self.iop
    }

    pub(crate) fn contents(&self) -> &RwLock<Contents> {
        &self.contents
    }
}

impl fmt::Debug for Inode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inode")
            .field("ino", &self.ino)
            .field("kind", &self.kind)
            .field("fop", &self.fop)
            .field("iop", &self.iop)
            .finish_non_exhaustive()
    }
}
