//! Property tests for restoration.
//!
//! Every file and directory starts with its own tagged table, so after restore
//! each slot can be checked against exactly the table it held before.

mod common;

use std::sync::Arc;

use common::TaggedOps;
use proptest::prelude::*;
use veil_core::vfs::{FileOperations, InodeOperations};
use veil_core::{EngineConfig, Inode, Registry, Vfs};

struct Tree {
    vfs: Vfs,
    dirs: Vec<Arc<Inode>>,
    files: Vec<(Arc<Inode>, usize)>,
}

/// `files` objects spread round-robin over `dirs` directories under the root.
fn tagged_tree(dirs: usize, files: usize) -> Tree {
    let vfs = Vfs::new();
    let root = vfs.root();
    let dirs: Vec<_> = (0..dirs)
        .map(|d| {
            let dir = vfs.mkdir(&root, &format!("d{d}")).unwrap();
            dir.fop().install(TaggedOps::dir(d));
            dir
        })
        .collect();
    let files = (0..files)
        .map(|f| {
            let parent = f % dirs.len();
            let file = vfs.create_file(&dirs[parent], &format!("f{f}"), b"").unwrap();
            file.fop().install(TaggedOps::file(100 + f));
            (file, parent)
        })
        .collect();
    Tree { vfs, dirs, files }
}

type Saved = (Arc<dyn FileOperations>, Arc<dyn InodeOperations>);

fn saved(inode: &Inode) -> Saved {
    (inode.fop().current(), inode.iop().current())
}

proptest! {
    /// Restore puts every slot back to its pre-registration table for any
    /// number of targets registered in any order.
    #[test]
    fn restore_returns_every_slot(
        order in (1usize..10).prop_flat_map(|n| Just((0..n).collect::<Vec<_>>()).prop_shuffle()),
        dirs in 1usize..4,
    ) {
        let tree = tagged_tree(dirs, order.len());
        let registry = Registry::new(tree.vfs.dcache().clone(), &EngineConfig::default());
        let dirs_before: Vec<Saved> = tree.dirs.iter().map(|d| saved(d)).collect();
        let files_before: Vec<Saved> = tree.files.iter().map(|(f, _)| saved(f)).collect();

        for &i in &order {
            let (file, parent) = &tree.files[i];
            registry.register(file, &tree.dirs[*parent]).unwrap();
        }
        prop_assert_eq!(registry.identifiers().len(), order.len());

        let report = registry.restore_all();
        prop_assert_eq!(report.records, order.len());
        prop_assert_eq!(report.vanished_objects, 0);

        for (dir, (fop, _)) in tree.dirs.iter().zip(&dirs_before) {
            prop_assert!(dir.fop().is_installed(fop), "directory {} not restored", dir.ino());
        }
        for ((file, _), (fop, iop)) in tree.files.iter().zip(&files_before) {
            prop_assert!(file.fop().is_installed(fop));
            prop_assert!(file.iop().is_installed(iop));
        }
        prop_assert!(registry.is_empty());
    }

    /// Duplicate registrations in between never change what restore writes back.
    #[test]
    fn duplicates_never_leak_stubs(
        targets in 1usize..6,
        repeats in prop::collection::vec(0usize..6, 0..12),
    ) {
        let tree = tagged_tree(1, targets);
        let registry = Registry::new(tree.vfs.dcache().clone(), &EngineConfig::default());
        let before: Vec<Saved> = tree.files.iter().map(|(f, _)| saved(f)).collect();
        let parent = &tree.dirs[0];

        for (file, _) in &tree.files {
            registry.register(file, parent).unwrap();
        }
        for r in repeats {
            let (file, _) = &tree.files[r % targets];
            prop_assert!(registry.register(file, parent).is_err());
        }
        prop_assert_eq!(registry.len(), targets);

        registry.restore_all();
        for ((file, _), (fop, iop)) in tree.files.iter().zip(&before) {
            prop_assert!(file.fop().is_installed(fop));
            prop_assert!(file.iop().is_installed(iop));
        }
    }
}
