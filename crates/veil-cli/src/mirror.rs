//! Copies a host directory tree into the in-memory filesystem.

use std::fs;
use std::path::{Component, Path};

use anyhow::{Context, Result, bail};
use tracing::{debug, warn};
use veil_core::Vfs;
use walkdir::WalkDir;

/// What was copied by [`mirror_into`].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MirrorSummary {
    pub dirs: usize,
    pub files: usize,
    pub skipped: usize,
}

/// Converts a path relative to the mirror root into an absolute VFS path.
fn vfs_path(relative: &Path) -> Result<String> {
    let mut out = String::new();
    for component in relative.components() {
        let Component::Normal(name) = component else {
            bail!("unexpected path component in {}", relative.display());
        };
        let name = name
            .to_str()
            .with_context(|| format!("{} is not valid UTF-8", relative.display()))?;
        out.push('/');
        out.push_str(name);
    }
    Ok(out)
}

/// Mirrors `host_root` so that it becomes `/` of `vfs`.
///
/// Directories and regular files are copied. Symlinks and other special files are
/// skipped with a warning.
pub fn mirror_into(vfs: &Vfs, host_root: &Path) -> Result<MirrorSummary> {
    if !host_root.is_dir() {
        bail!("Mirror root is not a directory: {}", host_root.display());
    }

    let mut summary = MirrorSummary::default();
    for entry in WalkDir::new(host_root).min_depth(1).sort_by_file_name() {
        let entry = entry.with_context(|| format!("Failed to walk {}", host_root.display()))?;
        let relative = entry
            .path()
            .strip_prefix(host_root)
            .context("walkdir yielded a path outside the mirror root")?;
        let path = vfs_path(relative)?;
        let file_type = entry.file_type();

        if file_type.is_dir() {
            vfs.mkdir_all(&path)
                .with_context(|| format!("Failed to create {path}"))?;
            summary.dirs += 1;
        } else if file_type.is_file() {
            let (parent, name) = path.rsplit_once('/').unwrap_or(("", path.as_str()));
            let dir = vfs
                .mkdir_all(parent)
                .with_context(|| format!("Failed to create {parent}"))?;
            let data = fs::read(entry.path())
                .with_context(|| format!("Failed to read {}", entry.path().display()))?;
            vfs.create_file(&dir, name, &data)
                .with_context(|| format!("Failed to create {path}"))?;
            summary.files += 1;
        } else {
            warn!(path = %entry.path().display(), "Skipping special file");
            summary.skipped += 1;
        }
    }

    debug!(?summary, root = %host_root.display(), "Mirrored host directory");
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_mirror_copies_tree() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("root/empty")).unwrap();
        fs::write(temp.path().join("root/secret.txt"), b"top secret").unwrap();
        fs::write(temp.path().join("top.txt"), b"").unwrap();

        let vfs = Vfs::new();
        let summary = mirror_into(&vfs, temp.path()).unwrap();

        assert_eq!(summary, MirrorSummary { dirs: 2, files: 2, skipped: 0 });
        let root = vfs.lookup(&vfs.root(), "root").unwrap();
        let secret = vfs.lookup(&root, "secret.txt").unwrap();
        assert_eq!(vfs.read_to_end(&secret).unwrap(), b"top secret");
        let names: Vec<_> = vfs.read_dir(&root).unwrap().into_iter().map(|e| e.name).collect();
        assert_eq!(names, ["empty", "secret.txt"]);
    }

    #[test]
    fn test_mirror_rejects_missing_root() {
        let temp = TempDir::new().unwrap();
        let err = mirror_into(&Vfs::new(), &temp.path().join("absent")).unwrap_err();
        assert!(err.to_string().contains("not a directory"));
    }

    #[test]
    fn test_vfs_path() {
        assert_eq!(vfs_path(Path::new("a/b/c.txt")).unwrap(), "/a/b/c.txt");
    }
}
