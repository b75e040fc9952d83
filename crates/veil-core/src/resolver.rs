//! Target resolution: path string to live object handles.

use std::sync::Arc;

use tracing::debug;

use crate::error::HookError;
use crate::vfs::{Inode, Vfs};

/// A resolved concealment target and the directory that lists it.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub target: Arc<Inode>,
    pub parent: Arc<Inode>,
}

/// Walks absolute `path` component by component starting at the root.
///
/// Returns the directories visited, root first, ending with the final object.
fn walk(vfs: &Vfs, path: &str) -> Result<Vec<Arc<Inode>>, HookError> {
    if !path.starts_with('/') {
        return Err(HookError::PathResolution(format!(
            "{path}: path must be absolute"
        )));
    }

    let mut stack = vec![vfs.root()];
    for name in path.split('/') {
        match name {
            "" | "." => {}
            ".." => {
                if stack.len() > 1 {
                    stack.pop();
                }
            }
            _ => {
                let Some(dir) = stack.last() else {
                    return Err(HookError::PathResolution(path.to_owned()));
                };
                let next = vfs
                    .lookup(dir, name)
                    .map_err(|e| HookError::PathResolution(format!("{path}: {e}")))?;
                stack.push(next);
            }
        }
    }
    Ok(stack)
}

/// Resolves `path` to the target object and its parent directory.
///
/// `root_path` must resolve to a directory first; otherwise nothing else is
/// looked up. The only side effect is warming the dentry cache.
pub fn resolve(vfs: &Vfs, root_path: &str, path: &str) -> Result<Resolved, HookError> {
    let root = walk(vfs, root_path)?;
    if !root.last().is_some_and(|dir| dir.is_dir()) {
        debug!(root_path, "Well-known root is not a directory");
        return Err(HookError::PathResolution(format!(
            "{root_path}: root is not a directory"
        )));
    }

    let mut stack = walk(vfs, path)?;
    let (Some(target), Some(parent)) = (stack.pop(), stack.pop()) else {
        return Err(HookError::PathResolution(format!(
            "{path}: the root directory cannot be concealed"
        )));
    };

    debug!(path, ino = target.ino(), parent = parent.ino(), "Resolved target");
    Ok(Resolved { target, parent })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Vfs {
        let vfs = Vfs::new();
        let dir = vfs.mkdir_all("/root").unwrap();
        vfs.create_file(&dir, "secret.txt", b"top secret").unwrap();
        vfs
    }

    #[test]
    fn test_resolves_target_and_parent() {
        let vfs = sample();
        let resolved = resolve(&vfs, "/", "/root/secret.txt").unwrap();
        let root_dir = vfs.lookup(&vfs.root(), "root").unwrap();

        assert_eq!(resolved.parent.ino(), root_dir.ino());
        assert_eq!(
            resolved.target.ino(),
            vfs.lookup(&root_dir, "secret.txt").unwrap().ino()
        );
    }

    #[test]
    fn test_dot_components() {
        let vfs = sample();
        let plain = resolve(&vfs, "/", "/root/secret.txt").unwrap();
        let dotted = resolve(&vfs, "/", "//root/./../root/secret.txt").unwrap();
        assert_eq!(plain.target.ino(), dotted.target.ino());
        assert_eq!(plain.parent.ino(), dotted.parent.ino());
    }

    #[test]
    fn test_missing_target() {
        let vfs = sample();
        let err = resolve(&vfs, "/", "/root/doesnotexist").unwrap_err();
        assert!(matches!(err, HookError::PathResolution(_)));
    }

    #[test]
    fn test_missing_well_known_root() {
        let vfs = sample();
        let err = resolve(&vfs, "/nowhere", "/root/secret.txt").unwrap_err();
        assert!(matches!(err, HookError::PathResolution(_)));
    }

    #[test]
    fn test_well_known_root_must_be_directory() {
        let vfs = sample();
        let err = resolve(&vfs, "/root/secret.txt", "/root/secret.txt").unwrap_err();
        assert!(matches!(err, HookError::PathResolution(_)));
    }

    #[test]
    fn test_relative_path_rejected() {
        let vfs = sample();
        let err = resolve(&vfs, "/", "root/secret.txt").unwrap_err();
        assert!(matches!(err, HookError::PathResolution(_)));
    }

    #[test]
    fn test_root_cannot_be_target() {
        let vfs = sample();
        for path in ["/", "/root/..", "/."] {
            let err = resolve(&vfs, "/", path).unwrap_err();
            assert!(matches!(err, HookError::PathResolution(_)), "{path}");
        }
    }

    #[test]
    fn test_walking_through_a_file_fails() {
        let vfs = sample();
        let err = resolve(&vfs, "/", "/root/secret.txt/inner").unwrap_err();
        assert!(matches!(err, HookError::PathResolution(_)));
    }
}
