//! Error types for the concealment engine.
//!
//! Three layers of errors exist:
//!
//! - [`VfsError`] is returned by operation tables and the [`Vfs`](crate::vfs::Vfs)
//!   dispatch entry points. It maps to POSIX errno values via [`VfsError::to_errno`].
//! - [`HookError`] is returned by registration. It maps to the control channel's
//!   negative status codes via [`HookError::channel_status`].
//! - [`ChannelError`] covers the control device's session lifecycle.

use crate::vfs::Ino;
use thiserror::Error;

/// Control channel status: the root or the target path could not be resolved.
pub const STATUS_RESOLUTION_FAILED: isize = -1;

/// Control channel status: hook installation failed (conflict, allocation, stopped engine).
pub const STATUS_HOOK_FAILED: isize = -2;

/// Errors produced by filesystem operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VfsError {
    /// The operation is rejected by the installed table.
    #[error("Operation not supported")]
    NotSupported,

    /// No entry with this name exists.
    #[error("No such file or directory: {0}")]
    NotFound(String),

    /// Directory operation attempted on a non-directory.
    #[error("Not a directory: inode {0}")]
    NotADirectory(Ino),

    /// File operation attempted on a directory.
    #[error("Is a directory: inode {0}")]
    IsADirectory(Ino),

    /// An entry with this name already exists.
    #[error("File already exists: {0}")]
    AlreadyExists(String),

    /// Directory not empty.
    #[error("Directory not empty: inode {0}")]
    NotEmpty(Ino),

    /// A write would grow a file past the size limit.
    #[error("File too large: inode {0}")]
    FileTooLarge(Ino),

    /// The object was dropped by the filesystem while still referenced.
    #[error("Inode {0} no longer exists")]
    Vanished(Ino),
}

impl VfsError {
    /// Converts this error to a libc error code.
    pub fn to_errno(&self) -> i32 {
        match self {
            VfsError::NotSupported => libc::ENOTSUP,
            VfsError::NotFound(_) | VfsError::Vanished(_) => libc::ENOENT,
            VfsError::NotADirectory(_) => libc::ENOTDIR,
            VfsError::IsADirectory(_) => libc::EISDIR,
            VfsError::AlreadyExists(_) => libc::EEXIST,
            VfsError::NotEmpty(_) => libc::ENOTEMPTY,
            VfsError::FileTooLarge(_) => libc::EFBIG,
        }
    }
}

/// Result type for filesystem operations.
pub type VfsResult<T> = Result<T, VfsError>;

/// Why a registration was refused as a conflict.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictReason {
    /// The target identifier is already registered.
    AlreadyConcealed,
    /// The target's parent directory is itself a concealed object.
    ParentConcealed,
}

impl std::fmt::Display for ConflictReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConflictReason::AlreadyConcealed => f.write_str("object is already concealed"),
            ConflictReason::ParentConcealed => f.write_str("parent directory is concealed"),
        }
    }
}

/// Errors produced when registering a target for concealment.
///
/// Every variant is recoverable: a failed registration leaves the registry and all
/// operation tables exactly as they were before the call.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HookError {
    /// The well-known root or the requested path could not be resolved.
    #[error("Path resolution failed: {0}")]
    PathResolution(String),

    /// Registry storage could not grow.
    #[error("Registry allocation failed: {reason}")]
    Allocation {
        /// Human-readable cause (capacity limit or allocator failure).
        reason: String,
    },

    /// Hooking this target would save a stub as if it were the original table.
    #[error("Hook conflict on inode {ino}: {reason}")]
    HookConflict {
        /// Identifier of the object that caused the conflict.
        ino: Ino,
        /// Which conflict was detected.
        reason: ConflictReason,
    },

    /// The engine has already been shut down.
    #[error("Engine has been shut down")]
    EngineStopped,
}

impl HookError {
    /// Maps this error to the control channel's negative status code.
    pub fn channel_status(&self) -> isize {
        match self {
            HookError::PathResolution(_) => STATUS_RESOLUTION_FAILED,
            HookError::Allocation { .. }
            | HookError::HookConflict { .. }
            | HookError::EngineStopped => STATUS_HOOK_FAILED,
        }
    }
}

/// Errors produced by the control device's session lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelError {
    /// Another session is already open.
    #[error("Control device is busy")]
    Busy,
}

impl ChannelError {
    /// Converts this error to a libc error code.
    pub fn to_errno(&self) -> i32 {
        match self {
            ChannelError::Busy => libc::EBUSY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vfs_error_errno_mapping() {
        assert_eq!(VfsError::NotSupported.to_errno(), libc::ENOTSUP);
        assert_eq!(VfsError::NotFound("x".into()).to_errno(), libc::ENOENT);
        assert_eq!(VfsError::Vanished(7).to_errno(), libc::ENOENT);
        assert_eq!(VfsError::NotADirectory(2).to_errno(), libc::ENOTDIR);
        assert_eq!(VfsError::IsADirectory(2).to_errno(), libc::EISDIR);
        assert_eq!(VfsError::AlreadyExists("x".into()).to_errno(), libc::EEXIST);
        assert_eq!(VfsError::NotEmpty(3).to_errno(), libc::ENOTEMPTY);
        assert_eq!(VfsError::FileTooLarge(4).to_errno(), libc::EFBIG);
    }

    #[test]
    fn test_hook_error_channel_status() {
        assert_eq!(
            HookError::PathResolution("/nope".into()).channel_status(),
            STATUS_RESOLUTION_FAILED
        );
        assert_eq!(
            HookError::Allocation {
                reason: "full".into()
            }
            .channel_status(),
            STATUS_HOOK_FAILED
        );
        assert_eq!(
            HookError::HookConflict {
                ino: 5,
                reason: ConflictReason::AlreadyConcealed
            }
            .channel_status(),
            STATUS_HOOK_FAILED
        );
        assert_eq!(HookError::EngineStopped.channel_status(), STATUS_HOOK_FAILED);
    }

    #[test]
    fn test_conflict_message_names_reason() {
        let e = HookError::HookConflict {
            ino: 12,
            reason: ConflictReason::ParentConcealed,
        };
        assert_eq!(
            e.to_string(),
            "Hook conflict on inode 12: parent directory is concealed"
        );
    }

    #[test]
    fn test_channel_busy_errno() {
        assert_eq!(ChannelError::Busy.to_errno(), libc::EBUSY);
    }
}
