//! Directory-entry concealment for an in-memory virtual filesystem.
//!
//! The engine hides chosen objects of a [`Vfs`](vfs::Vfs) from directory
//! listings without deleting them. Concealing an object:
//!
//! - installs a stub table into both of the object's operation slots, so direct
//!   access fails with `ENOTSUP`;
//! - installs a filtering table on the parent directory, so enumeration skips
//!   entries that resolve to the concealed identifier.
//!
//! Everything that was replaced is recorded, and shutdown writes the saved
//! tables back.
//!
//! # Usage
//!
//! ```
//! use std::sync::Arc;
//! use veil_core::{Engine, EngineConfig, Vfs};
//!
//! let vfs = Arc::new(Vfs::new());
//! let dir = vfs.mkdir_all("/root").unwrap();
//! vfs.create_file(&dir, "secret.txt", b"hidden").unwrap();
//! vfs.create_file(&dir, "notes.txt", b"visible").unwrap();
//!
//! let engine = Engine::start(Arc::clone(&vfs), EngineConfig::default());
//! engine.conceal("/root/secret.txt").unwrap();
//! assert_eq!(vfs.read_dir(&dir).unwrap().len(), 1);
//!
//! let report = engine.shutdown();
//! assert_eq!(report.records, 1);
//! assert_eq!(vfs.read_dir(&dir).unwrap().len(), 2);
//! ```

pub mod channel;
pub mod config;
pub mod engine;
pub mod error;
pub mod filter;
pub mod hooks;
pub mod registry;
pub mod resolver;
pub mod restore;
pub mod stats;
pub mod vfs;

pub use channel::{ControlDevice, ControlSession};
pub use config::EngineConfig;
pub use engine::Engine;
pub use error::{ChannelError, ConflictReason, HookError, STATUS_HOOK_FAILED, STATUS_RESOLUTION_FAILED, VfsError, VfsResult};
pub use filter::FilterSnapshot;
pub use registry::{Registry, TargetRecord};
pub use resolver::{Resolved, resolve};
pub use restore::{RestoreEngine, RestoreReport};
pub use stats::{FilterStats, FilterStatsSnapshot};
pub use vfs::{Ino, Inode, Vfs};
