//! Engine lifecycle: start, conceal, shutdown.
//!
//! An [`Engine`] owns the registry for one [`Vfs`]. Shutdown restores every
//! hooked table exactly once; dropping a running engine shuts it down.

use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, warn};

use crate::config::EngineConfig;
use crate::error::HookError;
use crate::registry::Registry;
use crate::resolver::{Resolved, resolve};
use crate::restore::{RestoreEngine, RestoreReport};
use crate::stats::FilterStatsSnapshot;
use crate::vfs::{Ino, Vfs};

/// The concealment engine.
pub struct Engine {
    vfs: Arc<Vfs>,
    config: EngineConfig,
    registry: Registry,
    restore: RestoreEngine,
    /// Held shared by registrations and exclusive by shutdown, so no
    /// registration can land after the restore pass.
    running: RwLock<bool>,
}

impl Engine {
    /// Starts an engine over `vfs` with an empty registry.
    pub fn start(vfs: Arc<Vfs>, config: EngineConfig) -> Self {
        let registry = Registry::new(vfs.dcache().clone(), &config);
        info!(
            root = %config.root_path,
            max_records = ?config.max_records,
            "Engine started"
        );
        Self {
            vfs,
            config,
            registry,
            restore: RestoreEngine::new(),
            running: RwLock::new(true),
        }
    }

    /// Resolves `path` and conceals the object it names.
    pub fn conceal(&self, path: &str) -> Result<Ino, HookError> {
        let running = self.running.read();
        if !*running {
            return Err(HookError::EngineStopped);
        }

        let Resolved { target, parent } = resolve(&self.vfs, &self.config.root_path, path)?;
        let ino = self.registry.register(&target, &parent)?;
        info!(path, ino, "Path concealed");
        Ok(ino)
    }

    /// Returns true until [`shutdown`](Self::shutdown) has been called.
    pub fn is_running(&self) -> bool {
        *self.running.read()
    }

    /// Restores every hooked table and stops accepting registrations.
    ///
    /// Only the first call restores anything.
    pub fn shutdown(&self) -> RestoreReport {
        let mut running = self.running.write();
        *running = false;
        let report = self.restore.run(&self.registry);
        if report.vanished_objects > 0 {
            warn!(vanished = report.vanished_objects, "Some concealed objects vanished before shutdown");
        }
        report
    }

    pub fn vfs(&self) -> &Arc<Vfs> {
        &self.vfs
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Point-in-time copy of the enumeration filter counters.
    pub fn stats(&self) -> FilterStatsSnapshot {
        self.registry.stats().snapshot()
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if !self.restore.has_run() {
            self.shutdown();
        }
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("running", &self.is_running())
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
