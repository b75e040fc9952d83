//! Control channel.
//!
//! The device accepts one session at a time. Each write carries one absolute
//! path and returns either the number of bytes consumed or a negative status:
//!
//! | Status | Cause |
//! |---|---|
//! | `-1` | path not valid UTF-8, embedded NUL, or resolution failed |
//! | `-2` | conflict, allocation failure, or stopped engine |

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use crate::engine::Engine;
use crate::error::{ChannelError, STATUS_RESOLUTION_FAILED};

/// Single-session control device bound to an engine.
#[derive(Debug)]
pub struct ControlDevice {
    engine: Arc<Engine>,
    open: AtomicBool,
}

impl ControlDevice {
    pub fn new(engine: Arc<Engine>) -> Self {
        Self {
            engine,
            open: AtomicBool::new(false),
        }
    }

    /// Opens a session. Fails with [`ChannelError::Busy`] while another session is open.
    pub fn open(&self) -> Result<ControlSession<'_>, ChannelError> {
        if self
            .open
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            debug!("Control device already open");
            return Err(ChannelError::Busy);
        }
        debug!("Control session opened");
        Ok(ControlSession { device: self })
    }

    /// Returns true while a session is open.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    pub fn engine(&self) -> &Arc<Engine> {
        &self.engine
    }
}

/// An open session on a [`ControlDevice`]. Dropping it releases the device.
#[derive(Debug)]
pub struct ControlSession<'a> {
    device: &'a ControlDevice,
}

impl ControlSession<'_> {
    /// Conceals the path carried by `buf`.
    ///
    /// One trailing newline is stripped. On success the full length of `buf` is
    /// returned.
    pub fn write(&mut self, buf: &[u8]) -> isize {
        let bytes = buf.strip_suffix(b"\n").unwrap_or(buf);
        if bytes.contains(&0) {
            warn!("Rejected control write containing NUL");
            return STATUS_RESOLUTION_FAILED;
        }
        let Ok(path) = std::str::from_utf8(bytes) else {
            warn!("Rejected control write that is not valid UTF-8");
            return STATUS_RESOLUTION_FAILED;
        };

        match self.device.engine.conceal(path) {
            Ok(_) => isize::try_from(buf.len()).unwrap_or(isize::MAX),
            Err(e) => {
                warn!(path, error = %e, "Control write failed");
                e.channel_status()
            }
        }
    }
}

impl Drop for ControlSession<'_> {
    fn drop(&mut self) {
        self.device.open.store(false, Ordering::Release);
        debug!("Control session released");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::error::STATUS_HOOK_FAILED;
    use crate::vfs::Vfs;

    fn device() -> ControlDevice {
        let vfs = Arc::new(Vfs::new());
        let dir = vfs.mkdir_all("/root").unwrap();
        vfs.create_file(&dir, "secret.txt", b"").unwrap();
        ControlDevice::new(Arc::new(Engine::start(vfs, EngineConfig::default())))
    }

    #[test]
    fn test_single_session() {
        let device = device();
        let session = device.open().unwrap();
        assert!(device.is_open());
        assert_eq!(device.open().unwrap_err(), ChannelError::Busy);

        drop(session);
        assert!(!device.is_open());
        assert!(device.open().is_ok());
    }

    #[test]
    fn test_write_returns_consumed_length() {
        let device = device();
        let mut session = device.open().unwrap();
        let input = b"/root/secret.txt\n";
        assert_eq!(session.write(input), input.len() as isize);
        assert_eq!(device.engine().registry().len(), 1);
    }

    #[test]
    fn test_write_status_codes() {
        let device = device();
        let mut session = device.open().unwrap();

        assert_eq!(session.write(b"/root/doesnotexist"), STATUS_RESOLUTION_FAILED);
        assert_eq!(session.write(b"/root/secret.txt"), 16);
        assert_eq!(session.write(b"/root/secret.txt"), STATUS_HOOK_FAILED);
        assert_eq!(device.engine().registry().len(), 1);
    }

    #[test]
    fn test_write_rejects_malformed_input() {
        let device = device();
        let mut session = device.open().unwrap();

        assert_eq!(session.write(b"/root/sec\0ret.txt"), STATUS_RESOLUTION_FAILED);
        assert_eq!(session.write(&[b'/', 0xff, 0xfe]), STATUS_RESOLUTION_FAILED);
        assert!(device.engine().registry().is_empty());
    }

    #[test]
    fn test_write_after_shutdown() {
        let device = device();
        device.engine().shutdown();
        let mut session = device.open().unwrap();
        assert_eq!(session.write(b"/root/secret.txt"), STATUS_HOOK_FAILED);
    }
}
