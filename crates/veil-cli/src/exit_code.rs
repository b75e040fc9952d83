//! Exit codes for the CLI.

/// Every requested path was concealed.
pub const SUCCESS: u8 = 0;

/// Setup failed before any path was processed (config, mirror, channel).
pub const GENERAL_ERROR: u8 = 1;

/// At least one path could not be concealed.
pub const HIDE_FAILED: u8 = 3;
