//! Standard exit codes for CLI operations

/// Success - operation completed without errors
pub const SUCCESS: i32 = 0;

/// General error - unspecified failure
pub const ERROR: i32 = 1;

/// Usage error - invalid arguments or options (clap's own convention)
pub const USAGE_ERROR: i32 = 2;

/// Resolution error - an image could not be pinned
pub const RESOLUTION_ERROR: i32 = 3;

/// IO error - file not found, permission denied, etc.
pub const IO_ERROR: i32 = 4;
