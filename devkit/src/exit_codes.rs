//! Stable exit codes for devkit commands.

/// Command succeeded, or a selection prompt was cancelled.
pub const OK: i32 = 0;
/// Configuration error: no manifest, unparsable manifest, no package manager,
/// unknown package, bad config file, missing editor.
pub const INVALID: i32 = 1;
/// `devkit setup` ran and at least one task was rejected.
pub const TASKS_FAILED: i32 = 2;
