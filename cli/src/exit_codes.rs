//! Process exit codes of `ci-runner`.

/// Every selected job passed.
pub const OK: i32 = 0;
/// At least one job failed or could not be started.
pub const FAILED: i32 = 1;
/// The invocation or the pipeline definition was invalid.
pub const INVALID: i32 = 2;
