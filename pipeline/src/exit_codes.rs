//! Stable exit codes for the pipeline CLI.

/// Every stage completed or was skipped.
pub const OK: i32 = 0;
/// A stage failed, or configuration/startup failed.
pub const FAILED: i32 = 1;
/// The operator (or the agent) cancelled the run.
pub const INTERRUPTED: i32 = 130;
