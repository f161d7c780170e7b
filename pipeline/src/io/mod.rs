//! I/O helpers for pipeline commands.

pub mod agent;
pub mod config;
pub mod console;
pub mod display;
pub mod git;
pub mod input;
pub mod process;
pub mod prompt;
pub mod signals;
