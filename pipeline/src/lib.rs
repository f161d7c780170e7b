//! Staged software-change pipeline driven by an external coding agent.
//!
//! A run takes a free-text requirement through branch management,
//! implementation, simplification, a bounded review loop, a design check,
//! tests, commit and changelog. Each stage delegates its actual work to the
//! agent; this crate decides which stages run, in what order, and renders
//! what the agent is doing. The architecture enforces a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (skip predicate, reply parsing,
//!   branch naming, stream decoding). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (agent process, git, signals,
//!   console). Isolated behind traits to enable fakes in tests.
//!
//! Orchestration modules ([`pipeline`], [`stages`], [`branch`],
//! [`analyzer`], [`classifier`]) coordinate core logic with I/O.

pub mod analyzer;
pub mod branch;
pub mod classifier;
pub mod core;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod pipeline;
pub mod stages;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
