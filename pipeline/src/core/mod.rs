//! Deterministic, pure logic shared by the pipeline.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data (configuration, agent replies, branch names, decoded events) and
//! return deterministic outputs suitable for tests.

pub mod branch_name;
pub mod classification;
pub mod config;
pub mod events;
pub mod recommendation;
pub mod reply;
pub mod review;
pub mod skip;
pub mod types;
