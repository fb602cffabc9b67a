//! rpc-bench-common - Shared types and utilities
//!
//! This crate provides the types shared by the campaign runner and its test
//! helpers, without any process or filesystem dependencies.
//!
//! ## Modules
//!
//! - [`daemon_kind`]: The two daemon variants under comparison
//! - [`defaults`]: Default configuration values
//! - [`run_result`]: Per-run latency results
//! - [`sequence`]: Test-sequence parsing and rendering

pub mod daemon_kind;
pub mod defaults;
pub mod run_result;
pub mod sequence;

// Re-export commonly used types
pub use daemon_kind::DaemonKind;
pub use run_result::{LatencySummary, RunOutcome, RunResult};
pub use sequence::{SequenceParseError, TestSequence, TestSequenceStep};
