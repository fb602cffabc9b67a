//! Shared test utilities for rpc-bench
//!
//! This crate provides common test helpers that can be used across
//! unit and integration tests without circular dependencies.
//!
//! ## Modules
//!
//! - [`scripts`]: Executable shell stubs for daemons and load generators
//! - [`vegeta`]: Sample vegeta text reports

pub mod scripts;
pub mod vegeta;

// Re-export commonly used items
pub use scripts::{write_generator_script, write_script, GeneratorBehavior};
pub use vegeta::{sample_report, write_sample_report};
