//! rpc-bench-runner - Latency campaigns against silkrpc and rpcdaemon
//!
//! This crate drives vegeta load against each daemon in turn and collects the
//! per-run latency summaries into one CSV report. The `rpc-bench` binary is a
//! thin wrapper around [`campaign::run_campaign`].

pub mod campaign;
pub mod command;
pub mod config;
pub mod daemon;
pub mod error;
pub mod generator;
pub mod host;
pub mod logging;
pub mod pattern;
pub mod report;
pub mod results;
pub mod wait;
