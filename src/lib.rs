//! weave library crate — re-exports for integration tests.
//!
//! The primary interface is the `weave` binary. This lib.rs exposes internal
//! modules so that integration tests can exercise the merge engine, model
//! discovery, and variant bookkeeping directly without going through the CLI.

pub mod config;
pub mod error;
pub mod merge;
pub mod models;
pub mod resource;
pub mod sync;
pub mod variant;

// Private modules only used by the binary — not re-exported: telemetry.
