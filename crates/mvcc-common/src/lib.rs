//! ---
//! mvcc_section: "01-core-functionality"
//! mvcc_subsection: "module"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "Shared primitives and utilities for the scenario runner."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
//! Shared primitives for the mvcc-sim workspace.
//! This crate exposes dialect profiles, runner configuration loading, and
//! tracing initialisation consumed across the workspace.

pub mod config;
pub mod dialect;
pub mod logging;

pub use config::{LoadedRunnerConfig, LoggingConfig, RunnerConfig, SlotLayout, TimingConfig};
pub use dialect::{ConnectionProfile, Dialect, DialectProfile, FailurePatterns};
pub use logging::{init_tracing, LogFormat};
