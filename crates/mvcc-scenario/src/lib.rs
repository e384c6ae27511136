//! ---
//! mvcc_section: "02-scenario-model"
//! mvcc_subsection: "module"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "Scenario model exports."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
//! Declarative isolation-anomaly scenarios.
//!
//! A scenario document carries per-dialect connection sections, a shared
//! `table-initialization` list, and per-dialect test collections whose steps
//! are tagged with the transaction that runs them. Decoding is pure and keeps
//! declaration order everywhere.

pub mod comments;
pub mod document;
pub mod error;
pub mod model;

pub use comments::{find_comment, list_tests, TestSummary};
pub use document::{parse, LoadedScenario, ScenarioDocument};
pub use error::{ParseError, ParseErrorKind};
pub use model::{Scenario, Step, TransactionTag, MAX_TRANSACTIONS};
