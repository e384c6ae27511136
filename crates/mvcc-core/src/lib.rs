//! ---
//! mvcc_section: "04-execution-engine"
//! mvcc_subsection: "module"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "Scenario execution engine crate root."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
//! Scenario execution engine: connects one session per transaction, prepares the schema, and
//! delivers steps in their declared interleaving.

pub mod cancel;
pub mod context;
pub mod establish;
pub mod pool;
pub mod progress;
pub mod runner;
pub mod scheduler;
pub mod session;

pub use cancel::{CancelToken, Cancelled};
pub use context::RunContext;
pub use establish::{
    classify_output, ConnectError, ConnectFailure, ConnectPolicy, Connected,
    ConnectionEstablisher,
};
pub use pool::{assign_slots, slot_for, PoolError, SessionPool};
pub use progress::{HeartbeatSink, ProgressGuard, ProgressSignal, SilentHeartbeat, StdoutDots};
pub use runner::{RunError, RunOutcome, ScenarioRunner, ServiceProbe, SessionHost};
pub use scheduler::{RunTranscript, ScheduledAction, SchedulerError, StepScheduler};
pub use session::{Session, SessionHandle, SessionIoError, SessionState, SharedHandle};
