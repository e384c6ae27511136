//! ---
//! mvcc_section: "03-logging"
//! mvcc_subsection: "module"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "Structured logging context and lifecycle events."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
#![warn(missing_docs)]
//! Structured logging helpers carrying run context (dialect, test, transaction, session).

use tracing::Level;
use tracing_subscriber::{fmt as subscriber_fmt, prelude::*, EnvFilter, Registry};

pub mod macros;

/// Initialize a baseline tracing subscriber suitable for tests and development.
pub fn init() {
    let _ = Registry::default()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(subscriber_fmt::layer().with_writer(std::io::stderr))
        .try_init();
}

/// Structured logging context propagated by the convenience macros.
#[derive(Debug, Default, Clone)]
pub struct LogContext<'a> {
    /// Database dialect the run targets.
    pub dialect: Option<&'a str>,
    /// Scenario (test) identifier.
    pub test: Option<&'a str>,
    /// Transaction tag, e.g. `T2`.
    pub transaction: Option<&'a str>,
    /// Session slot index inside the pool.
    pub session: Option<usize>,
}

impl<'a> LogContext<'a> {
    /// Create an empty logging context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach a dialect name.
    pub fn with_dialect(mut self, dialect: &'a str) -> Self {
        self.dialect = Some(dialect);
        self
    }

    /// Attach a scenario identifier.
    pub fn with_test(mut self, test: &'a str) -> Self {
        self.test = Some(test);
        self
    }

    /// Attach a transaction tag.
    pub fn with_transaction(mut self, transaction: &'a str) -> Self {
        self.transaction = Some(transaction);
        self
    }

    /// Attach a session slot.
    pub fn with_session(mut self, session: usize) -> Self {
        self.session = Some(session);
        self
    }
}

/// Outcome used when emitting run lifecycle log events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunEventOutcome {
    /// The phase completed.
    Success,
    /// The phase failed and the run is abandoned.
    Fault,
}

impl RunEventOutcome {
    fn as_str(&self) -> &'static str {
        match self {
            RunEventOutcome::Success => "success",
            RunEventOutcome::Fault => "fault",
        }
    }
}

/// Emit a standardized run lifecycle event with a success/fault outcome.
pub fn log_run_event(
    context: Option<&LogContext>,
    event: &str,
    message: &str,
    outcome: RunEventOutcome,
) {
    let default = LogContext::default();
    let ctx = context.unwrap_or(&default);
    match outcome {
        RunEventOutcome::Success => tracing::event!(
            Level::INFO,
            event,
            outcome = outcome.as_str(),
            dialect = ctx.dialect.unwrap_or(""),
            test = ctx.test.unwrap_or(""),
            transaction = ctx.transaction.unwrap_or(""),
            session = ctx.session,
            message = %message
        ),
        RunEventOutcome::Fault => tracing::event!(
            Level::ERROR,
            event,
            outcome = outcome.as_str(),
            dialect = ctx.dialect.unwrap_or(""),
            test = ctx.test.unwrap_or(""),
            transaction = ctx.transaction.unwrap_or(""),
            session = ctx.session,
            message = %message
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn macros_emit_without_panic() {
        init();
        let ctx = LogContext::new()
            .with_dialect("postgres")
            .with_test("test4")
            .with_transaction("T2")
            .with_session(1);
        sim_info!(context = ctx.clone(), "step sent");
        sim_debug!("debug message");
        sim_warn!(context = ctx.clone(), "slow prompt after {} polls", 12);
        sim_error!(context = ctx, "connect failed: {}", "auth");
    }

    #[test]
    fn run_event_helper_emits() {
        init();
        let ctx = LogContext::new().with_dialect("mysql");
        log_run_event(
            Some(&ctx),
            "run.establish",
            "sessions ready",
            RunEventOutcome::Success,
        );
        log_run_event(None, "run.establish", "host unreachable", RunEventOutcome::Fault);
    }
}
