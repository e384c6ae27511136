//! ---
//! mvcc_section: "04-execution-engine"
//! mvcc_subsection: "module"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "Interleaved step delivery across the session pool."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
use std::time::Duration;

use mvcc_common::{DialectProfile, TimingConfig};
use mvcc_logging::{sim_debug, LogContext};
use mvcc_scenario::{Scenario, TransactionTag};
use serde::Serialize;
use thiserror::Error;

use crate::cancel::{CancelToken, Cancelled};
use crate::pool::SessionPool;
use crate::session::SessionIoError;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("step '{step}' belongs to transaction {transaction} which has no session, check the scenario formatting")]
    Format {
        step: String,
        transaction: TransactionTag,
    },
    #[error(transparent)]
    Session(#[from] SessionIoError),
    #[error("step delivery cancelled")]
    Cancelled(#[from] Cancelled),
}

/// One thing the scheduler did, in order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ScheduledAction {
    /// Transaction switch pause.
    Pause {
        #[serde(with = "millis")]
        duration: Duration,
    },
    Send {
        step: String,
        transaction: TransactionTag,
        slot: usize,
        statement: String,
    },
    Focus { slot: usize },
}

mod millis {
    use std::time::Duration;

    pub fn serialize<S: serde::Serializer>(value: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(value.as_millis()).unwrap_or(u64::MAX))
    }
}

/// Ordered record of a scheduler run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunTranscript {
    pub actions: Vec<ScheduledAction>,
}

impl RunTranscript {
    pub fn pauses(&self) -> usize {
        self.actions
            .iter()
            .filter(|action| matches!(action, ScheduledAction::Pause { .. }))
            .count()
    }

    /// `(slot, statement)` pairs in delivery order.
    pub fn sends(&self) -> Vec<(usize, &str)> {
        self.actions
            .iter()
            .filter_map(|action| match action {
                ScheduledAction::Send {
                    slot, statement, ..
                } => Some((*slot, statement.as_str())),
                _ => None,
            })
            .collect()
    }
}

/// Walks the scenario's steps and routes each to the session owning its transaction.
#[derive(Debug, Clone)]
pub struct StepScheduler {
    switch_pause: Duration,
    submit_pause: Duration,
    cancel: CancelToken,
}

impl StepScheduler {
    pub fn new(timing: &TimingConfig, cancel: CancelToken) -> Self {
        Self {
            switch_pause: timing.transaction_switch_pause,
            submit_pause: timing.step_submit_pause,
            cancel,
        }
    }

    /// Deliver every step in declaration order, then focus the first session.
    ///
    /// A pause separates consecutive steps of different transactions. The first step never
    /// pauses.
    pub async fn run(
        &self,
        pool: &SessionPool,
        scenario: &Scenario,
        profile: &DialectProfile,
    ) -> Result<RunTranscript, SchedulerError> {
        let mut transcript = RunTranscript::default();
        let dialect: &str = scenario.dialect.into();
        let mut previous = scenario.steps.first().map(|step| step.transaction.clone());

        for step in &scenario.steps {
            let session = pool
                .session_for(&step.transaction)
                .ok_or_else(|| SchedulerError::Format {
                    step: step.key.clone(),
                    transaction: step.transaction.clone(),
                })?;

            if previous.as_ref() != Some(&step.transaction) {
                self.cancel.sleep(self.switch_pause).await?;
                transcript.actions.push(ScheduledAction::Pause {
                    duration: self.switch_pause,
                });
                previous = Some(step.transaction.clone());
            }

            let ctx = LogContext::new()
                .with_dialect(dialect)
                .with_test(&scenario.test_id)
                .with_transaction(step.transaction.as_str())
                .with_session(session.slot());
            for statement in &step.statements {
                self.cancel.check()?;
                session.send(statement).await?;
                if let Some(token) = profile.submit_token {
                    session.send(token).await?;
                    self.cancel.sleep(self.submit_pause).await?;
                }
                sim_debug!(context = ctx, "{}: {}", step.key, statement);
                transcript.actions.push(ScheduledAction::Send {
                    step: step.key.clone(),
                    transaction: step.transaction.clone(),
                    slot: session.slot(),
                    statement: statement.clone(),
                });
            }
        }

        if let Some(first) = pool.session(0) {
            first.focus().await?;
            transcript.actions.push(ScheduledAction::Focus { slot: 0 });
        }
        Ok(transcript)
    }
}
