//! ---
//! mvcc_section: "04-execution-engine"
//! mvcc_subsection: "module"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "Run entry point tying probe, scenario, pool, and scheduler together."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mvcc_common::{Dialect, RunnerConfig};
use mvcc_logging::{log_run_event, sim_error, sim_info, RunEventOutcome};
use mvcc_scenario::{parse, LoadedScenario, ParseError};
use thiserror::Error;

use crate::cancel::CancelToken;
use crate::context::RunContext;
use crate::establish::ConnectError;
use crate::pool::{PoolError, SessionPool};
use crate::progress::{HeartbeatSink, ProgressSignal, SilentHeartbeat};
use crate::scheduler::{RunTranscript, SchedulerError, StepScheduler};
use crate::session::{SessionIoError, SharedHandle};

/// Terminal host that owns the windows or panes sessions live in.
#[async_trait]
pub trait SessionHost: Send + Sync {
    /// Open `count` fresh sessions under a window titled `title`, in slot order.
    async fn open_sessions(
        &self,
        count: usize,
        title: &str,
    ) -> Result<Vec<SharedHandle>, SessionIoError>;

    /// Hand the sessions over to the operator for interactive viewing.
    async fn attach(&self) -> Result<(), SessionIoError>;

    /// Close every session opened by this host.
    async fn teardown(&self) -> Result<(), SessionIoError>;
}

/// Reports whether the database service for a dialect is running on this machine.
#[async_trait]
pub trait ServiceProbe: Send + Sync {
    async fn is_running(&self, dialect: Dialect) -> bool;
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("{dialect} is not running, start the {service} service first")]
    ServiceNotRunning {
        dialect: Dialect,
        service: &'static str,
    },
    #[error("cannot read scenario file {}", .path.display())]
    ScenarioIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("terminal host failed")]
    Host(#[source] SessionIoError),
    #[error(transparent)]
    Connect(ConnectError),
    #[error(transparent)]
    Schedule(SchedulerError),
    #[error("run interrupted")]
    Interrupted,
}

impl From<ConnectError> for RunError {
    fn from(err: ConnectError) -> Self {
        match err {
            ConnectError::Cancelled(_) => RunError::Interrupted,
            other => RunError::Connect(other),
        }
    }
}

impl From<SchedulerError> for RunError {
    fn from(err: SchedulerError) -> Self {
        match err {
            SchedulerError::Cancelled(_) => RunError::Interrupted,
            other => RunError::Schedule(other),
        }
    }
}

impl RunError {
    /// Process exit code: only an interrupted run is non-zero.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::Interrupted => 1,
            _ => 0,
        }
    }
}

/// Summary of a completed run.
#[derive(Debug, Clone)]
pub struct RunOutcome {
    pub dialect: Dialect,
    pub test_id: String,
    pub comment: String,
    pub sessions: usize,
    pub transcript: RunTranscript,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Runs one scenario against a terminal host.
pub struct ScenarioRunner<H, P> {
    config: RunnerConfig,
    host: H,
    probe: P,
    heartbeat: Arc<dyn HeartbeatSink>,
    cancel: CancelToken,
}

impl<H, P> ScenarioRunner<H, P>
where
    H: SessionHost,
    P: ServiceProbe,
{
    pub fn new(config: RunnerConfig, host: H, probe: P) -> Self {
        Self {
            config,
            host,
            probe,
            heartbeat: Arc::new(SilentHeartbeat),
            cancel: CancelToken::new(),
        }
    }

    pub fn with_heartbeat(mut self, sink: Arc<dyn HeartbeatSink>) -> Self {
        self.heartbeat = sink;
        self
    }

    /// Token that interrupts the run at its next poll or pause.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    /// Check the service, load `test_id` from `scenario_path`, and run it.
    pub async fn run(
        &self,
        dialect: Dialect,
        test_id: &str,
        scenario_path: &Path,
    ) -> Result<RunOutcome, RunError> {
        if !self.probe.is_running(dialect).await {
            return Err(RunError::ServiceNotRunning {
                dialect,
                service: dialect.service_name(),
            });
        }

        let raw = tokio::fs::read_to_string(scenario_path)
            .await
            .map_err(|source| RunError::ScenarioIo {
                path: scenario_path.to_path_buf(),
                source,
            })?;
        let loaded = parse(&raw, dialect, test_id)?;
        self.run_loaded(loaded).await
    }

    /// Run an already decoded scenario.
    pub async fn run_loaded(&self, loaded: LoadedScenario) -> Result<RunOutcome, RunError> {
        let started_at = Utc::now();
        let ctx = RunContext::new(loaded, self.config.clone(), self.cancel.clone());
        let log = ctx.log_context();
        sim_info!(context = log, "starting {}", ctx.title());

        let mut opened = None;
        let result = self.drive(&ctx, &mut opened).await;

        match result {
            Ok(transcript) => {
                log_run_event(
                    Some(&log),
                    "run.complete",
                    &format!("{} statements delivered", transcript.sends().len()),
                    RunEventOutcome::Success,
                );
                self.host.attach().await.map_err(RunError::Host)?;
                Ok(RunOutcome {
                    dialect: ctx.scenario.dialect,
                    test_id: ctx.scenario.test_id.clone(),
                    comment: ctx.scenario.comment.clone(),
                    sessions: opened.as_ref().map_or(0, SessionPool::len),
                    transcript,
                    started_at,
                    finished_at: Utc::now(),
                })
            }
            Err(err) => {
                log_run_event(
                    Some(&log),
                    "run.abandoned",
                    &err.to_string(),
                    RunEventOutcome::Fault,
                );
                if self.config.teardown_on_failure {
                    // the host may hold panes even when no pool was built from them
                    if let Some(pool) = opened.as_mut() {
                        pool.teardown().await;
                    }
                    if let Err(teardown) = self.host.teardown().await {
                        sim_error!(context = log, "host teardown failed: {}", teardown);
                    }
                }
                Err(err)
            }
        }
    }

    /// Open the sessions, then establish and schedule. The pool is left in `opened` for
    /// the caller to clean up, whichever stage fails.
    async fn drive(
        &self,
        ctx: &RunContext,
        opened: &mut Option<SessionPool>,
    ) -> Result<RunTranscript, RunError> {
        let handles = self
            .host
            .open_sessions(ctx.scenario.session_count(), &ctx.title())
            .await
            .map_err(RunError::Host)?;
        let pool = opened.insert(SessionPool::new(
            handles,
            &ctx.scenario.transactions,
            ctx.config.slot_layout,
        )?);

        let progress = ProgressSignal::new(
            ctx.config.timing.heartbeat_interval,
            Arc::clone(&self.heartbeat),
        );
        let _beating = progress.start();
        pool.establish(ctx).await?;
        let scheduler = StepScheduler::new(&ctx.config.timing, ctx.cancel.clone());
        let transcript = scheduler.run(pool, &ctx.scenario, &ctx.profile).await?;
        Ok(transcript)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::Cancelled;

    #[test]
    fn only_interrupts_exit_non_zero() {
        assert_eq!(RunError::Interrupted.exit_code(), 1);
        assert_eq!(
            RunError::ServiceNotRunning {
                dialect: Dialect::Mysql,
                service: "mysql"
            }
            .exit_code(),
            0
        );
        let cancelled: RunError = ConnectError::Cancelled(Cancelled).into();
        assert!(matches!(cancelled, RunError::Interrupted));
        let cancelled: RunError = SchedulerError::Cancelled(Cancelled).into();
        assert_eq!(cancelled.exit_code(), 1);
        let timeout: RunError = ConnectError::Timeout {
            command: "psql".into(),
            waited: std::time::Duration::from_secs(16),
            polls: 32,
        }
        .into();
        assert_eq!(timeout.exit_code(), 0);
    }
}
