//! ---
//! mvcc_section: "04-execution-engine"
//! mvcc_subsection: "module"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "Per-run context passed to every engine component."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
use mvcc_common::{ConnectionProfile, DialectProfile, RunnerConfig};
use mvcc_logging::LogContext;
use mvcc_scenario::{LoadedScenario, Scenario};

use crate::cancel::CancelToken;
use crate::establish::{ConnectPolicy, ConnectionEstablisher};

/// Everything one run needs, built once and borrowed by each component.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub profile: DialectProfile,
    pub connection: ConnectionProfile,
    pub scenario: Scenario,
    pub config: RunnerConfig,
    pub cancel: CancelToken,
}

impl RunContext {
    pub fn new(loaded: LoadedScenario, config: RunnerConfig, cancel: CancelToken) -> Self {
        let LoadedScenario {
            scenario,
            connection,
        } = loaded;
        Self {
            profile: scenario.dialect.profile(),
            connection,
            scenario,
            config,
            cancel,
        }
    }

    pub fn connect_policy(&self) -> ConnectPolicy {
        ConnectPolicy::from(&self.config.timing)
    }

    pub fn establisher(&self) -> ConnectionEstablisher<'_> {
        ConnectionEstablisher::new(
            &self.profile,
            &self.connection,
            self.connect_policy(),
            self.cancel.clone(),
        )
    }

    /// Logging fields shared by every event of this run.
    pub fn log_context(&self) -> LogContext<'_> {
        LogContext::new()
            .with_dialect(self.profile.dialect.into())
            .with_test(&self.scenario.test_id)
    }

    /// Title shown on the host window, e.g. `POSTGRES - TEST2 - # Anomaly|Write Skew`.
    pub fn title(&self) -> String {
        let mut title = format!(
            "{} - {}",
            self.profile.dialect.to_string().to_uppercase(),
            self.scenario.test_id.to_uppercase()
        );
        if !self.scenario.comment.is_empty() {
            title.push_str(" - ");
            title.push_str(&self.scenario.comment);
        }
        title
    }
}
