//! ---
//! mvcc_section: "04-execution-engine"
//! mvcc_subsection: "module"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "Connect-and-verify loop with bounded polling."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
use std::time::Duration;

use mvcc_common::{ConnectionProfile, DialectProfile, TimingConfig};
use mvcc_logging::{sim_debug, sim_warn, LogContext};
use thiserror::Error;
use tokio::time::Instant;

use crate::cancel::{CancelToken, Cancelled};
use crate::session::{Session, SessionIoError, SessionState};

/// How long to wait for a prompt and how often to look for it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectPolicy {
    pub poll_interval: Duration,
    pub timeout: Duration,
}

impl Default for ConnectPolicy {
    fn default() -> Self {
        Self::from(&TimingConfig::default())
    }
}

impl From<&TimingConfig> for ConnectPolicy {
    fn from(timing: &TimingConfig) -> Self {
        Self {
            poll_interval: timing.poll_interval,
            timeout: timing.connect_timeout,
        }
    }
}

impl ConnectPolicy {
    /// Upper bound on the number of output captures for one attempt.
    pub fn max_polls(&self) -> u32 {
        if self.poll_interval.is_zero() {
            return 0;
        }
        let polls = self.timeout.as_nanos().div_ceil(self.poll_interval.as_nanos());
        u32::try_from(polls).unwrap_or(u32::MAX)
    }
}

/// Failure class recognised in client output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectFailure {
    Database,
    Host,
    Authentication,
}

/// Why a session could not be brought to a ready prompt.
///
/// Every variant raised from output carries the connection command with the password masked.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("database does not exist or cannot be opened ({command})")]
    Database { command: String },
    #[error("host unknown or unreachable ({command})")]
    Host { command: String },
    #[error("authentication failed ({command})")]
    Authentication { command: String },
    #[error("no prompt after {} ms and {polls} polls, the server is probably unreachable ({command})", .waited.as_millis())]
    Timeout {
        command: String,
        waited: Duration,
        polls: u32,
    },
    #[error(transparent)]
    Session(#[from] SessionIoError),
    #[error("connection attempt cancelled")]
    Cancelled(#[from] Cancelled),
}

impl ConnectError {
    fn from_failure(failure: ConnectFailure, command: String) -> Self {
        match failure {
            ConnectFailure::Database => ConnectError::Database { command },
            ConnectFailure::Host => ConnectError::Host { command },
            ConnectFailure::Authentication => ConnectError::Authentication { command },
        }
    }
}

/// Successful connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Connected {
    pub slot: usize,
    pub polls: u32,
    pub elapsed: Duration,
}

/// Classify captured output.
///
/// `None` means nothing recognisable yet. Failure groups take precedence over the success
/// prompt: database, then host, then authentication.
pub fn classify_output(
    lines: &[String],
    profile: &DialectProfile,
) -> Option<Result<(), ConnectFailure>> {
    let output = lines.join("\n");
    let contains_any = |patterns: &[&str]| patterns.iter().any(|p| output.contains(p));
    let patterns = &profile.failure_patterns;

    if contains_any(patterns.database) {
        Some(Err(ConnectFailure::Database))
    } else if contains_any(patterns.host) {
        Some(Err(ConnectFailure::Host))
    } else if contains_any(patterns.authentication) {
        Some(Err(ConnectFailure::Authentication))
    } else if contains_any(profile.success_prompts) {
        Some(Ok(()))
    } else {
        None
    }
}

/// Drives a single session from an idle shell to a ready database prompt.
pub struct ConnectionEstablisher<'a> {
    profile: &'a DialectProfile,
    connection: &'a ConnectionProfile,
    policy: ConnectPolicy,
    cancel: CancelToken,
}

impl<'a> ConnectionEstablisher<'a> {
    pub fn new(
        profile: &'a DialectProfile,
        connection: &'a ConnectionProfile,
        policy: ConnectPolicy,
        cancel: CancelToken,
    ) -> Self {
        Self {
            profile,
            connection,
            policy,
            cancel,
        }
    }

    pub fn policy(&self) -> ConnectPolicy {
        self.policy
    }

    /// Type the connection command and poll the session until it is classified.
    pub async fn connect(&self, session: &mut Session) -> Result<Connected, ConnectError> {
        let result = self.attempt(session).await;
        session.set_state(match result {
            Ok(_) => SessionState::Connected,
            Err(_) => SessionState::Failed,
        });
        result
    }

    async fn attempt(&self, session: &mut Session) -> Result<Connected, ConnectError> {
        let masked = self.profile.masked_connection_command(self.connection);
        let dialect = self.profile.dialect.to_string();
        let transaction = session.transaction().to_string();
        let ctx = LogContext::new()
            .with_dialect(&dialect)
            .with_transaction(&transaction)
            .with_session(session.slot());

        self.cancel.check()?;
        session.set_state(SessionState::Connecting);
        sim_debug!(context = ctx, "connecting with `{}`", masked);
        session
            .send_unchecked(&self.profile.connection_command(self.connection))
            .await?;

        let started = Instant::now();
        let mut polls = 0u32;
        while started.elapsed() < self.policy.timeout {
            self.cancel.sleep(self.policy.poll_interval).await?;
            polls += 1;
            let lines = session.capture().await?;
            match classify_output(&lines, self.profile) {
                Some(Ok(())) => {
                    let elapsed = started.elapsed();
                    sim_debug!(
                        context = ctx,
                        "prompt detected after {} polls ({} ms)",
                        polls,
                        elapsed.as_millis()
                    );
                    return Ok(Connected {
                        slot: session.slot(),
                        polls,
                        elapsed,
                    });
                }
                Some(Err(failure)) => {
                    sim_warn!(context = ctx, "connection rejected: {:?}", failure);
                    return Err(ConnectError::from_failure(failure, masked));
                }
                None => continue,
            }
        }

        sim_warn!(context = ctx, "no prompt after {} polls", polls);
        Err(ConnectError::Timeout {
            command: masked,
            waited: started.elapsed(),
            polls,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mvcc_common::Dialect;

    fn lines(text: &[&str]) -> Vec<String> {
        text.iter().map(|line| line.to_string()).collect()
    }

    #[test]
    fn prompt_means_connected() {
        let postgres = Dialect::Postgres.profile();
        assert_eq!(
            classify_output(&lines(&["psql (16.2)", "mvcc=#"]), &postgres),
            Some(Ok(()))
        );
        let mysql = Dialect::Mysql.profile();
        assert_eq!(
            classify_output(&lines(&["MariaDB [mvcc]>"]), &mysql),
            Some(Ok(()))
        );
        assert_eq!(classify_output(&lines(&["$ mysql -u root"]), &mysql), None);
    }

    #[test]
    fn failures_follow_precedence() {
        let profile = Dialect::Mysql.profile();
        let output = lines(&[
            "ERROR 1045 (28000): Access denied for user 'root'",
            "ERROR 1049 (42000): Unknown database 'mvcc'",
        ]);
        assert_eq!(
            classify_output(&output, &profile),
            Some(Err(ConnectFailure::Database))
        );

        let output = lines(&[
            "psql: error: could not translate host name \"nowhere\"",
            "authentication failed",
        ]);
        assert_eq!(
            classify_output(&output, &profile),
            Some(Err(ConnectFailure::Host))
        );

        let output = lines(&["Login failed for user 'sa'.", "1>"]);
        assert_eq!(
            classify_output(&output, &Dialect::Sqlserver.profile()),
            Some(Err(ConnectFailure::Authentication))
        );
    }

    #[test]
    fn max_polls_rounds_up() {
        assert_eq!(ConnectPolicy::default().max_polls(), 32);
        let policy = ConnectPolicy {
            poll_interval: Duration::from_millis(300),
            timeout: Duration::from_millis(1000),
        };
        assert_eq!(policy.max_polls(), 4);
    }
}
