//! ---
//! mvcc_section: "05-terminal-host"
//! mvcc_subsection: "module"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "Database service check through systemctl."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
use async_trait::async_trait;
use mvcc_common::Dialect;
use mvcc_core::ServiceProbe;

/// Asks systemd whether the dialect's service unit is active.
///
/// Only Linux hosts are checked; elsewhere the database is assumed to be running.
#[derive(Debug, Clone)]
pub struct SystemdProbe {
    program: String,
}

impl Default for SystemdProbe {
    fn default() -> Self {
        Self {
            program: "systemctl".to_owned(),
        }
    }
}

impl SystemdProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use another `systemctl`-compatible binary.
    pub fn with_program(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    #[cfg(target_os = "linux")]
    async fn unit_active(&self, unit: &str) -> bool {
        let status = tokio::process::Command::new(&self.program)
            .args(["is-active", "--quiet", unit])
            .stdin(std::process::Stdio::null())
            .status()
            .await;
        match status {
            Ok(status) => status.success(),
            Err(err) => {
                tracing::warn!(
                    program = %self.program,
                    unit,
                    error = %err,
                    "service check failed to run"
                );
                false
            }
        }
    }

    #[cfg(not(target_os = "linux"))]
    async fn unit_active(&self, _unit: &str) -> bool {
        true
    }
}

#[async_trait]
impl ServiceProbe for SystemdProbe {
    async fn is_running(&self, dialect: Dialect) -> bool {
        let unit = dialect.service_name();
        let active = self.unit_active(unit).await;
        tracing::debug!(%dialect, unit, active, "database service checked");
        active
    }
}
