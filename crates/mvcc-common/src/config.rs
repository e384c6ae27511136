//! ---
//! mvcc_section: "01-core-functionality"
//! mvcc_subsection: "module"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "Runner configuration loading and validation."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_scenario_path() -> PathBuf {
    PathBuf::from("scenarios/mvcc_tests.yml")
}

fn default_tmux_session_name() -> String {
    "mvcc-sim".to_owned()
}

fn default_teardown_on_failure() -> bool {
    true
}

fn default_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_connect_timeout() -> Duration {
    Duration::from_millis(16_000)
}

fn default_transaction_switch_pause() -> Duration {
    Duration::from_secs(1)
}

fn default_step_submit_pause() -> Duration {
    Duration::from_millis(100)
}

fn default_init_submit_pause() -> Duration {
    Duration::from_millis(300)
}

fn default_isolation_setup_pause() -> Duration {
    Duration::from_secs(1)
}

fn default_heartbeat_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

/// Configuration for a scenario run. Every field has a default so an absent file is fine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_scenario_path")]
    pub scenario_path: PathBuf,
    #[serde(default = "default_tmux_session_name")]
    pub tmux_session_name: String,
    /// Close already connected sessions when a run is abandoned.
    #[serde(default = "default_teardown_on_failure")]
    pub teardown_on_failure: bool,
    #[serde(default)]
    pub slot_layout: SlotLayout,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Metadata describing where a [`RunnerConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedRunnerConfig {
    pub config: RunnerConfig,
    /// `None` when no file was found and defaults are in effect.
    pub source: Option<PathBuf>,
}

impl RunnerConfig {
    pub const ENV_CONFIG_PATH: &'static str = "MVCC_SIM_CONFIG";

    /// Load configuration, respecting an explicit path, then `MVCC_SIM_CONFIG`, then the candidates.
    pub fn load_with_source<P: AsRef<Path>>(
        explicit: Option<&Path>,
        candidates: &[P],
    ) -> Result<LoadedRunnerConfig> {
        if let Some(path) = explicit {
            let config = Self::from_path(path)?;
            return Ok(LoadedRunnerConfig {
                config,
                source: Some(path.to_path_buf()),
            });
        }

        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedRunnerConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedRunnerConfig {
                    config,
                    source: Some(path),
                });
            }
        }

        debug!("no runner configuration found, using defaults");
        Ok(LoadedRunnerConfig {
            config: RunnerConfig::default(),
            source: None,
        })
    }

    fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading runner configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        contents
            .parse::<RunnerConfig>()
            .with_context(|| format!("invalid config file {}", path.display()))
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        let name = self.tmux_session_name.trim();
        if name.is_empty() {
            return Err(anyhow!("tmux_session_name must not be empty"));
        }
        // tmux treats these as target separators
        if name.contains(':') || name.contains('.') {
            return Err(anyhow!(
                "tmux_session_name '{}' must not contain ':' or '.'",
                name
            ));
        }
        self.timing.validate()
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            scenario_path: default_scenario_path(),
            tmux_session_name: default_tmux_session_name(),
            teardown_on_failure: default_teardown_on_failure(),
            slot_layout: SlotLayout::default(),
            timing: TimingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl std::str::FromStr for RunnerConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: RunnerConfig =
            toml::from_str(content).with_context(|| "failed to parse runner configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// How transaction tags are assigned to session slots.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SlotLayout {
    /// The n-th tag seen in the scenario drives slot n.
    #[default]
    Direct,
    /// Keyed on the tag name: `T1` drives slot 0, `T2` the last slot and `T3` slot 1.
    /// Other tags cannot be routed.
    Legacy,
}

impl std::str::FromStr for SlotLayout {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "direct" => Ok(SlotLayout::Direct),
            "legacy" => Ok(SlotLayout::Legacy),
            other => Err(format!("unknown slot layout: {}", other)),
        }
    }
}

/// Pacing of the connect loop, initialization, and step delivery.
#[serde_as]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimingConfig {
    #[serde(default = "default_poll_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub poll_interval: Duration,
    #[serde(default = "default_connect_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub connect_timeout: Duration,
    #[serde(default = "default_transaction_switch_pause")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub transaction_switch_pause: Duration,
    #[serde(default = "default_step_submit_pause")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub step_submit_pause: Duration,
    #[serde(default = "default_init_submit_pause")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub init_submit_pause: Duration,
    #[serde(default = "default_isolation_setup_pause")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub isolation_setup_pause: Duration,
    #[serde(default = "default_heartbeat_interval")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub heartbeat_interval: Duration,
}

impl TimingConfig {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(anyhow!("timing.poll_interval must be greater than zero"));
        }
        if self.connect_timeout < self.poll_interval {
            return Err(anyhow!(
                "timing.connect_timeout ({} ms) must be at least timing.poll_interval ({} ms)",
                self.connect_timeout.as_millis(),
                self.poll_interval.as_millis()
            ));
        }
        if self.heartbeat_interval.is_zero() {
            return Err(anyhow!("timing.heartbeat_interval must be greater than zero"));
        }
        Ok(())
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            poll_interval: default_poll_interval(),
            connect_timeout: default_connect_timeout(),
            transaction_switch_pause: default_transaction_switch_pause(),
            step_submit_pause: default_step_submit_pause(),
            init_submit_pause: default_init_submit_pause(),
            isolation_setup_pause: default_isolation_setup_pause(),
            heartbeat_interval: default_heartbeat_interval(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
    /// Write a daily rolling JSON log file next to the terminal output.
    #[serde(default)]
    pub file_logging: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
            file_logging: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_document_yields_defaults() {
        let config: RunnerConfig = "".parse().unwrap();
        assert_eq!(config.timing, TimingConfig::default());
        assert_eq!(config.timing.connect_timeout, Duration::from_millis(16_000));
        assert_eq!(config.timing.poll_interval, Duration::from_millis(500));
        assert_eq!(config.slot_layout, SlotLayout::Direct);
        assert!(config.teardown_on_failure);
    }

    #[test]
    fn timing_and_layout_are_overridable() {
        let config: RunnerConfig = r#"
            slot_layout = "legacy"
            teardown_on_failure = false

            [timing]
            poll_interval = 100
            connect_timeout = 2000
        "#
        .parse()
        .unwrap();
        assert_eq!(config.slot_layout, SlotLayout::Legacy);
        assert!(!config.teardown_on_failure);
        assert_eq!(config.timing.poll_interval, Duration::from_millis(100));
        assert_eq!(config.timing.connect_timeout, Duration::from_secs(2));
        assert_eq!(
            config.timing.transaction_switch_pause,
            Duration::from_secs(1)
        );
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!("tmux_session_name = \"a:b\"".parse::<RunnerConfig>().is_err());
        assert!("[timing]\npoll_interval = 0".parse::<RunnerConfig>().is_err());
        assert!("[timing]\npoll_interval = 900\nconnect_timeout = 100"
            .parse::<RunnerConfig>()
            .is_err());
    }

    #[test]
    fn explicit_path_wins_and_missing_candidates_fall_back() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "tmux_session_name = \"anomalies\"").unwrap();

        let loaded =
            RunnerConfig::load_with_source(Some(file.path()), &["does/not/exist.toml"]).unwrap();
        assert_eq!(loaded.config.tmux_session_name, "anomalies");
        assert_eq!(loaded.source.as_deref(), Some(file.path()));

        let missing = RunnerConfig::load_with_source(None, &["does/not/exist.toml"]);
        if std::env::var(RunnerConfig::ENV_CONFIG_PATH).is_err() {
            let loaded = missing.unwrap();
            assert!(loaded.source.is_none());
            assert_eq!(loaded.config.tmux_session_name, "mvcc-sim");
        }
    }
}
