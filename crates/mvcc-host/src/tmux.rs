//! ---
//! mvcc_section: "05-terminal-host"
//! mvcc_subsection: "module"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "tmux panes as interactive sessions."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use mvcc_core::{SessionHandle, SessionHost, SessionIoError, SharedHandle};
use parking_lot::Mutex;
use thiserror::Error;
use tokio::process::Command;
use tracing::{debug, warn};

const PANE_FORMAT: &str = "#{pane_id}";

#[derive(Debug, Error)]
pub enum TmuxError {
    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("`tmux {command}` exited with {status}: {stderr}")]
    Failed {
        command: String,
        status: String,
        stderr: String,
    },
}

/// Executes tmux commands. Swapped for a recording fake in tests.
#[async_trait]
pub trait TmuxRunner: Send + Sync + 'static {
    /// Run a command and return its standard output.
    async fn output(&self, args: &[String]) -> Result<String, TmuxError>;

    /// Run a command attached to the current terminal.
    async fn interactive(&self, args: &[String]) -> Result<(), TmuxError>;
}

/// The `tmux` binary on `PATH`.
#[derive(Debug, Clone)]
pub struct TmuxBinary {
    program: String,
}

impl Default for TmuxBinary {
    fn default() -> Self {
        Self {
            program: "tmux".to_owned(),
        }
    }
}

impl TmuxBinary {
    fn command(&self, args: &[String]) -> Command {
        let mut command = Command::new(&self.program);
        command.args(args).kill_on_drop(true);
        command
    }

    fn failed(args: &[String], status: std::process::ExitStatus, stderr: &[u8]) -> TmuxError {
        TmuxError::Failed {
            command: args.join(" "),
            status: status.to_string(),
            stderr: String::from_utf8_lossy(stderr).trim().to_owned(),
        }
    }
}

#[async_trait]
impl TmuxRunner for TmuxBinary {
    async fn output(&self, args: &[String]) -> Result<String, TmuxError> {
        let output = self
            .command(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| TmuxError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !output.status.success() {
            return Err(Self::failed(args, output.status, &output.stderr));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn interactive(&self, args: &[String]) -> Result<(), TmuxError> {
        let status = self
            .command(args)
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .status()
            .await
            .map_err(|source| TmuxError::Spawn {
                program: self.program.clone(),
                source,
            })?;
        if !status.success() {
            return Err(Self::failed(args, status, &[]));
        }
        Ok(())
    }
}

fn args<const N: usize>(parts: [&str; N]) -> Vec<String> {
    parts.iter().map(|part| part.to_string()).collect()
}

/// Protect a trailing `;` from tmux, which reads it as a command separator and drops it.
fn escape_separator(text: &str) -> String {
    match text.strip_suffix(';') {
        Some(head) => format!("{head}\\;"),
        None => text.to_owned(),
    }
}

fn host_error(session: &str, action: &'static str, err: TmuxError) -> SessionIoError {
    SessionIoError::Host {
        session: session.to_owned(),
        action,
        reason: err.to_string(),
    }
}

/// One pane of the run's tmux session.
pub struct TmuxPane<R: TmuxRunner = TmuxBinary> {
    runner: Arc<R>,
    target: String,
}

impl<R: TmuxRunner> TmuxPane<R> {
    pub fn target(&self) -> &str {
        &self.target
    }

    async fn run(
        &self,
        action: &'static str,
        args: Vec<String>,
    ) -> Result<String, SessionIoError> {
        self.runner
            .output(&args)
            .await
            .map_err(|err| host_error(&self.target, action, err))
    }
}

#[async_trait]
impl<R: TmuxRunner> SessionHandle for TmuxPane<R> {
    fn label(&self) -> String {
        self.target.clone()
    }

    async fn send_input(&self, text: &str) -> Result<(), SessionIoError> {
        // literal mode so statements are never read as key names, `--` so a leading `-`
        // is not read as a flag
        if !text.is_empty() {
            let literal = escape_separator(text);
            self.run(
                "send",
                args(["send-keys", "-t", &self.target, "-l", "--", &literal]),
            )
            .await?;
        }
        self.run("send", args(["send-keys", "-t", &self.target, "Enter"]))
            .await?;
        Ok(())
    }

    async fn capture_recent_output(&self) -> Result<Vec<String>, SessionIoError> {
        let screen = self
            .run("capture", args(["capture-pane", "-p", "-t", &self.target]))
            .await?;
        let mut lines: Vec<String> = screen.lines().map(str::to_owned).collect();
        while lines.last().is_some_and(|line| line.trim().is_empty()) {
            lines.pop();
        }
        Ok(lines)
    }

    async fn reset(&self) -> Result<(), SessionIoError> {
        self.run("reset", args(["send-keys", "-t", &self.target, "-R"]))
            .await?;
        self.run("reset", args(["clear-history", "-t", &self.target]))
            .await?;
        Ok(())
    }

    async fn focus(&self) -> Result<(), SessionIoError> {
        self.run("focus", args(["select-pane", "-t", &self.target]))
            .await?;
        Ok(())
    }
}

/// Opens one tmux session per run with a pane per transaction, side by side.
pub struct TmuxHost<R: TmuxRunner = TmuxBinary> {
    runner: Arc<R>,
    session_name: String,
    nested: bool,
    panes: Mutex<Vec<String>>,
}

impl TmuxHost<TmuxBinary> {
    /// Host driving the `tmux` binary. Attaching switches clients when already inside tmux.
    pub fn new(session_name: impl Into<String>) -> Self {
        Self::with_runner(session_name, TmuxBinary::default())
            .nested(std::env::var_os("TMUX").is_some())
    }
}

impl<R: TmuxRunner> TmuxHost<R> {
    pub fn with_runner(session_name: impl Into<String>, runner: R) -> Self {
        Self {
            runner: Arc::new(runner),
            session_name: session_name.into(),
            nested: false,
            panes: Mutex::new(Vec::new()),
        }
    }

    /// Whether the operator's terminal is itself a tmux client.
    pub fn nested(mut self, nested: bool) -> Self {
        self.nested = nested;
        self
    }

    pub fn session_name(&self) -> &str {
        &self.session_name
    }

    /// Pane ids opened by the last [`SessionHost::open_sessions`] call.
    pub fn panes(&self) -> Vec<String> {
        self.panes.lock().clone()
    }

    async fn run(
        &self,
        action: &'static str,
        args: Vec<String>,
    ) -> Result<String, SessionIoError> {
        self.runner
            .output(&args)
            .await
            .map_err(|err| host_error(&self.session_name, action, err))
    }

    fn pane(&self, target: String) -> SharedHandle {
        Arc::new(TmuxPane {
            runner: Arc::clone(&self.runner),
            target,
        })
    }
}

#[async_trait]
impl<R: TmuxRunner> SessionHost for TmuxHost<R> {
    async fn open_sessions(
        &self,
        count: usize,
        title: &str,
    ) -> Result<Vec<SharedHandle>, SessionIoError> {
        let name = self.session_name.as_str();
        if let Err(err) = self.runner.output(&args(["kill-session", "-t", name])).await {
            debug!(session = name, error = %err, "no previous tmux session to replace");
        }

        let first = self
            .run(
                "open",
                args([
                    "new-session", "-d", "-P", "-F", PANE_FORMAT, "-s", name, "-n", title,
                ]),
            )
            .await?;
        let mut panes = vec![first.trim().to_owned()];
        for _ in 1..count {
            let pane = self
                .run(
                    "split",
                    args(["split-window", "-h", "-P", "-F", PANE_FORMAT, "-t", name]),
                )
                .await?;
            panes.push(pane.trim().to_owned());
        }
        self.run(
            "layout",
            args(["select-layout", "-t", name, "even-horizontal"]),
        )
        .await?;

        debug!(session = name, ?panes, "tmux panes opened");
        *self.panes.lock() = panes.clone();
        Ok(panes.into_iter().map(|pane| self.pane(pane)).collect())
    }

    async fn attach(&self) -> Result<(), SessionIoError> {
        let name = self.session_name.as_str();
        let command = if self.nested {
            args(["switch-client", "-t", name])
        } else {
            args(["attach-session", "-t", name])
        };
        self.runner
            .interactive(&command)
            .await
            .map_err(|err| host_error(name, "attach", err))
    }

    async fn teardown(&self) -> Result<(), SessionIoError> {
        let name = self.session_name.as_str();
        self.panes.lock().clear();
        if let Err(err) = self.run("teardown", args(["kill-session", "-t", name])).await {
            warn!(session = name, error = %err, "tmux session could not be killed");
            return Err(err);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct FakeTmux {
        calls: Mutex<Vec<Vec<String>>>,
        screen: String,
        missing_session: bool,
    }

    impl FakeTmux {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().iter().map(|call| call.join(" ")).collect()
        }
    }

    #[async_trait]
    impl TmuxRunner for FakeTmux {
        async fn output(&self, args: &[String]) -> Result<String, TmuxError> {
            let mut calls = self.calls.lock();
            calls.push(args.to_vec());
            match args[0].as_str() {
                "kill-session" if self.missing_session => Err(TmuxError::Failed {
                    command: args.join(" "),
                    status: "exit status: 1".into(),
                    stderr: "can't find session".into(),
                }),
                "new-session" | "split-window" => Ok(format!("%{}\n", calls.len())),
                "capture-pane" => Ok(self.screen.clone()),
                _ => Ok(String::new()),
            }
        }

        async fn interactive(&self, args: &[String]) -> Result<(), TmuxError> {
            self.calls.lock().push(args.to_vec());
            Ok(())
        }
    }

    #[tokio::test]
    async fn opens_side_by_side_panes_after_replacing_old_session() {
        let host = TmuxHost::with_runner(
            "mvcc-sim",
            FakeTmux {
                missing_session: true,
                ..FakeTmux::default()
            },
        );
        let handles = host.open_sessions(3, "POSTGRES - TEST2").await.unwrap();

        let labels: Vec<_> = handles.iter().map(|h| h.label()).collect();
        assert_eq!(labels, ["%2", "%3", "%4"]);
        assert_eq!(host.panes(), labels);
        assert_eq!(
            host.runner.calls(),
            [
                "kill-session -t mvcc-sim",
                "new-session -d -P -F #{pane_id} -s mvcc-sim -n POSTGRES - TEST2",
                "split-window -h -P -F #{pane_id} -t mvcc-sim",
                "split-window -h -P -F #{pane_id} -t mvcc-sim",
                "select-layout -t mvcc-sim even-horizontal",
            ]
        );
    }

    #[tokio::test]
    async fn panes_type_literally_and_trim_capture() {
        let host = TmuxHost::with_runner(
            "mvcc-sim",
            FakeTmux {
                screen: "$ psql\nmvcc=#\n\n   \n".into(),
                ..FakeTmux::default()
            },
        );
        let pane = host.open_sessions(1, "t").await.unwrap().remove(0);
        pane.send_input("SELECT 1;").await.unwrap();
        pane.send_input("").await.unwrap();
        assert_eq!(
            pane.capture_recent_output().await.unwrap(),
            vec!["$ psql".to_owned(), "mvcc=#".to_owned()]
        );
        pane.focus().await.unwrap();
        pane.reset().await.unwrap();

        let calls = host.runner.calls();
        assert_eq!(
            calls[3..],
            [
                "send-keys -t %2 -l -- SELECT 1\\;",
                "send-keys -t %2 Enter",
                "send-keys -t %2 Enter",
                "capture-pane -p -t %2",
                "select-pane -t %2",
                "send-keys -t %2 -R",
                "clear-history -t %2",
            ]
        );
    }

    #[tokio::test]
    async fn statement_terminators_and_leading_dashes_survive_tmux_parsing() {
        let host = TmuxHost::with_runner("mvcc-sim", FakeTmux::default());
        let pane = host.open_sessions(1, "t").await.unwrap().remove(0);
        pane.send_input("COMMIT;").await.unwrap();
        pane.send_input("-- T1 reads").await.unwrap();
        pane.send_input("SELECT -1 AS x").await.unwrap();

        let sent: Vec<Vec<String>> = host
            .runner
            .calls
            .lock()
            .iter()
            .filter(|call| call.iter().any(|arg| arg == "-l"))
            .cloned()
            .collect();
        assert_eq!(
            sent,
            [
                ["send-keys", "-t", "%2", "-l", "--", "COMMIT\\;"],
                ["send-keys", "-t", "%2", "-l", "--", "-- T1 reads"],
                ["send-keys", "-t", "%2", "-l", "--", "SELECT -1 AS x"],
            ]
        );
    }

    #[test]
    fn only_a_trailing_separator_is_escaped() {
        assert_eq!(escape_separator("COMMIT;"), "COMMIT\\;");
        assert_eq!(escape_separator("SET a = 1; SET b = 2"), "SET a = 1; SET b = 2");
        assert_eq!(escape_separator("\\set AUTOCOMMIT off"), "\\set AUTOCOMMIT off");
        assert_eq!(escape_separator(""), "");
    }

    #[tokio::test]
    async fn attach_switches_client_when_nested() {
        let host = TmuxHost::with_runner("mvcc-sim", FakeTmux::default());
        host.attach().await.unwrap();
        let nested = TmuxHost::with_runner("mvcc-sim", FakeTmux::default()).nested(true);
        nested.attach().await.unwrap();
        nested.teardown().await.unwrap();

        assert_eq!(host.runner.calls(), ["attach-session -t mvcc-sim"]);
        assert_eq!(
            nested.runner.calls(),
            ["switch-client -t mvcc-sim", "kill-session -t mvcc-sim"]
        );
    }
}
