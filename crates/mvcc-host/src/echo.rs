//! ---
//! mvcc_section: "05-terminal-host"
//! mvcc_subsection: "module"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "Operator terminal echo suppression for the length of a run."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
use std::io::IsTerminal;
use std::process::{Command, Stdio};

use tracing::{debug, warn};

/// Turns off echo on the operator's terminal so keystrokes typed while a scenario plays do
/// not land between the panes. Echo comes back when the guard drops.
///
/// Uses a blocking `stty` call so restoring works from `Drop`.
#[derive(Debug)]
pub struct EchoGuard {
    program: String,
    hidden: bool,
}

impl EchoGuard {
    /// Hide echo when stdin is a terminal; otherwise do nothing.
    pub fn hide() -> Self {
        Self::with_program("stty", std::io::stdin().is_terminal())
    }

    /// Use another `stty`-compatible binary. Nothing runs unless `interactive` is set.
    pub fn with_program(program: impl Into<String>, interactive: bool) -> Self {
        let program = program.into();
        let hidden = interactive && stty(&program, "-echo");
        Self { program, hidden }
    }

    /// Whether echo was turned off and will be restored on drop.
    pub fn is_hidden(&self) -> bool {
        self.hidden
    }
}

impl Drop for EchoGuard {
    fn drop(&mut self) {
        if self.hidden && !stty(&self.program, "echo") {
            warn!("could not restore terminal echo, run `stty echo`");
        }
    }
}

fn stty(program: &str, mode: &str) -> bool {
    match Command::new(program)
        .arg(mode)
        .stdin(Stdio::inherit())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) => status.success(),
        Err(err) => {
            debug!(program, mode, error = %err, "stty unavailable");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn echo_is_hidden_only_when_stty_succeeds() {
        let guard = EchoGuard::with_program("true", true);
        assert!(guard.is_hidden());
        drop(guard);

        assert!(!EchoGuard::with_program("false", true).is_hidden());
        assert!(!EchoGuard::with_program("mvcc-no-such-stty", true).is_hidden());
    }

    #[test]
    fn nothing_runs_without_a_terminal() {
        // would be hidden if it ran
        assert!(!EchoGuard::with_program("true", false).is_hidden());
    }
}
