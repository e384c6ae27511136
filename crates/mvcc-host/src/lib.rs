//! ---
//! mvcc_section: "05-terminal-host"
//! mvcc_subsection: "module"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "Terminal host crate root."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
//! Concrete collaborators for the engine: tmux panes as sessions and a systemd service probe.

pub mod echo;
pub mod probe;
pub mod tmux;

pub use echo::EchoGuard;
pub use probe::SystemdProbe;
pub use tmux::{TmuxBinary, TmuxError, TmuxHost, TmuxPane, TmuxRunner};
