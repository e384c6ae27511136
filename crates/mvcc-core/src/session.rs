//! ---
//! mvcc_section: "04-execution-engine"
//! mvcc_subsection: "module"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "Interactive session abstraction and per-session state."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use mvcc_scenario::TransactionTag;
use thiserror::Error;

/// Failure reported by a terminal host while driving a session.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionIoError {
    #[error("session {session}: {action} failed: {reason}")]
    Host {
        session: String,
        action: &'static str,
        reason: String,
    },
    #[error("session {session} is closed")]
    Closed { session: String },
    #[error("session {slot} is not connected")]
    NotConnected { slot: usize },
}

/// One interactive session supplied by the terminal host.
///
/// The engine never assumes anything about the other side: it types lines, reads back what
/// is on screen, and asks for a reset or focus.
#[async_trait]
pub trait SessionHandle: Send + Sync {
    /// Short identifier used in logs, e.g. a tmux pane target.
    fn label(&self) -> String;

    /// Type `text` followed by Enter.
    async fn send_input(&self, text: &str) -> Result<(), SessionIoError>;

    /// Lines currently visible in the session, oldest first.
    async fn capture_recent_output(&self) -> Result<Vec<String>, SessionIoError>;

    /// Clear the session back to an idle shell.
    async fn reset(&self) -> Result<(), SessionIoError>;

    /// Give the session operator focus.
    async fn focus(&self) -> Result<(), SessionIoError>;
}

/// Shared handle as produced by a [`crate::SessionHost`].
pub type SharedHandle = Arc<dyn SessionHandle>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Unconnected,
    Connecting,
    Connected,
    /// Terminal: the run is abandoned.
    Failed,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionState::Unconnected => "unconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// A pool slot: one handle bound to one transaction tag.
pub struct Session {
    slot: usize,
    transaction: TransactionTag,
    handle: SharedHandle,
    state: SessionState,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("slot", &self.slot)
            .field("transaction", &self.transaction)
            .field("handle", &self.handle.label())
            .field("state", &self.state)
            .finish()
    }
}

impl Session {
    pub fn new(slot: usize, transaction: TransactionTag, handle: SharedHandle) -> Self {
        Self {
            slot,
            transaction,
            handle,
            state: SessionState::Unconnected,
        }
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    pub fn transaction(&self) -> &TransactionTag {
        &self.transaction
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == SessionState::Connected
    }

    pub fn label(&self) -> String {
        self.handle.label()
    }

    pub(crate) fn set_state(&mut self, state: SessionState) {
        self.state = state;
    }

    /// Send a line to a connected session.
    pub(crate) async fn send(&self, text: &str) -> Result<(), SessionIoError> {
        if !self.is_connected() {
            return Err(SessionIoError::NotConnected { slot: self.slot });
        }
        self.handle.send_input(text).await
    }

    /// Send a line regardless of state; reserved for the connection command.
    pub(crate) async fn send_unchecked(&self, text: &str) -> Result<(), SessionIoError> {
        self.handle.send_input(text).await
    }

    pub(crate) async fn capture(&self) -> Result<Vec<String>, SessionIoError> {
        self.handle.capture_recent_output().await
    }

    pub(crate) async fn focus(&self) -> Result<(), SessionIoError> {
        self.handle.focus().await
    }

    pub(crate) async fn reset(&mut self) -> Result<(), SessionIoError> {
        let result = self.handle.reset().await;
        self.state = SessionState::Unconnected;
        result
    }
}
