//! ---
//! mvcc_section: "07-test-harness"
//! mvcc_subsection: "module"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "Recording hosts and scripted sessions for engine tests."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
//! Stand-ins for the terminal host. Every interaction is appended to a shared [`Recorder`] so
//! tests can assert on ordering across sessions.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mvcc_common::{ConnectionProfile, Dialect};
use mvcc_core::{
    HeartbeatSink, ServiceProbe, SessionHandle, SessionHost, SessionIoError, SharedHandle,
};
use mvcc_scenario::{LoadedScenario, Scenario};
use parking_lot::Mutex;
use tokio::time::Instant;

/// What happened to a session or host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Opened { count: usize, title: String },
    Input { session: usize, text: String },
    Capture { session: usize },
    Reset { session: usize },
    Focus { session: usize },
    Attached,
    TornDown,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    /// Time since the recorder was created, on the tokio clock.
    pub at: Duration,
    pub event: Event,
}

/// Append-only event log shared by a host and its sessions.
#[derive(Debug)]
pub struct Recorder {
    origin: Instant,
    events: Mutex<Vec<RecordedEvent>>,
}

impl Default for Recorder {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
            events: Mutex::new(Vec::new()),
        }
    }
}

impl Recorder {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn record(&self, event: Event) {
        let at = self.origin.elapsed();
        self.events.lock().push(RecordedEvent { at, event });
    }

    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events.lock().clone()
    }

    /// Every line typed into any session, as `(session, text)`, in order.
    pub fn inputs(&self) -> Vec<(usize, String)> {
        self.events
            .lock()
            .iter()
            .filter_map(|recorded| match &recorded.event {
                Event::Input { session, text } => Some((*session, text.clone())),
                _ => None,
            })
            .collect()
    }

    /// Lines typed into one session, in order.
    pub fn inputs_for(&self, session: usize) -> Vec<String> {
        self.inputs()
            .into_iter()
            .filter(|(index, _)| *index == session)
            .map(|(_, text)| text)
            .collect()
    }

    /// Number of output captures taken from one session.
    pub fn captures_for(&self, session: usize) -> usize {
        self.events
            .lock()
            .iter()
            .filter(|recorded| recorded.event == Event::Capture { session })
            .count()
    }

    /// Position of the first recorded event matching `predicate`.
    pub fn position(&self, predicate: impl Fn(&Event) -> bool) -> Option<usize> {
        self.events
            .lock()
            .iter()
            .position(|recorded| predicate(&recorded.event))
    }

    pub fn contains(&self, event: &Event) -> bool {
        self.events.lock().iter().any(|recorded| &recorded.event == event)
    }
}

/// How a scripted session answers after its connection command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Behavior {
    /// Show `output` from the given capture onwards (1-based).
    RespondAfter { polls: u32, output: String },
    /// Never shows anything beyond the echoed command.
    Silent,
    /// Every operation fails as if the pane had been closed.
    Broken,
}

impl Behavior {
    /// Respond with `output` on the first capture.
    pub fn respond(output: impl Into<String>) -> Self {
        Behavior::RespondAfter {
            polls: 1,
            output: output.into(),
        }
    }

    /// Show the dialect's first success prompt on the first capture.
    pub fn prompt(dialect: Dialect) -> Self {
        let prompt = dialect.profile().success_prompts.first().copied().unwrap_or(">");
        Self::respond(format!("mvcc {prompt}"))
    }
}

#[derive(Debug, Default)]
struct ScriptState {
    screen: Vec<String>,
    command_sent: bool,
    captures: u32,
}

/// A session that echoes input and answers captures from a script.
#[derive(Debug)]
pub struct ScriptedSession {
    index: usize,
    behavior: Behavior,
    recorder: Arc<Recorder>,
    state: Mutex<ScriptState>,
}

impl ScriptedSession {
    pub fn new(index: usize, behavior: Behavior, recorder: Arc<Recorder>) -> Self {
        Self {
            index,
            behavior,
            recorder,
            state: Mutex::new(ScriptState::default()),
        }
    }

    fn closed(&self) -> SessionIoError {
        SessionIoError::Closed {
            session: self.label(),
        }
    }
}

#[async_trait]
impl SessionHandle for ScriptedSession {
    fn label(&self) -> String {
        format!("scripted.{}", self.index)
    }

    async fn send_input(&self, text: &str) -> Result<(), SessionIoError> {
        if self.behavior == Behavior::Broken {
            return Err(self.closed());
        }
        self.recorder.record(Event::Input {
            session: self.index,
            text: text.to_owned(),
        });
        let mut state = self.state.lock();
        state.command_sent = true;
        state.screen.push(format!("$ {text}"));
        Ok(())
    }

    async fn capture_recent_output(&self) -> Result<Vec<String>, SessionIoError> {
        if self.behavior == Behavior::Broken {
            return Err(self.closed());
        }
        self.recorder.record(Event::Capture {
            session: self.index,
        });
        let mut state = self.state.lock();
        if !state.command_sent {
            return Ok(state.screen.clone());
        }
        state.captures += 1;
        if let Behavior::RespondAfter { polls, output } = &self.behavior {
            if state.captures == *polls {
                state.screen.push(output.clone());
            }
        }
        Ok(state.screen.clone())
    }

    async fn reset(&self) -> Result<(), SessionIoError> {
        self.recorder.record(Event::Reset {
            session: self.index,
        });
        *self.state.lock() = ScriptState::default();
        Ok(())
    }

    async fn focus(&self) -> Result<(), SessionIoError> {
        if self.behavior == Behavior::Broken {
            return Err(self.closed());
        }
        self.recorder.record(Event::Focus {
            session: self.index,
        });
        Ok(())
    }
}

/// Host handing out [`ScriptedSession`]s; session `i` follows `scripts[i]` and any further
/// session follows `fallback`.
#[derive(Debug)]
pub struct RecordingHost {
    recorder: Arc<Recorder>,
    scripts: Vec<Behavior>,
    fallback: Behavior,
    opened: Option<usize>,
    open_fails: bool,
}

impl RecordingHost {
    /// Every session reaches the dialect's prompt on its first capture.
    pub fn connecting(dialect: Dialect) -> Self {
        Self::scripted(Vec::new(), Behavior::prompt(dialect))
    }

    pub fn scripted(scripts: Vec<Behavior>, fallback: Behavior) -> Self {
        Self {
            recorder: Recorder::new(),
            scripts,
            fallback,
            opened: None,
            open_fails: false,
        }
    }

    /// Hand out `count` sessions from `open_sessions` whatever was asked for.
    pub fn with_opened_count(mut self, count: usize) -> Self {
        self.opened = Some(count);
        self
    }

    /// `open_sessions` records the request and then fails, as if the window split failed
    /// half way.
    pub fn failing_open(mut self) -> Self {
        self.open_fails = true;
        self
    }

    pub fn recorder(&self) -> Arc<Recorder> {
        Arc::clone(&self.recorder)
    }

    /// Build handles directly, without going through [`SessionHost::open_sessions`].
    pub fn handles(&self, count: usize) -> Vec<SharedHandle> {
        (0..count)
            .map(|index| {
                let behavior = self.scripts.get(index).unwrap_or(&self.fallback).clone();
                Arc::new(ScriptedSession::new(index, behavior, self.recorder()))
                    as SharedHandle
            })
            .collect()
    }
}

#[async_trait]
impl SessionHost for RecordingHost {
    async fn open_sessions(
        &self,
        count: usize,
        title: &str,
    ) -> Result<Vec<SharedHandle>, SessionIoError> {
        self.recorder.record(Event::Opened {
            count,
            title: title.to_owned(),
        });
        if self.open_fails {
            return Err(SessionIoError::Host {
                session: title.to_owned(),
                action: "split-window",
                reason: "no space for new pane".into(),
            });
        }
        Ok(self.handles(self.opened.unwrap_or(count)))
    }

    async fn attach(&self) -> Result<(), SessionIoError> {
        self.recorder.record(Event::Attached);
        Ok(())
    }

    async fn teardown(&self) -> Result<(), SessionIoError> {
        self.recorder.record(Event::TornDown);
        Ok(())
    }
}

/// Probe with a fixed answer.
#[derive(Debug, Clone, Copy)]
pub struct StaticProbe(pub bool);

#[async_trait]
impl ServiceProbe for StaticProbe {
    async fn is_running(&self, _dialect: Dialect) -> bool {
        self.0
    }
}

/// Counts heartbeats.
#[derive(Debug, Default)]
pub struct CountingHeartbeat {
    beats: AtomicUsize,
    finished: AtomicBool,
}

impl CountingHeartbeat {
    pub fn beats(&self) -> usize {
        self.beats.load(Ordering::SeqCst)
    }

    pub fn finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl HeartbeatSink for CountingHeartbeat {
    fn beat(&self) {
        self.beats.fetch_add(1, Ordering::SeqCst);
    }

    fn finish(&self) {
        self.finished.store(true, Ordering::SeqCst);
    }
}

/// Connection parameters used across the suites.
pub fn connection() -> ConnectionProfile {
    ConnectionProfile {
        host: "localhost".into(),
        database: "mvcc".into(),
        user: "tester".into(),
        password: "s3cret".into(),
    }
}

/// Scenario from `(step key, statements)` pairs with the given init statements.
///
/// Panics on malformed input; only meant for tests.
pub fn scenario(dialect: Dialect, init: &[&str], steps: &[(&str, &[&str])]) -> Scenario {
    Scenario::from_steps(
        dialect,
        "test1",
        init.iter().map(|s| s.to_string()).collect(),
        steps.iter().map(|(key, statements)| {
            (
                key.to_string(),
                statements.iter().map(|s| s.to_string()).collect(),
            )
        }),
    )
    .expect("test scenario must be well formed")
}

/// [`scenario`] bundled with [`connection`].
pub fn loaded(dialect: Dialect, init: &[&str], steps: &[(&str, &[&str])]) -> LoadedScenario {
    LoadedScenario {
        scenario: scenario(dialect, init, steps),
        connection: connection(),
    }
}
