//! ---
//! mvcc_section: "04-execution-engine"
//! mvcc_subsection: "module"
//! mvcc_type: "source"
//! mvcc_scope: "code"
//! mvcc_description: "Operator heartbeat running beside the coordinator."
//! mvcc_version: "v0.0.0-prealpha"
//! mvcc_owner: "tbd"
//! ---
use std::io::Write;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

/// Destination for heartbeat marks.
pub trait HeartbeatSink: Send + Sync + 'static {
    fn beat(&self);

    /// Called once when the signal stops after having started.
    fn finish(&self) {}
}

/// Prints a dot per beat and a newline when stopped.
#[derive(Debug, Default, Clone, Copy)]
pub struct StdoutDots;

impl HeartbeatSink for StdoutDots {
    fn beat(&self) {
        let mut out = std::io::stdout().lock();
        let _ = write!(out, ".");
        let _ = out.flush();
    }

    fn finish(&self) {
        println!();
    }
}

/// Discards every beat.
#[derive(Debug, Default, Clone, Copy)]
pub struct SilentHeartbeat;

impl HeartbeatSink for SilentHeartbeat {
    fn beat(&self) {}
}

#[derive(Default)]
struct SignalState {
    active: bool,
    task: Option<JoinHandle<()>>,
}

/// Periodic heartbeat, independent of the scheduler.
///
/// The state lock is held while a beat is written, so once [`ProgressSignal::stop`] returns
/// no further beat can reach the sink.
#[derive(Clone)]
pub struct ProgressSignal {
    period: Duration,
    sink: Arc<dyn HeartbeatSink>,
    state: Arc<Mutex<SignalState>>,
}

impl ProgressSignal {
    pub fn new(period: Duration, sink: Arc<dyn HeartbeatSink>) -> Self {
        Self {
            period,
            sink,
            state: Arc::new(Mutex::new(SignalState::default())),
        }
    }

    /// Start emitting beats. Must be called inside a tokio runtime.
    ///
    /// Starting an already running signal only hands out another guard.
    pub fn start(&self) -> ProgressGuard {
        let mut state = self.state.lock();
        if !state.active {
            state.active = true;
            let period = self.period;
            let sink = Arc::clone(&self.sink);
            let shared = Arc::clone(&self.state);
            state.task = Some(tokio::spawn(async move {
                let mut ticker = interval(period);
                ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
                // first tick completes immediately
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    let state = shared.lock();
                    if !state.active {
                        break;
                    }
                    sink.beat();
                }
            }));
        }
        ProgressGuard {
            signal: self.clone(),
        }
    }

    /// Stop emitting beats. Idempotent.
    pub fn stop(&self) {
        let mut state = self.state.lock();
        if !state.active {
            return;
        }
        state.active = false;
        if let Some(task) = state.task.take() {
            task.abort();
        }
        self.sink.finish();
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().active
    }
}

/// Stops the signal when dropped so every exit path silences it.
#[must_use = "dropping the guard stops the progress signal"]
pub struct ProgressGuard {
    signal: ProgressSignal,
}

impl ProgressGuard {
    pub fn stop(&self) {
        self.signal.stop();
    }
}

impl Drop for ProgressGuard {
    fn drop(&mut self) {
        self.signal.stop();
    }
}
