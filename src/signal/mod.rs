//! Signal handling for graceful shutdown (SIGINT/SIGTERM)
//!
//! Jobs are never interrupted mid-flight. On the first signal the loop
//! finishes and reports the current job, then stops before the next poll.
//! A second signal exits immediately with code 130.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;

/// Exit code after an immediate (second) interrupt
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

/// Shutdown state shared between the signal handler and the job loop
#[derive(Debug, Default)]
pub struct ShutdownState {
    signal_count: AtomicU8,
}

impl ShutdownState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the loop should stop before its next poll
    pub fn is_shutdown_requested(&self) -> bool {
        self.signal_count.load(Ordering::SeqCst) > 0
    }

    /// Number of signals received
    pub fn signal_count(&self) -> u8 {
        self.signal_count.load(Ordering::SeqCst)
    }

    /// Record a signal and return what to do about it
    pub fn handle_signal(&self) -> SignalAction {
        let previous = self
            .signal_count
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| Some(n.saturating_add(1)))
            .unwrap_or(u8::MAX);
        match previous {
            0 => SignalAction::StopAfterCurrentJob,
            1 => SignalAction::ExitImmediately,
            _ => SignalAction::Ignore,
        }
    }
}

/// Action to take after receiving a signal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// First signal: finish the current job, then stop
    StopAfterCurrentJob,
    /// Second signal: exit now
    ExitImmediately,
    /// Third+ signal
    Ignore,
}

/// Installs the process signal handler
pub struct ShutdownSignal {
    state: Arc<ShutdownState>,
}

impl ShutdownSignal {
    pub fn new() -> Self {
        Self {
            state: Arc::new(ShutdownState::new()),
        }
    }

    /// Shared state for the job loop
    pub fn state(&self) -> Arc<ShutdownState> {
        Arc::clone(&self.state)
    }

    /// Install the SIGINT/SIGTERM handler. Call once at startup.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let state = Arc::clone(&self.state);
        ctrlc::set_handler(move || match state.handle_signal() {
            SignalAction::StopAfterCurrentJob => {
                tracing::warn!("interrupt received, stopping after the current job");
            }
            SignalAction::ExitImmediately => {
                tracing::warn!("second interrupt received, exiting immediately");
                std::process::exit(EXIT_CODE_INTERRUPTED);
            }
            SignalAction::Ignore => {}
        })
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
