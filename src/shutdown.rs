//! Run liveness and shutdown coordination.
//!
//! A run moves through three states:
//!
//! ```text
//! Running ──request_stop()──► Stopping ──mark_stopped()──► Stopped
//! ```
//!
//! `request_stop` may be called from any task and any number of times;
//! only the first call wins and cancels the shared token that the
//! dispatch loop and every waiting reader observe. In-flight work is
//! never aborted by this module.
//!
//! ## Signals
//! [`wait_for_shutdown_signal`] completes on SIGINT, SIGTERM or SIGQUIT
//! on Unix, and on Ctrl-C elsewhere.

use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Liveness of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Admitting new connections.
    Running,
    /// Shutdown requested, draining in-flight handling units.
    Stopping,
    /// Drained, report finalized.
    Stopped,
}

impl RunState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => RunState::Running,
            1 => RunState::Stopping,
            _ => RunState::Stopped,
        }
    }

    fn as_u8(self) -> u8 {
        match self {
            RunState::Running => 0,
            RunState::Stopping => 1,
            RunState::Stopped => 2,
        }
    }
}

/// Why a run stopped admitting connections.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Ceiling of zero, nothing may ever be admitted.
    NoCapacity,
    /// A client sent the `terminate` sentinel.
    Terminate,
    /// The run deadline elapsed.
    DeadlineExceeded,
    /// The listener failed.
    ListenerFatal,
    /// An accepted connection could not be read.
    ReadFailed,
    /// The process received a termination signal.
    Signal,
    /// The caller cancelled the run.
    Cancelled,
}

impl fmt::Display for StopReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            StopReason::NoCapacity => "no_capacity",
            StopReason::Terminate => "terminate",
            StopReason::DeadlineExceeded => "deadline_exceeded",
            StopReason::ListenerFatal => "listener_fatal",
            StopReason::ReadFailed => "read_failed",
            StopReason::Signal => "signal",
            StopReason::Cancelled => "cancelled",
        };
        f.write_str(label)
    }
}

/// Shared run state plus the token broadcasting the first stop request.
#[derive(Debug)]
pub struct Shutdown {
    state: AtomicU8,
    token: CancellationToken,
}

impl Shutdown {
    pub fn new() -> Self {
        Self {
            state: AtomicU8::new(RunState::Running.as_u8()),
            token: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> RunState {
        RunState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn is_running(&self) -> bool {
        self.state() == RunState::Running
    }

    /// Move `Running -> Stopping`. Returns `true` only for the call that
    /// performed the transition.
    pub fn request_stop(&self, reason: StopReason) -> bool {
        let won = self
            .state
            .compare_exchange(
                RunState::Running.as_u8(),
                RunState::Stopping.as_u8(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok();

        if won {
            info!(%reason, "Stop requested, draining in-flight connections");
            self.token.cancel();
        } else {
            debug!(%reason, state = ?self.state(), "Stop already requested");
        }
        won
    }

    /// Move `Stopping -> Stopped` once every handling unit has joined.
    pub fn mark_stopped(&self) {
        self.state
            .store(RunState::Stopped.as_u8(), Ordering::Release);
        self.token.cancel();
    }

    /// Token cancelled by the first stop request.
    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    /// Completes once a stop has been requested.
    pub async fn stopping(&self) {
        self.token.cancelled().await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Waits for a termination signal.
///
/// Returns `Ok(())` when any signal is received, or `Err` if signal
/// registration fails.
#[cfg(unix)]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigint = signal(SignalKind::interrupt())?;
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigquit = signal(SignalKind::quit())?;

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {},
        _ = sigint.recv()  => {},
        _ = sigterm.recv() => {},
        _ = sigquit.recv() => {},
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn wait_for_shutdown_signal() -> std::io::Result<()> {
    tokio::signal::ctrl_c().await
}
