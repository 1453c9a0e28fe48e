//! Connection state machine and reconnect policy.
//!
//! One [`ConnectionFsm`] exists per session and is owned exclusively by the
//! connection manager. All transitions are explicit methods so the policy is
//! testable without a socket or a clock.
//!
//! Reconnect policy: after an abnormal close (any close code other than
//! [`NORMAL_CLOSE_CODE`]), retry after `min(1000 * 2^attempts, 10000)` ms.
//! The attempt counter resets on every successful open and caps at
//! [`MAX_RECONNECT_ATTEMPTS`]; once the cap is reached the next abnormal
//! close is fatal and nothing further is scheduled.

use std::time::Duration;
use tracing::debug;

/// Close code meaning intentional/no-retry (RFC 6455 normal closure).
pub const NORMAL_CLOSE_CODE: u16 = 1000;

/// Close code reported when the transport dies without a close frame.
pub const ABNORMAL_CLOSE_CODE: u16 = 1006;

/// Consecutive abnormal closes tolerated before giving up.
pub const MAX_RECONNECT_ATTEMPTS: u32 = 5;

const BASE_DELAY_MS: u64 = 1000;
const MAX_DELAY_MS: u64 = 10_000;

/// Backoff delay for a given attempt count: 1000, 2000, 4000, 8000, 10000 ms.
pub fn reconnect_delay(attempts: u32) -> Duration {
    let ms = BASE_DELAY_MS
        .saturating_mul(2u64.saturating_pow(attempts))
        .min(MAX_DELAY_MS);
    Duration::from_millis(ms)
}

/// Lifecycle state of the session's single connection slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No connection yet.
    Idle,
    /// A connect attempt is in flight.
    Connecting,
    /// Connected; edits may be sent.
    Open,
    /// Waiting on the single-slot reconnect timer.
    ReconnectScheduled,
    /// Terminal: intentional close or retry budget exhausted.
    ClosedFinal,
}

/// What to do after an abnormal close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseDisposition {
    /// Schedule exactly one reconnect after this delay.
    Retry(Duration),
    /// Budget exhausted; the session is terminal.
    Fatal,
}

/// Explicit finite-state object for the connection lifecycle.
#[derive(Debug)]
pub struct ConnectionFsm {
    state: ConnectionState,
    attempts: u32,
}

impl ConnectionFsm {
    pub fn new() -> Self {
        Self { state: ConnectionState::Idle, attempts: 0 }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive abnormal closes since the last successful open.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Whether a new connect attempt may start.
    ///
    /// False while a connection is already open or in flight (open is
    /// idempotent) and after the terminal state (a fatal session must not
    /// silently retry).
    pub fn can_open(&self) -> bool {
        !matches!(
            self.state,
            ConnectionState::Open | ConnectionState::Connecting | ConnectionState::ClosedFinal
        )
    }

    /// A connect attempt has started.
    pub fn on_connecting(&mut self) {
        debug!(from = ?self.state, "connection state -> Connecting");
        self.state = ConnectionState::Connecting;
    }

    /// The connection opened successfully: counter resets so a later abnormal
    /// close restarts the backoff from the beginning.
    pub fn on_open(&mut self) {
        debug!("connection state -> Open (attempt counter reset)");
        self.state = ConnectionState::Open;
        self.attempts = 0;
    }

    /// The connection closed abnormally (or a connect attempt failed).
    ///
    /// Increments the attempt counter and either hands back the backoff delay
    /// for the single reconnect slot, or declares the session terminal.
    pub fn on_abnormal_close(&mut self) -> CloseDisposition {
        if self.attempts >= MAX_RECONNECT_ATTEMPTS {
            debug!(attempts = self.attempts, "reconnect budget exhausted");
            self.state = ConnectionState::ClosedFinal;
            return CloseDisposition::Fatal;
        }
        let delay = reconnect_delay(self.attempts);
        self.attempts += 1;
        self.state = ConnectionState::ReconnectScheduled;
        debug!(attempts = self.attempts, ?delay, "reconnect scheduled");
        CloseDisposition::Retry(delay)
    }

    /// Intentional close (session teardown): terminal, regardless of counter.
    pub fn on_intentional_close(&mut self) {
        debug!(from = ?self.state, "connection state -> ClosedFinal (intentional)");
        self.state = ConnectionState::ClosedFinal;
    }
}

impl Default for ConnectionFsm {
    fn default() -> Self {
        Self::new()
    }
}
