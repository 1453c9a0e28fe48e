//! Session status flags: the error taxonomy surfaced as state.
//!
//! Nothing in the sync core throws across the event boundary; the UI reads
//! these flags instead. Three severities:
//! - transient: dismissible warning (malformed frame, failed send)
//! - degraded: persistent banner until a successful open clears it
//! - fatal: terminal for the session, only a full restart recovers

/// User-visible status of one editing session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStatus {
    connected: bool,
    transient: Option<String>,
    degraded: Option<String>,
    fatal: Option<String>,
}

impl SessionStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connected(&self) -> bool {
        self.connected
    }

    /// The dismissible warning, if one is showing.
    pub fn transient_warning(&self) -> Option<&str> {
        self.transient.as_deref()
    }

    /// The persistent banner: fatal wins over degraded.
    pub fn banner(&self) -> Option<&str> {
        self.fatal.as_deref().or(self.degraded.as_deref())
    }

    pub fn is_fatal(&self) -> bool {
        self.fatal.is_some()
    }

    /// Successful open: connected; the connection banner and any pending
    /// warning clear. A stale "not connected" warning must not outlive the
    /// recovery it warned about.
    pub fn on_opened(&mut self) {
        self.connected = true;
        self.degraded = None;
        self.transient = None;
    }

    /// Socket error or mid-retry: persistent banner until superseded.
    pub fn on_degraded(&mut self, reason: impl Into<String>) {
        self.connected = false;
        self.degraded = Some(reason.into());
    }

    /// Retry budget exhausted: terminal.
    pub fn on_fatal(&mut self, reason: impl Into<String>) {
        self.connected = false;
        self.fatal = Some(reason.into());
    }

    pub fn on_closed(&mut self) {
        self.connected = false;
    }

    /// Raise a dismissible warning (replaces any previous one).
    pub fn warn_transient(&mut self, message: impl Into<String>) {
        self.transient = Some(message.into());
    }

    pub fn dismiss_transient(&mut self) {
        self.transient = None;
    }
}
