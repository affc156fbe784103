//! Connection lifecycle state machine.
//!
//! ```text
//! Disconnected ──connect──▶ Connecting ──open──▶ Open
//!                              ▲                  │
//!                              │ delay elapsed    │ close (any non-terminal state)
//!                              │                  ▼
//!                              └────────── Reconnecting
//! ```
//!
//! [`ConnectionManager`] holds no socket; the runtime reports open/close
//! events and asks it when to dial. Reconnects use a fixed delay through a
//! single-slot [`ReconnectTimer`], so repeated close events never stack up
//! more than one pending retry.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info};

use overlay_core::ConnectionId;

/// Fixed delay between a close and the next connection attempt.
pub const DEFAULT_RECONNECT_DELAY: Duration = Duration::from_millis(1000);

/// Lifecycle state of the overlay connection.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    /// Not started, or stopped for good.
    #[default]
    Disconnected,
    /// Dial in progress.
    Connecting,
    /// Socket open.
    Open,
    /// Waiting for the reconnect timer.
    Reconnecting,
}

/// Single-slot timer: at most one deadline pending at a time.
#[derive(Debug, Default)]
pub struct ReconnectTimer {
    deadline: Option<Instant>,
}

impl ReconnectTimer {
    /// Arm the timer unless already armed. Returns whether it was armed now.
    pub fn schedule(&mut self, deadline: Instant) -> bool {
        if self.deadline.is_some() {
            return false;
        }
        self.deadline = Some(deadline);
        true
    }

    /// Disarm. Returns whether a deadline was pending.
    pub fn cancel(&mut self) -> bool {
        self.deadline.take().is_some()
    }

    /// Whether a deadline is pending.
    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Pending deadline.
    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// Consume the deadline if it has passed. Fires at most once per arm.
    pub fn fire(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if deadline <= now => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Owns connection state, the attempt counter and the reconnect timer.
#[derive(Debug)]
pub struct ConnectionManager {
    url: String,
    state: ConnectionState,
    attempts: u32,
    delay: Duration,
    timer: ReconnectTimer,
    connection_id: Option<ConnectionId>,
}

impl ConnectionManager {
    /// Manager with the given reconnect delay.
    pub fn new(delay: Duration) -> Self {
        Self {
            url: String::new(),
            state: ConnectionState::Disconnected,
            attempts: 0,
            delay,
            timer: ReconnectTimer::default(),
            connection_id: None,
        }
    }

    /// Target URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Current state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Reconnect attempts since the last successful open.
    ///
    /// Informational only; the retry delay never depends on it.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Id of the current (or last) attempt.
    pub fn connection_id(&self) -> Option<&ConnectionId> {
        self.connection_id.as_ref()
    }

    /// Pending reconnect deadline.
    pub fn reconnect_deadline(&self) -> Option<Instant> {
        self.timer.deadline()
    }

    /// Whether a reconnect is pending.
    pub fn reconnect_pending(&self) -> bool {
        self.timer.is_pending()
    }

    /// Start connecting to `url`. Returns the attempt id.
    ///
    /// Any pending reconnect is cancelled and the attempt counter starts
    /// over; the caller dials immediately.
    pub fn connect(&mut self, url: impl Into<String>) -> ConnectionId {
        self.url = url.into();
        self.attempts = 0;
        let _ = self.timer.cancel();
        self.begin_attempt()
    }

    /// Socket opened: reset attempts, drop any pending reconnect.
    pub fn on_open(&mut self) {
        if self.timer.cancel() {
            debug!("cancelled pending reconnect on open");
        }
        self.attempts = 0;
        self.state = ConnectionState::Open;
        info!(
            connection_id = %self.id_for_log(),
            url = %self.url,
            "connection opened"
        );
    }

    /// Socket closed or dial failed: schedule one reconnect.
    ///
    /// Returns whether a new timer was armed; duplicate closes while a
    /// reconnect is already pending change nothing.
    pub fn on_close(&mut self, now: Instant) -> bool {
        if self.state == ConnectionState::Disconnected {
            return false;
        }
        self.state = ConnectionState::Reconnecting;
        let armed = self.timer.schedule(now + self.delay);
        if armed {
            info!(
                connection_id = %self.id_for_log(),
                delay_ms = self.delay.as_millis() as u64,
                attempts = self.attempts,
                "connection closed, reconnect scheduled"
            );
        }
        armed
    }

    /// If the reconnect deadline has passed, start the next attempt.
    ///
    /// Returns the new attempt id when the caller should dial.
    pub fn poll_reconnect(&mut self, now: Instant) -> Option<ConnectionId> {
        if !self.timer.fire(now) {
            return None;
        }
        self.attempts = self.attempts.saturating_add(1);
        let id = self.begin_attempt();
        info!(connection_id = %id, attempt = self.attempts, "reconnecting");
        Some(id)
    }

    /// Stop for good: cancel any pending reconnect.
    pub fn disconnect(&mut self) {
        let _ = self.timer.cancel();
        self.state = ConnectionState::Disconnected;
    }

    fn begin_attempt(&mut self) -> ConnectionId {
        let id = ConnectionId::new();
        self.state = ConnectionState::Connecting;
        self.connection_id = Some(id.clone());
        id
    }

    fn id_for_log(&self) -> &str {
        self.connection_id.as_ref().map_or("-", ConnectionId::as_str)
    }
}

impl Default for ConnectionManager {
    fn default() -> Self {
        Self::new(DEFAULT_RECONNECT_DELAY)
    }
}
