//! Session lifecycle
//!
//! ```text
//!                 ConsoleAttached          ConnectSucceeded
//! Uninitialized ─────────────────► ConsoleReady ─────────► Connected
//!       ▲                              │                      │
//!       └──────── ConnectFailed ───────┘                      │
//!       └──────────────────────── Shutdown ───────────────────┘
//! ```

/// Session states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SessionState {
    /// Nothing set up
    #[default]
    Uninitialized,
    /// Console attached; filesystem not yet connected
    ConsoleReady,
    /// Socket connected, lock ready, filesystem registered
    Connected,
}

/// Events that drive the lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum LifecycleEvent {
    /// Early console attach succeeded
    ConsoleAttached,
    /// Socket, lock and mount are in place
    ConnectSucceeded,
    /// Connection setup failed part way; partial state was released
    ConnectFailed,
    /// Orderly shutdown finished
    Shutdown,
}

impl SessionState {
    /// Whether the console reports itself as present
    pub fn is_detected(self) -> bool {
        !matches!(self, SessionState::Uninitialized)
    }

    /// Whether requests may be sent
    pub fn is_connected(self) -> bool {
        matches!(self, SessionState::Connected)
    }

    /// Process an event and return the next state
    ///
    /// Events that do not apply to the current state leave it unchanged.
    pub fn transition(self, event: LifecycleEvent) -> Self {
        use LifecycleEvent::*;
        use SessionState::*;

        match (self, event) {
            (Uninitialized, ConsoleAttached) => ConsoleReady,
            (ConsoleReady, ConnectSucceeded) => Connected,
            (ConsoleReady, ConnectFailed) => Uninitialized,
            (Connected, Shutdown) => Uninitialized,
            (state, _) => state,
        }
    }
}
