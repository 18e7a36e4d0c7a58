//! Connection lifecycle for the SSE client.
//!
//! `Idle → Connecting → Open → (Backoff → Connecting)* → Closed`
//!
//! Transitions are pure: the client feeds [`Input`]s and performs the
//! returned [`Action`]. Nothing here touches the network or the clock.

use std::time::Duration;

/// Bounded fixed-interval reconnection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectPolicy {
    /// Transport errors tolerated since the last successful open
    pub max_attempts: u32,
    pub interval: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            interval: Duration::from_millis(3000),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseReason {
    /// The server finished the stream
    Ended,
    /// `disconnect()` was called
    Disconnected,
    /// Too many consecutive transport errors
    Exhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Idle,
    Connecting,
    Open,
    Backoff { attempt: u32 },
    Closed(CloseReason),
}

impl ConnectionState {
    pub fn is_closed(&self) -> bool {
        matches!(self, Self::Closed(_))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Connect,
    Opened,
    TransportError,
    BackoffElapsed,
    StreamEnded,
    Disconnect,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Issue the HTTP request
    OpenRequest,
    NotifyOpen,
    /// Sleep, then feed [`Input::BackoffElapsed`]
    Wait(Duration),
    NotifyMaxAttemptsReached,
    NotifyClose,
    /// Tear down without notifying
    Stop,
    None,
}

#[derive(Debug, Clone)]
pub struct ConnectionMachine {
    state: ConnectionState,
    attempts: u32,
    policy: ReconnectPolicy,
}

impl ConnectionMachine {
    pub fn new(policy: ReconnectPolicy) -> Self {
        Self {
            state: ConnectionState::Idle,
            attempts: 0,
            policy,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Consecutive transport errors since the last open
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    pub fn handle(&mut self, input: Input) -> Action {
        use ConnectionState as S;

        match (self.state, input) {
            (S::Closed(_), _) => Action::None,

            (_, Input::Disconnect) => {
                self.state = S::Closed(CloseReason::Disconnected);
                Action::Stop
            }

            (S::Idle, Input::Connect) => {
                self.state = S::Connecting;
                Action::OpenRequest
            }

            (S::Connecting, Input::Opened) => {
                self.state = S::Open;
                self.attempts = 0;
                Action::NotifyOpen
            }

            (S::Connecting | S::Open, Input::TransportError) => {
                self.attempts += 1;
                if self.attempts >= self.policy.max_attempts {
                    self.state = S::Closed(CloseReason::Exhausted);
                    Action::NotifyMaxAttemptsReached
                } else {
                    self.state = S::Backoff {
                        attempt: self.attempts,
                    };
                    Action::Wait(self.policy.interval)
                }
            }

            (S::Backoff { .. }, Input::BackoffElapsed) => {
                self.state = S::Connecting;
                Action::OpenRequest
            }

            (S::Open, Input::StreamEnded) => {
                self.state = S::Closed(CloseReason::Ended);
                Action::NotifyClose
            }

            _ => Action::None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn machine(max_attempts: u32) -> ConnectionMachine {
        ConnectionMachine::new(ReconnectPolicy {
            max_attempts,
            interval: Duration::from_millis(10),
        })
    }

    #[test]
    fn test_happy_path() {
        let mut m = machine(3);
        assert_eq!(m.handle(Input::Connect), Action::OpenRequest);
        assert_eq!(m.handle(Input::Opened), Action::NotifyOpen);
        assert_eq!(m.state(), ConnectionState::Open);
        assert_eq!(m.handle(Input::StreamEnded), Action::NotifyClose);
        assert_eq!(m.state(), ConnectionState::Closed(CloseReason::Ended));
    }

    #[test]
    fn test_three_errors_exhaust_three_attempts() {
        let mut m = machine(3);
        m.handle(Input::Connect);

        assert_eq!(m.handle(Input::TransportError), Action::Wait(Duration::from_millis(10)));
        assert_eq!(m.handle(Input::BackoffElapsed), Action::OpenRequest);
        assert_eq!(m.handle(Input::TransportError), Action::Wait(Duration::from_millis(10)));
        assert_eq!(m.handle(Input::BackoffElapsed), Action::OpenRequest);
        assert_eq!(m.handle(Input::TransportError), Action::NotifyMaxAttemptsReached);
        assert_eq!(m.state(), ConnectionState::Closed(CloseReason::Exhausted));

        // Only once
        assert_eq!(m.handle(Input::TransportError), Action::None);
        assert_eq!(m.handle(Input::Disconnect), Action::None);
    }

    #[test]
    fn test_successful_open_resets_attempts() {
        let mut m = machine(2);
        m.handle(Input::Connect);
        m.handle(Input::TransportError);
        assert_eq!(m.attempts(), 1);
        m.handle(Input::BackoffElapsed);
        m.handle(Input::Opened);
        assert_eq!(m.attempts(), 0);

        assert!(matches!(m.handle(Input::TransportError), Action::Wait(_)));
        assert_eq!(m.state(), ConnectionState::Backoff { attempt: 1 });
    }

    #[test]
    fn test_disconnect_is_idempotent_and_safe_before_connect() {
        let mut m = machine(3);
        assert_eq!(m.handle(Input::Disconnect), Action::Stop);
        assert_eq!(m.handle(Input::Disconnect), Action::None);
        assert_eq!(m.handle(Input::Connect), Action::None);
        assert!(m.state().is_closed());
    }

    #[test]
    fn test_disconnect_during_backoff() {
        let mut m = machine(3);
        m.handle(Input::Connect);
        m.handle(Input::TransportError);
        assert_eq!(m.handle(Input::Disconnect), Action::Stop);
        assert_eq!(m.handle(Input::BackoffElapsed), Action::None);
    }

    #[test]
    fn test_repeated_connect_is_ignored() {
        let mut m = machine(3);
        m.handle(Input::Connect);
        assert_eq!(m.handle(Input::Connect), Action::None);
        assert_eq!(m.state(), ConnectionState::Connecting);
    }
}
