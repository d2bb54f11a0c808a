//! Recording session state machine

use std::fmt;
use thiserror::Error;

/// Session states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Starting,
    Recording,
    Stopping,
}

impl SessionState {
    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Starting => "starting",
            Self::Recording => "recording",
            Self::Stopping => "stopping",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Error when an invalid state transition is attempted
#[derive(Debug, Clone, Error)]
#[error("Invalid state transition: cannot {action} while {current_state}")]
pub struct InvalidStateTransition {
    pub current_state: SessionState,
    pub action: String,
}

/// Lifecycle of one recording session.
///
/// State machine:
///   IDLE -> STARTING (begin_start)
///   STARTING -> RECORDING (confirm_started)
///   STARTING -> IDLE (abort_start)
///   RECORDING -> STOPPING (begin_stop)
///   STOPPING -> IDLE (finish_stop)
#[derive(Debug, Default)]
pub struct SessionStateMachine {
    state: SessionState,
}

impl SessionStateMachine {
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn begin_start(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(SessionState::Idle, SessionState::Starting, "start recording")
    }

    pub fn confirm_started(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(
            SessionState::Starting,
            SessionState::Recording,
            "confirm start",
        )
    }

    pub fn abort_start(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(SessionState::Starting, SessionState::Idle, "abort start")
    }

    pub fn begin_stop(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(
            SessionState::Recording,
            SessionState::Stopping,
            "stop recording",
        )
    }

    pub fn finish_stop(&mut self) -> Result<(), InvalidStateTransition> {
        self.transition(SessionState::Stopping, SessionState::Idle, "finish stop")
    }

    fn transition(
        &mut self,
        from: SessionState,
        to: SessionState,
        action: &str,
    ) -> Result<(), InvalidStateTransition> {
        if self.state != from {
            return Err(InvalidStateTransition {
                current_state: self.state,
                action: action.to_string(),
            });
        }
        self.state = to;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_machine_is_idle() {
        let machine = SessionStateMachine::new();
        assert_eq!(machine.state(), SessionState::Idle);
    }

    #[test]
    fn start_then_confirm() {
        let mut machine = SessionStateMachine::new();
        machine.begin_start().unwrap();
        assert_eq!(machine.state(), SessionState::Starting);
        machine.confirm_started().unwrap();
        assert_eq!(machine.state(), SessionState::Recording);
    }

    #[test]
    fn aborted_start_returns_to_idle() {
        let mut machine = SessionStateMachine::new();
        machine.begin_start().unwrap();
        machine.abort_start().unwrap();
        assert_eq!(machine.state(), SessionState::Idle);
    }

    #[test]
    fn start_while_recording_fails() {
        let mut machine = SessionStateMachine::new();
        machine.begin_start().unwrap();
        machine.confirm_started().unwrap();

        let err = machine.begin_start().unwrap_err();
        assert_eq!(err.current_state, SessionState::Recording);
        assert!(err.action.contains("start recording"));
    }

    #[test]
    fn stop_from_idle_fails() {
        let mut machine = SessionStateMachine::new();
        let err = machine.begin_stop().unwrap_err();
        assert_eq!(err.current_state, SessionState::Idle);
    }

    #[test]
    fn full_cycle_can_repeat() {
        let mut machine = SessionStateMachine::new();
        for _ in 0..2 {
            machine.begin_start().unwrap();
            machine.confirm_started().unwrap();
            machine.begin_stop().unwrap();
            assert_eq!(machine.state(), SessionState::Stopping);
            machine.finish_stop().unwrap();
            assert_eq!(machine.state(), SessionState::Idle);
        }
    }

    #[test]
    fn state_display() {
        assert_eq!(SessionState::Idle.to_string(), "idle");
        assert_eq!(SessionState::Starting.to_string(), "starting");
        assert_eq!(SessionState::Recording.to_string(), "recording");
        assert_eq!(SessionState::Stopping.to_string(), "stopping");
    }

    #[test]
    fn error_display() {
        let err = InvalidStateTransition {
            current_state: SessionState::Stopping,
            action: "start recording".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("start recording"));
        assert!(msg.contains("stopping"));
    }
}
