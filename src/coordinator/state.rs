//! Service state machine
//!
//! ```text
//!     ┌──────────┐
//!     │ Stopped  │◄──────────────┐
//!     └────┬─────┘               │
//!          │ start               │ stop
//!     ┌────▼─────┐          ┌────┴─────┐
//!     │ Started  │─────────►│  Paused  │
//!     └────▲─────┘  pause   └────┬─────┘
//!          │                     │
//!          └─────────────────────┘
//!           continue (or start)
//! ```
//!
//! Stop is reachable from both Started and Paused. Every accepted edge
//! invokes exactly one action on the service instance.

use std::fmt;

/// Lifecycle state of a single service
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ServiceState {
    #[default]
    Stopped,
    Started,
    Paused,
}

impl ServiceState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stopped => "stopped",
            Self::Started => "started",
            Self::Paused => "paused",
        }
    }

    /// Stopped is the only state in which the service is not running
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Stopped)
    }

    /// Work out the edge taken for `command` from this state.
    ///
    /// Returns `None` if the state machine has no such edge.
    pub fn transition(self, command: Command) -> Option<Transition> {
        let (action, to) = match (self, command) {
            (Self::Stopped, Command::Start) => (Action::Start, Self::Started),
            (Self::Started | Self::Paused, Command::Stop) => (Action::Stop, Self::Stopped),
            (Self::Started, Command::Pause) => (Action::Pause, Self::Paused),
            (Self::Paused, Command::Continue) => (Action::Continue, Self::Started),
            // Starting a paused service resumes it
            (Self::Paused, Command::Start) => (Action::Continue, Self::Started),
            _ => return None,
        };
        Some(Transition { from: self, to, action })
    }
}

impl fmt::Display for ServiceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A lifecycle command issued by a caller
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    Start,
    Stop,
    Pause,
    Continue,
}

impl Command {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
            Self::Pause => "pause",
            Self::Continue => "continue",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "start" => Some(Self::Start),
            "stop" => Some(Self::Stop),
            "pause" => Some(Self::Pause),
            "continue" | "resume" => Some(Self::Continue),
            _ => None,
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which of the four service actions an edge invokes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
    Pause,
    Continue,
}

/// An accepted edge of the state machine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub from: ServiceState,
    pub to: ServiceState,
    pub action: Action,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_default() {
        let state = ServiceState::default();
        assert_eq!(state, ServiceState::Stopped);
        assert!(!state.is_active());
    }

    #[test]
    fn test_start_from_stopped() {
        let t = ServiceState::Stopped.transition(Command::Start).unwrap();
        assert_eq!(t.to, ServiceState::Started);
        assert_eq!(t.action, Action::Start);
    }

    #[test]
    fn test_stop_from_started_and_paused() {
        for from in [ServiceState::Started, ServiceState::Paused] {
            let t = from.transition(Command::Stop).unwrap();
            assert_eq!(t.to, ServiceState::Stopped);
            assert_eq!(t.action, Action::Stop);
        }
    }

    #[test]
    fn test_pause_and_continue() {
        let t = ServiceState::Started.transition(Command::Pause).unwrap();
        assert_eq!(t.to, ServiceState::Paused);
        assert_eq!(t.action, Action::Pause);

        let t = ServiceState::Paused.transition(Command::Continue).unwrap();
        assert_eq!(t.to, ServiceState::Started);
        assert_eq!(t.action, Action::Continue);
    }

    #[test]
    fn test_start_paused_resumes() {
        let t = ServiceState::Paused.transition(Command::Start).unwrap();
        assert_eq!(t.to, ServiceState::Started);
        assert_eq!(t.action, Action::Continue);
    }

    #[test]
    fn test_rejected_edges() {
        assert!(ServiceState::Stopped.transition(Command::Pause).is_none());
        assert!(ServiceState::Stopped.transition(Command::Continue).is_none());
        assert!(ServiceState::Started.transition(Command::Continue).is_none());
        assert!(ServiceState::Stopped.transition(Command::Stop).is_none());
        assert!(ServiceState::Started.transition(Command::Start).is_none());
        assert!(ServiceState::Paused.transition(Command::Pause).is_none());
    }

    #[test]
    fn test_state_as_str() {
        assert_eq!(ServiceState::Stopped.as_str(), "stopped");
        assert_eq!(ServiceState::Started.as_str(), "started");
        assert_eq!(ServiceState::Paused.as_str(), "paused");
    }

    #[test]
    fn test_command_parse() {
        assert_eq!(Command::parse("START"), Some(Command::Start));
        assert_eq!(Command::parse("resume"), Some(Command::Continue));
        assert_eq!(Command::parse("restart"), None);
    }
}
