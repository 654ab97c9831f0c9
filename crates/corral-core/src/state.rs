use crate::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a container is in its lifecycle, as last observed through a
/// successful command.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum LifecycleState {
    #[default]
    Initial = 0,
    Created = 1,
    Started = 2,
    Running = 3,
    Stopped = 4,
    Destroyed = 5,
}

impl LifecycleState {
    pub const ALL: [Self; 6] = [
        Self::Initial,
        Self::Created,
        Self::Started,
        Self::Running,
        Self::Stopped,
        Self::Destroyed,
    ];

    pub fn as_u8(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for LifecycleState {
    type Error = CoreError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|state| state.as_u8() == value)
            .ok_or(CoreError::UnrecognizedState(value))
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initial => write!(f, "initial"),
            Self::Created => write!(f, "created"),
            Self::Started => write!(f, "started"),
            Self::Running => write!(f, "running"),
            Self::Stopped => write!(f, "stopped"),
            Self::Destroyed => write!(f, "destroyed"),
        }
    }
}

/// Holder of a container's current state.
///
/// The tracker only guards against undefined values. Which transitions are
/// legal is decided by the client before it mutates the state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StateTracker {
    value: LifecycleState,
}

impl StateTracker {
    pub fn new(initial: LifecycleState) -> Self {
        Self { value: initial }
    }

    pub fn value(&self) -> LifecycleState {
        self.value
    }

    pub fn set(&mut self, state: LifecycleState) {
        self.value = state;
    }

    /// Set the state from its raw numeric value.
    pub fn set_state(&mut self, raw: u8) -> Result<(), CoreError> {
        self.value = LifecycleState::try_from(raw)?;
        Ok(())
    }
}

impl fmt::Display for StateTracker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "State({})", self.value.as_u8())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn states_are_strictly_ordered() {
        for pair in LifecycleState::ALL.windows(2) {
            assert!(pair[0] < pair[1]);
            assert_eq!(pair[0].as_u8() + 1, pair[1].as_u8());
        }
    }

    #[test]
    fn set_state_accepts_defined_values() {
        let mut tracker = StateTracker::default();
        assert_eq!(tracker.value(), LifecycleState::Initial);
        tracker.set_state(4).unwrap();
        assert_eq!(tracker.value(), LifecycleState::Stopped);
        assert_eq!(tracker.value().as_u8(), 4);
    }

    #[test]
    fn set_state_rejects_undefined_values() {
        let mut tracker = StateTracker::new(LifecycleState::Running);
        for raw in [6, 7, 42, u8::MAX] {
            let err = tracker.set_state(raw).unwrap_err();
            assert!(matches!(err, CoreError::UnrecognizedState(v) if v == raw));
        }
        assert_eq!(tracker.value(), LifecycleState::Running);
    }

    #[test]
    fn try_from_covers_every_state() {
        for state in LifecycleState::ALL {
            assert_eq!(LifecycleState::try_from(state.as_u8()).unwrap(), state);
        }
    }

    #[test]
    fn display_forms() {
        assert_eq!(LifecycleState::Running.to_string(), "running");
        assert_eq!(
            StateTracker::new(LifecycleState::Destroyed).to_string(),
            "State(5)"
        );
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&LifecycleState::Stopped).unwrap();
        assert_eq!(json, "\"stopped\"");
        let back: LifecycleState = serde_json::from_str("\"created\"").unwrap();
        assert_eq!(back, LifecycleState::Created);
    }
}
