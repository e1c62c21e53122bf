//! Lifecycle transition rules for tasks and steps.

use thiserror::Error;

use crate::model::State;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: State, to: State },
    #[error("Cannot transition from terminal state {state}")]
    FromTerminalState { state: State },
}

pub struct StateTransition;

impl StateTransition {
    /// Validates a state change. Repeating the same state is allowed, which
    /// covers duplicate terminal publishes; everything else must move forward.
    pub fn validate(from: State, to: State) -> Result<(), TransitionError> {
        if from == to {
            return Ok(());
        }

        if from.is_terminal() {
            return Err(TransitionError::FromTerminalState { state: from });
        }

        let is_valid = match (from, to) {
            (State::Pending, State::Active) => true,
            // open failures and cancellations fail a task before it ever ran
            (State::Pending, State::Failed) => true,
            (State::Active, State::Succeeded) | (State::Active, State::Failed) => true,
            _ => false,
        };

        if is_valid {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition { from, to })
        }
    }

    /// Like [`validate`](Self::validate) but reports whether the change should
    /// be applied. Same-state updates are accepted without changing anything.
    pub fn should_apply(from: State, to: State) -> Result<bool, TransitionError> {
        Self::validate(from, to)?;
        Ok(from != to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_transitions() {
        assert!(StateTransition::validate(State::Pending, State::Active).is_ok());
        assert!(StateTransition::validate(State::Active, State::Succeeded).is_ok());
        assert!(StateTransition::validate(State::Active, State::Failed).is_ok());
        assert!(StateTransition::validate(State::Pending, State::Failed).is_ok());
        assert!(StateTransition::validate(State::Active, State::Active).is_ok());
    }

    #[test]
    fn test_invalid_transitions() {
        assert_eq!(
            StateTransition::validate(State::Active, State::Pending),
            Err(TransitionError::InvalidTransition {
                from: State::Active,
                to: State::Pending
            })
        );
        assert!(StateTransition::validate(State::Pending, State::Succeeded).is_err());
    }

    #[test]
    fn test_terminal_states() {
        assert_eq!(
            StateTransition::validate(State::Succeeded, State::Failed),
            Err(TransitionError::FromTerminalState {
                state: State::Succeeded
            })
        );
        assert!(StateTransition::validate(State::Failed, State::Active).is_err());

        // duplicate terminal publish is tolerated but not applied
        assert_eq!(
            StateTransition::should_apply(State::Failed, State::Failed),
            Ok(false)
        );
    }
}
