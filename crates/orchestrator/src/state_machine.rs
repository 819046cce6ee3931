use factory_core::ProvisionState;

use crate::error::{ProvisionError, Result};

pub struct ProvisionStateMachine;

impl ProvisionStateMachine {
    pub fn validate_transition(from: &ProvisionState, to: &ProvisionState) -> Result<()> {
        if Self::can_transition(from, to) {
            Ok(())
        } else {
            Err(ProvisionError::InvalidTransition {
                from: from.as_str().to_string(),
                to: to.as_str().to_string(),
            })
        }
    }

    /// Forward by exactly one step, into `FAILED` from any non-terminal
    /// state, or out of `FAILED` back into a non-terminal state on resume.
    pub fn can_transition(from: &ProvisionState, to: &ProvisionState) -> bool {
        match (from, to) {
            (ProvisionState::Complete, _) => false,
            (ProvisionState::Failed, to) => !to.is_terminal(),
            (_, ProvisionState::Failed) => true,
            (from, to) => Self::next_state(from).as_ref() == Some(to),
        }
    }

    pub fn next_state(current: &ProvisionState) -> Option<ProvisionState> {
        let position = current.position()?;
        ProvisionState::SEQUENCE.get(position + 1).copied()
    }
}
