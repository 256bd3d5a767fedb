use cadence_core::{CadenceError, CadenceResult};

use crate::types::{EnrollmentStatus, TransitionAction};

/// Describes a single valid state transition for an enrollment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateTransition {
    pub from: EnrollmentStatus,
    pub to: EnrollmentStatus,
    pub action: TransitionAction,
}

/// Guards the enrollment lifecycle by enforcing a finite set of valid
/// transitions. `completed` and `unenrolled` have no outgoing edges.
#[derive(Debug, Clone)]
pub struct EnrollmentStateMachine {
    transitions: Vec<StateTransition>,
}

impl EnrollmentStateMachine {
    pub fn new() -> Self {
        use EnrollmentStatus::*;
        use TransitionAction::*;

        let edge = |from, action, to| StateTransition { from, to, action };
        let transitions = vec![
            // Active ->
            edge(Active, Pause, Paused),
            edge(Active, Advance, Active),
            edge(Active, Advance, Completed),
            edge(Active, Unenroll, Unenrolled),
            // Paused ->
            edge(Paused, Resume, Active),
            edge(Paused, Unenroll, Unenrolled),
        ];

        Self { transitions }
    }

    /// Returns `true` if `action` is permitted from `from`.
    pub fn allows(&self, from: EnrollmentStatus, action: TransitionAction) -> bool {
        self.transitions
            .iter()
            .any(|t| t.from == from && t.action == action)
    }

    /// Returns `true` if the status change itself is permitted.
    pub fn can_transition(&self, from: EnrollmentStatus, to: EnrollmentStatus) -> bool {
        self.transitions.iter().any(|t| t.from == from && t.to == to)
    }

    /// Rejects `action` from `from` with a user-facing reason.
    pub fn check(&self, from: EnrollmentStatus, action: TransitionAction) -> CadenceResult<()> {
        if self.allows(from, action) {
            return Ok(());
        }
        let reason = match action {
            TransitionAction::Pause => format!("Can only pause active enrollments (status is {from})"),
            TransitionAction::Resume => {
                format!("Can only resume paused enrollments (status is {from})")
            }
            TransitionAction::Advance => {
                format!("Can only advance active enrollments (status is {from})")
            }
            TransitionAction::Unenroll => format!("Enrollment is already {from}"),
        };
        Err(CadenceError::InvalidTransition(reason))
    }
}

impl Default for EnrollmentStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
